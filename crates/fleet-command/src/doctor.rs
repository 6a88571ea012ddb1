use anyhow::{Context, Result};

pub fn check_api(base_url: &str, timeout_ms: u64) -> Result<()> {
    let url = reqwest::Url::parse(base_url).with_context(|| format!("api.base_url invalid: {}", base_url))?;
    anyhow::ensure!(
        url.scheme() == "http" || url.scheme() == "https",
        "api.base_url must be http(s), got {}",
        url.scheme()
    );
    anyhow::ensure!(url.host_str().is_some(), "api.base_url has no host");
    anyhow::ensure!((100..=120_000).contains(&timeout_ms), "api.timeout_ms should be 100..120000");
    Ok(())
}
