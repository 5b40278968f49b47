//! Latest-release check against GitHub.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

const LATEST_RELEASE_URL: &str =
    "https://api.github.com/repos/theextendedname/GW2_Commanders_Watch/releases/latest";

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    html_url: String,
    #[serde(default)]
    prerelease: bool,
}

fn version_parts(tag: &str) -> Option<Vec<u64>> {
    let core = tag.trim().trim_start_matches(['v', 'V']);
    let core = core.split(['-', '+']).next()?;
    core.split('.').map(|p| p.parse().ok()).collect()
}

/// Whether release `tag` is newer than `current`. Non-numeric tags fall
/// back to a plain string comparison.
pub fn is_newer(tag: &str, current: &str) -> bool {
    match (version_parts(tag), version_parts(current)) {
        (Some(mut a), Some(mut b)) => {
            let len = a.len().max(b.len());
            a.resize(len, 0);
            b.resize(len, 0);
            a > b
        }
        _ => tag > current,
    }
}

fn update_url(release: Release, current: &str) -> Option<String> {
    (!release.prerelease && is_newer(&release.tag_name, current)).then_some(release.html_url)
}

/// Download page of a newer stable release, if there is one.
pub async fn check_for_update(current: &str) -> Result<Option<String>> {
    let client = reqwest::Client::builder()
        .user_agent(format!("commanders-watch/{current}"))
        .timeout(Duration::from_secs(10))
        .build()
        .context("build http client")?;
    let release: Release = client
        .get(LATEST_RELEASE_URL)
        .send()
        .await
        .context("fetch latest release")?
        .error_for_status()
        .context("latest release request")?
        .json()
        .await
        .context("decode latest release")?;
    Ok(update_url(release, current))
}
