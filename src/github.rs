//! GitHub releases API client.
//!
//! A thin blocking client for the two release queries the provider needs:
//! a release by tag and the latest release. A `GITHUB_TOKEN` found in the
//! process environment is attached as bearer auth to raise the API rate
//! limit; without one the client simply runs unauthenticated.

use anyhow::{Context, Result};
use serde::Deserialize;

/// GitHub API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Environment variable consulted for an access token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

const USER_AGENT: &str = "workbench-provider";

/// A GitHub release with its downloadable assets.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    /// Release tag, e.g. `v3.81.0`.
    pub tag_name: String,
    /// Whether the release is marked as a prerelease.
    #[serde(default)]
    pub prerelease: bool,
    /// Downloadable assets.
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// Find an asset by exact name.
    #[must_use]
    pub fn asset_named(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name == name)
    }
}

/// A single release asset.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    /// Asset file name.
    pub name: String,
    /// Direct download URL.
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
    /// Asset size in bytes.
    #[serde(default)]
    pub size: u64,
}

/// Blocking GitHub API client.
pub struct GithubClient {
    agent: ureq::Agent,
    api_base: String,
    token: Option<String>,
}

impl GithubClient {
    /// A client against the public API, authenticated when `GITHUB_TOKEN`
    /// is set.
    #[must_use]
    pub fn new() -> Self {
        Self::with_api_base(DEFAULT_API_BASE)
    }

    /// A client with a custom API base (for testing).
    #[must_use]
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            api_base: api_base.into(),
            token: std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()),
        }
    }

    /// The API base URL in use.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Fetch a release by tag.
    pub fn release_by_tag(&self, org: &str, repo: &str, tag: &str) -> Result<Release> {
        self.get_json(&format!(
            "{}/repos/{org}/{repo}/releases/tags/{tag}",
            self.api_base
        ))
    }

    /// Fetch the latest non-prerelease release.
    pub fn latest_release(&self, org: &str, repo: &str) -> Result<Release> {
        self.get_json(&format!(
            "{}/repos/{org}/{repo}/releases/latest",
            self.api_base
        ))
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut request = self
            .agent
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        request
            .call()
            .with_context(|| format!("GET {url}"))?
            .body_mut()
            .read_json()
            .with_context(|| format!("decoding response from {url}"))
    }
}

impl Default for GithubClient {
    fn default() -> Self {
        Self::new()
    }
}
