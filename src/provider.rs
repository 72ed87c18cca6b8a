//! Provider wiring: every resource kind, registered once.

use anyhow::Result;
use convergent::Registry;

use crate::github::GithubClient;
use crate::install::{GitHubRelease, GitHubRepo, Npm, Shell};
use crate::local::{File, Symlink};

/// Provider name; the first segment of every resource token.
pub const NAME: &str = "workbench";

/// Provider version, from the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The workbench provider: a registry of every supported resource kind.
///
/// Built once at process start; the engine-facing transport dispatches
/// into [`Provider::registry`] by resource token.
pub struct Provider {
    registry: Registry,
}

impl Provider {
    /// A provider talking to the public GitHub API.
    pub fn new() -> Result<Self> {
        Self::with_github(GithubClient::new())
    }

    /// A provider with an injected GitHub client (used by tests to point
    /// at a fake API).
    pub fn with_github(github: GithubClient) -> Result<Self> {
        let mut registry = Registry::new();
        registry.register(File)?;
        registry.register(Symlink)?;
        registry.register(GitHubRepo)?;
        registry.register(GitHubRelease::new(github))?;
        registry.register(Shell)?;
        registry.register(Npm::new())?;
        Ok(Self { registry })
    }

    /// The resource registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
