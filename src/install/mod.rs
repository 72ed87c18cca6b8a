//! Resources that install programs onto the machine.

pub mod github_release;
pub mod github_repo;
pub mod hooks;
pub mod npm_packages;
pub mod shell;

pub use github_release::{GitHubRelease, GitHubReleaseArgs, GitHubReleaseState};
pub use github_repo::{GitHubRepo, GitHubRepoArgs, GitHubRepoState};
pub use hooks::{CommandOptions, InstallHooks};
pub use npm_packages::{Npm, NpmArgs, NpmState};
pub use shell::{Shell, ShellArgs, ShellState};
