//! # Workbench
//!
//! A declarative provider for developer-machine setup: clone repositories,
//! install release binaries, write files, manage symlinks, and install npm
//! packages, all reconciled through the [`convergent`] lifecycle framework
//! (check, diff, create, update, delete, read).
//!
//! The resource kinds live in two groups:
//!
//! - [`local`]: plain filesystem state ([`local::File`], [`local::Symlink`])
//! - [`install`]: program installation ([`install::GitHubRepo`],
//!   [`install::GitHubRelease`], [`install::Shell`], [`install::Npm`])
//!
//! [`provider::Provider`] wires every kind into a registry; an engine
//! transport dispatches into it by resource token.

pub mod cmd;
pub mod github;
pub mod install;
pub mod local;
pub mod npm;
pub mod paths;
pub mod platform;
pub mod provider;

pub use provider::Provider;
