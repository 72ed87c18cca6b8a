//! Path expansion for user-supplied locations.
//!
//! Resource arguments routinely carry paths like `~/.local/bin` or
//! `$HOME/dotfiles`; everything that touches the filesystem goes through
//! [`expand`] so both spellings work.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Expand `~` and environment variables in a path string.
///
/// Unknown environment variables are left verbatim rather than failing;
/// the subsequent filesystem operation reports the real problem.
#[must_use]
pub fn expand(input: &str) -> PathBuf {
    match shellexpand::full(input) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(input).as_ref()),
    }
}

/// The current user's home directory.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine the home directory")
}
