//! npm CLI wrapper.
//!
//! Installs packages into a local project directory and reads versions
//! back: the installed version from `npm ls` (the package may not be on
//! the PATH yet, so asking the binary itself is not an option) and the
//! registry's current version from `npm view`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::cmd::CommandRunner;

/// Shape of `npm ls --depth 0 --json` output.
#[derive(Debug, Deserialize)]
struct LsOutput {
    #[serde(default)]
    dependencies: BTreeMap<String, LsDependency>,
}

#[derive(Debug, Deserialize)]
struct LsDependency {
    version: Option<String>,
}

/// Blocking npm CLI wrapper bound to a command runner.
#[derive(Debug, Clone, Default)]
pub struct NpmCli {
    runner: CommandRunner,
}

impl NpmCli {
    /// A wrapper using the default command runner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `package@version` into the project at `dir`.
    pub fn install(&self, package: &str, version: &str, dir: &Path) -> Result<()> {
        self.runner
            .run(&format!("npm install {package}@{version}"), dir)
            .with_context(|| format!("installing npm package {package}"))?;
        Ok(())
    }

    /// The version of `package` installed in the project at `dir`.
    pub fn installed_version(&self, package: &str, dir: &Path) -> Result<Option<String>> {
        let output = self
            .runner
            .run("npm ls --depth 0 --json", dir)
            .context("listing installed npm packages")?;
        let parsed: LsOutput =
            serde_json::from_str(&output).context("decoding npm ls output")?;
        Ok(parsed
            .dependencies
            .get(package)
            .and_then(|dep| dep.version.clone()))
    }

    /// The registry's current version of `package`.
    pub fn registry_version(&self, package: &str, dir: &Path) -> Result<String> {
        let output = self
            .runner
            .run(&format!("npm view {package} version"), dir)
            .with_context(|| format!("querying registry version of {package}"))?;
        Ok(output.trim().to_string())
    }
}
