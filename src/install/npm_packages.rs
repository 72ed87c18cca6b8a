//! Npm resource: a set of npm packages installed into a local project.
//!
//! The packages are installed into a throwaway node project at the given
//! location rather than globally; the recorded state maps each package to
//! the version that actually landed in `node_modules`.

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::LazyLock;

use convergent::property::{self, PropertyMap};
use convergent::{
    DiffKind, DiffResponse, FieldKind, FieldSchema, Resource, ResourceSchema, schema_diff,
};

use crate::npm::NpmCli;
use crate::paths;

static SCHEMA: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::new(
        "workbench:install:Npm",
        "Install npm packages into a local node project",
    )
    .input(
        FieldSchema::required("location", FieldKind::String)
            .replaces()
            .doc("The directory holding the local node project."),
    )
    .input(
        FieldSchema::required("packages", FieldKind::StringList)
            .unordered()
            .doc("The npm packages to install."),
    )
    .output(FieldSchema::optional("deps", FieldKind::StringMap))
});

/// Arguments for an [`Npm`] package set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpmArgs {
    /// Directory holding the local node project.
    pub location: String,
    /// Packages to install.
    pub packages: Vec<String>,
}

/// Recorded state of an [`Npm`] package set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpmState {
    /// The arguments the packages were installed from.
    #[serde(flatten)]
    pub args: NpmArgs,
    /// Installed package versions, read back from `npm ls`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deps: Option<BTreeMap<String, String>>,
}

/// Write the minimal manifest the local project needs before installs.
fn write_manifest(location: &Path) -> Result<()> {
    let manifest = serde_json::json!({
        "name": "workbench-packages",
        "version": "0.0.0",
        "main": "lib/index.js",
        "license": "MIT",
        "scripts": {},
        "dependencies": {},
    });
    let content = serde_json::to_string_pretty(&manifest)?;
    fs::write(location.join("package.json"), content)
        .with_context(|| format!("writing package.json under {}", location.display()))
}

/// Manages a set of npm packages in a local node project.
#[derive(Debug, Default)]
pub struct Npm {
    cli: NpmCli,
}

impl Npm {
    /// A package-set resource using the npm CLI.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install every package and read back what actually landed.
    fn install_all(
        &self,
        args: &NpmArgs,
        pinned: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>> {
        let location = paths::expand(&args.location);
        let mut deps = BTreeMap::new();
        for package in &args.packages {
            let requested = pinned
                .get(package)
                .map_or("latest", String::as_str);
            self.cli.install(package, requested, &location)?;
            let installed = self
                .cli
                .installed_version(package, &location)?
                .unwrap_or_else(|| "latest".to_string());
            deps.insert(package.clone(), installed);
        }
        Ok(deps)
    }
}

impl Resource for Npm {
    type Args = NpmArgs;
    type State = NpmState;

    fn schema(&self) -> &ResourceSchema {
        &SCHEMA
    }

    /// Schema comparison plus registry drift: a recorded dependency whose
    /// registry version moved on is a change, reported against the
    /// computed `deps` field rather than any input.
    fn diff(&self, id: &str, old_state: &PropertyMap, new_inputs: &PropertyMap) -> Result<DiffResponse> {
        let _ = id;
        let mut response = schema_diff(self.schema(), old_state, new_inputs);

        if let (Some(deps), Some(location)) = (
            property::get_string_map(old_state, "deps"),
            property::get_string(old_state, "location"),
        ) {
            let dir = paths::expand(location);
            for (package, recorded) in &deps {
                let current = self.cli.registry_version(package, &dir)?;
                if &current != recorded {
                    log::debug!("{package}: recorded {recorded}, registry has {current}");
                    response.record_drift("deps", DiffKind::Update);
                    break;
                }
            }
        }

        Ok(response)
    }

    fn create(&self, name: &str, args: NpmArgs, preview: bool) -> Result<(String, NpmState)> {
        if preview {
            return Ok((name.to_string(), NpmState { args, deps: None }));
        }

        let location = paths::expand(&args.location);
        ensure!(
            location.is_dir(),
            "location {} does not exist",
            location.display()
        );

        write_manifest(&location)?;
        let deps = self.install_all(&args, &BTreeMap::new())?;
        Ok((
            name.to_string(),
            NpmState {
                args,
                deps: Some(deps),
            },
        ))
    }

    fn update(
        &self,
        _id: &str,
        old_state: NpmState,
        new_args: NpmArgs,
        preview: bool,
    ) -> Result<NpmState> {
        if preview {
            return Ok(NpmState {
                args: new_args,
                deps: old_state.deps,
            });
        }

        // Updates move every package to the registry's latest.
        let deps = self.install_all(&new_args, &BTreeMap::new())?;
        Ok(NpmState {
            args: new_args,
            deps: Some(deps),
        })
    }

    fn delete(&self, _id: &str, state: NpmState) -> Result<()> {
        let location = paths::expand(&state.args.location);

        match fs::remove_file(location.join("package.json")) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err).context("removing package.json"),
        }
        match fs::remove_dir_all(location.join("node_modules")) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err).context("removing node_modules"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: serde_json::Value) -> PropertyMap {
        match value {
            serde_json::Value::Object(m) => m,
            _ => panic!("expected an object"),
        }
    }

    fn args(location: &Path) -> NpmArgs {
        NpmArgs {
            location: location.to_string_lossy().into_owned(),
            packages: vec!["typescript".to_string()],
        }
    }

    #[test]
    fn test_write_manifest_produces_valid_json() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path()).unwrap();
        let content = fs::read_to_string(dir.path().join("package.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["name"], json!("workbench-packages"));
        assert_eq!(parsed["dependencies"], json!({}));
    }

    #[test]
    fn test_preview_create_installs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (id, state) = Npm::new()
            .create("pkgs", args(dir.path()), true)
            .unwrap();
        assert_eq!(id, "pkgs");
        assert!(state.deps.is_none());
        assert!(!dir.path().join("package.json").exists());
    }

    #[test]
    fn test_create_requires_existing_location() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = Npm::new()
            .create("pkgs", args(&missing), false)
            .unwrap_err();
        assert!(format!("{err}").contains("does not exist"));
    }

    #[test]
    fn test_delete_removes_project_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();
        fs::create_dir_all(dir.path().join("node_modules/typescript")).unwrap();

        let state = NpmState {
            args: args(dir.path()),
            deps: Some(BTreeMap::new()),
        };
        Npm::new().delete("pkgs", state).unwrap();
        assert!(!dir.path().join("package.json").exists());
        assert!(!dir.path().join("node_modules").exists());
    }

    #[test]
    fn test_delete_already_clean_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let state = NpmState {
            args: args(dir.path()),
            deps: None,
        };
        assert!(Npm::new().delete("pkgs", state).is_ok());
    }

    #[test]
    fn test_diff_location_forces_replace() {
        let olds = props(json!({"location": "/srv/npm", "packages": ["typescript"]}));
        let news = props(json!({"location": "/srv/other", "packages": ["typescript"]}));
        let response = Resource::diff(&Npm::new(), "pkgs", &olds, &news).unwrap();
        assert_eq!(response.detailed["location"].kind, DiffKind::UpdateReplace);
    }

    #[test]
    fn test_diff_package_membership_updates_in_place() {
        let olds = props(json!({"location": "/srv/npm", "packages": ["typescript"]}));
        let news = props(json!({"location": "/srv/npm", "packages": ["typescript", "prettier"]}));
        let response = Resource::diff(&Npm::new(), "pkgs", &olds, &news).unwrap();
        assert_eq!(response.detailed["packages"].kind, DiffKind::Update);
        assert!(!response.requires_replace());
    }

    #[test]
    fn test_diff_package_reorder_is_no_change() {
        let olds = props(json!({"location": "/srv/npm", "packages": ["a", "b"]}));
        let news = props(json!({"location": "/srv/npm", "packages": ["b", "a"]}));
        let response = Resource::diff(&Npm::new(), "pkgs", &olds, &news).unwrap();
        assert!(!response.has_changes);
    }

    #[test]
    fn test_check_requires_location_and_packages() {
        let response =
            Resource::check(&Npm::new(), "pkgs", &PropertyMap::new(), PropertyMap::new()).unwrap();
        let properties: Vec<_> = response
            .failures
            .iter()
            .map(|f| f.property.as_str())
            .collect();
        assert_eq!(properties, vec!["location", "packages"]);
    }
}
