//! Symlink resource: link a source path to one or more targets.
//!
//! A directory source with `recursive` set is not linked as a whole;
//! every child of the directory is linked into the target directory
//! individually, the way a stow-style dotfile layout expects. The state
//! records the links actually created so teardown removes exactly those.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use convergent::{FieldKind, FieldSchema, ReadResponse, Resource, ResourceSchema};

use crate::paths;

static SCHEMA: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::new("workbench:local:Symlink", "Symlink a source path to a target")
        .input(
            FieldSchema::required("source", FieldKind::String)
                .replaces()
                .doc("The path the link points at."),
        )
        .input(
            FieldSchema::required("target", FieldKind::String)
                .replaces()
                .doc("Where the link is created."),
        )
        .input(
            FieldSchema::optional("overwrite", FieldKind::Bool)
                .default_value(serde_json::Value::Bool(false))
                .doc("Replace an existing file or link at the target."),
        )
        .input(
            FieldSchema::optional("retain", FieldKind::Bool)
                .default_value(serde_json::Value::Bool(false))
                .doc("Keep the created links when the resource is deleted."),
        )
        .input(
            FieldSchema::optional("recursive", FieldKind::Bool)
                .replaces()
                .default_value(serde_json::Value::Bool(false))
                .doc("Link each child of a directory source into the target directory."),
        )
        .output(FieldSchema::optional("linked", FieldKind::Bool))
        .output(FieldSchema::optional("isDir", FieldKind::Bool))
        .output(FieldSchema::optional("targets", FieldKind::StringList))
});

/// Arguments for a [`Symlink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymlinkArgs {
    /// The path the link points at.
    pub source: String,
    /// Where the link is created.
    pub target: String,
    /// Replace an existing file or link at the target.
    #[serde(default)]
    pub overwrite: bool,
    /// Keep the created links on delete.
    #[serde(default)]
    pub retain: bool,
    /// Link directory children individually.
    #[serde(default)]
    pub recursive: bool,
}

/// Recorded state of a [`Symlink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymlinkState {
    /// The arguments the links were created from.
    #[serde(flatten)]
    pub args: SymlinkArgs,
    /// Whether the links are in place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked: Option<bool>,
    /// Whether the source is a directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_dir: Option<bool>,
    /// Every link that was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,
}

/// Manages symlinks from a source path into the filesystem.
#[derive(Debug, Default)]
pub struct Symlink;

impl Symlink {
    /// Create one link, tolerating an already-correct one.
    fn link_one(source: &Path, target: &Path, overwrite: bool) -> Result<()> {
        if let Ok(meta) = fs::symlink_metadata(target) {
            if meta.file_type().is_symlink()
                && fs::read_link(target).is_ok_and(|existing| existing == source)
            {
                return Ok(());
            }
            if !overwrite {
                bail!("target {} already exists", target.display());
            }
            if meta.is_dir() && !meta.file_type().is_symlink() {
                bail!(
                    "target {} is a directory; refusing to replace it",
                    target.display()
                );
            }
            fs::remove_file(target)
                .with_context(|| format!("removing existing target {}", target.display()))?;
        }

        if let Some(parent) = target.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating parent directory {}", parent.display()))?;
        }

        #[cfg(unix)]
        std::os::unix::fs::symlink(source, target).with_context(|| {
            format!("linking {} -> {}", target.display(), source.display())
        })?;

        #[cfg(windows)]
        {
            if source.is_dir() {
                std::os::windows::fs::symlink_dir(source, target)
            } else {
                std::os::windows::fs::symlink_file(source, target)
            }
            .with_context(|| format!("linking {} -> {}", target.display(), source.display()))?;
        }

        Ok(())
    }

    /// Converge every link the arguments describe; returns what was linked.
    fn ensure(args: &SymlinkArgs) -> Result<(bool, Vec<String>)> {
        let source = paths::expand(&args.source);
        let target = paths::expand(&args.target);

        let meta = fs::metadata(&source)
            .with_context(|| format!("source {} does not exist", source.display()))?;
        let is_dir = meta.is_dir();

        if is_dir && args.recursive {
            fs::create_dir_all(&target)
                .with_context(|| format!("creating target directory {}", target.display()))?;
            let mut entries: Vec<PathBuf> = fs::read_dir(&source)
                .with_context(|| format!("reading {}", source.display()))?
                .map(|entry| entry.map(|e| e.path()))
                .collect::<std::io::Result<_>>()?;
            entries.sort();

            let mut targets = Vec::with_capacity(entries.len());
            for entry in entries {
                let name = entry
                    .file_name()
                    .with_context(|| format!("unnamed entry under {}", source.display()))?;
                let entry_target = target.join(name);
                Self::link_one(&entry, &entry_target, args.overwrite)?;
                targets.push(entry_target.to_string_lossy().into_owned());
            }
            Ok((true, targets))
        } else {
            Self::link_one(&source, &target, args.overwrite)?;
            Ok((true, vec![target.to_string_lossy().into_owned()]))
        }
    }

    fn remove_link(target: &Path) -> Result<()> {
        match fs::remove_file(target) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            // Directory symlinks on some platforms unlink as directories.
            Err(first) => fs::remove_dir(target).map_err(|_| first.into()),
        }
    }
}

impl Resource for Symlink {
    type Args = SymlinkArgs;
    type State = SymlinkState;

    fn schema(&self) -> &ResourceSchema {
        &SCHEMA
    }

    fn create(&self, name: &str, args: SymlinkArgs, preview: bool) -> Result<(String, SymlinkState)> {
        if preview {
            return Ok((
                name.to_string(),
                SymlinkState {
                    args,
                    linked: None,
                    is_dir: None,
                    targets: None,
                },
            ));
        }

        let source_is_dir = fs::metadata(paths::expand(&args.source))
            .map(|m| m.is_dir())
            .unwrap_or(false);
        let (linked, targets) = Self::ensure(&args)?;
        Ok((
            name.to_string(),
            SymlinkState {
                args,
                linked: Some(linked),
                is_dir: Some(source_is_dir),
                targets: Some(targets),
            },
        ))
    }

    fn update(
        &self,
        _id: &str,
        old_state: SymlinkState,
        new_args: SymlinkArgs,
        preview: bool,
    ) -> Result<SymlinkState> {
        if preview {
            return Ok(SymlinkState {
                args: new_args,
                ..old_state
            });
        }

        let source_is_dir = fs::metadata(paths::expand(&new_args.source))
            .map(|m| m.is_dir())
            .unwrap_or(false);
        let (linked, targets) = Self::ensure(&new_args)?;
        Ok(SymlinkState {
            args: new_args,
            linked: Some(linked),
            is_dir: Some(source_is_dir),
            targets: Some(targets),
        })
    }

    fn delete(&self, _id: &str, state: SymlinkState) -> Result<()> {
        if state.args.retain {
            log::info!("retaining links for {}", state.args.target);
            return Ok(());
        }

        let targets = state
            .targets
            .unwrap_or_else(|| vec![state.args.target.clone()]);
        for target in &targets {
            Self::remove_link(&paths::expand(target))?;
        }
        Ok(())
    }

    /// Reconcile with the filesystem: which recorded links still exist and
    /// still point where they should. Never mutates anything.
    fn read(
        &self,
        id: &str,
        inputs: SymlinkArgs,
        state: SymlinkState,
    ) -> Result<ReadResponse<SymlinkArgs, SymlinkState>> {
        let source = paths::expand(&inputs.source);
        let is_dir = fs::metadata(&source).map(|m| m.is_dir()).ok();

        let recorded = state
            .targets
            .clone()
            .unwrap_or_else(|| vec![inputs.target.clone()]);
        let present: Vec<String> = recorded
            .into_iter()
            .filter(|target| {
                fs::symlink_metadata(paths::expand(target))
                    .map(|m| m.file_type().is_symlink())
                    .unwrap_or(false)
            })
            .collect();

        let linked = !present.is_empty();
        Ok(ReadResponse {
            id: id.to_string(),
            state: SymlinkState {
                args: state.args,
                linked: Some(linked),
                is_dir,
                targets: linked.then_some(present),
            },
            inputs,
        })
    }
}
