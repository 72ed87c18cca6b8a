//! File resource: a file with declared line content.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::LazyLock;

use convergent::property::{self, PropertyMap};
use convergent::{
    DiffKind, DiffResponse, FieldKind, FieldSchema, Resource, ResourceSchema, schema_diff,
};

use crate::paths;

static SCHEMA: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::new("workbench:local:File", "A file projected into a resource")
        .input(
            FieldSchema::optional("path", FieldKind::String)
                .replaces()
                .default_name()
                .doc("The path of the file. Defaults to the name of the resource."),
        )
        .input(
            FieldSchema::required("content", FieldKind::StringList)
                .joined("\n")
                .doc("The content of the file, one entry per line."),
        )
        .input(
            FieldSchema::optional("force", FieldKind::Bool)
                .default_value(serde_json::Value::Bool(false))
                .doc("Overwrite the file if it already exists."),
        )
});

/// Arguments for a [`File`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileArgs {
    /// Where the file lives.
    pub path: String,
    /// File content, joined with newlines on write.
    pub content: Vec<String>,
    /// Overwrite an existing file.
    #[serde(default)]
    pub force: bool,
}

impl FileArgs {
    fn content_string(&self) -> String {
        self.content.join("\n")
    }
}

/// Recorded state of a [`File`]; mirrors the arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileState {
    /// Where the file lives.
    pub path: String,
    /// Recorded content lines.
    pub content: Vec<String>,
    /// Overwrite flag the file was written with.
    #[serde(default)]
    pub force: bool,
}

impl From<FileArgs> for FileState {
    fn from(args: FileArgs) -> Self {
        Self {
            path: args.path,
            content: args.content,
            force: args.force,
        }
    }
}

/// Manages a file whose content is declared line by line.
#[derive(Debug, Default)]
pub struct File;

impl File {
    fn write(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }
}

impl Resource for File {
    type Args = FileArgs;
    type State = FileState;

    fn schema(&self) -> &ResourceSchema {
        &SCHEMA
    }

    /// Schema comparison plus an on-disk probe: content that drifted away
    /// from the recorded lines (or a file that went missing entirely)
    /// counts as a change even when the declared inputs did not move.
    fn diff(&self, id: &str, old_state: &PropertyMap, new_inputs: &PropertyMap) -> Result<DiffResponse> {
        let _ = id;
        let mut response = schema_diff(self.schema(), old_state, new_inputs);

        if let Some(old_path) = property::get_string(old_state, "path") {
            let desired = property::joined(new_inputs, "content", "\n");
            let on_disk = fs::read_to_string(paths::expand(old_path)).ok();
            if on_disk.as_deref() != Some(desired.as_str())
                && !response.detailed.contains_key("content")
            {
                response.record_drift("content", DiffKind::Update);
            }
        }

        Ok(response)
    }

    fn create(&self, name: &str, args: FileArgs, preview: bool) -> Result<(String, FileState)> {
        let path = paths::expand(&args.path);
        if !args.force && path.exists() {
            bail!(
                "file {} already exists; pass force=true to overwrite",
                path.display()
            );
        }

        let state = FileState::from(args.clone());
        if preview {
            return Ok((name.to_string(), state));
        }

        Self::write(&path, &args.content_string())?;
        Ok((name.to_string(), state))
    }

    fn update(
        &self,
        _id: &str,
        _old_state: FileState,
        new_args: FileArgs,
        preview: bool,
    ) -> Result<FileState> {
        let state = FileState::from(new_args.clone());
        if preview {
            return Ok(state);
        }

        Self::write(&paths::expand(&new_args.path), &new_args.content_string())?;
        Ok(state)
    }

    fn delete(&self, _id: &str, state: FileState) -> Result<()> {
        match fs::remove_file(paths::expand(&state.path)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log::warn!("file {} already deleted", state.path);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
