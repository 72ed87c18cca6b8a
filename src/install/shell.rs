//! Shell resource: download a program and install it with shell commands.
//!
//! The install pipeline here is shared with the GitHub release kind: fetch
//! the download URL into a scratch directory, run the configured commands
//! there, then optionally promote the produced binary into the bin
//! location and mark it executable.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use convergent::{FieldKind, FieldSchema, ReadResponse, Resource, ResourceSchema};

use crate::cmd::CommandRunner;
use crate::install::hooks::{CommandOptions, InstallHooks};
use crate::paths;

/// Version recorded when no version command is configured.
const DEFAULT_VERSION: &str = "0.0.0";

static SCHEMA: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::new(
        "workbench:install:Shell",
        "Install a program by downloading it and running shell commands",
    )
    .input(
        FieldSchema::required("installCommands", FieldKind::StringList)
            .joined(" && ")
            .doc("The commands to run to install the program."),
    )
    .input(
        FieldSchema::required("programName", FieldKind::String)
            .replaces()
            .doc("The name of the program being installed."),
    )
    .input(
        FieldSchema::required("downloadURL", FieldKind::String)
            .replaces()
            .doc("The URL to download before running the install commands."),
    )
    .input(
        FieldSchema::optional("interpreter", FieldKind::StringList)
            .doc("The interpreter to run the commands with. Defaults to ['/bin/sh', '-c']."),
    )
    .input(
        FieldSchema::optional("environment", FieldKind::StringMap)
            .doc("Environment variables set when running the commands."),
    )
    .input(
        FieldSchema::optional("versionCommand", FieldKind::String)
            .doc("A command printing the installed version."),
    )
    .input(
        FieldSchema::optional("binLocation", FieldKind::String)
            .replaces()
            .default_home(".local/bin")
            .doc("Where the program is placed. Defaults to $HOME/.local/bin."),
    )
    .input(
        FieldSchema::optional("executable", FieldKind::Bool)
            .replaces()
            .doc("Move the downloaded program into the bin location and mark it executable."),
    )
    .input(FieldSchema::optional("updateCommands", FieldKind::StringList).joined(" && "))
    .input(FieldSchema::optional("uninstallCommands", FieldKind::StringList).joined(" && "))
    .output(FieldSchema::optional("location", FieldKind::String))
    .output(FieldSchema::optional("version", FieldKind::String))
});

/// Arguments for a [`Shell`] install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellArgs {
    /// Commands that perform the installation.
    pub install_commands: Vec<String>,
    /// Name of the installed program.
    pub program_name: String,
    /// What to download before running the commands.
    #[serde(rename = "downloadURL")]
    pub download_url: String,
    /// Update/uninstall hooks.
    #[serde(flatten)]
    pub hooks: InstallHooks,
    /// Interpreter and environment overrides.
    #[serde(flatten)]
    pub command: CommandOptions,
    /// Command printing the installed version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_command: Option<String>,
    /// Where the program lands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_location: Option<String>,
    /// Whether to promote the program into the bin location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<bool>,
}

/// Recorded state of a [`Shell`] install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellState {
    /// The arguments the program was installed from.
    #[serde(flatten)]
    pub args: ShellArgs,
    /// Where the program was installed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// The version that was installed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// One run of the shared install pipeline.
pub(crate) struct InstallRequest<'a> {
    pub runner: &'a CommandRunner,
    pub download_url: &'a str,
    pub commands: &'a [String],
    pub program_name: &'a str,
    pub bin_location: Option<&'a str>,
    pub executable: bool,
    pub version_command: Option<&'a str>,
}

/// What the pipeline actually did.
pub(crate) struct InstallOutcome {
    pub location: Option<String>,
    pub version: Option<String>,
    pub work_dir: PathBuf,
}

/// Download, run the commands, promote the binary, read the version back.
/// Ordering matters: computed fields come from the completed actions.
pub(crate) fn run_install(request: &InstallRequest<'_>) -> Result<InstallOutcome> {
    let work_dir = std::env::temp_dir();

    request
        .runner
        .run(&format!("curl -OL {}", request.download_url), &work_dir)
        .with_context(|| format!("downloading {}", request.download_url))?;

    if !request.commands.is_empty() {
        request.runner.run(&request.commands.join(" && "), &work_dir)?;
    }

    let location = if request.executable {
        let bin_location = request
            .bin_location
            .context("binLocation is required to install an executable")?;
        Some(promote_executable(
            &work_dir,
            request.program_name,
            bin_location,
        )?)
    } else {
        None
    };

    let version = match request.version_command {
        Some(command) => Some(request.runner.run(command, &work_dir)?),
        None => None,
    };

    Ok(InstallOutcome {
        location,
        version,
        work_dir,
    })
}

/// Move the staged program into the bin location and mark it executable.
pub(crate) fn promote_executable(
    work_dir: &Path,
    program_name: &str,
    bin_location: &str,
) -> Result<String> {
    let bin = paths::expand(bin_location);
    fs::create_dir_all(&bin)
        .with_context(|| format!("creating bin directory {}", bin.display()))?;

    let staged = work_dir.join(program_name);
    let dest = bin.join(program_name);
    fs::copy(&staged, &dest).with_context(|| {
        format!(
            "moving {} to {}",
            staged.display(),
            dest.display()
        )
    })?;
    let _ = fs::remove_file(&staged);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&dest, fs::Permissions::from_mode(0o755))
            .with_context(|| format!("marking {} executable", dest.display()))?;
    }

    Ok(dest.to_string_lossy().into_owned())
}

/// Remove an installed file, treating already-gone as success.
pub(crate) fn remove_installed(location: &str) -> Result<()> {
    match fs::remove_file(paths::expand(location)) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("removing {location}")),
    }
}

/// Run uninstall hooks, logging failures instead of blocking teardown.
pub(crate) fn run_uninstall(hooks: &InstallHooks, runner: &CommandRunner) {
    if let Some(commands) = &hooks.uninstall_commands
        && !commands.is_empty()
        && let Err(err) = runner.run(&commands.join(" && "), &std::env::temp_dir())
    {
        log::warn!("uninstall commands failed: {err:#}");
    }
}

/// Installs a program by downloading it and running shell commands.
#[derive(Debug, Default)]
pub struct Shell;

impl Resource for Shell {
    type Args = ShellArgs;
    type State = ShellState;

    fn schema(&self) -> &ResourceSchema {
        &SCHEMA
    }

    fn create(&self, name: &str, args: ShellArgs, preview: bool) -> Result<(String, ShellState)> {
        if preview {
            return Ok((
                name.to_string(),
                ShellState {
                    args,
                    location: None,
                    version: None,
                },
            ));
        }

        let runner = args.command.runner();
        let outcome = run_install(&InstallRequest {
            runner: &runner,
            download_url: &args.download_url,
            commands: &args.install_commands,
            program_name: &args.program_name,
            bin_location: args.bin_location.as_deref(),
            executable: args.executable.unwrap_or(false),
            version_command: args.version_command.as_deref(),
        })?;

        let version = outcome.version.unwrap_or_else(|| DEFAULT_VERSION.to_string());
        Ok((
            name.to_string(),
            ShellState {
                args,
                location: outcome.location,
                version: Some(version),
            },
        ))
    }

    fn update(
        &self,
        _id: &str,
        old_state: ShellState,
        new_args: ShellArgs,
        preview: bool,
    ) -> Result<ShellState> {
        if preview {
            return Ok(ShellState {
                args: new_args,
                location: old_state.location,
                version: old_state.version,
            });
        }

        let runner = new_args.command.runner();
        let commands = new_args.hooks.update_or(&new_args.install_commands).to_vec();
        let outcome = run_install(&InstallRequest {
            runner: &runner,
            download_url: &new_args.download_url,
            commands: &commands,
            program_name: &new_args.program_name,
            bin_location: new_args.bin_location.as_deref(),
            executable: new_args.executable.unwrap_or(false),
            version_command: new_args.version_command.as_deref(),
        })?;

        let version = outcome.version.unwrap_or_else(|| DEFAULT_VERSION.to_string());
        Ok(ShellState {
            location: outcome.location.or(old_state.location),
            version: Some(version),
            args: new_args,
        })
    }

    fn delete(&self, _id: &str, state: ShellState) -> Result<()> {
        run_uninstall(&state.args.hooks, &state.args.command.runner());
        if let Some(location) = &state.location {
            remove_installed(location)?;
        }
        Ok(())
    }

    /// Re-run the version command against the live system for drift.
    fn read(
        &self,
        id: &str,
        inputs: ShellArgs,
        mut state: ShellState,
    ) -> Result<ReadResponse<ShellArgs, ShellState>> {
        if let Some(command) = &inputs.version_command {
            let runner = inputs.command.runner();
            state.version = Some(runner.run(command, &std::env::temp_dir())?);
        }
        Ok(ReadResponse {
            id: id.to_string(),
            inputs,
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convergent::DiffKind;
    use convergent::property::PropertyMap;
    use serde_json::json;

    fn sample_args() -> ShellArgs {
        ShellArgs {
            install_commands: vec!["tar -xzvf tool.tar.gz".to_string()],
            program_name: "tool".to_string(),
            download_url: "https://example.com/tool.tar.gz".to_string(),
            hooks: InstallHooks::default(),
            command: CommandOptions::default(),
            version_command: None,
            bin_location: Some("/tmp/bin".to_string()),
            executable: Some(true),
        }
    }

    fn props(value: serde_json::Value) -> PropertyMap {
        match value {
            serde_json::Value::Object(m) => m,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_preview_create_has_no_computed_state() {
        let (id, state) = Shell.create("tool", sample_args(), true).unwrap();
        assert_eq!(id, "tool");
        assert!(state.location.is_none());
        assert!(state.version.is_none());
    }

    #[test]
    fn test_preview_state_serializes_without_unresolved_fields() {
        let (_, state) = Shell.create("tool", sample_args(), true).unwrap();
        let value = serde_json::to_value(&state).unwrap();
        assert!(value.get("location").is_none());
        assert!(value.get("version").is_none());
        assert_eq!(value["programName"], json!("tool"));
        assert_eq!(value["downloadURL"], json!("https://example.com/tool.tar.gz"));
    }

    #[test]
    fn test_promote_executable_moves_and_marks() {
        let work = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        fs::write(work.path().join("tool"), "#!/bin/sh\n").unwrap();

        let location = promote_executable(
            work.path(),
            "tool",
            &bin.path().to_string_lossy(),
        )
        .unwrap();

        let dest = bin.path().join("tool");
        assert_eq!(location, dest.to_string_lossy());
        assert!(dest.exists());
        assert!(!work.path().join("tool").exists());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&dest).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[test]
    fn test_promote_executable_missing_program_fails() {
        let work = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let err = promote_executable(work.path(), "tool", &bin.path().to_string_lossy())
            .unwrap_err();
        assert!(format!("{err:#}").contains("moving"));
    }

    #[test]
    fn test_remove_installed_missing_is_success() {
        assert!(remove_installed("/tmp/definitely-not-here-workbench").is_ok());
    }

    #[test]
    fn test_delete_removes_location() {
        let bin = tempfile::tempdir().unwrap();
        let installed = bin.path().join("tool");
        fs::write(&installed, "bin").unwrap();

        let state = ShellState {
            args: sample_args(),
            location: Some(installed.to_string_lossy().into_owned()),
            version: Some("1.0.0".to_string()),
        };
        Shell.delete("tool", state).unwrap();
        assert!(!installed.exists());
    }

    #[test]
    fn test_failed_uninstall_hook_does_not_block_delete() {
        let mut args = sample_args();
        args.hooks.uninstall_commands = Some(vec!["exit 9".to_string()]);
        let state = ShellState {
            args,
            location: None,
            version: None,
        };
        assert!(Shell.delete("tool", state).is_ok());
    }

    #[test]
    fn test_diff_program_name_forces_replace() {
        let olds = props(json!({
            "installCommands": ["make install"],
            "programName": "tool",
            "downloadURL": "https://example.com/a",
        }));
        let news = props(json!({
            "installCommands": ["make install"],
            "programName": "other",
            "downloadURL": "https://example.com/a",
        }));
        let response = Resource::diff(&Shell, "tool", &olds, &news).unwrap();
        assert_eq!(response.detailed["programName"].kind, DiffKind::UpdateReplace);
    }

    #[test]
    fn test_diff_install_commands_update_in_place() {
        let olds = props(json!({
            "installCommands": ["make install"],
            "programName": "tool",
            "downloadURL": "https://example.com/a",
        }));
        let news = props(json!({
            "installCommands": ["make", "make install"],
            "programName": "tool",
            "downloadURL": "https://example.com/a",
        }));
        let response = Resource::diff(&Shell, "tool", &olds, &news).unwrap();
        assert_eq!(response.detailed["installCommands"].kind, DiffKind::Update);
        assert!(!response.requires_replace());
    }

    #[test]
    fn test_check_defaults_bin_location_under_home() {
        let news = props(json!({
            "installCommands": ["make install"],
            "programName": "tool",
            "downloadURL": "https://example.com/a",
        }));
        let response = Resource::check(&Shell, "tool", &PropertyMap::new(), news).unwrap();
        assert!(response.is_ok());
        let bin = response.inputs["binLocation"].as_str().unwrap();
        assert!(bin.ends_with(".local/bin"));
    }

    #[test]
    fn test_args_round_trip_through_wire_shape() {
        let args = sample_args();
        let value = serde_json::to_value(&args).unwrap();
        let back: ShellArgs = serde_json::from_value(value).unwrap();
        assert_eq!(args, back);
    }
}
