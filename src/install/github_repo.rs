//! GitHubRepo resource: a cloned repository kept on a tracked branch.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::LazyLock;

use convergent::{FieldKind, FieldSchema, ReadResponse, Resource, ResourceSchema};

use crate::install::hooks::{CommandOptions, InstallHooks};
use crate::paths;

/// Commit hash of the checked-out worktree.
const VERSION_COMMAND: &str = "git log -1 --pretty=format:%H";
const FETCH_COMMAND: &str = "git fetch --all";
const DEFAULT_BRANCH: &str = "main";

static SCHEMA: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::new("workbench:install:GitHubRepo", "Clone a GitHub repository")
        .input(
            FieldSchema::required("org", FieldKind::String)
                .replaces()
                .doc("The GitHub organization the repo belongs to."),
        )
        .input(
            FieldSchema::required("repo", FieldKind::String)
                .replaces()
                .doc("The GitHub repository name."),
        )
        .input(
            FieldSchema::optional("branch", FieldKind::String)
                .default_value(serde_json::Value::String(DEFAULT_BRANCH.to_string()))
                .doc("The branch to track. Defaults to main."),
        )
        .input(
            FieldSchema::optional("folderName", FieldKind::String)
                .default_of("repo")
                .doc("The folder under $HOME to clone into. Defaults to the repo name."),
        )
        .input(
            FieldSchema::optional("installCommands", FieldKind::StringList)
                .joined(" && ")
                .doc("Commands run inside the clone after checkout."),
        )
        .input(FieldSchema::optional("updateCommands", FieldKind::StringList).joined(" && "))
        .input(FieldSchema::optional("uninstallCommands", FieldKind::StringList).joined(" && "))
        .input(FieldSchema::optional("interpreter", FieldKind::StringList))
        .input(FieldSchema::optional("environment", FieldKind::StringMap))
        .output(FieldSchema::optional("absFolderName", FieldKind::String))
        .output(FieldSchema::optional("version", FieldKind::String))
});

/// Arguments for a [`GitHubRepo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitHubRepoArgs {
    /// GitHub organization.
    pub org: String,
    /// Repository name.
    pub repo: String,
    /// Branch to track.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Folder under `$HOME` to clone into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_name: Option<String>,
    /// Commands run inside the clone after checkout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_commands: Option<Vec<String>>,
    /// Update/uninstall hooks.
    #[serde(flatten)]
    pub hooks: InstallHooks,
    /// Interpreter and environment overrides.
    #[serde(flatten)]
    pub command: CommandOptions,
}

impl GitHubRepoArgs {
    fn branch(&self) -> &str {
        self.branch.as_deref().unwrap_or(DEFAULT_BRANCH)
    }

    fn folder(&self) -> &str {
        self.folder_name.as_deref().unwrap_or(&self.repo)
    }

    /// Absolute clone location under the home directory.
    fn location(&self) -> Result<PathBuf> {
        Ok(paths::home_dir()?.join(self.folder()))
    }

    fn clone_command(&self) -> String {
        format!(
            "git clone -b {} https://github.com/{}/{} {}",
            self.branch(),
            self.org,
            self.repo,
            self.folder()
        )
    }
}

/// Recorded state of a [`GitHubRepo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitHubRepoState {
    /// The arguments the clone was made from.
    #[serde(flatten)]
    pub args: GitHubRepoArgs,
    /// Absolute path of the clone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abs_folder_name: Option<String>,
    /// Commit hash actually checked out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Manages a clone of a GitHub repository.
#[derive(Debug, Default)]
pub struct GitHubRepo;

impl GitHubRepo {
    fn run_install_commands(args: &GitHubRepoArgs, abs: &std::path::Path) -> Result<()> {
        if let Some(commands) = &args.install_commands
            && !commands.is_empty()
        {
            args.command.runner().run(&commands.join(" && "), abs)?;
        }
        Ok(())
    }
}

impl Resource for GitHubRepo {
    type Args = GitHubRepoArgs;
    type State = GitHubRepoState;

    fn schema(&self) -> &ResourceSchema {
        &SCHEMA
    }

    fn create(
        &self,
        name: &str,
        args: GitHubRepoArgs,
        preview: bool,
    ) -> Result<(String, GitHubRepoState)> {
        let abs = args.location()?;
        let abs_string = abs.to_string_lossy().into_owned();

        if preview {
            // The clone location is a pure function of the inputs; the
            // commit hash is only known once the clone exists.
            return Ok((
                name.to_string(),
                GitHubRepoState {
                    args,
                    abs_folder_name: Some(abs_string),
                    version: None,
                },
            ));
        }

        let runner = args.command.runner();
        let parent = paths::home_dir()?;
        runner
            .run(&args.clone_command(), &parent)
            .with_context(|| format!("cloning {}/{}", args.org, args.repo))?;

        Self::run_install_commands(&args, &abs)?;

        let version = runner.run(VERSION_COMMAND, &abs)?;
        Ok((
            name.to_string(),
            GitHubRepoState {
                args,
                abs_folder_name: Some(abs_string),
                version: Some(version),
            },
        ))
    }

    fn update(
        &self,
        _id: &str,
        old_state: GitHubRepoState,
        new_args: GitHubRepoArgs,
        preview: bool,
    ) -> Result<GitHubRepoState> {
        let abs = new_args.location()?;
        let abs_string = abs.to_string_lossy().into_owned();

        if preview {
            return Ok(GitHubRepoState {
                args: new_args,
                abs_folder_name: Some(abs_string),
                version: old_state.version,
            });
        }

        let runner = new_args.command.runner();
        let moved = old_state
            .abs_folder_name
            .as_deref()
            .is_some_and(|old| old != abs_string);

        if moved {
            // The clone location changed: the old clone goes away first.
            if let Some(old_abs) = &old_state.abs_folder_name {
                match fs::remove_dir_all(paths::expand(old_abs)) {
                    Ok(()) => {}
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(err) => {
                        return Err(err)
                            .with_context(|| format!("removing old clone {old_abs}"));
                    }
                }
            }
            runner
                .run(&new_args.clone_command(), &paths::home_dir()?)
                .with_context(|| format!("cloning {}/{}", new_args.org, new_args.repo))?;
            Self::run_install_commands(&new_args, &abs)?;
        } else {
            runner.run(FETCH_COMMAND, &abs)?;
            if new_args.branch() != old_state.args.branch() {
                runner.run(&format!("git checkout {}", new_args.branch()), &abs)?;
            } else {
                runner.run("git pull", &abs)?;
            }
            if let Some(commands) = &new_args.hooks.update_commands
                && !commands.is_empty()
            {
                runner.run(&commands.join(" && "), &abs)?;
            }
        }

        let version = runner.run(VERSION_COMMAND, &abs)?;
        Ok(GitHubRepoState {
            args: new_args,
            abs_folder_name: Some(abs_string),
            version: Some(version),
        })
    }

    fn delete(&self, _id: &str, state: GitHubRepoState) -> Result<()> {
        let abs = match &state.abs_folder_name {
            Some(abs) => paths::expand(abs),
            None => state.args.location()?,
        };

        if abs.is_dir() {
            crate::install::shell::run_uninstall(&state.args.hooks, &state.args.command.runner());
        }

        match fs::remove_dir_all(&abs) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("removing clone {}", abs.display())),
        }
    }

    /// Re-derive the commit at the tip of the tracked remote branch.
    fn read(
        &self,
        id: &str,
        inputs: GitHubRepoArgs,
        mut state: GitHubRepoState,
    ) -> Result<ReadResponse<GitHubRepoArgs, GitHubRepoState>> {
        let Some(abs_string) = state.abs_folder_name.clone() else {
            return Ok(ReadResponse {
                id: id.to_string(),
                inputs,
                state,
            });
        };
        let abs = paths::expand(&abs_string);
        if !abs.is_dir() {
            return Ok(ReadResponse {
                id: id.to_string(),
                inputs,
                state,
            });
        }

        let runner = inputs.command.runner();
        if runner.run(FETCH_COMMAND, &abs).is_ok() {
            let branch = state.args.branch().to_string();
            let version = runner.run(&format!("git rev-parse origin/{branch}"), &abs)?;
            state.version = Some(version);
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

    fn sample_args() -> GitHubRepoArgs {
        GitHubRepoArgs {
            org: "neovim".to_string(),
            repo: "neovim".to_string(),
            branch: Some("main".to_string()),
            folder_name: Some("neovim".to_string()),
            install_commands: None,
            hooks: InstallHooks::default(),
            command: CommandOptions::default(),
        }
    }

    fn props(value: serde_json::Value) -> PropertyMap {
        match value {
            serde_json::Value::Object(m) => m,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_clone_command_shape() {
        let args = sample_args();
        assert_eq!(
            args.clone_command(),
            "git clone -b main https://github.com/neovim/neovim neovim"
        );
    }

    #[test]
    fn test_folder_defaults_to_repo() {
        let mut args = sample_args();
        args.folder_name = None;
        assert_eq!(args.folder(), "neovim");
        assert!(args.location().unwrap().ends_with("neovim"));
    }

    #[test]
    fn test_preview_create_resolves_location_but_not_version() {
        let (_, state) = GitHubRepo.create("nvim", sample_args(), true).unwrap();
        assert!(state.abs_folder_name.is_some());
        assert!(state.version.is_none());
    }

    #[test]
    fn test_check_fills_branch_and_folder() {
        let news = props(json!({"org": "neovim", "repo": "neovim"}));
        let response =
            Resource::check(&GitHubRepo, "nvim", &PropertyMap::new(), news).unwrap();
        assert!(response.is_ok());
        assert_eq!(response.inputs["branch"], json!("main"));
        assert_eq!(response.inputs["folderName"], json!("neovim"));
    }

    #[test]
    fn test_diff_org_and_repo_force_replace() {
        let olds = props(json!({"org": "neovim", "repo": "neovim", "branch": "main"}));
        let news = props(json!({"org": "helix-editor", "repo": "helix", "branch": "main"}));
        let response = Resource::diff(&GitHubRepo, "nvim", &olds, &news).unwrap();
        assert_eq!(response.detailed["org"].kind, DiffKind::UpdateReplace);
        assert_eq!(response.detailed["repo"].kind, DiffKind::UpdateReplace);
        assert!(response.delete_before_replace);
    }

    #[test]
    fn test_diff_branch_switch_updates_in_place() {
        let olds = props(json!({"org": "neovim", "repo": "neovim", "branch": "main"}));
        let news = props(json!({"org": "neovim", "repo": "neovim", "branch": "release-0.10"}));
        let response = Resource::diff(&GitHubRepo, "nvim", &olds, &news).unwrap();
        assert_eq!(response.detailed["branch"].kind, DiffKind::Update);
        assert!(!response.requires_replace());
    }

    #[test]
    fn test_delete_removes_clone_directory() {
        let dir = tempfile::tempdir().unwrap();
        let clone = dir.path().join("neovim");
        fs::create_dir_all(clone.join(".git")).unwrap();

        let state = GitHubRepoState {
            args: sample_args(),
            abs_folder_name: Some(clone.to_string_lossy().into_owned()),
            version: Some("abc123".to_string()),
        };
        GitHubRepo.delete("nvim", state).unwrap();
        assert!(!clone.exists());
    }

    #[test]
    fn test_delete_missing_clone_is_success() {
        let state = GitHubRepoState {
            args: sample_args(),
            abs_folder_name: Some("/tmp/not-a-real-clone-workbench".to_string()),
            version: None,
        };
        assert!(GitHubRepo.delete("nvim", state).is_ok());
    }

    #[test]
    fn test_read_tolerates_missing_state() {
        let state = GitHubRepoState {
            args: sample_args(),
            abs_folder_name: None,
            version: None,
        };
        let response = GitHubRepo.read("nvim", sample_args(), state).unwrap();
        assert!(response.state.version.is_none());
    }
}
