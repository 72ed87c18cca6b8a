//! GitHubRelease resource: install a program from a GitHub release asset.
//!
//! The floating parts of the request are resolved exactly once. The first
//! check pins `releaseVersion` (the latest release when none was given)
//! and `assetName` (platform-matched, or the caller's regex); both are
//! carried forward by later checks instead of being re-resolved, so a
//! plan run months later does not silently move to a newer release.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

use convergent::check::{CheckFailure, CheckResponse};
use convergent::property::{self, PropertyMap};
use convergent::{FieldKind, FieldSchema, ReadResponse, Resource, ResourceSchema, default_check};

use crate::github::GithubClient;
use crate::install::hooks::{CommandOptions, InstallHooks};
use crate::install::shell::{InstallRequest, remove_installed, run_install, run_uninstall};
use crate::platform;

static SCHEMA: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::new(
        "workbench:install:GitHubRelease",
        "Install a program from a GitHub release",
    )
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
        FieldSchema::optional("assetName", FieldKind::String)
            .replaces_unless_updatable()
            .pinned()
            .doc("The release asset to install. Resolved against the host platform when absent; supports regex."),
    )
    .input(
        FieldSchema::optional("releaseVersion", FieldKind::String)
            .replaces_unless_updatable()
            .pinned()
            .doc("The release version to install. Resolved to the latest release when absent."),
    )
    .input(
        FieldSchema::optional("executable", FieldKind::String)
            .doc("The executable to promote into the bin location. Defaults to none; the last path component names the binary."),
    )
    .input(
        FieldSchema::optional("binLocation", FieldKind::String)
            .replaces()
            .pinned()
            .default_home(".local/bin")
            .doc("Where programs are placed. Defaults to $HOME/.local/bin."),
    )
    .input(
        FieldSchema::optional("binFolder", FieldKind::String)
            .doc("A folder inside the asset whose files are copied into the bin location."),
    )
    .input(
        FieldSchema::optional("installCommands", FieldKind::StringList)
            .joined(" && ")
            .doc("Commands run against the downloaded asset."),
    )
    .input(FieldSchema::optional("updateCommands", FieldKind::StringList).joined(" && "))
    .input(FieldSchema::optional("uninstallCommands", FieldKind::StringList).joined(" && "))
    .input(FieldSchema::optional("interpreter", FieldKind::StringList))
    .input(FieldSchema::optional("environment", FieldKind::StringMap))
    .output(FieldSchema::optional("downloadURL", FieldKind::String))
    .output(FieldSchema::optional("locations", FieldKind::StringList))
});

/// Arguments for a [`GitHubRelease`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitHubReleaseArgs {
    /// GitHub organization.
    pub org: String,
    /// Repository name.
    pub repo: String,
    /// Pinned release asset name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_name: Option<String>,
    /// Pinned release version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_version: Option<String>,
    /// Executable to promote; the last path component names the binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
    /// Where programs are placed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_location: Option<String>,
    /// Folder inside the asset copied wholesale into the bin location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_folder: Option<String>,
    /// Commands run against the downloaded asset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_commands: Option<Vec<String>>,
    /// Update/uninstall hooks.
    #[serde(flatten)]
    pub hooks: InstallHooks,
    /// Interpreter and environment overrides.
    #[serde(flatten)]
    pub command: CommandOptions,
}

impl GitHubReleaseArgs {
    /// Name of the binary the install produces.
    fn program_name(&self) -> &str {
        match &self.executable {
            Some(executable) => executable.rsplit('/').next().unwrap_or(executable),
            None => &self.repo,
        }
    }
}

/// Recorded state of a [`GitHubRelease`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitHubReleaseState {
    /// The arguments the program was installed from.
    #[serde(flatten)]
    pub args: GitHubReleaseArgs,
    /// Resolved download URL of the release asset.
    #[serde(
        rename = "downloadURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub download_url: Option<String>,
    /// Everything the install placed into the bin location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<String>>,
}

/// Commands to run for one install of `asset_name`, with the archive
/// extraction and bin-folder copy steps appended.
fn asset_commands(args: &GitHubReleaseArgs, base: Vec<String>, asset_name: &str) -> Vec<String> {
    let mut commands = base;

    if asset_name.ends_with(".gz") || asset_name.ends_with(".tgz") {
        commands.push(format!("tar -xzvf {asset_name}"));
    } else if asset_name.ends_with(".zip") {
        commands.push(format!("unzip -o {asset_name}"));
    }

    if let (Some(bin_folder), Some(bin_location)) = (&args.bin_folder, &args.bin_location) {
        commands.push(format!("cp -r {bin_folder}/* {bin_location}"));
    }

    commands
}

/// Everything the install placed into the bin location: the contents of
/// the copied bin folder, read back from disk, plus the promoted binary.
fn collect_locations(
    work_dir: &Path,
    args: &GitHubReleaseArgs,
    promoted: Option<String>,
) -> Result<Vec<String>> {
    let mut locations = Vec::new();

    if let (Some(bin_folder), Some(bin_location)) = (&args.bin_folder, &args.bin_location) {
        let folder = work_dir.join(bin_folder);
        let mut names: Vec<String> = std::fs::read_dir(&folder)
            .with_context(|| format!("listing bin folder {}", folder.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        for name in names {
            locations.push(
                Path::new(bin_location)
                    .join(name)
                    .to_string_lossy()
                    .into_owned(),
            );
        }
    }

    locations.extend(promoted);
    Ok(locations)
}

/// Installs a program from a GitHub release asset.
pub struct GitHubRelease {
    github: GithubClient,
}

impl GitHubRelease {
    /// A release installer using the given API client.
    #[must_use]
    pub fn new(github: GithubClient) -> Self {
        Self { github }
    }

    /// Resolve the download URL for a pinned version and asset name.
    fn download_url(&self, args: &GitHubReleaseArgs) -> Result<(String, String)> {
        let version = args
            .release_version
            .as_deref()
            .context("releaseVersion not resolved; run a refresh")?;
        let asset_name = args
            .asset_name
            .as_deref()
            .context("assetName not resolved; run a refresh")?;

        let release = self
            .github
            .release_by_tag(&args.org, &args.repo, version)?;
        let asset = release
            .asset_named(asset_name)
            .with_context(|| format!("release {version} has no asset named {asset_name}"))?;
        Ok((asset.download_url.clone(), asset_name.to_string()))
    }

}

impl Resource for GitHubRelease {
    type Args = GitHubReleaseArgs;
    type State = GitHubReleaseState;

    fn schema(&self) -> &ResourceSchema {
        &SCHEMA
    }

    /// On first creation, pin the release version and asset name through
    /// the API; lookup trouble becomes field-scoped failures rather than
    /// aborting the whole check. Later checks carry the pinned values.
    fn check(
        &self,
        name: &str,
        old_inputs: &PropertyMap,
        new_inputs: PropertyMap,
    ) -> Result<CheckResponse> {
        let mut news = new_inputs;
        let mut failures = Vec::new();

        let org = property::get_string(&news, "org").map(str::to_string);
        let repo = property::get_string(&news, "repo").map(str::to_string);
        if old_inputs.is_empty()
            && let (Some(org), Some(repo)) = (org, repo)
        {
            let pinned_version = property::get_string(&news, "releaseVersion").map(str::to_string);
            let release = match &pinned_version {
                Some(version) => self.github.release_by_tag(&org, &repo, version),
                None => self.github.latest_release(&org, &repo),
            };
            match release {
                Ok(release) => {
                    let pattern = property::get_string(&news, "assetName").map(str::to_string);
                    match platform::select_asset(&release.assets, pattern.as_deref()) {
                        Ok(Some(asset)) => {
                            news.insert(
                                "releaseVersion".to_string(),
                                release.tag_name.clone().into(),
                            );
                            news.insert("assetName".to_string(), asset.name.clone().into());
                        }
                        Ok(None) => failures.push(CheckFailure::new(
                            "assetName",
                            format!(
                                "release {} has no asset matching this platform",
                                release.tag_name
                            ),
                        )),
                        Err(err) => {
                            failures.push(CheckFailure::new("assetName", format!("{err:#}")));
                        }
                    }
                }
                Err(err) => failures.push(CheckFailure::new("releaseVersion", format!("{err:#}"))),
            }
        }

        let mut response = default_check(self.schema(), name, old_inputs, news);
        response.failures.extend(failures);
        Ok(response)
    }

    fn create(
        &self,
        name: &str,
        args: GitHubReleaseArgs,
        preview: bool,
    ) -> Result<(String, GitHubReleaseState)> {
        let (download_url, asset_name) = self.download_url(&args)?;

        if preview {
            return Ok((
                name.to_string(),
                GitHubReleaseState {
                    args,
                    download_url: Some(download_url),
                    locations: None,
                },
            ));
        }

        let runner = args.command.runner();
        let commands = asset_commands(
            &args,
            args.install_commands.clone().unwrap_or_default(),
            &asset_name,
        );
        let outcome = run_install(&InstallRequest {
            runner: &runner,
            download_url: &download_url,
            commands: &commands,
            program_name: args.program_name(),
            bin_location: args.bin_location.as_deref(),
            executable: args.executable.is_some(),
            version_command: None,
        })?;
        let locations = collect_locations(&outcome.work_dir, &args, outcome.location)?;

        Ok((
            name.to_string(),
            GitHubReleaseState {
                args,
                download_url: Some(download_url),
                locations: Some(locations),
            },
        ))
    }

    fn update(
        &self,
        _id: &str,
        old_state: GitHubReleaseState,
        new_args: GitHubReleaseArgs,
        preview: bool,
    ) -> Result<GitHubReleaseState> {
        let (download_url, asset_name) = self.download_url(&new_args)?;

        if preview {
            return Ok(GitHubReleaseState {
                args: new_args,
                download_url: Some(download_url),
                locations: old_state.locations,
            });
        }

        let runner = new_args.command.runner();
        let install = new_args.install_commands.clone().unwrap_or_default();
        let base = new_args.hooks.update_or(&install).to_vec();
        let commands = asset_commands(&new_args, base, &asset_name);
        let outcome = run_install(&InstallRequest {
            runner: &runner,
            download_url: &download_url,
            commands: &commands,
            program_name: new_args.program_name(),
            bin_location: new_args.bin_location.as_deref(),
            executable: new_args.executable.is_some(),
            version_command: None,
        })?;
        let locations = collect_locations(&outcome.work_dir, &new_args, outcome.location)?;

        Ok(GitHubReleaseState {
            args: new_args,
            download_url: Some(download_url),
            locations: Some(locations),
        })
    }

    fn delete(&self, _id: &str, state: GitHubReleaseState) -> Result<()> {
        run_uninstall(&state.args.hooks, &state.args.command.runner());
        for location in state.locations.iter().flatten() {
            remove_installed(location)?;
        }
        Ok(())
    }

    /// Resolve what a fresh install would pin today, for import and drift
    /// detection of unpinned resources.
    fn read(
        &self,
        id: &str,
        inputs: GitHubReleaseArgs,
        state: GitHubReleaseState,
    ) -> Result<ReadResponse<GitHubReleaseArgs, GitHubReleaseState>> {
        if inputs.release_version.is_some() {
            return Ok(ReadResponse {
                id: id.to_string(),
                inputs,
                state,
            });
        }

        let mut inputs = inputs;
        let release = self.github.latest_release(&inputs.org, &inputs.repo)?;
        let asset = platform::select_asset(&release.assets, inputs.asset_name.as_deref())?
            .with_context(|| {
                format!(
                    "release {} has no asset matching this platform",
                    release.tag_name
                )
            })?;
        inputs.release_version = Some(release.tag_name.clone());
        inputs.asset_name = Some(asset.name.clone());

        Ok(ReadResponse {
            id: id.to_string(),
            inputs,
            state,
        })
    }
}
