//! Release-asset selection for the host platform.
//!
//! Release asset names encode OS and architecture in wildly inconsistent
//! vocabularies (`darwin` vs `macos` vs `apple`, `amd64` vs `x86_64`).
//! Selection works over lowercased names against alias sets for the host,
//! preferring an asset that matches both OS and architecture over one that
//! matches OS alone. A caller-supplied pattern bypasses the alias logic
//! and is treated as a regex.

use anyhow::{Context, Result};
use regex::Regex;

use crate::github::ReleaseAsset;

/// Name aliases for an operating system as they appear in asset names.
#[must_use]
pub fn os_aliases(os: &str) -> &'static [&'static str] {
    match os {
        "macos" => &["darwin", "macos", "apple"],
        "linux" => &["linux"],
        "windows" => &["windows", "win64", "win32"],
        _ => &[],
    }
}

/// Name aliases for a CPU architecture as they appear in asset names.
#[must_use]
pub fn arch_aliases(arch: &str) -> &'static [&'static str] {
    match arch {
        "x86_64" => &["x86_64", "amd64", "x64"],
        "aarch64" => &["aarch64", "arm64"],
        "riscv64" => &["riscv64"],
        _ => &[],
    }
}

/// Select the asset to install for the current host.
///
/// With `pattern` set, the first asset whose lowercased name matches the
/// regex wins. Otherwise the host's OS aliases filter the list and an
/// asset also matching the host architecture is preferred; the first
/// OS-only match is the fallback. `None` means nothing matched.
///
/// # Errors
///
/// Fails when `pattern` is not a valid regex.
pub fn select_asset<'a>(
    assets: &'a [ReleaseAsset],
    pattern: Option<&str>,
) -> Result<Option<&'a ReleaseAsset>> {
    if let Some(pattern) = pattern {
        let regex = Regex::new(&pattern.to_lowercase())
            .with_context(|| format!("invalid asset name pattern {pattern:?}"))?;
        return Ok(assets.iter().find(|a| regex.is_match(&a.name.to_lowercase())));
    }

    Ok(select_for(
        assets,
        std::env::consts::OS,
        std::env::consts::ARCH,
    ))
}

fn select_for<'a>(assets: &'a [ReleaseAsset], os: &str, arch: &str) -> Option<&'a ReleaseAsset> {
    let os_names = os_aliases(os);
    let arch_names = arch_aliases(arch);

    let mut os_match = None;
    for asset in assets {
        let name = asset.name.to_lowercase();
        if !os_names.iter().any(|alias| name.contains(alias)) {
            continue;
        }
        if arch_names.iter().any(|alias| name.contains(alias)) {
            return Some(asset);
        }
        os_match.get_or_insert(asset);
    }
    os_match
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: &str) -> ReleaseAsset {
        ReleaseAsset {
            name: name.to_string(),
            download_url: format!("https://example.com/{name}"),
            size: 0,
        }
    }

    fn task_assets() -> Vec<ReleaseAsset> {
        vec![
            asset("task_darwin_arm64.tar.gz"),
            asset("task_darwin_amd64.tar.gz"),
            asset("task_linux_amd64.tar.gz"),
            asset("task_linux_arm64.tar.gz"),
            asset("task_windows_amd64.zip"),
            asset("checksums.txt"),
        ]
    }

    #[test]
    fn test_select_for_prefers_exact_arch() {
        let assets = task_assets();
        let selected = select_for(&assets, "linux", "aarch64").unwrap();
        assert_eq!(selected.name, "task_linux_arm64.tar.gz");
    }

    #[test]
    fn test_select_for_macos_matches_darwin() {
        let assets = task_assets();
        let selected = select_for(&assets, "macos", "x86_64").unwrap();
        assert_eq!(selected.name, "task_darwin_amd64.tar.gz");
    }

    #[test]
    fn test_select_for_falls_back_to_os_only_match() {
        let assets = vec![asset("tool-linux.tar.gz"), asset("tool-darwin.tar.gz")];
        let selected = select_for(&assets, "linux", "aarch64").unwrap();
        assert_eq!(selected.name, "tool-linux.tar.gz");
    }

    #[test]
    fn test_select_for_no_match() {
        let assets = vec![asset("checksums.txt")];
        assert!(select_for(&assets, "linux", "x86_64").is_none());
    }

    #[test]
    fn test_pattern_overrides_platform_logic() {
        let assets = task_assets();
        let selected = select_asset(&assets, Some(r"task_windows.*\.zip"))
            .unwrap()
            .unwrap();
        assert_eq!(selected.name, "task_windows_amd64.zip");
    }

    #[test]
    fn test_pattern_is_case_insensitive_via_lowering() {
        let assets = vec![asset("Tool-Linux-x86_64.TAR.GZ")];
        let selected = select_asset(&assets, Some("tool-linux")).unwrap().unwrap();
        assert_eq!(selected.name, "Tool-Linux-x86_64.TAR.GZ");
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let assets = task_assets();
        assert!(select_asset(&assets, Some("(unclosed")).is_err());
    }

    #[test]
    fn test_select_asset_uses_host_platform() {
        // The host running the tests is one of the supported platforms, so
        // the full matrix of task assets always yields a selection.
        let assets = task_assets();
        assert!(select_asset(&assets, None).unwrap().is_some());
    }
}
