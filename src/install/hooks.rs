//! Shared argument groups for the installer resource kinds.
//!
//! Installers compose these as named values (serde-flattened onto the wire
//! shape) instead of inheriting them, so there is exactly one place a
//! field can come from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cmd::CommandRunner;

/// Lifecycle command hooks common to every installer kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallHooks {
    /// Commands to run when updating the program in place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_commands: Option<Vec<String>>,
    /// Commands to run when uninstalling the program.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uninstall_commands: Option<Vec<String>>,
}

impl InstallHooks {
    /// The update hook when configured, otherwise the given install
    /// commands: "install vs. update" intent is respected whenever the
    /// caller expressed it.
    #[must_use]
    pub fn update_or<'a>(&'a self, install: &'a [String]) -> &'a [String] {
        match &self.update_commands {
            Some(commands) if !commands.is_empty() => commands,
            _ => install,
        }
    }
}

/// How the commands of an installer are executed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOptions {
    /// Interpreter wrapping the commands. Defaults to the platform shell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<Vec<String>>,
    /// Environment variables set for the commands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<BTreeMap<String, String>>,
}

impl CommandOptions {
    /// Build a command runner honoring these options.
    #[must_use]
    pub fn runner(&self) -> CommandRunner {
        let mut runner = CommandRunner::new();
        if let Some(interpreter) = &self.interpreter {
            runner = runner.interpreter(interpreter);
        }
        if let Some(environment) = &self.environment {
            runner = runner.env(environment);
        }
        runner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_or_prefers_update_commands() {
        let hooks = InstallHooks {
            update_commands: Some(vec!["brew upgrade x".to_string()]),
            uninstall_commands: None,
        };
        let install = vec!["brew install x".to_string()];
        assert_eq!(hooks.update_or(&install), ["brew upgrade x".to_string()]);
    }

    #[test]
    fn test_update_or_falls_back_to_install() {
        let hooks = InstallHooks::default();
        let install = vec!["brew install x".to_string()];
        assert_eq!(hooks.update_or(&install), install.as_slice());
    }

    #[test]
    fn test_empty_update_commands_fall_back() {
        let hooks = InstallHooks {
            update_commands: Some(Vec::new()),
            uninstall_commands: None,
        };
        let install = vec!["make install".to_string()];
        assert_eq!(hooks.update_or(&install), install.as_slice());
    }

    #[test]
    fn test_hooks_serialize_camel_case_and_skip_absent() {
        let hooks = InstallHooks {
            update_commands: Some(vec!["u".to_string()]),
            uninstall_commands: None,
        };
        let value = serde_json::to_value(&hooks).unwrap();
        assert_eq!(value["updateCommands"], serde_json::json!(["u"]));
        assert!(value.get("uninstallCommands").is_none());
    }

    #[test]
    fn test_command_options_runner_executes() {
        let dir = tempfile::tempdir().unwrap();
        let mut environment = BTreeMap::new();
        environment.insert("HOOK_VAR".to_string(), "yes".to_string());
        let options = CommandOptions {
            interpreter: None,
            environment: Some(environment),
        };
        let out = options.runner().run("echo $HOOK_VAR", dir.path()).unwrap();
        assert_eq!(out, "yes");
    }
}
