//! The closed set of built-in actions and how to instantiate them.

use loopwright_config::ToolsSettings;
use loopwright_core::action::{Action, ActionRegistry};
use loopwright_core::error::RegistryError;
use std::sync::Arc;
use std::time::Duration;

use crate::ask_human::{AskHumanAction, Prompter, StdinPrompter};
use crate::file_read::ReadFileAction;
use crate::file_write::WriteFileAction;
use crate::list_directory::ListDirectoryAction;
use crate::path::PathPolicy;
use crate::revision::{DEFAULT_REVISION_ACTION, RequestRevisionAction};
use crate::shell::ShellAction;
use crate::weather_lookup::GetWeatherAction;

/// Every action this crate ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Shell,
    ReadFile,
    WriteFile,
    ListDirectory,
    GetWeather,
    AskHuman,
    RequestRevision,
}

impl Builtin {
    pub const ALL: [Builtin; 7] = [
        Builtin::Shell,
        Builtin::ReadFile,
        Builtin::WriteFile,
        Builtin::ListDirectory,
        Builtin::GetWeather,
        Builtin::AskHuman,
        Builtin::RequestRevision,
    ];

    /// Build the handler for this variant.
    pub fn instantiate(self, toolbox: &Toolbox) -> Box<dyn Action> {
        let policy = PathPolicy::from_settings(&toolbox.settings);
        match self {
            Builtin::Shell => Box::new(
                ShellAction::new(toolbox.settings.allowed_commands.clone())
                    .with_timeout(Duration::from_secs(toolbox.settings.shell_timeout_secs)),
            ),
            Builtin::ReadFile => Box::new(
                ReadFileAction::new()
                    .with_policy(policy)
                    .with_max_bytes(toolbox.settings.max_read_bytes),
            ),
            Builtin::WriteFile => Box::new(WriteFileAction::new().with_policy(policy)),
            Builtin::ListDirectory => Box::new(ListDirectoryAction::new().with_policy(policy)),
            Builtin::GetWeather => Box::new(GetWeatherAction),
            Builtin::AskHuman => Box::new(AskHumanAction::new(toolbox.prompter.clone())),
            Builtin::RequestRevision => {
                Box::new(RequestRevisionAction::named(toolbox.revision_action.clone()))
            }
        }
    }
}

/// Shared inputs for instantiating built-ins.
#[derive(Clone)]
pub struct Toolbox {
    pub settings: ToolsSettings,
    pub prompter: Arc<dyn Prompter>,
    pub revision_action: String,
}

impl Toolbox {
    pub fn new(settings: ToolsSettings) -> Self {
        Self {
            settings,
            prompter: Arc::new(StdinPrompter::new()),
            revision_action: DEFAULT_REVISION_ACTION.into(),
        }
    }

    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }

    pub fn with_revision_action(mut self, name: impl Into<String>) -> Self {
        self.revision_action = name.into();
        self
    }

    /// Build a registry holding exactly `builtins`.
    pub fn registry(&self, builtins: &[Builtin]) -> Result<ActionRegistry, RegistryError> {
        let mut registry = ActionRegistry::new();
        for builtin in builtins {
            registry.register(builtin.instantiate(self))?;
        }
        Ok(registry)
    }
}

impl Default for Toolbox {
    fn default() -> Self {
        Self::new(ToolsSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ask_human::ScriptedPrompter;

    fn toolbox() -> Toolbox {
        Toolbox::new(ToolsSettings::default())
            .with_prompter(Arc::new(ScriptedPrompter::new(Vec::<String>::new())))
    }

    #[test]
    fn all_builtins_register_cleanly() {
        let registry = toolbox().registry(&Builtin::ALL).unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "ask_human",
                "get_weather",
                "list_directory",
                "read_file",
                "request_revision",
                "shell",
                "write_file",
            ]
        );
    }

    #[test]
    fn duplicate_builtin_rejected() {
        let err = toolbox()
            .registry(&[Builtin::GetWeather, Builtin::GetWeather])
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::Duplicate(name) if name == "get_weather"));
    }

    #[test]
    fn revision_action_can_be_renamed() {
        let registry = toolbox()
            .with_revision_action("replan")
            .registry(&[Builtin::RequestRevision])
            .unwrap();
        assert!(registry.contains("replan"));
        assert!(!registry.contains("request_revision"));
    }
}
