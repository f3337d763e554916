//! Skills: named bundles of built-in actions plus the instructions that
//! teach the model to use them.
//!
//! Scenarios compose skills; the resulting [`Loadout`] is a registry and the
//! matching system-prompt fragment.

use loopwright_core::action::ActionRegistry;
use loopwright_core::error::RegistryError;

use crate::builtin::{Builtin, Toolbox};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Skill {
    pub name: &'static str,
    pub instructions: &'static str,
    pub builtins: &'static [Builtin],
}

pub const FILESYSTEM: Skill = Skill {
    name: "filesystem",
    instructions: "You can inspect and change files. List a directory before guessing file names. \
Read a file before editing it. Write complete file contents; partial writes replace the file.",
    builtins: &[Builtin::ListDirectory, Builtin::ReadFile, Builtin::WriteFile],
};

pub const SHELL: Skill = Skill {
    name: "shell",
    instructions: "You can run shell commands. Prefer short, read-only commands. \
A non-zero exit code is reported as an error; read it and adjust.",
    builtins: &[Builtin::Shell],
};

pub const WEATHER: Skill = Skill {
    name: "weather",
    instructions: "You can look up the current weather. Call get_weather once per city, \
then answer using only the returned data.",
    builtins: &[Builtin::GetWeather],
};

pub const INTERVIEW: Skill = Skill {
    name: "interview",
    instructions: "You can ask the user questions with ask_human. Ask one question at a time \
and do not invent answers the user has not given.",
    builtins: &[Builtin::AskHuman],
};

pub const ALL: [Skill; 4] = [FILESYSTEM, SHELL, WEATHER, INTERVIEW];

/// Look a skill up by name.
pub fn find(name: &str) -> Option<Skill> {
    ALL.iter().copied().find(|s| s.name == name)
}

/// What a set of skills gives a run.
pub struct Loadout {
    pub registry: ActionRegistry,
    pub instructions: String,
}

/// Compose skills (plus any extra built-ins) into one registry.
///
/// A built-in shared by two skills is registered once.
pub fn compose(
    skills: &[Skill],
    extra: &[Builtin],
    toolbox: &Toolbox,
) -> Result<Loadout, RegistryError> {
    let mut builtins: Vec<Builtin> = Vec::new();
    for builtin in skills.iter().flat_map(|s| s.builtins.iter()).chain(extra) {
        if !builtins.contains(builtin) {
            builtins.push(*builtin);
        }
    }

    let instructions = skills
        .iter()
        .map(|s| format!("## {}\n{}", s.name, s.instructions))
        .collect::<Vec<_>>()
        .join("\n\n");

    Ok(Loadout {
        registry: toolbox.registry(&builtins)?,
        instructions,
    })
}
