//! Scenarios: what each CLI mode loads and how it runs.

use clap::ValueEnum;
use loopwright_core::error::RegistryError;
use loopwright_tools::builtin::{Builtin, Toolbox};
use loopwright_tools::skills::{self, Loadout, Skill};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Plain prompting, no actions
    Chat,
    /// One tool, one or two calls
    Weather,
    /// Multi-step tool loop over the filesystem and shell
    Tools,
    /// Reason-act-observe with every tool available
    React,
    /// Plan once, then execute the plan
    Plan,
    /// Plan, execute, and replan when the plan stops fitting
    Adaptive,
    /// Interview the user and write a markdown report
    Wizard,
}

/// Whether and how a mode plans before acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Planning {
    None,
    /// One plan; no revisions
    Once,
    /// Replan on request, up to the configured budget
    Adaptive,
}

#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub skills: &'static [Skill],
    pub extra: &'static [Builtin],
    pub planning: Planning,
    pub prompt: &'static str,
    pub default_task: &'static str,
    /// Overrides the configured iteration ceiling
    pub max_iterations: Option<u32>,
}

impl Mode {
    pub fn scenario(self) -> Scenario {
        match self {
            Mode::Chat => Scenario {
                skills: &[],
                extra: &[],
                planning: Planning::None,
                prompt: "You are a concise, friendly assistant.",
                default_task: "Explain in three sentences what an agent loop is.",
                max_iterations: Some(1),
            },
            Mode::Weather => Scenario {
                skills: &[skills::WEATHER],
                extra: &[],
                planning: Planning::None,
                prompt: "You answer weather questions using the available actions.",
                default_task: "What's the weather like in Paris and Tokyo right now?",
                max_iterations: Some(4),
            },
            Mode::Tools => Scenario {
                skills: &[skills::FILESYSTEM, skills::SHELL],
                extra: &[],
                planning: Planning::None,
                prompt: "You are a careful assistant working in the user's current directory.",
                default_task: "List the files in the current directory and tell me what this project is.",
                max_iterations: None,
            },
            Mode::React => Scenario {
                skills: &[skills::FILESYSTEM, skills::SHELL, skills::WEATHER],
                extra: &[],
                planning: Planning::None,
                prompt: "Work in short cycles. Before each action, state your reasoning in one or two sentences. \
After each result, say what you learned and decide the next step. Answer once you have enough information.",
                default_task: "How many Rust source files are in this directory tree, and which one is largest?",
                max_iterations: None,
            },
            Mode::Plan => Scenario {
                skills: &[skills::FILESYSTEM, skills::SHELL],
                extra: &[],
                planning: Planning::Once,
                prompt: "You carry out plans step by step using the available actions.",
                default_task: "Find the TODO comments in this directory tree and write them to todo_report.md.",
                max_iterations: None,
            },
            Mode::Adaptive => Scenario {
                skills: &[skills::FILESYSTEM, skills::SHELL],
                extra: &[Builtin::RequestRevision],
                planning: Planning::Adaptive,
                prompt: "You carry out plans step by step using the available actions. \
Check each result against what the plan assumed.",
                default_task: "Find the largest source file in this directory tree and write a short summary of it to summary.md.",
                max_iterations: None,
            },
            Mode::Wizard => Scenario {
                skills: &[skills::INTERVIEW, skills::FILESYSTEM],
                extra: &[],
                planning: Planning::None,
                prompt: "You are a setup wizard. Gather what you need from the user one question at a time, \
then write the result as a markdown document.",
                default_task: "Interview me about a project idea (name, goal, first milestone) and write a brief to project_brief.md.",
                max_iterations: Some(15),
            },
        }
    }
}

impl Scenario {
    pub fn loadout(&self, toolbox: &Toolbox) -> Result<Loadout, RegistryError> {
        skills::compose(self.skills, self.extra, toolbox)
    }

    /// The scenario prompt followed by the skill instructions.
    pub fn system_prompt(&self, instructions: &str) -> String {
        if instructions.is_empty() {
            return self.prompt.to_string();
        }
        format!("{}\n\n{instructions}", self.prompt)
    }
}
