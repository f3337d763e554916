//! Built-in action implementations for Loopwright.
//!
//! Actions give the agent the ability to interact with the world:
//! run shell commands, read/write/list files, check the weather, ask the
//! user, and abandon a plan that stopped making sense.
//!
//! Registries are assembled only from the closed [`Builtin`] set, usually
//! through [`skills::compose`].

pub mod ask_human;
pub mod builtin;
pub mod file_read;
pub mod file_write;
pub mod list_directory;
pub mod path;
pub mod revision;
pub mod shell;
pub mod skills;
pub mod weather_lookup;

pub use ask_human::{AskHumanAction, Prompter, ScriptedPrompter, StdinPrompter};
pub use builtin::{Builtin, Toolbox};
pub use file_read::ReadFileAction;
pub use file_write::WriteFileAction;
pub use list_directory::ListDirectoryAction;
pub use path::{PathError, PathPolicy};
pub use revision::{DEFAULT_REVISION_ACTION, RequestRevisionAction};
pub use shell::ShellAction;
pub use skills::{Loadout, Skill};
pub use weather_lookup::GetWeatherAction;
