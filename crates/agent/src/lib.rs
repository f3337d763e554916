//! The adaptive agent loop.
//!
//! The loop alternates between asking the reasoning service for a decision
//! and executing the actions it requests:
//!
//! 1. **Plan** (optional): the [`PlanManager`] asks for a goal and ordered steps
//! 2. **Decide**: the [`TurnExecutor`] sends the transcript and action descriptors
//! 3. **Act**: each requested action runs in order; its result text is appended
//! 4. **Repeat** until a final answer, a revision request, cancellation, or
//!    the iteration ceiling ([`IterationLoop`])
//! 5. **Replan**: the [`ReplanCoordinator`] turns a revision request into a
//!    fresh plan, up to `max_replans` times
//!
//! Handler failures never escape a step; they become `Error: …` result text
//! the service sees on its next decision.

pub mod approval;
pub mod coordinator;
pub mod executor;
pub mod loop_runner;
pub mod options;
pub mod planner;

#[cfg(test)]
mod test_helpers;

pub use approval::{Approval, ApprovalGate, AutoApprove, PromptApproval};
pub use coordinator::{ITERATION_LIMIT_REASON, ReplanCoordinator, RunOutcome, RunReport};
pub use executor::{Decision, TurnExecutor};
pub use loop_runner::{IterationLoop, LoopOutcome, LoopRun};
pub use options::AgentOptions;
pub use planner::{PlanManager, normalize_plan_text, parse_plan};
