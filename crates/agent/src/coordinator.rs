//! Replan coordinator: plan, execute, and replan when an attempt asks to.
//!
//! ```text
//!   Planning ──► Executing ──► Done
//!      ▲             │
//!      │             ▼
//!      └──────── Replanning ──► Aborted (replan budget spent)
//! ```
//!
//! Each attempt gets a fresh transcript seeded with the current plan. A
//! revision request (or, under [`IterationLimitPolicy::Replan`], an
//! exhausted iteration budget) sends the run back to the plan manager with
//! the attempt's [`RevisionContext`]. At most `max_replans` replacement
//! plans are made; the next revision aborts the run.

use chrono::Utc;
use loopwright_config::IterationLimitPolicy;
use loopwright_core::error::{Error, ProviderError};
use loopwright_core::event::{DomainEvent, EventBus};
use loopwright_core::plan::{Plan, Replan, RevisionContext};
use loopwright_core::transcript::Transcript;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::loop_runner::{IterationLoop, LoopOutcome};
use crate::planner::PlanManager;

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a capable assistant. Complete the user's task by calling the available actions, then reply with a concise final answer.";

/// Reason recorded when an attempt is abandoned for running out of iterations.
pub const ITERATION_LIMIT_REASON: &str = "iteration limit reached";

/// How a coordinated run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(String),
    /// A revision arrived after the replan budget was spent, or during a
    /// run that has no plan to revise.
    Aborted {
        reason: String,
        context: RevisionContext,
        /// Most recent assistant text of the abandoned attempt
        last_text: Option<String>,
    },
    IterationLimitExceeded { last_text: Option<String> },
    Cancelled,
}

impl RunOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Aborted { .. } => "aborted",
            Self::IterationLimitExceeded { .. } => "iteration_limit_exceeded",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Summary of a coordinated run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Steps across all attempts
    pub iterations: u32,
    pub replans: u32,
    /// Every plan made, oldest first
    pub plans: Vec<Plan>,
    /// Transcript of the final attempt
    pub transcript: Option<Transcript>,
}

pub struct ReplanCoordinator {
    planner: PlanManager,
    iteration_loop: IterationLoop,
    max_replans: u32,
    limit_policy: IterationLimitPolicy,
    system_prompt: String,
    event_bus: Option<Arc<EventBus>>,
}

impl ReplanCoordinator {
    pub fn new(planner: PlanManager, iteration_loop: IterationLoop) -> Self {
        Self {
            planner,
            iteration_loop,
            max_replans: 3,
            limit_policy: IterationLimitPolicy::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            event_bus: None,
        }
    }

    pub fn with_max_replans(mut self, max_replans: u32) -> Self {
        self.max_replans = max_replans;
        self
    }

    pub fn with_iteration_limit_policy(mut self, policy: IterationLimitPolicy) -> Self {
        self.limit_policy = policy;
        self
    }

    /// Base instructions every attempt starts from.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Plan, execute, and replan until done, aborted, or cancelled.
    ///
    /// A plan that cannot be produced is returned as `Err`; no attempt runs
    /// without a plan. Cancellation during planning ends the run as
    /// [`RunOutcome::Cancelled`].
    pub async fn run(&self, task: &str, cancel: &CancellationToken) -> Result<RunReport, Error> {
        let mut plans: Vec<Plan> = Vec::new();
        let mut pending: Option<RevisionContext> = None;
        let mut iterations = 0;
        let mut replans = 0;

        info!(max_replans = self.max_replans, policy = ?self.limit_policy, "Starting coordinated run");

        loop {
            if cancel.is_cancelled() {
                return Ok(self.report(RunReport {
                    outcome: RunOutcome::Cancelled,
                    iterations,
                    replans,
                    plans,
                    transcript: None,
                }));
            }

            let planned = match (pending.take(), plans.last()) {
                (Some(context), Some(previous)) => {
                    self.planner
                        .create_plan(task, Some(Replan { previous, context: &context }), cancel)
                        .await
                }
                _ => self.planner.create_plan(task, None, cancel).await,
            };

            let plan = match planned {
                Ok(plan) => plan,
                Err(Error::Provider(ProviderError::Cancelled)) => {
                    return Ok(self.report(RunReport {
                        outcome: RunOutcome::Cancelled,
                        iterations,
                        replans,
                        plans,
                        transcript: None,
                    }));
                }
                Err(e) => return Err(e),
            };

            self.publish(DomainEvent::PlanCreated {
                goal: plan.goal.clone(),
                steps: plan.steps.len(),
                revision: plans.len(),
                timestamp: Utc::now(),
            });

            let mut transcript = Transcript::with_task(self.attempt_prompt(&plan), task);
            plans.push(plan);

            let attempt = self.iteration_loop.run(&mut transcript, cancel).await?;
            iterations += attempt.iterations;

            let context = match attempt.outcome {
                LoopOutcome::Completed(text) => {
                    return Ok(self.report(RunReport {
                        outcome: RunOutcome::Completed(text),
                        iterations,
                        replans,
                        plans,
                        transcript: Some(transcript),
                    }));
                }
                LoopOutcome::Cancelled { .. } => {
                    return Ok(self.report(RunReport {
                        outcome: RunOutcome::Cancelled,
                        iterations,
                        replans,
                        plans,
                        transcript: Some(transcript),
                    }));
                }
                LoopOutcome::RevisionRequested(context) => context,
                LoopOutcome::IterationLimitExceeded { last_text, .. } => match self.limit_policy {
                    IterationLimitPolicy::Stop => {
                        return Ok(self.report(RunReport {
                            outcome: RunOutcome::IterationLimitExceeded { last_text },
                            iterations,
                            replans,
                            plans,
                            transcript: Some(transcript),
                        }));
                    }
                    IterationLimitPolicy::Replan => {
                        self.publish(DomainEvent::RevisionRequested {
                            reason: ITERATION_LIMIT_REASON.into(),
                            timestamp: Utc::now(),
                        });
                        RevisionContext::new(ITERATION_LIMIT_REASON)
                    }
                },
            };

            if replans >= self.max_replans {
                warn!(replans, reason = %context.reason, "Replan budget spent, aborting");
                let last_text = last_text_of(&transcript);
                return Ok(self.report(RunReport {
                    outcome: RunOutcome::Aborted {
                        reason: context.reason.clone(),
                        context,
                        last_text,
                    },
                    iterations,
                    replans,
                    plans,
                    transcript: Some(transcript),
                }));
            }

            replans += 1;
            info!(replans, reason = %context.reason, "Replanning");
            pending = Some(context);
        }
    }

    /// Run a single attempt with no plan. A revision request here has no
    /// plan to revise, so it aborts the run.
    pub async fn execute_without_plan(
        &self,
        task: &str,
        cancel: &CancellationToken,
    ) -> Result<RunReport, Error> {
        let mut transcript = Transcript::with_task(self.system_prompt.clone(), task);
        let attempt = self.iteration_loop.run(&mut transcript, cancel).await?;

        let outcome = match attempt.outcome {
            LoopOutcome::Completed(text) => RunOutcome::Completed(text),
            LoopOutcome::RevisionRequested(context) => RunOutcome::Aborted {
                reason: context.reason.clone(),
                last_text: last_text_of(&transcript),
                context,
            },
            LoopOutcome::IterationLimitExceeded { last_text, .. } => {
                RunOutcome::IterationLimitExceeded { last_text }
            }
            LoopOutcome::Cancelled { .. } => RunOutcome::Cancelled,
        };

        Ok(self.report(RunReport {
            outcome,
            iterations: attempt.iterations,
            replans: 0,
            plans: Vec::new(),
            transcript: Some(transcript),
        }))
    }

    fn attempt_prompt(&self, plan: &Plan) -> String {
        let mut prompt = format!(
            "{}\n\nFollow this plan:\n{}",
            self.system_prompt,
            plan.render()
        );

        let executor = self.iteration_loop.executor();
        let revision = &executor.options().revision_action;
        if executor.registry().contains(revision) {
            prompt.push_str(&format!(
                "\nIf the plan turns out to be wrong or cannot be carried out, call `{revision}` with the reason, the steps already completed, and what you discovered. Do not improvise a different plan."
            ));
        }
        prompt
    }

    fn report(&self, report: RunReport) -> RunReport {
        info!(
            outcome = report.outcome.label(),
            iterations = report.iterations,
            replans = report.replans,
            plans = report.plans.len(),
            "Run finished"
        );
        self.publish(DomainEvent::RunFinished {
            outcome: report.outcome.label().into(),
            iterations: report.iterations as usize,
            replans: report.replans as usize,
            timestamp: Utc::now(),
        });
        report
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

fn last_text_of(transcript: &Transcript) -> Option<String> {
    transcript
        .last_assistant_text()
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string)
}
