//! Repeats executor steps until something terminal happens.

use loopwright_core::error::Error;
use loopwright_core::plan::RevisionContext;
use loopwright_core::transcript::Transcript;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::executor::{Decision, TurnExecutor};

/// How a loop run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopOutcome {
    /// The service produced a final text answer.
    Completed(String),
    /// The revision action ran.
    RevisionRequested(RevisionContext),
    /// `max_iterations` steps ran without a terminal decision.
    IterationLimitExceeded {
        iterations: u32,
        last_text: Option<String>,
    },
    Cancelled { iterations: u32 },
}

/// A loop outcome plus the number of steps it took.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopRun {
    pub outcome: LoopOutcome,
    pub iterations: u32,
}

/// Runs a [`TurnExecutor`] under an iteration ceiling.
pub struct IterationLoop {
    executor: TurnExecutor,
}

impl IterationLoop {
    pub fn new(executor: TurnExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &TurnExecutor {
        &self.executor
    }

    /// Step until a final answer, a revision request, cancellation, or
    /// `max_iterations` steps. Never issues more than `max_iterations`
    /// decision requests.
    pub async fn run(
        &self,
        transcript: &mut Transcript,
        cancel: &CancellationToken,
    ) -> Result<LoopRun, Error> {
        let max_iterations = self.executor.options().max_iterations;
        info!(
            transcript_id = %transcript.id,
            max_iterations,
            "Starting iteration loop"
        );

        let mut iterations = 0;
        while iterations < max_iterations {
            if cancel.is_cancelled() {
                return Ok(finish(LoopOutcome::Cancelled { iterations }, iterations));
            }

            iterations += 1;
            debug!(transcript_id = %transcript.id, iteration = iterations, "Loop iteration");

            match self.executor.step(transcript, cancel).await? {
                Decision::Final(text) => {
                    return Ok(finish(LoopOutcome::Completed(text), iterations));
                }
                Decision::RevisionRequested(ctx) => {
                    return Ok(finish(LoopOutcome::RevisionRequested(ctx), iterations));
                }
                Decision::Cancelled => {
                    return Ok(finish(LoopOutcome::Cancelled { iterations }, iterations));
                }
                Decision::Continue => {}
            }
        }

        warn!(
            transcript_id = %transcript.id,
            iterations,
            "Iteration limit reached without a final answer"
        );

        let last_text = transcript
            .last_assistant_text()
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string);

        Ok(finish(
            LoopOutcome::IterationLimitExceeded {
                iterations,
                last_text,
            },
            iterations,
        ))
    }
}

fn finish(outcome: LoopOutcome, iterations: u32) -> LoopRun {
    LoopRun {
        outcome,
        iterations,
    }
}
