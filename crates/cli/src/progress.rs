//! Verbose-mode progress lines, driven by the domain event bus.

use loopwright_core::event::DomainEvent;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Print every event until the bus is dropped.
pub fn spawn(mut rx: broadcast::Receiver<Arc<DomainEvent>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => eprintln!("  {}", describe(&event)),
                Err(RecvError::Lagged(skipped)) => eprintln!("  ... {skipped} events skipped"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

pub fn describe(event: &DomainEvent) -> String {
    match event {
        DomainEvent::DecisionReceived {
            model,
            requested_actions,
            tokens_used,
            ..
        } => {
            if *requested_actions == 0 {
                format!("[decision] {model} answered ({tokens_used} tokens)")
            } else {
                format!("[decision] {model} requested {requested_actions} action(s) ({tokens_used} tokens)")
            }
        }
        DomainEvent::ActionExecuted {
            action,
            success,
            duration_ms,
            ..
        } => {
            let status = if *success { "ok" } else { "failed" };
            format!("[action] {action} {status} in {duration_ms}ms")
        }
        DomainEvent::PlanCreated {
            goal,
            steps,
            revision,
            ..
        } => {
            if *revision == 0 {
                format!("[plan] {goal} ({steps} steps)")
            } else {
                format!("[plan] revision {revision}: {goal} ({steps} steps)")
            }
        }
        DomainEvent::RevisionRequested { reason, .. } => format!("[replan] {reason}"),
        DomainEvent::RunFinished {
            outcome,
            iterations,
            replans,
            ..
        } => format!("[done] {outcome} after {iterations} step(s), {replans} replan(s)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn describes_plans_and_revisions() {
        let first = DomainEvent::PlanCreated {
            goal: "Summarize".into(),
            steps: 3,
            revision: 0,
            timestamp: Utc::now(),
        };
        let second = DomainEvent::PlanCreated {
            goal: "Summarize again".into(),
            steps: 2,
            revision: 1,
            timestamp: Utc::now(),
        };
        assert_eq!(describe(&first), "[plan] Summarize (3 steps)");
        assert_eq!(describe(&second), "[plan] revision 1: Summarize again (2 steps)");
    }

    #[test]
    fn describes_failed_action() {
        let event = DomainEvent::ActionExecuted {
            action: "shell".into(),
            success: false,
            duration_ms: 12,
            timestamp: Utc::now(),
        };
        assert_eq!(describe(&event), "[action] shell failed in 12ms");
    }
}
