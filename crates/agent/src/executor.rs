//! Turn executor: one decision request plus the actions it asks for.
//!
//! A step sends the transcript and the registry's descriptors to the
//! provider, appends the assistant turn verbatim, and then answers every
//! action request in the order received with exactly one action-result.
//! Failures of any kind become result text; only provider and transcript
//! errors escape a step.

use loopwright_core::action::ActionRegistry;
use loopwright_core::error::{ActionError, Error, ProviderError};
use loopwright_core::event::{DomainEvent, EventBus};
use loopwright_core::plan::RevisionContext;
use loopwright_core::provider::{Provider, ProviderRequest, ProviderResponse};
use loopwright_core::transcript::{ActionRequest, Transcript, Turn};
use loopwright_core::ActionOutput;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::approval::{Approval, ApprovalGate};
use crate::options::AgentOptions;

/// What a single step decided.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// The service answered with text only.
    Final(String),
    /// Actions ran; ask again.
    Continue,
    /// The revision action ran; the current plan is abandoned.
    RevisionRequested(RevisionContext),
    /// The run was cancelled during this step.
    Cancelled,
}

/// How one action request was resolved.
enum Resolution {
    Ran(ActionOutput),
    Failed(ActionError),
    Denied(String),
    Cancelled,
}

pub struct TurnExecutor {
    provider: Arc<dyn Provider>,
    registry: Arc<ActionRegistry>,
    options: AgentOptions,
    approval: Option<Arc<dyn ApprovalGate>>,
    event_bus: Option<Arc<EventBus>>,
}

impl TurnExecutor {
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: Arc<ActionRegistry>,
        options: AgentOptions,
    ) -> Self {
        Self {
            provider,
            registry,
            options,
            approval: None,
            event_bus: None,
        }
    }

    /// Route every action request through `gate` before it runs.
    pub fn with_approval(mut self, gate: Arc<dyn ApprovalGate>) -> Self {
        self.approval = Some(gate);
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn event_bus(&self) -> Option<&Arc<EventBus>> {
        self.event_bus.as_ref()
    }

    /// Run one decision/execute step against `transcript`.
    pub async fn step(
        &self,
        transcript: &mut Transcript,
        cancel: &CancellationToken,
    ) -> Result<Decision, Error> {
        transcript.validate()?;

        if cancel.is_cancelled() {
            return Ok(Decision::Cancelled);
        }

        let request = ProviderRequest {
            model: self.options.model.clone(),
            turns: transcript.turns().to_vec(),
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
            actions: self.registry.describe(),
        };

        let response =
            match bounded_request(self.provider.as_ref(), request, self.options.request_timeout, cancel)
                .await
            {
                Ok(response) => response,
                Err(ProviderError::Cancelled) => return Ok(Decision::Cancelled),
                Err(e) => return Err(e.into()),
            };

        let tokens_used = response.usage.map(|u| u.total_tokens).unwrap_or(0);
        let mut turn = response.turn;
        retag_requests(&mut turn.requests, transcript);
        self.publish(DomainEvent::DecisionReceived {
            transcript_id: transcript.id.to_string(),
            model: response.model,
            requested_actions: turn.requests.len(),
            tokens_used,
            timestamp: chrono::Utc::now(),
        });
        self.log_turn("assistant", &turn.content);

        let requests = turn.requests.clone();
        let content = turn.content.clone();
        transcript.push(turn);

        if requests.is_empty() {
            return Ok(Decision::Final(content));
        }

        debug!(count = requests.len(), "Executing action requests");

        let mut revision: Option<RevisionContext> = None;
        let mut cancelled = false;

        for request in &requests {
            let text = if let Some(ctx) = &revision {
                format!("Skipped: plan revision requested ({})", ctx.reason)
            } else if cancelled || cancel.is_cancelled() {
                cancelled = true;
                format!("Cancelled: run was cancelled before '{}' ran", request.name)
            } else {
                match self.resolve(request, cancel).await {
                    Resolution::Ran(output) => {
                        if output.success && request.name == self.options.revision_action {
                            revision = self.revision_context(request);
                        }
                        output.output
                    }
                    Resolution::Failed(e) => {
                        warn!(action = %request.name, error = %e, "Action failed");
                        format!("Error: {e}")
                    }
                    Resolution::Denied(reason) => format!("Denied: {reason}"),
                    Resolution::Cancelled => {
                        cancelled = true;
                        format!("Cancelled: '{}' was interrupted", request.name)
                    }
                }
            };

            self.log_turn("action_result", &text);
            transcript.push(Turn::action_result(&request.id, text));
        }

        if let Some(ctx) = revision {
            info!(reason = %ctx.reason, "Revision requested");
            self.publish(DomainEvent::RevisionRequested {
                reason: ctx.reason.clone(),
                timestamp: chrono::Utc::now(),
            });
            return Ok(Decision::RevisionRequested(ctx));
        }

        if cancelled {
            return Ok(Decision::Cancelled);
        }

        Ok(Decision::Continue)
    }

    /// Resolve, vet and execute one request.
    async fn resolve(&self, request: &ActionRequest, cancel: &CancellationToken) -> Resolution {
        let action = match self.registry.resolve(&request.name) {
            Ok(action) => action,
            Err(e) => return Resolution::Failed(e),
        };

        let arguments = match request.parse_arguments() {
            Ok(arguments) => arguments,
            Err(e) => return Resolution::Failed(e),
        };

        if let Some(gate) = &self.approval {
            let verdict = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Resolution::Cancelled,
                verdict = gate.review(request) => verdict,
            };
            if let Approval::Deny(reason) = verdict {
                info!(action = %request.name, reason = %reason, "Action denied");
                self.publish_action(&request.name, false, 0);
                return Resolution::Denied(reason);
            }
        }

        let start = Instant::now();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = action.execute(arguments) => Some(result),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Some(Ok(output)) => {
                self.publish_action(&request.name, output.success, duration_ms);
                Resolution::Ran(output)
            }
            Some(Err(e)) => {
                self.publish_action(&request.name, false, duration_ms);
                Resolution::Failed(e)
            }
            None => {
                warn!(action = %request.name, "Action cancelled mid-flight");
                self.publish_action(&request.name, false, duration_ms);
                Resolution::Cancelled
            }
        }
    }

    fn revision_context(&self, request: &ActionRequest) -> Option<RevisionContext> {
        match request
            .parse_arguments()
            .and_then(|args| RevisionContext::from_arguments(&args))
        {
            Ok(ctx) => Some(ctx),
            Err(e) => {
                warn!(error = %e, "Revision action succeeded but its arguments did not parse");
                None
            }
        }
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    fn publish_action(&self, action: &str, success: bool, duration_ms: u64) {
        self.publish(DomainEvent::ActionExecuted {
            action: action.to_string(),
            success,
            duration_ms,
            timestamp: chrono::Utc::now(),
        });
    }

    fn log_turn(&self, role: &str, content: &str) {
        if self.options.verbose {
            info!(role, content = %content, "Turn");
        } else {
            debug!(role, content = %content, "Turn");
        }
    }
}

/// Send one request to the service, bounded by `timeout` and `cancel`.
///
/// Cancellation wins over a response that is ready at the same time and
/// comes back as [`ProviderError::Cancelled`].
pub(crate) async fn bounded_request(
    provider: &dyn Provider,
    request: ProviderRequest,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<ProviderResponse, ProviderError> {
    let call = async {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, provider.complete(request))
                .await
                .map_err(|_| {
                    ProviderError::Timeout(format!("decision request exceeded {}s", limit.as_secs()))
                })?,
            None => provider.complete(request).await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderError::Cancelled),
        response = call => response,
    }
}

/// Give every request a non-empty id that no earlier request in the
/// transcript or this turn already uses. Well-formed ids are kept.
fn retag_requests(requests: &mut [ActionRequest], transcript: &Transcript) {
    let mut seen: HashSet<String> = transcript
        .turns()
        .iter()
        .flat_map(|t| t.requests.iter().map(|r| r.id.clone()))
        .collect();

    for (index, request) in requests.iter_mut().enumerate() {
        let id = request.id.trim().to_string();
        if !id.is_empty() && seen.insert(id.clone()) {
            request.id = id;
            continue;
        }

        let base = if id.is_empty() {
            format!("call_{index}")
        } else {
            format!("{id}_{index}")
        };
        let mut candidate = base.clone();
        let mut suffix = 1;
        while !seen.insert(candidate.clone()) {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }

        warn!(original = %request.id, id = %candidate, action = %request.name, "Re-tagged action request");
        request.id = candidate;
    }
}
