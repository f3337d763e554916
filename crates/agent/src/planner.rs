//! Plan manager: asks the service for a structured plan before execution.
//!
//! Planning requests carry no actions, so the answer is always text. The
//! text is normalized with [`normalize_plan_text`] and parsed into a
//! [`Plan`]; a reply that does not parse is an error, never a guess.
//! Plan requests share the decision timeout and the run's cancellation.

use loopwright_core::action::ActionRegistry;
use loopwright_core::error::{Error, PlanError, ProviderError};
use loopwright_core::plan::{Plan, Replan};
use loopwright_core::provider::{Provider, ProviderRequest};
use loopwright_core::transcript::Turn;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::executor::bounded_request;
use crate::options::AgentOptions;

const PLAN_INSTRUCTIONS: &str = "You are a planner. Break the user's task into a short, ordered list of concrete steps.
Reply with a single JSON object and nothing else, in exactly this shape:
{\"goal\": \"<one sentence>\", \"steps\": [{\"id\": 1, \"description\": \"<what to do>\", \"action\": \"<action name or empty>\", \"rationale\": \"<why>\"}]}
Use only the actions listed below. Steps that need no action leave \"action\" empty.";

pub struct PlanManager {
    provider: Arc<dyn Provider>,
    options: AgentOptions,
    /// Action names plans may refer to.
    actions: Vec<String>,
    parse_retries: u32,
}

impl PlanManager {
    pub fn new(provider: Arc<dyn Provider>, options: AgentOptions) -> Self {
        Self {
            provider,
            options,
            actions: Vec::new(),
            parse_retries: 0,
        }
    }

    /// Advertise `registry`'s actions to the planner.
    pub fn with_actions(mut self, registry: &ActionRegistry) -> Self {
        self.actions = registry.names().into_iter().map(String::from).collect();
        self
    }

    /// Extra attempts, each asking the service to reformat an unparseable reply.
    pub fn with_parse_retries(mut self, retries: u32) -> Self {
        self.parse_retries = retries;
        self
    }

    /// Produce a plan for `task`, or a replacement plan when `revision` is given.
    ///
    /// Cancellation while waiting for the service is returned as
    /// [`ProviderError::Cancelled`].
    pub async fn create_plan(
        &self,
        task: &str,
        revision: Option<Replan<'_>>,
        cancel: &CancellationToken,
    ) -> Result<Plan, Error> {
        let mut turns = vec![
            Turn::system(self.system_prompt()),
            Turn::user(Self::user_prompt(task, revision)),
        ];

        let mut attempt = 0;
        loop {
            let request = ProviderRequest {
                model: self.options.model.clone(),
                turns: turns.clone(),
                temperature: self.options.temperature,
                max_tokens: self.options.max_tokens,
                actions: vec![],
            };

            debug!(attempt, replan = revision.is_some(), "Requesting plan");
            let response =
                bounded_request(self.provider.as_ref(), request, self.options.request_timeout, cancel)
                    .await
                    .inspect_err(|e| {
                        if !matches!(e, ProviderError::Cancelled) {
                            warn!(error = %e, "Plan request failed");
                        }
                    })?;
            let raw = response.turn.content;

            match parse_plan(&raw) {
                Ok(plan) => {
                    self.check_actions(&plan);
                    info!(goal = %plan.goal, steps = plan.steps.len(), "Plan created");
                    return Ok(plan);
                }
                Err(PlanError::Parse { reason, .. }) if attempt < self.parse_retries => {
                    warn!(attempt, reason = %reason, "Plan did not parse, asking for a reformat");
                    turns.push(Turn::assistant(raw));
                    turns.push(Turn::user(format!(
                        "That reply could not be parsed ({reason}). Reply again with only the JSON object described above, no prose and no code fences."
                    )));
                    attempt += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Plan rejected");
                    return Err(e.into());
                }
            }
        }
    }

    fn system_prompt(&self) -> String {
        if self.actions.is_empty() {
            return format!("{PLAN_INSTRUCTIONS}\n\nAvailable actions: none");
        }
        format!(
            "{PLAN_INSTRUCTIONS}\n\nAvailable actions: {}",
            self.actions.join(", ")
        )
    }

    fn user_prompt(task: &str, revision: Option<Replan<'_>>) -> String {
        let Some(Replan { previous, context }) = revision else {
            return format!("Task: {task}");
        };
        format!(
            "Task: {task}\n\n\
             The previous plan had to be abandoned.\n\
             Previous plan:\n{}\n{}\n\
             Write a new plan that starts from the current state. Do not repeat completed steps; use what was discovered.",
            previous.render(),
            context.render()
        )
    }

    fn check_actions(&self, plan: &Plan) {
        if self.actions.is_empty() {
            return;
        }
        for name in plan.referenced_actions() {
            if !self.actions.iter().any(|a| a == name) {
                warn!(action = %name, "Plan refers to an action that is not registered");
            }
        }
    }
}

/// Strip incidental formatting around a JSON plan.
///
/// Takes the body of the first code fence if there is one (any language
/// tag is dropped), then falls back to the outermost `{...}` when the text
/// still does not start with `{`.
pub fn normalize_plan_text(text: &str) -> String {
    let mut body = text.trim();

    if let Some(start) = body.find("```") {
        let after = &body[start + 3..];
        let after = match after.find('\n') {
            Some(newline) if !after[..newline].contains('{') => &after[newline + 1..],
            _ => after,
        };
        body = match after.find("```") {
            Some(end) => &after[..end],
            None => after,
        }
        .trim();
    }

    if !body.starts_with('{')
        && let (Some(open), Some(close)) = (body.find('{'), body.rfind('}'))
        && open < close
    {
        body = &body[open..=close];
    }

    body.to_string()
}

/// Parse normalized plan text; the goal and the step list must be non-empty.
pub fn parse_plan(raw: &str) -> Result<Plan, PlanError> {
    let normalized = normalize_plan_text(raw);
    let plan: Plan = serde_json::from_str(&normalized).map_err(|e| PlanError::Parse {
        reason: e.to_string(),
        raw: raw.to_string(),
    })?;

    if plan.goal.trim().is_empty() {
        return Err(PlanError::Parse {
            reason: "plan goal is empty".into(),
            raw: raw.to_string(),
        });
    }
    if plan.steps.is_empty() {
        return Err(PlanError::EmptyPlan);
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use loopwright_core::plan::{PlanStep, RevisionContext};
    use loopwright_tools::GetWeatherAction;
    use std::time::Duration;

    const PLAN_JSON: &str = r#"{"goal":"Report the weather","steps":[{"id":1,"description":"Look up Paris","action":"get_weather","rationale":"need data"}]}"#;

    #[test]
    fn normalize_strips_json_fence() {
        let text = format!("```json\n{PLAN_JSON}\n```");
        assert_eq!(normalize_plan_text(&text), PLAN_JSON);
    }

    #[test]
    fn normalize_strips_bare_fence_and_prose() {
        let text = format!("Here is the plan:\n```\n{PLAN_JSON}\n```\nLet me know!");
        assert_eq!(normalize_plan_text(&text), PLAN_JSON);
    }

    #[test]
    fn normalize_falls_back_to_outer_object() {
        let text = format!("Sure! {PLAN_JSON} Hope that helps.");
        assert_eq!(normalize_plan_text(&text), PLAN_JSON);
    }

    #[test]
    fn normalize_leaves_clean_json_alone() {
        assert_eq!(normalize_plan_text(PLAN_JSON), PLAN_JSON);
    }

    #[test]
    fn parse_rejects_empty_steps_and_goal() {
        assert!(matches!(
            parse_plan(r#"{"goal":"g","steps":[]}"#),
            Err(PlanError::EmptyPlan)
        ));
        assert!(matches!(
            parse_plan(r#"{"goal":" ","steps":[{"id":1,"description":"x"}]}"#),
            Err(PlanError::Parse { .. })
        ));
        assert!(matches!(parse_plan("not json at all"), Err(PlanError::Parse { .. })));
    }

    #[tokio::test]
    async fn create_plan_sends_no_actions() {
        let provider = Arc::new(SequentialMockProvider::single_text(&format!("```json\n{PLAN_JSON}\n```")));
        let registry = ActionRegistry::new().with(Box::new(GetWeatherAction)).unwrap();
        let planner = PlanManager::new(provider.clone(), AgentOptions::new("m")).with_actions(&registry);

        let plan = planner.create_plan("weather in Paris", None, &CancellationToken::new()).await.unwrap();
        assert_eq!(plan.goal, "Report the weather");
        assert_eq!(plan.steps[0].action, "get_weather");

        let sent = provider.requests();
        assert!(sent[0].actions.is_empty());
        assert!(sent[0].turns[0].content.contains("get_weather"));
    }

    #[tokio::test]
    async fn malformed_plan_is_parse_error_without_retry() {
        let provider = Arc::new(SequentialMockProvider::single_text("I would start by looking around."));
        let planner = PlanManager::new(provider.clone(), AgentOptions::new("m"));

        let err = planner.create_plan("task", None, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::Plan(PlanError::Parse { .. })));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn reformat_retry_recovers() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_text_response("Step one: look up Paris."),
            make_text_response(PLAN_JSON),
        ]));
        let planner = PlanManager::new(provider.clone(), AgentOptions::new("m")).with_parse_retries(1);

        let plan = planner.create_plan("task", None, &CancellationToken::new()).await.unwrap();
        assert_eq!(plan.steps.len(), 1);

        let retry = &provider.requests()[1];
        assert_eq!(retry.turns.len(), 4);
        assert!(retry.turns[3].content.contains("could not be parsed"));
    }

    #[tokio::test]
    async fn replan_prompt_carries_previous_plan_and_context() {
        let provider = Arc::new(SequentialMockProvider::single_text(PLAN_JSON));
        let planner = PlanManager::new(provider.clone(), AgentOptions::new("m"));

        let previous = Plan {
            goal: "Summarize app logs".into(),
            steps: vec![PlanStep {
                id: "1".into(),
                description: "Read /var/log/app.log".into(),
                action: "read_file".into(),
                rationale: String::new(),
            }],
        };
        let context = RevisionContext {
            reason: "log file missing".into(),
            completed_steps: vec!["listed /var/log".into()],
            discoveries: vec!["logs rotate into /var/log/app/".into()],
        };

        planner
            .create_plan(
                "summarize logs",
                Some(Replan { previous: &previous, context: &context }),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let prompt = &provider.requests()[0].turns[1].content;
        assert!(prompt.contains("Read /var/log/app.log"));
        assert!(prompt.contains("log file missing"));
        assert!(prompt.contains("listed /var/log"));
        assert!(prompt.contains("logs rotate into /var/log/app/"));
    }

    #[tokio::test(start_paused = true)]
    async fn plan_request_honours_timeout() {
        let planner = PlanManager::new(
            Arc::new(SlowProvider(Duration::from_secs(3600))),
            AgentOptions::new("m").with_request_timeout(Some(Duration::from_secs(5))),
        );

        let started = tokio::time::Instant::now();
        let err = planner.create_plan("task", None, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn plan_request_stops_on_cancel() {
        let planner = PlanManager::new(
            Arc::new(SlowProvider(Duration::from_secs(3600))),
            AgentOptions::new("m").with_request_timeout(None),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let err = planner.create_plan("task", None, &cancel).await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::Cancelled)));
    }
}
