//! Shared test helpers for agent tests.

use async_trait::async_trait;
use loopwright_core::action::{Action, ActionOutput};
use loopwright_core::error::{ActionError, ProviderError};
use loopwright_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use loopwright_core::transcript::{ActionRequest, Turn};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue. With
/// `repeating`, the last response is returned forever; otherwise running
/// out panics.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
    repeat_last: bool,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
            repeat_last: false,
        }
    }

    /// Return `response` for every call.
    pub fn repeating(response: ProviderResponse) -> Self {
        Self {
            repeat_last: true,
            ..Self::new(vec![response])
        }
    }

    /// Create a provider that returns a single text response (no requests).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let count = requests.len();
        requests.push(request);

        let response = match responses.get(count) {
            Some(r) => r.clone(),
            None if self.repeat_last && !responses.is_empty() => responses[responses.len() - 1].clone(),
            None => panic!(
                "SequentialMockProvider: no more responses (call #{count}, have {})",
                responses.len()
            ),
        };
        Ok(response)
    }
}

/// Sleeps for its delay before answering with plain text.
pub struct SlowProvider(pub Duration);

#[async_trait]
impl Provider for SlowProvider {
    fn name(&self) -> &str {
        "slow"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        tokio::time::sleep(self.0).await;
        Ok(make_text_response("too late"))
    }
}

/// Create a simple text response (no action requests).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        turn: Turn::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response with action requests and optional thought text.
pub fn make_request_response(requests: Vec<ActionRequest>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        turn: Turn::assistant_with_requests(thought, requests),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Helper to create an action request with a unique id.
pub fn make_request(name: &str, args: serde_json::Value) -> ActionRequest {
    static NEXT_ID: AtomicUsize = AtomicUsize::new(1);
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    ActionRequest::new(format!("call_{id}"), name, args.to_string())
}

/// Echoes its `text` argument and counts invocations.
pub struct CountingEcho {
    calls: Arc<AtomicUsize>,
}

impl CountingEcho {
    /// Returns the action and a handle to its call counter.
    pub fn tracked() -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Self { calls: calls.clone() }, calls)
    }
}

#[async_trait]
impl Action for CountingEcho {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo text back"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ActionOutput, ActionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = arguments["text"]
            .as_str()
            .ok_or_else(|| ActionError::InvalidArguments("Missing 'text' argument".into()))?;
        Ok(ActionOutput::ok(text))
    }
}

/// Never finishes on its own; only cancellation ends it.
pub struct HangingAction;

#[async_trait]
impl Action for HangingAction {
    fn name(&self) -> &str {
        "hang"
    }

    fn description(&self) -> &str {
        "Blocks forever"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ActionOutput, ActionError> {
        std::future::pending::<()>().await;
        unreachable!()
    }
}
