//! Per-scenario knobs for the turn executor and iteration loop.

use loopwright_config::AppConfig;
use std::time::Duration;

/// Everything that varies between scenarios that share one executor type.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Model used for decision requests
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Decision/execute steps allowed per loop run
    pub max_iterations: u32,
    /// Log every turn at info level instead of debug
    pub verbose: bool,
    /// Upper bound on a single decision request, provider retries included
    pub request_timeout: Option<Duration>,
    /// Name of the action that ends an attempt with a revision request
    pub revision_action: String,
}

impl AgentOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
            max_iterations: 10,
            verbose: false,
            request_timeout: Some(Duration::from_secs(120)),
            revision_action: "request_revision".into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: Some(config.max_tokens),
            max_iterations: config.agent.max_iterations,
            verbose: config.agent.verbose,
            request_timeout: Some(config.decision_timeout()),
            revision_action: config.agent.revision_action.clone(),
        }
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// `None` disables the bound.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_revision_action(mut self, name: impl Into<String>) -> Self {
        self.revision_action = name.into();
        self
    }
}
