//! Ask-human action: put a question to a person and wait for the answer.
//!
//! The wait is unbounded; a run that is cancelled drops the pending wait.
//! Where the answer comes from is a [`Prompter`]: the terminal in the CLI,
//! a scripted queue in tests.

use async_trait::async_trait;
use loopwright_core::action::{Action, ActionOutput};
use loopwright_core::error::ActionError;
use std::collections::VecDeque;
use std::io::BufRead;
use std::sync::{Arc, Mutex};
use tokio::io::{self, AsyncWriteExt};
use tokio::sync::mpsc;

/// A source of human answers.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Show `question` and return the reply, trimmed.
    async fn ask(&self, question: &str) -> Result<String, ActionError>;
}

/// Reads answers from the terminal.
///
/// Lines are read on a dedicated thread, one per request. A cancelled `ask`
/// leaves that read with the thread rather than the runtime, so shutdown
/// never waits on the terminal; the line it eventually gets answers the
/// next question.
pub struct StdinPrompter {
    input: tokio::sync::Mutex<Input>,
}

enum Input {
    Idle(Box<dyn BufRead + Send>),
    Reading(LineReader),
    Closed,
}

struct LineReader {
    wanted: std::sync::mpsc::Sender<()>,
    lines: mpsc::UnboundedReceiver<std::io::Result<Option<String>>>,
    in_flight: bool,
}

impl LineReader {
    fn spawn(mut source: Box<dyn BufRead + Send>) -> std::io::Result<Self> {
        let (wanted, requests) = std::sync::mpsc::channel::<()>();
        let (tx, lines) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("loopwright-input".into())
            .spawn(move || {
                while requests.recv().is_ok() {
                    let mut line = String::new();
                    let read = match source.read_line(&mut line) {
                        Ok(0) => Ok(None),
                        Ok(_) => Ok(Some(line)),
                        Err(e) => Err(e),
                    };
                    if tx.send(read).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self {
            wanted,
            lines,
            in_flight: false,
        })
    }

    /// Next line, or `None` at end of input. Safe to cancel.
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        if !self.in_flight {
            self.wanted.send(()).map_err(|_| reader_stopped())?;
            self.in_flight = true;
        }
        let line = self.lines.recv().await.unwrap_or_else(|| Err(reader_stopped()));
        self.in_flight = false;
        line
    }
}

fn reader_stopped() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::BrokenPipe, "input reader stopped")
}

impl StdinPrompter {
    pub fn new() -> Self {
        Self::from_reader(std::io::BufReader::new(std::io::stdin()))
    }

    /// Read answers from `source` instead of the terminal.
    pub fn from_reader(source: impl BufRead + Send + 'static) -> Self {
        Self {
            input: tokio::sync::Mutex::new(Input::Idle(Box::new(source))),
        }
    }
}

impl Default for StdinPrompter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prompter for StdinPrompter {
    async fn ask(&self, question: &str) -> Result<String, ActionError> {
        let io_failed = |e: std::io::Error| ActionError::ExecutionFailed {
            action: "ask_human".into(),
            reason: e.to_string(),
        };
        let closed = || ActionError::ExecutionFailed {
            action: "ask_human".into(),
            reason: "input closed before an answer was given".into(),
        };

        let mut stdout = io::stdout();
        stdout
            .write_all(format!("\n{question}\n> ").as_bytes())
            .await
            .map_err(io_failed)?;
        stdout.flush().await.map_err(io_failed)?;

        let mut input = self.input.lock().await;
        if matches!(*input, Input::Idle(_))
            && let Input::Idle(source) = std::mem::replace(&mut *input, Input::Closed)
        {
            *input = Input::Reading(LineReader::spawn(source).map_err(io_failed)?);
        }
        let Input::Reading(reader) = &mut *input else {
            return Err(closed());
        };

        match reader.next_line().await.map_err(io_failed)? {
            Some(line) => Ok(line.trim().to_string()),
            None => Err(closed()),
        }
    }
}

/// Answers from a fixed queue; records every question it was asked.
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Questions asked so far, in order.
    pub fn questions(&self) -> Vec<String> {
        self.asked.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn ask(&self, question: &str) -> Result<String, ActionError> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(question.to_string());
        }
        self.answers
            .lock()
            .ok()
            .and_then(|mut a| a.pop_front())
            .ok_or_else(|| ActionError::ExecutionFailed {
                action: "ask_human".into(),
                reason: "no scripted answer left".into(),
            })
    }
}

pub struct AskHumanAction {
    prompter: Arc<dyn Prompter>,
}

impl AskHumanAction {
    pub fn new(prompter: Arc<dyn Prompter>) -> Self {
        Self { prompter }
    }
}

#[async_trait]
impl Action for AskHumanAction {
    fn name(&self) -> &str {
        "ask_human"
    }

    fn description(&self) -> &str {
        "Ask the user a question and wait for their answer. Use this to collect information only they can provide."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to ask"
                },
                "options": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Suggested answers to show alongside the question"
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ActionOutput, ActionError> {
        let question = arguments["question"]
            .as_str()
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ActionError::InvalidArguments("Missing 'question' argument".into()))?;

        let options: Vec<&str> = arguments["options"]
            .as_array()
            .map(|opts| opts.iter().filter_map(|o| o.as_str()).collect())
            .unwrap_or_default();

        let prompt = if options.is_empty() {
            question.to_string()
        } else {
            format!("{question} [{}]", options.join(" / "))
        };

        let answer = self.prompter.ask(&prompt).await?;
        if answer.is_empty() {
            return Ok(ActionOutput::ok("(no answer given)"));
        }
        Ok(ActionOutput::ok(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor, Read};
    use std::time::{Duration, Instant};

    /// Hands out whatever the test sends; blocks until then.
    struct Fed(std::sync::mpsc::Receiver<&'static str>);

    impl Read for Fed {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.0.recv() {
                Ok(chunk) => {
                    buf[..chunk.len()].copy_from_slice(chunk.as_bytes());
                    Ok(chunk.len())
                }
                Err(_) => Ok(0),
            }
        }
    }

    #[tokio::test]
    async fn reader_answers_in_order_then_reports_end() {
        let prompter = StdinPrompter::from_reader(Cursor::new("Ada\n  blue  \n"));
        assert_eq!(prompter.ask("Name?").await.unwrap(), "Ada");
        assert_eq!(prompter.ask("Colour?").await.unwrap(), "blue");
        assert!(matches!(
            prompter.ask("More?").await,
            Err(ActionError::ExecutionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn line_after_cancelled_ask_answers_next_question() {
        let (feed, rx) = std::sync::mpsc::channel();
        let prompter = StdinPrompter::from_reader(BufReader::new(Fed(rx)));

        let first = tokio::time::timeout(Duration::from_millis(50), prompter.ask("First?")).await;
        assert!(first.is_err());

        feed.send("late answer\n").unwrap();
        assert_eq!(prompter.ask("Second?").await.unwrap(), "late answer");
    }

    #[test]
    fn cancelled_ask_does_not_hold_up_runtime_shutdown() {
        let (_feed, rx) = std::sync::mpsc::channel::<&'static str>();
        let prompter = StdinPrompter::from_reader(BufReader::new(Fed(rx)));
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();

        let asked = runtime.block_on(async {
            tokio::time::timeout(Duration::from_millis(50), prompter.ask("Still there?")).await
        });
        assert!(asked.is_err());

        let started = Instant::now();
        drop(runtime);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn scripted_answers_in_order() {
        let prompter = Arc::new(ScriptedPrompter::new(["Ada", "blue"]));
        let action = AskHumanAction::new(prompter.clone());

        let first = action
            .execute(serde_json::json!({"question": "Your name?"}))
            .await
            .unwrap();
        let second = action
            .execute(serde_json::json!({
                "question": "Favourite colour?",
                "options": ["red", "blue"]
            }))
            .await
            .unwrap();

        assert_eq!(first.output, "Ada");
        assert_eq!(second.output, "blue");
        assert_eq!(
            prompter.questions(),
            vec!["Your name?", "Favourite colour? [red / blue]"]
        );
    }

    #[tokio::test]
    async fn exhausted_script_is_execution_failure() {
        let action = AskHumanAction::new(Arc::new(ScriptedPrompter::new(Vec::<String>::new())));
        let err = action
            .execute(serde_json::json!({"question": "Anyone there?"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn blank_answer_is_marked() {
        let action = AskHumanAction::new(Arc::new(ScriptedPrompter::new([""])));
        let result = action
            .execute(serde_json::json!({"question": "Anything else?"}))
            .await
            .unwrap();
        assert_eq!(result.output, "(no answer given)");
    }

    #[tokio::test]
    async fn empty_question_rejected() {
        let action = AskHumanAction::new(Arc::new(ScriptedPrompter::new(["x"])));
        let result = action.execute(serde_json::json!({"question": "  "})).await;
        assert!(matches!(result, Err(ActionError::InvalidArguments(_))));
    }
}
