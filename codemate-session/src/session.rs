//! Session orchestration - one blocking round-trip at a time.
//!
//! The controller owns the conversation context, the history log, the code
//! runner, and the provider. A query appends the prompt, calls the endpoint
//! with the full context, splits the reply, optionally executes the code, and
//! records the outcome. Two failure paths stay separate: endpoint faults
//! propagate as errors, faults in generated code travel as result data.

use std::fmt;

use codemate_error::{Error, ErrorKind};
use codemate_llm::{
    AnthropicProvider, ChatMessage, CompletionRequest, LlmProvider, ProviderConfig,
    ProviderError, UsageTracker,
};
use tracing::debug;

use crate::history::{History, QueryResult};
use crate::parse;
use crate::runner::CodeRunner;

/// Upper bound on the size of a single model reply
const MAX_RESPONSE_TOKENS: usize = 4000;

/// Environment variable supplying the default API credential
pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

/// Ordered log of conversation turns, giving the model memory across queries.
///
/// Turns are appended in strict chronological order and never mutated or
/// removed; the only other operation is a wholesale clear. Never persisted.
#[derive(Debug, Default)]
pub struct ConversationContext {
    messages: Vec<ChatMessage>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_user(&mut self, content: &str) {
        self.messages.push(ChatMessage::user(content));
    }

    fn push_assistant(&mut self, content: &str) {
        self.messages.push(ChatMessage::assistant(content));
    }

    fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Collaborator that renders formatted text to a human observer.
///
/// The core surfaces explanations through this seam and never renders
/// anything itself.
pub trait Presenter {
    /// Render a markdown fragment
    fn markdown(&self, text: &str);
}

/// Per-query knobs
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Model identifier override; provider default when None
    pub model: Option<String>,
    /// Run the extracted code after parsing
    pub execution: bool,
    /// Surface a non-empty explanation through the presenter
    pub display_explanation: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            model: None,
            execution: true,
            display_explanation: true,
        }
    }
}

/// The session orchestrator
pub struct SessionController<P: LlmProvider> {
    provider: P,
    context: ConversationContext,
    history: History,
    runner: CodeRunner,
    usage: UsageTracker,
    presenter: Option<Box<dyn Presenter>>,
}

impl<P: LlmProvider> fmt::Debug for SessionController<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("context", &self.context)
            .field("history", &self.history)
            .field("usage", &self.usage)
            .field("has_presenter", &self.presenter.is_some())
            .finish_non_exhaustive()
    }
}

impl SessionController<AnthropicProvider> {
    /// Build a controller against the Anthropic endpoint.
    ///
    /// The credential comes from `api_key` or, failing that, from
    /// ANTHROPIC_API_KEY. With neither, construction fails; there is no
    /// fallback credential.
    pub fn from_env(api_key: Option<String>) -> Result<Self, Error> {
        let key = api_key
            .or_else(|| std::env::var(API_KEY_VAR).ok())
            .ok_or_else(|| Error::missing_api_key().with_operation("session::from_env"))?;

        Ok(Self::new(AnthropicProvider::new(ProviderConfig::anthropic(
            key,
        ))))
    }
}

impl<P: LlmProvider> SessionController<P> {
    /// Create a controller over an injected provider with a fresh context,
    /// history, and execution environment
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            context: ConversationContext::new(),
            history: History::new(),
            runner: CodeRunner::new(),
            usage: UsageTracker::new(),
            presenter: None,
        }
    }

    /// Install the presentation collaborator
    pub fn with_presenter(mut self, presenter: Box<dyn Presenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    /// Substitute the code runner (and with it the execution namespace)
    pub fn with_runner(mut self, runner: CodeRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn default_model(&self) -> &str {
        self.provider.default_model()
    }

    /// Drive one full round-trip: record the prompt, call the endpoint with
    /// the accumulated context, split the reply, optionally execute, record.
    pub async fn query(
        &mut self,
        prompt: &str,
        options: &QueryOptions,
    ) -> Result<QueryResult, Error> {
        // The user turn goes in before any network interaction; a failed
        // call leaves the context ready for a retry-by-resend.
        self.context.push_user(prompt);

        let mut request = CompletionRequest::new(self.context.messages().to_vec())
            .with_max_tokens(MAX_RESPONSE_TOKENS);
        if let Some(model) = &options.model {
            request = request.with_model(model.clone());
        }

        debug!(
            context_messages = self.context.len(),
            execution = options.execution,
            "querying completion endpoint"
        );

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| provider_error(e).with_operation("session::query"))?;

        let content = response
            .content
            .clone()
            .ok_or_else(|| Error::empty_response().with_operation("session::query"))?;

        self.usage.track(&response.model, &response.usage);
        self.context.push_assistant(&content);

        let code = parse::extract_code(&content);
        let explanation = parse::extract_explanation(&content);

        if options.display_explanation && !explanation.is_empty() {
            if let Some(presenter) = &self.presenter {
                presenter.markdown(&explanation);
            }
        }

        if !options.execution {
            return Ok(QueryResult {
                code,
                output: None,
                error: None,
                explanation,
            });
        }

        let run = self.runner.execute(&code);
        let result = QueryResult {
            code,
            output: Some(run.output),
            error: run.error,
            explanation,
        };
        self.history.push(result.clone());
        Ok(result)
    }

    /// Drop all conversation turns. History and the execution namespace are
    /// untouched.
    pub fn clear_context(&mut self) {
        debug!(dropped = self.context.len(), "clearing conversation context");
        self.context.clear();
    }

    pub fn context_len(&self) -> usize {
        self.context.len()
    }

    /// Executed round-trips, in call order
    pub fn history(&self) -> &[QueryResult] {
        self.history.entries()
    }

    /// History as a human-readable document
    pub fn render_history(&self) -> String {
        self.history.render()
    }

    /// Code from the most recent executed query
    pub fn last_code(&self) -> Option<&str> {
        self.history.last().map(|result| result.code.as_str())
    }

    /// Token usage accumulated across queries
    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }
}

/// Map an endpoint fault onto the unified error type
fn provider_error(err: ProviderError) -> Error {
    let message = err.to_string();
    match err {
        ProviderError::Network(_) => Error::new(ErrorKind::NetworkFailed, message),
        ProviderError::Api { status, .. } => Error::api_rejected(status, message),
        ProviderError::Parse(_) => Error::new(ErrorKind::ParseFailed, message),
        ProviderError::RateLimited { .. } => Error::new(ErrorKind::RateLimited, message),
        ProviderError::AuthenticationFailed => Error::new(ErrorKind::AuthFailed, message),
        ProviderError::Other(_) => Error::unexpected(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codemate_llm::{ChatMessage, CompletionResponse, FinishReason, Usage};
    use std::sync::{Arc, Mutex};

    /// Provider that replays scripted replies in order
    struct CannedProvider {
        replies: Mutex<Vec<String>>,
        seen_messages: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
    }

    impl CannedProvider {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
                seen_messages: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn seen_messages(&self) -> Arc<Mutex<Vec<Vec<ChatMessage>>>> {
            self.seen_messages.clone()
        }
    }

    impl LlmProvider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        fn models(&self) -> Vec<String> {
            vec!["canned-model".into()]
        }

        fn default_model(&self) -> &str {
            "canned-model"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            self.seen_messages.lock().unwrap().push(request.messages);
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(ProviderError::Other("no scripted reply left".into()));
            }
            Ok(CompletionResponse {
                id: "msg_test".into(),
                model: request.model.unwrap_or_else(|| "canned-model".into()),
                content: Some(replies.remove(0)),
                finish_reason: FinishReason::Stop,
                usage: Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                },
            })
        }
    }

    struct RecordingPresenter {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Presenter for RecordingPresenter {
        fn markdown(&self, text: &str) {
            self.seen.lock().unwrap().push(text.to_string());
        }
    }

    #[tokio::test]
    async fn test_query_executes_and_records() {
        let provider =
            CannedProvider::new(&["Sum:\n```python\nprint(1 + 1)\n```\nDone."]);
        let mut session = SessionController::new(provider);

        let result = session
            .query("add one and one", &QueryOptions::default())
            .await
            .unwrap();

        assert_eq!(result.code, "print(1 + 1)");
        assert_eq!(result.output.as_deref(), Some("2\n"));
        assert_eq!(result.error, None);
        assert_eq!(result.explanation, "Sum:\n\nDone.");
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.context_len(), 2);
    }

    #[tokio::test]
    async fn test_context_accumulates_across_queries() {
        let provider = CannedProvider::new(&["first reply", "second reply"]);
        let seen = provider.seen_messages();
        let mut session = SessionController::new(provider);
        let options = QueryOptions {
            execution: false,
            ..QueryOptions::default()
        };

        session.query("first prompt", &options).await.unwrap();
        session.query("second prompt", &options).await.unwrap();

        assert_eq!(session.context_len(), 4);

        // The second call must carry the whole conversation
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].len(), 1);
        let second_call = &seen[1];
        assert_eq!(second_call.len(), 3);
        assert_eq!(second_call[0].content, "first prompt");
        assert_eq!(second_call[1].content, "first reply");
        assert_eq!(second_call[2].content, "second prompt");
    }

    #[tokio::test]
    async fn test_execution_disabled_skips_history() {
        let provider = CannedProvider::new(&["```python\nprint('skip')\n```"]);
        let mut session = SessionController::new(provider);
        let options = QueryOptions {
            execution: false,
            ..QueryOptions::default()
        };

        let result = session.query("anything", &options).await.unwrap();

        assert_eq!(result.code, "print('skip')");
        assert_eq!(result.output, None);
        assert_eq!(result.error, None);
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_clear_context_preserves_history() {
        let provider = CannedProvider::new(&["```python\nprint('kept')\n```"]);
        let mut session = SessionController::new(provider);

        session
            .query("run something", &QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(session.context_len(), 2);
        assert_eq!(session.history().len(), 1);

        session.clear_context();

        assert_eq!(session.context_len(), 0);
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn test_history_matches_results_in_order() {
        let provider = CannedProvider::new(&[
            "```python\nprint('a')\n```",
            "```python\nprint('b')\n```",
        ]);
        let mut session = SessionController::new(provider);

        let first = session
            .query("one", &QueryOptions::default())
            .await
            .unwrap();
        let second = session
            .query("two", &QueryOptions::default())
            .await
            .unwrap();

        assert_eq!(session.history().to_vec(), vec![first, second]);
        assert_eq!(session.last_code(), Some("print('b')"));
    }

    #[tokio::test]
    async fn test_execution_fault_is_result_data() {
        let provider = CannedProvider::new(&["```python\n1/0\n```"]);
        let mut session = SessionController::new(provider);

        let result = session
            .query("divide by zero", &QueryOptions::default())
            .await
            .unwrap();

        assert_eq!(result.output.as_deref(), Some(""));
        assert!(result.error.unwrap().contains("ZeroDivisionError"));
        // the fault still counts as an executed round-trip
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn test_namespace_persists_between_queries() {
        let provider =
            CannedProvider::new(&["```python\nx = 5\n```", "```python\nprint(x)\n```"]);
        let mut session = SessionController::new(provider);

        session
            .query("define x", &QueryOptions::default())
            .await
            .unwrap();
        let result = session
            .query("print x", &QueryOptions::default())
            .await
            .unwrap();

        assert_eq!(result.output.as_deref(), Some("5\n"));
    }

    #[tokio::test]
    async fn test_reply_with_no_code_executes_as_noop() {
        let provider = CannedProvider::new(&["No code needed here."]);
        let mut session = SessionController::new(provider);

        let result = session
            .query("just chat", &QueryOptions::default())
            .await
            .unwrap();

        assert_eq!(result.code, "");
        assert_eq!(result.output.as_deref(), Some(""));
        assert_eq!(result.error, None);
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn test_explanation_surfaced_through_presenter() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let provider = CannedProvider::new(&[
            "Look:\n```python\nprint(0)\n```",
            "```python\nprint(1)\n```",
        ]);
        let mut session = SessionController::new(provider).with_presenter(Box::new(
            RecordingPresenter { seen: seen.clone() },
        ));

        session
            .query("explain", &QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(seen.lock().unwrap().clone(), vec!["Look:".to_string()]);

        // a code-only reply has an empty explanation, so nothing is surfaced
        session
            .query("silent", &QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_display_explanation_disabled() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let provider = CannedProvider::new(&["Prose only."]);
        let mut session = SessionController::new(provider).with_presenter(Box::new(
            RecordingPresenter { seen: seen.clone() },
        ));
        let options = QueryOptions {
            display_explanation: false,
            ..QueryOptions::default()
        };

        let result = session.query("quiet", &options).await.unwrap();

        assert_eq!(result.explanation, "Prose only.");
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_keeps_user_turn() {
        let provider = CannedProvider::new(&[]);
        let mut session = SessionController::new(provider);

        let err = session
            .query("doomed", &QueryOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unexpected);
        // the prompt stays recorded so the caller can retry by resending
        assert_eq!(session.context_len(), 1);
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_model_override_reaches_provider() {
        let provider = CannedProvider::new(&["ok"]);
        let mut session = SessionController::new(provider);
        let options = QueryOptions {
            model: Some("canned-model-next".into()),
            execution: false,
            ..QueryOptions::default()
        };

        session.query("pick a model", &options).await.unwrap();

        assert_eq!(session.usage().total_calls, 1);
        assert!(session.usage().by_model.contains_key("canned-model-next"));
    }

    #[test]
    fn test_from_env_requires_credential() {
        std::env::remove_var(API_KEY_VAR);
        let err = SessionController::from_env(None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingApiKey);

        let session = SessionController::from_env(Some("sk-ant-test".into())).unwrap();
        assert_eq!(session.default_model(), "claude-3-5-sonnet-20240620");
    }
}
