//! Agent Core
//!
//! Runs one role's think-act-observe loop:
//!
//! 1. Send instruction + session history + capability descriptors to the provider
//! 2. On a capability call: dispatch it, record call and result, loop
//! 3. On a final answer: emit it and stop
//!
//! The loop runs in its own task (the producer) and reports progress as
//! `Fragment`s over a bounded channel. `AgentRun::drain_text` is the
//! consumer side used when a caller needs the whole run as one string.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::Session;
use crate::capabilities::CapabilityRegistry;
use crate::llm::{LLMError, LLMProvider, LLMResponse, Message, ToolCall};

/// Default cap on model round trips per run
pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Default capacity of the fragment queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// One piece of a run's output, in production order
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Text meant for the caller
    Text(String),

    /// The model invoked a capability
    ToolCall(ToolCall),

    /// Result of a capability call, as fed back to the model
    ToolResult {
        call_id: String,
        name: String,
        output: String,
    },
}

/// A role bound to a provider, an instruction and a capability set.
///
/// All three are fixed at construction; the conversation cannot change them.
pub struct Agent {
    role: String,
    instruction: String,
    provider: Arc<dyn LLMProvider>,
    capabilities: CapabilityRegistry,
    max_iterations: usize,
    queue_capacity: usize,
}

impl Agent {
    pub fn new(
        role: impl Into<String>,
        instruction: impl Into<String>,
        provider: Arc<dyn LLMProvider>,
        capabilities: CapabilityRegistry,
    ) -> Self {
        Self {
            role: role.into(),
            instruction: instruction.into(),
            provider,
            capabilities,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Override the iteration cap and fragment queue capacity
    pub fn with_limits(mut self, max_iterations: usize, queue_capacity: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self.queue_capacity = queue_capacity.max(1);
        self
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    /// Start a run of `input` against `session`.
    ///
    /// The session moves into the producer task and is handed back by
    /// `AgentRun::drain_text` once the run ends.
    pub fn stream(self: &Arc<Self>, session: Session, input: impl Into<String>) -> AgentRun {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let agent = Arc::clone(self);
        let input = input.into();
        let fallback = Session::with_limit(session.role(), session.token_limit());

        let handle = tokio::spawn(async move {
            let mut session = session;
            agent.run_loop(&mut session, input, &tx).await;
            session
        });

        AgentRun {
            fragments: rx,
            handle,
            fallback,
        }
    }

    /// Run `input` to completion and return the concatenated text
    pub async fn run(
        self: &Arc<Self>,
        session: Session,
        input: impl Into<String>,
    ) -> (Result<String, LLMError>, Session) {
        self.stream(session, input).drain_text().await
    }

    fn conversation(&self, session: &Session) -> Vec<Message> {
        std::iter::once(Message::system(&self.instruction))
            .chain(session.messages().cloned())
            .collect()
    }

    async fn run_loop(
        &self,
        session: &mut Session,
        input: String,
        tx: &mpsc::Sender<Result<Fragment, LLMError>>,
    ) {
        info!("[{}] run started in session {}", self.role, session.id());
        session.push(Message::user(input));
        let descriptors = self.capabilities.descriptors();

        for iteration in 1..=self.max_iterations {
            debug!("[{}] iteration {}/{}", self.role, iteration, self.max_iterations);

            let messages = self.conversation(session);
            let response = match self.provider.generate(&messages, &descriptors).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("[{}] provider {} failed: {}", self.role, self.provider.name(), e);
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };

            match response {
                LLMResponse::FinalAnswer(answer) => {
                    session.push(Message::assistant(&answer.content));
                    info!("[{}] run finished after {} iterations", self.role, iteration);
                    let _ = tx.send(Ok(Fragment::Text(answer.content))).await;
                    return;
                }
                LLMResponse::ToolCall(call) => {
                    debug!("[{}] capability call: {} ({})", self.role, call.name, call.id);
                    session.push(Message::assistant_tool_call(call.clone()));
                    if tx.send(Ok(Fragment::ToolCall(call.clone()))).await.is_err() {
                        debug!("[{}] reader dropped, stopping run", self.role);
                        return;
                    }

                    let output = self
                        .capabilities
                        .dispatch(&call.name, &call.arguments)
                        .await
                        .to_text();
                    session.push(Message::tool_result(&output, &call.id));

                    let fragment = Fragment::ToolResult {
                        call_id: call.id,
                        name: call.name,
                        output,
                    };
                    if tx.send(Ok(fragment)).await.is_err() {
                        debug!("[{}] reader dropped, stopping run", self.role);
                        return;
                    }
                }
            }
        }

        warn!("[{}] gave up after {} iterations", self.role, self.max_iterations);
        let _ = tx
            .send(Err(LLMError::MaxIterationsExceeded(self.max_iterations)))
            .await;
    }
}

/// Handle on a running agent loop
pub struct AgentRun {
    fragments: mpsc::Receiver<Result<Fragment, LLMError>>,
    handle: JoinHandle<Session>,
    fallback: Session,
}

impl AgentRun {
    /// Next fragment, or `None` once the run has ended
    pub async fn next(&mut self) -> Option<Result<Fragment, LLMError>> {
        self.fragments.recv().await
    }

    /// Wait for the run to end and concatenate its text fragments in
    /// arrival order. Non-text fragments are skipped; the first error ends
    /// the drain.
    pub async fn drain_text(mut self) -> (Result<String, LLMError>, Session) {
        let mut text = String::new();
        let mut failure = None;

        while let Some(fragment) = self.fragments.recv().await {
            match fragment {
                Ok(Fragment::Text(chunk)) => text.push_str(&chunk),
                Ok(_) => {}
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        // Unblock the producer if it is still sending
        self.fragments.close();

        let session = match self.handle.await {
            Ok(session) => session,
            Err(e) => {
                warn!("Agent task ended abnormally: {}", e);
                self.fallback
            }
        };

        match failure {
            Some(e) => (Err(e), session),
            None => (Ok(text), session),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FinalAnswer;
    use async_trait::async_trait;
    use sdk::capability::CapabilityDescriptor;
    use std::sync::Mutex;

    /// Provider that replays a fixed script of responses
    struct Scripted {
        script: Mutex<Vec<Result<LLMResponse, LLMError>>>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl Scripted {
        fn new(mut script: Vec<Result<LLMResponse, LLMError>>) -> Arc<Self> {
            script.reverse();
            Arc::new(Self {
                script: Mutex::new(script),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "script"
        }

        async fn generate(
            &self,
            messages: &[Message],
            _capabilities: &[CapabilityDescriptor],
        ) -> crate::llm::Result<LLMResponse> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(LLMResponse::FinalAnswer(FinalAnswer::new("done"))))
        }
    }

    fn agent(provider: Arc<Scripted>) -> Arc<Agent> {
        Arc::new(Agent::new(
            "tester",
            "You test things.",
            provider,
            CapabilityRegistry::new(),
        ))
    }

    #[tokio::test]
    async fn test_final_answer_drains_to_text() {
        let provider = Scripted::new(vec![Ok(LLMResponse::FinalAnswer(FinalAnswer::new(
            "All green",
        )))]);
        let (text, session) = agent(provider).run(Session::new("tester"), "Run tests").await;

        assert_eq!(text.unwrap(), "All green");
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_tool_call_round_trip_fragments() {
        let provider = Scripted::new(vec![
            Ok(LLMResponse::ToolCall(ToolCall::new("c1", "missing_cap", "{}"))),
            Ok(LLMResponse::FinalAnswer(FinalAnswer::new("recovered"))),
        ]);
        let agent = agent(Arc::clone(&provider));
        let mut run = agent.stream(Session::new("tester"), "go");

        let mut kinds = Vec::new();
        while let Some(fragment) = run.next().await {
            kinds.push(fragment.unwrap());
        }

        assert!(matches!(kinds[0], Fragment::ToolCall(_)));
        match &kinds[1] {
            Fragment::ToolResult { name, output, .. } => {
                assert_eq!(name, "missing_cap");
                assert!(output.contains("Unknown capability"));
            }
            other => panic!("unexpected fragment {:?}", other),
        }
        assert_eq!(kinds[2], Fragment::Text("recovered".to_string()));

        // Second request carries the call and its result
        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[1].len(), 4);
        assert_eq!(seen[1][0].content, "You test things.");
    }

    #[tokio::test]
    async fn test_provider_error_surfaces() {
        let provider = Scripted::new(vec![Err(LLMError::Timeout)]);
        let (text, _) = agent(provider).run(Session::new("tester"), "go").await;
        assert!(matches!(text, Err(LLMError::Timeout)));
    }

    #[tokio::test]
    async fn test_max_iterations() {
        let calls = (0..5)
            .map(|i| Ok(LLMResponse::ToolCall(ToolCall::new(format!("c{}", i), "x", "{}"))))
            .collect();
        let agent = Arc::new(
            Agent::new("tester", "loop", Scripted::new(calls), CapabilityRegistry::new())
                .with_limits(3, 4),
        );
        let (text, _) = agent.run(Session::new("tester"), "go").await;
        assert!(matches!(text, Err(LLMError::MaxIterationsExceeded(3))));
    }

    #[tokio::test]
    async fn test_session_persists_across_runs() {
        let provider = Scripted::new(vec![
            Ok(LLMResponse::FinalAnswer(FinalAnswer::new("one"))),
            Ok(LLMResponse::FinalAnswer(FinalAnswer::new("two"))),
        ]);
        let agent = agent(Arc::clone(&provider));
        let (_, session) = agent.run(Session::new("tester"), "first").await;
        let (text, session) = agent.run(session, "second").await;

        assert_eq!(text.unwrap(), "two");
        assert_eq!(session.history().len(), 4);
    }
}
