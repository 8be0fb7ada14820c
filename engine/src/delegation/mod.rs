//! Delegation
//!
//! Lets the coordinator hand one instruction to a worker role and get a
//! single text result back. Every delegation:
//!
//! 1. resolves the role's provider and model,
//! 2. starts a fresh session that shares nothing with the caller,
//! 3. builds the agent from the role's fixed instruction and fixed
//!    capability set (the caller's text is only ever the first user turn),
//! 4. drains the run to completion and returns the concatenated text.
//!
//! Failures inside the worker's run are turned into a text result so the
//! coordinator always gets an outcome it can react to.

use async_trait::async_trait;
use sdk::capability::{string_params_schema, Capability};
use sdk::errors::EngineError;
use sdk::types::{CapabilityInput, CapabilityOutput};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::activity::{LogEntry, LogStore};
use crate::agent::{compose_instruction, Agent, Session, SharedContext};
use crate::capabilities::{names, CapabilityRegistry};
use crate::config::{AgentConfig, LLMConfig};
use crate::llm::{LLMProvider, OllamaProvider, OpenAIProvider};
use crate::roles::{AgentRoleConfig, ProviderKind, RoleConfigStore, RoleResolver, RoleSpec};

/// Builds the provider a role runs on
pub trait ProviderFactory: Send + Sync {
    fn create(&self, config: &AgentRoleConfig) -> Result<Arc<dyn LLMProvider>, EngineError>;
}

/// Builds HTTP providers from the `[llm]` config section
pub struct DefaultProviderFactory {
    llm: LLMConfig,
}

impl DefaultProviderFactory {
    pub fn new(llm: LLMConfig) -> Self {
        Self { llm }
    }
}

impl ProviderFactory for DefaultProviderFactory {
    fn create(&self, config: &AgentRoleConfig) -> Result<Arc<dyn LLMProvider>, EngineError> {
        let timeout = Duration::from_secs(self.llm.request_timeout_secs);
        let provider: Arc<dyn LLMProvider> = match config.provider {
            ProviderKind::Ollama => Arc::new(OllamaProvider::with_timeout(
                &self.llm.ollama.base_url,
                &config.model_name,
                timeout,
            )),
            ProviderKind::OpenAI => Arc::new(OpenAIProvider::from_config(
                &self.llm.openai,
                &config.model_name,
                timeout,
            )),
        };
        Ok(provider)
    }
}

/// Runs worker roles on behalf of the coordinator
pub struct DelegationEngine {
    /// Every worker capability; each role gets its own slice of it
    catalog: CapabilityRegistry,
    resolver: RoleResolver,
    providers: Arc<dyn ProviderFactory>,
    role_store: Arc<dyn RoleConfigStore>,
    log_store: Arc<dyn LogStore>,
    context: SharedContext,
    team: String,
    limits: AgentConfig,
}

impl DelegationEngine {
    pub fn new(
        catalog: CapabilityRegistry,
        resolver: RoleResolver,
        providers: Arc<dyn ProviderFactory>,
        role_store: Arc<dyn RoleConfigStore>,
        log_store: Arc<dyn LogStore>,
        context: SharedContext,
    ) -> Self {
        Self {
            catalog,
            resolver,
            providers,
            role_store,
            log_store,
            context,
            team: "default".to_string(),
            limits: AgentConfig::default(),
        }
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = team.into();
        self
    }

    pub fn with_limits(mut self, limits: AgentConfig) -> Self {
        self.limits = limits;
        self
    }

    pub fn project(&self) -> &str {
        &self.context.project
    }

    /// Build the agent for `role` exactly as a delegation would run it
    pub async fn build_agent(&self, role: &str) -> anyhow::Result<Agent> {
        let spec = RoleSpec::lookup(role)
            .filter(|spec| spec.delegatable)
            .ok_or_else(|| EngineError::UnknownRole(role.to_string()))?;

        let role_config = self
            .resolver
            .resolve(self.role_store.as_ref(), self.project(), &self.team, spec.name)
            .await?;
        let provider = self.providers.create(&role_config)?;
        let capabilities = self.catalog.scoped_to(spec);
        let instruction =
            compose_instruction(spec.instruction, &self.context, &capabilities.prompt_section());

        info!(
            "Built {} on {} with capabilities [{}]",
            spec.name,
            role_config,
            capabilities.names().join(", ")
        );

        Ok(Agent::new(spec.name, instruction, provider, capabilities)
            .with_limits(self.limits.max_iterations, self.limits.fragment_queue_capacity))
    }

    /// Run `instruction` on `role` in a fresh session and return its text
    pub async fn delegate(&self, role: &str, instruction: &str) -> anyhow::Result<String> {
        let agent = Arc::new(self.build_agent(role).await?);
        let label = RoleSpec::lookup(role).map_or(role, |spec| spec.log_label);
        self.record(label, format!("Request: {}", instruction)).await;

        let session =
            Session::with_limit(role, self.limits.max_session_tokens).keeping_first_turn();
        info!("Delegating to {} in session {}", role, session.id());

        let (result, session) = agent.run(session, instruction).await;
        let text = result.map_err(|e| EngineError::Delegation(format!("{}: {}", role, e)))?;

        info!(
            "Delegation to {} finished ({} messages, {} chars)",
            role,
            session.history().len(),
            text.len()
        );
        self.record(label, text.clone()).await;
        Ok(text)
    }

    /// Like `delegate`, but failures come back as a description
    pub async fn delegate_text(&self, role: &str, instruction: &str) -> String {
        match self.delegate(role, instruction).await {
            Ok(text) => text,
            Err(e) => {
                error!("Delegation to {} failed: {:#}", role, e);
                format!("Delegation to {} failed: {}", role, e)
            }
        }
    }

    /// One `delegate_to_<role>` capability per delegatable role
    pub fn capabilities(self: &Arc<Self>) -> Vec<Arc<dyn Capability>> {
        RoleSpec::workers()
            .map(|spec| {
                Arc::new(DelegateCapability::new(Arc::clone(self), spec)) as Arc<dyn Capability>
            })
            .collect()
    }

    async fn record(&self, label: &str, content: String) {
        let entry = LogEntry::now(label, content);
        if let Err(e) = self.log_store.append_entry(self.project(), &entry).await {
            warn!("Failed to record delegation activity: {:#}", e);
        }
    }
}

/// `delegate_to_<role>`: hands an instruction to a worker role
pub struct DelegateCapability {
    engine: Arc<DelegationEngine>,
    role: &'static RoleSpec,
    name: String,
    description: String,
}

impl DelegateCapability {
    pub fn new(engine: Arc<DelegationEngine>, role: &'static RoleSpec) -> Self {
        Self {
            engine,
            role,
            name: format!("{}{}", names::DELEGATE_PREFIX, role.name),
            description: format!(
                "Delegate a task to the {}. {}. Returns the {}'s final report.",
                role.name, role.summary, role.name
            ),
        }
    }
}

#[async_trait]
impl Capability for DelegateCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        string_params_schema(&[(
            "instruction",
            "Complete, self-contained description of the task",
            true,
        )])
    }

    async fn invoke(&self, input: CapabilityInput) -> CapabilityOutput {
        let instruction = match input.param_str("instruction") {
            Ok(i) => i,
            Err(e) => return e.into(),
        };
        CapabilityOutput::text(self.engine.delegate_text(self.role.name, &instruction).await)
    }
}
