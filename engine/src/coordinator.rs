//! Coordinator
//!
//! The user-facing role. It keeps one session across turns, starts that
//! session with the current stimulus report pinned in front of the history,
//! tracks goals itself and hands everything else to worker roles through
//! the `delegate_to_<role>` capabilities.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::activity::{LogEntry, LogStore};
use crate::agent::{compose_instruction, Agent, Session, SharedContext};
use crate::capabilities::{
    AddGoalCapability, CapabilityRegistry, CaptureScreenCapability, GoalReportCapability,
    ListDirCapability, ReadFileCapability, RunCommandCapability, UpdateGoalCapability,
    WriteFileCapability,
};
use crate::config::Config;
use crate::delegation::{DelegationEngine, ProviderFactory};
use crate::fs_guard::WorkspaceGuard;
use crate::goals::{GoalStore, StimulusRanker};
use crate::roles::{RoleConfigStore, RoleResolver, RoleSpec, COORDINATOR};
use crate::security_gate::SecurityGate;

/// Log label for user turns
pub const USER_LABEL: &str = "USER";

/// Store handles the team runs against
#[derive(Clone)]
pub struct TeamStores {
    pub goals: Arc<dyn GoalStore>,
    pub logs: Arc<dyn LogStore>,
    pub roles: Arc<dyn RoleConfigStore>,
}

pub struct Coordinator {
    agent: Arc<Agent>,
    goals: Arc<dyn GoalStore>,
    logs: Arc<dyn LogStore>,
    ranker: StimulusRanker,
    project: String,
    token_limit: usize,
    session: Option<Session>,
}

impl Coordinator {
    pub fn new(
        agent: Agent,
        stores: &TeamStores,
        ranker: StimulusRanker,
        project: impl Into<String>,
        token_limit: usize,
    ) -> Self {
        Self {
            agent: Arc::new(agent),
            goals: Arc::clone(&stores.goals),
            logs: Arc::clone(&stores.logs),
            ranker,
            project: project.into(),
            token_limit,
            session: None,
        }
    }

    /// Wire up the whole team from config: worker capabilities, delegation
    /// engine, the coordinator's own capabilities and its provider.
    pub async fn assemble(
        config: &Config,
        stores: &TeamStores,
        providers: Arc<dyn ProviderFactory>,
    ) -> Result<Self> {
        let project = config.core.project_key();
        let team = config.core.team.clone();
        let workspace = config.core.workspace.clone();

        let guard = Arc::new(WorkspaceGuard::new(&workspace)?);
        let mut gate = SecurityGate::new();
        for pattern in &config.terminal.extra_denylist {
            gate.deny_pattern(pattern);
        }
        let gate = Arc::new(gate);

        let workers = CapabilityRegistry::new()
            .with(Arc::new(ReadFileCapability::new(Arc::clone(&guard))))
            .with(Arc::new(WriteFileCapability::new(Arc::clone(&guard))))
            .with(Arc::new(ListDirCapability::new(Arc::clone(&guard))))
            .with(Arc::new(CaptureScreenCapability::new(
                Arc::clone(&guard),
                Arc::clone(&gate),
            )))
            .with(Arc::new(RunCommandCapability::new(
                guard.workspace().to_path_buf(),
                Duration::from_secs(config.terminal.timeout_secs),
                gate,
            )));

        let context = SharedContext::new(guard.workspace().display().to_string(), &project);
        let resolver = RoleResolver::new(config.llm.clone(), config.roles.clone());
        let delegation = Arc::new(
            DelegationEngine::new(
                workers,
                RoleResolver::new(config.llm.clone(), config.roles.clone()),
                Arc::clone(&providers),
                Arc::clone(&stores.roles),
                Arc::clone(&stores.logs),
                context.clone(),
            )
            .with_team(&team)
            .with_limits(config.agent.clone()),
        );

        let ranker = StimulusRanker::new(config.goals.pending_limit);
        let own = CapabilityRegistry::new()
            .with(Arc::new(AddGoalCapability::new(Arc::clone(&stores.goals), &project)))
            .with(Arc::new(UpdateGoalCapability::new(Arc::clone(&stores.goals), &project)))
            .with(Arc::new(GoalReportCapability::new(
                Arc::clone(&stores.goals),
                &project,
                ranker,
            )));
        let spec = RoleSpec::lookup(COORDINATOR)
            .context("coordinator role is missing from the role table")?;
        let mut capabilities = own.scoped_to(spec);
        for delegate in delegation.capabilities() {
            capabilities.register(delegate);
        }

        let role_config = resolver
            .resolve(stores.roles.as_ref(), &project, &team, COORDINATOR)
            .await?;
        let provider = providers.create(&role_config)?;
        info!("Coordinator runs on {}", role_config);

        let instruction =
            compose_instruction(spec.instruction, &context, &capabilities.prompt_section());
        let agent = Agent::new(COORDINATOR, instruction, provider, capabilities).with_limits(
            config.agent.max_iterations,
            config.agent.fragment_queue_capacity,
        );

        Ok(Self::new(
            agent,
            stores,
            ranker,
            project,
            config.agent.max_session_tokens,
        ))
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Fresh session with the current stimulus report pinned
    pub async fn start_session(&self) -> Result<Session> {
        let forest = self
            .goals
            .get_goals(&self.project)
            .await
            .context("Failed to load goals for the stimulus report")?;
        let mut session = Session::with_limit(COORDINATOR, self.token_limit);
        session.pin_context(self.ranker.report(&forest));
        info!("Coordinator session {} started", session.id());
        Ok(session)
    }

    /// Drop the current session; the next turn starts a new one
    pub fn reset(&mut self) {
        self.session = None;
    }

    /// Run one user turn to completion and record it in the activity log
    pub async fn handle(&mut self, input: &str) -> Result<String> {
        self.logs
            .append_entry(&self.project, &LogEntry::now(USER_LABEL, input))
            .await
            .context("Failed to record user turn")?;

        let session = match self.session.take() {
            Some(session) => session,
            None => self.start_session().await?,
        };

        let (result, session) = self.agent.run(session, input).await;
        self.session = Some(session);

        let reply = match result {
            Ok(text) => text,
            Err(e) => {
                warn!("Coordinator turn failed: {}", e);
                return Err(e).context("Coordinator turn failed");
            }
        };

        let label = RoleSpec::lookup(COORDINATOR).map_or("COORDINATOR", |spec| spec.log_label);
        self.logs
            .append_entry(&self.project, &LogEntry::now(label, reply.as_str()))
            .await
            .context("Failed to record coordinator reply")?;
        Ok(reply)
    }
}
