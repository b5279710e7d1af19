use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use papercast_schema::{Role, Timestamp};
use papercast_store::PodcastStateStore;
use serde::Serialize;

use crate::optimizer::{check_target, OptimizationRequest, OptimizeError, TextualOptimizer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RoleStatus {
    Succeeded,
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleOutcome {
    pub role: Role,
    #[serde(flatten)]
    pub status: RoleStatus,
}

impl RoleOutcome {
    pub fn is_success(&self) -> bool {
        self.status == RoleStatus::Succeeded
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationReport {
    pub prompt_from: Option<Timestamp>,
    pub state: Timestamp,
    pub new_timestamp: Timestamp,
    pub roles: Vec<RoleOutcome>,
}

impl OptimizationReport {
    pub fn all_succeeded(&self) -> bool {
        self.roles.iter().all(RoleOutcome::is_success)
    }

    pub fn all_failed(&self) -> bool {
        self.roles.iter().all(|r| !r.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &RoleOutcome> {
        self.roles.iter().filter(|r| !r.is_success())
    }
}

/// Runs the optimizer for every role of one old→new transition.
pub struct OptimizationDriver {
    optimizer: Arc<TextualOptimizer>,
    states: PodcastStateStore,
    role_timeout: Option<Duration>,
}

impl OptimizationDriver {
    pub fn new(
        optimizer: Arc<TextualOptimizer>,
        states: PodcastStateStore,
        role_timeout: Option<Duration>,
    ) -> Self {
        Self {
            optimizer,
            states,
            role_timeout,
        }
    }

    /// Records `feedback` on the state at `old_timestamp`, then derives a new
    /// version of each role's prompt from the `old_timestamp` version and
    /// writes it under `new_timestamp`, which must be the later of the two.
    pub async fn run(
        &self,
        old_timestamp: &Timestamp,
        new_timestamp: &Timestamp,
        feedback: &str,
    ) -> Result<OptimizationReport, OptimizeError> {
        check_target(Some(old_timestamp), new_timestamp)?;
        self.states.attach_feedback(old_timestamp, feedback).await?;
        self.optimize_all(
            Some(old_timestamp.clone()),
            old_timestamp.clone(),
            new_timestamp.clone(),
        )
        .await
    }

    /// All three roles concurrently. A failing or timed-out role never
    /// affects the others.
    pub async fn optimize_all(
        &self,
        prompt_from: Option<Timestamp>,
        state: Timestamp,
        target: Timestamp,
    ) -> Result<OptimizationReport, OptimizeError> {
        check_target(prompt_from.as_ref(), &target)?;
        let runs = Role::ALL.map(|role| {
            let request = OptimizationRequest {
                role,
                prompt_from: prompt_from.clone(),
                state: state.clone(),
                target: target.clone(),
            };
            async move {
                let status = match self.optimize_one(&request).await {
                    Ok(_) => {
                        tracing::info!(%role, to = %request.target, "role optimization succeeded");
                        RoleStatus::Succeeded
                    }
                    Err(err) => {
                        tracing::warn!("role {role} optimization failed: {err}");
                        RoleStatus::Failed {
                            reason: err.to_string(),
                        }
                    }
                };
                RoleOutcome { role, status }
            }
        });

        let roles = join_all(runs).await;
        Ok(OptimizationReport {
            prompt_from,
            state,
            new_timestamp: target,
            roles,
        })
    }

    /// The timeout bounds the model calls only; a result that made it in
    /// time is always written.
    async fn optimize_one(&self, request: &OptimizationRequest) -> Result<String, OptimizeError> {
        let text = match self.role_timeout {
            Some(limit) => tokio::time::timeout(limit, self.optimizer.propose(request))
                .await
                .map_err(|_| OptimizeError::Timeout(limit))??,
            None => self.optimizer.propose(request).await?,
        };
        self.optimizer.persist(request, &text).await?;
        Ok(text)
    }
}
