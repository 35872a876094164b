use std::sync::atomic::{AtomicU32, Ordering};

use ignite_consul::{ConsulError, ElectionSession, Membership};

use crate::config::BootstrapConfig;
use crate::error::{BootstrapError, Stage};
use crate::poller::ConvergencePolicy;

/// Waits for a leader election whose session is meaningfully bound.
///
/// A session created before any service registered its checks is bound to the
/// baseline liveness check alone. Such a "lonely" session survives service
/// failures, so it is destroyed and the election repeated until the winning
/// session carries more than the baseline.
pub struct LeaderSessionValidator {
    policy: ConvergencePolicy,
    retrigger_every: u32,
}

impl LeaderSessionValidator {
    pub fn new(policy: ConvergencePolicy, retrigger_every: u32) -> Self {
        Self {
            policy,
            retrigger_every: retrigger_every.max(1),
        }
    }

    pub fn from_config(config: &BootstrapConfig) -> Self {
        Self::new(config.leader_wait, config.election_retrigger_every)
    }

    /// Returns the bound election session once one exists.
    pub async fn wait_for_elected_leader<M>(
        &self,
        membership: &M,
    ) -> Result<ElectionSession, BootstrapError>
    where
        M: Membership + ?Sized,
    {
        loop {
            let session = self.wait_for_session(membership).await?;

            match session {
                Some(session) if session.is_bound() => {
                    info!(
                        session = %session.id,
                        bound_checks = session.bound_check_count,
                        "Leader session is bound."
                    );
                    return Ok(session);
                },
                Some(session) => {
                    warn!(
                        session = %session.id,
                        bound_checks = session.bound_check_count,
                        "Leader session is only bound to the baseline check, destroying it."
                    );
                    membership
                        .destroy_session(&session.id)
                        .await
                        .map_err(|source| BootstrapError::Consul {
                            stage: Stage::Election,
                            source,
                        })?;
                },
                None => {},
            }
        }
    }

    /// Polls until some session holds the leader key.
    ///
    /// Every `retrigger_every` consecutive misses a fresh election trigger is
    /// written to the leader key.
    async fn wait_for_session<M>(
        &self,
        membership: &M,
    ) -> Result<Option<ElectionSession>, BootstrapError>
    where
        M: Membership + ?Sized,
    {
        let misses = AtomicU32::new(0);
        let retrigger_every = self.retrigger_every;

        self.policy
            .converge(
                "election session",
                || probe_session(membership, &misses, retrigger_every),
                Option::is_some,
                |_| "no session ever acquired the leader key".to_string(),
            )
            .await
            .map_err(|source| BootstrapError::Convergence {
                stage: Stage::Election,
                source,
            })
    }
}

/// Reads the election session, writing a new trigger after enough misses.
async fn probe_session<M>(
    membership: &M,
    misses: &AtomicU32,
    retrigger_every: u32,
) -> Result<Option<ElectionSession>, ConsulError>
where
    M: Membership + ?Sized,
{
    let session = membership.election_session().await?;
    if session.is_some() {
        return Ok(session);
    }

    let missed = misses.fetch_add(1, Ordering::Relaxed) + 1;
    info!(misses = missed, "No leader session yet.");
    if missed % retrigger_every == 0 {
        let tag = format!("elect{}", rand::random::<u32>());
        info!(tag = %tag, "Triggering a new leader election.");
        membership.trigger_election(&tag).await?;
    }

    Ok(None)
}
