use ignite_consul::{Membership, NodeHealth};
use itertools::Itertools;

use crate::config::BootstrapConfig;
use crate::error::{BootstrapError, Stage};
use crate::poller::ConvergencePolicy;

/// The final gate: every service instance must report only passing checks.
///
/// A service without any registered instance passes unless registered
/// instances are required.
pub struct HealthGate {
    policy: ConvergencePolicy,
    services: Vec<String>,
    require_instances: bool,
}

impl HealthGate {
    pub fn new(policy: ConvergencePolicy, services: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            policy,
            services: services.into_iter().map(Into::into).collect(),
            require_instances: false,
        }
    }

    /// Keep waiting while a service has no registered instance.
    pub fn with_required_instances(mut self, required: bool) -> Self {
        self.require_instances = required;
        self
    }

    /// The control-plane service first, then the data-plane service.
    pub fn from_config(config: &BootstrapConfig) -> Self {
        Self::new(
            config.convergence,
            [
                config.control_plane_service.as_str(),
                config.data_plane_service.as_str(),
            ],
        )
        .with_required_instances(config.require_registered_instances)
    }

    pub async fn wait_until_healthy<M>(&self, membership: &M) -> Result<(), BootstrapError>
    where
        M: Membership + ?Sized,
    {
        let require_instances = self.require_instances;
        for service in &self.services {
            let instances = self
                .policy
                .converge(
                    &format!("{service} health"),
                    || membership.service_health(service),
                    |instances| is_healthy(instances, require_instances),
                    |last| unhealthy_report(service, last),
                )
                .await
                .map_err(|source| BootstrapError::Convergence {
                    stage: Stage::Health,
                    source,
                })?;

            info!(service = %service, num_instances = instances.len(), "Service is healthy.");
        }

        Ok(())
    }
}

fn is_healthy(instances: &[NodeHealth], require_instances: bool) -> bool {
    if require_instances && instances.is_empty() {
        return false;
    }

    instances
            .iter()
            .all(|instance| instance.failing_checks().is_empty())
}

fn unhealthy_report(service: &str, last: Option<&Vec<NodeHealth>>) -> String {
    let instances = match last {
        Some(instances) if !instances.is_empty() => instances,
        _ => return format!("no instance of {service} was ever registered"),
    };

    instances
        .iter()
        .filter_map(|instance| {
            let failing = instance.failing_checks();
            if failing.is_empty() {
                None
            } else {
                Some(format!("{}: [{}]", instance.hostname, failing.iter().join(", ")))
            }
        })
        .join("; ")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ignite_consul::test_utils::{passing_on, MockMembership};
    use ignite_consul::CheckState;

    use super::*;
    use crate::poller::ConvergenceError;

    fn gate() -> HealthGate {
        HealthGate::new(
            ConvergencePolicy::bounded(5, Duration::from_secs(1)),
            ["confd", "ios"],
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_services_become_healthy() -> anyhow::Result<()> {
        let membership = MockMembership::default();
        let mut degraded = passing_on("confd", ["srvnode-1", "srvnode-2"]);
        degraded[1].checks[1].status = "critical".to_string();
        membership.script_health(
            "confd",
            [degraded, passing_on("confd", ["srvnode-1", "srvnode-2"])],
        );
        membership.script_health("ios", [vec![], passing_on("ios", ["srvnode-1"])]);

        gate().wait_until_healthy(&membership).await?;
        assert_eq!(
            membership.num_calls("service_health"),
            3,
            "An unregistered service has nothing failing."
        );

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_required_instances_wait_for_registration() -> anyhow::Result<()> {
        let membership = MockMembership::default();
        membership.script_health("confd", [passing_on("confd", ["srvnode-1"])]);
        membership.script_health(
            "ios",
            [vec![], vec![], passing_on("ios", ["srvnode-1", "client-1"])],
        );

        gate()
            .with_required_instances(true)
            .wait_until_healthy(&membership)
            .await?;
        assert_eq!(membership.num_calls("service_health"), 4);

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_required_instances_never_registered() {
        let membership = MockMembership::default();
        membership.script_health("confd", [vec![]]);

        let err = gate()
            .with_required_instances(true)
            .wait_until_healthy(&membership)
            .await
            .expect_err("Confd never registers.");

        match err {
            BootstrapError::Convergence {
                stage: Stage::Health,
                source: ConvergenceError::Exhausted { diagnostic, .. },
            } => assert_eq!(diagnostic, "no instance of confd was ever registered"),
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_checks_are_reported() {
        let membership = MockMembership::default();
        let mut unhealthy = passing_on("confd", ["srvnode-1", "srvnode-2"]);
        unhealthy[0]
            .checks
            .push(CheckState::new("service:confd:disk", "warning"));
        membership.script_health("confd", [unhealthy]);

        let err = gate()
            .wait_until_healthy(&membership)
            .await
            .expect_err("Confd never becomes healthy.");

        match err {
            BootstrapError::Convergence {
                stage: Stage::Health,
                source: ConvergenceError::Exhausted { diagnostic, attempts, .. },
            } => {
                assert_eq!(attempts, 5);
                assert_eq!(diagnostic, "srvnode-1: [service:confd:disk=warning]");
            },
            other => panic!("Unexpected error: {other:?}"),
        }
        assert_eq!(membership.num_calls("service_health"), 5, "Never reaches ios.");
    }

    #[test]
    fn test_no_instances_is_healthy_unless_required() {
        assert!(is_healthy(&[], false));
        assert!(!is_healthy(&[], true));
        assert_eq!(
            unhealthy_report("ios", None),
            "no instance of ios was ever registered"
        );
    }
}
