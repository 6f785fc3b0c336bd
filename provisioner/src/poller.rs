//! Bounded, cancellable wait for an instance to report healthy.

use control_plane_interface::{ControlPlane, ServiceAccessToken};
use osc_shared_types::{InstanceState, OscError, Result, ServiceId};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ReadinessPolicy;

/// Poll `name`'s health until it reports running.
///
/// Sleeps `policy.interval` before every health check. Returns the number of
/// checks performed. A status of `failed`/`error` ends the wait immediately.
pub async fn await_ready(
    control_plane: &dyn ControlPlane,
    service: ServiceId,
    name: &str,
    token: &ServiceAccessToken,
    policy: &ReadinessPolicy,
    cancel: &CancellationToken,
) -> Result<u32> {
    for attempt in 1..=policy.max_attempts {
        tokio::select! {
            _ = cancel.cancelled() => return Err(OscError::Cancelled),
            _ = tokio::time::sleep(policy.interval) => {}
        }

        let status = tokio::select! {
            _ = cancel.cancelled() => return Err(OscError::Cancelled),
            status = control_plane.get_instance_health(service, name, token) => status?,
        };

        match InstanceState::from_health(status.as_deref()) {
            InstanceState::Ready => {
                debug!(service = %service, instance = %name, attempt, "Instance is running");
                return Ok(attempt);
            }
            InstanceState::Failed => {
                return Err(OscError::InstanceFailed {
                    service,
                    name: name.to_string(),
                    status: status.unwrap_or_default(),
                });
            }
            _ => {
                debug!(
                    service = %service,
                    instance = %name,
                    attempt,
                    status = ?status,
                    "Instance not ready yet"
                );
            }
        }
    }

    Err(OscError::ReadinessTimeout {
        service,
        name: name.to_string(),
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use control_plane::MockControlPlane;
    use osc_shared_types::Instance;
    use std::time::Duration;

    const SERVICE: ServiceId = ServiceId::ENCORE;

    fn policy(max_attempts: u32) -> ReadinessPolicy {
        ReadinessPolicy {
            interval: Duration::from_millis(1),
            max_attempts,
        }
    }

    async fn setup() -> (MockControlPlane, ServiceAccessToken) {
        let cp = MockControlPlane::new();
        cp.insert_instance(Instance::new(SERVICE, "promo", "https://promo.example"))
            .await;
        let token = cp.get_service_access_token(SERVICE).await.unwrap();
        (cp, token)
    }

    #[tokio::test]
    async fn test_ready_after_three_polls() {
        let (cp, token) = setup().await;
        cp.script_health(SERVICE, &[Some("starting"), Some("starting"), Some("running")])
            .await;

        let attempts = await_ready(&cp, SERVICE, "promo", &token, &policy(10), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(attempts, 3);
        assert_eq!(cp.health_calls(SERVICE).await, 3);
    }

    #[tokio::test]
    async fn test_times_out_after_max_attempts() {
        let (cp, token) = setup().await;
        cp.stick_health(SERVICE, Some("starting")).await;

        let err = await_ready(&cp, SERVICE, "promo", &token, &policy(5), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, OscError::ReadinessTimeout { attempts: 5, .. }));
        assert_eq!(cp.health_calls(SERVICE).await, 5);
    }

    #[tokio::test]
    async fn test_missing_status_keeps_polling() {
        let (cp, token) = setup().await;
        cp.script_health(SERVICE, &[None, None]).await;

        let attempts = await_ready(&cp, SERVICE, "promo", &token, &policy(10), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_failed_status_ends_wait() {
        let (cp, token) = setup().await;
        cp.script_health(SERVICE, &[Some("starting"), Some("failed")]).await;

        let err = await_ready(&cp, SERVICE, "promo", &token, &policy(10), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OscError::InstanceFailed { .. }));
        assert_eq!(cp.health_calls(SERVICE).await, 2);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_wait() {
        let (cp, token) = setup().await;
        cp.stick_health(SERVICE, Some("starting")).await;
        let cancel = CancellationToken::new();
        let slow = ReadinessPolicy {
            interval: Duration::from_secs(60),
            max_attempts: 10,
        };

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = await_ready(&cp, SERVICE, "promo", &token, &slow, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, OscError::Cancelled));
        assert_eq!(cp.health_calls(SERVICE).await, 0);
    }
}
