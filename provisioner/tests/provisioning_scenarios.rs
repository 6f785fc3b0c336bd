//! End-to-end provisioning scenarios against the in-memory control plane.

use std::sync::Arc;
use std::time::Duration;

use control_plane::{InMemoryConnector, MockCall, MockControlPlane, RecordingTranscoder};
use osc_shared_types::{InstanceName, InstanceRef, OscError, ServiceId, Subscription};
use provisioner::{
    DatabaseKind, OutputSpec, Provisioner, ProvisionerConfig, ReadinessPolicy, SettleDelays,
};
use tokio_util::sync::CancellationToken;

struct Harness {
    control_plane: Arc<MockControlPlane>,
    storage: Arc<InMemoryConnector>,
    transcoder: Arc<RecordingTranscoder>,
    provisioner: Provisioner,
    cancel: CancellationToken,
}

fn harness() -> Harness {
    harness_with(ReadinessPolicy {
        interval: Duration::from_millis(1),
        max_attempts: 50,
    })
}

fn harness_with(readiness: ReadinessPolicy) -> Harness {
    let control_plane = Arc::new(MockControlPlane::new());
    let storage = Arc::new(InMemoryConnector::new());
    let transcoder = Arc::new(RecordingTranscoder::new());
    let cancel = CancellationToken::new();
    let config = ProvisionerConfig {
        readiness,
        settle: SettleDelays::NONE,
        ..Default::default()
    };
    let provisioner = Provisioner::new(
        control_plane.clone(),
        storage.clone(),
        transcoder.clone(),
        config,
        cancel.clone(),
    );
    Harness {
        control_plane,
        storage,
        transcoder,
        provisioner,
        cancel,
    }
}

fn name(s: &str) -> InstanceName {
    InstanceName::parse(s).unwrap()
}

// ============================================================================
// Databases
// ============================================================================

#[tokio::test]
async fn test_memory_db_on_fresh_control_plane() {
    let h = harness();
    h.control_plane
        .script_health(ServiceId::VALKEY, &[Some("starting"), Some("running")])
        .await;

    let url = h
        .provisioner
        .create_database(&name("cache1"), DatabaseKind::MemoryDb)
        .await
        .unwrap();

    assert_eq!(h.control_plane.create_calls(ServiceId::VALKEY).await, 1);
    assert_eq!(h.control_plane.health_calls(ServiceId::VALKEY).await, 2);

    let rest = url.strip_prefix("redis://").unwrap();
    let (ip, port) = rest.split_once(':').unwrap();
    assert_eq!(ip, "172.232.131.169");
    assert!(port.parse::<u16>().is_ok());
}

#[tokio::test]
async fn test_readiness_timeout_surfaces() {
    let h = harness();
    h.control_plane
        .stick_health(ServiceId::VALKEY, Some("starting"))
        .await;

    let err = h
        .provisioner
        .create_database(&name("cache1"), DatabaseKind::MemoryDb)
        .await
        .unwrap_err();

    assert!(matches!(err, OscError::ReadinessTimeout { attempts: 50, .. }));
}

#[tokio::test]
async fn test_cancellation_stops_provisioning() {
    let h = harness();
    h.control_plane
        .stick_health(ServiceId::VALKEY, Some("starting"))
        .await;
    h.cancel.cancel();

    let err = h
        .provisioner
        .create_database(&name("cache1"), DatabaseKind::MemoryDb)
        .await
        .unwrap_err();
    assert!(matches!(err, OscError::Cancelled));
    assert_eq!(
        h.control_plane
            .count_calls(|c| matches!(c, MockCall::Create(..)))
            .await,
        0
    );
    assert_eq!(h.control_plane.instance_count().await, 0);
}

#[tokio::test]
async fn test_cancelled_pipeline_leaves_nothing_behind() {
    let h = harness_with(ReadinessPolicy {
        interval: Duration::from_millis(1),
        max_attempts: 100_000,
    });
    h.control_plane
        .stick_health(ServiceId::ENCORE_PACKAGER, Some("starting"))
        .await;

    let trigger = h.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = h
        .provisioner
        .create_vod_pipeline(&name("promo"), &OutputSpec::default())
        .await
        .unwrap_err();

    assert!(matches!(err.root_cause(), OscError::Cancelled), "{}", err);
    match &err {
        OscError::PipelineAborted {
            rolled_back,
            left_behind,
            ..
        } => {
            assert_eq!(rolled_back[0], InstanceRef::new(ServiceId::ENCORE_PACKAGER, "promo"));
            assert_eq!(rolled_back.len(), 5);
            assert!(left_behind.is_empty());
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(h.control_plane.instance_count().await, 0);
}

// ============================================================================
// Buckets
// ============================================================================

#[tokio::test]
async fn test_create_bucket_returns_credentials() {
    let h = harness();
    let bucket = h.provisioner.create_bucket(&name("media")).await.unwrap();

    assert_eq!(bucket.name, "media");
    assert_eq!(bucket.access_key_id, "root");
    assert!(bucket.secret_access_key.starts_with("ai"));

    let storage = h.storage.storage(&bucket.endpoint).unwrap();
    assert_eq!(storage.bucket_names(), vec!["media".to_string()]);

    let again = h.provisioner.create_bucket(&name("media")).await.unwrap();
    assert_eq!(again, bucket);
    assert_eq!(h.control_plane.create_calls(ServiceId::MINIO).await, 1);
}

// ============================================================================
// Pipelines
// ============================================================================

#[tokio::test]
async fn test_pipeline_storage_failure_leaves_nothing_behind() {
    let h = harness();
    h.control_plane
        .return_nothing_on_create_for(ServiceId::MINIO)
        .await;

    let err = h
        .provisioner
        .create_vod_pipeline(&name("promo"), &OutputSpec::default())
        .await
        .unwrap_err();

    assert!(matches!(err.root_cause(), OscError::Provision { .. }));
    for service in [
        ServiceId::ENCORE,
        ServiceId::ENCORE_CALLBACK_LISTENER,
        ServiceId::ENCORE_PACKAGER,
    ] {
        assert!(h.control_plane.instance(service, "promo").await.is_none());
    }
}

#[tokio::test]
async fn test_pipeline_removal_reports_partial_failure() {
    let h = harness();
    h.provisioner
        .create_vod_pipeline(&name("promo"), &OutputSpec::default())
        .await
        .unwrap();
    h.control_plane
        .fail_removes_for(ServiceId::ENCORE_CALLBACK_LISTENER)
        .await;

    let err = h
        .provisioner
        .remove_vod_pipeline(&name("promo"), false)
        .await
        .unwrap_err();

    let report = match err {
        OscError::Teardown(report) => report,
        other => panic!("unexpected error: {:?}", other),
    };
    assert_eq!(
        report.failed[0].0,
        InstanceRef::new(ServiceId::ENCORE_CALLBACK_LISTENER, "promo")
    );
    assert!(report
        .removed
        .contains(&InstanceRef::new(ServiceId::ENCORE, "promo")));
    assert!(report
        .removed
        .contains(&InstanceRef::new(ServiceId::ENCORE_PACKAGER, "promo")));

    let message = OscError::Teardown(report).to_string();
    assert!(message.contains("eyevinn-encore-callback-listener/promo"), "{}", message);
}

#[tokio::test]
async fn test_pipeline_lookup_and_vod() {
    let h = harness();
    let created = h
        .provisioner
        .create_vod_pipeline(&name("promo"), &OutputSpec::default())
        .await
        .unwrap();

    let described = h.provisioner.get_vod_pipeline(&name("promo")).await.unwrap();
    assert_eq!(described, created);

    let vod = h
        .provisioner
        .create_vod(&name("promo"), "https://cdn.example/in.mp4")
        .await
        .unwrap();
    let jobs = h.transcoder.jobs().await;
    assert_eq!(jobs[0].0, created.jobs);
    assert_eq!(jobs[0].1.progress_callback_uri, created.callback_url);
    assert!(vod.output_url.starts_with(&created.output));
}

#[tokio::test]
async fn test_vod_on_missing_pipeline() {
    let h = harness();
    let err = h
        .provisioner
        .create_vod(&name("ghost"), "https://cdn.example/in.mp4")
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(h.transcoder.jobs().await.is_empty());
    assert_eq!(
        h.control_plane
            .count_calls(|c| matches!(c, MockCall::Create(..)))
            .await,
        0
    );
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn test_active_services() {
    let h = harness();
    h.control_plane
        .set_subscriptions(vec![Subscription {
            service_id: "encore".into(),
        }])
        .await;

    let services = h.provisioner.list_active_services().await.unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].service_id, "encore");
}
