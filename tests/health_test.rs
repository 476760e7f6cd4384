mod common;

use jfp_core::BackendId;
use jfp_server::health::HealthRegistry;

#[test]
fn live_request_failures_trip_breaker_after_five() {
    let registry = HealthRegistry::new();
    let id = BackendId::new();
    assert!(registry.is_available(id));

    for _ in 0..4 {
        registry.record_request_failure(id);
        assert!(registry.is_available(id));
    }
    registry.record_request_failure(id);
    assert!(!registry.is_available(id));
}

#[test]
fn request_success_does_not_revive_unavailable_backend() {
    let registry = HealthRegistry::new();
    let id = BackendId::new();
    for _ in 0..5 {
        registry.record_request_failure(id);
    }
    assert!(!registry.is_available(id));

    registry.record_request_success(id);
    assert!(!registry.is_available(id), "only a probe success should revive a backend");
}

#[test]
fn probe_success_revives_unavailable_backend() {
    let registry = HealthRegistry::new();
    let id = BackendId::new();
    for _ in 0..5 {
        registry.record_request_failure(id);
    }
    assert!(!registry.is_available(id));

    registry.record_probe_success(id);
    assert!(registry.is_available(id));
    assert_eq!(registry.status(id).failure_count, 0);
}

#[test]
fn probe_failures_need_two_consecutive_to_trip() {
    let registry = HealthRegistry::new();
    let id = BackendId::new();
    registry.record_probe_failure(id, "timeout");
    assert!(registry.is_available(id));
    registry.record_probe_failure(id, "timeout");
    assert!(!registry.is_available(id));
}
