//! Integration tests for the error recovery engine.
//!
//! These tests exercise the public API end-to-end: registry lookup,
//! normalization, reporting through the handler, wrapping fallible operations,
//! and bounded retries with backoff.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use faultline::{
    builtin, BackoffStrategy, CodedFailure, ErrorCategory, ErrorRecord, Handler, HandlerConfig,
    Metadata, Normalizer, RawFailure, Registry, RetryController, RetryError, Severity, UiState,
    FALLBACK_CODE,
};
use serde_json::json;

fn quiet_handler() -> Handler {
    Handler::new(
        Arc::new(Registry::default()),
        HandlerConfig::new().with_log_errors(false),
    )
}

// ============================================================================
// Registry Lookup Tests
// ============================================================================

#[test]
fn test_unregistered_codes_resolve_to_fallback() {
    let registry = Registry::builtin();

    for code in ["", "NOT_A_CODE", "network_timeout", "AUTH", "UNKNOWN_ERROR"] {
        let entry = registry.lookup(code);
        assert_eq!(entry.category, ErrorCategory::Unknown, "code {:?}", code);
        assert_eq!(entry.severity, Severity::Critical, "code {:?}", code);
        assert_eq!(entry.ui_state, UiState::FullPage, "code {:?}", code);
        assert!(entry.retryable, "code {:?}", code);
    }
}

#[test]
fn test_every_builtin_code_has_an_entry() {
    let registry = Registry::builtin();
    for code in registry.codes() {
        assert!(registry.contains(code));
        assert!(!registry.lookup(code).user_message.is_empty());
    }
}

// ============================================================================
// Normalization Tests
// ============================================================================

#[test]
fn test_normalize_never_fails_on_odd_values() {
    let normalizer = Normalizer::default();
    let failures = vec![
        RawFailure::Absent,
        RawFailure::from("random string"),
        RawFailure::from(404_i64),
        RawFailure::from(json!(null)),
        RawFailure::from(json!({ "unexpected": true })),
        RawFailure::from(json!({ "code": 17 })),
        RawFailure::Panic("boom".to_string()),
    ];

    for failure in failures {
        let described = failure.describe();
        let record = normalizer.normalize(failure, None, None);
        assert!(!record.code.is_empty(), "failure {:?}", described);
        assert_eq!(record.code, FALLBACK_CODE, "failure {:?}", described);
        assert_eq!(record.severity, Severity::Critical);
        assert!(record.timestamp <= chrono::Utc::now());
    }
}

#[test]
fn test_normalize_is_idempotent_apart_from_metadata() {
    let normalizer = Normalizer::default();
    let failures: Vec<RawFailure> = vec![
        "random string".into(),
        CodedFailure::new(builtin::AUTH_SESSION_EXPIRED, "token expired").into(),
        std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out").into(),
        json!({ "code": builtin::VALIDATION_FAILED, "category": "VALIDATION" }).into(),
    ];

    for failure in failures {
        let once = normalizer.normalize(failure, None, None);
        let twice = normalizer.normalize(
            once.clone(),
            None,
            Some(Metadata::from([("pass".to_string(), json!(2))])),
        );

        assert_eq!(twice.code, once.code);
        assert_eq!(twice.category, once.category);
        assert_eq!(twice.severity, once.severity);
        assert_eq!(twice.context("pass"), Some(&json!(2)));
    }
}

#[test]
fn test_record_json_shape() {
    let record = quiet_handler().report(
        "deadline exceeded",
        Some(builtin::NETWORK_TIMEOUT),
        Some(Metadata::from([("endpoint".to_string(), json!("/feed"))])),
    );
    let value = record.to_json();

    assert_eq!(value["code"], json!("NETWORK_TIMEOUT"));
    assert_eq!(value["category"], json!("NETWORK"));
    assert_eq!(value["severity"], json!("WARNING"));
    assert_eq!(value["ui_state"], json!("INLINE"));
    assert_eq!(value["metadata"]["endpoint"], json!("/feed"));
    assert!(value.get("original_error").is_none());
}

// ============================================================================
// Handler Report Scenarios
// ============================================================================

#[tokio::test]
async fn test_timeout_signal_with_network_timeout_code() {
    let elapsed = tokio::time::timeout(Duration::from_millis(1), std::future::pending::<()>())
        .await
        .unwrap_err();

    let record = quiet_handler().report(elapsed, Some(builtin::NETWORK_TIMEOUT), None);

    assert_eq!(record.category, ErrorCategory::Network);
    assert_eq!(record.severity, Severity::Warning);
    assert_eq!(record.ui_state, UiState::Inline);
    assert!(record.retryable);
}

#[tokio::test]
async fn test_timeout_signal_without_code_is_network() {
    let elapsed = tokio::time::timeout(Duration::from_millis(1), std::future::pending::<()>())
        .await
        .unwrap_err();

    let record = quiet_handler().report(elapsed, None, None);

    assert_eq!(record.code, FALLBACK_CODE);
    assert_eq!(record.category, ErrorCategory::Network);
}

#[test]
fn test_random_string_resolves_to_fallback() {
    let record = quiet_handler().report("random string", None, None);
    let fallback = Registry::builtin().fallback();

    assert_eq!(record.code, FALLBACK_CODE);
    assert_eq!(record.user_message, fallback.user_message);
    assert_ne!(record.user_message, "random string");
    assert_eq!(record.message, "random string");
}

#[test]
fn test_throwing_callback_does_not_escape_report() {
    let handler = quiet_handler();
    handler.configure(
        HandlerConfig::new()
            .with_log_errors(false)
            .with_on_error(|record| panic!("integration down for {}", record.code)),
    );

    let record = handler.report(
        CodedFailure::new(builtin::NETWORK_SERVER_ERROR, "502 Bad Gateway"),
        None,
        None,
    );

    assert_eq!(record.code, builtin::NETWORK_SERVER_ERROR);
    assert_eq!(record.ui_state, UiState::Toast);
}

#[test]
fn test_callback_sees_same_record_as_caller() {
    let handler = quiet_handler();
    let seen: Arc<Mutex<Option<ErrorRecord>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    handler.configure(
        HandlerConfig::new()
            .with_log_errors(false)
            .with_on_error(move |record| *sink.lock().unwrap() = Some(record.clone())),
    );

    let record = handler.report("stream closed", Some(builtin::STREAM_DISCONNECTED), None);

    let seen = seen.lock().unwrap().clone().expect("callback was invoked");
    assert_eq!(seen.code, record.code);
    assert_eq!(seen.timestamp, record.timestamp);
}

// ============================================================================
// Wrap Tests
// ============================================================================

#[tokio::test]
async fn test_wrap_surfaces_classified_failure() {
    let handler = quiet_handler();
    let result: Result<u32, ErrorRecord> = handler
        .wrap(
            async { Err(CodedFailure::new(builtin::AUTH_UNAUTHORIZED, "401")) },
            builtin::DATA_LAYER_QUERY_FAILED,
            None,
        )
        .await;

    let record = result.unwrap_err();
    assert_eq!(record.code, builtin::DATA_LAYER_QUERY_FAILED);
    assert_eq!(record.category, ErrorCategory::DataLayer);
    assert!(record.original_error.is_some());
}

#[tokio::test]
async fn test_wrap_returns_value() {
    let handler = quiet_handler();
    let value = handler
        .wrap(async { Ok::<_, String>("rows") }, builtin::DATA_LAYER_QUERY_FAILED, None)
        .await;
    assert_eq!(value.unwrap(), "rows");
}

// ============================================================================
// Retry Controller Tests
// ============================================================================

#[tokio::test]
async fn test_retry_budget_of_three() {
    let mut controller = RetryController::with_max_attempts(3);
    let calls = AtomicU32::new(0);

    for _ in 0..3 {
        assert!(controller.can_retry());
        let result: Result<(), RetryError<String>> = controller
            .retry(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("offline".to_string())
            })
            .await;
        assert!(matches!(result, Err(RetryError::Failed { .. })));
    }

    assert!(!controller.can_retry());
    let fourth: Result<(), RetryError<String>> = controller
        .retry(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

    assert!(matches!(fourth, Err(RetryError::Exhausted { attempts: 3 })));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_backoff_never_decreases() {
    let strategy = BackoffStrategy::new(Duration::from_millis(50), Duration::from_millis(700), 8, 25);
    let mut controller = RetryController::new(strategy);
    let mut previous = Duration::ZERO;

    while controller.can_retry() {
        let delay = controller.next_delay();
        assert!(delay >= previous);
        previous = delay;
        let _ = controller
            .retry(|| async { Err::<(), _>("still down".to_string()) })
            .await;
    }

    let after = controller.next_delay();
    assert!(after >= previous);
    assert_eq!(after, Duration::from_millis(700));
}

#[tokio::test]
async fn test_reset_restores_can_retry() {
    for max_attempts in [0, 1, 3] {
        let mut controller = RetryController::with_max_attempts(max_attempts);
        while controller.can_retry() {
            let _ = controller
                .retry(|| async { Err::<(), _>("x".to_string()) })
                .await;
        }

        controller.reset();

        assert_eq!(controller.attempt(), 0);
        assert_eq!(controller.can_retry(), max_attempts > 0);
    }
}

#[tokio::test]
async fn test_run_recovers_from_transient_failures() {
    let handler = quiet_handler();
    let reports = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&reports);
    handler.configure(HandlerConfig::new().with_log_errors(false).with_on_error(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    let strategy = BackoffStrategy::new(Duration::from_millis(1), Duration::from_millis(4), 4, 0);
    let mut controller = RetryController::for_entry(
        handler.registry().lookup(builtin::STREAM_DISCONNECTED),
        strategy,
    );
    let calls = AtomicU32::new(0);

    let value = controller
        .run(&handler, builtin::STREAM_DISCONNECTED, || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset",
                ))
            } else {
                Ok("subscribed")
            }
        })
        .await
        .unwrap();

    assert_eq!(value, "subscribed");
    assert_eq!(reports.load(Ordering::SeqCst), 2);
    assert_eq!(controller.state().max_attempts, 5);
}

#[tokio::test]
async fn test_run_escalates_when_budget_is_spent() {
    let handler = quiet_handler();
    let strategy = BackoffStrategy::new(Duration::from_millis(1), Duration::from_millis(2), 2, 0);
    let mut controller = RetryController::new(strategy);

    let record = controller
        .run(&handler, builtin::NETWORK_OFFLINE, || async {
            Err::<(), _>("network unreachable")
        })
        .await
        .unwrap_err();

    assert_eq!(record.code, builtin::NETWORK_OFFLINE);
    assert_eq!(record.ui_state, UiState::FullPage);
    assert_eq!(record.context("escalated"), Some(&json!(true)));
    assert_eq!(record.context("max_attempts"), Some(&json!(2)));
    assert!(!controller.can_retry());
}
