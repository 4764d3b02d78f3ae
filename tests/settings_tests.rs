//! Integration tests for settings loading.
//!
//! These tests touch process environment variables, so they run serialized.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use faultline::settings::Settings;
use faultline::{ErrorCategory, FaultlineError, Handler, RetryController, UiState};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

const SETTINGS_TOML: &str = r#"
log_errors = false

[retry]
base_delay_ms = 100
max_delay_ms = 2000
max_attempts = 4
jitter_percent = 0
"#;

#[test]
fn test_load_settings_file() {
    let _env = env_lock();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("faultline.toml");
    std::fs::write(&path, SETTINGS_TOML).unwrap();

    let settings = Settings::load(&path).unwrap();

    assert!(!settings.log_errors);
    assert_eq!(settings.retry.max_attempts, 4);
    let strategy = settings.retry.strategy();
    assert_eq!(strategy.base_delay, Duration::from_millis(100));
    assert_eq!(strategy.delay_for(10), Duration::from_millis(2000));
}

#[test]
fn test_environment_overrides_file() {
    let _env = env_lock();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("faultline.toml");
    std::fs::write(&path, SETTINGS_TOML).unwrap();

    std::env::set_var("FAULTLINE__RETRY__MAX_ATTEMPTS", "9");
    let settings = Settings::load(&path);
    std::env::remove_var("FAULTLINE__RETRY__MAX_ATTEMPTS");

    let settings = settings.unwrap();
    assert_eq!(settings.retry.max_attempts, 9);
    assert_eq!(settings.retry.base_delay_ms, 100);
}

#[test]
fn test_missing_settings_file_is_an_error() {
    let _env = env_lock();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    let result = Settings::load(dir.path().join("absent.toml"));

    assert!(matches!(result, Err(FaultlineError::Settings(_))));
}

#[test]
fn test_handler_from_settings_with_registry_file() {
    let _env = env_lock();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let registry_path = dir.path().join("registry.toml");
    std::fs::write(
        &registry_path,
        r#"
        [codes.PAYMENT_DECLINED]
        category = "VALIDATION"
        severity = "WARNING"
        ui_state = "MODAL"
        retryable = false
        user_message = "Your card was declined."

        [codes.SYNC_LAGGING]
        category = "DATA_LAYER"
        severity = "INFO"
        ui_state = "TOAST"
        retryable = true
        user_message = "Still syncing."
        max_retries = 6
        "#,
    )
    .unwrap();

    let settings_path = dir.path().join("faultline.toml");
    std::fs::write(
        &settings_path,
        format!(
            "log_errors = false\nregistry_file = {:?}\n",
            registry_path.display().to_string()
        ),
    )
    .unwrap();

    let settings = Settings::load(&settings_path).unwrap();
    let handler = Arc::new(Handler::from_settings(&settings).unwrap());

    let record = handler.report("card declined", Some("PAYMENT_DECLINED"), None);
    assert_eq!(record.category, ErrorCategory::Validation);
    assert_eq!(record.ui_state, UiState::Modal);
    assert_eq!(record.user_message, "Your card was declined.");

    let controller = RetryController::for_entry(
        handler.registry().lookup("SYNC_LAGGING"),
        settings.retry.strategy(),
    );
    assert_eq!(controller.state().max_attempts, 6);
}

#[test]
fn test_invalid_registry_file_fails_handler_construction() {
    let _env = env_lock();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let registry_path = dir.path().join("registry.toml");
    std::fs::write(
        &registry_path,
        r#"
        [fallback]
        category = "UNKNOWN"
        severity = "WARNING"
        ui_state = "FULL_PAGE"
        retryable = true
        user_message = "Oops."
        "#,
    )
    .unwrap();

    let settings = Settings {
        registry_file: Some(registry_path),
        ..Settings::default()
    };

    let result = Handler::from_settings(&settings);
    assert!(matches!(result, Err(FaultlineError::InvalidFallback(_))));
}
