use super::*;

use shared::acquisition::AcquisitionSource;
use std::{
    collections::HashMap,
    env,
    time::{SystemTime, UNIX_EPOCH},
};

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_match_search_guard_defaults() {
    let settings = Settings::default();
    let config = settings.wizard_config();

    assert_eq!(config.search, DebounceConfig::default());
    assert_eq!(settings.workflow_url, None);
    assert_eq!(
        config.acquisition.to_wire(AcquisitionSource::Facebook).ok(),
        None
    );
}

#[test]
fn file_values_accept_integers_and_strings() {
    let mut settings = Settings::default();
    settings
        .apply_file(
            r#"
workflow_url = "http://127.0.0.1:8080/api"
search_delay_ms = 250
search_min_length = "3"
lossy_acquisition_fallback = true
"#,
        )
        .expect("valid file");

    assert_eq!(
        settings.workflow_url.as_deref(),
        Some("http://127.0.0.1:8080/api")
    );
    assert_eq!(settings.search_delay_ms, 250);
    assert_eq!(settings.search_min_length, 3);
    assert_eq!(
        settings
            .wizard_config()
            .acquisition
            .to_wire(AcquisitionSource::Facebook)
            .ok(),
        Some(WireAcquisitionSource::Other)
    );
}

#[test]
fn environment_overrides_file() {
    let mut settings = Settings::default();
    settings
        .apply_file("workflow_url = \"http://from-file\"\nrequest_timeout_secs = 5")
        .expect("valid file");

    settings.apply_env(env_from(&[
        ("INTAKE_WORKFLOW_URL", "http://legacy"),
        ("APP__WORKFLOW_URL", "http://from-env"),
        ("APP__REQUEST_TIMEOUT_SECS", "30"),
        ("APP__SEARCH_MIN_LENGTH", "not-a-number"),
    ]));

    assert_eq!(settings.workflow_url.as_deref(), Some("http://from-env"));
    assert_eq!(settings.request_timeout(), Duration::from_secs(30));
    assert_eq!(settings.search_min_length, 2);
}

#[test]
fn malformed_file_is_reported() {
    let mut settings = Settings::default();
    assert!(settings.apply_file("workflow_url = ").is_err());
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("intake_cli_missing_{suffix}.toml"));

    let settings = load_settings(&path).expect("settings");

    assert_eq!(settings.search_delay_ms, 500);
}
