use std::io::Write;

use serial_test::serial;

use super::*;

const ENV_KEYS: [&str; 20] = [
    "CASEGEN_LLM_PROVIDER",
    "CASEGEN_LLM_BASE_URL",
    "CASEGEN_LLM_MODEL",
    "CASEGEN_LLM_TIMEOUT_SECS",
    "CASEGEN_LLM_MAX_PROMPT_CHARS",
    "CASEGEN_RETRY_MAX_ATTEMPTS",
    "CASEGEN_RETRY_BASE_DELAY_MS",
    "CASEGEN_RETRY_MAX_JITTER_MS",
    "CASEGEN_INGEST_MAX_UPLOAD_BYTES",
    "CASEGEN_INGEST_MIN_TEXT_CHARS",
    "CASEGEN_STORAGE_BACKEND",
    "CASEGEN_STORAGE_ROOT",
    "CASEGEN_REGISTRY_SQLITE_PATH",
    "CASEGEN_GATEWAY_BIND",
    "CASEGEN_GATEWAY_PORT",
    "CASEGEN_GATEWAY_MAX_BODY_SIZE",
    "CASEGEN_LOG_FORMAT",
    "CASEGEN_GEMINI_API_KEY",
    "GEMINI_API_KEY",
    "CASEGEN_CONFIG",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

fn write_config(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("casegen.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    write!(f, "{body}").unwrap();
    path
}

#[test]
fn defaults_match_documented_values() {
    let config = Config::default();
    assert_eq!(config.llm.provider, ProviderKind::Gemini);
    assert_eq!(config.llm.model, "gemini-2.5-flash");
    assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
    assert!((config.llm.top_p - 0.95).abs() < f32::EPSILON);
    assert_eq!(config.llm.max_output_tokens, 8000);
    assert_eq!(config.llm.max_prompt_chars, 20_000);
    assert_eq!(config.llm.timeout_secs, 120);
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.retry.base_delay_ms, 2000);
    assert_eq!(config.ingest.max_upload_bytes, 10 * MIB);
    assert_eq!(config.ingest.min_text_chars, 50);
    assert_eq!(config.storage.backend, StorageBackend::Fs);
    assert_eq!(config.gateway.port, 8000);
    assert_eq!(config.observability.log_format, LogFormat::Pretty);
    assert!(config.validate().is_ok());
}

#[test]
fn shipped_default_toml_matches_defaults() {
    let shipped: Config =
        toml::from_str(include_str!("../../../../config/default.toml")).unwrap();
    let defaults = Config::default();
    assert_eq!(shipped.llm.provider, defaults.llm.provider);
    assert_eq!(shipped.llm.model, defaults.llm.model);
    assert_eq!(shipped.llm.max_prompt_chars, defaults.llm.max_prompt_chars);
    assert_eq!(shipped.retry.max_attempts, defaults.retry.max_attempts);
    assert_eq!(shipped.retry.base_delay_ms, defaults.retry.base_delay_ms);
    assert_eq!(shipped.ingest.max_upload_bytes, defaults.ingest.max_upload_bytes);
    assert_eq!(shipped.gateway.max_body_size, defaults.gateway.max_body_size);
    assert_eq!(shipped.storage.root, defaults.storage.root);
    assert!(shipped.validate().is_ok());
}

#[test]
#[serial]
fn missing_file_falls_back_to_defaults() {
    clear_env();
    let config = Config::load(std::path::Path::new("/nonexistent/casegen.toml")).unwrap();
    assert_eq!(config.registry.sqlite_path, "./data/casegen.db");
    assert!(config.secrets.gemini_api_key.is_none());
}

#[test]
#[serial]
fn parse_partial_toml_keeps_other_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[llm]
model = "gemini-2.5-pro"

[retry]
max_attempts = 5

[storage]
backend = "memory"

[observability]
log_format = "json"
"#,
    );
    clear_env();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.llm.model, "gemini-2.5-pro");
    assert_eq!(config.llm.max_output_tokens, 8000);
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.base_delay_ms, 2000);
    assert_eq!(config.storage.backend, StorageBackend::Memory);
    assert_eq!(config.observability.log_format, LogFormat::Json);
}

#[test]
#[serial]
fn env_overrides_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[gateway]\nport = 9000\n");
    clear_env();
    unsafe {
        std::env::set_var("CASEGEN_GATEWAY_PORT", "9100");
        std::env::set_var("CASEGEN_LLM_PROVIDER", "MOCK");
        std::env::set_var("CASEGEN_RETRY_BASE_DELAY_MS", "10");
        std::env::set_var("CASEGEN_REGISTRY_SQLITE_PATH", "/tmp/x.db");
    }

    let config = Config::load(&path).unwrap();
    clear_env();

    assert_eq!(config.gateway.port, 9100);
    assert_eq!(config.llm.provider, ProviderKind::Mock);
    assert_eq!(config.retry.base_delay_ms, 10);
    assert_eq!(config.registry.sqlite_path, "/tmp/x.db");
}

#[test]
#[serial]
fn invalid_env_values_are_ignored() {
    clear_env();
    unsafe {
        std::env::set_var("CASEGEN_LLM_PROVIDER", "claude");
        std::env::set_var("CASEGEN_GATEWAY_PORT", "not-a-port");
    }
    let config = Config::load(std::path::Path::new("/nonexistent.toml")).unwrap();
    clear_env();

    assert_eq!(config.llm.provider, ProviderKind::Gemini);
    assert_eq!(config.gateway.port, 8000);
}

#[test]
#[serial]
fn api_key_prefers_prefixed_variable() {
    clear_env();
    unsafe {
        std::env::set_var("GEMINI_API_KEY", "plain");
        std::env::set_var("CASEGEN_GEMINI_API_KEY", "prefixed");
    }
    let config = Config::load(std::path::Path::new("/nonexistent.toml")).unwrap();
    clear_env();

    let key = config.secrets.gemini_api_key.unwrap();
    assert_eq!(key.expose(), "prefixed");
    assert_eq!(format!("{key:?}"), "[REDACTED]");
}

#[test]
#[serial]
fn blank_api_key_is_treated_as_missing() {
    clear_env();
    unsafe { std::env::set_var("CASEGEN_GEMINI_API_KEY", "   ") };
    let config = Config::load(std::path::Path::new("/nonexistent.toml")).unwrap();
    clear_env();
    assert!(config.secrets.gemini_api_key.is_none());
}

#[test]
#[serial]
fn malformed_toml_reports_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[llm\nmodel = ");
    clear_env();
    let err = Config::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("failed to parse config file"));
}

#[test]
fn validate_rejects_zero_attempts() {
    let mut config = Config::default();
    config.retry.max_attempts = 0;
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_body_limit_below_upload_limit() {
    let mut config = Config::default();
    config.gateway.max_body_size = config.ingest.max_upload_bytes - 1;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("gateway.max_body_size"));
}

#[test]
fn validate_rejects_out_of_range_sampling() {
    let mut config = Config::default();
    config.llm.top_p = 1.5;
    assert!(config.validate().is_err());
}
