use super::{Config, LogFormat, ProviderKind, StorageBackend};
use crate::secret::Secret;

fn parse_enum<T: serde::de::DeserializeOwned>(value: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase())).ok()
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_pipeline();
        self.apply_env_overrides_service();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("CASEGEN_LLM_PROVIDER") {
            if let Some(kind) = parse_enum::<ProviderKind>(&v) {
                self.llm.provider = kind;
            } else {
                tracing::warn!("ignoring invalid CASEGEN_LLM_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("CASEGEN_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("CASEGEN_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("CASEGEN_LLM_TIMEOUT_SECS")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.llm.timeout_secs = secs;
        }
        if let Ok(v) = std::env::var("CASEGEN_LLM_MAX_PROMPT_CHARS")
            && let Ok(chars) = v.parse::<usize>()
        {
            self.llm.max_prompt_chars = chars;
        }
    }

    fn apply_env_overrides_pipeline(&mut self) {
        if let Ok(v) = std::env::var("CASEGEN_RETRY_MAX_ATTEMPTS")
            && let Ok(n) = v.parse::<u32>()
        {
            self.retry.max_attempts = n;
        }
        if let Ok(v) = std::env::var("CASEGEN_RETRY_BASE_DELAY_MS")
            && let Ok(ms) = v.parse::<u64>()
        {
            self.retry.base_delay_ms = ms;
        }
        if let Ok(v) = std::env::var("CASEGEN_RETRY_MAX_JITTER_MS")
            && let Ok(ms) = v.parse::<u64>()
        {
            self.retry.max_jitter_ms = ms;
        }
        if let Ok(v) = std::env::var("CASEGEN_INGEST_MAX_UPLOAD_BYTES")
            && let Ok(n) = v.parse::<usize>()
        {
            self.ingest.max_upload_bytes = n;
        }
        if let Ok(v) = std::env::var("CASEGEN_INGEST_MIN_TEXT_CHARS")
            && let Ok(n) = v.parse::<usize>()
        {
            self.ingest.min_text_chars = n;
        }
    }

    fn apply_env_overrides_service(&mut self) {
        if let Ok(v) = std::env::var("CASEGEN_STORAGE_BACKEND") {
            if let Some(backend) = parse_enum::<StorageBackend>(&v) {
                self.storage.backend = backend;
            } else {
                tracing::warn!("ignoring invalid CASEGEN_STORAGE_BACKEND value: {v}");
            }
        }
        if let Ok(v) = std::env::var("CASEGEN_STORAGE_ROOT") {
            self.storage.root = v;
        }
        if let Ok(v) = std::env::var("CASEGEN_REGISTRY_SQLITE_PATH") {
            self.registry.sqlite_path = v;
        }
        if let Ok(v) = std::env::var("CASEGEN_GATEWAY_BIND") {
            self.gateway.bind = v;
        }
        if let Ok(v) = std::env::var("CASEGEN_GATEWAY_PORT")
            && let Ok(port) = v.parse::<u16>()
        {
            self.gateway.port = port;
        }
        if let Ok(v) = std::env::var("CASEGEN_GATEWAY_MAX_BODY_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.gateway.max_body_size = n;
        }
        if let Ok(v) = std::env::var("CASEGEN_LOG_FORMAT") {
            if let Some(format) = parse_enum::<LogFormat>(&v) {
                self.observability.log_format = format;
            } else {
                tracing::warn!("ignoring invalid CASEGEN_LOG_FORMAT value: {v}");
            }
        }
    }

    /// Read the provider API key from the environment.
    ///
    /// `CASEGEN_GEMINI_API_KEY` wins over the plain `GEMINI_API_KEY`.
    pub(crate) fn resolve_secrets(&mut self) {
        let key = std::env::var("CASEGEN_GEMINI_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty());
        if let Some(key) = key {
            self.secrets.gemini_api_key = Some(Secret::new(key));
        }
    }
}
