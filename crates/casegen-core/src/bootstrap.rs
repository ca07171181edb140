//! Application bootstrap: config resolution, provider/storage/registry construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use casegen_llm::any::AnyProvider;
use casegen_llm::gemini::GeminiProvider;
use casegen_llm::prompt::PromptBuilder;
use casegen_llm::{GenerationClient, RetryPolicy, SamplingParams};
use casegen_storage::{ArtifactStore, FsObjectStore, InMemoryObjectStore, MetadataRegistry, ObjectStore};

use crate::catalog::Catalog;
use crate::config::{Config, ProviderKind, StorageBackend};
use crate::extractor::Extractor;
use crate::orchestrator::{IngestLimits, Orchestrator};

/// Priority: explicit `--config` > `CASEGEN_CONFIG` env > `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("CASEGEN_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

/// # Errors
///
/// Returns an error if the selected provider is missing credentials or was not
/// compiled in.
pub fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    match config.llm.provider {
        ProviderKind::Gemini => {
            let key = config
                .secrets
                .gemini_api_key
                .as_ref()
                .context("CASEGEN_GEMINI_API_KEY is required for the gemini provider")?;
            let client =
                casegen_llm::http::build_client(Duration::from_secs(config.llm.timeout_secs))
                    .context("failed to build HTTP client")?;
            let provider =
                GeminiProvider::new(client, key.expose().to_owned(), config.llm.model.clone())
                    .with_base_url(config.llm.base_url.as_str());
            Ok(AnyProvider::Gemini(provider))
        }
        #[cfg(feature = "mock")]
        ProviderKind::Mock => Ok(AnyProvider::Mock(casegen_llm::mock::MockProvider::default())),
        #[cfg(not(feature = "mock"))]
        ProviderKind::Mock => anyhow::bail!("provider \"mock\" requires the `mock` feature"),
    }
}

#[must_use]
pub fn retry_policy(config: &Config) -> RetryPolicy {
    RetryPolicy::new(
        config.retry.max_attempts,
        Duration::from_millis(config.retry.base_delay_ms),
    )
    .with_max_jitter(Duration::from_millis(config.retry.max_jitter_ms))
}

#[must_use]
pub fn prompt_builder(config: &Config) -> PromptBuilder {
    PromptBuilder::new(
        config.llm.max_prompt_chars,
        SamplingParams {
            temperature: config.llm.temperature,
            top_p: config.llm.top_p,
            max_output_tokens: config.llm.max_output_tokens,
        },
    )
}

/// # Errors
///
/// Returns an error if the filesystem root cannot be created.
pub async fn create_object_store(config: &Config) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config.storage.backend {
        StorageBackend::Fs => {
            let store = FsObjectStore::open(&config.storage.root)
                .await
                .with_context(|| {
                    format!("failed to open artifact store at {}", config.storage.root)
                })?;
            tracing::info!(root = %store.root().display(), "filesystem artifact store ready");
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            tracing::warn!("in-memory artifact store: artifacts are lost on exit");
            Ok(Arc::new(InMemoryObjectStore::new()))
        }
    }
}

/// # Errors
///
/// Returns an error if the database directory or file cannot be created.
pub async fn create_registry(config: &Config) -> anyhow::Result<MetadataRegistry> {
    let path = config.registry.sqlite_path.as_str();
    if path != ":memory:"
        && let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    MetadataRegistry::connect(path)
        .await
        .with_context(|| format!("failed to open metadata registry at {path}"))
}

fn default_extractor() -> anyhow::Result<Extractor> {
    #[cfg(feature = "pdf")]
    {
        Ok(Extractor::default())
    }
    #[cfg(not(feature = "pdf"))]
    {
        anyhow::bail!("built without the `pdf` feature: no PDF reader available")
    }
}

/// Shared handles for one process, built once at startup.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub orchestrator: Arc<Orchestrator<AnyProvider>>,
    pub catalog: Arc<Catalog>,
    registry: MetadataRegistry,
}

impl AppContext {
    /// # Errors
    ///
    /// Returns an error if any backend cannot be constructed.
    pub async fn build(config: &Config) -> anyhow::Result<Self> {
        Self::with_extractor(config, default_extractor()?).await
    }

    /// Same as [`AppContext::build`] with a caller-chosen extractor.
    ///
    /// # Errors
    ///
    /// Returns an error if any backend cannot be constructed.
    pub async fn with_extractor(config: &Config, extractor: Extractor) -> anyhow::Result<Self> {
        let provider = create_provider(config)?;
        tracing::info!(
            provider = config.llm.provider.as_str(),
            model = %config.llm.model,
            "generation provider configured"
        );
        let objects = create_object_store(config).await?;
        let registry = create_registry(config).await?;
        let artifacts = ArtifactStore::new(objects);

        let orchestrator = Orchestrator::new(
            extractor,
            GenerationClient::new(provider, retry_policy(config), prompt_builder(config)),
            artifacts.clone(),
            registry.clone(),
            IngestLimits {
                max_upload_bytes: config.ingest.max_upload_bytes,
                min_text_chars: config.ingest.min_text_chars,
            },
        );

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            catalog: Arc::new(Catalog::new(artifacts, registry.clone())),
            registry,
        })
    }

    /// Close the registry pool. In-flight writes finish first.
    pub async fn shutdown(&self) {
        self.registry.close().await;
        tracing::info!("metadata registry closed");
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;
    use crate::secret::Secret;

    fn memory_config() -> Config {
        let mut config = Config::default();
        config.storage.backend = StorageBackend::Memory;
        config.registry.sqlite_path = ":memory:".into();
        config.secrets.gemini_api_key = Some(Secret::new("test-key"));
        config
    }

    #[test]
    #[serial]
    fn config_path_priority() {
        unsafe { std::env::remove_var("CASEGEN_CONFIG") };
        assert_eq!(
            resolve_config_path(None),
            PathBuf::from("config/default.toml")
        );

        unsafe { std::env::set_var("CASEGEN_CONFIG", "/etc/casegen.toml") };
        assert_eq!(resolve_config_path(None), PathBuf::from("/etc/casegen.toml"));
        assert_eq!(
            resolve_config_path(Some(Path::new("cli.toml"))),
            PathBuf::from("cli.toml")
        );
        unsafe { std::env::remove_var("CASEGEN_CONFIG") };
    }

    #[test]
    fn gemini_without_key_fails() {
        let mut config = memory_config();
        config.secrets.gemini_api_key = None;
        let err = create_provider(&config).unwrap_err();
        assert!(err.to_string().contains("CASEGEN_GEMINI_API_KEY"));
    }

    #[test]
    fn policy_and_prompt_follow_config() {
        let mut config = memory_config();
        config.retry.max_attempts = 5;
        config.retry.base_delay_ms = 250;
        config.llm.max_prompt_chars = 1000;
        let policy = retry_policy(&config);
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.base_delay(), Duration::from_millis(250));
        assert_eq!(prompt_builder(&config).max_chars(), 1000);
    }

    #[tokio::test]
    async fn registry_parent_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = memory_config();
        config.registry.sqlite_path = dir
            .path()
            .join("nested/state/casegen.db")
            .to_string_lossy()
            .into_owned();
        let registry = create_registry(&config).await.unwrap();
        assert!(registry.scan(10).await.is_empty());
        assert!(dir.path().join("nested/state").is_dir());
    }

    #[tokio::test]
    async fn context_builds_and_shuts_down() {
        let config = memory_config();
        let extractor = Extractor::new(Arc::new(crate::extractor::testing::StaticPages::text(&[
            "text",
        ])));
        let ctx = AppContext::with_extractor(&config, extractor).await.unwrap();
        assert_eq!(ctx.orchestrator.limits().max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(ctx.catalog.list_records(None).await.count, 0);
        ctx.shutdown().await;
        assert_eq!(ctx.catalog.list_records(None).await.count, 0);
    }
}
