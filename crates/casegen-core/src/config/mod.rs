mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or the
    /// resulting configuration is invalid.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.resolve_secrets();
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error naming the first out-of-range setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if self.ingest.max_upload_bytes == 0 {
            bail!("ingest.max_upload_bytes must be positive");
        }
        if self.gateway.max_body_size < self.ingest.max_upload_bytes {
            bail!(
                "gateway.max_body_size ({}) must be at least ingest.max_upload_bytes ({})",
                self.gateway.max_body_size,
                self.ingest.max_upload_bytes
            );
        }
        if self.llm.max_prompt_chars == 0 {
            bail!("llm.max_prompt_chars must be positive");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!("llm.temperature must be within 0.0..=2.0");
        }
        if !(0.0..=1.0).contains(&self.llm.top_p) {
            bail!("llm.top_p must be within 0.0..=1.0");
        }
        if self.llm.timeout_secs == 0 {
            bail!("llm.timeout_secs must be positive");
        }
        Ok(())
    }
}
