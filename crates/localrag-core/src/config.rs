//! Lightweight configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nesting, e.g. `APP_RETRIEVAL__TOP_K=8`). Every setting has a
//! default, so a missing file yields a working configuration.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self::from_figment(figment);
        config.settings()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    /// Build from an inline TOML document; used by tests and embedders.
    pub fn from_toml_str(toml: &str) -> Self {
        Self::from_figment(Figment::new().merge(Toml::string(toml)))
    }

    /// Typed view of the whole configuration, validated.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(format!("Failed to read settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalSettings,
    pub agent: AgentSettings,
    pub llm: LlmSettings,
    pub embed: EmbedSettings,
    pub data: DataSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        let a = &self.agent;
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));
        if r.top_k == 0 {
            return invalid("retrieval.top_k must be at least 1".into());
        }
        if r.rrf_k == 0 {
            return invalid("retrieval.rrf_k must be positive".into());
        }
        if r.over_fetch_factor == 0 || r.rerank_candidate_factor == 0 {
            return invalid("retrieval fetch factors must be at least 1".into());
        }
        if a.max_sub_questions == 0 {
            return invalid("agent.max_sub_questions must be at least 1".into());
        }
        if self.embed.max_len == 0 || self.embed.fake_dim == 0 {
            return invalid("embed.max_len and embed.fake_dim must be at least 1".into());
        }
        if !(1.0..=5.0).contains(&a.quality_threshold) {
            return invalid(format!("agent.quality_threshold must lie in 1..=5, got {}", a.quality_threshold));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub rrf_k: u32,
    /// Each source is asked for `top_k * over_fetch_factor` candidates.
    pub over_fetch_factor: usize,
    /// The reranker receives `top_k * rerank_candidate_factor` fused candidates.
    pub rerank_candidate_factor: usize,
    pub use_rerank: bool,
    pub vector_timeout_ms: u64,
    pub lexical_timeout_ms: u64,
    pub rerank_timeout_ms: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            rrf_k: 60,
            over_fetch_factor: 2,
            rerank_candidate_factor: 4,
            use_rerank: true,
            vector_timeout_ms: 2_000,
            lexical_timeout_ms: 2_000,
            rerank_timeout_ms: 5_000,
        }
    }
}

impl RetrievalSettings {
    pub fn vector_timeout(&self) -> Duration { Duration::from_millis(self.vector_timeout_ms) }
    pub fn lexical_timeout(&self) -> Duration { Duration::from_millis(self.lexical_timeout_ms) }
    pub fn rerank_timeout(&self) -> Duration { Duration::from_millis(self.rerank_timeout_ms) }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    /// Analyze, retrieve, generate and self-reflect.
    #[default]
    Agentic,
    /// Retrieve and generate once; no analysis, no reflection.
    Naive,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    #[default]
    Heuristic,
    Llm,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentSettings {
    pub mode: AgentMode,
    pub analyzer: AnalyzerKind,
    pub max_sub_questions: usize,
    pub quality_threshold: f32,
    pub max_retries: usize,
    pub generation_max_tokens: usize,
    pub reflection_max_tokens: usize,
    pub generation_timeout_ms: u64,
    pub reflection_timeout_ms: u64,
    pub analysis_timeout_ms: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            mode: AgentMode::Agentic,
            analyzer: AnalyzerKind::Heuristic,
            max_sub_questions: 5,
            quality_threshold: 4.0,
            max_retries: 1,
            generation_max_tokens: 2_048,
            reflection_max_tokens: 512,
            generation_timeout_ms: 60_000,
            reflection_timeout_ms: 30_000,
            analysis_timeout_ms: 15_000,
        }
    }
}

impl AgentSettings {
    pub fn generation_timeout(&self) -> Duration { Duration::from_millis(self.generation_timeout_ms) }
    pub fn reflection_timeout(&self) -> Duration { Duration::from_millis(self.reflection_timeout_ms) }
    pub fn analysis_timeout(&self) -> Duration { Duration::from_millis(self.analysis_timeout_ms) }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Openai,
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Openai,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbedSettings {
    /// Hash-based embeddings; no model files needed. For tests and demos.
    pub use_fake: bool,
    pub fake_dim: usize,
    /// BGE-M3 directory (tokenizer.json, config.json, pytorch_model.bin).
    pub model_dir: Option<String>,
    pub max_len: usize,
}

impl Default for EmbedSettings {
    fn default() -> Self {
        Self { use_fake: false, fake_dim: 1024, model_dir: None, max_len: 256 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataSettings {
    /// JSON Lines file, or a directory of them, holding the chunk snapshot.
    pub chunks_path: String,
    pub lancedb_dir: String,
    pub table: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            chunks_path: "../dev_data/chunks".to_string(),
            lancedb_dir: "../dev_data/indexes/lancedb".to_string(),
            table: "chunks".to_string(),
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_yields_defaults() {
        let settings = Config::from_toml_str("").settings().unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.retrieval.rrf_k, 60);
        assert_eq!(settings.agent.max_retries, 1);
        assert_eq!(settings.agent.quality_threshold, 4.0);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = Config::from_toml_str(
            r#"
            [retrieval]
            top_k = 3
            use_rerank = false

            [agent]
            mode = "naive"
            analyzer = "llm"
            "#,
        );
        let settings = cfg.settings().unwrap();
        assert_eq!(settings.retrieval.top_k, 3);
        assert!(!settings.retrieval.use_rerank);
        assert_eq!(settings.retrieval.over_fetch_factor, 2);
        assert_eq!(settings.agent.mode, AgentMode::Naive);
        assert_eq!(settings.agent.analyzer, AnalyzerKind::Llm);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let cfg = Config::from_toml_str("[agent]\nquality_threshold = 7.0\n");
        let err = cfg.settings().unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidConfig(msg)) if msg.contains("quality_threshold")));
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let base = Path::new("/srv/rag");
        assert_eq!(resolve_with_base(base, "/data/chunks.jsonl"), PathBuf::from("/data/chunks.jsonl"));
        assert_eq!(resolve_with_base(base, "chunks.jsonl"), PathBuf::from("/srv/rag/chunks.jsonl"));
    }
}
