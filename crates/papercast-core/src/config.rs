use std::{collections::HashSet, fs, path::Path};

use anyhow::{anyhow, Context, Result};
use papercast_provider::{ProviderConfig, ProviderType};
use serde::{Deserialize, Serialize};

fn default_pipeline_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_backward_model() -> String {
    "openai/gpt-4o".to_string()
}

/// Model refs, each `provider_id/model`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_pipeline_model")]
    pub pipeline: String,
    #[serde(default = "default_pipeline_model")]
    pub engine: String,
    #[serde(default = "default_backward_model")]
    pub backward: String,
    #[serde(default = "default_backward_model")]
    pub sanitizer: String,
    #[serde(default = "default_pipeline_model")]
    pub evaluator: String,
    #[serde(default = "default_backward_model")]
    pub critic: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            pipeline: default_pipeline_model(),
            engine: default_pipeline_model(),
            backward: default_backward_model(),
            sanitizer: default_backward_model(),
            evaluator: default_pipeline_model(),
            critic: default_backward_model(),
        }
    }
}

impl ModelsConfig {
    fn refs(&self) -> [(&'static str, &str); 6] {
        [
            ("pipeline", &self.pipeline),
            ("engine", &self.engine),
            ("backward", &self.backward),
            ("sanitizer", &self.sanitizer),
            ("evaluator", &self.evaluator),
            ("critic", &self.critic),
        ]
    }
}

fn default_rounds() -> usize {
    5
}

fn default_line_width() -> Option<usize> {
    Some(15)
}

fn default_role_timeout_secs() -> Option<u64> {
    Some(900)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerSettings {
    #[serde(default = "default_rounds")]
    pub rounds: usize,
    /// Words per line in saved prompt versions; `null` keeps the text as produced.
    #[serde(default = "default_line_width")]
    pub line_width: Option<usize>,
    #[serde(default = "default_role_timeout_secs")]
    pub role_timeout_secs: Option<u64>,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            rounds: default_rounds(),
            line_width: default_line_width(),
            role_timeout_secs: default_role_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub prompts_dir: String,
    pub history_dir: String,
    pub states_dir: String,
    pub audio_dir: String,
    pub votes_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            prompts_dir: "prompts".to_string(),
            history_dir: "prompt_history".to_string(),
            states_dir: "podcast_states".to_string(),
            audio_dir: "audio".to_string(),
            votes_file: "votes.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    pub provider_id: String,
    pub model: String,
    pub host_voice: String,
    pub guest_voice: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            provider_id: "openai".to_string(),
            model: "tts-1".to_string(),
            host_voice: "onyx".to_string(),
            guest_voice: "nova".to_string(),
        }
    }
}

fn default_max_tokens() -> usize {
    40_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MainConfig {
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub optimizer: OptimizerSettings,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub pdf: PdfConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_enabled() -> bool {
    true
}

/// One file in `providers.d/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub provider_id: String,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PapercastConfig {
    pub main: MainConfig,
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
}

impl PapercastConfig {
    /// Enabled providers in the shape the provider registry consumes.
    pub fn provider_configs(&self) -> Vec<ProviderConfig> {
        self.providers
            .iter()
            .filter(|p| p.enabled)
            .map(|p| ProviderConfig {
                id: p.provider_id.clone(),
                provider_type: p.provider_type.clone(),
                api_key: p.api_key.clone().filter(|k| !k.is_empty()),
                base_url: p.api_base.clone().filter(|b| !b.is_empty()),
            })
            .collect()
    }

    pub fn provider(&self, provider_id: &str) -> Option<&ProviderEntry> {
        self.providers
            .iter()
            .find(|p| p.enabled && p.provider_id == provider_id)
    }
}

/// Splits a `provider_id/model` ref. The model part may itself contain `/`.
pub fn parse_model_ref(input: &str) -> Result<(&str, &str)> {
    match input.split_once('/') {
        Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
            Ok((provider, model))
        }
        _ => Err(anyhow!("invalid model format: {input} (expected provider/model)")),
    }
}

pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

/// Loads `<config_dir>/main.yaml` and `<config_dir>/providers.d/*.yaml`.
pub fn load_config(config_dir: &Path) -> Result<PapercastConfig> {
    let mut main: MainConfig = read_yaml_file(&config_dir.join("main.yaml"))?;

    let providers_dir = config_dir.join("providers.d");
    let mut providers = if providers_dir.is_dir() {
        read_yaml_dir::<ProviderEntry>(&providers_dir)?
    } else {
        Vec::new()
    };

    resolve_main_env(&mut main);
    resolve_providers_env(&mut providers);

    let config = PapercastConfig { main, providers };
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &PapercastConfig) -> Result<()> {
    let mut seen = HashSet::new();
    for provider in &config.providers {
        if !seen.insert(provider.provider_id.as_str()) {
            return Err(anyhow!("duplicate provider_id: {}", provider.provider_id));
        }
    }

    let enabled: HashSet<&str> = config
        .providers
        .iter()
        .filter(|p| p.enabled)
        .map(|p| p.provider_id.as_str())
        .collect();

    for (name, model_ref) in config.main.models.refs() {
        let (provider_id, _) = parse_model_ref(model_ref)
            .with_context(|| format!("models.{name} is not a valid model ref"))?;
        if !enabled.contains(provider_id) {
            return Err(anyhow!(
                "models.{name} uses unknown or disabled provider: {provider_id}"
            ));
        }
    }

    if !enabled.contains(config.main.speech.provider_id.as_str()) {
        return Err(anyhow!(
            "speech.provider_id uses unknown or disabled provider: {}",
            config.main.speech.provider_id
        ));
    }

    if config.main.optimizer.rounds == 0 {
        return Err(anyhow!("optimizer.rounds must be at least 1"));
    }
    if config.main.optimizer.line_width == Some(0) {
        return Err(anyhow!("optimizer.line_width must be at least 1 when set"));
    }

    Ok(())
}

fn read_yaml_file<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))
}

fn read_yaml_dir<T>(dir: &Path) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("failed to read config dir: {}", dir.display()))?
    {
        let entry =
            entry.with_context(|| format!("failed to read dir entry: {}", dir.display()))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("yaml") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut items = Vec::with_capacity(paths.len());
    for path in paths {
        items.push(read_yaml_file::<T>(&path)?);
    }
    Ok(items)
}

fn resolve_main_env(main: &mut MainConfig) {
    let models = &mut main.models;
    for model in [
        &mut models.pipeline,
        &mut models.engine,
        &mut models.backward,
        &mut models.sanitizer,
        &mut models.evaluator,
        &mut models.critic,
    ] {
        *model = resolve_env_var(model);
    }

    main.speech.provider_id = resolve_env_var(&main.speech.provider_id);
    main.speech.model = resolve_env_var(&main.speech.model);
    main.server.bind = resolve_env_var(&main.server.bind);
    for origin in &mut main.server.cors_origins {
        *origin = resolve_env_var(origin);
    }
}

fn resolve_providers_env(providers: &mut [ProviderEntry]) {
    for provider in providers {
        provider.provider_id = resolve_env_var(&provider.provider_id);
        if let Some(base) = &mut provider.api_base {
            *base = resolve_env_var(base);
        }
        if let Some(key) = &mut provider.api_key {
            *key = resolve_env_var(key);
        }
    }
}
