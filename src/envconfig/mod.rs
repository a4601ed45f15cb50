use crate::core::{Device, PortError, Result, Truncation};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const ENV_PREFIX: &str = "MODEL_PORT_";
pub const DEFAULT_CONTEXT_LENGTH: usize = 2048;

/// Device selection as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceRequest {
    #[default]
    Auto,
    Exact(Device),
}

impl DeviceRequest {
    pub fn resolve(&self) -> Device {
        match self {
            DeviceRequest::Auto => Device::best_available(),
            DeviceRequest::Exact(device) => *device,
        }
    }
}

impl FromStr for DeviceRequest {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(DeviceRequest::Auto);
        }
        s.parse().map(DeviceRequest::Exact)
    }
}

impl fmt::Display for DeviceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceRequest::Auto => write!(f, "auto"),
            DeviceRequest::Exact(device) => write!(f, "{}", device),
        }
    }
}

impl Serialize for DeviceRequest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DeviceRequest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Everything a port needs before `load_model`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PortConfig {
    /// GGUF weights file.
    pub model_path: Option<PathBuf>,
    /// Hugging Face `tokenizer.json`.
    pub tokenizer_path: Option<PathBuf>,
    pub name: Option<String>,
    pub device: DeviceRequest,
    pub context_length: usize,
    pub truncation: Truncation,
    /// Prepend BOS and friends as the tokenizer's post-processor dictates.
    pub add_special_tokens: bool,
    /// Overrides the EOS id recorded in the model file.
    pub eos_token: Option<String>,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            tokenizer_path: None,
            name: None,
            device: DeviceRequest::Auto,
            context_length: DEFAULT_CONTEXT_LENGTH,
            truncation: Truncation::Truncate,
            add_special_tokens: true,
            eos_token: None,
        }
    }
}

impl PortConfig {
    pub fn builder() -> PortConfigBuilder {
        PortConfigBuilder::new()
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads `MODEL_PORT_*` keys through `lookup`; absent keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = var("MODEL") {
            config.model_path = Some(expand_home(&v));
        }
        if let Some(v) = var("TOKENIZER") {
            config.tokenizer_path = Some(expand_home(&v));
        }
        if let Some(v) = var("NAME") {
            config.name = Some(v);
        }
        if let Some(v) = var("DEVICE") {
            config.device = v.parse()?;
        }
        if let Some(v) = var("CONTEXT_LENGTH") {
            config.context_length = v.trim().parse().map_err(|_| {
                PortError::Config(format!("{}CONTEXT_LENGTH must be an integer, got `{}`", ENV_PREFIX, v))
            })?;
        }
        if let Some(v) = var("TRUNCATION") {
            config.truncation = v.parse()?;
        }
        if let Some(v) = var("ADD_SPECIAL_TOKENS") {
            config.add_special_tokens = parse_bool(&v).ok_or_else(|| {
                PortError::Config(format!("{}ADD_SPECIAL_TOKENS must be a boolean, got `{}`", ENV_PREFIX, v))
            })?;
        }
        if let Some(v) = var("EOS_TOKEN") {
            config.eos_token = Some(v);
        }

        config.validate()?;
        Ok(config)
    }

    /// Loads a `.json`, `.yaml` or `.yml` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| PortError::Config(format!("cannot read {}: {}", path.display(), e)))?;

        let ext = path.extension().and_then(|e| e.to_str()).map(str::to_lowercase);
        let mut config: PortConfig = match ext.as_deref() {
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| PortError::Config(format!("{}: {}", path.display(), e)))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|e| PortError::Config(format!("{}: {}", path.display(), e)))?,
            _ => {
                return Err(PortError::Config(format!(
                    "unsupported config format: {}",
                    path.display()
                )))
            }
        };

        config.model_path = config.model_path.map(|p| expand_home(&p.to_string_lossy()));
        config.tokenizer_path = config.tokenizer_path.map(|p| expand_home(&p.to_string_lossy()));

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.context_length == 0 {
            return Err(PortError::Config("context_length must be positive".into()));
        }
        Ok(())
    }

    /// Weights and tokenizer paths, both required by file-backed ports.
    pub fn require_paths(&self) -> Result<(&Path, &Path)> {
        let model = self
            .model_path
            .as_deref()
            .ok_or_else(|| PortError::Config("model_path is not set".into()))?;
        let tokenizer = self
            .tokenizer_path
            .as_deref()
            .ok_or_else(|| PortError::Config("tokenizer_path is not set".into()))?;
        Ok((model, tokenizer))
    }

    /// Display name: the configured one, else the weights file stem.
    pub fn display_name(&self) -> Option<String> {
        self.name.clone().or_else(|| {
            self.model_path
                .as_ref()
                .and_then(|p| p.file_stem())
                .map(|s| s.to_string_lossy().into_owned())
        })
    }
}

pub struct PortConfigBuilder {
    config: PortConfig,
}

impl PortConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PortConfig::default(),
        }
    }

    pub fn model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.model_path = Some(path.into());
        self
    }

    pub fn tokenizer_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tokenizer_path = Some(path.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    pub fn device(mut self, device: Device) -> Self {
        self.config.device = DeviceRequest::Exact(device);
        self
    }

    pub fn auto_device(mut self) -> Self {
        self.config.device = DeviceRequest::Auto;
        self
    }

    pub fn context_length(mut self, len: usize) -> Self {
        self.config.context_length = len;
        self
    }

    pub fn truncation(mut self, truncation: Truncation) -> Self {
        self.config.truncation = truncation;
        self
    }

    pub fn add_special_tokens(mut self, add: bool) -> Self {
        self.config.add_special_tokens = add;
        self
    }

    pub fn eos_token(mut self, token: impl Into<String>) -> Self {
        self.config.eos_token = Some(token.into());
        self
    }

    pub fn build(self) -> Result<PortConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for PortConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
