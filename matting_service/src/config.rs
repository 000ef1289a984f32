use serde::Deserialize;
use service_core::{
    config::{
        deserialize_log_level, load_configuration, InferenceConfig, LogLevel, ModelConfig,
        ServerConfig,
    },
    StartupError,
};

const ENV_PREFIX: &str = "MATTING";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub model: ModelConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub matting: MattingParams,
}

/// Fixed parameters applied to every matting invocation.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MattingParams {
    #[serde(default)]
    pub alpha_matting: bool,
    #[serde(default = "default_foreground_threshold")]
    pub foreground_threshold: u16,
    #[serde(default = "default_background_threshold")]
    pub background_threshold: u8,
    #[serde(default = "default_erode_size")]
    pub erode_size: u32,
}

// Above the 8-bit range: nothing is forced opaque, soft edges survive.
fn default_foreground_threshold() -> u16 {
    270
}

fn default_background_threshold() -> u8 {
    10
}

fn default_erode_size() -> u32 {
    10
}

impl Default for MattingParams {
    fn default() -> Self {
        Self {
            alpha_matting: false,
            foreground_threshold: default_foreground_threshold(),
            background_threshold: default_background_threshold(),
            erode_size: default_erode_size(),
        }
    }
}

pub fn get_configuration() -> Result<Config, StartupError> {
    let config: Config = load_configuration(ENV_PREFIX)?;
    config.model.validate()?;
    Ok(config)
}
