use serde::Deserialize;
use service_core::{
    config::{
        deserialize_log_level, load_configuration, InferenceConfig, LogLevel, ModelConfig,
        ServerConfig,
    },
    StartupError,
};

const ENV_PREFIX: &str = "SAM";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub model: ModelConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
}

pub fn get_configuration() -> Result<Config, StartupError> {
    let config: Config = load_configuration(ENV_PREFIX)?;
    config.model.validate()?;
    Ok(config)
}
