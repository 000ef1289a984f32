use crate::error::StartupError;
use serde::{de::DeserializeOwned, Deserialize};
use std::{fmt, path::PathBuf, time::Duration};

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// Accelerator when the runtime reports one, CPU otherwise.
    #[default]
    Auto,
    Cuda,
    Cpu,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub model_dir: PathBuf,
    pub onnx_file: String,
    #[serde(default)]
    pub device: DevicePreference,
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

fn default_intra_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl ModelConfig {
    pub fn get_path(&self) -> PathBuf {
        self.model_dir.join(&self.onnx_file)
    }

    pub fn validate(&self) -> Result<(), StartupError> {
        let path = self.get_path();
        if !path.is_file() {
            return Err(StartupError::ModelNotFound(path));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InferenceConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

pub fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

/// Layers `configuration/base.yaml`, `configuration/<APP_ENVIRONMENT>.yaml` and
/// `<env_prefix>_*` environment variables (nested keys separated by `__`).
pub fn load_configuration<T: DeserializeOwned>(env_prefix: &str) -> Result<T, StartupError> {
    let base_path = std::env::current_dir().map_err(|e| {
        config::ConfigError::Message(format!("failed to determine the current directory: {}", e))
    })?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(
            config::File::from(
                configuration_directory.join(format!("{}.yaml", environment.as_str())),
            )
            .required(false),
        )
        .add_source(
            config::Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize::<T>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(deserialize_with = "deserialize_log_level")]
        log_level: LogLevel,
        model: ModelConfig,
        #[serde(default)]
        inference: InferenceConfig,
    }

    fn from_yaml(yaml: &str) -> Result<Sample, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()?
            .try_deserialize()
    }

    #[test]
    fn test_defaults_are_applied() {
        let sample = from_yaml(
            "log_level: INFO\nmodel:\n  model_dir: models\n  onnx_file: u2net.onnx\n",
        )
        .unwrap();

        assert_eq!(sample.log_level, LogLevel::Info);
        assert_eq!(sample.model.device, DevicePreference::Auto);
        assert!(sample.model.intra_threads >= 1);
        assert_eq!(sample.inference.timeout(), Duration::from_secs(60));
        assert_eq!(sample.model.get_path(), PathBuf::from("models/u2net.onnx"));
    }

    #[test]
    fn test_device_preference_parsing() {
        let sample = from_yaml(
            "log_level: debug\nmodel:\n  model_dir: m\n  onnx_file: f.onnx\n  device: cpu\n",
        )
        .unwrap();
        assert_eq!(sample.model.device, DevicePreference::Cpu);

        let invalid = from_yaml(
            "log_level: debug\nmodel:\n  model_dir: m\n  onnx_file: f.onnx\n  device: tpu\n",
        );
        assert!(invalid.is_err());
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let result = from_yaml("log_level: trace\nmodel:\n  model_dir: m\n  onnx_file: f.onnx\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_model_fails_validation() {
        let model = ModelConfig {
            model_dir: PathBuf::from("./does-not-exist"),
            onnx_file: "missing.onnx".to_string(),
            device: DevicePreference::Auto,
            intra_threads: 1,
        };

        match model.validate() {
            Err(StartupError::ModelNotFound(path)) => {
                assert_eq!(path, PathBuf::from("./does-not-exist/missing.onnx"))
            }
            other => panic!("expected ModelNotFound, got {:?}", other),
        }
    }
}
