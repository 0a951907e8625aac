use common::{Environment, LogLevel};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: LogLevel,
    pub environment: Environment,
    pub otel_endpoint: Option<String>,
    pub predict_timeout_secs: u64,
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let config = config::Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", 8000)?
        .set_default("log_level", "info")?
        .set_default("environment", "development")?
        .set_default("predict_timeout_secs", 30)?
        .add_source(
            config::Environment::with_prefix("GATEWAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;

    Ok(config)
}
