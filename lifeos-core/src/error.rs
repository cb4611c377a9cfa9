use thiserror::Error;

#[derive(Error, Debug)]
pub enum LifeOsError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}
