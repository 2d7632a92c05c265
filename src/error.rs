use std::io;
use thiserror::Error;

/// Everything that can stop a provisioning run
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration: {0}")]
    Config(String),
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error("invalid address prefix: {0}")]
    Cidr(String),
    #[error("authentication: {0}")]
    Auth(String),
    #[error("exec: {0}")]
    Exec(String),
    #[error("azure returned {status} ({code}): {message}")]
    Arm {
        status: u16,
        code: String,
        message: String,
    },
    #[error("operation on {resource} ended as {status} ({code}): {message}")]
    OperationFailed {
        resource: String,
        status: String,
        code: String,
        message: String,
    },
    #[error("unexpected response: {0}")]
    Response(String),
    #[error("timed out waiting for {0}")]
    Timeout(String),
    #[error("io: {0}")]
    IO(#[from] io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("env file: {0}")]
    Dotenv(#[from] dotenv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Arm { status, .. } => *status == 404,
            _ => false,
        }
    }
}
