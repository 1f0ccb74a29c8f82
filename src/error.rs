use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("DSL parse error at position {position}: {message}")]
    DslParse { position: usize, message: String },

    #[error("Task definition already exists: {0}")]
    DuplicateTaskName(String),

    #[error("Unknown task app: {0}")]
    UnknownApp(String),

    #[error("Could not find task definition named {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Launch failed for task {0}: launcher returned no execution id")]
    LaunchFailed(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Task join error: {0}")]
    TaskJoin(String),
}

impl Error {
    pub(crate) fn dsl(position: usize, message: impl Into<String>) -> Self {
        Self::DslParse {
            position,
            message: message.into(),
        }
    }

    /// HTTP status a transport layer should answer with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::DslParse { .. } | Error::BadRequest(_) => 400,
            Error::NotFound(_) | Error::UnknownApp(_) => 404,
            Error::DuplicateTaskName(_) => 409,
            Error::Timeout(_) => 504,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
