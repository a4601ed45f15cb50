use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortError {
    #[error("Model is not loaded: `{operation}` requires a successful load_model()")]
    NotLoaded { operation: &'static str },

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PortError {
    pub fn not_loaded(operation: &'static str) -> Self {
        PortError::NotLoaded { operation }
    }

    pub fn load(err: impl std::fmt::Display) -> Self {
        PortError::ModelLoad(err.to_string())
    }

    pub fn inference(err: impl std::fmt::Display) -> Self {
        PortError::Inference(err.to_string())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        PortError::InvalidInput(msg.into())
    }

    pub fn is_not_loaded(&self) -> bool {
        matches!(self, PortError::NotLoaded { .. })
    }
}

pub type Result<T> = std::result::Result<T, PortError>;
