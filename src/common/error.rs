use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("A capture session is already running")]
    SessionActive,

    #[error("Not enough frames captured: {selected} selected, at least {required} required")]
    InsufficientFrames { selected: usize, required: usize },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EnrollError>;
