use thiserror::Error;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("grid side length must be positive, got {0}")]
    InvalidSideLength(usize),

    #[error("a {dimensions}D grid with side {side} exceeds the cell limit")]
    GridTooLarge { side: usize, dimensions: u8 },

    #[error("grid must have 2 or 3 dimensions, got {0}")]
    InvalidDimensions(u8),

    #[error("invalid parameter `{name}`: {value} (must be finite and non-negative)")]
    InvalidParameter { name: &'static str, value: f32 },

    #[error("could not parse configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("could not write image: {0}")]
    Image(#[from] image::ImageError),
}
