use thiserror::Error;

/// Reasons a tick is dropped. None of them are fatal to the stream.
#[derive(Debug, Error)]
pub enum FusionError {
    #[error("frame bundle is missing its {missing} stream")]
    BundleIncomplete { missing: &'static str },

    #[error("color frame size mismatch: got {got_width}x{got_height} ({got_len} bytes), expected {width}x{height}")]
    FrameSizeMismatch {
        got_width: u32,
        got_height: u32,
        got_len: usize,
        width: u32,
        height: u32,
    },

    #[error("depth frame size mismatch: got {got} samples, expected {expected}")]
    DepthSizeMismatch { got: usize, expected: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("sprite preparation failed: {0}")]
    Sprite(String),
}

pub type Result<T> = std::result::Result<T, FusionError>;
