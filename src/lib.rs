pub mod compositor;
pub mod config;
pub mod error;
pub mod gesture;
pub mod head_pointer;
pub mod mapper;
pub mod mask;
pub mod overlay;
pub mod pipeline;
pub mod posture;
pub mod replay;
pub mod types;

// Re-exports for convenience
pub use config::FusionConfig;
pub use error::FusionError;
pub use gesture::{GestureStage, GestureStateMachine};
pub use mapper::{CoordinateMapper, NominalMapper};
pub use pipeline::{FusionPipeline, Sprites, StreamFormats, SubjectSignal, TickReport};
pub use posture::PostureClassifier;
pub use types::{Frame, FrameBundle, PostureCode, Skeleton};
