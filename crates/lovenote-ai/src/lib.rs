//! Daily message and quick-reply generation backed by a generative text model.

pub mod api_types;
pub mod error;
pub mod generator;
pub mod model;
pub mod prompt;

pub use error::ModelError;
pub use generator::{
    DailyMessageGenerator, FALLBACK_DAILY_MESSAGE, FALLBACK_QUICK_REPLIES, GeneratedMessage,
    InteractionHistory, emotion_level,
};
pub use model::{GeminiConfig, GeminiModel, TextModel};
