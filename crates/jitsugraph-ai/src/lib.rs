pub mod gemini;
pub mod provider;
pub mod stages;

pub use gemini::{GeminiConfig, GeminiProvider};
pub use provider::{GenerationConfig, GenerativeProvider};
