pub mod analysis;
pub mod event;
pub mod gemini;
pub mod instruction;

pub use gemini::GeminiBackend;
