pub mod gemini;
pub mod traits;
