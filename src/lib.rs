pub mod api;
pub mod config;
pub mod detector;
pub mod food;
pub mod providers;

// Re-export commonly used items
pub use detector::{Detection, IngredientCount, YoloModel};
pub use food::recipe::Recipe;
pub use providers::gemini::gemini::GeminiProvider;
