pub mod prompt;
pub mod recipe;

// Re-export common types
pub use prompt::{build_prompt, ingredient_phrase};
pub use recipe::{parse_recipe, Recipe};
