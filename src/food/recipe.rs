use serde::{Deserialize, Serialize};
use tracing::warn;

/// Title used when the model's reply could not be parsed as a recipe.
pub const PARSE_ERROR_TITLE: &str = "Response Parsing Error";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
    pub title: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub steps: Vec<String>,
}

/// Clean extra formatting like ```json ... ``` that models wrap around
/// their output even when asked for raw JSON.
pub fn sanitize_response(text: &str) -> String {
    text.trim()
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Best-effort parse of the model's reply. A reply that is not valid recipe
/// JSON is never an error: it comes back as a recipe whose single step is the
/// raw text, so the caller (and the user) can still see what the model said.
pub fn parse_recipe(text: &str) -> Recipe {
    let cleaned = sanitize_response(text);
    match serde_json::from_str::<Recipe>(&cleaned) {
        Ok(recipe) => recipe,
        Err(e) => {
            warn!("recipe output was not valid JSON: {}", e);
            Recipe {
                title: PARSE_ERROR_TITLE.to_string(),
                ingredients: Vec::new(),
                steps: vec![cleaned],
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_recipe_json() {
        let text = r#"{"title": "Banana Bowl", "ingredients": ["2 bananas", "1 bowl of oats"], "steps": ["Slice bananas.", "Mix with oats."]}"#;
        let recipe = parse_recipe(text);
        assert_eq!(recipe.title, "Banana Bowl");
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.steps.len(), 2);
    }

    #[test]
    fn strips_markdown_fences_before_parsing() {
        let text = "```json\n{\"title\": \"Carrot Soup\", \"ingredients\": [], \"steps\": []}\n```";
        let recipe = parse_recipe(text);
        assert_eq!(recipe.title, "Carrot Soup");
    }

    #[test]
    fn missing_arrays_default_to_empty() {
        let recipe = parse_recipe(r#"{"title": "Unknown"}"#);
        assert_eq!(recipe.title, "Unknown");
        assert!(recipe.ingredients.is_empty());
        assert!(recipe.steps.is_empty());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let text = r#"{"title": "Pizza", "ingredients": ["dough"], "steps": ["bake"], "servings": 4}"#;
        let recipe = parse_recipe(text);
        assert_eq!(recipe.title, "Pizza");
    }

    #[test]
    fn unparsable_reply_falls_back_to_error_shape() {
        let recipe = parse_recipe("Sorry, I cannot help with that.");
        assert_eq!(recipe.title, PARSE_ERROR_TITLE);
        assert!(recipe.ingredients.is_empty());
        assert_eq!(recipe.steps, vec!["Sorry, I cannot help with that."]);
    }

    #[test]
    fn sanitize_trims_and_removes_fences() {
        assert_eq!(sanitize_response("  {\"a\": 1}  "), "{\"a\": 1}");
        assert_eq!(sanitize_response("```json\n{}\n```"), "{}");
        assert_eq!(sanitize_response("```\n{}\n```"), "{}");
    }

    #[test]
    fn recipe_serializes_with_all_fields() {
        let recipe = Recipe {
            title: "Toast".to_string(),
            ingredients: vec!["bread".to_string()],
            steps: vec!["toast it".to_string()],
        };
        let value = serde_json::to_value(&recipe).unwrap();
        assert_eq!(value["title"], "Toast");
        assert_eq!(value["ingredients"][0], "bread");
        assert_eq!(value["steps"][0], "toast it");
    }
}
