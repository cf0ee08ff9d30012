use crate::detector::IngredientCount;

/// Formats detected ingredients as a comma-separated phrase for prompt
/// construction, e.g. `"2 apple, 1 banana"`.
pub fn ingredient_phrase(ingredients: &[IngredientCount]) -> String {
    ingredients
        .iter()
        .map(|i| format!("{} {}", i.count, i.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Asked for when nothing was detected. The model still answers in the fixed
/// recipe shape, with "Unknown" as the title, so the client always gets the
/// same JSON structure back.
const EMPTY_PROMPT: &str = r#"Return a result in this exact JSON format:

{
  "title": "Unknown",
  "ingredients": [],
  "steps": []
}"#;

pub fn build_prompt(ingredient_list: &str) -> String {
    if ingredient_list.trim().is_empty() {
        return EMPTY_PROMPT.to_string();
    }

    format!(
        r#"You are a professional recipe generator AI.

Using ONLY these ingredients: {ingredient_list}, generate a cooking recipe.

Output JSON ONLY. No explanation, no markdown, no text besides JSON.

JSON structure must be exactly:

{{
  "title": "string",
  "ingredients": ["list of strings"],
  "steps": ["list of strings"]
}}"#
    )
}
