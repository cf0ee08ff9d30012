use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::detector::{count_ingredients, IngredientCount, YoloModel};
use crate::food::prompt::{build_prompt, ingredient_phrase};
use crate::food::recipe::{parse_recipe, Recipe};
use crate::providers::gemini::gemini::GeminiProvider;
use crate::providers::traits::CompletionProvider;

#[derive(Clone)]
pub struct AppState {
    detector: Arc<YoloModel>,
    provider: Arc<GeminiProvider>,
    upload_dir: PathBuf,
}

#[derive(Serialize)]
pub struct DetectAndGenerateResponse {
    pub ingredients: Vec<IngredientCount>,
    pub recipe: Recipe,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("{}", self);
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

/// Create and configure the API router
pub fn create_api(
    detector: Arc<YoloModel>,
    provider: GeminiProvider,
    upload_dir: PathBuf,
    max_upload_bytes: usize,
) -> Router {
    let state = AppState {
        detector,
        provider: Arc::new(provider),
        upload_dir,
    };

    // Fully permissive CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/", get(index))
        .route("/detect_and_generate", post(detect_and_generate_handler))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// The uploaded image saved to disk for the duration of one request. The file
/// is removed again when the guard drops, whether the request succeeded or not.
#[derive(Debug)]
struct UploadedImage {
    path: PathBuf,
}

impl UploadedImage {
    async fn receive(multipart: &mut Multipart, upload_dir: &Path) -> Result<Self, ApiError> {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
        {
            if field.name() != Some("file") {
                continue;
            }

            let original = field.file_name().unwrap_or("image").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
            if bytes.is_empty() {
                return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
            }

            // Keep only the basename so a crafted filename cannot escape the
            // upload directory.
            let basename = Path::new(&original)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());

            // The guard owns the path before the write starts, so a write
            // that fails partway still gets its file removed on drop.
            let upload = Self {
                path: upload_dir.join(format!("upload-{}-{}", Uuid::new_v4(), basename)),
            };

            tokio::fs::write(&upload.path, &bytes)
                .await
                .map_err(|e| ApiError::Internal(format!("Failed to save upload: {}", e)))?;
            debug!(
                "Saved upload to {} ({} bytes)",
                upload.path.display(),
                bytes.len()
            );
            return Ok(upload);
        }

        Err(ApiError::BadRequest(
            "Missing \"file\" field in multipart body".to_string(),
        ))
    }
}

impl Drop for UploadedImage {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}

async fn detect_and_generate_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DetectAndGenerateResponse>, ApiError> {
    let upload = UploadedImage::receive(&mut multipart, &state.upload_dir).await?;

    let detector = state.detector.clone();
    let image_path = upload.path.clone();
    let detections = tokio::task::spawn_blocking(move || detector.detect_file(&image_path))
        .await
        .map_err(|e| ApiError::Internal(format!("Detection task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let ingredients = count_ingredients(&detections);
    let phrase = ingredient_phrase(&ingredients);
    if ingredients.is_empty() {
        info!("No ingredients recognized in upload");
    } else {
        info!("Detected ingredients: {}", phrase);
    }

    let prompt = build_prompt(&phrase);
    let completion = state
        .provider
        .complete(&prompt)
        .await
        .map_err(|e| ApiError::Internal(format!("Recipe generation failed: {}", e)))?;
    let recipe = parse_recipe(&completion);
    info!("Generated recipe: {}", recipe.title);

    Ok(Json(DetectAndGenerateResponse {
        ingredients,
        recipe,
    }))
}

async fn health_check() -> Response {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "Server is running and healthy".to_string(),
    })
    .into_response()
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Minimal single-page demo client for trying the service from a browser.
const INDEX_HTML: &str = r##"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>FridgeMate</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 640px; margin: 2rem auto; padding: 0 1rem; color: #222; }
  h1 { margin-bottom: 0.25rem; }
  form { margin: 1.5rem 0; display: flex; gap: 0.75rem; align-items: center; flex-wrap: wrap; }
  button { padding: 0.5rem 1rem; cursor: pointer; }
  #status { min-height: 1.5rem; color: #555; }
  #result { border-top: 1px solid #ddd; margin-top: 1rem; padding-top: 1rem; }
</style>
</head>
<body>
<h1>FridgeMate</h1>
<p>Upload a photo of your fridge or counter and get a recipe for what is in it.</p>
<form id="form">
  <input type="file" id="file" name="file" accept="image/*" required>
  <button type="submit">Generate recipe</button>
</form>
<div id="status"></div>
<div id="result" hidden>
  <h2 id="title"></h2>
  <h3>Ingredients</h3>
  <ul id="ingredients"></ul>
  <h3>Steps</h3>
  <ol id="steps"></ol>
</div>
<script>
const form = document.getElementById('form');
const status = document.getElementById('status');
const result = document.getElementById('result');

function fill(id, items) {
  const el = document.getElementById(id);
  el.innerHTML = '';
  for (const item of items) {
    const li = document.createElement('li');
    li.textContent = item;
    el.appendChild(li);
  }
}

form.addEventListener('submit', async (event) => {
  event.preventDefault();
  const data = new FormData();
  data.append('file', document.getElementById('file').files[0]);
  status.textContent = 'Detecting ingredients and writing a recipe...';
  result.hidden = true;
  try {
    const res = await fetch('/detect_and_generate', { method: 'POST', body: data });
    const body = await res.json();
    if (!res.ok) throw new Error(body.error || res.statusText);
    status.textContent = body.ingredients.length
      ? 'Found: ' + body.ingredients.map(i => i.count + ' ' + i.name).join(', ')
      : 'No ingredients recognized';
    document.getElementById('title').textContent = body.recipe.title;
    fill('ingredients', body.recipe.ingredients);
    fill('steps', body.recipe.steps);
    result.hidden = false;
  } catch (err) {
    status.textContent = 'Error: ' + err.message;
  }
});
</script>
</body>
</html>
"##;
