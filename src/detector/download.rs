use std::path::{Path, PathBuf};

use tracing::info;

use super::model::DetectorError;

/// Makes sure the ONNX weights are on disk before the model is loaded.
///
/// If the file is missing and a download URL is configured, the weights are
/// fetched once and cached at `path`. Without a URL the caller gets a clear
/// error telling them how to provide the file.
pub async fn ensure_model(path: &Path, url: Option<&str>) -> Result<(), DetectorError> {
    if path.exists() {
        return Ok(());
    }

    let Some(url) = url else {
        return Err(DetectorError::ModelMissing(format!(
            "{} (export one with `yolo export model=yolov8n.pt format=onnx` or set YOLO_MODEL_URL)",
            path.display()
        )));
    };

    info!("Downloading detection model from {}", url);
    let response = reqwest::get(url)
        .await
        .map_err(|e| DetectorError::Download(e.to_string()))?;
    if !response.status().is_success() {
        return Err(DetectorError::Download(format!(
            "HTTP {} from {}",
            response.status(),
            url
        )));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| DetectorError::Download(e.to_string()))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DetectorError::Download(e.to_string()))?;
        }
    }

    // Write to a scratch name and rename into place; an interrupted download
    // must never leave a partial file at the weights path, since an existing
    // file is trusted on the next startup.
    let scratch = scratch_path(path);
    tokio::fs::write(&scratch, &bytes)
        .await
        .map_err(|e| DetectorError::Download(e.to_string()))?;
    tokio::fs::rename(&scratch, path)
        .await
        .map_err(|e| DetectorError::Download(e.to_string()))?;

    info!(
        "Saved detection model to {} ({} bytes)",
        path.display(),
        bytes.len()
    );
    Ok(())
}

fn scratch_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}
