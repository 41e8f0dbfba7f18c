//! Download Whisper models from Hugging Face.

use crate::error::{Error, Result};
use log::info;
use std::io::Write;
use std::path::{Path, PathBuf};

const HF_REPO: &str = "ggerganov/whisper.cpp";

/// Model source: (model_id, hf_filename). Files keep their upstream names locally.
pub const MODEL_SOURCES: &[(&str, &str)] = &[
    ("tiny.en", "ggml-tiny.en.bin"),
    ("tiny", "ggml-tiny.bin"),
    ("base.en", "ggml-base.en.bin"),
    ("base", "ggml-base.bin"),
    ("small.en", "ggml-small.en.bin"),
    ("small", "ggml-small.bin"),
    ("medium.en", "ggml-medium.en.bin"),
    ("medium", "ggml-medium.bin"),
    ("large-v3", "ggml-large-v3.bin"),
    ("large-v3-turbo", "ggml-large-v3-turbo.bin"),
];

/// `large` is accepted as a name for the current large model.
fn canonical(model_name: &str) -> &str {
    match model_name.trim() {
        "large" => "large-v3",
        other => other,
    }
}

fn source_file(model_name: &str) -> Result<&'static str> {
    let id = canonical(model_name);
    MODEL_SOURCES
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, file)| *file)
        .ok_or_else(|| {
            Error::Config(format!(
                "Unknown model: {}. Available: {:?}",
                model_name,
                MODEL_SOURCES.iter().map(|(id, _)| *id).collect::<Vec<_>>()
            ))
        })
}

/// Local path a model is stored at, whether or not it exists yet.
pub fn model_file_path(models_dir: &Path, model_name: &str) -> Result<PathBuf> {
    Ok(models_dir.join(source_file(model_name)?))
}

/// Resolve model name (e.g. "base.en", "tiny") to full path if the model file exists.
pub fn resolve_model_path(models_dir: &Path, model_name: &str) -> Option<PathBuf> {
    model_file_path(models_dir, model_name)
        .ok()
        .filter(|path| path.exists())
}

/// List model names for .bin files that exist in models_dir and match known MODEL_SOURCES.
pub fn list_installed_model_names(models_dir: &Path) -> Vec<String> {
    MODEL_SOURCES
        .iter()
        .filter(|(_, file)| models_dir.join(file).exists())
        .map(|(id, _)| (*id).to_string())
        .collect()
}

/// Download with progress callback. Callback receives (bytes_downloaded, total_bytes).
/// total_bytes is None if Content-Length header is missing.
///
/// The body is streamed into a temp file in `models_dir` and renamed into
/// place when complete, so an interrupted download never leaves a model file.
pub async fn download_model_with_progress<F>(
    models_dir: &Path,
    model_name: &str,
    mut on_progress: F,
) -> Result<PathBuf>
where
    F: FnMut(u64, Option<u64>) + Send,
{
    use futures_util::StreamExt;

    let output_path = model_file_path(models_dir, model_name)?;
    if output_path.exists() {
        return Ok(output_path);
    }
    let url = format!(
        "https://huggingface.co/{}/resolve/main/{}",
        HF_REPO,
        source_file(model_name)?
    );
    info!("[models] downloading {} from {}", model_name, url);

    let download_err = |e: reqwest::Error| Error::Config(format!("Download failed: {}", e));
    let response = reqwest::get(&url).await.map_err(download_err)?;
    if !response.status().is_success() {
        return Err(Error::Config(format!("Download failed: {}", response.status())));
    }

    let total_bytes = response.content_length();
    let mut stream = response.bytes_stream();
    let mut file = tempfile::NamedTempFile::new_in(models_dir)?;
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let bytes = chunk.map_err(download_err)?;
        file.write_all(&bytes)?;
        downloaded += bytes.len() as u64;
        on_progress(downloaded, total_bytes);
    }
    file.flush()?;
    file.persist(&output_path).map_err(|e| e.error)?;
    info!("[models] saved {} ({} bytes)", output_path.display(), downloaded);
    Ok(output_path)
}

/// Path of an installed model, downloading it first when allowed.
pub async fn ensure_model(models_dir: &Path, model_name: &str, auto_download: bool) -> Result<PathBuf> {
    if let Some(path) = resolve_model_path(models_dir, model_name) {
        return Ok(path);
    }
    if !auto_download {
        return Err(Error::Config(format!(
            "Model {} is not installed in {} and auto download is off",
            model_name,
            models_dir.display()
        )));
    }
    let mut last_decile = 0;
    download_model_with_progress(models_dir, model_name, |done, total| {
        if let Some(total) = total.filter(|t| *t > 0) {
            let decile = done * 10 / total;
            if decile > last_decile {
                last_decile = decile;
                info!("[models] {}: {}%", model_name, decile * 10);
            }
        }
    })
    .await
}
