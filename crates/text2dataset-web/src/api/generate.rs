use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use text2dataset_core::{
    export, Dataset, GenerationParams, InputSource, LabelMode, OutputFormat,
};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};
use crate::session::CurrentUser;
use crate::state::AppState;

const ALLOWED_EXTENSIONS: &[&str] = &["txt", "md", "csv"];
const DATASET_ID_HEADER: HeaderName = HeaderName::from_static("x-dataset-id");

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", post(generate))
        .route("/download/{dataset_id}", get(download))
}

fn multipart_error(e: &MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge(format!("Upload is too large: {}", e.body_text()));
    }
    AppError::Validation(format!("Failed to read upload: {}", e.body_text()))
}

/// Fields of the generation form. Unknown fields are ignored.
#[derive(Debug, Default)]
struct GenerateForm {
    text_input: Option<String>,
    upload: Option<(String, Vec<u8>)>,
    output_format: Option<String>,
    mode: Option<String>,
    custom_name: Option<String>,
}

impl GenerateForm {
    async fn read(mut multipart: Multipart, max_file_size: usize) -> AppResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(&e))?
        {
            let name = field.name().unwrap_or("").to_string();
            if name == "file_upload" {
                let filename = field.file_name().unwrap_or("").to_string();
                let data = field.bytes().await.map_err(|e| multipart_error(&e))?;
                if data.len() > max_file_size {
                    return Err(AppError::PayloadTooLarge(format!(
                        "File is too large (max {max_file_size} bytes)"
                    )));
                }
                // Browsers send an empty part when no file was chosen.
                if !filename.is_empty() && !data.is_empty() {
                    form.upload = Some((filename, data.to_vec()));
                }
                continue;
            }

            let value = field.text().await.map_err(|e| multipart_error(&e))?;
            match name.as_str() {
                "text_input" => form.text_input = Some(value),
                "output_format" => form.output_format = Some(value),
                "mode" => form.mode = Some(value),
                "custom_name" => form.custom_name = Some(value),
                _ => {}
            }
        }

        Ok(form)
    }

    /// The text to label. An uploaded file takes precedence over pasted text.
    fn input_text(&mut self) -> AppResult<(String, InputSource)> {
        let Some((filename, data)) = self.upload.take() else {
            return Ok((self.text_input.take().unwrap_or_default(), InputSource::Text));
        };

        let filename = filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .to_string();
        let extension = FsPath::new(&filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        if !extension.is_some_and(|e| ALLOWED_EXTENSIONS.contains(&e.as_str())) {
            return Err(AppError::UnsupportedFile(format!(
                "Unsupported file type: {filename} (allowed: .txt, .md, .csv)"
            )));
        }

        let text = String::from_utf8(data)
            .map_err(|_| AppError::Validation("Uploaded file must be UTF-8 text".into()))?;
        let text = text.trim_start_matches('\u{feff}').to_string();
        Ok((text, InputSource::File { filename }))
    }
}

fn check_length(text: &str, config: &ServerConfig) -> AppResult<()> {
    let len = text.trim().chars().count();
    if len == 0 {
        return Err(AppError::Validation("No text provided".into()));
    }
    if len < config.min_text_length {
        return Err(AppError::Validation(format!(
            "Text must be at least {} characters long",
            config.min_text_length
        )));
    }
    if len > config.max_text_length {
        return Err(AppError::Validation(format!(
            "Text is too long (max {} characters)",
            config.max_text_length
        )));
    }
    Ok(())
}

fn attachment(filename: &str, format: OutputFormat, dataset_id: Uuid, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, format.media_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
            (DATASET_ID_HEADER, dataset_id.to_string()),
        ],
        bytes,
    )
        .into_response()
}

async fn generate(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> AppResult<Response> {
    if user.as_ref().is_some_and(|u| u.banned) {
        return Err(AppError::Forbidden("This account has been banned".into()));
    }

    let mut form = GenerateForm::read(multipart, state.config.max_file_size).await?;
    let format: OutputFormat = form.output_format.as_deref().unwrap_or("csv").parse()?;
    let mode: LabelMode = form.mode.as_deref().unwrap_or("fast").parse()?;
    let custom_name = form
        .custom_name
        .take()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let (text, source) = form.input_text()?;
    check_length(&text, &state.config)?;

    let pipeline = Arc::clone(&state.pipeline);
    let output = tokio::task::spawn_blocking(move || pipeline.label_text(mode, &text))
        .await
        .map_err(|e| AppError::Internal(format!("Labeling task failed: {e}")))??;

    let dataset_id = Uuid::now_v7();
    let filename = export::output_filename(custom_name.as_deref(), dataset_id, format);
    let bytes = export::export(&output.rows, format)?;
    state.outputs.write(&filename, &bytes).await?;

    let params = GenerationParams {
        mode,
        format,
        custom_name,
        sentence_count: output.sentence_count,
        source,
    };
    let dataset = Dataset::new(
        dataset_id,
        filename,
        user.map(|u| u.username),
        params,
        output.rows,
        state.retention(),
    );
    if let Err(e) = state.store.insert_dataset(&dataset).await {
        if let Err(remove_err) = state.outputs.remove(&dataset.filename).await {
            tracing::warn!(%dataset_id, error = %remove_err, "Failed to remove unsaved output file");
        }
        return Err(e.into());
    }

    tracing::info!(
        %dataset_id,
        %mode,
        %format,
        rows = dataset.entity_count,
        sentences = dataset.params.sentence_count,
        "Generated dataset"
    );
    Ok(attachment(&dataset.filename, format, dataset_id, bytes))
}

async fn download(
    State(state): State<AppState>,
    Path(dataset_id): Path<Uuid>,
) -> AppResult<Response> {
    let dataset = state.store.get_dataset(dataset_id).await?;
    let bytes = state.outputs.read(&dataset, Utc::now()).await?;

    if let Err(e) = state.store.record_download(dataset_id).await {
        tracing::warn!(%dataset_id, error = %e, "Failed to record download");
    }
    Ok(attachment(
        &dataset.filename,
        dataset.params.format,
        dataset_id,
        bytes,
    ))
}
