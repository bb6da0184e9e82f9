use crate::server::error::ApiError;
use crate::server::AppContext;
use crate::state::AssetRecord;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Json;
use dashforge_common::{Error, Protocol};
use serde::Deserialize;
use std::str::FromStr;

pub fn routes() -> axum::Router<AppContext> {
    axum::Router::new()
        .route("/files", get(list_files).post(add_file))
        .route("/files/upload", post(upload_file))
}

/// `POST /files` request body.
#[derive(Deserialize)]
struct AddFileRequest {
    #[serde(rename = "Proto")]
    proto: String,
    #[serde(rename = "Path")]
    path: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "IsLive")]
    is_live: bool,
}

async fn list_files(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(ctx.cache_index.list_availables())
}

async fn add_file(
    State(ctx): State<AppContext>,
    Json(request): Json<AddFileRequest>,
) -> Result<StatusCode, ApiError> {
    let protocol = Protocol::from_str(&request.proto)?;
    ctx.cache_index.add_available(AssetRecord {
        name: request.name,
        protocol,
        path: request.path,
        is_live: request.is_live,
    });
    Ok(StatusCode::NO_CONTENT)
}

async fn upload_file(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> Result<StatusCode, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::malformed_input(e.to_string()))?
    {
        if field.name() != Some("video") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| Error::malformed_input("upload field has no file name"))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::malformed_input(e.to_string()))?;

        let dest = ctx.config.video_dir.join(&file_name);
        tokio::fs::write(&dest, &data).await.map_err(Error::Io)?;
        ctx.cache_index.add_file(&dest);
        return Ok(StatusCode::NO_CONTENT);
    }
    Err(Error::malformed_input("missing `video` field").into())
}
