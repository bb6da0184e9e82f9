use crate::conversion::controller;
use crate::server::error::ApiError;
use crate::server::AppContext;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use dashforge_common::Protocol;
use dashforge_demux::local::ProcessDecoder;
use dashforge_demux::Demux;

pub fn routes() -> axum::Router<AppContext> {
    axum::Router::new()
        .route("/dash/:filename/generate", post(generate).delete(stop))
        .route("/dash/:filename/:elm", get(element))
}

/// The external decoder binary `LocalDemux` shells out to for file-protocol
/// assets; `dash`/`smooth` assets need no local decoder.
const DECODER_BINARY: &str = "ffprobe";

fn demux_for(protocol: Protocol) -> Demux {
    match protocol {
        Protocol::File => Demux::local(Box::new(ProcessDecoder::new(DECODER_BINARY))),
        Protocol::Dash => Demux::dash(),
        Protocol::Smooth => Demux::smooth(),
    }
}

async fn generate(
    State(ctx): State<AppContext>,
    Path(filename): Path<String>,
) -> Result<StatusCode, ApiError> {
    let Some(stop_flag) = ctx.cache_index.try_begin_build(&filename)? else {
        // Already cached: build is a no-op.
        return Ok(StatusCode::NO_CONTENT);
    };

    let record = ctx.cache_index.asset_record(&filename)?;
    let source = ctx.cache_index.source_url(&filename)?;
    let cache_root = ctx.config.cache_dir.clone();
    let demux = demux_for(record.protocol);

    if record.is_live {
        let cache_index = ctx.cache_index.clone();
        let name = filename.clone();
        tokio::spawn(async move {
            if let Err(err) = controller::run_live_build(demux, &source, &name, &cache_root, stop_flag).await {
                tracing::error!(asset = %name, error = %err, "live build ended with an error");
            }
            cache_index.finish_build(&name, false);
        });
        return Ok(StatusCode::NO_CONTENT);
    }

    match controller::run_static_build(demux, &source, &filename, &cache_root).await {
        Ok(()) => {
            ctx.cache_index.finish_build(&filename, true);
            Ok(StatusCode::NO_CONTENT)
        }
        Err(err) => {
            tracing::error!(asset = %filename, error = %err, "static build failed");
            ctx.cache_index.finish_build(&filename, false);
            Ok(StatusCode::NOT_FOUND)
        }
    }
}

async fn stop(State(ctx): State<AppContext>, Path(filename): Path<String>) -> Result<StatusCode, ApiError> {
    ctx.cache_index.stop(&filename)?;
    Ok(StatusCode::NO_CONTENT)
}

fn content_type_for(elm: &str) -> &'static str {
    if elm.ends_with(".mpd") {
        "application/dash+xml"
    } else if elm.ends_with(".mp4") {
        "video/mp4"
    } else {
        "application/octet-stream"
    }
}

async fn element(
    State(ctx): State<AppContext>,
    Path((filename, elm)): Path<(String, String)>,
) -> impl IntoResponse {
    let path = ctx.cache_index.element(&filename, &elm);
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type_for(&elm))],
            bytes,
        )
            .into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}
