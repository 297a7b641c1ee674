use crate::core::config::Layout;
use crate::core::error::DownloadError;
use crate::core::state::AppState;
use crate::models::download::{DownloadOutput, DownloadResponse};
use crate::stores::torrent_store::{create_dir_all, PersistedTorrent, TorrentStore};
use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

const TORRENT_FIELD: &str = "torrent";

/// Accept a torrent upload and start downloading it
///
/// POST /api/download (multipart, field `torrent`)
///
/// # Flow
/// 1. Find the `torrent` part and persist it as `<id>.torrent`
/// 2. Prepare the agent's output directory
/// 3. Launch the agent and register the download
/// 4. Respond with the download URL without waiting for the agent
#[instrument(skip_all)]
pub async fn download_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, DownloadError> {
    let mut multipart = multipart.map_err(|e| {
        warn!(error = %e, "Upload is not a multipart form");
        DownloadError::BadRequest
    })?;

    let torrent = loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                warn!("Upload has no torrent field");
                return Err(DownloadError::BadRequest);
            }
            Err(e) => {
                warn!(error = %e, status = %e.status(), "Malformed multipart body");
                return Err(upload_error(&e));
            }
        };

        if field.name() == Some(TORRENT_FIELD) {
            break persist_field(&state.torrent_store, field).await?;
        }
    };

    info!(
        download_id = %torrent.id,
        torrent_path = %torrent.path.display(),
        size = torrent.size,
        "Torrent persisted"
    );

    let isolated = state.config.storage.layout == Layout::Isolated;
    let output_dir = state.output_dir(&torrent.id);
    create_dir_all(&output_dir).await.map_err(|e| {
        error!(output_dir = %output_dir.display(), error = %e, "Failed to create output directory");
        DownloadError::Storage(e.to_string())
    })?;

    let child = match state.supervisor.launch(&output_dir, &torrent.path) {
        Ok(child) => child,
        Err(e) => {
            error!(
                download_id = %torrent.id,
                program = %state.config.agent.program.display(),
                error = %e,
                "Failed to launch download agent"
            );
            if isolated {
                if let Err(e) = tokio::fs::remove_dir(&output_dir).await {
                    warn!(output_dir = %output_dir.display(), error = %e, "Failed to remove unused output directory");
                }
            }
            return Err(DownloadError::Launch(e.to_string()));
        }
    };

    info!(
        download_id = %torrent.id,
        pid = ?child.id(),
        output_dir = %output_dir.display(),
        "Download agent launched"
    );

    let state_tx = state.registry.register(DownloadOutput {
        id: torrent.id.clone(),
        torrent_path: torrent.path.clone(),
        output_dir: output_dir.clone(),
        isolated,
    });
    state.supervisor.supervise(torrent.id.clone(), child, state_tx);

    Ok((
        StatusCode::OK,
        Json(DownloadResponse {
            download_url: state.download_url(&torrent.id),
        }),
    )
        .into_response())
}

/// Stream one multipart field into a new torrent file
async fn persist_field(
    store: &TorrentStore,
    mut field: Field<'_>,
) -> Result<PersistedTorrent, DownloadError> {
    let mut pending = store.create().await.map_err(|e| {
        error!(dir = %store.dir().display(), error = %e, "Failed to create torrent file");
        DownloadError::Storage(e.to_string())
    })?;

    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if let Err(e) = pending.write_chunk(&chunk).await {
                    error!(path = %pending.path().display(), error = %e, "Failed to write torrent file");
                    pending.discard().await;
                    return Err(DownloadError::Storage(e.to_string()));
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, status = %e.status(), "Failed to read torrent upload");
                pending.discard().await;
                return Err(upload_error(&e));
            }
        }
    }

    let path = pending.path().to_path_buf();
    pending.finish().await.map_err(|e| {
        error!(path = %path.display(), error = %e, "Failed to close torrent file");
        DownloadError::Storage(e.to_string())
    })
}

fn upload_error(e: &MultipartError) -> DownloadError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        DownloadError::TooLarge
    } else {
        DownloadError::BadRequest
    }
}
