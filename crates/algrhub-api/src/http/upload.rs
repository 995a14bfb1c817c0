//! Multipart upload endpoint.
//!
//! # Design
//! - The file part is spooled chunk by chunk into an anonymous temporary file
//!   while it is registered in the uploads in-flight set, so fields may arrive
//!   in any order without holding the package in memory.
//! - Transport failures (not multipart, truncated, over the limit, spool
//!   failure) are reported as `TransmissionFile`; everything else comes from
//!   the orchestrator's error code.

use std::io::{self, SeekFrom};
use std::sync::Arc;

use algrhub_intake::{ErrorCode, FilePart, ServiceStateTracker, UploadRequest};
use axum::{
    Extension, Json,
    body::Bytes,
    extract::{
        Multipart, State,
        multipart::{Field, MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::http::constants::{
    FIELD_DESCRIPTION, FIELD_FILE, FIELD_LANGUAGE, FIELD_NAME, FIELD_USER_ID,
};
use crate::http::telemetry::UploadOutcome;
use crate::models::BaseResponse;
use crate::state::ApiState;

#[derive(Debug, Error)]
enum FormError {
    #[error("multipart stream failed")]
    Multipart {
        #[from]
        source: MultipartError,
    },
    #[error("upload spool failed")]
    Spool {
        operation: &'static str,
        source: io::Error,
    },
}

impl FormError {
    const fn spool(operation: &'static str, source: io::Error) -> Self {
        Self::Spool { operation, source }
    }
}

/// Source of file part bytes.
trait ChunkSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, MultipartError>;
}

impl ChunkSource for Field<'_> {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, MultipartError> {
        self.chunk().await
    }
}

#[derive(Default)]
struct UploadForm {
    name: Option<String>,
    description: Option<String>,
    language: Option<String>,
    user_id: Option<String>,
    file: Option<FilePart<File>>,
}

impl UploadForm {
    fn into_request(self) -> UploadRequest<File> {
        UploadRequest {
            name: self.name,
            description: self.description,
            language: self.language,
            owner_id: self.user_id,
            file: self.file,
        }
    }
}

/// Copy a file part into an anonymous temporary file, rewound for reading.
///
/// The part counts as an in-flight upload under `key` while it streams.
async fn spool<S: ChunkSource>(
    source: &mut S,
    tracker: &ServiceStateTracker,
    key: &str,
) -> Result<(File, u64), FormError> {
    let _transfer = tracker.begin_upload(key);
    let std_file = tokio::task::spawn_blocking(tempfile::tempfile)
        .await
        .map_err(|err| FormError::spool("spool.create", io::Error::other(err)))?
        .map_err(|err| FormError::spool("spool.create", err))?;
    let mut file = File::from_std(std_file);
    let mut bytes = 0_u64;
    while let Some(chunk) = source.next_chunk().await? {
        file.write_all(&chunk)
            .await
            .map_err(|err| FormError::spool("spool.write", err))?;
        bytes = bytes.saturating_add(u64::try_from(chunk.len()).unwrap_or(u64::MAX));
    }
    file.flush()
        .await
        .map_err(|err| FormError::spool("spool.flush", err))?;
    file.seek(SeekFrom::Start(0))
        .await
        .map_err(|err| FormError::spool("spool.rewind", err))?;
    Ok((file, bytes))
}

/// Collect the known fields; the first occurrence of each wins.
async fn read_form(
    mut multipart: Multipart,
    tracker: &ServiceStateTracker,
) -> Result<UploadForm, FormError> {
    let mut form = UploadForm::default();
    while let Some(mut field) = multipart.next_field().await? {
        let Some(field_name) = field.name().map(str::to_owned) else {
            continue;
        };
        let slot = match field_name.as_str() {
            FIELD_FILE => {
                if form.file.is_some() {
                    continue;
                }
                let file_name = field.file_name().map(str::to_owned);
                let key = file_name.clone().unwrap_or_default();
                let (reader, bytes) = spool(&mut field, tracker, &key).await?;
                debug!(file_name = %key, bytes, "file part spooled");
                form.file = Some(FilePart { file_name, reader });
                continue;
            }
            FIELD_NAME => &mut form.name,
            FIELD_DESCRIPTION => &mut form.description,
            FIELD_LANGUAGE => &mut form.language,
            FIELD_USER_ID => &mut form.user_id,
            _ => continue,
        };
        let value = field.text().await?;
        if slot.is_none() {
            *slot = Some(value);
        }
    }
    Ok(form)
}

fn respond(status: StatusCode, code: ErrorCode, body: BaseResponse) -> Response {
    (status, Extension(UploadOutcome(code)), Json(body)).into_response()
}

pub(crate) async fn upload(
    State(state): State<Arc<ApiState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let form = match multipart {
        Ok(multipart) => read_form(multipart, state.orchestrator.tracker()).await,
        Err(rejection) => {
            warn!(error = %rejection, "upload is not a multipart request");
            return reject_transport(&state);
        }
    };
    let form = match form {
        Ok(form) => form,
        Err(FormError::Multipart { source }) => {
            warn!(error = %source, status = %source.status(), "failed to read multipart upload");
            return reject_transport(&state);
        }
        Err(FormError::Spool { operation, source }) => {
            warn!(error = %source, operation, "failed to spool file part");
            return reject_transport(&state);
        }
    };

    let outcome = state.orchestrator.upload(form.into_request()).await;
    state.sync_storage_health();
    match outcome {
        Ok(accepted) => respond(
            StatusCode::OK,
            ErrorCode::Success,
            BaseResponse::accepted(&accepted),
        ),
        Err(err) => respond(
            StatusCode::BAD_REQUEST,
            err.code(),
            BaseResponse::rejected(err.code()),
        ),
    }
}

fn reject_transport(state: &ApiState) -> Response {
    let code = ErrorCode::TransmissionFile;
    state.telemetry.inc_upload_rejected(code.as_u16());
    respond(StatusCode::BAD_REQUEST, code, BaseResponse::rejected(code))
}
