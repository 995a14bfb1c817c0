//! Streaming an upload into its instance folder.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::error::ReceiveError;
use crate::tracker::ServiceStateTracker;

const CHUNK_SIZE: usize = 64 * 1024;

/// A file that was fully written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    /// Destination path.
    pub path: PathBuf,
    /// File name inside the instance folder.
    pub file_name: String,
    /// Bytes written.
    pub bytes: u64,
    /// Lowercase hex SHA-256 of the written bytes.
    pub sha256: String,
}

/// Copies an upload stream to disk while it is tracked as in flight.
///
/// The receiver only reports failure; deleting the partially written
/// instance folder is the caller's decision.
#[derive(Clone)]
pub struct PackageReceiver {
    tracker: Arc<ServiceStateTracker>,
    timeout: Option<Duration>,
}

impl PackageReceiver {
    /// Receiver reporting into `tracker`, optionally bounded by `timeout`.
    #[must_use]
    pub const fn new(tracker: Arc<ServiceStateTracker>, timeout: Option<Duration>) -> Self {
        Self { tracker, timeout }
    }

    /// Stream `reader` into `folder/file_name`.
    ///
    /// The file name is registered in the uploads set for the whole call,
    /// including when the future is dropped part way.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiveError::Io`] on read or write failure and
    /// [`ReceiveError::TimedOut`] when the configured bound elapses.
    pub async fn receive<R>(
        &self,
        reader: R,
        folder: &Path,
        file_name: &str,
    ) -> Result<ReceivedFile, ReceiveError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let _in_flight = self.tracker.begin_upload(file_name);
        let path = folder.join(file_name);
        let copy = copy_to_file(reader, &path);
        let (bytes, sha256) = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, copy)
                .await
                .map_err(|_| ReceiveError::TimedOut {
                    limit,
                    path: path.clone(),
                })??,
            None => copy.await?,
        };
        debug!(path = %path.display(), bytes, "upload stream persisted");
        Ok(ReceivedFile {
            path,
            file_name: file_name.to_string(),
            bytes,
            sha256,
        })
    }
}

async fn copy_to_file<R>(mut reader: R, path: &Path) -> Result<(u64, String), ReceiveError>
where
    R: AsyncRead + Unpin + Send,
{
    let io_err = |operation: &'static str| {
        move |source: std::io::Error| ReceiveError::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    };

    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(io_err("receive.create"))?;
    let mut writer = BufWriter::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0_u8; CHUNK_SIZE];
    let mut total: u64 = 0;

    loop {
        let read = reader
            .read(&mut buffer)
            .await
            .map_err(io_err("receive.read"))?;
        if read == 0 {
            break;
        }
        let chunk = &buffer[..read];
        hasher.update(chunk);
        writer
            .write_all(chunk)
            .await
            .map_err(io_err("receive.write"))?;
        total = total.saturating_add(read as u64);
    }

    writer.flush().await.map_err(io_err("receive.flush"))?;
    writer
        .into_inner()
        .sync_all()
        .await
        .map_err(io_err("receive.sync"))?;
    Ok((total, format!("{:x}", hasher.finalize())))
}
