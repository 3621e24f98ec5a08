use std::{path::Path, sync::Arc};

use futures::{stream, Stream};
use reqwest::{multipart::Part, Body};

use crate::error::{ClientError, ClientResult};

pub const MAX_PDF_BYTES: u64 = 25 * 1024 * 1024;
pub const MAX_FILE_BYTES: u64 = 1024 * 1024 * 1024;
const CHUNK_SIZE: usize = 64 * 1024;
const PDF_MIME: &str = "application/pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub sent: u64,
    pub total: u64,
}

impl UploadProgress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.sent.min(self.total) * 100) / self.total) as u8
    }
}

/// Advisory progress callback; never used for flow control.
pub type ProgressSink = Arc<dyn Fn(UploadProgress) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime = guess_mime(&file_name);
        Self {
            file_name,
            mime,
            bytes,
        }
    }

    /// Reads a file from disk, refusing empty or oversized files from their
    /// metadata before any bytes are loaded.
    pub async fn read(path: &Path) -> ClientResult<Self> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|err| unreadable(path, err))?;
        check_len(&file_name, &guess_mime(&file_name), metadata.len())?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| unreadable(path, err))?;
        Ok(Self::new(file_name, bytes))
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_pdf(&self) -> bool {
        self.mime == PDF_MIME
    }

    pub fn size_limit(&self) -> u64 {
        size_limit_for(&self.mime)
    }

    pub fn check_size(&self) -> ClientResult<()> {
        check_len(&self.file_name, &self.mime, self.len())
    }

    /// Builds a multipart part whose body reports progress as it is consumed.
    pub(crate) fn into_part(self, progress: Option<ProgressSink>) -> ClientResult<Part> {
        let total = self.len();
        let body = progress_body(self.bytes, progress);
        Part::stream_with_length(body, total)
            .file_name(self.file_name)
            .mime_str(&self.mime)
            .map_err(ClientError::from)
    }
}

fn progress_body(bytes: Vec<u8>, progress: Option<ProgressSink>) -> Body {
    Body::wrap_stream(progress_chunks(bytes, progress))
}

/// Yields the payload in `CHUNK_SIZE` slices, copying one slice at a time.
fn progress_chunks(
    bytes: Vec<u8>,
    progress: Option<ProgressSink>,
) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + 'static {
    let total = bytes.len() as u64;
    stream::unfold((bytes, 0usize), move |(bytes, offset)| {
        let progress = progress.clone();
        async move {
            if offset >= bytes.len() {
                return None;
            }
            let end = (offset + CHUNK_SIZE).min(bytes.len());
            let chunk = bytes[offset..end].to_vec();
            if let Some(progress) = &progress {
                progress(UploadProgress {
                    sent: end as u64,
                    total,
                });
            }
            Some((Ok(chunk), (bytes, end)))
        }
    })
}

fn size_limit_for(mime: &str) -> u64 {
    if mime == PDF_MIME {
        MAX_PDF_BYTES
    } else {
        MAX_FILE_BYTES
    }
}

fn check_len(file_name: &str, mime: &str, len: u64) -> ClientResult<()> {
    if len == 0 {
        return Err(ClientError::validation(format!("{file_name} is empty")));
    }
    let limit = size_limit_for(mime);
    if len > limit {
        return Err(ClientError::validation(format!(
            "{file_name} exceeds the {} MB limit",
            limit / (1024 * 1024)
        )));
    }
    Ok(())
}

fn unreadable(path: &Path, err: std::io::Error) -> ClientError {
    ClientError::validation(format!("cannot read {}: {err}", path.display()))
}

pub fn guess_mime(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
