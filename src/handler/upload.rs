//! File upload module
//!
//! Accepts one file from a `multipart/form-data` body, stores it under a
//! random name that keeps the client's extension, and reports the stored
//! path and the original filename to a completion callback.

use super::{Body, Handler, HandlerFuture, Route};
use crate::http;
use crate::ident::IdGenerator;
use crate::logger;
use http_body_util::BodyExt;
use hyper::header::CONTENT_TYPE;
use hyper::Request;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Completion handler invoked once per stored upload
///
/// Runs synchronously inside the request, before the response is sent.
pub trait UploadCallback: Send + Sync + 'static {
    fn on_saved(&self, stored_path: &Path, original_filename: &str);
}

impl<F> UploadCallback for F
where
    F: Fn(&Path, &str) + Send + Sync + 'static,
{
    fn on_saved(&self, stored_path: &Path, original_filename: &str) {
        self(stored_path, original_filename);
    }
}

/// A stored upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    /// Where the payload was written: `<storage_dir>/<id><ext>`
    pub stored_path: PathBuf,
    /// Filename declared by the client, untrusted
    pub original_filename: String,
    /// Payload size in bytes
    pub bytes: u64,
}

/// Why an upload was rejected, every variant answers 400
#[derive(Debug)]
pub enum UploadError {
    /// Body isn't usable multipart or lacks the expected file field
    Parse(String),
    /// Destination file could not be created
    Create(io::Error),
    /// Payload could not be copied completely
    Save(String),
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(cause) => write!(f, "Error parsing uploaded file: {cause}"),
            Self::Create(cause) => write!(f, "Error creating file: {cause}"),
            Self::Save(cause) => write!(f, "Error saving file: {cause}"),
        }
    }
}

impl std::error::Error for UploadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Create(e) => Some(e),
            Self::Parse(_) | Self::Save(_) => None,
        }
    }
}

/// Upload endpoint
///
/// Destination files are opened with `create_new`, so an existing file is
/// never overwritten, and a payload that fails mid-copy is removed again.
#[derive(Clone)]
pub struct Upload {
    form_key: Arc<str>,
    storage_dir: Arc<PathBuf>,
    ids: Arc<IdGenerator>,
    on_saved: Arc<dyn UploadCallback>,
}

impl Upload {
    /// `storage_dir` must already exist and be writable, it is not created
    pub fn new(
        form_key: impl Into<String>,
        storage_dir: impl Into<PathBuf>,
        ids: Arc<IdGenerator>,
        on_saved: impl UploadCallback,
    ) -> Self {
        Self {
            form_key: Arc::from(form_key.into()),
            storage_dir: Arc::new(storage_dir.into()),
            ids,
            on_saved: Arc::new(on_saved),
        }
    }

    /// Store the file field of `req` without invoking the callback
    pub async fn ingest(&self, req: Request<Body>) -> Result<UploadRecord, UploadError> {
        let boundary = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                UploadError::Parse("request Content-Type isn't multipart/form-data".to_string())
            })
            .and_then(|ct| {
                multer::parse_boundary(ct).map_err(|e| UploadError::Parse(e.to_string()))
            })?;

        let mut multipart = multer::Multipart::new(req.into_body().into_data_stream(), boundary);

        let mut field = loop {
            let next = multipart
                .next_field()
                .await
                .map_err(|e| UploadError::Parse(e.to_string()))?;
            let Some(mut field) = next else {
                return Err(UploadError::Parse(format!(
                    "no file in form field '{}'",
                    self.form_key
                )));
            };
            // An empty filename is an ordinary form value, not a file
            if field.name() == Some(&*self.form_key)
                && field.file_name().is_some_and(|n| !n.is_empty())
            {
                break field;
            }
            // Skip over fields we don't care about
            while field
                .chunk()
                .await
                .map_err(|e| UploadError::Parse(e.to_string()))?
                .is_some()
            {}
        };

        let original_filename = field.file_name().unwrap_or_default().to_string();
        let stored_name = format!("{}{}", self.ids.generate(), extension(&original_filename));
        let stored_path = self.storage_dir.join(stored_name);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&stored_path)
            .await
            .map_err(UploadError::Create)?;
        // Removes the file on any exit before `keep`, cancellation included
        let partial = PartialFile::new(&stored_path);

        let bytes = copy_field(&mut field, &mut file).await?;
        drop(file);
        partial.keep();

        Ok(UploadRecord {
            stored_path,
            original_filename,
            bytes,
        })
    }
}

impl Handler for Upload {
    fn call(&self, req: Request<Body>) -> HandlerFuture {
        let this = self.clone();
        Box::pin(async move {
            match this.ingest(req).await {
                Ok(record) => {
                    logger::log_upload_saved(
                        &record.stored_path,
                        &record.original_filename,
                        record.bytes,
                    );
                    this.on_saved
                        .on_saved(&record.stored_path, &record.original_filename);
                    http::build_empty_response()
                }
                Err(e) => {
                    logger::log_warning(&format!("Upload rejected: {e}"));
                    http::build_400_response(&e.to_string())
                }
            }
        })
    }
}

/// Route accepting uploads at `url_path`
pub fn upload_route(
    url_path: impl Into<String>,
    form_key: impl Into<String>,
    storage_dir: impl Into<PathBuf>,
    ids: Arc<IdGenerator>,
    on_saved: impl UploadCallback,
) -> Route {
    Route::new(url_path, Upload::new(form_key, storage_dir, ids, on_saved))
}

/// Extension of the client filename, dot included, empty if there is none
///
/// Only the last path element counts: `../x/photo.JPG` gives `.JPG`.
fn extension(filename: &str) -> &str {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    base.rfind('.').map_or("", |idx| &base[idx..])
}

/// Stream the field payload into `file` and flush it to disk
async fn copy_field(field: &mut multer::Field<'_>, file: &mut File) -> Result<u64, UploadError> {
    let mut written: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| UploadError::Save(e.to_string()))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| UploadError::Save(e.to_string()))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| UploadError::Save(e.to_string()))?;
    file.sync_all()
        .await
        .map_err(|e| UploadError::Save(e.to_string()))?;
    Ok(written)
}

/// Deletes a destination file when dropped, unless [`PartialFile::keep`] ran
struct PartialFile {
    path: Option<PathBuf>,
}

impl PartialFile {
    fn new(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
        }
    }

    fn keep(mut self) {
        self.path = None;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => logger::log_debug(&format!(
                "Removed partial upload '{}'",
                path.display()
            )),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => logger::log_warning(&format!(
                "Failed to remove partial upload '{}': {e}",
                path.display()
            )),
        }
    }
}
