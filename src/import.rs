//! STIX import pipeline.
//!
//! Two entry points hand documents to the repository's import handlers:
//!
//! - [`ImportPipeline::import_file`] takes a path or an open stream holding
//!   one STIX document (or an archive of several) and always commits.
//! - [`ImportPipeline::import_text`] takes raw document text and can either
//!   commit or only preview what would be created.
//!
//! Parsing and object creation belong to the handlers ([`UploadHandler`],
//! [`DocumentImporter`]); they report problems inside the [`ImportResult`].
//! The pipeline adds only its own input checks: an unreadable file or a
//! payload that is not text becomes a failed result, never an error.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs::File;
use tokio::io::AsyncRead;
use tracing::{debug, warn};

use crate::models::ImportResult;
use crate::schema::json_type_name;

pub const DEFAULT_IMPORT_METHOD: &str = "STIX Import";

/// Where a file-oriented import reads from.
pub enum FileInput {
    /// Opened by the pipeline and closed when the import returns.
    Path(PathBuf),
    /// Already open; owned by the pipeline for the duration of the import.
    Stream(Box<dyn AsyncRead + Send + Unpin>),
}

impl From<PathBuf> for FileInput {
    fn from(path: PathBuf) -> Self {
        FileInput::Path(path)
    }
}

impl From<&Path> for FileInput {
    fn from(path: &Path) -> Self {
        FileInput::Path(path.to_path_buf())
    }
}

/// Parameters passed to an [`UploadHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub analyst: String,
    pub source: String,
    pub reference: String,
    pub use_header_source: bool,
    /// Always `true` for file imports.
    pub commit: bool,
}

/// Parameters passed to a [`DocumentImporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    pub analyst: String,
    pub source: String,
    pub reference: String,
    pub method: String,
    pub make_header_event: bool,
    pub use_header_source: bool,
    pub observables_as_indicators: bool,
    pub preview_only: bool,
}

/// Parses an uploaded STIX file or archive and creates its objects.
#[async_trait]
pub trait UploadHandler: Send + Sync {
    /// Reads the document from `reader`. I/O failures while reading are
    /// returned as `Err`; everything else is reported in the result.
    async fn upload(
        &self,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        request: &UploadRequest,
    ) -> io::Result<ImportResult>;
}

/// Parses STIX text and creates, or previews, its objects.
///
/// With `preview_only` set the importer must not persist anything, but
/// returns the same result shape it would for a commit.
#[async_trait]
pub trait DocumentImporter: Send + Sync {
    async fn import_document(&self, text: &str, request: &ImportRequest) -> ImportResult;
}

#[derive(Debug, Clone)]
pub struct FileImportOptions {
    pub analyst: String,
    pub source: String,
    pub reference: String,
    pub use_header_source: bool,
}

impl FileImportOptions {
    pub fn new(
        analyst: impl Into<String>,
        source: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            analyst: analyst.into(),
            source: source.into(),
            reference: reference.into(),
            use_header_source: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextImportOptions {
    pub analyst: String,
    pub source: String,
    pub reference: String,
    pub method: String,
    /// Create an event from the STIX header.
    pub header_events: bool,
    pub use_header_source: bool,
    /// Create an indicator for every bare observable.
    pub observables_as_indicators: bool,
    pub preview_only: bool,
}

impl TextImportOptions {
    pub fn new(
        analyst: impl Into<String>,
        source: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            analyst: analyst.into(),
            source: source.into(),
            reference: reference.into(),
            method: DEFAULT_IMPORT_METHOD.to_string(),
            header_events: true,
            use_header_source: true,
            observables_as_indicators: false,
            preview_only: false,
        }
    }

    pub fn preview(mut self) -> Self {
        self.preview_only = true;
        self
    }

    fn request(&self) -> ImportRequest {
        ImportRequest {
            analyst: self.analyst.clone(),
            source: self.source.clone(),
            reference: self.reference.clone(),
            method: self.method.clone(),
            make_header_event: self.header_events,
            use_header_source: self.use_header_source,
            observables_as_indicators: self.observables_as_indicators,
            preview_only: self.preview_only,
        }
    }
}

fn read_failure(err: &io::Error) -> ImportResult {
    ImportResult::failure(format!("Error reading STIX file - {}", err))
}

#[derive(Clone)]
pub struct ImportPipeline {
    uploader: Arc<dyn UploadHandler>,
    importer: Arc<dyn DocumentImporter>,
}

impl ImportPipeline {
    pub fn new(uploader: Arc<dyn UploadHandler>, importer: Arc<dyn DocumentImporter>) -> Self {
        Self { uploader, importer }
    }

    /// Imports a STIX file or archive, committing whatever it creates.
    pub async fn import_file(&self, input: FileInput, opts: &FileImportOptions) -> ImportResult {
        let request = UploadRequest {
            analyst: opts.analyst.clone(),
            source: opts.source.clone(),
            reference: opts.reference.clone(),
            use_header_source: opts.use_header_source,
            commit: true,
        };

        match input {
            FileInput::Path(path) => {
                let mut file = match File::open(&path).await {
                    Ok(file) => file,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "cannot open STIX file");
                        return read_failure(&e);
                    }
                };
                debug!(path = %path.display(), "importing STIX file");
                self.upload(&mut file, &request).await
            }
            FileInput::Stream(mut reader) => self.upload(reader.as_mut(), &request).await,
        }
    }

    async fn upload(
        &self,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        request: &UploadRequest,
    ) -> ImportResult {
        match self.uploader.upload(reader, request).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "failed reading STIX upload");
                read_failure(&e)
            }
        }
    }

    /// Imports or previews STIX text from an untrusted payload.
    ///
    /// Anything other than a JSON string is refused without reaching the
    /// importer.
    pub async fn import_text(&self, data: &Value, opts: &TextImportOptions) -> ImportResult {
        match data {
            Value::String(text) => self.import_str(text, opts).await,
            other => ImportResult::failure(format!(
                "Expected STIX string, got {}",
                json_type_name(other)
            )),
        }
    }

    pub async fn import_str(&self, text: &str, opts: &TextImportOptions) -> ImportResult {
        let request = opts.request();
        let result = self.importer.import_document(text, &request).await;
        debug!(
            preview = request.preview_only,
            success = result.success,
            imported = result.imported.len(),
            failed = result.failed.len(),
            "STIX text import finished"
        );
        result
    }
}
