//! Document intake: pick one file, validate it, upload it
//!
//! Extension checks happen before anything touches the filesystem or the
//! network. A successful upload is reported to the caller exactly once.

use crate::api::{ApiCall, ApiHandle, ApiReply, RequestId};
use crate::{DocTutorError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Extensions the service can ingest
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["pdf", "txt"];

const UPLOAD_FAILED: &str = "Error uploading file";

/// Check a file name against [`SUPPORTED_EXTENSIONS`], ignoring case
pub fn is_supported_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| ext.eq_ignore_ascii_case(s))
        })
        .unwrap_or(false)
}

/// Size in megabytes with two decimals, e.g. `"1.50 MB"`
pub fn format_size_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

/// A validated file waiting to be uploaded
#[derive(Clone, Debug, PartialEq)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub name: String,
    pub size_bytes: u64,
}

impl SelectedFile {
    pub fn size_display(&self) -> String {
        format_size_mb(self.size_bytes)
    }
}

/// Reported once when the service accepted the document
#[derive(Clone, Debug, PartialEq)]
pub enum IntakeOutcome {
    Uploaded {
        file_name: String,
        chunk_count: u32,
    },
}

/// Intake view state
pub struct DocumentIntake {
    api: ApiHandle,
    selected: Option<SelectedFile>,
    error: Option<String>,
    pending: Option<(RequestId, String)>,
    completed: bool,
}

impl DocumentIntake {
    pub fn new(api: ApiHandle) -> Self {
        Self {
            api,
            selected: None,
            error: None,
            pending: None,
            completed: false,
        }
    }

    pub fn selected(&self) -> Option<&SelectedFile> {
        self.selected.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_uploading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn can_upload(&self) -> bool {
        self.selected.is_some() && !self.is_uploading() && !self.completed
    }

    /// Select a file for upload
    ///
    /// Unsupported names are rejected without reading the file and clear
    /// any previous selection.
    pub fn select(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if !is_supported_file(&name) {
            debug!("Rejected file selection: {:?}", name);
            self.selected = None;
            let err = DocTutorError::UnsupportedFile(name);
            self.error = Some(err.user_message());
            return Err(err);
        }

        let size_bytes = match fs::metadata(path) {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => {
                self.selected = None;
                let err = DocTutorError::IOError(format!("{} is not a file", path.display()));
                self.error = Some(format!("{} is not a file", name));
                return Err(err);
            }
            Err(e) => {
                self.selected = None;
                self.error = Some(format!("Cannot read {}", name));
                return Err(e.into());
            }
        };

        self.selected = Some(SelectedFile {
            path: path.to_path_buf(),
            name,
            size_bytes,
        });
        self.error = None;
        Ok(())
    }

    /// Send the selected file to the service
    ///
    /// Returns false when there is nothing to send or an upload is running.
    pub fn upload(&mut self) -> bool {
        if !self.can_upload() {
            return false;
        }
        let Some(file) = self.selected.clone() else {
            return false;
        };

        let bytes = match fs::read(&file.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read {}: {}", file.path.display(), e);
                self.error = Some(format!("Cannot read {}", file.name));
                return false;
            }
        };

        info!("Uploading {} ({})", file.name, file.size_display());
        self.error = None;
        let id = self.api.submit(ApiCall::Upload {
            file_name: file.name.clone(),
            bytes,
        });
        self.pending = Some((id, file.name));
        true
    }

    /// Apply any finished upload
    pub fn poll(&mut self) -> Option<IntakeOutcome> {
        let mut outcome = None;

        while let Some(response) = self.api.try_recv() {
            let Some((id, file_name)) = self.pending.take() else {
                continue;
            };
            if id != response.id {
                self.pending = Some((id, file_name));
                continue;
            }

            match response.result {
                Ok(ApiReply::Uploaded(reply)) if reply.success => {
                    info!("Upload accepted: {} chunks", reply.chunk_count);
                    if !self.completed {
                        self.completed = true;
                        outcome = Some(IntakeOutcome::Uploaded {
                            file_name,
                            chunk_count: reply.chunk_count,
                        });
                    }
                }
                Ok(ApiReply::Uploaded(reply)) => {
                    self.error = Some(if reply.message.is_empty() {
                        UPLOAD_FAILED.to_string()
                    } else {
                        reply.message
                    });
                }
                Ok(other) => {
                    warn!("Unexpected reply to upload: {:?}", other);
                    self.error = Some(UPLOAD_FAILED.to_string());
                }
                Err(e) => {
                    self.error = Some(e.detail().unwrap_or(UPLOAD_FAILED).to_string());
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiRequest, UploadResponse};
    use crossbeam_channel::Receiver;

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("doctutor-intake-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn setup() -> (DocumentIntake, Receiver<ApiRequest>) {
        let (api, requests) = ApiHandle::detached();
        (DocumentIntake::new(api), requests)
    }

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_file("notes.pdf"));
        assert!(is_supported_file("NOTES.PDF"));
        assert!(is_supported_file("a.b.Txt"));
        assert!(!is_supported_file("slides.pptx"));
        assert!(!is_supported_file("pdf"));
        assert!(!is_supported_file("archive.pdf.zip"));
        assert!(!is_supported_file(""));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size_mb(0), "0.00 MB");
        assert_eq!(format_size_mb(1024 * 1024 * 3 / 2), "1.50 MB");
        assert_eq!(format_size_mb(10 * 1024 * 1024), "10.00 MB");
    }

    #[test]
    fn test_rejected_selection_sends_nothing() {
        let (mut intake, requests) = setup();

        let err = intake.select("/nonexistent/report.docx").unwrap_err();
        assert!(matches!(err, DocTutorError::UnsupportedFile(_)));
        assert_eq!(intake.error(), Some("Please select a PDF or TXT file"));
        assert!(intake.selected().is_none());

        assert!(!intake.upload());
        assert!(requests.try_recv().is_err());
    }

    #[test]
    fn test_upload_success_reported_once() {
        let (mut intake, requests) = setup();
        let path = temp_file("chapter.txt", b"Photosynthesis converts light.");

        intake.select(&path).unwrap();
        assert_eq!(intake.selected().unwrap().name, "chapter.txt");
        assert!(intake.upload());
        assert!(intake.is_uploading());
        assert!(!intake.upload());

        let request = requests.try_recv().unwrap();
        match &request.call {
            ApiCall::Upload { file_name, bytes } => {
                assert_eq!(file_name, "chapter.txt");
                assert_eq!(bytes.as_slice(), b"Photosynthesis converts light.");
            }
            other => panic!("unexpected call {:?}", other),
        }
        request.respond(Ok(ApiReply::Uploaded(UploadResponse {
            success: true,
            message: "ok".into(),
            chunk_count: 4,
        })));

        assert_eq!(
            intake.poll(),
            Some(IntakeOutcome::Uploaded {
                file_name: "chapter.txt".into(),
                chunk_count: 4
            })
        );
        assert!(!intake.is_uploading());
        assert_eq!(intake.poll(), None);
        assert!(!intake.upload());
    }

    #[test]
    fn test_upload_failure_shows_detail() {
        let (mut intake, requests) = setup();
        let path = temp_file("empty.pdf", b"%PDF-1.4");

        intake.select(&path).unwrap();
        intake.upload();
        requests.try_recv().unwrap().respond(Err(DocTutorError::Backend {
            status: 400,
            detail: Some("No text could be extracted from the document".into()),
        }));

        assert_eq!(intake.poll(), None);
        assert_eq!(
            intake.error(),
            Some("No text could be extracted from the document")
        );
        assert!(!intake.is_uploading());
        assert!(intake.can_upload());
    }

    #[test]
    fn test_network_failure_uses_generic_message() {
        let (mut intake, requests) = setup();
        let path = temp_file("net.txt", b"text");

        intake.select(&path).unwrap();
        intake.upload();
        requests
            .try_recv()
            .unwrap()
            .respond(Err(DocTutorError::Network("refused".into())));

        assert_eq!(intake.poll(), None);
        assert_eq!(intake.error(), Some("Error uploading file"));
    }
}
