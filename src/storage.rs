use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use crate::time::now_ms;
use crate::{AppError, AppResult};

pub const ERR_STORAGE_WRITE: &str = "ATTACHMENT/STORAGE_WRITE";

/// Public prefix consumers use to fetch a stored document.
pub const UPLOAD_PUBLIC_PREFIX: &str = "/uploads/historia-clinica";

/// Filesystem home for uploaded clinical documents. One directory, flat,
/// filenames unique by construction.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: Arc<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct StoredPdf {
    pub file_name: String,
    pub public_path: String,
}

impl UploadStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let mut root = data_dir.into();
        root.push("uploads");
        root.push("historia-clinica");
        Self {
            root: Arc::new(root),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Create the upload root recursively if it does not exist yet. Runs at
    /// startup, before any request handling.
    pub fn ensure_root(&self) -> AppResult<()> {
        std::fs::create_dir_all(self.root.as_path()).map_err(|err| {
            AppError::from(err)
                .with_context("operation", "ensure_upload_root")
                .with_context("path", self.root.display().to_string())
        })?;
        Ok(())
    }

    /// Persist decoded PDF bytes under a fresh storage name and return the
    /// name plus the public path derived from it.
    pub fn store_pdf(&self, bytes: &[u8]) -> AppResult<StoredPdf> {
        let file_name = generate_name();
        let target = self.root.join(&file_name);
        std::fs::write(&target, bytes).map_err(|err| {
            AppError::new(ERR_STORAGE_WRITE, "Could not persist the uploaded document")
                .with_context("path", target.display().to_string())
                .with_cause(AppError::from(err))
        })?;
        tracing::info!(
            target = "tomesvet",
            event = "document_stored",
            file = %file_name,
            bytes = bytes.len()
        );
        Ok(StoredPdf {
            public_path: format!("{UPLOAD_PUBLIC_PREFIX}/{file_name}"),
            file_name,
        })
    }
}

/// Timestamp component keeps names monotonically informative; the random
/// suffix avoids collisions between writes in the same millisecond. Not
/// content-addressed.
fn generate_name() -> String {
    let nonce = Uuid::new_v4().simple().to_string();
    format!("{}-{}.pdf", now_ms(), &nonce[..8])
}
