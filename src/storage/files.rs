use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::fs;

use crate::error::ApiError;
use crate::storage::paths::{self, DYES_FILE, LOCALES_DIR};

/// Read/overwrite access to the JSON data files, rooted at the canonical
/// data directory validated at startup.
///
/// Every caller-influenced path segment goes through the containment check
/// before any filesystem operation, even though locale codes are also
/// shape-checked first.
pub struct DataStore {
    root: PathBuf,
}

impl DataStore {
    /// `root` must be the canonicalized path returned by
    /// `paths::validate_root`.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub async fn read_dyes(&self) -> Result<Value, ApiError> {
        self.read_json(&self.root.join(DYES_FILE)).await
    }

    pub async fn write_dyes(&self, value: &Value) -> Result<(), ApiError> {
        self.write_json(&self.root.join(DYES_FILE), value).await
    }

    pub async fn read_locale(&self, code: &str) -> Result<Value, ApiError> {
        let path = self.locale_path(code)?;
        if !path.is_file() {
            return Err(ApiError::not_found("Locale not found"));
        }
        self.read_json(&path).await
    }

    pub async fn write_locale(&self, code: &str, value: &Value) -> Result<(), ApiError> {
        let path = self.locale_path(code)?;
        self.write_json(&path, value).await
    }

    /// Resolve `<root>/locales/<code>.json`, rejecting codes that are not
    /// plain lowercase identifiers and anything that resolves outside the
    /// locale directory.
    fn locale_path(&self, code: &str) -> Result<PathBuf, ApiError> {
        if !is_locale_code(code) {
            tracing::warn!(target: "audit", locale = %code.escape_debug(), "rejected locale path segment");
            return Err(ApiError::bad_request("Invalid locale code"));
        }

        let dir = self.root.join(LOCALES_DIR);
        let candidate = dir.join(format!("{code}.json"));
        if !paths::contains(&candidate, &dir) {
            tracing::warn!(target: "audit", locale = %code.escape_debug(), "locale path escaped the data root");
            return Err(ApiError::bad_request("Invalid locale code"));
        }

        Ok(candidate)
    }

    async fn read_json(&self, path: &Path) -> Result<Value, ApiError> {
        let bytes = fs::read(path).await.map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "data file read failed");
            ApiError::internal_server_error("Failed to read data file")
        })?;

        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "data file is not valid JSON");
            ApiError::internal_server_error("Data file is corrupted")
        })
    }

    async fn write_json(&self, path: &Path, value: &Value) -> Result<(), ApiError> {
        let body = serde_json::to_vec_pretty(value).map_err(|e| {
            tracing::error!(error = %e, "failed to serialize data file");
            ApiError::internal_server_error("Failed to serialize data")
        })?;

        // Write to a sibling temp file then rename, so a crash mid-write
        // never leaves a truncated data file behind.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &body).await.map_err(|e| {
            tracing::error!(path = %tmp.display(), error = %e, "data file write failed");
            ApiError::internal_server_error("Failed to write data file")
        })?;
        fs::rename(&tmp, path).await.map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "data file rename failed");
            ApiError::internal_server_error("Failed to write data file")
        })
    }
}

fn is_locale_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= 16
        && code
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}
