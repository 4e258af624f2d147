//! Test bundle upload and test asset download

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::api::{Transport, TransportError};

/// Longest file name the macOS file systems accept
pub const MAX_FILE_NAME_BYTES: usize = 255;

/// Suffix of the merged per-device JUnit report
pub const MERGED_REPORT_SUFFIX: &str = "test_results_merged.xml";

/// Prefix of the directory downloaded assets are saved in
pub const ASSETS_DIR_PREFIX: &str = "vdtesting_test_assets";

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("failed to upload {path}: {source}")]
    Upload {
        path: PathBuf,
        #[source]
        source: TransportError,
    },

    #[error("failed to upload {path}, response code was: {status}")]
    UploadStatus { path: PathBuf, status: u16 },

    #[error("failed to download {name}: {source}")]
    Download {
        name: String,
        #[source]
        source: TransportError,
    },

    #[error("failed to download {name}, non success response code: {status}")]
    DownloadStatus { name: String, status: u16 },

    #[error("refusing to write asset outside the download directory: {0}")]
    UnsafeFileName(String),

    #[error("failed to create download directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Upload the test bundle to a pre-signed URL
pub fn upload_bundle<T: Transport>(transport: &T, url: &str, path: &Path) -> Result<(), TransferError> {
    let response = transport
        .upload(url, path)
        .map_err(|source| TransferError::Upload {
            path: path.to_path_buf(),
            source,
        })?;

    if response.status != 200 {
        return Err(TransferError::UploadStatus {
            path: path.to_path_buf(),
            status: response.status,
        });
    }

    Ok(())
}

/// Keep the last 255 bytes of a file name, moving forward to a char boundary
pub fn trim_file_name(name: &str) -> Cow<'_, str> {
    if name.len() <= MAX_FILE_NAME_BYTES {
        return Cow::Borrowed(name);
    }

    let mut start = name.len() - MAX_FILE_NAME_BYTES;
    while !name.is_char_boundary(start) {
        start += 1;
    }

    let trimmed = &name[start..];
    warn!("too long filename: {}", name);
    warn!("trimming to: {}", trimmed);
    Cow::Borrowed(trimmed)
}

/// Local path for an asset name inside `dir`
pub fn asset_path(dir: &Path, name: &str) -> Result<PathBuf, TransferError> {
    let relative = Path::new(name);
    let safe = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    if !safe || name.is_empty() {
        return Err(TransferError::UnsafeFileName(name.to_string()));
    }

    let file_name = relative
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .ok_or_else(|| TransferError::UnsafeFileName(name.to_string()))?;

    let parent = relative.parent().unwrap_or_else(|| Path::new(""));
    Ok(dir.join(parent).join(&*trim_file_name(&file_name)))
}

/// Create the directory downloaded assets are saved in. It is kept after
/// the run so later CI steps can read it.
pub fn create_assets_dir() -> Result<PathBuf, TransferError> {
    let dir = tempfile::Builder::new().prefix(ASSETS_DIR_PREFIX).tempdir()?;
    Ok(dir.keep())
}

/// Download every asset into `dir` in name order. The first failure stops
/// the download.
pub fn download_assets<T: Transport>(
    transport: &T,
    assets: &BTreeMap<String, String>,
    dir: &Path,
) -> Result<Vec<PathBuf>, TransferError> {
    let mut downloaded = Vec::with_capacity(assets.len());

    for (name, url) in assets {
        let dest = asset_path(dir, name)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        debug!(name = %name, dest = %dest.display(), "Downloading test asset");
        let response = transport
            .download(url, &dest)
            .map_err(|source| TransferError::Download {
                name: name.clone(),
                source,
            })?;

        if response.status != 200 {
            return Err(TransferError::DownloadStatus {
                name: name.clone(),
                status: response.status,
            });
        }

        downloaded.push(dest);
    }

    Ok(downloaded)
}

/// The merged JUnit reports among downloaded files, order kept
pub fn merged_reports(paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .filter(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().ends_with(MERGED_REPORT_SUFFIX))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}
