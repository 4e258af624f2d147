//! Test bundle repacking

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::xctestrun::rewrite_xctestrun;
use super::{QuarantineError, SkippedTestsByTarget};

const XCTESTRUN_EXTENSION: &str = "xctestrun";
const BUNDLE_FILE_NAME: &str = "testbundle.zip";
const COMPRESSION_LEVEL: i64 = 6;

fn is_xctestrun(path: &Path) -> bool {
    path.extension().map(|e| e == XCTESTRUN_EXTENSION).unwrap_or(false)
}

/// Unpack the bundle, add the skipped tests to every top-level `.xctestrun`
/// and repack it. Returns the path of the new archive.
pub fn apply_to_bundle(zip_path: &Path, skipped: &SkippedTestsByTarget) -> Result<PathBuf, QuarantineError> {
    let unpacked = tempfile::Builder::new()
        .prefix("test_bundle")
        .tempdir()
        .map_err(|e| QuarantineError::io(std::env::temp_dir(), e))?;
    unpack(zip_path, unpacked.path())?;

    let entries = top_level_entries(unpacked.path())?;
    for path in entries.iter().filter(|p| p.is_file() && is_xctestrun(p)) {
        debug!(path = %path.display(), "Adding quarantined tests to xctestrun");
        rewrite_xctestrun(path, skipped)?;
    }

    let out_dir = tempfile::Builder::new()
        .prefix("test_bundle_zip")
        .tempdir()
        .map_err(|e| QuarantineError::io(std::env::temp_dir(), e))?
        .keep();
    let out_path = out_dir.join(BUNDLE_FILE_NAME);
    pack(unpacked.path(), &entries, &out_path)?;

    info!(path = %out_path.display(), "Quarantined tests added to test bundle");
    Ok(out_path)
}

fn unpack(zip_path: &Path, dest: &Path) -> Result<(), QuarantineError> {
    let file = File::open(zip_path).map_err(|e| QuarantineError::io(zip_path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|source| QuarantineError::Zip {
        action: "open",
        path: zip_path.to_path_buf(),
        source,
    })?;
    archive.extract(dest).map_err(|source| QuarantineError::Zip {
        action: "extract",
        path: zip_path.to_path_buf(),
        source,
    })
}

/// Directories and `.xctestrun` files directly under `dir`, sorted by name
fn top_level_entries(dir: &Path) -> Result<Vec<PathBuf>, QuarantineError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| QuarantineError::io(dir, e))? {
        let path = entry.map_err(|e| QuarantineError::io(dir, e))?.path();
        if path.is_dir() || is_xctestrun(&path) {
            entries.push(path);
        }
    }
    entries.sort();
    Ok(entries)
}

/// Archive name of `path` relative to `root`, always `/`-separated
fn archive_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn pack(root: &Path, entries: &[PathBuf], out_path: &Path) -> Result<(), QuarantineError> {
    let zip_error = |source| QuarantineError::Zip {
        action: "write",
        path: out_path.to_path_buf(),
        source,
    };

    let file = File::create(out_path).map_err(|e| QuarantineError::io(out_path, e))?;
    let mut writer = ZipWriter::new(file);

    for entry in entries {
        for item in WalkDir::new(entry).follow_links(true).sort_by_file_name() {
            let item = item.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| entry.clone());
                QuarantineError::io(path, io::Error::from(e))
            })?;
            let name = archive_name(root, item.path());
            let metadata = item.metadata().map_err(|e| {
                QuarantineError::io(item.path(), io::Error::from(e))
            })?;
            let options = file_options(&metadata);

            if item.file_type().is_dir() {
                writer.add_directory(format!("{}/", name), options).map_err(zip_error)?;
            } else {
                writer.start_file(name, options).map_err(zip_error)?;
                let mut source = File::open(item.path()).map_err(|e| QuarantineError::io(item.path(), e))?;
                io::copy(&mut source, &mut writer).map_err(|e| QuarantineError::io(out_path, e))?;
            }
        }
    }

    writer.finish().map_err(zip_error)?;
    Ok(())
}

fn file_options(metadata: &fs::Metadata) -> SimpleFileOptions {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL));

    #[cfg(unix)]
    let options = {
        use std::os::unix::fs::PermissionsExt;
        options.unix_permissions(metadata.permissions().mode())
    };
    #[cfg(not(unix))]
    let _ = metadata;

    options
}
