//! Identity archive fetch and extraction.
//!
//! The identity ships as a password-protected zip at a fixed HTTPS URL.
//! Fetching distinguishes "not published yet" (HTTP 404 — the caller treats
//! it as transient) from real network errors. Extraction flattens the
//! archive: every regular file lands directly in the cache directory under
//! its base name, directory entries are skipped, and nothing is ever written
//! outside the cache directory.

use std::fs::File;
use std::path::Path;

use tracing::{debug, info};

use super::CertificateError;

/// Outcome of a fetch attempt that did not hard-fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Archive downloaded and written to the destination path.
    Downloaded,
    /// The source answered 404: no archive published yet.
    NotPublished,
}

/// Downloads the archive to `dest`.
///
/// # Errors
///
/// [`CertificateError::Fetch`] on network failures or non-404 error
/// statuses; [`CertificateError::Io`] if the file cannot be written.
pub async fn fetch_archive(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<FetchOutcome, CertificateError> {
    info!(%url, "downloading certificate archive");

    let response = client.get(url).send().await?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(FetchOutcome::NotPublished);
    }
    let response = response.error_for_status()?;
    let bytes = response.bytes().await?;

    std::fs::write(dest, &bytes)?;
    debug!(bytes = bytes.len(), dest = %dest.display(), "archive saved");
    Ok(FetchOutcome::Downloaded)
}

/// Extracts every regular file in the archive directly into `dest_dir`,
/// flattening any directory structure. Returns the number of files written.
///
/// # Errors
///
/// [`CertificateError::Archive`] when the zip is unreadable or the password
/// does not match; [`CertificateError::Io`] on write failures.
pub fn extract_flattened(
    zip_path: &Path,
    dest_dir: &Path,
    password: &str,
) -> Result<usize, CertificateError> {
    let file = File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|err| CertificateError::Archive(err.to_string()))?;

    let mut extracted = 0;
    for index in 0..archive.len() {
        // Probe with the password first; unencrypted entries are read plain.
        let needs_plain_read = archive
            .by_index_decrypt(index, password.as_bytes())
            .is_err();
        let entry = if needs_plain_read {
            archive.by_index(index)
        } else {
            archive.by_index_decrypt(index, password.as_bytes())
        };
        let mut entry = entry.map_err(|err| CertificateError::Archive(err.to_string()))?;
        if !entry.is_file() {
            continue;
        }

        // Flatten: keep only the base name, drop the directory structure.
        let Some(file_name) = Path::new(entry.name())
            .file_name()
            .map(|name| name.to_owned())
        else {
            continue;
        };

        let dest_path = dest_dir.join(&file_name);
        let mut output = File::create(&dest_path)?;
        std::io::copy(&mut entry, &mut output)?;
        debug!(file = %file_name.to_string_lossy(), "extracted");
        extracted += 1;
    }

    info!(extracted, "certificate archive extracted");
    Ok(extracted)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
