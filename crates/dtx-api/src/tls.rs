//! Extra trust anchors for the Dynatrace client.
//!
//! Managed Dynatrace installations frequently sit behind a corporate CA.
//! Additional roots are read from the directories listed in `SSL_CERT_DIR`,
//! separated the same way as `PATH` on the current platform.

use std::fs;
use std::path::{Path, PathBuf};

use reqwest::Certificate;
use tracing::{debug, info};

const PEM_CERTIFICATE_MARKER: &[u8] = b"-----BEGIN CERTIFICATE-----";

/// Lists the regular files of every directory in `dirs`, sorted per directory.
///
/// Empty list entries and unreadable directories are skipped.
#[must_use]
pub fn certificate_files(dirs: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for dir in std::env::split_paths(dirs) {
        if dir.as_os_str().is_empty() {
            continue;
        }

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "skipping unreadable certificate directory");
                continue;
            }
        };

        let mut dir_files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        dir_files.sort();
        files.extend(dir_files);
    }

    files
}

/// Loads every PEM certificate found in the given directories.
#[must_use]
pub fn load_certificates(dirs: &str) -> Vec<Certificate> {
    let certificates: Vec<Certificate> = certificate_files(dirs)
        .iter()
        .filter_map(|path| read_certificate(path))
        .collect();

    info!(dirs = %dirs, count = certificates.len(), "loaded additional CA certificates");
    certificates
}

fn read_certificate(path: &Path) -> Option<Certificate> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "failed to read certificate file");
            return None;
        }
    };

    if !contains_pem_certificate(&bytes) {
        debug!(path = %path.display(), "not a PEM certificate, skipping");
        return None;
    }

    match Certificate::from_pem(&bytes) {
        Ok(cert) => Some(cert),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "failed to parse certificate");
            None
        }
    }
}

fn contains_pem_certificate(bytes: &[u8]) -> bool {
    bytes
        .windows(PEM_CERTIFICATE_MARKER.len())
        .any(|window| window == PEM_CERTIFICATE_MARKER)
}
