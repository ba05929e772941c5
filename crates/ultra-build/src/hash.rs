//! Content fingerprints for cache-busting renames.
//!
//! A hashed file keeps its logical path; only its final path changes from
//! `./src/app.css` to `./src/app.<fingerprint>.css`.

use sha2::{Digest, Sha256};

use crate::Result;
use crate::file::VirtualFile;

/// Hex characters kept from the SHA-256 digest.
pub const FINGERPRINT_LEN: usize = 16;

/// Hex-encoded SHA-256 of `data`, truncated to [`FINGERPRINT_LEN`].
pub fn fingerprint(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(FINGERPRINT_LEN);
    hex
}

/// Insert `fingerprint` between the stem and the extension of `path`.
///
/// `./src/app.css` → `./src/app.<fp>.css`, `./LICENSE` → `./LICENSE.<fp>`.
/// Only the last extension is preserved: `./a.min.js` → `./a.min.<fp>.js`.
pub fn hashed_name(path: &str, fingerprint: &str) -> String {
    let (dir, name) = match path.rfind('/') {
        Some(idx) => path.split_at(idx + 1),
        None => ("", path),
    };

    // A leading dot marks a hidden file, not an extension
    match name.rfind('.') {
        Some(idx) if idx > 0 => {
            let (stem, ext) = name.split_at(idx);
            format!("{}{}.{}{}", dir, stem, fingerprint, ext)
        }
        _ => format!("{}{}.{}", dir, name, fingerprint),
    }
}

/// Fingerprint `file` and move its final path to the hashed name.
///
/// A file that already carries a fingerprint is left alone, so overlapping
/// patterns never hash twice. Returns the fingerprint.
pub async fn apply(file: &mut VirtualFile) -> Result<String> {
    if let Some(existing) = file.fingerprint() {
        return Ok(existing.to_string());
    }

    let contents = file.load().await?;
    let fp = fingerprint(&contents);
    let renamed = hashed_name(file.final_path(), &fp);

    tracing::debug!(path = %file.path(), final_path = %renamed, "hashed");
    file.set_final_path(renamed);
    file.set_fingerprint(fp.clone());
    Ok(fp)
}
