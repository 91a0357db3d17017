//! Filesystem and text helpers shared by the mutation engine.

use std::fs;
use std::io::Write;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

use crate::errors::PublishError;

static SLUG_SEP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());
static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static EXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]").unwrap());

/// Zero-padded 6-digit product id, the `products/` filename stem.
pub fn pad6(n: i64) -> String {
    format!("{:06}", n)
}

/// Timestamp used in report filenames, e.g. `20260110_154512`.
pub fn now_stamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Derive an ASCII slug from a display name.
///
/// Lowercases, NFKD-decomposes and drops non-ASCII marks, collapses every
/// run of non `[a-z0-9]` to a single hyphen, and trims hyphens. Returns an
/// empty string when nothing survives; the caller picks a fallback.
pub fn slugify_ascii(value: &str) -> String {
    let raw = value.trim().to_lowercase();
    if raw.is_empty() {
        return String::new();
    }

    let ascii_only: String = raw.nfkd().filter(|c| c.is_ascii()).collect();
    let ascii_only = ascii_only.to_lowercase();

    SLUG_SEP_RE
        .replace_all(&ascii_only, "-")
        .trim_matches('-')
        .to_string()
}

/// Remove HTML tags and collapse whitespace, for search haystacks.
pub fn strip_html(value: &str) -> String {
    let text = HTML_TAG_RE.replace_all(value, " ");
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// Extension for an uploaded file: lowercased, alphanumeric-only,
/// `bin` when the filename has none.
pub fn file_ext_from_upload(filename: &str) -> String {
    let name = filename.trim();
    let ext = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() || !ext.is_empty() => ext,
        _ => return "bin".to_string(),
    };
    let ext = EXT_RE.replace_all(&ext.to_lowercase(), "").to_string();
    if ext.is_empty() {
        "bin".to_string()
    } else {
        ext
    }
}

pub fn ensure_dir(path: &Path) -> Result<(), PublishError> {
    fs::create_dir_all(path)?;
    Ok(())
}

/// Write a JSON document atomically: serialize into a temp file in the same
/// directory as the target, then rename over it. A same-volume rename is
/// all-or-nothing, so no reader ever observes a partial document.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PublishError> {
    let parent = path
        .parent()
        .ok_or_else(|| PublishError::Internal(format!("no parent directory for {}", path.display())))?;
    ensure_dir(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.persist(path)
        .map_err(|e| PublishError::Internal(format!("atomic rename failed: {}", e.error)))?;
    Ok(())
}

/// Read and parse a JSON document.
pub fn read_json(path: &Path) -> Result<serde_json::Value, PublishError> {
    let bytes = fs::read(path)
        .map_err(|e| PublishError::CatalogInvalid(format!("cannot read {}: {}", path.display(), e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| PublishError::CatalogInvalid(format!("cannot parse {}: {}", path.display(), e)))
}
