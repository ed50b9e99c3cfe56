// SPDX-License-Identifier: GPL-3.0-only
use anyhow::Result;
use std::path::{Component, Path, PathBuf};

const MAX_KEY_LENGTH: usize = 200;

/// Turn a blob key (e.g. `photo_u1`) into a safe file name.
///
/// Keeps alphanumerics, dash, underscore and dot; everything else is
/// replaced with `_`. Keys that end up empty or hidden are rejected.
pub fn sanitize_blob_key(key: &str) -> Result<String> {
    let sanitized: String = key
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        return Err(anyhow::anyhow!("Blob key cannot be empty"));
    }

    if sanitized.len() > MAX_KEY_LENGTH {
        return Err(anyhow::anyhow!(
            "Blob key too long (max {} characters)",
            MAX_KEY_LENGTH
        ));
    }

    if sanitized.starts_with('.') {
        return Err(anyhow::anyhow!("Blob key cannot start with '.'"));
    }

    Ok(sanitized)
}

/// Resolve the file backing `key` inside `base`.
pub fn blob_path(base: &Path, key: &str) -> Result<PathBuf> {
    let file_name = sanitize_blob_key(key)?;
    let path = base.join(file_name);

    // Sanitizing already strips separators; this catches anything that slipped through.
    let escapes = path
        .strip_prefix(base)
        .map(|rest| rest.components().any(|c| !matches!(c, Component::Normal(_))))
        .unwrap_or(true);
    if escapes {
        return Err(anyhow::anyhow!(
            "Blob path {} is outside {}",
            path.display(),
            base.display()
        ));
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_plain_key() {
        assert_eq!(sanitize_blob_key("photo_u1").unwrap(), "photo_u1");
    }

    #[test]
    fn test_sanitize_replaces_separators() {
        assert_eq!(sanitize_blob_key("photo/../u1").unwrap(), "photo_.._u1");
        assert_eq!(sanitize_blob_key("a b:c").unwrap(), "a_b_c");
    }

    #[test]
    fn test_sanitize_rejects_empty_and_hidden() {
        assert!(sanitize_blob_key("").is_err());
        assert!(sanitize_blob_key("   ").is_err());
        assert!(sanitize_blob_key(".profile").is_err());
        assert!(sanitize_blob_key("..").is_err());
    }

    #[test]
    fn test_sanitize_rejects_too_long() {
        assert!(sanitize_blob_key(&"a".repeat(MAX_KEY_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_blob_path_stays_in_base() {
        let base = Path::new("/var/lib/recipe-sync/blobs");
        let path = blob_path(base, "x/../../etc/passwd").unwrap();
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("x_.._.._etc_passwd"));
        assert_eq!(path.parent(), Some(base));
    }
}
