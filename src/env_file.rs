//! Targeted `.env` file updates.
//!
//! When the backend provisions an API key on first run, the key is written
//! back to the `.env` file so subsequent runs pick it up. The write policy is
//! deliberately narrow: only the matching `KEY=` line changes, every other
//! line is preserved as-is, and a missing file means persistence is skipped
//! so the caller can print the key for manual copy.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Sets `key` to `value` in the `.env`-style file at `path`.
///
/// Returns `Ok(true)` when the file was updated (replacing the existing line
/// or appending a new one) and `Ok(false)` when the file does not exist.
pub fn update_key(path: &Path, key: &str, value: &str) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }

    let contents = fs::read_to_string(path)
        .map_err(|err| Error::io(format!("failed to read {}", path.display()), err))?;

    let prefix = format!("{key}=");
    let mut replaced = false;
    let mut lines: Vec<String> = Vec::new();
    for line in contents.lines() {
        if line.starts_with(&prefix) && !replaced {
            lines.push(format!("{key}={value}"));
            replaced = true;
        } else {
            lines.push(line.to_string());
        }
    }
    if !replaced {
        lines.push(format!("{key}={value}"));
    }

    let mut updated = lines.join("\n");
    updated.push('\n');
    fs::write(path, updated)
        .map_err(|err| Error::io(format!("failed to write {}", path.display()), err))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("ragline-env-test-{}-{name}", std::process::id()));
        path
    }

    #[test]
    fn replaces_only_the_matching_line() {
        let path = temp_path("replace");
        fs::write(
            &path,
            "# comment\nRAGLINE_BASE_URL=http://localhost:3000\nRAGLINE_API_KEY=old\nOTHER=1\n",
        )
        .unwrap();

        let updated = update_key(&path, "RAGLINE_API_KEY", "new-key").unwrap();
        assert!(updated);

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("# comment\n"));
        assert!(contents.contains("RAGLINE_BASE_URL=http://localhost:3000\n"));
        assert!(contents.contains("RAGLINE_API_KEY=new-key\n"));
        assert!(contents.contains("OTHER=1\n"));
        assert!(!contents.contains("old"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn appends_when_key_absent() {
        let path = temp_path("append");
        fs::write(&path, "OTHER=1\n").unwrap();

        assert!(update_key(&path, "RAGLINE_API_KEY", "fresh").unwrap());
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "OTHER=1\nRAGLINE_API_KEY=fresh\n");

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_skips_persistence() {
        let path = temp_path("missing");
        assert!(!update_key(&path, "RAGLINE_API_KEY", "unsaved").unwrap());
        assert!(!path.exists());
    }
}
