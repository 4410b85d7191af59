use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize result")
}

/// Save a result as pretty JSON. The file is replaced atomically, so a
/// crash never leaves a half-written report behind.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;
    serde_json::to_writer_pretty(&mut file, value).context("Failed to serialize result")?;
    file.write_all(b"\n").context("Failed to write result")?;
    file.commit()
        .with_context(|| format!("Failed to save result to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranking.json");
        let value = json!({"total_projects": 0, "results": []});

        write_json(&path, &value).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let back: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_write_json_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.json");
        assert!(write_json(&path, &json!({})).is_err());
    }
}
