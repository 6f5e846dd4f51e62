//! Plain-text counter files: a single integer, rewritten in place.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::warn;

/// Current value, or 0 if the file is missing or does not hold a number.
pub fn read_count(path: &Path) -> u64 {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(e) => {
            warn!(?path, error = %e, "Failed to read counter file");
            return 0;
        }
    };
    match contents.trim().parse() {
        Ok(count) => count,
        Err(_) => {
            warn!(?path, contents = contents.trim(), "Counter file is not a number, treating as 0");
            0
        }
    }
}

pub fn write_count(path: &Path, count: u64) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, count.to_string())
        .with_context(|| format!("Failed to write counter file {}", path.display()))
}

/// Read, add one, write back. Returns the new value.
pub fn increment(path: &Path) -> Result<u64> {
    let count = read_count(path) + 1;
    write_count(path, count)?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file() -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("gyrobind-counter-{}", uuid::Uuid::new_v4()))
            .join("reps.txt")
    }

    #[test]
    fn missing_file_reads_zero_and_increment_creates_it() {
        let path = temp_file();
        assert_eq!(read_count(&path), 0);
        assert_eq!(increment(&path).unwrap(), 1);
        assert_eq!(increment(&path).unwrap(), 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "2");
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn garbage_reads_zero() {
        let path = temp_file();
        write_count(&path, 0).unwrap();
        std::fs::write(&path, "twelve").unwrap();
        assert_eq!(read_count(&path), 0);
        std::fs::write(&path, " 41\n").unwrap();
        assert_eq!(increment(&path).unwrap(), 42);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
