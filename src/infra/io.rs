use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Read a UTF-8 text file, failing unless `path` is a regular file.
pub fn read_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read metadata for {}", path.display()))?;

    if !metadata.is_file() {
        anyhow::bail!("Path does not point to a valid file: {}", path.display());
    }

    std::fs::read_to_string(path).with_context(|| format!("Failed to read file {}", path.display()))
}

/// Replace the contents of `path` with `content` in one step.
///
/// The text is written to a temp file next to the target and renamed over
/// it, so readers see either the old or the new file, never a prefix.
/// A symlinked `path` keeps its link; the file it points at is replaced.
pub fn write_atomic<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let target = dunce::canonicalize(path.as_ref()).unwrap_or_else(|_| path.as_ref().to_path_buf());
    let path = target.as_path();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write temp file for {}", path.display()))?;
    tmp.flush()?;

    // Keep the target's permissions; the temp file is created 0600.
    if let Ok(meta) = std::fs::metadata(path) {
        std::fs::set_permissions(tmp.path(), meta.permissions()).ok();
    }

    tmp.persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

/// Write `content` to an existing, writable file.
pub fn overwrite_existing<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path = path.as_ref();
    let meta = std::fs::metadata(path)
        .with_context(|| format!("File does not exist or is not writable: {}", path.display()))?;
    if !meta.is_file() || meta.permissions().readonly() {
        anyhow::bail!("File does not exist or is not writable: {}", path.display());
    }
    write_atomic(path, content)
}
