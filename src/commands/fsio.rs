use crate::error::{EngineError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Replace `path` with `bytes` without ever exposing a half-written file:
/// write a process-unique sibling, then rename over the target.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
    }

    let tmp = temp_sibling(path);
    if let Err(e) = fs::write(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(EngineError::io(&tmp, e));
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(EngineError::io(path, e));
    }
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "selfdev".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}
