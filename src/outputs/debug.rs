//! Debug dumps of intermediate payloads.
//!
//! Write-only: nothing reads these files back.

use serde::Serialize;
use tokio::fs;
use tracing::{debug, warn};

/// Write `value` as pretty JSON to `<dir>/<name>`. Errors are logged only.
pub async fn write_debug_json<T: Serialize + ?Sized>(dir: &str, name: &str, value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => write_debug_file(dir, name, &json).await,
        Err(e) => warn!(%name, error = %e, "Failed to serialize debug payload"),
    }
}

/// Write raw text to `<dir>/<name>`. Errors are logged only.
pub async fn write_debug_file(dir: &str, name: &str, contents: &str) {
    if let Err(e) = fs::create_dir_all(dir).await {
        warn!(%dir, error = %e, "Failed to create debug dir");
        return;
    }
    let path = format!("{}/{}", dir.trim_end_matches('/'), name);
    match fs::write(&path, contents).await {
        Ok(()) => debug!(%path, bytes = contents.len(), "Wrote debug file"),
        Err(e) => warn!(%path, error = %e, "Failed to write debug file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_debug_json() {
        let dir = std::env::temp_dir().join(format!("feed_handlers_dbg_{}", std::process::id()));
        let dir = dir.to_string_lossy().into_owned();
        write_debug_json(&dir, "debug.json", &serde_json::json!({"a": 1})).await;
        let raw = std::fs::read_to_string(format!("{dir}/debug.json")).unwrap();
        assert!(raw.contains("\"a\": 1"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
