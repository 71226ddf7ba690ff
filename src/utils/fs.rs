use std::path::Path;
use tokio::fs;
use tracing::debug;

use crate::error::Error;
use crate::types::Result;

/// Read a UTF-8 file, naming the path in the error
pub async fn read_file_string<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    debug!("Reading file: {}", path.display());

    if !path.exists() {
        return Err(Error::NotFound(format!("File not found: {}", path.display())));
    }

    fs::read_to_string(path).await
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))
}
