use crate::error::PipelineError;
use log::info;
use std::io;
use std::path::{Path, PathBuf};

const STORE_DIR_NAME: &str = "weather_pipeline";

pub fn default_store_dir() -> Result<PathBuf, PipelineError> {
    dirs::data_dir()
        .ok_or(PipelineError::StoreDirResolution)
        .map(|p| p.join(STORE_DIR_NAME))
}

pub async fn ensure_dir_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("Path exists but is not a directory: {}", path.display()),
                ));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating store directory: {}", path.display());
            tokio::fs::create_dir_all(path).await
        }
        Err(e) => Err(e),
    }
}
