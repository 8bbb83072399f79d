use crate::batch::MAX_BATCH_SIZE;
use crate::error::PipelineError;
use crate::fetch::noaa_client::{
    DATASET_ID, DEFAULT_PAGE_LIMIT, LOCATION_ID, STATIONS_ENDPOINT, WEATHER_ENDPOINT,
};
use crate::fetch::paginate::DEFAULT_THROTTLE;
use crate::utils::{default_store_dir, ensure_dir_exists};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the API token.
pub const TOKEN_ENV: &str = "NOAA_TOKEN";
/// Environment variable overriding the store directory.
pub const STORE_DIR_ENV: &str = "WEATHER_PIPELINE_STORE_DIR";

/// Resolves the store directory: `explicit`, then [`STORE_DIR_ENV`], then the
/// platform data directory.
pub fn store_dir_from_env(explicit: Option<PathBuf>) -> Result<PathBuf, PipelineError> {
    match explicit.or_else(|| std::env::var_os(STORE_DIR_ENV).map(PathBuf::from)) {
        Some(dir) => Ok(dir),
        None => default_store_dir(),
    }
}

/// Settings shared by the pipeline components.
///
/// Only the token is required; everything else defaults to the values used
/// against the public NOAA API.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use weather_pipeline::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .token("my-token")
///     .throttle(Duration::from_millis(250))
///     .build();
/// assert_eq!(config.page_limit, 500);
/// assert_eq!(config.location_id, "FIPS:24");
/// ```
#[derive(Debug, Clone, bon::Builder)]
pub struct PipelineConfig {
    #[builder(into)]
    pub token: String,
    #[builder(into, default = WEATHER_ENDPOINT.to_string())]
    pub weather_endpoint: String,
    #[builder(into, default = STATIONS_ENDPOINT.to_string())]
    pub stations_endpoint: String,
    #[builder(into, default = DATASET_ID.to_string())]
    pub dataset_id: String,
    #[builder(into, default = LOCATION_ID.to_string())]
    pub location_id: String,
    /// Results requested per page.
    #[builder(default = DEFAULT_PAGE_LIMIT)]
    pub page_limit: u64,
    /// Pause between two page requests.
    #[builder(default = DEFAULT_THROTTLE)]
    pub throttle: Duration,
    #[builder(default = Duration::from_secs(30))]
    pub request_timeout: Duration,
    #[builder(default = Duration::from_secs(30))]
    pub write_timeout: Duration,
    /// Maximum records per stream delivery, capped at [`MAX_BATCH_SIZE`].
    #[builder(default = MAX_BATCH_SIZE)]
    pub batch_size: usize,
    /// Undelivered batches buffered between producer and consumer.
    #[builder(default = 16)]
    pub channel_capacity: usize,
    /// Directory of the file store. Resolved by [`PipelineConfig::resolve_store_dir`]
    /// when unset.
    #[builder(into)]
    pub store_dir: Option<PathBuf>,
}

impl PipelineConfig {
    /// Builds a configuration from explicit values, falling back to
    /// [`TOKEN_ENV`] and [`STORE_DIR_ENV`].
    pub fn from_env(
        token: Option<String>,
        store_dir: Option<PathBuf>,
    ) -> Result<Self, PipelineError> {
        let token = token
            .or_else(|| std::env::var(TOKEN_ENV).ok())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                PipelineError::MissingConfig(format!(
                    "API token (pass --token or set {TOKEN_ENV})"
                ))
            })?;
        let store_dir = store_dir.or_else(|| std::env::var_os(STORE_DIR_ENV).map(PathBuf::from));

        Ok(Self::builder()
            .token(token)
            .maybe_store_dir(store_dir)
            .build())
    }

    /// The configured store directory, or the platform default.
    pub fn resolve_store_dir(&self) -> Result<PathBuf, PipelineError> {
        match &self.store_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_store_dir(),
        }
    }

    /// Resolves the store directory and creates it if needed.
    pub async fn prepare_store_dir(&self) -> Result<PathBuf, PipelineError> {
        let dir = self.resolve_store_dir()?;
        ensure_dir_exists(&dir)
            .await
            .map_err(|e| PipelineError::StoreDirCreation(dir.clone(), e))?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = PipelineConfig::builder().token("t").build();
        assert_eq!(config.token, "t");
        assert_eq!(config.weather_endpoint, WEATHER_ENDPOINT);
        assert_eq!(config.dataset_id, "GHCND");
        assert_eq!(config.throttle, Duration::from_secs(1));
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.store_dir, None);
    }

    #[test]
    fn test_explicit_values_win() -> Result<(), PipelineError> {
        let config = PipelineConfig::from_env(
            Some("explicit".to_string()),
            Some(PathBuf::from("/tmp/weather")),
        )?;
        assert_eq!(config.token, "explicit");
        assert_eq!(config.resolve_store_dir()?, PathBuf::from("/tmp/weather"));
        Ok(())
    }

    #[test]
    fn test_blank_token_is_missing() {
        let result = PipelineConfig::from_env(Some("  ".to_string()), None);
        assert!(matches!(result, Err(PipelineError::MissingConfig(_))));
    }

    #[tokio::test]
    async fn test_prepare_store_dir_creates_it() -> Result<(), PipelineError> {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("nested").join("store");
        let config = PipelineConfig::builder()
            .token("t")
            .store_dir(dir.clone())
            .build();

        assert_eq!(config.prepare_store_dir().await?, dir);
        assert!(dir.is_dir());
        Ok(())
    }
}
