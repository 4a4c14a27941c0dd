//! Configuration file loading

use super::schema::ConfigSchema;
use crate::error::{Error, Result, ResultExt};
use std::path::{Path, PathBuf};

/// Candidate file names, searched in the working directory in order
const CANDIDATES: [&str; 3] = ["findixi.toml", ".findixi.toml", ".config/findixi.toml"];

/// Configuration wrapper
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed settings
    pub schema: ConfigSchema,
    /// File the settings were read from, if any
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file path or the standard locations.
    ///
    /// An explicit path must exist; when no path is given and no candidate
    /// file is found the defaults are used. Environment overrides are
    /// applied last in both cases.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) if !p.exists() => return Err(Error::config_not_found(p)),
            Some(p) => Some(p.to_path_buf()),
            None => find_config_file(),
        };

        let mut schema = match &config_path {
            Some(p) => load_config_file(p)?,
            None => ConfigSchema::default(),
        };

        apply_env_overrides(&mut schema, |key| std::env::var(key).ok());
        validate(&schema)?;

        tracing::debug!(path = ?config_path, "Configuration loaded");

        Ok(Self {
            schema,
            path: config_path,
        })
    }
}

/// Find configuration file in standard locations
fn find_config_file() -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.exists())
}

/// Load and parse a TOML configuration file
fn load_config_file(path: &Path) -> Result<ConfigSchema> {
    let content = std::fs::read_to_string(path)
        .map_err(Error::from)
        .context(format!("Failed to read config file {}", path.display()))?;

    toml::from_str(&content)
        .map_err(Error::from)
        .context(format!("Failed to parse config file {}", path.display()))
}

/// Backend credentials can come from the environment instead of the file
fn apply_env_overrides(schema: &mut ConfigSchema, var: impl Fn(&str) -> Option<String>) {
    if let Some(url) = var("FINDIXI_SUPABASE_URL") {
        schema.backend.url = Some(url);
    }
    if let Some(key) = var("FINDIXI_SUPABASE_ANON_KEY") {
        schema.backend.anon_key = Some(key);
    }
    if let Some(token) = var("FINDIXI_ACCESS_TOKEN") {
        schema.backend.access_token = Some(token);
    }
}

fn validate(schema: &ConfigSchema) -> Result<()> {
    let query = &schema.query;
    if !(query.min_radius_miles > 0.0 && query.min_radius_miles <= query.max_radius_miles) {
        return Err(Error::invalid_value(
            "query.min_radius_miles",
            "must be positive and not above max_radius_miles",
        ));
    }
    if query.limit == 0 {
        return Err(Error::invalid_value("query.limit", "must be at least 1"));
    }
    if schema.routing.max_concurrent == 0 {
        return Err(Error::invalid_value("routing.max_concurrent", "must be at least 1"));
    }
    if schema.reload.distance_m <= 0.0 {
        return Err(Error::invalid_value("reload.distance_m", "must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.path.is_none());
        assert_eq!(config.schema.query.limit, 500);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/findixi.toml"))).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigNotFound);
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[reload]\ndistance_m = 250.0\n\n[camera]\nrecenter_min_zoom = 16.0").unwrap();

        let config = Config::load(Some(file.path())).unwrap();

        assert_eq!(config.path.as_deref(), Some(file.path()));
        assert!((config.schema.reload.distance_m - 250.0).abs() < f64::EPSILON);
        assert!((config.schema.camera.recenter_min_zoom - 16.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_malformed_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[query\nlimit = ").unwrap();

        let err = Config::load(Some(file.path())).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigParseError);
        assert!(err.context.is_some());
    }

    #[test]
    fn test_invalid_radius_bounds_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[query]\nmin_radius_miles = 50.0\nmax_radius_miles = 10.0").unwrap();

        let err = Config::load(Some(file.path())).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfigValue);
    }

    #[test]
    fn test_env_overrides() {
        let mut schema = ConfigSchema::default();
        schema.backend.url = Some("https://from-file.example".into());

        apply_env_overrides(&mut schema, |key| match key {
            "FINDIXI_SUPABASE_URL" => Some("https://from-env.example".into()),
            "FINDIXI_ACCESS_TOKEN" => Some("token".into()),
            _ => None,
        });

        assert_eq!(schema.backend.url.as_deref(), Some("https://from-env.example"));
        assert_eq!(schema.backend.access_token.as_deref(), Some("token"));
        assert!(schema.backend.anon_key.is_none());
    }
}
