// Settings storage - JSON file under the app data directory
use crate::error::{ForecastError, Result};
use crate::file_manager::{initialize_json_file, read_json_file, write_json_file};
use crate::models::{Settings, MAX_MONTHS_AHEAD};
use log::debug;
use std::path::Path;

/// Partial update applied on top of the stored settings
#[derive(Debug, Default, Clone)]
pub struct SettingsOverrides {
    pub server_url: Option<String>,
    pub months_ahead: Option<u32>,
    pub max_data_points: Option<u32>,
    pub force_training: Option<bool>,
    pub job_timeout_secs: Option<u64>,
}

/// Load settings, creating the file with defaults on first run
pub fn load_settings(path: &Path) -> Result<Settings> {
    initialize_json_file(path, &Settings::default())?;
    let settings: Settings = read_json_file(path)?;
    validate(&settings)?;
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    validate(settings)?;
    write_json_file(path, settings)
}

/// Apply overrides in memory without persisting them
pub fn apply_overrides(mut settings: Settings, overrides: &SettingsOverrides) -> Result<Settings> {
    if let Some(server_url) = &overrides.server_url {
        settings.server_url = server_url.clone();
    }
    if let Some(months_ahead) = overrides.months_ahead {
        settings.months_ahead = months_ahead;
    }
    if let Some(max_data_points) = overrides.max_data_points {
        settings.max_data_points = max_data_points;
    }
    if let Some(force_training) = overrides.force_training {
        settings.force_training = force_training;
    }
    if let Some(job_timeout_secs) = overrides.job_timeout_secs {
        settings.job_timeout_secs = Some(job_timeout_secs);
    }

    validate(&settings)?;
    debug!("Effective settings: {:?}", settings);
    Ok(settings)
}

fn validate(settings: &Settings) -> Result<()> {
    if settings.server_url.trim().is_empty() {
        return Err(ForecastError::Settings("server_url must not be empty".to_string()));
    }
    if !(1..=MAX_MONTHS_AHEAD).contains(&settings.months_ahead) {
        return Err(ForecastError::Settings(format!(
            "months_ahead must be between 1 and {}",
            MAX_MONTHS_AHEAD
        )));
    }
    if settings.max_data_points == 0 {
        return Err(ForecastError::Settings("max_data_points must be at least 1".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_load_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("settings.json");

        let settings = load_settings(&path).unwrap();
        assert!(path.exists());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            server_url: "http://forecast.internal:8080".to_string(),
            months_ahead: 12,
            job_timeout_secs: Some(600),
            ..Settings::default()
        };

        save_settings(&path, &settings).unwrap();
        assert_eq!(load_settings(&path).unwrap(), settings);
    }

    #[test]
    fn test_overrides_are_validated() {
        let overrides = SettingsOverrides {
            months_ahead: Some(13),
            ..SettingsOverrides::default()
        };
        assert!(matches!(
            apply_overrides(Settings::default(), &overrides),
            Err(ForecastError::Settings(_))
        ));

        let overrides = SettingsOverrides {
            months_ahead: Some(3),
            force_training: Some(true),
            ..SettingsOverrides::default()
        };
        let settings = apply_overrides(Settings::default(), &overrides).unwrap();
        assert_eq!(settings.months_ahead, 3);
        assert!(settings.force_training);
    }
}
