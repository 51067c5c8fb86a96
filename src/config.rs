use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Proclog";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment override for the derived-age threshold.
pub const AGE_THRESHOLD_ENV: &str = "PROCLOG_AGE_THRESHOLD_YEARS";

/// Default derived-age threshold, in years.
pub const DEFAULT_AGE_THRESHOLD_YEARS: f64 = 5.0;

/// Get the application data directory
/// ~/Proclog/ on all platforms. Falls back to the working directory when
/// no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Get the logbook database path
pub fn database_path() -> PathBuf {
    app_data_dir().join("proclog.db")
}

/// Get the backups directory
pub fn backups_dir() -> PathBuf {
    app_data_dir().join("backups")
}

/// Log filter used when `RUST_LOG` is unset
pub fn default_log_filter() -> &'static str {
    "proclog_lib=info,warn"
}

/// Tunables of the filter engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterConfig {
    /// Boundary of the virtual `age` field: `true` selects patients
    /// younger than this many years.
    pub age_threshold_years: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            age_threshold_years: DEFAULT_AGE_THRESHOLD_YEARS,
        }
    }
}

impl FilterConfig {
    /// Defaults, with the age threshold taken from the environment when it
    /// parses as a positive number.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(AGE_THRESHOLD_ENV) {
            match raw.trim().parse::<f64>() {
                Ok(years) if years.is_finite() && years > 0.0 => {
                    config.age_threshold_years = years;
                }
                _ => tracing::warn!(value = %raw, "Ignoring invalid {AGE_THRESHOLD_ENV}"),
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn database_under_app_data() {
        let db = database_path();
        assert!(db.starts_with(app_data_dir()));
        assert!(db.ends_with("proclog.db"));
    }

    #[test]
    fn backups_dir_under_app_data() {
        let backups = backups_dir();
        assert!(backups.starts_with(app_data_dir()));
        assert!(backups.ends_with("backups"));
    }

    #[test]
    fn app_data_dir_named_after_app() {
        assert!(app_data_dir().ends_with("Proclog"));
    }

    #[test]
    fn default_threshold_is_five_years() {
        assert_eq!(FilterConfig::default().age_threshold_years, 5.0);
    }

    // Environment variables are process-global; tests touching them hold this lock.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn threshold_with(raw: Option<&str>) -> f64 {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        match raw {
            Some(value) => std::env::set_var(AGE_THRESHOLD_ENV, value),
            None => std::env::remove_var(AGE_THRESHOLD_ENV),
        }
        let years = FilterConfig::from_env().age_threshold_years;
        std::env::remove_var(AGE_THRESHOLD_ENV);
        years
    }

    #[test]
    fn threshold_defaults_without_env() {
        assert_eq!(threshold_with(None), DEFAULT_AGE_THRESHOLD_YEARS);
    }

    #[test]
    fn threshold_override_from_env() {
        assert_eq!(threshold_with(Some("6.5")), 6.5);
        assert_eq!(threshold_with(Some(" 18 ")), 18.0);
    }

    #[test]
    fn invalid_threshold_env_is_ignored() {
        for raw in ["five", "", "0", "-2", "inf", "NaN"] {
            assert_eq!(
                threshold_with(Some(raw)),
                DEFAULT_AGE_THRESHOLD_YEARS,
                "{raw:?} should be ignored"
            );
        }
    }

    #[test]
    fn registry_picks_up_env_threshold() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var(AGE_THRESHOLD_ENV, "2");
        let registry = crate::filters::FieldRegistry::from_env();
        std::env::remove_var(AGE_THRESHOLD_ENV);
        assert_eq!(registry.config().age_threshold_years, 2.0);
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
