use serde::Deserialize;
use std::fs;

const SETTINGS_FILENAME: &str = "settings.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_address: String,
    pub port: u16,
    pub database_path: String,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    /// Fire desktop alerts from the in-process local scheduler.
    pub local_alerts: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            database_path: "weekplan.redb".to_string(),
            // Override in settings.json for any non-local deployment.
            jwt_secret: "change-me-before-deploying".to_string(),
            jwt_expiry_hours: 24 * 30,
            local_alerts: true,
        }
    }
}

impl Settings {
    /// Read settings.json from the working directory, falling back to
    /// defaults when the file is missing. A file that exists but does not
    /// parse is an error — a half-applied config is worse than none.
    pub fn load() -> Result<Settings, serde_json::Error> {
        match fs::read_to_string(SETTINGS_FILENAME) {
            Ok(content) => serde_json::from_str(&content),
            Err(_) => Ok(Settings::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let s: Settings = serde_json::from_str(r#"{"port": 8080}"#).unwrap();
        assert_eq!(s.port, 8080);
        assert_eq!(s.bind_address, "0.0.0.0");
        assert_eq!(s.database_path, "weekplan.redb");
        assert!(s.local_alerts);
    }
}
