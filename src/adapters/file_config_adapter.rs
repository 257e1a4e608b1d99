//! INI file configuration adapter.

use crate::domain::error::GymError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, GymError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| GymError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[env]
name = BTCUSD
positions = -1, 0, 1

[data]
path = data/BTCUSD.csv
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(adapter.get_string("env", "name"), Some("BTCUSD".to_string()));
        assert_eq!(
            adapter.get_string("env", "positions"),
            Some("-1, 0, 1".to_string())
        );
        assert_eq!(
            adapter.get_string("data", "path"),
            Some("data/BTCUSD.csv".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[env]\nwindows = 5\n").unwrap();
        assert_eq!(adapter.get_string("env", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_bool_accepts_common_spellings() {
        let adapter =
            FileConfigAdapter::from_string("[env]\na = true\nb = yes\nc = 0\n").unwrap();
        assert!(adapter.get_bool("env", "a", false));
        assert!(adapter.get_bool("env", "b", false));
        assert!(!adapter.get_bool("env", "c", true));
    }

    #[test]
    fn get_bool_returns_default_for_missing() {
        let adapter = FileConfigAdapter::from_string("[env]\n").unwrap();
        assert!(adapter.get_bool("env", "verbose", true));
        assert!(!adapter.get_bool("env", "verbose", false));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[run]\nrender_dir = render_logs\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("run", "render_dir"),
            Some("render_logs".to_string())
        );
    }

    #[test]
    fn from_file_returns_parse_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(matches!(result, Err(GymError::ConfigParse { .. })));
    }
}
