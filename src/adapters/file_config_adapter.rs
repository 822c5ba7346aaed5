//! INI file configuration adapter.

use crate::domain::error::EvotraderError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EvotraderError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| EvotraderError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, EvotraderError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| EvotraderError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
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

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
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
[data]
path = /var/data/binance
symbol = BTCUSDT

[simulation]
starting_balance = 100.0
fee_rate = 0.02

[ga]
population_size = 100
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("data", "path"),
            Some("/var/data/binance".to_string())
        );
        assert_eq!(
            adapter.get_string("data", "symbol"),
            Some("BTCUSDT".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[simulation]\nfee_rate = 0.01\n").unwrap();
        assert_eq!(adapter.get_string("simulation", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_value() {
        let adapter = FileConfigAdapter::from_string("[ga]\ngenerations = 50\n").unwrap();
        assert_eq!(adapter.get_int("ga", "generations", 0), 50);
    }

    #[test]
    fn get_int_returns_default_for_missing() {
        let adapter = FileConfigAdapter::from_string("[ga]\n").unwrap();
        assert_eq!(adapter.get_int("ga", "missing", 42), 42);
    }

    #[test]
    fn get_int_returns_default_for_non_numeric() {
        let adapter = FileConfigAdapter::from_string("[ga]\ngenerations = abc\n").unwrap();
        assert_eq!(adapter.get_int("ga", "generations", 42), 42);
    }

    #[test]
    fn get_double_returns_value() {
        let adapter = FileConfigAdapter::from_string("[simulation]\nfee_rate = 0.015\n").unwrap();
        assert_eq!(adapter.get_double("simulation", "fee_rate", 0.0), 0.015);
    }

    #[test]
    fn get_double_returns_default_for_missing() {
        let adapter = FileConfigAdapter::from_string("[simulation]\n").unwrap();
        assert_eq!(adapter.get_double("simulation", "missing", 99.9), 99.9);
    }

    #[test]
    fn get_double_returns_default_for_non_numeric() {
        let adapter =
            FileConfigAdapter::from_string("[simulation]\nfee_rate = not_a_number\n").unwrap();
        assert_eq!(adapter.get_double("simulation", "fee_rate", 99.9), 99.9);
    }

    #[test]
    fn get_bool_returns_true_values() {
        let adapter = FileConfigAdapter::from_string("[gp]\na = true\nb = yes\nc = 1\n").unwrap();
        assert!(adapter.get_bool("gp", "a", false));
        assert!(adapter.get_bool("gp", "b", false));
        assert!(adapter.get_bool("gp", "c", false));
    }

    #[test]
    fn get_bool_returns_false_values() {
        let adapter = FileConfigAdapter::from_string("[gp]\na = false\nb = no\nc = 0\n").unwrap();
        assert!(!adapter.get_bool("gp", "a", true));
        assert!(!adapter.get_bool("gp", "b", true));
        assert!(!adapter.get_bool("gp", "c", true));
    }

    #[test]
    fn get_bool_returns_default_for_missing() {
        let adapter = FileConfigAdapter::from_string("[gp]\n").unwrap();
        assert!(adapter.get_bool("gp", "missing", true));
        assert!(!adapter.get_bool("gp", "missing", false));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[gp]\nfitness_mode = pareto\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("gp", "fitness_mode"),
            Some("pareto".to_string())
        );
    }

    #[test]
    fn from_file_returns_parse_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        match result {
            Err(EvotraderError::ConfigParse { file, .. }) => {
                assert_eq!(file, "/nonexistent/path/config.ini");
            }
            other => panic!("expected ConfigParse, got {:?}", other.err()),
        }
    }
}
