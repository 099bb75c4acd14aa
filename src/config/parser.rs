//! Generic TOML parsing with file path context.
//!
//! Both read and parse failures name the file, and the underlying I/O or TOML
//! error is kept as the cause:
//!
//! ```text
//! Failed to parse config file: /path/to/swinf.toml
//! Caused by:
//!     invalid type: string "yes", expected a boolean
//! ```

use anyhow::{Context, Result};
use std::path::Path;

/// Parse a TOML configuration file into `T`.
///
/// # Examples
///
/// ```rust,no_run
/// use swinf_template::config::{TemplateConfig, parse_config};
/// use std::path::Path;
///
/// # fn example() -> anyhow::Result<()> {
/// let config: TemplateConfig = parse_config(Path::new("swinf.toml"))?;
/// println!("lookup: {:?}", config.lookup);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid TOML, or does
/// not match the shape of `T`.
pub fn parse_config<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: T = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        use tempfile::tempdir;

        let temp = tempdir().unwrap();
        let config_path = temp.path().join("test.toml");

        #[derive(serde::Deserialize)]
        struct TestConfig {
            lookup: Vec<String>,
            debug: bool,
        }

        let toml_content = r#"
            lookup = ["./views"]
            debug = true
        "#;

        std::fs::write(&config_path, toml_content).unwrap();

        let config: TestConfig = parse_config(&config_path).unwrap();
        assert_eq!(config.lookup, vec!["./views".to_string()]);
        assert!(config.debug);
    }

    #[test]
    fn test_parse_config_error() {
        use tempfile::tempdir;

        let temp = tempdir().unwrap();
        let config_path = temp.path().join("invalid.toml");

        #[derive(Debug, serde::Deserialize)]
        struct TestConfig {
            #[allow(dead_code)] // Field used by serde for deserialization validation, not accessed directly
            debug: bool,
        }

        std::fs::write(&config_path, "debug = yes {").unwrap();

        let result: Result<TestConfig> = parse_config(&config_path);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("invalid.toml"));
    }
}
