//! Configuration file loading for judgebox
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};

use crate::config::{Config, ConfigError, ENV_PREFIX, EXAMPLE_CONFIG};

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load the embedded defaults, an optional file on top, then
    /// `JUDGEBOX_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder()
            .add_source(File::from_str(EXAMPLE_CONFIG, FileFormat::Toml));
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.sandbox_image.trim().is_empty() {
            return Err(ConfigError::Invalid("sandbox_image is empty".to_string()));
        }
        if !self.mount_point.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "mount_point '{}' must be an absolute path",
                self.mount_point
            )));
        }
        if self.container_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "container_prefix is empty".to_string(),
            ));
        }
        if self.max_parallel_cases == 0 {
            return Err(ConfigError::Invalid(
                "max_parallel_cases must be at least 1".to_string(),
            ));
        }

        let sections = [
            ("compile", self.compile.as_ref()),
            ("compile_make", self.compile_make.as_ref()),
            ("run", Some(&self.run)),
        ];
        for (name, limits) in sections {
            let Some(limits) = limits else { continue };
            if limits.timeout_ms == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "{name}.timeout_ms must be positive"
                )));
            }
            if limits.time_limit_ms == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "{name}.time_limit_ms must be positive"
                )));
            }
            if limits.memory_limit_kb == Some(0) || limits.container_memory_mb == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} memory limits must be positive"
                )));
            }
            if limits.pids_limit == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "{name}.pids_limit must be positive"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config = Config::parse_toml("").unwrap();
        assert_eq!(config.sandbox_image, "noj4-sandbox:0.1");
        assert_eq!(config.mount_point, "/work");
        assert!(config.compile.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
docker_path = "/usr/local/bin/docker"
sandbox_image = "judge-sandbox:2"
job_root = "/var/lib/judgebox"
max_parallel_cases = 4

[compile]
timeout_ms = 20000

[run]
time_limit_ms = 1000
memory_limit_kb = 131072

[archive]
max_uncompressed_bytes = 1024
"#;

        let config = Config::parse_toml(toml).unwrap();
        assert_eq!(
            config.docker_path,
            Some(std::path::PathBuf::from("/usr/local/bin/docker"))
        );
        assert_eq!(config.sandbox_image, "judge-sandbox:2");
        assert_eq!(
            config.job_root,
            std::path::PathBuf::from("/var/lib/judgebox")
        );
        assert_eq!(config.max_parallel_cases, 4);
        assert_eq!(config.compile_limits(false).timeout_ms, Some(20000));
        assert_eq!(config.run.time_limit_ms, Some(1000));
        assert_eq!(config.archive.max_uncompressed_bytes, 1024);
        assert!(!config.archive.allow_symlinks);
    }

    #[test]
    fn test_partial_limits_dont_override_unspecified_fields() {
        let toml = r#"
[run]
timeout_ms = 15000
"#;

        let config = Config::parse_toml(toml).unwrap();

        // Only timeout_ms was specified; other fields should be None
        // so they don't override the built-in run defaults via with_overrides
        assert_eq!(config.run.timeout_ms, Some(15000));
        assert_eq!(config.run.time_limit_ms, None);

        let limits = config.run_limits(None);
        assert_eq!(limits.timeout_ms, Some(15000));
        assert_eq!(limits.time_limit_ms, Some(5000));
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = Config::parse_toml(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config.run_limits(None).timeout_ms, Some(10000));
        assert_eq!(config.compile_limits(true).timeout_ms, Some(60000));
        assert_eq!(config.archive.max_uncompressed_bytes, 100 * 1024 * 1024);
    }

    #[test]
    fn test_load_without_file_uses_example_values() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.container_prefix, "judgebox-test");
        assert_eq!(config.run_overhead_ms, 2000);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("judgebox.toml");
        std::fs::write(&path, "sandbox_image = \"custom:1\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.sandbox_image, "custom:1");
    }

    #[test]
    fn test_invalid_empty_image() {
        let result = Config::parse_toml("sandbox_image = \"\"");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_invalid_relative_mount_point() {
        let result = Config::parse_toml("mount_point = \"work\"");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_invalid_zero_parallelism() {
        let result = Config::parse_toml("max_parallel_cases = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_invalid_zero_timeout() {
        let toml = r#"
[compile_make]
timeout_ms = 0
"#;
        let result = Config::parse_toml(toml);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
