//! Fleet settings file.
//!
//! A TOML file whose keys mirror [`FleetSettings`]. Every key is optional;
//! omitted keys keep their defaults.
//!
//! # Example
//!
//! ```toml
//! description = "Web fleet"
//! region = "eu-west-1"
//! instance_type = "m3.medium"
//! ami_id = "ami-0abc1234"
//! security_group_ids = ["sg-0123"]
//! subnet_ids = ["subnet-0a", "subnet-0b"]
//! availability_zones = []          # use every zone of the stack's region
//!
//! [capacity]
//! min = 2
//! max = 6
//! desired = 2
//!
//! [[tags]]
//! key = "Team"
//! value = "web"
//! ```

use std::path::{Path, PathBuf};

use fleetform_core::FleetSettings;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Settings from `path`, or the built-in defaults when no file is given.
pub fn load_settings(path: Option<&Path>) -> Result<FleetSettings, ConfigError> {
    let Some(path) = path else {
        tracing::debug!("no settings file given, using defaults");
        return Ok(FleetSettings::default());
    };

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let settings = parse_settings(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "loaded settings");
    Ok(settings)
}

fn parse_settings(content: &str) -> Result<FleetSettings, toml::de::Error> {
    toml::from_str(content)
}

/// The effective settings rendered back to TOML, as a starting point for a
/// settings file.
pub fn render_settings(settings: &FleetSettings) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_means_defaults() {
        assert_eq!(parse_settings("").unwrap(), FleetSettings::default());
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let settings = parse_settings(
            r#"
            instance_type = "m3.large"

            [capacity]
            max = 4
            "#,
        )
        .unwrap();
        assert_eq!(settings.instance_type, "m3.large");
        assert_eq!(settings.capacity.max, 4);
        assert_eq!(settings.capacity.min, 1);
        assert_eq!(settings.ami_id, FleetSettings::default().ami_id);
    }

    #[test]
    fn tags_default_to_propagating() {
        let settings = parse_settings(
            r#"
            [[tags]]
            key = "Env"
            value = "prod"
            "#,
        )
        .unwrap();
        assert_eq!(settings.tags.len(), 1);
        assert!(settings.tags[0].propagate_at_launch);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = parse_settings("instance_typ = \"t2.micro\"").unwrap_err();
        assert!(err.to_string().contains("instance_typ"));
    }

    #[test]
    fn rendered_defaults_parse_back() {
        let defaults = FleetSettings::default();
        let text = render_settings(&defaults).unwrap();
        assert_eq!(parse_settings(&text).unwrap(), defaults);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_settings(Some(Path::new("/nonexistent/fleet.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
