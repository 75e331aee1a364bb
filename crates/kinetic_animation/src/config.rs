//! Animation configuration (kinetic.toml)
//!
//! ```toml
//! [scheduler]
//! max_tick_delta = 0.1
//!
//! [presets]
//! duration = 0.4
//! distance = 64.0
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level configuration
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct AnimationConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub presets: PresetDefaults,
}

/// Scheduler settings
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Upper bound for a single tick's delta in seconds. Long stalls are
    /// clamped so animations do not jump to the end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tick_delta: Option<f32>,
}

/// Default parameters for the preset catalog
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PresetDefaults {
    /// Duration of fades, slides, scales, pulse and shake (seconds)
    #[serde(default = "default_duration")]
    pub duration: f32,
    /// Slide distance in pixels
    #[serde(default = "default_distance")]
    pub distance: f32,
    /// Starting scale factor for scale in
    #[serde(default = "default_scale_from")]
    pub scale_from: f32,
    #[serde(default = "default_bounce_duration")]
    pub bounce_duration: f32,
    /// Starting scale factor for bounce in
    #[serde(default = "default_bounce_from")]
    pub bounce_from: f32,
    #[serde(default = "default_rotate_duration")]
    pub rotate_duration: f32,
    /// Degrees turned by rotate in/out
    #[serde(default = "default_rotate_angle")]
    pub rotate_angle: f32,
    /// Peak scale factor of a pulse
    #[serde(default = "default_pulse_intensity")]
    pub pulse_intensity: f32,
    /// Peak shake offset in pixels
    #[serde(default = "default_shake_intensity")]
    pub shake_intensity: f32,
}

fn default_duration() -> f32 {
    0.5
}

fn default_distance() -> f32 {
    100.0
}

fn default_scale_from() -> f32 {
    0.5
}

fn default_bounce_duration() -> f32 {
    0.8
}

fn default_bounce_from() -> f32 {
    0.3
}

fn default_rotate_duration() -> f32 {
    0.7
}

fn default_rotate_angle() -> f32 {
    180.0
}

fn default_pulse_intensity() -> f32 {
    1.1
}

fn default_shake_intensity() -> f32 {
    10.0
}

impl Default for PresetDefaults {
    fn default() -> Self {
        Self {
            duration: default_duration(),
            distance: default_distance(),
            scale_from: default_scale_from(),
            bounce_duration: default_bounce_duration(),
            bounce_from: default_bounce_from(),
            rotate_duration: default_rotate_duration(),
            rotate_angle: default_rotate_angle(),
            pulse_intensity: default_pulse_intensity(),
            shake_intensity: default_shake_intensity(),
        }
    }
}

impl PresetDefaults {
    fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("presets.duration", self.duration),
            ("presets.bounce_duration", self.bounce_duration),
            ("presets.rotate_duration", self.rotate_duration),
        ];
        for (name, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a non-negative number of seconds, got {}",
                    name, value
                )));
            }
        }

        let values = [
            ("presets.distance", self.distance),
            ("presets.scale_from", self.scale_from),
            ("presets.bounce_from", self.bounce_from),
            ("presets.rotate_angle", self.rotate_angle),
            ("presets.pulse_intensity", self.pulse_intensity),
            ("presets.shake_intensity", self.shake_intensity),
        ];
        for (name, value) in values {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!("{} must be finite, got {}", name, value)));
            }
        }
        Ok(())
    }
}

impl AnimationConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AnimationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded animation config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(max) = self.scheduler.max_tick_delta {
            if !max.is_finite() || max <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "scheduler.max_tick_delta must be positive, got {}",
                    max
                )));
            }
        }
        self.presets.validate()
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = AnimationConfig::from_toml_str("").unwrap();
        assert_eq!(config, AnimationConfig::default());
        assert_eq!(config.presets.duration, 0.5);
        assert_eq!(config.presets.distance, 100.0);
        assert_eq!(config.scheduler.max_tick_delta, None);
    }

    #[test]
    fn test_partial_table_falls_back_to_defaults() {
        let config = AnimationConfig::from_toml_str(
            r#"
            [scheduler]
            max_tick_delta = 0.25

            [presets]
            distance = 40.0
            "#,
        )
        .unwrap();

        assert_eq!(config.scheduler.max_tick_delta, Some(0.25));
        assert_eq!(config.presets.distance, 40.0);
        assert_eq!(config.presets.bounce_duration, 0.8);
        assert_eq!(config.presets.rotate_angle, 180.0);
    }

    #[test]
    fn test_negative_duration_is_rejected() {
        let err = AnimationConfig::from_toml_str("[presets]\nduration = -1.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("presets.duration"));
    }

    #[test]
    fn test_non_positive_tick_delta_is_rejected() {
        let err = AnimationConfig::from_toml_str("[scheduler]\nmax_tick_delta = 0.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let err = AnimationConfig::from_toml_str("[presets\nduration = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_to_toml_reloads() {
        let mut config = AnimationConfig::default();
        config.presets.shake_intensity = 4.0;
        config.scheduler.max_tick_delta = Some(0.05);

        let text = config.to_toml().unwrap();
        assert_eq!(AnimationConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err =
            AnimationConfig::load(Path::new("/definitely/not/here/kinetic.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
