//! Validation for playlist entities.
//!
//! Feature vectors and track payloads coming in from the catalog are
//! validated against the documented ranges before they are stored. A value
//! outside its range is a [`ValidationError`], handled by the caller
//! (enrichment drops the vector for that track, it does not abort the pass).

use super::models::{AudioFeatures, Track};
use std::fmt;

/// Validation error types
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyField {
        field: &'static str,
    },
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    NonPositiveValue {
        field: &'static str,
        value: f64,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField { field } => {
                write!(f, "Field '{}' is required but was empty", field)
            }
            ValidationError::OutOfRange {
                field,
                value,
                min,
                max,
            } => {
                write!(
                    f,
                    "Field '{}' must be within [{}, {}], got {}",
                    field, min, max, value
                )
            }
            ValidationError::NonPositiveValue { field, value } => {
                write!(f, "Field '{}' must be positive, got {}", field, value)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

fn check_unit_interval(field: &'static str, value: f64) -> ValidationResult<()> {
    check_range(field, value, 0.0, 1.0)
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> ValidationResult<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Validate a feature vector against the documented ranges.
pub fn validate_audio_features(features: &AudioFeatures) -> ValidationResult<()> {
    check_unit_interval("acousticness", features.acousticness)?;
    check_unit_interval("danceability", features.danceability)?;
    check_unit_interval("energy", features.energy)?;
    check_unit_interval("instrumentalness", features.instrumentalness)?;
    check_unit_interval("liveness", features.liveness)?;
    check_unit_interval("speechiness", features.speechiness)?;
    check_unit_interval("valence", features.valence)?;
    check_range("loudness", features.loudness, -60.0, 0.0)?;
    if !features.tempo.is_finite() || features.tempo <= 0.0 {
        return Err(ValidationError::NonPositiveValue {
            field: "tempo",
            value: features.tempo,
        });
    }
    check_range("key", features.key as f64, -1.0, 11.0)?;
    check_range("mode", features.mode as f64, 0.0, 1.0)?;
    check_range("time_signature", features.time_signature as f64, 1.0, 7.0)?;
    Ok(())
}

/// Validate a track payload before it is embedded into a playlist.
pub fn validate_track(track: &Track) -> ValidationResult<()> {
    if track.id.trim().is_empty() {
        return Err(ValidationError::EmptyField { field: "id" });
    }
    if track.name.trim().is_empty() {
        return Err(ValidationError::EmptyField { field: "name" });
    }
    check_range("popularity", track.popularity as f64, 0.0, 100.0)?;
    if let Some(features) = &track.audio_features {
        validate_audio_features(features)?;
    }
    Ok(())
}
