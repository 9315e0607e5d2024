use crate::core::RangeObservation;
use crate::utils::ValidationSettings;
use thiserror::Error;

/// Reasons a decoded observation is rejected before it reaches the store
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("negative distance {distance} from anchor {anchor_id}")]
    NegativeDistance { anchor_id: String, distance: f64 },
    #[error("non-finite distance from anchor {anchor_id}")]
    NonFiniteDistance { anchor_id: String },
    #[error("distance {distance} from anchor {anchor_id} exceeds {max}")]
    DistanceOutOfRange { anchor_id: String, distance: f64, max: f64 },
    #[error("empty tag id from anchor {anchor_id}")]
    EmptyTagId { anchor_id: String },
    #[error("tag id of {len} characters exceeds {max}")]
    TagIdTooLong { len: usize, max: usize },
}

/// Plausibility checks on single observations
#[derive(Debug, Clone, Default)]
pub struct DataValidator {
    settings: ValidationSettings,
}

impl DataValidator {
    pub fn new(settings: ValidationSettings) -> Self {
        Self { settings }
    }

    pub fn validate(&self, observation: &RangeObservation) -> Result<(), ValidationError> {
        let anchor_id = &observation.anchor_id;

        if observation.tag_id.is_empty() {
            return Err(ValidationError::EmptyTagId {
                anchor_id: anchor_id.clone(),
            });
        }
        let len = observation.tag_id.chars().count();
        if len > self.settings.max_tag_id_len {
            return Err(ValidationError::TagIdTooLong {
                len,
                max: self.settings.max_tag_id_len,
            });
        }

        let distance = observation.distance;
        if !distance.is_finite() {
            return Err(ValidationError::NonFiniteDistance {
                anchor_id: anchor_id.clone(),
            });
        }
        if distance < 0.0 {
            return Err(ValidationError::NegativeDistance {
                anchor_id: anchor_id.clone(),
                distance,
            });
        }
        if let Some(max) = self.settings.max_distance {
            if distance > max {
                return Err(ValidationError::DistanceOutOfRange {
                    anchor_id: anchor_id.clone(),
                    distance,
                    max,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Technology;

    fn observation(tag: &str, distance: f64) -> RangeObservation {
        RangeObservation::new(Technology::Ble, "BEACON1", tag, distance)
    }

    #[test]
    fn test_accepts_plausible_observation() {
        let validator = DataValidator::default();
        assert!(validator.validate(&observation("TAG1", 0.0)).is_ok());
        assert!(validator.validate(&observation("TAG1", 12.5)).is_ok());
    }

    #[test]
    fn test_rejects_bad_distances() {
        let validator = DataValidator::default();
        assert!(matches!(
            validator.validate(&observation("TAG1", -0.1)),
            Err(ValidationError::NegativeDistance { .. })
        ));
        assert!(matches!(
            validator.validate(&observation("TAG1", f64::NAN)),
            Err(ValidationError::NonFiniteDistance { .. })
        ));
        assert!(matches!(
            validator.validate(&observation("TAG1", f64::INFINITY)),
            Err(ValidationError::NonFiniteDistance { .. })
        ));
    }

    #[test]
    fn test_max_distance() {
        let validator = DataValidator::new(ValidationSettings {
            max_distance: Some(10.0),
            ..ValidationSettings::default()
        });
        assert!(validator.validate(&observation("TAG1", 10.0)).is_ok());
        assert_eq!(
            validator.validate(&observation("TAG1", 10.5)),
            Err(ValidationError::DistanceOutOfRange {
                anchor_id: "BEACON1".to_string(),
                distance: 10.5,
                max: 10.0
            })
        );
    }

    #[test]
    fn test_tag_id_checks() {
        let validator = DataValidator::new(ValidationSettings {
            max_distance: None,
            max_tag_id_len: 4,
        });
        assert!(matches!(
            validator.validate(&observation("", 1.0)),
            Err(ValidationError::EmptyTagId { .. })
        ));
        assert_eq!(
            validator.validate(&observation("TAG-LONG", 1.0)),
            Err(ValidationError::TagIdTooLong { len: 8, max: 4 })
        );
    }
}
