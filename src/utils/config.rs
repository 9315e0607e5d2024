use crate::algorithms::{assess_geometry, BoundingBox, GeometryQuality, SolverSettings, SolverStrategy};
use crate::core::{AnchorPosition, Technology, MIN_ANCHORS_3D};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Single anchor entry in the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorConfig {
    /// Anchor identifier, also accepted as a colon-form topic
    pub id: String,
    /// Coordinates in the room frame
    pub position: [f64; 3],
    /// Physical address (MAC) reported in comma-form payloads
    #[serde(default)]
    pub address: Option<String>,
}

/// Anchor layout and routing for one ranging technology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnologyConfig {
    /// Topic carrying comma-form `anchor,tag,distance` payloads
    pub topic: String,
    pub anchors: Vec<AnchorConfig>,
    /// Anchors required before a solve; defaults to every configured anchor
    #[serde(default)]
    pub min_anchors: Option<usize>,
}

/// Limits applied to decoded observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSettings {
    /// Largest plausible distance; `None` disables the check
    #[serde(default)]
    pub max_distance: Option<f64>,
    #[serde(default = "default_max_tag_id_len")]
    pub max_tag_id_len: usize,
}

fn default_max_tag_id_len() -> usize {
    64
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            max_distance: None,
            max_tag_id_len: default_max_tag_id_len(),
        }
    }
}

/// Complete engine configuration, normally loaded from JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub technologies: BTreeMap<Technology, TechnologyConfig>,
    #[serde(default)]
    pub solver: SolverSettings,
    /// Samples older than this are ignored by readiness; `None` keeps them forever
    #[serde(default)]
    pub max_sample_age_ms: Option<u64>,
    #[serde(default)]
    pub validation: ValidationSettings,
}

/// Configuration errors, all fatal at startup
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid {parameter} = {value}: {reason}")]
    InvalidParameter { parameter: String, value: String, reason: String },
    #[error("missing required parameter {parameter}")]
    MissingParameter { parameter: String },
    #[error("I/O error: {message}")]
    IoError { message: String },
    #[error("serialization error: {message}")]
    SerializationError { message: String },
    #[error("anchor {anchor_id} ({technology}): {reason}")]
    AnchorConflict { technology: Technology, anchor_id: String, reason: String },
    #[error("topic '{topic}' is used more than once")]
    TopicConflict { topic: String },
}

/// Configuration validation result
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ConfigError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// First error, if any
    pub fn into_result(self) -> Result<Vec<String>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.warnings),
        }
    }
}

/// Runtime view of one technology: anchors in configured order plus routing data
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorLayout {
    pub technology: Technology,
    pub topic: String,
    pub anchors: Vec<AnchorPosition>,
    /// Anchors that must be present before a solve
    pub required_anchors: usize,
}

impl AnchorLayout {
    pub fn anchor(&self, id: &str) -> Option<&AnchorPosition> {
        self.anchors.iter().find(|a| a.id == id)
    }

    /// Look up an anchor by its address (case-insensitive)
    pub fn anchor_by_address(&self, address: &str) -> Option<&AnchorPosition> {
        self.anchors.iter().find(|a| {
            a.address
                .as_deref()
                .is_some_and(|own| own.eq_ignore_ascii_case(address))
        })
    }

    /// Resolve either an anchor id or an anchor address
    pub fn resolve(&self, key: &str) -> Option<&AnchorPosition> {
        self.anchor(key).or_else(|| self.anchor_by_address(key))
    }

    pub fn anchor_ids(&self) -> impl Iterator<Item = &str> {
        self.anchors.iter().map(|a| a.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Whether readiness demands every configured anchor
    pub fn requires_full_coverage(&self) -> bool {
        self.required_anchors >= self.anchors.len()
    }
}

/// One-line-per-technology overview for operators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigSummary {
    pub technology: Technology,
    pub topic: String,
    pub anchor_count: usize,
    pub required_anchors: usize,
    pub geometry: GeometryQuality,
}

impl Default for EngineConfig {
    /// The reference installation: four BLE beacons and four WiFi access points in one room
    fn default() -> Self {
        let ble = TechnologyConfig {
            topic: "ble".to_string(),
            anchors: vec![
                anchor("BEACON1", [0.0, 0.0, 0.0], "AA:BB:CC:DD:EE:01"),
                anchor("BEACON2", [1.0, 0.0, 0.0], "AA:BB:CC:DD:EE:02"),
                anchor("BEACON3", [0.0, 1.0, 0.0], "AA:BB:CC:DD:EE:03"),
                anchor("BEACON4", [0.5, 0.5, 1.0], "AA:BB:CC:DD:EE:04"),
            ],
            min_anchors: None,
        };
        let wifi = TechnologyConfig {
            topic: "wifi".to_string(),
            anchors: vec![
                anchor("WIFI1", [0.8, 1.0, 0.0], "11:22:33:44:55:01"),
                anchor("WIFI2", [0.9, 0.0, 0.0], "11:22:33:44:55:02"),
                anchor("WIFI3", [0.0, 1.2, 0.0], "11:22:33:44:55:03"),
                anchor("WIFI4", [0.2, 0.7, 1.0], "11:22:33:44:55:04"),
            ],
            min_anchors: None,
        };

        let mut technologies = BTreeMap::new();
        technologies.insert(Technology::Ble, ble);
        technologies.insert(Technology::Wifi, wifi);

        Self {
            technologies,
            solver: SolverSettings {
                bounds: Some(BoundingBox::new([-1.0, -1.0, 0.0], [3.0, 3.0, 5.0])),
                ..SolverSettings::default()
            },
            max_sample_age_ms: None,
            validation: ValidationSettings::default(),
        }
    }
}

fn anchor(id: &str, position: [f64; 3], address: &str) -> AnchorConfig {
    AnchorConfig {
        id: id.to_string(),
        position,
        address: Some(address.to_string()),
    }
}

impl EngineConfig {
    /// Load and validate a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let content = fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            message: format!("failed to read config file '{}': {}", path_str, e),
        })?;

        Self::from_json_str(&content)
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(content).map_err(|e| ConfigError::SerializationError {
            message: format!("failed to parse config: {}", e),
        })?;

        for warning in config.validate().into_result()? {
            log::warn!("{}", warning);
        }
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializationError {
            message: format!("failed to serialize config: {}", e),
        })
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let content = self.to_json_pretty()?;
        fs::write(&path, content).map_err(|e| ConfigError::IoError {
            message: format!("failed to write config file '{}': {}", path_str, e),
        })
    }

    pub fn max_sample_age(&self) -> Option<Duration> {
        self.max_sample_age_ms.map(Duration::from_millis)
    }

    /// Validate the whole configuration, collecting every error and warning
    pub fn validate(&self) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.technologies.is_empty() {
            errors.push(ConfigError::MissingParameter {
                parameter: "technologies".to_string(),
            });
        }

        self.validate_solver(&mut errors);

        let mut topics = HashSet::new();
        for (technology, tech) in &self.technologies {
            if tech.topic.trim().is_empty() {
                errors.push(ConfigError::MissingParameter {
                    parameter: format!("technologies.{}.topic", technology),
                });
            } else if !topics.insert(tech.topic.as_str()) {
                errors.push(ConfigError::TopicConflict { topic: tech.topic.clone() });
            }
            self.validate_technology(*technology, tech, &mut errors, &mut warnings);
        }

        // Colon-form payloads are routed by anchor id or address, so those must
        // not shadow a technology topic.
        let mut anchor_topics: HashMap<String, Technology> = HashMap::new();
        for (technology, tech) in &self.technologies {
            for anchor in &tech.anchors {
                let keys = std::iter::once(anchor.id.clone()).chain(anchor.address.clone());
                for key in keys {
                    if topics.contains(key.as_str()) {
                        errors.push(ConfigError::TopicConflict { topic: key.clone() });
                    }
                    if let Some(other) = anchor_topics.insert(key.to_ascii_uppercase(), *technology) {
                        if other != *technology {
                            warnings.push(format!(
                                "'{}' names an anchor in both {} and {}; colon-form messages on that topic will be rejected",
                                key, other, technology
                            ));
                        }
                    }
                }
            }
        }

        if self.max_sample_age_ms == Some(0) {
            errors.push(ConfigError::InvalidParameter {
                parameter: "max_sample_age_ms".to_string(),
                value: "0".to_string(),
                reason: "sample age limit must be positive or absent".to_string(),
            });
        }

        if let Some(max_distance) = self.validation.max_distance {
            if !(max_distance.is_finite() && max_distance > 0.0) {
                errors.push(ConfigError::InvalidParameter {
                    parameter: "validation.max_distance".to_string(),
                    value: max_distance.to_string(),
                    reason: "maximum distance must be positive".to_string(),
                });
            }
        }

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    fn validate_solver(&self, errors: &mut Vec<ConfigError>) {
        let solver = &self.solver;

        for (name, value) in [("ftol", solver.ftol), ("xtol", solver.xtol), ("gtol", solver.gtol)] {
            if !(value.is_finite() && value > 0.0) {
                errors.push(ConfigError::InvalidParameter {
                    parameter: format!("solver.{}", name),
                    value: value.to_string(),
                    reason: "tolerance must be a finite positive number".to_string(),
                });
            }
        }

        if solver.max_iterations == 0 {
            errors.push(ConfigError::InvalidParameter {
                parameter: "solver.max_iterations".to_string(),
                value: "0".to_string(),
                reason: "iteration budget must be positive".to_string(),
            });
        }

        match &solver.bounds {
            Some(bounds) if !bounds.is_valid() => errors.push(ConfigError::InvalidParameter {
                parameter: "solver.bounds".to_string(),
                value: format!("{:?} .. {:?}", bounds.min, bounds.max),
                reason: "bounds must be finite with min <= max on every axis".to_string(),
            }),
            None if solver.strategy == SolverStrategy::Bounded => errors.push(ConfigError::MissingParameter {
                parameter: "solver.bounds".to_string(),
            }),
            _ => {}
        }
    }

    fn validate_technology(
        &self,
        technology: Technology,
        tech: &TechnologyConfig,
        errors: &mut Vec<ConfigError>,
        warnings: &mut Vec<String>,
    ) {
        let count = tech.anchors.len();
        if count < MIN_ANCHORS_3D {
            errors.push(ConfigError::InvalidParameter {
                parameter: format!("technologies.{}.anchors", technology),
                value: count.to_string(),
                reason: format!("at least {} anchors are required", MIN_ANCHORS_3D),
            });
            return;
        }

        let mut ids = HashSet::new();
        let mut addresses = HashSet::new();
        for anchor in &tech.anchors {
            if anchor.id.trim().is_empty() {
                errors.push(ConfigError::AnchorConflict {
                    technology,
                    anchor_id: anchor.id.clone(),
                    reason: "anchor id must not be empty".to_string(),
                });
            }
            if !ids.insert(anchor.id.as_str()) {
                errors.push(ConfigError::AnchorConflict {
                    technology,
                    anchor_id: anchor.id.clone(),
                    reason: "duplicate anchor id".to_string(),
                });
            }
            if let Some(address) = &anchor.address {
                if !addresses.insert(address.to_ascii_uppercase()) {
                    errors.push(ConfigError::AnchorConflict {
                        technology,
                        anchor_id: anchor.id.clone(),
                        reason: format!("duplicate address {}", address),
                    });
                }
            }
            if anchor.position.iter().any(|v| !v.is_finite()) {
                errors.push(ConfigError::AnchorConflict {
                    technology,
                    anchor_id: anchor.id.clone(),
                    reason: "position must be finite".to_string(),
                });
            }
            if let Some(bounds) = &self.solver.bounds {
                if !bounds.contains(&Vector3::from(anchor.position)) {
                    warnings.push(format!(
                        "anchor {} ({}) lies outside the solver bounds",
                        anchor.id, technology
                    ));
                }
            }
        }

        let required = tech.min_anchors.unwrap_or(count);
        if required < MIN_ANCHORS_3D || required > count {
            errors.push(ConfigError::InvalidParameter {
                parameter: format!("technologies.{}.min_anchors", technology),
                value: required.to_string(),
                reason: format!("must be between {} and {}", MIN_ANCHORS_3D, count),
            });
            return;
        }

        for snapshot_size in required..=count {
            if !self.solver.supports(snapshot_size) {
                errors.push(ConfigError::InvalidParameter {
                    parameter: "solver.bounds".to_string(),
                    value: "none".to_string(),
                    reason: format!(
                        "{} needs the bounded solver for {} anchors but no usable bounding box is configured",
                        technology, snapshot_size
                    ),
                });
                break;
            }
        }

        let positions: Vec<Vector3<f64>> = tech.anchors.iter().map(|a| Vector3::from(a.position)).collect();
        let geometry = assess_geometry(&positions);
        if count >= 4 && !geometry.supports_closed_form_3d() {
            warnings.push(format!(
                "{} anchors are {:?}; the closed-form solver cannot resolve height",
                technology, geometry
            ));
        }
    }

    /// Runtime anchor layouts in configured order
    pub fn layouts(&self) -> BTreeMap<Technology, AnchorLayout> {
        self.technologies
            .iter()
            .map(|(technology, tech)| {
                let anchors = tech
                    .anchors
                    .iter()
                    .map(|a| AnchorPosition {
                        id: a.id.clone(),
                        position: Vector3::from(a.position),
                        address: a.address.clone(),
                    })
                    .collect::<Vec<_>>();
                let layout = AnchorLayout {
                    technology: *technology,
                    topic: tech.topic.clone(),
                    required_anchors: tech.min_anchors.unwrap_or(anchors.len()),
                    anchors,
                };
                (*technology, layout)
            })
            .collect()
    }

    pub fn summary(&self) -> Vec<ConfigSummary> {
        self.layouts()
            .into_values()
            .map(|layout| {
                let positions: Vec<Vector3<f64>> = layout.anchors.iter().map(|a| a.position).collect();
                ConfigSummary {
                    technology: layout.technology,
                    topic: layout.topic.clone(),
                    anchor_count: layout.len(),
                    required_anchors: layout.required_anchors,
                    geometry: assess_geometry(&positions),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_tolerance_rejected() {
        let mut config = EngineConfig::default();
        config.solver.ftol = 0.0;
        config.solver.xtol = 0.0;
        config.solver.gtol = 0.0;

        let result = config.validate();
        assert!(!result.is_valid);
        let rejected: Vec<_> = result
            .errors
            .iter()
            .filter_map(|e| match e {
                ConfigError::InvalidParameter { parameter, .. } => Some(parameter.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(rejected, ["solver.ftol", "solver.xtol", "solver.gtol"]);

        config.solver.gtol = -1e-6;
        config.solver.ftol = 1e-8;
        config.solver.xtol = 1e-8;
        assert!(!config.validate().is_valid);
    }

    #[test]
    fn test_shipped_config_matches_default() {
        let shipped = EngineConfig::from_json_str(include_str!("../../config/default.json")).unwrap();
        assert_eq!(shipped, EngineConfig::default());
    }

    fn three_anchor_tech(topic: &str) -> TechnologyConfig {
        TechnologyConfig {
            topic: topic.to_string(),
            anchors: vec![
                AnchorConfig { id: "A".to_string(), position: [0.0, 0.0, 0.0], address: None },
                AnchorConfig { id: "B".to_string(), position: [4.0, 0.0, 0.0], address: None },
                AnchorConfig { id: "C".to_string(), position: [0.0, 4.0, 0.0], address: None },
            ],
            min_anchors: None,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        let result = config.validate();
        assert!(result.is_valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);

        let layouts = config.layouts();
        assert_eq!(layouts.len(), 2);
        assert_eq!(layouts[&Technology::Ble].required_anchors, 4);
        assert!(layouts[&Technology::Wifi].requires_full_coverage());
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = EngineConfig::default();
        let json = config.to_json_pretty().unwrap();
        let restored = EngineConfig::from_json_str(&json).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let json = r#"{
            "technologies": {
                "ble": {
                    "topic": "ble",
                    "anchors": [
                        {"id": "B1", "position": [0, 0, 0]},
                        {"id": "B2", "position": [5, 0, 0]},
                        {"id": "B3", "position": [0, 5, 0]},
                        {"id": "B4", "position": [2.5, 2.5, 3]}
                    ]
                }
            }
        }"#;
        let config = EngineConfig::from_json_str(json).unwrap();
        assert_eq!(config.solver.strategy, SolverStrategy::Auto);
        assert!(config.solver.bounds.is_none());
        assert!(config.max_sample_age().is_none());
        assert_eq!(config.layouts()[&Technology::Ble].anchors[3].position, Vector3::new(2.5, 2.5, 3.0));
    }

    #[test]
    fn test_unknown_technology_rejected() {
        let json = r#"{"technologies": {"uwb": {"topic": "uwb", "anchors": []}}}"#;
        assert!(matches!(
            EngineConfig::from_json_str(json),
            Err(ConfigError::SerializationError { .. })
        ));
    }

    #[test]
    fn test_too_few_anchors_rejected() {
        let mut config = EngineConfig::default();
        config
            .technologies
            .get_mut(&Technology::Ble)
            .unwrap()
            .anchors
            .truncate(2);
        let result = config.validate();
        assert!(!result.is_valid);
        assert!(matches!(result.errors[0], ConfigError::InvalidParameter { .. }));
    }

    #[test]
    fn test_duplicate_anchor_id_rejected() {
        let mut config = EngineConfig::default();
        let ble = config.technologies.get_mut(&Technology::Ble).unwrap();
        ble.anchors[1].id = "BEACON1".to_string();

        let err = config.validate().into_result().unwrap_err();
        assert!(matches!(err, ConfigError::AnchorConflict { .. }));
    }

    #[test]
    fn test_bounded_strategy_requires_bounds() {
        let mut config = EngineConfig::default();
        config.solver.strategy = SolverStrategy::Bounded;
        config.solver.bounds = None;

        let err = config.validate().into_result().unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingParameter {
                parameter: "solver.bounds".to_string()
            }
        );
    }

    #[test]
    fn test_five_anchors_without_bounds_rejected() {
        let mut config = EngineConfig::default();
        config.solver.bounds = None;
        config
            .technologies
            .get_mut(&Technology::Ble)
            .unwrap()
            .anchors
            .push(anchor("BEACON5", [1.0, 1.0, 0.5], "AA:BB:CC:DD:EE:05"));

        assert!(!config.validate().is_valid);
    }

    #[test]
    fn test_min_anchors_range() {
        let mut config = EngineConfig::default();
        config.technologies.get_mut(&Technology::Ble).unwrap().min_anchors = Some(2);
        assert!(!config.validate().is_valid);

        config.technologies.get_mut(&Technology::Ble).unwrap().min_anchors = Some(3);
        assert!(config.validate().is_valid);
        assert_eq!(config.layouts()[&Technology::Ble].required_anchors, 3);
        assert!(!config.layouts()[&Technology::Ble].requires_full_coverage());
    }

    #[test]
    fn test_topic_conflicts() {
        let mut technologies = BTreeMap::new();
        technologies.insert(Technology::Ble, three_anchor_tech("shared"));
        technologies.insert(Technology::Wifi, three_anchor_tech("shared"));
        let config = EngineConfig {
            technologies,
            solver: SolverSettings::default(),
            max_sample_age_ms: None,
            validation: ValidationSettings::default(),
        };

        let result = config.validate();
        assert!(result
            .errors
            .contains(&ConfigError::TopicConflict { topic: "shared".to_string() }));
        // Same anchor ids in both technologies only warn.
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn test_coplanar_layout_warns() {
        let mut config = EngineConfig::default();
        let wifi = config.technologies.get_mut(&Technology::Wifi).unwrap();
        wifi.anchors[3].position = [0.2, 0.7, 0.0];

        let result = config.validate();
        assert!(result.is_valid);
        assert!(result.warnings.iter().any(|w| w.contains("Coplanar")));
    }

    #[test]
    fn test_layout_resolves_addresses() {
        let layouts = EngineConfig::default().layouts();
        let ble = &layouts[&Technology::Ble];
        assert_eq!(ble.resolve("BEACON2").unwrap().id, "BEACON2");
        assert_eq!(ble.resolve("aa:bb:cc:dd:ee:03").unwrap().id, "BEACON3");
        assert!(ble.resolve("WIFI1").is_none());
        assert_eq!(ble.anchor_ids().collect::<Vec<_>>(), ["BEACON1", "BEACON2", "BEACON3", "BEACON4"]);
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join(format!("multilateration-config-{}.json", std::process::id()));
        let config = EngineConfig::default();
        config.save_to_file(&path).unwrap();
        let loaded = EngineConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = fs::remove_file(&path);

        assert!(matches!(
            EngineConfig::from_file("/nonexistent/engine.json"),
            Err(ConfigError::IoError { .. })
        ));
    }
}
