use std::path::{Path, PathBuf};

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::GridError;
use crate::shape::{Dimensions, GridShape};

/// How a queued density source combines with the density already in a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DensityMerge {
    /// The source value is added on every step.
    #[default]
    Additive,
    /// A cell holding less than the source value is raised to it; a cell
    /// holding more is left alone.
    RaiseOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluidConfig {
    pub side_length: usize,
    pub dimensions: Dimensions,
    pub diffusion_rate: f32,
    pub viscosity: f32,
    pub turbulence_magnitude: i32,
    pub density_merge: DensityMerge,
    /// Seed for the turbulence generator; drawn from the OS when absent.
    pub seed: Option<u64>,
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            side_length: 64,
            dimensions: Dimensions::Two,
            diffusion_rate: 0.0001,
            viscosity: 0.0,
            turbulence_magnitude: 0,
            density_merge: DensityMerge::Additive,
            seed: None,
        }
    }
}

impl FluidConfig {
    pub fn new(side_length: usize, dimensions: Dimensions) -> Self {
        Self {
            side_length,
            dimensions,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), GridError> {
        GridShape::buffer_len(self.side_length, self.dimensions)?;
        check_rate("diffusion_rate", self.diffusion_rate)?;
        check_rate("viscosity", self.viscosity)?;
        if self.turbulence_magnitude < 0 {
            return Err(GridError::InvalidParameter {
                name: "turbulence_magnitude",
                value: self.turbulence_magnitude as f32,
            });
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, GridError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, GridError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String, GridError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub(crate) fn check_rate(name: &'static str, value: f32) -> Result<(), GridError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(GridError::InvalidParameter { name, value })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensitySource {
    pub position: IVec3,
    pub amount: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocitySource {
    pub position: IVec3,
    pub velocity: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportOptions {
    pub directory: PathBuf,
    #[serde(default = "default_image_size")]
    pub image_size: u32,
    /// z-slice to render for 3D grids; the middle slice when absent.
    #[serde(default)]
    pub slice: Option<usize>,
    #[serde(default = "default_every")]
    pub every: usize,
}

fn default_image_size() -> u32 {
    400
}

fn default_every() -> usize {
    1
}

/// A headless run: sources listed here are submitted again before every
/// frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub grid: FluidConfig,
    #[serde(default = "default_frames")]
    pub frames: usize,
    #[serde(default = "default_dt")]
    pub dt: f32,
    #[serde(default)]
    pub density_sources: Vec<DensitySource>,
    #[serde(default)]
    pub velocity_sources: Vec<VelocitySource>,
    #[serde(default)]
    pub export: Option<ExportOptions>,
}

fn default_frames() -> usize {
    50
}

fn default_dt() -> f32 {
    0.016
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            grid: FluidConfig::default(),
            frames: default_frames(),
            dt: default_dt(),
            density_sources: Vec::new(),
            velocity_sources: Vec::new(),
            export: None,
        }
    }
}

impl Scenario {
    pub fn from_json_str(json: &str) -> Result<Self, GridError> {
        let scenario: Self = serde_json::from_str(json)?;
        scenario.grid.validate()?;
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self, GridError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = FluidConfig::from_json_str(r#"{ "side_length": 5, "dimensions": 3 }"#).unwrap();
        assert_eq!(config.side_length, 5);
        assert_eq!(config.dimensions, Dimensions::Three);
        assert_eq!(config.density_merge, DensityMerge::Additive);
        assert_eq!(config.turbulence_magnitude, 0);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn rejects_bad_dimensions() {
        let err = FluidConfig::from_json_str(r#"{ "dimensions": 4 }"#).unwrap_err();
        assert!(matches!(err, GridError::Config(_)));
    }

    #[test]
    fn rejects_negative_rates() {
        let err = FluidConfig::from_json_str(r#"{ "viscosity": -1.0 }"#).unwrap_err();
        assert!(matches!(err, GridError::InvalidParameter { name: "viscosity", .. }));

        let err = FluidConfig::from_json_str(r#"{ "side_length": 0 }"#).unwrap_err();
        assert!(matches!(err, GridError::InvalidSideLength(0)));
    }

    #[test]
    fn rejects_oversized_grid() {
        let err = FluidConfig::from_json_str(r#"{ "side_length": 4096, "dimensions": 3 }"#).unwrap_err();
        assert!(matches!(err, GridError::GridTooLarge { side: 4096, dimensions: 3 }));
    }

    #[test]
    fn config_json_round_trip() {
        let config = FluidConfig {
            density_merge: DensityMerge::RaiseOnly,
            seed: Some(7),
            ..FluidConfig::new(16, Dimensions::Three)
        };
        let parsed = FluidConfig::from_json_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn scenario_with_sources() {
        let json = r#"{
            "grid": { "side_length": 5, "diffusion_rate": 0.5 },
            "frames": 10,
            "density_sources": [ { "position": [0, 0, 0], "amount": 10.0 } ],
            "velocity_sources": [ { "position": [2, 2, 0], "velocity": [1.0, 0.0, 0.0] } ]
        }"#;
        let scenario = Scenario::from_json_str(json).unwrap();
        assert_eq!(scenario.frames, 10);
        assert_eq!(scenario.dt, 0.016);
        assert_eq!(scenario.density_sources[0].position, IVec3::ZERO);
        assert_eq!(scenario.velocity_sources[0].velocity, Vec3::X);
        assert!(scenario.export.is_none());
    }
}
