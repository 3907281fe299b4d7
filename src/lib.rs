//! Grid-based incompressible fluid simulation using the Stable Fluids scheme
//! on a double-buffered 2D or 3D voxel grid.

pub mod analysis;
pub mod config;
pub mod error;
pub mod export;
pub mod field;
pub mod fluid;
pub mod render;
pub mod shape;
pub mod solver;

pub use analysis::{AnalysisRecorder, FluidMetrics};
pub use config::{DensityMerge, FluidConfig, Scenario};
pub use error::GridError;
pub use export::{FluidData, ImageExporter};
pub use field::{BoundsViolation, VoxelField};
pub use fluid::{DENSITY_OUT_OF_RANGE, FluidGrid, Voxel};
pub use render::Renderer;
pub use shape::{Dimensions, GridShape};
pub use solver::Boundary;
