use std::path::Path;

use crate::error::GridError;
use crate::fluid::FluidGrid;
use crate::render::Renderer;
use crate::shape::GridShape;

/// Read-only access to the current field buffers, for visualization and
/// analysis. Buffers include the ghost layer and follow `shape()` indexing.
pub trait FluidData {
    fn shape(&self) -> &GridShape;
    fn density(&self) -> &[f32];
    /// Empty for an axis the grid does not simulate.
    fn velocity(&self, axis: usize) -> &[f32];
}

impl FluidData for FluidGrid {
    fn shape(&self) -> &GridShape {
        self.shape()
    }

    fn density(&self) -> &[f32] {
        self.density()
    }

    fn velocity(&self, axis: usize) -> &[f32] {
        self.velocity(axis)
    }
}

/// Raw bytes of a float buffer in native endianness, as expected by texture
/// upload APIs.
pub fn as_bytes(values: &[f32]) -> &[u8] {
    bytemuck::cast_slice(values)
}

pub struct ImageExporter {
    renderer: Renderer,
}

impl ImageExporter {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            renderer: Renderer::new(width, height),
        }
    }

    pub fn export_density_png(
        &self,
        simulation: &impl FluidData,
        slice: usize,
        path: &Path,
    ) -> Result<(), GridError> {
        let img = self.renderer.render_density(simulation, slice);
        img.save(path)?;
        Ok(())
    }

    pub fn export_velocity_png(
        &self,
        simulation: &impl FluidData,
        slice: usize,
        path: &Path,
    ) -> Result<(), GridError> {
        let img = self.renderer.render_velocity(simulation, slice);
        img.save(path)?;
        Ok(())
    }

    /// Writes `{prefix}_density_{frame:04}.png` and
    /// `{prefix}_velocity_{frame:04}.png` into `output_dir`.
    pub fn export_frame(
        &self,
        simulation: &impl FluidData,
        slice: usize,
        output_dir: &Path,
        prefix: &str,
        frame: u64,
    ) -> Result<(), GridError> {
        let density_path = output_dir.join(format!("{prefix}_density_{frame:04}.png"));
        let velocity_path = output_dir.join(format!("{prefix}_velocity_{frame:04}.png"));

        self.export_density_png(simulation, slice, &density_path)?;
        self.export_velocity_png(simulation, slice, &velocity_path)?;
        Ok(())
    }
}
