use std::fmt::Write as _;
use std::time::Instant;

use glam::{IVec3, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{DensityMerge, FluidConfig, check_rate};
use crate::error::GridError;
use crate::field::VoxelField;
use crate::shape::{Dimensions, GridShape};
use crate::solver::{self, Boundary};

/// Returned by [`FluidGrid::get_density`] for positions outside the grid.
pub const DENSITY_OUT_OF_RANGE: f32 = -1.0;

/// Read-only view of one cell after a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voxel {
    pub position: IVec3,
    pub density: f32,
    pub velocity: Vec3,
}

#[derive(Debug, Clone, Copy)]
struct PendingDensity {
    index: usize,
    amount: f32,
}

#[derive(Debug, Clone, Copy)]
struct PendingVelocity {
    index: usize,
    velocity: Vec3,
}

/// Stable Fluids simulation on a square (2D) or cubic (3D) grid.
///
/// Positions passed to the public API are domain coordinates in `[0, N)` on
/// every simulated axis (`z` must be `0` in 2D); the ghost layer is managed
/// internally.
///
/// Sources are queued and only applied by the next [`FluidGrid::step`]. All
/// mutating calls take `&mut self`, so sources can never be submitted while a
/// step is running.
#[derive(Debug, Clone)]
pub struct FluidGrid {
    shape: GridShape,
    density: VoxelField<f32>,
    velocity: Vec<VoxelField<f32>>,
    pressure: Vec<f32>,
    divergence: Vec<f32>,
    origins: Vec<Vec3>,
    texture: Vec<f32>,
    pending_density: Vec<PendingDensity>,
    pending_velocity: Vec<PendingVelocity>,
    diffusion_rate: f32,
    viscosity: f32,
    turbulence_magnitude: i32,
    density_merge: DensityMerge,
    rng: StdRng,
    frame: u64,
}

impl Default for FluidGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl FluidGrid {
    /// An unconfigured grid. Steps are no-ops and every query is out of range
    /// until [`FluidGrid::configure`] succeeds.
    pub fn new() -> Self {
        let defaults = FluidConfig::default();
        let shape = GridShape::empty();
        Self {
            density: VoxelField::new(&shape),
            velocity: Vec::new(),
            pressure: Vec::new(),
            divergence: Vec::new(),
            origins: Vec::new(),
            texture: Vec::new(),
            pending_density: Vec::new(),
            pending_velocity: Vec::new(),
            diffusion_rate: defaults.diffusion_rate,
            viscosity: defaults.viscosity,
            turbulence_magnitude: defaults.turbulence_magnitude,
            density_merge: defaults.density_merge,
            rng: StdRng::from_entropy(),
            frame: 0,
            shape,
        }
    }

    pub fn from_config(config: &FluidConfig) -> Result<Self, GridError> {
        config.validate()?;

        let mut grid = Self::new();
        grid.diffusion_rate = config.diffusion_rate;
        grid.viscosity = config.viscosity;
        grid.turbulence_magnitude = config.turbulence_magnitude;
        grid.density_merge = config.density_merge;
        if let Some(seed) = config.seed {
            grid.seed_turbulence(seed);
        }
        grid.configure(config.side_length, config.dimensions)?;
        Ok(grid)
    }

    /// Allocates every field for an `N^D` domain, discarding all previous
    /// field data and queued sources. Parameters are kept.
    pub fn configure(&mut self, side_length: usize, dimensions: Dimensions) -> Result<(), GridError> {
        let shape = GridShape::new(side_length, dimensions)?;

        self.density = VoxelField::new(&shape);
        self.velocity = (0..dimensions.count()).map(|_| VoxelField::new(&shape)).collect();
        self.pressure = vec![0.0; shape.len()];
        self.divergence = vec![0.0; shape.len()];
        self.origins = Vec::with_capacity(shape.interior().len());
        self.texture = vec![0.0; shape.interior().len()];
        self.pending_density.clear();
        self.pending_velocity.clear();
        self.frame = 0;
        self.shape = shape;

        log::info!(
            "configured {}D fluid grid with side {} ({} cells including ghost layer)",
            dimensions.count(),
            side_length,
            self.shape.len()
        );
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        !self.shape.is_empty()
    }

    pub fn shape(&self) -> &GridShape {
        &self.shape
    }

    pub fn side_length(&self) -> usize {
        self.shape.side()
    }

    pub fn dimensions(&self) -> Dimensions {
        self.shape.dimensions()
    }

    /// Number of completed steps since the last configuration.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn diffusion_rate(&self) -> f32 {
        self.diffusion_rate
    }

    pub fn set_diffusion_rate(&mut self, rate: f32) {
        debug_assert!(check_rate("diffusion_rate", rate).is_ok());
        self.diffusion_rate = rate;
    }

    pub fn viscosity(&self) -> f32 {
        self.viscosity
    }

    pub fn set_viscosity(&mut self, viscosity: f32) {
        debug_assert!(check_rate("viscosity", viscosity).is_ok());
        self.viscosity = viscosity;
    }

    pub fn turbulence_magnitude(&self) -> i32 {
        self.turbulence_magnitude
    }

    /// Zero disables turbulence. Negative values are treated as their
    /// absolute value.
    pub fn set_turbulence_magnitude(&mut self, magnitude: i32) {
        self.turbulence_magnitude = magnitude;
    }

    pub fn density_merge(&self) -> DensityMerge {
        self.density_merge
    }

    pub fn set_density_merge(&mut self, merge: DensityMerge) {
        self.density_merge = merge;
    }

    pub fn seed_turbulence(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Queues density for the next step. Out-of-range positions are ignored.
    pub fn add_density_source(&mut self, position: IVec3, amount: f32) {
        match self.shape.domain_index(position) {
            Some(index) => self.pending_density.push(PendingDensity { index, amount }),
            None => log::debug!("ignoring density source outside the grid at {position}"),
        }
    }

    /// Queues a velocity impulse for the next step. Out-of-range positions are
    /// ignored; the z component is ignored in 2D.
    pub fn add_velocity_source(&mut self, position: IVec3, velocity: Vec3) {
        match self.shape.domain_index(position) {
            Some(index) => self.pending_velocity.push(PendingVelocity { index, velocity }),
            None => log::debug!("ignoring velocity source outside the grid at {position}"),
        }
    }

    pub fn pending_sources(&self) -> usize {
        self.pending_density.len() + self.pending_velocity.len()
    }

    /// Advances the simulation by `dt`, consuming every queued source.
    pub fn step(&mut self, dt: f32) {
        if !self.is_configured() {
            log::warn!("step called on an unconfigured fluid grid");
            return;
        }
        debug_assert!(dt.is_finite(), "non-finite time step {dt}");

        let started = Instant::now();

        self.merge_sources();
        self.inject_turbulence();
        self.velocity_step(dt);
        self.density_step(dt);
        self.frame += 1;

        debug_assert!(
            self.density.current().iter().all(|d| d.is_finite()),
            "density diverged at frame {}",
            self.frame
        );
        log::trace!("frame {} stepped in {:?}", self.frame, started.elapsed());
    }

    fn merge_sources(&mut self) {
        self.density.copy_current_into_previous();
        for component in &mut self.velocity {
            component.copy_current_into_previous();
        }

        for source in self.pending_density.drain(..) {
            match self.density_merge {
                DensityMerge::Additive => {
                    self.density.increase_previous_index(source.index, source.amount)
                }
                DensityMerge::RaiseOnly => {
                    let residual = self.density.get_previous_index(source.index);
                    if residual < source.amount {
                        self.density.set_previous_index(source.index, source.amount);
                    }
                }
            }
        }

        for source in self.pending_velocity.drain(..) {
            for (axis, component) in self.velocity.iter_mut().enumerate() {
                component.increase_previous_index(source.index, source.velocity[axis]);
            }
        }
    }

    fn inject_turbulence(&mut self) {
        let magnitude = self.turbulence_magnitude.unsigned_abs() as f32;
        if magnitude == 0.0 {
            return;
        }

        let interior = self.shape.interior();
        let cell = interior[self.rng.gen_range(0..interior.len())];
        for component in &mut self.velocity {
            let impulse = self.rng.gen_range(-magnitude..=magnitude);
            component.increase_previous_index(cell, impulse);
        }
    }

    fn velocity_step(&mut self, dt: f32) {
        for (axis, component) in self.velocity.iter_mut().enumerate() {
            solver::diffuse(&self.shape, Boundary::Velocity(axis), component, self.viscosity, dt);
        }
        solver::project(&self.shape, &mut self.velocity, &mut self.pressure, &mut self.divergence);

        for component in &mut self.velocity {
            component.swap();
        }
        let flow: Vec<&[f32]> = self.velocity.iter().map(|c| c.previous()).collect();
        solver::backtrace(&self.shape, &flow, dt, &mut self.origins);

        for (axis, component) in self.velocity.iter_mut().enumerate() {
            solver::advect(&self.shape, Boundary::Velocity(axis), component, &self.origins, false);
        }
        solver::project(&self.shape, &mut self.velocity, &mut self.pressure, &mut self.divergence);
    }

    fn density_step(&mut self, dt: f32) {
        solver::diffuse(&self.shape, Boundary::Scalar, &mut self.density, self.diffusion_rate, dt);

        self.density.swap();
        let flow: Vec<&[f32]> = self.velocity.iter().map(|c| c.current()).collect();
        solver::backtrace(&self.shape, &flow, dt, &mut self.origins);

        solver::advect(&self.shape, Boundary::Scalar, &mut self.density, &self.origins, true);
    }

    pub fn density_at(&self, position: IVec3) -> Option<f32> {
        self.shape
            .domain_index(position)
            .map(|index| self.density.get_index(index))
    }

    /// Current density, or [`DENSITY_OUT_OF_RANGE`] outside the grid.
    pub fn get_density(&self, x: i32, y: i32, z: i32) -> f32 {
        self.density_at(IVec3::new(x, y, z))
            .unwrap_or(DENSITY_OUT_OF_RANGE)
    }

    pub fn velocity_at(&self, position: IVec3) -> Option<Vec3> {
        let index = self.shape.domain_index(position)?;
        let mut velocity = Vec3::ZERO;
        for (axis, component) in self.velocity.iter().enumerate() {
            velocity[axis] = component.get_index(index);
        }
        Some(velocity)
    }

    /// Current velocity, or zero outside the grid.
    pub fn get_velocity(&self, position: IVec3) -> Vec3 {
        self.velocity_at(position).unwrap_or(Vec3::ZERO)
    }

    pub fn get_voxel(&self, position: IVec3) -> Option<Voxel> {
        Some(Voxel {
            position,
            density: self.density_at(position)?,
            velocity: self.velocity_at(position)?,
        })
    }

    pub fn density_field(&self) -> &VoxelField<f32> {
        &self.density
    }

    pub fn velocity_field(&self, axis: usize) -> Option<&VoxelField<f32>> {
        self.velocity.get(axis)
    }

    /// Whole current density buffer, ghost layer included.
    pub fn density(&self) -> &[f32] {
        self.density.current()
    }

    /// Whole current buffer of one velocity component; empty for an axis the
    /// grid does not simulate.
    pub fn velocity(&self, axis: usize) -> &[f32] {
        match self.velocity.get(axis) {
            Some(component) => component.current(),
            None => &[],
        }
    }

    /// Interior density packed x-fastest into an `N^D` array, ready for
    /// texture upload.
    pub fn density_texture(&mut self) -> &[f32] {
        let current = self.density.current();
        for (texel, &i) in self.texture.iter_mut().zip(self.shape.interior()) {
            *texel = current[i];
        }
        &self.texture
    }

    /// Text table of the density in one z-slice, for debugging.
    pub fn describe_slice(&self, z: i32) -> String {
        let side = self.shape.side() as i32;
        let mut out = String::new();
        for y in (0..side).rev() {
            for x in 0..side {
                match self.density_at(IVec3::new(x, y, z)) {
                    Some(density) => {
                        let _ = write!(out, "{density:9.4}");
                    }
                    None => out.push_str("        -"),
                }
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(side: usize, dimensions: Dimensions) -> FluidGrid {
        let mut grid = FluidGrid::new();
        grid.configure(side, dimensions).unwrap();
        grid
    }

    #[test]
    fn unconfigured_grid_is_inert() {
        let mut grid = FluidGrid::new();
        assert!(!grid.is_configured());
        grid.add_density_source(IVec3::ZERO, 1.0);
        grid.step(0.1);
        assert_eq!(grid.pending_sources(), 0);
        assert_eq!(grid.get_density(0, 0, 0), DENSITY_OUT_OF_RANGE);
        assert_eq!(grid.frame(), 0);
    }

    #[test]
    fn sources_are_consumed_by_step() {
        let mut grid = grid(6, Dimensions::Two);
        grid.add_density_source(IVec3::new(2, 2, 0), 5.0);
        grid.add_velocity_source(IVec3::new(2, 2, 0), Vec3::new(1.0, 0.0, 0.0));
        grid.add_density_source(IVec3::new(6, 0, 0), 5.0);
        assert_eq!(grid.pending_sources(), 2);

        grid.step(0.01);
        assert_eq!(grid.pending_sources(), 0);
        assert_eq!(grid.frame(), 1);
        assert!(grid.get_density(2, 2, 0) > 0.0);
    }

    #[test]
    fn additive_sources_accumulate() {
        let mut grid = grid(4, Dimensions::Two);
        grid.set_diffusion_rate(0.0);
        grid.add_density_source(IVec3::new(1, 1, 0), 2.0);
        grid.add_density_source(IVec3::new(1, 1, 0), 3.0);
        grid.step(0.01);
        assert_eq!(grid.get_density(1, 1, 0), 5.0);
    }

    #[test]
    fn raise_only_sources_stop_at_the_source_value() {
        let mut grid = grid(4, Dimensions::Two);
        grid.set_diffusion_rate(0.0);
        grid.set_density_merge(DensityMerge::RaiseOnly);

        for _ in 0..3 {
            grid.add_density_source(IVec3::new(1, 1, 0), 4.0);
            grid.step(0.01);
        }
        assert_eq!(grid.get_density(1, 1, 0), 4.0);

        // a partial residual is topped up to the source value, a larger one is kept
        grid.add_density_source(IVec3::new(2, 2, 0), 1.5);
        grid.step(0.01);
        grid.add_density_source(IVec3::new(2, 2, 0), 4.0);
        grid.add_density_source(IVec3::new(1, 1, 0), 3.0);
        grid.step(0.01);
        assert_eq!(grid.get_density(2, 2, 0), 4.0);
        assert_eq!(grid.get_density(1, 1, 0), 4.0);
    }

    #[test]
    fn reconfigure_discards_state() {
        let mut grid = grid(4, Dimensions::Two);
        grid.add_density_source(IVec3::new(1, 1, 0), 2.0);
        grid.step(0.01);
        grid.add_density_source(IVec3::new(1, 1, 0), 2.0);

        grid.configure(3, Dimensions::Three).unwrap();
        assert_eq!(grid.pending_sources(), 0);
        assert_eq!(grid.frame(), 0);
        assert!(grid.density().iter().all(|&d| d == 0.0));
        assert_eq!(grid.velocity(2).len(), 125);
    }

    #[test]
    fn rejected_configuration_keeps_old_grid() {
        let mut grid = grid(4, Dimensions::Two);
        assert!(grid.configure(0, Dimensions::Two).is_err());
        assert_eq!(grid.side_length(), 4);
    }

    #[test]
    fn turbulence_is_reproducible_with_a_seed() {
        let config = FluidConfig {
            turbulence_magnitude: 5,
            seed: Some(42),
            ..FluidConfig::new(8, Dimensions::Two)
        };
        let mut a = FluidGrid::from_config(&config).unwrap();
        let mut b = FluidGrid::from_config(&config).unwrap();
        for _ in 0..3 {
            a.step(0.01);
            b.step(0.01);
        }
        assert_eq!(a.velocity(0), b.velocity(0));
        assert!(a.velocity(0).iter().any(|&v| v != 0.0));
    }

    #[test]
    fn texture_strips_ghost_layer() {
        let mut grid = grid(3, Dimensions::Two);
        grid.set_diffusion_rate(0.0);
        grid.add_density_source(IVec3::new(2, 1, 0), 7.0);
        grid.step(0.01);

        let texture = grid.density_texture();
        assert_eq!(texture.len(), 9);
        assert_eq!(texture[2 + 3], 7.0);
        assert_eq!(texture.iter().sum::<f32>(), 7.0);
    }

    #[test]
    fn voxel_snapshot() {
        let mut grid = grid(4, Dimensions::Three);
        grid.set_diffusion_rate(0.0);
        grid.add_density_source(IVec3::new(1, 2, 3), 1.5);
        grid.step(0.01);

        let voxel = grid.get_voxel(IVec3::new(1, 2, 3)).unwrap();
        assert_eq!(voxel.position, IVec3::new(1, 2, 3));
        assert_eq!(voxel.density, 1.5);
        assert_eq!(voxel.velocity, Vec3::ZERO);
        assert!(grid.get_voxel(IVec3::new(4, 0, 0)).is_none());
    }

    #[test]
    fn describe_slice_lists_every_row() {
        let grid = grid(3, Dimensions::Two);
        let table = grid.describe_slice(0);
        assert_eq!(table.lines().count(), 3);
        assert!(grid.describe_slice(1).contains('-'));
    }
}
