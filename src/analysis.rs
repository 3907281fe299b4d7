use std::collections::HashMap;
use std::fmt;

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

use crate::export::FluidData;
use crate::solver;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluidMetrics {
    pub total_mass: f32,
    pub max_density: f32,
    pub avg_density: f32,
    pub total_kinetic_energy: f32,
    pub max_velocity: f32,
    pub avg_velocity: f32,
    pub density_entropy: f32,
    /// Mean absolute central-difference divergence per interior cell.
    pub velocity_divergence: f32,
    pub frame: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    mass: f32,
    max_density: f32,
    kinetic_energy: f32,
    max_speed: f32,
    speed: f32,
}

impl Totals {
    fn merge(self, other: Self) -> Self {
        Self {
            mass: self.mass + other.mass,
            max_density: self.max_density.max(other.max_density),
            kinetic_energy: self.kinetic_energy + other.kinetic_energy,
            max_speed: self.max_speed.max(other.max_speed),
            speed: self.speed + other.speed,
        }
    }
}

impl FluidMetrics {
    pub fn analyze(simulation: &impl FluidData, frame: u64) -> Self {
        let shape = simulation.shape();
        let density = simulation.density();
        let velocity: Vec<&[f32]> = (0..shape.axes()).map(|axis| simulation.velocity(axis)).collect();
        let interior = shape.interior();

        let cell = |&i: &usize| {
            let d = density[i];
            let speed_sq: f32 = velocity.iter().map(|u| u[i] * u[i]).sum();
            let speed = speed_sq.sqrt();
            Totals {
                mass: d,
                max_density: d,
                kinetic_energy: 0.5 * d * speed_sq,
                max_speed: speed,
                speed,
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        let totals = interior
            .par_iter()
            .map(cell)
            .reduce(Totals::default, Totals::merge);

        #[cfg(target_arch = "wasm32")]
        let totals = interior
            .iter()
            .map(cell)
            .fold(Totals::default(), Totals::merge);

        let size = interior.len().max(1) as f32;

        // Quantize density for entropy calculation
        let mut histogram: HashMap<i64, usize> = HashMap::new();
        for &i in interior {
            *histogram.entry((density[i] * 10.0).floor() as i64).or_insert(0) += 1;
        }
        let density_entropy: f32 = histogram
            .values()
            .map(|&count| {
                let p = count as f32 / size;
                -p * p.log2()
            })
            .sum();

        Self {
            total_mass: totals.mass,
            max_density: totals.max_density,
            avg_density: totals.mass / size,
            total_kinetic_energy: totals.kinetic_energy,
            max_velocity: totals.max_speed,
            avg_velocity: totals.speed / size,
            density_entropy,
            velocity_divergence: solver::total_divergence(shape, &velocity) / size,
            frame,
        }
    }

    pub fn is_finite(&self) -> bool {
        [
            self.total_mass,
            self.max_density,
            self.total_kinetic_energy,
            self.max_velocity,
            self.velocity_divergence,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

impl fmt::Display for FluidMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Frame {} Metrics:", self.frame)?;
        writeln!(f, "  Total Mass: {:.6}", self.total_mass)?;
        writeln!(f, "  Max Density: {:.6}", self.max_density)?;
        writeln!(f, "  Avg Density: {:.6}", self.avg_density)?;
        writeln!(f, "  Kinetic Energy: {:.6}", self.total_kinetic_energy)?;
        writeln!(f, "  Max Velocity: {:.6}", self.max_velocity)?;
        writeln!(f, "  Avg Velocity: {:.6}", self.avg_velocity)?;
        writeln!(f, "  Density Entropy: {:.6}", self.density_entropy)?;
        write!(f, "  Velocity Divergence: {:.6}", self.velocity_divergence)
    }
}

#[derive(Debug, Default)]
pub struct AnalysisRecorder {
    pub metrics_history: Vec<FluidMetrics>,
}

impl AnalysisRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&mut self, simulation: &impl FluidData, frame: u64) -> &FluidMetrics {
        self.metrics_history.push(FluidMetrics::analyze(simulation, frame));
        &self.metrics_history[self.metrics_history.len() - 1]
    }

    /// Relative change in total mass between the first and last recorded
    /// frames, in percent.
    pub fn mass_change_percent(&self) -> Option<f32> {
        let (first, last) = (self.metrics_history.first()?, self.metrics_history.last()?);
        if self.metrics_history.len() < 2 || first.total_mass == 0.0 {
            return None;
        }
        Some((last.total_mass - first.total_mass) / first.total_mass * 100.0)
    }

    pub fn log_trends(&self) {
        let (Some(first), Some(last)) = (self.metrics_history.first(), self.metrics_history.last())
        else {
            return;
        };
        if self.metrics_history.len() < 2 {
            return;
        }

        log::info!("=== TREND ANALYSIS ===");
        log::info!(
            "Mass change: {:.6} -> {:.6} ({:+.3}%)",
            first.total_mass,
            last.total_mass,
            self.mass_change_percent().unwrap_or(0.0)
        );
        log::info!(
            "Kinetic Energy change: {:.6} -> {:.6} ({:+.3}%)",
            first.total_kinetic_energy,
            last.total_kinetic_energy,
            (last.total_kinetic_energy - first.total_kinetic_energy)
                / first.total_kinetic_energy.max(0.001)
                * 100.0
        );
        log::info!(
            "Divergence change: {:.6} -> {:.6}",
            first.velocity_divergence,
            last.velocity_divergence
        );
    }
}
