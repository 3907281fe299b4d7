use std::path::Path;

use cfdgrid::config::DensitySource;
use cfdgrid::{
    AnalysisRecorder, DensityMerge, Dimensions, FluidConfig, FluidGrid, FluidMetrics, GridError,
    ImageExporter, Scenario,
};
use glam::IVec3;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if let Some(path) = args.get(1) {
        let scenario = Scenario::load(Path::new(path))?;
        let grid = run_scenario(&scenario)?;
        println!("{}", FluidMetrics::analyze(&grid, grid.frame()));
    } else {
        run_source_comparison()?;
    }

    Ok(())
}

fn run_scenario(scenario: &Scenario) -> Result<FluidGrid, GridError> {
    let mut grid = FluidGrid::from_config(&scenario.grid)?;
    let mut recorder = AnalysisRecorder::new();

    let exporter = match &scenario.export {
        Some(options) => {
            std::fs::create_dir_all(&options.directory)?;
            Some((ImageExporter::new(options.image_size, options.image_size), options))
        }
        None => None,
    };

    log::info!(
        "running {} frames of a {}D grid with side {}",
        scenario.frames,
        grid.dimensions().count(),
        grid.side_length()
    );

    recorder.record_frame(&grid, 0);
    for frame in 1..=scenario.frames as u64 {
        for source in &scenario.density_sources {
            grid.add_density_source(source.position, source.amount);
        }
        for source in &scenario.velocity_sources {
            grid.add_velocity_source(source.position, source.velocity);
        }

        grid.step(scenario.dt);
        let metrics = recorder.record_frame(&grid, frame);

        if frame % 10 == 0 {
            log::info!("{metrics}");
        }
        if !metrics.is_finite() {
            log::warn!("simulation diverged at frame {frame}");
        }

        if let Some((exporter, options)) = &exporter {
            if frame % options.every.max(1) as u64 == 0 {
                let slice = options.slice.unwrap_or(grid.side_length() / 2);
                exporter.export_frame(&grid, slice, &options.directory, "frame", frame)?;
            }
        }
    }

    recorder.log_trends();
    Ok(grid)
}

/// Raises one corner cell to a density of 10 every frame on a 2D and a 3D
/// grid of the same side and reports where each settles.
fn run_source_comparison() -> Result<(), GridError> {
    let mut results = Vec::new();

    for dimensions in [Dimensions::Two, Dimensions::Three] {
        let scenario = Scenario {
            grid: FluidConfig {
                diffusion_rate: 0.5,
                density_merge: DensityMerge::RaiseOnly,
                ..FluidConfig::new(5, dimensions)
            },
            frames: 50,
            dt: 0.016,
            density_sources: vec![DensitySource {
                position: IVec3::ZERO,
                amount: 10.0,
            }],
            velocity_sources: Vec::new(),
            export: None,
        };

        let grid = run_scenario(&scenario)?;
        println!("{}D density, slice z=0:", dimensions.count());
        println!("{}", grid.describe_slice(0));
        results.push((dimensions.count(), grid.get_density(0, 0, 0)));
    }

    for (dimensions, density) in results {
        println!("{dimensions}D density at source after 50 frames: {density:.4}");
    }
    Ok(())
}
