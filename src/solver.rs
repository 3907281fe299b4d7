//! Stable Fluids building blocks: boundary enforcement, Gauss-Seidel
//! relaxation, implicit diffusion, semi-Lagrangian advection and the
//! pressure projection.
//!
//! Every routine works on whole `(N+2)^D` buffers laid out by a
//! [`GridShape`] and touches only interior cells, then refreshes the ghost
//! layer with [`set_boundary`].

use glam::Vec3;

use crate::field::VoxelField;
use crate::shape::GridShape;

/// Relaxation sweeps per linear solve.
pub const ITERATIONS: usize = 20;

/// How the ghost layer mirrors the interior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Density, pressure and other scalars: copy the interior value.
    Scalar,
    /// Velocity component along the given axis: negated on the faces normal
    /// to that axis, copied on the others.
    Velocity(usize),
}

impl Boundary {
    fn reflects(self, face_axis: usize) -> bool {
        matches!(self, Boundary::Velocity(axis) if axis == face_axis)
    }
}

pub fn set_boundary(shape: &GridShape, mode: Boundary, values: &mut [f32]) {
    for face in shape.faces() {
        let value = values[face.interior];
        values[face.index] = if mode.reflects(face.axis) { -value } else { value };
    }

    for seam in shape.seams() {
        let sum: f32 = seam.neighbours[..seam.count].iter().map(|&i| values[i]).sum();
        values[seam.index] = sum / seam.count as f32;
    }
}

/// Gauss-Seidel solve of `c * x - a * sum(neighbours(x)) = x0` over the
/// interior, sweeping in row-major order and reapplying the boundary after
/// every sweep.
pub fn relax(
    shape: &GridShape,
    mode: Boundary,
    x: &mut [f32],
    x0: &[f32],
    a: f32,
    c: f32,
    iterations: usize,
) {
    let axes = shape.axes();
    for _ in 0..iterations {
        for &i in shape.interior() {
            let mut neighbours = 0.0;
            for axis in 0..axes {
                let s = shape.stride(axis);
                neighbours += x[i - s] + x[i + s];
            }
            x[i] = (x0[i] + a * neighbours) / c;
        }
        set_boundary(shape, mode, x);
    }
}

/// Implicit diffusion of `field.previous` into `field.current`.
pub fn diffuse(shape: &GridShape, mode: Boundary, field: &mut VoxelField<f32>, rate: f32, dt: f32) {
    let k = dt * rate * shape.resolution_scale();
    let c = 1.0 + 2.0 * shape.axes() as f32 * k;

    let (current, previous) = field.buffers_mut();
    relax(shape, mode, current, previous, k, c, ITERATIONS);
}

/// Backtraced departure point of every interior cell, in interior order.
///
/// `velocity` holds one buffer per axis. Origins are clamped to
/// `[0.5, N + 0.5]` on every simulated axis so the interpolation stencil
/// stays inside the buffer.
pub fn backtrace(shape: &GridShape, velocity: &[&[f32]], dt: f32, origins: &mut Vec<Vec3>) {
    origins.clear();
    origins.reserve(shape.interior().len());

    let dt_scaled = dt * shape.resolution_scale();
    let high = shape.side() as f32 + 0.5;

    for &i in shape.interior() {
        let [x, y, z] = shape.coords(i);
        let mut origin = Vec3::new(x as f32, y as f32, z as f32);
        for (axis, component) in velocity.iter().enumerate() {
            origin[axis] = (origin[axis] - dt_scaled * component[i]).clamp(0.5, high);
        }
        origins.push(origin);
    }
}

/// Semi-Lagrangian transport: each interior cell of `field.current` takes the
/// interpolated value of `field.previous` at its backtraced origin.
pub fn advect(
    shape: &GridShape,
    mode: Boundary,
    field: &mut VoxelField<f32>,
    origins: &[Vec3],
    non_negative: bool,
) {
    let (current, previous) = field.buffers_mut();
    for (&i, &origin) in shape.interior().iter().zip(origins) {
        let value = sample(shape, previous, origin);
        current[i] = if non_negative { value.max(0.0) } else { value };
    }
    set_boundary(shape, mode, current);
}

/// Multilinear interpolation at a fractional buffer coordinate.
pub fn sample(shape: &GridShape, values: &[f32], at: Vec3) -> f32 {
    let axes = shape.axes();
    let base = at.floor();
    let frac = at - base;

    let mut origin = 0;
    for axis in 0..axes {
        origin += base[axis] as usize * shape.stride(axis);
    }

    let mut value = 0.0;
    for corner in 0..(1usize << axes) {
        let mut weight = 1.0;
        let mut index = origin;
        for axis in 0..axes {
            if corner & (1 << axis) != 0 {
                weight *= frac[axis];
                index += shape.stride(axis);
            } else {
                weight *= 1.0 - frac[axis];
            }
        }
        value += weight * values[index];
    }
    value
}

/// Removes the divergent part of the velocity held in the current buffers.
///
/// `pressure` and `divergence` are scratch buffers of the shape's length.
pub fn project(
    shape: &GridShape,
    velocity: &mut [VoxelField<f32>],
    pressure: &mut [f32],
    divergence: &mut [f32],
) {
    let n = shape.side() as f32;
    let axes = shape.axes();

    for &i in shape.interior() {
        let mut sum = 0.0;
        for (axis, component) in velocity.iter().enumerate() {
            let s = shape.stride(axis);
            let u = component.current();
            sum += u[i + s] - u[i - s];
        }
        divergence[i] = -0.5 * sum / n;
        pressure[i] = 0.0;
    }
    set_boundary(shape, Boundary::Scalar, divergence);
    set_boundary(shape, Boundary::Scalar, pressure);

    relax(
        shape,
        Boundary::Scalar,
        pressure,
        divergence,
        1.0,
        2.0 * axes as f32,
        ITERATIONS,
    );

    for (axis, component) in velocity.iter_mut().enumerate() {
        let s = shape.stride(axis);
        let u = component.current_mut();
        for &i in shape.interior() {
            u[i] -= 0.5 * n * (pressure[i + s] - pressure[i - s]);
        }
        set_boundary(shape, Boundary::Velocity(axis), u);
    }
}

/// Sum over interior cells of the absolute central-difference divergence.
pub fn total_divergence(shape: &GridShape, velocity: &[&[f32]]) -> f32 {
    shape
        .interior()
        .iter()
        .map(|&i| {
            velocity
                .iter()
                .enumerate()
                .map(|(axis, u)| {
                    let s = shape.stride(axis);
                    0.5 * (u[i + s] - u[i - s])
                })
                .sum::<f32>()
                .abs()
        })
        .sum()
}
