use glam::IVec3;
use image::{ImageBuffer, Rgb, RgbImage};

use crate::export::FluidData;
use crate::shape::Dimensions;

/// Renders one z-slice of the interior domain into an RGB image, scaling the
/// grid up or down to the image size.
pub struct Renderer {
    width: u32,
    height: u32,
}

impl Renderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Buffer index of the cell that lands under pixel `(x, y)` for domain
    /// slice `slice`; y grows upward in the domain and downward in the image.
    fn cell_under(&self, simulation: &impl FluidData, x: u32, y: u32, slice: usize) -> Option<usize> {
        let shape = simulation.shape();
        let side = shape.side();
        if side == 0 {
            return None;
        }

        let gx = (x as usize * side / self.width as usize).min(side - 1);
        let gy = side - 1 - (y as usize * side / self.height as usize).min(side - 1);
        let gz = match shape.dimensions() {
            Dimensions::Two => 0,
            Dimensions::Three => slice.min(side - 1),
        };
        shape.domain_index(IVec3::new(gx as i32, gy as i32, gz as i32))
    }

    pub fn render_density(&self, simulation: &impl FluidData, slice: usize) -> RgbImage {
        let mut img = ImageBuffer::new(self.width, self.height);
        let density = simulation.density();

        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = match self.cell_under(simulation, x, y, slice) {
                Some(index) => {
                    // Blue for low density, white for high density
                    let intensity = (density[index].clamp(0.0, 1.0) * 255.0) as u8;
                    Rgb([intensity, intensity, 255])
                }
                None => Rgb([0, 0, 0]),
            };
        }

        img
    }

    pub fn render_velocity(&self, simulation: &impl FluidData, slice: usize) -> RgbImage {
        let mut img = ImageBuffer::new(self.width, self.height);
        let axes = simulation.shape().axes();

        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = match self.cell_under(simulation, x, y, slice) {
                Some(index) => {
                    // red for x, green for y, blue for z (mid-grey in 2D)
                    let channel = |axis: usize| {
                        if axis < axes {
                            (simulation.velocity(axis)[index].abs() * 255.0).min(255.0) as u8
                        } else {
                            128
                        }
                    };
                    Rgb([channel(0), channel(1), channel(2)])
                }
                None => Rgb([0, 0, 0]),
            };
        }

        img
    }
}
