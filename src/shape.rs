use glam::IVec3;
use serde::{Deserialize, Serialize};

use crate::error::GridError;

/// Number of spatial axes simulated by a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Dimensions {
    Two,
    Three,
}

impl Dimensions {
    pub fn count(self) -> usize {
        match self {
            Dimensions::Two => 2,
            Dimensions::Three => 3,
        }
    }
}

impl TryFrom<u8> for Dimensions {
    type Error = GridError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Dimensions::Two),
            3 => Ok(Dimensions::Three),
            other => Err(GridError::InvalidDimensions(other)),
        }
    }
}

impl From<Dimensions> for u8 {
    fn from(dimensions: Dimensions) -> Self {
        dimensions.count() as u8
    }
}

/// A ghost cell on exactly one boundary face. It mirrors `interior`, the cell
/// one step inward along `axis`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryFace {
    pub index: usize,
    pub interior: usize,
    pub axis: usize,
}

/// A ghost cell shared by two faces (an edge) or three faces (a corner).
/// Its value is the mean of the `count` neighbours one step inward along each
/// ghost axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundarySeam {
    pub index: usize,
    pub neighbours: [usize; 3],
    pub count: usize,
}

/// Largest buffer, ghost layer included, a grid may allocate per field.
pub const MAX_CELLS: usize = 1 << 24;

/// Geometry of a `(N+2)^D` buffer: index mapping, interior cells and the
/// ghost layer.
///
/// Index mapping is row-major with x fastest:
/// `x + (N+2) * y + (N+2)^2 * z` (z term absent in 2D).
#[derive(Debug, Clone)]
pub struct GridShape {
    side: usize,
    dimensions: Dimensions,
    extent: usize,
    strides: [usize; 3],
    len: usize,
    interior: Vec<usize>,
    faces: Vec<BoundaryFace>,
    // Edges precede corners so corners average already-updated edges.
    seams: Vec<BoundarySeam>,
}

impl GridShape {
    /// Buffer length `(N+2)^D` of a grid, rejecting empty grids and grids
    /// above [`MAX_CELLS`] without allocating anything.
    pub fn buffer_len(side: usize, dimensions: Dimensions) -> Result<usize, GridError> {
        if side == 0 {
            return Err(GridError::InvalidSideLength(side));
        }
        side
            .checked_add(2)
            .and_then(|extent| extent.checked_pow(dimensions.count() as u32))
            .filter(|&len| len <= MAX_CELLS)
            .ok_or(GridError::GridTooLarge {
                side,
                dimensions: dimensions.count() as u8,
            })
    }

    pub fn new(side: usize, dimensions: Dimensions) -> Result<Self, GridError> {
        let len = Self::buffer_len(side, dimensions)?;
        let power = dimensions.count() as u32;
        let extent = side + 2;
        let strides = [1, extent, extent * extent];
        let depth = if dimensions == Dimensions::Three { extent } else { 1 };

        let mut interior = Vec::with_capacity(side.pow(power));
        let mut faces = Vec::new();
        let mut seams = Vec::new();

        for z in 0..depth {
            for y in 0..extent {
                for x in 0..extent {
                    let coords = [x, y, z];
                    let index = x + strides[1] * y + strides[2] * z;

                    let mut inward = [0usize; 3];
                    let mut ghost_axes = [0usize; 3];
                    let mut count = 0;
                    for axis in 0..dimensions.count() {
                        let c = coords[axis];
                        if c == 0 {
                            inward[count] = index + strides[axis];
                        } else if c == extent - 1 {
                            inward[count] = index - strides[axis];
                        } else {
                            continue;
                        }
                        ghost_axes[count] = axis;
                        count += 1;
                    }

                    match count {
                        0 => interior.push(index),
                        1 => faces.push(BoundaryFace {
                            index,
                            interior: inward[0],
                            axis: ghost_axes[0],
                        }),
                        _ => seams.push(BoundarySeam {
                            index,
                            neighbours: inward,
                            count,
                        }),
                    }
                }
            }
        }

        seams.sort_by_key(|seam| seam.count);

        Ok(Self {
            side,
            dimensions,
            extent,
            strides,
            len,
            interior,
            faces,
            seams,
        })
    }

    /// A shape with no cells. Every coordinate is out of range.
    pub fn empty() -> Self {
        Self {
            side: 0,
            dimensions: Dimensions::Two,
            extent: 0,
            strides: [1, 0, 0],
            len: 0,
            interior: Vec::new(),
            faces: Vec::new(),
            seams: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn axes(&self) -> usize {
        self.dimensions.count()
    }

    /// Cells per axis including the ghost layer (`N+2`).
    pub fn extent(&self) -> usize {
        self.extent
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn stride(&self, axis: usize) -> usize {
        self.strides[axis]
    }

    /// `N^D`, the factor used to make rates resolution independent.
    pub fn resolution_scale(&self) -> f32 {
        (self.side as f32).powi(self.axes() as i32)
    }

    /// Interior cell indices in row-major sweep order.
    pub fn interior(&self) -> &[usize] {
        &self.interior
    }

    pub fn faces(&self) -> &[BoundaryFace] {
        &self.faces
    }

    pub fn seams(&self) -> &[BoundarySeam] {
        &self.seams
    }

    /// Buffer index of a buffer coordinate, or `None` when any axis lies
    /// outside `[0, N+2)`. In 2D only `z == 0` is valid.
    pub fn index(&self, position: IVec3) -> Option<usize> {
        buffer_index(self.extent, self.dimensions, position)
    }

    /// Buffer index of a domain coordinate in `[0, N)`; the ghost layer is not
    /// addressable this way.
    pub fn domain_index(&self, position: IVec3) -> Option<usize> {
        let side = self.side as i64;
        let in_domain = |c: i32| (0..side).contains(&(c as i64));

        match self.dimensions {
            Dimensions::Two if position.z != 0 => return None,
            Dimensions::Three if !in_domain(position.z) => return None,
            _ => {}
        }
        if !(in_domain(position.x) && in_domain(position.y)) {
            return None;
        }

        let z = if self.dimensions == Dimensions::Three { position.z + 1 } else { 0 };
        self.index(IVec3::new(position.x + 1, position.y + 1, z))
    }

    /// Buffer coordinates of a buffer index.
    pub fn coords(&self, index: usize) -> [usize; 3] {
        let x = index % self.extent;
        let y = (index / self.extent) % self.extent;
        let z = index / (self.extent * self.extent);
        [x, y, z]
    }

    /// Domain coordinates of an interior buffer index.
    pub fn domain_coords(&self, index: usize) -> IVec3 {
        let [x, y, z] = self.coords(index);
        let z = match self.dimensions {
            Dimensions::Two => 0,
            Dimensions::Three => z as i32 - 1,
        };
        IVec3::new(x as i32 - 1, y as i32 - 1, z)
    }
}

/// Row-major buffer index shared by [`GridShape`] and the voxel fields.
pub(crate) fn buffer_index(extent: usize, dimensions: Dimensions, position: IVec3) -> Option<usize> {
    let in_range = |c: i32| c >= 0 && (c as usize) < extent;

    let z_ok = match dimensions {
        Dimensions::Two => position.z == 0,
        Dimensions::Three => in_range(position.z),
    };
    if !(in_range(position.x) && in_range(position.y) && z_ok) {
        return None;
    }

    let (x, y, z) = (position.x as usize, position.y as usize, position.z as usize);
    let index = x + extent * y + extent * extent * z;
    let len = extent.pow(dimensions.count() as u32);
    (index < len).then_some(index)
}

impl Default for GridShape {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_counts_2d() {
        let shape = GridShape::new(4, Dimensions::Two).unwrap();
        assert_eq!(shape.len(), 36);
        assert_eq!(shape.interior().len(), 16);
        assert_eq!(shape.faces().len(), 16);
        assert_eq!(shape.seams().len(), 4);
    }

    #[test]
    fn cell_counts_3d() {
        let shape = GridShape::new(3, Dimensions::Three).unwrap();
        assert_eq!(shape.len(), 125);
        assert_eq!(shape.interior().len(), 27);
        // 6 faces of 3x3, 12 edges of 3, 8 corners
        assert_eq!(shape.faces().len(), 54);
        assert_eq!(shape.seams().len(), 36 + 8);
        assert!(shape.seams()[..36].iter().all(|s| s.count == 2));
        assert!(shape.seams()[36..].iter().all(|s| s.count == 3));
    }

    #[test]
    fn row_major_index() {
        let shape = GridShape::new(3, Dimensions::Three).unwrap();
        assert_eq!(shape.index(IVec3::new(1, 2, 3)), Some(1 + 5 * 2 + 25 * 3));
        assert_eq!(shape.coords(1 + 5 * 2 + 25 * 3), [1, 2, 3]);
        assert_eq!(shape.index(IVec3::new(5, 0, 0)), None);
        assert_eq!(shape.index(IVec3::new(-1, 0, 0)), None);
    }

    #[test]
    fn domain_index_skips_ghost_layer() {
        let shape = GridShape::new(5, Dimensions::Two).unwrap();
        assert_eq!(shape.domain_index(IVec3::ZERO), shape.index(IVec3::new(1, 1, 0)));
        assert_eq!(shape.domain_index(IVec3::new(4, 4, 0)), shape.index(IVec3::new(5, 5, 0)));
        assert_eq!(shape.domain_index(IVec3::new(5, 0, 0)), None);
        assert_eq!(shape.domain_index(IVec3::new(0, 0, 1)), None);
        assert_eq!(shape.domain_coords(shape.index(IVec3::new(3, 2, 0)).unwrap()), IVec3::new(2, 1, 0));
    }

    #[test]
    fn rejects_bad_configuration() {
        assert!(matches!(
            GridShape::new(0, Dimensions::Two),
            Err(GridError::InvalidSideLength(0))
        ));
        assert!(matches!(
            Dimensions::try_from(4),
            Err(GridError::InvalidDimensions(4))
        ));
    }

    #[test]
    fn rejects_oversized_grids() {
        for dimensions in [Dimensions::Two, Dimensions::Three] {
            assert!(matches!(
                GridShape::new(usize::MAX, dimensions),
                Err(GridError::GridTooLarge { side: usize::MAX, .. })
            ));
        }
        assert!(matches!(
            GridShape::new(1 << 22, Dimensions::Three),
            Err(GridError::GridTooLarge { dimensions: 3, .. })
        ));
        // 256^3 cells with the ghost layer is exactly the limit
        assert!(GridShape::buffer_len(255, Dimensions::Three).is_err());
        assert_eq!(GridShape::buffer_len(254, Dimensions::Three).unwrap(), MAX_CELLS);
        assert_eq!(GridShape::buffer_len(4094, Dimensions::Two).unwrap(), MAX_CELLS);
    }
}
