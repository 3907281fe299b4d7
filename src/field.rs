use std::ops::{Add, Sub};

use glam::IVec3;

use crate::shape::{Dimensions, GridShape, buffer_index};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Coordinate(IVec3),
    Index(usize),
}

/// An access that fell outside a field's buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundsViolation {
    pub access: Access,
    pub location: Location,
}

/// Observer for out-of-range accesses. Reads still return the default value
/// and writes are still dropped.
pub type BoundsHook = fn(&BoundsViolation);

/// A double-buffered quantity stored on every cell of a grid, ghost layer
/// included.
///
/// All accessors are bounds checked: an out-of-range read yields
/// `T::default()` and an out-of-range write is ignored.
#[derive(Debug, Clone)]
pub struct VoxelField<T> {
    current: Vec<T>,
    previous: Vec<T>,
    extent: usize,
    dimensions: Dimensions,
    on_violation: Option<BoundsHook>,
}

impl<T: Copy + Default> VoxelField<T> {
    pub fn new(shape: &GridShape) -> Self {
        Self {
            current: vec![T::default(); shape.len()],
            previous: vec![T::default(); shape.len()],
            extent: shape.extent(),
            dimensions: shape.dimensions(),
            on_violation: None,
        }
    }

    pub fn with_violation_hook(mut self, hook: BoundsHook) -> Self {
        self.on_violation = Some(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn get(&self, position: IVec3) -> T {
        match self.locate(position, Access::Read) {
            Some(index) => self.current[index],
            None => T::default(),
        }
    }

    pub fn set(&mut self, position: IVec3, value: T) {
        if let Some(index) = self.locate(position, Access::Write) {
            self.current[index] = value;
        }
    }

    pub fn get_index(&self, index: usize) -> T {
        match self.current.get(index) {
            Some(&value) => value,
            None => {
                self.report(Access::Read, Location::Index(index));
                T::default()
            }
        }
    }

    pub fn set_index(&mut self, index: usize, value: T) {
        match self.current.get_mut(index) {
            Some(slot) => *slot = value,
            None => self.report(Access::Write, Location::Index(index)),
        }
    }

    pub fn get_previous(&self, position: IVec3) -> T {
        match self.locate(position, Access::Read) {
            Some(index) => self.previous[index],
            None => T::default(),
        }
    }

    pub fn set_previous(&mut self, position: IVec3, value: T) {
        if let Some(index) = self.locate(position, Access::Write) {
            self.previous[index] = value;
        }
    }

    pub fn get_previous_index(&self, index: usize) -> T {
        match self.previous.get(index) {
            Some(&value) => value,
            None => {
                self.report(Access::Read, Location::Index(index));
                T::default()
            }
        }
    }

    pub fn set_previous_index(&mut self, index: usize, value: T) {
        match self.previous.get_mut(index) {
            Some(slot) => *slot = value,
            None => self.report(Access::Write, Location::Index(index)),
        }
    }

    /// Exchanges the current and previous buffers without copying.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.previous);
    }

    pub fn copy_current_into_previous(&mut self) {
        self.previous.copy_from_slice(&self.current);
    }

    pub fn current(&self) -> &[T] {
        &self.current
    }

    pub fn previous(&self) -> &[T] {
        &self.previous
    }

    pub fn current_mut(&mut self) -> &mut [T] {
        &mut self.current
    }

    /// Mutable current buffer alongside the read-only previous buffer.
    pub fn buffers_mut(&mut self) -> (&mut [T], &[T]) {
        (&mut self.current, &self.previous)
    }

    fn locate(&self, position: IVec3, access: Access) -> Option<usize> {
        let index = buffer_index(self.extent, self.dimensions, position);
        if index.is_none() {
            self.report(access, Location::Coordinate(position));
        }
        index
    }

    fn report(&self, access: Access, location: Location) {
        let violation = BoundsViolation { access, location };
        log::debug!("voxel field access out of range: {violation:?}");
        if let Some(hook) = self.on_violation {
            hook(&violation);
        }
    }
}

impl<T> VoxelField<T>
where
    T: Copy + Default + Add<Output = T> + Sub<Output = T>,
{
    pub fn increase(&mut self, position: IVec3, delta: T) {
        let value = self.get(position);
        self.set(position, value + delta);
    }

    pub fn decrease(&mut self, position: IVec3, delta: T) {
        let value = self.get(position);
        self.set(position, value - delta);
    }

    pub fn increase_previous(&mut self, position: IVec3, delta: T) {
        let value = self.get_previous(position);
        self.set_previous(position, value + delta);
    }

    pub fn increase_previous_index(&mut self, index: usize, delta: T) {
        let value = self.get_previous_index(index);
        self.set_previous_index(index, value + delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn shape_2d() -> GridShape {
        GridShape::new(5, Dimensions::Two).unwrap()
    }

    #[test]
    fn set_and_get_2d() {
        let mut field = VoxelField::<f32>::new(&shape_2d());
        field.set(IVec3::new(2, 2, 0), 204.0);
        assert_eq!(field.get(IVec3::new(2, 2, 0)), 204.0);
        assert_eq!(field.get_index(2 + 7 * 2), 204.0);
    }

    #[test]
    fn set_and_get_3d() {
        let shape = GridShape::new(5, Dimensions::Three).unwrap();
        let mut field = VoxelField::<f32>::new(&shape);
        field.set(IVec3::new(2, 2, 2), 204.0);
        assert_eq!(field.get(IVec3::new(2, 2, 2)), 204.0);
        assert_eq!(field.len(), 343);
    }

    #[test]
    fn out_of_range_reads_are_zero_and_writes_dropped() {
        let shape = GridShape::new(5, Dimensions::Three).unwrap();
        let mut field = VoxelField::<f32>::new(&shape);

        for position in [
            IVec3::new(10, 10, 10),
            IVec3::new(-1, 0, 0),
            IVec3::new(0, 7, 0),
            IVec3::new(0, 0, 7),
        ] {
            field.set(position, 3.0);
            field.set_previous(position, 3.0);
            assert_eq!(field.get(position), 0.0);
            assert_eq!(field.get_previous(position), 0.0);
        }
        field.set_index(10_000, 3.0);
        assert_eq!(field.get_index(10_000), 0.0);
        assert!(field.current().iter().all(|&v| v == 0.0));
        assert!(field.previous().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn z_must_be_zero_in_2d() {
        let mut field = VoxelField::<f32>::new(&shape_2d());
        field.set(IVec3::new(1, 1, 1), 5.0);
        assert_eq!(field.get(IVec3::new(1, 1, 1)), 0.0);
        assert!(field.current().iter().all(|&v| v == 0.0));
    }

    static VIOLATIONS: AtomicUsize = AtomicUsize::new(0);

    fn count_violation(_: &BoundsViolation) {
        VIOLATIONS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn hook_sees_violations() {
        let mut field = VoxelField::<f32>::new(&shape_2d()).with_violation_hook(count_violation);
        let before = VIOLATIONS.load(Ordering::SeqCst);
        field.set(IVec3::new(9, 0, 0), 1.0);
        let _ = field.get_index(1_000);
        field.set(IVec3::new(1, 1, 0), 1.0);
        assert_eq!(VIOLATIONS.load(Ordering::SeqCst) - before, 2);
    }

    #[test]
    fn swap_exchanges_buffers() {
        let mut field = VoxelField::<f32>::new(&shape_2d());
        let p = IVec3::new(3, 3, 0);
        field.set(p, 1.0);
        field.set_previous(p, 2.0);

        field.swap();
        assert_eq!(field.get(p), 2.0);
        assert_eq!(field.get_previous(p), 1.0);

        field.set(p, 7.0);
        assert_eq!(field.get_previous(p), 1.0);
        field.set_previous(p, 9.0);
        assert_eq!(field.get(p), 7.0);
    }

    #[test]
    fn copy_current_into_previous_is_a_copy() {
        let mut field = VoxelField::<f32>::new(&shape_2d());
        let p = IVec3::new(1, 4, 0);
        field.set(p, 4.5);
        field.copy_current_into_previous();
        assert_eq!(field.get_previous(p), 4.5);

        field.set(p, 0.0);
        assert_eq!(field.get_previous(p), 4.5);
    }

    #[test]
    fn increase_and_decrease() {
        let mut field = VoxelField::<f32>::new(&shape_2d());
        let p = IVec3::new(2, 3, 0);
        field.increase(p, 2.0);
        field.increase(p, 3.0);
        field.decrease(p, 1.5);
        assert_eq!(field.get(p), 3.5);

        field.increase_previous(p, 1.0);
        assert_eq!(field.get_previous(p), 1.0);

        field.increase(IVec3::new(-4, 0, 0), 1.0);
        assert_eq!(field.current().iter().sum::<f32>(), 3.5);
    }

    #[test]
    fn vector_valued_field() {
        let mut field = VoxelField::<Vec3>::new(&shape_2d());
        let p = IVec3::new(1, 1, 0);
        field.increase(p, Vec3::new(1.0, 2.0, 0.0));
        field.increase(p, Vec3::new(0.5, 0.0, 0.0));
        assert_eq!(field.get(p), Vec3::new(1.5, 2.0, 0.0));
        assert_eq!(field.get(IVec3::new(20, 0, 0)), Vec3::ZERO);
    }
}
