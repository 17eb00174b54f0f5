#![allow(dead_code)]

use ndarray::{s, Array2};
use reference_alignment::Volume;

/// Crop window used to cut inputs out of references: rows 10..90, cols 7..95.
pub const CROP_OFFSET: (i32, i32) = (7, 10);

/// Dense pseudo-random texture with plenty of FAST corners.
pub fn speckle(width: usize, height: usize, seed: u64) -> Array2<f32> {
    let mut state = seed;
    Array2::from_shape_fn((height, width), |_| {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        ((state >> 33) % 256) as f32
    })
}

pub fn stack(plane: &Array2<f32>, depth: usize) -> Volume {
    let slices = vec![plane.clone(); depth];
    Volume::from_slices(&slices).unwrap()
}

pub fn reference_volume(depth: usize) -> Volume {
    stack(&speckle(128, 128, 11), depth)
}

pub fn distractor_volume(depth: usize) -> Volume {
    stack(&speckle(128, 128, 5), depth)
}

/// The input a reference produces when cropped at [`CROP_OFFSET`].
pub fn cropped_input(depth: usize) -> Volume {
    let plane = speckle(128, 128, 11).slice(s![10..90, 7..95]).to_owned();
    stack(&plane, depth)
}

/// Volume whose every voxel encodes its own `(z, y, x)` position.
pub fn indexed_volume(depth: usize, height: usize, width: usize) -> Volume {
    let slices: Vec<_> = (0..depth)
        .map(|z| {
            Array2::from_shape_fn((height, width), |(y, x)| (z * 1_000_000 + y * 1000 + x) as f32)
        })
        .collect();
    Volume::from_slices(&slices).unwrap()
}
