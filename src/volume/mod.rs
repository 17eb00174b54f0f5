//! Read-only volumes with named axes and the stores that load and save them.

pub mod archive;
pub mod memory;

use crate::pipeline::CropInterval;
use crate::Result;
use anyhow::{bail, Context};
use ndarray::{Array2, ArrayD, Ix2, Slice};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub use archive::ArchiveStore;
pub use memory::MemoryStore;

/// Semantic meaning of one array dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
    Channel,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "x"),
            Axis::Y => write!(f, "y"),
            Axis::Z => write!(f, "z"),
            Axis::Channel => write!(f, "c"),
        }
    }
}

/// N-dimensional real-valued image with one [`Axis`] tag per dimension.
///
/// A volume always carries X and Y; Z and Channel are optional and report an
/// extent of 1 when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawVolume")]
pub struct Volume {
    axes: Vec<Axis>,
    data: ArrayD<f32>,
}

/// Decoded form of a [`Volume`] before its axis tags are checked.
#[derive(Deserialize)]
struct RawVolume {
    axes: Vec<Axis>,
    data: ArrayD<f32>,
}

impl TryFrom<RawVolume> for Volume {
    type Error = anyhow::Error;

    fn try_from(raw: RawVolume) -> Result<Self> {
        Volume::new(raw.axes, raw.data)
    }
}

impl Volume {
    pub fn new(axes: Vec<Axis>, data: ArrayD<f32>) -> Result<Self> {
        if axes.len() != data.ndim() {
            bail!(
                "axis tags ({}) do not match array rank ({})",
                axes.len(),
                data.ndim()
            );
        }
        for (i, axis) in axes.iter().enumerate() {
            if axes[..i].contains(axis) {
                bail!("axis {} appears more than once", axis);
            }
        }
        if !axes.contains(&Axis::X) || !axes.contains(&Axis::Y) {
            bail!("a volume needs both an X and a Y axis");
        }
        Ok(Self { axes, data })
    }

    /// Builds a `[Z, Y, X]` volume from equally sized slices.
    pub fn from_slices(slices: &[Array2<f32>]) -> Result<Self> {
        let first = slices.first().context("cannot build a volume from zero slices")?;
        let (height, width) = first.dim();
        let mut data = Vec::with_capacity(slices.len() * height * width);
        for (z, slice) in slices.iter().enumerate() {
            if slice.dim() != (height, width) {
                bail!(
                    "slice {} is {:?}, expected {:?}",
                    z,
                    slice.dim(),
                    (height, width)
                );
            }
            data.extend(slice.iter().copied());
        }
        let array = ArrayD::from_shape_vec(vec![slices.len(), height, width], data)?;
        Self::new(vec![Axis::Z, Axis::Y, Axis::X], array)
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn data(&self) -> &ArrayD<f32> {
        &self.data
    }

    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    fn index_of(&self, axis: Axis) -> Option<usize> {
        self.axes.iter().position(|a| *a == axis)
    }

    pub fn extent(&self, axis: Axis) -> usize {
        self.index_of(axis).map_or(1, |i| self.data.shape()[i])
    }

    pub fn width(&self) -> usize {
        self.extent(Axis::X)
    }

    pub fn height(&self) -> usize {
        self.extent(Axis::Y)
    }

    pub fn depth(&self) -> usize {
        self.extent(Axis::Z)
    }

    /// Zero-based inclusive lower bound of dimension `dim`.
    pub fn min(&self, _dim: usize) -> i64 {
        0
    }

    /// Zero-based inclusive upper bound of dimension `dim`.
    pub fn max(&self, dim: usize) -> i64 {
        self.data.shape()[dim] as i64 - 1
    }

    /// Extracts the XY plane at `z` (and `channel`), indexed `[y, x]`.
    pub fn slice(&self, z: usize, channel: usize) -> Result<Array2<f32>> {
        if z >= self.depth() {
            bail!("slice index {} out of range (depth {})", z, self.depth());
        }
        if channel >= self.extent(Axis::Channel) {
            bail!(
                "channel index {} out of range ({} channels)",
                channel,
                self.extent(Axis::Channel)
            );
        }

        let mut view = self.data.view();
        let mut remaining = Vec::with_capacity(2);
        // Highest dimension first so lower indices stay valid.
        for (i, axis) in self.axes.iter().enumerate().rev() {
            match axis {
                Axis::Z => view = view.index_axis_move(ndarray::Axis(i), z),
                Axis::Channel => view = view.index_axis_move(ndarray::Axis(i), channel),
                Axis::X | Axis::Y => remaining.push(*axis),
            }
        }
        remaining.reverse();

        let plane = view.into_dimensionality::<Ix2>()?;
        let plane = if remaining == [Axis::X, Axis::Y] {
            plane.reversed_axes()
        } else {
            plane
        };
        Ok(plane.to_owned())
    }

    /// Copies the region described by `interval` into a new volume.
    pub fn crop(&self, interval: &CropInterval) -> Result<Volume> {
        if interval.min.len() != self.ndim() || interval.max.len() != self.ndim() {
            bail!(
                "crop interval has {} dimensions, volume has {}",
                interval.min.len(),
                self.ndim()
            );
        }
        for dim in 0..self.ndim() {
            let (lo, hi) = (interval.min[dim], interval.max[dim]);
            if lo < self.min(dim) || hi > self.max(dim) || lo > hi {
                bail!(
                    "crop bounds [{}, {}] on axis {} exceed [{}, {}]",
                    lo,
                    hi,
                    self.axes[dim],
                    self.min(dim),
                    self.max(dim)
                );
            }
        }

        let cropped = self.data.slice_each_axis(|ax| {
            let dim = ax.axis.index();
            Slice::from(interval.min[dim] as isize..=interval.max[dim] as isize)
        });
        Volume::new(self.axes.clone(), cropped.to_owned())
    }
}

/// Fallible access to named datasets inside volume files.
pub trait VolumeStore: Send + Sync {
    fn open(&self, path: &Path, dataset: &str) -> Result<Volume>;

    fn write(&self, path: &Path, dataset: &str, volume: &Volume) -> Result<()>;

    fn list_datasets(&self, path: &Path) -> Result<Vec<String>>;
}
