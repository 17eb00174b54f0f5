use crate::volume::Volume;
use anyhow::{bail, Context};
use image::DynamicImage;
use ndarray::Array2;
use std::path::{Path, PathBuf};

/// File extensions recognised as slices of an image stack.
pub const STACK_EXTENSIONS: &[&str] = &["png", "tif", "tiff", "jpg", "jpeg"];

/// Loads one image as a grayscale plane indexed `[y, x]`.
///
/// 8-bit images keep their 0..=255 range; deeper images are read as 16-bit.
pub fn load_slice<P: AsRef<Path>>(path: P) -> crate::Result<Array2<f32>> {
    let path = path.as_ref();
    let img = image::open(path).with_context(|| format!("failed to read image {}", path.display()))?;
    let (width, height) = (img.width() as usize, img.height() as usize);

    let pixels: Vec<f32> = match img {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_) => img.to_luma8().into_raw().into_iter().map(f32::from).collect(),
        _ => img.to_luma16().into_raw().into_iter().map(f32::from).collect(),
    };
    Ok(Array2::from_shape_vec((height, width), pixels)?)
}

/// Image files directly inside `dir`, in lexical order.
pub fn stack_files<P: AsRef<Path>>(dir: P) -> crate::Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let p = entry?.path();
        if !p.is_file() {
            continue;
        }
        if let Some(ext) = p.extension().and_then(|e| e.to_str()) {
            if STACK_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
                paths.push(p);
            }
        }
    }
    paths.sort();
    Ok(paths)
}

/// Stacks the images of `dir` along Z into a `[Z, Y, X]` volume.
pub fn load_image_stack<P: AsRef<Path>>(dir: P) -> crate::Result<Volume> {
    let dir = dir.as_ref();
    let files = stack_files(dir)?;
    if files.is_empty() {
        bail!("no images found in {}", dir.display());
    }
    let slices = files
        .iter()
        .map(load_slice)
        .collect::<crate::Result<Vec<_>>>()?;
    tracing::debug!(dir = %dir.display(), slices = slices.len(), "loaded image stack");
    Volume::from_slices(&slices).with_context(|| format!("inconsistent image stack in {}", dir.display()))
}
