//! Cover image preparation: flatten, centre-crop and resize to a frame size.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::error::{Error, Result};
use crate::media::Resolution;

/// Ratios closer than this are treated as equal and not cropped.
const RATIO_TOLERANCE: f64 = 0.01;

/// Write a PNG of exactly `target` pixels built from `source` to `dest`.
///
/// Transparent areas are composited onto white. If the source aspect ratio
/// differs from the target, the centre of the image is kept.
pub fn prepare_image(source: &Path, target: Resolution, dest: &Path) -> Result<()> {
    if !source.exists() {
        return Err(Error::file_not_found(source));
    }
    if target.width == 0 || target.height == 0 {
        return Err(Error::InvalidInput(format!("empty target resolution {target}")));
    }

    let img = image::open(source)?;
    let flat = flatten_on_white(&img);
    let cropped = crop_to_ratio(flat, target);
    let resized = imageops::resize(&cropped, target.width, target.height, FilterType::Lanczos3);

    resized.save_with_format(dest, ImageFormat::Png)?;
    tracing::debug!("prepared {:?} at {} -> {:?}", source, target, dest);
    Ok(())
}

fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let blend = |c: u8| -> u8 {
            let a = u16::from(a);
            ((u16::from(c) * a + 255 * (255 - a)) / 255) as u8
        };
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

fn crop_to_ratio(img: RgbImage, target: Resolution) -> RgbImage {
    let (w, h) = img.dimensions();
    let current = f64::from(w) / f64::from(h);
    let wanted = f64::from(target.width) / f64::from(target.height);

    if (current - wanted).abs() <= RATIO_TOLERANCE {
        return img;
    }

    if current > wanted {
        let new_w = ((f64::from(h) * wanted) as u32).clamp(1, w);
        let left = (w - new_w) / 2;
        imageops::crop_imm(&img, left, 0, new_w, h).to_image()
    } else {
        let new_h = ((f64::from(w) / wanted) as u32).clamp(1, h);
        let top = (h - new_h) / 2;
        imageops::crop_imm(&img, 0, top, w, new_h).to_image()
    }
}
