//! PNG export of the published dye field.

use std::path::Path;

use distort_fluid_core::Grid;

use crate::error::CliError;

/// Maps a signed dye value into `[0, 255]`, mid-grey at zero.
///
/// Dye channels carry pointer deltas, so they are signed and unbounded.
fn tone_map(v: f32) -> u8 {
    let t = 0.5 + 0.5 * (v / (1.0 + v.abs()));
    (t * 255.0).round().clamp(0.0, 255.0) as u8
}

/// RGBA8 pixels, top row first. Alpha is always opaque.
pub fn dye_to_rgba(dye: &Grid) -> Vec<u8> {
    let (w, h) = (dye.width(), dye.height());
    let mut rgba = Vec::with_capacity(w as usize * h as usize * 4);
    for y in (0..h).rev() {
        for x in 0..w {
            let texel = dye.texel(x, y);
            rgba.extend([tone_map(texel.x), tone_map(texel.y), tone_map(texel.z), 255]);
        }
    }
    rgba
}

/// Writes `dye` to `path` as a PNG.
///
/// # Errors
///
/// Returns [`CliError::Io`] on encode or write failure.
pub fn write_png(dye: &Grid, path: &Path) -> Result<(), CliError> {
    let img = image::RgbaImage::from_raw(dye.width(), dye.height(), dye_to_rgba(dye))
        .ok_or_else(|| CliError::Io("RGBA buffer size mismatch".into()))?;
    img.save(path)
        .map_err(|e| CliError::Io(format!("{}: {e}", path.display())))
}
