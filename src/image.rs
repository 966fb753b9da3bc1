//! In-memory RGB raster and the minimal conversions a host needs to bridge
//! to/from its own image representation.

use crate::Error;

/// One 8-bit RGB pixel.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// A row-major W x H raster of 8-bit RGB pixels.
///
/// `pix.len() == (w * h) as usize` is a construction invariant, not
/// re-validated on every call that takes an `&Image`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Image {
    pub w: u32,
    pub h: u32,
    pub pix: Vec<Rgb>,
}

impl Image {
    /// Builds an image from flat interleaved RGB8 bytes (`w*h*3` bytes).
    pub fn from_rgb8(w: u32, h: u32, bytes: &[u8]) -> Result<Self, Error> {
        let pixel_count = checked_pixel_count(w, h)?;
        if bytes.len() != pixel_count * 3 {
            return Err(Error::Argument(format!(
                "expected {} bytes for {}x{} RGB8, got {}",
                pixel_count * 3,
                w,
                h,
                bytes.len()
            )));
        }

        let pix = bytes
            .chunks_exact(3)
            .map(|c| Rgb {
                r: c[0],
                g: c[1],
                b: c[2],
            })
            .collect();

        Ok(Image { w, h, pix })
    }

    /// Flattens the image back to interleaved RGB8 bytes, row-major.
    pub fn to_rgb8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pix.len() * 3);
        for p in &self.pix {
            out.push(p.r);
            out.push(p.g);
            out.push(p.b);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0 || self.pix.is_empty()
    }
}

pub(crate) fn checked_pixel_count(w: u32, h: u32) -> Result<usize, Error> {
    if w == 0 || h == 0 {
        return Err(Error::Argument(format!("invalid image size {w}x{h}")));
    }
    let w = w as usize;
    let h = h as usize;
    w.checked_mul(h)
        .ok_or_else(|| Error::Argument(format!("image dimensions overflow: {w}x{h}")))
}
