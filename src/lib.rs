//! SpectralMark: keyed spread-spectrum image watermarking.
//!
//! Embeds a short UTF-8 message into a still image's luminance channel,
//! spread across mid-band 8x8 DCT coefficients under a pseudorandom slot
//! permutation and chip sequence derived from a shared-secret key. The
//! message survives mild attacks (noise, brightness/contrast, small crops,
//! nearest-neighbor rescale, DCT requantization) and is only recoverable by
//! a party holding the same key.
//!
//! The crate is a pure computational core: no file or network I/O besides
//! the [`ppm`] container, which is the one format the core itself must
//! understand. Everything else — other image formats, a CLI, an HTTP
//! façade, attack generators, PSNR — is a host concern.

pub mod color;
pub mod constants;
pub mod dct;
pub mod detect;
pub mod embed;
pub mod image;
pub mod payload;
pub mod ppm;
pub mod prng;
pub mod spread;

pub use detect::{detect, DetectResult};
pub use embed::embed;
pub use image::{Image, Rgb};

/// Errors surfaced by the public API (spec.md §7).
///
/// `DecodeFailure` is deliberately absent: a failed detection is not an
/// error, it is `DetectResult { ok: false, present: false, .. }`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing key/msg, non-positive alpha, or a malformed in-memory image.
    #[error("argument error: {0}")]
    Argument(String),

    /// The message needs more mid-band slots than the image provides.
    #[error("capacity error: message needs {needed} slots but image provides {available}")]
    Capacity { needed: usize, available: usize },

    /// The PPM container is malformed (bad magic, bad maxval, truncated
    /// pixel data, or a size that would overflow).
    #[error("invalid PPM container: {0}")]
    InvalidContainer(String),
}

#[cfg(test)]
mod integration_like_tests {
    use super::*;
    use crate::image::Rgb;

    fn gradient_image(w: u32, h: u32) -> Image {
        let mut pix = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                let v = (((x * 37 + y * 59) % 256) as u8).wrapping_add(1);
                pix.push(Rgb { r: v, g: v, b: v });
            }
        }
        Image { w, h, pix }
    }

    #[test]
    fn end_to_end_embed_then_detect() {
        let img = gradient_image(128, 128);
        let marked = embed(&img, "k", "HELLO", 3.0).unwrap();
        let result = detect(&marked, "k").unwrap();
        assert!(result.ok);
        assert!(result.present);
        assert_eq!(result.msg, "HELLO");
    }

    #[test]
    fn capacity_error_on_undersized_image() {
        let img = gradient_image(8, 8);
        let err = embed(&img, "k", "HELLO", 1.0).unwrap_err();
        assert!(matches!(err, Error::Capacity { .. }));
    }

    #[test]
    fn ppm_round_trip_through_embed_detect() {
        let img = gradient_image(64, 64);
        let marked = embed(&img, "k", "hi", 2.5).unwrap();
        let bytes = ppm::write_ppm(&marked).unwrap();
        let reloaded = ppm::read_ppm(&bytes).unwrap();
        let result = detect(&reloaded, "k").unwrap();
        assert!(result.ok);
        assert_eq!(result.msg, "hi");
    }
}
