//! BT.601 full-range RGB <-> YCbCr conversion, fused at the plane level
//! since the embedder/detector only ever touch all three channels at once.

use crate::dct::Plane;
use crate::image::{Image, Rgb};

/// Splits an image into Y, Cb, Cr planes (BT.601, full range).
pub fn rgb_to_ycbcr(img: &Image) -> (Plane, Plane, Plane) {
    let n = img.pix.len();
    let mut y = vec![0.0f32; n];
    let mut cb = vec![0.0f32; n];
    let mut cr = vec![0.0f32; n];

    for (i, p) in img.pix.iter().enumerate() {
        let r = p.r as f32;
        let g = p.g as f32;
        let b = p.b as f32;

        y[i] = 0.299 * r + 0.587 * g + 0.114 * b;
        cb[i] = 128.0 - 0.168736 * r - 0.331264 * g + 0.5 * b;
        cr[i] = 128.0 + 0.5 * r - 0.418688 * g - 0.081312 * b;
    }

    let w = img.w as usize;
    let h = img.h as usize;
    (
        Plane::new(w, h, y),
        Plane::new(w, h, cb),
        Plane::new(w, h, cr),
    )
}

/// Recombines Y, Cb, Cr planes back into an RGB image, clamped and rounded
/// per channel.
pub fn ycbcr_to_rgb(w: u32, h: u32, y: &Plane, cb: &Plane, cr: &Plane) -> Image {
    let n = (w as usize) * (h as usize);
    let mut pix = Vec::with_capacity(n);

    for i in 0..n {
        let yv = y.data.get(i).copied().unwrap_or(0.0);
        let cbv = cb.data.get(i).copied().unwrap_or(128.0);
        let crv = cr.data.get(i).copied().unwrap_or(128.0);

        let r = yv + 1.402 * (crv - 128.0);
        let g = yv - 0.344136 * (cbv - 128.0) - 0.714136 * (crv - 128.0);
        let b = yv + 1.772 * (cbv - 128.0);

        pix.push(Rgb {
            r: clamp_round_u8(r),
            g: clamp_round_u8(g),
            b: clamp_round_u8(b),
        });
    }

    Image { w, h, pix }
}

fn clamp_round_u8(v: f32) -> u8 {
    if v <= 0.0 {
        0
    } else if v >= 255.0 {
        255
    } else {
        (v + 0.5) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(r: u8, g: u8, b: u8) -> Rgb {
        let img = Image {
            w: 1,
            h: 1,
            pix: vec![Rgb { r, g, b }],
        };
        let (y, cb, cr) = rgb_to_ycbcr(&img);
        ycbcr_to_rgb(1, 1, &y, &cb, &cr).pix[0]
    }

    #[test]
    fn round_trip_stays_within_one_per_channel() {
        for &(r, g, b) in &[
            (0, 0, 0),
            (255, 255, 255),
            (128, 64, 200),
            (17, 240, 3),
            (1, 254, 128),
        ] {
            let out = round_trip(r, g, b);
            assert!((out.r as i16 - r as i16).abs() <= 1, "{r} -> {}", out.r);
            assert!((out.g as i16 - g as i16).abs() <= 1, "{g} -> {}", out.g);
            assert!((out.b as i16 - b as i16).abs() <= 1, "{b} -> {}", out.b);
        }
    }

    #[test]
    fn gray_maps_to_equal_channels() {
        let out = round_trip(128, 128, 128);
        assert!((out.r as i16 - 128).abs() <= 1);
        assert!((out.g as i16 - 128).abs() <= 1);
        assert!((out.b as i16 - 128).abs() <= 1);
    }
}
