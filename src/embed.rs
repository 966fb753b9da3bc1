//! Top-level embedder: composes payload codec, spreading and DCT engine
//! into `embed(image, key, msg, alpha) -> watermarked image`.

use std::collections::HashMap;

use crate::color::{rgb_to_ycbcr, ycbcr_to_rgb};
use crate::constants::{CHIPS_PER_SYMBOL, MID_FREQ_POSITIONS, TARGET_SCALE};
use crate::dct::{clamp_block_to_byte_range, dct8, idct8, pad_to_8, unpad, Plane};
use crate::image::Image;
use crate::payload;
use crate::spread::shuffled_slots_and_chips;
use crate::Error;

/// Produces a watermarked copy of `image`. Deterministic and pure: the
/// same `(image, key, msg, alpha)` always produces the same output.
pub fn embed(image: &Image, key: &str, msg: &str, alpha: f32) -> Result<Image, Error> {
    if key.is_empty() {
        return Err(Error::Argument("key must not be empty".into()));
    }
    if alpha <= 0.0 {
        return Err(Error::Argument("alpha must be > 0".into()));
    }
    if image.is_empty() {
        return Err(Error::Argument("image must not be empty".into()));
    }

    log::debug!(
        "embed: start w={} h={} key_len={} msg_len={} alpha={alpha}",
        image.w,
        image.h,
        key.len(),
        msg.len()
    );

    let (y, cb, cr) = rgb_to_ycbcr(image);
    let y_pad = pad_to_8(&y);

    let bits = payload::encode(msg);
    let block_cols = y_pad.w / 8;
    let block_rows = y_pad.h / 8;
    let block_count = block_cols * block_rows;
    let total_slots = block_count * MID_FREQ_POSITIONS.len();
    let needed_slots = bits.len() * CHIPS_PER_SYMBOL;

    if needed_slots > total_slots {
        log::debug!(
            "embed: capacity error needed={needed_slots} available={total_slots}"
        );
        return Err(Error::Capacity {
            needed: needed_slots,
            available: total_slots,
        });
    }

    let (slots, chips) = shuffled_slots_and_chips(key, total_slots, needed_slots);

    // Group per-slot pushes by block so each block's DCT/IDCT runs once.
    let mut by_block: HashMap<usize, Vec<(usize, f32)>> = HashMap::new();
    for i in 0..needed_slots {
        let sym_idx = i / CHIPS_PER_SYMBOL;
        let block_idx = slots[i] / MID_FREQ_POSITIONS.len();
        let coeff_idx = slots[i] % MID_FREQ_POSITIONS.len();
        let direction = bits[sym_idx] as f32 * chips[i] as f32;
        by_block.entry(block_idx).or_default().push((coeff_idx, direction));
    }

    let target = alpha * TARGET_SCALE;
    let mut y_pad = y_pad;
    apply_pushes(&mut y_pad, block_cols, &by_block, target);

    let y_out = unpad(&y_pad, image.w as usize, image.h as usize);
    let out = ycbcr_to_rgb(image.w, image.h, &y_out, &cb, &cr);
    log::debug!("embed: done");
    Ok(out)
}

#[cfg(not(feature = "parallel"))]
fn apply_pushes(
    y_pad: &mut Plane,
    block_cols: usize,
    by_block: &HashMap<usize, Vec<(usize, f32)>>,
    target: f32,
) {
    for (&block_idx, pushes) in by_block {
        let (bx, by) = (block_idx % block_cols, block_idx / block_cols);
        let block = y_pad.get_block8(bx, by);
        let mut coeff = dct8(&block);
        for &(coeff_idx, direction) in pushes {
            apply_push_rule(&mut coeff, coeff_idx, direction, target);
        }
        let mut recon = idct8(&coeff);
        clamp_block_to_byte_range(&mut recon);
        y_pad.set_block8(bx, by, &recon);
    }
}

#[cfg(feature = "parallel")]
fn apply_pushes(
    y_pad: &mut Plane,
    block_cols: usize,
    by_block: &HashMap<usize, Vec<(usize, f32)>>,
    target: f32,
) {
    use rayon::prelude::*;

    let snapshot: &Plane = y_pad;
    let results: Vec<(usize, usize, [[f32; 8]; 8])> = by_block
        .par_iter()
        .map(|(&block_idx, pushes)| {
            let (bx, by) = (block_idx % block_cols, block_idx / block_cols);
            let block = snapshot.get_block8(bx, by);
            let mut coeff = dct8(&block);
            for &(coeff_idx, direction) in pushes {
                apply_push_rule(&mut coeff, coeff_idx, direction, target);
            }
            let mut recon = idct8(&coeff);
            clamp_block_to_byte_range(&mut recon);
            (bx, by, recon)
        })
        .collect();

    for (bx, by, recon) in results {
        y_pad.set_block8(bx, by, &recon);
    }
}

/// Push rule (spec.md §4.6 step 8): nudges `coeff` so that
/// `coeff * direction >= target`, never weakening an already-correct
/// coefficient.
fn apply_push_rule(coeff: &mut [[f32; 8]; 8], coeff_idx: usize, direction: f32, target: f32) {
    let (u, v) = MID_FREQ_POSITIONS[coeff_idx];
    let (u, v) = (u as usize, v as usize);
    let c = coeff[v][u];
    let projected = c * direction;
    if projected < target {
        coeff[v][u] = c + (target - projected) * direction;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Rgb;

    fn gradient_image(w: u32, h: u32) -> Image {
        let mut pix = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                let v = ((x * 255) / w.max(1)) as u8;
                pix.push(Rgb { r: v, g: v, b: v });
            }
        }
        Image { w, h, pix }
    }

    #[test]
    fn rejects_empty_key() {
        let img = gradient_image(16, 16);
        assert!(embed(&img, "", "hi", 1.0).is_err());
    }

    #[test]
    fn rejects_non_positive_alpha() {
        let img = gradient_image(16, 16);
        assert!(embed(&img, "k", "hi", 0.0).is_err());
        assert!(embed(&img, "k", "hi", -1.0).is_err());
    }

    #[test]
    fn rejects_empty_image() {
        let img = Image {
            w: 0,
            h: 0,
            pix: vec![],
        };
        assert!(embed(&img, "k", "hi", 1.0).is_err());
    }

    #[test]
    fn capacity_error_on_tiny_image() {
        let img = gradient_image(8, 8);
        let err = embed(&img, "k", "HELLO", 1.0).unwrap_err();
        assert!(matches!(err, Error::Capacity { .. }));
    }

    #[test]
    fn embed_preserves_dimensions() {
        let img = gradient_image(64, 64);
        let out = embed(&img, "k", "HELLO", 3.0).unwrap();
        assert_eq!(out.w, img.w);
        assert_eq!(out.h, img.h);
    }

    #[test]
    fn embed_is_deterministic() {
        let img = gradient_image(64, 64);
        let a = embed(&img, "k", "HELLO", 3.0).unwrap();
        let b = embed(&img, "k", "HELLO", 3.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn embed_is_imperceptible_at_alpha_3() {
        let img = gradient_image(128, 128);
        let out = embed(&img, "k", "HELLO", 3.0).unwrap();

        let mut max_diff = 0i32;
        let mut sum_diff = 0i64;
        for (a, b) in img.pix.iter().zip(out.pix.iter()) {
            for (ca, cb) in [(a.r, b.r), (a.g, b.g), (a.b, b.b)] {
                let d = (ca as i32 - cb as i32).abs();
                max_diff = max_diff.max(d);
                sum_diff += d as i64;
            }
        }
        let mean_diff = sum_diff as f64 / (img.pix.len() * 3) as f64;
        assert!(max_diff <= 20, "max per-pixel delta too large: {max_diff}");
        assert!(mean_diff <= 2.0, "mean delta too large: {mean_diff}");
    }
}
