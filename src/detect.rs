//! Top-level detector: recovers `(score, present, msg, ok)` from a
//! watermarked (or attacked) image, keyed only by `key`.

use crate::color::rgb_to_ycbcr;
use crate::constants::{MID_FREQ_POSITIONS, RESYNC_OFFSET_RANGE};
use crate::dct::{dct8, pad_to_8, Plane};
use crate::image::Image;
use crate::payload;
use crate::spread::shuffled_slots_and_chips;
use crate::Error;

/// Result of a detection attempt.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DetectResult {
    pub score: f32,
    pub present: bool,
    pub msg: String,
    pub ok: bool,
}

/// Detects a SpectralMark watermark, trying the unshifted image first and
/// then an 8x8 grid of small spatial resynchronization offsets.
pub fn detect(image: &Image, key: &str) -> Result<DetectResult, Error> {
    if key.is_empty() {
        return Err(Error::Argument("key must not be empty".into()));
    }
    if image.is_empty() {
        return Err(Error::Argument("image must not be empty".into()));
    }

    log::debug!("detect: start w={} h={} key_len={}", image.w, image.h, key.len());

    let (y, _cb, _cr) = rgb_to_ycbcr(image);

    let baseline = detect_plane(&y, key);
    if baseline.ok {
        log::debug!("detect: matched at offset (0,0)");
        return Ok(baseline);
    }

    let mut best = baseline;
    for oy in RESYNC_OFFSET_RANGE {
        for ox in RESYNC_OFFSET_RANGE {
            if ox == 0 && oy == 0 {
                continue;
            }
            let shifted = shift_plane(&y, ox as i64, oy as i64);
            let candidate = detect_plane(&shifted, key);
            log::trace!("detect: offset ({ox},{oy}) ok={} score={}", candidate.ok, candidate.score);

            if is_better(&candidate, &best) {
                best = candidate;
            }
        }
    }

    if best.ok {
        log::debug!("detect: matched, best score={}", best.score);
    } else {
        log::debug!("detect: exhausted, best score={}", best.score);
    }
    Ok(best)
}

fn is_better(candidate: &DetectResult, best: &DetectResult) -> bool {
    match (candidate.ok, best.ok) {
        (true, false) => true,
        (false, true) => false,
        _ => candidate.score > best.score,
    }
}

/// Replicates `plane` shifted by `(ox, oy)`, clamping source reads to the
/// plane's edges — used for the small-offset resynchronization search.
fn shift_plane(plane: &Plane, ox: i64, oy: i64) -> Plane {
    let mut data = vec![0.0f32; plane.w * plane.h];
    for y in 0..plane.h {
        for x in 0..plane.w {
            let sx = (x as i64 + ox).clamp(0, plane.w as i64 - 1) as usize;
            let sy = (y as i64 + oy).clamp(0, plane.h as i64 - 1) as usize;
            data[y * plane.w + x] = plane.data[sy * plane.w + sx];
        }
    }
    Plane {
        w: plane.w,
        h: plane.h,
        data,
    }
}

/// Runs the core detection pipeline on a single luminance plane (no
/// resynchronization search — that is the caller's job).
fn detect_plane(y: &Plane, key: &str) -> DetectResult {
    if y.w == 0 || y.h == 0 {
        return DetectResult {
            score: 0.0,
            present: false,
            msg: String::new(),
            ok: false,
        };
    }

    let y_pad = pad_to_8(y);
    if y_pad.w == 0 || y_pad.h == 0 {
        return DetectResult {
            score: 0.0,
            present: false,
            msg: String::new(),
            ok: false,
        };
    }

    let block_cols = y_pad.w / 8;
    let block_rows = y_pad.h / 8;
    let block_count = block_cols * block_rows;
    let positions = MID_FREQ_POSITIONS.len();
    let total_slots = block_count * positions;

    let mut coeff_vals = vec![0.0f32; total_slots];
    for by in 0..block_rows {
        for bx in 0..block_cols {
            let block = y_pad.get_block8(bx, by);
            let coeff = dct8(&block);
            let block_idx = by * block_cols + bx;
            for (coeff_idx, &(u, v)) in MID_FREQ_POSITIONS.iter().enumerate() {
                coeff_vals[block_idx * positions + coeff_idx] = coeff[v as usize][u as usize];
            }
        }
    }

    if coeff_vals.is_empty() {
        return DetectResult {
            score: 0.0,
            present: false,
            msg: String::new(),
            ok: false,
        };
    }

    let symbol_count = total_slots; // chips_per_symbol == 1
    let (slots, chips) = shuffled_slots_and_chips(key, total_slots, symbol_count);

    let soft: Vec<f32> = (0..symbol_count)
        .map(|s| coeff_vals[slots[s]] * chips[s] as f32)
        .collect();

    let (msg, ok, start_bit, payload_bits) = payload::decode_soft(&soft);
    let score = estimate_score(&soft, &msg, ok, start_bit, payload_bits);

    DetectResult {
        score,
        present: ok,
        msg,
        ok,
    }
}

/// Matches spec.md §4.7 step 6: when `ok`, the fraction of majority-
/// combined raw bits (starting at the accepted window) that agree with
/// the re-encoded expected frame; otherwise the fraction of the first 16
/// combined raw bits that agree with the sync word.
fn estimate_score(
    soft: &[f32],
    msg: &str,
    ok: bool,
    start_bit: Option<usize>,
    payload_bits: usize,
) -> f32 {
    if soft.is_empty() {
        return 0.0;
    }
    let raw_bits = payload::combine_raw_bits(soft);

    if ok {
        let Some(start_bit) = start_bit else {
            return 0.0;
        };
        let expected_raw_bits = payload::encode_raw_bits(msg);
        let mut n = expected_raw_bits.len();
        if payload_bits > 0 && payload_bits < n {
            n = payload_bits;
        }
        if start_bit >= raw_bits.len() {
            return 0.0;
        }
        if start_bit + n > raw_bits.len() {
            n = raw_bits.len() - start_bit;
        }
        if n == 0 {
            return 0.0;
        }

        let matches = (0..n)
            .filter(|&i| raw_bits[start_bit + i] == expected_raw_bits[i])
            .count();
        return matches as f32 / n as f32;
    }

    if raw_bits.len() < 16 {
        return 0.0;
    }
    let sync_bits = payload::sync_word_bits();
    let matches = (0..16).filter(|&i| raw_bits[i] == sync_bits[i]).count();
    matches as f32 / 16.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::embed;
    use crate::image::Rgb;

    fn gradient_image(w: u32, h: u32) -> Image {
        let mut pix = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                let v = (((x + y) * 255) / (w + h).max(1)) as u8;
                pix.push(Rgb { r: v, g: v, b: v });
            }
        }
        Image { w, h, pix }
    }

    #[test]
    fn rejects_empty_key() {
        let img = gradient_image(32, 32);
        assert!(detect(&img, "").is_err());
    }

    #[test]
    fn detects_embedded_message_with_correct_key() {
        let img = gradient_image(128, 128);
        let marked = embed(&img, "k", "HELLO", 3.0).unwrap();
        let result = detect(&marked, "k").unwrap();
        assert!(result.ok);
        assert!(result.present);
        assert_eq!(result.msg, "HELLO");
    }

    #[test]
    fn wrong_key_does_not_detect() {
        let img = gradient_image(128, 128);
        let marked = embed(&img, "k", "HELLO", 3.0).unwrap();
        let result = detect(&marked, "wrong").unwrap();
        assert!(!result.ok);
        assert!(!result.present);
    }

    #[test]
    fn baseline_image_does_not_detect() {
        let img = gradient_image(128, 128);
        let result = detect(&img, "k").unwrap();
        assert!(!result.ok);
    }

    #[test]
    fn detect_always_preserves_dimensions_via_embed_roundtrip() {
        let img = gradient_image(64, 64);
        let marked = embed(&img, "k", "HELLO", 3.0).unwrap();
        assert_eq!(marked.w, img.w);
        assert_eq!(marked.h, img.h);
    }
}
