//! Classical JPEG-style orthonormal 8-point 2D DCT/IDCT, block extraction
//! and edge-replicate padding of an arbitrary luminance plane.

use std::sync::OnceLock;

pub const BLOCK_SIZE: usize = 8;

/// An 8x8 float sample tile or coefficient tile.
pub type Block = [[f32; BLOCK_SIZE]; BLOCK_SIZE];

/// A mid-band DCT coefficient address within a block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CoeffPos {
    pub u: usize,
    pub v: usize,
}

/// A rectangular plane of 32-bit float samples (one color channel).
#[derive(Clone, Debug)]
pub struct Plane {
    pub w: usize,
    pub h: usize,
    pub data: Vec<f32>,
}

impl Plane {
    pub fn new(w: usize, h: usize, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), w * h);
        Plane { w, h, data }
    }

    fn sample_clamped(&self, x: i64, y: i64) -> f32 {
        if self.w == 0 || self.h == 0 {
            return 0.0;
        }
        let x = x.clamp(0, self.w as i64 - 1) as usize;
        let y = y.clamp(0, self.h as i64 - 1) as usize;
        self.data[y * self.w + x]
    }

    fn sample_bounded(&self, x: i64, y: i64) -> f32 {
        if x < 0 || y < 0 || x as usize >= self.w || y as usize >= self.h {
            return 0.0;
        }
        self.data[y as usize * self.w + x as usize]
    }

    /// Extracts the block at block-coordinates `(bx, by)` (pixel origin
    /// `(bx*8, by*8)`), clamping out-of-range reads to 0 — callers only
    /// read in-range blocks from a padded plane, so this path is inert in
    /// normal use and only guards malformed calls.
    pub fn get_block8(&self, bx: usize, by: usize) -> Block {
        let mut b = [[0.0f32; BLOCK_SIZE]; BLOCK_SIZE];
        let x0 = (bx * BLOCK_SIZE) as i64;
        let y0 = (by * BLOCK_SIZE) as i64;
        for j in 0..BLOCK_SIZE {
            for i in 0..BLOCK_SIZE {
                b[j][i] = self.sample_bounded(x0 + i as i64, y0 + j as i64);
            }
        }
        b
    }

    pub fn set_block8(&mut self, bx: usize, by: usize, block: &Block) {
        let x0 = bx * BLOCK_SIZE;
        let y0 = by * BLOCK_SIZE;
        for j in 0..BLOCK_SIZE {
            for i in 0..BLOCK_SIZE {
                let (x, y) = (x0 + i, y0 + j);
                if x < self.w && y < self.h {
                    self.data[y * self.w + x] = block[j][i];
                }
            }
        }
    }
}

fn round_up_8(n: usize) -> usize {
    (n + 7) / 8 * 8
}

/// Pads `plane` up to the next multiple of 8 in both dimensions by
/// replicating the last column/row (clamp-to-edge).
pub fn pad_to_8(plane: &Plane) -> Plane {
    if plane.w == 0 || plane.h == 0 {
        return Plane {
            w: 0,
            h: 0,
            data: Vec::new(),
        };
    }
    let w2 = round_up_8(plane.w);
    let h2 = round_up_8(plane.h);
    let mut data = vec![0.0f32; w2 * h2];
    for py in 0..h2 {
        for px in 0..w2 {
            data[py * w2 + px] = plane.sample_clamped(px as i64, py as i64);
        }
    }
    Plane { w: w2, h: h2, data }
}

/// Takes the top-left `w x h` subregion of a padded plane.
pub fn unpad(padded: &Plane, w: usize, h: usize) -> Plane {
    let mut data = vec![0.0f32; w * h];
    for py in 0..h {
        for px in 0..w {
            data[py * w + px] = if px < padded.w && py < padded.h {
                padded.data[py * padded.w + px]
            } else {
                0.0
            };
        }
    }
    Plane { w, h, data }
}

fn alpha(k: usize) -> f32 {
    if k == 0 {
        std::f32::consts::FRAC_1_SQRT_2
    } else {
        1.0
    }
}

fn cos_table() -> &'static [[f32; BLOCK_SIZE]; BLOCK_SIZE] {
    static TABLE: OnceLock<[[f32; BLOCK_SIZE]; BLOCK_SIZE]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [[0.0f32; BLOCK_SIZE]; BLOCK_SIZE];
        for u in 0..BLOCK_SIZE {
            for x in 0..BLOCK_SIZE {
                let angle = ((2 * x + 1) as f64 * u as f64 * std::f64::consts::PI) / 16.0;
                table[u][x] = angle.cos() as f32;
            }
        }
        table
    })
}

/// Forward 2D DCT-II of an 8x8 block.
pub fn dct8(block: &Block) -> Block {
    let c = cos_table();
    let mut coeff = [[0.0f32; BLOCK_SIZE]; BLOCK_SIZE];
    for v in 0..BLOCK_SIZE {
        for u in 0..BLOCK_SIZE {
            let mut sum = 0.0f32;
            for y in 0..BLOCK_SIZE {
                for x in 0..BLOCK_SIZE {
                    sum += block[y][x] * c[u][x] * c[v][y];
                }
            }
            coeff[v][u] = 0.25 * alpha(u) * alpha(v) * sum;
        }
    }
    coeff
}

/// Inverse 2D DCT-II of an 8x8 coefficient block.
pub fn idct8(coeff: &Block) -> Block {
    let c = cos_table();
    let mut block = [[0.0f32; BLOCK_SIZE]; BLOCK_SIZE];
    for y in 0..BLOCK_SIZE {
        for x in 0..BLOCK_SIZE {
            let mut sum = 0.0f32;
            for v in 0..BLOCK_SIZE {
                for u in 0..BLOCK_SIZE {
                    sum += alpha(u) * alpha(v) * coeff[v][u] * c[u][x] * c[v][y];
                }
            }
            block[y][x] = 0.25 * sum;
        }
    }
    block
}

pub fn clamp_block_to_byte_range(b: &mut Block) {
    for row in b.iter_mut() {
        for v in row.iter_mut() {
            *v = v.clamp(0.0, 255.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max_abs_diff(a: &Block, b: &Block) -> f32 {
        let mut m = 0.0f32;
        for y in 0..BLOCK_SIZE {
            for x in 0..BLOCK_SIZE {
                m = m.max((a[y][x] - b[y][x]).abs());
            }
        }
        m
    }

    #[test]
    fn dct_round_trip_within_tolerance() {
        let mut block = [[0.0f32; BLOCK_SIZE]; BLOCK_SIZE];
        let mut seed = 7u32;
        for y in 0..BLOCK_SIZE {
            for x in 0..BLOCK_SIZE {
                seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
                let v = ((seed >> 8) % 65) as f32 - 32.0;
                block[y][x] = v;
            }
        }
        let coeff = dct8(&block);
        let back = idct8(&coeff);
        assert!(max_abs_diff(&block, &back) <= 1e-3);
    }

    #[test]
    fn flat_block_has_dc_only() {
        let block = [[42.0f32; BLOCK_SIZE]; BLOCK_SIZE];
        let coeff = dct8(&block);
        for v in 0..BLOCK_SIZE {
            for u in 0..BLOCK_SIZE {
                if (u, v) != (0, 0) {
                    assert!(coeff[v][u].abs() <= 1e-3, "({u},{v}) = {}", coeff[v][u]);
                }
            }
        }
        assert!(coeff[0][0].abs() > 1e-3);
    }

    #[test]
    fn pad_then_unpad_round_trips() {
        let w = 10usize;
        let h = 13usize;
        let data: Vec<f32> = (0..w * h).map(|i| i as f32).collect();
        let plane = Plane::new(w, h, data.clone());
        let padded = pad_to_8(&plane);
        assert_eq!(padded.w % 8, 0);
        assert_eq!(padded.h % 8, 0);
        assert!(padded.w >= w && padded.h >= h);
        let back = unpad(&padded, w, h);
        assert_eq!(back.data, data);
    }

    #[test]
    fn pad_replicates_edges() {
        let w = 3usize;
        let h = 1usize;
        let plane = Plane::new(w, h, vec![1.0, 2.0, 3.0]);
        let padded = pad_to_8(&plane);
        assert_eq!(padded.w, 8);
        assert_eq!(padded.h, 8);
        for x in 3..8 {
            assert_eq!(padded.data[x], 3.0);
        }
        for row in 1..8 {
            assert_eq!(padded.data[row * 8], 1.0);
            assert_eq!(padded.data[row * 8 + 3], 3.0);
        }
    }

    #[test]
    fn block_get_set_round_trips() {
        let mut plane = Plane::new(16, 16, vec![0.0; 256]);
        let mut block = [[0.0f32; BLOCK_SIZE]; BLOCK_SIZE];
        for (j, row) in block.iter_mut().enumerate() {
            for (i, v) in row.iter_mut().enumerate() {
                *v = (j * 8 + i) as f32;
            }
        }
        plane.set_block8(1, 0, &block);
        let got = plane.get_block8(1, 0);
        assert_eq!(got, block);
    }
}
