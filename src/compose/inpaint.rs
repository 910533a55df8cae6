use std::cmp::Ordering;
use std::collections::BinaryHeap;

use image::{GrayImage, Luma, RgbImage};

use crate::ocr::BoundingBox;

pub const MASK_PAINT: u8 = 255;
pub const DEFAULT_INPAINT_RADIUS: u32 = 3;

/// Region reconstruction backend. Pixels where `mask` is non-zero are
/// replaced; all other pixels must come back unchanged.
pub trait Inpainter: Send + Sync {
    fn inpaint(&self, image: &RgbImage, mask: &GrayImage, radius: u32) -> RgbImage;
}

/// Mask covering the placeholder rectangle, corners inclusive.
pub fn placeholder_mask(width: u32, height: u32, bbox: &BoundingBox) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    if width == 0 || height == 0 || bbox.x >= width || bbox.y >= height {
        return mask;
    }
    let x_end = bbox.x.saturating_add(bbox.width).min(width - 1);
    let y_end = bbox.y.saturating_add(bbox.height).min(height - 1);
    for y in bbox.y..=y_end {
        for x in bbox.x..=x_end {
            mask.put_pixel(x, y, Luma([MASK_PAINT]));
        }
    }
    mask
}

/// Fast marching inpainting after Telea (2004).
///
/// Masked pixels are filled in order of their distance to the known region;
/// each one is a weighted blend of known neighbours within `radius`, favouring
/// close pixels, pixels along the marching direction and pixels on the same
/// level set.
#[derive(Debug, Clone, Copy, Default)]
pub struct TeleaInpainter;

impl Inpainter for TeleaInpainter {
    fn inpaint(&self, image: &RgbImage, mask: &GrayImage, radius: u32) -> RgbImage {
        let mut field = MarchField::new(image, mask);
        if field.known_count == 0 || field.inside_count == 0 {
            tracing::debug!(
                inside = field.inside_count,
                "nothing to inpaint or no known pixels, image left unchanged"
            );
            return image.clone();
        }
        let range = radius.max(1) as i64;
        field.compute_outside_distance(range * 2);
        field.march_inside(range);
        field.output
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Flag {
    Known,
    Band,
    Inside,
}

#[derive(Clone, Copy)]
struct Candidate {
    t: f32,
    idx: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    // Reversed so that `BinaryHeap` pops the smallest arrival time first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .t
            .total_cmp(&self.t)
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

const FAR: f32 = 1.0e6;
const NEIGHBOURS: [(i64, i64); 4] = [(-1, 0), (0, -1), (1, 0), (0, 1)];

struct MarchField {
    width: i64,
    height: i64,
    flags: Vec<Flag>,
    t: Vec<f32>,
    output: RgbImage,
    heap: BinaryHeap<Candidate>,
    known_count: usize,
    inside_count: usize,
}

impl MarchField {
    fn new(image: &RgbImage, mask: &GrayImage) -> Self {
        let (w, h) = image.dimensions();
        let width = w as i64;
        let height = h as i64;
        let len = (w as usize) * (h as usize);
        let mut flags = vec![Flag::Known; len];
        let mut t = vec![0.0f32; len];
        let mut inside_count = 0;

        for y in 0..h {
            for x in 0..w {
                let painted = mask
                    .get_pixel_checked(x, y)
                    .is_some_and(|value| value[0] != 0);
                if painted {
                    let idx = (y as usize) * (w as usize) + x as usize;
                    flags[idx] = Flag::Inside;
                    t[idx] = FAR;
                    inside_count += 1;
                }
            }
        }

        let mut field = Self {
            width,
            height,
            flags,
            t,
            output: image.clone(),
            heap: BinaryHeap::new(),
            known_count: len - inside_count,
            inside_count,
        };

        // Known pixels touching the hole form the initial narrow band.
        for y in 0..height {
            for x in 0..width {
                let idx = field.index(x, y);
                if field.flags[idx] != Flag::Known {
                    continue;
                }
                let touches_hole = NEIGHBOURS.iter().any(|(dx, dy)| {
                    field
                        .checked_index(x + dx, y + dy)
                        .is_some_and(|n| field.flags[n] == Flag::Inside)
                });
                if touches_hole {
                    field.flags[idx] = Flag::Band;
                    field.heap.push(Candidate { t: 0.0, idx });
                }
            }
        }
        field
    }

    fn index(&self, x: i64, y: i64) -> usize {
        (y * self.width + x) as usize
    }

    fn checked_index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            None
        } else {
            Some(self.index(x, y))
        }
    }

    fn coords(&self, idx: usize) -> (i64, i64) {
        let idx = idx as i64;
        (idx % self.width, idx / self.width)
    }

    /// Negative distances on the known side of the boundary, up to `limit`.
    ///
    /// They give the level-set gradient a sensible direction right at the
    /// boundary, where the inside distances alone are all zero.
    fn compute_outside_distance(&mut self, limit: i64) {
        let len = self.flags.len();
        let mut flags = vec![Flag::Known; len];
        let mut t = vec![0.0f32; len];
        let mut heap = BinaryHeap::new();

        // March outward: the hole acts as the known region, the rest is unknown.
        for idx in 0..len {
            match self.flags[idx] {
                Flag::Inside => flags[idx] = Flag::Known,
                Flag::Band => {
                    flags[idx] = Flag::Band;
                    heap.push(Candidate { t: 0.0, idx });
                }
                Flag::Known => {
                    flags[idx] = Flag::Inside;
                    t[idx] = FAR;
                }
            }
        }

        let mut reached = Vec::new();
        while let Some(Candidate { idx, .. }) = heap.pop() {
            if flags[idx] == Flag::Known {
                continue;
            }
            flags[idx] = Flag::Known;
            reached.push(idx);
            if t[idx] > limit as f32 {
                break;
            }
            let (x, y) = self.coords(idx);
            for (dx, dy) in NEIGHBOURS {
                let Some(n) = self.checked_index(x + dx, y + dy) else {
                    continue;
                };
                if flags[n] != Flag::Inside {
                    continue;
                }
                let (nx, ny) = (x + dx, y + dy);
                let arrival = self.solve_around(nx, ny, &flags, &t);
                if arrival < t[n] {
                    t[n] = arrival;
                    heap.push(Candidate { t: arrival, idx: n });
                }
            }
        }

        for idx in reached {
            if self.flags[idx] != Flag::Inside {
                self.t[idx] = -t[idx];
            }
        }
    }

    fn march_inside(&mut self, range: i64) {
        while let Some(Candidate { idx, .. }) = self.heap.pop() {
            if self.flags[idx] == Flag::Known {
                continue;
            }
            self.flags[idx] = Flag::Known;
            let (x, y) = self.coords(idx);
            for (dx, dy) in NEIGHBOURS {
                let (nx, ny) = (x + dx, y + dy);
                let Some(n) = self.checked_index(nx, ny) else {
                    continue;
                };
                if self.flags[n] != Flag::Inside {
                    continue;
                }
                let arrival = self.solve_around(nx, ny, &self.flags, &self.t);
                self.t[n] = arrival;
                self.fill_pixel(nx, ny, range);
                self.flags[n] = Flag::Band;
                self.heap.push(Candidate { t: arrival, idx: n });
            }
        }
    }

    /// Smallest eikonal solution over the four quadrants around (x, y).
    fn solve_around(&self, x: i64, y: i64, flags: &[Flag], t: &[f32]) -> f32 {
        let pairs = [
            ((x, y - 1), (x - 1, y)),
            ((x, y + 1), (x - 1, y)),
            ((x, y - 1), (x + 1, y)),
            ((x, y + 1), (x + 1, y)),
        ];
        pairs
            .iter()
            .map(|(a, b)| self.solve(*a, *b, flags, t))
            .fold(FAR, f32::min)
    }

    fn solve(&self, a: (i64, i64), b: (i64, i64), flags: &[Flag], t: &[f32]) -> f32 {
        let sample = |(x, y): (i64, i64)| {
            self.checked_index(x, y)
                .map(|idx| (t[idx], flags[idx] != Flag::Inside))
                .unwrap_or((FAR, false))
        };
        let (t1, known1) = sample(a);
        let (t2, known2) = sample(b);
        match (known1, known2) {
            (true, true) => {
                let diff = t1 - t2;
                if diff.abs() >= 1.0 {
                    1.0 + t1.min(t2)
                } else {
                    (t1 + t2 + (2.0 - diff * diff).sqrt()) * 0.5
                }
            }
            (true, false) => 1.0 + t1,
            (false, true) => 1.0 + t2,
            (false, false) => FAR,
        }
    }

    fn is_usable(&self, x: i64, y: i64) -> bool {
        self.checked_index(x, y)
            .is_some_and(|idx| self.flags[idx] != Flag::Inside)
    }

    /// Central difference where both sides are usable, one-sided otherwise.
    fn gradient<F>(&self, x: i64, y: i64, value: F) -> (f32, f32)
    where
        F: Fn(i64, i64) -> f32,
    {
        let axis = |(ax, ay): (i64, i64)| {
            let forward = self.is_usable(x + ax, y + ay);
            let backward = self.is_usable(x - ax, y - ay);
            match (forward, backward) {
                (true, true) => (value(x + ax, y + ay) - value(x - ax, y - ay)) * 0.5,
                (true, false) => value(x + ax, y + ay) - value(x, y),
                (false, true) => value(x, y) - value(x - ax, y - ay),
                (false, false) => 0.0,
            }
        };
        (axis((1, 0)), axis((0, 1)))
    }

    fn fill_pixel(&mut self, x: i64, y: i64, range: i64) {
        let center_t = self.t[self.index(x, y)];
        let (grad_tx, grad_ty) = self.gradient(x, y, |px, py| self.t[self.index(px, py)]);

        let mut weighted = [0.0f32; 3];
        let mut jx = [0.0f32; 3];
        let mut jy = [0.0f32; 3];
        let mut total = 0.0f32;

        for ny in (y - range)..=(y + range) {
            for nx in (x - range)..=(x + range) {
                let (rx, ry) = ((x - nx) as f32, (y - ny) as f32);
                let len_sq = rx * rx + ry * ry;
                if len_sq == 0.0 || len_sq > (range * range) as f32 {
                    continue;
                }
                let Some(n) = self.checked_index(nx, ny) else {
                    continue;
                };
                if self.flags[n] == Flag::Inside {
                    continue;
                }

                let mut dir = rx * grad_tx + ry * grad_ty;
                if dir.abs() <= 0.01 {
                    dir = 1.0e-6;
                }
                let dst = 1.0 / (len_sq * len_sq.sqrt());
                let lev = 1.0 / (1.0 + (self.t[n] - center_t).abs());
                let weight = (dir * dst * lev).abs();

                let pixel = self.output.get_pixel(nx as u32, ny as u32).0;
                for channel in 0..3 {
                    let (gx, gy) = self.gradient(nx, ny, |px, py| {
                        self.output.get_pixel(px as u32, py as u32).0[channel] as f32
                    });
                    weighted[channel] += weight * pixel[channel] as f32;
                    jx[channel] -= weight * gx * rx;
                    jy[channel] -= weight * gy * ry;
                }
                total += weight;
            }
        }

        if total <= 0.0 {
            return;
        }
        let mut filled = [0u8; 3];
        for channel in 0..3 {
            let norm = (jx[channel] * jx[channel] + jy[channel] * jy[channel]).sqrt() + 1.0e-20;
            let value = weighted[channel] / total + (jx[channel] + jy[channel]) / norm;
            filled[channel] = value.round().clamp(0.0, 255.0) as u8;
        }
        self.output.put_pixel(x as u32, y as u32, image::Rgb(filled));
    }
}
