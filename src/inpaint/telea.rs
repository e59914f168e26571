use image::{GrayImage, Rgb, RgbImage};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Pixel state during fast marching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flag {
    Known,
    Band,
    Inside,
}

/// Narrow band entry, ordered so the heap pops the smallest arrival time first
#[derive(Debug, Clone, Copy)]
struct BandCell {
    t: f32,
    idx: usize,
}

impl PartialEq for BandCell {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BandCell {}

impl PartialOrd for BandCell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BandCell {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .t
            .total_cmp(&self.t)
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

struct Field {
    width: usize,
    height: usize,
    flags: Vec<Flag>,
    t: Vec<f32>,
}

impl Field {
    /// Arrival time at (x, y) if it is already known or in the band
    fn known_t(&self, x: i64, y: i64) -> Option<f32> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        let idx = y as usize * self.width + x as usize;
        (self.flags[idx] != Flag::Inside).then(|| self.t[idx])
    }

    /// Eikonal update from the four quadrant pairs around (x, y)
    fn arrival_time(&self, x: i64, y: i64) -> f32 {
        let up = self.known_t(x, y - 1);
        let down = self.known_t(x, y + 1);
        let left = self.known_t(x - 1, y);
        let right = self.known_t(x + 1, y);
        [
            solve(up, left),
            solve(down, left),
            solve(up, right),
            solve(down, right),
        ]
        .into_iter()
        .fold(f32::INFINITY, f32::min)
    }

    /// Central-difference gradient of T, one-sided at the band edge
    fn gradient(&self, x: i64, y: i64) -> (f32, f32) {
        let center = self.t[y as usize * self.width + x as usize];
        let axis = |prev: Option<f32>, next: Option<f32>| match (prev, next) {
            (Some(p), Some(n)) => (n - p) * 0.5,
            (None, Some(n)) => n - center,
            (Some(p), None) => center - p,
            (None, None) => 0.0,
        };
        (
            axis(self.known_t(x - 1, y), self.known_t(x + 1, y)),
            axis(self.known_t(x, y - 1), self.known_t(x, y + 1)),
        )
    }
}

fn solve(a: Option<f32>, b: Option<f32>) -> f32 {
    match (a, b) {
        (Some(t1), Some(t2)) => {
            let diff = t1 - t2;
            let disc = 2.0 - diff * diff;
            if disc > 0.0 {
                let r = disc.sqrt();
                let s = (t1 + t2 - r) * 0.5;
                if s >= t1 && s >= t2 {
                    return s;
                }
                let s = s + r;
                if s >= t1 && s >= t2 {
                    return s;
                }
            }
            1.0 + t1.min(t2)
        }
        (Some(t), None) | (None, Some(t)) => 1.0 + t,
        (None, None) => f32::INFINITY,
    }
}

/// Fill masked pixels with Telea's fast marching method
///
/// Nonzero mask pixels are reconstructed from known pixels within `radius`,
/// marching inward from the mask boundary. Unmasked pixels are never touched.
pub fn inpaint_telea(image: &mut RgbImage, mask: &GrayImage, radius: f32) {
    let _span = tracing::debug_span!("inpaint_telea").entered();

    assert_eq!(
        image.dimensions(),
        mask.dimensions(),
        "inpainting mask must match the frame"
    );

    let width = image.width() as usize;
    let height = image.height() as usize;
    let mut field = Field {
        width,
        height,
        flags: vec![Flag::Known; width * height],
        t: vec![0.0; width * height],
    };

    let mut inside = 0usize;
    for (idx, value) in mask.as_raw().iter().enumerate() {
        if *value != 0 {
            field.flags[idx] = Flag::Inside;
            field.t[idx] = f32::INFINITY;
            inside += 1;
        }
    }
    if inside == 0 || inside == width * height {
        return;
    }
    tracing::debug!("Inpainting {} pixels (radius {})", inside, radius);

    let mut heap = BinaryHeap::new();
    for idx in 0..width * height {
        if field.flags[idx] != Flag::Known {
            continue;
        }
        let (x, y) = ((idx % width) as i64, (idx / width) as i64);
        let borders_region = neighbors4(x, y, width, height)
            .any(|n| field.flags[n] == Flag::Inside);
        if borders_region {
            field.flags[idx] = Flag::Band;
            heap.push(BandCell { t: 0.0, idx });
        }
    }

    let radius = radius.max(1.0);
    let reach = radius.ceil() as i64;

    while let Some(BandCell { idx, .. }) = heap.pop() {
        field.flags[idx] = Flag::Known;
        let (x, y) = ((idx % width) as i64, (idx / width) as i64);

        for n in neighbors4(x, y, width, height) {
            if field.flags[n] != Flag::Inside {
                continue;
            }
            let (nx, ny) = ((n % width) as i64, (n / width) as i64);
            field.t[n] = field.arrival_time(nx, ny);

            if let Some(px) = weighted_fill(image, &field, nx, ny, radius, reach) {
                image.put_pixel(nx as u32, ny as u32, px);
            }

            field.flags[n] = Flag::Band;
            heap.push(BandCell { t: field.t[n], idx: n });
        }
    }
}

fn weighted_fill(image: &RgbImage, field: &Field, x: i64, y: i64, radius: f32, reach: i64) -> Option<Rgb<u8>> {
    let (grad_x, grad_y) = field.gradient(x, y);
    let t_here = field.t[y as usize * field.width + x as usize];

    let mut acc = [0.0f32; 3];
    let mut total = 0.0f32;
    for ky in (y - reach)..=(y + reach) {
        for kx in (x - reach)..=(x + reach) {
            if kx == x && ky == y {
                continue;
            }
            let Some(t_there) = field.known_t(kx, ky) else {
                continue;
            };
            let (rx, ry) = ((x - kx) as f32, (y - ky) as f32);
            let dist_sq = rx * rx + ry * ry;
            if dist_sq > radius * radius {
                continue;
            }

            let dst = 1.0 / (dist_sq * dist_sq.sqrt());
            let lev = 1.0 / (1.0 + (t_there - t_here).abs());
            let mut dir = rx * grad_x + ry * grad_y;
            if dir.abs() <= 0.01 {
                dir = 1.0e-6;
            }
            let weight = (dst * lev * dir).abs();

            let px = image.get_pixel(kx as u32, ky as u32);
            for c in 0..3 {
                acc[c] += weight * px[c] as f32;
            }
            total += weight;
        }
    }

    (total > 0.0).then(|| {
        Rgb(acc.map(|v| (v / total).round().clamp(0.0, 255.0) as u8))
    })
}

fn neighbors4(x: i64, y: i64, width: usize, height: usize) -> impl Iterator<Item = usize> {
    [(x, y - 1), (x - 1, y), (x + 1, y), (x, y + 1)]
        .into_iter()
        .filter(move |&(nx, ny)| nx >= 0 && ny >= 0 && nx < width as i64 && ny < height as i64)
        .map(move |(nx, ny)| ny as usize * width + nx as usize)
}
