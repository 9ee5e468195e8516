use super::*;
use crate::api::PredMode;

/// One component of a picture, without padding.
#[derive(Debug, Clone, Default)]
pub struct Plane<T: Copy + Default> {
    data: Vec<T>,
    pub width: usize,
    pub height: usize,
    pub stride: usize,
}

impl<T: Copy + Default> Plane<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Plane {
            data: vec![T::default(); width * height],
            width,
            height,
            stride: width,
        }
    }

    #[inline]
    pub fn p(&self, x: usize, y: usize) -> T {
        self.data[y * self.stride + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: T) {
        self.data[y * self.stride + x] = v;
    }

    pub fn row(&self, y: usize) -> &[T] {
        &self.data[y * self.stride..y * self.stride + self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        &mut self.data[y * self.stride..y * self.stride + self.width]
    }

    pub fn fill(&mut self, v: T) {
        for s in self.data.iter_mut() {
            *s = v;
        }
    }
}

/// A 4:2:0 picture together with the per-pixel prediction-mode map that the
/// mode decision publishes while candidates are being tried.
#[derive(Debug, Clone)]
pub struct Picture {
    pub planes: [Plane<pel>; N_C],
    pub bit_depth: u8,
    pub poc: u64,
    pred_mode: Vec<PredMode>,
    w_pu: usize,
    h_pu: usize,
}

impl Picture {
    pub fn new(width: usize, height: usize, bit_depth: u8) -> Self {
        let w_pu = (width + MIN_PU_SIZE - 1) >> MIN_PU_LOG2;
        let h_pu = (height + MIN_PU_SIZE - 1) >> MIN_PU_LOG2;
        Picture {
            planes: [
                Plane::new(width, height),
                Plane::new((width + 1) >> 1, (height + 1) >> 1),
                Plane::new((width + 1) >> 1, (height + 1) >> 1),
            ],
            bit_depth,
            poc: 0,
            pred_mode: vec![PredMode::Intra; w_pu * h_pu],
            w_pu,
            h_pu,
        }
    }

    pub fn width(&self) -> usize {
        self.planes[Y_C].width
    }

    pub fn height(&self) -> usize {
        self.planes[Y_C].height
    }

    /// Sets the prediction mode of the square block at `(x, y)` of size `1 << log2_size`.
    pub fn set_pred_mode(&mut self, x: u16, y: u16, log2_size: u8, mode: PredMode) {
        let x0 = x as usize >> MIN_PU_LOG2;
        let y0 = y as usize >> MIN_PU_LOG2;
        let n = 1usize << (log2_size as usize).saturating_sub(MIN_PU_LOG2);
        for py in y0..(y0 + n).min(self.h_pu) {
            for px in x0..(x0 + n).min(self.w_pu) {
                self.pred_mode[py * self.w_pu + px] = mode;
            }
        }
    }

    pub fn get_pred_mode(&self, x: u16, y: u16) -> PredMode {
        let px = x as usize >> MIN_PU_LOG2;
        let py = y as usize >> MIN_PU_LOG2;
        self.pred_mode[py * self.w_pu + px]
    }

    /// Sum of squared differences against `other` for one component.
    pub fn ssd(&self, other: &Picture, c_idx: usize) -> u64 {
        let a = &self.planes[c_idx];
        let b = &other.planes[c_idx];
        let mut sum = 0u64;
        for y in 0..a.height {
            for (&s, &t) in a.row(y).iter().zip(b.row(y).iter()) {
                let d = s as i64 - t as i64;
                sum += (d * d) as u64;
            }
        }
        sum
    }

    pub fn psnr(&self, other: &Picture, c_idx: usize) -> f64 {
        let plane = &self.planes[c_idx];
        let n = (plane.width * plane.height) as f64;
        let ssd = self.ssd(other, c_idx) as f64;
        let max = ((1u32 << self.bit_depth) - 1) as f64;
        if ssd == 0.0 {
            return 100.0;
        }
        10.0 * (max * max * n / ssd).log10()
    }
}
