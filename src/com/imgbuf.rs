use std::mem;

use super::picture::Plane;
use super::*;

/// Pixel storage for one square block (prediction, residual or reconstruction).
///
/// There is deliberately no `Clone`: a buffer belongs to exactly one decision
/// point, duplicating it is an explicit [`SmallImageBuffer::copy_to`].
#[derive(Debug)]
pub struct SmallImageBuffer<T = pel> {
    buf: Box<[T]>,
    stride: u16,
    width: u16,
    height: u16,
}

impl<T: Copy + Default> SmallImageBuffer<T> {
    pub fn new(log2_size: u8) -> Self {
        let size = 1usize << log2_size;
        SmallImageBuffer {
            buf: vec![T::default(); size * size].into_boxed_slice(),
            stride: size as u16,
            width: size as u16,
            height: size as u16,
        }
    }

    pub fn width(&self) -> usize {
        self.width as usize
    }

    pub fn height(&self) -> usize {
        self.height as usize
    }

    /// Samples per row.
    pub fn stride(&self) -> usize {
        self.stride as usize
    }

    pub fn bytes_per_sample(&self) -> usize {
        mem::size_of::<T>()
    }

    pub fn data(&self) -> &[T] {
        &self.buf
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.buf
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> T {
        self.buf[y * self.stride() + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: T) {
        let stride = self.stride();
        self.buf[y * stride + x] = v;
    }

    pub fn row(&self, y: usize) -> &[T] {
        let s = y * self.stride();
        &self.buf[s..s + self.width()]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        let s = y * self.stride();
        let w = self.width();
        &mut self.buf[s..s + w]
    }

    pub fn fill(&mut self, v: T) {
        for s in self.buf.iter_mut() {
            *s = v;
        }
    }

    pub fn copy_to(&self, b: &mut SmallImageBuffer<T>) {
        assert_eq!(b.height, self.height);
        assert_eq!(b.width, self.width);
        b.buf.copy_from_slice(&self.buf);
    }

    /// View of this buffer placed at absolute position `(x0, y0)`.
    pub fn localized(&self, x0: i32, y0: i32) -> LocalizedSubImage<'_, T> {
        LocalizedSubImage {
            buf: &self.buf,
            stride: self.stride(),
            x0,
            y0,
            width: self.width(),
            height: self.height(),
        }
    }

    pub fn localized_mut(&mut self, x0: i32, y0: i32) -> LocalizedSubImageMut<'_, T> {
        let (stride, width, height) = (self.stride(), self.width(), self.height());
        LocalizedSubImageMut {
            buf: &mut self.buf,
            stride,
            x0,
            y0,
            width,
            height,
        }
    }
}

/// A small image patch addressed with the coordinates of the picture it was cut from.
pub struct LocalizedSubImage<'a, T> {
    buf: &'a [T],
    stride: usize,
    x0: i32,
    y0: i32,
    width: usize,
    height: usize,
}

impl<'a, T: Copy> LocalizedSubImage<'a, T> {
    pub fn left(&self) -> i32 {
        self.x0
    }

    pub fn top(&self) -> i32 {
        self.y0
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x0
            && y >= self.y0
            && x < self.x0 + self.width as i32
            && y < self.y0 + self.height as i32
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> T {
        debug_assert!(self.contains(x, y));
        self.buf[(y - self.y0) as usize * self.stride + (x - self.x0) as usize]
    }

    /// Row `y` (absolute), starting at the patch's left edge.
    pub fn row(&self, y: i32) -> &'a [T] {
        let s = (y - self.y0) as usize * self.stride;
        &self.buf[s..s + self.width]
    }

    /// Writes the patch into `plane`, dropping samples that fall outside it.
    pub fn copy_to_image(&self, plane: &mut Plane<T>)
    where
        T: Default,
    {
        copy_patch_to_plane(
            self.buf,
            self.stride,
            self.x0,
            self.y0,
            self.width,
            self.height,
            plane,
        );
    }
}

/// Writable variant of [`LocalizedSubImage`].
pub struct LocalizedSubImageMut<'a, T> {
    buf: &'a mut [T],
    stride: usize,
    x0: i32,
    y0: i32,
    width: usize,
    height: usize,
}

impl<'a, T: Copy + Default> LocalizedSubImageMut<'a, T> {
    pub fn left(&self) -> i32 {
        self.x0
    }

    pub fn top(&self) -> i32 {
        self.y0
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x0
            && y >= self.y0
            && x < self.x0 + self.width as i32
            && y < self.y0 + self.height as i32
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> T {
        debug_assert!(self.contains(x, y));
        self.buf[(y - self.y0) as usize * self.stride + (x - self.x0) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: i32, y: i32, v: T) {
        debug_assert!(self.contains(x, y));
        self.buf[(y - self.y0) as usize * self.stride + (x - self.x0) as usize] = v;
    }

    pub fn row_mut(&mut self, y: i32) -> &mut [T] {
        let s = (y - self.y0) as usize * self.stride;
        &mut self.buf[s..s + self.width]
    }

    pub fn copy_to_image(&self, plane: &mut Plane<T>) {
        copy_patch_to_plane(
            self.buf,
            self.stride,
            self.x0,
            self.y0,
            self.width,
            self.height,
            plane,
        );
    }

    /// Fills the patch from `plane`; samples outside the plane repeat its nearest edge.
    pub fn copy_from_image(&mut self, plane: &Plane<T>) {
        for dy in 0..self.height {
            let py = clip(self.y0 + dy as i32, 0, plane.height as i32 - 1) as usize;
            for dx in 0..self.width {
                let px = clip(self.x0 + dx as i32, 0, plane.width as i32 - 1) as usize;
                self.buf[dy * self.stride + dx] = plane.p(px, py);
            }
        }
    }
}

fn copy_patch_to_plane<T: Copy + Default>(
    buf: &[T],
    stride: usize,
    x0: i32,
    y0: i32,
    width: usize,
    height: usize,
    plane: &mut Plane<T>,
) {
    for dy in 0..height {
        let py = y0 + dy as i32;
        if py < 0 || py >= plane.height as i32 {
            continue;
        }
        for dx in 0..width {
            let px = x0 + dx as i32;
            if px < 0 || px >= plane.width as i32 {
                continue;
            }
            plane.set(px as usize, py as usize, buf[dy * stride + dx]);
        }
    }
}
