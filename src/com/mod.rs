pub mod context;
pub mod imgbuf;
pub mod picture;
pub mod pool;
pub mod ps;
pub(crate) mod tracer;

/*****************************************************************************
 * types
 *****************************************************************************/
#[allow(non_camel_case_types)]
pub type pel = i16;

pub const Y_C: usize = 0; /* Y luma */
pub const U_C: usize = 1; /* Cb Chroma */
pub const V_C: usize = 2; /* Cr Chroma */
pub const N_C: usize = 3; /* number of color component */

/* three-bit log2 size field of a tree node */
pub const MAX_NODE_LOG2: usize = 7;

/* granularity of the per-pixel metadata maps */
pub const MIN_PU_LOG2: usize = 2;
pub const MIN_PU_SIZE: usize = (1 << MIN_PU_LOG2);

/* motion reference lists */
pub const REFP_0: usize = 0;
pub const REFP_NUM: usize = 2;

pub const MV_X: usize = 0;
pub const MV_Y: usize = 1;
pub const MV_D: usize = 2;

/* intra prediction modes */
pub const INTRA_PLANAR: u8 = 0;
pub const INTRA_DC: u8 = 1;

/// Horizontal position of quadrant `idx` (raster order) of a block at `x0`.
#[inline(always)]
pub fn child_x(x0: u16, idx: usize, log2_size: u8) -> u16 {
    x0 + (((idx & 1) as u16) << (log2_size - 1))
}

/// Vertical position of quadrant `idx` (raster order) of a block at `y0`.
#[inline(always)]
pub fn child_y(y0: u16, idx: usize, log2_size: u8) -> u16 {
    y0 + (((idx >> 1) as u16) << (log2_size - 1))
}

/// Z-scan order of the minimum block holding `(x, y)`, relative to its CTB.
#[inline]
pub fn z_order(x: u16, y: u16, log2_ctb_size: u8) -> u32 {
    let mask = (1u16 << log2_ctb_size) - 1;
    let bx = ((x & mask) >> MIN_PU_LOG2) as u32;
    let by = ((y & mask) >> MIN_PU_LOG2) as u32;
    let mut z = 0;
    for bit in 0..(log2_ctb_size as u32 - MIN_PU_LOG2 as u32) {
        z |= ((bx >> bit) & 1) << (2 * bit);
        z |= ((by >> bit) & 1) << (2 * bit + 1);
    }
    z
}

#[inline(always)]
pub fn clip<T: PartialOrd>(v: T, min: T, max: T) -> T {
    if v < min {
        min
    } else if v > max {
        max
    } else {
        v
    }
}

#[inline(always)]
pub fn clip_pel(v: i32, bit_depth: u8) -> pel {
    clip(v, 0, (1 << bit_depth) - 1) as pel
}
