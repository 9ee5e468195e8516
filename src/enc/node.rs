use std::fmt;

use super::arena::NodeArena;
use crate::com::*;

pub const DUMPTREE_INTRA_PREDICTION: u32 = 1 << 0;
pub const DUMPTREE_RESIDUAL: u32 = 1 << 1;
pub const DUMPTREE_RECONSTRUCTION: u32 = 1 << 2;
pub const DUMPTREE_ALL: u32 = 0xFFFF;

/// Position and size shared by coding and transform blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeGeom {
    pub x: u16,
    pub y: u16,
    pub log2_size: u8,
}

impl NodeGeom {
    pub fn new(x: u16, y: u16, log2_size: u8) -> Self {
        assert!(
            log2_size as usize <= MAX_NODE_LOG2,
            "block size 2^{} exceeds the node size field",
            log2_size
        );
        NodeGeom { x, y, log2_size }
    }

    #[inline]
    pub fn size(&self) -> u16 {
        1 << self.log2_size
    }

    #[inline]
    pub fn contains(&self, x: u16, y: u16) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.size() && y < self.y + self.size()
    }

    /// Geometry of quadrant `idx` in raster order.
    pub fn child(&self, idx: usize) -> NodeGeom {
        assert!(self.log2_size > 0, "1x1 block cannot be split");
        NodeGeom::new(
            child_x(self.x, idx, self.log2_size),
            child_y(self.y, idx, self.log2_size),
            self.log2_size - 1,
        )
    }

    /// Quadrant of this block holding `(x, y)`.
    #[inline]
    pub fn quadrant_of(&self, x: u16, y: u16) -> usize {
        let half = self.size() >> 1;
        let right = (x >= self.x + half) as usize;
        let bottom = (y >= self.y + half) as usize;
        right + 2 * bottom
    }

    /// Lies completely inside a `width` x `height` picture.
    pub fn inside(&self, width: u16, height: u16) -> bool {
        self.x as u32 + self.size() as u32 <= width as u32
            && self.y as u32 + self.size() as u32 <= height as u32
    }
}

/// Debug dump of a (sub)tree.
pub trait DumpTree {
    fn debug_dump_tree(
        &self,
        arena: &NodeArena,
        out: &mut dyn fmt::Write,
        flags: u32,
        indent: usize,
    ) -> fmt::Result;
}

pub(crate) fn write_indent(out: &mut dyn fmt::Write, indent: usize) -> fmt::Result {
    write!(out, "{:width$}", "", width = indent * 2)
}
