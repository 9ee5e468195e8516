use std::fmt;

use super::arena::*;
use super::node::*;
use crate::com::imgbuf::*;
use crate::com::picture::Picture;
use crate::com::*;

/// Residual data of an unsplit transform block.
#[derive(Debug, Default)]
pub struct TbLeaf {
    /* empty until alloc_coeff_memory() */
    pub coeff: [Vec<i16>; N_C],
    pub skip_transform: [[bool; 2]; N_C],
    pub explicit_rdpcm: [[u8; 2]; N_C],
}

#[derive(Debug)]
pub enum TbContent {
    Split([TbIdx; 4]),
    Leaf(TbLeaf),
}

/// A node of the residual quad-tree below a coding block.
#[derive(Debug)]
pub struct EncTb {
    pub geom: NodeGeom,
    pub parent: Option<TbIdx>,
    pub cb: CbIdx,
    pub slot: TbSlot,

    pub trafo_depth: u8,
    pub blk_idx: u8,

    pub intra_mode: u8,
    // in NxN partitions the chroma mode follows the top-left child
    pub intra_mode_chroma: u8,

    pub cbf: [bool; N_C],

    /* filled in by the search that decides the final block size */
    pub intra_prediction: [Option<SmallImageBuffer>; N_C],
    pub residual: [Option<SmallImageBuffer>; N_C],

    /* materialized on demand, never for discarded candidates */
    reconstruction: [Option<SmallImageBuffer>; N_C],

    pub content: TbContent,

    // for this level of the tree including all children
    pub distortion: f32,
    pub rate: f32,
    pub rate_without_cbf_chroma: f32,
}

impl EncTb {
    pub fn new(x: u16, y: u16, log2_size: u8, cb: CbIdx) -> Self {
        EncTb {
            geom: NodeGeom::new(x, y, log2_size),
            parent: None,
            cb,
            slot: TbSlot::Detached,
            trafo_depth: 0,
            blk_idx: 0,
            intra_mode: INTRA_DC,
            intra_mode_chroma: INTRA_DC,
            cbf: [false; N_C],
            intra_prediction: [None, None, None],
            residual: [None, None, None],
            reconstruction: [None, None, None],
            content: TbContent::Leaf(TbLeaf::default()),
            distortion: 0.0,
            rate: 0.0,
            rate_without_cbf_chroma: 0.0,
        }
    }

    /// A fresh leaf at the same position, depth and prediction modes.
    pub fn clone_template(&self) -> Self {
        let mut tb = EncTb::new(self.geom.x, self.geom.y, self.geom.log2_size, self.cb);
        tb.parent = self.parent;
        tb.slot = self.slot;
        tb.trafo_depth = self.trafo_depth;
        tb.blk_idx = self.blk_idx;
        tb.intra_mode = self.intra_mode;
        tb.intra_mode_chroma = self.intra_mode_chroma;
        tb
    }

    #[inline]
    pub fn is_split(&self) -> bool {
        matches!(self.content, TbContent::Split(_))
    }

    pub fn children(&self) -> Option<&[TbIdx; 4]> {
        match &self.content {
            TbContent::Split(children) => Some(children),
            TbContent::Leaf(_) => None,
        }
    }

    pub fn leaf(&self) -> Option<&TbLeaf> {
        match &self.content {
            TbContent::Leaf(leaf) => Some(leaf),
            TbContent::Split(_) => None,
        }
    }

    pub fn leaf_mut(&mut self) -> Option<&mut TbLeaf> {
        match &mut self.content {
            TbContent::Leaf(leaf) => Some(leaf),
            TbContent::Split(_) => None,
        }
    }

    pub fn is_zero_block(&self) -> bool {
        !self.cbf[Y_C] && !self.cbf[U_C] && !self.cbf[V_C]
    }

    pub fn alloc_coeff_memory(&mut self, c_idx: usize, tb_size: usize) {
        match &mut self.content {
            TbContent::Leaf(leaf) => leaf.coeff[c_idx] = vec![0; tb_size * tb_size],
            TbContent::Split(_) => panic!("coefficients requested for a split transform block"),
        }
    }

    /// Chroma block `(x, y, log2_size)` in chroma samples coded by this block, if any.
    ///
    /// 4x4 luma blocks carry no chroma of their own: the 4x4 chroma block of the
    /// enclosing 8x8 area travels with the last quadrant.
    pub fn chroma_block(&self) -> Option<(u16, u16, u8)> {
        let g = &self.geom;
        if g.log2_size > 2 {
            Some((g.x >> 1, g.y >> 1, g.log2_size - 1))
        } else if self.blk_idx == 3 {
            Some(((g.x - 4) >> 1, (g.y - 4) >> 1, 2))
        } else {
            None
        }
    }

    /// Block of component `c_idx` coded by this transform block, in that component's samples.
    pub fn component_block(&self, c_idx: usize) -> Option<(u16, u16, u8)> {
        if c_idx == Y_C {
            Some((self.geom.x, self.geom.y, self.geom.log2_size))
        } else {
            self.chroma_block()
        }
    }

    pub fn reconstruction(&self, c_idx: usize) -> Option<&SmallImageBuffer> {
        self.reconstruction[c_idx].as_ref()
    }

    pub fn is_reconstructed(&self) -> bool {
        (0..N_C).all(|c| self.component_block(c).is_none() || self.reconstruction[c].is_some())
    }

    /// Computes the reconstruction of this leaf once; later calls are no-ops.
    ///
    /// Components without a prediction buffer are taken from `img`.
    pub fn reconstruct(&mut self, img: &Picture) {
        assert!(!self.is_split(), "reconstruction of a split transform block");

        for c in 0..N_C {
            if self.reconstruction[c].is_some() {
                continue;
            }
            let (x, y, log2) = match self.component_block(c) {
                Some(blk) => blk,
                None => continue,
            };

            let mut rec = SmallImageBuffer::new(log2);
            match &self.intra_prediction[c] {
                Some(pred) => {
                    let size = pred.width();
                    for j in 0..size {
                        for i in 0..size {
                            let r = match &self.residual[c] {
                                Some(res) => res.at(i, j) as i32,
                                None => 0,
                            };
                            rec.set(i, j, clip_pel(pred.at(i, j) as i32 + r, img.bit_depth));
                        }
                    }
                }
                None => rec
                    .localized_mut(x as i32, y as i32)
                    .copy_from_image(&img.planes[c]),
            }
            self.reconstruction[c] = Some(rec);
        }
    }

    /// Replaces the reconstruction with the samples currently stored in `img`.
    pub fn copy_reconstruction_from_image(&mut self, img: &Picture) {
        for c in 0..N_C {
            if let Some((x, y, log2)) = self.component_block(c) {
                let mut rec = SmallImageBuffer::new(log2);
                rec.localized_mut(x as i32, y as i32)
                    .copy_from_image(&img.planes[c]);
                self.reconstruction[c] = Some(rec);
            }
        }
    }

    fn write_leaf_reconstruction(&self, img: &mut Picture) {
        for c in 0..N_C {
            if let (Some((x, y, _)), Some(rec)) =
                (self.component_block(c), &self.reconstruction[c])
            {
                rec.localized(x as i32, y as i32)
                    .copy_to_image(&mut img.planes[c]);
            }
        }
    }
}

fn dump_buffer(
    out: &mut dyn fmt::Write,
    name: &str,
    c_idx: usize,
    buf: &SmallImageBuffer,
    indent: usize,
) -> fmt::Result {
    write_indent(out, indent)?;
    writeln!(out, "{} [{}]:", name, c_idx)?;
    for y in 0..buf.height() {
        write_indent(out, indent + 1)?;
        for v in buf.row(y) {
            write!(out, "{:4}", v)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

impl DumpTree for EncTb {
    fn debug_dump_tree(
        &self,
        arena: &NodeArena,
        out: &mut dyn fmt::Write,
        flags: u32,
        indent: usize,
    ) -> fmt::Result {
        let g = &self.geom;
        write_indent(out, indent)?;
        writeln!(
            out,
            "TB {};{} {}x{} depth {} blk {} cbf {}{}{}",
            g.x,
            g.y,
            g.size(),
            g.size(),
            self.trafo_depth,
            self.blk_idx,
            self.cbf[Y_C] as u8,
            self.cbf[U_C] as u8,
            self.cbf[V_C] as u8
        )?;

        match &self.content {
            TbContent::Split(children) => {
                for child in children.iter() {
                    arena.tb(*child).debug_dump_tree(arena, out, flags, indent + 1)?;
                }
            }
            TbContent::Leaf(_) => {
                for c in 0..N_C {
                    if flags & DUMPTREE_INTRA_PREDICTION != 0 {
                        if let Some(buf) = &self.intra_prediction[c] {
                            dump_buffer(out, "prediction", c, buf, indent + 1)?;
                        }
                    }
                    if flags & DUMPTREE_RESIDUAL != 0 {
                        if let Some(buf) = &self.residual[c] {
                            dump_buffer(out, "residual", c, buf, indent + 1)?;
                        }
                    }
                    if flags & DUMPTREE_RECONSTRUCTION != 0 {
                        if let Some(buf) = &self.reconstruction[c] {
                            dump_buffer(out, "reconstruction", c, buf, indent + 1)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl NodeArena {
    /// Turns the leaf `tb` into a split block with four fresh leaves.
    pub fn split_tb(&mut self, tb: TbIdx) -> [TbIdx; 4] {
        let (geom, cb, depth, intra_mode, intra_mode_chroma) = {
            let t = self.tb(tb);
            assert!(!t.is_split(), "transform block {:?} is already split", tb);
            (t.geom, t.cb, t.trafo_depth, t.intra_mode, t.intra_mode_chroma)
        };

        let mut children = [tb; 4];
        for (i, child) in children.iter_mut().enumerate() {
            let g = geom.child(i);
            let mut c = EncTb::new(g.x, g.y, g.log2_size, cb);
            c.trafo_depth = depth + 1;
            c.blk_idx = i as u8;
            c.intra_mode = intra_mode;
            c.intra_mode_chroma = intra_mode_chroma;
            *child = self.alloc_tb(c);
        }

        let t = self.tb_mut(tb);
        t.content = TbContent::Split(children);
        t.intra_prediction = [None, None, None];
        t.residual = [None, None, None];
        t.reconstruction = [None, None, None];
        for (i, child) in children.iter().enumerate() {
            self.attach_tb_child(tb, i, *child);
        }
        children
    }

    /// Derives the coded-block flags of a split block as the OR over its children.
    pub fn set_cbf_flags_from_children(&mut self, tb: TbIdx) {
        let children = match self.tb(tb).children() {
            Some(children) => *children,
            None => return,
        };
        let mut cbf = [false; N_C];
        for child in children.iter() {
            for c in 0..N_C {
                cbf[c] |= self.tb(*child).cbf[c];
            }
        }
        self.tb_mut(tb).cbf = cbf;
    }

    /// Leaf transform block covering luma position `(x, y)`.
    pub fn get_tb(&self, tb: TbIdx, x: u16, y: u16) -> TbIdx {
        let mut idx = tb;
        loop {
            let t = self.tb(idx);
            debug_assert!(t.geom.contains(x, y));
            match &t.content {
                TbContent::Leaf(_) => return idx,
                TbContent::Split(children) => idx = children[t.geom.quadrant_of(x, y)],
            }
        }
    }

    /// The transform block that carries chroma for the area of `tb`.
    pub fn chroma_holder(&self, tb: TbIdx) -> TbIdx {
        let t = self.tb(tb);
        if t.chroma_block().is_some() {
            return tb;
        }
        match t.parent.map(|p| self.tb(p).children()) {
            Some(Some(siblings)) => siblings[3],
            _ => tb,
        }
    }

    /// Materializes the reconstruction of every leaf below `tb`.
    pub fn reconstruct_tb(&mut self, tb: TbIdx, img: &Picture) {
        match self.tb(tb).children() {
            Some(children) => {
                let children = *children;
                for child in children.iter() {
                    self.reconstruct_tb(*child, img);
                }
            }
            None => self.tb_mut(tb).reconstruct(img),
        }
    }

    pub fn write_tb_reconstruction_to_image(&mut self, tb: TbIdx, img: &mut Picture) {
        match self.tb(tb).children() {
            Some(children) => {
                let children = *children;
                for child in children.iter() {
                    self.write_tb_reconstruction_to_image(*child, img);
                }
            }
            None => {
                self.tb_mut(tb).reconstruct(img);
                self.tb(tb).write_leaf_reconstruction(img);
            }
        }
    }

    /// Reconstructed samples of component `c_idx` around luma position `(x, y)`,
    /// addressed with that component's picture coordinates.
    pub fn tb_pixels(
        &self,
        tb: TbIdx,
        x: u16,
        y: u16,
        c_idx: usize,
    ) -> Option<LocalizedSubImage<'_, pel>> {
        let mut leaf = self.get_tb(tb, x, y);
        if c_idx != Y_C {
            leaf = self.chroma_holder(leaf);
        }
        let t = self.tb(leaf);
        let (bx, by, _) = t.component_block(c_idx)?;
        t.reconstruction(c_idx)
            .map(|rec| rec.localized(bx as i32, by as i32))
    }
}
