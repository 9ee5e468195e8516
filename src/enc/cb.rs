use std::fmt;

use super::arena::*;
use super::node::*;
use super::tb::*;
use crate::api::*;
use crate::com::picture::Picture;
use crate::com::*;

/// Absolute motion of one prediction block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PbMotion {
    pub pred_flag: [bool; REFP_NUM],
    pub ref_idx: [i8; REFP_NUM],
    pub mv: [[i16; MV_D]; REFP_NUM],
}

/// How the motion of a prediction block is signalled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PbMotionCoding {
    pub merge_flag: bool,
    pub merge_idx: u8,
    pub inter_pred_idc: u8,
    pub ref_idx: [i8; REFP_NUM],
    pub mvd: [[i16; MV_D]; REFP_NUM],
    pub mvp_flag: [bool; REFP_NUM],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PbInter {
    /* used as candidate for motion vector prediction of later blocks */
    pub motion: PbMotion,
    pub coding: PbMotionCoding,
}

/// Raw samples of a PCM coded block, referenced in the input picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmSource {
    pub x: u16,
    pub y: u16,
    pub log2_size: u8,
}

#[derive(Debug, Clone, Default)]
pub struct IntraData {
    pub pcm_data: Option<PcmSource>,
}

#[derive(Debug, Clone, Default)]
pub struct InterData {
    pub pb: [PbInter; 4],
    pub rqt_root_cbf: bool,
}

#[derive(Debug, Clone)]
pub enum CbPred {
    Intra(IntraData),
    Inter(InterData),
}

impl CbPred {
    pub fn mode(&self) -> PredMode {
        match self {
            CbPred::Intra(_) => PredMode::Intra,
            CbPred::Inter(_) => PredMode::Inter,
        }
    }
}

/// Fields of an unsplit coding block.
#[derive(Debug)]
pub struct CbLeaf {
    pub qp: u8,
    pub cu_transquant_bypass: bool,
    pub pcm_flag: bool,
    pub part_mode: PartMode,
    pub pred: CbPred,
    pub transform_tree: Option<TbIdx>,
}

impl CbLeaf {
    fn new() -> Self {
        CbLeaf {
            qp: 0,
            cu_transquant_bypass: false,
            pcm_flag: false,
            part_mode: PartMode::PART_2Nx2N,
            pred: CbPred::Intra(IntraData::default()),
            transform_tree: None,
        }
    }
}

#[derive(Debug)]
pub enum CbContent {
    /* quadrants outside of the picture are None */
    Split([Option<CbIdx>; 4]),
    Leaf(CbLeaf),
}

/// A node of the coding quad-tree.
#[derive(Debug)]
pub struct EncCb {
    pub geom: NodeGeom,
    pub parent: Option<CbIdx>,
    pub slot: CbSlot,
    pub ct_depth: u8,
    pub content: CbContent,

    pub distortion: f32,
    pub rate: f32,
}

impl EncCb {
    pub fn new(x: u16, y: u16, log2_size: u8, ct_depth: u8) -> Self {
        EncCb {
            geom: NodeGeom::new(x, y, log2_size),
            parent: None,
            slot: CbSlot::Detached,
            ct_depth,
            content: CbContent::Leaf(CbLeaf::new()),
            distortion: 0.0,
            rate: 0.0,
        }
    }

    /// A detached copy of position and leaf fields, without children or transform tree.
    pub fn clone_template(&self) -> Self {
        let mut cb = EncCb::new(self.geom.x, self.geom.y, self.geom.log2_size, self.ct_depth);
        cb.parent = self.parent;
        cb.slot = self.slot;
        if let CbContent::Leaf(leaf) = &self.content {
            cb.content = CbContent::Leaf(CbLeaf {
                qp: leaf.qp,
                cu_transquant_bypass: leaf.cu_transquant_bypass,
                pcm_flag: leaf.pcm_flag,
                part_mode: leaf.part_mode,
                pred: leaf.pred.clone(),
                transform_tree: None,
            });
        }
        cb
    }

    #[inline]
    pub fn is_split(&self) -> bool {
        matches!(self.content, CbContent::Split(_))
    }

    pub fn children(&self) -> Option<&[Option<CbIdx>; 4]> {
        match &self.content {
            CbContent::Split(children) => Some(children),
            CbContent::Leaf(_) => None,
        }
    }

    pub fn leaf(&self) -> Option<&CbLeaf> {
        match &self.content {
            CbContent::Leaf(leaf) => Some(leaf),
            CbContent::Split(_) => None,
        }
    }

    pub fn leaf_mut(&mut self) -> Option<&mut CbLeaf> {
        match &mut self.content {
            CbContent::Leaf(leaf) => Some(leaf),
            CbContent::Split(_) => None,
        }
    }

    pub fn pred_mode(&self) -> Option<PredMode> {
        self.leaf().map(|leaf| leaf.pred.mode())
    }

    /// Switches the prediction payload; keeps it when the mode does not change.
    pub fn set_pred_mode(&mut self, mode: PredMode) {
        let leaf = match &mut self.content {
            CbContent::Leaf(leaf) => leaf,
            CbContent::Split(_) => panic!("prediction mode set on a split coding block"),
        };
        if leaf.pred.mode() != mode {
            leaf.pred = match mode {
                PredMode::Intra => CbPred::Intra(IntraData::default()),
                PredMode::Inter => CbPred::Inter(InterData::default()),
            };
        }
    }

    pub fn inter(&self) -> Option<&InterData> {
        match self.leaf().map(|leaf| &leaf.pred) {
            Some(CbPred::Inter(inter)) => Some(inter),
            _ => None,
        }
    }

    pub fn inter_mut(&mut self) -> Option<&mut InterData> {
        match self.leaf_mut().map(|leaf| &mut leaf.pred) {
            Some(CbPred::Inter(inter)) => Some(inter),
            _ => None,
        }
    }

    pub fn transform_tree(&self) -> Option<TbIdx> {
        self.leaf().and_then(|leaf| leaf.transform_tree)
    }
}

impl DumpTree for EncCb {
    fn debug_dump_tree(
        &self,
        arena: &NodeArena,
        out: &mut dyn fmt::Write,
        flags: u32,
        indent: usize,
    ) -> fmt::Result {
        let g = &self.geom;
        write_indent(out, indent)?;
        write!(
            out,
            "CB {};{} {}x{} depth {}",
            g.x,
            g.y,
            g.size(),
            g.size(),
            self.ct_depth
        )?;

        match &self.content {
            CbContent::Split(children) => {
                writeln!(out, " split")?;
                for child in children.iter().flatten() {
                    arena.cb(*child).debug_dump_tree(arena, out, flags, indent + 1)?;
                }
            }
            CbContent::Leaf(leaf) => {
                write!(
                    out,
                    " {} {:?} qp {}",
                    leaf.pred.mode(),
                    leaf.part_mode,
                    leaf.qp
                )?;
                if leaf.pcm_flag {
                    write!(out, " pcm")?;
                }
                if let CbPred::Inter(inter) = &leaf.pred {
                    write!(out, " rqt_root_cbf {}", inter.rqt_root_cbf as u8)?;
                    for pb in inter.pb.iter().take(leaf.part_mode.num_parts()) {
                        let mv = pb.motion.mv[REFP_0];
                        write!(out, " mv ({},{})", mv[MV_X], mv[MV_Y])?;
                    }
                }
                writeln!(out, " rd {:.1}/{:.1}", self.distortion, self.rate)?;
                if let Some(tb) = leaf.transform_tree {
                    arena.tb(tb).debug_dump_tree(arena, out, flags, indent + 1)?;
                }
            }
        }
        Ok(())
    }
}

impl NodeArena {
    /// Turns the leaf `cb` into a split block. Only quadrants starting inside a
    /// `pic_width` x `pic_height` picture get a child.
    pub fn split_cb(&mut self, cb: CbIdx, pic_width: u16, pic_height: u16) -> [Option<CbIdx>; 4] {
        let (geom, ct_depth, qp, bypass, tb) = {
            let c = self.cb(cb);
            let leaf = match &c.content {
                CbContent::Leaf(leaf) => leaf,
                CbContent::Split(_) => panic!("coding block {:?} is already split", cb),
            };
            (c.geom, c.ct_depth, leaf.qp, leaf.cu_transquant_bypass, leaf.transform_tree)
        };
        if let Some(tb) = tb {
            self.free_tb(tb);
        }
        self.cb_mut(cb).content = CbContent::Split([None; 4]);

        let mut children = [None; 4];
        for (i, child) in children.iter_mut().enumerate() {
            let g = geom.child(i);
            if g.x >= pic_width || g.y >= pic_height {
                continue;
            }
            let mut c = EncCb::new(g.x, g.y, g.log2_size, ct_depth + 1);
            if let Some(leaf) = c.leaf_mut() {
                leaf.qp = qp;
                leaf.cu_transquant_bypass = bypass;
            }
            let idx = self.alloc_cb(c);
            self.attach_cb_child(cb, i, idx);
            *child = Some(idx);
        }
        children
    }

    pub fn set_rqt_root_cbf_from_children(&mut self, cb: CbIdx) {
        let coded = match self.cb(cb).transform_tree() {
            Some(tb) => !self.tb(tb).is_zero_block(),
            None => false,
        };
        if let Some(inter) = self.cb_mut(cb).inter_mut() {
            inter.rqt_root_cbf = coded;
        }
    }

    /// Leaf coding block covering luma position `(x, y)`, or `None` when the position
    /// falls into a quadrant dropped at the picture boundary.
    pub fn get_cb(&self, cb: CbIdx, x: u16, y: u16) -> Option<CbIdx> {
        let mut idx = cb;
        loop {
            let c = self.cb(idx);
            debug_assert!(c.geom.contains(x, y));
            match &c.content {
                CbContent::Leaf(_) => return Some(idx),
                CbContent::Split(children) => idx = children[c.geom.quadrant_of(x, y)]?,
            }
        }
    }

    /// Leaf transform block covering `(x, y)` inside the coding tree `cb`.
    pub fn cb_get_tb(&self, cb: CbIdx, x: u16, y: u16) -> Option<TbIdx> {
        let leaf = self.get_cb(cb, x, y)?;
        self.cb(leaf)
            .transform_tree()
            .map(|tb| self.get_tb(tb, x, y))
    }

    /// Motion of the prediction block covering `(x, y)`, for inter coded leaves.
    pub fn cb_get_pb(&self, cb: CbIdx, x: u16, y: u16) -> Option<&PbInter> {
        let c = self.cb(self.get_cb(cb, x, y)?);
        let leaf = c.leaf()?;
        match &leaf.pred {
            CbPred::Inter(inter) => {
                let part = leaf
                    .part_mode
                    .part_index(c.geom.size(), x - c.geom.x, y - c.geom.y);
                Some(&inter.pb[part])
            }
            CbPred::Intra(_) => None,
        }
    }

    pub fn write_cb_reconstruction_to_image(&mut self, cb: CbIdx, img: &mut Picture) {
        let (children, tb) = match &self.cb(cb).content {
            CbContent::Split(children) => (*children, None),
            CbContent::Leaf(leaf) => ([None; 4], leaf.transform_tree),
        };
        for child in children.iter().flatten() {
            self.write_cb_reconstruction_to_image(*child, img);
        }
        if let Some(tb) = tb {
            self.write_tb_reconstruction_to_image(tb, img);
        }
    }

    /// Writes the prediction modes of all leaves below `cb` into the picture's mode map.
    pub fn publish_pred_modes(&self, cb: CbIdx, img: &mut Picture) {
        let c = self.cb(cb);
        match &c.content {
            CbContent::Split(children) => {
                for child in children.iter().flatten() {
                    self.publish_pred_modes(*child, img);
                }
            }
            CbContent::Leaf(leaf) => {
                img.set_pred_mode(c.geom.x, c.geom.y, c.geom.log2_size, leaf.pred.mode())
            }
        }
    }
}
