use super::*;
use crate::api::{PartMode, PredMode};
use crate::enc::cb::*;
use crate::enc::eco::TreeParams;
use crate::enc::sbac::{CabacEstimator, RateEstimation};
use crate::enc::tb::EncTb;

/// Motion-compensated prediction with a zero vector into the reference picture.
/// Without a reference every sample predicts mid-grey.
#[derive(Debug, Default, Clone, Copy)]
pub struct ColocatedPredictor;

impl TbPredictor for ColocatedPredictor {
    fn predict(&mut self, ectx: &mut EncoderContext, tb: TbIdx) -> [Option<SmallImageBuffer>; N_C] {
        let t = ectx.arena.tb(tb);
        let mut pred = [None, None, None];
        for (c, p) in pred.iter_mut().enumerate() {
            let (x, y, log2) = match t.component_block(c) {
                Some(blk) => blk,
                None => continue,
            };
            let mut buf = SmallImageBuffer::new(log2);
            match &ectx.reference {
                Some(refp) => buf
                    .localized_mut(x as i32, y as i32)
                    .copy_from_image(&refp.planes[c]),
                None => buf.fill(1 << (ectx.img.bit_depth - 1)),
            }
            *p = Some(buf);
        }
        pred
    }
}

/// Inter coding of a 2Nx2N block with zero motion on the first reference, with a
/// searched residual tree.
#[derive(Debug, Default)]
pub struct InterZeroMvSearch {
    tb_split: TbSplitBruteForce,
}

impl InterZeroMvSearch {
    pub fn new() -> Self {
        InterZeroMvSearch::default()
    }
}

impl AlgoCb for InterZeroMvSearch {
    fn analyze(
        &mut self,
        ectx: &mut EncoderContext,
        ctx_model: &mut ContextModelTable,
        cb: CbIdx,
    ) -> CbIdx {
        let geom = {
            let c = ectx.arena.cb_mut(cb);
            let leaf = match c.leaf_mut() {
                Some(leaf) => leaf,
                None => panic!("inter search on split block {:?}", cb),
            };
            assert!(leaf.transform_tree.is_none(), "{:?} already has a transform tree", cb);
            leaf.part_mode = PartMode::PART_2Nx2N;
            match &mut leaf.pred {
                CbPred::Inter(inter) => {
                    let mut pb = PbInter::default();
                    pb.motion.pred_flag[REFP_0] = true;
                    pb.motion.ref_idx = [0, -1];
                    pb.coding.ref_idx = [0, -1];
                    pb.coding.inter_pred_idc = 0;
                    inter.pb = [pb; 4];
                }
                CbPred::Intra(_) => panic!("inter search on intra block {:?}", cb),
            }
            c.geom
        };

        let root = ectx
            .arena
            .alloc_tb(EncTb::new(geom.x, geom.y, geom.log2_size, cb));
        ectx.arena.attach_transform_tree(cb, root);

        let params = TreeParams::new(&ectx.sps, false);
        let mut tree_ctx = *ctx_model;
        let tb = self
            .tb_split
            .analyze(ectx, &mut tree_ctx, root, &params, &mut ColocatedPredictor);
        ectx.arena.set_rqt_root_cbf_from_children(cb);

        let coded = ectx.arena.cb(cb).inter().map_or(false, |inter| inter.rqt_root_cbf);
        let (distortion, tree_rate) = {
            let t = ectx.arena.tb(tb);
            (t.distortion, t.rate)
        };
        // an uncoded residual tree leaves the models untouched
        if coded {
            *ctx_model = tree_ctx;
        }
        let prefix_rate = {
            let mut cabac = CabacEstimator::new(ctx_model, RateEstimation::Adaptive);
            eco::encode_cu_prefix(&mut cabac, &ectx.arena, cb, &ectx.pps, &ectx.shdr);
            cabac.rate()
        };

        debug_assert_eq!(ectx.arena.cb(cb).pred_mode(), Some(PredMode::Inter));
        let c = ectx.arena.cb_mut(cb);
        c.distortion = distortion;
        c.rate = prefix_rate + if coded { tree_rate } else { 0.0 };
        cb
    }
}
