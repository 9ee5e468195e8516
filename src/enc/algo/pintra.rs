use super::*;
use crate::api::{PartMode, PredMode};
use crate::enc::cb::*;
use crate::enc::eco::TreeParams;
use crate::enc::options::CodingOptions;
use crate::enc::sbac::RateEstimation;
use crate::enc::tb::EncTb;

/// Reconstructed sample `(x_n, y_n)` of component `c_idx` as seen from the block at
/// `(x, y)` (both in that component's coordinates), or `None` when it may not be
/// referenced yet.
///
/// Samples of earlier CTBs come from the picture; inside the current CTB they are
/// materialized from the decided transform tree.
pub(crate) fn neighbour_sample(
    ectx: &mut EncoderContext,
    c_idx: usize,
    x: u16,
    y: u16,
    x_n: i32,
    y_n: i32,
) -> Option<pel> {
    let s = (c_idx != Y_C) as i32;
    let (xl_c, yl_c) = ((x as i32) << s, (y as i32) << s);
    let (xl_n, yl_n) = (x_n << s, y_n << s);
    if !ectx.ctbs.check_ctb_available(xl_c, yl_c, xl_n, yl_n) {
        return None;
    }

    let log2_ctb = ectx.ctbs.log2_ctb_size();
    if (xl_n >> log2_ctb, yl_n >> log2_ctb) != (xl_c >> log2_ctb, yl_c >> log2_ctb) {
        return Some(ectx.img.planes[c_idx].p(x_n as usize, y_n as usize));
    }

    let (xl_n, yl_n) = (xl_n as u16, yl_n as u16);
    if z_order(xl_n, yl_n, log2_ctb) >= z_order(xl_c as u16, yl_c as u16, log2_ctb) {
        return None;
    }
    let leaf = ectx.ctbs.get_tb(&ectx.arena, xl_n, yl_n)?;
    let holder = if c_idx == Y_C {
        leaf
    } else {
        ectx.arena.chroma_holder(leaf)
    };
    ectx.arena.reconstruct_tb(holder, &ectx.img);
    ectx.arena
        .tb_pixels(leaf, xl_n, yl_n, c_idx)
        .map(|view| view.get(x_n, y_n))
}

/// Mean of the available samples above and left of a block.
pub(crate) fn dc_value(
    ectx: &mut EncoderContext,
    c_idx: usize,
    x: u16,
    y: u16,
    log2_size: u8,
) -> pel {
    let size = 1i32 << log2_size;
    let (x0, y0) = (x as i32, y as i32);
    let (mut sum, mut n) = (0i32, 0i32);
    for i in 0..size {
        if let Some(v) = neighbour_sample(ectx, c_idx, x, y, x0 + i, y0 - 1) {
            sum += v as i32;
            n += 1;
        }
        if let Some(v) = neighbour_sample(ectx, c_idx, x, y, x0 - 1, y0 + i) {
            sum += v as i32;
            n += 1;
        }
    }
    if n == 0 {
        1 << (ectx.img.bit_depth - 1)
    } else {
        ((sum + (n >> 1)) / n) as pel
    }
}

/// DC prediction of every component block of a transform block.
#[derive(Debug, Default, Clone, Copy)]
pub struct DcPredictor;

impl TbPredictor for DcPredictor {
    fn predict(&mut self, ectx: &mut EncoderContext, tb: TbIdx) -> [Option<SmallImageBuffer>; N_C] {
        let mut pred = [None, None, None];
        for (c, p) in pred.iter_mut().enumerate() {
            let (x, y, log2) = match ectx.arena.tb(tb).component_block(c) {
                Some(blk) => blk,
                None => continue,
            };
            let mut buf = SmallImageBuffer::new(log2);
            buf.fill(dc_value(ectx, c, x, y, log2));
            *p = Some(buf);
        }
        pred
    }
}

/// Intra coding of a 2Nx2N block: DC prediction with a searched residual tree,
/// or raw PCM samples where the parameter sets allow them.
#[derive(Debug, Default)]
pub struct IntraDcSearch {
    tb_split: TbSplitBruteForce,
}

impl IntraDcSearch {
    pub fn new() -> Self {
        IntraDcSearch::default()
    }
}

impl AlgoCb for IntraDcSearch {
    fn analyze(
        &mut self,
        ectx: &mut EncoderContext,
        ctx_model: &mut ContextModelTable,
        cb: CbIdx,
    ) -> CbIdx {
        let (geom, pcm_possible) = {
            let c = ectx.arena.cb(cb);
            assert_eq!(c.pred_mode(), Some(PredMode::Intra), "intra search on {:?}", cb);
            let leaf = match c.leaf() {
                Some(leaf) => leaf,
                None => panic!("intra search on split block {:?}", cb),
            };
            assert!(leaf.transform_tree.is_none(), "{:?} already has a transform tree", cb);
            (c.geom, eco::pcm_allowed(&ectx.sps, leaf, c.geom.log2_size))
        };

        let mut options = CodingOptions::new(&ectx.arena, cb);
        let o_dc = options.new_option(&mut ectx.arena, true);
        let o_pcm = options.new_option(&mut ectx.arena, pcm_possible);
        options.start(ctx_model, RateEstimation::Adaptive);

        {
            let mut trial = options.begin(&mut ectx.arena, &mut ectx.ctbs, o_dc);
            let node = trial.node;
            if let Some(leaf) = ectx.arena.cb_mut(node).leaf_mut() {
                leaf.part_mode = PartMode::PART_2Nx2N;
                leaf.pcm_flag = false;
            }

            let root = ectx
                .arena
                .alloc_tb(EncTb::new(geom.x, geom.y, geom.log2_size, node));
            ectx.arena.attach_transform_tree(node, root);
            let params = TreeParams::new(&ectx.sps, true);
            let tb = self
                .tb_split
                .analyze(ectx, &mut trial.context, root, &params, &mut DcPredictor);

            let (distortion, tree_rate) = {
                let t = ectx.arena.tb(tb);
                (t.distortion, t.rate)
            };
            let prefix_rate = cu_prefix_rate(ectx, &mut trial, node);
            let c = ectx.arena.cb_mut(node);
            c.distortion = distortion;
            c.rate = prefix_rate + tree_rate;
            options.end(trial);
        }

        if o_pcm.is_active() {
            let mut trial = options.begin(&mut ectx.arena, &mut ectx.ctbs, o_pcm);
            let node = trial.node;
            if let Some(leaf) = ectx.arena.cb_mut(node).leaf_mut() {
                leaf.part_mode = PartMode::PART_2Nx2N;
                leaf.pcm_flag = true;
                leaf.pred = CbPred::Intra(IntraData {
                    pcm_data: Some(PcmSource {
                        x: geom.x,
                        y: geom.y,
                        log2_size: geom.log2_size,
                    }),
                });
            }

            let mut tb = EncTb::new(geom.x, geom.y, geom.log2_size, node);
            tb.copy_reconstruction_from_image(&ectx.input);
            let root = ectx.arena.alloc_tb(tb);
            ectx.arena.attach_transform_tree(node, root);

            let n = 1u32 << (2 * geom.log2_size);
            let sample_bits = n * ectx.sps.pcm_sample_bit_depth_luma as u32
                + (n >> 1) * ectx.sps.pcm_sample_bit_depth_chroma as u32;
            let prefix_rate = cu_prefix_rate(ectx, &mut trial, node);
            let c = ectx.arena.cb_mut(node);
            c.distortion = 0.0;
            c.rate = prefix_rate + sample_bits as f32;
            options.end(trial);
        }

        options.compute_rdo_costs(&ectx.arena, ectx.lambda as f32);
        options.return_best_rdo(&mut ectx.arena, &mut ectx.ctbs, ctx_model)
    }
}
