use super::arena::*;
use super::cb::*;
use super::grid::CtbGrid;
use super::sbac::EntropyEncoder;
use super::tb::*;
use crate::api::*;
use crate::com::context::Ctx;
use crate::com::ps::*;
use crate::com::*;

/* intra neighbours are DC or unavailable, so the candidate list is {planar, DC, vertical} */
const MPM_CANDIDATES: [u8; 3] = [INTRA_PLANAR, INTRA_DC, 26];
const MAX_NUM_MERGE_CAND: u8 = 5;

/// Limits of the residual quad-tree below one coding block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeParams {
    pub log2_min_tb_size: u8,
    pub log2_max_tb_size: u8,
    pub max_depth: u8,
    pub intra: bool,
}

impl TreeParams {
    pub fn new(sps: &Sps, intra: bool) -> Self {
        TreeParams {
            log2_min_tb_size: sps.log2_min_tb_size,
            log2_max_tb_size: sps.log2_max_tb_size,
            max_depth: if intra {
                sps.max_transform_hierarchy_depth_intra
            } else {
                sps.max_transform_hierarchy_depth_inter
            },
            intra,
        }
    }

    /// split_transform_flag is present in the bitstream.
    pub fn split_flag_coded(&self, log2_size: u8, trafo_depth: u8) -> bool {
        log2_size <= self.log2_max_tb_size
            && log2_size > self.log2_min_tb_size
            && trafo_depth < self.max_depth
    }

    pub fn can_split(&self, log2_size: u8, trafo_depth: u8) -> bool {
        log2_size > self.log2_min_tb_size
            && (log2_size > self.log2_max_tb_size || trafo_depth < self.max_depth)
    }

    pub fn can_be_leaf(&self, log2_size: u8) -> bool {
        log2_size <= self.log2_max_tb_size
    }
}

/*****************************************************************************
 * binarizations
 *****************************************************************************/
/// k-th order Exp-Golomb code in bypass bins.
pub fn encode_exp_golomb<E: EntropyEncoder + ?Sized>(enc: &mut E, mut value: u32, mut k: u32) {
    while value >= (1 << k) {
        enc.encode_bypass(1, 1);
        value -= 1 << k;
        k += 1;
    }
    enc.encode_bypass(0, 1);
    if k > 0 {
        enc.encode_bypass(value, k);
    }
}

fn encode_truncated_unary_bypass<E: EntropyEncoder + ?Sized>(enc: &mut E, value: u32, max: u32) {
    for i in 0..max {
        let bin = i < value;
        enc.encode_bypass(bin as u32, 1);
        if !bin {
            break;
        }
    }
}

/*****************************************************************************
 * coding quadtree
 *****************************************************************************/
pub fn encode_split_cu_flag<E: EntropyEncoder + ?Sized>(enc: &mut E, split: bool, ctx_inc: usize) {
    enc.encode_bin(Ctx::SplitCuFlag(ctx_inc), split);
}

/// Context increment of split_cu_flag: number of available left/above neighbours
/// that are deeper in the coding tree.
pub fn split_cu_flag_ctx(arena: &NodeArena, grid: &CtbGrid, x: u16, y: u16, ct_depth: u8) -> usize {
    let neighbours = [(x as i32 - 1, y as i32), (x as i32, y as i32 - 1)];
    neighbours
        .iter()
        .filter(|&&(xn, yn)| grid.check_ctb_available(x as i32, y as i32, xn, yn))
        .filter_map(|&(xn, yn)| grid.get_cb(arena, xn as u16, yn as u16))
        .filter(|&n| arena.cb(n).ct_depth > ct_depth)
        .count()
}

pub fn encode_coding_quadtree<E: EntropyEncoder + ?Sized>(
    enc: &mut E,
    arena: &NodeArena,
    grid: &CtbGrid,
    cb: CbIdx,
    pps: &Pps,
    shdr: &SliceHeader,
) {
    let sps = &pps.sps;
    let c = arena.cb(cb);
    let g = c.geom;

    let inside = g.inside(sps.pic_width_in_luma_samples, sps.pic_height_in_luma_samples);
    if inside && g.log2_size > sps.log2_min_cb_size {
        let ctx_inc = split_cu_flag_ctx(arena, grid, g.x, g.y, c.ct_depth);
        encode_split_cu_flag(enc, c.is_split(), ctx_inc);
    } else {
        debug_assert_eq!(c.is_split(), !inside, "inferred split_cu_flag violated at {:?}", g);
    }

    match &c.content {
        CbContent::Split(children) => {
            for child in children.iter().flatten() {
                encode_coding_quadtree(enc, arena, grid, *child, pps, shdr);
            }
        }
        CbContent::Leaf(_) => encode_coding_unit(enc, arena, grid, cb, pps, shdr),
    }
}

/*****************************************************************************
 * coding unit
 *****************************************************************************/
pub fn encode_part_mode<E: EntropyEncoder + ?Sized>(
    enc: &mut E,
    part_mode: PartMode,
    intra: bool,
    log2_cb_size: u8,
    log2_min_cb_size: u8,
) {
    use crate::api::PartMode::*;

    if intra {
        enc.encode_bin(Ctx::PartMode(0), part_mode == PART_2Nx2N);
        return;
    }

    match part_mode {
        PART_2Nx2N => enc.encode_bin(Ctx::PartMode(0), true),
        PART_2NxN => {
            enc.encode_bin(Ctx::PartMode(0), false);
            enc.encode_bin(Ctx::PartMode(1), true);
        }
        PART_Nx2N => {
            enc.encode_bin(Ctx::PartMode(0), false);
            enc.encode_bin(Ctx::PartMode(1), false);
            if log2_cb_size == log2_min_cb_size && log2_cb_size > 3 {
                enc.encode_bin(Ctx::PartMode(2), true);
            }
        }
        PART_NxN => {
            assert!(
                log2_cb_size == log2_min_cb_size && log2_cb_size > 3,
                "inter NxN only at the minimum coding block size above 8x8"
            );
            enc.encode_bin(Ctx::PartMode(0), false);
            enc.encode_bin(Ctx::PartMode(1), false);
            enc.encode_bin(Ctx::PartMode(2), false);
        }
        _ => panic!("asymmetric motion partitions are not enabled"),
    }
}

pub fn encode_mvd<E: EntropyEncoder + ?Sized>(enc: &mut E, mvd: [i16; MV_D]) {
    let abs = [mvd[MV_X].unsigned_abs() as u32, mvd[MV_Y].unsigned_abs() as u32];

    enc.encode_bin(Ctx::AbsMvdGreater(0), abs[MV_X] > 0);
    enc.encode_bin(Ctx::AbsMvdGreater(0), abs[MV_Y] > 0);
    for &a in abs.iter() {
        if a > 0 {
            enc.encode_bin(Ctx::AbsMvdGreater(1), a > 1);
        }
    }
    for (i, &a) in abs.iter().enumerate() {
        if a > 0 {
            if a > 1 {
                encode_exp_golomb(enc, a - 2, 1);
            }
            enc.encode_bypass((mvd[i] < 0) as u32, 1);
        }
    }
}

pub fn encode_prediction_unit<E: EntropyEncoder + ?Sized>(
    enc: &mut E,
    motion: &PbMotionCoding,
    shdr: &SliceHeader,
    ct_depth: u8,
) {
    enc.encode_bin(Ctx::MergeFlag, motion.merge_flag);

    if motion.merge_flag {
        if MAX_NUM_MERGE_CAND > 1 {
            enc.encode_bin(Ctx::MergeIdx, motion.merge_idx > 0);
            if motion.merge_idx > 0 {
                encode_truncated_unary_bypass(
                    enc,
                    motion.merge_idx as u32 - 1,
                    MAX_NUM_MERGE_CAND as u32 - 2,
                );
            }
        }
        return;
    }

    if shdr.slice_type == SliceType::B {
        let bi = motion.inter_pred_idc == 2;
        enc.encode_bin(Ctx::InterPredIdc((ct_depth as usize).min(3)), bi);
        if !bi {
            enc.encode_bin(Ctx::InterPredIdc(4), motion.inter_pred_idc == 1);
        }
    }

    for l in 0..REFP_NUM {
        let used = match shdr.slice_type {
            SliceType::B => motion.inter_pred_idc == 2 || motion.inter_pred_idc as usize == l,
            _ => l == REFP_0,
        };
        if !used {
            continue;
        }
        if shdr.num_ref_idx_l0_active > 1 {
            let ref_idx = motion.ref_idx[l].max(0) as u32;
            enc.encode_bin(Ctx::RefIdx(0), ref_idx > 0);
            if ref_idx > 0 {
                encode_truncated_unary_bypass(
                    enc,
                    ref_idx - 1,
                    shdr.num_ref_idx_l0_active as u32 - 2,
                );
            }
        }
        encode_mvd(enc, motion.mvd[l]);
        enc.encode_bin(Ctx::MvpFlag, motion.mvp_flag[l]);
    }
}

pub fn pcm_allowed(sps: &Sps, leaf: &CbLeaf, log2_size: u8) -> bool {
    sps.pcm_enabled_flag
        && leaf.part_mode == PartMode::PART_2Nx2N
        && log2_size >= sps.log2_min_pcm_cb_size
        && log2_size <= sps.log2_max_pcm_cb_size
}

/// Everything of a coding unit in front of its transform tree.
pub fn encode_cu_prefix<E: EntropyEncoder + ?Sized>(
    enc: &mut E,
    arena: &NodeArena,
    cb: CbIdx,
    pps: &Pps,
    shdr: &SliceHeader,
) {
    let sps = &pps.sps;
    let c = arena.cb(cb);
    let leaf = match c.leaf() {
        Some(leaf) => leaf,
        None => panic!("coding unit syntax for split block {:?}", cb),
    };
    let log2 = c.geom.log2_size;
    let intra = leaf.pred.mode() == PredMode::Intra;

    if pps.transquant_bypass_enabled_flag {
        enc.encode_bin(Ctx::CuTransquantBypassFlag, leaf.cu_transquant_bypass);
    }
    if !shdr.slice_type.is_intra_only() {
        enc.encode_bin(Ctx::PredModeFlag, intra);
    }
    if !intra || log2 == sps.log2_min_cb_size {
        encode_part_mode(enc, leaf.part_mode, intra, log2, sps.log2_min_cb_size);
    }

    match &leaf.pred {
        CbPred::Intra(_) => {
            if pcm_allowed(sps, leaf, log2) {
                enc.encode_term_bin(leaf.pcm_flag);
            }
            if leaf.pcm_flag {
                return;
            }

            let modes: Vec<u8> = match leaf.transform_tree {
                Some(tb) if leaf.part_mode == PartMode::PART_NxN => (0..4)
                    .map(|i| {
                        let g = c.geom.child(i);
                        arena.tb(arena.get_tb(tb, g.x, g.y)).intra_mode
                    })
                    .collect(),
                Some(tb) => vec![arena.tb(tb).intra_mode],
                None => vec![INTRA_DC],
            };
            let mpm: Vec<Option<usize>> = modes
                .iter()
                .map(|m| MPM_CANDIDATES.iter().position(|c| c == m))
                .collect();
            for idx in mpm.iter() {
                enc.encode_bin(Ctx::PrevIntraLumaPredFlag, idx.is_some());
            }
            for (idx, mode) in mpm.iter().zip(modes.iter()) {
                match idx {
                    Some(i) => encode_truncated_unary_bypass(enc, *i as u32, 2),
                    None => {
                        let rem = *mode as u32
                            - MPM_CANDIDATES.iter().filter(|&&c| c < *mode).count() as u32;
                        enc.encode_bypass(rem, 5);
                    }
                }
            }
            // chroma follows luma
            enc.encode_bin(Ctx::IntraChromaPredMode, false);
        }
        CbPred::Inter(inter) => {
            for pb in inter.pb.iter().take(leaf.part_mode.num_parts()) {
                encode_prediction_unit(enc, &pb.coding, shdr, c.ct_depth);
            }
            let merge_2nx2n =
                leaf.part_mode == PartMode::PART_2Nx2N && inter.pb[0].coding.merge_flag;
            if !merge_2nx2n {
                enc.encode_bin(Ctx::RqtRootCbf, inter.rqt_root_cbf);
            }
        }
    }
}

fn encode_pcm_samples<E: EntropyEncoder + ?Sized>(
    enc: &mut E,
    arena: &NodeArena,
    grid: &CtbGrid,
    cb: CbIdx,
    sps: &Sps,
) {
    for c in 0..N_C {
        let bits = if c == Y_C {
            sps.pcm_sample_bit_depth_luma
        } else {
            sps.pcm_sample_bit_depth_chroma
        } as u32;
        let rows = match grid.pcm_samples(arena, cb, c) {
            Some(rows) => rows,
            None => panic!("PCM block {:?} without source samples", cb),
        };
        for row in rows {
            for &s in row {
                enc.encode_bypass(s as u32, bits);
            }
        }
    }
}

pub fn encode_coding_unit<E: EntropyEncoder + ?Sized>(
    enc: &mut E,
    arena: &NodeArena,
    grid: &CtbGrid,
    cb: CbIdx,
    pps: &Pps,
    shdr: &SliceHeader,
) {
    encode_cu_prefix(enc, arena, cb, pps, shdr);

    let c = arena.cb(cb);
    let leaf = match c.leaf() {
        Some(leaf) => leaf,
        None => return,
    };
    if leaf.pcm_flag {
        encode_pcm_samples(enc, arena, grid, cb, &pps.sps);
        return;
    }

    let coded = match &leaf.pred {
        CbPred::Intra(_) => true,
        CbPred::Inter(inter) => inter.rqt_root_cbf,
    };
    if coded {
        let tb = match leaf.transform_tree {
            Some(tb) => tb,
            None => panic!("coded unit {:?} without transform tree", cb),
        };
        let params = TreeParams::new(&pps.sps, leaf.pred.mode() == PredMode::Intra);
        encode_transform_tree(enc, arena, tb, &params, [true, true]);
    }
}

/*****************************************************************************
 * transform tree
 *****************************************************************************/
/// split_transform_flag and chroma coded-block flags of one transform tree node.
pub fn encode_transform_node_header<E: EntropyEncoder + ?Sized>(
    enc: &mut E,
    tb: &EncTb,
    params: &TreeParams,
    parent_cbf_chroma: [bool; 2],
) {
    encode_split_transform_flag(enc, tb, params);
    encode_cbf_chroma(enc, tb, parent_cbf_chroma);
}

pub fn encode_split_transform_flag<E: EntropyEncoder + ?Sized>(
    enc: &mut E,
    tb: &EncTb,
    params: &TreeParams,
) {
    let log2 = tb.geom.log2_size;
    if params.split_flag_coded(log2, tb.trafo_depth) {
        let ctx_inc = (5 - log2 as usize).min(2);
        enc.encode_bin(Ctx::SplitTransformFlag(ctx_inc), tb.is_split());
    }
}

/// cbf_cb and cbf_cr of a node; 4x4 blocks inherit them from their parent.
pub fn encode_cbf_chroma<E: EntropyEncoder + ?Sized>(
    enc: &mut E,
    tb: &EncTb,
    parent_cbf_chroma: [bool; 2],
) {
    let depth = tb.trafo_depth as usize;
    if tb.geom.log2_size > 2 {
        if depth == 0 || parent_cbf_chroma[0] {
            enc.encode_bin(Ctx::CbfChroma(depth.min(3)), tb.cbf[U_C]);
        }
        if depth == 0 || parent_cbf_chroma[1] {
            enc.encode_bin(Ctx::CbfChroma(depth.min(3)), tb.cbf[V_C]);
        }
    }
}

/// Luma coded-block flag and residuals of a transform tree leaf.
pub fn encode_transform_unit<E: EntropyEncoder + ?Sized>(
    enc: &mut E,
    tb: &EncTb,
    params: &TreeParams,
    parent_cbf_chroma: [bool; 2],
) {
    let leaf = match tb.leaf() {
        Some(leaf) => leaf,
        None => panic!("transform unit syntax for a split block"),
    };
    let (cbf_cb, cbf_cr) = if tb.geom.log2_size > 2 {
        (tb.cbf[U_C], tb.cbf[V_C])
    } else {
        (parent_cbf_chroma[0], parent_cbf_chroma[1])
    };

    if params.intra || tb.trafo_depth != 0 || cbf_cb || cbf_cr {
        let ctx_inc = if tb.trafo_depth == 0 { 1 } else { 0 };
        enc.encode_bin(Ctx::CbfLuma(ctx_inc), tb.cbf[Y_C]);
    }

    for c in 0..N_C {
        if let Some((_, _, log2)) = tb.component_block(c) {
            if tb.cbf[c] {
                encode_residual(enc, &leaf.coeff[c], log2, c, leaf.skip_transform[c][0]);
            }
        }
    }
}

pub fn encode_transform_tree<E: EntropyEncoder + ?Sized>(
    enc: &mut E,
    arena: &NodeArena,
    tb: TbIdx,
    params: &TreeParams,
    parent_cbf_chroma: [bool; 2],
) {
    let t = arena.tb(tb);
    encode_transform_node_header(enc, t, params, parent_cbf_chroma);

    let cbf_chroma = if t.geom.log2_size > 2 {
        [t.cbf[U_C], t.cbf[V_C]]
    } else {
        parent_cbf_chroma
    };
    match &t.content {
        TbContent::Split(children) => {
            for child in children.iter() {
                encode_transform_tree(enc, arena, *child, params, cbf_chroma);
            }
        }
        TbContent::Leaf(_) => encode_transform_unit(enc, t, params, parent_cbf_chroma),
    }
}

/// Coefficients of one block, in raster order.
pub fn encode_residual<E: EntropyEncoder + ?Sized>(
    enc: &mut E,
    coeff: &[i16],
    log2_size: u8,
    c_idx: usize,
    transform_skip: bool,
) {
    let class = (c_idx > 0) as usize;
    let n = 1usize << (2 * log2_size as usize);
    debug_assert!(coeff.len() >= n);

    if log2_size == 2 {
        enc.encode_bin(Ctx::TransformSkipFlag(class), transform_skip);
    }

    for &level in &coeff[..n] {
        let abs = level.unsigned_abs() as u32;
        enc.encode_bin(Ctx::SigCoeffFlag(class), abs > 0);
        if abs == 0 {
            continue;
        }
        enc.encode_bin(Ctx::CoeffAbsLevelGreater1(class), abs > 1);
        if abs > 1 {
            encode_exp_golomb(enc, abs - 2, 0);
        }
        enc.encode_bypass((level < 0) as u32, 1);
    }
}

/*****************************************************************************
 * CTB
 *****************************************************************************/
/// Serializes the decided tree of CTB `(ctb_x, ctb_y)` followed by end_of_slice_segment_flag.
pub fn encode_ctb<E: EntropyEncoder + ?Sized>(
    enc: &mut E,
    arena: &NodeArena,
    grid: &CtbGrid,
    ctb_x: usize,
    ctb_y: usize,
) {
    let pps = match grid.pps() {
        Some(pps) => pps.clone(),
        None => panic!("CTB coded without a picture parameter set"),
    };
    let root = match grid.get_ctb(ctb_x, ctb_y) {
        Some(root) => root,
        None => panic!("CTB ({}, {}) has no decided tree", ctb_x, ctb_y),
    };
    let log2 = grid.log2_ctb_size();
    let shdr = grid
        .get_slice_header((ctb_x << log2) as u16, (ctb_y << log2) as u16)
        .clone();

    encode_coding_quadtree(enc, arena, grid, root, &pps, &shdr);

    let last = ctb_x + 1 == grid.width_ctbs() && ctb_y + 1 == grid.height_ctbs();
    enc.encode_term_bin(last);
}

#[cfg(test)]
mod test {
    use super::*;
    use std::rc::Rc;

    /// Remembers every bin as `(kind, value)`.
    #[derive(Default)]
    struct Recorder {
        bins: Vec<(String, u32)>,
    }

    impl EntropyEncoder for Recorder {
        fn encode_bin(&mut self, ctx: Ctx, bin: bool) {
            self.bins.push((format!("{:?}", ctx), bin as u32));
        }

        fn encode_bypass(&mut self, value: u32, num_bits: u32) {
            self.bins.push((format!("bypass{}", num_bits), value));
        }

        fn encode_term_bin(&mut self, bin: bool) {
            self.bins.push(("term".to_owned(), bin as u32));
        }
    }

    impl Recorder {
        fn kinds(&self) -> Vec<&str> {
            self.bins.iter().map(|(k, _)| k.as_str()).collect()
        }
    }

    fn setup(slice_type: SliceType) -> (NodeArena, CtbGrid) {
        let cfg = EncoderConfig {
            width: 16,
            height: 16,
            log2_ctb_size: 4,
            log2_max_tb_size: 4,
            ..Default::default()
        };
        let sps = Rc::new(Sps::from_config(&cfg));
        let mut arena = NodeArena::new();
        let mut grid = CtbGrid::new();
        grid.alloc(&mut arena, 16, 16, 4);
        grid.set_pps(Rc::new(Pps::new(sps, &cfg)));
        grid.add_slice_header(Rc::new(SliceHeader::new(slice_type, 27)));
        (arena, grid)
    }

    #[test]
    fn exp_golomb_lengths() {
        for &(v, k, bins) in &[
            (0u32, 0u32, 1usize),
            (1, 0, 3),
            (2, 0, 3),
            (3, 0, 5),
            (0, 1, 2),
            (5, 1, 4),
        ] {
            let mut rec = Recorder::default();
            encode_exp_golomb(&mut rec, v, k);
            let len: u32 = rec
                .bins
                .iter()
                .map(|(kind, _)| kind.trim_start_matches("bypass").parse::<u32>().unwrap())
                .sum();
            assert_eq!(len as usize, bins, "value {} k {}", v, k);
        }
    }

    #[test]
    fn mvd_sign_and_magnitude() {
        let mut rec = Recorder::default();
        encode_mvd(&mut rec, [0, -3]);
        assert_eq!(
            rec.bins,
            vec![
                ("AbsMvdGreater(0)".to_owned(), 0),
                ("AbsMvdGreater(0)".to_owned(), 1),
                ("AbsMvdGreater(1)".to_owned(), 1),
                // 3 - 2 = 1 in EG1: prefix 0, suffix 1
                ("bypass1".to_owned(), 0),
                ("bypass1".to_owned(), 1),
                ("bypass1".to_owned(), 1),
            ]
        );
    }

    #[test]
    fn intra_ctb_emits_quadtree_in_order() {
        let (mut arena, mut grid) = setup(SliceType::I);
        let root = arena.alloc_cb(EncCb::new(0, 0, 4, 0));
        let children = arena.split_cb(root, 16, 16);
        for child in children.iter().flatten() {
            let g = arena.cb(*child).geom;
            let tb = arena.alloc_tb(EncTb::new(g.x, g.y, g.log2_size, *child));
            arena.attach_transform_tree(*child, tb);
        }
        grid.set_ctb(&mut arena, 0, 0, root);

        let mut rec = Recorder::default();
        grid.encode_ctb(&arena, &mut rec, 0, 0);
        let kinds = rec.kinds();

        assert_eq!(kinds[0], "SplitCuFlag(0)");
        assert_eq!(rec.bins[0].1, 1);
        // four 8x8 leaves: part_mode, prev_intra_luma_pred_flag, mpm_idx "10",
        // chroma mode, split_transform_flag, cbf_cb, cbf_cr, cbf_luma
        let leaf = vec![
            "PartMode(0)",
            "PrevIntraLumaPredFlag",
            "bypass1",
            "bypass1",
            "IntraChromaPredMode",
            "SplitTransformFlag(2)",
            "CbfChroma(0)",
            "CbfChroma(0)",
            "CbfLuma(1)",
        ];
        let mut expect = vec!["SplitCuFlag(0)"];
        for _ in 0..4 {
            expect.extend(leaf.iter());
        }
        expect.push("term");
        assert_eq!(kinds, expect);
        assert_eq!(rec.bins.last().unwrap().1, 1);
    }

    #[test]
    fn inter_unit_without_residual_skips_transform_tree() {
        let (mut arena, mut grid) = setup(SliceType::P);
        let root = arena.alloc_cb(EncCb::new(0, 0, 4, 0));
        arena.cb_mut(root).set_pred_mode(PredMode::Inter);
        let tb = arena.alloc_tb(EncTb::new(0, 0, 4, root));
        arena.attach_transform_tree(root, tb);
        arena.set_rqt_root_cbf_from_children(root);
        grid.set_ctb(&mut arena, 0, 0, root);

        let mut rec = Recorder::default();
        grid.encode_ctb(&arena, &mut rec, 0, 0);
        let kinds = rec.kinds();
        assert_eq!(kinds[0], "SplitCuFlag(0)");
        assert_eq!(kinds[1], "PredModeFlag");
        assert_eq!(rec.bins[1].1, 0);
        assert_eq!(kinds[2], "PartMode(0)");
        assert_eq!(kinds[3], "MergeFlag");
        assert!(kinds.contains(&"MvpFlag"));
        let n = kinds.len();
        assert_eq!(kinds[n - 2], "RqtRootCbf");
        assert_eq!(rec.bins[n - 2].1, 0);
        assert_eq!(kinds[n - 1], "term");
    }

    #[test]
    fn chroma_residual_of_4x4_blocks_is_sent_once() {
        let params = TreeParams {
            log2_min_tb_size: 2,
            log2_max_tb_size: 4,
            max_depth: 1,
            intra: true,
        };
        let mut arena = NodeArena::new();
        let cb = arena.alloc_cb(EncCb::new(0, 0, 3, 0));
        let tb = arena.alloc_tb(EncTb::new(0, 0, 3, cb));
        arena.attach_transform_tree(cb, tb);
        let children = arena.split_tb(tb);
        {
            let holder = arena.tb_mut(children[3]);
            holder.cbf[U_C] = true;
            holder.alloc_coeff_memory(U_C, 4);
            holder.leaf_mut().unwrap().coeff[U_C][0] = 2;
        }
        arena.set_cbf_flags_from_children(tb);

        let mut rec = Recorder::default();
        encode_transform_tree(&mut rec, &arena, tb, &params, [true, true]);
        let kinds = rec.kinds();
        assert_eq!(&kinds[..3], &["SplitTransformFlag(2)", "CbfChroma(0)", "CbfChroma(0)"]);
        assert_eq!(kinds.iter().filter(|k| **k == "CbfLuma(0)").count(), 4);
        assert_eq!(kinds.iter().filter(|k| **k == "TransformSkipFlag(1)").count(), 1);
        assert_eq!(kinds.iter().filter(|k| **k == "SigCoeffFlag(1)").count(), 16);
    }

    #[test]
    fn split_flag_presence_follows_tree_limits() {
        let p = TreeParams {
            log2_min_tb_size: 2,
            log2_max_tb_size: 4,
            max_depth: 1,
            intra: false,
        };
        assert!(!p.split_flag_coded(5, 0));
        assert!(p.can_split(5, 0));
        assert!(!p.can_be_leaf(5));
        assert!(p.split_flag_coded(4, 1) == false);
        assert!(!p.can_split(4, 1));
        assert!(p.split_flag_coded(3, 0));
        assert!(!p.split_flag_coded(2, 0));
    }
}
