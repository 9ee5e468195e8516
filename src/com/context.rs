/*****************************************************************************
 * adaptive context models
 *****************************************************************************/
#[allow(non_camel_case_types)]
pub type SBAC_CTX_MODEL = u16;

/* (state << 1) | mps, state being the LPS probability in 1/512 units */
pub const PROB_INIT: SBAC_CTX_MODEL = 512; /* 1/2 of initialization with mps = 0 */

pub const NUM_CTX_SPLIT_CU_FLAG: usize = 3;
pub const NUM_CTX_CU_TRANSQUANT_BYPASS_FLAG: usize = 1;
pub const NUM_CTX_PRED_MODE: usize = 1;
pub const NUM_CTX_PART_MODE: usize = 4;
pub const NUM_CTX_PREV_INTRA_LUMA_PRED_FLAG: usize = 1;
pub const NUM_CTX_INTRA_CHROMA_PRED_MODE: usize = 1;
pub const NUM_CTX_RQT_ROOT_CBF: usize = 1;
pub const NUM_CTX_MERGE_FLAG: usize = 1;
pub const NUM_CTX_MERGE_IDX: usize = 1;
pub const NUM_CTX_INTER_PRED_IDC: usize = 5;
pub const NUM_CTX_REF_IDX: usize = 2;
pub const NUM_CTX_MVP_FLAG: usize = 1;
pub const NUM_CTX_ABS_MVD_GREATER: usize = 2;
pub const NUM_CTX_SPLIT_TRANSFORM_FLAG: usize = 3;
pub const NUM_CTX_CBF_LUMA: usize = 2;
pub const NUM_CTX_CBF_CHROMA: usize = 4;
pub const NUM_CTX_TRANSFORM_SKIP_FLAG: usize = 2;
pub const NUM_CTX_SIG_COEFF_FLAG: usize = 2;
pub const NUM_CTX_COEFF_ABS_LEVEL_GREATER1: usize = 2;

/// Address of one adaptive model inside a [`ContextModelTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ctx {
    SplitCuFlag(usize),
    CuTransquantBypassFlag,
    PredModeFlag,
    PartMode(usize),
    PrevIntraLumaPredFlag,
    IntraChromaPredMode,
    RqtRootCbf,
    MergeFlag,
    MergeIdx,
    InterPredIdc(usize),
    RefIdx(usize),
    MvpFlag,
    AbsMvdGreater(usize),
    SplitTransformFlag(usize),
    CbfLuma(usize),
    CbfChroma(usize),
    TransformSkipFlag(usize),
    SigCoeffFlag(usize),
    CoeffAbsLevelGreater1(usize),
}

/// The complete adaptive probability state of the entropy coder.
///
/// Copying the table is the snapshot operation used to isolate rate estimates
/// of competing candidates from each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextModelTable {
    pub split_cu_flag: [SBAC_CTX_MODEL; NUM_CTX_SPLIT_CU_FLAG],
    pub cu_transquant_bypass_flag: [SBAC_CTX_MODEL; NUM_CTX_CU_TRANSQUANT_BYPASS_FLAG],
    pub pred_mode_flag: [SBAC_CTX_MODEL; NUM_CTX_PRED_MODE],
    pub part_mode: [SBAC_CTX_MODEL; NUM_CTX_PART_MODE],
    pub prev_intra_luma_pred_flag: [SBAC_CTX_MODEL; NUM_CTX_PREV_INTRA_LUMA_PRED_FLAG],
    pub intra_chroma_pred_mode: [SBAC_CTX_MODEL; NUM_CTX_INTRA_CHROMA_PRED_MODE],
    pub rqt_root_cbf: [SBAC_CTX_MODEL; NUM_CTX_RQT_ROOT_CBF],
    pub merge_flag: [SBAC_CTX_MODEL; NUM_CTX_MERGE_FLAG],
    pub merge_idx: [SBAC_CTX_MODEL; NUM_CTX_MERGE_IDX],
    pub inter_pred_idc: [SBAC_CTX_MODEL; NUM_CTX_INTER_PRED_IDC],
    pub ref_idx: [SBAC_CTX_MODEL; NUM_CTX_REF_IDX],
    pub mvp_flag: [SBAC_CTX_MODEL; NUM_CTX_MVP_FLAG],
    pub abs_mvd_greater: [SBAC_CTX_MODEL; NUM_CTX_ABS_MVD_GREATER],
    pub split_transform_flag: [SBAC_CTX_MODEL; NUM_CTX_SPLIT_TRANSFORM_FLAG],
    pub cbf_luma: [SBAC_CTX_MODEL; NUM_CTX_CBF_LUMA],
    pub cbf_chroma: [SBAC_CTX_MODEL; NUM_CTX_CBF_CHROMA],
    pub transform_skip_flag: [SBAC_CTX_MODEL; NUM_CTX_TRANSFORM_SKIP_FLAG],
    pub sig_coeff_flag: [SBAC_CTX_MODEL; NUM_CTX_SIG_COEFF_FLAG],
    pub coeff_abs_level_greater1: [SBAC_CTX_MODEL; NUM_CTX_COEFF_ABS_LEVEL_GREATER1],
}

impl Default for ContextModelTable {
    fn default() -> Self {
        ContextModelTable {
            split_cu_flag: [PROB_INIT; NUM_CTX_SPLIT_CU_FLAG],
            cu_transquant_bypass_flag: [PROB_INIT; NUM_CTX_CU_TRANSQUANT_BYPASS_FLAG],
            pred_mode_flag: [PROB_INIT; NUM_CTX_PRED_MODE],
            part_mode: [PROB_INIT; NUM_CTX_PART_MODE],
            prev_intra_luma_pred_flag: [PROB_INIT; NUM_CTX_PREV_INTRA_LUMA_PRED_FLAG],
            intra_chroma_pred_mode: [PROB_INIT; NUM_CTX_INTRA_CHROMA_PRED_MODE],
            rqt_root_cbf: [PROB_INIT; NUM_CTX_RQT_ROOT_CBF],
            merge_flag: [PROB_INIT; NUM_CTX_MERGE_FLAG],
            merge_idx: [PROB_INIT; NUM_CTX_MERGE_IDX],
            inter_pred_idc: [PROB_INIT; NUM_CTX_INTER_PRED_IDC],
            ref_idx: [PROB_INIT; NUM_CTX_REF_IDX],
            mvp_flag: [PROB_INIT; NUM_CTX_MVP_FLAG],
            abs_mvd_greater: [PROB_INIT; NUM_CTX_ABS_MVD_GREATER],
            split_transform_flag: [PROB_INIT; NUM_CTX_SPLIT_TRANSFORM_FLAG],
            cbf_luma: [PROB_INIT; NUM_CTX_CBF_LUMA],
            cbf_chroma: [PROB_INIT; NUM_CTX_CBF_CHROMA],
            transform_skip_flag: [PROB_INIT; NUM_CTX_TRANSFORM_SKIP_FLAG],
            sig_coeff_flag: [PROB_INIT; NUM_CTX_SIG_COEFF_FLAG],
            coeff_abs_level_greater1: [PROB_INIT; NUM_CTX_COEFF_ABS_LEVEL_GREATER1],
        }
    }
}

macro_rules! select_model {
    ($tbl:expr, $ctx:expr, $($r:tt)+) => {{
        use self::Ctx::*;
        match $ctx {
            SplitCuFlag(i) => $($r)+ $tbl.split_cu_flag[i],
            CuTransquantBypassFlag => $($r)+ $tbl.cu_transquant_bypass_flag[0],
            PredModeFlag => $($r)+ $tbl.pred_mode_flag[0],
            PartMode(i) => $($r)+ $tbl.part_mode[i],
            PrevIntraLumaPredFlag => $($r)+ $tbl.prev_intra_luma_pred_flag[0],
            IntraChromaPredMode => $($r)+ $tbl.intra_chroma_pred_mode[0],
            RqtRootCbf => $($r)+ $tbl.rqt_root_cbf[0],
            MergeFlag => $($r)+ $tbl.merge_flag[0],
            MergeIdx => $($r)+ $tbl.merge_idx[0],
            InterPredIdc(i) => $($r)+ $tbl.inter_pred_idc[i],
            RefIdx(i) => $($r)+ $tbl.ref_idx[i],
            MvpFlag => $($r)+ $tbl.mvp_flag[0],
            AbsMvdGreater(i) => $($r)+ $tbl.abs_mvd_greater[i],
            SplitTransformFlag(i) => $($r)+ $tbl.split_transform_flag[i],
            CbfLuma(i) => $($r)+ $tbl.cbf_luma[i],
            CbfChroma(i) => $($r)+ $tbl.cbf_chroma[i],
            TransformSkipFlag(i) => $($r)+ $tbl.transform_skip_flag[i],
            SigCoeffFlag(i) => $($r)+ $tbl.sig_coeff_flag[i],
            CoeffAbsLevelGreater1(i) => $($r)+ $tbl.coeff_abs_level_greater1[i],
        }
    }};
}

impl ContextModelTable {
    pub fn new() -> Self {
        ContextModelTable::default()
    }

    /// Back to the slice-start state.
    pub fn reset(&mut self) {
        *self = ContextModelTable::default();
    }

    pub fn model(&self, ctx: Ctx) -> SBAC_CTX_MODEL {
        *select_model!(self, ctx, &)
    }

    pub fn model_mut(&mut self, ctx: Ctx) -> &mut SBAC_CTX_MODEL {
        select_model!(self, ctx, &mut)
    }
}

/* fractional bits are counted in 1/32768 bit units */
pub const FRAC_BITS_SCALE: f64 = 32768.0;

lazy_static! {
    pub static ref entropy_bits: Box<[i32]> = {
        let mut bits = vec![0; 1024].into_boxed_slice();
        for i in 0..1024 {
            let p = (512.0 * (i as f64 + 0.5)) / 1024.0;
            bits[i] = (-32768.0 * (p.log10() / (2.0f64).log10() - 9.0)) as i32;
        }
        bits
    };
}

/// Cost of coding `symbol` with model `cm`, in 1/32768 bits.
pub fn biari_no_bits(symbol: bool, cm: SBAC_CTX_MODEL) -> i32 {
    let mps = cm & 1;
    let mut state = cm >> 1;
    let sym = if symbol { 1 } else { 0 };
    state = if sym != mps { state } else { 512 - state };

    entropy_bits[(state as usize) << 1]
}

/// Probability adaptation after coding `bin` with `model`.
pub fn update_model(model: &mut SBAC_CTX_MODEL, bin: bool) {
    let mut state = (*model) >> 1;
    let mut mps = (*model) & 1;
    let bin = if bin { 1 } else { 0 };

    if bin != mps {
        state = state + ((512 - state + 16) >> 5);
        if state > 256 {
            mps = 1 - mps;
            state = 512 - state;
        }
    } else {
        state = state - ((state + 16) >> 5);
    }
    *model = (state << 1) + mps;
}
