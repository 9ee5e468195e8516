mod cb_predmode;
mod cb_split;
mod pinter;
mod pintra;
mod tb_split;

pub use cb_predmode::*;
pub use cb_split::*;
pub use pinter::*;
pub use pintra::*;
pub use tb_split::*;

use super::arena::*;
use super::eco;
use super::options::Trial;
use super::EncoderContext;
use crate::com::context::ContextModelTable;
use crate::com::imgbuf::SmallImageBuffer;
use crate::com::*;

/// A decision taken at one coding block.
///
/// Receives an undecided block that is already linked into its slot and returns the
/// (possibly replaced) block holding the decided subtree, with its rate and distortion.
/// `ctx_model` enters as the state before the block and leaves as the state after it.
pub trait AlgoCb {
    fn analyze(
        &mut self,
        ectx: &mut EncoderContext,
        ctx_model: &mut ContextModelTable,
        cb: CbIdx,
    ) -> CbIdx;
}

impl<A: AlgoCb + ?Sized> AlgoCb for Box<A> {
    fn analyze(
        &mut self,
        ectx: &mut EncoderContext,
        ctx_model: &mut ContextModelTable,
        cb: CbIdx,
    ) -> CbIdx {
        (**self).analyze(ectx, ctx_model, cb)
    }
}

/// Prediction for the leaves of a transform tree.
pub trait TbPredictor {
    /// One buffer for every component block that `tb` codes, `None` for the others.
    fn predict(&mut self, ectx: &mut EncoderContext, tb: TbIdx) -> [Option<SmallImageBuffer>; N_C];
}

/// Rate of everything in front of the transform tree of the leaf `cb`.
pub(crate) fn cu_prefix_rate(ectx: &EncoderContext, trial: &mut Trial<CbIdx>, cb: CbIdx) -> f32 {
    let mut cabac = trial.cabac();
    eco::encode_cu_prefix(&mut cabac, &ectx.arena, cb, &ectx.pps, &ectx.shdr);
    cabac.rate()
}
