use super::arena::*;
use super::cb::CbContent;
use crate::com::imgbuf::SmallImageBuffer;
use crate::com::picture::Picture;
use crate::com::*;

const QUANT_SHIFT: u32 = 14;
const QUANT_SCALE: [u16; 6] = [26214, 23302, 20560, 18396, 16384, 14564];
const DEQUANT_SCALE: [u16; 6] = [40, 45, 51, 57, 64, 72];

/* rounding offsets in 1/512 of a quantization step */
const INTRA_RND_OFST: i64 = 171;
const INTER_RND_OFST: i64 = 85;

/// How the residual of a transform block is quantized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantParams {
    pub qp: u8,
    pub bypass: bool,
    pub intra: bool,
    pub bit_depth: u8,
}

impl QuantParams {
    /// Parameters of the coding block owning `tb`.
    pub fn for_tb(arena: &NodeArena, tb: TbIdx, intra: bool, bit_depth: u8) -> Self {
        let (qp, bypass) = match &arena.cb(arena.tb(tb).cb).content {
            CbContent::Leaf(leaf) => (leaf.qp, leaf.cu_transquant_bypass),
            CbContent::Split(_) => panic!("transform block {:?} below a split coding block", tb),
        };
        QuantParams {
            qp,
            bypass,
            intra,
            bit_depth,
        }
    }

    pub fn quantize(&self, r: i32) -> i16 {
        if self.bypass {
            return r as i16;
        }
        let shift = QUANT_SHIFT + self.qp as u32 / 6;
        let scale = QUANT_SCALE[self.qp as usize % 6] as i64;
        let ofst = if self.intra {
            INTRA_RND_OFST
        } else {
            INTER_RND_OFST
        } << (shift - 9);
        let level = ((r.abs() as i64 * scale + ofst) >> shift) as i16;
        if r < 0 {
            -level
        } else {
            level
        }
    }

    pub fn dequantize(&self, level: i16) -> i32 {
        if self.bypass {
            return level as i32;
        }
        let scale = (DEQUANT_SCALE[self.qp as usize % 6] as i64) << (self.qp / 6);
        ((level as i64 * scale + 32) >> 6) as i32
    }
}

/// Quantizes the residual of the leaf `tb` against `pred` for every component
/// the block codes and stores coefficients, coded-block flags, prediction and
/// the decoded residual in it. Leaves the summed squared error in `distortion`.
///
/// Transforms are skipped: coefficients are quantized sample differences.
pub fn code_leaf_tb(
    arena: &mut NodeArena,
    tb: TbIdx,
    input: &Picture,
    mut pred: [Option<SmallImageBuffer>; N_C],
    qparams: &QuantParams,
) {
    let max = (1i32 << qparams.bit_depth) - 1;
    let t = arena.tb_mut(tb);
    assert!(!t.is_split(), "residual coding of split transform block {:?}", tb);

    let mut distortion = 0i64;
    for c in 0..N_C {
        let (x0, y0, log2) = match t.component_block(c) {
            Some(blk) => blk,
            None => continue,
        };
        let p = match pred[c].take() {
            Some(p) => p,
            None => panic!("no prediction for component {} of {:?}", c, tb),
        };

        let size = 1usize << log2;
        let mut residual = SmallImageBuffer::new(log2);
        let mut coded = false;
        let mut coeff = vec![0i16; size * size];

        let plane = &input.planes[c];
        for j in 0..size {
            for i in 0..size {
                let orig = plane.p(x0 as usize + i, y0 as usize + j) as i32;
                let pr = p.at(i, j) as i32;
                let level = qparams.quantize(orig - pr);
                let r = qparams.dequantize(level);
                let rec = clip(pr + r, 0, max);

                coeff[j * size + i] = level;
                residual.set(i, j, r as pel);
                coded |= level != 0;
                distortion += ((orig - rec) * (orig - rec)) as i64;
            }
        }

        if let Some(leaf) = t.leaf_mut() {
            leaf.coeff[c] = coeff;
            leaf.skip_transform[c][0] = true;
        }
        t.cbf[c] = coded;
        t.intra_prediction[c] = Some(p);
        t.residual[c] = Some(residual);
    }
    t.distortion = distortion as f32;
}
