pub mod algo;
pub mod arena;
pub mod cb;
pub mod eco;
pub mod grid;
pub mod node;
pub mod options;
pub mod sbac;
pub mod tb;
pub mod tq;

use std::rc::Rc;

use crate::api::*;
use crate::com::context::ContextModelTable;
use crate::com::picture::Picture;
use crate::com::ps::*;
use crate::com::tracer::*;
use crate::com::*;

use algo::*;
use arena::*;
use cb::EncCb;
use grid::CtbGrid;
use sbac::SbacWriter;

/* Max. and min. Quantization parameter */
pub const MAX_QUANT: u8 = 51;
pub const MIN_QUANT: u8 = 0;

/// Lagrange multiplier for SSD distortion and rates in bits.
pub fn lambda_for_qp(qp: u8) -> f64 {
    0.85 * 2.0f64.powf((qp as f64 - 12.0) / 3.0)
}

/// What came out of one coded picture.
#[derive(Debug, Default, Clone)]
pub struct PictureStats {
    pub frame_number: u64,
    pub slice_type: SliceType,
    pub qp: u8,
    /* arithmetic coded CTB payload */
    pub data: Vec<u8>,
    pub num_cbs: usize,
    pub num_tbs: usize,
    pub psnr: [f64; N_C],
}

impl PictureStats {
    pub fn bytes(&self) -> usize {
        self.data.len()
    }
}

/// Per-picture state the coding-tree search reads and publishes into.
pub struct EncoderContext {
    pub cfg: EncoderConfig,
    pub sps: Rc<Sps>,
    pub pps: Rc<Pps>,
    pub shdr: Rc<SliceHeader>,

    pub active_qp: u8,
    pub lambda: f64,

    /// Reconstruction under construction, with the prediction-mode map.
    pub img: Picture,
    pub input: Rc<Picture>,
    pub reference: Option<Rc<Picture>>,

    pub ctbs: CtbGrid,
    pub arena: NodeArena,

    frame_number: u64,
    pub(crate) tracer: Option<Tracer>,
}

impl EncoderContext {
    pub fn new(cfg: &EncoderConfig) -> Result<Self, CtbError> {
        cfg.validate()?;

        let sps = Rc::new(Sps::from_config(cfg));
        let pps = Rc::new(Pps::new(Rc::clone(&sps), cfg));
        let (w, h, bd) = (cfg.width, cfg.height, cfg.bit_depth as u8);

        let mut ectx = EncoderContext {
            cfg: *cfg,
            sps,
            pps,
            shdr: Rc::new(SliceHeader::new(SliceType::I, cfg.qp)),
            active_qp: cfg.qp,
            lambda: lambda_for_qp(cfg.qp),
            img: Picture::new(w, h, bd),
            input: Rc::new(Picture::new(w, h, bd)),
            reference: None,
            ctbs: CtbGrid::new(),
            arena: NodeArena::new(),
            frame_number: 0,
            tracer: OPEN_TRACE(),
        };
        ectx.set_qp(cfg.qp);

        debug!(
            "encoder {}x{} CTB {} qp {} lambda {:.3}",
            w,
            h,
            1 << cfg.log2_ctb_size,
            ectx.active_qp,
            ectx.lambda
        );
        Ok(ectx)
    }

    pub fn set_qp(&mut self, qp: u8) {
        self.active_qp = clip(qp, MIN_QUANT, MAX_QUANT);
        self.lambda = lambda_for_qp(self.active_qp);
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    fn decide_slice_type(&self) -> SliceType {
        let kfi = self.cfg.key_frame_interval;
        let key = self.frame_number == 0 || (kfi > 0 && self.frame_number % kfi == 0);
        if key || self.reference.is_none() {
            SliceType::I
        } else {
            SliceType::P
        }
    }

    /// Installs `input` as the picture to code and resets the CTB grid.
    pub fn begin_picture(&mut self, mut input: Picture) -> Result<(), CtbError> {
        if input.width() != self.cfg.width || input.height() != self.cfg.height {
            return Err(CtbError::SizeMismatch(
                input.width(),
                input.height(),
                self.cfg.width,
                self.cfg.height,
            ));
        }
        if input.bit_depth as usize != self.cfg.bit_depth {
            return Err(CtbError::Unsupported(format!(
                "{}-bit input for a {}-bit encoder",
                input.bit_depth, self.cfg.bit_depth
            )));
        }

        input.poc = self.frame_number;
        self.input = Rc::new(input);
        self.img = Picture::new(self.cfg.width, self.cfg.height, self.cfg.bit_depth as u8);
        self.img.poc = self.frame_number;

        let slice_type = self.decide_slice_type();
        self.shdr = Rc::new(SliceHeader::new(slice_type, self.active_qp));

        self.ctbs.alloc(
            &mut self.arena,
            self.cfg.width,
            self.cfg.height,
            self.sps.log2_ctb_size,
        );
        self.ctbs.set_pps(Rc::clone(&self.pps));
        self.ctbs.set_input_image(Rc::clone(&self.input));
        self.ctbs.add_slice_header(Rc::clone(&self.shdr));

        debug!("picture {} begins as {} slice", self.frame_number, slice_type);
        Ok(())
    }

    /// Decides the coding tree of every CTB with `algo`, writes the reconstruction and
    /// serializes the trees.
    pub fn encode_picture(&mut self, algo: &mut dyn AlgoCb) -> PictureStats {
        let log2_ctb = self.sps.log2_ctb_size;
        let (width_ctbs, height_ctbs) = (self.ctbs.width_ctbs(), self.ctbs.height_ctbs());
        let bypass = self.cfg.transquant_bypass_enabled;

        let mut ctx_model = ContextModelTable::new();
        let mut writer = SbacWriter::new();
        let (mut num_cbs, mut num_tbs) = (0, 0);

        for ctb_y in 0..height_ctbs {
            for ctb_x in 0..width_ctbs {
                let mut root = EncCb::new(
                    (ctb_x << log2_ctb) as u16,
                    (ctb_y << log2_ctb) as u16,
                    log2_ctb,
                    0,
                );
                if let Some(leaf) = root.leaf_mut() {
                    leaf.qp = self.active_qp;
                    leaf.cu_transquant_bypass = bypass;
                }
                let cb = self.arena.alloc_cb(root);
                self.ctbs.set_ctb(&mut self.arena, ctb_x, ctb_y, cb);
                self.ctbs.set_slice_header_id(ctb_x, ctb_y, 0);

                let best = algo.analyze(self, &mut ctx_model, cb);
                self.ctbs.set_ctb(&mut self.arena, ctb_x, ctb_y, best);
                self.arena.write_cb_reconstruction_to_image(best, &mut self.img);

                self.ctbs.encode_ctb(&self.arena, &mut writer, ctb_x, ctb_y);

                let (cbs, tbs) = self.arena.count_cb_subtree(best);
                num_cbs += cbs;
                num_tbs += tbs;
                trace!(
                    "CTB ({}, {}): {} coding blocks, {} transform blocks",
                    ctb_x,
                    ctb_y,
                    cbs,
                    tbs
                );
            }
        }

        let data = writer.finish();
        let mut psnr = [0.0; N_C];
        for (c, p) in psnr.iter_mut().enumerate() {
            *p = self.img.psnr(&self.input, c);
        }
        PictureStats {
            frame_number: self.frame_number,
            slice_type: self.shdr.slice_type,
            qp: self.active_qp,
            data,
            num_cbs,
            num_tbs,
            psnr,
        }
    }

    /// Keeps the reconstruction as reference for the next picture and releases all trees.
    pub fn end_picture(&mut self) -> &Picture {
        self.ctbs.clear(&mut self.arena);
        if self.arena.live_cbs() != 0 || self.arena.live_tbs() != 0 {
            warn!(
                "{} coding and {} transform blocks outlived picture {}",
                self.arena.live_cbs(),
                self.arena.live_tbs(),
                self.frame_number
            );
        }
        self.reference = Some(Rc::new(self.img.clone()));
        self.frame_number += 1;
        &self.img
    }

    /// [`EncoderContext::begin_picture`], [`EncoderContext::encode_picture`] and
    /// [`EncoderContext::end_picture`] in one go.
    pub fn encode_frame(
        &mut self,
        input: Picture,
        algo: &mut dyn AlgoCb,
    ) -> Result<PictureStats, CtbError> {
        self.begin_picture(input)?;
        let stats = self.encode_picture(algo);
        self.end_picture();
        info!(
            "frame {} {} {} bytes {} CBs PSNR Y {:.2}",
            stats.frame_number,
            stats.slice_type,
            stats.bytes(),
            stats.num_cbs,
            stats.psnr[Y_C]
        );
        Ok(stats)
    }
}

/// Split decision on top of an intra/inter choice with the reference searches.
pub fn default_algo() -> CbSplitBruteForce<CbPredModeBruteForce<IntraDcSearch, InterZeroMvSearch>> {
    CbSplitBruteForce::new(CbPredModeBruteForce::new(
        IntraDcSearch::new(),
        InterZeroMvSearch::new(),
    ))
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;

    pub(crate) fn test_config(width: usize, height: usize) -> EncoderConfig {
        EncoderConfig {
            width,
            height,
            log2_ctb_size: 4,
            qp: 22,
            ..Default::default()
        }
    }

    pub(crate) fn noise_picture(width: usize, height: usize, seed: u8) -> Picture {
        let mut ra = ChaChaRng::from_seed([seed; 32]);
        let mut pic = Picture::new(width, height, 8);
        for plane in pic.planes.iter_mut() {
            for y in 0..plane.height {
                for x in 0..plane.width {
                    let base = ((x + y) * 4) as pel;
                    plane.set(x, y, base.min(200) + ra.gen_range(0, 16));
                }
            }
        }
        pic
    }

    #[test]
    fn lambda_grows_with_qp() {
        assert!((lambda_for_qp(12) - 0.85).abs() < 1e-9);
        assert!((lambda_for_qp(15) - 1.7).abs() < 1e-9);
        assert!(lambda_for_qp(37) > lambda_for_qp(22));
    }

    #[test]
    fn rejects_mismatching_picture() {
        let mut ectx = EncoderContext::new(&test_config(32, 32)).unwrap();
        match ectx.begin_picture(Picture::new(16, 32, 8)) {
            Err(CtbError::SizeMismatch(16, 32, 32, 32)) => {}
            other => panic!("unexpected {:?}", other.err()),
        }
    }

    #[test]
    fn first_picture_is_intra_then_predictive() {
        let mut ectx = EncoderContext::new(&test_config(32, 16)).unwrap();
        let mut algo = default_algo();

        let s0 = ectx.encode_frame(noise_picture(32, 16, 1), &mut algo).unwrap();
        assert_eq!(s0.slice_type, SliceType::I);
        let s1 = ectx.encode_frame(noise_picture(32, 16, 2), &mut algo).unwrap();
        assert_eq!(s1.slice_type, SliceType::P);
        assert_eq!(ectx.frame_number(), 2);
        assert!(ectx.reference.is_some());
    }

    #[test]
    fn picture_trees_are_released_after_coding() {
        let mut ectx = EncoderContext::new(&test_config(48, 24)).unwrap();
        let mut algo = default_algo();

        ectx.begin_picture(noise_picture(48, 24, 5)).unwrap();
        let stats = ectx.encode_picture(&mut algo);
        assert!(stats.num_cbs >= 6);
        assert!(stats.bytes() > 0);
        assert_eq!(ectx.arena.live_cbs(), stats.num_cbs);
        assert_eq!(ectx.arena.live_tbs(), stats.num_tbs);

        ectx.end_picture();
        assert_eq!(ectx.arena.live_cbs(), 0);
        assert_eq!(ectx.arena.live_tbs(), 0);
    }

    #[test]
    fn lossless_bypass_reproduces_input() {
        let cfg = EncoderConfig {
            transquant_bypass_enabled: true,
            ..test_config(32, 32)
        };
        let mut ectx = EncoderContext::new(&cfg).unwrap();
        let mut algo = default_algo();

        let input = noise_picture(32, 32, 9);
        let stats = ectx.encode_frame(input.clone(), &mut algo).unwrap();
        for c in 0..N_C {
            assert_eq!(stats.psnr[c], 100.0);
            assert_eq!(ectx.img.ssd(&input, c), 0);
        }
    }

    #[test]
    fn static_content_prefers_inter() {
        let mut ectx = EncoderContext::new(&test_config(32, 32)).unwrap();
        let mut algo = default_algo();

        let input = noise_picture(32, 32, 4);
        ectx.encode_frame(input.clone(), &mut algo).unwrap();
        ectx.begin_picture(input).unwrap();
        ectx.encode_picture(&mut algo);

        let inter = (0..32u16)
            .step_by(8)
            .flat_map(|y| (0..32u16).step_by(8).map(move |x| (x, y)))
            .filter(|&(x, y)| ectx.img.get_pred_mode(x, y) == PredMode::Inter)
            .count();
        assert!(inter > 0);
    }
}
