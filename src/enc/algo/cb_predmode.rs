use super::*;
use crate::api::PredMode;
use crate::com::tracer::TRACE_CU;
use crate::enc::options::{CodingOption, CodingOptions};
use crate::enc::sbac::RateEstimation;

/// Chooses between inter and intra prediction of a leaf by trying both.
///
/// `intra` and `inter` receive a leaf whose prediction mode is already set and
/// published, and fill in its prediction and residual.
pub struct CbPredModeBruteForce<I, P> {
    intra: I,
    inter: P,
}

impl<I: AlgoCb, P: AlgoCb> CbPredModeBruteForce<I, P> {
    pub fn new(intra: I, inter: P) -> Self {
        CbPredModeBruteForce { intra, inter }
    }

    fn try_mode(
        &mut self,
        ectx: &mut EncoderContext,
        options: &mut CodingOptions<CbIdx>,
        opt: CodingOption,
        mode: PredMode,
    ) {
        let mut trial = options.begin(&mut ectx.arena, &mut ectx.ctbs, opt);
        let node = trial.node;

        let geom = {
            let c = ectx.arena.cb_mut(node);
            c.set_pred_mode(mode);
            c.geom
        };
        ectx.img.set_pred_mode(geom.x, geom.y, geom.log2_size, mode);

        trial.node = match mode {
            PredMode::Intra => self.intra.analyze(ectx, &mut trial.context, node),
            PredMode::Inter => self.inter.analyze(ectx, &mut trial.context, node),
        };
        options.end(trial);
    }
}

impl<I: AlgoCb, P: AlgoCb> AlgoCb for CbPredModeBruteForce<I, P> {
    fn analyze(
        &mut self,
        ectx: &mut EncoderContext,
        ctx_model: &mut ContextModelTable,
        cb: CbIdx,
    ) -> CbIdx {
        let geom = {
            let c = ectx.arena.cb(cb);
            let leaf = match c.leaf() {
                Some(leaf) => leaf,
                None => panic!("prediction mode decision on split block {:?}", cb),
            };
            assert!(!leaf.pcm_flag, "prediction mode decision on PCM block {:?}", cb);
            c.geom
        };

        let mut options = CodingOptions::new(&ectx.arena, cb);
        let o_intra = options.new_option(&mut ectx.arena, true);
        let o_inter = options.new_option(&mut ectx.arena, !ectx.shdr.slice_type.is_intra_only());
        options.start(ctx_model, RateEstimation::Adaptive);

        if o_inter.is_active() {
            self.try_mode(ectx, &mut options, o_inter, PredMode::Inter);
        }
        self.try_mode(ectx, &mut options, o_intra, PredMode::Intra);

        options.compute_rdo_costs(&ectx.arena, ectx.lambda as f32);
        let cost = [o_intra, o_inter]
            .iter()
            .filter_map(|&o| options.rd_cost(o))
            .fold(f32::INFINITY, f32::min);
        let best = options.return_best_rdo(&mut ectx.arena, &mut ectx.ctbs, ctx_model);

        // the losing trial may have been published last
        ectx.arena.publish_pred_modes(best, &mut ectx.img);

        let mode = ectx.arena.cb(best).pred_mode();
        TRACE_CU(
            &mut ectx.tracer,
            geom.x,
            geom.y,
            geom.log2_size,
            false,
            mode,
            cost as f64,
        );
        best
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::{EncoderConfig, SliceType};
    use crate::enc::cb::EncCb;
    use crate::enc::test::*;
    use pretty_assertions::assert_eq;

    /// Reports fixed scores and remembers the published mode it was called with.
    struct Fixed {
        rate: f32,
        distortion: f32,
        seen: Vec<PredMode>,
    }

    impl Fixed {
        fn new(rate: f32, distortion: f32) -> Self {
            Fixed {
                rate,
                distortion,
                seen: vec![],
            }
        }
    }

    impl AlgoCb for Fixed {
        fn analyze(
            &mut self,
            ectx: &mut EncoderContext,
            _ctx_model: &mut ContextModelTable,
            cb: CbIdx,
        ) -> CbIdx {
            let c = ectx.arena.cb_mut(cb);
            c.rate = self.rate;
            c.distortion = self.distortion;
            let (x, y) = (c.geom.x, c.geom.y);
            self.seen.push(ectx.img.get_pred_mode(x, y));
            cb
        }
    }

    fn predictive_ctx() -> EncoderContext {
        let cfg = test_config(16, 16);
        let mut ectx = EncoderContext::new(&cfg).unwrap();
        ectx.encode_frame(noise_picture(16, 16, 5), &mut crate::enc::default_algo())
            .unwrap();
        ectx.begin_picture(noise_picture(16, 16, 6)).unwrap();
        assert_eq!(ectx.shdr.slice_type, SliceType::P);
        ectx.lambda = 1.0;
        ectx
    }

    fn root(ectx: &mut EncoderContext) -> CbIdx {
        let cb = ectx.arena.alloc_cb(EncCb::new(0, 0, 4, 0));
        ectx.ctbs.set_ctb(&mut ectx.arena, 0, 0, cb);
        cb
    }

    #[test]
    fn cheaper_intra_wins() {
        let mut ectx = predictive_ctx();
        let cb = root(&mut ectx);

        let mut algo = CbPredModeBruteForce::new(Fixed::new(40.0, 10.0), Fixed::new(10.0, 100.0));
        let mut ctx = ContextModelTable::new();
        let best = algo.analyze(&mut ectx, &mut ctx, cb);

        assert_eq!(ectx.arena.cb(best).pred_mode(), Some(PredMode::Intra));
        assert_eq!(ectx.ctbs.get_ctb(0, 0), Some(best));
        assert_eq!(ectx.arena.live_cbs(), 1);
        assert_eq!(algo.inter.seen, vec![PredMode::Inter]);
        assert_eq!(algo.intra.seen, vec![PredMode::Intra]);
        assert_eq!(ectx.img.get_pred_mode(8, 8), PredMode::Intra);
    }

    #[test]
    fn winning_inter_is_published_after_the_intra_trial() {
        let mut ectx = predictive_ctx();
        let cb = root(&mut ectx);

        let mut algo = CbPredModeBruteForce::new(Fixed::new(40.0, 100.0), Fixed::new(10.0, 10.0));
        let mut ctx = ContextModelTable::new();
        let best = algo.analyze(&mut ectx, &mut ctx, cb);

        assert_eq!(ectx.arena.cb(best).pred_mode(), Some(PredMode::Inter));
        assert_eq!(ectx.img.get_pred_mode(0, 0), PredMode::Inter);
        assert_eq!(ectx.img.get_pred_mode(15, 15), PredMode::Inter);
    }

    #[test]
    fn intra_slice_has_a_single_candidate() {
        let mut ectx = EncoderContext::new(&test_config(16, 16)).unwrap();
        ectx.begin_picture(noise_picture(16, 16, 5)).unwrap();
        let cb = root(&mut ectx);

        let mut algo = CbPredModeBruteForce::new(Fixed::new(1e6, 1e6), Fixed::new(0.0, 0.0));
        let mut ctx = ContextModelTable::new();
        let best = algo.analyze(&mut ectx, &mut ctx, cb);

        assert_eq!(best, cb);
        assert_eq!(ectx.arena.cb(best).pred_mode(), Some(PredMode::Intra));
        assert!(algo.inter.seen.is_empty());
    }

    #[test]
    fn intra_only_64x64_unit_skips_inter() {
        let cfg = EncoderConfig {
            log2_ctb_size: 6,
            ..test_config(64, 64)
        };
        let mut ectx = EncoderContext::new(&cfg).unwrap();
        ectx.begin_picture(noise_picture(64, 64, 9)).unwrap();
        assert_eq!(ectx.shdr.slice_type, SliceType::I);
        let cb = ectx.arena.alloc_cb(EncCb::new(0, 0, 6, 0));
        ectx.ctbs.set_ctb(&mut ectx.arena, 0, 0, cb);

        let mut algo = CbPredModeBruteForce::new(Fixed::new(40.0, 10.0), Fixed::new(10.0, 100.0));
        let mut ctx = ContextModelTable::new();
        let best = algo.analyze(&mut ectx, &mut ctx, cb);

        assert_eq!(best, cb);
        assert_eq!(ectx.ctbs.get_ctb(0, 0), Some(cb));
        assert_eq!(ectx.arena.cb(best).pred_mode(), Some(PredMode::Intra));
        assert_eq!(ectx.arena.live_cbs(), 1);
        assert_eq!(algo.intra.seen, vec![PredMode::Intra]);
        assert!(algo.inter.seen.is_empty());
        assert_eq!(ectx.img.get_pred_mode(63, 63), PredMode::Intra);
    }

    #[test]
    #[should_panic(expected = "PCM")]
    fn pcm_blocks_are_rejected() {
        let cfg = EncoderConfig {
            pcm_enabled: true,
            ..test_config(16, 16)
        };
        let mut ectx = EncoderContext::new(&cfg).unwrap();
        ectx.begin_picture(noise_picture(16, 16, 5)).unwrap();
        let cb = root(&mut ectx);
        ectx.arena.cb_mut(cb).leaf_mut().unwrap().pcm_flag = true;

        let mut algo = CbPredModeBruteForce::new(Fixed::new(0.0, 0.0), Fixed::new(0.0, 0.0));
        algo.analyze(&mut ectx, &mut ContextModelTable::new(), cb);
    }
}
