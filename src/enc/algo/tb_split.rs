use super::*;
use crate::enc::eco::TreeParams;
use crate::enc::options::CodingOptions;
use crate::enc::sbac::RateEstimation;
use crate::enc::tq::{self, QuantParams};

/// Tries every transform block both as a leaf and split into four, recursively.
#[derive(Debug, Default, Clone, Copy)]
pub struct TbSplitBruteForce;

impl TbSplitBruteForce {
    pub fn new() -> Self {
        TbSplitBruteForce
    }

    pub fn analyze<P: TbPredictor + ?Sized>(
        &mut self,
        ectx: &mut EncoderContext,
        ctx_model: &mut ContextModelTable,
        tb: TbIdx,
        params: &TreeParams,
        predictor: &mut P,
    ) -> TbIdx {
        let (log2, depth) = {
            let t = ectx.arena.tb(tb);
            (t.geom.log2_size, t.trafo_depth)
        };

        let mut options = CodingOptions::new(&ectx.arena, tb);
        let o_leaf = options.new_option(&mut ectx.arena, params.can_be_leaf(log2));
        let o_split = options.new_option(&mut ectx.arena, params.can_split(log2, depth));
        options.start(ctx_model, RateEstimation::Adaptive);

        if o_leaf.is_active() {
            let mut trial = options.begin(&mut ectx.arena, &mut ectx.ctbs, o_leaf);
            let node = trial.node;

            let pred = predictor.predict(ectx, node);
            let qparams =
                QuantParams::for_tb(&ectx.arena, node, params.intra, ectx.sps.bit_depth_luma);
            tq::code_leaf_tb(&mut ectx.arena, node, &ectx.input, pred, &qparams);

            // The chroma flags of the parent depend on this decision, so both are
            // assumed set here. A split parent re-codes its children with the real ones.
            let (rate, cbf_chroma_rate) = {
                let t = ectx.arena.tb(node);
                let mut cabac = trial.cabac();
                eco::encode_split_transform_flag(&mut cabac, t, params);
                let r0 = cabac.rate();
                eco::encode_cbf_chroma(&mut cabac, t, [true, true]);
                let r1 = cabac.rate();
                eco::encode_transform_unit(&mut cabac, t, params, [true, true]);
                (cabac.rate(), r1 - r0)
            };

            let t = ectx.arena.tb_mut(node);
            t.rate = rate;
            t.rate_without_cbf_chroma = rate - cbf_chroma_rate;
            options.end(trial);
        }

        if o_split.is_active() {
            let mut trial = options.begin(&mut ectx.arena, &mut ectx.ctbs, o_split);
            let node = trial.node;

            let baseline = trial.context;
            let children = ectx.arena.split_tb(node);
            let mut distortion = 0.0;
            for child in children.iter() {
                let best = self.analyze(ectx, &mut trial.context, *child, params, predictor);
                distortion += ectx.arena.tb(best).distortion;
            }
            ectx.arena.set_cbf_flags_from_children(node);

            // decided subtree in emission order, chroma flags gated by this node's
            trial.context = baseline;
            let (rate, cbf_chroma_rate) = {
                let t = ectx.arena.tb(node);
                let cbf_chroma = [t.cbf[U_C], t.cbf[V_C]];
                let mut cabac = trial.cabac();
                eco::encode_split_transform_flag(&mut cabac, t, params);
                let r0 = cabac.rate();
                eco::encode_cbf_chroma(&mut cabac, t, [true, true]);
                let r1 = cabac.rate();
                if let Some(children) = t.children() {
                    for child in children.iter() {
                        eco::encode_transform_tree(
                            &mut cabac,
                            &ectx.arena,
                            *child,
                            params,
                            cbf_chroma,
                        );
                    }
                }
                (cabac.rate(), r1 - r0)
            };

            let t = ectx.arena.tb_mut(node);
            t.distortion = distortion;
            t.rate = rate;
            t.rate_without_cbf_chroma = rate - cbf_chroma_rate;
            options.end(trial);
        }

        options.compute_rdo_costs(&ectx.arena, ectx.lambda as f32);
        options.return_best_rdo(&mut ectx.arena, &mut ectx.ctbs, ctx_model)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::EncoderConfig;
    use crate::com::picture::Picture;
    use crate::enc::cb::EncCb;
    use crate::enc::sbac::CabacEstimator;
    use crate::enc::tb::EncTb;
    use crate::enc::test::test_config;
    use pretty_assertions::assert_eq;

    /// Predicts a constant value per component.
    struct Flat([pel; N_C]);

    impl TbPredictor for Flat {
        fn predict(
            &mut self,
            ectx: &mut EncoderContext,
            tb: TbIdx,
        ) -> [Option<SmallImageBuffer>; N_C] {
            let t = ectx.arena.tb(tb);
            let mut pred = [None, None, None];
            for (c, p) in pred.iter_mut().enumerate() {
                if let Some((_, _, log2)) = t.component_block(c) {
                    let mut buf = SmallImageBuffer::new(log2);
                    buf.fill(self.0[c]);
                    *p = Some(buf);
                }
            }
            pred
        }
    }

    fn setup(input: Picture, max_depth: u8) -> (EncoderContext, CbIdx, TbIdx) {
        let cfg = EncoderConfig {
            max_transform_hierarchy_depth_intra: max_depth,
            ..test_config(16, 16)
        };
        let mut ectx = EncoderContext::new(&cfg).unwrap();
        ectx.begin_picture(input).unwrap();

        let mut root = EncCb::new(0, 0, 4, 0);
        root.leaf_mut().unwrap().qp = 22;
        let cb = ectx.arena.alloc_cb(root);
        ectx.ctbs.set_ctb(&mut ectx.arena, 0, 0, cb);
        let tb = ectx.arena.alloc_tb(EncTb::new(0, 0, 4, cb));
        ectx.arena.attach_transform_tree(cb, tb);
        (ectx, cb, tb)
    }

    #[test]
    fn flat_block_stays_unsplit() {
        let mut input = Picture::new(16, 16, 8);
        input.planes[Y_C].fill(90);
        input.planes[U_C].fill(128);
        input.planes[V_C].fill(128);
        let (mut ectx, cb, tb) = setup(input, 2);

        let params = TreeParams::new(&ectx.sps, true);
        let mut ctx = ContextModelTable::new();
        let best = TbSplitBruteForce::new().analyze(
            &mut ectx,
            &mut ctx,
            tb,
            &params,
            &mut Flat([90, 128, 128]),
        );

        let t = ectx.arena.tb(best);
        assert!(!t.is_split());
        assert!(t.is_zero_block());
        assert_eq!(t.distortion, 0.0);
        assert_eq!(ectx.arena.cb(cb).transform_tree(), Some(best));
        assert_eq!(ectx.arena.live_tbs(), 1);
    }

    #[test]
    fn quadrant_detail_is_coded_below_the_root() {
        let mut input = Picture::new(16, 16, 8);
        input.planes[U_C].fill(128);
        input.planes[V_C].fill(128);
        for y in 0..16 {
            for x in 0..16 {
                let v = if x >= 8 && y >= 8 { 30 + ((x * 7 + y * 13) % 90) as pel } else { 128 };
                input.planes[Y_C].set(x, y, v);
            }
        }
        let (mut ectx, cb, tb) = setup(input, 2);

        let params = TreeParams::new(&ectx.sps, true);
        let mut ctx = ContextModelTable::new();
        let best = TbSplitBruteForce::new().analyze(
            &mut ectx,
            &mut ctx,
            tb,
            &params,
            &mut Flat([128, 128, 128]),
        );

        let t = ectx.arena.tb(best);
        assert!(t.cbf[Y_C]);
        assert!(!t.cbf[U_C] && !t.cbf[V_C]);
        if let Some(children) = t.children() {
            let children = *children;
            for i in 0..3 {
                assert!(!ectx.arena.tb(children[i]).cbf[Y_C]);
            }
            assert!(ectx.arena.tb(children[3]).cbf[Y_C]);
        }
        assert_eq!(ectx.arena.count_tb_subtree(best), ectx.arena.live_tbs());
        assert_eq!(ectx.arena.cb(cb).transform_tree(), Some(best));
    }

    #[test]
    fn oversized_root_is_forced_to_split() {
        let cfg = EncoderConfig {
            log2_ctb_size: 5,
            log2_max_tb_size: 4,
            ..test_config(32, 32)
        };
        let mut ectx = EncoderContext::new(&cfg).unwrap();
        ectx.begin_picture(Picture::new(32, 32, 8)).unwrap();
        let cb = ectx.arena.alloc_cb(EncCb::new(0, 0, 5, 0));
        ectx.ctbs.set_ctb(&mut ectx.arena, 0, 0, cb);
        let tb = ectx.arena.alloc_tb(EncTb::new(0, 0, 5, cb));
        ectx.arena.attach_transform_tree(cb, tb);

        let params = TreeParams::new(&ectx.sps, true);
        let mut ctx = ContextModelTable::new();
        let best = TbSplitBruteForce::new().analyze(
            &mut ectx,
            &mut ctx,
            tb,
            &params,
            &mut Flat([0; N_C]),
        );

        let t = ectx.arena.tb(best);
        assert!(t.is_split());
        assert_eq!(t.distortion, 0.0);
        // cbf_cb and cbf_cr are still coded at depth 0
        assert!(t.rate > t.rate_without_cbf_chroma);
        assert!(!t.cbf[U_C] && !t.cbf[V_C]);

        // children carry no chroma flags below a parent without chroma residual
        let mut models = ContextModelTable::new();
        let mut cabac = CabacEstimator::new(&mut models, RateEstimation::Adaptive);
        eco::encode_transform_tree(&mut cabac, &ectx.arena, best, &params, [true, true]);
        assert!((cabac.rate() - t.rate).abs() < 1e-3);
    }
}
