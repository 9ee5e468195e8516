use super::*;
use crate::com::tracer::TRACE_CU;
use crate::enc::options::CodingOptions;
use crate::enc::sbac::RateEstimation;

/// Tries every coding block both unsplit and split into four, recursively. Leaves
/// are handed to `child`.
pub struct CbSplitBruteForce<A> {
    child: A,
}

impl<A: AlgoCb> CbSplitBruteForce<A> {
    pub fn new(child: A) -> Self {
        CbSplitBruteForce { child }
    }

    fn split_flag_rate(
        ectx: &EncoderContext,
        trial: &mut Trial<CbIdx>,
        split: bool,
        coded: bool,
    ) -> f32 {
        if !coded {
            return 0.0;
        }
        let c = ectx.arena.cb(trial.node);
        let ctx_inc =
            eco::split_cu_flag_ctx(&ectx.arena, &ectx.ctbs, c.geom.x, c.geom.y, c.ct_depth);
        let mut cabac = trial.cabac();
        eco::encode_split_cu_flag(&mut cabac, split, ctx_inc);
        cabac.rate()
    }
}

impl<A: AlgoCb> AlgoCb for CbSplitBruteForce<A> {
    fn analyze(
        &mut self,
        ectx: &mut EncoderContext,
        ctx_model: &mut ContextModelTable,
        cb: CbIdx,
    ) -> CbIdx {
        let geom = ectx.arena.cb(cb).geom;
        let (width, height) = (
            ectx.sps.pic_width_in_luma_samples,
            ectx.sps.pic_height_in_luma_samples,
        );
        let can_be_leaf = geom.inside(width, height);
        let can_split = geom.log2_size > ectx.sps.log2_min_cb_size;
        // split_cu_flag is inferred unless both are possible
        let flag_coded = can_be_leaf && can_split;

        let mut options = CodingOptions::new(&ectx.arena, cb);
        let o_leaf = options.new_option(&mut ectx.arena, can_be_leaf);
        let o_split = options.new_option(&mut ectx.arena, can_split);
        options.start(ctx_model, RateEstimation::Adaptive);

        if o_leaf.is_active() {
            let mut trial = options.begin(&mut ectx.arena, &mut ectx.ctbs, o_leaf);
            let flag_rate = Self::split_flag_rate(ectx, &mut trial, false, flag_coded);

            let node = trial.node;
            trial.node = self.child.analyze(ectx, &mut trial.context, node);
            ectx.arena.cb_mut(trial.node).rate += flag_rate;
            options.end(trial);
        }

        if o_split.is_active() {
            let mut trial = options.begin(&mut ectx.arena, &mut ectx.ctbs, o_split);
            let flag_rate = Self::split_flag_rate(ectx, &mut trial, true, flag_coded);

            let node = trial.node;
            let children = ectx.arena.split_cb(node, width, height);
            let (mut distortion, mut rate) = (0.0, flag_rate);
            for child in children.iter().flatten() {
                let best = self.analyze(ectx, &mut trial.context, *child);
                let c = ectx.arena.cb(best);
                distortion += c.distortion;
                rate += c.rate;
            }

            let c = ectx.arena.cb_mut(node);
            c.distortion = distortion;
            c.rate = rate;
            options.end(trial);
        }

        options.compute_rdo_costs(&ectx.arena, ectx.lambda as f32);
        let cost = [o_leaf, o_split]
            .iter()
            .filter_map(|&o| options.rd_cost(o))
            .fold(f32::INFINITY, f32::min);
        let best = options.return_best_rdo(&mut ectx.arena, &mut ectx.ctbs, ctx_model);

        // the split trial overwrites the modes of the unsplit one
        ectx.arena.publish_pred_modes(best, &mut ectx.img);

        let split = ectx.arena.cb(best).is_split();
        TRACE_CU(
            &mut ectx.tracer,
            geom.x,
            geom.y,
            geom.log2_size,
            split,
            ectx.arena.cb(best).pred_mode(),
            cost as f64,
        );
        best
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::EncoderConfig;
    use crate::enc::cb::EncCb;
    use crate::enc::test::*;
    use pretty_assertions::assert_eq;

    /// Scores a leaf by its size only.
    struct BySize {
        cost: fn(u8) -> f32,
        calls: Vec<(u16, u16, u8)>,
    }

    impl BySize {
        fn new(cost: fn(u8) -> f32) -> Self {
            BySize { cost, calls: vec![] }
        }
    }

    impl AlgoCb for BySize {
        fn analyze(
            &mut self,
            ectx: &mut EncoderContext,
            _ctx_model: &mut ContextModelTable,
            cb: CbIdx,
        ) -> CbIdx {
            let c = ectx.arena.cb_mut(cb);
            c.distortion = (self.cost)(c.geom.log2_size);
            c.rate = 0.0;
            self.calls.push((c.geom.x, c.geom.y, c.geom.log2_size));
            cb
        }
    }

    fn setup(cfg: &EncoderConfig, ctb_x: usize) -> (EncoderContext, CbIdx) {
        let mut ectx = EncoderContext::new(cfg).unwrap();
        ectx.begin_picture(noise_picture(cfg.width, cfg.height, 9))
            .unwrap();
        let log2 = ectx.sps.log2_ctb_size;
        let cb = ectx
            .arena
            .alloc_cb(EncCb::new((ctb_x << log2) as u16, 0, log2, 0));
        ectx.ctbs.set_ctb(&mut ectx.arena, ctb_x, 0, cb);
        (ectx, cb)
    }

    #[test]
    fn every_size_is_tried() {
        let (mut ectx, cb) = setup(&test_config(16, 16), 0);
        ectx.lambda = 0.0;
        let mut algo = CbSplitBruteForce::new(BySize::new(|_| 1.0));
        let best = algo.analyze(&mut ectx, &mut ContextModelTable::new(), cb);

        assert_eq!(
            algo.child.calls,
            vec![(0, 0, 4), (0, 0, 3), (8, 0, 3), (0, 8, 3), (8, 8, 3)]
        );
        assert!(!ectx.arena.cb(best).is_split());
        assert_eq!(ectx.arena.live_cbs(), 1);
    }

    #[test]
    fn expensive_large_leaf_gets_split() {
        let (mut ectx, cb) = setup(&test_config(16, 16), 0);
        let mut algo =
            CbSplitBruteForce::new(BySize::new(|log2| if log2 == 4 { 1e6 } else { 1.0 }));
        let best = algo.analyze(&mut ectx, &mut ContextModelTable::new(), cb);

        let c = ectx.arena.cb(best);
        assert!(c.is_split());
        assert_eq!(c.distortion, 4.0);
        assert!(c.rate > 0.0);
        assert_eq!(ectx.ctbs.get_ctb(0, 0), Some(best));
        assert_eq!(ectx.arena.live_cbs(), 5);
    }

    #[test]
    fn minimum_size_is_never_split() {
        let cfg = EncoderConfig {
            log2_min_cb_size: 4,
            ..test_config(16, 16)
        };
        let (mut ectx, cb) = setup(&cfg, 0);
        let mut algo = CbSplitBruteForce::new(BySize::new(|_| 1e6));
        let best = algo.analyze(&mut ectx, &mut ContextModelTable::new(), cb);

        assert_eq!(best, cb);
        assert_eq!(algo.child.calls, vec![(0, 0, 4)]);
        // nothing coded for an inferred flag
        assert_eq!(ectx.arena.cb(best).rate, 0.0);
    }

    #[test]
    fn block_crossing_the_picture_edge_is_split() {
        let (mut ectx, cb) = setup(&test_config(24, 16), 1);
        let mut algo = CbSplitBruteForce::new(BySize::new(|_| 0.0));
        let best = algo.analyze(&mut ectx, &mut ContextModelTable::new(), cb);

        let c = ectx.arena.cb(best);
        let children = *c.children().unwrap();
        assert!(children[0].is_some() && children[2].is_some());
        assert!(children[1].is_none() && children[3].is_none());
        assert_eq!(algo.child.calls, vec![(16, 0, 3), (16, 8, 3)]);
    }

    #[test]
    fn full_search_leaves_only_the_decided_tree() {
        let (mut ectx, cb) = setup(&test_config(16, 16), 0);
        let best = crate::enc::default_algo().analyze(&mut ectx, &mut ContextModelTable::new(), cb);

        let (cbs, tbs) = ectx.arena.count_cb_subtree(best);
        assert_eq!(cbs, ectx.arena.live_cbs());
        assert_eq!(tbs, ectx.arena.live_tbs());
        assert!(ectx.arena.cb(best).distortion >= 0.0);
    }
}
