use std::fmt;

use super::arena::*;
use super::grid::CtbGrid;
use super::sbac::*;
use crate::com::context::ContextModelTable;

/// A tree node kind that can compete at a decision point.
pub trait OptionNode: Copy + PartialEq + fmt::Debug {
    type Slot: Copy + fmt::Debug;

    fn slot(self, arena: &NodeArena) -> Self::Slot;

    /// A detached node at the same position carrying the leaf fields of `self`.
    fn clone_template(self, arena: &mut NodeArena) -> Self;

    fn write_slot(self, arena: &mut NodeArena, grid: &mut CtbGrid, slot: Self::Slot);

    fn rate(self, arena: &NodeArena) -> f32;
    fn distortion(self, arena: &NodeArena) -> f32;

    /// Releases the node with its whole subtree.
    fn release(self, arena: &mut NodeArena);
}

impl OptionNode for CbIdx {
    type Slot = CbSlot;

    fn slot(self, arena: &NodeArena) -> CbSlot {
        arena.cb(self).slot
    }

    fn clone_template(self, arena: &mut NodeArena) -> Self {
        let cb = arena.cb(self).clone_template();
        arena.alloc_cb(cb)
    }

    fn write_slot(self, arena: &mut NodeArena, grid: &mut CtbGrid, slot: CbSlot) {
        grid.write_cb_slot(arena, slot, self);
    }

    fn rate(self, arena: &NodeArena) -> f32 {
        arena.cb(self).rate
    }

    fn distortion(self, arena: &NodeArena) -> f32 {
        arena.cb(self).distortion
    }

    fn release(self, arena: &mut NodeArena) {
        arena.free_cb(self);
    }
}

impl OptionNode for TbIdx {
    type Slot = TbSlot;

    fn slot(self, arena: &NodeArena) -> TbSlot {
        arena.tb(self).slot
    }

    fn clone_template(self, arena: &mut NodeArena) -> Self {
        let tb = arena.tb(self).clone_template();
        arena.alloc_tb(tb)
    }

    fn write_slot(self, arena: &mut NodeArena, _grid: &mut CtbGrid, slot: TbSlot) {
        arena.write_tb_slot(slot, self);
    }

    fn rate(self, arena: &NodeArena) -> f32 {
        arena.tb(self).rate
    }

    fn distortion(self, arena: &NodeArena) -> f32 {
        arena.tb(self).distortion
    }

    fn release(self, arena: &mut NodeArena) {
        arena.free_tb(self);
    }
}

struct OptionEntry<N> {
    node: N,
    context: Option<ContextModelTable>,
    rd_cost: f32,
    computed: bool,
}

/// Handle of one registered alternative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodingOption {
    idx: Option<usize>,
}

impl CodingOption {
    /// Inactive options were never allocated and cannot be tried.
    pub fn is_active(&self) -> bool {
        self.idx.is_some()
    }
}

/// One alternative being tried, with its private copy of the context models.
pub struct Trial<N> {
    idx: usize,
    pub node: N,
    pub context: ContextModelTable,
    method: RateEstimation,
}

impl<N: Copy> Trial<N> {
    pub fn node(&self) -> N {
        self.node
    }

    /// Rate estimator working on this trial's context models.
    pub fn cabac(&mut self) -> CabacEstimator<'_> {
        CabacEstimator::new(&mut self.context, self.method)
    }
}

/// Mutually exclusive alternatives for one node of the coding tree.
///
/// Usage:
/// 1. register each alternative with [`CodingOptions::new_option`],
/// 2. [`CodingOptions::start`],
/// 3. for each active option: [`CodingOptions::begin`], build the candidate in
///    the trial, [`CodingOptions::end`],
/// 4. [`CodingOptions::compute_rdo_costs`] and [`CodingOptions::return_best_rdo`].
pub struct CodingOptions<N: OptionNode> {
    input: N,
    slot: N::Slot,
    options: Vec<OptionEntry<N>>,
    baseline: Option<ContextModelTable>,
    method: RateEstimation,
}

impl<N: OptionNode> CodingOptions<N> {
    pub fn new(arena: &NodeArena, input: N) -> Self {
        CodingOptions {
            input,
            slot: input.slot(arena),
            options: vec![],
            baseline: None,
            method: RateEstimation::default(),
        }
    }

    pub fn new_option(&mut self, arena: &mut NodeArena, active: bool) -> CodingOption {
        assert!(self.baseline.is_none(), "option registered after start()");
        if !active {
            return CodingOption { idx: None };
        }

        let node = if self.options.is_empty() {
            self.input
        } else {
            self.input.clone_template(arena)
        };
        self.options.push(OptionEntry {
            node,
            context: None,
            rd_cost: 0.0,
            computed: false,
        });
        CodingOption {
            idx: Some(self.options.len() - 1),
        }
    }

    /// Freezes the option list and snapshots the input context models.
    pub fn start(&mut self, ctx_model: &ContextModelTable, method: RateEstimation) {
        assert!(
            !self.options.is_empty(),
            "coding decision at {:?} without an active option",
            self.slot
        );
        self.baseline = Some(*ctx_model);
        self.method = method;
    }

    pub fn begin(
        &mut self,
        arena: &mut NodeArena,
        grid: &mut CtbGrid,
        opt: CodingOption,
    ) -> Trial<N> {
        let idx = match opt.idx {
            Some(idx) => idx,
            None => panic!("inactive coding option tried"),
        };
        let baseline = match &self.baseline {
            Some(ctx) => *ctx,
            None => panic!("coding option tried before start()"),
        };

        let node = self.options[idx].node;
        // lookups through the tree must see the candidate while it is built
        node.write_slot(arena, grid, self.slot);

        Trial {
            idx,
            node,
            context: baseline,
            method: self.method,
        }
    }

    pub fn end(&mut self, trial: Trial<N>) {
        let entry = &mut self.options[trial.idx];
        entry.node = trial.node;
        entry.context = Some(trial.context);
        entry.computed = true;
    }

    pub fn compute_rdo_costs(&mut self, arena: &NodeArena, lambda: f32) {
        for (i, opt) in self.options.iter_mut().enumerate() {
            if opt.computed {
                let (dist, rate) = (opt.node.distortion(arena), opt.node.rate(arena));
                opt.rd_cost = dist + lambda * rate;
                trace!(
                    "option {} at {:?}: D={} R={} cost={}",
                    i,
                    self.slot,
                    dist,
                    rate,
                    opt.rd_cost
                );
            }
        }
    }

    /// Index of the cheapest computed option; the earlier one wins ties.
    pub fn find_best_rdo_index(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, opt) in self.options.iter().enumerate() {
            if !opt.computed {
                continue;
            }
            match best {
                Some(b) if opt.rd_cost >= self.options[b].rd_cost => {}
                _ => best = Some(i),
            }
        }
        best
    }

    /// Cost of option `opt` after [`CodingOptions::compute_rdo_costs`].
    pub fn rd_cost(&self, opt: CodingOption) -> Option<f32> {
        opt.idx
            .map(|idx| &self.options[idx])
            .filter(|entry| entry.computed)
            .map(|entry| entry.rd_cost)
    }

    /// Installs the winner at the decision point, hands its context models to
    /// the caller and releases every other option.
    pub fn return_best_rdo(
        self,
        arena: &mut NodeArena,
        grid: &mut CtbGrid,
        ctx_model: &mut ContextModelTable,
    ) -> N {
        let best = match self.find_best_rdo_index() {
            Some(best) => best,
            None => panic!("no coding option evaluated at {:?}", self.slot),
        };

        let winner = self.options[best].node;
        winner.write_slot(arena, grid, self.slot);
        if let Some(ctx) = &self.options[best].context {
            *ctx_model = *ctx;
        }

        debug!(
            "{:?}: option {} of {} wins with cost {}",
            self.slot,
            best,
            self.options.len(),
            self.options[best].rd_cost
        );

        for (i, opt) in self.options.into_iter().enumerate() {
            if i != best {
                opt.node.release(arena);
            }
        }
        winner
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::com::context::Ctx;
    use crate::enc::cb::EncCb;
    use crate::enc::tb::EncTb;

    fn setup() -> (NodeArena, CtbGrid, CbIdx) {
        let mut arena = NodeArena::new();
        let mut grid = CtbGrid::new();
        grid.alloc(&mut arena, 64, 64, 6);
        let cb = arena.alloc_cb(EncCb::new(0, 0, 6, 0));
        grid.set_ctb(&mut arena, 0, 0, cb);
        (arena, grid, cb)
    }

    fn score(arena: &mut NodeArena, cb: CbIdx, rate: f32, distortion: f32) {
        let c = arena.cb_mut(cb);
        c.rate = rate;
        c.distortion = distortion;
    }

    /// Runs one trial per `(rate, distortion)` pair and returns the winning position.
    fn decide(candidates: &[(f32, f32)], lambda: f32) -> usize {
        let (mut arena, mut grid, cb) = setup();
        let mut ctx = ContextModelTable::new();
        let mut options = CodingOptions::new(&arena, cb);
        let opts: Vec<CodingOption> = candidates
            .iter()
            .map(|_| options.new_option(&mut arena, true))
            .collect();
        options.start(&ctx, RateEstimation::Constant);

        let mut nodes = vec![];
        for (opt, &(rate, dist)) in opts.iter().zip(candidates.iter()) {
            let trial = options.begin(&mut arena, &mut grid, *opt);
            score(&mut arena, trial.node, rate, dist);
            nodes.push(trial.node);
            options.end(trial);
        }
        options.compute_rdo_costs(&arena, lambda);
        let best = options.return_best_rdo(&mut arena, &mut grid, &mut ctx);
        assert_eq!(arena.live_cbs(), 1);
        assert_eq!(grid.get_ctb(0, 0), Some(best));
        nodes.iter().position(|n| *n == best).unwrap()
    }

    #[test]
    fn single_candidate_always_wins() {
        assert_eq!(decide(&[(1e6, 1e6)], 1.0), 0);
    }

    #[test]
    fn exact_tie_goes_to_first_registered() {
        assert_eq!(decide(&[(10.0, 5.0), (10.0, 5.0)], 1.0), 0);
        assert_eq!(decide(&[(7.0, 3.0), (2.0, 8.0), (5.0, 5.0)], 1.0), 0);
    }

    #[test]
    fn equal_rate_lower_distortion_wins() {
        assert_eq!(decide(&[(10.0, 50.0), (10.0, 49.0)], 3.0), 1);
    }

    #[test]
    fn equal_distortion_lower_rate_wins() {
        assert_eq!(decide(&[(11.0, 50.0), (10.0, 50.0)], 0.5), 1);
    }

    #[test]
    fn cost_weighs_rate_by_lambda() {
        // 100 + 1 * 10 = 110 against 10 + 1 * 40 = 50
        assert_eq!(decide(&[(10.0, 100.0), (40.0, 10.0)], 1.0), 1);
        // 100 + 0.1 * 10 = 101 against 10 + 0.1 * 40 = 14
        assert_eq!(decide(&[(10.0, 100.0), (40.0, 10.0)], 0.1), 1);
        // 100 + 10 * 10 = 200 against 10 + 10 * 40 = 410
        assert_eq!(decide(&[(10.0, 100.0), (40.0, 10.0)], 10.0), 0);
    }

    #[test]
    fn trials_start_from_identical_context() {
        let (mut arena, mut grid, cb) = setup();
        let mut ctx = ContextModelTable::new();
        let mut options = CodingOptions::new(&arena, cb);
        let a = options.new_option(&mut arena, true);
        let b = options.new_option(&mut arena, true);
        options.start(&ctx, RateEstimation::Adaptive);

        let mut trial = options.begin(&mut arena, &mut grid, a);
        {
            let mut cabac = trial.cabac();
            for _ in 0..16 {
                cabac.encode_bin(Ctx::PredModeFlag, true);
            }
        }
        let polluted = trial.context;
        assert_ne!(polluted, ctx);
        score(&mut arena, trial.node, 100.0, 100.0);
        options.end(trial);

        let trial = options.begin(&mut arena, &mut grid, b);
        assert_eq!(trial.context, ContextModelTable::new());
        score(&mut arena, trial.node, 1.0, 1.0);
        options.end(trial);

        options.compute_rdo_costs(&arena, 1.0);
        options.return_best_rdo(&mut arena, &mut grid, &mut ctx);
        // winner's models flow back to the caller
        assert_eq!(ctx, ContextModelTable::new());
    }

    #[test]
    fn winner_context_is_handed_back() {
        let (mut arena, mut grid, cb) = setup();
        let mut ctx = ContextModelTable::new();
        let mut options = CodingOptions::new(&arena, cb);
        let a = options.new_option(&mut arena, true);
        options.start(&ctx, RateEstimation::Adaptive);

        let mut trial = options.begin(&mut arena, &mut grid, a);
        trial.cabac().encode_bin(Ctx::RqtRootCbf, false);
        let expect = trial.context;
        options.end(trial);
        options.compute_rdo_costs(&arena, 1.0);
        options.return_best_rdo(&mut arena, &mut grid, &mut ctx);
        assert_eq!(ctx, expect);
    }

    #[test]
    fn losers_are_released_with_their_subtrees() {
        let (mut arena, mut grid, cb) = setup();
        let before = (arena.live_cbs(), arena.live_tbs());
        let mut ctx = ContextModelTable::new();
        let mut options = CodingOptions::new(&arena, cb);
        let leaf = options.new_option(&mut arena, true);
        let split = options.new_option(&mut arena, true);
        options.start(&ctx, RateEstimation::Constant);

        let trial = options.begin(&mut arena, &mut grid, leaf);
        let tb = arena.alloc_tb(EncTb::new(0, 0, 5, trial.node));
        arena.attach_transform_tree(trial.node, tb);
        arena.split_tb(tb);
        score(&mut arena, trial.node, 50.0, 50.0);
        options.end(trial);

        let trial = options.begin(&mut arena, &mut grid, split);
        let children = arena.split_cb(trial.node, 64, 64);
        assert_eq!(arena.cb(children[0].unwrap()).parent, Some(trial.node));
        score(&mut arena, trial.node, 10.0, 10.0);
        options.end(trial);

        options.compute_rdo_costs(&arena, 1.0);
        let best = options.return_best_rdo(&mut arena, &mut grid, &mut ctx);

        let winner_nodes = arena.count_cb_subtree(best);
        assert_eq!(winner_nodes, (5, 0));
        // the input node lost and went away with its transform tree
        assert_eq!(
            (arena.live_cbs(), arena.live_tbs()),
            (before.0 - 1 + winner_nodes.0, before.1 + winner_nodes.1)
        );
        assert!(!arena.contains_cb(cb));
        assert_eq!(arena.cb(best).slot, CbSlot::Root { ctb_x: 0, ctb_y: 0 });
    }

    #[test]
    fn inactive_options_are_not_allocated() {
        let (mut arena, mut grid, cb) = setup();
        let mut ctx = ContextModelTable::new();
        let mut options = CodingOptions::new(&arena, cb);
        let off = options.new_option(&mut arena, false);
        let on = options.new_option(&mut arena, true);
        assert!(!off.is_active());
        assert!(on.is_active());
        assert_eq!(arena.live_cbs(), 1);

        options.start(&ctx, RateEstimation::Constant);
        let trial = options.begin(&mut arena, &mut grid, on);
        // the first active option reuses the decision node
        assert_eq!(trial.node, cb);
        options.end(trial);
        options.compute_rdo_costs(&arena, 1.0);
        assert_eq!(options.rd_cost(off), None);
        assert_eq!(options.return_best_rdo(&mut arena, &mut grid, &mut ctx), cb);
    }

    #[test]
    fn transform_block_options_commit_into_the_coding_block() {
        let (mut arena, mut grid, cb) = setup();
        let tb = arena.alloc_tb(EncTb::new(0, 0, 5, cb));
        arena.attach_transform_tree(cb, tb);
        let mut ctx = ContextModelTable::new();

        let mut options = CodingOptions::new(&arena, tb);
        let keep = options.new_option(&mut arena, true);
        let split = options.new_option(&mut arena, true);
        options.start(&ctx, RateEstimation::Constant);

        let trial = options.begin(&mut arena, &mut grid, keep);
        arena.tb_mut(trial.node).distortion = 90.0;
        options.end(trial);

        let trial = options.begin(&mut arena, &mut grid, split);
        arena.split_tb(trial.node);
        arena.tb_mut(trial.node).distortion = 20.0;
        options.end(trial);

        options.compute_rdo_costs(&arena, 1.0);
        let best = options.return_best_rdo(&mut arena, &mut grid, &mut ctx);
        assert_ne!(best, tb);
        assert_eq!(arena.cb(cb).transform_tree(), Some(best));
        assert_eq!(arena.live_tbs(), 5);
    }

    #[test]
    #[should_panic(expected = "without an active option")]
    fn zero_active_options_is_a_contract_violation() {
        let (mut arena, _grid, cb) = setup();
        let mut options = CodingOptions::new(&arena, cb);
        options.new_option(&mut arena, false);
        options.start(&ContextModelTable::new(), RateEstimation::Constant);
    }
}
