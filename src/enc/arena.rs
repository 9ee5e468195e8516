use super::cb::*;
use super::tb::*;
use crate::com::pool::*;

pub type CbIdx = Idx<EncCb>;
pub type TbIdx = Idx<EncTb>;

/// The storage location that refers to a coding block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CbSlot {
    /// Root of the CTB at the given CTB coordinates.
    Root { ctb_x: u16, ctb_y: u16 },
    /// Quadrant `idx` of a split coding block.
    Child { parent: CbIdx, idx: u8 },
    /// Not linked into any tree (yet).
    Detached,
}

/// The storage location that refers to a transform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TbSlot {
    /// Root of the transform tree of a coding block leaf.
    CbRoot(CbIdx),
    /// Quadrant `idx` of a split transform block.
    Child { parent: TbIdx, idx: u8 },
    Detached,
}

/// Node storage for all coding trees of a picture. Every node is created,
/// looked up and released through this object.
#[derive(Default)]
pub struct NodeArena {
    cbs: Pool<EncCb>,
    tbs: Pool<EncTb>,
}

impl NodeArena {
    pub fn new() -> Self {
        NodeArena::default()
    }

    #[inline]
    pub fn cb(&self, idx: CbIdx) -> &EncCb {
        self.cbs.get(idx)
    }

    #[inline]
    pub fn cb_mut(&mut self, idx: CbIdx) -> &mut EncCb {
        self.cbs.get_mut(idx)
    }

    #[inline]
    pub fn tb(&self, idx: TbIdx) -> &EncTb {
        self.tbs.get(idx)
    }

    #[inline]
    pub fn tb_mut(&mut self, idx: TbIdx) -> &mut EncTb {
        self.tbs.get_mut(idx)
    }

    pub fn alloc_cb(&mut self, cb: EncCb) -> CbIdx {
        self.cbs.alloc(cb)
    }

    pub fn alloc_tb(&mut self, tb: EncTb) -> TbIdx {
        self.tbs.alloc(tb)
    }

    pub fn contains_cb(&self, idx: CbIdx) -> bool {
        self.cbs.contains(idx)
    }

    pub fn contains_tb(&self, idx: TbIdx) -> bool {
        self.tbs.contains(idx)
    }

    pub fn live_cbs(&self) -> usize {
        self.cbs.live()
    }

    pub fn live_tbs(&self) -> usize {
        self.tbs.live()
    }

    /// Releases a coding block together with its children and transform tree.
    pub fn free_cb(&mut self, idx: CbIdx) {
        let cb = self.cbs.release(idx);
        match cb.content {
            CbContent::Split(children) => {
                for child in children.iter().flatten() {
                    self.free_cb(*child);
                }
            }
            CbContent::Leaf(leaf) => {
                if let Some(tb) = leaf.transform_tree {
                    self.free_tb(tb);
                }
            }
        }
    }

    /// Releases a transform block, its children and all pixel buffers it owns.
    pub fn free_tb(&mut self, idx: TbIdx) {
        let tb = self.tbs.release(idx);
        if let TbContent::Split(children) = tb.content {
            for child in children.iter() {
                self.free_tb(*child);
            }
        }
    }

    /// Number of `(coding, transform)` blocks in the subtree rooted at `idx`.
    pub fn count_cb_subtree(&self, idx: CbIdx) -> (usize, usize) {
        match &self.cb(idx).content {
            CbContent::Split(children) => children
                .iter()
                .flatten()
                .map(|c| self.count_cb_subtree(*c))
                .fold((1, 0), |acc, n| (acc.0 + n.0, acc.1 + n.1)),
            CbContent::Leaf(leaf) => (
                1,
                leaf.transform_tree.map_or(0, |tb| self.count_tb_subtree(tb)),
            ),
        }
    }

    pub fn count_tb_subtree(&self, idx: TbIdx) -> usize {
        match &self.tb(idx).content {
            TbContent::Split(children) => {
                1 + children
                    .iter()
                    .map(|c| self.count_tb_subtree(*c))
                    .sum::<usize>()
            }
            TbContent::Leaf(_) => 1,
        }
    }

    /// Links `child` as quadrant `idx` of the split block `parent`.
    pub fn attach_cb_child(&mut self, parent: CbIdx, idx: usize, child: CbIdx) {
        match &mut self.cb_mut(parent).content {
            CbContent::Split(children) => children[idx] = Some(child),
            CbContent::Leaf(_) => panic!("attaching a child to unsplit coding block {:?}", parent),
        }
        let c = self.cb_mut(child);
        c.parent = Some(parent);
        c.slot = CbSlot::Child {
            parent,
            idx: idx as u8,
        };
    }

    pub fn attach_tb_child(&mut self, parent: TbIdx, idx: usize, child: TbIdx) {
        match &mut self.tb_mut(parent).content {
            TbContent::Split(children) => children[idx] = child,
            TbContent::Leaf(_) => {
                panic!("attaching a child to unsplit transform block {:?}", parent)
            }
        }
        let c = self.tb_mut(child);
        c.parent = Some(parent);
        c.slot = TbSlot::Child {
            parent,
            idx: idx as u8,
        };
    }

    /// Installs `tb` as the transform tree of the coding block leaf `cb`.
    pub fn attach_transform_tree(&mut self, cb: CbIdx, tb: TbIdx) {
        match &mut self.cb_mut(cb).content {
            CbContent::Leaf(leaf) => leaf.transform_tree = Some(tb),
            CbContent::Split(_) => panic!("split coding block {:?} has no transform tree", cb),
        }
        let t = self.tb_mut(tb);
        t.parent = None;
        t.cb = cb;
        t.slot = TbSlot::CbRoot(cb);
    }

    /// Writes `tb` into the storage location `slot`. The previous occupant is not released.
    pub fn write_tb_slot(&mut self, slot: TbSlot, tb: TbIdx) {
        match slot {
            TbSlot::CbRoot(cb) => self.attach_transform_tree(cb, tb),
            TbSlot::Child { parent, idx } => self.attach_tb_child(parent, idx as usize, tb),
            TbSlot::Detached => self.tb_mut(tb).slot = TbSlot::Detached,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::com::N_C;

    #[test]
    fn freeing_a_coding_block_releases_its_transform_tree() {
        let mut arena = NodeArena::new();
        let cb = arena.alloc_cb(EncCb::new(0, 0, 4, 0));
        let tb = arena.alloc_tb(EncTb::new(0, 0, 4, cb));
        arena.attach_transform_tree(cb, tb);
        arena.split_tb(tb);

        assert_eq!(arena.count_cb_subtree(cb), (1, 5));
        assert_eq!(arena.live_tbs(), 5);
        arena.free_cb(cb);
        assert_eq!(arena.live_cbs(), 0);
        assert_eq!(arena.live_tbs(), 0);
    }

    #[test]
    fn split_children_point_back_at_their_slot() {
        let mut arena = NodeArena::new();
        let cb = arena.alloc_cb(EncCb::new(16, 16, 4, 1));
        let tb = arena.alloc_tb(EncTb::new(16, 16, 4, cb));
        arena.attach_transform_tree(cb, tb);
        let children = arena.split_tb(tb);
        for (i, c) in children.iter().enumerate() {
            let child = arena.tb(*c);
            assert_eq!(child.parent, Some(tb));
            assert_eq!(child.slot, TbSlot::Child { parent: tb, idx: i as u8 });
            assert_eq!(child.trafo_depth, 1);
            assert_eq!(child.blk_idx as usize, i);
            assert_eq!(child.cbf, [false; N_C]);
        }
        assert_eq!(arena.tb(tb).slot, TbSlot::CbRoot(cb));
    }
}
