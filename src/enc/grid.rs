use std::rc::Rc;

use super::arena::*;
use super::cb::*;
use super::eco;
use super::sbac::EntropyEncoder;
use crate::com::picture::Picture;
use crate::com::ps::*;
use crate::com::*;

/// The coding trees of one picture, one root coding block per CTB.
#[derive(Default)]
pub struct CtbGrid {
    pps: Option<Rc<Pps>>,

    ctbs: Vec<Option<CbIdx>>,
    slice_index: Vec<u16>,
    slice_headers: Vec<Rc<SliceHeader>>,
    width_ctbs: usize,
    height_ctbs: usize,
    log2_ctb_size: u8,

    /* only read for PCM passthrough, never copied */
    input_image: Option<Rc<Picture>>,
}

impl CtbGrid {
    pub fn new() -> Self {
        CtbGrid::default()
    }

    /// Sizes the grid for a `width` x `height` picture. Previously held trees are released.
    pub fn alloc(&mut self, arena: &mut NodeArena, width: usize, height: usize, log2_ctb_size: u8) {
        self.free(arena);

        self.log2_ctb_size = log2_ctb_size;
        self.width_ctbs = (width + (1 << log2_ctb_size) - 1) >> log2_ctb_size;
        self.height_ctbs = (height + (1 << log2_ctb_size) - 1) >> log2_ctb_size;

        let n = self.width_ctbs * self.height_ctbs;
        self.ctbs = vec![None; n];
        self.slice_index = vec![0; n];
    }

    pub fn clear(&mut self, arena: &mut NodeArena) {
        self.free(arena);
    }

    pub fn set_pps(&mut self, pps: Rc<Pps>) {
        self.pps = Some(pps);
    }

    pub fn pps(&self) -> Option<&Rc<Pps>> {
        self.pps.as_ref()
    }

    pub fn sps(&self) -> Option<&Rc<Sps>> {
        self.pps.as_ref().map(|pps| &pps.sps)
    }

    pub fn set_input_image(&mut self, img: Rc<Picture>) {
        self.input_image = Some(img);
    }

    pub fn get_input_image(&self) -> Option<&Rc<Picture>> {
        self.input_image.as_ref()
    }

    pub fn add_slice_header(&mut self, shdr: Rc<SliceHeader>) -> u16 {
        self.slice_headers.push(shdr);
        (self.slice_headers.len() - 1) as u16
    }

    pub fn set_slice_header_id(&mut self, ctb_x: usize, ctb_y: usize, slice_id: u16) {
        let idx = self.ctb_addr(ctb_x, ctb_y);
        self.slice_index[idx] = slice_id;
    }

    /// Slice header of the CTB holding luma position `(x, y)`.
    pub fn get_slice_header(&self, x: u16, y: u16) -> &Rc<SliceHeader> {
        let idx = self.ctb_addr(
            (x >> self.log2_ctb_size) as usize,
            (y >> self.log2_ctb_size) as usize,
        );
        let slice_id = self.slice_index[idx] as usize;
        assert!(slice_id < self.slice_headers.len(), "no slice header for CTB {}", idx);
        &self.slice_headers[slice_id]
    }

    /// Installs `cb` as the tree of CTB `(ctb_x, ctb_y)`, releasing the previous one.
    pub fn set_ctb(&mut self, arena: &mut NodeArena, ctb_x: usize, ctb_y: usize, cb: CbIdx) {
        let idx = self.ctb_addr(ctb_x, ctb_y);
        if let Some(prev) = self.ctbs[idx] {
            if prev != cb {
                arena.free_cb(prev);
            }
        }
        self.install_root(arena, ctb_x, ctb_y, cb);
    }

    pub fn get_ctb(&self, ctb_x: usize, ctb_y: usize) -> Option<CbIdx> {
        self.ctbs[self.ctb_addr(ctb_x, ctb_y)]
    }

    /// Slot of the CTB root covering luma position `(x, y)`.
    pub fn ctb_root_slot(&self, x: u16, y: u16) -> CbSlot {
        CbSlot::Root {
            ctb_x: x >> self.log2_ctb_size,
            ctb_y: y >> self.log2_ctb_size,
        }
    }

    /// Writes `cb` into the storage location `slot`. The previous occupant is not released.
    pub fn write_cb_slot(&mut self, arena: &mut NodeArena, slot: CbSlot, cb: CbIdx) {
        match slot {
            CbSlot::Root { ctb_x, ctb_y } => {
                self.install_root(arena, ctb_x as usize, ctb_y as usize, cb)
            }
            CbSlot::Child { parent, idx } => arena.attach_cb_child(parent, idx as usize, cb),
            CbSlot::Detached => arena.cb_mut(cb).slot = CbSlot::Detached,
        }
    }

    fn install_root(&mut self, arena: &mut NodeArena, ctb_x: usize, ctb_y: usize, cb: CbIdx) {
        let idx = self.ctb_addr(ctb_x, ctb_y);
        self.ctbs[idx] = Some(cb);
        let c = arena.cb_mut(cb);
        c.parent = None;
        c.slot = CbSlot::Root {
            ctb_x: ctb_x as u16,
            ctb_y: ctb_y as u16,
        };
    }

    #[inline]
    fn ctb_addr(&self, ctb_x: usize, ctb_y: usize) -> usize {
        assert!(
            ctb_x < self.width_ctbs && ctb_y < self.height_ctbs,
            "CTB ({}, {}) outside of the {}x{} grid",
            ctb_x,
            ctb_y,
            self.width_ctbs,
            self.height_ctbs
        );
        ctb_x + ctb_y * self.width_ctbs
    }

    pub fn log2_ctb_size(&self) -> u8 {
        self.log2_ctb_size
    }

    pub fn width_ctbs(&self) -> usize {
        self.width_ctbs
    }

    pub fn height_ctbs(&self) -> usize {
        self.height_ctbs
    }

    fn ctb_at(&self, x: u16, y: u16) -> Option<CbIdx> {
        self.get_ctb(
            (x >> self.log2_ctb_size) as usize,
            (y >> self.log2_ctb_size) as usize,
        )
    }

    /// Leaf coding block covering luma position `(x, y)`.
    pub fn get_cb(&self, arena: &NodeArena, x: u16, y: u16) -> Option<CbIdx> {
        self.ctb_at(x, y).and_then(|ctb| arena.get_cb(ctb, x, y))
    }

    pub fn get_tb(&self, arena: &NodeArena, x: u16, y: u16) -> Option<TbIdx> {
        self.ctb_at(x, y).and_then(|ctb| arena.cb_get_tb(ctb, x, y))
    }

    pub fn get_pb<'a>(&self, arena: &'a NodeArena, x: u16, y: u16) -> Option<&'a PbInter> {
        self.ctb_at(x, y).and_then(|ctb| arena.cb_get_pb(ctb, x, y))
    }

    /// Whether the block at `(x_n, y_n)` may be referenced from the block at `(x_c, y_c)`:
    /// it lies inside the picture, its CTB has a tree, belongs to the same slice and does
    /// not follow the current CTB in raster order.
    pub fn check_ctb_available(&self, x_c: i32, y_c: i32, x_n: i32, y_n: i32) -> bool {
        let (width, height) = match self.sps() {
            Some(sps) => (
                sps.pic_width_in_luma_samples as i32,
                sps.pic_height_in_luma_samples as i32,
            ),
            None => (
                (self.width_ctbs << self.log2_ctb_size) as i32,
                (self.height_ctbs << self.log2_ctb_size) as i32,
            ),
        };
        if x_n < 0 || y_n < 0 || x_n >= width || y_n >= height {
            return false;
        }

        let log2 = self.log2_ctb_size;
        let addr_c = self.ctb_addr((x_c >> log2) as usize, (y_c >> log2) as usize);
        let addr_n = self.ctb_addr((x_n >> log2) as usize, (y_n >> log2) as usize);

        self.ctbs[addr_n].is_some()
            && self.slice_index[addr_n] == self.slice_index[addr_c]
            && addr_n <= addr_c
    }

    pub fn write_reconstruction_to_image(&self, arena: &mut NodeArena, img: &mut Picture) {
        for ctb in self.ctbs.iter().flatten() {
            arena.write_cb_reconstruction_to_image(*ctb, img);
        }
    }

    /// Serializes the decided tree of CTB `(ctb_x, ctb_y)`.
    pub fn encode_ctb<E: EntropyEncoder + ?Sized>(
        &self,
        arena: &NodeArena,
        enc: &mut E,
        ctb_x: usize,
        ctb_y: usize,
    ) {
        eco::encode_ctb(enc, arena, self, ctb_x, ctb_y);
    }

    /// Rows of the input picture that a PCM coded `cb` passes through for component `c_idx`.
    pub fn pcm_samples(&self, arena: &NodeArena, cb: CbIdx, c_idx: usize) -> Option<Vec<&[pel]>> {
        let src = match arena.cb(cb).leaf().map(|leaf| &leaf.pred) {
            Some(CbPred::Intra(IntraData { pcm_data: Some(src) })) => *src,
            _ => return None,
        };
        let img = self.input_image.as_ref()?;
        let plane = &img.planes[c_idx];

        let (x, y, size) = if c_idx == Y_C {
            (src.x as usize, src.y as usize, 1usize << src.log2_size)
        } else {
            (src.x as usize >> 1, src.y as usize >> 1, 1usize << (src.log2_size - 1))
        };
        Some(
            (y..y + size)
                .map(|row| &plane.row(row)[x..x + size])
                .collect(),
        )
    }

    /// Releases every tree and forgets the slice headers and parameter set.
    pub fn free(&mut self, arena: &mut NodeArena) {
        for slot in self.ctbs.iter_mut() {
            if let Some(cb) = slot.take() {
                arena.free_cb(cb);
            }
        }
        self.slice_headers.clear();
        self.pps = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::*;
    use crate::enc::tb::EncTb;
    use pretty_assertions::assert_eq;

    fn grid(arena: &mut NodeArena, w: usize, h: usize) -> CtbGrid {
        let cfg = EncoderConfig {
            width: w,
            height: h,
            log2_ctb_size: 4,
            ..Default::default()
        };
        let sps = Rc::new(Sps::from_config(&cfg));
        let mut grid = CtbGrid::new();
        grid.alloc(arena, w, h, 4);
        grid.set_pps(Rc::new(Pps::new(sps, &cfg)));
        grid.add_slice_header(Rc::new(SliceHeader::new(SliceType::I, 27)));
        grid
    }

    #[test]
    fn replacing_a_ctb_releases_the_previous_tree() {
        let mut arena = NodeArena::new();
        let mut grid = grid(&mut arena, 32, 16);

        let first = arena.alloc_cb(EncCb::new(16, 0, 4, 0));
        arena.split_cb(first, 32, 16);
        grid.set_ctb(&mut arena, 1, 0, first);
        assert_eq!(arena.live_cbs(), 5);
        assert_eq!(arena.cb(first).slot, CbSlot::Root { ctb_x: 1, ctb_y: 0 });

        let second = arena.alloc_cb(EncCb::new(16, 0, 4, 0));
        grid.set_ctb(&mut arena, 1, 0, second);
        assert_eq!(arena.live_cbs(), 1);
        assert_eq!(grid.get_ctb(1, 0), Some(second));

        // re-installing the same tree keeps it
        grid.set_ctb(&mut arena, 1, 0, second);
        assert!(arena.contains_cb(second));

        grid.free(&mut arena);
        assert_eq!(arena.live_cbs(), 0);
        assert_eq!(grid.get_ctb(1, 0), None);
    }

    #[test]
    fn slice_headers_are_looked_up_per_ctb() {
        let mut arena = NodeArena::new();
        let mut grid = grid(&mut arena, 32, 32);
        let p = grid.add_slice_header(Rc::new(SliceHeader::new(SliceType::P, 30)));
        assert_eq!(p, 1);
        grid.set_slice_header_id(1, 1, p);

        assert_eq!(grid.get_slice_header(5, 5).slice_type, SliceType::I);
        assert_eq!(grid.get_slice_header(20, 17).slice_type, SliceType::P);
        assert_eq!(grid.get_slice_header(20, 17).slice_qp, 30);
    }

    #[test]
    fn availability_follows_raster_order_and_slices() {
        let mut arena = NodeArena::new();
        let mut grid = grid(&mut arena, 48, 32);
        for &(cx, cy) in &[(0, 0), (1, 0), (2, 0), (0, 1)] {
            let cb = arena.alloc_cb(EncCb::new(cx * 16, cy * 16, 4, 0));
            grid.set_ctb(&mut arena, cx as usize, cy as usize, cb);
        }

        // left and above of CTB (1,1)
        assert!(grid.check_ctb_available(16, 16, 15, 16));
        assert!(grid.check_ctb_available(16, 16, 16, 15));
        // outside of the picture
        assert!(!grid.check_ctb_available(16, 16, -1, 16));
        assert!(!grid.check_ctb_available(16, 16, 48, 0));
        // the CTB to the right has no tree yet
        assert!(!grid.check_ctb_available(0, 16, 16, 16));
        // following in raster order even though decided
        assert!(!grid.check_ctb_available(0, 0, 16, 0));

        let s = grid.add_slice_header(Rc::new(SliceHeader::new(SliceType::I, 27)));
        grid.set_slice_header_id(0, 1, s);
        assert!(!grid.check_ctb_available(0, 16, 0, 15));
    }

    #[test]
    fn lookups_outside_the_picture_find_nothing() {
        let mut arena = NodeArena::new();
        let mut grid = grid(&mut arena, 24, 16);
        let root = arena.alloc_cb(EncCb::new(16, 0, 4, 0));
        let children = arena.split_cb(root, 24, 16);
        grid.set_ctb(&mut arena, 1, 0, root);

        assert_eq!(grid.get_cb(&arena, 20, 12), children[2]);
        assert_eq!(grid.get_cb(&arena, 28, 4), None);
        assert_eq!(grid.get_tb(&arena, 30, 12), None);
        assert!(grid.get_pb(&arena, 26, 2).is_none());
    }

    #[test]
    fn lookups_descend_from_the_ctb_root() {
        let mut arena = NodeArena::new();
        let mut grid = grid(&mut arena, 32, 16);
        let root = arena.alloc_cb(EncCb::new(16, 0, 4, 0));
        let children = arena.split_cb(root, 32, 16);
        let leaf = children[3].unwrap();
        let tb = arena.alloc_tb(EncTb::new(24, 8, 3, leaf));
        arena.attach_transform_tree(leaf, tb);
        grid.set_ctb(&mut arena, 1, 0, root);

        assert_eq!(grid.get_cb(&arena, 30, 9), Some(leaf));
        assert_eq!(grid.get_tb(&arena, 30, 9), Some(tb));
        assert_eq!(grid.get_tb(&arena, 17, 1), None);
        assert_eq!(grid.get_cb(&arena, 3, 3), None);
        assert!(grid.get_pb(&arena, 30, 9).is_none());
        assert_eq!(grid.ctb_root_slot(30, 9), CbSlot::Root { ctb_x: 1, ctb_y: 0 });
    }

    #[test]
    fn pcm_samples_reference_the_input_picture() {
        let mut arena = NodeArena::new();
        let mut grid = grid(&mut arena, 16, 16);
        let mut input = Picture::new(16, 16, 8);
        input.planes[Y_C].set(9, 8, 77);
        input.planes[U_C].set(4, 4, 33);
        grid.set_input_image(Rc::new(input));

        let cb = arena.alloc_cb(EncCb::new(8, 8, 3, 1));
        assert!(grid.pcm_samples(&arena, cb, Y_C).is_none());
        {
            let leaf = arena.cb_mut(cb).leaf_mut().unwrap();
            leaf.pcm_flag = true;
            leaf.pred = CbPred::Intra(IntraData {
                pcm_data: Some(PcmSource { x: 8, y: 8, log2_size: 3 }),
            });
        }
        let luma = grid.pcm_samples(&arena, cb, Y_C).unwrap();
        assert_eq!(luma.len(), 8);
        assert_eq!(luma[0][1], 77);
        let cb_rows = grid.pcm_samples(&arena, cb, U_C).unwrap();
        assert_eq!(cb_rows.len(), 4);
        assert_eq!(cb_rows[0][0], 33);
    }
}
