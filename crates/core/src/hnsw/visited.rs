//! Per-layer visited marks for beam search.
//!
//! A layer is an arena addressed by position, so the marks are a flat array
//! the size of the layer. Starting a new search bumps an epoch instead of
//! clearing the array; a position counts as visited only if it carries the
//! current epoch.

/// Epoch-stamped visited marks for one layer traversal at a time.
#[derive(Debug, Default)]
pub struct VisitedSet {
    marks: Vec<u32>,
    epoch: u32,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a traversal of a layer with `layer_len` nodes. Every position is
    /// unvisited afterwards.
    pub fn begin(&mut self, layer_len: usize) {
        if self.marks.len() < layer_len {
            self.marks.resize(layer_len, 0);
        }
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            self.marks.fill(0);
            self.epoch = 1;
        }
    }

    /// Mark `pos` visited. Returns `true` the first time within a traversal.
    ///
    /// `pos` must be below the `layer_len` passed to [`begin`](Self::begin).
    #[inline]
    pub fn visit(&mut self, pos: usize) -> bool {
        let mark = &mut self.marks[pos];
        if *mark == self.epoch {
            false
        } else {
            *mark = self.epoch;
            true
        }
    }

    pub fn contains(&self, pos: usize) -> bool {
        self.marks.get(pos).is_some_and(|&m| m == self.epoch)
    }
}
