use bitflags::bitflags;

bitflags! {
    /// Work a node owes before it can be shown again.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DirtyFlags: u8 {
        const MEASURE = 1 << 0;
        const LAYOUT = 1 << 1;
        const PAINT = 1 << 2;
        /// Cached transform matrix is stale. Local to the node, never propagated.
        const RECALC = 1 << 3;
    }
}

impl DirtyFlags {
    /// Bits that travel up to the parent when they change.
    pub fn propagating(self) -> Self {
        self - Self::RECALC
    }
}
