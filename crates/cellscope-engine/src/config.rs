//! Engine tunables.

/// Policy knobs for tree building and auxiliary reads. The defaults match the
/// documented behaviour; everything here is clamped-sane rather than
/// validated.
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Hard ceiling on node depth; nodes at this depth are never expandable.
    pub max_depth: u32,
    /// Ranges covering more cells than this collapse into one summary node.
    pub range_enumeration_cap: u64,
    /// Most entries a `row_values` listing returns.
    pub row_values_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_depth: 32,
            range_enumeration_cap: 50,
            row_values_cap: 50,
        }
    }
}
