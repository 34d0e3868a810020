// Helpers are shared across test binaries; not every binary uses every one.
#[allow(dead_code)]
pub mod git;
