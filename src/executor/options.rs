use crate::translation::{EmptyListPolicy, KeyMatch};

/// What a single-row call does when the query returns more than one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SingleRowPolicy {
    /// Take the first row and discard the rest.
    #[default]
    FirstRow,
    /// Fail with `ScanError`.
    Strict,
}

/// Engine-wide behaviour, fixed when the engine is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    /// Log every statement at `info` (and failures at `warn`) instead of `debug`.
    pub debug: bool,
    pub single_row: SingleRowPolicy,
    pub empty_list: EmptyListPolicy,
    pub key_match: KeyMatch,
}
