/// Outcome of a statement that was executed for its side effects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecSummary {
    pub rows_affected: u64,
    /// Rowid of the last insert, where the backend reports one.
    pub last_insert_id: Option<i64>,
}

impl ExecSummary {
    #[must_use]
    pub fn new(rows_affected: u64, last_insert_id: Option<i64>) -> Self {
        Self {
            rows_affected,
            last_insert_id,
        }
    }
}
