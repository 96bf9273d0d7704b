mod row;
mod summary;

pub use row::CustomDbRow;
pub use summary::ExecSummary;
