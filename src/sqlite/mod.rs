// SQLite backend, split into:
// - config: open options and their builder
// - params: RowValues -> rusqlite values
// - query: rusqlite rows -> RowValues
// - executor: the Database impl and its streaming cursor

pub mod config;
pub mod executor;
pub mod params;
pub mod query;

pub use config::{SqliteOptions, SqliteOptionsBuilder};
pub use executor::SqliteDatabase;
pub use params::Params as SqliteParams;
pub use query::sqlite_extract_value;
