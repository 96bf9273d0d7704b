// Postgres backend, split into:
// - config: connection options
// - params: RowValues -> wire parameters
// - query: wire rows -> RowValues
// - executor: the Database impl and its streaming cursor

pub mod config;
pub mod executor;
pub mod params;
pub mod query;

pub use config::PostgresOptions;
pub use executor::PostgresDatabase;
pub use params::Params as PostgresParams;
pub use query::postgres_extract_value;
