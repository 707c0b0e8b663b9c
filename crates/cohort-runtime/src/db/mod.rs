mod pool;
mod schema;

pub use pool::Database;
pub use schema::{ensure_schema, SCHEMA_SQL};
