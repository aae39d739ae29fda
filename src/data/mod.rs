//! Input data: CSV loading and the customer table abstraction

mod loader;
mod table;

pub use loader::{trim_column_names, DataLoader};
pub use table::{CustomerTable, ID_COLUMN_CANDIDATES, TARGET_COLUMN};

pub(crate) use table::column_as_f64;
