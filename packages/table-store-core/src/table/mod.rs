//! Tables, the Tables registry and record-level mutation rules.

mod registry;
#[allow(clippy::module_inception)]
mod table;
pub(crate) mod validation;

pub use registry::{TableRegistration, TableRegistry, TABLES_TABLE_ID};
pub use table::{KeyTuple, Table};
