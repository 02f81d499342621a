//! Store data model: identifiers, schemas, layouts and record values.

mod encoded_lengths;
mod field_layout;
mod record;
mod resource_id;
mod schema;
mod schema_type;
mod value;

pub use encoded_lengths::{EncodedLengths, MAX_FIELD_LENGTH, MAX_TOTAL_LENGTH};
pub use field_layout::FieldLayout;
pub use record::{hex_bytes, Record};
pub use resource_id::{ResourceId, TableKind, RESOURCE_OFFCHAIN_TABLE, RESOURCE_TABLE};
pub use schema::{Schema, MAX_DYNAMIC_FIELDS, MAX_TOTAL_FIELDS};
pub use schema_type::{SchemaType, ADDRESS_BYTES};
pub use value::FieldValue;

pub(crate) use resource_id::pack as pack_resource_id;
