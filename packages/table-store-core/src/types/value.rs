//! Typed field values.

use alloy_primitives::{Address, I256, U256};

use super::schema_type::SchemaType;

/// Value of one table field.
///
/// Fixed-size byte arrays hold exactly the declared number of bytes; integers
/// must fit the declared width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Uint(U256),
    Int(I256),
    FixedBytes(Vec<u8>),
    Bool(bool),
    Address(Address),
    UintArray(Vec<U256>),
    IntArray(Vec<I256>),
    FixedBytesArray(Vec<Vec<u8>>),
    BoolArray(Vec<bool>),
    AddressArray(Vec<Address>),
    Bytes(Vec<u8>),
    String(String),
}

impl FieldValue {
    /// Convenience constructor for unsigned integers.
    pub fn uint(value: u64) -> Self {
        FieldValue::Uint(U256::from(value))
    }

    /// Convenience constructor for signed integers.
    pub fn int(value: i64) -> Self {
        let raw = if value < 0 {
            U256::ZERO.wrapping_sub(U256::from(value.unsigned_abs()))
        } else {
            U256::from(value as u64)
        };
        FieldValue::Int(I256::from_raw(raw))
    }

    pub fn string(value: impl Into<String>) -> Self {
        FieldValue::String(value.into())
    }

    /// Short name of the value's kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Uint(_) => "uint",
            FieldValue::Int(_) => "int",
            FieldValue::FixedBytes(_) => "fixed bytes",
            FieldValue::Bool(_) => "bool",
            FieldValue::Address(_) => "address",
            FieldValue::UintArray(_) => "uint array",
            FieldValue::IntArray(_) => "int array",
            FieldValue::FixedBytesArray(_) => "fixed bytes array",
            FieldValue::BoolArray(_) => "bool array",
            FieldValue::AddressArray(_) => "address array",
            FieldValue::Bytes(_) => "bytes",
            FieldValue::String(_) => "string",
        }
    }

    /// The all-zero value of a type, as read from an unset record.
    pub fn zero(ty: SchemaType) -> Self {
        match ty {
            SchemaType::Uint(_) => FieldValue::Uint(U256::ZERO),
            SchemaType::Int(_) => FieldValue::Int(I256::ZERO),
            SchemaType::FixedBytes(w) => FieldValue::FixedBytes(vec![0; w as usize]),
            SchemaType::Bool => FieldValue::Bool(false),
            SchemaType::Address => FieldValue::Address(Address::ZERO),
            SchemaType::UintArray(_) => FieldValue::UintArray(Vec::new()),
            SchemaType::IntArray(_) => FieldValue::IntArray(Vec::new()),
            SchemaType::FixedBytesArray(_) => FieldValue::FixedBytesArray(Vec::new()),
            SchemaType::BoolArray => FieldValue::BoolArray(Vec::new()),
            SchemaType::AddressArray => FieldValue::AddressArray(Vec::new()),
            SchemaType::Bytes => FieldValue::Bytes(Vec::new()),
            SchemaType::String => FieldValue::String(String::new()),
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Uint(v) => write!(f, "{}", v),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::FixedBytes(b) | FieldValue::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Address(a) => write!(f, "{}", a),
            FieldValue::UintArray(v) => write_list(f, v),
            FieldValue::IntArray(v) => write_list(f, v),
            FieldValue::FixedBytesArray(v) => {
                let items: Vec<String> = v.iter().map(|b| format!("0x{}", hex::encode(b))).collect();
                write_list(f, &items)
            }
            FieldValue::BoolArray(v) => write_list(f, v),
            FieldValue::AddressArray(v) => write_list(f, v),
            FieldValue::String(s) => write!(f, "{:?}", s),
        }
    }
}

fn write_list<T: std::fmt::Display>(f: &mut std::fmt::Formatter<'_>, items: &[T]) -> std::fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, "]")
}
