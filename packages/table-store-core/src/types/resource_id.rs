//! 32-byte table identifiers.

use std::fmt;

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Type tag of an on-chain table.
pub const RESOURCE_TABLE: [u8; 2] = *b"tb";
/// Type tag of an off-chain (event-only) table.
pub const RESOURCE_OFFCHAIN_TABLE: [u8; 2] = *b"ot";

const TYPE_BYTES: usize = 2;
const NAMESPACE_BYTES: usize = 14;
const NAME_BYTES: usize = 16;
const NAME_OFFSET: usize = TYPE_BYTES + NAMESPACE_BYTES;

/// Whether a table holds canonical on-chain state or only emits events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    OnChain,
    OffChain,
}

/// Identifier of a table: 2-byte type tag, 14-byte namespace, 16-byte name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(B256);

impl ResourceId {
    /// Wraps a raw 32-byte word without checking its type tag.
    pub const fn from_word(word: B256) -> Self {
        Self(word)
    }

    /// Builds an id from a type tag, namespace and name.
    ///
    /// Namespace and name are right-padded with zero bytes and must fit in
    /// 14 and 16 bytes respectively.
    pub fn new(resource_type: [u8; 2], namespace: &str, name: &str) -> Result<Self, StoreError> {
        if namespace.len() > NAMESPACE_BYTES {
            return Err(StoreError::LimitExceeded {
                what: "namespace length",
                got: namespace.len() as u64,
                max: NAMESPACE_BYTES as u64,
            });
        }
        if name.len() > NAME_BYTES {
            return Err(StoreError::LimitExceeded {
                what: "table name length",
                got: name.len() as u64,
                max: NAME_BYTES as u64,
            });
        }
        Ok(Self(B256::new(pack(
            &resource_type,
            namespace.as_bytes(),
            name.as_bytes(),
        ))))
    }

    /// Builds an on-chain table id.
    pub fn table(namespace: &str, name: &str) -> Result<Self, StoreError> {
        Self::new(RESOURCE_TABLE, namespace, name)
    }

    /// Builds an off-chain table id.
    pub fn offchain_table(namespace: &str, name: &str) -> Result<Self, StoreError> {
        Self::new(RESOURCE_OFFCHAIN_TABLE, namespace, name)
    }

    pub const fn as_word(&self) -> &B256 {
        &self.0
    }

    pub fn resource_type(&self) -> [u8; 2] {
        [self.0[0], self.0[1]]
    }

    /// Namespace with trailing zero padding removed.
    pub fn namespace(&self) -> String {
        trimmed(&self.0[TYPE_BYTES..NAME_OFFSET])
    }

    /// Name with trailing zero padding removed.
    pub fn name(&self) -> String {
        trimmed(&self.0[NAME_OFFSET..])
    }

    /// Classifies the id by its type tag.
    pub fn table_kind(&self) -> Result<TableKind, StoreError> {
        match self.resource_type() {
            RESOURCE_TABLE => Ok(TableKind::OnChain),
            RESOURCE_OFFCHAIN_TABLE => Ok(TableKind::OffChain),
            other => Err(StoreError::InvalidResourceId {
                id: format!("0x{}", hex::encode(self.0)),
                reason: format!("unsupported type tag 0x{}", hex::encode(other)),
            }),
        }
    }
}

impl From<ResourceId> for B256 {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let printable = |bytes: &[u8]| {
            bytes
                .iter()
                .all(|b| *b == 0 || b.is_ascii_graphic())
        };
        let tag = self.resource_type();
        let known = tag == RESOURCE_TABLE || tag == RESOURCE_OFFCHAIN_TABLE;
        if known && printable(&self.0[TYPE_BYTES..]) {
            write!(
                f,
                "{}{}:{}:{}",
                tag[0] as char,
                tag[1] as char,
                self.namespace(),
                self.name()
            )
        } else {
            write!(f, "0x{}", hex::encode(self.0))
        }
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({})", self)
    }
}

pub(crate) const fn pack(resource_type: &[u8; 2], namespace: &[u8], name: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[0] = resource_type[0];
    out[1] = resource_type[1];
    let mut i = 0;
    while i < namespace.len() && i < NAMESPACE_BYTES {
        out[TYPE_BYTES + i] = namespace[i];
        i += 1;
    }
    let mut j = 0;
    while j < name.len() && j < NAME_BYTES {
        out[NAME_OFFSET + j] = name[j];
        j += 1;
    }
    out
}

fn trimmed(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_id_layout() {
        let id = ResourceId::table("app", "Position").unwrap();
        let word = id.as_word();
        assert_eq!(&word[..2], b"tb");
        assert_eq!(&word[2..5], b"app");
        assert!(word[5..16].iter().all(|b| *b == 0));
        assert_eq!(&word[16..24], b"Position");
        assert_eq!(id.namespace(), "app");
        assert_eq!(id.name(), "Position");
        assert_eq!(id.table_kind().unwrap(), TableKind::OnChain);
        assert_eq!(id.to_string(), "tb:app:Position");
    }

    #[test]
    fn test_resource_id_limits() {
        assert!(matches!(
            ResourceId::table("a-namespace-too-long", "x"),
            Err(StoreError::LimitExceeded { .. })
        ));
        assert!(matches!(
            ResourceId::offchain_table("ns", "a-name-that-is-too-long"),
            Err(StoreError::LimitExceeded { .. })
        ));
    }

    #[test]
    fn test_unknown_type_tag() {
        let id = ResourceId::from_word(B256::repeat_byte(0x01));
        assert!(matches!(
            id.table_kind(),
            Err(StoreError::InvalidResourceId { .. })
        ));
        assert!(id.to_string().starts_with("0x0101"));

        let Err(StoreError::InvalidResourceId { id: text, .. }) = id.table_kind() else {
            panic!("expected InvalidResourceId");
        };
        assert_eq!(text, format!("0x{}", "01".repeat(32)));
    }
}
