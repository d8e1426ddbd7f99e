use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name([u8; 32]);

        impl $name {
            pub fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s)?;
                if bytes.len() != 32 {
                    return Err(hex::FromHexError::InvalidStringLength);
                }
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                Ok(Self(arr))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({}...)"), &self.to_hex()[..8])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }
    };
}

entity_id!(TaskId);
entity_id!(BidId);
entity_id!(ReviewId);
entity_id!(NotificationId);

// UserId is an opaque identity supplied by the platform's identity
// collaborator; the core never mints these, only stores and compares.
entity_id!(UserId);

/// Hash the given parts together with a random nonce into a fresh 32-byte
/// id. The nonce keeps ids unique even for byte-identical content.
fn digest_with_nonce(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    let nonce: [u8; 16] = rand::random();
    hasher.update(&nonce);
    hasher.finalize().into()
}

impl TaskId {
    pub fn generate(customer: &UserId, title: &str, timestamp: i64) -> Self {
        Self(digest_with_nonce(&[
            customer.as_bytes(),
            title.as_bytes(),
            &timestamp.to_le_bytes(),
        ]))
    }
}

impl BidId {
    pub fn generate(task: &TaskId, tasker: &UserId, timestamp: i64) -> Self {
        Self(digest_with_nonce(&[
            task.as_bytes(),
            tasker.as_bytes(),
            &timestamp.to_le_bytes(),
        ]))
    }
}

impl ReviewId {
    pub fn generate(task: &TaskId, reviewer: &UserId) -> Self {
        Self(digest_with_nonce(&[task.as_bytes(), reviewer.as_bytes()]))
    }
}

impl NotificationId {
    pub fn generate(recipient: &UserId, timestamp: i64) -> Self {
        Self(digest_with_nonce(&[
            recipient.as_bytes(),
            &timestamp.to_le_bytes(),
        ]))
    }
}
