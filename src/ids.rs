//! Opaque identifiers for sessions, files and blobs.
//!
//! All three are generated from random v4 UUIDs rendered as 32 lowercase
//! hex characters. They travel through transports as plain strings, so
//! parsing never fails; [`SessionId::is_well_formed`] and friends report
//! whether a string has the generated shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh random id.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().simple().to_string())
            }

            /// Borrow the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the id has the shape of a generated id.
            pub fn is_well_formed(&self) -> bool {
                self.0.len() == 32
                    && self
                        .0
                        .bytes()
                        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

opaque_id!(
    /// Identifies one browser session and everything it owns.
    SessionId
);

opaque_id!(
    /// Identifies an uploaded source file within its session.
    FileId
);

opaque_id!(
    /// Identifies a stored byte blob (uploaded source or merge output).
    BlobId
);
