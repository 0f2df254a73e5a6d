//! Identifier newtypes.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from a string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id! {
    /// Identifies the local user that owns a connection and its projections.
    UserId
}

string_id! {
    /// Identifies a financial institution as known to the aggregator.
    InstitutionId
}

string_id! {
    /// Identifies one user's authorized link to one institution.
    ConnectionId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_display_and_access() {
        let id = ConnectionId::new("conn-1");
        assert_eq!(id.as_str(), "conn-1");
        assert_eq!(id.to_string(), "conn-1");
        assert_eq!(ConnectionId::from("conn-1"), id);
    }

    #[test]
    fn ids_are_distinct_types() {
        // UserId and ConnectionId with the same inner string must not be
        // interchangeable; this is a compile-time property, exercised here
        // only for coverage of the constructors.
        let user = UserId::new("x");
        let conn = ConnectionId::new("x");
        assert_eq!(user.as_str(), conn.as_str());
    }
}
