//! A string value that may be sensitive.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

const REDACTED: &str = "(secret)";

/// A value paired with a flag telling whether it must be masked when displayed.
///
/// Equality is structural over both the value and the flag, so the same text
/// re-read with a different `is_secret` setting counts as a change.
#[derive(Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct OptionalSecret {
    pub value: String,
    #[serde(default)]
    pub is_secret: bool,
}

impl OptionalSecret {
    pub fn new(value: impl Into<String>, is_secret: bool) -> Self {
        Self {
            value: value.into(),
            is_secret,
        }
    }

    pub fn plain(value: impl Into<String>) -> Self {
        Self::new(value, false)
    }

    pub fn secret(value: impl Into<String>) -> Self {
        Self::new(value, true)
    }

    /// Value safe for logs and API responses.
    pub fn display_value(&self) -> &str {
        if self.is_secret {
            REDACTED
        } else {
            &self.value
        }
    }
}

impl fmt::Display for OptionalSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_value())
    }
}

impl fmt::Debug for OptionalSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionalSecret")
            .field("value", &self.display_value())
            .field("is_secret", &self.is_secret)
            .finish()
    }
}

// Serialized in redacted form only.
impl Serialize for OptionalSecret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("OptionalSecret", 2)?;
        s.serialize_field("value", self.display_value())?;
        s.serialize_field("is_secret", &self.is_secret)?;
        s.end()
    }
}
