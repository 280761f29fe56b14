//! Per-file metadata document stored in the extension zone.
//!
//! ```json
//! {"extension":{"version":{"major":1,"minor":0},"localize":{"tz":"Europe/Riga"}}}
//! ```

use crate::error::CoreResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Major format version written by this engine.
pub const FORMAT_MAJOR: u16 = 1;
/// Minor format version written by this engine.
pub const FORMAT_MINOR: u16 = 0;

/// Format version of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Incompatible changes.
    pub major: u16,
    /// Compatible changes.
    pub minor: u16,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Localize {
    tz: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Body {
    version: Version,
    localize: Localize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Document {
    extension: Body,
}

/// Decoded metadata of a box file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    /// Format version.
    pub version: Version,
    /// Time zone name supplied by the writer.
    pub time_zone: String,
}

impl Extension {
    /// Metadata for a file written now.
    #[must_use]
    pub fn current(time_zone: &str) -> Self {
        Self {
            version: Version {
                major: FORMAT_MAJOR,
                minor: FORMAT_MINOR,
            },
            time_zone: time_zone.to_string(),
        }
    }

    /// True if this engine can read the file.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.version.major == FORMAT_MAJOR
    }

    /// Serializes the document.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let doc = Document {
            extension: Body {
                version: self.version,
                localize: Localize {
                    tz: self.time_zone.clone(),
                },
            },
        };
        Ok(serde_json::to_vec(&doc)?)
    }

    /// Parses the document.
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        let doc: Document = serde_json::from_slice(bytes)?;
        Ok(Self {
            version: doc.extension.version,
            time_zone: doc.extension.localize.tz,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_shape() {
        let bytes = Extension::current("UTC").encode().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"extension":{"version":{"major":1,"minor":0},"localize":{"tz":"UTC"}}}"#
        );
    }

    #[test]
    fn decode_checks_major() {
        let ext = Extension::decode(
            br#"{"extension":{"version":{"major":2,"minor":5},"localize":{"tz":""}}}"#,
        )
        .unwrap();
        assert!(!ext.is_supported());
        assert!(Extension::current("").is_supported());
    }

    #[test]
    fn garbage_rejected() {
        assert!(Extension::decode(b"<extension/>").is_err());
    }
}
