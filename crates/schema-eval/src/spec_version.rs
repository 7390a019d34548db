// JSON Schema specification versions

use serde::{Deserialize, Serialize};
use std::fmt;

/// A published (or upcoming) JSON Schema draft.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum SpecVersion {
    /// No explicit version; dialect resolution decides
    #[default]
    Unspecified,
    Draft6,
    Draft7,
    Draft201909,
    Draft202012,
    DraftNext,
}

impl SpecVersion {
    /// Used when neither the options nor `$schema` pick a version
    pub const DEFAULT: SpecVersion = SpecVersion::Draft202012;

    /// Map a meta-schema URI to the draft it defines.
    ///
    /// The trailing empty fragment that older drafts carry is optional.
    pub fn from_meta_schema_uri(uri: &str) -> Option<Self> {
        let uri = uri.strip_suffix('#').unwrap_or(uri);
        match uri {
            "http://json-schema.org/draft-06/schema" => Some(SpecVersion::Draft6),
            "http://json-schema.org/draft-07/schema" => Some(SpecVersion::Draft7),
            "https://json-schema.org/draft/2019-09/schema" => Some(SpecVersion::Draft201909),
            "https://json-schema.org/draft/2020-12/schema" => Some(SpecVersion::Draft202012),
            "https://json-schema.org/draft/next/schema" => Some(SpecVersion::DraftNext),
            _ => None,
        }
    }

    pub fn meta_schema_uri(self) -> Option<&'static str> {
        match self {
            SpecVersion::Unspecified => None,
            SpecVersion::Draft6 => Some("http://json-schema.org/draft-06/schema#"),
            SpecVersion::Draft7 => Some("http://json-schema.org/draft-07/schema#"),
            SpecVersion::Draft201909 => Some("https://json-schema.org/draft/2019-09/schema"),
            SpecVersion::Draft202012 => Some("https://json-schema.org/draft/2020-12/schema"),
            SpecVersion::DraftNext => Some("https://json-schema.org/draft/next/schema"),
        }
    }

    /// Whether `$ref` replaces its sibling keywords (drafts 6 and 7)
    pub fn ref_overrides_siblings(self) -> bool {
        matches!(self, SpecVersion::Draft6 | SpecVersion::Draft7)
    }

    const fn bit(self) -> u8 {
        match self {
            SpecVersion::Unspecified => 0,
            SpecVersion::Draft6 => 1,
            SpecVersion::Draft7 => 1 << 1,
            SpecVersion::Draft201909 => 1 << 2,
            SpecVersion::Draft202012 => 1 << 3,
            SpecVersion::DraftNext => 1 << 4,
        }
    }
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpecVersion::Unspecified => "unspecified draft",
            SpecVersion::Draft6 => "draft 6",
            SpecVersion::Draft7 => "draft 7",
            SpecVersion::Draft201909 => "draft 2019-09",
            SpecVersion::Draft202012 => "draft 2020-12",
            SpecVersion::DraftNext => "draft next",
        };
        f.write_str(name)
    }
}

/// The set of drafts a keyword is defined in
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecVersions(u8);

impl SpecVersions {
    pub const NONE: SpecVersions = SpecVersions(0);

    pub const ALL: SpecVersions = SpecVersions(0b1_1111);

    /// Exactly the listed drafts
    pub const fn of(versions: &[SpecVersion]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < versions.len() {
            bits |= versions[i].bit();
            i += 1;
        }
        SpecVersions(bits)
    }

    /// `first` and every later draft
    pub const fn since(first: SpecVersion) -> Self {
        let start = first.bit();
        if start == 0 {
            return Self::ALL;
        }
        // Bits at or above `start`, clipped to the known drafts
        SpecVersions(!(start - 1) & Self::ALL.0)
    }

    /// Every draft up to and including `last`
    pub const fn until(last: SpecVersion) -> Self {
        let end = last.bit();
        if end == 0 {
            return Self::NONE;
        }
        SpecVersions(((end << 1) - 1) & Self::ALL.0)
    }

    pub const fn contains(self, version: SpecVersion) -> bool {
        self.0 & version.bit() != 0
    }

    pub const fn union(self, other: SpecVersions) -> Self {
        SpecVersions(self.0 | other.0)
    }
}

impl fmt::Debug for SpecVersions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let all = [
            SpecVersion::Draft6,
            SpecVersion::Draft7,
            SpecVersion::Draft201909,
            SpecVersion::Draft202012,
            SpecVersion::DraftNext,
        ];
        f.debug_set()
            .entries(all.iter().filter(|v| self.contains(**v)))
            .finish()
    }
}
