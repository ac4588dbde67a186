//! Four-component release versions.
//!
//! A [`Version`] is an ordered `major.minor.build.revision` tuple of unsigned
//! integers. Published VersionRecords are directories named after the
//! version's string form, so parsing doubles as the filter that decides which
//! directory entries are versions at all: anything that does not parse (for
//! example a `.staging-*` directory) is simply not a version.
//!
//! Ordering is total and component-wise, left to right, which is exactly the
//! derived lexicographic ordering of the tuple fields.
//!
//! # Examples
//!
//! ```rust
//! use rollout::version::Version;
//!
//! let installed: Version = "1.0.0.0".parse().unwrap();
//! let latest: Version = "1.0.0.1".parse().unwrap();
//! assert!(latest > installed);
//! assert_eq!(latest.to_string(), "1.0.0.1");
//! ```

use crate::core::RolloutError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A `major.minor.build.revision` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    /// Major component.
    pub major: u32,
    /// Minor component.
    pub minor: u32,
    /// Build component.
    pub build: u32,
    /// Revision component.
    pub revision: u32,
}

impl Version {
    /// Create a version from its four components.
    #[must_use]
    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Parse a directory name, returning `None` for anything that is not a version.
    ///
    /// Only the canonical form is accepted (`1.0.0.1`, not `01.0.0.1`), so a
    /// version found by enumeration can always be found again by name.
    #[must_use]
    pub fn from_dir_name(name: &str) -> Option<Self> {
        name.parse::<Self>().ok().filter(|v| v.to_string() == name)
    }

    /// The largest version in `versions`, or `None` for an empty input.
    pub fn latest<'a>(versions: impl IntoIterator<Item = &'a Version>) -> Option<Version> {
        versions.into_iter().max().copied()
    }
}

impl FromStr for Version {
    type Err = RolloutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RolloutError::InvalidVersion {
            input: s.to_string(),
        };

        let mut parts = [0u32; 4];
        let mut count = 0;
        for part in s.split('.') {
            if count == parts.len() || part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit())
            {
                return Err(invalid());
            }
            parts[count] = part.parse().map_err(|_| invalid())?;
            count += 1;
        }
        if count != parts.len() {
            return Err(invalid());
        }

        Ok(Self::new(parts[0], parts[1], parts[2], parts[3]))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.build, self.revision)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        let version = v("1.2.30.400");
        assert_eq!(version, Version::new(1, 2, 30, 400));
        assert_eq!(version.to_string(), "1.2.30.400");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let inputs = [
            "",
            "1",
            "1.0.0",
            "1.0.0.0.0",
            "1..0.0",
            "a.b.c.d",
            "-1.0.0.0",
            " 1.0.0.0",
            ".staging-1.0.0.0",
            "1.0.0.0\n",
        ];
        for input in inputs {
            let result = input.parse::<Version>();
            assert!(result.is_err(), "{input:?} should not parse");
            assert!(matches!(result, Err(RolloutError::InvalidVersion { .. })));
        }
    }

    #[test]
    fn test_parse_rejects_overflow() {
        assert!("4294967296.0.0.0".parse::<Version>().is_err());
        assert!("4294967295.0.0.0".parse::<Version>().is_ok());
    }

    #[test]
    fn test_ordering_is_componentwise() {
        assert!(v("1.0.0.1") > v("1.0.0.0"));
        assert!(v("1.0.1.0") > v("1.0.0.9"));
        assert!(v("2.0.0.0") > v("1.99.99.99"));
        assert!(v("1.10.0.0") > v("1.9.0.0"));
        assert_eq!(v("001.0.0.0"), v("1.0.0.0"));
    }

    #[test]
    fn test_ordering_is_transitive_and_total() {
        let mut versions =
            vec![v("1.0.0.1"), v("0.9.9.9"), v("1.0.0.0"), v("1.0.1.0"), v("0.9.9.9")];
        versions.sort();
        for pair in versions.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        for a in &versions {
            for b in &versions {
                for c in &versions {
                    if a <= b && b <= c {
                        assert!(a <= c);
                    }
                }
                assert!(a <= b || b <= a);
            }
        }
    }

    #[test]
    fn test_latest() {
        let versions = [v("1.0.0.0"), v("1.0.0.1"), v("0.5.0.0")];
        assert_eq!(Version::latest(&versions), Some(v("1.0.0.1")));
        assert_eq!(Version::latest(std::iter::empty()), None);
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&v("1.0.0.1")).unwrap();
        assert_eq!(json, "\"1.0.0.1\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v("1.0.0.1"));
        assert!(serde_json::from_str::<Version>("\"1.0\"").is_err());
    }

    #[test]
    fn test_from_dir_name() {
        assert_eq!(Version::from_dir_name("2.0.0.0"), Some(v("2.0.0.0")));
        assert_eq!(Version::from_dir_name("Download"), None);
        assert_eq!(Version::from_dir_name("02.0.0.0"), None);
    }
}
