//! The 4-integer version constrained by legacy binary-header formats.

use std::fmt;

use crate::error::{GraphverError, Result};
use crate::semver::Position;

/// The largest value a component may carry in the numeric encoding. 65535
/// is reserved by the legacy header format.
pub const MAX_COMPONENT: i32 = 65534;

/// A `major.minor.build.revision` version where `-1` marks an unspecified
/// component, mirroring the legacy header layout the encoding targets.
///
/// # Examples
/// ```rust
/// use graphver::NumericVersion;
///
/// let v: NumericVersion = "1.2.3".parse()?;
/// assert_eq!(v.to_string(), "1.2.3");
/// assert_eq!(v.revision(), None);
/// assert_eq!(v.to_string_safe(4), "1.2.3.0");
/// # Ok::<_, graphver::GraphverError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NumericVersion {
    major: i32,
    minor: i32,
    build: i32,
    revision: i32,
}

impl NumericVersion {
    /// Build from raw components; negative values are normalized to the
    /// `-1` sentinel.
    pub fn new(major: i32, minor: i32, build: i32, revision: i32) -> Self {
        let norm = |c: i32| if c < 0 { -1 } else { c };
        Self {
            major: norm(major),
            minor: norm(minor),
            build: norm(build),
            revision: norm(revision),
        }
    }

    /// The all-zero version emitted when no configuration exists.
    pub fn zero() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Parse `major.minor[.build[.revision]]`.
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() < 2 || parts.len() > 4 {
            return Err(GraphverError::InvalidSemver(s.to_string()));
        }
        let mut components = [-1i32; 4];
        for (i, part) in parts.iter().enumerate() {
            components[i] = part
                .parse::<u32>()
                .ok()
                .and_then(|c| i32::try_from(c).ok())
                .ok_or_else(|| GraphverError::InvalidSemver(s.to_string()))?;
        }
        Ok(Self::new(components[0], components[1], components[2], components[3]))
    }

    pub fn major(&self) -> i32 {
        self.major
    }

    pub fn minor(&self) -> i32 {
        self.minor
    }

    /// The build component, or None when unspecified.
    pub fn build(&self) -> Option<i32> {
        (self.build >= 0).then_some(self.build)
    }

    /// The revision component, or None when unspecified.
    pub fn revision(&self) -> Option<i32> {
        (self.revision >= 0).then_some(self.revision)
    }

    /// The component at a numeric position; None for unspecified slots and
    /// non-numeric positions.
    pub fn component(&self, position: Position) -> Option<i32> {
        let raw = match position {
            Position::Major => self.major,
            Position::Minor => self.minor,
            Position::Build => self.build,
            Position::Revision => self.revision,
            Position::Prerelease | Position::BuildMetadata => return None,
        };
        (raw >= 0).then_some(raw)
    }

    /// How many leading components are specified.
    pub fn field_count(&self) -> usize {
        if self.revision >= 0 {
            4
        } else if self.build >= 0 {
            3
        } else {
            2
        }
    }

    /// Render exactly `field_count` components, substituting 0 for any
    /// unspecified slot. `field_count` is clamped to 2..=4.
    pub fn to_string_safe(&self, field_count: usize) -> String {
        let fields = [self.major, self.minor, self.build, self.revision];
        fields
            .iter()
            .take(field_count.clamp(2, 4))
            .map(|c| c.max(&0).to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for NumericVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_safe(self.field_count()))
    }
}

impl std::str::FromStr for NumericVersion {
    type Err = GraphverError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl serde::Serialize for NumericVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for NumericVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("1.2", 2)]
    #[test_case("1.2.3", 3)]
    #[test_case("1.2.3.4", 4)]
    fn parse_and_field_count(s: &str, count: usize) {
        let v = NumericVersion::parse(s).unwrap();
        assert_eq!(v.field_count(), count);
        assert_eq!(v.to_string(), s);
    }

    #[test_case("1")]
    #[test_case("1.2.3.4.5")]
    #[test_case("1.-2")]
    #[test_case("a.b")]
    fn parse_rejects(s: &str) {
        assert!(NumericVersion::parse(s).is_err());
    }

    #[test]
    fn unspecified_renders_as_zero() {
        let v = NumericVersion::new(1, 2, -1, -1);
        assert_eq!(v.to_string_safe(4), "1.2.0.0");
        assert_eq!(v.to_string(), "1.2");
    }

    #[test]
    fn component_lookup() {
        let v = NumericVersion::new(3, 1, 42, 0xabcd);
        assert_eq!(v.component(Position::Build), Some(42));
        assert_eq!(v.component(Position::Revision), Some(0xabcd));
        assert_eq!(v.component(Position::Prerelease), None);
    }

    #[test]
    fn ordering_is_componentwise() {
        let a = NumericVersion::parse("1.2.3").unwrap();
        let b = NumericVersion::parse("1.2.4").unwrap();
        assert!(a < b);
    }
}
