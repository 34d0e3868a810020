//! Semantic version representation with the `{height}` macro.
//!
//! Versions here carry two to four numeric components where an unspecified
//! component is distinct from zero, because the missing slot is where the
//! version height gets encoded.

use std::cmp::Ordering;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{GraphverError, Result};
use crate::numeric::NumericVersion;

/// The macro token replaced by the computed version height.
pub const HEIGHT_MACRO: &str = "{height}";

static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^v?
        (?P<major>\d+)\.(?P<minor>\d+)
        (?:\.(?P<build>\d+)(?:\.(?P<revision>\d+))?)?
        (?:-(?P<prerelease>[0-9A-Za-z\-\.\{\}]+))?
        (?:\+(?P<buildmetadata>[0-9A-Za-z\-\.\{\}]+))?
        $",
    )
    .expect("version grammar must compile")
});

/// A slot in a semantic version, ordered most to least significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum Position {
    Major,
    Minor,
    Build,
    Revision,
    Prerelease,
    BuildMetadata,
}

impl Position {
    /// The next more significant slot, or None for Major.
    pub fn previous(self) -> Option<Position> {
        match self {
            Position::Major => None,
            Position::Minor => Some(Position::Major),
            Position::Build => Some(Position::Minor),
            Position::Revision => Some(Position::Build),
            Position::Prerelease => Some(Position::Revision),
            Position::BuildMetadata => Some(Position::Prerelease),
        }
    }
}

/// A semantic version with 2-4 numeric components, an optional prerelease,
/// and optional build metadata. The prerelease and build metadata may use
/// the [`HEIGHT_MACRO`] token as a whole identifier.
///
/// # Examples
/// ```rust
/// use graphver::{Position, SemanticVersion};
///
/// let version: SemanticVersion = "1.2-beta.{height}".parse()?;
/// assert_eq!(version.major(), 1);
/// assert_eq!(version.minor(), 2);
/// assert_eq!(version.build(), None);
/// assert_eq!(version.position_of_height(), Some(Position::Prerelease));
/// assert_eq!(version.to_string(), "1.2-beta.{height}");
/// # Ok::<_, graphver::GraphverError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemanticVersion {
    major: u32,
    minor: u32,
    build: Option<u32>,
    revision: Option<u32>,
    prerelease: String,
    build_metadata: String,
}

impl SemanticVersion {
    /// A two-component version with no prerelease or metadata.
    pub fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            build: None,
            revision: None,
            prerelease: String::new(),
            build_metadata: String::new(),
        }
    }

    /// Parse a version string.
    ///
    /// Accepts an optional leading `v`, 2-4 dotted numeric components, an
    /// optional `-prerelease`, and an optional `+buildmetadata`, with
    /// `{height}` allowed as a whole identifier in the trailing parts.
    pub fn parse(s: &str) -> Result<Self> {
        let caps = VERSION_RE
            .captures(s.trim())
            .ok_or_else(|| GraphverError::InvalidSemver(s.to_string()))?;

        let component = |name: &str| -> Result<Option<u32>> {
            match caps.name(name) {
                None => Ok(None),
                Some(m) => m
                    .as_str()
                    .parse::<u32>()
                    .map(Some)
                    .map_err(|_| GraphverError::InvalidSemver(s.to_string())),
            }
        };

        let major = component("major")?.ok_or_else(|| GraphverError::InvalidSemver(s.to_string()))?;
        let minor = component("minor")?.ok_or_else(|| GraphverError::InvalidSemver(s.to_string()))?;
        let build = component("build")?;
        let revision = component("revision")?;

        let prerelease = caps.name("prerelease").map(|m| m.as_str()).unwrap_or("");
        let build_metadata = caps.name("buildmetadata").map(|m| m.as_str()).unwrap_or("");

        validate_prerelease(prerelease)?;
        validate_build_metadata(build_metadata)?;

        Ok(Self {
            major,
            minor,
            build,
            revision,
            prerelease: prerelease.to_string(),
            build_metadata: build_metadata.to_string(),
        })
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn build(&self) -> Option<u32> {
        self.build
    }

    pub fn revision(&self) -> Option<u32> {
        self.revision
    }

    /// The prerelease part without the leading dash; empty when absent.
    pub fn prerelease(&self) -> &str {
        &self.prerelease
    }

    /// The build metadata part without the leading plus; empty when absent.
    pub fn build_metadata(&self) -> &str {
        &self.build_metadata
    }

    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }

    /// A copy with the prerelease replaced. An empty string clears it.
    pub fn with_prerelease(&self, prerelease: &str) -> Result<Self> {
        let prerelease = prerelease.strip_prefix('-').unwrap_or(prerelease);
        validate_prerelease(prerelease)?;
        let mut v = self.clone();
        v.prerelease = prerelease.to_string();
        Ok(v)
    }

    /// A copy with the build metadata replaced. An empty string clears it.
    pub fn with_build_metadata(&self, build_metadata: &str) -> Result<Self> {
        let build_metadata = build_metadata.strip_prefix('+').unwrap_or(build_metadata);
        validate_build_metadata(build_metadata)?;
        let mut v = self.clone();
        v.build_metadata = build_metadata.to_string();
        Ok(v)
    }

    /// The numeric component at a position, when that position is numeric
    /// and specified.
    pub fn numeric_component(&self, position: Position) -> Option<u32> {
        match position {
            Position::Major => Some(self.major),
            Position::Minor => Some(self.minor),
            Position::Build => self.build,
            Position::Revision => self.revision,
            Position::Prerelease | Position::BuildMetadata => None,
        }
    }

    /// Where the version height is encoded for this base version.
    ///
    /// A `{height}` identifier in the prerelease pins it there; otherwise
    /// the first unspecified numeric component carries it. A fully
    /// specified version with no macro has no height slot.
    pub fn position_of_height(&self) -> Option<Position> {
        if self.prerelease.split('.').any(|id| id == HEIGHT_MACRO) {
            return Some(Position::Prerelease);
        }
        if self.build.is_none() {
            return Some(Position::Build);
        }
        if self.revision.is_none() {
            return Some(Position::Revision);
        }
        None
    }

    /// Where the first 16 bits of the commit id are encoded: the revision
    /// slot, and only when the height occupies the build slot.
    pub fn position_of_commit_id(&self) -> Option<Position> {
        match self.position_of_height() {
            Some(Position::Build) => Some(Position::Revision),
            _ => None,
        }
    }

    /// Whether moving from `self` to `newer` resets the height counted at
    /// `at`: true iff any component at least as significant as `at`
    /// differs. At [`Position::Prerelease`] the whole version must match.
    pub fn will_reset_height(&self, newer: &SemanticVersion, at: Position) -> bool {
        let numerics_differ_through = |last: Position| {
            let mut positions = [Position::Major, Position::Minor, Position::Build, Position::Revision]
                .into_iter()
                .take_while(|p| *p <= last);
            positions.any(|p| self.numeric_component(p) != newer.numeric_component(p))
        };

        match at {
            Position::Major | Position::Minor | Position::Build | Position::Revision => {
                numerics_differ_through(at)
            }
            Position::Prerelease => {
                numerics_differ_through(Position::Revision) || self.prerelease != newer.prerelease
            }
            Position::BuildMetadata => {
                numerics_differ_through(Position::Revision)
                    || self.prerelease != newer.prerelease
                    || self.build_metadata != newer.build_metadata
            }
        }
    }

    /// Whether this base version could have produced the given 4-integer
    /// version: every specified numeric component that is not the height or
    /// commit-id slot must agree, with unspecified read as zero.
    pub fn is_matching(&self, numeric: &NumericVersion) -> bool {
        let height = self.position_of_height();
        let commit = self.position_of_commit_id();
        [Position::Major, Position::Minor, Position::Build, Position::Revision]
            .into_iter()
            .filter(|p| Some(*p) != height && Some(*p) != commit)
            .all(|p| {
                let own = self.numeric_component(p).unwrap_or(0) as i64;
                let theirs = numeric.component(p).map(|c| c.max(0)).unwrap_or(0) as i64;
                own == theirs
            })
    }

    /// The version as a [`NumericVersion`], with unspecified components left
    /// as the sentinel.
    pub fn to_numeric(&self) -> NumericVersion {
        NumericVersion::new(
            self.major as i32,
            self.minor as i32,
            self.build.map(|b| b as i32).unwrap_or(-1),
            self.revision.map(|r| r as i32).unwrap_or(-1),
        )
    }
}

/// Check each dot-separated identifier against the SemVer 2.0 prerelease
/// grammar, with `{height}` admitted as a whole identifier.
fn validate_prerelease(prerelease: &str) -> Result<()> {
    if prerelease.is_empty() {
        return Ok(());
    }
    let substituted = substitute_macro(prerelease, "0");
    semver::Prerelease::new(&substituted)
        .map_err(|_| GraphverError::InvalidSemver(format!("-{prerelease}")))?;
    Ok(())
}

fn validate_build_metadata(build_metadata: &str) -> Result<()> {
    if build_metadata.is_empty() {
        return Ok(());
    }
    let substituted = substitute_macro(build_metadata, "0");
    semver::BuildMetadata::new(&substituted)
        .map_err(|_| GraphverError::InvalidSemver(format!("+{build_metadata}")))?;
    Ok(())
}

/// Replace every whole-identifier `{height}` token with `replacement`.
pub(crate) fn substitute_macro(part: &str, replacement: &str) -> String {
    part.split('.')
        .map(|id| if id == HEIGHT_MACRO { replacement } else { id })
        .collect::<Vec<_>>()
        .join(".")
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(build) = self.build {
            write!(f, ".{build}")?;
            if let Some(revision) = self.revision {
                write!(f, ".{revision}")?;
            }
        }
        if !self.prerelease.is_empty() {
            write!(f, "-{}", self.prerelease)?;
        }
        if !self.build_metadata.is_empty() {
            write!(f, "+{}", self.build_metadata)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for SemanticVersion {
    type Err = GraphverError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemanticVersion {
    /// SemVer 2.0 precedence, for display ordering only. Build metadata is
    /// ignored; the numeric encoding governs real ordering.
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.build.unwrap_or(0).cmp(&other.build.unwrap_or(0)))
            .then(self.revision.unwrap_or(0).cmp(&other.revision.unwrap_or(0)))
            .then_with(|| compare_prerelease(&self.prerelease, &other.prerelease))
    }
}

fn compare_prerelease(a: &str, b: &str) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        // A release sorts above any prerelease.
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(ln), Ok(rn)) => ln.cmp(&rn),
                    // Numeric identifiers sort below alphanumeric ones.
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

impl serde::Serialize for SemanticVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for SemanticVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("1.2", 1, 2, None, None)]
    #[test_case("v1.2", 1, 2, None, None)]
    #[test_case("1.2.3", 1, 2, Some(3), None)]
    #[test_case("1.2.3.4", 1, 2, Some(3), Some(4))]
    #[test_case("0.0", 0, 0, None, None)]
    fn parses_numeric_components(s: &str, major: u32, minor: u32, build: Option<u32>, revision: Option<u32>) {
        let v = SemanticVersion::parse(s).unwrap();
        assert_eq!(v.major(), major);
        assert_eq!(v.minor(), minor);
        assert_eq!(v.build(), build);
        assert_eq!(v.revision(), revision);
    }

    #[test_case("1.2-beta")]
    #[test_case("1.2-beta.{height}")]
    #[test_case("1.2.3-rc.1+metadata.5")]
    #[test_case("1.2+{height}")]
    fn round_trips(s: &str) {
        let v = SemanticVersion::parse(s).unwrap();
        assert_eq!(v.to_string(), s);
        assert_eq!(SemanticVersion::parse(&v.to_string()).unwrap(), v);
    }

    #[test_case("1")]
    #[test_case("1.2.3.4.5")]
    #[test_case("1.2-")]
    #[test_case("1.2-beta..1")]
    #[test_case("1.2-01")]
    #[test_case("not a version")]
    fn rejects_malformed(s: &str) {
        assert!(SemanticVersion::parse(s).is_err());
    }

    #[test_case("1.2", Some(Position::Build))]
    #[test_case("1.2.3", Some(Position::Revision))]
    #[test_case("1.2.3.4", None)]
    #[test_case("1.2-beta.{height}", Some(Position::Prerelease))]
    #[test_case("1.2.3.4-beta.{height}", Some(Position::Prerelease))]
    fn height_position(s: &str, expected: Option<Position>) {
        let v = SemanticVersion::parse(s).unwrap();
        assert_eq!(v.position_of_height(), expected);
    }

    #[test]
    fn commit_id_position_follows_height() {
        let two = SemanticVersion::parse("1.2").unwrap();
        assert_eq!(two.position_of_commit_id(), Some(Position::Revision));
        let three = SemanticVersion::parse("1.2.3").unwrap();
        assert_eq!(three.position_of_commit_id(), None);
    }

    #[test]
    fn height_macro_in_metadata_does_not_pin_position() {
        let v = SemanticVersion::parse("1.2.3.4+{height}").unwrap();
        assert_eq!(v.position_of_height(), None);
    }

    #[test_case("1.2", "1.3", Position::Minor, true)]
    #[test_case("1.2", "1.2", Position::Minor, false)]
    #[test_case("1.2.3", "1.2.4", Position::Minor, false)]
    #[test_case("1.2.3", "1.2.4", Position::Build, true)]
    #[test_case("1.2-alpha", "1.2-beta", Position::Minor, false)]
    #[test_case("1.2-alpha", "1.2-beta", Position::Prerelease, true)]
    fn reset_detection(old: &str, new: &str, at: Position, expected: bool) {
        let old = SemanticVersion::parse(old).unwrap();
        let new = SemanticVersion::parse(new).unwrap();
        assert_eq!(old.will_reset_height(&new, at), expected);
    }

    #[test]
    fn matching_ignores_height_and_commit_slots() {
        let base = SemanticVersion::parse("1.2").unwrap();
        // Height lands in build, commit id in revision; anything there matches.
        assert!(base.is_matching(&NumericVersion::new(1, 2, 42, 0xabcd)));
        assert!(!base.is_matching(&NumericVersion::new(1, 3, 42, 0xabcd)));
    }

    #[test]
    fn ordering_follows_semver_precedence() {
        let release = SemanticVersion::parse("1.0.0").unwrap();
        let rc = SemanticVersion::parse("1.0.0-rc.1").unwrap();
        let beta2 = SemanticVersion::parse("1.0.0-beta.2").unwrap();
        let beta10 = SemanticVersion::parse("1.0.0-beta.10").unwrap();
        assert!(rc < release);
        assert!(beta2 < beta10);
        assert!(beta10 < rc);
    }

    #[test]
    fn substitution_replaces_whole_identifiers_only() {
        assert_eq!(substitute_macro("beta.{height}", "12"), "beta.12");
        assert_eq!(substitute_macro("x{height}y.{height}", "9"), "x{height}y.9");
    }
}
