//! Packing commit identity and height into the 4-integer version, and the
//! reverse lookup from a version back to the commit that produced it.

use std::collections::{HashMap, HashSet};

use crate::context::{CancellationToken, CommitId, GitContext};
use crate::error::{GraphverError, Result};
use crate::height::HeightCalculator;
use crate::numeric::{NumericVersion, MAX_COMPONENT};
use crate::options::VersionOptions;
use crate::resolver::{self, ResolutionRequirements};
use crate::semver::{Position, SemanticVersion};

/// Encode a base version, a height, and optionally the first 16 bits of the
/// commit id into a fully specified 4-integer version.
///
/// The height (after the configured offset) lands in the base version's
/// height slot. When that slot is the build component, the commit bits land
/// in the revision component; a raw value of `0xFFFF` is clamped to
/// `0xFFFE` because the legacy header format reserves the former.
///
/// # Examples
/// ```rust
/// use graphver::{encode_identity, SemanticVersion};
///
/// let base: SemanticVersion = "1.2".parse()?;
/// let version = encode_identity(&base, 2, 0, Some(0xabcd))?;
/// assert_eq!(version.to_string(), "1.2.2.43981");
/// # Ok::<_, graphver::GraphverError>(())
/// ```
pub fn encode_identity(
    base: &SemanticVersion,
    height: u32,
    height_offset: i32,
    commit_first16: Option<u16>,
) -> Result<NumericVersion> {
    let offset_height = i64::from(height) + i64::from(height_offset);
    if !(0..=i64::from(MAX_COMPONENT)).contains(&offset_height) {
        return Err(GraphverError::HeightOverflow(offset_height));
    }
    let offset_height = offset_height as i32;

    let commit_bits = commit_first16
        .map(|raw| if raw == 0xffff { 0xfffe } else { raw })
        .map(i32::from);

    let height_position = base.position_of_height();
    let commit_position = base.position_of_commit_id();

    let component = |position: Position| -> i32 {
        if height_position == Some(position) {
            offset_height
        } else if commit_position == Some(position) {
            commit_bits.unwrap_or(0)
        } else {
            base.numeric_component(position)
                .map(|c| c as i32)
                .unwrap_or(0)
        }
    };

    Ok(NumericVersion::new(
        component(Position::Major),
        component(Position::Minor),
        component(Position::Build),
        component(Position::Revision),
    ))
}

/// Finds the commit a numeric version was encoded from.
///
/// Enumerates commits reachable from any ref, keeps those whose configured
/// base version could have produced the numeric version, then checks the
/// encoded height and, when present, the encoded commit-id bits.
pub struct ReverseLookup<'a> {
    ctx: &'a dyn GitContext,
    rel_dir: String,
    cancellation: CancellationToken,
}

impl<'a> ReverseLookup<'a> {
    pub fn new(ctx: &'a dyn GitContext, rel_dir: &str, cancellation: CancellationToken) -> Self {
        Self {
            ctx,
            rel_dir: rel_dir.to_string(),
            cancellation,
        }
    }

    /// The unique matching commit, or None. More than one match is an
    /// [`GraphverError::AmbiguousVersionMatch`].
    pub fn find_commit(&self, version: &NumericVersion) -> Result<Option<CommitId>> {
        let matches = self.find_commits(version, 2)?;
        match matches.as_slice() {
            [] => Ok(None),
            [unique] => Ok(Some(*unique)),
            many => Err(GraphverError::AmbiguousVersionMatch(many.len())),
        }
    }

    /// Matching commits, up to `limit`.
    pub fn find_commits(&self, version: &NumericVersion, limit: usize) -> Result<Vec<CommitId>> {
        let mut seen = HashSet::new();
        let mut options_cache: HashMap<CommitId, Option<VersionOptions>> = HashMap::new();
        let mut calculators: HashMap<String, HeightCalculator<'a>> = HashMap::new();
        let mut matches = Vec::new();

        for commit in self.ctx.reachable_commits()? {
            self.cancellation.check()?;
            if !seen.insert(commit) {
                continue;
            }
            let options = match options_cache.get(&commit) {
                Some(cached) => cached.clone(),
                None => {
                    let resolved = self.options_at(commit)?;
                    options_cache.insert(commit, resolved.clone());
                    resolved
                }
            };
            let Some(options) = options else { continue };
            let Some(base) = options.version().cloned() else { continue };

            let height_position = match base.position_of_height() {
                // Without a numeric height slot the version carries no
                // identity to recover.
                Some(p @ (Position::Build | Position::Revision)) => p,
                _ => continue,
            };
            if !base.is_matching(version) {
                continue;
            }

            let encoded_height = i64::from(version.component(height_position).unwrap_or(0));
            let expected = encoded_height - i64::from(options.version_height_offset_or_default());
            let Ok(expected) = u32::try_from(expected) else {
                continue;
            };

            let key = format!("{base}@{}", self.rel_dir);
            let calculator = match calculators.entry(key) {
                std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
                std::collections::hash_map::Entry::Vacant(e) => e.insert(HeightCalculator::new(
                    self.ctx,
                    &self.rel_dir,
                    &options,
                    self.cancellation.clone(),
                )?),
            };
            if calculator.calculate(commit)? != expected {
                continue;
            }

            if base.position_of_commit_id() == Some(Position::Revision) {
                let revision = version.component(Position::Revision).unwrap_or(0) as u16;
                let mask = if revision == 0xfffe { 0xfffe } else { 0xffff };
                if !commit.starts_with_u16(revision, mask) {
                    continue;
                }
            }

            matches.push(commit);
            if matches.len() >= limit {
                break;
            }
        }
        Ok(matches)
    }

    fn options_at(&self, commit: CommitId) -> Result<Option<VersionOptions>> {
        let requirements = ResolutionRequirements {
            version_specified: true,
            ..Default::default()
        };
        match resolver::resolve_at_commit(self.ctx, commit, &self.rel_dir, requirements) {
            Ok((options, _)) => Ok(options),
            Err(GraphverError::MissingObject(id)) => {
                if self.ctx.is_shallow() {
                    Err(GraphverError::ShallowClone)
                } else {
                    Err(GraphverError::MissingObject(id))
                }
            }
            Err(e @ GraphverError::Canceled) => Err(e),
            Err(e) => {
                tracing::debug!(commit = %commit, error = %e, "skipping commit with unreadable configuration");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRepo;

    #[test]
    fn encodes_height_in_build_and_commit_in_revision() {
        let base = SemanticVersion::parse("1.2").unwrap();
        let v = encode_identity(&base, 2, 0, Some(0xabcd)).unwrap();
        assert_eq!(v, NumericVersion::new(1, 2, 2, 0xabcd));
    }

    #[test]
    fn encodes_height_in_revision_without_commit_bits() {
        let base = SemanticVersion::parse("1.2.3").unwrap();
        let v = encode_identity(&base, 7, 0, Some(0xabcd)).unwrap();
        assert_eq!(v, NumericVersion::new(1, 2, 3, 7));
    }

    #[test]
    fn prerelease_height_leaves_numerics_to_base() {
        let base = SemanticVersion::parse("1.0-beta.{height}").unwrap();
        let v = encode_identity(&base, 7, 5, Some(0xabcd)).unwrap();
        assert_eq!(v, NumericVersion::new(1, 0, 0, 0));
    }

    #[test]
    fn fully_specified_version_encodes_nothing() {
        let base = SemanticVersion::parse("1.2.3.4").unwrap();
        let v = encode_identity(&base, 9, 0, Some(0xabcd)).unwrap();
        assert_eq!(v, NumericVersion::new(1, 2, 3, 4));
    }

    #[test]
    fn offset_applies_before_encoding() {
        let base = SemanticVersion::parse("1.2").unwrap();
        let v = encode_identity(&base, 7, 5, None).unwrap();
        assert_eq!(v.component(Position::Build), Some(12));
    }

    #[test]
    fn height_overflow_is_rejected() {
        let base = SemanticVersion::parse("1.2").unwrap();
        assert!(matches!(
            encode_identity(&base, 65530, 10, None),
            Err(GraphverError::HeightOverflow(65540))
        ));
        assert!(matches!(
            encode_identity(&base, 0, -1, None),
            Err(GraphverError::HeightOverflow(-1))
        ));
        assert!(encode_identity(&base, 65534, 0, None).is_ok());
    }

    #[test]
    fn commit_bits_0xffff_clamp_to_0xfffe() {
        let base = SemanticVersion::parse("1.2").unwrap();
        let v = encode_identity(&base, 1, 0, Some(0xffff)).unwrap();
        assert_eq!(v.component(Position::Revision), Some(0xfffe));
    }

    #[test]
    fn reverse_lookup_finds_unique_commit() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit_with_leading(
            &[],
            &[("version.json", r#"{"version": "3.1"}"#), ("a.txt", "1")],
            0x1111,
        );
        let c2 = repo.commit_with_leading(&[c1], &[("a.txt", "2")], 0x2222);
        let c3 = repo.commit_with_leading(&[c2], &[("a.txt", "3")], 0x3333);

        let target = encode_identity(
            &SemanticVersion::parse("3.1").unwrap(),
            3,
            0,
            Some(c3.first_u16()),
        )
        .unwrap();
        let lookup = ReverseLookup::new(&repo, "", CancellationToken::new());
        assert_eq!(lookup.find_commit(&target).unwrap(), Some(c3));

        let mid = encode_identity(
            &SemanticVersion::parse("3.1").unwrap(),
            2,
            0,
            Some(c2.first_u16()),
        )
        .unwrap();
        assert_eq!(lookup.find_commit(&mid).unwrap(), Some(c2));
    }

    #[test]
    fn reverse_lookup_honors_height_offset() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit_with_leading(
            &[],
            &[("version.json", r#"{"version": "3.1", "versionHeightOffset": 5}"#), ("a.txt", "1")],
            0x4444,
        );
        let c2 = repo.commit_with_leading(&[c1], &[("a.txt", "2")], 0x5555);
        // c2 is at height 2, encoded as 7 with the offset applied.
        let target = NumericVersion::new(3, 1, 7, i32::from(c2.first_u16()));
        let lookup = ReverseLookup::new(&repo, "", CancellationToken::new());
        assert_eq!(lookup.find_commit(&target).unwrap(), Some(c2));
    }

    #[test]
    fn reverse_lookup_misses_return_none() {
        let mut repo = FakeRepo::new();
        repo.commit_with_leading(
            &[],
            &[("version.json", r#"{"version": "3.1"}"#), ("a.txt", "1")],
            0x1111,
        );
        let lookup = ReverseLookup::new(&repo, "", CancellationToken::new());
        // Wrong minor: nothing can match.
        let other = NumericVersion::new(3, 2, 1, 0x1111);
        assert_eq!(lookup.find_commit(&other).unwrap(), None);
        // Right prefix, wrong height.
        let wrong_height = NumericVersion::new(3, 1, 9, 0x1111);
        assert_eq!(lookup.find_commit(&wrong_height).unwrap(), None);
    }

    #[test]
    fn ambiguous_match_is_an_error() {
        let mut repo = FakeRepo::new();
        let base = repo.commit_with_leading(
            &[],
            &[("version.json", r#"{"version": "3.1"}"#), ("a.txt", "1")],
            0x0a0a,
        );
        let tip_a = repo.commit_with_leading(&[base], &[("a.txt", "left")], 0xaaaa);
        let tip_b = repo.commit_with_leading(&[base], &[("a.txt", "right")], 0xaaaa);
        repo.set_ref("refs/heads/left", tip_a);
        repo.set_ref("refs/heads/right", tip_b);
        // Both tips sit at height 2 and share leading bits.
        let target = NumericVersion::new(3, 1, 2, 0xaaaa);
        let lookup = ReverseLookup::new(&repo, "", CancellationToken::new());
        assert!(matches!(
            lookup.find_commit(&target),
            Err(GraphverError::AmbiguousVersionMatch(2))
        ));
    }

    #[test]
    fn clamped_commit_bits_match_under_mask() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit_with_leading(
            &[],
            &[("version.json", r#"{"version": "3.1"}"#), ("a.txt", "1")],
            0xffff,
        );
        let target = encode_identity(&SemanticVersion::parse("3.1").unwrap(), 1, 0, Some(0xffff)).unwrap();
        assert_eq!(target.component(Position::Revision), Some(0xfffe));
        let lookup = ReverseLookup::new(&repo, "", CancellationToken::new());
        assert_eq!(lookup.find_commit(&target).unwrap(), Some(c1));
    }
}
