//! Version-height calculation over the commit graph.
//!
//! Height is the length of the longest ancestry path, starting at the
//! inspected commit, on which the effective base version keeps its prefix
//! up to the height slot and each counted commit changes at least one path
//! admitted by the filter set. The walk is a memoized post-order traversal,
//! so merge diamonds are costed once and the max over parents is exact.

use std::collections::{HashMap, HashSet};

use crate::context::{CancellationToken, CommitId, GitContext};
use crate::error::{GraphverError, Result};
use crate::filter::PathFilterSet;
use crate::options::VersionOptions;
use crate::resolver::{self, ResolutionRequirements};
use crate::semver::{Position, SemanticVersion};

/// Whether an uncommitted edit to the version file zeroes the height: true
/// when the working-tree base version bumps any component up to the height
/// slot relative to the committed one.
pub fn working_tree_overrides_height(
    committed: Option<&SemanticVersion>,
    working: Option<&SemanticVersion>,
) -> bool {
    let (Some(committed), Some(working)) = (committed, working) else {
        return false;
    };
    if committed == working {
        return false;
    }
    let at = working.position_of_height().unwrap_or(Position::Revision);
    committed.will_reset_height(working, at)
}

/// The memoized walk computing heights against one base version.
///
/// Caches are scoped to this instance: one oracle computation builds one
/// calculator and drops it.
pub struct HeightCalculator<'a> {
    ctx: &'a dyn GitContext,
    rel_dir: String,
    base: SemanticVersion,
    filters: Option<PathFilterSet>,
    cancellation: CancellationToken,
    version_cache: HashMap<CommitId, Option<SemanticVersion>>,
    height_cache: HashMap<CommitId, u32>,
    in_progress: HashSet<CommitId>,
}

enum Frame {
    Enter(CommitId),
    Exit(CommitId, Vec<CommitId>),
}

impl<'a> HeightCalculator<'a> {
    /// Build a calculator for the configuration that lives in `rel_dir`
    /// (repo-relative, empty for the root). The options must carry a
    /// `version`; its path filters are resolved against `rel_dir`.
    pub fn new(
        ctx: &'a dyn GitContext,
        rel_dir: &str,
        options: &VersionOptions,
        cancellation: CancellationToken,
    ) -> Result<Self> {
        let base = options
            .version()
            .cloned()
            .ok_or(GraphverError::IllegalState("height requires a base version"))?;
        let filters = PathFilterSet::from_options(options, rel_dir, ctx.ignore_case())?;
        Ok(Self {
            ctx,
            rel_dir: rel_dir.to_string(),
            base,
            filters,
            cancellation,
            version_cache: HashMap::new(),
            height_cache: HashMap::new(),
            in_progress: HashSet::new(),
        })
    }

    /// Override the filter set (used when the caller already resolved one).
    pub fn with_filters(mut self, filters: Option<PathFilterSet>) -> Self {
        self.filters = filters;
        self
    }

    pub fn base_version(&self) -> &SemanticVersion {
        &self.base
    }

    /// The height of `commit`.
    pub fn calculate(&mut self, commit: CommitId) -> Result<u32> {
        let mut stack = vec![Frame::Enter(commit)];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(c) => {
                    self.cancellation.check()?;
                    if self.height_cache.contains_key(&c) {
                        continue;
                    }
                    if !self.in_progress.insert(c) {
                        return Err(GraphverError::IllegalState("cycle in commit ancestry"));
                    }
                    if !self.version_gate(c)? {
                        self.height_cache.insert(c, 0);
                        self.in_progress.remove(&c);
                        continue;
                    }
                    let parents = self.parents(c)?;
                    stack.push(Frame::Exit(c, parents.clone()));
                    for parent in &parents {
                        stack.push(Frame::Enter(*parent));
                    }
                }
                Frame::Exit(c, parents) => {
                    let max_parent = parents
                        .iter()
                        .filter_map(|p| self.height_cache.get(p))
                        .copied()
                        .max()
                        .unwrap_or(0);
                    let contrib = u32::from(self.relevant_diff(c, &parents)?);
                    self.height_cache.insert(c, contrib + max_parent);
                    self.in_progress.remove(&c);
                }
            }
        }
        self.height_cache
            .get(&commit)
            .copied()
            .ok_or(GraphverError::IllegalState("height walk did not settle"))
    }

    /// The version configured at a commit, resolved inside its own tree.
    /// Cached per commit.
    pub fn version_at(&mut self, commit: CommitId) -> Result<Option<SemanticVersion>> {
        if let Some(cached) = self.version_cache.get(&commit) {
            return Ok(cached.clone());
        }
        let requirements = ResolutionRequirements {
            version_specified: true,
            ..Default::default()
        };
        let resolved = resolver::resolve_at_commit(self.ctx, commit, &self.rel_dir, requirements);
        let version = match resolved {
            Ok((options, _)) => options.and_then(|o| o.version().cloned()),
            Err(e @ (GraphverError::MissingObject(_) | GraphverError::Canceled)) => {
                return Err(self.shallow_guard(e));
            }
            Err(e) => {
                tracing::warn!(commit = %commit, error = %e, "unreadable version configuration; commit does not count");
                None
            }
        };
        self.version_cache.insert(commit, version.clone());
        Ok(version)
    }

    /// The commit's configured version must keep the base version's prefix
    /// up to the height slot for the commit to count.
    fn version_gate(&mut self, commit: CommitId) -> Result<bool> {
        let Some(version) = self.version_at(commit)? else {
            return Ok(false);
        };
        Ok(base_prefix_matches(&self.base, &version))
    }

    fn parents(&self, commit: CommitId) -> Result<Vec<CommitId>> {
        self.ctx.parents_of(commit).map_err(|e| self.shallow_guard(e))
    }

    /// Some changed path against at least one parent (or the empty tree for
    /// a root commit) must pass the filter set for the commit to add one.
    fn relevant_diff(&self, commit: CommitId, parents: &[CommitId]) -> Result<bool> {
        let scope = self.filters.as_ref().and_then(PathFilterSet::include_scopes);
        let admits = |paths: Vec<String>| {
            paths
                .iter()
                .any(|path| self.filters.as_ref().map_or(true, |f| f.admits(path)))
        };
        if parents.is_empty() {
            let paths = self
                .ctx
                .tree_diff_paths(None, commit, scope.as_deref())
                .map_err(|e| self.shallow_guard(e))?;
            return Ok(admits(paths));
        }
        for parent in parents {
            let paths = self
                .ctx
                .tree_diff_paths(Some(*parent), commit, scope.as_deref())
                .map_err(|e| self.shallow_guard(e))?;
            if admits(paths) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Translate a missing object into the shallow-clone diagnostic when
    /// the repository is truncated.
    fn shallow_guard(&self, e: GraphverError) -> GraphverError {
        match e {
            GraphverError::MissingObject(_) if self.ctx.is_shallow() => GraphverError::ShallowClone,
            other => other,
        }
    }
}

/// Prefix comparison for the height gate: full equality at the prerelease
/// position (or when no height slot exists), otherwise every component
/// above the slot must agree.
fn base_prefix_matches(base: &SemanticVersion, other: &SemanticVersion) -> bool {
    match base.position_of_height() {
        Some(Position::Prerelease) | None => !base.will_reset_height(other, Position::Prerelease),
        Some(position) => match position.previous() {
            Some(previous) => !base.will_reset_height(other, previous),
            None => true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRepo;

    fn options(json: &str) -> VersionOptions {
        VersionOptions::from_json(json.as_bytes()).unwrap()
    }

    fn calculate(repo: &FakeRepo, rel_dir: &str, commit: CommitId) -> Result<u32> {
        let at = resolver::resolve_at_commit(
            repo,
            commit,
            rel_dir,
            ResolutionRequirements {
                version_specified: true,
                ..Default::default()
            },
        )?
        .0
        .ok_or(GraphverError::IllegalState("no options at commit"))?;
        HeightCalculator::new(repo, rel_dir, &at, CancellationToken::new())?.calculate(commit)
    }

    #[test]
    fn linear_history_counts_matching_commits() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit(&[], &[("version.json", r#"{"version": "1.2"}"#), ("a.txt", "one")]);
        let c2 = repo.commit_from(c1, &[("a.txt", "two")]);
        let c3 = repo.commit_from(c2, &[("b.txt", "three")]);
        assert_eq!(calculate(&repo, "", c1).unwrap(), 1);
        assert_eq!(calculate(&repo, "", c2).unwrap(), 2);
        assert_eq!(calculate(&repo, "", c3).unwrap(), 3);
    }

    #[test]
    fn height_resets_when_minor_bumps() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit(&[], &[("version.json", r#"{"version": "1.2"}"#)]);
        let c2 = repo.commit_from(c1, &[("version.json", r#"{"version": "1.3"}"#)]);
        let c3 = repo.commit_from(c2, &[("a.txt", "x")]);
        // The walk from c3 sees 1.3 at c3 and c2, then a mismatching 1.2 at c1.
        assert_eq!(calculate(&repo, "", c3).unwrap(), 2);
        assert_eq!(calculate(&repo, "", c2).unwrap(), 1);
    }

    #[test]
    fn prerelease_change_invisible_when_height_in_build_slot() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit(&[], &[("version.json", r#"{"version": "1.2-alpha"}"#)]);
        let c2 = repo.commit_from(c1, &[("version.json", r#"{"version": "1.2-beta"}"#)]);
        // Height sits in the build slot, so only major/minor gate the count;
        // the prerelease change is invisible to it.
        assert_eq!(calculate(&repo, "", c2).unwrap(), 2);
    }

    #[test]
    fn prerelease_height_position_requires_full_match() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit(&[], &[("version.json", r#"{"version": "1.0-alpha.{height}"}"#)]);
        let c2 = repo.commit_from(c1, &[("version.json", r#"{"version": "1.0-beta.{height}"}"#)]);
        let c3 = repo.commit_from(c2, &[("a.txt", "x")]);
        assert_eq!(calculate(&repo, "", c3).unwrap(), 2);
    }

    #[test]
    fn merge_takes_max_over_parents() {
        let mut repo = FakeRepo::new();
        let base = repo.commit(&[], &[("version.json", r#"{"version": "1.0"}"#)]);
        let left1 = repo.commit_from(base, &[("l1.txt", "x")]);
        let left2 = repo.commit_from(left1, &[("l2.txt", "x")]);
        let right = repo.commit_from(base, &[("r.txt", "x")]);
        let merge = repo.merge(&[left2, right], &[("m.txt", "x")]);
        // Longest path: merge -> left2 -> left1 -> base = 4 counted commits.
        assert_eq!(calculate(&repo, "", merge).unwrap(), 4);
    }

    #[test]
    fn excluded_paths_do_not_count() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit(
            &[],
            &[("version.json", r#"{"version": "2.0", "pathFilters": [":!docs"]}"#)],
        );
        let c2 = repo.commit_from(c1, &[("docs/readme.md", "hello")]);
        let c3 = repo.commit_from(c2, &[("src/lib.rs", "code")]);
        assert_eq!(calculate(&repo, "", c2).unwrap(), 1);
        assert_eq!(calculate(&repo, "", c3).unwrap(), 2);
    }

    #[test]
    fn include_filter_restricts_counting() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit(
            &[],
            &[("version.json", r#"{"version": "2.0", "pathFilters": ["./src"]}"#)],
        );
        let c2 = repo.commit_from(c1, &[("docs/readme.md", "hello")]);
        let c3 = repo.commit_from(c2, &[("src/lib.rs", "code")]);
        // The root commit touches version.json outside src, so only commits
        // changing src count.
        assert_eq!(calculate(&repo, "", c1).unwrap(), 0);
        assert_eq!(calculate(&repo, "", c2).unwrap(), 0);
        assert_eq!(calculate(&repo, "", c3).unwrap(), 1);
    }

    #[test]
    fn commit_without_configuration_stops_the_count() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit(&[], &[("a.txt", "no config yet")]);
        let c2 = repo.commit_from(c1, &[("version.json", r#"{"version": "1.0"}"#)]);
        let c3 = repo.commit_from(c2, &[("a.txt", "more")]);
        assert_eq!(calculate(&repo, "", c3).unwrap(), 2);
    }

    #[test]
    fn empty_commit_adds_no_height() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit(&[], &[("version.json", r#"{"version": "1.0"}"#)]);
        let c2 = repo.commit_from(c1, &[]);
        assert_eq!(calculate(&repo, "", c2).unwrap(), 1);
    }

    #[test]
    fn shallow_truncation_surfaces_distinct_error() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit(&[], &[("version.json", r#"{"version": "1.0"}"#)]);
        let c2 = repo.commit_from(c1, &[("a.txt", "x")]);
        repo.truncate_below(c2);
        repo.set_shallow(true);
        let err = calculate(&repo, "", c2).unwrap_err();
        assert!(matches!(err, GraphverError::ShallowClone));
    }

    #[test]
    fn missing_object_without_shallow_flag_is_not_masked() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit(&[], &[("version.json", r#"{"version": "1.0"}"#)]);
        let c2 = repo.commit_from(c1, &[("a.txt", "x")]);
        repo.truncate_below(c2);
        let err = calculate(&repo, "", c2).unwrap_err();
        assert!(matches!(err, GraphverError::MissingObject(_)));
    }

    #[test]
    fn cancellation_interrupts_the_walk() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit(&[], &[("version.json", r#"{"version": "1.0"}"#)]);
        let opts = options(r#"{"version": "1.0"}"#);
        let token = CancellationToken::new();
        token.cancel();
        let mut calc = HeightCalculator::new(&repo, "", &opts, token).unwrap();
        assert!(matches!(calc.calculate(c1), Err(GraphverError::Canceled)));
    }

    #[test]
    fn working_tree_override_detection() {
        let committed = SemanticVersion::parse("1.2").unwrap();
        let bumped = SemanticVersion::parse("1.3").unwrap();
        let reformatted = SemanticVersion::parse("1.2").unwrap();
        assert!(working_tree_overrides_height(Some(&committed), Some(&bumped)));
        assert!(!working_tree_overrides_height(Some(&committed), Some(&reformatted)));
        assert!(!working_tree_overrides_height(None, Some(&bumped)));
        let pre_a = SemanticVersion::parse("1.2-alpha.{height}").unwrap();
        let pre_b = SemanticVersion::parse("1.2-beta.{height}").unwrap();
        assert!(working_tree_overrides_height(Some(&pre_a), Some(&pre_b)));
    }
}
