//! A deterministic in-memory repository for tests and benches.
//!
//! Commits carry full file snapshots; diffs are computed by comparing
//! snapshots, so the double behaves like a content-addressed store without
//! one. Ids are minted from a counter, with an escape hatch to pin the
//! leading bytes when a test needs a particular 16-bit prefix.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use crate::context::{CommitId, GitContext};
use crate::error::{GraphverError, Result};

struct FakeCommit {
    parents: Vec<CommitId>,
    files: BTreeMap<String, Vec<u8>>,
    date: i64,
}

/// In-memory [`GitContext`] double.
pub struct FakeRepo {
    commits: HashMap<CommitId, FakeCommit>,
    missing: HashSet<CommitId>,
    order: Vec<CommitId>,
    refs: Vec<(String, CommitId)>,
    head: Option<CommitId>,
    selected: Option<CommitId>,
    head_ref: Option<String>,
    shallow: bool,
    ignore_case: Option<bool>,
    next_seq: u64,
    next_date: i64,
}

impl Default for FakeRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRepo {
    pub fn new() -> Self {
        Self {
            commits: HashMap::new(),
            missing: HashSet::new(),
            order: Vec::new(),
            refs: Vec::new(),
            head: None,
            selected: None,
            head_ref: Some("refs/heads/main".to_string()),
            shallow: false,
            ignore_case: None,
            next_seq: 1,
            next_date: 1_700_000_000,
        }
    }

    fn mint_id(&mut self, leading: Option<u16>) -> CommitId {
        let seq = self.next_seq;
        self.next_seq += 1;
        let mut bytes = [0u8; 20];
        // A cheap multiplicative scramble keeps ids distinct and stable.
        let mut state = seq.wrapping_mul(0x9e37_79b9_7f4a_7c15).wrapping_add(seq);
        for chunk in bytes.chunks_mut(8) {
            state = state.wrapping_mul(0x2545_f491_4f6c_dd1d).wrapping_add(1);
            for (i, b) in chunk.iter_mut().enumerate() {
                *b = (state >> (i * 8)) as u8;
            }
        }
        if let Some(leading) = leading {
            bytes[0] = (leading >> 8) as u8;
            bytes[1] = leading as u8;
        }
        CommitId::from_bytes(bytes)
    }

    fn insert_commit(&mut self, id: CommitId, parents: Vec<CommitId>, files: &[(&str, &str)]) {
        let mut snapshot = parents
            .first()
            .and_then(|p| self.commits.get(p))
            .map(|c| c.files.clone())
            .unwrap_or_default();
        for (path, content) in files {
            snapshot.insert((*path).to_string(), content.as_bytes().to_vec());
        }
        let date = self.next_date;
        self.next_date += 60;
        self.commits.insert(
            id,
            FakeCommit {
                parents,
                files: snapshot,
                date,
            },
        );
        self.order.push(id);
        self.head = Some(id);
        self.selected = Some(id);
        self.set_ref("refs/heads/main", id);
    }

    /// Create a commit. The snapshot is the first parent's snapshot with
    /// `files` overlaid; pass an empty parent list for a root commit.
    pub fn commit(&mut self, parents: &[CommitId], files: &[(&str, &str)]) -> CommitId {
        let id = self.mint_id(None);
        self.insert_commit(id, parents.to_vec(), files);
        id
    }

    /// Create a commit whose id starts with the given 16 bits.
    pub fn commit_with_leading(
        &mut self,
        parents: &[CommitId],
        files: &[(&str, &str)],
        leading: u16,
    ) -> CommitId {
        let id = self.mint_id(Some(leading));
        self.insert_commit(id, parents.to_vec(), files);
        id
    }

    pub fn commit_from(&mut self, parent: CommitId, files: &[(&str, &str)]) -> CommitId {
        self.commit(&[parent], files)
    }

    pub fn merge(&mut self, parents: &[CommitId], files: &[(&str, &str)]) -> CommitId {
        self.commit(parents, files)
    }

    /// Delete a path in a new commit.
    pub fn commit_delete(&mut self, parent: CommitId, path: &str) -> CommitId {
        let id = self.mint_id(None);
        self.insert_commit(id, vec![parent], &[]);
        if let Some(commit) = self.commits.get_mut(&id) {
            commit.files.remove(path);
        }
        id
    }

    pub fn set_ref(&mut self, name: &str, id: CommitId) {
        if let Some(entry) = self.refs.iter_mut().find(|(n, _)| n == name) {
            entry.1 = id;
        } else {
            self.refs.push((name.to_string(), id));
        }
    }

    pub fn set_head(&mut self, id: CommitId, ref_name: Option<&str>) {
        self.head = Some(id);
        self.selected = Some(id);
        self.head_ref = ref_name.map(str::to_string);
        if let Some(name) = ref_name {
            self.set_ref(name, id);
        }
    }

    pub fn set_shallow(&mut self, shallow: bool) {
        self.shallow = shallow;
    }

    pub fn set_ignore_case(&mut self, ignore_case: Option<bool>) {
        self.ignore_case = ignore_case;
    }

    /// Drop the objects of every proper ancestor of `tip`, simulating a
    /// truncated clone. The ids stay known (children still name them) but
    /// any object access fails.
    pub fn truncate_below(&mut self, tip: CommitId) {
        let mut queue: Vec<CommitId> = self
            .commits
            .get(&tip)
            .map(|c| c.parents.clone())
            .unwrap_or_default();
        let mut doomed = HashSet::new();
        while let Some(id) = queue.pop() {
            if doomed.insert(id) {
                if let Some(commit) = self.commits.get(&id) {
                    queue.extend(commit.parents.iter().copied());
                }
            }
        }
        for id in &doomed {
            self.commits.remove(id);
        }
        self.missing.extend(doomed);
    }

    fn lookup(&self, id: CommitId) -> Result<&FakeCommit> {
        self.commits
            .get(&id)
            .ok_or_else(|| GraphverError::MissingObject(id.to_hex()))
    }
}

impl GitContext for FakeRepo {
    fn working_tree_path(&self) -> Option<&Path> {
        None
    }

    fn dot_git_path(&self) -> Option<&Path> {
        None
    }

    fn is_repository(&self) -> bool {
        true
    }

    fn is_shallow(&self) -> bool {
        self.shallow
    }

    fn head_commit_id(&self) -> Option<CommitId> {
        self.head
    }

    fn selected_commit_id(&self) -> Option<CommitId> {
        self.selected
    }

    fn head_canonical_name(&self) -> Option<String> {
        self.head_ref.clone()
    }

    fn commit_date(&self, commit: CommitId) -> Result<Option<i64>> {
        Ok(Some(self.lookup(commit)?.date))
    }

    fn select_commit(&mut self, committish: &str) -> Result<bool> {
        if let Some((_, id)) = self.refs.iter().find(|(name, _)| {
            name == committish || name.strip_prefix("refs/heads/") == Some(committish)
        }) {
            self.selected = Some(*id);
            return Ok(true);
        }
        let matches: Vec<CommitId> = self
            .order
            .iter()
            .filter(|id| id.to_hex().starts_with(committish))
            .copied()
            .collect();
        match matches.as_slice() {
            [id] => {
                self.selected = Some(*id);
                Ok(true)
            }
            [] => Ok(false),
            _ => Err(GraphverError::Git(format!("ambiguous committish: {committish}"))),
        }
    }

    fn read_blob_at_path(&self, commit: CommitId, repo_rel_path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lookup(commit)?.files.get(repo_rel_path).cloned())
    }

    fn tree_entry_names(&self, commit: CommitId, repo_rel_dir: &str) -> Result<Option<Vec<String>>> {
        let commit = self.lookup(commit)?;
        let prefix = if repo_rel_dir.is_empty() {
            String::new()
        } else {
            format!("{repo_rel_dir}/")
        };
        let mut names: Vec<String> = commit
            .files
            .keys()
            .filter_map(|path| path.strip_prefix(&prefix))
            .map(|rest| rest.split('/').next().unwrap_or(rest).to_string())
            .collect();
        names.sort();
        names.dedup();
        if names.is_empty() && !repo_rel_dir.is_empty() {
            return Ok(None);
        }
        Ok(Some(names))
    }

    fn parents_of(&self, commit: CommitId) -> Result<Vec<CommitId>> {
        Ok(self.lookup(commit)?.parents.clone())
    }

    fn tree_diff_paths(
        &self,
        parent: Option<CommitId>,
        child: CommitId,
        scope: Option<&[String]>,
    ) -> Result<Vec<String>> {
        let child_files = &self.lookup(child)?.files;
        let empty = BTreeMap::new();
        let parent_files = match parent {
            Some(p) => &self.lookup(p)?.files,
            None => &empty,
        };
        let in_scope = |path: &str| {
            scope.map_or(true, |prefixes| {
                prefixes.iter().any(|prefix| {
                    prefix.is_empty()
                        || path == prefix
                        || path.starts_with(&format!("{prefix}/"))
                })
            })
        };
        let mut changed = Vec::new();
        for (path, content) in child_files {
            if parent_files.get(path) != Some(content) && in_scope(path) {
                changed.push(path.clone());
            }
        }
        for path in parent_files.keys() {
            if !child_files.contains_key(path) && in_scope(path) {
                changed.push(path.clone());
            }
        }
        Ok(changed)
    }

    fn short_unique_id(&self, commit: CommitId, min_len: usize) -> Result<String> {
        let hex = commit.to_hex();
        let mut len = min_len.clamp(4, 40);
        let others: Vec<String> = self
            .order
            .iter()
            .filter(|id| **id != commit)
            .map(|id| id.to_hex())
            .collect();
        while len < 40 && others.iter().any(|other| other.starts_with(&hex[..len])) {
            len += 1;
        }
        Ok(hex[..len].to_string())
    }

    fn reachable_commits(&self) -> Result<Vec<CommitId>> {
        let mut seen = HashSet::new();
        let mut queue: Vec<CommitId> = self.refs.iter().map(|(_, id)| *id).collect();
        let mut out = Vec::new();
        while let Some(id) = queue.pop() {
            if !seen.insert(id) {
                continue;
            }
            out.push(id);
            if let Some(commit) = self.commits.get(&id) {
                queue.extend(commit.parents.iter().copied());
            }
        }
        Ok(out)
    }

    fn ignore_case(&self) -> Option<bool> {
        self.ignore_case
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_overlay_first_parent() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit(&[], &[("a.txt", "one"), ("b.txt", "two")]);
        let c2 = repo.commit_from(c1, &[("a.txt", "changed")]);
        let diff = repo.tree_diff_paths(Some(c1), c2, None).unwrap();
        assert_eq!(diff, vec!["a.txt".to_string()]);
    }

    #[test]
    fn root_commit_diffs_against_empty_tree() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit(&[], &[("a.txt", "one")]);
        let diff = repo.tree_diff_paths(None, c1, None).unwrap();
        assert_eq!(diff, vec!["a.txt".to_string()]);
    }

    #[test]
    fn deletion_shows_in_diff() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit(&[], &[("a.txt", "one")]);
        let c2 = repo.commit_delete(c1, "a.txt");
        let diff = repo.tree_diff_paths(Some(c1), c2, None).unwrap();
        assert_eq!(diff, vec!["a.txt".to_string()]);
    }

    #[test]
    fn scope_limits_diff() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit(&[], &[("src/a.rs", "x"), ("docs/b.md", "y")]);
        let scope = vec!["src".to_string()];
        let diff = repo.tree_diff_paths(None, c1, Some(&scope)).unwrap();
        assert_eq!(diff, vec!["src/a.rs".to_string()]);
    }

    #[test]
    fn pinned_leading_bytes() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit_with_leading(&[], &[("a", "b")], 0xabcd);
        assert_eq!(c1.first_u16(), 0xabcd);
    }

    #[test]
    fn select_by_ref_and_prefix() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit(&[], &[("a", "1")]);
        let _c2 = repo.commit_from(c1, &[("a", "2")]);
        assert!(repo.select_commit("main").unwrap());
        assert_eq!(repo.selected_commit_id(), repo.head_commit_id());
        let prefix = &c1.to_hex()[..12];
        assert!(repo.select_commit(prefix).unwrap());
        assert_eq!(repo.selected_commit_id(), Some(c1));
        assert!(!repo.select_commit("doesnotexist").unwrap());
    }

    #[test]
    fn tree_entry_names_lists_direct_children() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit(&[], &[("src/a.rs", "x"), ("src/sub/b.rs", "y"), ("top.txt", "z")]);
        let root = repo.tree_entry_names(c1, "").unwrap().unwrap();
        assert_eq!(root, vec!["src".to_string(), "top.txt".to_string()]);
        let src = repo.tree_entry_names(c1, "src").unwrap().unwrap();
        assert_eq!(src, vec!["a.rs".to_string(), "sub".to_string()]);
        assert!(repo.tree_entry_names(c1, "nope").unwrap().is_none());
    }
}
