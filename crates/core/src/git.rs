//! Git repository access backed by `gix`.
//!
//! This is the production [`GitContext`]: discovery, object reads, tree
//! walks, and ref enumeration. Pack decoding and delta resolution live in
//! `gix`; nothing here touches the object store below the object level.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use gix::prelude::ObjectIdExt as _;

use crate::context::{CommitId, GitContext};
use crate::error::{GraphverError, Result};

/// Git repository wrapper implementing [`GitContext`].
pub struct Repository {
    inner: gix::Repository,
    workdir: Option<PathBuf>,
    git_dir: PathBuf,
    is_shallow: bool,
    selected: Option<CommitId>,
}

impl Repository {
    /// Discover and open a Git repository containing the given directory.
    /// The selected commit starts at HEAD.
    pub fn discover(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let repo = gix::discover(&path)
            .map_err(|e| GraphverError::GitRepoNotFound(format!("{}: {}", path.display(), e)))?;
        let is_shallow = repo.is_shallow();
        let workdir = repo.workdir().map(Path::to_path_buf);
        let git_dir = repo.git_dir().to_path_buf();
        let mut this = Self {
            inner: repo,
            workdir,
            git_dir,
            is_shallow,
            selected: None,
        };
        this.selected = this.resolve_head();
        Ok(this)
    }

    /// Whether the given directory is inside a Git repository.
    pub fn is_git_directory(path: impl Into<PathBuf>) -> bool {
        gix::discover(path.into()).is_ok()
    }

    /// The inner gix repository.
    pub fn inner(&self) -> &gix::Repository {
        &self.inner
    }

    fn resolve_head(&self) -> Option<CommitId> {
        let mut head = self.inner.head().ok()?;
        match head.try_peel_to_id() {
            Ok(Some(id)) => from_gix(id.detach()).ok(),
            Ok(None) | Err(_) => None,
        }
    }

    fn find_object(&self, id: gix::ObjectId) -> Result<gix::Object<'_>> {
        match self.inner.try_find_object(id) {
            Ok(Some(object)) => Ok(object),
            Ok(None) => Err(GraphverError::MissingObject(id.to_string())),
            Err(e) => Err(GraphverError::Git(format!("failed to read object {id}: {e}"))),
        }
    }

    fn commit_tree_id(&self, commit: CommitId) -> Result<gix::ObjectId> {
        let object = self.find_object(to_gix(commit))?;
        let commit = object
            .try_into_commit()
            .map_err(|e| GraphverError::Git(format!("object {commit} is not a commit: {e}")))?;
        let tree_id = commit
            .tree_id()
            .map_err(|e| GraphverError::Git(format!("failed to read tree of {commit:?}: {e}")))?;
        Ok(tree_id.detach())
    }

    /// Entries of a tree, keyed by name: `(object id, is_tree)`.
    fn tree_entries(&self, tree_id: gix::ObjectId) -> Result<BTreeMap<String, (gix::ObjectId, bool)>> {
        let object = self.find_object(tree_id)?;
        let tree = object
            .try_into_tree()
            .map_err(|e| GraphverError::Git(format!("object {tree_id} is not a tree: {e}")))?;
        let mut entries = BTreeMap::new();
        for entry in tree.iter() {
            let entry = entry.map_err(|e| GraphverError::Git(format!("corrupt tree {tree_id}: {e}")))?;
            let name = entry.filename().to_string();
            let mode = entry.mode();
            entries.insert(name, (entry.id().detach(), mode.is_tree()));
        }
        Ok(entries)
    }

    /// The tree object id of a repo-relative directory inside a commit, or
    /// None when the path does not exist or is not a directory there.
    fn tree_id_at_dir(&self, commit: CommitId, repo_rel_dir: &str) -> Result<Option<gix::ObjectId>> {
        let mut tree_id = self.commit_tree_id(commit)?;
        if repo_rel_dir.is_empty() {
            return Ok(Some(tree_id));
        }
        for segment in repo_rel_dir.split('/') {
            let entries = self.tree_entries(tree_id)?;
            match entries.get(segment) {
                Some((id, true)) => tree_id = *id,
                _ => return Ok(None),
            }
        }
        Ok(Some(tree_id))
    }

    fn diff_tree_pair(
        &self,
        old: Option<gix::ObjectId>,
        new: Option<gix::ObjectId>,
        prefix: &str,
        scope: Option<&[String]>,
        out: &mut Vec<String>,
    ) -> Result<()> {
        if old == new {
            return Ok(());
        }
        let old_entries = match old {
            Some(id) => self.tree_entries(id)?,
            None => BTreeMap::new(),
        };
        let new_entries = match new {
            Some(id) => self.tree_entries(id)?,
            None => BTreeMap::new(),
        };
        let names: Vec<&String> = old_entries
            .keys()
            .chain(new_entries.keys().filter(|k| !old_entries.contains_key(*k)))
            .collect();
        for name in names {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };
            let old_entry = old_entries.get(name).copied();
            let new_entry = new_entries.get(name).copied();
            if old_entry == new_entry {
                continue;
            }
            let old_tree = old_entry.filter(|(_, is_tree)| *is_tree).map(|(id, _)| id);
            let new_tree = new_entry.filter(|(_, is_tree)| *is_tree).map(|(id, _)| id);
            let old_blob = old_entry.filter(|(_, is_tree)| !*is_tree);
            let new_blob = new_entry.filter(|(_, is_tree)| !*is_tree);

            if (old_tree.is_some() || new_tree.is_some()) && subtree_intersects_scope(&path, scope) {
                self.diff_tree_pair(old_tree, new_tree, &path, scope, out)?;
            }
            if (old_blob.is_some() || new_blob.is_some())
                && old_blob != new_blob
                && path_in_scope(&path, scope)
            {
                out.push(path);
            }
        }
        Ok(())
    }
}

fn path_in_scope(path: &str, scope: Option<&[String]>) -> bool {
    scope.map_or(true, |prefixes| {
        prefixes
            .iter()
            .any(|prefix| path == prefix || path.starts_with(&format!("{prefix}/")))
    })
}

/// A subtree is worth descending into when its path could still reach a
/// scoped prefix in either direction.
fn subtree_intersects_scope(path: &str, scope: Option<&[String]>) -> bool {
    scope.map_or(true, |prefixes| {
        prefixes.iter().any(|prefix| {
            path == prefix
                || path.starts_with(&format!("{prefix}/"))
                || prefix.starts_with(&format!("{path}/"))
        })
    })
}

fn to_gix(id: CommitId) -> gix::ObjectId {
    gix::ObjectId::from(*id.as_bytes())
}

fn from_gix(id: gix::ObjectId) -> Result<CommitId> {
    let bytes: [u8; 20] = id
        .as_slice()
        .try_into()
        .map_err(|_| GraphverError::InvalidCommitId(id.to_string()))?;
    Ok(CommitId::from_bytes(bytes))
}

impl GitContext for Repository {
    fn working_tree_path(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }

    fn dot_git_path(&self) -> Option<&Path> {
        Some(&self.git_dir)
    }

    fn is_repository(&self) -> bool {
        true
    }

    fn is_shallow(&self) -> bool {
        self.is_shallow
    }

    fn head_commit_id(&self) -> Option<CommitId> {
        self.resolve_head()
    }

    fn selected_commit_id(&self) -> Option<CommitId> {
        self.selected
    }

    fn head_canonical_name(&self) -> Option<String> {
        let name = self.inner.head_name().ok()??;
        Some(name.as_bstr().to_string())
    }

    fn commit_date(&self, commit: CommitId) -> Result<Option<i64>> {
        let object = self.find_object(to_gix(commit))?;
        let commit = object
            .try_into_commit()
            .map_err(|e| GraphverError::Git(format!("object is not a commit: {e}")))?;
        match commit.time() {
            Ok(time) => Ok(Some(time.seconds)),
            Err(_) => Ok(None),
        }
    }

    fn select_commit(&mut self, committish: &str) -> Result<bool> {
        let Ok(id) = self.inner.rev_parse_single(committish) else {
            return Ok(false);
        };
        let object = id
            .object()
            .map_err(|e| GraphverError::Git(format!("failed to read {committish}: {e}")))?;
        let commit = object
            .peel_to_kind(gix::object::Kind::Commit)
            .map_err(|e| GraphverError::Git(format!("{committish} does not name a commit: {e}")))?;
        self.selected = Some(from_gix(commit.id)?);
        Ok(true)
    }

    fn read_blob_at_path(&self, commit: CommitId, repo_rel_path: &str) -> Result<Option<Vec<u8>>> {
        let (dir, name) = match repo_rel_path.rfind('/') {
            Some(i) => (&repo_rel_path[..i], &repo_rel_path[i + 1..]),
            None => ("", repo_rel_path),
        };
        let Some(tree_id) = self.tree_id_at_dir(commit, dir)? else {
            return Ok(None);
        };
        let entries = self.tree_entries(tree_id)?;
        match entries.get(name) {
            Some((id, false)) => {
                let object = self.find_object(*id)?;
                Ok(Some(object.data.clone()))
            }
            _ => Ok(None),
        }
    }

    fn tree_entry_names(&self, commit: CommitId, repo_rel_dir: &str) -> Result<Option<Vec<String>>> {
        let Some(tree_id) = self.tree_id_at_dir(commit, repo_rel_dir)? else {
            return Ok(None);
        };
        let entries = self.tree_entries(tree_id)?;
        Ok(Some(entries.into_keys().collect()))
    }

    fn parents_of(&self, commit: CommitId) -> Result<Vec<CommitId>> {
        let object = self.find_object(to_gix(commit))?;
        let parsed = object
            .try_into_commit()
            .map_err(|e| GraphverError::Git(format!("object is not a commit: {e}")))?;
        parsed
            .parent_ids()
            .map(|id| from_gix(id.detach()))
            .collect()
    }

    fn tree_diff_paths(
        &self,
        parent: Option<CommitId>,
        child: CommitId,
        scope: Option<&[String]>,
    ) -> Result<Vec<String>> {
        let old = match parent {
            Some(p) => Some(self.commit_tree_id(p)?),
            None => None,
        };
        let new = Some(self.commit_tree_id(child)?);
        let mut out = Vec::new();
        self.diff_tree_pair(old, new, "", scope, &mut out)?;
        Ok(out)
    }

    fn short_unique_id(&self, commit: CommitId, min_len: usize) -> Result<String> {
        let id = to_gix(commit).attach(&self.inner);
        let unique_len = id.shorten().map(|prefix| prefix.hex_len()).unwrap_or(7);
        let len = unique_len.max(min_len).clamp(4, 40);
        Ok(commit.to_hex()[..len].to_string())
    }

    fn reachable_commits(&self) -> Result<Vec<CommitId>> {
        let refs = self
            .inner
            .references()
            .map_err(|e| GraphverError::Git(format!("failed to read references: {e}")))?;
        let iter = refs
            .all()
            .map_err(|e| GraphverError::Git(format!("failed to iterate references: {e}")))?;
        let mut tips = Vec::new();
        for reference in iter.flatten() {
            let mut reference = reference;
            if let Ok(id) = reference.peel_to_id_in_place() {
                if let Ok(id) = from_gix(id.detach()) {
                    tips.push(id);
                }
            }
        }

        let mut seen = std::collections::HashSet::new();
        let mut queue = tips;
        let mut out = Vec::new();
        while let Some(id) = queue.pop() {
            if !seen.insert(id) {
                continue;
            }
            // Tips may be peeled to trees or blobs (e.g. odd tags); only
            // commits join the listing.
            let Ok(Some(object)) = self.inner.try_find_object(to_gix(id)) else {
                continue;
            };
            let Ok(commit) = object.try_into_commit() else {
                continue;
            };
            out.push(id);
            for parent in commit.parent_ids() {
                if let Ok(parent) = from_gix(parent.detach()) {
                    queue.push(parent);
                }
            }
        }
        Ok(out)
    }

    fn ignore_case(&self) -> Option<bool> {
        self.inner.config_snapshot().boolean("core.ignorecase")
    }
}
