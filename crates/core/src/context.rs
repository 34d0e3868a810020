//! The abstraction over the repository the version engine reads from.
//!
//! The engine never touches the object store directly. Everything it needs
//! from a repository is expressed by [`GitContext`], which a backend (see
//! [`crate::git`]) implements and unit tests replace with an in-memory
//! double (see [`crate::testing`]).

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{GraphverError, Result};

/// A full 20-byte commit identifier.
///
/// Only SHA-1 sized ids participate in the numeric encoding; the first 16
/// bits of the id are what ends up in the 4-integer version.
///
/// # Examples
/// ```rust
/// use graphver::CommitId;
///
/// let id: CommitId = "abcd0123abcd0123abcd0123abcd0123abcd0123".parse()?;
/// assert_eq!(id.first_u16(), 0xabcd);
/// assert!(id.starts_with_u16(0xabcd, 0xffff));
/// # Ok::<_, graphver::GraphverError>(())
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitId([u8; 20]);

impl CommitId {
    /// Wrap raw id bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Parse a 40-character hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != 40 {
            return Err(GraphverError::InvalidCommitId(s.to_string()));
        }
        let mut bytes = [0u8; 20];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = hex_nibble(chunk[0]).ok_or_else(|| GraphverError::InvalidCommitId(s.to_string()))?;
            let lo = hex_nibble(chunk[1]).ok_or_else(|| GraphverError::InvalidCommitId(s.to_string()))?;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }

    /// The raw id bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// The full lowercase hex form.
    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(40);
        for b in &self.0 {
            s.push_str(&format!("{:02x}", b));
        }
        s
    }

    /// The first 16 bits of the id, big-endian.
    pub fn first_u16(&self) -> u16 {
        u16::from_be_bytes([self.0[0], self.0[1]])
    }

    /// Whether the first 16 bits match `leading` under `mask`.
    ///
    /// A mask of `0xFFFE` tolerates the legacy clamp of `0xFFFF` to `0xFFFE`.
    pub fn starts_with_u16(&self, leading: u16, mask: u16) -> bool {
        self.first_u16() & mask == leading & mask
    }
}

fn hex_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitId({})", self.to_hex())
    }
}

impl std::str::FromStr for CommitId {
    type Err = GraphverError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl serde::Serialize for CommitId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for CommitId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Cooperative cancellation flag shared across one computation.
///
/// The height walk checks the token at every memoization lookup, so a long
/// traversal can be abandoned between commits.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A token that never fires unless [`cancel`](Self::cancel) is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Error out if cancellation has been requested.
    pub fn check(&self) -> Result<()> {
        if self.is_canceled() {
            Err(GraphverError::Canceled)
        } else {
            Ok(())
        }
    }
}

/// Read-only view of a repository, as consumed by the version engine.
///
/// Paths handed to and returned from this trait are repo-relative and use
/// `/` separators regardless of platform. Implementations must signal a
/// missing object with [`GraphverError::MissingObject`] so the height walk
/// can distinguish a shallow-clone truncation from other failures.
pub trait GitContext {
    /// Absolute path of the working tree, if there is one.
    fn working_tree_path(&self) -> Option<&Path>;

    /// Absolute path of the `.git` directory, if there is one.
    fn dot_git_path(&self) -> Option<&Path>;

    /// Whether a repository was found at all.
    fn is_repository(&self) -> bool;

    /// Whether the repository history is truncated by a shallow clone.
    fn is_shallow(&self) -> bool;

    /// The commit HEAD points at, if any.
    fn head_commit_id(&self) -> Option<CommitId>;

    /// The commit selected for inspection (HEAD until
    /// [`select_commit`](Self::select_commit) changes it).
    fn selected_commit_id(&self) -> Option<CommitId>;

    /// Whether the selected commit is HEAD.
    fn is_head(&self) -> bool {
        match (self.head_commit_id(), self.selected_commit_id()) {
            (Some(h), Some(s)) => h == s,
            _ => false,
        }
    }

    /// Canonical name of the ref HEAD is attached to (e.g.
    /// `refs/heads/main`), if HEAD is not detached.
    fn head_canonical_name(&self) -> Option<String>;

    /// Author date of a commit as seconds since the Unix epoch.
    fn commit_date(&self, commit: CommitId) -> Result<Option<i64>>;

    /// Select the commit named by `committish`. Returns false if nothing by
    /// that name exists.
    fn select_commit(&mut self, committish: &str) -> Result<bool>;

    /// Read a blob at a repo-relative path inside the given commit's tree.
    fn read_blob_at_path(&self, commit: CommitId, repo_rel_path: &str) -> Result<Option<Vec<u8>>>;

    /// Names of the entries of the tree at a repo-relative directory inside
    /// the given commit, or None when the directory does not exist there.
    fn tree_entry_names(&self, commit: CommitId, repo_rel_dir: &str) -> Result<Option<Vec<String>>>;

    /// Parent commit ids in repo-native order.
    fn parents_of(&self, commit: CommitId) -> Result<Vec<CommitId>>;

    /// Repo-relative paths that differ between a parent tree and a child
    /// tree. A `None` parent diffs against the empty tree. `scope` limits
    /// the walk to paths under any of the given repo-relative prefixes.
    fn tree_diff_paths(
        &self,
        parent: Option<CommitId>,
        child: CommitId,
        scope: Option<&[String]>,
    ) -> Result<Vec<String>>;

    /// A hex prefix of the id that is unique within the repository and at
    /// least `min_len` characters long.
    fn short_unique_id(&self, commit: CommitId, min_len: usize) -> Result<String>;

    /// All commits reachable from any named ref. Order is unspecified and
    /// entries may repeat; callers deduplicate.
    fn reachable_commits(&self) -> Result<Vec<CommitId>>;

    /// The `core.ignorecase` repository setting, when known.
    fn ignore_case(&self) -> Option<bool>;
}
