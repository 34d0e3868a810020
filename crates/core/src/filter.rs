//! Path filters restricting which tree changes count toward version height.
//!
//! Filter specs come from the `pathFilters` list of a `version.json` and are
//! resolved against the directory of the file that declared them. Paths are
//! kept repo-relative with `/` separators for matching against diff output.

use serde::{Deserialize, Serialize};

use crate::error::{GraphverError, Result};
use crate::options::VersionOptions;

/// A single parsed path filter.
///
/// # Examples
/// ```rust
/// use graphver::FilterPath;
///
/// let filter = FilterPath::parse(":!docs", "", true)?;
/// assert!(filter.is_exclude());
/// assert!(filter.excludes("docs/readme.md"));
/// assert!(!filter.excludes("src/lib.rs"));
/// # Ok::<_, graphver::GraphverError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterPath {
    #[serde(rename = "repoRelativePath")]
    repo_relative_path: String,
    #[serde(rename = "isExclude")]
    is_exclude: bool,
    #[serde(rename = "caseSensitive")]
    case_sensitive: bool,
}

impl FilterPath {
    /// Parse a filter spec declared in the file at repo-relative directory
    /// `relative_to_dir` (empty string for the repo root).
    ///
    /// Grammar: a leading `:` introduces a prefix marker. `:/p` is a
    /// repo-root-relative include, `:^p` and `:!p` are excludes relative to
    /// the declaring directory. A path rooted at `/` is repo-root-relative;
    /// anything else is an include relative to the declaring directory.
    pub fn parse(spec: &str, relative_to_dir: &str, case_sensitive: bool) -> Result<Self> {
        if spec.is_empty() {
            return Err(GraphverError::InvalidPathFilter(spec.to_string()));
        }

        let (is_exclude, root_relative, rest) = if let Some(rest) = spec.strip_prefix(':') {
            match rest.chars().next() {
                Some('/') => (false, true, &rest[1..]),
                Some('^') | Some('!') => (true, false, &rest[1..]),
                _ => return Err(GraphverError::InvalidPathFilter(spec.to_string())),
            }
        } else if let Some(rest) = spec.strip_prefix('/') {
            (false, true, rest)
        } else {
            (false, false, spec)
        };

        let base = if root_relative { "" } else { relative_to_dir };
        let repo_relative_path = resolve_repo_relative(base, rest)
            .ok_or_else(|| GraphverError::InvalidPathFilter(spec.to_string()))?;

        Ok(Self {
            repo_relative_path,
            is_exclude,
            case_sensitive,
        })
    }

    /// The canonical repo-relative path, `/`-separated, no trailing slash.
    /// Empty means the repo root.
    pub fn repo_relative_path(&self) -> &str {
        &self.repo_relative_path
    }

    pub fn is_exclude(&self) -> bool {
        self.is_exclude
    }

    pub fn is_include(&self) -> bool {
        !self.is_exclude
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Whether this include filter names the repo root itself.
    pub fn is_root_include(&self) -> bool {
        self.is_include() && self.repo_relative_path.is_empty()
    }

    /// For an exclude filter: whether `path` is the filtered path or lives
    /// under it. Always false for includes.
    pub fn excludes(&self, path: &str) -> bool {
        self.is_exclude && self.covers(path)
    }

    /// For an include filter: whether `path` falls under the filter.
    pub fn includes(&self, path: &str) -> bool {
        self.is_include() && (self.repo_relative_path.is_empty() || self.covers(path))
    }

    fn covers(&self, path: &str) -> bool {
        let (own, other) = if self.case_sensitive {
            (self.repo_relative_path.clone(), path.to_string())
        } else {
            (self.repo_relative_path.to_lowercase(), path.to_lowercase())
        };
        other == own || (other.len() > own.len() && other.starts_with(&own) && other.as_bytes()[own.len()] == b'/')
    }
}

/// Join `rest` onto `base` and resolve `.`/`..` segments. Returns None when
/// the path would escape the repo root.
fn resolve_repo_relative(base: &str, rest: &str) -> Option<String> {
    let rest = rest.replace('\\', "/");
    let mut segments: Vec<&str> = if base.is_empty() {
        Vec::new()
    } else {
        base.split('/').collect()
    };
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

/// The ordered filter list derived from one configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathFilterSet {
    filters: Vec<FilterPath>,
}

impl PathFilterSet {
    pub fn new(filters: Vec<FilterPath>) -> Self {
        Self { filters }
    }

    /// Build the filter set from options, resolving each spec against the
    /// declaring file's repo-relative directory. `ignore_case` carries the
    /// repository's `core.ignorecase` when known; unknown means
    /// case-sensitive. Returns None when the options declare no filters.
    pub fn from_options(
        options: &VersionOptions,
        relative_to_dir: &str,
        ignore_case: Option<bool>,
    ) -> Result<Option<Self>> {
        let Some(specs) = options.path_filters() else {
            return Ok(None);
        };
        let case_sensitive = !ignore_case.unwrap_or(false);
        let filters = specs
            .iter()
            .map(|spec| FilterPath::parse(spec, relative_to_dir, case_sensitive))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Self::new(filters)))
    }

    pub fn filters(&self) -> &[FilterPath] {
        &self.filters
    }

    /// An include restriction only exists when some include filter names a
    /// path narrower than the repo root.
    pub fn has_effective_include(&self) -> bool {
        let mut any_include = false;
        for filter in &self.filters {
            if filter.is_root_include() {
                return false;
            }
            any_include |= filter.is_include();
        }
        any_include
    }

    /// Whether a changed path counts toward the version height.
    pub fn admits(&self, path: &str) -> bool {
        if self.has_effective_include() && !self.filters.iter().any(|f| f.includes(path)) {
            return false;
        }
        !self.filters.iter().any(|f| f.excludes(path))
    }

    /// Include prefixes usable to scope a tree diff, or None when no
    /// effective include restriction exists.
    pub fn include_scopes(&self) -> Option<Vec<String>> {
        if !self.has_effective_include() {
            return None;
        }
        Some(
            self.filters
                .iter()
                .filter(|f| f.is_include())
                .map(|f| f.repo_relative_path.clone())
                .collect(),
        )
    }
}
