//! # graphver core library
//! Reproducible, monotonically ordered versions derived from a Git commit
//! graph and a `version.json`/`version.txt` configuration, without tags.
//!
//! Every commit yields a unique 4-integer version: the base major/minor
//! comes from the configuration, the *version height* (commits since the
//! last height-resetting change) fills the first unspecified slot, and the
//! first 16 bits of the commit id ride along so the commit can be recovered
//! from a version number.
//!
//! ## Quick Start
//!
//! Compute the version family for the repository containing the current
//! directory.
//!
//! ```rust,no_run
//! # use graphver::GraphverError;
//! let oracle = graphver::get_version(".")?;
//!
//! println!("numeric:  {}", oracle.version());
//! println!("semver2:  {}", oracle.sem_ver2());
//! println!("nuget:    {}", oracle.nuget_package_version());
//! # Ok::<_, GraphverError>(())
//! ```
//!
//! ## Strict vs. fallback entry points
//! - [`get_version`] — requires a real Git repository and errors otherwise.
//! - [`get_version_with_fallback`] — degrades to a repository-less oracle
//!   (configuration only, zero height) when no repository is found.

pub mod context;
pub mod error;
pub mod filter;
pub mod git;
pub mod height;
pub mod identity;
pub mod numeric;
pub mod options;
pub mod oracle;
pub mod resolver;
pub mod semver;
pub mod testing;

pub use context::{CancellationToken, CommitId, GitContext};
pub use error::{GraphverError, Result};
pub use filter::{FilterPath, PathFilterSet};
pub use git::Repository;
pub use height::HeightCalculator;
pub use identity::{encode_identity, ReverseLookup};
pub use numeric::NumericVersion;
pub use options::{
    AssemblyVersionOptions, CloudBuildOptions, NuGetPackageVersionOptions, ReleaseOptions,
    VersionOptions, VersionPrecision,
};
pub use oracle::{OracleSettings, OracleSnapshot, VersionOracle};
pub use resolver::{ResolutionRequirements, VersionFileLocations};
pub use semver::{Position, SemanticVersion};

use std::path::PathBuf;

/// Compute the version oracle for the repository containing `work_dir`,
/// inspecting HEAD.
///
/// # Examples
/// Returning an error when the target is not a Git repository:
/// ```rust
/// use graphver::{get_version, GraphverError};
///
/// let err = get_version("/tmp/not-a-repo-graphver").unwrap_err();
/// match err {
///     GraphverError::GitRepoNotFound(_) => {}
///     other => panic!("unexpected error: {other}"),
/// }
/// ```
///
/// # Errors
/// - [`GraphverError::GitRepoNotFound`] if the path is not inside a Git
///   repository.
/// - [`GraphverError::ShallowClone`] when the clone is truncated above the
///   last height-resetting change.
/// - [`GraphverError::HeightOverflow`] when the offset height leaves the
///   encodable range.
pub fn get_version(work_dir: impl Into<PathBuf>) -> Result<VersionOracle> {
    get_version_with(work_dir, None, &OracleSettings::default())
}

/// Compute the version oracle for a specific committish with explicit
/// settings.
///
/// # Errors
/// As [`get_version`], plus [`GraphverError::Git`] when `committish` does
/// not name a commit.
pub fn get_version_with(
    work_dir: impl Into<PathBuf>,
    committish: Option<&str>,
    settings: &OracleSettings,
) -> Result<VersionOracle> {
    let mut repo = Repository::discover(work_dir)?;
    if repo.is_shallow() {
        tracing::warn!(
            "shallow repository detected; the height walk will fail if history is truncated too early"
        );
    }
    if let Some(committish) = committish {
        if !repo.select_commit(committish)? {
            return Err(GraphverError::Git(format!("no such committish: {committish}")));
        }
    }
    VersionOracle::new(&repo, settings)
}

/// Compute the version oracle, falling back to a repository-less oracle
/// when `work_dir` is not inside a Git repository.
///
/// # Examples
/// ```rust
/// use graphver::{get_version_with_fallback, GraphverError};
///
/// let oracle = get_version_with_fallback("/tmp/not-a-repo-graphver")?;
/// assert_eq!(oracle.sem_ver2(), "0.0.0");
/// assert_eq!(oracle.version_height(), 0);
/// # Ok::<_, GraphverError>(())
/// ```
pub fn get_version_with_fallback(work_dir: impl Into<PathBuf>) -> Result<VersionOracle> {
    let work_dir = work_dir.into();
    match get_version(&work_dir) {
        Ok(oracle) => Ok(oracle),
        Err(GraphverError::GitRepoNotFound(_)) => {
            VersionOracle::without_repository(&work_dir, &OracleSettings::default())
        }
        Err(e) => Err(e),
    }
}
