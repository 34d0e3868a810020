//! Locating the effective configuration for a directory.
//!
//! Resolution starts at a repo-relative directory and climbs toward the
//! repo root. A `version.json` with `"inherit": true` pulls in its nearest
//! ancestor file by JSON document overlay: child scalars and arrays win,
//! objects merge key by key. A standalone `prerelease` property is applied
//! to the merged `version` afterwards.
//!
//! The same walk runs against the working tree or against a commit's tree,
//! behind [`ConfigSource`].

use std::path::Path;

use serde_json::Value;

use crate::context::{CommitId, GitContext};
use crate::error::{GraphverError, Result};
use crate::options::{overlay_json, VersionOptions};
use crate::semver::SemanticVersion;

/// File name of the JSON configuration format.
pub const VERSION_JSON: &str = "version.json";
/// File name of the two-line text configuration format.
pub const VERSION_TXT: &str = "version.txt";

/// What the caller needs from a resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolutionRequirements {
    /// Keep climbing until the result carries a `version`.
    pub version_specified: bool,
    /// An inheriting file is an acceptable terminus.
    pub accept_inheriting_file: bool,
    /// With `accept_inheriting_file`: return the inheriting file itself
    /// instead of merging its ancestors into it.
    pub non_merged_result: bool,
    /// Keep the root-most location sighting instead of the leaf-most.
    pub prefer_root_most_locations: bool,
}

impl ResolutionRequirements {
    fn validate(&self) -> Result<()> {
        if self.non_merged_result && !self.accept_inheriting_file {
            return Err(GraphverError::IllegalState(
                "non_merged_result requires accept_inheriting_file",
            ));
        }
        Ok(())
    }
}

/// Directories observed while resolving, both repo-relative.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VersionFileLocations {
    /// Directory of the first file seen with `inherit` unset or false.
    pub non_inheriting_dir: Option<String>,
    /// Directory of the first file seen with an explicit `version`.
    pub version_specifying_dir: Option<String>,
}

impl VersionFileLocations {
    fn record_non_inheriting(&mut self, dir: &str, prefer_root: bool) {
        if prefer_root || self.non_inheriting_dir.is_none() {
            self.non_inheriting_dir = Some(dir.to_string());
        }
    }

    fn record_version_specifying(&mut self, dir: &str, prefer_root: bool) {
        if prefer_root || self.version_specifying_dir.is_none() {
            self.version_specifying_dir = Some(dir.to_string());
        }
    }
}

/// Reads configuration files out of either a working tree or a commit tree.
///
/// `repo_rel_dir` is `/`-separated; empty means the repo root. File names
/// match case-insensitively when the source can enumerate directory
/// entries.
pub trait ConfigSource {
    fn read(&self, repo_rel_dir: &str, file_name: &str) -> Result<Option<Vec<u8>>>;
}

/// A [`ConfigSource`] over the filesystem working tree.
pub struct WorkingTreeSource<'a> {
    root: &'a Path,
}

impl<'a> WorkingTreeSource<'a> {
    pub fn new(root: &'a Path) -> Self {
        Self { root }
    }
}

impl ConfigSource for WorkingTreeSource<'_> {
    fn read(&self, repo_rel_dir: &str, file_name: &str) -> Result<Option<Vec<u8>>> {
        let dir = if repo_rel_dir.is_empty() {
            self.root.to_path_buf()
        } else {
            self.root.join(repo_rel_dir.replace('/', std::path::MAIN_SEPARATOR_STR))
        };
        let exact = dir.join(file_name);
        if exact.is_file() {
            return Ok(Some(std::fs::read(&exact)?));
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Ok(None);
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            if name.to_string_lossy().eq_ignore_ascii_case(file_name) && entry.path().is_file() {
                return Ok(Some(std::fs::read(entry.path())?));
            }
        }
        Ok(None)
    }
}

/// A [`ConfigSource`] over a commit's tree.
pub struct CommitTreeSource<'a> {
    ctx: &'a dyn GitContext,
    commit: CommitId,
}

impl<'a> CommitTreeSource<'a> {
    pub fn new(ctx: &'a dyn GitContext, commit: CommitId) -> Self {
        Self { ctx, commit }
    }
}

impl ConfigSource for CommitTreeSource<'_> {
    fn read(&self, repo_rel_dir: &str, file_name: &str) -> Result<Option<Vec<u8>>> {
        let join = |name: &str| {
            if repo_rel_dir.is_empty() {
                name.to_string()
            } else {
                format!("{repo_rel_dir}/{name}")
            }
        };
        if let Some(bytes) = self.ctx.read_blob_at_path(self.commit, &join(file_name))? {
            return Ok(Some(bytes));
        }
        let Some(names) = self.ctx.tree_entry_names(self.commit, repo_rel_dir)? else {
            return Ok(None);
        };
        for name in names {
            if name.eq_ignore_ascii_case(file_name) {
                return self.ctx.read_blob_at_path(self.commit, &join(&name));
            }
        }
        Ok(None)
    }
}

struct RawFile {
    doc: Value,
    inherit: bool,
}

/// Resolve the effective configuration starting at `start_rel_dir`.
///
/// Returns the frozen options (None when no version file exists anywhere up
/// the tree) together with the locations observed on the way.
pub fn resolve(
    source: &dyn ConfigSource,
    start_rel_dir: &str,
    requirements: ResolutionRequirements,
) -> Result<(Option<VersionOptions>, VersionFileLocations)> {
    requirements.validate()?;
    let mut locations = VersionFileLocations::default();
    let resolved = resolve_merged(source, start_rel_dir, requirements, &mut locations)?;
    match resolved {
        Some(doc) => {
            let mut options = VersionOptions::from_json_value(doc)?;
            options.freeze();
            Ok((Some(options), locations))
        }
        None => Ok((None, locations)),
    }
}

/// Resolve against a commit's tree.
pub fn resolve_at_commit(
    ctx: &dyn GitContext,
    commit: CommitId,
    start_rel_dir: &str,
    requirements: ResolutionRequirements,
) -> Result<(Option<VersionOptions>, VersionFileLocations)> {
    let source = CommitTreeSource::new(ctx, commit);
    resolve(&source, start_rel_dir, requirements)
}

/// Resolve against a working tree, starting at an absolute directory that
/// must live under `root`.
pub fn resolve_in_working_tree(
    root: &Path,
    start_abs_dir: &Path,
    requirements: ResolutionRequirements,
) -> Result<(Option<VersionOptions>, VersionFileLocations)> {
    let rel = start_abs_dir.strip_prefix(root).map_err(|_| {
        GraphverError::InvalidConfiguration(format!(
            "{} is not under the working tree root {}",
            start_abs_dir.display(),
            root.display()
        ))
    })?;
    let rel = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    let source = WorkingTreeSource::new(root);
    resolve(&source, &rel, requirements)
}

fn parent_dir(dir: &str) -> Option<&str> {
    if dir.is_empty() {
        return None;
    }
    Some(dir.rfind('/').map(|i| &dir[..i]).unwrap_or(""))
}

fn resolve_merged(
    source: &dyn ConfigSource,
    start_dir: &str,
    requirements: ResolutionRequirements,
    locations: &mut VersionFileLocations,
) -> Result<Option<Value>> {
    let mut dir = start_dir;
    loop {
        if let Some(raw) = load_raw_at(source, dir)? {
            record_locations(&raw, dir, requirements, locations);
            let candidate = if raw.inherit {
                if requirements.accept_inheriting_file && requirements.non_merged_result {
                    let mut doc = raw.doc;
                    apply_standalone_prerelease(&mut doc, dir)?;
                    doc
                } else {
                    merge_with_parent(source, dir, raw.doc, requirements, locations)?
                }
            } else {
                let mut doc = raw.doc;
                apply_standalone_prerelease(&mut doc, dir)?;
                doc
            };

            if requirements.version_specified && candidate.get("version").is_none() {
                tracing::debug!(directory = dir, "version file found but no version specified; climbing");
            } else {
                return Ok(Some(candidate));
            }
        }

        match parent_dir(dir) {
            Some(parent) => dir = parent,
            None => return Ok(None),
        }
    }
}

fn merge_with_parent(
    source: &dyn ConfigSource,
    dir: &str,
    child: Value,
    requirements: ResolutionRequirements,
    locations: &mut VersionFileLocations,
) -> Result<Value> {
    let parent_requirements = ResolutionRequirements {
        version_specified: false,
        accept_inheriting_file: false,
        non_merged_result: false,
        ..requirements
    };
    let parent = match parent_dir(dir) {
        Some(parent) => resolve_merged(source, parent, parent_requirements, locations)?,
        None => None,
    };
    let Some(mut merged) = parent else {
        let file = if dir.is_empty() {
            VERSION_JSON.to_string()
        } else {
            format!("{dir}/{VERSION_JSON}")
        };
        return Err(GraphverError::MissingParentConfiguration(file));
    };
    overlay_json(&mut merged, child);
    apply_standalone_prerelease(&mut merged, dir)?;
    Ok(merged)
}

fn record_locations(
    raw: &RawFile,
    dir: &str,
    requirements: ResolutionRequirements,
    locations: &mut VersionFileLocations,
) {
    if !raw.inherit {
        locations.record_non_inheriting(dir, requirements.prefer_root_most_locations);
    }
    if raw.doc.get("version").is_some() {
        locations.record_version_specifying(dir, requirements.prefer_root_most_locations);
    }
}

fn load_raw_at(source: &dyn ConfigSource, dir: &str) -> Result<Option<RawFile>> {
    if let Some(bytes) = source.read(dir, VERSION_JSON)? {
        let doc: Value = serde_json::from_slice(&bytes).map_err(|e| GraphverError::InvalidVersionFile {
            path: format!("{dir}/{VERSION_JSON}"),
            reason: e.to_string(),
        })?;
        let inherit = doc.get("inherit").and_then(Value::as_bool).unwrap_or(false);
        return Ok(Some(RawFile { doc, inherit }));
    }
    if let Some(bytes) = source.read(dir, VERSION_TXT)? {
        let doc = parse_version_txt(&bytes, dir)?;
        return Ok(Some(RawFile { doc, inherit: false }));
    }
    Ok(None)
}

/// Two-line text format: line 1 the numeric version, line 2 an optional
/// prerelease whose leading `-` may be omitted.
fn parse_version_txt(bytes: &[u8], dir: &str) -> Result<Value> {
    let path = format!("{dir}/{VERSION_TXT}");
    let text = std::str::from_utf8(bytes).map_err(|_| GraphverError::InvalidVersionFile {
        path: path.clone(),
        reason: "file is not valid UTF-8".to_string(),
    })?;
    let mut lines = text.lines();
    let first = lines.next().map(str::trim).unwrap_or("");
    if first.is_empty() {
        return Err(GraphverError::InvalidVersionFile {
            path,
            reason: "missing version on line 1".to_string(),
        });
    }
    let second = lines.next().map(str::trim).unwrap_or("");
    if lines.any(|line| !line.trim().is_empty()) {
        return Err(GraphverError::InvalidVersionFile {
            path,
            reason: "unexpected content after line 2".to_string(),
        });
    }
    let combined = if second.is_empty() {
        first.to_string()
    } else if let Some(stripped) = second.strip_prefix('-') {
        format!("{first}-{stripped}")
    } else {
        format!("{first}-{second}")
    };
    let version = SemanticVersion::parse(&combined).map_err(|e| GraphverError::InvalidVersionFile {
        path,
        reason: e.to_string(),
    })?;
    Ok(serde_json::json!({ "version": version.to_string() }))
}

/// Apply a standalone `prerelease` property to the document's `version`
/// and drop the property. Empty suppresses any inherited prerelease; a
/// non-empty value over a version that already has one is an error.
fn apply_standalone_prerelease(doc: &mut Value, dir: &str) -> Result<()> {
    let Some(map) = doc.as_object_mut() else {
        return Ok(());
    };
    let Some(prerelease) = map.remove("prerelease") else {
        return Ok(());
    };
    let path = format!("{dir}/{VERSION_JSON}");
    let prerelease = prerelease
        .as_str()
        .ok_or_else(|| GraphverError::InvalidVersionFile {
            path: path.clone(),
            reason: "prerelease must be a string".to_string(),
        })?
        .to_string();
    let Some(version_value) = map.get("version").and_then(Value::as_str) else {
        return Ok(());
    };
    let version = SemanticVersion::parse(version_value).map_err(|e| GraphverError::InvalidVersionFile {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    let updated = if prerelease.is_empty() {
        version.with_prerelease("")?
    } else {
        if version.is_prerelease() {
            return Err(GraphverError::InvalidVersionFile {
                path,
                reason: format!(
                    "prerelease {prerelease:?} cannot be applied: version {version} already has one"
                ),
            });
        }
        version.with_prerelease(&prerelease)?
    };
    map.insert("version".to_string(), Value::String(updated.to_string()));
    Ok(())
}
