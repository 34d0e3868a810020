//! The version oracle: one computation per inspected commit, exposing the
//! whole family of version strings.
//!
//! Construction follows a fixed sequence: resolve configuration (committed
//! and working), compute the version height, encode commit identity into
//! the 4-integer version, then derive strings on demand. A missing
//! configuration degenerates to the 0.0 version instead of failing.

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::context::{CancellationToken, CommitId, GitContext};
use crate::error::{GraphverError, Result};
use crate::filter::PathFilterSet;
use crate::height::{working_tree_overrides_height, HeightCalculator};
use crate::identity::encode_identity;
use crate::numeric::NumericVersion;
use crate::options::{CommitIdPlacement, IncludeCommitIdWhen, VersionOptions, VersionPrecision};
use crate::resolver::{self, ResolutionRequirements};
use crate::semver::{substitute_macro, Position, SemanticVersion};

/// Inputs beyond the repository itself: the project directory inside the
/// repo and any hints a CI layer wants to impose.
#[derive(Debug, Clone, Default)]
pub struct OracleSettings {
    /// Repo-relative directory whose configuration governs, empty for the
    /// repo root.
    pub project_dir: String,
    /// Ref being built, overriding the repository HEAD name.
    pub building_ref: Option<String>,
    /// Forced public-release determination, bypassing the ref-spec match.
    pub public_release: Option<bool>,
    pub cancellation: CancellationToken,
}

/// Everything derived for one commit under inspection.
#[derive(Debug)]
pub struct VersionOracle {
    project_dir: String,
    committed_options: Option<VersionOptions>,
    working_options: Option<VersionOptions>,
    effective_options: VersionOptions,
    base_version: SemanticVersion,
    path_filters: Option<PathFilterSet>,
    version: NumericVersion,
    version_height: u32,
    commit_id: Option<CommitId>,
    commit_id_short: Option<String>,
    commit_date: Option<i64>,
    building_ref: Option<String>,
    public_release: bool,
}

impl VersionOracle {
    /// Compute the oracle for the context's selected commit (HEAD unless
    /// the caller selected something else).
    pub fn new(ctx: &dyn GitContext, settings: &OracleSettings) -> Result<Self> {
        settings.cancellation.check()?;
        let requirements = ResolutionRequirements {
            version_specified: true,
            ..Default::default()
        };

        let working_options = match ctx.working_tree_path() {
            Some(root) => {
                let start = if settings.project_dir.is_empty() {
                    root.to_path_buf()
                } else {
                    root.join(settings.project_dir.replace('/', std::path::MAIN_SEPARATOR_STR))
                };
                resolver::resolve_in_working_tree(root, &start, requirements)?.0
            }
            None => None,
        };

        let commit_id = ctx.selected_commit_id();
        let committed_options = match commit_id {
            Some(commit) => resolver::resolve_at_commit(ctx, commit, &settings.project_dir, requirements)?.0,
            None => None,
        };

        // Which configuration drives the output, and whether an uncommitted
        // version bump zeroes the height.
        let committed_version = committed_options.as_ref().and_then(|o| o.version());
        let working_version = working_options.as_ref().and_then(|o| o.version());
        let overridden = working_tree_overrides_height(committed_version, working_version);
        let effective_options = if overridden {
            working_options.clone()
        } else {
            committed_options.clone().or_else(|| working_options.clone())
        }
        .unwrap_or_default();
        let base_version = effective_options
            .version()
            .cloned()
            .unwrap_or_else(|| SemanticVersion::new(0, 0));

        let path_filters =
            PathFilterSet::from_options(&effective_options, &settings.project_dir, ctx.ignore_case())?;

        let version_height = match commit_id {
            Some(commit) if committed_options.is_some() && !overridden => {
                let committed = committed_options.as_ref().unwrap_or(&effective_options);
                let mut calculator = HeightCalculator::new(
                    ctx,
                    &settings.project_dir,
                    committed,
                    settings.cancellation.clone(),
                )?;
                calculator.calculate(commit)?
            }
            _ => 0,
        };

        let commit_id_short = match commit_id {
            Some(commit) => Some(Self::short_id(ctx, commit, &effective_options)?),
            None => None,
        };
        let commit_date = match commit_id {
            Some(commit) => ctx.commit_date(commit)?,
            None => None,
        };

        let building_ref = settings
            .building_ref
            .clone()
            .or_else(|| ctx.head_canonical_name());
        let public_release = match settings.public_release {
            Some(forced) => forced,
            None => Self::matches_public_release(&effective_options, building_ref.as_deref())?,
        };

        let version = encode_identity(
            &base_version,
            version_height,
            effective_options.version_height_offset_or_default(),
            commit_id.map(|id| id.first_u16()),
        )?;

        Ok(Self {
            project_dir: settings.project_dir.clone(),
            committed_options,
            working_options,
            effective_options,
            base_version,
            path_filters,
            version,
            version_height,
            commit_id,
            commit_id_short,
            commit_date,
            building_ref,
            public_release,
        })
    }

    /// Compute an oracle for a plain directory with no repository behind
    /// it: configuration only, zero height, no commit identity.
    pub fn without_repository(dir: &Path, settings: &OracleSettings) -> Result<Self> {
        settings.cancellation.check()?;
        let requirements = ResolutionRequirements {
            version_specified: true,
            ..Default::default()
        };
        let start = if settings.project_dir.is_empty() {
            dir.to_path_buf()
        } else {
            dir.join(settings.project_dir.replace('/', std::path::MAIN_SEPARATOR_STR))
        };
        let working_options = resolver::resolve_in_working_tree(dir, &start, requirements)?.0;
        let effective_options = working_options.clone().unwrap_or_default();
        let base_version = effective_options
            .version()
            .cloned()
            .unwrap_or_else(|| SemanticVersion::new(0, 0));
        let path_filters = PathFilterSet::from_options(&effective_options, &settings.project_dir, None)?;
        let public_release = settings.public_release.unwrap_or(false);
        let version = encode_identity(
            &base_version,
            0,
            effective_options.version_height_offset_or_default(),
            None,
        )?;
        Ok(Self {
            project_dir: settings.project_dir.clone(),
            committed_options: None,
            working_options,
            effective_options,
            base_version,
            path_filters,
            version,
            version_height: 0,
            commit_id: None,
            commit_id_short: None,
            commit_date: None,
            building_ref: settings.building_ref.clone(),
            public_release,
        })
    }

    fn short_id(ctx: &dyn GitContext, commit: CommitId, options: &VersionOptions) -> Result<String> {
        let auto_minimum = options.git_commit_id_short_auto_minimum_or_default();
        if auto_minimum > 0 {
            return ctx.short_unique_id(commit, auto_minimum as usize);
        }
        let fixed = options.git_commit_id_short_fixed_length_or_default() as usize;
        let hex = commit.to_hex();
        Ok(hex[..fixed.clamp(4, 40)].to_string())
    }

    fn matches_public_release(options: &VersionOptions, building_ref: Option<&str>) -> Result<bool> {
        let Some(building_ref) = building_ref else {
            return Ok(false);
        };
        for spec in options.public_release_ref_spec_or_default() {
            let re = Regex::new(spec).map_err(|e| {
                GraphverError::InvalidConfiguration(format!(
                    "publicReleaseRefSpec entry {spec:?} is not a valid regex: {e}"
                ))
            })?;
            if re.is_match(building_ref) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn committed_options(&self) -> Option<&VersionOptions> {
        self.committed_options.as_ref()
    }

    pub fn working_options(&self) -> Option<&VersionOptions> {
        self.working_options.as_ref()
    }

    /// The frozen configuration the output derives from.
    pub fn effective_options(&self) -> &VersionOptions {
        &self.effective_options
    }

    /// The fully specified 4-integer version with height and commit bits
    /// encoded.
    pub fn version(&self) -> NumericVersion {
        self.version
    }

    pub fn version_height(&self) -> u32 {
        self.version_height
    }

    pub fn version_height_offset(&self) -> i32 {
        self.effective_options.version_height_offset_or_default()
    }

    /// Height with the configured offset applied: the number substituted
    /// for `{height}` and encoded numerically.
    fn offset_height(&self) -> i64 {
        i64::from(self.version_height) + i64::from(self.version_height_offset())
    }

    pub fn commit_id(&self) -> Option<String> {
        self.commit_id.map(|id| id.to_hex())
    }

    pub fn commit_id_short(&self) -> Option<&str> {
        self.commit_id_short.as_deref()
    }

    /// Committer date, seconds since the Unix epoch.
    pub fn commit_date(&self) -> Option<i64> {
        self.commit_date
    }

    pub fn building_ref(&self) -> Option<&str> {
        self.building_ref.as_deref()
    }

    pub fn public_release(&self) -> bool {
        self.public_release
    }

    pub fn major_minor_version(&self) -> String {
        self.version.to_string_safe(2)
    }

    pub fn simple_version(&self) -> String {
        self.version.to_string_safe(3)
    }

    /// The prerelease with `{height}` substituted, leading dash included;
    /// empty when the base version has none.
    pub fn prerelease_version(&self) -> String {
        let prerelease = self.base_version.prerelease();
        if prerelease.is_empty() {
            String::new()
        } else {
            format!("-{}", substitute_macro(prerelease, &self.offset_height().to_string()))
        }
    }

    /// Build metadata identifiers from the base version, macro-substituted.
    fn build_metadata_identifiers(&self) -> Vec<String> {
        let metadata = self.base_version.build_metadata();
        if metadata.is_empty() {
            return Vec::new();
        }
        substitute_macro(metadata, &self.offset_height().to_string())
            .split('.')
            .map(str::to_string)
            .collect()
    }

    /// SemVer 2.0 form. The short commit id rides in the build metadata for
    /// non-public builds.
    pub fn sem_ver2(&self) -> String {
        let mut metadata = Vec::new();
        if !self.public_release {
            if let Some(short) = &self.commit_id_short {
                metadata.push(short.clone());
            }
        }
        metadata.extend(self.build_metadata_identifiers());
        let fragment = if metadata.is_empty() {
            String::new()
        } else {
            format!("+{}", metadata.join("."))
        };
        format!("{}{}{}", self.simple_version(), self.prerelease_version(), fragment)
    }

    /// SemVer 1.0 form: numeric prerelease identifiers are zero-padded so
    /// string ordering matches numeric ordering, dots become dashes, and
    /// the commit id is appended as a prefixed prerelease identifier for
    /// non-public builds.
    pub fn sem_ver1(&self) -> String {
        let mut s = format!("{}{}", self.simple_version(), self.sem_ver1_prerelease());
        if !self.public_release {
            if let Some(short) = &self.commit_id_short {
                s.push('-');
                s.push_str(self.effective_options.git_commit_id_prefix_or_default());
                s.push_str(short);
            }
        }
        s
    }

    fn sem_ver1_prerelease(&self) -> String {
        let prerelease = self.base_version.prerelease();
        if prerelease.is_empty() {
            return String::new();
        }
        let padding = self.effective_options.semver1_numeric_identifier_padding_or_default() as usize;
        let substituted = substitute_macro(prerelease, &self.offset_height().to_string());
        let padded: Vec<String> = substituted
            .split('.')
            .map(|id| {
                if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
                    format!("{:0>padding$}", id)
                } else {
                    id.to_string()
                }
            })
            .collect();
        format!("-{}", padded.join("-"))
    }

    /// The NuGet package version: the SemVer 1 subset by default, SemVer 2
    /// when the configuration opts in.
    pub fn nuget_package_version(&self) -> String {
        match self.effective_options.nuget_package_version_or_default().sem_ver_or_default() {
            2 => self.sem_ver2(),
            _ => self.sem_ver1(),
        }
    }

    /// Chocolatey understands only the SemVer 1 subset.
    pub fn chocolatey_package_version(&self) -> String {
        self.sem_ver1()
    }

    pub fn npm_package_version(&self) -> String {
        self.sem_ver2()
    }

    /// The assembly version: configured explicitly or derived from the
    /// effective version truncated to the configured precision.
    pub fn assembly_version(&self) -> NumericVersion {
        let assembly = self.effective_options.assembly_version();
        let precision = assembly
            .map(|a| a.precision_or_default())
            .unwrap_or(VersionPrecision::Minor);
        let source = assembly
            .and_then(|a| a.version().copied())
            .unwrap_or(self.version);
        let keep = match precision {
            VersionPrecision::Major => 1,
            VersionPrecision::Minor => 2,
            VersionPrecision::Build => 3,
            VersionPrecision::Revision => 4,
        };
        let component = |index: usize, value: Option<i32>| {
            if index < keep {
                value.unwrap_or(0).max(0)
            } else {
                0
            }
        };
        NumericVersion::new(
            component(0, Some(source.major())),
            component(1, Some(source.minor())),
            component(2, source.build()),
            component(3, source.revision()),
        )
    }

    /// The informational version: 3 or 4 numeric components (4 when height
    /// occupies the revision slot), prerelease, and build metadata always
    /// carrying the commit id.
    pub fn assembly_informational_version(&self) -> String {
        let fields = match self.base_version.position_of_height() {
            Some(Position::Revision) => 4,
            _ => 3,
        };
        let mut metadata = Vec::new();
        if let Some(short) = &self.commit_id_short {
            metadata.push(short.clone());
        }
        metadata.extend(self.build_metadata_identifiers());
        let fragment = if metadata.is_empty() {
            String::new()
        } else {
            format!("+{}", metadata.join("."))
        };
        format!(
            "{}{}{}",
            self.version.to_string_safe(fields),
            self.prerelease_version(),
            fragment
        )
    }

    /// The cloud build number, when the configuration enables one.
    pub fn cloud_build_number(&self) -> Option<String> {
        let cloud = self.effective_options.cloud_build_or_default();
        let build_number = cloud.build_number_or_default();
        if !build_number.enabled_or_default() {
            return None;
        }
        let include = build_number.include_commit_id_or_default();
        let commit_included = self.commit_id_short.is_some()
            && match include.when_or_default() {
                IncludeCommitIdWhen::Always => true,
                IncludeCommitIdWhen::NonPublicReleaseOnly => !self.public_release,
                IncludeCommitIdWhen::Never => false,
            };
        let fields = if commit_included && include.placement_or_default() == CommitIdPlacement::FourthVersionComponent
        {
            4
        } else {
            3
        };
        let mut s = format!("{}{}", self.version.to_string_safe(fields), self.prerelease_version());
        if commit_included && include.placement_or_default() == CommitIdPlacement::BuildMetadata {
            if let Some(short) = &self.commit_id_short {
                s.push('+');
                s.push_str(short);
            }
        }
        Some(s)
    }

    /// Variables a CI layer would publish, keyed by name. Which families
    /// appear follows `cloudBuild.setVersionVariables` and
    /// `cloudBuild.setAllVariables`.
    pub fn cloud_build_variables(&self) -> BTreeMap<String, String> {
        let cloud = self.effective_options.cloud_build_or_default();
        let mut vars = BTreeMap::new();
        if cloud.set_version_variables_or_default() {
            vars.insert("GitBuildVersion".to_string(), self.version.to_string_safe(4));
            vars.insert("GitBuildVersionSimple".to_string(), self.simple_version());
            vars.insert(
                "GitAssemblyInformationalVersion".to_string(),
                self.assembly_informational_version(),
            );
        }
        if cloud.set_all_variables_or_default() {
            let all: [(&str, String); 12] = [
                ("GRAPHVER_Version", self.version.to_string_safe(4)),
                ("GRAPHVER_SimpleVersion", self.simple_version()),
                ("GRAPHVER_MajorMinorVersion", self.major_minor_version()),
                ("GRAPHVER_VersionHeight", self.version_height.to_string()),
                ("GRAPHVER_PrereleaseVersion", self.prerelease_version()),
                ("GRAPHVER_SemVer1", self.sem_ver1()),
                ("GRAPHVER_SemVer2", self.sem_ver2()),
                ("GRAPHVER_NuGetPackageVersion", self.nuget_package_version()),
                ("GRAPHVER_NpmPackageVersion", self.npm_package_version()),
                ("GRAPHVER_AssemblyVersion", self.assembly_version().to_string_safe(4)),
                ("GRAPHVER_PublicRelease", self.public_release.to_string()),
                ("GRAPHVER_GitCommitIdShort", self.commit_id_short.clone().unwrap_or_default()),
            ];
            for (key, value) in all {
                vars.insert(key.to_string(), value);
            }
        }
        vars
    }

    /// The release branch name this configuration would use for the
    /// current base version.
    pub fn release_branch_name(&self) -> String {
        self.effective_options
            .release_or_default()
            .branch_name_for(&self.base_version)
    }

    /// Snapshot of the precomputed state for cross-process caching.
    pub fn to_snapshot(&self) -> OracleSnapshot {
        OracleSnapshot {
            base_relative_path: Some(self.project_dir.clone()),
            committed_options: self.committed_options.clone(),
            working_options: self.working_options.clone(),
            path_filters: self.path_filters.clone(),
            version: self.version,
            version_height: self.version_height,
            version_height_offset: self.version_height_offset(),
            commit_id: self.commit_id,
            commit_id_short: self.commit_id_short.clone(),
            commit_date: self.commit_date,
            building_ref: self.building_ref.clone(),
            public_release: self.public_release,
        }
    }

    pub fn serialize_snapshot(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_snapshot())?)
    }

    /// Rebuild an oracle from a snapshot without touching a repository.
    pub fn from_snapshot(snapshot: OracleSnapshot) -> Result<Self> {
        let has_filters = snapshot
            .committed_options
            .as_ref()
            .or(snapshot.working_options.as_ref())
            .map(|o| o.path_filters().is_some())
            .unwrap_or(false)
            || snapshot.path_filters.is_some();
        if has_filters && snapshot.base_relative_path.is_none() {
            return Err(GraphverError::InvalidConfiguration(
                "snapshot carries path filters but no base relative path".to_string(),
            ));
        }
        let project_dir = snapshot.base_relative_path.unwrap_or_default();

        let committed_version = snapshot.committed_options.as_ref().and_then(|o| o.version());
        let working_version = snapshot.working_options.as_ref().and_then(|o| o.version());
        let overridden = working_tree_overrides_height(committed_version, working_version);
        let effective_options = if overridden {
            snapshot.working_options.clone()
        } else {
            snapshot.committed_options.clone().or_else(|| snapshot.working_options.clone())
        }
        .unwrap_or_default();
        let base_version = effective_options
            .version()
            .cloned()
            .unwrap_or_else(|| SemanticVersion::new(0, 0));

        Ok(Self {
            project_dir,
            committed_options: snapshot.committed_options,
            working_options: snapshot.working_options,
            effective_options,
            base_version,
            path_filters: snapshot.path_filters,
            version: snapshot.version,
            version_height: snapshot.version_height,
            commit_id: snapshot.commit_id,
            commit_id_short: snapshot.commit_id_short,
            commit_date: snapshot.commit_date,
            building_ref: snapshot.building_ref,
            public_release: snapshot.public_release,
        })
    }

    pub fn deserialize_snapshot(json: &str) -> Result<Self> {
        Self::from_snapshot(serde_json::from_str(json)?)
    }
}

impl std::fmt::Display for VersionOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sem_ver2())
    }
}

/// JSON-serializable oracle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSnapshot {
    #[serde(rename = "baseRelativePath", skip_serializing_if = "Option::is_none")]
    pub base_relative_path: Option<String>,
    #[serde(rename = "committedOptions", skip_serializing_if = "Option::is_none")]
    pub committed_options: Option<VersionOptions>,
    #[serde(rename = "workingOptions", skip_serializing_if = "Option::is_none")]
    pub working_options: Option<VersionOptions>,
    #[serde(rename = "pathFilters", skip_serializing_if = "Option::is_none")]
    pub path_filters: Option<PathFilterSet>,
    pub version: NumericVersion,
    #[serde(rename = "versionHeight")]
    pub version_height: u32,
    #[serde(rename = "versionHeightOffset")]
    pub version_height_offset: i32,
    #[serde(rename = "commitId", skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<CommitId>,
    #[serde(rename = "commitIdShort", skip_serializing_if = "Option::is_none")]
    pub commit_id_short: Option<String>,
    #[serde(rename = "commitDate", skip_serializing_if = "Option::is_none")]
    pub commit_date: Option<i64>,
    #[serde(rename = "buildingRef", skip_serializing_if = "Option::is_none")]
    pub building_ref: Option<String>,
    #[serde(rename = "publicRelease")]
    pub public_release: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRepo;

    fn oracle(repo: &FakeRepo) -> VersionOracle {
        VersionOracle::new(repo, &OracleSettings::default()).unwrap()
    }

    #[test]
    fn two_commit_linear_history() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit_with_leading(
            &[],
            &[("version.json", r#"{"version": "1.2"}"#), ("a.txt", "1")],
            0x1234,
        );
        let head = repo.commit_with_leading(&[c1], &[("a.txt", "2")], 0xbeef);
        repo.set_head(head, Some("refs/heads/main"));

        let oracle = oracle(&repo);
        assert_eq!(oracle.version_height(), 2);
        assert_eq!(oracle.version(), NumericVersion::new(1, 2, 2, 0xbeef));
        assert!(!oracle.public_release());
        let short = oracle.commit_id_short().unwrap().to_string();
        assert_eq!(short, head.to_hex()[..10].to_string());
        assert_eq!(oracle.sem_ver2(), format!("1.2.2+{short}"));
        assert_eq!(oracle.sem_ver1(), format!("1.2.2-g{short}"));
    }

    #[test]
    fn public_release_strips_commit_metadata() {
        let mut repo = FakeRepo::new();
        let head = repo.commit(
            &[],
            &[(
                "version.json",
                r#"{"version": "1.2", "publicReleaseRefSpec": ["^refs/heads/main$"]}"#,
            )],
        );
        repo.set_head(head, Some("refs/heads/main"));
        let oracle = oracle(&repo);
        assert!(oracle.public_release());
        assert_eq!(oracle.sem_ver2(), "1.2.1");
        assert_eq!(oracle.sem_ver1(), "1.2.1");
    }

    #[test]
    fn building_ref_override_controls_release_match() {
        let mut repo = FakeRepo::new();
        let head = repo.commit(
            &[],
            &[(
                "version.json",
                r#"{"version": "1.2", "publicReleaseRefSpec": ["^refs/heads/release/.*$"]}"#,
            )],
        );
        repo.set_head(head, Some("refs/heads/main"));
        let settings = OracleSettings {
            building_ref: Some("refs/heads/release/v1.2".to_string()),
            ..Default::default()
        };
        let oracle = VersionOracle::new(&repo, &settings).unwrap();
        assert!(oracle.public_release());
    }

    #[test]
    fn height_in_prerelease_substitutes_macro() {
        let mut repo = FakeRepo::new();
        let mut last = repo.commit(
            &[],
            &[("version.json", r#"{"version": "1.0-beta.{height}", "versionHeightOffset": 5}"#)],
        );
        for i in 0..6 {
            last = repo.commit_from(last, &[("a.txt", if i % 2 == 0 { "x" } else { "y" })]);
        }
        repo.set_head(last, Some("refs/heads/main"));
        let oracle = oracle(&repo);
        assert_eq!(oracle.version_height(), 7);
        assert_eq!(oracle.prerelease_version(), "-beta.12");
        assert_eq!(oracle.version(), NumericVersion::new(1, 0, 0, 0));
    }

    #[test]
    fn semver1_pads_numeric_identifiers() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit(&[], &[("version.json", r#"{"version": "1.0-beta.{height}"}"#)]);
        repo.set_head(c1, Some("refs/heads/main"));
        let oracle = oracle(&repo);
        assert_eq!(oracle.version_height(), 1);
        // "beta.1" -> "beta-0001" with the default padding of 4.
        assert!(oracle.sem_ver1().starts_with("1.0.0-beta-0001-g"));
        assert!(oracle.sem_ver2().starts_with("1.0.0-beta.1+"));
    }

    #[test]
    fn nuget_level_selects_form() {
        let mut repo = FakeRepo::new();
        let head = repo.commit(
            &[],
            &[("version.json", r#"{"version": "1.0-rc", "nugetPackageVersion": {"semVer": 2}}"#)],
        );
        repo.set_head(head, Some("refs/heads/main"));
        let oracle = oracle(&repo);
        assert_eq!(oracle.nuget_package_version(), oracle.sem_ver2());
        // Chocolatey stays on the SemVer 1 subset regardless.
        assert_eq!(oracle.chocolatey_package_version(), oracle.sem_ver1());
        assert_eq!(oracle.npm_package_version(), oracle.sem_ver2());
    }

    #[test]
    fn assembly_version_truncates_to_precision() {
        let mut repo = FakeRepo::new();
        let head = repo.commit(&[], &[("version.json", r#"{"version": "1.2"}"#)]);
        repo.set_head(head, Some("refs/heads/main"));
        let oracle = oracle(&repo);
        // Default precision minor: zero out everything below.
        assert_eq!(oracle.assembly_version(), NumericVersion::new(1, 2, 0, 0));
    }

    #[test]
    fn assembly_version_explicit_wins() {
        let mut repo = FakeRepo::new();
        let head = repo.commit(
            &[],
            &[("version.json", r#"{"version": "1.2", "assemblyVersion": {"version": "9.8.7", "precision": "build"}}"#)],
        );
        repo.set_head(head, Some("refs/heads/main"));
        let oracle = oracle(&repo);
        assert_eq!(oracle.assembly_version(), NumericVersion::new(9, 8, 7, 0));
    }

    #[test]
    fn informational_version_uses_four_fields_when_height_in_revision() {
        let mut repo = FakeRepo::new();
        let head = repo.commit(&[], &[("version.json", r#"{"version": "1.2.3"}"#)]);
        repo.set_head(head, Some("refs/heads/main"));
        let oracle = oracle(&repo);
        let short = oracle.commit_id_short().unwrap();
        assert_eq!(oracle.assembly_informational_version(), format!("1.2.3.1+{short}"));
    }

    #[test]
    fn cloud_build_number_placement() {
        let mut repo = FakeRepo::new();
        let head = repo.commit_with_leading(
            &[],
            &[(
                "version.json",
                r#"{"version": "1.2", "cloudBuild": {"buildNumber": {"enabled": true, "includeCommitId": {"when": "always", "where": "fourthVersionComponent"}}}}"#,
            )],
            0x0101,
        );
        repo.set_head(head, Some("refs/heads/main"));
        let oracle = oracle(&repo);
        assert_eq!(oracle.cloud_build_number().unwrap(), "1.2.1.257");
    }

    #[test]
    fn cloud_build_number_metadata_placement_and_disable() {
        let mut repo = FakeRepo::new();
        let head = repo.commit(
            &[],
            &[(
                "version.json",
                r#"{"version": "1.2", "cloudBuild": {"buildNumber": {"enabled": true}}}"#,
            )],
        );
        repo.set_head(head, Some("refs/heads/main"));
        let oracle = oracle(&repo);
        let short = oracle.commit_id_short().unwrap();
        assert_eq!(oracle.cloud_build_number().unwrap(), format!("1.2.1+{short}"));

        let mut disabled = FakeRepo::new();
        let head = disabled.commit(&[], &[("version.json", r#"{"version": "1.2"}"#)]);
        disabled.set_head(head, Some("refs/heads/main"));
        assert_eq!(VersionOracle::new(&disabled, &OracleSettings::default())
            .unwrap()
            .cloud_build_number(), None);
    }

    #[test]
    fn cloud_build_variables_families() {
        let mut repo = FakeRepo::new();
        let head = repo.commit(
            &[],
            &[("version.json", r#"{"version": "1.2", "cloudBuild": {"setAllVariables": true}}"#)],
        );
        repo.set_head(head, Some("refs/heads/main"));
        let vars = oracle(&repo).cloud_build_variables();
        assert!(vars.contains_key("GitBuildVersion"));
        assert!(vars.contains_key("GRAPHVER_SemVer2"));
    }

    #[test]
    fn missing_configuration_degenerates_to_zero_version() {
        let mut repo = FakeRepo::new();
        let head = repo.commit_with_leading(&[], &[("readme.md", "hello")], 0x7777);
        repo.set_head(head, Some("refs/heads/main"));
        let oracle = oracle(&repo);
        assert!(oracle.committed_options().is_none());
        assert_eq!(oracle.version_height(), 0);
        assert_eq!(oracle.version(), NumericVersion::new(0, 0, 0, 0x7777));
        assert!(oracle.sem_ver2().starts_with("0.0.0+"));
    }

    #[test]
    fn shallow_clone_fails_construction() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit(&[], &[("version.json", r#"{"version": "1.0"}"#)]);
        let head = repo.commit_from(c1, &[("a.txt", "x")]);
        repo.set_head(head, Some("refs/heads/main"));
        repo.truncate_below(head);
        repo.set_shallow(true);
        let err = VersionOracle::new(&repo, &OracleSettings::default()).unwrap_err();
        assert!(matches!(err, GraphverError::ShallowClone));
    }

    #[test]
    fn height_overflow_fails_construction() {
        let mut repo = FakeRepo::new();
        let head = repo.commit(
            &[],
            &[("version.json", r#"{"version": "1.0", "versionHeightOffset": 65534}"#)],
        );
        repo.set_head(head, Some("refs/heads/main"));
        let err = VersionOracle::new(&repo, &OracleSettings::default()).unwrap_err();
        assert!(matches!(err, GraphverError::HeightOverflow(65535)));
    }

    #[test]
    fn release_branch_name_renders_template() {
        let mut repo = FakeRepo::new();
        let head = repo.commit(
            &[],
            &[("version.json", r#"{"version": "2.1", "release": {"branchName": "rel/{version}"}}"#)],
        );
        repo.set_head(head, Some("refs/heads/main"));
        assert_eq!(oracle(&repo).release_branch_name(), "rel/2.1");
    }

    #[test]
    fn snapshot_round_trip_preserves_strings() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit_with_leading(
            &[],
            &[("version.json", r#"{"version": "1.2-beta", "pathFilters": [":!docs"]}"#), ("a.txt", "1")],
            0x2468,
        );
        repo.set_head(c1, Some("refs/heads/main"));
        let oracle = oracle(&repo);
        let json = oracle.serialize_snapshot().unwrap();
        let revived = VersionOracle::deserialize_snapshot(&json).unwrap();
        assert_eq!(revived.version(), oracle.version());
        assert_eq!(revived.version_height(), oracle.version_height());
        assert_eq!(revived.sem_ver1(), oracle.sem_ver1());
        assert_eq!(revived.sem_ver2(), oracle.sem_ver2());
        assert_eq!(revived.nuget_package_version(), oracle.nuget_package_version());
        assert_eq!(revived.public_release(), oracle.public_release());
    }

    #[test]
    fn snapshot_without_base_path_is_rejected() {
        let mut repo = FakeRepo::new();
        let c1 = repo.commit(
            &[],
            &[("version.json", r#"{"version": "1.2", "pathFilters": [":!docs"]}"#)],
        );
        repo.set_head(c1, Some("refs/heads/main"));
        let mut snapshot = oracle(&repo).to_snapshot();
        snapshot.base_relative_path = None;
        assert!(matches!(
            VersionOracle::from_snapshot(snapshot),
            Err(GraphverError::InvalidConfiguration(_))
        ));
    }
}
