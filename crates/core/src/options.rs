//! The `version.json` data model.
//!
//! Options are loaded from JSON, merged across an inheritance chain by the
//! resolver, validated, and then frozen. After [`VersionOptions::freeze`]
//! every setter fails with [`GraphverError::IllegalState`]; cloning a frozen
//! instance hands back a fresh mutable copy.
//!
//! Equality and hashing substitute defaults first: a file that spells out
//! `"gitCommitIdPrefix": "g"` equals one that omits the field.

use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{GraphverError, Result};
use crate::numeric::NumericVersion;
use crate::semver::SemanticVersion;

const DEFAULT_GIT_COMMIT_ID_PREFIX: &str = "g";
const DEFAULT_SEMVER1_PADDING: u32 = 4;
const DEFAULT_SHORT_ID_FIXED_LENGTH: u32 = 10;
const DEFAULT_RELEASE_BRANCH_NAME: &str = "v{version}";
const DEFAULT_FIRST_UNSTABLE_TAG: &str = "alpha";

fn ensure_mutable(frozen: bool) -> Result<()> {
    if frozen {
        Err(GraphverError::IllegalState("options are frozen"))
    } else {
        Ok(())
    }
}

macro_rules! case_insensitive_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = GraphverError;

            fn from_str(s: &str) -> Result<Self> {
                match s.to_lowercase().as_str() {
                    $(t if t == $text.to_lowercase() => Ok(Self::$variant),)+
                    _ => Err(GraphverError::InvalidConfiguration(format!(
                        "unrecognized {}: {s}", stringify!($name)
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

case_insensitive_enum!(VersionPrecision {
    Major => "major",
    Minor => "minor",
    Build => "build",
    Revision => "revision",
});

case_insensitive_enum!(IncludeCommitIdWhen {
    Always => "always",
    NonPublicReleaseOnly => "nonPublicReleaseOnly",
    Never => "never",
});

case_insensitive_enum!(CommitIdPlacement {
    BuildMetadata => "buildMetadata",
    FourthVersionComponent => "fourthVersionComponent",
});

case_insensitive_enum!(ReleaseVersionIncrement {
    Major => "major",
    Minor => "minor",
    Build => "build",
});

/// The `assemblyVersion` field: either a bare 2-4 integer version or an
/// object carrying the version and a truncation precision.
#[derive(Debug, Default)]
pub struct AssemblyVersionOptions {
    version: Option<NumericVersion>,
    precision: Option<VersionPrecision>,
    frozen: bool,
}

impl AssemblyVersionOptions {
    pub fn new(version: Option<NumericVersion>, precision: Option<VersionPrecision>) -> Self {
        Self {
            version,
            precision,
            frozen: false,
        }
    }

    pub fn version(&self) -> Option<&NumericVersion> {
        self.version.as_ref()
    }

    pub fn precision(&self) -> Option<VersionPrecision> {
        self.precision
    }

    pub fn precision_or_default(&self) -> VersionPrecision {
        self.precision.unwrap_or(VersionPrecision::Minor)
    }

    pub fn set_version(&mut self, version: Option<NumericVersion>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        self.version = version;
        Ok(())
    }

    pub fn set_precision(&mut self, precision: Option<VersionPrecision>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        self.precision = precision;
        Ok(())
    }

    fn freeze(&mut self) {
        self.frozen = true;
    }
}

impl Clone for AssemblyVersionOptions {
    fn clone(&self) -> Self {
        Self {
            version: self.version,
            precision: self.precision,
            frozen: false,
        }
    }
}

impl PartialEq for AssemblyVersionOptions {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version && self.precision_or_default() == other.precision_or_default()
    }
}

impl Eq for AssemblyVersionOptions {}

impl Hash for AssemblyVersionOptions {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.version.hash(state);
        self.precision_or_default().hash(state);
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AssemblyVersionRepr {
    Scalar(NumericVersion),
    Object {
        version: Option<NumericVersion>,
        precision: Option<VersionPrecision>,
    },
}

impl<'de> Deserialize<'de> for AssemblyVersionOptions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let repr = AssemblyVersionRepr::deserialize(deserializer)?;
        Ok(match repr {
            AssemblyVersionRepr::Scalar(version) => Self::new(Some(version), None),
            AssemblyVersionRepr::Object { version, precision } => Self::new(version, precision),
        })
    }
}

impl Serialize for AssemblyVersionOptions {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        // Collapse to the bare form when only the version is interesting.
        match (&self.version, self.precision) {
            (Some(version), None) => version.serialize(serializer),
            (Some(version), Some(VersionPrecision::Minor)) => version.serialize(serializer),
            _ => {
                use serde::ser::SerializeStruct as _;
                let mut s = serializer.serialize_struct("AssemblyVersionOptions", 2)?;
                if let Some(version) = &self.version {
                    s.serialize_field("version", version)?;
                }
                if let Some(precision) = &self.precision {
                    s.serialize_field("precision", precision)?;
                }
                s.end()
            }
        }
    }
}

/// The `nugetPackageVersion` section.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NuGetPackageVersionOptions {
    #[serde(rename = "semVer", skip_serializing_if = "Option::is_none")]
    sem_ver: Option<u8>,
    #[serde(skip)]
    frozen: bool,
}

impl NuGetPackageVersionOptions {
    pub fn new(sem_ver: Option<u8>) -> Self {
        Self {
            sem_ver,
            frozen: false,
        }
    }

    pub fn sem_ver(&self) -> Option<u8> {
        self.sem_ver
    }

    pub fn sem_ver_or_default(&self) -> u8 {
        self.sem_ver.unwrap_or(1)
    }

    pub fn set_sem_ver(&mut self, sem_ver: Option<u8>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        if let Some(v) = sem_ver {
            if v != 1 && v != 2 {
                return Err(GraphverError::InvalidConfiguration(format!(
                    "nugetPackageVersion.semVer must be 1 or 2, got {v}"
                )));
            }
        }
        self.sem_ver = sem_ver;
        Ok(())
    }

    fn freeze(&mut self) {
        self.frozen = true;
    }

    fn validate(&self) -> Result<()> {
        match self.sem_ver {
            None | Some(1) | Some(2) => Ok(()),
            Some(v) => Err(GraphverError::InvalidConfiguration(format!(
                "nugetPackageVersion.semVer must be 1 or 2, got {v}"
            ))),
        }
    }
}

impl Clone for NuGetPackageVersionOptions {
    fn clone(&self) -> Self {
        Self::new(self.sem_ver)
    }
}

impl PartialEq for NuGetPackageVersionOptions {
    fn eq(&self, other: &Self) -> bool {
        self.sem_ver_or_default() == other.sem_ver_or_default()
    }
}

impl Eq for NuGetPackageVersionOptions {}

impl Hash for NuGetPackageVersionOptions {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sem_ver_or_default().hash(state);
    }
}

/// The `cloudBuild.buildNumber.includeCommitId` section.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct IncludeCommitIdOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    when: Option<IncludeCommitIdWhen>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    placement: Option<CommitIdPlacement>,
    #[serde(skip)]
    frozen: bool,
}

impl IncludeCommitIdOptions {
    pub fn new(when: Option<IncludeCommitIdWhen>, placement: Option<CommitIdPlacement>) -> Self {
        Self {
            when,
            placement,
            frozen: false,
        }
    }

    pub fn when_or_default(&self) -> IncludeCommitIdWhen {
        self.when.unwrap_or(IncludeCommitIdWhen::NonPublicReleaseOnly)
    }

    pub fn placement_or_default(&self) -> CommitIdPlacement {
        self.placement.unwrap_or(CommitIdPlacement::BuildMetadata)
    }

    pub fn set_when(&mut self, when: Option<IncludeCommitIdWhen>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        self.when = when;
        Ok(())
    }

    pub fn set_placement(&mut self, placement: Option<CommitIdPlacement>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        self.placement = placement;
        Ok(())
    }

    fn freeze(&mut self) {
        self.frozen = true;
    }
}

impl Clone for IncludeCommitIdOptions {
    fn clone(&self) -> Self {
        Self::new(self.when, self.placement)
    }
}

impl PartialEq for IncludeCommitIdOptions {
    fn eq(&self, other: &Self) -> bool {
        self.when_or_default() == other.when_or_default()
            && self.placement_or_default() == other.placement_or_default()
    }
}

impl Eq for IncludeCommitIdOptions {}

impl Hash for IncludeCommitIdOptions {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.when_or_default().hash(state);
        self.placement_or_default().hash(state);
    }
}

/// The `cloudBuild.buildNumber` section.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CloudBuildNumberOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
    #[serde(rename = "includeCommitId", skip_serializing_if = "Option::is_none")]
    include_commit_id: Option<IncludeCommitIdOptions>,
    #[serde(skip)]
    frozen: bool,
}

impl CloudBuildNumberOptions {
    pub fn new(enabled: Option<bool>, include_commit_id: Option<IncludeCommitIdOptions>) -> Self {
        Self {
            enabled,
            include_commit_id,
            frozen: false,
        }
    }

    pub fn enabled_or_default(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    pub fn include_commit_id_or_default(&self) -> IncludeCommitIdOptions {
        self.include_commit_id.clone().unwrap_or_default()
    }

    pub fn set_enabled(&mut self, enabled: Option<bool>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        self.enabled = enabled;
        Ok(())
    }

    pub fn set_include_commit_id(&mut self, options: Option<IncludeCommitIdOptions>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        self.include_commit_id = options;
        Ok(())
    }

    fn freeze(&mut self) {
        self.frozen = true;
        if let Some(inner) = &mut self.include_commit_id {
            inner.freeze();
        }
    }
}

impl Clone for CloudBuildNumberOptions {
    fn clone(&self) -> Self {
        Self::new(self.enabled, self.include_commit_id.clone())
    }
}

impl PartialEq for CloudBuildNumberOptions {
    fn eq(&self, other: &Self) -> bool {
        self.enabled_or_default() == other.enabled_or_default()
            && self.include_commit_id_or_default() == other.include_commit_id_or_default()
    }
}

impl Eq for CloudBuildNumberOptions {}

impl Hash for CloudBuildNumberOptions {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.enabled_or_default().hash(state);
        self.include_commit_id_or_default().hash(state);
    }
}

/// The `cloudBuild` section.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CloudBuildOptions {
    #[serde(rename = "setAllVariables", skip_serializing_if = "Option::is_none")]
    set_all_variables: Option<bool>,
    #[serde(rename = "setVersionVariables", skip_serializing_if = "Option::is_none")]
    set_version_variables: Option<bool>,
    #[serde(rename = "buildNumber", skip_serializing_if = "Option::is_none")]
    build_number: Option<CloudBuildNumberOptions>,
    #[serde(skip)]
    frozen: bool,
}

impl CloudBuildOptions {
    pub fn set_all_variables_or_default(&self) -> bool {
        self.set_all_variables.unwrap_or(false)
    }

    pub fn set_version_variables_or_default(&self) -> bool {
        self.set_version_variables.unwrap_or(true)
    }

    pub fn build_number_or_default(&self) -> CloudBuildNumberOptions {
        self.build_number.clone().unwrap_or_default()
    }

    pub fn set_set_all_variables(&mut self, value: Option<bool>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        self.set_all_variables = value;
        Ok(())
    }

    pub fn set_set_version_variables(&mut self, value: Option<bool>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        self.set_version_variables = value;
        Ok(())
    }

    pub fn set_build_number(&mut self, value: Option<CloudBuildNumberOptions>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        self.build_number = value;
        Ok(())
    }

    fn freeze(&mut self) {
        self.frozen = true;
        if let Some(inner) = &mut self.build_number {
            inner.freeze();
        }
    }
}

impl Clone for CloudBuildOptions {
    fn clone(&self) -> Self {
        Self {
            set_all_variables: self.set_all_variables,
            set_version_variables: self.set_version_variables,
            build_number: self.build_number.clone(),
            frozen: false,
        }
    }
}

impl PartialEq for CloudBuildOptions {
    fn eq(&self, other: &Self) -> bool {
        self.set_all_variables_or_default() == other.set_all_variables_or_default()
            && self.set_version_variables_or_default() == other.set_version_variables_or_default()
            && self.build_number_or_default() == other.build_number_or_default()
    }
}

impl Eq for CloudBuildOptions {}

impl Hash for CloudBuildOptions {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.set_all_variables_or_default().hash(state);
        self.set_version_variables_or_default().hash(state);
        self.build_number_or_default().hash(state);
    }
}

/// The `release` section.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ReleaseOptions {
    #[serde(rename = "branchName", skip_serializing_if = "Option::is_none")]
    branch_name: Option<String>,
    #[serde(rename = "versionIncrement", skip_serializing_if = "Option::is_none")]
    version_increment: Option<ReleaseVersionIncrement>,
    #[serde(rename = "firstUnstableTag", skip_serializing_if = "Option::is_none")]
    first_unstable_tag: Option<String>,
    #[serde(skip)]
    frozen: bool,
}

impl ReleaseOptions {
    pub fn branch_name_or_default(&self) -> &str {
        self.branch_name.as_deref().unwrap_or(DEFAULT_RELEASE_BRANCH_NAME)
    }

    pub fn version_increment_or_default(&self) -> ReleaseVersionIncrement {
        self.version_increment.unwrap_or(ReleaseVersionIncrement::Minor)
    }

    pub fn first_unstable_tag_or_default(&self) -> &str {
        self.first_unstable_tag.as_deref().unwrap_or(DEFAULT_FIRST_UNSTABLE_TAG)
    }

    /// Render the branch-name template for a concrete version.
    pub fn branch_name_for(&self, version: &SemanticVersion) -> String {
        self.branch_name_or_default()
            .replace("{version}", &version.to_string())
    }

    pub fn set_branch_name(&mut self, branch_name: Option<String>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        if let Some(name) = &branch_name {
            if !name.contains("{version}") {
                return Err(GraphverError::InvalidConfiguration(format!(
                    "release.branchName must contain the {{version}} token: {name}"
                )));
            }
        }
        self.branch_name = branch_name;
        Ok(())
    }

    pub fn set_version_increment(&mut self, increment: Option<ReleaseVersionIncrement>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        self.version_increment = increment;
        Ok(())
    }

    pub fn set_first_unstable_tag(&mut self, tag: Option<String>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        self.first_unstable_tag = tag;
        Ok(())
    }

    fn freeze(&mut self) {
        self.frozen = true;
    }

    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.branch_name {
            if !name.contains("{version}") {
                return Err(GraphverError::InvalidConfiguration(format!(
                    "release.branchName must contain the {{version}} token: {name}"
                )));
            }
        }
        Ok(())
    }
}

impl Clone for ReleaseOptions {
    fn clone(&self) -> Self {
        Self {
            branch_name: self.branch_name.clone(),
            version_increment: self.version_increment,
            first_unstable_tag: self.first_unstable_tag.clone(),
            frozen: false,
        }
    }
}

impl PartialEq for ReleaseOptions {
    fn eq(&self, other: &Self) -> bool {
        self.branch_name_or_default() == other.branch_name_or_default()
            && self.version_increment_or_default() == other.version_increment_or_default()
            && self.first_unstable_tag_or_default() == other.first_unstable_tag_or_default()
    }
}

impl Eq for ReleaseOptions {}

impl Hash for ReleaseOptions {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.branch_name_or_default().hash(state);
        self.version_increment_or_default().hash(state);
        self.first_unstable_tag_or_default().hash(state);
    }
}

/// The effective `version.json` configuration.
///
/// # Examples
/// ```rust
/// use graphver::VersionOptions;
///
/// let mut options = VersionOptions::from_json(br#"{"version": "1.2-beta"}"#)?;
/// assert_eq!(options.version().unwrap().to_string(), "1.2-beta");
///
/// options.freeze();
/// assert!(options.set_inherit(true).is_err());
///
/// // Cloning a frozen instance yields a mutable copy again.
/// let mut copy = options.clone();
/// copy.set_inherit(true)?;
/// # Ok::<_, graphver::GraphverError>(())
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct VersionOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<SemanticVersion>,
    #[serde(rename = "assemblyVersion", skip_serializing_if = "Option::is_none")]
    assembly_version: Option<AssemblyVersionOptions>,
    #[serde(rename = "versionHeightOffset", skip_serializing_if = "Option::is_none")]
    version_height_offset: Option<i32>,
    #[serde(rename = "semVer1NumericIdentifierPadding", skip_serializing_if = "Option::is_none")]
    semver1_numeric_identifier_padding: Option<u32>,
    #[serde(rename = "gitCommitIdShortFixedLength", skip_serializing_if = "Option::is_none")]
    git_commit_id_short_fixed_length: Option<u32>,
    #[serde(rename = "gitCommitIdShortAutoMinimum", skip_serializing_if = "Option::is_none")]
    git_commit_id_short_auto_minimum: Option<u32>,
    #[serde(rename = "gitCommitIdPrefix", skip_serializing_if = "Option::is_none")]
    git_commit_id_prefix: Option<String>,
    #[serde(rename = "nugetPackageVersion", skip_serializing_if = "Option::is_none")]
    nuget_package_version: Option<NuGetPackageVersionOptions>,
    #[serde(rename = "publicReleaseRefSpec", skip_serializing_if = "Option::is_none")]
    public_release_ref_spec: Option<Vec<String>>,
    #[serde(rename = "cloudBuild", skip_serializing_if = "Option::is_none")]
    cloud_build: Option<CloudBuildOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    release: Option<ReleaseOptions>,
    #[serde(rename = "pathFilters", skip_serializing_if = "Option::is_none")]
    path_filters: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    inherit: bool,
    #[serde(skip)]
    frozen: bool,
}

impl VersionOptions {
    /// Parse and validate a `version.json` document.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let options: VersionOptions = serde_json::from_slice(bytes)?;
        options.validate()?;
        Ok(options)
    }

    /// Build from an already-parsed JSON value (used after inheritance
    /// overlay).
    pub fn from_json_value(value: Value) -> Result<Self> {
        let options: VersionOptions = serde_json::from_value(value)?;
        options.validate()?;
        Ok(options)
    }

    /// Serialize, eliding every field that equals its default.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serialize with defaults spelled out, for schema authoring.
    pub fn to_json_with_defaults(&self) -> Result<String> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.entry("versionHeightOffset")
                .or_insert_with(|| self.version_height_offset_or_default().into());
            map.entry("semVer1NumericIdentifierPadding")
                .or_insert_with(|| self.semver1_numeric_identifier_padding_or_default().into());
            map.entry("gitCommitIdShortFixedLength")
                .or_insert_with(|| self.git_commit_id_short_fixed_length_or_default().into());
            map.entry("gitCommitIdShortAutoMinimum")
                .or_insert_with(|| self.git_commit_id_short_auto_minimum_or_default().into());
            map.entry("gitCommitIdPrefix")
                .or_insert_with(|| self.git_commit_id_prefix_or_default().into());
            map.entry("inherit").or_insert_with(|| self.inherit.into());
        }
        Ok(serde_json::to_string_pretty(&value)?)
    }

    fn validate(&self) -> Result<()> {
        if let Some(prefix) = &self.git_commit_id_prefix {
            validate_commit_id_prefix(prefix)?;
        }
        if let Some(nuget) = &self.nuget_package_version {
            nuget.validate()?;
        }
        if let Some(release) = &self.release {
            release.validate()?;
        }
        if let Some(specs) = &self.public_release_ref_spec {
            for spec in specs {
                regex::Regex::new(spec).map_err(|e| {
                    GraphverError::InvalidConfiguration(format!(
                        "publicReleaseRefSpec entry {spec:?} is not a valid regex: {e}"
                    ))
                })?;
            }
        }
        Ok(())
    }

    pub fn version(&self) -> Option<&SemanticVersion> {
        self.version.as_ref()
    }

    pub fn assembly_version(&self) -> Option<&AssemblyVersionOptions> {
        self.assembly_version.as_ref()
    }

    pub fn version_height_offset(&self) -> Option<i32> {
        self.version_height_offset
    }

    pub fn version_height_offset_or_default(&self) -> i32 {
        self.version_height_offset.unwrap_or(0)
    }

    pub fn semver1_numeric_identifier_padding_or_default(&self) -> u32 {
        self.semver1_numeric_identifier_padding
            .unwrap_or(DEFAULT_SEMVER1_PADDING)
    }

    pub fn git_commit_id_short_fixed_length_or_default(&self) -> u32 {
        self.git_commit_id_short_fixed_length
            .unwrap_or(DEFAULT_SHORT_ID_FIXED_LENGTH)
    }

    pub fn git_commit_id_short_auto_minimum_or_default(&self) -> u32 {
        self.git_commit_id_short_auto_minimum.unwrap_or(0)
    }

    pub fn git_commit_id_prefix_or_default(&self) -> &str {
        self.git_commit_id_prefix
            .as_deref()
            .unwrap_or(DEFAULT_GIT_COMMIT_ID_PREFIX)
    }

    pub fn nuget_package_version_or_default(&self) -> NuGetPackageVersionOptions {
        self.nuget_package_version.clone().unwrap_or_default()
    }

    pub fn public_release_ref_spec_or_default(&self) -> &[String] {
        self.public_release_ref_spec.as_deref().unwrap_or(&[])
    }

    pub fn cloud_build_or_default(&self) -> CloudBuildOptions {
        self.cloud_build.clone().unwrap_or_default()
    }

    pub fn release_or_default(&self) -> ReleaseOptions {
        self.release.clone().unwrap_or_default()
    }

    pub fn path_filters(&self) -> Option<&[String]> {
        self.path_filters.as_deref()
    }

    pub fn inherit(&self) -> bool {
        self.inherit
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn set_version(&mut self, version: Option<SemanticVersion>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        self.version = version;
        Ok(())
    }

    pub fn set_assembly_version(&mut self, value: Option<AssemblyVersionOptions>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        self.assembly_version = value;
        Ok(())
    }

    pub fn set_version_height_offset(&mut self, offset: Option<i32>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        self.version_height_offset = offset;
        Ok(())
    }

    pub fn set_semver1_numeric_identifier_padding(&mut self, padding: Option<u32>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        self.semver1_numeric_identifier_padding = padding;
        Ok(())
    }

    pub fn set_git_commit_id_short_fixed_length(&mut self, length: Option<u32>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        self.git_commit_id_short_fixed_length = length;
        Ok(())
    }

    pub fn set_git_commit_id_short_auto_minimum(&mut self, minimum: Option<u32>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        self.git_commit_id_short_auto_minimum = minimum;
        Ok(())
    }

    pub fn set_git_commit_id_prefix(&mut self, prefix: Option<String>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        if let Some(prefix) = &prefix {
            validate_commit_id_prefix(prefix)?;
        }
        self.git_commit_id_prefix = prefix;
        Ok(())
    }

    pub fn set_nuget_package_version(&mut self, value: Option<NuGetPackageVersionOptions>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        if let Some(nuget) = &value {
            nuget.validate()?;
        }
        self.nuget_package_version = value;
        Ok(())
    }

    pub fn set_public_release_ref_spec(&mut self, specs: Option<Vec<String>>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        self.public_release_ref_spec = specs;
        Ok(())
    }

    pub fn set_cloud_build(&mut self, value: Option<CloudBuildOptions>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        self.cloud_build = value;
        Ok(())
    }

    pub fn set_release(&mut self, value: Option<ReleaseOptions>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        if let Some(release) = &value {
            release.validate()?;
        }
        self.release = value;
        Ok(())
    }

    pub fn set_path_filters(&mut self, filters: Option<Vec<String>>) -> Result<()> {
        ensure_mutable(self.frozen)?;
        self.path_filters = filters;
        Ok(())
    }

    pub fn set_inherit(&mut self, inherit: bool) -> Result<()> {
        ensure_mutable(self.frozen)?;
        self.inherit = inherit;
        Ok(())
    }

    /// One-way, deep transition to immutable. Idempotent.
    pub fn freeze(&mut self) {
        self.frozen = true;
        if let Some(inner) = &mut self.assembly_version {
            inner.freeze();
        }
        if let Some(inner) = &mut self.nuget_package_version {
            inner.freeze();
        }
        if let Some(inner) = &mut self.cloud_build {
            inner.freeze();
        }
        if let Some(inner) = &mut self.release {
            inner.freeze();
        }
    }
}

impl Clone for VersionOptions {
    /// Clones are always mutable, whatever the source's freeze state.
    fn clone(&self) -> Self {
        Self {
            version: self.version.clone(),
            assembly_version: self.assembly_version.clone(),
            version_height_offset: self.version_height_offset,
            semver1_numeric_identifier_padding: self.semver1_numeric_identifier_padding,
            git_commit_id_short_fixed_length: self.git_commit_id_short_fixed_length,
            git_commit_id_short_auto_minimum: self.git_commit_id_short_auto_minimum,
            git_commit_id_prefix: self.git_commit_id_prefix.clone(),
            nuget_package_version: self.nuget_package_version.clone(),
            public_release_ref_spec: self.public_release_ref_spec.clone(),
            cloud_build: self.cloud_build.clone(),
            release: self.release.clone(),
            path_filters: self.path_filters.clone(),
            inherit: self.inherit,
            frozen: false,
        }
    }
}

impl PartialEq for VersionOptions {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.assembly_version.clone().unwrap_or_default()
                == other.assembly_version.clone().unwrap_or_default()
            && self.version_height_offset_or_default() == other.version_height_offset_or_default()
            && self.semver1_numeric_identifier_padding_or_default()
                == other.semver1_numeric_identifier_padding_or_default()
            && self.git_commit_id_short_fixed_length_or_default()
                == other.git_commit_id_short_fixed_length_or_default()
            && self.git_commit_id_short_auto_minimum_or_default()
                == other.git_commit_id_short_auto_minimum_or_default()
            && self.git_commit_id_prefix_or_default() == other.git_commit_id_prefix_or_default()
            && self.nuget_package_version_or_default() == other.nuget_package_version_or_default()
            && self.public_release_ref_spec_or_default() == other.public_release_ref_spec_or_default()
            && self.cloud_build_or_default() == other.cloud_build_or_default()
            && self.release_or_default() == other.release_or_default()
            && self.path_filters.as_deref().unwrap_or(&[]) == other.path_filters.as_deref().unwrap_or(&[])
            && self.inherit == other.inherit
    }
}

impl Eq for VersionOptions {}

impl Hash for VersionOptions {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.version.hash(state);
        self.assembly_version.clone().unwrap_or_default().hash(state);
        self.version_height_offset_or_default().hash(state);
        self.semver1_numeric_identifier_padding_or_default().hash(state);
        self.git_commit_id_short_fixed_length_or_default().hash(state);
        self.git_commit_id_short_auto_minimum_or_default().hash(state);
        self.git_commit_id_prefix_or_default().hash(state);
        self.nuget_package_version_or_default().hash(state);
        self.public_release_ref_spec_or_default().hash(state);
        self.cloud_build_or_default().hash(state);
        self.release_or_default().hash(state);
        self.path_filters.as_deref().unwrap_or(&[]).hash(state);
        self.inherit.hash(state);
    }
}

fn validate_commit_id_prefix(prefix: &str) -> Result<()> {
    let mut chars = prefix.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => Ok(()),
        _ => Err(GraphverError::InvalidCommitIdPrefix(prefix.to_string())),
    }
}

/// Overlay a child JSON document onto a parent: child scalars and arrays
/// replace, objects merge key by key.
pub(crate) fn overlay_json(parent: &mut Value, child: Value) {
    match (parent, child) {
        (Value::Object(parent_map), Value::Object(child_map)) => {
            for (key, child_value) in child_map {
                match parent_map.get_mut(&key) {
                    Some(parent_value) if parent_value.is_object() && child_value.is_object() => {
                        overlay_json(parent_value, child_value);
                    }
                    _ => {
                        parent_map.insert(key, child_value);
                    }
                }
            }
        }
        (parent_slot, child_value) => *parent_slot = child_value,
    }
}
