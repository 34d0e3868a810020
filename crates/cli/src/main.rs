//! graphver CLI - derive reproducible versions from Git history without tags

use clap::{ArgAction, CommandFactory, FromArgMatches, Parser};
use std::path::PathBuf;
use std::process::exit;
use std::str::FromStr;

use graphver::{GraphverError, OracleSettings, VersionOracle};
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

shadow_rs::shadow!(build);
const CLI_VERSION: &str = env!("GRAPHVER_CALCULATED_VERSION");

/// Verbosity levels for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    Debug,
    Trace,
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quiet" => Ok(Verbosity::Quiet),
            "normal" => Ok(Verbosity::Normal),
            "verbose" | "info" => Ok(Verbosity::Verbose),
            "debug" => Ok(Verbosity::Debug),
            "trace" => Ok(Verbosity::Trace),
            _ => Err(format!("Invalid verbosity level: {}", s)),
        }
    }
}

/// Output format for the computed version family.
#[derive(Debug, Clone, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {}", s)),
        }
    }
}

/// graphver - versions derived from Git history, no tags required
#[derive(Parser, Debug, Clone)]
#[command(name = "graphver")]
#[command(about = "Derive version numbers from Git history and version.json")]
#[command(version = CLI_VERSION)]
struct Args {
    /// Working directory to analyze (defaults to current directory)
    #[arg(default_value = ".")]
    working_directory: PathBuf,

    /// Commit-ish to inspect instead of HEAD
    #[arg(short = 'c', long = "committish")]
    committish: Option<String>,

    /// Repo-relative project directory whose version.json governs
    #[arg(short = 'p', long = "project", env = "GRAPHVERPROJECT")]
    project: Option<String>,

    /// Ref being built, for the public-release determination
    #[arg(short = 'r', long = "building-ref", env = "GRAPHVERBUILDINGREF")]
    building_ref: Option<String>,

    /// Force the public-release determination
    #[arg(long = "public-release", action = ArgAction::SetTrue, env = "GRAPHVERPUBLICRELEASE")]
    public_release: bool,

    /// Print a single value (e.g. SemVer2, NuGetPackageVersion, VersionHeight)
    #[arg(long = "variable")]
    variable: Option<String>,

    /// Output format (text, json)
    #[arg(short = 'f', long = "format", value_parser = parse_format)]
    format: Option<OutputFormat>,

    /// Verbosity level (quiet, normal, verbose, debug, trace)
    #[arg(short = 'v', long = "verbosity", value_parser = parse_verbosity, env = "GRAPHVERVERBOSITY")]
    verbosity: Option<Verbosity>,
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    s.parse::<OutputFormat>()
}

fn parse_verbosity(s: &str) -> Result<Verbosity, String> {
    s.parse::<Verbosity>()
}

fn main() {
    let long_ver: &'static str = Box::leak(long_version().into_boxed_str());

    let mut cmd = Args::command();
    cmd = cmd.version(CLI_VERSION).long_version(long_ver);
    let args = Args::from_arg_matches(&cmd.get_matches()).unwrap_or_else(|e| e.exit());

    // Set up logging based on verbosity level
    let verbosity = args.verbosity.clone().unwrap_or(Verbosity::Normal);
    let tracing_level = match verbosity {
        Verbosity::Quiet => tracing::Level::ERROR,
        Verbosity::Normal => tracing::Level::WARN,
        Verbosity::Verbose => tracing::Level::INFO,
        Verbosity::Debug => tracing::Level::DEBUG,
        Verbosity::Trace => tracing::Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let settings = OracleSettings {
        project_dir: args.project.clone().unwrap_or_default(),
        building_ref: args.building_ref.clone(),
        public_release: args.public_release.then_some(true),
        ..Default::default()
    };
    debug!("Using settings: {:?}", settings);

    let result = graphver::get_version_with(
        args.working_directory.clone(),
        args.committish.as_deref(),
        &settings,
    );

    let code = match result {
        Ok(oracle) => {
            info!("Calculated version: {}", oracle);
            match print_oracle(&args, &oracle) {
                Ok(()) => 0,
                Err(e) => {
                    error!("{}", e);
                    2
                }
            }
        }
        Err(e) => {
            match e {
                GraphverError::GitRepoNotFound(path) => {
                    error!("'{}' is not a valid Git working directory", path);
                }
                GraphverError::ShallowClone => {
                    error!("{}", GraphverError::ShallowClone);
                }
                other => {
                    error!("Version calculation failed: {}", other);
                }
            }
            2
        }
    };

    exit(code);
}

fn print_oracle(args: &Args, oracle: &VersionOracle) -> anyhow::Result<()> {
    if let Some(variable) = &args.variable {
        println!("{}", variable_value(oracle, variable)?);
        return Ok(());
    }
    match args.format.clone().unwrap_or(OutputFormat::Text) {
        OutputFormat::Text => {
            print_row("Version", oracle.version().to_string_safe(4));
            print_row("AssemblyVersion", oracle.assembly_version().to_string_safe(4));
            print_row("AssemblyInformationalVersion", oracle.assembly_informational_version());
            print_row("NuGetPackageVersion", oracle.nuget_package_version());
            print_row("ChocolateyPackageVersion", oracle.chocolatey_package_version());
            print_row("NpmPackageVersion", oracle.npm_package_version());
            print_row("SemVer1", oracle.sem_ver1());
            print_row("SemVer2", oracle.sem_ver2());
            print_row("VersionHeight", oracle.version_height().to_string());
            print_row("PublicRelease", oracle.public_release().to_string());
            if let Some(commit) = oracle.commit_id() {
                print_row("GitCommitId", commit);
            }
            if let Some(number) = oracle.cloud_build_number() {
                print_row("CloudBuildNumber", number);
            }
        }
        OutputFormat::Json => {
            println!("{}", oracle.serialize_snapshot()?);
        }
    }
    Ok(())
}

fn print_row(name: &str, value: String) {
    println!("{:<29} {}", format!("{name}:"), value);
}

fn variable_value(oracle: &VersionOracle, variable: &str) -> anyhow::Result<String> {
    let value = match variable.to_lowercase().as_str() {
        "version" => oracle.version().to_string_safe(4),
        "simpleversion" => oracle.simple_version(),
        "majorminorversion" => oracle.major_minor_version(),
        "versionheight" => oracle.version_height().to_string(),
        "prereleaseversion" => oracle.prerelease_version(),
        "semver1" => oracle.sem_ver1(),
        "semver2" => oracle.sem_ver2(),
        "nugetpackageversion" => oracle.nuget_package_version(),
        "chocolateypackageversion" => oracle.chocolatey_package_version(),
        "npmpackageversion" => oracle.npm_package_version(),
        "assemblyversion" => oracle.assembly_version().to_string_safe(4),
        "assemblyinformationalversion" => oracle.assembly_informational_version(),
        "publicrelease" => oracle.public_release().to_string(),
        "gitcommitid" => oracle.commit_id().unwrap_or_default(),
        "gitcommitidshort" => oracle.commit_id_short().unwrap_or_default().to_string(),
        "cloudbuildnumber" => oracle.cloud_build_number().unwrap_or_default(),
        other => anyhow::bail!("unknown variable: {other}"),
    };
    Ok(value)
}

fn long_version() -> String {
    format!(
        "{version}\ncommit: {commit} ({date})\nbuild: {build}\nrustc: {rustc}",
        version = CLI_VERSION,
        commit = build::SHORT_COMMIT,
        date = build::COMMIT_DATE,
        build = build::BUILD_TIME,
        rustc = build::RUST_VERSION,
    )
}
