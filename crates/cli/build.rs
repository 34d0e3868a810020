use std::env;
use std::path::PathBuf;

fn main() {
    let version = calculate_own_version();
    println!("cargo:rustc-env=GRAPHVER_CALCULATED_VERSION={}", version);

    // shadow-rs generates extended build metadata (git hash, timestamps, rustc version)
    shadow_rs::ShadowBuilder::builder()
        .build()
        .expect("shadow-rs build failed");
}

fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    manifest_dir
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn calculate_own_version() -> String {
    // The tool versions itself: run the oracle over its own workspace and
    // fall back to the manifest version outside a usable checkout.
    match graphver::get_version_with_fallback(workspace_root()) {
        Ok(oracle) if oracle.committed_options().is_some() || oracle.working_options().is_some() => {
            oracle.sem_ver2()
        }
        _ => env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0-dev".to_string()),
    }
}
