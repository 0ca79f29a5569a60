use std::env;
use std::path::PathBuf;

// Only a directory holding `roles.json` is recorded; the crate sources are
// not a data dir unless the data ships alongside them.
fn main() {
    println!("cargo:rerun-if-env-changed=CAREERS_DATA_ROOT_HINT");

    let hint = env::var("CAREERS_DATA_ROOT_HINT")
        .ok()
        .or_else(|| env::var("CARGO_MANIFEST_DIR").ok());

    if let Some(raw_hint) = hint {
        let candidate = PathBuf::from(raw_hint);
        if !candidate.join("roles.json").is_file() {
            return;
        }
        let canonical = candidate.canonicalize().unwrap_or(candidate);

        println!(
            "cargo:rustc-env=CAREERS_DATA_ROOT_HINT={}",
            canonical.display()
        );
    }
}
