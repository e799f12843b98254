use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use index_core::{DEFAULT_INDEX_MODE, VersionIndex};

fn main() -> Result<()> {
    let dir = env::var("INDEX_EXAMPLE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("index-core-example"));
    std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let local_path = dir.join("index.json");

    let mut local = VersionIndex::load(&local_path)?;
    local.add("demo", "1.0.0", "sha256:local-100");

    let remote = VersionIndex::from_slice(
        br#"{
            "demo": {"1.0.0": "sha256:remote-100", "1.4.2": "sha256:remote-142"},
            "tools": {"0.3.0": "sha256:tools-030"}
        }"#,
    )?;
    let added = local.merge(&remote);
    println!("merged {added} entries from remote");

    for constraint in ["", "1.0.0", "^1.1", "0.x"] {
        match local.get("demo", constraint) {
            Ok(digest) => println!("demo `{constraint}` -> {digest}"),
            Err(err) => println!("demo `{constraint}` -> error: {err}"),
        }
    }

    local.write_file(&local_path, DEFAULT_INDEX_MODE)?;
    println!("index written to {}", local_path.display());
    Ok(())
}
