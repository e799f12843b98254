use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use index_core::{DEFAULT_INDEX_MODE, HomeConfig, VersionIndex};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "bundle-index", version, about = "Inspect and update a versioned bundle index")]
struct Cli {
    /// Home directory (defaults to BUNDLE_HOME, then ~/.bundle)
    #[arg(long, value_name = "DIR", global = true)]
    home: Option<PathBuf>,

    /// Index file to operate on (defaults to <home>/index.json)
    #[arg(long, value_name = "FILE", global = true)]
    index: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the digest of the highest version matching a constraint
    Get {
        name: String,
        /// Version constraint, e.g. `^1.2` or `>=1.0, <2.0` (any version if omitted)
        #[arg(long, short = 'v', default_value = "")]
        version: String,
    },
    /// Record a digest for an exact name and version
    Add {
        name: String,
        version: String,
        digest: String,
    },
    /// Drop a single name/version entry
    Remove { name: String, version: String },
    /// Fill gaps in the index from one or more other index files
    Merge {
        #[arg(required = true, value_name = "SOURCE")]
        sources: Vec<PathBuf>,
    },
    /// List entries, optionally for a single name
    List { name: Option<String> },
    /// Show the resolved home layout
    Paths,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let stdout = io::stdout();
    if let Err(err) = run(cli, HomeConfig::from_env(), &mut stdout.lock()) {
        error!("{err:#}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli, cfg: HomeConfig, out: &mut impl Write) -> Result<()> {
    let cfg = match cli.home {
        Some(home) => cfg.with_home(home),
        None => cfg,
    };
    let index_path = cli.index.unwrap_or_else(|| cfg.home.index());

    match cli.command {
        Command::Get { name, version } => {
            let index = open_index(&index_path)?;
            let digest = index
                .get(&name, &version)
                .with_context(|| format!("failed to resolve {name}"))?;
            writeln!(out, "{digest}")?;
        }
        Command::Add {
            name,
            version,
            digest,
        } => {
            let mut index = open_index(&index_path)?;
            index.add(name.as_str(), version.as_str(), digest);
            save_index(&index, &index_path)?;
            info!(%name, %version, "added entry");
        }
        Command::Remove { name, version } => {
            let mut index = open_index(&index_path)?;
            if index.remove(&name, &version).is_none() {
                anyhow::bail!("{name}@{version} is not in {}", index_path.display());
            }
            save_index(&index, &index_path)?;
            info!(%name, %version, "removed entry");
        }
        Command::Merge { sources } => {
            let mut index = open_index(&index_path)?;
            let mut added = 0;
            for source in &sources {
                let file = File::open(source)
                    .with_context(|| format!("failed to open index {}", source.display()))?;
                let incoming = VersionIndex::from_reader(file)
                    .with_context(|| format!("failed to read index {}", source.display()))?;
                added += index.merge(&incoming);
            }
            save_index(&index, &index_path)?;
            writeln!(out, "added {added} entries")?;
        }
        Command::List { name } => {
            let index = open_index(&index_path)?;
            for (entry, version, digest) in index.iter() {
                if name.as_deref().is_none_or(|wanted| wanted == entry) {
                    writeln!(out, "{entry} {version} {digest}")?;
                }
            }
        }
        Command::Paths => {
            writeln!(out, "home    {}", cfg.home)?;
            writeln!(out, "config  {}", cfg.home.config().display())?;
            writeln!(out, "logs    {}", cfg.home.logs().display())?;
            writeln!(out, "plugins {}", cfg.plugins().display())?;
            writeln!(out, "index   {}", index_path.display())?;
        }
    }
    Ok(())
}

fn open_index(path: &Path) -> Result<VersionIndex> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    VersionIndex::load(path).with_context(|| format!("failed to load index {}", path.display()))
}

fn save_index(index: &VersionIndex, path: &Path) -> Result<()> {
    index
        .write_file(path, DEFAULT_INDEX_MODE)
        .with_context(|| format!("failed to write index {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg_for(home: &Path) -> HomeConfig {
        let root = home.to_string_lossy().into_owned();
        HomeConfig::from_lookup(move |key| (key == "BUNDLE_HOME").then(|| root.clone()))
    }

    fn exec(home: &Path, args: &[&str]) -> Result<String> {
        let argv = std::iter::once("bundle-index").chain(args.iter().copied());
        let cli = Cli::try_parse_from(argv)?;
        let mut out = Vec::new();
        run(cli, cfg_for(home), &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn add_get_list() -> Result<()> {
        let temp = tempfile::tempdir()?;
        exec(temp.path(), &["add", "mybundle", "1.0.0", "sha256:aaa"])?;
        exec(temp.path(), &["add", "mybundle", "1.2.0", "sha256:bbb"])?;

        assert_eq!(exec(temp.path(), &["get", "mybundle"])?, "sha256:bbb\n");
        assert_eq!(
            exec(temp.path(), &["get", "mybundle", "--version", "~1.0"])?,
            "sha256:aaa\n"
        );
        assert_eq!(
            exec(temp.path(), &["list", "mybundle"])?,
            "mybundle 1.0.0 sha256:aaa\nmybundle 1.2.0 sha256:bbb\n"
        );
        assert!(temp.path().join("index.json").exists());
        Ok(())
    }

    #[test]
    fn get_unknown_name_fails() -> Result<()> {
        let temp = tempfile::tempdir()?;
        assert!(exec(temp.path(), &["get", "nothing"]).is_err());
        Ok(())
    }

    #[test]
    fn merge_fills_gaps_only() -> Result<()> {
        let temp = tempfile::tempdir()?;
        exec(temp.path(), &["add", "a", "1.0.0", "D1"])?;

        let source = temp.path().join("remote.json");
        fs::write(&source, r#"{"a": {"1.0.0": "D2", "1.1.0": "D3"}}"#)?;
        let source_arg = source.to_string_lossy().into_owned();
        assert_eq!(exec(temp.path(), &["merge", &source_arg])?, "added 1 entries\n");

        assert_eq!(exec(temp.path(), &["get", "a", "-v", "1.0.0"])?, "D1\n");
        assert_eq!(exec(temp.path(), &["get", "a", "-v", "1.1.0"])?, "D3\n");
        Ok(())
    }

    #[test]
    fn remove_missing_entry_fails() -> Result<()> {
        let temp = tempfile::tempdir()?;
        exec(temp.path(), &["add", "a", "1.0.0", "D1"])?;
        assert!(exec(temp.path(), &["remove", "a", "2.0.0"]).is_err());
        exec(temp.path(), &["remove", "a", "1.0.0"])?;
        assert_eq!(exec(temp.path(), &["list"])?, "");
        Ok(())
    }

    #[test]
    fn explicit_index_path() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let custom = temp.path().join("nested/custom.json");
        let custom_arg = custom.to_string_lossy().into_owned();
        exec(temp.path(), &["--index", &custom_arg, "add", "x", "0.1.0", "d"])?;
        assert!(custom.exists());
        let paths = exec(temp.path(), &["--index", &custom_arg, "paths"])?;
        assert!(paths.contains("custom.json"));
        assert!(paths.contains("config.toml"));
        Ok(())
    }
}
