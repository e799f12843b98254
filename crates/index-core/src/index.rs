use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::constraint::{Constraint, parse_version};
use crate::error::{IndexError, IndexResult};

/// Permission bits used when [`VersionIndex::load`] has to create the file.
pub const DEFAULT_INDEX_MODE: u32 = 0o644;

/// Artifact name -> version -> digest.
///
/// Versions are stored verbatim; only lookups care whether they parse as
/// semantic versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionIndex {
    entries: BTreeMap<String, BTreeMap<String, String>>,
}

impl VersionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens (creating if needed) the index file at `path` and decodes it.
    pub fn load(path: impl AsRef<Path>) -> IndexResult<Self> {
        let path = path.as_ref();
        let mut options = OpenOptions::new();
        options.read(true).append(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(DEFAULT_INDEX_MODE);
        }
        let file = options
            .open(path)
            .map_err(|err| IndexError::io(path, err))?;
        debug!(path = %path.display(), "loading index");
        Self::read_file(file, path)
    }

    fn read_file(file: File, path: &Path) -> IndexResult<Self> {
        let mut bytes = Vec::new();
        BufReader::new(file)
            .read_to_end(&mut bytes)
            .map_err(|err| IndexError::io(path, err))?;
        Self::from_slice(&bytes)
    }

    pub fn from_reader<R: Read>(mut reader: R) -> IndexResult<Self> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|err| IndexError::io("<reader>", err))?;
        Self::from_slice(&bytes)
    }

    /// Decodes a JSON document. Empty (or whitespace-only) input and `null`
    /// both yield an empty index.
    pub fn from_slice(bytes: &[u8]) -> IndexResult<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::new());
        }
        let entries: Option<BTreeMap<String, BTreeMap<String, String>>> =
            serde_json::from_slice(bytes).map_err(IndexError::Decode)?;
        Ok(Self {
            entries: entries.unwrap_or_default(),
        })
    }

    /// Records `digest` for the exact `(name, version)` pair, replacing any
    /// previous digest for that pair.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        version: impl Into<String>,
        digest: impl Into<String>,
    ) {
        self.entries
            .entry(name.into())
            .or_default()
            .insert(version.into(), digest.into());
    }

    /// Drops a single entry, pruning the name once it has no versions left.
    pub fn remove(&mut self, name: &str, version: &str) -> Option<String> {
        let versions = self.entries.get_mut(name)?;
        let removed = versions.remove(version);
        if versions.is_empty() {
            self.entries.remove(name);
        }
        removed
    }

    pub fn has(&self, name: &str, version: &str) -> bool {
        self.get(name, version).is_ok()
    }

    /// Resolves `version` (a constraint, or empty for any version) to a digest.
    ///
    /// Recorded versions that do not parse are skipped. When several versions
    /// satisfy the constraint, the highest one wins.
    pub fn get(&self, name: &str, version: &str) -> IndexResult<&str> {
        let versions = self
            .entries
            .get(name)
            .ok_or_else(|| IndexError::UnknownName {
                name: name.to_string(),
            })?;
        let no_match = || IndexError::NoMatchingVersion {
            name: name.to_string(),
            constraint: version.to_string(),
        };
        if versions.is_empty() {
            return Err(no_match());
        }

        let constraint = Constraint::parse(version)?;
        versions
            .iter()
            .filter_map(|(raw, digest)| match parse_version(raw) {
                Some(parsed) => Some((parsed, digest)),
                None => {
                    trace!(name, version = %raw, "skipping unparseable version");
                    None
                }
            })
            .filter(|(parsed, _)| constraint.matches(parsed))
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, digest)| digest.as_str())
            .ok_or_else(no_match)
    }

    /// Fills gaps from `src`: entries already resolvable here are kept.
    ///
    /// Presence is decided by [`VersionIndex::has`], so a version key that
    /// does not parse is never considered present and is always copied over.
    /// Returns the number of entries added.
    pub fn merge(&mut self, src: &VersionIndex) -> usize {
        let mut added = 0;
        for (name, version, digest) in src.iter() {
            if !self.has(name, version) {
                self.add(name, version, digest);
                added += 1;
            }
        }
        debug!(added, "merged index");
        added
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn versions(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.entries.get(name)
    }

    /// Iterates `(name, version, digest)` triples in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.entries.iter().flat_map(|(name, versions)| {
            versions.iter().map(move |(version, digest)| {
                (name.as_str(), version.as_str(), digest.as_str())
            })
        })
    }

    /// Number of names in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON encoding with 4-space indentation.
    pub fn to_vec_pretty(&self) -> IndexResult<Vec<u8>> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer).map_err(IndexError::Encode)?;
        Ok(out)
    }

    /// Writes the whole index to `dest` in one write; `mode` applies when the
    /// file is created (unix only).
    pub fn write_file(&self, dest: impl AsRef<Path>, mode: u32) -> IndexResult<()> {
        let dest = dest.as_ref();
        let bytes = self.to_vec_pretty()?;
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;
        let mut file = options
            .open(dest)
            .map_err(|err| IndexError::io(dest, err))?;
        file.write_all(&bytes)
            .map_err(|err| IndexError::io(dest, err))?;
        debug!(path = %dest.display(), names = self.len(), "wrote index");
        Ok(())
    }
}
