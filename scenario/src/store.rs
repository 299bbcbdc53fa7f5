//! Scenario store: a flat registry file plus one JSON blob per scenario.
//!
//! # Layout
//! ```text
//! <root>/pickleDict.txt   registry, one "<blob>: <key>" line per scenario
//! <root>/pickle1          blob (ScenarioRecord as JSON)
//! <root>/pickle2
//! ```
//! Blob names are the first free `pickle<N>` in the directory. Replay keys
//! are allocated by [`next_key`]. The store assumes a single writer; there
//! is no locking.

use crate::{
    error::StoreError,
    record::{ScenarioKey, ScenarioRecord},
};
use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const REGISTRY_FILE: &str = "pickleDict.txt";
pub const BLOB_PREFIX: &str = "pickle";
/// Directory under the OS temp dir used when no store path is configured.
pub const DEFAULT_SUBDIR: &str = "or";

type Result<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Registry entries
// ---------------------------------------------------------------------------

/// One registry line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Blob file name inside the store directory
    pub blob: String,
    pub key: ScenarioKey,
}

impl RegistryEntry {
    fn parse(line: &str) -> Result<Self> {
        let corrupt = || StoreError::CorruptRegistry {
            line: line.to_owned(),
        };
        let (blob, key) = line.rsplit_once(':').ok_or_else(corrupt)?;
        let blob = blob.trim();
        if blob.is_empty() || blob.contains(|c| c == '/' || c == '\\') || blob.starts_with('.') {
            return Err(corrupt());
        }
        let key = key.trim().parse().map_err(|_| corrupt())?;
        Ok(Self {
            blob: blob.to_owned(),
            key,
        })
    }
}

impl fmt::Display for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.blob, self.key)
    }
}

/// Next replay key: the smallest free value above the lowest key in use,
/// or `0001` for an empty registry.
///
/// This deliberately is not `max + 1`: with keys `{1, 3, 4}` the next key is
/// `2`, while with `{3}` it is `4`.
pub fn next_key(existing: &[ScenarioKey]) -> Result<ScenarioKey> {
    let Some(lowest) = existing.iter().min() else {
        return Ok(ScenarioKey::FIRST);
    };
    let taken: HashSet<u32> = existing.iter().map(|k| u32::from(k.get())).collect();
    let mut candidate = u32::from(lowest.get()) + 1;
    while taken.contains(&candidate) {
        candidate += 1;
    }
    ScenarioKey::new(candidate).ok_or(StoreError::KeysExhausted)
}

fn read_registry(dir: &Path) -> Result<Vec<RegistryEntry>> {
    let path = dir.join(REGISTRY_FILE);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StoreError::NoRegistry(dir.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(RegistryEntry::parse)
        .collect()
}

fn write_registry(dir: &Path, entries: &[RegistryEntry]) -> Result<()> {
    let lines: Vec<String> = entries.iter().map(ToString::to_string).collect();
    fs::write(dir.join(REGISTRY_FILE), lines.join("\n"))?;
    Ok(())
}

/// Check that `dir` holds a registry and nothing but the blobs it names.
/// Returns the registry entries.
pub fn validate_dir(dir: &Path) -> Result<Vec<RegistryEntry>> {
    let not_importable = |reason: String| StoreError::NotImportable {
        path: dir.to_path_buf(),
        reason,
    };
    let entries = match read_registry(dir) {
        Ok(entries) => entries,
        Err(StoreError::NoRegistry(_)) => return Err(not_importable(format!("no {REGISTRY_FILE}"))),
        Err(e) => return Err(e),
    };

    let referenced: HashSet<&str> = entries.iter().map(|e| e.blob.as_str()).collect();
    for item in fs::read_dir(dir)? {
        let name = item?.file_name();
        let name = name.to_string_lossy();
        if name != REGISTRY_FILE && !referenced.contains(name.as_ref()) {
            return Err(not_importable(format!("unexpected file {name}")));
        }
    }
    for entry in &entries {
        if !dir.join(&entry.blob).is_file() {
            return Err(not_importable(format!(
                "blob {} for key {} is missing",
                entry.blob, entry.key
            )));
        }
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Handle on a scenario directory. Cheap to create; touches disk lazily.
#[derive(Clone, Debug)]
pub struct ScenarioStore {
    root: PathBuf,
}

impl ScenarioStore {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<temp dir>/or`
    pub fn default_location() -> Self {
        Self::open(std::env::temp_dir().join(DEFAULT_SUBDIR))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry_path(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    /// Registry entries in file order. Fails with [`StoreError::NoRegistry`]
    /// when nothing was ever written, which differs from an empty registry.
    pub fn entries(&self) -> Result<Vec<RegistryEntry>> {
        read_registry(&self.root)
    }

    pub fn list_keys(&self) -> Result<Vec<ScenarioKey>> {
        Ok(self.entries()?.into_iter().map(|e| e.key).collect())
    }

    /// Persist `record` under a fresh key.
    pub fn write(&self, record: &ScenarioRecord) -> Result<ScenarioKey> {
        record.validate().map_err(StoreError::InvalidRecord)?;
        fs::create_dir_all(&self.root)?;

        let existing = match self.entries() {
            Ok(entries) => entries,
            Err(StoreError::NoRegistry(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        let keys: Vec<ScenarioKey> = existing.iter().map(|e| e.key).collect();
        let key = next_key(&keys)?;

        let (blob, file) = self.create_blob()?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, record)?;
        writer.flush()?;

        let registry_path = self.registry_path();
        let needs_separator = fs::metadata(&registry_path).map(|m| m.len() > 0).unwrap_or(false);
        let mut registry = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&registry_path)?;
        let entry = RegistryEntry { blob, key };
        if needs_separator {
            write!(registry, "\n{entry}")?;
        } else {
            write!(registry, "{entry}")?;
        }

        tracing::info!(%key, blob = %entry.blob, npcs = record.len(), "scenario stored");
        Ok(key)
    }

    /// First free `pickle<N>`, created exclusively.
    fn create_blob(&self) -> Result<(String, File)> {
        let mut n = 1u32;
        loop {
            let name = format!("{BLOB_PREFIX}{n}");
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.root.join(&name))
            {
                Ok(file) => return Ok((name, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Load the record stored under `key`.
    pub fn read(&self, key: ScenarioKey) -> Result<ScenarioRecord> {
        let entry = self
            .entries()?
            .into_iter()
            .find(|e| e.key == key)
            .ok_or(StoreError::KeyNotFound(key))?;
        let path = self.root.join(&entry.blob);
        let corrupt = |reason: String| StoreError::CorruptBlob {
            path: path.clone(),
            reason,
        };

        let file = File::open(&path).map_err(|e| corrupt(e.to_string()))?;
        let record: ScenarioRecord =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| corrupt(e.to_string()))?;
        record.validate().map_err(corrupt)?;
        Ok(record)
    }

    /// Delete every stored scenario. Missing directory is not an error.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => {
                tracing::info!(root = %self.root.display(), "scenario store cleared");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// `dir` resolves to the store root. A path that does not exist yet
    /// never does.
    fn is_own_dir(&self, dir: &Path) -> bool {
        match (fs::canonicalize(&self.root), fs::canonicalize(dir)) {
            (Ok(root), Ok(dir)) => root == dir,
            _ => false,
        }
    }

    /// Copy the scenarios for `keys` into `dest` with a registry of their own.
    pub fn export(&self, keys: &[ScenarioKey], dest: &Path) -> Result<usize> {
        if self.is_own_dir(dest) {
            return Err(StoreError::OwnDirectory(dest.to_path_buf()));
        }
        let entries = self.entries()?;
        if let Some(missing) = keys.iter().find(|k| !entries.iter().any(|e| e.key == **k)) {
            return Err(StoreError::KeyNotFound(*missing));
        }
        let selected: Vec<RegistryEntry> = entries
            .into_iter()
            .filter(|e| keys.contains(&e.key))
            .collect();

        fs::create_dir_all(dest)?;
        for entry in &selected {
            fs::copy(self.root.join(&entry.blob), dest.join(&entry.blob))?;
        }
        write_registry(dest, &selected)?;

        tracing::info!(count = selected.len(), dest = %dest.display(), "scenarios exported");
        Ok(selected.len())
    }

    /// Replace the store's contents with an exported directory.
    ///
    /// `src` is validated first; an empty registry leaves the store untouched.
    pub fn import(&self, src: &Path) -> Result<Vec<ScenarioKey>> {
        if self.is_own_dir(src) {
            return Err(StoreError::OwnDirectory(src.to_path_buf()));
        }
        let entries = validate_dir(src)?;
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        self.clear()?;
        fs::create_dir_all(&self.root)?;
        for item in fs::read_dir(src)? {
            let item = item?;
            if item.file_type()?.is_file() {
                fs::copy(item.path(), self.root.join(item.file_name()))?;
            }
        }

        tracing::info!(count = entries.len(), src = %src.display(), "scenarios imported");
        Ok(entries.into_iter().map(|e| e.key).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
