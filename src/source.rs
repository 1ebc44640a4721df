use anyhow::{anyhow, bail, Context};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use zip::ZipArchive;

/// Read-only access to the dashboard documents by relative reference.
pub trait DocumentSource: Send + Sync {
    fn describe(&self) -> String;
    fn kind(&self) -> &'static str;
    fn fetch(&self, reference: &str) -> anyhow::Result<Vec<u8>>;
    fn contains(&self, reference: &str) -> bool;
}

pub fn normalize_reference(reference: &str) -> anyhow::Result<String> {
    let cleaned = reference.trim().replace('\\', "/");
    if cleaned.is_empty() {
        bail!("empty document reference");
    }
    let mut parts: Vec<String> = Vec::new();
    for c in Path::new(&cleaned).components() {
        match c {
            Component::Normal(p) => parts.push(p.to_string_lossy().to_string()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                bail!("document reference escapes the dataset root: {reference}");
            }
        }
    }
    if parts.is_empty() {
        bail!("empty document reference");
    }
    Ok(parts.join("/"))
}

pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl DocumentSource for DirSource {
    fn describe(&self) -> String {
        self.root.to_string_lossy().to_string()
    }

    fn kind(&self) -> &'static str {
        "directory"
    }

    fn fetch(&self, reference: &str) -> anyhow::Result<Vec<u8>> {
        let rel = normalize_reference(reference)?;
        let path = self.root.join(&rel);
        std::fs::read(&path).with_context(|| format!("failed to read {}", path.to_string_lossy()))
    }

    fn contains(&self, reference: &str) -> bool {
        normalize_reference(reference)
            .map(|rel| self.root.join(rel).is_file())
            .unwrap_or(false)
    }
}

/// A zipped copy of the dataset tree, read fully into memory on open.
pub struct BundleSource {
    path: PathBuf,
    entries: HashMap<String, Vec<u8>>,
}

impl BundleSource {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open bundle {}", path.to_string_lossy()))?;
        let mut zip = ZipArchive::new(file).context("failed to read zip bundle")?;

        let mut entries = HashMap::new();
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i).context("failed to read zip entry")?;
            if entry.is_dir() {
                continue;
            }
            let Ok(name) = normalize_reference(entry.name()) else {
                tracing::warn!(entry = entry.name(), "skipping unsafe bundle entry");
                continue;
            };
            // The header's declared size is not trusted for allocation.
            let mut bytes = Vec::new();
            entry
                .read_to_end(&mut bytes)
                .with_context(|| format!("failed to read bundle entry {name}"))?;
            entries.insert(name, bytes);
        }

        // Bundles zipped from a parent folder carry one shared top-level directory.
        let entries = strip_common_root(entries);
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }
}

fn strip_common_root(entries: HashMap<String, Vec<u8>>) -> HashMap<String, Vec<u8>> {
    let mut roots = entries.keys().map(|k| k.split_once('/').map(|(head, _)| head));
    let Some(Some(first)) = roots.next() else {
        return entries;
    };
    let first = first.to_string();
    if !roots.all(|r| r == Some(first.as_str())) {
        return entries;
    }
    let prefix = format!("{first}/");
    entries
        .into_iter()
        .map(|(k, v)| match k.strip_prefix(prefix.as_str()) {
            Some(rest) => (rest.to_string(), v),
            None => (k, v),
        })
        .collect()
}

impl DocumentSource for BundleSource {
    fn describe(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    fn kind(&self) -> &'static str {
        "bundle"
    }

    fn fetch(&self, reference: &str) -> anyhow::Result<Vec<u8>> {
        let rel = normalize_reference(reference)?;
        self.entries
            .get(&rel)
            .cloned()
            .ok_or_else(|| anyhow!("bundle has no entry {rel}"))
    }

    fn contains(&self, reference: &str) -> bool {
        normalize_reference(reference)
            .map(|rel| self.entries.contains_key(&rel))
            .unwrap_or(false)
    }
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open {}", path.to_string_lossy()))?;
    let mut sig = [0_u8; 4];
    let n = f.read(&mut sig)?;
    Ok(n == 4 && sig == [b'P', b'K', 0x03, 0x04])
}

pub fn open_source(path: &Path) -> anyhow::Result<Box<dyn DocumentSource>> {
    if path.is_dir() {
        return Ok(Box::new(DirSource::new(path)));
    }
    if !path.is_file() {
        bail!("dataset not found: {}", path.to_string_lossy());
    }
    if !is_zip_file(path)? {
        bail!(
            "dataset must be a directory or a zip bundle: {}",
            path.to_string_lossy()
        );
    }
    Ok(Box::new(BundleSource::open(path)?))
}
