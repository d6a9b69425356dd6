use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{KvStore, StoreResult};

type Entries = BTreeMap<String, String>;

/// JSON object on disk, one string value per key.
///
/// Every write rewrites the whole file through a temp file in the same
/// directory followed by a rename, so readers never see a torn file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: tokio::sync::Mutex::new(()) }
    }

    /// Create the parent directory and check the existing file, if any, parses.
    pub async fn ensure_parent(&self) -> StoreResult<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            fs::create_dir_all(parent_dir(&path))?;
            Self::read_entries(&path).map(|_| ())
        })
        .await?
    }

    fn read_entries(path: &Path) -> StoreResult<Entries> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(Entries::new());
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn write_entries(path: &Path, entries: &Entries) -> StoreResult<()> {
        let dir = parent_dir(path);
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, entries)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    async fn update(&self, entries: Vec<(String, String)>) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let mut current = Self::read_entries(&path)?;
            current.extend(entries);
            Self::write_entries(&path, &current)
        })
        .await?
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

#[async_trait::async_trait]
impl KvStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.path.clone();
        let mut entries = tokio::task::spawn_blocking(move || Self::read_entries(&path)).await??;
        Ok(entries.remove(key))
    }

    async fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        self.update(vec![(key.to_owned(), value.to_owned())]).await
    }

    async fn put_many(&self, entries: &[(&str, &str)]) -> StoreResult<()> {
        let owned = entries
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        self.update(owned).await
    }
}
