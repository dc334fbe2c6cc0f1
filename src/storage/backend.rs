use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::catalog::CatalogError;
use super::models::FileRecord;

/// Durable home of the catalog snapshot.
///
/// `save` must be all-or-nothing: after a crash at any point during a save,
/// `load` returns either the previous snapshot or the new one in full.
pub trait CatalogBackend: Send + Sync {
    fn load(&self) -> Result<Vec<FileRecord>, CatalogError>;
    fn save(&self, records: &[FileRecord]) -> Result<(), CatalogError>;
}

/// Catalog stored as a single pretty-printed JSON array, replaced atomically
/// via write-temp, fsync, rename.
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub const FILE_NAME: &'static str = "files.json";

    /// Open the catalog document inside `data_dir`, creating the directory
    /// and removing temp files left behind by an interrupted save.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, CatalogError> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)?;
        let backend = Self {
            path: data_dir.join(Self::FILE_NAME),
        };
        backend.remove_stale_temps()?;
        Ok(backend)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    fn temp_prefix() -> String {
        format!("{}.", Self::FILE_NAME)
    }

    fn remove_stale_temps(&self) -> Result<(), CatalogError> {
        let prefix = Self::temp_prefix();
        for entry in fs::read_dir(self.dir())? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&prefix) && name.ends_with(".tmp") {
                tracing::warn!(file = %name, "Removing stale catalog temp file");
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    /// Write the full snapshot to a fresh temp file next to the catalog and
    /// fsync it. The live document is untouched until [`Self::commit`].
    pub(crate) fn stage(&self, records: &[FileRecord]) -> Result<PathBuf, CatalogError> {
        let temp = self.dir().join(format!(
            "{}{}.tmp",
            Self::temp_prefix(),
            uuid::Uuid::new_v4()
        ));
        let data = serde_json::to_vec_pretty(records)?;

        let staged = (|| -> std::io::Result<()> {
            let mut file = File::create(&temp)?;
            file.write_all(&data)?;
            file.sync_all()
        })();

        if let Err(e) = staged {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        Ok(temp)
    }

    /// Atomically replace the live document with a staged temp file.
    pub(crate) fn commit(&self, temp: &Path) -> Result<(), CatalogError> {
        if let Err(e) = fs::rename(temp, &self.path) {
            let _ = fs::remove_file(temp);
            return Err(e.into());
        }
        // Persist the rename itself; not supported on every platform
        #[cfg(unix)]
        File::open(self.dir())?.sync_all()?;
        Ok(())
    }
}

impl CatalogBackend for JsonFile {
    fn load(&self) -> Result<Vec<FileRecord>, CatalogError> {
        match fs::read(&self.path) {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, records: &[FileRecord]) -> Result<(), CatalogError> {
        let temp = self.stage(records)?;
        self.commit(&temp)
    }
}
