use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::{fs, io, process};

use walkdir::WalkDir;

use crate::storage::{normalize, EntryKind, Storage};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Store rooted at a host directory. Nothing outside `root` is reachable.
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    pub fn new(root: &Path) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        Ok(DirStorage {
            root: root.to_path_buf(),
        })
    }

    fn full_path(&self, path: &Path) -> io::Result<PathBuf> {
        Ok(self.root.join(normalize(path)?))
    }
}

impl Storage for DirStorage {
    fn mkdir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(self.full_path(path)?)
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        let file = File::create(self.full_path(path)?)?;
        Ok(Box::new(file))
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        let full_path = self.full_path(path)?;
        let file_name = match full_path.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => return Err(io::Error::new(ErrorKind::InvalidInput, "Can't write to the storage root")),
        };

        // Write a sibling and rename it over the target
        let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_path = full_path.with_file_name(format!(".{}.{}.{}.tmp", file_name, process::id(), seq));
        let res = fs::write(&tmp_path, content).and_then(|_| fs::rename(&tmp_path, &full_path));
        if res.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        res
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(self.full_path(path)?)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let full_path = self.full_path(path)?;
        if fs::metadata(&full_path)?.is_dir() {
            fs::remove_dir(full_path)
        } else {
            fs::remove_file(full_path)
        }
    }

    fn walk(&self, path: &Path, visitor: &mut dyn FnMut(&Path, EntryKind) -> io::Result<()>) -> io::Result<()> {
        let full_path = self.full_path(path)?;
        for entry in WalkDir::new(&full_path).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            let kind = if entry.file_type().is_dir() { EntryKind::Dir } else { EntryKind::File };
            let rel_path = match entry.path().strip_prefix(&self.root) {
                Ok(p) => p,
                Err(_) => continue,
            };
            visitor(rel_path, kind)?;
        }
        Ok(())
    }
}
