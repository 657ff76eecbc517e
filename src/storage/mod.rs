use std::io;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

pub mod dir_storage;
pub mod memory_storage;

pub use dir_storage::DirStorage;
pub use memory_storage::MemoryStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
}

/// Hierarchical byte store holding uploaded documents.
///
/// All paths are relative to the store root. Absolute paths and `..`
/// components are rejected with `ErrorKind::InvalidInput`.
pub trait Storage: Send + Sync {
    fn mkdir_all(&self, path: &Path) -> io::Result<()>;

    /// Creates or truncates a file. The parent directory must exist.
    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + Send>>;

    /// Replaces the whole content of a file. Concurrent writers of the same
    /// path never observe a mix of both contents.
    fn write_file(&self, path: &Path, content: &[u8]) -> io::Result<()>;

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Removes a file or an empty directory.
    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Visits `path` and everything below it, depth first, siblings in name order.
    fn walk(&self, path: &Path, visitor: &mut dyn FnMut(&Path, EntryKind) -> io::Result<()>) -> io::Result<()>;
}

/// Keeps only normal components, so a path can't escape the store root.
pub fn normalize(path: &Path) -> io::Result<PathBuf> {
    let mut res = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => res.push(part),
            Component::CurDir => {}
            _ => return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("Path {} is outside of the storage root", path.display()))),
        }
    }
    Ok(res)
}
