use std::collections::BTreeMap;
use std::io;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::storage::{normalize, EntryKind, Storage};

enum Node {
    Dir,
    File(Vec<u8>),
}

type Tree = BTreeMap<PathBuf, Node>;

/// Ephemeral store, everything is lost when the process exits.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    tree: Arc<RwLock<Tree>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_parent(tree: &Tree, path: &Path) -> io::Result<()> {
        match path.parent() {
            None => Err(io::Error::new(ErrorKind::InvalidInput, "Can't write to the storage root")),
            Some(parent) if parent.as_os_str().is_empty() => Ok(()),
            Some(parent) => match tree.get(parent) {
                Some(Node::Dir) => Ok(()),
                Some(Node::File(_)) => Err(io::Error::new(
                    ErrorKind::InvalidInput, format!("{} is not a directory", parent.display()))),
                None => Err(io::Error::new(
                    ErrorKind::NotFound, format!("Directory {} does not exist", parent.display()))),
            },
        }
    }

    fn put_file(&self, path: &Path, content: Vec<u8>) -> io::Result<PathBuf> {
        let path = normalize(path)?;
        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        Self::check_parent(&tree, &path)?;
        if let Some(Node::Dir) = tree.get(&path) {
            return Err(io::Error::new(ErrorKind::InvalidInput, format!("{} is a directory", path.display())));
        }
        tree.insert(path.clone(), Node::File(content));
        Ok(path)
    }
}

struct MemoryFileWriter {
    tree: Arc<RwLock<Tree>>,
    path: PathBuf,
}

impl Write for MemoryFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        match tree.get_mut(&self.path) {
            Some(Node::File(content)) => {
                content.extend_from_slice(buf);
                Ok(buf.len())
            }
            _ => Err(io::Error::new(ErrorKind::NotFound, format!("File {} was removed", self.path.display()))),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn mkdir_all(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path)?;
        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        let mut cur = PathBuf::new();
        for part in path.iter() {
            cur.push(part);
            match tree.get(&cur) {
                Some(Node::Dir) => {}
                Some(Node::File(_)) => return Err(io::Error::new(
                    ErrorKind::AlreadyExists, format!("{} is a file", cur.display()))),
                None => {
                    tree.insert(cur.clone(), Node::Dir);
                }
            }
        }
        Ok(())
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        let path = self.put_file(path, vec![])?;
        Ok(Box::new(MemoryFileWriter {
            tree: self.tree.clone(),
            path,
        }))
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        self.put_file(path, content.to_vec())?;
        Ok(())
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        let path = normalize(path)?;
        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        match tree.get(&path) {
            Some(Node::File(content)) => Ok(content.clone()),
            Some(Node::Dir) => Err(io::Error::new(ErrorKind::InvalidInput, format!("{} is a directory", path.display()))),
            None => Err(io::Error::new(ErrorKind::NotFound, format!("File {} does not exist", path.display()))),
        }
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path)?;
        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        match tree.get(&path) {
            None => return Err(io::Error::new(ErrorKind::NotFound, format!("{} does not exist", path.display()))),
            Some(Node::Dir) => {
                let has_children = tree.keys().any(|k| k != &path && k.starts_with(&path));
                if has_children {
                    return Err(io::Error::new(ErrorKind::Other, format!("Directory {} is not empty", path.display())));
                }
            }
            Some(Node::File(_)) => {}
        }
        tree.remove(&path);
        Ok(())
    }

    fn walk(&self, path: &Path, visitor: &mut dyn FnMut(&Path, EntryKind) -> io::Result<()>) -> io::Result<()> {
        let root = normalize(path)?;

        // Snapshot first, so the visitor may call back into the storage
        let entries: Vec<(PathBuf, EntryKind)> = {
            let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
            if !root.as_os_str().is_empty() && !tree.contains_key(&root) {
                return Err(io::Error::new(ErrorKind::NotFound, format!("{} does not exist", root.display())));
            }
            tree.range(root.clone()..)
                .take_while(|(k, _)| k.starts_with(&root))
                .map(|(k, node)| {
                    let kind = match node {
                        Node::Dir => EntryKind::Dir,
                        Node::File(_) => EntryKind::File,
                    };
                    (k.clone(), kind)
                })
                .collect()
        };

        if root.as_os_str().is_empty() {
            visitor(&root, EntryKind::Dir)?;
        }
        for (entry_path, kind) in entries {
            visitor(&entry_path, kind)?;
        }
        Ok(())
    }
}
