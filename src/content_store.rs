use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use spdlog::{error, info, warn};

use crate::error::BlogError;
use crate::post::Post;
use crate::post_parser::parse_post;
use crate::storage::{EntryKind, Storage};
use crate::text_utils::is_valid_slug;

pub const POSTS_DIR: &str = "posts";

/// Every known post, by slug, backed by a storage tree.
///
/// Readers share the lock, ingestion takes it only to swap the map entry.
/// Parsing and storage I/O run outside of it.
pub struct ContentStore {
    storage: Arc<dyn Storage>,
    posts: RwLock<HashMap<String, Arc<Post>>>,
}

impl ContentStore {
    /// Opens the store and loads every post already in the storage.
    /// Files that don't parse are skipped.
    pub fn open(storage: Arc<dyn Storage>) -> Result<Self, BlogError> {
        let posts_dir = Path::new(POSTS_DIR);
        storage.mkdir_all(posts_dir)?;

        let mut files = vec![];
        storage.walk(posts_dir, &mut |path, kind| {
            let hidden = path.file_name()
                .map(|name| name.to_string_lossy().starts_with('.'))
                .unwrap_or(true);
            if kind == EntryKind::File && !hidden {
                files.push(path.to_path_buf());
            }
            Ok(())
        })?;

        let mut posts = HashMap::new();
        for file in files {
            let raw = storage.read_file(&file)?;
            match parse_post(&file, &raw) {
                Ok(post) if !is_valid_slug(&post.slug) => {
                    warn!("Skipping {}: invalid slug {:?}", file.display(), post.slug);
                }
                Ok(post) => {
                    info!("Loaded post {} from {}", post.slug, file.display());
                    if let Some(old) = posts.insert(post.slug.clone(), Arc::new(post)) {
                        warn!("Post {} from {} replaced by a later file", old.slug, old.file_path.display());
                    }
                }
                Err(e) => warn!("Skipping {}: {}", file.display(), e),
            }
        }

        Ok(ContentStore {
            storage,
            posts: RwLock::new(posts),
        })
    }

    /// Stores an uploaded document under `posts/` and indexes it.
    ///
    /// A post with the same slug is replaced. When the document does not
    /// parse or its slug can't be served, the stored file is removed again.
    pub fn ingest(&self, file_name: &str, content: &[u8]) -> Result<Arc<Post>, BlogError> {
        let path = upload_path(file_name)?;

        self.storage.mkdir_all(Path::new(POSTS_DIR))?;
        self.storage.write_file(&path, content)?;

        let post = match parse_post(&path, content) {
            Ok(post) if is_valid_slug(&post.slug) => Arc::new(post),
            Ok(post) => {
                self.discard(&path);
                return Err(BlogError::Validation(format!("invalid slug: {:?}", post.slug)));
            }
            Err(e) => {
                self.discard(&path);
                return Err(e.into());
            }
        };

        let replaced = {
            let mut posts = self.posts.write().unwrap_or_else(PoisonError::into_inner);
            posts.insert(post.slug.clone(), post.clone())
        };

        match replaced {
            Some(old) => warn!("Post {} from {} replaced by {}", old.slug, old.file_path.display(), path.display()),
            None => info!("Post {} added from {}", post.slug, path.display()),
        }

        Ok(post)
    }

    /// Point in time copy of every post, in no particular order.
    pub fn list_all(&self) -> Vec<Arc<Post>> {
        let posts = self.posts.read().unwrap_or_else(PoisonError::into_inner);
        posts.values().cloned().collect()
    }

    pub fn lookup(&self, slug: &str) -> Result<Arc<Post>, BlogError> {
        let posts = self.posts.read().unwrap_or_else(PoisonError::into_inner);
        match posts.get(slug) {
            Some(post) => Ok(post.clone()),
            None => Err(BlogError::NotFound(slug.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.posts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn discard(&self, path: &Path) {
        if let Err(e) = self.storage.remove(path) {
            error!("Error removing rejected upload {}: {}", path.display(), e);
        }
    }
}

/// `posts/<file_name>`, as long as the name is a single visible file name.
fn upload_path(file_name: &str) -> Result<PathBuf, BlogError> {
    let mut components = Path::new(file_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if !name.to_string_lossy().starts_with('.') => {
            Ok(Path::new(POSTS_DIR).join(name))
        }
        _ => Err(BlogError::Validation(format!("invalid file name: {:?}", file_name))),
    }
}
