//! Persistent records and object storage behind the publishing pipeline.
//!
//! Both are traits so the pipeline can run against a hosted backend or, as the CLI and the tests
//! do, against the in-memory book store and a directory or in-memory object store.

use crate::model::{Book, BookPart, BookStatus, Manuscript};
use crate::PressError;
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Book and part records.
pub trait BookStore {
    fn book(&self, book_id: &str) -> Result<Book, PressError>;

    /// All parts of the book, ordered by `part_index`.
    fn parts(&self, book_id: &str) -> Result<Vec<BookPart>, PressError>;

    fn set_status(&self, book_id: &str, status: BookStatus) -> Result<(), PressError>;

    fn set_part_pdf_url(&self, book_id: &str, part_index: i64, url: &str)
        -> Result<(), PressError>;

    fn set_book_pdf_url(&self, book_id: &str, url: &str) -> Result<(), PressError>;
}

/// Artifact storage addressed by opaque keys. Writes overwrite.
pub trait ObjectStore {
    /// Stores `bytes` under `key` and returns the locator to fetch them back with.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String, PressError>;

    fn get(&self, locator: &str) -> Result<Vec<u8>, PressError>;

    fn exists(&self, locator: &str) -> bool;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
pub struct MemoryBookStore {
    books: Mutex<HashMap<String, Manuscript>>,
}

impl MemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, manuscript: Manuscript) {
        lock(&self.books).insert(manuscript.book.id.clone(), manuscript);
    }

    fn with_book<R>(
        &self,
        book_id: &str,
        f: impl FnOnce(&mut Manuscript) -> Result<R, PressError>,
    ) -> Result<R, PressError> {
        let mut books = lock(&self.books);
        let manuscript = books
            .get_mut(book_id)
            .ok_or_else(|| PressError::not_found(format!("book {:?}", book_id)))?;
        f(manuscript)
    }
}

impl BookStore for MemoryBookStore {
    fn book(&self, book_id: &str) -> Result<Book, PressError> {
        self.with_book(book_id, |m| Ok(m.book.clone()))
    }

    fn parts(&self, book_id: &str) -> Result<Vec<BookPart>, PressError> {
        self.with_book(book_id, |m| {
            let mut parts = m.parts.clone();
            parts.sort_by_key(|p| p.part_index);
            Ok(parts)
        })
    }

    fn set_status(&self, book_id: &str, status: BookStatus) -> Result<(), PressError> {
        self.with_book(book_id, |m| {
            m.book.status = status;
            Ok(())
        })
    }

    fn set_part_pdf_url(
        &self,
        book_id: &str,
        part_index: i64,
        url: &str,
    ) -> Result<(), PressError> {
        self.with_book(book_id, |m| {
            let part = m
                .parts
                .iter_mut()
                .find(|p| p.part_index == part_index)
                .ok_or_else(|| {
                    PressError::not_found(format!("part {} of book {:?}", part_index, book_id))
                })?;
            part.pdf_url = Some(url.to_string());
            Ok(())
        })
    }

    fn set_book_pdf_url(&self, book_id: &str, url: &str) -> Result<(), PressError> {
        self.with_book(book_id, |m| {
            m.book.pdf_url = Some(url.to_string());
            Ok(())
        })
    }
}

/// Objects kept in memory. Counts reads so callers can tell what was fetched.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    reads: Mutex<usize>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_count(&self) -> usize {
        *lock(&self.reads)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.objects).keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String, PressError> {
        lock(&self.objects).insert(key.to_string(), bytes.to_vec());
        Ok(key.to_string())
    }

    fn get(&self, locator: &str) -> Result<Vec<u8>, PressError> {
        *lock(&self.reads) += 1;
        lock(&self.objects)
            .get(locator)
            .cloned()
            .ok_or_else(|| PressError::not_found(format!("object {:?}", locator)))
    }

    fn exists(&self, locator: &str) -> bool {
        lock(&self.objects).contains_key(locator)
    }
}

/// Objects stored as files under a root directory; the key is the relative path.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, PressError> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !safe {
            return Err(PressError::storage_error(
                format!("invalid object key {:?}", key),
                Some("Keys are relative paths without '..' components".to_string()),
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String, PressError> {
        let path = self.path_for(key)?;
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent).map_err(|e| {
            PressError::storage_error(
                format!("creating {}: {}", parent.display(), e),
                Some("Check that the storage root is writable".to_string()),
            )
        })?;
        // Written beside the target, then renamed into place.
        let mut file = tempfile::NamedTempFile::new_in(parent).map_err(|e| {
            PressError::storage_error(format!("creating temporary file: {}", e), None)
        })?;
        file.write_all(bytes).map_err(|e| {
            PressError::storage_error(format!("writing {}: {}", path.display(), e), None)
        })?;
        file.persist(&path).map_err(|e| {
            PressError::storage_error(format!("storing {}: {}", path.display(), e), None)
        })?;
        debug!("stored {} bytes at {}", bytes.len(), path.display());
        Ok(key.to_string())
    }

    fn get(&self, locator: &str) -> Result<Vec<u8>, PressError> {
        let path = self.path_for(locator)?;
        fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PressError::not_found(format!("object {:?}", locator)),
            _ => PressError::storage_error(format!("reading {}: {}", path.display(), e), None),
        })
    }

    fn exists(&self, locator: &str) -> bool {
        self.path_for(locator).map(|p| p.is_file()).unwrap_or(false)
    }
}
