// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Script loading and caching.
//!
//! The walker resolves `<source>`/`<exec>` targets to absolute paths and
//! asks a [`ScriptLoader`] for the parsed document. Loaders hand out
//! shared [`Script`]s; a script is parsed once and never mutated, so the
//! cache may be shared across invocations.
//!
//! # Implementations
//!
//! - [`FileSystemLoader`]: reads scripts from disk, caches by canonical
//!   path in an LRU cache
//! - [`MemoryLoader`]: serves scripts from an in-memory map, for tests
//!   and embedding

use crate::ast::Script;
use crate::error::{MoldeError, Result};
use crate::reader::read_script;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Trait for resolving absolute script paths to parsed documents.
pub trait ScriptLoader: Send + Sync {
    /// Loads the script at `path`, parsing it on first access.
    fn load(&self, path: &Path) -> Result<Arc<Script>>;

    /// Creates a boxed clone (for use in closures).
    fn clone_box(&self) -> Box<dyn ScriptLoader>;
}

impl Clone for Box<dyn ScriptLoader> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Filesystem-backed script loader with an LRU document cache.
///
/// Paths are canonicalized before the cache probe so that different
/// spellings of the same file share one entry.
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    cache: Arc<Mutex<LruCache<PathBuf, Arc<Script>>>>,
}

impl FileSystemLoader {
    /// Creates a loader caching up to `capacity` parsed scripts.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }
}

impl Default for FileSystemLoader {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ScriptLoader for FileSystemLoader {
    fn load(&self, path: &Path) -> Result<Arc<Script>> {
        let canonical = path.canonicalize().map_err(MoldeError::Io)?;

        {
            let mut cache = self.cache.lock().expect("script cache poisoned");
            if let Some(script) = cache.get(&canonical) {
                tracing::debug!("script cache hit: {}", canonical.display());
                return Ok(script.clone());
            }
        }

        tracing::debug!("loading script: {}", canonical.display());
        let source = std::fs::read_to_string(&canonical)?;
        let script = Arc::new(read_script(&canonical, &source)?);

        let mut cache = self.cache.lock().expect("script cache poisoned");
        cache.put(canonical, script.clone());
        Ok(script)
    }

    fn clone_box(&self) -> Box<dyn ScriptLoader> {
        Box::new(self.clone())
    }
}

/// In-memory script loader for tests and embedded archetypes.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    scripts: HashMap<PathBuf, Arc<Script>>,
}

impl MemoryLoader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and registers a script under a virtual path.
    pub fn add_script(&mut self, path: impl AsRef<Path>, source: &str) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        let script = Arc::new(read_script(&path, source)?);
        self.scripts.insert(path, script);
        Ok(())
    }
}

impl ScriptLoader for MemoryLoader {
    fn load(&self, path: &Path) -> Result<Arc<Script>> {
        self.scripts.get(path).cloned().ok_or_else(|| {
            MoldeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("script '{}' not registered", path.display()),
            ))
        })
    }

    fn clone_box(&self) -> Box<dyn ScriptLoader> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MINIMAL: &str = "<archetype-script/>";

    #[test]
    fn filesystem_loader_caches_by_canonical_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("script.xml");
        fs::write(&path, MINIMAL).unwrap();

        let loader = FileSystemLoader::new(4);
        let first = loader.load(&path).unwrap();
        // A dotted spelling of the same file must hit the same entry
        let dotted = dir.path().join(".").join("script.xml");
        let second = loader.load(&dotted).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn filesystem_loader_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = loader_err(&FileSystemLoader::new(4), &dir.path().join("nope.xml"));
        assert!(matches!(err, MoldeError::Io(_)));
    }

    fn loader_err(loader: &dyn ScriptLoader, path: &Path) -> MoldeError {
        loader.load(path).unwrap_err()
    }

    #[test]
    fn memory_loader_round_trip() {
        let mut loader = MemoryLoader::new();
        loader.add_script("/virtual/main.xml", MINIMAL).unwrap();
        let script = loader.load(Path::new("/virtual/main.xml")).unwrap();
        assert_eq!(script.path(), Path::new("/virtual/main.xml"));
        assert!(loader.load(Path::new("/virtual/other.xml")).is_err());
    }
}
