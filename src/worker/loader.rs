//! Dynamic worker-kind loading, mirroring `getHandle`/`findFunc` in
//! `worker_info.cpp`: a worker kind's shared library is named by convention
//! from the kind string, and a single entry symbol is pulled out of it to
//! construct instances.
//!
//! The original uses `dlopen`/`dlsym` directly; here that's `libloading`,
//! which wraps the same two calls. Loaded libraries are kept alive for the
//! process lifetime (leaked, like the original's handles, which are never
//! `dlclose`d until process exit) since a worker's vtable points into the
//! library's mapped memory.

use crate::error::{Error, Result};
use crate::worker::Worker;
use libloading::{Library, Symbol};
use std::path::{Path, PathBuf};

/// The symbol every worker-kind plugin must export.
const ENTRY_SYMBOL: &[u8] = b"worker_create\0";

/// Constructor function a plugin library exports under [`ENTRY_SYMBOL`].
/// Returns a heap-allocated trait object; ownership transfers to the caller,
/// which reconstructs it with `Box::from_raw`.
pub type WorkerConstructor = unsafe extern "C" fn() -> *mut dyn Worker;

/// Platform shared-library file name for a worker kind, mirroring
/// `getHandle`'s naming rule: truncate the kind at its first `-` (so
/// `tfzendnn-gpu` and `tfzendnn` resolve to the same library), title-case
/// what's left, and prefix with `libworker`. `"tfzendnn"` on Linux becomes
/// `"libworkerTfzendnn.so"`.
pub fn library_file_name(kind: &str) -> String {
    let base = match kind.find('-') {
        Some(idx) => &kind[..idx],
        None => kind,
    };
    let mut chars = base.chars();
    let title_cased = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    };
    format!(
        "{}worker{}{}",
        std::env::consts::DLL_PREFIX,
        title_cased,
        std::env::consts::DLL_SUFFIX
    )
}

pub struct WorkerLoader {
    search_dir: PathBuf,
    // Loaded libraries must outlive every `Worker` constructed from them, so
    // we never unload: the handle is kept here for the loader's lifetime.
    loaded: Vec<Library>,
}

impl WorkerLoader {
    pub fn new(search_dir: impl Into<PathBuf>) -> Self {
        WorkerLoader {
            search_dir: search_dir.into(),
            loaded: Vec::new(),
        }
    }

    fn library_path(&self, kind: &str) -> PathBuf {
        self.search_dir.join(library_file_name(kind))
    }

    /// Load a worker-kind's shared library and construct one instance.
    /// Subsequent calls for the same kind load the library again rather
    /// than caching the `Symbol`, matching `worker_info.cpp`'s one-handle-
    /// per-`WorkerInfo` model (each worker *group* opens its own handle).
    pub fn load(&mut self, kind: &str) -> Result<Box<dyn Worker>> {
        let path = self.library_path(kind);
        if !path.exists() {
            return Err(Error::file_not_found(format!(
                "no worker library for kind '{kind}' at {}",
                path.display()
            )));
        }

        // SAFETY: loading an unknown shared library is inherently unsafe;
        // we trust the configured search directory to contain only
        // well-formed worker plugins built against this crate's `Worker`
        // ABI (same compiler, same crate version).
        let library = unsafe {
            Library::new(&path).map_err(|e| Error::runtime(format!("failed to load {}: {e}", path.display())))?
        };

        let worker = unsafe {
            let constructor: Symbol<WorkerConstructor> = library
                .get(ENTRY_SYMBOL)
                .map_err(|e| Error::runtime(format!("missing worker_create in {}: {e}", path.display())))?;
            Box::from_raw(constructor())
        };

        self.loaded.push(library);
        Ok(worker)
    }

    pub fn search_dir(&self) -> &Path {
        &self.search_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_file_name_title_cases_and_prefixes_with_libworker() {
        let name = library_file_name("tfzendnn");
        assert_eq!(
            name,
            format!(
                "{}worker{}{}",
                std::env::consts::DLL_PREFIX,
                "Tfzendnn",
                std::env::consts::DLL_SUFFIX
            )
        );
    }

    #[test]
    fn library_file_name_truncates_at_first_hyphen() {
        let name = library_file_name("tfzendnn-gpu");
        assert_eq!(name, library_file_name("tfzendnn"));
    }

    #[test]
    fn missing_library_is_a_file_not_found_error() {
        let mut loader = WorkerLoader::new(std::env::temp_dir().join("nonexistent-worker-dir"));
        assert!(matches!(loader.load("nope"), Err(Error::FileNotFound(_))));
    }
}
