//! Native module loading via `libloading`.
//!
//! This is the thin leaf over the platform primitive: open a code image,
//! resolve exported symbols into typed function pointers, release the image.
//! Everything above it (tables, registries, dispatch) only ever sees a
//! [`ModuleHandle`].

use std::path::{Path, PathBuf};

use libloading::Library;

use crate::error::LoadError;

/// An owned, loaded code image.
///
/// Released exactly once; the host parks handles whose code may still be on
/// the call stack and releases them at the next safe point.
#[derive(Debug)]
pub enum ModuleHandle {
    /// A real dynamic library.
    Native(Library),
    /// A module living inside the host binary itself, installed through
    /// [`testing`](crate::testing). Has no symbols to resolve and nothing
    /// to unmap.
    InProcess,
}

impl ModuleHandle {
    /// Resolve an exported symbol into a typed function pointer.
    ///
    /// Returns `None` for absent symbols and always for in-process modules.
    ///
    /// # Safety
    /// `T` must be the exact `extern "C"` function pointer type of the
    /// exported symbol; a mismatch is undefined behavior on first call.
    pub unsafe fn symbol<T: Copy>(&self, name: &[u8]) -> Option<T> {
        match self {
            ModuleHandle::Native(lib) => unsafe { lib.get::<T>(name).ok().map(|sym| *sym) },
            ModuleHandle::InProcess => None,
        }
    }

    /// Release the image. Platform unload failures are logged rather than
    /// propagated: the handle is consumed either way and the caller has no
    /// recovery beyond continuing without the module.
    pub fn release(self) {
        if let ModuleHandle::Native(lib) = self {
            if let Err(err) = lib.close() {
                tracing::warn!("failed to unload module image: {}", err);
            }
        }
    }
}

/// Load a module image from `path`.
pub fn load(path: &Path) -> Result<ModuleHandle, LoadError> {
    if !path.is_file() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }

    // SAFETY: loading foreign code is inherently unsafe; the image's
    // initializers run here. The caller decides which paths are trusted.
    let library = unsafe {
        Library::new(path).map_err(|err| LoadError::InvalidImage {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?
    };

    Ok(ModuleHandle::Native(library))
}

/// The platform's dynamic-library file extension.
pub fn platform_extension() -> &'static str {
    if cfg!(target_os = "windows") {
        "dll"
    } else if cfg!(target_os = "macos") {
        "dylib"
    } else {
        "so"
    }
}

/// Collect candidate module paths from the given directories, sorted for a
/// deterministic load order. Unreadable directories are skipped.
pub fn discover(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let wanted = platform_extension();
    let mut found = Vec::new();

    for dir in dirs {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!("skipping module directory {}: {}", dir.display(), err);
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(wanted) {
                found.push(path);
            }
        }
    }

    found.sort();
    found
}
