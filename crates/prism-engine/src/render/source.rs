//! Memory-mapped scene source.
//!
//! A source is referenced by a `file://` URL (or the empty string for "no source").
//! Switching sources always tears the previous mapping down first, then validates and
//! maps the new one, so at most one mapping and one scene registration exist at a time.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapOptions};
use url::Url;

use super::backend::{SceneHandle, SharedBackend};
use super::diagnostics::{self, SharedSink, CRITICAL};
use super::error::SourceError;

/// A validated, local scene reference.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LocalSource {
    pub url: Url,
    pub path: PathBuf,
}

/// Parses a source reference.
///
/// Returns `Ok(None)` for the empty reference. Anything that is not a well-formed
/// `file` URL naming a local path is rejected.
pub fn parse_source(source: &str) -> Result<Option<LocalSource>, SourceError> {
    if source.is_empty() {
        return Ok(None);
    }
    let invalid = |reason| SourceError::InvalidSource {
        source_ref: source.to_owned(),
        reason,
    };

    let url = Url::parse(source).map_err(|_| invalid("malformed URL"))?;
    if url.scheme() != "file" {
        return Err(invalid("not a local file"));
    }
    let path = url.to_file_path().map_err(|()| invalid("not a local file"))?;
    Ok(Some(LocalSource { url, path }))
}

/// Open file plus its read-only mapping.
struct Mapping {
    // Unregistered before the map is dropped.
    scene: Option<SceneHandle>,
    map: Mmap,
    _file: File,
    path: PathBuf,
}

/// Owns the scene file mapping and its backend registration.
pub struct SourceBuffer {
    source: String,
    mapping: Option<Mapping>,

    backend: SharedBackend,
    sink: SharedSink,
}

impl SourceBuffer {
    /// Creates an empty buffer (no source, no mapping).
    pub fn new(backend: SharedBackend, sink: SharedSink) -> Self {
        Self {
            source: String::new(),
            mapping: None,
            backend,
            sink,
        }
    }

    /// Switches to `source`.
    ///
    /// - same reference as now: `Ok(false)`, nothing happens
    /// - otherwise the current mapping is torn down, then the new reference is
    ///   validated and mapped; `Ok(true)` once the new state is in place
    ///
    /// The reference is recorded as current before validation, so repeating a
    /// rejected reference is a no-op. A teardown failure is reported and does not stop
    /// the new source from being mapped; it is returned as [`SourceError::Unmap`] only
    /// if mapping the new source succeeded.
    pub fn set_source(&mut self, source: &str) -> Result<bool, SourceError> {
        if self.source == source {
            return Ok(false);
        }
        self.source = source.to_owned();

        let teardown = self.unmap();

        let Some(local) = parse_source(source).inspect_err(|e| self.warn(e))? else {
            teardown?;
            return Ok(true);
        };

        let file = File::open(&local.path)
            .map_err(|err| SourceError::Open {
                path: local.path.clone(),
                err,
            })
            .inspect_err(|e| self.warn(e))?;

        self.map(file, local.path)?;
        diagnostics::report(
            &*self.sink,
            log::Level::Info,
            format_args!("file {} is open", local.url),
        );

        teardown?;
        Ok(true)
    }

    /// Maps `file` and registers the bytes with the backend.
    ///
    /// Panics if a mapping already exists.
    fn map(&mut self, file: File, path: PathBuf) -> Result<(), SourceError> {
        assert!(self.mapping.is_none(), "map() over an existing mapping");

        // SAFETY: the mapping is private and read-only; the engine never writes through
        // it. Concurrent truncation of the file by another process is outside our
        // control, as with any file mapping.
        let map = unsafe { MmapOptions::new().map_copy_read_only(&file) }
            .map_err(|err| SourceError::Map {
                path: path.clone(),
                err,
            })
            .inspect_err(|e| self.warn(e))?;
        if map.is_empty() {
            let err = SourceError::Map {
                path,
                err: io::Error::new(io::ErrorKind::InvalidData, "file is empty"),
            };
            self.warn(&err);
            return Err(err);
        }

        let Some(scene) = SceneHandle::acquire(&self.backend, &self.sink, &map) else {
            let err = SourceError::Registration { path };
            diagnostics::report(&*self.sink, CRITICAL, format_args!("{err}"));
            return Err(err);
        };

        self.mapping = Some(Mapping {
            scene: Some(scene),
            map,
            _file: file,
            path,
        });
        Ok(())
    }

    /// Unregisters the scene and unmaps the file. Trivially succeeds when unmapped.
    ///
    /// The mapping is always dropped, even when the backend refuses to unregister.
    pub fn unmap(&mut self) -> Result<(), SourceError> {
        let registered = self.unregister_scene();
        let Some(mapping) = self.mapping.take() else {
            return Ok(());
        };
        let path = mapping.path.clone();
        drop(mapping);
        diagnostics::report(
            &*self.sink,
            log::Level::Info,
            format_args!("file {} is closed", path.display()),
        );

        if registered {
            Ok(())
        } else {
            Err(SourceError::Unmap { path })
        }
    }

    /// Unregisters the scene handle while keeping the mapping alive.
    ///
    /// Returns `false` if the backend reported a failure.
    pub fn unregister_scene(&mut self) -> bool {
        let Some(mapping) = self.mapping.as_mut() else { return true };
        let Some(scene) = mapping.scene.take() else { return true };
        if scene.release() {
            return true;
        }
        diagnostics::report(
            &*self.sink,
            CRITICAL,
            format_args!(
                "unable to unregister memory mapped buffer for file {}",
                mapping.path.display()
            ),
        );
        false
    }

    /// Current reference, as last passed to [`set_source`](Self::set_source).
    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline]
    pub fn is_mapped(&self) -> bool {
        self.mapping.is_some()
    }

    /// Mapped bytes, if any.
    pub fn bytes(&self) -> Option<&[u8]> {
        self.mapping.as_ref().map(|m| &m.map[..])
    }

    /// Length of the mapping in bytes; zero when unmapped.
    pub fn len(&self) -> usize {
        self.bytes().map_or(0, <[u8]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> Option<&Path> {
        self.mapping.as_ref().map(|m| m.path.as_path())
    }

    pub fn scene_handle(&self) -> Option<&SceneHandle> {
        self.mapping.as_ref().and_then(|m| m.scene.as_ref())
    }

    fn warn(&self, err: &SourceError) {
        diagnostics::report(&*self.sink, log::Level::Warn, format_args!("{err}"));
    }
}

impl Drop for SourceBuffer {
    fn drop(&mut self) {
        // Failures were already reported to the sink.
        let _ = self.unmap();
    }
}
