//! Materializes scenes so the engine can load them by path.
//!
//! URL scenes are passed through untouched. Inline scenes (YAML posted as the request body) are
//! written once to `<cache_dir>/<md5>.yaml`, keyed by the MD5 of their content, so identical bodies
//! share a file and the engine never sees two ids for the same content.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;
use md5::{Digest, Md5};
use tempfile::NamedTempFile;

use crate::errors::RenderError;
use crate::request::SceneSource;

/// A scene the engine can load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScene {
    /// Identity compared against the view state: the URL, or the content hash
    pub id: String,
    /// What to hand to `MapEngine::load_scene`
    pub path: String,
}

#[derive(Debug)]
pub struct SceneCache {
    dir: PathBuf,
    entries: HashMap<String, PathBuf>,
}

impl SceneCache {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into(), entries: HashMap::new() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of inline scenes written so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// File backing the inline scene with content hash `id`.
    pub fn path_of(&self, id: &str) -> Option<&Path> {
        self.entries.get(id).map(PathBuf::as_path)
    }

    pub fn resolve(&mut self, scene: &SceneSource) -> Result<ResolvedScene, RenderError> {
        match scene {
            SceneSource::Url(url) => Ok(ResolvedScene { id: url.clone(), path: url.clone() }),
            SceneSource::Inline(body) => {
                let id = md5_hex(body);
                let path = match self.entries.get(&id) {
                    Some(path) => path.clone(),
                    None => {
                        let path = self.write(&id, body)?;
                        self.entries.insert(id.clone(), path.clone());
                        path
                    }
                };
                Ok(ResolvedScene { id, path: path.to_string_lossy().into_owned() })
            }
        }
    }

    /// Writes `body` beside its final name and renames it into place, so workers sharing
    /// `dir` never read a partially written scene.
    fn write(&self, id: &str, body: &[u8]) -> Result<PathBuf, RenderError> {
        let path = self.dir.join(format!("{id}.yaml"));
        let io_err = |source| RenderError::Io { path: path.clone(), source };

        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(body).map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;

        info!("cached inline scene at {}", path.display());
        Ok(path)
    }
}

/// Lowercase hex MD5 of `bytes`.
pub fn md5_hex(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn md5_matches_known_digests() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn url_scenes_skip_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = SceneCache::new(dir.path().join("cache"));

        let scene = cache.resolve(&SceneSource::Url("http://e/s.yaml".into())).unwrap();
        assert_eq!(scene.id, "http://e/s.yaml");
        assert_eq!(scene.path, "http://e/s.yaml");
        assert!(cache.is_empty());
        assert!(!dir.path().join("cache").exists());
    }

    #[test]
    fn identical_bodies_share_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = SceneCache::new(dir.path());

        let body = b"sources:\n  osm: {}\n".to_vec();
        let a = cache.resolve(&SceneSource::Inline(body.clone())).unwrap();
        let b = cache.resolve(&SceneSource::Inline(body.clone())).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.id, md5_hex(&body));
        assert_eq!(cache.len(), 1);

        let on_disk = fs::read(cache.path_of(&a.id).unwrap()).unwrap();
        assert_eq!(md5_hex(&on_disk), a.id);
    }

    #[test]
    fn one_byte_difference_gives_a_new_scene() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = SceneCache::new(dir.path());

        let a = cache.resolve(&SceneSource::Inline(b"zoom: 1".to_vec())).unwrap();
        let b = cache.resolve(&SceneSource::Inline(b"zoom: 2".to_vec())).unwrap();

        assert_ne!(a.id, b.id);
        assert_ne!(a.path, b.path);
        assert_eq!(cache.len(), 2);
        assert!(a.path.ends_with(&format!("{}.yaml", a.id)));
    }

    #[test]
    fn readers_never_see_a_partial_scene_while_another_worker_rewrites_it() {
        let dir = tempfile::tempdir().unwrap();
        let body: Vec<u8> = (0..4 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
        let id = md5_hex(&body);
        let path = SceneCache::new(dir.path()).resolve(&SceneSource::Inline(body.clone())).unwrap().path;

        let done = Arc::new(AtomicBool::new(false));
        let reader = {
            let done = done.clone();
            let path = path.clone();
            thread::spawn(move || {
                let mut reads = 0;
                loop {
                    let on_disk = fs::read(&path).unwrap();
                    assert_eq!(on_disk.len(), 4 * 1024 * 1024, "read a truncated scene");
                    reads += 1;
                    if done.load(Ordering::Relaxed) {
                        return reads;
                    }
                }
            })
        };

        for _ in 0..50 {
            let mut other = SceneCache::new(dir.path());
            let scene = other.resolve(&SceneSource::Inline(body.clone())).unwrap();
            assert_eq!(scene.id, id);
        }
        done.store(true, Ordering::Relaxed);

        assert!(reader.join().unwrap() > 0);
        assert_eq!(md5_hex(&fs::read(&path).unwrap()), id);
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1, "temporary files should be renamed away");
    }

    #[test]
    fn unwritable_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "file").unwrap();

        let mut cache = SceneCache::new(&blocker);
        let err = cache.resolve(&SceneSource::Inline(b"x".to_vec())).unwrap_err();
        assert!(matches!(err, RenderError::Io { .. }));
        assert!(cache.is_empty());
    }
}
