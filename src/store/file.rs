//! Directory-backed resource store.
//!
//! A resource path `/a/b.json` maps to `<root>/a/b.json`. Writes go to a
//! temporary sibling first and are renamed into place, so readers in other
//! processes never observe a half-written record.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::store::{ResourceStore, check_path};

const TMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone)]
pub struct FileResourceStore {
    root: PathBuf,
}

impl FileResourceStore {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    fn collect(&self, dir: &Path, suffix: &str, out: &mut Vec<String>) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                self.collect(&path, suffix, out)?;
                continue;
            }
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");
            if relative.ends_with(suffix) && !relative.ends_with(TMP_SUFFIX) {
                out.push(format!("/{relative}"));
            }
        }
        Ok(())
    }
}

impl ResourceStore for FileResourceStore {
    fn list(&self, root: &str, suffix: &str) -> Result<Vec<String>> {
        check_path(root)?;
        let mut paths = Vec::new();
        self.collect(&self.file_path(root), suffix, &mut paths)?;
        paths.sort();
        Ok(paths)
    }

    fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        check_path(path)?;
        match fs::read(self.file_path(path)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, path: &str, data: &[u8]) -> Result<()> {
        check_path(path)?;
        let target = self.file_path(path);
        let tmp = write_tmp(&target, data)?;
        if let Err(e) = fs::rename(&tmp, &target) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    /// The record appears fully written or not at all: the data goes to a
    /// temporary sibling which is then hard-linked to the target name.
    fn put_if_absent(&self, path: &str, data: &[u8]) -> Result<bool> {
        check_path(path)?;
        let target = self.file_path(path);
        if target.exists() {
            return Ok(false);
        }

        let tmp = write_tmp(&target, data)?;
        let linked = fs::hard_link(&tmp, &target);
        let _ = fs::remove_file(&tmp);
        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, path: &str) -> Result<bool> {
        check_path(path)?;
        match fs::remove_file(self.file_path(path)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn readable_path(&self, path: &str) -> String {
        self.file_path(path).display().to_string()
    }
}

/// Write `data` to a fresh temporary sibling of `target`. Nothing is left
/// behind on failure.
fn write_tmp(target: &Path, data: &[u8]) -> Result<PathBuf> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = target.with_file_name(format!(
        "{}.{}{TMP_SUFFIX}",
        target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        uuid::Uuid::new_v4().simple()
    ));

    let written = fs::File::create(&tmp).and_then(|mut file| {
        file.write_all(data)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(tmp)
}
