use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct AttachedFile {
    pub name: String,
    pub size: u64,
    pub path: PathBuf,
    pub is_image: bool,
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

fn looks_like_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn stat_file(path: &Path) -> Result<AttachedFile> {
    let meta =
        std::fs::metadata(path).with_context(|| format!("reading attachment {path:?}"))?;
    if !meta.is_file() {
        anyhow::bail!("not a file: {path:?}");
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(AttachedFile {
        name,
        size: meta.len(),
        path: path.to_path_buf(),
        is_image: looks_like_image(path),
    })
}

/// One attachment slot. Files accumulate across selections instead of each
/// selection replacing the set; duplicates are dropped by (name, size).
#[derive(Debug, Clone)]
pub struct AttachmentSlot {
    pub id: String,
    pub title: String,
    pub files: Vec<AttachedFile>,
    pub input: String,
    pub cursor: usize,
}

impl AttachmentSlot {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            files: Vec::new(),
            input: String::new(),
            cursor: 0,
        }
    }

    /// Merge newly selected paths into the accumulated set. Returns how many
    /// were actually added (duplicates and unreadable paths are skipped, the
    /// latter reported through `log`).
    pub fn add_paths<I, P>(&mut self, paths: I, log: &mut dyn FnMut(String)) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut added = 0;
        for p in paths {
            let path = p.as_ref();
            match stat_file(path) {
                Ok(file) => {
                    let exists = self
                        .files
                        .iter()
                        .any(|f| f.name == file.name && f.size == file.size);
                    if !exists {
                        self.files.push(file);
                        added += 1;
                    }
                }
                Err(e) => log(format!("attachment skipped: {e}")),
            }
        }
        added
    }

    /// Remove entry `index`; out-of-range is a no-op.
    pub fn remove(&mut self, index: usize) -> bool {
        if index >= self.files.len() {
            return false;
        }
        self.files.remove(index);
        if self.cursor >= self.files.len() && self.cursor > 0 {
            self.cursor -= 1;
        }
        true
    }

    /// Rebuild every entry from current disk state. Entries that no longer
    /// resolve are dropped; used as the fallback when a removal left the set
    /// inconsistent.
    pub fn refresh_from_disk(&mut self, log: &mut dyn FnMut(String)) {
        let paths: Vec<PathBuf> = self.files.iter().map(|f| f.path.clone()).collect();
        self.files.clear();
        for p in paths {
            match stat_file(&p) {
                Ok(file) => self.files.push(file),
                Err(e) => log(format!("attachment dropped on refresh: {e}")),
            }
        }
        if self.cursor >= self.files.len() {
            self.cursor = self.files.len().saturating_sub(1);
        }
    }

    pub fn paths(&self) -> Vec<String> {
        self.files
            .iter()
            .map(|f| f.path.to_string_lossy().to_string())
            .collect()
    }
}
