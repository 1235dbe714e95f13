use std::path::{Path, PathBuf};

/// Reference to a captured signature image. The capture itself happens
/// outside the terminal (scanned pad, exported PNG); the report only carries
/// the reference through autosave and submission.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    image: Option<PathBuf>,
}

impl Signature {
    pub fn set(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if !path.is_file() {
            return false;
        }
        self.image = Some(path);
        true
    }

    pub fn clear(&mut self) {
        self.image = None;
    }

    pub fn path(&self) -> Option<&Path> {
        self.image.as_deref()
    }

    pub fn as_saved(&self) -> Option<String> {
        self.image
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Re-reference a stored path; stale references are dropped.
    pub fn restore(&mut self, saved: &str, log: &mut dyn FnMut(String)) {
        let path = PathBuf::from(saved);
        if path.is_file() {
            self.image = Some(path);
        } else {
            log(format!("saved signature image missing: {saved}"));
        }
    }

    pub fn is_present(&self) -> bool {
        self.image.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_requires_existing_file() {
        let mut sig = Signature::default();
        assert!(!sig.set("/no/such/signature.png"));
        assert!(!sig.is_present());

        let dir = std::env::temp_dir().join(format!(
            "sat-tui-sig-{}",
            crate::draft::temporary_submission_id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let p = dir.join("sig.png");
        std::fs::write(&p, b"png").unwrap();
        assert!(sig.set(&p));
        assert!(sig.is_present());
        assert_eq!(sig.as_saved().unwrap(), p.to_string_lossy());
    }

    #[test]
    fn restore_drops_missing_path_with_log() {
        let mut sig = Signature::default();
        let mut msgs = Vec::new();
        sig.restore("/vanished/sig.png", &mut |m| msgs.push(m));
        assert!(!sig.is_present());
        assert_eq!(msgs.len(), 1);
    }
}
