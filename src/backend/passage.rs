use super::{BackendError, PassageLoader};
use std::path::PathBuf;

/// Loads advice-request passages from text files in a directory, one file
/// per passage identifier.
pub struct FilePassageLoader {
    dir: PathBuf,
}

impl FilePassageLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl PassageLoader for FilePassageLoader {
    fn load(&self, identifier: &str) -> Result<String, BackendError> {
        let path = self.dir.join(format!("{identifier}.txt"));
        let text = std::fs::read_to_string(&path)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(BackendError::Unavailable(format!(
                "passage {identifier} is empty"
            )));
        }
        Ok(text.to_string())
    }
}
