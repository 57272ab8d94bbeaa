//! Predicate deciding which files a mirror copies. Directories are never
//! filtered.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
pub struct FileFilter(Arc<dyn Fn(&Path) -> bool + Send + Sync>);

impl FileFilter {
    pub fn new(predicate: impl Fn(&Path) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    pub fn accept_all() -> Self {
        Self::new(|_| true)
    }

    /// Accept files whose extension matches one of `extensions`
    /// (case-insensitive, leading dot optional). An empty list accepts all.
    pub fn extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let wanted: Vec<String> = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        if wanted.is_empty() {
            return Self::accept_all();
        }
        Self::new(move |path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| wanted.iter().any(|w| w.eq_ignore_ascii_case(ext)))
                .unwrap_or(false)
        })
    }

    pub fn accepts(&self, path: &Path) -> bool {
        (self.0)(path)
    }
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::accept_all()
    }
}

impl fmt::Debug for FileFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FileFilter(..)")
    }
}
