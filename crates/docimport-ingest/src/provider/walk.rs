//! Directory walking

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use super::{running_totals, FileProvider, MetadataStream};
use crate::error::ProviderError;

type PathFilter = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Yields the regular files under a directory, sorted by file name.
///
/// With extensions set only matching files are yielded; `csv` also matches
/// `data.csv.gz`. A filter predicate, if any, must accept the file as well.
pub struct WalkProvider {
    root: PathBuf,
    recursive: bool,
    extensions: Vec<String>,
    filter: Option<PathFilter>,
    entries: Option<walkdir::IntoIter>,
}

impl WalkProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: false,
            extensions: Vec::new(),
            filter: None,
            entries: None,
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    pub fn with_filter(mut self, filter: impl Fn(&Path) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    fn walker(&self) -> walkdir::IntoIter {
        let max_depth = if self.recursive { usize::MAX } else { 1 };
        WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
    }

    fn wanted(extensions: &[String], filter: Option<&PathFilter>, path: &Path) -> bool {
        if filter.is_some_and(|f| !f(path)) {
            return false;
        }
        if extensions.is_empty() {
            return true;
        }
        let name = match path.file_name() {
            Some(n) => n.to_string_lossy().to_lowercase(),
            None => return false,
        };
        let name = name.strip_suffix(".gz").unwrap_or(&name);
        extensions
            .iter()
            .any(|ext| name.rsplit_once('.').is_some_and(|(_, e)| e == ext))
    }
}

impl FileProvider for WalkProvider {
    fn prepare(&mut self) -> Result<(), ProviderError> {
        let meta = fs::metadata(&self.root).map_err(|error| ProviderError::Io {
            path: self.root.clone(),
            error,
        })?;
        if !meta.is_dir() {
            return Err(ProviderError::NotADirectory(self.root.clone()));
        }
        if self.entries.is_none() {
            self.entries = Some(self.walker());
        }
        Ok(())
    }

    fn next_file(&mut self) -> Result<Option<PathBuf>, ProviderError> {
        let entries = self.entries.as_mut().ok_or(ProviderError::NotPrepared)?;
        for entry in entries.by_ref() {
            let entry = entry?;
            if entry.file_type().is_file() && Self::wanted(&self.extensions, self.filter.as_ref(), entry.path()) {
                return Ok(Some(entry.into_path()));
            }
        }
        Ok(None)
    }

    fn fetch_metadata(&self) -> MetadataStream {
        let extensions = self.extensions.clone();
        let filter = self.filter.clone();
        running_totals(
            self.walker()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .map(walkdir::DirEntry::into_path)
                .filter(move |p| Self::wanted(&extensions, filter.as_ref(), p)),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn collect(provider: &mut WalkProvider) -> Vec<String> {
        provider.prepare().unwrap();
        let mut names = Vec::new();
        while let Some(path) = provider.next_file().unwrap() {
            names.push(path.file_name().unwrap().to_string_lossy().into_owned());
        }
        names
    }

    #[test]
    fn test_walk_depth_and_extensions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.csv"), "x").unwrap();
        fs::write(dir.path().join("a.csv.gz"), "x").unwrap();
        fs::write(dir.path().join("readme.md"), "x").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.csv"), "x").unwrap();

        let mut flat = WalkProvider::new(dir.path()).with_extensions(["csv"]);
        assert_eq!(collect(&mut flat), vec!["a.csv.gz", "b.csv"]);

        let mut deep = WalkProvider::new(dir.path())
            .recursive(true)
            .with_extensions([".CSV"]);
        assert_eq!(collect(&mut deep), vec!["a.csv.gz", "b.csv", "c.csv"]);
        assert_eq!(deep.fetch_metadata().last().unwrap().file_count, 3);

        let mut all = WalkProvider::new(dir.path());
        assert_eq!(collect(&mut all).len(), 3);
    }

    #[test]
    fn test_filter_predicate() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["keep-1.csv", "skip.csv", "keep-2.txt"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }

        let mut provider = WalkProvider::new(dir.path())
            .with_extensions(["csv"])
            .with_filter(|p| p.file_name().is_some_and(|n| n.to_string_lossy().starts_with("keep")));
        assert_eq!(collect(&mut provider), vec!["keep-1.csv"]);
        assert_eq!(provider.fetch_metadata().count(), 1);
    }

    #[test]
    fn test_prepare_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.csv");
        fs::write(&file, "x").unwrap();

        let mut provider = WalkProvider::new(&file);
        assert!(matches!(provider.prepare(), Err(ProviderError::NotADirectory(_))));

        let mut provider = WalkProvider::new(dir.path().join("missing"));
        assert!(matches!(provider.prepare(), Err(ProviderError::Io { .. })));
    }
}
