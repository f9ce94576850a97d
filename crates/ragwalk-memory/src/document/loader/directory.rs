use std::path::{Path, PathBuf};

use super::super::{Document, DocumentError, DocumentLoader};
use super::{CsvLoader, TextLoader};

/// Walks a directory and loads every file some registered loader supports.
pub struct DirectoryLoader {
    loaders: Vec<Box<dyn DocumentLoader>>,
}

impl Default for DirectoryLoader {
    fn default() -> Self {
        Self::new(crate::document::DEFAULT_MAX_FILE_SIZE, b',')
    }
}

impl DirectoryLoader {
    /// Loader set for text, markdown, CSV and (with the `pdf` feature) PDF files.
    #[must_use]
    pub fn new(max_file_size: u64, csv_delimiter: u8) -> Self {
        #[cfg_attr(not(feature = "pdf"), allow(unused_mut))]
        let mut loaders: Vec<Box<dyn DocumentLoader>> = vec![
            Box::new(TextLoader { max_file_size }),
            Box::new(CsvLoader {
                max_file_size,
                delimiter: csv_delimiter,
            }),
        ];
        #[cfg(feature = "pdf")]
        loaders.push(Box::new(super::PdfLoader { max_file_size }));
        Self { loaders }
    }

    /// Directory loader with no registered loaders.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            loaders: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_loader(mut self, loader: Box<dyn DocumentLoader>) -> Self {
        self.loaders.push(loader);
        self
    }

    fn loader_for(&self, path: &Path) -> Option<&dyn DocumentLoader> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.loaders
            .iter()
            .find(|l| l.supported_extensions().contains(&ext.as_str()))
            .map(|l| &**l)
    }

    /// Files under `dir` in sorted path order, hidden entries skipped, and the
    /// number of entries the walk could not read.
    fn collect_files(dir: &Path) -> (Vec<PathBuf>, usize) {
        let mut walk_errors = 0;
        let mut files: Vec<PathBuf> = ignore::WalkBuilder::new(dir)
            .hidden(true)
            .git_ignore(true)
            .build()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    walk_errors += 1;
                    tracing::warn!("skipping unreadable entry: {e}");
                    None
                }
            })
            .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
            .map(ignore::DirEntry::into_path)
            .collect();
        files.sort();
        (files, walk_errors)
    }

    /// Load every supported file under `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` does not exist or any supported file fails to load.
    pub async fn load_dir(&self, dir: &Path) -> Result<Vec<Document>, DocumentError> {
        let meta = tokio::fs::metadata(dir).await?;
        if !meta.is_dir() {
            return Err(DocumentError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("{} is not a directory", dir.display()),
            )));
        }

        let (files, walk_errors) = Self::collect_files(dir);
        let mut documents = Vec::new();
        for path in &files {
            let Some(loader) = self.loader_for(path) else {
                tracing::debug!(path = %path.display(), "skipping unsupported file");
                continue;
            };
            let docs = loader.load(path).await?;
            tracing::debug!(path = %path.display(), units = docs.len(), "loaded file");
            documents.extend(docs);
        }

        tracing::info!(
            dir = %dir.display(),
            files = files.len(),
            units = documents.len(),
            walk_errors,
            "loaded data directory"
        );
        Ok(documents)
    }
}

impl DocumentLoader for DirectoryLoader {
    fn load(
        &self,
        path: &Path,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>,
    > {
        let path = path.to_path_buf();
        Box::pin(async move {
            if tokio::fs::metadata(&path).await?.is_dir() {
                return self.load_dir(&path).await;
            }
            match self.loader_for(&path) {
                Some(loader) => loader.load(&path).await,
                None => Err(DocumentError::UnsupportedFormat(path.display().to_string())),
            }
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b_notes.txt"), "plain notes").unwrap();
        std::fs::write(dir.path().join("a_people.csv"), "name\nAda\nGrace\n").unwrap();
        std::fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/c_readme.md"), "# Nested").unwrap();
        std::fs::write(dir.path().join(".hidden.txt"), "secret").unwrap();
        dir
    }

    #[tokio::test]
    async fn loads_supported_files_in_sorted_order() {
        let dir = fixture();
        let docs = DirectoryLoader::default().load_dir(dir.path()).await.unwrap();

        assert_eq!(docs.len(), 4);
        assert!(docs[0].metadata.source.ends_with("a_people.csv"));
        assert_eq!(docs[0].metadata.row_page, Some(0));
        assert_eq!(docs[1].metadata.row_page, Some(1));
        assert!(docs[2].metadata.source.ends_with("b_notes.txt"));
        assert!(docs[3].metadata.source.ends_with("c_readme.md"));
        assert_eq!(docs[3].metadata.content_type, "text/markdown");
    }

    #[tokio::test]
    async fn hidden_files_skipped() {
        let dir = fixture();
        let docs = DirectoryLoader::default().load_dir(dir.path()).await.unwrap();
        assert!(docs.iter().all(|d| d.content != "secret"));
    }

    #[tokio::test]
    async fn uppercase_extension_matches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("NOTES.TXT"), "shout").unwrap();
        let docs = DirectoryLoader::default().load_dir(dir.path()).await.unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreadable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = fixture();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::write(locked.join("inner.txt"), "inner").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        let enforced = std::fs::read_dir(&locked).is_err();

        let (files, walk_errors) = DirectoryLoader::collect_files(dir.path());
        let docs = DirectoryLoader::default().load_dir(dir.path()).await;
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        let docs = docs.unwrap();
        assert!(docs.iter().any(|d| d.metadata.source.ends_with("b_notes.txt")));
        if enforced {
            assert_eq!(walk_errors, 1);
            assert!(files.iter().all(|f| !f.starts_with(&locked)));
            assert_eq!(docs.len(), 4);
        } else {
            assert_eq!(walk_errors, 0);
            assert_eq!(docs.len(), 5);
        }
    }

    #[tokio::test]
    async fn missing_directory_is_io_error() {
        let result = DirectoryLoader::default()
            .load_dir(Path::new("/nonexistent/ragwalk-data"))
            .await;
        assert!(matches!(result, Err(DocumentError::Io(_))));
    }

    #[tokio::test]
    async fn file_path_is_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.txt");
        std::fs::write(&file, "x").unwrap();
        let result = DirectoryLoader::default().load_dir(&file).await;
        assert!(matches!(result, Err(DocumentError::Io(_))));
    }

    #[tokio::test]
    async fn empty_loader_set_loads_nothing() {
        let dir = fixture();
        let docs = DirectoryLoader::empty().load_dir(dir.path()).await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn trait_load_dispatches_single_file() {
        let dir = fixture();
        let loader = DirectoryLoader::default();
        let docs = loader
            .load(&dir.path().join("b_notes.txt"))
            .await
            .unwrap();
        assert_eq!(docs[0].content, "plain notes");

        let err = loader.load(&dir.path().join("image.png")).await;
        assert!(matches!(err, Err(DocumentError::UnsupportedFormat(_))));
    }
}
