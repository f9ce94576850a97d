use std::path::Path;
use std::pin::Pin;

use super::super::{
    DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader, DocumentMetadata,
    checked_path,
};

/// Loads a CSV file as one document per data row.
///
/// Each row becomes `"<header>: <value>"` lines in column order, with
/// `row_page` set to the zero-based row index.
pub struct CsvLoader {
    pub max_file_size: u64,
    pub delimiter: u8,
}

impl Default for CsvLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            delimiter: b',',
        }
    }
}

impl CsvLoader {
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

fn rows_to_documents(
    bytes: &[u8],
    delimiter: u8,
    source: &str,
) -> Result<Vec<Document>, DocumentError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();

    let mut documents = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let width = headers.len().max(record.len());
        let lines: Vec<String> = (0..width)
            .map(|col| {
                let value = record.get(col).map_or("", str::trim);
                match headers.get(col) {
                    Some(name) => format!("{name}: {value}"),
                    None => format!("column_{col}: {value}"),
                }
            })
            .collect();

        documents.push(Document {
            content: lines.join("\n"),
            metadata: DocumentMetadata::new(source, "text/csv").with_row_page(row),
        });
    }
    Ok(documents)
}

impl DocumentLoader for CsvLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        let delimiter = self.delimiter;
        Box::pin(async move {
            let path = checked_path(&path, max_size).await?;
            let bytes = tokio::fs::read(&path).await?;
            let source = path.display().to_string();
            let documents = rows_to_documents(&bytes, delimiter, &source)?;
            tracing::debug!(path = %source, rows = documents.len(), "loaded CSV file");
            Ok(documents)
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["csv"]
    }
}
