use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub source: String,
    pub content_type: String,
    /// Zero-based CSV row or PDF page the document came from.
    pub row_page: Option<usize>,
    pub extra: HashMap<String, String>,
}

impl DocumentMetadata {
    #[must_use]
    pub fn new(source: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content_type: content_type.into(),
            row_page: None,
            extra: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_row_page(mut self, row_page: usize) -> Self {
        self.row_page = Some(row_page);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// Texts and their metadata as two lists aligned by index.
#[derive(Debug, Clone, Default)]
pub struct SourceUnits {
    pub texts: Vec<String>,
    pub metadatas: Vec<DocumentMetadata>,
}

impl SourceUnits {
    #[must_use]
    pub fn from_documents(documents: Vec<Document>) -> Self {
        let mut units = Self {
            texts: Vec::with_capacity(documents.len()),
            metadatas: Vec::with_capacity(documents.len()),
        };
        for doc in documents {
            units.push(doc);
        }
        units
    }

    pub fn push(&mut self, document: Document) {
        self.texts.push(document.content);
        self.metadatas.push(document.metadata);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub content: String,
    pub metadata: DocumentMetadata,
    pub chunk_index: usize,
}
