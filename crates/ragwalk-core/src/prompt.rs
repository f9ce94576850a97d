//! `{variable}` prompt templates and where to load them from.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Bundled copy of the community `rlm/rag-prompt`.
const RAG_PROMPT: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, just say that you don't know. \
Use three sentences maximum and keep the answer concise.\n\
Question: {question} \n\
Context: {context} \n\
Answer:";

static RAG_DEFAULT: LazyLock<PromptTemplate> =
    LazyLock::new(|| PromptTemplate::new(RAG_PROMPT).unwrap());

/// Variables every RAG prompt must accept.
pub const REQUIRED_VARIABLES: [&str; 2] = ["question", "context"];

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("malformed template: {0}")]
    Malformed(String),

    #[error("missing value for template variable `{0}`")]
    MissingVariable(String),

    #[error("template does not use required variable `{0}`")]
    MissingPlaceholder(&'static str),

    #[error("failed to read prompt file: {0}")]
    Io(#[from] std::io::Error),

    #[error("prompt fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("prompt fetch from {url} returned status {status}")]
    Status { url: String, status: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse `{name}` placeholders; `{{` and `}}` render as literal braces.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` for unclosed, unmatched or invalid placeholders.
    pub fn new(template: impl Into<String>) -> Result<Self, PromptError> {
        let template = template.into();
        let segments = parse(&template)?;
        Ok(Self { template, segments })
    }

    #[must_use]
    pub fn rag_default() -> Self {
        RAG_DEFAULT.clone()
    }

    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names in order of first use.
    #[must_use]
    pub fn input_variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Variable(name) = segment
                && !names.contains(&name.as_str())
            {
                names.push(name);
            }
        }
        names
    }

    /// # Errors
    ///
    /// Returns `MissingPlaceholder` if any of `required` is not used.
    pub fn require(&self, required: &[&'static str]) -> Result<(), PromptError> {
        let vars = self.input_variables();
        match required.iter().copied().find(|name| !vars.contains(name)) {
            Some(name) => Err(PromptError::MissingPlaceholder(name)),
            None => Ok(()),
        }
    }

    /// # Errors
    ///
    /// Returns `MissingVariable` if a placeholder has no value in `values`.
    pub fn render(&self, values: &HashMap<&str, &str>) -> Result<String, PromptError> {
        let mut out = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => {
                    let value = values
                        .get(name.as_str())
                        .ok_or_else(|| PromptError::MissingVariable(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

fn parse(template: &str) -> Result<Vec<Segment>, PromptError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' if chars.peek().is_some_and(|&(_, n)| n == '{') => {
                chars.next();
                literal.push('{');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (_, n) in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                if !closed {
                    return Err(PromptError::Malformed(format!(
                        "unclosed placeholder at byte {pos}"
                    )));
                }
                if name.is_empty() || !name.chars().all(|ch| ch.is_alphanumeric() || ch == '_') {
                    return Err(PromptError::Malformed(format!(
                        "invalid placeholder `{{{name}}}` at byte {pos}"
                    )));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Variable(name));
            }
            '}' if chars.peek().is_some_and(|&(_, n)| n == '}') => {
                chars.next();
                literal.push('}');
            }
            '}' => {
                return Err(PromptError::Malformed(format!(
                    "single `}}` at byte {pos}"
                )));
            }
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Where the RAG prompt comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSource {
    Builtin,
    File(PathBuf),
    Url(String),
}

impl PromptSource {
    /// `builtin` (or empty), an `http(s)://` URL, or otherwise a file path.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        let source = source.trim();
        if source.is_empty() || source.eq_ignore_ascii_case("builtin") {
            Self::Builtin
        } else if source.starts_with("http://") || source.starts_with("https://") {
            Self::Url(source.to_owned())
        } else {
            Self::File(PathBuf::from(source))
        }
    }

    /// Load the template and check it accepts `question` and `context`.
    ///
    /// A URL may serve the raw template or a JSON object with a `template` field.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or fetched, or the
    /// template is malformed or lacks a required variable.
    pub async fn load(&self, client: &reqwest::Client) -> Result<PromptTemplate, PromptError> {
        let template = match self {
            Self::Builtin => return Ok(PromptTemplate::rag_default()),
            Self::File(path) => {
                let text = tokio::fs::read_to_string(path).await?;
                PromptTemplate::new(text)?
            }
            Self::Url(url) => {
                let response = client.get(url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(PromptError::Status {
                        url: url.clone(),
                        status: status.as_u16(),
                    });
                }
                let body = response.text().await?;
                PromptTemplate::new(template_from_body(body))?
            }
        };
        template.require(&REQUIRED_VARIABLES)?;
        tracing::info!(source = ?self, variables = ?template.input_variables(), "loaded prompt");
        Ok(template)
    }
}

fn template_from_body(body: String) -> String {
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(serde_json::Value::Object(obj)) => match obj.get("template") {
            Some(serde_json::Value::String(t)) => t.clone(),
            _ => body,
        },
        _ => body,
    }
}
