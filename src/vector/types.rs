use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub type Metadata = HashMap<String, Value>;

/// Metadata key holding the owning document id.
pub const DOCUMENT_ID_KEY: &str = "documentId";
/// Metadata key holding the chunk text.
pub const TEXT_KEY: &str = "text";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: Metadata,
}

impl VectorRecord {
    pub fn new(id: impl Into<String>, vector: Vec<f32>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            vector,
            metadata,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Id of the record for chunk `index` of `document_id`.
    pub fn chunk_id(document_id: &str, index: usize) -> String {
        format!("{}-chunk-{}", document_id, index)
    }
}

/// One chunk of an ingested document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    pub text: String,
    pub content_type: String,
    pub source_type: String,
}

impl DocumentChunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            content_type: "text".to_string(),
            source_type: "document".to_string(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_source_type(mut self, source_type: impl Into<String>) -> Self {
        self.source_type = source_type.into();
        self
    }
}

/// Typed metadata filter.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataFilter {
    Eq { field: String, value: Value },
    And(Vec<MetadataFilter>),
}

impl MetadataFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn document(document_id: &str) -> Self {
        Self::eq(DOCUMENT_ID_KEY, document_id)
    }

    pub fn and(self, other: MetadataFilter) -> Self {
        match self {
            Self::And(mut filters) => {
                filters.push(other);
                Self::And(filters)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Render in the index's SQL-like filter syntax.
    pub fn render(&self) -> String {
        match self {
            Self::Eq { field, value } => format!("{} = {}", field, render_value(value)),
            Self::And(filters) => filters
                .iter()
                .map(|f| match f {
                    Self::And(_) => format!("({})", f.render()),
                    Self::Eq { .. } => f.render(),
                })
                .collect::<Vec<_>>()
                .join(" AND "),
        }
    }

    /// Evaluate against a record's metadata.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Self::Eq { field, value } => metadata.get(field) == Some(value),
            Self::And(filters) => filters.iter().all(|f| f.matches(metadata)),
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        other => other.to_string(),
    }
}

/// Nearest-neighbour query.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub top_k: usize,
    pub filter: Option<MetadataFilter>,
    pub include_metadata: bool,
    pub include_vectors: bool,
}

impl VectorQuery {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            top_k: 5,
            filter: None,
            include_metadata: true,
            include_vectors: false,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }

    pub fn with_vectors(mut self, include: bool) -> Self {
        self.include_vectors = include;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl QueryMatch {
    /// The chunk text stored with the match, if any.
    pub fn text(&self) -> Option<&str> {
        self.metadata.as_ref()?.get(TEXT_KEY)?.as_str()
    }
}
