//! Index metadata registry: which annotated fields, annotations, and metadata
//! fields exist, plus the corpus-level tunables the key engine needs (default
//! context window size, maximum match length for match-confined windows).
//!
//! The schema is a plain immutable value built once via [`SchemaBuilder`];
//! lookups come in a lenient (`Option`) and a strict (`Result`) flavor so
//! call sites can pick forward-compatible parsing or hard failure.

use concord_common::{Result, error::Error};

/// Default number of context tokens available on each side of a hit.
pub const DEFAULT_CONTEXT_SIZE: usize = 5;

/// Default upper bound on the number of match tokens a match-confined window
/// may cover.
pub const DEFAULT_MAX_MATCH_LENGTH: usize = 10;

/// A named per-token annotation stream (word, lemma, pos, ...) on an
/// annotated field.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Annotation {
    name: String,
}

impl Annotation {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A tokenized field carrying one or more annotation streams.
#[derive(Debug, Clone)]
pub struct AnnotatedField {
    name: String,
    annotations: Vec<Annotation>,
    main_annotation: String,
}

impl AnnotatedField {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// The annotation used when a key spec leaves the annotation blank.
    pub fn main_annotation(&self) -> &str {
        &self.main_annotation
    }

    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.name == name)
    }

    pub fn require_annotation(&self, name: &str) -> Result<&Annotation> {
        self.annotation(name)
            .ok_or_else(|| Error::not_found("annotation", format!("{}/{}", self.name, name)))
    }
}

/// A stored per-document metadata field.
#[derive(Debug, Clone)]
pub struct MetadataField {
    name: String,
    numeric: bool,
}

impl MetadataField {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether values are integers stored in a numeric column. Declared
    /// explicitly per field; never inferred from the field name.
    pub fn is_numeric(&self) -> bool {
        self.numeric
    }
}

/// The corpus schema: annotated fields, metadata fields, and engine tunables.
#[derive(Debug, Clone)]
pub struct CorpusSchema {
    annotated_fields: Vec<AnnotatedField>,
    metadata_fields: Vec<MetadataField>,
    main_field: String,
    default_context_size: usize,
    max_match_length: usize,
}

impl CorpusSchema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    pub fn annotated_fields(&self) -> &[AnnotatedField] {
        &self.annotated_fields
    }

    pub fn metadata_fields(&self) -> &[MetadataField] {
        &self.metadata_fields
    }

    pub fn annotated_field(&self, name: &str) -> Option<&AnnotatedField> {
        self.annotated_fields.iter().find(|f| f.name == name)
    }

    pub fn require_annotated_field(&self, name: &str) -> Result<&AnnotatedField> {
        self.annotated_field(name)
            .ok_or_else(|| Error::not_found("annotated field", name))
    }

    pub fn metadata_field(&self, name: &str) -> Option<&MetadataField> {
        self.metadata_fields.iter().find(|f| f.name == name)
    }

    pub fn require_metadata_field(&self, name: &str) -> Result<&MetadataField> {
        self.metadata_field(name)
            .ok_or_else(|| Error::not_found("metadata field", name))
    }

    /// The primary annotated field, searched when no field is named.
    pub fn main_field(&self) -> &AnnotatedField {
        self.annotated_field(&self.main_field)
            .expect("main field always registered by the builder")
    }

    pub fn default_context_size(&self) -> usize {
        self.default_context_size
    }

    pub fn max_match_length(&self) -> usize {
        self.max_match_length
    }
}

/// Builder for [`CorpusSchema`]. The first annotated field added becomes the
/// main field unless overridden.
pub struct SchemaBuilder {
    annotated_fields: Vec<AnnotatedField>,
    metadata_fields: Vec<MetadataField>,
    main_field: Option<String>,
    default_context_size: usize,
    max_match_length: usize,
}

impl SchemaBuilder {
    pub fn new() -> SchemaBuilder {
        SchemaBuilder {
            annotated_fields: Vec::new(),
            metadata_fields: Vec::new(),
            main_field: None,
            default_context_size: DEFAULT_CONTEXT_SIZE,
            max_match_length: DEFAULT_MAX_MATCH_LENGTH,
        }
    }

    /// Registers an annotated field; the first listed annotation is the main
    /// annotation.
    pub fn annotated_field<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        annotations: impl IntoIterator<Item = S>,
    ) -> SchemaBuilder {
        let name = name.into();
        let annotations: Vec<Annotation> = annotations
            .into_iter()
            .map(|a| Annotation { name: a.into() })
            .collect();
        assert!(
            !annotations.is_empty(),
            "annotated field {name} needs at least one annotation"
        );
        let main_annotation = annotations[0].name.clone();
        if self.main_field.is_none() {
            self.main_field = Some(name.clone());
        }
        self.annotated_fields.push(AnnotatedField {
            name,
            annotations,
            main_annotation,
        });
        self
    }

    pub fn metadata_field(mut self, name: impl Into<String>, numeric: bool) -> SchemaBuilder {
        self.metadata_fields.push(MetadataField {
            name: name.into(),
            numeric,
        });
        self
    }

    pub fn main_field(mut self, name: impl Into<String>) -> SchemaBuilder {
        self.main_field = Some(name.into());
        self
    }

    pub fn default_context_size(mut self, size: usize) -> SchemaBuilder {
        self.default_context_size = size;
        self
    }

    pub fn max_match_length(mut self, len: usize) -> SchemaBuilder {
        self.max_match_length = len;
        self
    }

    pub fn build(self) -> Result<CorpusSchema> {
        let main_field = self
            .main_field
            .ok_or_else(|| Error::invalid_arg("schema", "no annotated fields registered"))?;
        concord_common::verify_arg!(
            main_field,
            self.annotated_fields.iter().any(|f| f.name == main_field)
        );
        concord_common::verify_arg!(default_context_size, self.default_context_size > 0);
        concord_common::verify_arg!(max_match_length, self.max_match_length > 0);
        Ok(CorpusSchema {
            annotated_fields: self.annotated_fields,
            metadata_fields: self.metadata_fields,
            main_field,
            default_context_size: self.default_context_size,
            max_match_length: self.max_match_length,
        })
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        SchemaBuilder::new()
    }
}
