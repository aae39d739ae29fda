//! Model artifact discovery
//!
//! Enumerates `*.model` files in a models folder, hides reserved names and
//! resolves the ordered feature schema each artifact was trained on.

mod locator;

pub use locator::{
    discover, filter_visible, list_artifacts, per_model_schema_path, read_schema, resolve_schema,
    ArtifactEntry, ResolvedSchema, SchemaSource, ARTIFACT_EXTENSION, DIRECTORY_SCHEMA_FILE,
    SCHEMA_SUFFIX,
};
