//! Shared types, error model, and configuration for cmsextract.
//!
//! This crate is the foundation depended on by all other cmsextract crates.
//! It provides:
//! - [`CmsExtractError`]: the unified error type
//! - Domain types ([`Metadata`], [`CandidateSnippet`], [`ModelType`], [`PageDocument`])
//! - The declarative model schema table ([`schema`])
//! - Slug and output path derivation ([`slug`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod schema;
pub mod slug;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, ExtractOptions, FetchConfig, OracleConfig, PipelineConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{CmsExtractError, Result};
pub use schema::{FieldSource, FieldSpec, ModelSchema, SCHEMAS, schema_for};
pub use types::{
    CandidateSnippet, Metadata, ModelDocument, ModelFields, ModelRef, ModelType, PageDocument,
    SnippetKind,
};
