//! Core pipeline orchestration for cmsextract.
//!
//! This crate ties together fetching, extraction, classification, document
//! assembly, and output writing into the per-page pipeline and its batch
//! runner.

pub mod assembler;
pub mod bundle;
pub mod pipeline;
pub mod writer;

pub use assembler::{Assembly, ClassifiedSnippet, assemble};
pub use bundle::{BundleSummary, bundle_page};
pub use pipeline::{
    BatchItem, BatchReport, BatchSummary, PageOutcome, PageReport, Pipeline, ProgressReporter,
    SilentProgress, run_batch,
};
pub use writer::{WrittenPage, read_page, verify_page, write_page};
