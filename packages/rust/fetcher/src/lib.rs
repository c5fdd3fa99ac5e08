//! Source fetching and rendering strategies.
//!
//! This crate provides:
//! - [`SourceInput`] / [`SourceDocument`]: what goes into and comes out of a fetch
//! - [`Renderer`]: one way of turning a URL into HTML ([`HttpRenderer`], and
//!   `BrowserRenderer` with the `browser` feature)
//! - [`Fetcher`]: tries renderers in order under a hard ceiling

#[cfg(feature = "browser")]
pub mod browser;
pub mod engine;
pub mod renderer;
pub mod source;

#[cfg(feature = "browser")]
pub use browser::BrowserRenderer;
pub use engine::Fetcher;
pub use renderer::{HttpRenderer, Rendered, Renderer};
pub use source::{SourceDocument, SourceInput};
