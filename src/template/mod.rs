//! Templates rendered from runtime state

pub mod renderer;
pub mod source;

pub use renderer::{JinjaRenderer, Renderer};
pub use source::TemplateSource;

use crate::error::Result;

/// Resolve `source` and compile it
pub async fn load_renderer(source: &str, no_ssl_check: bool) -> Result<JinjaRenderer> {
    let text = TemplateSource::parse(source)?.load(no_ssl_check).await?;
    JinjaRenderer::new(&text)
}
