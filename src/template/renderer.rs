//! Rendering seam and the Jinja renderer

use crate::error::{PygenError, Result};
use crate::state::State;
use minijinja::{Environment, Error, Value};

/// Turns a runtime snapshot into the target text
pub trait Renderer: Send + Sync {
    fn render(&self, state: &State) -> Result<String>;
}

/// True when any item of a sequence is truthy
fn any(value: Value) -> std::result::Result<bool, Error> {
    Ok(value.try_iter()?.any(|item| item.is_true()))
}

/// True when every item of a sequence is truthy
fn all(value: Value) -> std::result::Result<bool, Error> {
    Ok(value.try_iter()?.all(|item| item.is_true()))
}

/// Renders Jinja templates against the JSON form of [`State`]
///
/// Block tags swallow their trailing newline and leading indentation,
/// `{% break %}` and `{% continue %}` are available in loops, and the `any`
/// and `all` filters reduce sequences of booleans.
pub struct JinjaRenderer {
    environment: Environment<'static>,
    template: String,
}

impl JinjaRenderer {
    /// Compile `template`, failing on syntax errors
    pub fn new(template: &str) -> Result<Self> {
        let mut environment = Environment::new();
        environment.set_trim_blocks(true);
        environment.set_lstrip_blocks(true);
        environment.add_filter("any", any);
        environment.add_filter("all", all);

        environment
            .template_from_str(template)
            .map_err(|e| PygenError::Template(e.to_string()))?;

        Ok(Self {
            environment,
            template: template.to_string(),
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl Renderer for JinjaRenderer {
    fn render(&self, state: &State) -> Result<String> {
        self.environment
            .render_str(&self.template, state.to_value()?)
            .map_err(|e| PygenError::Render(e.to_string()))
    }
}
