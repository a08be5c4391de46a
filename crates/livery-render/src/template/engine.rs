//! Compiled template trees.
//!
//! A [`TemplateSet`] holds two MiniJinja environments built from the same
//! files: one that HTML-escapes every expression ([`Flavor::Markup`]) and one
//! that never escapes ([`Flavor::Text`]).
//!
//! The set is read-only once compiled. Per-call state (which content template
//! a layout wraps) lives in the render context, so one set can be shared by
//! any number of concurrent renders without cloning.
//!
//! ```rust
//! use livery_render::{Flavor, Options, TemplateSet};
//!
//! let dir = tempfile::tempdir().unwrap();
//! std::fs::write(dir.path().join("layout.tmpl"), "L[{{ yield() }}]").unwrap();
//! std::fs::write(dir.path().join("content.tmpl"), "hi {{ name }}").unwrap();
//!
//! let options = Options::new().with_directory(dir.path()).prepare();
//! let set = TemplateSet::compile(&options).unwrap();
//!
//! let data = serde_json::json!({ "name": "<b>" });
//! let mut out = Vec::new();
//! set.execute(Flavor::Markup, "content", Some("layout"), &data, &mut out).unwrap();
//! assert_eq!(String::from_utf8(out).unwrap(), "L[hi &lt;b&gt;]");
//! ```

use std::collections::BTreeMap;
use std::io::Write;

use minijinja::syntax::SyntaxConfig;
use minijinja::value::Value;
use minijinja::{AutoEscape, Environment, Error, ErrorKind, Output, State};

use super::functions::{self, FuncMap};
use super::registry::walk_template_dir;
use crate::error::{CompileError, RenderError};
use crate::options::Options;

/// Body of the placeholder template every set starts with.
const PLACEHOLDER: &str = "Livery";

/// Which of the two template trees to render with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    /// HTML auto-escaping tree.
    Markup,
    /// Non-escaping tree.
    Text,
}

/// Two parallel, independently executable template trees.
pub struct TemplateSet {
    markup: Environment<'static>,
    text: Environment<'static>,
    names: Vec<String>,
}

impl std::fmt::Debug for TemplateSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateSet")
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

impl TemplateSet {
    /// Walks `options.directory` and compiles every matching file into both
    /// trees.
    ///
    /// `options` should already have been through [`Options::prepare`].
    ///
    /// # Errors
    ///
    /// Any unreadable or unparsable template fails the whole compile. A
    /// missing directory does not: the set then holds only the placeholder.
    pub fn compile(options: &Options) -> Result<Self, CompileError> {
        let syntax = syntax_config(options)?;
        let mut markup = new_environment(Flavor::Markup, syntax.clone(), &options.html_funcs);
        let mut text = new_environment(Flavor::Text, syntax, &options.text_funcs);

        // Keeps the trees non-empty even without a template directory.
        let root_name = options.directory.to_string_lossy().into_owned();
        for env in [&mut markup, &mut text] {
            env.add_template_owned(root_name.clone(), PLACEHOLDER.to_string())
                .map_err(|source| CompileError::Parse {
                    name: root_name.clone(),
                    path: options.directory.clone(),
                    source,
                })?;
        }

        let files = walk_template_dir(&options.directory, &options.extensions)?;
        let mut names = Vec::with_capacity(files.len());
        for file in files {
            let source =
                std::fs::read_to_string(&file.path).map_err(|source| CompileError::Read {
                    path: file.path.clone(),
                    source,
                })?;

            for env in [&mut markup, &mut text] {
                env.add_template_owned(file.name.clone(), source.clone())
                    .map_err(|source| CompileError::Parse {
                        name: file.name.clone(),
                        path: file.path.clone(),
                        source,
                    })?;
            }
            names.push(file.name);
        }

        tracing::debug!(
            directory = %options.directory.display(),
            templates = names.len(),
            "compiled templates"
        );

        Ok(Self {
            markup,
            text,
            names,
        })
    }

    /// The HTML-escaping environment.
    pub fn markup(&self) -> &Environment<'static> {
        &self.markup
    }

    /// The non-escaping environment.
    pub fn text(&self) -> &Environment<'static> {
        &self.text
    }

    pub fn environment(&self, flavor: Flavor) -> &Environment<'static> {
        match flavor {
            Flavor::Markup => &self.markup,
            Flavor::Text => &self.text,
        }
    }

    /// Names of the templates loaded from disk, in walk order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.markup.get_template(name).is_ok()
    }

    /// Renders `name` into `out`.
    ///
    /// With a layout, the layout template is rendered instead, and its
    /// `yield()` renders `name` with the same `data`.
    pub fn execute<W: Write>(
        &self,
        flavor: Flavor,
        name: &str,
        layout: Option<&str>,
        data: &serde_json::Value,
        mut out: W,
    ) -> Result<(), RenderError> {
        let env = self.environment(flavor);
        let (target, ctx) = match layout {
            Some(layout) => (layout, layout_context(name, data)?),
            None => (name, Value::from_serialize(data)),
        };

        let rendered = env.get_template(target)?.render(ctx)?;
        out.write_all(rendered.as_bytes())?;
        Ok(())
    }

    /// Renders `name` to a string. Convenience over [`execute`](Self::execute).
    pub fn render(
        &self,
        flavor: Flavor,
        name: &str,
        layout: Option<&str>,
        data: &serde_json::Value,
    ) -> Result<String, RenderError> {
        let mut out = Vec::new();
        self.execute(flavor, name, layout, data, &mut out)?;
        String::from_utf8(out).map_err(|e| RenderError::Serialization(e.to_string()))
    }
}

/// Serializes a binding and layers `extra` over it.
///
/// Extra values are only merged into map-shaped bindings; any other value
/// is returned as is. Extra keys win over keys of the binding.
pub fn compose<T: serde::Serialize + ?Sized>(
    data: &T,
    extra: Option<&BTreeMap<String, String>>,
) -> Result<serde_json::Value, RenderError> {
    let mut value = serde_json::to_value(data)?;
    let Some(extra) = extra else {
        return Ok(value);
    };
    if let serde_json::Value::Object(map) = &mut value {
        for (key, extra_value) in extra {
            map.insert(key.clone(), serde_json::Value::String(extra_value.clone()));
        }
    }
    Ok(value)
}

/// Context for a layout render: the binding's entries plus the layout frame.
fn layout_context(name: &str, data: &serde_json::Value) -> Result<Value, RenderError> {
    let frame = functions::layout_frame(name, data);
    Ok(functions::with_frame(&Value::from_serialize(data), frame)?)
}

/// Escapes `& < > " '` in markup output. Safe values pass through.
fn markup_formatter(out: &mut Output, state: &State, value: &Value) -> Result<(), Error> {
    if value.is_safe()
        || value.is_undefined()
        || value.is_none()
        || !matches!(state.auto_escape(), AutoEscape::Html)
    {
        return minijinja::escape_formatter(out, state, value);
    }
    let text = match value.as_str() {
        Some(text) => text.to_string(),
        None => value.to_string(),
    };
    write_escaped(out, &text)
}

fn write_escaped(out: &mut Output, text: &str) -> Result<(), Error> {
    use std::fmt::Write as _;

    let mut last = 0;
    for (idx, c) in text.char_indices() {
        let entity = match c {
            '&' => "&amp;",
            '<' => "&lt;",
            '>' => "&gt;",
            '"' => "&#34;",
            '\'' => "&#39;",
            _ => continue,
        };
        out.write_str(&text[last..idx])
            .and_then(|_| out.write_str(entity))
            .map_err(|_| Error::new(ErrorKind::WriteFailure, "formatting failed"))?;
        last = idx + c.len_utf8();
    }
    out.write_str(&text[last..])
        .map_err(|_| Error::new(ErrorKind::WriteFailure, "formatting failed"))
}

fn syntax_config(options: &Options) -> Result<Option<SyntaxConfig>, CompileError> {
    let delims = &options.delims;
    if delims.left.is_empty() || delims.right.is_empty() || delims.is_default() {
        return Ok(None);
    }
    SyntaxConfig::builder()
        .variable_delimiters(delims.left.clone(), delims.right.clone())
        .build()
        .map(Some)
        .map_err(CompileError::Syntax)
}

fn new_environment(
    flavor: Flavor,
    syntax: Option<SyntaxConfig>,
    funcs: &[FuncMap],
) -> Environment<'static> {
    let mut env = Environment::new();
    if let Some(syntax) = syntax {
        env.set_syntax(syntax);
    }
    // Template files render byte for byte, final newline included.
    env.set_keep_trailing_newline(true);
    match flavor {
        Flavor::Markup => {
            env.set_auto_escape_callback(|_| AutoEscape::Html);
            env.set_formatter(markup_formatter);
        }
        Flavor::Text => env.set_auto_escape_callback(|_| AutoEscape::None),
    }
    for map in funcs {
        map.apply(&mut env);
    }
    functions::register_helpers(&mut env);
    env
}
