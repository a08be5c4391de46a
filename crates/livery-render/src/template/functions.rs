//! Helper functions available inside templates.
//!
//! Two helpers are always registered:
//!
//! - `yield()`: inside a layout, renders the content template the layout
//!   wraps and returns it as safe markup. Outside a layout it fails with
//!   "yield called with no layout defined".
//! - `current()`: inside a layout and inside the content template it wraps
//!   (and its includes), the name of the content template. Outside a layout,
//!   an empty string.
//!
//! Neither helper holds any state. The content template's name and binding
//! travel in the layout's render context under [`LAYOUT_KEY`], so concurrent
//! renders against one shared environment never see each other's layouts.

use std::collections::BTreeMap;

use minijinja::value::{Value, ValueKind};
use minijinja::{Environment, Error, ErrorKind, State};

/// Context key holding the per-render layout frame.
pub(crate) const LAYOUT_KEY: &str = "__livery_layout";

/// Named helper functions registered on a template tree.
///
/// ```rust
/// use livery_render::FuncMap;
/// use minijinja::Value;
///
/// let funcs = FuncMap::new()
///     .with("shout", Value::from_function(|s: String| s.to_uppercase()))
///     .with("version", Value::from("1.2.0"));
/// assert_eq!(funcs.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FuncMap {
    entries: BTreeMap<String, Value>,
}

impl FuncMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a helper. Functions are built with [`Value::from_function`];
    /// plain values become globals.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.entries.insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Registers every helper on `env`.
    pub fn apply(&self, env: &mut Environment<'static>) {
        for (name, value) in &self.entries {
            env.add_global(name.clone(), value.clone());
        }
    }
}

/// Registers `yield` and `current`. Registered after user helpers so they
/// cannot be shadowed.
pub(crate) fn register_helpers(env: &mut Environment<'static>) {
    env.add_function("yield", yield_content);
    env.add_function("current", current);
}

/// Builds the frame a layout render carries for its content template.
pub(crate) fn layout_frame(name: &str, data: &serde_json::Value) -> Value {
    minijinja::context! {
        name => name,
        data => Value::from_serialize(data),
    }
}

/// The binding's entries plus `frame` under [`LAYOUT_KEY`]. Non-map
/// bindings contribute nothing.
pub(crate) fn with_frame(data: &Value, frame: Value) -> Result<Value, Error> {
    let mut ctx: BTreeMap<String, Value> = BTreeMap::new();
    if data.kind() == ValueKind::Map {
        for key in data.try_iter()? {
            if let Some(name) = key.as_str() {
                ctx.insert(name.to_string(), data.get_item(&key)?);
            }
        }
    }
    ctx.insert(LAYOUT_KEY.to_string(), frame);
    Ok(Value::from_serialize(&ctx))
}

fn yield_content(state: &State) -> Result<Value, Error> {
    let no_layout = || Error::new(ErrorKind::InvalidOperation, "yield called with no layout defined");

    let frame = state
        .lookup(LAYOUT_KEY)
        .filter(|frame| !frame.is_undefined() && !frame.is_none())
        .ok_or_else(no_layout)?;
    // Content templates carry a frame without data: `current()` works there,
    // `yield()` does not.
    let data = frame.get_attr("data")?;
    if data.is_undefined() {
        return Err(no_layout());
    }

    let name = frame.get_attr("name")?;
    let name = name
        .as_str()
        .ok_or_else(|| Error::new(ErrorKind::InvalidOperation, "layout frame without a name"))?;

    let content_frame = minijinja::context! { name => name };
    let ctx = with_frame(&data, content_frame)?;
    let rendered = state.env().get_template(name)?.render(ctx)?;
    // Already escaped by the content template's own render.
    Ok(Value::from_safe_string(rendered))
}

fn current(state: &State) -> Result<String, Error> {
    let name = state
        .lookup(LAYOUT_KEY)
        .and_then(|frame| frame.get_attr("name").ok())
        .and_then(|name| name.as_str().map(str::to_string));
    Ok(name.unwrap_or_default())
}
