//! Rendering options and their defaults.
//!
//! [`Options`] is built once at setup, run through [`Options::prepare`] to
//! fill in defaults, and then shared read-only by every request.
//! [`HtmlOptions`] overrides the layout and extra data for a single call.
//!
//! # Configuration files
//!
//! Everything except the helper function maps can be loaded from YAML:
//!
//! ```rust
//! use livery_render::Options;
//!
//! let options = Options::from_yaml(r#"
//! directory: views
//! layout: layout
//! extensions: [".tmpl", ".html"]
//! indent_json: true
//! prefix_json: ")]}',\n"
//! extra:
//!   site: Example
//! "#).unwrap();
//!
//! assert_eq!(options.layout.as_deref(), Some("layout"));
//! assert_eq!(options.prefix_json, b")]}',\n".to_vec());
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;
use crate::template::FuncMap;

/// `Content-Type` for raw bytes.
pub const CONTENT_BINARY: &str = "application/octet-stream";
/// `Content-Type` for JSON.
pub const CONTENT_JSON: &str = "application/json";
/// Default `Content-Type` for templates.
pub const CONTENT_HTML: &str = "text/html";
/// Alternative `Content-Type` for XHTML output.
pub const CONTENT_XHTML: &str = "application/xhtml+xml";
/// `Content-Type` for XML.
pub const CONTENT_XML: &str = "text/xml";
/// Charset appended to content types when none is configured.
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// Directory templates are loaded from when none is configured.
pub const DEFAULT_DIRECTORY: &str = "templates";
/// Template file extension used when none is configured.
pub const DEFAULT_EXTENSION: &str = ".tmpl";

/// Left and right delimiters for template expressions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Delims {
    /// Left delimiter, defaults to `{{`.
    pub left: String,
    /// Right delimiter, defaults to `}}`.
    pub right: String,
}

impl Delims {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    /// Returns true when these are the engine's standard `{{` / `}}`.
    pub fn is_default(&self) -> bool {
        self.left == "{{" && self.right == "}}"
    }
}

/// Configuration for template compilation and response rendering.
///
/// Fields left empty are filled in by [`prepare`](Self::prepare):
///
/// | Field | Default |
/// |-------|---------|
/// | `directory` | `templates` |
/// | `extensions` | `[".tmpl"]` |
/// | `delims` | `{{` / `}}` |
/// | `html_content_type` | `text/html` |
/// | `charset` | `UTF-8` (applied by [`prepare_charset`]) |
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Directory to load templates from.
    pub directory: PathBuf,
    /// Layout template name. No layout is rendered when `None`.
    pub layout: Option<String>,
    /// File extensions that mark template files, including the leading dot.
    pub extensions: Vec<String>,
    /// Helper functions for the escaping (HTML) template tree.
    #[serde(skip)]
    pub html_funcs: Vec<FuncMap>,
    /// Helper functions for the plain text template tree.
    #[serde(skip)]
    pub text_funcs: Vec<FuncMap>,
    /// Expression delimiters.
    pub delims: Delims,
    /// Charset appended to the `Content-Type` header.
    pub charset: String,
    /// Pretty-print JSON output.
    pub indent_json: bool,
    /// Pretty-print XML output.
    pub indent_xml: bool,
    /// Bytes written before every JSON body.
    #[serde(deserialize_with = "bytes_from_string")]
    pub prefix_json: Vec<u8>,
    /// Bytes written before every XML body.
    #[serde(deserialize_with = "bytes_from_string")]
    pub prefix_xml: Vec<u8>,
    /// `Content-Type` for HTML output, e.g. [`CONTENT_XHTML`].
    pub html_content_type: String,
    /// `Content-Type` for text template output. Falls back to
    /// `html_content_type` when unset.
    pub text_content_type: Option<String>,
    /// Values layered over map-shaped HTML bindings.
    pub extra: BTreeMap<String, String>,
}

impl Options {
    /// Creates empty options; call [`prepare`](Self::prepare) to apply defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills in defaults for every field left empty.
    pub fn prepare(mut self) -> Self {
        if self.directory.as_os_str().is_empty() {
            self.directory = PathBuf::from(DEFAULT_DIRECTORY);
        }
        if self.extensions.is_empty() {
            self.extensions = vec![DEFAULT_EXTENSION.to_string()];
        }
        if self.delims.left.is_empty() {
            self.delims.left = "{{".to_string();
        }
        if self.delims.right.is_empty() {
            self.delims.right = "}}".to_string();
        }
        if self.html_content_type.is_empty() {
            self.html_content_type = CONTENT_HTML.to_string();
        }
        if self.layout.as_deref() == Some("") {
            self.layout = None;
        }
        self
    }

    /// Parses options from a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads and parses a YAML options file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    /// Adds a template extension, e.g. `".html"`.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extensions.push(extension.into());
        self
    }

    pub fn with_html_funcs(mut self, funcs: FuncMap) -> Self {
        self.html_funcs.push(funcs);
        self
    }

    pub fn with_text_funcs(mut self, funcs: FuncMap) -> Self {
        self.text_funcs.push(funcs);
        self
    }

    pub fn with_delims(mut self, delims: Delims) -> Self {
        self.delims = delims;
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Resolves the per-call options for an HTML or text render.
    pub fn resolve_html<'a>(
        &'a self,
        overrides: Option<&'a HtmlOptions>,
    ) -> ResolvedHtmlOptions<'a> {
        let layout = match overrides.and_then(|o| o.layout.as_deref()) {
            Some("") => None,
            Some(layout) => Some(layout),
            None => self.layout.as_deref(),
        };
        let extra = overrides
            .and_then(|o| o.extra.as_ref())
            .unwrap_or(&self.extra);
        ResolvedHtmlOptions { layout, extra }
    }
}

/// Per-call overrides for HTML and text renders.
///
/// `None` inherits the value from [`Options`]. A layout of `Some("")`
/// disables the default layout for the call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlOptions {
    pub layout: Option<String>,
    pub extra: Option<BTreeMap<String, String>>,
}

impl HtmlOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders inside `layout` for this call.
    pub fn layout(layout: impl Into<String>) -> Self {
        Self {
            layout: Some(layout.into()),
            extra: None,
        }
    }

    /// Renders without any layout, even if one is configured.
    pub fn no_layout() -> Self {
        Self {
            layout: Some(String::new()),
            extra: None,
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Effective layout and extra data for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedHtmlOptions<'a> {
    pub layout: Option<&'a str>,
    pub extra: &'a BTreeMap<String, String>,
}

/// Applies defaults to optional user options.
pub fn prepare_options(options: Option<Options>) -> Options {
    options.unwrap_or_default().prepare()
}

/// Builds the `; charset=...` suffix appended to content types.
pub fn prepare_charset(charset: &str) -> String {
    if charset.is_empty() {
        format!("; charset={}", DEFAULT_CHARSET)
    } else {
        format!("; charset={}", charset)
    }
}

fn bytes_from_string<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = Option::<String>::deserialize(deserializer)?;
    Ok(text.map(String::into_bytes).unwrap_or_default())
}
