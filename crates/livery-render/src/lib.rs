//! # Livery Render - Templates and Serialization for HTTP Responses
//!
//! `livery-render` holds everything the [`livery`] HTTP layer needs that has
//! nothing to do with HTTP itself: options and their defaults, compiling a
//! template directory, layouts, JSON/XML serialization and a buffer pool.
//!
//! [`livery`]: https://docs.rs/livery
//!
//! ## Core Concepts
//!
//! - [`Options`]: Template directory, extensions, layout, charset and friends
//! - [`TemplateSet`]: A directory compiled into an escaping and a plain tree
//! - [`Flavor`]: Which of the two trees to render with
//! - [`FuncMap`]: Helper functions made available to templates
//! - [`BufferPool`]: Reusable buffers templates render into
//! - [`to_json`] / [`to_xml`]: Structured bodies
//!
//! ## Quick Start
//!
//! ```rust
//! use livery_render::{Flavor, Options, TemplateSet};
//! use serde_json::json;
//!
//! let dir = tempfile::tempdir().unwrap();
//! std::fs::write(dir.path().join("hello.tmpl"), "Hello, {{ name }}!").unwrap();
//!
//! let options = Options::new().with_directory(dir.path()).prepare();
//! let templates = TemplateSet::compile(&options).unwrap();
//!
//! let output = templates
//!     .render(Flavor::Markup, "hello", None, &json!({ "name": "World" }))
//!     .unwrap();
//! assert_eq!(output, "Hello, World!");
//! ```

mod error;
pub mod options;
pub mod pool;
pub mod serialize;
pub mod template;

pub use error::{CompileError, ConfigError, RenderError};

pub use options::{
    prepare_charset, prepare_options, Delims, HtmlOptions, Options, ResolvedHtmlOptions,
    CONTENT_BINARY, CONTENT_HTML, CONTENT_JSON, CONTENT_XHTML, CONTENT_XML, DEFAULT_CHARSET,
    DEFAULT_DIRECTORY, DEFAULT_EXTENSION,
};

pub use pool::{BufferPool, PooledBuffer, DEFAULT_POOL_CAPACITY};

pub use serialize::{to_json, to_xml, SerializeError};

pub use template::{
    compose, template_name, walk_template_dir, Flavor, FuncMap, TemplateFile, TemplateSet,
};

// Template helpers are built from MiniJinja values.
pub use minijinja;
