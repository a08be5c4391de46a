//! Template discovery, compilation and layout rendering.
//!
//! Templates are MiniJinja templates loaded from a directory tree. Each file
//! is compiled twice, into an HTML-escaping tree and a plain text tree, and
//! looked up by its relative path without extension (`users/show`).
//!
//! ## Layouts
//!
//! A layout is an ordinary template that calls `yield()` where the content
//! should go:
//!
//! ```jinja
//! <html><body data-page="{{ current() }}">{{ yield() }}</body></html>
//! ```
//!
//! Rendering `"users/show"` with layout `"layout"` executes `layout`; its
//! `yield()` renders `users/show` with the same binding and `current()`
//! returns `"users/show"`. The binding exists only for that one call.
//!
//! ## Key Types
//!
//! - [`TemplateSet`]: The two compiled trees
//! - [`Flavor`]: Selects the escaping or plain tree
//! - [`FuncMap`]: User helper functions
//! - [`walk_template_dir`]: Discovery without compiling

mod engine;
mod functions;
pub mod registry;

pub use engine::{compose, Flavor, TemplateSet};
pub use functions::FuncMap;
pub use registry::{file_extension, template_name, walk_template_dir, TemplateFile};
