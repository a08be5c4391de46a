//! # Livery - Render Anything Into an HTTP Response
//!
//! Livery turns handler results into complete HTTP responses. One call sets
//! the content type, writes the status and writes the body:
//!
//! - JSON and XML, compact or indented, with an optional anti-hijacking prefix
//! - HTML templates with automatic escaping, layouts and per-call extra data
//! - Plain text templates that render without escaping
//! - Raw bytes, bare statuses and redirects
//!
//! Templates live in a directory compiled at startup (see [`livery_render`]).
//! In development they are recompiled for every request.
//!
//! ## Core Concepts
//!
//! - [`Options`]: Where templates live and how responses are encoded
//! - [`RendererFactory`]: Built once; creates a [`Renderer`] per request
//! - [`Renderer`]: The per-request API handlers call
//! - [`ResponseWriter`]: What a renderer writes into; [`BufferedResponse`] collects in memory
//! - [`Env`]: Development (recompile) or production (compile once)
//!
//! ## Quick Start
//!
//! ```rust
//! use http::{Request, StatusCode};
//! use livery::{Env, HtmlOptions, Options, RendererFactory};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Page { title: String }
//!
//! let dir = tempfile::tempdir().unwrap();
//! std::fs::write(dir.path().join("page.tmpl"), "<h1>{{ title }}</h1>").unwrap();
//! std::fs::write(dir.path().join("base.tmpl"), "<body>{{ yield() }}</body>").unwrap();
//!
//! let factory = RendererFactory::with_env(
//!     Options::new().with_directory(dir.path()).with_layout("base"),
//!     Env::Production,
//! ).unwrap();
//!
//! let request = Request::get("/").body(()).unwrap();
//! let response = factory.respond(&request, |r| {
//!     r.html(StatusCode::OK, "page", &Page { title: "Fish & Chips".into() })
//! }).unwrap();
//!
//! assert_eq!(response.body(), b"<body><h1>Fish &amp; Chips</h1></body>");
//!
//! // A single call can opt out of the layout.
//! let response = factory.respond(&request, |r| {
//!     let page = Page { title: "bare".into() };
//!     r.html_with(StatusCode::OK, "page", &page, &HtmlOptions::no_layout())
//! }).unwrap();
//! assert_eq!(response.body(), b"<h1>bare</h1>");
//! ```
//!
//! ## Failures
//!
//! Handlers never see render errors. A value that fails to serialize or a
//! template that fails to execute produces `500 Internal Server Error` with
//! the error text as the body. Compile errors, on the other hand, surface
//! from [`RendererFactory::new`] so a broken template stops startup.

mod env;
mod factory;
pub mod redirect;
mod renderer;
pub mod response;

pub use env::{Env, ParseEnvError, ENV_VAR};
pub use factory::RendererFactory;
pub use renderer::Renderer;
pub use response::{BufferedResponse, ResponseWriter};

pub use livery_render::{
    prepare_options, CompileError, ConfigError, Delims, Flavor, FuncMap, HtmlOptions, Options,
    RenderError, TemplateSet, CONTENT_BINARY, CONTENT_HTML, CONTENT_JSON, CONTENT_XHTML,
    CONTENT_XML, DEFAULT_CHARSET, DEFAULT_DIRECTORY, DEFAULT_EXTENSION,
};

pub use livery_render::minijinja;
