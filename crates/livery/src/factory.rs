//! Per-request renderer construction.
//!
//! [`RendererFactory`] is built once at startup. It resolves options,
//! compiles the template directory (failing fast on any broken template),
//! and owns the buffer pool shared by every request. For each request it
//! hands out a [`Renderer`]:
//!
//! - In [`Env::Development`] the templates are recompiled from disk first,
//!   so edits show up without a restart.
//! - Otherwise every request shares the set compiled at startup.

use std::sync::Arc;

use http::header::HeaderValue;
use http::{Request, Response};

use livery_render::{
    prepare_charset, BufferPool, CompileError, Options, TemplateSet, CONTENT_JSON, CONTENT_XML,
};

use crate::env::Env;
use crate::renderer::{ContentTypes, Renderer, RequestHead};
use crate::response::{BufferedResponse, ResponseWriter};

/// Builds a [`Renderer`] for each request.
#[derive(Debug, Clone)]
pub struct RendererFactory {
    env: Env,
    options: Arc<Options>,
    content_types: ContentTypes,
    compiled: Arc<TemplateSet>,
    pool: Arc<BufferPool>,
}

impl RendererFactory {
    /// Creates a factory with the environment read from `LIVERY_ENV`.
    ///
    /// # Errors
    ///
    /// Returns an error if any template fails to read or parse, or if the
    /// configured content type or charset is not a valid header value.
    pub fn new(options: Options) -> Result<Self, CompileError> {
        Self::with_env(options, Env::from_env())
    }

    /// Creates a factory for an explicit environment.
    pub fn with_env(options: Options, env: Env) -> Result<Self, CompileError> {
        Self::with_pool(options, env, BufferPool::default())
    }

    /// Creates a factory rendering into buffers from `pool`.
    pub fn with_pool(options: Options, env: Env, pool: BufferPool) -> Result<Self, CompileError> {
        let options = options.prepare();
        let content_types = content_types(&options)?;
        let compiled = TemplateSet::compile(&options)?;

        tracing::debug!(
            env = %env,
            directory = %options.directory.display(),
            "renderer factory ready"
        );

        Ok(Self {
            env,
            options: Arc::new(options),
            content_types,
            compiled: Arc::new(compiled),
            pool: Arc::new(pool),
        })
    }

    pub fn env(&self) -> Env {
        self.env
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// The template set the next request will render with: a fresh compile
    /// in development, the startup snapshot otherwise.
    pub fn templates(&self) -> Result<Arc<TemplateSet>, CompileError> {
        if self.env.recompiles() {
            tracing::debug!(directory = %self.options.directory.display(), "recompiling templates");
            Ok(Arc::new(TemplateSet::compile(&self.options)?))
        } else {
            Ok(Arc::clone(&self.compiled))
        }
    }

    /// Creates the renderer for one request.
    ///
    /// # Errors
    ///
    /// Only in development, when recompiling finds a broken template.
    pub fn renderer<W: ResponseWriter, B>(
        &self,
        writer: W,
        request: &Request<B>,
    ) -> Result<Renderer<W>, CompileError> {
        let head = RequestHead {
            method: request.method().clone(),
            uri: request.uri().clone(),
        };
        Ok(Renderer::new(
            writer,
            head,
            self.templates()?,
            Arc::clone(&self.options),
            self.content_types.clone(),
            Arc::clone(&self.pool),
        ))
    }

    /// Runs `handler` against an in-memory response and returns it.
    pub fn respond<B, F>(&self, request: &Request<B>, handler: F) -> Result<Response<Vec<u8>>, CompileError>
    where
        F: FnOnce(&mut Renderer<BufferedResponse>),
    {
        let mut renderer = self.renderer(BufferedResponse::new(), request)?;
        handler(&mut renderer);
        Ok(renderer.into_response())
    }
}

fn content_types(options: &Options) -> Result<ContentTypes, CompileError> {
    let charset = prepare_charset(&options.charset);
    let header = |base: &str| {
        let value = format!("{}{}", base, charset);
        HeaderValue::from_str(&value).map_err(|_| CompileError::InvalidHeader(value))
    };

    let text_base = options
        .text_content_type
        .as_deref()
        .filter(|ct| !ct.is_empty())
        .unwrap_or(&options.html_content_type);

    Ok(ContentTypes {
        json: header(CONTENT_JSON)?,
        xml: header(CONTENT_XML)?,
        html: header(&options.html_content_type)?,
        text: header(text_base)?,
    })
}
