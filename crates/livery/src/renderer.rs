//! The per-request renderer.
//!
//! A [`Renderer`] is created by a [`RendererFactory`](crate::RendererFactory)
//! for each request and handed to the handler. Every method writes a complete
//! response: headers first, then the status, then the body.
//!
//! Failures never reach the handler. A value that does not serialize or a
//! template that does not render produces a `500` whose body is the error
//! text, and nothing else is written.

use std::io;
use std::sync::Arc;

use http::header::{HeaderValue, CONTENT_TYPE, LOCATION, X_CONTENT_TYPE_OPTIONS};
use http::{HeaderMap, Method, Response, StatusCode, Uri};
use serde::Serialize;

use livery_render::{
    compose, to_json, to_xml, BufferPool, Flavor, HtmlOptions, Options, TemplateSet,
    CONTENT_BINARY,
};

use crate::redirect::{html_escape, resolve_location};
use crate::response::{BufferedResponse, ResponseWriter};

/// `Content-Type` values, computed once per factory.
#[derive(Debug, Clone)]
pub(crate) struct ContentTypes {
    pub json: HeaderValue,
    pub xml: HeaderValue,
    pub html: HeaderValue,
    pub text: HeaderValue,
}

/// Method and URI of the request being answered. Only redirects use it.
#[derive(Debug, Clone)]
pub(crate) struct RequestHead {
    pub method: Method,
    pub uri: Uri,
}

/// Renders values into one response.
///
/// ```rust
/// use livery::{Env, Options, RendererFactory};
/// use http::{Request, StatusCode};
///
/// let factory = RendererFactory::with_env(
///     Options::new().with_directory("does-not-exist"),
///     Env::Production,
/// ).unwrap();
///
/// let request = Request::get("/greeting").body(()).unwrap();
/// let response = factory
///     .respond(&request, |r| r.json(StatusCode::OK, &"hello world"))
///     .unwrap();
///
/// assert_eq!(response.status(), StatusCode::OK);
/// assert_eq!(response.headers()["content-type"], "application/json; charset=UTF-8");
/// assert_eq!(response.body(), br#""hello world""#);
/// ```
pub struct Renderer<W: ResponseWriter = BufferedResponse> {
    writer: W,
    request: RequestHead,
    templates: Arc<TemplateSet>,
    options: Arc<Options>,
    content_types: ContentTypes,
    pool: Arc<BufferPool>,
}

impl<W: ResponseWriter> Renderer<W> {
    pub(crate) fn new(
        writer: W,
        request: RequestHead,
        templates: Arc<TemplateSet>,
        options: Arc<Options>,
        content_types: ContentTypes,
        pool: Arc<BufferPool>,
    ) -> Self {
        Self {
            writer,
            request,
            templates,
            options,
            content_types,
            pool,
        }
    }

    /// Writes `value` as JSON.
    pub fn json<T: Serialize + ?Sized>(&mut self, status: StatusCode, value: &T) {
        let body = match to_json(value, self.options.indent_json) {
            Ok(body) => body,
            Err(err) => return self.fail(&err),
        };

        self.writer
            .headers_mut()
            .insert(CONTENT_TYPE, self.content_types.json.clone());
        self.writer.write_status(status);
        if !self.options.prefix_json.is_empty() {
            let prefix = self.options.prefix_json.clone();
            self.write_body(&prefix);
        }
        self.write_body(&body);
    }

    /// Writes `value` as XML.
    pub fn xml<T: Serialize + ?Sized>(&mut self, status: StatusCode, value: &T) {
        let body = match to_xml(value, self.options.indent_xml) {
            Ok(body) => body,
            Err(err) => return self.fail(&err),
        };

        self.writer
            .headers_mut()
            .insert(CONTENT_TYPE, self.content_types.xml.clone());
        self.writer.write_status(status);
        if !self.options.prefix_xml.is_empty() {
            let prefix = self.options.prefix_xml.clone();
            self.write_body(&prefix);
        }
        self.write_body(&body);
    }

    /// Renders template `name` with the escaping tree, inside the default
    /// layout if one is configured.
    pub fn html<T: Serialize + ?Sized>(&mut self, status: StatusCode, name: &str, value: &T) {
        self.template(Flavor::Markup, status, name, value, None);
    }

    /// Like [`html`](Self::html) with per-call layout and extra data.
    pub fn html_with<T: Serialize + ?Sized>(
        &mut self,
        status: StatusCode,
        name: &str,
        value: &T,
        options: &HtmlOptions,
    ) {
        self.template(Flavor::Markup, status, name, value, Some(options));
    }

    /// Renders template `name` with the non-escaping tree.
    pub fn text<T: Serialize + ?Sized>(&mut self, status: StatusCode, name: &str, value: &T) {
        self.template(Flavor::Text, status, name, value, None);
    }

    /// Like [`text`](Self::text) with a per-call layout.
    pub fn text_with<T: Serialize + ?Sized>(
        &mut self,
        status: StatusCode,
        name: &str,
        value: &T,
        options: &HtmlOptions,
    ) {
        self.template(Flavor::Text, status, name, value, Some(options));
    }

    /// Writes raw bytes. Defaults the content type to
    /// `application/octet-stream` if none has been set.
    pub fn data(&mut self, status: StatusCode, body: &[u8]) {
        if !self.writer.headers().contains_key(CONTENT_TYPE) {
            self.writer
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_BINARY));
        }
        self.writer.write_status(status);
        self.write_body(body);
    }

    /// Writes only a status.
    pub fn error(&mut self, status: StatusCode) {
        self.writer.write_status(status);
    }

    /// Writes only a status. Same as [`error`](Self::error).
    pub fn status(&mut self, status: StatusCode) {
        self.writer.write_status(status);
    }

    /// Redirects to `location`, with `302 Found` unless a status is given.
    ///
    /// Relative locations are resolved against the request path.
    pub fn redirect(&mut self, location: &str, status: impl Into<Option<StatusCode>>) {
        let status = status.into().unwrap_or(StatusCode::FOUND);
        let target = resolve_location(location, self.request.uri.path());

        let value = match HeaderValue::from_str(&target) {
            Ok(value) => value,
            Err(err) => return self.fail(&err),
        };
        self.writer.headers_mut().insert(LOCATION, value);

        let had_content_type = self.writer.headers().contains_key(CONTENT_TYPE);
        let is_get = self.request.method == Method::GET;
        if !had_content_type && (is_get || self.request.method == Method::HEAD) {
            self.writer.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            );
        }
        self.writer.write_status(status);

        if !had_content_type && is_get {
            let body = format!(
                "<a href=\"{}\">{}</a>.\n\n",
                html_escape(&target),
                status.canonical_reason().unwrap_or("Redirect")
            );
            self.write_body(body.as_bytes());
        }
    }

    /// Outbound headers, for changes before (or alongside) the other calls.
    pub fn header(&mut self) -> &mut HeaderMap {
        self.writer.headers_mut()
    }

    /// The templates this request renders with.
    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    fn template<T: Serialize + ?Sized>(
        &mut self,
        flavor: Flavor,
        status: StatusCode,
        name: &str,
        value: &T,
        overrides: Option<&HtmlOptions>,
    ) {
        let options = Arc::clone(&self.options);
        let resolved = options.resolve_html(overrides);
        let binding = match flavor {
            Flavor::Markup => compose(value, Some(resolved.extra)),
            Flavor::Text => compose(value, None),
        };
        let binding = match binding {
            Ok(binding) => binding,
            Err(err) => return self.fail(&err),
        };

        let pool = Arc::clone(&self.pool);
        let mut buf = pool.acquire();
        if let Err(err) =
            self.templates
                .execute(flavor, name, resolved.layout, &binding, &mut *buf)
        {
            return self.fail(&err);
        }

        let content_type = match flavor {
            Flavor::Markup => self.content_types.html.clone(),
            Flavor::Text => self.content_types.text.clone(),
        };
        self.writer.headers_mut().insert(CONTENT_TYPE, content_type);
        self.writer.write_status(status);
        self.write_body(&buf);
    }

    /// Answers with `500` and the error text.
    fn fail(&mut self, err: &dyn std::error::Error) {
        let message = err.to_string();
        tracing::warn!(error = %message, "render failed, answering 500");

        let headers = self.writer.headers_mut();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        self.writer.write_status(StatusCode::INTERNAL_SERVER_ERROR);
        self.write_body(message.as_bytes());
    }

    fn write_body(&mut self, body: &[u8]) {
        if let Err(err) = write_all(&mut self.writer, body) {
            tracing::warn!(error = %err, "failed to write response body");
        }
    }
}

impl Renderer<BufferedResponse> {
    /// Finishes the request and returns the collected response.
    pub fn into_response(self) -> Response<Vec<u8>> {
        self.writer.into_response()
    }
}

fn write_all<W: ResponseWriter + ?Sized>(writer: &mut W, mut body: &[u8]) -> io::Result<()> {
    while !body.is_empty() {
        match writer.write(body) {
            Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
            Ok(n) => body = &body[n..],
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
