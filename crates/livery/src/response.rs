//! The response stream a [`Renderer`](crate::Renderer) writes to.
//!
//! [`ResponseWriter`] is the seam between the renderer and whatever server
//! owns the connection. It follows the usual streaming order: headers are
//! set, then the status is written once, then body bytes. Writing a body
//! without a status implies `200 OK`.
//!
//! [`BufferedResponse`] is the in-memory implementation, convertible into an
//! [`http::Response`] for frameworks that want a response value back from
//! the handler.

use std::io;

use http::header::{HeaderValue, CONTENT_LENGTH};
use http::{HeaderMap, Response, StatusCode};

/// Destination for a rendered response.
pub trait ResponseWriter {
    /// Outbound headers.
    fn headers(&self) -> &HeaderMap;

    /// Mutable outbound headers. Changes after the status has been written
    /// are not sent.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Writes the status line. Only the first call has an effect.
    fn write_status(&mut self, status: StatusCode);

    /// Whether a status has been written.
    fn status_written(&self) -> bool;

    /// Appends body bytes, writing `200 OK` first if no status was written.
    fn write(&mut self, body: &[u8]) -> io::Result<usize>;
}

impl<W: ResponseWriter + ?Sized> ResponseWriter for &mut W {
    fn headers(&self) -> &HeaderMap {
        (**self).headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        (**self).headers_mut()
    }

    fn write_status(&mut self, status: StatusCode) {
        (**self).write_status(status)
    }

    fn status_written(&self) -> bool {
        (**self).status_written()
    }

    fn write(&mut self, body: &[u8]) -> io::Result<usize> {
        (**self).write(body)
    }
}

/// A response collected in memory.
///
/// Headers are snapshotted when the status is written, matching what a
/// streaming server would have put on the wire.
#[derive(Debug, Default, Clone)]
pub struct BufferedResponse {
    headers: HeaderMap,
    sent: Option<(StatusCode, HeaderMap)>,
    body: Vec<u8>,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// The written status, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.sent.as_ref().map(|(status, _)| *status)
    }

    /// Headers as sent with the status, or the pending headers if no status
    /// has been written yet.
    pub fn sent_headers(&self) -> &HeaderMap {
        match &self.sent {
            Some((_, headers)) => headers,
            None => &self.headers,
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Builds the final response. No status at all means `200 OK`.
    /// `Content-Length` is set from the body unless already present.
    pub fn into_response(self) -> Response<Vec<u8>> {
        let (status, mut headers) = self
            .sent
            .unwrap_or_else(|| (StatusCode::OK, self.headers));
        if !headers.contains_key(CONTENT_LENGTH) {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(self.body.len()));
        }

        let mut response = Response::new(self.body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

impl ResponseWriter for BufferedResponse {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        if let Some((sent, _)) = &self.sent {
            tracing::warn!(
                status = status.as_u16(),
                sent = sent.as_u16(),
                "superfluous status write ignored"
            );
            return;
        }
        self.sent = Some((status, self.headers.clone()));
    }

    fn status_written(&self) -> bool {
        self.sent.is_some()
    }

    fn write(&mut self, body: &[u8]) -> io::Result<usize> {
        if self.sent.is_none() {
            self.write_status(StatusCode::OK);
        }
        self.body.extend_from_slice(body);
        Ok(body.len())
    }
}
