//! reqwest-backed transport
//!
//! One shared `reqwest::Client` (connection pooling) with a per-request
//! timeout. Non-2xx answers are turned into `TransportError::Status` with the
//! body text, since Twitter explains OAuth failures in the body.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, warn};

use crate::{HttpRequest, HttpResponse, Result, Transport, TransportError};

pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = request.method.clone();
        let url = request.url.clone();
        debug!(%method, %url, body_len = request.body.len(), "sending request");

        let response = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .body(request.body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.classify(e))?
            .to_vec();

        if !status.is_success() {
            let body = String::from_utf8_lossy(&body).into_owned();
            warn!(%method, %url, status = status.as_u16(), "non-success response");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(%method, %url, status = status.as_u16(), body_len = body.len(), "response received");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn classify(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

impl Transport for ReqwestTransport {
    fn send(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + '_>> {
        Box::pin(self.execute(request))
    }
}
