use anyhow::{Context, Result};
use reqwest::blocking::Client;
use sentinel_core::{HttpClient, HttpRequest, HttpResponse, Method, TransportError};
use tracing::debug;

const USER_AGENT: &str = concat!("release-sentinel/", env!("CARGO_PKG_VERSION"));

/// [`HttpClient`] over a blocking reqwest client. The timeout is applied per
/// request, so one client serves the probe, publisher and webhook alike.
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build().context("build http client")?;
        Ok(Self { client })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    // the error chain may carry the URL but never the Authorization header
    let text = err.to_string();
    if err.is_timeout() {
        TransportError::Timeout(text)
    } else if err.is_connect() {
        TransportError::Connect(text)
    } else {
        TransportError::Other(text)
    }
}

impl HttpClient for ReqwestHttpClient {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!(method = ?request.method, url = %request.url, "http request");
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        builder = builder.timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token.expose());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().map_err(classify)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response.text().map_err(classify)?;
        debug!(status, url = %request.url, "http response");
        Ok(HttpResponse { status, headers, body })
    }
}
