use anyhow::Context;
use reqwest::header::{
  ACCEPT,
  CONTENT_TYPE
};
use tracing::{
  debug,
  trace
};

use super::{
  ApiError,
  ApiRequest,
  ApiResponse,
  Method,
  Transport
};
use crate::config::Config;

/// reqwest-backed transport. Authentication rides on the session cookie:
/// the browser build sends credentials with every fetch and the native
/// build keeps its own cookie jar. No bearer header is ever attached.
#[derive(Debug, Clone)]
pub struct HttpTransport {
  client:   reqwest::Client,
  base_url: String
}

impl HttpTransport {
  #[tracing::instrument(skip(config), fields(base_url = %config.api_base_url))]
  pub fn new(
    config: &Config
  ) -> anyhow::Result<Self> {
    let client = build_client(config)
      .context("failed to build HTTP client")?;
    let base_url = config
      .api_base_url
      .trim_end_matches('/')
      .to_string();
    debug!(base_url = %base_url, "http transport ready");
    Ok(Self { client, base_url })
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  fn url(&self, path: &str) -> String {
    if path.starts_with('/') {
      format!("{}{}", self.base_url, path)
    } else {
      format!("{}/{}", self.base_url, path)
    }
  }
}

#[cfg(not(target_arch = "wasm32"))]
fn build_client(
  config: &Config
) -> reqwest::Result<reqwest::Client> {
  reqwest::Client::builder()
    .cookie_store(true)
    .timeout(std::time::Duration::from_secs(
      config.request_timeout_secs
    ))
    .build()
}

#[cfg(target_arch = "wasm32")]
fn build_client(
  _config: &Config
) -> reqwest::Result<reqwest::Client> {
  reqwest::Client::builder().build()
}

fn to_reqwest(method: Method) -> reqwest::Method {
  match method {
    | Method::Get => reqwest::Method::GET,
    | Method::Post => reqwest::Method::POST,
    | Method::Patch => reqwest::Method::PATCH,
    | Method::Delete => reqwest::Method::DELETE
  }
}

impl Transport for HttpTransport {
  async fn send(
    &self,
    request: ApiRequest
  ) -> Result<ApiResponse, ApiError> {
    let url = self.url(&request.path);
    trace!(method = %request.method, url = %url, "sending request");

    let mut builder = self
      .client
      .request(to_reqwest(request.method), &url)
      .header(ACCEPT, "application/json");
    if !request.query.is_empty() {
      builder = builder.query(&request.query);
    }
    if let Some(body) = &request.body {
      builder = builder
        .header(CONTENT_TYPE, "application/json")
        .json(body);
    }
    #[cfg(target_arch = "wasm32")]
    {
      builder = builder.fetch_credentials_include();
    }

    let response = builder
      .send()
      .await
      .map_err(|err| ApiError::Network(err.to_string()))?;
    let status = response.status().as_u16();
    let body = response
      .text()
      .await
      .map_err(|err| ApiError::Network(err.to_string()))?;

    debug!(
      method = %request.method,
      path = %request.path,
      status,
      bytes = body.len(),
      "response received"
    );
    Ok(ApiResponse { status, body })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn joins_base_url_and_path() {
    let config = Config {
      api_base_url: "http://localhost:8000/api/"
        .to_string(),
      ..Config::default()
    };
    let transport =
      HttpTransport::new(&config).expect("transport");
    assert_eq!(
      transport.base_url(),
      "http://localhost:8000/api"
    );
    assert_eq!(
      transport.url("/tasks/"),
      "http://localhost:8000/api/tasks/"
    );
    assert_eq!(
      transport.url("tasks/7/"),
      "http://localhost:8000/api/tasks/7/"
    );
  }
}
