use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use super::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
  Get,
  Post,
  Patch,
  Delete
}

impl Method {
  pub fn as_str(self) -> &'static str {
    match self {
      | Self::Get => "GET",
      | Self::Post => "POST",
      | Self::Patch => "PATCH",
      | Self::Delete => "DELETE"
    }
  }
}

impl fmt::Display for Method {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One call against the backend. `path` is relative to the configured
/// base URL and keeps its trailing slash.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
  pub method: Method,
  pub path:   String,
  pub query:  Vec<(&'static str, String)>,
  pub body:   Option<Value>
}

impl ApiRequest {
  pub fn get(path: impl Into<String>) -> Self {
    Self::new(Method::Get, path, None)
  }

  pub fn post(
    path: impl Into<String>,
    body: Value
  ) -> Self {
    Self::new(Method::Post, path, Some(body))
  }

  pub fn patch(
    path: impl Into<String>,
    body: Value
  ) -> Self {
    Self::new(Method::Patch, path, Some(body))
  }

  pub fn delete(
    path: impl Into<String>
  ) -> Self {
    Self::new(Method::Delete, path, None)
  }

  pub fn with_query(
    mut self,
    query: Vec<(&'static str, String)>
  ) -> Self {
    self.query = query;
    self
  }

  fn new(
    method: Method,
    path: impl Into<String>,
    body: Option<Value>
  ) -> Self {
    Self {
      method,
      path: path.into(),
      query: Vec::new(),
      body
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
  pub status: u16,
  pub body:   String
}

impl ApiResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Sends requests to the backend. Failures that never produced a response
/// must surface as [`ApiError::Network`]; any response, including 4xx and
/// 5xx, is returned as `Ok`.
///
/// Implementations run on a single-threaded executor (the browser event
/// loop or a current-thread runtime), so the futures are not `Send`.
#[allow(async_fn_in_trait)]
pub trait Transport {
  async fn send(
    &self,
    request: ApiRequest
  ) -> Result<ApiResponse, ApiError>;
}

impl<T: Transport + ?Sized> Transport for Rc<T> {
  async fn send(
    &self,
    request: ApiRequest
  ) -> Result<ApiResponse, ApiError> {
    (**self).send(request).await
  }
}
