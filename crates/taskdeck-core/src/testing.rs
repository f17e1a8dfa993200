//! Scripted transport for unit tests.

use std::cell::{
  Cell,
  RefCell
};
use std::collections::VecDeque;

use serde_json::{
  Value,
  json
};

use crate::api::{
  ApiError,
  ApiRequest,
  ApiResponse,
  Transport
};

/// Replays queued responses in order and records every request. With
/// `yield_first` set, each call yields to the executor once before
/// answering, so a second caller can observe the first one in flight.
#[derive(Debug, Default)]
pub struct FakeTransport {
  responses:   RefCell<VecDeque<Result<ApiResponse, ApiError>>>,
  requests:    RefCell<Vec<ApiRequest>>,
  yield_first: Cell<bool>
}

impl FakeTransport {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn yielding() -> Self {
    let fake = Self::default();
    fake.yield_first.set(true);
    fake
  }

  pub fn reply(&self, status: u16, body: Value) {
    self.reply_text(status, &body.to_string());
  }

  pub fn reply_text(&self, status: u16, body: &str) {
    self.responses.borrow_mut().push_back(Ok(
      ApiResponse {
        status,
        body: body.to_string()
      }
    ));
  }

  pub fn fail_network(&self, message: &str) {
    self
      .responses
      .borrow_mut()
      .push_back(Err(ApiError::Network(message.to_string())));
  }

  pub fn requests(&self) -> Vec<ApiRequest> {
    self.requests.borrow().clone()
  }

  pub fn request_count(&self) -> usize {
    self.requests.borrow().len()
  }

  pub fn last_request(&self) -> Option<ApiRequest> {
    self.requests.borrow().last().cloned()
  }
}

impl Transport for FakeTransport {
  async fn send(
    &self,
    request: ApiRequest
  ) -> Result<ApiResponse, ApiError> {
    self.requests.borrow_mut().push(request);
    if self.yield_first.get() {
      tokio::task::yield_now().await;
    }
    self
      .responses
      .borrow_mut()
      .pop_front()
      .unwrap_or_else(|| {
        Err(ApiError::Network(
          "no scripted response".to_string()
        ))
      })
  }
}

pub fn task_json(id: i64, status: &str, progress: u8) -> Value {
  json!({
    "id": id,
    "name": format!("Task {id}"),
    "project": 1,
    "priority": "medium",
    "status": status,
    "progress": progress
  })
}

pub fn category_json(id: i64, name: &str) -> Value {
  json!({
    "id": id,
    "name": name,
    "color": "#3B82F6",
    "is_active": true
  })
}
