use serde_json::Value;

/// Coarse classification of a failed call, used by views to decide between
/// a retry affordance, a redirect to login and a plain message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  Auth,
  NotFound,
  Rejected,
  Server,
  Network,
  Decode
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
  #[error("{}", describe(.message, .status))]
  Auth {
    status:  u16,
    message: Option<String>
  },
  #[error("{}", describe(.message, &404))]
  NotFound { message: Option<String> },
  #[error("{}", describe(.message, .status))]
  Rejected {
    status:  u16,
    message: Option<String>
  },
  #[error("{}", describe(.message, .status))]
  Server {
    status:  u16,
    message: Option<String>
  },
  #[error("network error: {0}")]
  Network(String),
  #[error("unexpected response: {0}")]
  Decode(String)
}

fn describe(
  message: &Option<String>,
  status: &u16
) -> String {
  match message {
    | Some(message) => message.clone(),
    | None => {
      format!(
        "Request failed with status {status}"
      )
    }
  }
}

impl ApiError {
  /// Maps a non-2xx response onto the taxonomy, extracting the most
  /// specific message the body carries.
  pub fn from_response(
    status: u16,
    body: &str
  ) -> Self {
    let message = message_from_body(body);
    match status {
      | 401 | 403 => {
        Self::Auth { status, message }
      }
      | 404 => Self::NotFound { message },
      | 400..=499 => {
        Self::Rejected { status, message }
      }
      | _ => Self::Server { status, message }
    }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      | Self::Auth { .. } => ErrorKind::Auth,
      | Self::NotFound { .. } => {
        ErrorKind::NotFound
      }
      | Self::Rejected { .. } => {
        ErrorKind::Rejected
      }
      | Self::Server { .. } => ErrorKind::Server,
      | Self::Network(_) => ErrorKind::Network,
      | Self::Decode(_) => ErrorKind::Decode
    }
  }

  pub fn status(&self) -> Option<u16> {
    match self {
      | Self::Auth { status, .. }
      | Self::Rejected { status, .. }
      | Self::Server { status, .. } => {
        Some(*status)
      }
      | Self::NotFound { .. } => Some(404),
      | Self::Network(_) | Self::Decode(_) => {
        None
      }
    }
  }

  pub fn is_retryable(&self) -> bool {
    matches!(
      self.kind(),
      ErrorKind::Server | ErrorKind::Network
    )
  }

  /// The message the server supplied, if any.
  pub fn server_message(&self) -> Option<&str> {
    match self {
      | Self::Auth { message, .. }
      | Self::NotFound { message }
      | Self::Rejected { message, .. }
      | Self::Server { message, .. } => {
        message.as_deref()
      }
      | Self::Network(_) | Self::Decode(_) => {
        None
      }
    }
  }

  /// Text suitable for a toast or a form banner. Server-supplied messages
  /// win; otherwise `fallback` is used for HTTP failures.
  pub fn user_message(
    &self,
    fallback: &str
  ) -> String {
    match self {
      | Self::Network(_) => {
        "Cannot reach the server. Check your \
         connection and try again."
          .to_string()
      }
      | Self::Decode(_) => {
        "The server sent an unexpected \
         response."
          .to_string()
      }
      | _ => {
        self
          .server_message()
          .unwrap_or(fallback)
          .to_string()
      }
    }
  }
}

fn message_from_body(
  body: &str
) -> Option<String> {
  let trimmed = body.trim();
  if trimmed.is_empty() {
    return None;
  }

  match serde_json::from_str::<Value>(trimmed) {
    | Ok(value) => normalize_error_message(&value),
    // HTML error pages from proxies carry nothing readable.
    | Err(_) if trimmed.starts_with('<') => None,
    | Err(_) => Some(trimmed.to_string())
  }
}

/// Picks the most specific human-readable message from an error body, in
/// this order: `detail`, the first `non_field_errors` entry, the first
/// field-specific message as `"field: message"`, a bare string body.
/// Returns `None` when nothing readable is present.
pub fn normalize_error_message(
  body: &Value
) -> Option<String> {
  match body {
    | Value::String(text) => non_empty(text),
    | Value::Array(items) => {
      items.iter().find_map(first_text)
    }
    | Value::Object(map) => {
      if let Some(detail) =
        map.get("detail").and_then(first_text)
      {
        return Some(detail);
      }

      if let Some(message) = map
        .get("non_field_errors")
        .and_then(first_text)
      {
        return Some(message);
      }

      map.iter().find_map(|(field, value)| {
        first_text(value)
          .map(|message| format!("{field}: {message}"))
      })
    }
    | _ => None
  }
}

fn first_text(value: &Value) -> Option<String> {
  match value {
    | Value::String(text) => non_empty(text),
    | Value::Array(items) => {
      items.iter().find_map(first_text)
    }
    | _ => None
  }
}

fn non_empty(text: &str) -> Option<String> {
  let trimmed = text.trim();
  if trimmed.is_empty() {
    None
  } else {
    Some(trimmed.to_string())
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn detail_wins_over_everything() {
    let body = json!({
      "email": ["Invalid"],
      "non_field_errors": ["bad creds"],
      "detail": "Authentication credentials were not provided."
    });
    assert_eq!(
      normalize_error_message(&body).as_deref(),
      Some("Authentication credentials were not provided.")
    );
  }

  #[test]
  fn non_field_errors_beat_field_messages() {
    let body = json!({
      "email": ["Invalid"],
      "non_field_errors": ["bad creds"]
    });
    assert_eq!(
      normalize_error_message(&body).as_deref(),
      Some("bad creds")
    );
  }

  #[test]
  fn first_field_in_document_order_is_prefixed() {
    let body = json!({
      "username": ["Too short"],
      "email": ["Invalid"]
    });
    assert_eq!(
      normalize_error_message(&body).as_deref(),
      Some("username: Too short")
    );
  }

  #[test]
  fn status_mapping_and_fallback() {
    let err = ApiError::from_response(
      400,
      r#"{"email":["Invalid"]}"#
    );
    assert_eq!(err.kind(), ErrorKind::Rejected);
    assert_eq!(err.to_string(), "email: Invalid");

    let err = ApiError::from_response(403, "");
    assert_eq!(err.kind(), ErrorKind::Auth);
    assert_eq!(
      err.to_string(),
      "Request failed with status 403"
    );
    assert_eq!(err.user_message("Login failed"), "Login failed");

    let err = ApiError::from_response(
      502,
      "<html><body>Bad Gateway</body></html>"
    );
    assert_eq!(err.kind(), ErrorKind::Server);
    assert!(err.is_retryable());
    assert_eq!(
      err.to_string(),
      "Request failed with status 502"
    );

    let err = ApiError::from_response(404, "gone");
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.to_string(), "gone");
    assert!(!err.is_retryable());
  }

  #[test]
  fn network_errors_have_no_status() {
    let err = ApiError::Network(
      "connection refused".to_string()
    );
    assert_eq!(err.status(), None);
    assert!(err.is_retryable());
    assert!(
      err
        .user_message("Login failed")
        .starts_with("Cannot reach the server")
    );
  }
}
