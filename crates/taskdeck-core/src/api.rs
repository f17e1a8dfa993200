//! Client side of the REST backend.
//!
//! Every call goes through a [`Transport`], so the gateway logic (paths,
//! payloads, decoding, error mapping) is the same in the browser, in the
//! CLI and in tests.

mod error;
mod gateway;
mod http;
mod transport;

pub use error::{
  ApiError,
  ErrorKind,
  normalize_error_message
};
pub use gateway::{
  Categories,
  Gateway,
  Projects,
  Resource,
  Tasks
};
pub use http::HttpTransport;
pub use transport::{
  ApiRequest,
  ApiResponse,
  Method,
  Transport
};
