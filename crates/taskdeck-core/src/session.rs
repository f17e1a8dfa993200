//! Who is signed in.
//!
//! [`SessionState::reduce`] is the whole state machine; [`SessionStore`]
//! drives it from gateway calls and is the single owner views read from.

use std::cell::{
  Cell,
  RefCell
};

use taskdeck_shared::{
  LoginRequest,
  RegisterRequest,
  User
};
use tracing::{
  debug,
  info,
  warn
};

use crate::api::{
  ApiError,
  ErrorKind,
  Gateway,
  Transport
};

pub const NOT_AUTHENTICATED: &str =
  "Not authenticated";

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
  pub user:          Option<User>,
  pub authenticated: bool,
  pub loading:       bool,
  pub last_error:    Option<String>
}

impl Default for SessionState {
  fn default() -> Self {
    Self::initial()
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
  Start,
  Success(User),
  Failure(String),
  Logout,
  ClearError
}

impl SessionState {
  /// Anonymous and loading: nothing is known until the first probe
  /// answers.
  pub fn initial() -> Self {
    Self {
      user:          None,
      authenticated: false,
      loading:       true,
      last_error:    None
    }
  }

  pub fn reduce(
    self,
    action: SessionAction
  ) -> Self {
    match action {
      | SessionAction::Start => Self {
        loading: true,
        last_error: None,
        ..self
      },
      | SessionAction::Success(user) => Self {
        user:          Some(user),
        authenticated: true,
        loading:       false,
        last_error:    None
      },
      | SessionAction::Failure(message) => {
        Self {
          user:          None,
          authenticated: false,
          loading:       false,
          last_error:    Some(message)
        }
      }
      | SessionAction::Logout => Self {
        user:          None,
        authenticated: false,
        loading:       false,
        last_error:    None
      },
      | SessionAction::ClearError => Self {
        last_error: None,
        ..self
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
  #[error("a sign-in attempt is already in progress")]
  Busy,
  #[error(transparent)]
  Api(#[from] ApiError)
}

pub struct SessionStore<T> {
  gateway:    Gateway<T>,
  state:      RefCell<SessionState>,
  attempting: Cell<bool>
}

impl<T: Transport> SessionStore<T> {
  pub fn new(gateway: Gateway<T>) -> Self {
    Self {
      gateway,
      state: RefCell::new(SessionState::initial()),
      attempting: Cell::new(false)
    }
  }

  pub fn snapshot(&self) -> SessionState {
    self.state.borrow().clone()
  }

  pub fn is_authenticated(&self) -> bool {
    self.state.borrow().authenticated
  }

  fn dispatch(&self, action: SessionAction) {
    let current = self.state.replace(
      SessionState::initial()
    );
    self
      .state
      .replace(current.reduce(action));
  }

  /// Asks the backend who owns the current session cookie. An expired
  /// access cookie gets one refresh attempt before giving up.
  #[tracing::instrument(skip(self))]
  pub async fn probe(&self) -> Option<User> {
    self.dispatch(SessionAction::Start);
    match self.restore().await {
      | Ok(user) => {
        info!(user_id = user.id, "session restored");
        self.dispatch(SessionAction::Success(
          user.clone()
        ));
        Some(user)
      }
      | Err(err) => {
        debug!(error = %err, "no active session");
        self.dispatch(SessionAction::Failure(
          NOT_AUTHENTICATED.to_string()
        ));
        None
      }
    }
  }

  async fn restore(&self) -> Result<User, ApiError> {
    match self.gateway.user_info().await {
      | Err(err)
        if err.kind() == ErrorKind::Auth =>
      {
        debug!(error = %err, "access expired; refreshing");
        self.gateway.refresh_session().await?;
        self.gateway.user_info().await
      }
      | other => other
    }
  }

  #[tracing::instrument(skip_all, fields(email = %request.email))]
  pub async fn login(
    &self,
    request: &LoginRequest
  ) -> Result<User, SessionError> {
    let _attempt = self.begin_attempt()?;
    self.dispatch(SessionAction::Start);
    match self.gateway.login(request).await {
      | Ok(user) => {
        info!(user_id = user.id, "signed in");
        self.dispatch(SessionAction::Success(
          user.clone()
        ));
        Ok(user)
      }
      | Err(err) => {
        self.dispatch(SessionAction::Failure(
          err.user_message("Login failed")
        ));
        Err(err.into())
      }
    }
  }

  #[tracing::instrument(skip_all, fields(email = %request.email, username = %request.username))]
  pub async fn register(
    &self,
    request: &RegisterRequest
  ) -> Result<User, SessionError> {
    let _attempt = self.begin_attempt()?;
    self.dispatch(SessionAction::Start);
    match self.gateway.register(request).await {
      | Ok(user) => {
        info!(user_id = user.id, "registered");
        self.dispatch(SessionAction::Success(
          user.clone()
        ));
        Ok(user)
      }
      | Err(err) => {
        self.dispatch(SessionAction::Failure(
          err.user_message("Registration failed")
        ));
        Err(err.into())
      }
    }
  }

  /// Ends the session. Local state is cleared whatever the backend says;
  /// a remote failure is returned for logging only.
  #[tracing::instrument(skip(self))]
  pub async fn logout(
    &self
  ) -> Result<(), ApiError> {
    let remote = self.gateway.logout().await;
    if let Err(err) = &remote {
      warn!(error = %err, "remote logout failed; clearing local session anyway");
    }
    self.dispatch(SessionAction::Logout);
    remote
  }

  /// Drops the local session after an unrecoverable auth failure (for
  /// example a 401 from any other call) without contacting the backend.
  pub fn invalidate(&self) {
    debug!("invalidating local session");
    self.dispatch(SessionAction::Logout);
  }

  pub fn clear_error(&self) {
    self.dispatch(SessionAction::ClearError);
  }

  fn begin_attempt(
    &self
  ) -> Result<AttemptGuard<'_>, SessionError> {
    if self.attempting.replace(true) {
      debug!("sign-in already in flight");
      return Err(SessionError::Busy);
    }
    Ok(AttemptGuard {
      flag: &self.attempting
    })
  }
}

struct AttemptGuard<'a> {
  flag: &'a Cell<bool>
}

impl Drop for AttemptGuard<'_> {
  fn drop(&mut self) {
    self.flag.set(false);
  }
}

#[cfg(test)]
mod tests {
  use std::rc::Rc;

  use serde_json::json;

  use super::*;
  use crate::testing::FakeTransport;

  fn user() -> User {
    User {
      id:         1,
      email:      "ann@example.com".to_string(),
      username:   "ann".to_string(),
      created_at: None,
      updated_at: None
    }
  }

  fn login_request() -> LoginRequest {
    LoginRequest {
      email:    "ann@example.com".to_string(),
      password: "correct horse".to_string()
    }
  }

  fn store(
    fake: &Rc<FakeTransport>
  ) -> SessionStore<Rc<FakeTransport>> {
    SessionStore::new(Gateway::new(fake.clone()))
  }

  #[test]
  fn reducer_transitions() {
    let state = SessionState::initial();
    assert!(state.loading);
    assert!(!state.authenticated);

    let state = state
      .reduce(SessionAction::Success(user()));
    assert!(state.authenticated);
    assert!(!state.loading);

    let state = state.reduce(SessionAction::Start);
    assert!(state.loading);
    assert!(state.authenticated);

    let state = state.reduce(SessionAction::Failure(
      "bad creds".to_string()
    ));
    assert!(!state.authenticated);
    assert_eq!(state.user, None);
    assert_eq!(state.last_error.as_deref(), Some("bad creds"));

    let state = state.reduce(SessionAction::ClearError);
    assert_eq!(state.last_error, None);

    let state = state
      .reduce(SessionAction::Success(user()))
      .reduce(SessionAction::Logout);
    assert_eq!(state.user, None);
    assert!(!state.authenticated);
    assert!(!state.loading);
  }

  #[tokio::test]
  async fn failed_probe_records_not_authenticated() {
    let fake = Rc::new(FakeTransport::new());
    fake.reply(403, json!({"detail": "Authentication credentials were not provided."}));
    let store = store(&fake);

    assert!(store.probe().await.is_none());
    let state = store.snapshot();
    assert!(!state.loading);
    assert_eq!(state.last_error.as_deref(), Some(NOT_AUTHENTICATED));
  }

  #[tokio::test]
  async fn expired_access_is_refreshed_once() {
    let fake = Rc::new(FakeTransport::new());
    fake.reply(401, json!({"detail": "Token is expired"}));
    fake.reply(200, json!({"message": "Access token token refreshed successfully"}));
    fake.reply(200, json!({"user": {"id": 1, "username": "ada", "email": "a@b.co"}}));
    let store = store(&fake);

    let user = store.probe().await.expect("restored");
    assert_eq!(user.username, "ada");
    assert!(store.is_authenticated());
    let paths: Vec<String> =
      fake.requests().into_iter().map(|request| request.path).collect();
    assert_eq!(paths, vec!["/auth/user-info/", "/auth/refresh/", "/auth/user-info/"]);
  }

  #[tokio::test]
  async fn login_failure_uses_server_message() {
    let fake = Rc::new(FakeTransport::new());
    fake.reply(400, json!({"non_field_errors": ["bad creds"]}));
    let store = store(&fake);

    let err = store
      .login(&login_request())
      .await
      .expect_err("rejected");
    assert!(matches!(err, SessionError::Api(_)));
    assert_eq!(store.snapshot().last_error.as_deref(), Some("bad creds"));
  }

  #[tokio::test]
  async fn login_failure_without_message_falls_back() {
    let fake = Rc::new(FakeTransport::new());
    fake.reply_text(401, "");
    let store = store(&fake);

    store.login(&login_request()).await.expect_err("rejected");
    assert_eq!(store.snapshot().last_error.as_deref(), Some("Login failed"));
  }

  #[tokio::test]
  async fn concurrent_login_is_busy() {
    let fake = Rc::new(FakeTransport::yielding());
    fake.reply(200, json!({"user": {"id": 1, "email": "ann@example.com", "username": "ann"}}));
    let store = store(&fake);
    let request = login_request();

    let (first, second) = tokio::join!(
      store.login(&request),
      store.login(&request)
    );
    assert!(first.is_ok());
    assert_eq!(second, Err(SessionError::Busy));
    assert_eq!(fake.request_count(), 1);
    assert!(store.is_authenticated());
  }

  #[tokio::test]
  async fn logout_clears_local_state_on_network_failure() {
    let fake = Rc::new(FakeTransport::new());
    fake.reply(200, json!({"id": 1, "email": "ann@example.com", "username": "ann"}));
    fake.fail_network("connection reset");
    let store = store(&fake);

    store.probe().await.expect("probe");
    assert!(store.is_authenticated());

    let remote = store.logout().await;
    assert!(remote.is_err());
    let state = store.snapshot();
    assert!(!state.authenticated);
    assert_eq!(state.user, None);
  }

  #[test]
  fn invalidate_drops_session_without_network() {
    let fake = Rc::new(FakeTransport::new());
    let store = store(&fake);
    store.dispatch(SessionAction::Success(user()));
    store.invalidate();
    assert!(!store.is_authenticated());
    assert_eq!(fake.request_count(), 0);
  }
}
