use std::rc::Rc;
use std::time::Duration;

use gloo::timers::future::TimeoutFuture;
use taskdeck_core::api::{
  ApiError,
  ErrorKind,
  Gateway,
  HttpTransport
};
use taskdeck_core::config::Config;
use taskdeck_core::session::{
  SessionState,
  SessionStore
};
use taskdeck_core::sync::MutationError;
use taskdeck_core::toast::{
  NotificationQueue,
  Severity,
  Sleeper
};
use yew::Callback;

const BUNDLED_CONFIG: &str =
  include_str!("../assets/taskdeck.toml");

const SESSION_EXPIRED: &str =
  "Your session has expired. Please \
   sign in again.";

pub type Api = Gateway<HttpTransport>;

/// Toast expiry on browser timeouts.
pub struct TimeoutSleeper;

impl Sleeper for TimeoutSleeper {
  fn sleep(
    duration: Duration
  ) -> impl Future<Output = ()> + 'static {
    let millis =
      u32::try_from(duration.as_millis())
        .unwrap_or(u32::MAX);
    TimeoutFuture::new(millis)
  }
}

pub fn load_config() -> Config {
  match Config::from_toml_str(BUNDLED_CONFIG)
  {
    | Ok(config) => config,
    | Err(err) => {
      tracing::error!(
        error = %format!("{err:#}"),
        "bundled config rejected; using defaults"
      );
      Config::default()
    }
  }
}

/// Everything a page needs to talk to the backend and report back.
/// Pages receive it as a prop.
#[derive(Clone)]
pub struct Services {
  pub gateway:     Api,
  pub session:     Rc<SessionStore<HttpTransport>>,
  pub toasts:      Rc<NotificationQueue<TimeoutSleeper>>,
  pub page_size:   usize,
  session_changed: Callback<SessionState>
}

impl PartialEq for Services {
  fn eq(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.session, &other.session)
      && Rc::ptr_eq(&self.toasts, &other.toasts)
  }
}

impl Services {
  pub fn build(
    config: &Config,
    session_changed: Callback<SessionState>
  ) -> Result<Self, String> {
    let transport = HttpTransport::new(config)
      .map_err(|err| format!("{err:#}"))?;
    let gateway = Gateway::new(transport);
    Ok(Self {
      session: Rc::new(SessionStore::new(
        gateway.clone()
      )),
      gateway,
      toasts: Rc::new(NotificationQueue::new(
        config.toast_ttl()
      )),
      page_size: config.table_page_size,
      session_changed
    })
  }

  /// Pushes the session store's current state to the root component.
  pub fn publish_session(&self) {
    self
      .session_changed
      .emit(self.session.snapshot());
  }

  pub fn notify(
    &self,
    severity: Severity,
    message: impl Into<String>
  ) {
    let (_, expiry) =
      self.toasts.add(severity, message, None);
    if let Some(expiry) = expiry {
      wasm_bindgen_futures::spawn_local(expiry);
    }
  }

  pub fn success(
    &self,
    message: impl Into<String>
  ) {
    self.notify(Severity::Success, message);
  }

  /// Surfaces a failed call. An auth failure drops the local session
  /// so the router sends the user back to the login screen.
  pub fn report(
    &self,
    err: &ApiError,
    fallback: &str
  ) {
    tracing::warn!(error = %err, kind = ?err.kind(), "request failed");
    if err.kind() == ErrorKind::Auth {
      self.session.invalidate();
      self.publish_session();
      self.notify(
        Severity::Warning,
        SESSION_EXPIRED
      );
      return;
    }
    self.notify(
      Severity::Error,
      err.user_message(fallback)
    );
  }

  /// Like [`Services::report`], returning the message for inline display.
  pub fn report_mutation(
    &self,
    err: &MutationError,
    fallback: &str
  ) -> String {
    match err {
      | MutationError::Api(api) => {
        self.report(api, fallback);
        api.user_message(fallback)
      }
      | MutationError::Busy { .. } => {
        tracing::debug!(error = %err, "ignored duplicate action");
        err.user_message(fallback)
      }
    }
  }
}
