//! Transient notifications.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_TTL: Duration =
  Duration::from_millis(5000);

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
pub struct ToastId(Uuid);

impl ToastId {
  pub fn new() -> Self {
    Self(Uuid::new_v4())
  }
}

impl Default for ToastId {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for ToastId {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    self.0.fmt(f)
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
pub enum Severity {
  Success,
  Error,
  Info,
  Warning
}

impl Severity {
  pub fn as_str(self) -> &'static str {
    match self {
      | Self::Success => "success",
      | Self::Error => "error",
      | Self::Info => "info",
      | Self::Warning => "warning"
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
  pub id:       ToastId,
  pub severity: Severity,
  pub message:  String,
  /// `None` stays until dismissed.
  pub ttl:      Option<Duration>
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationAction {
  Add(Notification),
  Remove(ToastId),
  Clear
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationState {
  pub items: Vec<Notification>
}

impl NotificationState {
  pub fn reduce(
    mut self,
    action: NotificationAction
  ) -> Self {
    match action {
      | NotificationAction::Add(notification) => {
        self.items.push(notification);
      }
      | NotificationAction::Remove(id) => {
        self.items.retain(|item| item.id != id);
      }
      | NotificationAction::Clear => {
        self.items.clear();
      }
    }
    self
  }
}

/// Timer source for expiry: tokio on native, browser timeouts in the UI.
pub trait Sleeper {
  fn sleep(
    duration: Duration
  ) -> impl Future<Output = ()> + 'static;
}

/// Resolves once the toast it belongs to has been removed by its timer.
pub type Expiry = Pin<Box<dyn Future<Output = ()>>>;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[cfg(feature = "cli")]
impl Sleeper for TokioSleeper {
  fn sleep(
    duration: Duration
  ) -> impl Future<Output = ()> + 'static {
    tokio::time::sleep(duration)
  }
}

type Listener = Rc<dyn Fn(&NotificationState)>;

#[derive(Default)]
struct Shared {
  state:    RefCell<NotificationState>,
  listener: RefCell<Option<Listener>>
}

impl Shared {
  fn dispatch(&self, action: NotificationAction) {
    let next = self.state.take().reduce(action);
    self.state.replace(next.clone());
    // Released before the call so the listener may notify again.
    let listener = self.listener.borrow().clone();
    if let Some(listener) = listener {
      listener(&next);
    }
  }
}

/// Ordered toast list with timed expiry. The caller owns scheduling: every
/// `add` hands back a future that removes the toast once its ttl elapses.
pub struct NotificationQueue<Z> {
  default_ttl: Duration,
  shared:      Rc<Shared>,
  sleeper:     PhantomData<fn() -> Z>
}

impl<Z: Sleeper> NotificationQueue<Z> {
  pub fn new(default_ttl: Duration) -> Self {
    Self {
      default_ttl,
      shared: Rc::new(Shared::default()),
      sleeper: PhantomData
    }
  }

  pub fn default_ttl(&self) -> Duration {
    self.default_ttl
  }

  /// Called with the new state after every change.
  pub fn set_listener<F>(&self, listener: F)
  where
    F: Fn(&NotificationState) + 'static
  {
    self
      .shared
      .listener
      .replace(Some(Rc::new(listener)));
  }

  pub fn snapshot(&self) -> NotificationState {
    self.shared.state.borrow().clone()
  }

  /// `ttl` of `None` uses the default; a zero ttl never expires.
  pub fn add(
    &self,
    severity: Severity,
    message: impl Into<String>,
    ttl: Option<Duration>
  ) -> (ToastId, Option<Expiry>) {
    let ttl = ttl.unwrap_or(self.default_ttl);
    let ttl = (!ttl.is_zero()).then_some(ttl);
    let id = ToastId::new();
    let message = message.into();
    debug!(%id, severity = severity.as_str(), ?ttl, "notify");

    self.shared.dispatch(NotificationAction::Add(
      Notification {
        id,
        severity,
        message,
        ttl
      }
    ));

    let expiry = ttl.map(|ttl| {
      let sleep = Z::sleep(ttl);
      let shared = Rc::clone(&self.shared);
      Box::pin(async move {
        sleep.await;
        shared.dispatch(
          NotificationAction::Remove(id)
        );
      }) as Expiry
    });
    (id, expiry)
  }

  pub fn success(
    &self,
    message: impl Into<String>
  ) -> (ToastId, Option<Expiry>) {
    self.add(Severity::Success, message, None)
  }

  pub fn error(
    &self,
    message: impl Into<String>
  ) -> (ToastId, Option<Expiry>) {
    self.add(Severity::Error, message, None)
  }

  pub fn info(
    &self,
    message: impl Into<String>
  ) -> (ToastId, Option<Expiry>) {
    self.add(Severity::Info, message, None)
  }

  pub fn warning(
    &self,
    message: impl Into<String>
  ) -> (ToastId, Option<Expiry>) {
    self.add(Severity::Warning, message, None)
  }

  pub fn remove(&self, id: ToastId) {
    self
      .shared
      .dispatch(NotificationAction::Remove(id));
  }

  pub fn clear(&self) {
    self.shared.dispatch(NotificationAction::Clear);
  }
}

#[cfg(test)]
mod tests {
  use std::cell::Cell;

  use super::*;

  struct TestSleeper;

  impl Sleeper for TestSleeper {
    fn sleep(
      duration: Duration
    ) -> impl Future<Output = ()> + 'static {
      tokio::time::sleep(duration)
    }
  }

  fn notification(message: &str) -> Notification {
    Notification {
      id:       ToastId::new(),
      severity: Severity::Info,
      message:  message.to_string(),
      ttl:      None
    }
  }

  #[test]
  fn reducer_keeps_order_and_ignores_unknown_ids() {
    let first = notification("first");
    let second = notification("second");
    let state = NotificationState::default()
      .reduce(NotificationAction::Add(first.clone()))
      .reduce(NotificationAction::Add(second.clone()));
    assert_eq!(state.items, vec![first.clone(), second.clone()]);

    let same = state
      .clone()
      .reduce(NotificationAction::Remove(ToastId::new()));
    assert_eq!(same, state);

    let state = state.reduce(NotificationAction::Remove(first.id));
    assert_eq!(state.items, vec![second]);
    assert!(state.reduce(NotificationAction::Clear).items.is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn toast_expires_after_ttl() {
    let queue = NotificationQueue::<TestSleeper>::new(DEFAULT_TTL);
    let (id, expiry) = queue.success("Task created");
    assert_eq!(queue.snapshot().items[0].id, id);

    expiry.expect("expiry").await;
    assert!(queue.snapshot().items.is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn zero_ttl_never_expires_and_manual_remove_is_idempotent() {
    let queue = NotificationQueue::<TestSleeper>::new(DEFAULT_TTL);
    let (sticky, expiry) =
      queue.add(Severity::Error, "Server unavailable", Some(Duration::ZERO));
    assert!(expiry.is_none());

    let (short, expiry) = queue.info("Saved");
    queue.remove(short);
    expiry.expect("expiry").await;

    let items = queue.snapshot().items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, sticky);
  }

  #[tokio::test(start_paused = true)]
  async fn listener_sees_every_change() {
    let queue = NotificationQueue::<TestSleeper>::new(DEFAULT_TTL);
    let seen = Rc::new(Cell::new(0usize));
    let counter = Rc::clone(&seen);
    queue.set_listener(move |state| counter.set(state.items.len()));

    let _ = queue.warning("Careful");
    let _ = queue.error("Broken");
    assert_eq!(seen.get(), 2);
    queue.clear();
    assert_eq!(seen.get(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn listener_may_notify_and_replace_itself() {
    let queue = Rc::new(NotificationQueue::<TestSleeper>::new(DEFAULT_TTL));
    let calls = Rc::new(Cell::new(0usize));
    let weak = Rc::downgrade(&queue);
    let counter = Rc::clone(&calls);
    queue.set_listener(move |state| {
      counter.set(counter.get() + 1);
      let Some(queue) = weak.upgrade() else {
        return;
      };
      if state.items.iter().any(|item| item.severity == Severity::Error) {
        queue.clear();
        queue.set_listener(|_| {});
      }
    });

    let _ = queue.error("Broken");
    assert_eq!(calls.get(), 2);
    assert!(queue.snapshot().items.is_empty());

    let _ = queue.info("Saved");
    assert_eq!(calls.get(), 2);
    assert_eq!(queue.snapshot().items.len(), 1);
  }
}
