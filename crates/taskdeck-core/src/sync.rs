//! Keeping views consistent with the backend.
//!
//! Lists are never patched locally: every successful write is followed by a
//! full re-fetch so server-computed fields (counts, progress) stay the only
//! source of truth. Writes are serialized per entity and action through
//! [`InFlight`], and responses that arrive after a view went away are
//! dropped through [`ViewLifetime`].

use std::cell::{
  Cell,
  RefCell
};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::rc::Rc;

use taskdeck_shared::{
  Page,
  Task,
  TaskFilters,
  TaskId,
  TaskPatch
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
  Resource,
  Tasks,
  Transport
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
)]
pub enum ListPhase {
  #[default]
  Idle,
  Loading,
  Ready,
  Failed
}

/// What a list view renders. A failed fetch keeps the previous items next
/// to the error so the view can offer a retry without going blank.
#[derive(Debug, Clone, PartialEq)]
pub struct ListState<T> {
  pub items: Vec<T>,
  pub phase: ListPhase,
  pub error: Option<ApiError>,
  pub total: Option<u64>
}

impl<T> Default for ListState<T> {
  fn default() -> Self {
    Self {
      items: Vec::new(),
      phase: ListPhase::Idle,
      error: None,
      total: None
    }
  }
}

impl<T> ListState<T> {
  pub fn begin(self) -> Self {
    Self {
      phase: ListPhase::Loading,
      error: None,
      ..self
    }
  }

  pub fn finish(
    self,
    result: Result<Page<T>, ApiError>
  ) -> Self {
    match result {
      | Ok(page) => Self {
        total: page.count,
        items: page.results,
        phase: ListPhase::Ready,
        error: None
      },
      | Err(err) => Self {
        phase: ListPhase::Failed,
        error: Some(err),
        ..self
      }
    }
  }

  pub fn is_loading(&self) -> bool {
    self.phase == ListPhase::Loading
  }

  pub fn is_failed(&self) -> bool {
    self.phase == ListPhase::Failed
  }
}

/// Mount token shared between a view and the calls it started.
#[derive(Debug, Clone)]
pub struct ViewLifetime {
  alive: Rc<Cell<bool>>
}

impl Default for ViewLifetime {
  fn default() -> Self {
    Self::new()
  }
}

impl ViewLifetime {
  pub fn new() -> Self {
    Self {
      alive: Rc::new(Cell::new(true))
    }
  }

  pub fn is_alive(&self) -> bool {
    self.alive.get()
  }

  pub fn end(&self) {
    self.alive.set(false);
  }
}

/// Set of keys with a call outstanding.
#[derive(Debug)]
pub struct InFlight<K> {
  active: Rc<RefCell<HashSet<K>>>
}

impl<K> Clone for InFlight<K> {
  fn clone(&self) -> Self {
    Self {
      active: Rc::clone(&self.active)
    }
  }
}

impl<K> Default for InFlight<K> {
  fn default() -> Self {
    Self {
      active: Rc::new(RefCell::new(HashSet::new()))
    }
  }
}

impl<K: Eq + Hash + Clone> InFlight<K> {
  pub fn new() -> Self {
    Self::default()
  }

  /// `None` when `key` is already taken. The key is released when the
  /// ticket drops, including on early return and panic unwinding.
  pub fn try_begin(
    &self,
    key: K
  ) -> Option<InFlightTicket<K>> {
    if !self.active.borrow_mut().insert(key.clone()) {
      return None;
    }
    Some(InFlightTicket {
      active: Rc::clone(&self.active),
      key
    })
  }

  pub fn is_busy(&self, key: &K) -> bool {
    self.active.borrow().contains(key)
  }

  pub fn len(&self) -> usize {
    self.active.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.active.borrow().is_empty()
  }
}

#[derive(Debug)]
pub struct InFlightTicket<K: Eq + Hash> {
  active: Rc<RefCell<HashSet<K>>>,
  key:    K
}

impl<K: Eq + Hash> Drop for InFlightTicket<K> {
  fn drop(&mut self) {
    self.active.borrow_mut().remove(&self.key);
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
pub enum Action {
  Create,
  Update,
  Delete,
  Toggle
}

impl fmt::Display for Action {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(match self {
      | Self::Create => "create",
      | Self::Update => "update",
      | Self::Delete => "delete",
      | Self::Toggle => "toggle"
    })
  }
}

/// Mutual-exclusion key: the entity (`None` for one not created yet) and
/// the action on it.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
pub struct MutationKey {
  pub id:     Option<i64>,
  pub action: Action
}

impl fmt::Display for MutationKey {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self.id {
      | Some(id) => {
        write!(f, "{} of #{id}", self.action)
      }
      | None => write!(f, "{}", self.action)
    }
  }
}

impl MutationKey {
  pub fn new(
    id: Option<i64>,
    action: Action
  ) -> Self {
    Self { id, action }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
  #[error("{key} already in progress")]
  Busy { key: MutationKey },
  #[error(transparent)]
  Api(#[from] ApiError)
}

impl MutationError {
  pub fn user_message(
    &self,
    fallback: &str
  ) -> String {
    match self {
      | Self::Busy { .. } => self.to_string(),
      | Self::Api(err) => err.user_message(fallback)
    }
  }
}

/// A delete the user has not confirmed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
  id:    i64,
  label: String
}

impl DeleteRequest {
  pub fn new(
    id: i64,
    label: impl Into<String>
  ) -> Self {
    Self {
      id,
      label: label.into()
    }
  }

  pub fn id(&self) -> i64 {
    self.id
  }

  pub fn prompt(&self) -> String {
    format!(
      "Delete \"{}\"? This cannot be undone.",
      self.label
    )
  }

  pub fn confirm(self) -> ConfirmedDelete {
    ConfirmedDelete { id: self.id }
  }
}

/// Proof that the user confirmed a delete; only [`DeleteRequest::confirm`]
/// makes one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedDelete {
  id: i64
}

impl ConfirmedDelete {
  pub fn id(&self) -> i64 {
    self.id
  }
}

/// One collection view: fetch, write through the gateway, re-fetch.
pub struct EntityList<R: Resource, T> {
  gateway:   Gateway<T>,
  query:     RefCell<Vec<(&'static str, String)>>,
  state:     RefCell<ListState<R::Item>>,
  in_flight: InFlight<MutationKey>,
  lifetime:  ViewLifetime,
  fetch_seq: Cell<u64>
}

impl<R: Resource, T: Transport> EntityList<R, T> {
  pub fn new(gateway: Gateway<T>) -> Self {
    Self {
      gateway,
      query: RefCell::new(Vec::new()),
      state: RefCell::new(ListState::default()),
      in_flight: InFlight::new(),
      lifetime: ViewLifetime::new(),
      fetch_seq: Cell::new(0)
    }
  }

  pub fn with_query(
    self,
    query: Vec<(&'static str, String)>
  ) -> Self {
    self.query.replace(query);
    self
  }

  /// Replaces the list filters; takes effect on the next refresh.
  pub fn set_query(
    &self,
    query: Vec<(&'static str, String)>
  ) {
    self.query.replace(query);
  }

  pub fn gateway(&self) -> &Gateway<T> {
    &self.gateway
  }

  pub fn snapshot(&self) -> ListState<R::Item> {
    self.state.borrow().clone()
  }

  pub fn items(&self) -> Vec<R::Item> {
    self.state.borrow().items.clone()
  }

  pub fn find(&self, id: i64) -> Option<R::Item> {
    self
      .state
      .borrow()
      .items
      .iter()
      .find(|item| R::id(item) == id)
      .cloned()
  }

  pub fn lifetime(&self) -> ViewLifetime {
    self.lifetime.clone()
  }

  /// The view is gone: responses still in flight are dropped.
  pub fn unmount(&self) {
    debug!(resource = R::LABEL, "list unmounted");
    self.lifetime.end();
  }

  pub fn is_busy(&self, key: MutationKey) -> bool {
    self.in_flight.is_busy(&key)
  }

  /// Fetches the whole collection. On failure the previous items stay and
  /// the error is kept in the state; the error is also returned so the
  /// caller can report it.
  #[tracing::instrument(skip(self), fields(resource = R::LABEL))]
  pub async fn refresh(
    &self
  ) -> Result<(), ApiError> {
    if !self.lifetime.is_alive() {
      debug!("skipping refresh for unmounted view");
      return Ok(());
    }

    let seq = self.fetch_seq.get() + 1;
    self.fetch_seq.set(seq);
    self.update_state(ListState::begin);

    let query = self.query.borrow().clone();
    let result = self.gateway.list::<R>(query).await;

    if !self.lifetime.is_alive() {
      debug!("discarding response for unmounted view");
      return Ok(());
    }
    if self.fetch_seq.get() != seq {
      debug!(seq, "discarding superseded response");
      return Ok(());
    }

    let outcome = result
      .as_ref()
      .map(|_| ())
      .map_err(Clone::clone);
    match &result {
      | Ok(page) => {
        info!(count = page.results.len(), "list refreshed")
      }
      | Err(err) => {
        warn!(error = %err, "list refresh failed; keeping previous items")
      }
    }
    self.update_state(|state| state.finish(result));
    outcome
  }

  /// Re-runs the same fetch after a failure.
  pub async fn retry(
    &self
  ) -> Result<(), ApiError> {
    self.refresh().await
  }

  /// Runs `op` under the per-entity, per-action guard and re-fetches the
  /// list when it succeeds. A second call with the same key while the
  /// first is outstanding fails with [`MutationError::Busy`] and never
  /// polls its future. A 404 means the row vanished on the server, so the
  /// list is re-fetched before the error is returned.
  pub async fn mutate<F, O>(
    &self,
    key: MutationKey,
    op: F
  ) -> Result<O, MutationError>
  where
    F: Future<Output = Result<O, ApiError>>
  {
    let Some(_ticket) = self.in_flight.try_begin(key)
    else {
      debug!(resource = R::LABEL, ?key, "mutation rejected; already in flight");
      return Err(MutationError::Busy { key });
    };

    let output = match op.await {
      | Ok(output) => output,
      | Err(err) if err.kind() == ErrorKind::NotFound => {
        info!(resource = R::LABEL, ?key, "entity vanished; re-fetching list");
        if let Err(refresh_err) = self.refresh().await {
          warn!(resource = R::LABEL, error = %refresh_err, "re-fetch after 404 failed");
        }
        return Err(err.into());
      }
      | Err(err) => return Err(err.into())
    };

    if let Err(err) = self.refresh().await {
      warn!(resource = R::LABEL, error = %err, "re-fetch after mutation failed");
    }
    Ok(output)
  }

  pub async fn create(
    &self,
    payload: &R::Create
  ) -> Result<R::Item, MutationError> {
    self
      .mutate(
        MutationKey::new(None, Action::Create),
        self.gateway.create::<R>(payload)
      )
      .await
  }

  pub async fn update(
    &self,
    id: i64,
    patch: &R::Patch
  ) -> Result<R::Item, MutationError> {
    self
      .mutate(
        MutationKey::new(Some(id), Action::Update),
        self.gateway.update::<R>(id, patch)
      )
      .await
  }

  pub async fn delete(
    &self,
    confirmed: ConfirmedDelete
  ) -> Result<(), MutationError> {
    let id = confirmed.id();
    self
      .mutate(
        MutationKey::new(Some(id), Action::Delete),
        self.gateway.delete::<R>(id)
      )
      .await
  }

  fn update_state<F>(&self, f: F)
  where
    F: FnOnce(
      ListState<R::Item>
    ) -> ListState<R::Item>
  {
    let current = self.state.take();
    self.state.replace(f(current));
  }
}

/// The task list plus the completion toggle.
pub struct TaskBoard<T> {
  tasks: EntityList<Tasks, T>
}

impl<T: Transport> TaskBoard<T> {
  pub fn new(
    gateway: Gateway<T>,
    filters: &TaskFilters
  ) -> Self {
    Self {
      tasks: EntityList::new(gateway)
        .with_query(filters.to_query())
    }
  }

  pub fn tasks(&self) -> &EntityList<Tasks, T> {
    &self.tasks
  }

  pub fn is_toggling(&self, id: TaskId) -> bool {
    self.tasks.is_busy(MutationKey::new(
      Some(id),
      Action::Toggle
    ))
  }

  /// Flips a task between done and not done with one combined PATCH,
  /// then re-fetches the list. A task missing from the current page is
  /// fetched first.
  #[tracing::instrument(skip(self))]
  pub async fn toggle_completion(
    &self,
    id: TaskId
  ) -> Result<Task, MutationError> {
    let key =
      MutationKey::new(Some(id), Action::Toggle);
    self
      .tasks
      .mutate(key, async {
        let task = match self.tasks.find(id) {
          | Some(task) => task,
          | None => {
            self.tasks.gateway().get_task(id).await?
          }
        };
        let patch = TaskPatch::completion_toggle(&task);
        let updated = self
          .tasks
          .gateway()
          .update_task(id, &patch)
          .await?;
        info!(status = %updated.status, progress = updated.progress, "completion toggled");
        Ok::<_, ApiError>(updated)
      })
      .await
  }
}

#[cfg(test)]
mod tests {
  use std::rc::Rc;

  use serde_json::json;
  use taskdeck_shared::{
    CategoryCreate,
    TaskStatus
  };

  use super::*;
  use crate::api::{
    Categories,
    Method
  };
  use crate::testing::{
    FakeTransport,
    category_json,
    task_json
  };

  fn categories(
    fake: &Rc<FakeTransport>
  ) -> EntityList<Categories, Rc<FakeTransport>> {
    EntityList::new(Gateway::new(fake.clone()))
  }

  #[test]
  fn tickets_release_on_drop() {
    let in_flight = InFlight::new();
    let key = MutationKey::new(Some(1), Action::Update);
    let ticket = in_flight.try_begin(key).expect("first");
    assert!(in_flight.try_begin(key).is_none());
    assert!(in_flight.is_busy(&key));
    assert!(
      in_flight
        .try_begin(MutationKey::new(Some(1), Action::Delete))
        .is_some()
    );
    drop(ticket);
    assert!(in_flight.is_empty());
  }

  #[tokio::test]
  async fn failed_fetch_keeps_previous_items() {
    let fake = Rc::new(FakeTransport::new());
    fake.reply(200, json!([category_json(1, "Work")]));
    fake.reply(500, json!({"detail": "boom"}));
    let list = categories(&fake);

    list.refresh().await.expect("first fetch");
    let err = list.refresh().await.expect_err("second fetch");
    assert_eq!(err.kind(), ErrorKind::Server);

    let state = list.snapshot();
    assert_eq!(state.phase, ListPhase::Failed);
    assert_eq!(state.items.len(), 1);
    assert_eq!(state.error.as_ref().map(ToString::to_string).as_deref(), Some("boom"));
  }

  #[tokio::test]
  async fn retry_reruns_the_same_query() {
    let fake = Rc::new(FakeTransport::new());
    fake.fail_network("offline");
    fake.reply(200, json!([category_json(1, "Work")]));
    let list = categories(&fake)
      .with_query(vec![("is_active", "true".to_string())]);

    assert!(list.refresh().await.is_err());
    list.retry().await.expect("retry");

    let requests = fake.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], requests[1]);
    assert_eq!(list.snapshot().phase, ListPhase::Ready);
  }

  #[tokio::test]
  async fn failed_create_leaves_items_and_skips_refresh() {
    let fake = Rc::new(FakeTransport::new());
    fake.reply(200, json!([category_json(1, "Work")]));
    fake.reply(400, json!({"name": ["category with this name already exists."]}));
    let list = categories(&fake);
    list.refresh().await.expect("fetch");

    let payload = CategoryCreate {
      name:        "Work".to_string(),
      description: None,
      color:       "#3B82F6".to_string()
    };
    let err = list.create(&payload).await.expect_err("rejected");
    assert_eq!(
      err.to_string(),
      "name: category with this name already exists."
    );
    assert_eq!(fake.request_count(), 2);
    assert_eq!(list.items().len(), 1);
  }

  #[tokio::test]
  async fn unmounted_view_discards_late_response() {
    let fake = Rc::new(FakeTransport::yielding());
    fake.reply(200, json!([category_json(1, "Work")]));
    let list = categories(&fake);

    let (result, ()) = tokio::join!(list.refresh(), async {
      list.unmount();
    });
    assert!(result.is_ok());
    assert_eq!(fake.request_count(), 1);
    let state = list.snapshot();
    assert!(state.items.is_empty());
    assert_eq!(state.phase, ListPhase::Loading);
  }

  #[test]
  fn lifetime_handles_observe_unmount() {
    let fake = Rc::new(FakeTransport::new());
    let list = categories(&fake);
    let side_load = list.lifetime();
    assert!(side_load.is_alive());

    list.unmount();
    assert!(!side_load.is_alive());
    assert!(!list.lifetime().is_alive());
  }

  #[tokio::test]
  async fn delete_requires_confirmation_and_refetches() {
    let fake = Rc::new(FakeTransport::new());
    fake.reply_text(204, "");
    fake.reply(200, json!([]));
    let list = categories(&fake);

    let request = DeleteRequest::new(3, "Errands");
    assert_eq!(
      request.prompt(),
      "Delete \"Errands\"? This cannot be undone."
    );
    list.delete(request.confirm()).await.expect("delete");

    let requests = fake.requests();
    assert_eq!(requests[0].method, Method::Delete);
    assert_eq!(requests[0].path, "/categories/3/");
    assert_eq!(requests[1].method, Method::Get);
  }

  #[tokio::test]
  async fn vanished_row_is_dropped_after_404() {
    let fake = Rc::new(FakeTransport::new());
    fake.reply(200, json!([category_json(3, "Errands"), category_json(4, "Home")]));
    fake.reply(404, json!({"detail": "Not found."}));
    fake.reply(200, json!([category_json(4, "Home")]));
    let list = categories(&fake);
    list.refresh().await.expect("fetch");

    let err = list
      .delete(DeleteRequest::new(3, "Errands").confirm())
      .await
      .expect_err("gone");
    assert!(matches!(&err, MutationError::Api(api) if api.kind() == ErrorKind::NotFound));
    assert_eq!(fake.request_count(), 3);
    assert!(list.find(3).is_none());
    assert_eq!(list.items().len(), 1);
    assert!(!list.is_busy(MutationKey::new(Some(3), Action::Delete)));
  }

  #[tokio::test]
  async fn toggle_fetches_task_missing_from_list() {
    let fake = Rc::new(FakeTransport::new());
    fake.reply(200, task_json(9, "review", 60));
    fake.reply(200, task_json(9, "completed", 100));
    fake.reply(200, json!([task_json(9, "completed", 100)]));
    let board = TaskBoard::new(
      Gateway::new(fake.clone()),
      &TaskFilters::default()
    );

    let task = board.toggle_completion(9).await.expect("toggle");
    assert_eq!(task.status, TaskStatus::Completed);

    let requests = fake.requests();
    assert_eq!(requests[0].path, "/tasks/9/");
    assert_eq!(requests[1].method, Method::Patch);
    assert_eq!(
      requests[1].body,
      Some(json!({"status": "completed", "progress": 100}))
    );
    assert!(!board.is_toggling(9));
  }
}
