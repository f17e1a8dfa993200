use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use taskdeck_shared::{
  AuthPayload,
  Category,
  CategoryCreate,
  CategoryId,
  CategoryPatch,
  DashboardSummary,
  LoginRequest,
  Page,
  Priority,
  Project,
  ProjectCreate,
  ProjectFilters,
  ProjectId,
  ProjectPatch,
  ProjectStatus,
  RegisterRequest,
  Task,
  TaskCreate,
  TaskFilters,
  TaskId,
  TaskPatch,
  TaskStatus,
  User
};
use tracing::{
  debug,
  info,
  warn
};

use super::{
  ApiError,
  ApiRequest,
  ApiResponse,
  Transport
};

/// A REST collection with the usual list/detail/create/patch/delete
/// endpoints under `/<COLLECTION>/`.
pub trait Resource {
  type Item: DeserializeOwned
    + Clone
    + fmt::Debug;
  type Create: Serialize;
  type Patch: Serialize;

  const COLLECTION: &'static str;
  const LABEL: &'static str;

  fn id(item: &Self::Item) -> i64;
}

#[derive(Debug, Clone, Copy)]
pub struct Categories;

impl Resource for Categories {
  type Create = CategoryCreate;
  type Item = Category;
  type Patch = CategoryPatch;

  const COLLECTION: &'static str = "categories";
  const LABEL: &'static str = "category";

  fn id(item: &Category) -> i64 {
    item.id
  }
}

#[derive(Debug, Clone, Copy)]
pub struct Projects;

impl Resource for Projects {
  type Create = ProjectCreate;
  type Item = Project;
  type Patch = ProjectPatch;

  const COLLECTION: &'static str = "projects";
  const LABEL: &'static str = "project";

  fn id(item: &Project) -> i64 {
    item.id
  }
}

#[derive(Debug, Clone, Copy)]
pub struct Tasks;

impl Resource for Tasks {
  type Create = TaskCreate;
  type Item = Task;
  type Patch = TaskPatch;

  const COLLECTION: &'static str = "tasks";
  const LABEL: &'static str = "task";

  fn id(item: &Task) -> i64 {
    item.id
  }
}

fn collection_path<R: Resource>() -> String {
  format!("/{}/", R::COLLECTION)
}

fn detail_path<R: Resource>(id: i64) -> String {
  format!("/{}/{id}/", R::COLLECTION)
}

/// Typed operations against the backend. Cheap to clone when the transport
/// is (`HttpTransport` shares its connection pool, tests use `Rc`).
#[derive(Debug, Clone)]
pub struct Gateway<T> {
  transport: T
}

impl<T: Transport> Gateway<T> {
  pub fn new(transport: T) -> Self {
    Self { transport }
  }

  pub fn transport(&self) -> &T {
    &self.transport
  }

  async fn call(
    &self,
    request: ApiRequest
  ) -> Result<ApiResponse, ApiError> {
    let method = request.method;
    let path = request.path.clone();

    let response = match self
      .transport
      .send(request)
      .await
    {
      | Ok(response) => response,
      | Err(err) => {
        warn!(%method, %path, error = %err, "request failed without a response");
        return Err(err);
      }
    };

    if response.is_success() {
      return Ok(response);
    }

    let err = ApiError::from_response(
      response.status,
      &response.body
    );
    warn!(
      %method,
      %path,
      status = response.status,
      kind = ?err.kind(),
      error = %err,
      "request rejected"
    );
    Err(err)
  }

  async fn call_json<R: DeserializeOwned>(
    &self,
    request: ApiRequest
  ) -> Result<R, ApiError> {
    let response = self.call(request).await?;
    decode(&response.body)
  }

  async fn call_empty(
    &self,
    request: ApiRequest
  ) -> Result<(), ApiError> {
    self.call(request).await.map(|_| ())
  }

  // Generic collection endpoints.

  #[tracing::instrument(skip_all, fields(resource = R::LABEL))]
  pub async fn list<R: Resource>(
    &self,
    query: Vec<(&'static str, String)>
  ) -> Result<Page<R::Item>, ApiError> {
    let page: Page<R::Item> = self
      .call_json(
        ApiRequest::get(collection_path::<R>())
          .with_query(query)
      )
      .await?;
    debug!(count = page.results.len(), total = ?page.count, "listed");
    Ok(page)
  }

  #[tracing::instrument(skip(self), fields(resource = R::LABEL))]
  pub async fn get<R: Resource>(
    &self,
    id: i64
  ) -> Result<R::Item, ApiError> {
    self
      .call_json(ApiRequest::get(
        detail_path::<R>(id)
      ))
      .await
  }

  #[tracing::instrument(skip_all, fields(resource = R::LABEL))]
  pub async fn create<R: Resource>(
    &self,
    payload: &R::Create
  ) -> Result<R::Item, ApiError> {
    let item: R::Item = self
      .call_json(ApiRequest::post(
        collection_path::<R>(),
        encode(payload)?
      ))
      .await?;
    info!(id = R::id(&item), "created");
    Ok(item)
  }

  #[tracing::instrument(skip(self, patch), fields(resource = R::LABEL))]
  pub async fn update<R: Resource>(
    &self,
    id: i64,
    patch: &R::Patch
  ) -> Result<R::Item, ApiError> {
    let item = self
      .call_json(ApiRequest::patch(
        detail_path::<R>(id),
        encode(patch)?
      ))
      .await?;
    info!("updated");
    Ok(item)
  }

  #[tracing::instrument(skip(self), fields(resource = R::LABEL))]
  pub async fn delete<R: Resource>(
    &self,
    id: i64
  ) -> Result<(), ApiError> {
    self
      .call_empty(ApiRequest::delete(
        detail_path::<R>(id)
      ))
      .await?;
    info!("deleted");
    Ok(())
  }

  // Authentication.

  #[tracing::instrument(skip_all, fields(email = %request.email, username = %request.username))]
  pub async fn register(
    &self,
    request: &RegisterRequest
  ) -> Result<User, ApiError> {
    let payload: AuthPayload = self
      .call_json(ApiRequest::post(
        "/auth/register/",
        encode(request)?
      ))
      .await?;
    Ok(payload.into_user())
  }

  #[tracing::instrument(skip_all, fields(email = %request.email))]
  pub async fn login(
    &self,
    request: &LoginRequest
  ) -> Result<User, ApiError> {
    let payload: AuthPayload = self
      .call_json(ApiRequest::post(
        "/auth/login/",
        encode(request)?
      ))
      .await?;
    Ok(payload.into_user())
  }

  #[tracing::instrument(skip(self))]
  pub async fn logout(
    &self
  ) -> Result<(), ApiError> {
    self
      .call_empty(ApiRequest::post(
        "/auth/logout/",
        Value::Object(Default::default())
      ))
      .await
  }

  /// Trades the refresh cookie for a fresh access cookie.
  #[tracing::instrument(skip(self))]
  pub async fn refresh_session(
    &self
  ) -> Result<(), ApiError> {
    self
      .call_empty(ApiRequest::post(
        "/auth/refresh/",
        Value::Object(Default::default())
      ))
      .await
  }

  #[tracing::instrument(skip(self))]
  pub async fn user_info(
    &self
  ) -> Result<User, ApiError> {
    let payload: AuthPayload = self
      .call_json(ApiRequest::get(
        "/auth/user-info/"
      ))
      .await?;
    Ok(payload.into_user())
  }

  // Categories.

  pub async fn list_categories(
    &self
  ) -> Result<Vec<Category>, ApiError> {
    self
      .list::<Categories>(Vec::new())
      .await
      .map(Page::into_results)
  }

  pub async fn list_active_categories(
    &self
  ) -> Result<Vec<Category>, ApiError> {
    self
      .list::<Categories>(vec![(
        "is_active",
        "true".to_string()
      )])
      .await
      .map(Page::into_results)
  }

  pub async fn get_category(
    &self,
    id: CategoryId
  ) -> Result<Category, ApiError> {
    self.get::<Categories>(id).await
  }

  pub async fn create_category(
    &self,
    payload: &CategoryCreate
  ) -> Result<Category, ApiError> {
    self.create::<Categories>(payload).await
  }

  pub async fn update_category(
    &self,
    id: CategoryId,
    patch: &CategoryPatch
  ) -> Result<Category, ApiError> {
    self.update::<Categories>(id, patch).await
  }

  pub async fn set_category_active(
    &self,
    id: CategoryId,
    active: bool
  ) -> Result<Category, ApiError> {
    let patch = CategoryPatch {
      is_active: Some(active),
      ..CategoryPatch::default()
    };
    self.update::<Categories>(id, &patch).await
  }

  pub async fn delete_category(
    &self,
    id: CategoryId
  ) -> Result<(), ApiError> {
    self.delete::<Categories>(id).await
  }

  #[tracing::instrument(skip(self))]
  pub async fn category_projects(
    &self,
    id: CategoryId
  ) -> Result<Vec<Project>, ApiError> {
    let page: Page<Project> = self
      .call_json(ApiRequest::get(format!(
        "/categories/{id}/projects/"
      )))
      .await?;
    Ok(page.into_results())
  }

  // Projects.

  pub async fn list_projects(
    &self,
    filters: &ProjectFilters
  ) -> Result<Page<Project>, ApiError> {
    self
      .list::<Projects>(filters.to_query())
      .await
  }

  pub async fn get_project(
    &self,
    id: ProjectId
  ) -> Result<Project, ApiError> {
    self.get::<Projects>(id).await
  }

  pub async fn create_project(
    &self,
    payload: &ProjectCreate
  ) -> Result<Project, ApiError> {
    self.create::<Projects>(payload).await
  }

  pub async fn update_project(
    &self,
    id: ProjectId,
    patch: &ProjectPatch
  ) -> Result<Project, ApiError> {
    self.update::<Projects>(id, patch).await
  }

  pub async fn update_project_status(
    &self,
    id: ProjectId,
    status: ProjectStatus
  ) -> Result<Project, ApiError> {
    let patch = ProjectPatch {
      status: Some(status),
      ..ProjectPatch::default()
    };
    self.update::<Projects>(id, &patch).await
  }

  pub async fn update_project_priority(
    &self,
    id: ProjectId,
    priority: Priority
  ) -> Result<Project, ApiError> {
    let patch = ProjectPatch {
      priority: Some(priority),
      ..ProjectPatch::default()
    };
    self.update::<Projects>(id, &patch).await
  }

  pub async fn delete_project(
    &self,
    id: ProjectId
  ) -> Result<(), ApiError> {
    self.delete::<Projects>(id).await
  }

  #[tracing::instrument(skip(self))]
  pub async fn project_dashboard(
    &self
  ) -> Result<DashboardSummary, ApiError> {
    self
      .call_json(ApiRequest::get(
        "/projects/dashboard/"
      ))
      .await
  }

  /// Tasks of one project. The project id comes from the path, so a
  /// `project` filter is ignored.
  #[tracing::instrument(skip(self, filters))]
  pub async fn project_tasks(
    &self,
    id: ProjectId,
    filters: &TaskFilters
  ) -> Result<Vec<Task>, ApiError> {
    let filters = TaskFilters {
      project: None,
      ..filters.clone()
    };
    let page: Page<Task> = self
      .call_json(
        ApiRequest::get(format!(
          "/projects/{id}/tasks/"
        ))
        .with_query(filters.to_query())
      )
      .await?;
    Ok(page.into_results())
  }

  // Tasks.

  pub async fn list_tasks(
    &self,
    filters: &TaskFilters
  ) -> Result<Page<Task>, ApiError> {
    self.list::<Tasks>(filters.to_query()).await
  }

  pub async fn get_task(
    &self,
    id: TaskId
  ) -> Result<Task, ApiError> {
    self.get::<Tasks>(id).await
  }

  pub async fn create_task(
    &self,
    payload: &TaskCreate
  ) -> Result<Task, ApiError> {
    self.create::<Tasks>(payload).await
  }

  pub async fn update_task(
    &self,
    id: TaskId,
    patch: &TaskPatch
  ) -> Result<Task, ApiError> {
    self.update::<Tasks>(id, patch).await
  }

  pub async fn update_task_status(
    &self,
    id: TaskId,
    status: TaskStatus
  ) -> Result<Task, ApiError> {
    let patch = TaskPatch {
      status: Some(status),
      ..TaskPatch::default()
    };
    self.update::<Tasks>(id, &patch).await
  }

  pub async fn update_task_priority(
    &self,
    id: TaskId,
    priority: Priority
  ) -> Result<Task, ApiError> {
    let patch = TaskPatch {
      priority: Some(priority),
      ..TaskPatch::default()
    };
    self.update::<Tasks>(id, &patch).await
  }

  pub async fn update_task_progress(
    &self,
    id: TaskId,
    progress: u8
  ) -> Result<Task, ApiError> {
    let patch = TaskPatch {
      progress: Some(progress.min(100)),
      ..TaskPatch::default()
    };
    self.update::<Tasks>(id, &patch).await
  }

  pub async fn delete_task(
    &self,
    id: TaskId
  ) -> Result<(), ApiError> {
    self.delete::<Tasks>(id).await
  }

  #[tracing::instrument(skip(self))]
  pub async fn overdue_tasks(
    &self
  ) -> Result<Vec<Task>, ApiError> {
    let page: Page<Task> = self
      .call_json(ApiRequest::get(
        "/tasks/overdue/"
      ))
      .await?;
    Ok(page.into_results())
  }

  #[tracing::instrument(skip(self))]
  pub async fn tasks_due_today(
    &self
  ) -> Result<Vec<Task>, ApiError> {
    let page: Page<Task> = self
      .call_json(ApiRequest::get(
        "/tasks/due-today/"
      ))
      .await?;
    Ok(page.into_results())
  }
}

fn encode<P: Serialize + ?Sized>(
  payload: &P
) -> Result<Value, ApiError> {
  serde_json::to_value(payload).map_err(|err| {
    ApiError::Decode(format!(
      "could not encode payload: {err}"
    ))
  })
}

fn decode<R: DeserializeOwned>(
  body: &str
) -> Result<R, ApiError> {
  let text = if body.trim().is_empty() {
    "null"
  } else {
    body
  };
  serde_json::from_str(text)
    .map_err(|err| ApiError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
  use std::rc::Rc;

  use serde_json::json;

  use super::*;
  use crate::api::{
    ErrorKind,
    Method
  };
  use crate::testing::{
    FakeTransport,
    task_json
  };

  fn gateway() -> (Rc<FakeTransport>, Gateway<Rc<FakeTransport>>) {
    let fake = Rc::new(FakeTransport::new());
    (fake.clone(), Gateway::new(fake))
  }

  #[tokio::test]
  async fn list_accepts_bare_array_and_envelope() {
    let (fake, gateway) = gateway();
    fake.reply(200, json!([task_json(1, "todo", 0)]));
    fake.reply(
      200,
      json!({"count": 1, "next": null, "previous": null, "results": [task_json(2, "review", 50)]})
    );
    fake.reply(200, json!({"count": 0}));

    let bare = gateway
      .list_tasks(&TaskFilters::default())
      .await
      .expect("bare");
    assert_eq!(bare.results.len(), 1);

    let paged = gateway
      .list_tasks(&TaskFilters::default())
      .await
      .expect("paged");
    assert_eq!(paged.count, Some(1));
    assert_eq!(paged.results[0].id, 2);

    let empty = gateway
      .list_tasks(&TaskFilters::default())
      .await
      .expect("empty");
    assert!(empty.results.is_empty());
  }

  #[tokio::test]
  async fn filters_become_query_pairs() {
    let (fake, gateway) = gateway();
    fake.reply(200, json!([]));

    let filters = TaskFilters {
      project: Some(3),
      status: Some(TaskStatus::Review),
      search: Some("  ".to_string()),
      overdue: true,
      ..TaskFilters::default()
    };
    gateway.list_tasks(&filters).await.expect("list");

    let request = fake.last_request().expect("request");
    assert_eq!(request.method, Method::Get);
    assert_eq!(request.path, "/tasks/");
    assert_eq!(
      request.query,
      vec![
        ("project", "3".to_string()),
        ("status", "review".to_string()),
        ("overdue", "true".to_string()),
      ]
    );
  }

  #[tokio::test]
  async fn project_tasks_use_nested_path_without_project_filter() {
    let (fake, gateway) = gateway();
    fake.reply(200, json!([task_json(4, "todo", 0)]));

    let filters = TaskFilters {
      project: Some(99),
      ..TaskFilters::default()
    };
    let tasks = gateway
      .project_tasks(7, &filters)
      .await
      .expect("tasks");
    assert_eq!(tasks.len(), 1);

    let request = fake.last_request().expect("request");
    assert_eq!(request.path, "/projects/7/tasks/");
    assert!(request.query.is_empty());
  }

  #[tokio::test]
  async fn auth_accepts_wrapped_and_bare_user() {
    let (fake, gateway) = gateway();
    let user = json!({"id": 1, "email": "a@b.co", "username": "ann"});
    fake.reply(200, json!({"user": user.clone(), "message": "ok"}));
    fake.reply(200, user);

    let login = LoginRequest {
      email:    "a@b.co".to_string(),
      password: "hunter22".to_string()
    };
    let first = gateway.login(&login).await.expect("login");
    let second = gateway.user_info().await.expect("info");
    assert_eq!(first, second);
    assert_eq!(
      fake.last_request().expect("request").path,
      "/auth/user-info/"
    );
  }

  #[tokio::test]
  async fn delete_tolerates_empty_body() {
    let (fake, gateway) = gateway();
    fake.reply_text(204, "");
    gateway.delete_task(5).await.expect("delete");
    let request = fake.last_request().expect("request");
    assert_eq!(request.method, Method::Delete);
    assert_eq!(request.path, "/tasks/5/");
  }

  #[tokio::test]
  async fn set_category_active_sends_requested_flag() {
    let (fake, gateway) = gateway();
    fake.reply(
      200,
      json!({"id": 2, "name": "Home", "color": "#3B82F6", "is_active": false})
    );
    let category = gateway
      .set_category_active(2, false)
      .await
      .expect("patch");
    assert!(!category.is_active);
    assert_eq!(
      fake.last_request().expect("request").body,
      Some(json!({"is_active": false}))
    );
  }

  #[tokio::test]
  async fn error_bodies_are_normalized() {
    let (fake, gateway) = gateway();
    fake.reply(400, json!({"non_field_errors": ["bad creds"]}));

    let login = LoginRequest {
      email:    "a@b.co".to_string(),
      password: "wrongpass".to_string()
    };
    let err = gateway
      .login(&login)
      .await
      .expect_err("rejected");
    assert_eq!(err.kind(), ErrorKind::Rejected);
    assert_eq!(err.to_string(), "bad creds");
  }

  #[tokio::test]
  async fn garbage_success_body_is_a_decode_error() {
    let (fake, gateway) = gateway();
    fake.reply_text(200, "not json");
    let err = gateway
      .get_task(1)
      .await
      .expect_err("decode");
    assert_eq!(err.kind(), ErrorKind::Decode);
  }
}
