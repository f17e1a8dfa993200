use std::fmt;
use std::str::FromStr;

use chrono::{
  DateTime,
  NaiveDate,
  Utc
};
use serde::{
  Deserialize,
  Deserializer,
  Serialize
};

pub type UserId = i64;
pub type CategoryId = i64;
pub type ProjectId = i64;
pub type TaskId = i64;

pub const DEFAULT_CATEGORY_COLOR: &str =
  "#3B82F6";

#[derive(
  Debug, Clone, PartialEq, Eq,
  thiserror::Error,
)]
#[error("unknown {kind} `{value}`")]
pub struct ParseEnumError {
  pub kind:  &'static str,
  pub value: String
}

macro_rules! wire_enum {
  (
    $name:ident, $kind:literal {
      $($variant:ident => $wire:literal, $label:literal;)+
    }
  ) => {
    impl $name {
      pub const ALL: &'static [$name] =
        &[$($name::$variant),+];

      pub fn as_str(self) -> &'static str {
        match self {
          $(| $name::$variant => $wire),+
        }
      }

      pub fn label(self) -> &'static str {
        match self {
          $(| $name::$variant => $label),+
        }
      }
    }

    impl fmt::Display for $name {
      fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>
      ) -> fmt::Result {
        f.write_str(self.as_str())
      }
    }

    impl FromStr for $name {
      type Err = ParseEnumError;

      fn from_str(
        s: &str
      ) -> Result<Self, Self::Err> {
        let needle = s.trim();
        $name::ALL
          .iter()
          .copied()
          .find(|value| {
            value.as_str()
              .eq_ignore_ascii_case(needle)
          })
          .ok_or_else(|| ParseEnumError {
            kind:  $kind,
            value: s.to_string()
          })
      }
    }
  };
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
  Low,
  #[default]
  Medium,
  High,
  Urgent
}

wire_enum!(Priority, "priority" {
  Low => "low", "Low";
  Medium => "medium", "Medium";
  High => "high", "High";
  Urgent => "urgent", "Urgent";
});

/// Project lifecycle.
///
/// The backend model stores the second state as `"in progress"` (with a
/// space) while some clients send `"in_progress"` or `"active"`. All three
/// spellings are accepted on input; output uses the model's spelling so
/// writes pass the backend's choice validation.
#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
  #[default]
  Planning,
  #[serde(
    rename = "in progress",
    alias = "in_progress",
    alias = "active"
  )]
  InProgress,
  OnHold,
  Completed,
  Cancelled
}

wire_enum!(ProjectStatus, "project status" {
  Planning => "planning", "Planning";
  InProgress => "in progress", "In Progress";
  OnHold => "on_hold", "On Hold";
  Completed => "completed", "Completed";
  Cancelled => "cancelled", "Cancelled";
});

impl ProjectStatus {
  /// Lenient parse used for query strings and form selects.
  pub fn parse_lenient(
    s: &str
  ) -> Result<Self, ParseEnumError> {
    match s.trim() {
      | "in_progress" | "active" => {
        Ok(Self::InProgress)
      }
      | other => other.parse()
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Default,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
  #[default]
  Todo,
  InProgress,
  Review,
  Completed,
  Cancelled
}

wire_enum!(TaskStatus, "task status" {
  Todo => "todo", "Todo";
  InProgress => "in_progress", "In Progress";
  Review => "review", "Review";
  Completed => "completed", "Completed";
  Cancelled => "cancelled", "Cancelled";
});

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct User {
  pub id:         UserId,
  pub email:      String,
  pub username:   String,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct Category {
  pub id:            CategoryId,
  pub name:          String,
  #[serde(default)]
  pub description:   Option<String>,
  #[serde(
    default = "default_category_color"
  )]
  pub color:         String,
  #[serde(default = "default_true")]
  pub is_active:     bool,
  #[serde(default)]
  pub task_count:    u32,
  #[serde(default)]
  pub project_count: u32,
  #[serde(default)]
  pub created_at:    Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at:    Option<DateTime<Utc>>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct Project {
  pub id:                   ProjectId,
  pub name:                 String,
  #[serde(default)]
  pub description:          Option<String>,
  #[serde(default)]
  pub category:             Option<CategoryId>,
  #[serde(default)]
  pub category_details:     Option<Category>,
  #[serde(default)]
  pub start_date:           Option<NaiveDate>,
  #[serde(default)]
  pub due_date:             Option<NaiveDate>,
  #[serde(default)]
  pub priority:             Priority,
  #[serde(default)]
  pub status:               ProjectStatus,
  #[serde(default = "default_true")]
  pub is_active:            bool,
  #[serde(default)]
  pub task_count:           u32,
  #[serde(default)]
  pub completed_task_count: u32,
  #[serde(
    default,
    deserialize_with = "decimal::number"
  )]
  pub progress_percentage:  f64,
  #[serde(default)]
  pub is_overdue:           bool,
  #[serde(default)]
  pub days_until_due:       Option<i64>,
  #[serde(default)]
  pub created_at:           Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at:           Option<DateTime<Utc>>
}

impl Project {
  /// Category id as the edit form should see it. An expanded relation
  /// wins over the raw foreign key, which can lag behind it.
  pub fn effective_category_id(
    &self
  ) -> Option<CategoryId> {
    self
      .category_details
      .as_ref()
      .map(|details| details.id)
      .or(self.category)
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct Task {
  pub id:                TaskId,
  pub name:              String,
  #[serde(default)]
  pub description:       Option<String>,
  pub project:           ProjectId,
  #[serde(default)]
  pub project_details:   Option<Project>,
  #[serde(default)]
  pub start_date:        Option<NaiveDate>,
  #[serde(default)]
  pub due_date:          Option<NaiveDate>,
  #[serde(default)]
  pub priority:          Priority,
  #[serde(default)]
  pub status:            TaskStatus,
  #[serde(
    default,
    deserialize_with = "decimal::optional"
  )]
  pub estimated_hours:   Option<f64>,
  #[serde(
    default,
    deserialize_with = "decimal::optional"
  )]
  pub actual_hours:      Option<f64>,
  #[serde(default)]
  pub progress:          u8,
  #[serde(default = "default_true")]
  pub is_active:         bool,
  #[serde(default)]
  pub is_overdue:        bool,
  #[serde(default)]
  pub days_until_due:    Option<i64>,
  #[serde(default)]
  pub completion_status: Option<String>,
  #[serde(default)]
  pub created_at:        Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at:        Option<DateTime<Utc>>
}

impl Task {
  pub fn is_completed(&self) -> bool {
    self.status == TaskStatus::Completed
  }

  pub fn effective_project_id(
    &self
  ) -> ProjectId {
    self
      .project_details
      .as_ref()
      .map(|details| details.id)
      .unwrap_or(self.project)
  }

  pub fn days_until_due(
    &self,
    today: NaiveDate
  ) -> Option<i64> {
    self
      .due_date
      .map(|due| (due - today).num_days())
  }

  pub fn is_overdue_on(
    &self,
    today: NaiveDate
  ) -> bool {
    !self.is_completed()
      && self
        .days_until_due(today)
        .is_some_and(|days| days < 0)
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct LoginRequest {
  pub email:    String,
  pub password: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct RegisterRequest {
  pub email:    String,
  pub username: String,
  pub password: String
}

/// Auth endpoints answer either with the user itself or wrapped in
/// `{"user": ...}` depending on the endpoint.
#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
#[serde(untagged)]
pub enum AuthPayload {
  Wrapped { user: User },
  Bare(User)
}

impl AuthPayload {
  pub fn into_user(self) -> User {
    match self {
      | Self::Wrapped { user } => user,
      | Self::Bare(user) => user
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct CategoryCreate {
  pub name:        String,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub description: Option<String>,
  pub color:       String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Default,
)]
pub struct CategoryPatch {
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub name:        Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub description: Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub color:       Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub is_active:   Option<bool>
}

impl From<CategoryCreate> for CategoryPatch {
  fn from(create: CategoryCreate) -> Self {
    Self {
      name:        Some(create.name),
      description: Some(
        create.description.unwrap_or_default()
      ),
      color:       Some(create.color),
      is_active:   None
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct ProjectCreate {
  pub name:        String,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub description: Option<String>,
  pub category:    CategoryId,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub start_date:  Option<NaiveDate>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date:    Option<NaiveDate>,
  pub priority:    Priority,
  pub status:      ProjectStatus
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Default,
)]
pub struct ProjectPatch {
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub name:        Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub description: Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub category:    Option<CategoryId>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    with = "clearable"
  )]
  pub start_date:  Option<Option<NaiveDate>>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    with = "clearable"
  )]
  pub due_date:    Option<Option<NaiveDate>>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub priority:    Option<Priority>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub status:      Option<ProjectStatus>
}

impl From<ProjectCreate> for ProjectPatch {
  fn from(create: ProjectCreate) -> Self {
    Self {
      name:        Some(create.name),
      description: Some(
        create.description.unwrap_or_default()
      ),
      category:    Some(create.category),
      start_date:  Some(create.start_date),
      due_date:    Some(create.due_date),
      priority:    Some(create.priority),
      status:      Some(create.status)
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct TaskCreate {
  pub name:            String,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub description:     Option<String>,
  pub project:         ProjectId,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub start_date:      Option<NaiveDate>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date:        Option<NaiveDate>,
  pub priority:        Priority,
  pub status:          TaskStatus,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub estimated_hours: Option<f64>,
  pub progress:        u8
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Default,
)]
pub struct TaskPatch {
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub name:            Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub description:     Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub project:         Option<ProjectId>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    with = "clearable"
  )]
  pub start_date:      Option<Option<NaiveDate>>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    with = "clearable"
  )]
  pub due_date:        Option<Option<NaiveDate>>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub priority:        Option<Priority>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub status:          Option<TaskStatus>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    with = "clearable"
  )]
  pub estimated_hours: Option<Option<f64>>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub progress:        Option<u8>
}

impl TaskPatch {
  /// The single combined update for the completion toggle: a completed
  /// task resets to `todo` at 0%, anything else becomes `completed` at
  /// 100%. Status and progress always travel together.
  pub fn completion_toggle(
    task: &Task
  ) -> Self {
    let (status, progress) =
      if task.is_completed() {
        (TaskStatus::Todo, 0)
      } else {
        (TaskStatus::Completed, 100)
      };
    Self {
      status: Some(status),
      progress: Some(progress),
      ..Self::default()
    }
  }
}

impl From<TaskCreate> for TaskPatch {
  fn from(create: TaskCreate) -> Self {
    Self {
      name:            Some(create.name),
      description:     Some(
        create.description.unwrap_or_default()
      ),
      project:         Some(create.project),
      start_date:      Some(create.start_date),
      due_date:        Some(create.due_date),
      priority:        Some(create.priority),
      status:          Some(create.status),
      estimated_hours: Some(
        create.estimated_hours
      ),
      progress:        Some(create.progress)
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Default,
)]
pub struct ProjectFilters {
  pub status:    Option<ProjectStatus>,
  pub priority:  Option<Priority>,
  pub category:  Option<CategoryId>,
  pub search:    Option<String>,
  pub page:      Option<u32>,
  pub page_size: Option<u32>
}

impl ProjectFilters {
  /// Query pairs for the list endpoint. Absent, empty and zero values
  /// are left out entirely.
  pub fn to_query(
    &self
  ) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    push_display(
      &mut pairs,
      "status",
      self.status
    );
    push_display(
      &mut pairs,
      "priority",
      self.priority
    );
    push_id(
      &mut pairs,
      "category",
      self.category
    );
    push_text(
      &mut pairs,
      "search",
      self.search.as_deref()
    );
    push_count(&mut pairs, "page", self.page);
    push_count(
      &mut pairs,
      "page_size",
      self.page_size
    );
    pairs
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Default,
)]
pub struct TaskFilters {
  pub project:   Option<ProjectId>,
  pub status:    Option<TaskStatus>,
  pub priority:  Option<Priority>,
  pub search:    Option<String>,
  pub page:      Option<u32>,
  pub page_size: Option<u32>,
  #[serde(default)]
  pub overdue:   bool
}

impl TaskFilters {
  pub fn to_query(
    &self
  ) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    push_id(
      &mut pairs,
      "project",
      self.project
    );
    push_display(
      &mut pairs,
      "status",
      self.status
    );
    push_display(
      &mut pairs,
      "priority",
      self.priority
    );
    push_text(
      &mut pairs,
      "search",
      self.search.as_deref()
    );
    push_count(&mut pairs, "page", self.page);
    push_count(
      &mut pairs,
      "page_size",
      self.page_size
    );
    if self.overdue {
      pairs.push((
        "overdue",
        "true".to_string()
      ));
    }
    pairs
  }
}

fn push_display<T: fmt::Display>(
  pairs: &mut Vec<(&'static str, String)>,
  name: &'static str,
  value: Option<T>
) {
  if let Some(value) = value {
    pairs.push((name, value.to_string()));
  }
}

fn push_id(
  pairs: &mut Vec<(&'static str, String)>,
  name: &'static str,
  value: Option<i64>
) {
  if let Some(id) = value
    && id != 0
  {
    pairs.push((name, id.to_string()));
  }
}

fn push_count(
  pairs: &mut Vec<(&'static str, String)>,
  name: &'static str,
  value: Option<u32>
) {
  if let Some(count) = value
    && count != 0
  {
    pairs.push((name, count.to_string()));
  }
}

fn push_text(
  pairs: &mut Vec<(&'static str, String)>,
  name: &'static str,
  value: Option<&str>
) {
  if let Some(text) = value {
    let text = text.trim();
    if !text.is_empty() {
      pairs.push((name, text.to_string()));
    }
  }
}

/// A list response. The backend answers either with a bare array or with
/// a paginated envelope whose `results` may be missing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
  pub count:    Option<u64>,
  pub next:     Option<String>,
  pub previous: Option<String>,
  pub results:  Vec<T>
}

impl<T> Default for Page<T> {
  fn default() -> Self {
    Self {
      count:    None,
      next:     None,
      previous: None,
      results:  Vec::new()
    }
  }
}

impl<T> Page<T> {
  pub fn into_results(self) -> Vec<T> {
    self.results
  }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PageBody<T> {
  List(Vec<T>),
  Paged {
    count:    Option<u64>,
    next:     Option<String>,
    previous: Option<String>,
    results:  Option<Vec<T>>
  }
}

impl<'de, T> Deserialize<'de> for Page<T>
where
  T: Deserialize<'de>
{
  fn deserialize<D>(
    deserializer: D
  ) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>
  {
    let body =
      PageBody::deserialize(deserializer)?;
    Ok(match body {
      | PageBody::List(results) => Page {
        results,
        ..Page::default()
      },
      | PageBody::Paged {
        count,
        next,
        previous,
        results
      } => Page {
        count,
        next,
        previous,
        results: results.unwrap_or_default()
      }
    })
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct ProjectCounts {
  #[serde(default)]
  pub total:     u64,
  #[serde(default)]
  pub active:    u64,
  #[serde(default)]
  pub completed: u64,
  #[serde(default)]
  pub overdue:   u64
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct TaskCounts {
  #[serde(default)]
  pub total:       u64,
  #[serde(default)]
  pub completed:   u64,
  #[serde(default)]
  pub todo:        u64,
  #[serde(default)]
  pub in_progress: u64
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct CategoryCounts {
  #[serde(default)]
  pub total: u64
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct DashboardSummary {
  #[serde(default)]
  pub projects:   ProjectCounts,
  #[serde(default)]
  pub tasks:      TaskCounts,
  #[serde(default)]
  pub categories: Option<CategoryCounts>
}

fn default_true() -> bool {
  true
}

fn default_category_color() -> String {
  DEFAULT_CATEGORY_COLOR.to_string()
}

/// Patch fields the user can clear. The outer `None` leaves the key out of
/// the body; `Some(None)` sends an explicit `null`.
mod clearable {
  use serde::{
    Deserialize,
    Deserializer,
    Serialize,
    Serializer
  };

  pub fn serialize<T, S>(
    value: &Option<Option<T>>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    T: Serialize,
    S: Serializer
  {
    match value {
      | Some(inner) => inner.serialize(serializer),
      | None => serializer.serialize_none()
    }
  }

  pub fn deserialize<'de, T, D>(
    deserializer: D
  ) -> Result<Option<Option<T>>, D::Error>
  where
    T: Deserialize<'de>,
    D: Deserializer<'de>
  {
    Option::<T>::deserialize(deserializer).map(Some)
  }
}

/// The backend serialises decimal fields as strings (`"12.50"`) unless
/// configured otherwise; accept both shapes.
mod decimal {
  use serde::{
    Deserialize,
    Deserializer
  };

  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Flexible {
    Number(f64),
    Text(String)
  }

  fn resolve<E: serde::de::Error>(
    value: Flexible
  ) -> Result<f64, E> {
    match value {
      | Flexible::Number(number) => Ok(number),
      | Flexible::Text(text) => text
        .trim()
        .parse::<f64>()
        .map_err(|err| {
          E::custom(format!(
            "invalid decimal `{text}`: \
             {err}"
          ))
        })
    }
  }

  pub fn number<'de, D>(
    deserializer: D
  ) -> Result<f64, D::Error>
  where
    D: Deserializer<'de>
  {
    match Option::<Flexible>::deserialize(
      deserializer
    )? {
      | Some(value) => resolve(value),
      | None => Ok(0.0)
    }
  }

  pub fn optional<'de, D>(
    deserializer: D
  ) -> Result<Option<f64>, D::Error>
  where
    D: Deserializer<'de>
  {
    match Option::<Flexible>::deserialize(
      deserializer
    )? {
      | Some(Flexible::Text(text))
        if text.trim().is_empty() =>
      {
        Ok(None)
      }
      | Some(value) => {
        resolve(value).map(Some)
      }
      | None => Ok(None)
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn task_json() -> serde_json::Value {
    json!({
      "id": 7,
      "name": "Write report",
      "project": 3,
      "priority": "high",
      "status": "in_progress",
      "estimated_hours": "12.50",
      "progress": 40
    })
  }

  #[test]
  fn task_accepts_decimal_strings() {
    let task: Task =
      serde_json::from_value(task_json())
        .expect("task decodes");
    assert_eq!(
      task.estimated_hours,
      Some(12.5)
    );
    assert_eq!(task.actual_hours, None);
    assert_eq!(
      task.status,
      TaskStatus::InProgress
    );
    assert!(task.is_active);
  }

  #[test]
  fn project_status_accepts_every_spelling()
  {
    for spelling in
      ["in progress", "in_progress", "active"]
    {
      let status: ProjectStatus =
        serde_json::from_value(json!(
          spelling
        ))
        .expect("status decodes");
      assert_eq!(
        status,
        ProjectStatus::InProgress
      );
    }
    assert_eq!(
      serde_json::to_value(
        ProjectStatus::InProgress
      )
      .expect("status encodes"),
      json!("in progress")
    );
  }

  #[test]
  fn page_accepts_bare_arrays_and_missing_results()
   {
    let bare: Page<User> =
      serde_json::from_value(json!([
        {"id": 1, "email": "a@b.io", "username": "ab"}
      ]))
      .expect("bare list decodes");
    assert_eq!(bare.results.len(), 1);

    let empty: Page<User> =
      serde_json::from_value(
        json!({"count": 0, "next": null})
      )
      .expect("envelope decodes");
    assert_eq!(empty.count, Some(0));
    assert!(empty.results.is_empty());

    let paged: Page<Task> =
      serde_json::from_value(json!({
        "count": 1,
        "results": [task_json()]
      }))
      .expect("paged tasks decode");
    assert_eq!(paged.count, Some(1));
    assert_eq!(paged.next, None);
    assert_eq!(paged.results[0].id, 7);
  }

  #[test]
  fn cleared_patch_dates_are_sent_as_null() {
    let create = TaskCreate {
      name:            "Prune".to_string(),
      description:     None,
      project:         1,
      start_date:      None,
      due_date:        None,
      priority:        Priority::Low,
      status:          TaskStatus::Todo,
      estimated_hours: None,
      progress:        0
    };
    let body = serde_json::to_value(
      TaskPatch::from(create)
    )
    .expect("patch encodes");
    assert_eq!(body["due_date"], json!(null));
    assert_eq!(body["start_date"], json!(null));
    assert_eq!(
      body["estimated_hours"],
      json!(null)
    );
    assert!(
      body
        .as_object()
        .is_some_and(|map| map.contains_key("due_date"))
    );

    let quick = TaskPatch {
      progress: Some(50),
      ..TaskPatch::default()
    };
    assert_eq!(
      serde_json::to_value(&quick)
        .expect("patch encodes"),
      json!({"progress": 50})
    );

    let decoded: TaskPatch =
      serde_json::from_value(
        json!({"due_date": null})
      )
      .expect("patch decodes");
    assert_eq!(decoded.due_date, Some(None));
    assert_eq!(decoded.start_date, None);
  }

  #[test]
  fn task_filters_skip_empty_values() {
    let filters = TaskFilters {
      project: Some(4),
      status: Some(TaskStatus::Review),
      search: Some("  ".to_string()),
      page: Some(0),
      page_size: Some(25),
      overdue: true,
      ..TaskFilters::default()
    };
    assert_eq!(
      filters.to_query(),
      vec![
        ("project", "4".to_string()),
        ("status", "review".to_string()),
        ("page_size", "25".to_string()),
        ("overdue", "true".to_string()),
      ]
    );
    assert!(
      TaskFilters::default()
        .to_query()
        .is_empty()
    );
  }

  #[test]
  fn expanded_category_wins_over_raw_id() {
    let project: Project =
      serde_json::from_value(json!({
        "id": 1,
        "name": "Site",
        "category": 2,
        "category_details": {
          "id": 5,
          "name": "Work",
          "color": "#112233"
        }
      }))
      .expect("project decodes");
    assert_eq!(
      project.effective_category_id(),
      Some(5)
    );
  }

  #[test]
  fn completion_toggle_moves_status_and_progress_together()
   {
    let mut task: Task =
      serde_json::from_value(task_json())
        .expect("task decodes");

    let patch =
      TaskPatch::completion_toggle(&task);
    assert_eq!(
      patch.status,
      Some(TaskStatus::Completed)
    );
    assert_eq!(patch.progress, Some(100));

    task.status = TaskStatus::Completed;
    task.progress = 100;
    let patch =
      TaskPatch::completion_toggle(&task);
    assert_eq!(
      serde_json::to_value(&patch)
        .expect("patch encodes"),
      json!({"status": "todo", "progress": 0})
    );
  }

  #[test]
  fn overdue_ignores_completed_tasks() {
    let mut task: Task =
      serde_json::from_value(task_json())
        .expect("task decodes");
    let today =
      NaiveDate::from_ymd_opt(2026, 3, 10)
        .expect("valid date");
    task.due_date =
      NaiveDate::from_ymd_opt(2026, 3, 8);
    assert_eq!(
      task.days_until_due(today),
      Some(-2)
    );
    assert!(task.is_overdue_on(today));

    task.status = TaskStatus::Completed;
    assert!(!task.is_overdue_on(today));
  }
}
