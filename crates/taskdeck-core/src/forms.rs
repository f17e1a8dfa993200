//! Form input as typed by the user, validated into request payloads.
//!
//! Validation never touches the network; a failed `validate` returns every
//! field message at once so the form can show them inline.

use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use taskdeck_shared::{
  Category,
  CategoryCreate,
  CategoryId,
  CategoryPatch,
  DEFAULT_CATEGORY_COLOR,
  LoginRequest,
  Priority,
  Project,
  ProjectCreate,
  ProjectId,
  ProjectPatch,
  ProjectStatus,
  RegisterRequest,
  Task,
  TaskCreate,
  TaskPatch,
  TaskStatus
};

static EMAIL_RE: LazyLock<Option<Regex>> =
  LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok()
  });

static COLOR_RE: LazyLock<Option<Regex>> =
  LazyLock::new(|| {
    Regex::new(r"^#[0-9A-Fa-f]{6}$").ok()
  });

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Per-field validation messages in the order the fields were checked.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct FieldErrors {
  entries: Vec<(&'static str, String)>
}

impl FieldErrors {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(
    &mut self,
    field: &'static str,
    message: impl Into<String>
  ) {
    self.entries.push((field, message.into()));
  }

  /// First message for `field`, for rendering under the input.
  pub fn get(&self, field: &str) -> Option<&str> {
    self
      .entries
      .iter()
      .find(|(name, _)| *name == field)
      .map(|(_, message)| message.as_str())
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&'static str, &str)> {
    self
      .entries
      .iter()
      .map(|(field, message)| (*field, message.as_str()))
  }

  fn finish<T>(
    self,
    value: impl FnOnce() -> T
  ) -> Result<T, FieldErrors> {
    if self.is_empty() {
      Ok(value())
    } else {
      Err(self)
    }
  }
}

impl fmt::Display for FieldErrors {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    let mut first = true;
    for (field, message) in &self.entries {
      if !first {
        f.write_str("; ")?;
      }
      first = false;
      write!(f, "{field}: {message}")?;
    }
    Ok(())
  }
}

impl std::error::Error for FieldErrors {}

fn check_email(
  errors: &mut FieldErrors,
  email: &str
) {
  let valid = EMAIL_RE
    .as_ref()
    .is_some_and(|re| re.is_match(email.trim()));
  if !valid {
    errors.push("email", "Invalid email address");
  }
}

fn check_password(
  errors: &mut FieldErrors,
  password: &str
) {
  if password.chars().count() < 8 {
    errors.push(
      "password",
      "Password must be at least 8 characters"
    );
  }
}

fn check_name(
  errors: &mut FieldErrors,
  name: &str,
  max: usize
) {
  let len = name.trim().chars().count();
  if len == 0 {
    errors.push("name", "Name is required");
  } else if len > max {
    errors.push(
      "name",
      format!("Name must be less than {max} characters")
    );
  }
}

fn parse_date(
  errors: &mut FieldErrors,
  field: &'static str,
  raw: &str
) -> Option<NaiveDate> {
  let raw = raw.trim();
  if raw.is_empty() {
    return None;
  }
  match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
    | Ok(date) => Some(date),
    | Err(_) => {
      errors.push(
        field,
        "Invalid date (use YYYY-MM-DD)"
      );
      None
    }
  }
}

fn check_date_order(
  errors: &mut FieldErrors,
  start: Option<NaiveDate>,
  due: Option<NaiveDate>
) {
  if let (Some(start), Some(due)) = (start, due)
    && start > due
  {
    errors.push(
      "due_date",
      "Start date cannot be after due date"
    );
  }
}

fn parse_priority(
  errors: &mut FieldErrors,
  raw: &str
) -> Priority {
  raw.parse().unwrap_or_else(|_| {
    errors.push("priority", "Invalid priority");
    Priority::default()
  })
}

fn optional_text(raw: &str) -> Option<String> {
  let trimmed = raw.trim();
  (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn format_date(date: Option<NaiveDate>) -> String {
  date
    .map(|date| date.format(DATE_FORMAT).to_string())
    .unwrap_or_default()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoginForm {
  pub email:    String,
  pub password: String
}

impl LoginForm {
  pub fn validate(
    &self
  ) -> Result<LoginRequest, FieldErrors> {
    let mut errors = FieldErrors::new();
    check_email(&mut errors, &self.email);
    check_password(&mut errors, &self.password);
    errors.finish(|| LoginRequest {
      email:    self.email.trim().to_string(),
      password: self.password.clone()
    })
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterForm {
  pub email:    String,
  pub username: String,
  pub password: String
}

impl RegisterForm {
  pub fn validate(
    &self
  ) -> Result<RegisterRequest, FieldErrors> {
    let mut errors = FieldErrors::new();
    check_email(&mut errors, &self.email);

    let username = self.username.trim();
    let len = username.chars().count();
    if len < 3 {
      errors.push(
        "username",
        "Username must be at least 3 characters"
      );
    } else if len > 30 {
      errors.push(
        "username",
        "Username must be less than 30 characters"
      );
    }

    check_password(&mut errors, &self.password);
    errors.finish(|| RegisterRequest {
      email:    self.email.trim().to_string(),
      username: username.to_string(),
      password: self.password.clone()
    })
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryForm {
  pub name:        String,
  pub description: String,
  pub color:       String
}

impl Default for CategoryForm {
  fn default() -> Self {
    Self {
      name:        String::new(),
      description: String::new(),
      color:       DEFAULT_CATEGORY_COLOR.to_string()
    }
  }
}

impl CategoryForm {
  pub fn from_category(
    category: &Category
  ) -> Self {
    Self {
      name:        category.name.clone(),
      description: category
        .description
        .clone()
        .unwrap_or_default(),
      color:       category.color.clone()
    }
  }

  pub fn validate(
    &self
  ) -> Result<CategoryCreate, FieldErrors> {
    let mut errors = FieldErrors::new();
    check_name(&mut errors, &self.name, 100);

    let color = self.color.trim();
    let valid = COLOR_RE
      .as_ref()
      .is_some_and(|re| re.is_match(color));
    if !valid {
      errors.push(
        "color",
        "Invalid color format (use #RRGGBB)"
      );
    }

    errors.finish(|| CategoryCreate {
      name:        self.name.trim().to_string(),
      description: optional_text(
        &self.description
      ),
      color:       color.to_uppercase()
    })
  }

  pub fn to_patch(
    &self
  ) -> Result<CategoryPatch, FieldErrors> {
    self.validate().map(CategoryPatch::from)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectForm {
  pub name:        String,
  pub description: String,
  pub category:    Option<CategoryId>,
  pub start_date:  String,
  pub due_date:    String,
  pub priority:    String,
  pub status:      String
}

impl Default for ProjectForm {
  fn default() -> Self {
    Self {
      name:        String::new(),
      description: String::new(),
      category:    None,
      start_date:  String::new(),
      due_date:    String::new(),
      priority:    Priority::default()
        .as_str()
        .to_string(),
      status:      ProjectStatus::default()
        .as_str()
        .to_string()
    }
  }
}

impl ProjectForm {
  /// Pre-populates an edit form. The expanded `category_details` wins over
  /// the raw `category` id, which can be stale.
  pub fn from_project(
    project: &Project
  ) -> Self {
    Self {
      name:        project.name.clone(),
      description: project
        .description
        .clone()
        .unwrap_or_default(),
      category:    project.effective_category_id(),
      start_date:  format_date(project.start_date),
      due_date:    format_date(project.due_date),
      priority:    project
        .priority
        .as_str()
        .to_string(),
      status:      project
        .status
        .as_str()
        .to_string()
    }
  }

  pub fn validate(
    &self
  ) -> Result<ProjectCreate, FieldErrors> {
    let mut errors = FieldErrors::new();
    check_name(&mut errors, &self.name, 100);

    let category =
      self.category.filter(|id| *id > 0);
    if category.is_none() {
      errors.push("category", "Category is required");
    }

    let start_date = parse_date(
      &mut errors,
      "start_date",
      &self.start_date
    );
    let due_date = parse_date(
      &mut errors,
      "due_date",
      &self.due_date
    );
    check_date_order(
      &mut errors,
      start_date,
      due_date
    );
    let priority =
      parse_priority(&mut errors, &self.priority);
    let status =
      ProjectStatus::parse_lenient(&self.status)
        .unwrap_or_else(|_| {
          errors.push("status", "Invalid status");
          ProjectStatus::default()
        });

    errors.finish(|| ProjectCreate {
      name: self.name.trim().to_string(),
      description: optional_text(
        &self.description
      ),
      category: category.unwrap_or_default(),
      start_date,
      due_date,
      priority,
      status
    })
  }

  pub fn to_patch(
    &self
  ) -> Result<ProjectPatch, FieldErrors> {
    self.validate().map(ProjectPatch::from)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskForm {
  pub name:            String,
  pub description:     String,
  pub project:         Option<ProjectId>,
  pub start_date:      String,
  pub due_date:        String,
  pub priority:        String,
  pub status:          String,
  pub estimated_hours: String,
  pub progress:        String
}

impl Default for TaskForm {
  fn default() -> Self {
    Self {
      name:            String::new(),
      description:     String::new(),
      project:         None,
      start_date:      String::new(),
      due_date:        String::new(),
      priority:        Priority::default()
        .as_str()
        .to_string(),
      status:          TaskStatus::default()
        .as_str()
        .to_string(),
      estimated_hours: String::new(),
      progress:        "0".to_string()
    }
  }
}

impl TaskForm {
  pub fn for_project(
    project: ProjectId
  ) -> Self {
    Self {
      project: Some(project),
      ..Self::default()
    }
  }

  /// Pre-populates an edit form, preferring `project_details.id` over the
  /// raw `project` id.
  pub fn from_task(task: &Task) -> Self {
    Self {
      name:            task.name.clone(),
      description:     task
        .description
        .clone()
        .unwrap_or_default(),
      project:         Some(
        task.effective_project_id()
      ),
      start_date:      format_date(task.start_date),
      due_date:        format_date(task.due_date),
      priority:        task
        .priority
        .as_str()
        .to_string(),
      status:          task
        .status
        .as_str()
        .to_string(),
      estimated_hours: task
        .estimated_hours
        .map(|hours| hours.to_string())
        .unwrap_or_default(),
      progress:        task.progress.to_string()
    }
  }

  pub fn validate(
    &self
  ) -> Result<TaskCreate, FieldErrors> {
    let mut errors = FieldErrors::new();
    check_name(&mut errors, &self.name, 200);

    let project =
      self.project.filter(|id| *id > 0);
    if project.is_none() {
      errors.push("project", "Project is required");
    }

    let start_date = parse_date(
      &mut errors,
      "start_date",
      &self.start_date
    );
    let due_date = parse_date(
      &mut errors,
      "due_date",
      &self.due_date
    );
    check_date_order(
      &mut errors,
      start_date,
      due_date
    );
    let priority =
      parse_priority(&mut errors, &self.priority);
    let status = self
      .status
      .parse::<TaskStatus>()
      .unwrap_or_else(|_| {
        errors.push("status", "Invalid status");
        TaskStatus::default()
      });

    let estimated_hours =
      self.parse_estimated_hours(&mut errors);
    let progress = self.parse_progress(&mut errors);

    errors.finish(|| TaskCreate {
      name: self.name.trim().to_string(),
      description: optional_text(
        &self.description
      ),
      project: project.unwrap_or_default(),
      start_date,
      due_date,
      priority,
      status,
      estimated_hours,
      progress
    })
  }

  pub fn to_patch(
    &self
  ) -> Result<TaskPatch, FieldErrors> {
    self.validate().map(TaskPatch::from)
  }

  fn parse_estimated_hours(
    &self,
    errors: &mut FieldErrors
  ) -> Option<f64> {
    let raw = self.estimated_hours.trim();
    if raw.is_empty() {
      return None;
    }
    match raw.parse::<f64>() {
      | Ok(hours) if !hours.is_finite() => {
        errors.push(
          "estimated_hours",
          "Estimated hours must be a number"
        );
        None
      }
      | Ok(hours) if hours < 0.01 => {
        errors.push(
          "estimated_hours",
          "Estimated hours must be greater than 0"
        );
        None
      }
      | Ok(hours) if hours > 999.99 => {
        errors.push(
          "estimated_hours",
          "Estimated hours must be less than 1000"
        );
        None
      }
      | Ok(hours) => Some(hours),
      | Err(_) => {
        errors.push(
          "estimated_hours",
          "Estimated hours must be a number"
        );
        None
      }
    }
  }

  fn parse_progress(
    &self,
    errors: &mut FieldErrors
  ) -> u8 {
    let raw = self.progress.trim();
    if raw.is_empty() {
      return 0;
    }
    match raw.parse::<i64>() {
      | Ok(value) if value < 0 => {
        errors.push(
          "progress",
          "Progress must be at least 0"
        );
        0
      }
      | Ok(value) if value > 100 => {
        errors.push(
          "progress",
          "Progress must be at most 100"
        );
        0
      }
      | Ok(value) => u8::try_from(value).unwrap_or(0),
      | Err(_) => {
        errors.push(
          "progress",
          "Progress must be a whole number"
        );
        0
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn login_requires_email_and_long_password() {
    let form = LoginForm {
      email:    "not-an-email".to_string(),
      password: "short".to_string()
    };
    let errors = form.validate().expect_err("invalid");
    assert_eq!(errors.get("email"), Some("Invalid email address"));
    assert_eq!(
      errors.get("password"),
      Some("Password must be at least 8 characters")
    );

    let form = LoginForm {
      email:    " ann@example.com ".to_string(),
      password: "long enough".to_string()
    };
    let request = form.validate().expect("valid");
    assert_eq!(request.email, "ann@example.com");
  }

  #[test]
  fn register_username_bounds() {
    let mut form = RegisterForm {
      email:    "ann@example.com".to_string(),
      username: "an".to_string(),
      password: "password1".to_string()
    };
    assert_eq!(
      form.validate().expect_err("short").get("username"),
      Some("Username must be at least 3 characters")
    );
    form.username = "a".repeat(31);
    assert_eq!(
      form.validate().expect_err("long").get("username"),
      Some("Username must be less than 30 characters")
    );
    form.username = "ann".to_string();
    assert!(form.validate().is_ok());
  }

  #[test]
  fn category_color_must_be_hex() {
    let mut form = CategoryForm {
      name: "Work".to_string(),
      ..CategoryForm::default()
    };
    assert_eq!(form.validate().expect("default color").color, "#3B82F6");

    form.color = "blue".to_string();
    let errors = form.validate().expect_err("bad color");
    assert_eq!(
      errors.get("color"),
      Some("Invalid color format (use #RRGGBB)")
    );

    form.color = "#a1b2c3".to_string();
    form.description = "   ".to_string();
    let payload = form.validate().expect("lowercase hex");
    assert_eq!(payload.color, "#A1B2C3");
    assert_eq!(payload.description, None);
  }

  #[test]
  fn project_form_prefers_expanded_category() {
    let project: Project = serde_json::from_value(serde_json::json!({
      "id": 4,
      "name": "Garden",
      "category": 1,
      "category_details": {"id": 2, "name": "Home", "color": "#10B981"},
      "status": "active",
      "priority": "high",
      "due_date": "2024-05-01"
    }))
    .expect("project");

    let form = ProjectForm::from_project(&project);
    assert_eq!(form.category, Some(2));
    assert_eq!(form.status, "in progress");
    assert_eq!(form.due_date, "2024-05-01");

    let patch = form.to_patch().expect("valid");
    assert_eq!(patch.category, Some(2));
    assert_eq!(patch.status, Some(ProjectStatus::InProgress));
  }

  #[test]
  fn project_form_reports_every_field() {
    let form = ProjectForm {
      name: String::new(),
      start_date: "05/01/2024".to_string(),
      status: "archived".to_string(),
      ..ProjectForm::default()
    };
    let errors = form.validate().expect_err("invalid");
    let fields: Vec<&str> = errors.iter().map(|(field, _)| field).collect();
    assert_eq!(fields, vec!["name", "category", "start_date", "status"]);
    assert_eq!(errors.get("name"), Some("Name is required"));
    assert_eq!(errors.get("start_date"), Some("Invalid date (use YYYY-MM-DD)"));
  }

  #[test]
  fn task_numeric_ranges() {
    let mut form = TaskForm {
      name: "Plant tomatoes".to_string(),
      ..TaskForm::for_project(3)
    };
    form.progress = "101".to_string();
    form.estimated_hours = "0".to_string();
    let errors = form.validate().expect_err("out of range");
    assert_eq!(errors.get("progress"), Some("Progress must be at most 100"));
    assert_eq!(
      errors.get("estimated_hours"),
      Some("Estimated hours must be greater than 0")
    );

    form.progress = "-1".to_string();
    form.estimated_hours = "1000".to_string();
    let errors = form.validate().expect_err("out of range");
    assert_eq!(errors.get("progress"), Some("Progress must be at least 0"));
    assert_eq!(
      errors.get("estimated_hours"),
      Some("Estimated hours must be less than 1000")
    );

    form.progress = "100".to_string();
    form.estimated_hours = "2.5".to_string();
    let payload = form.validate().expect("valid");
    assert_eq!(payload.progress, 100);
    assert_eq!(payload.estimated_hours, Some(2.5));
    assert_eq!(payload.project, 3);
  }

  #[test]
  fn task_form_round_trips_existing_task() {
    let task: Task = serde_json::from_value(serde_json::json!({
      "id": 8,
      "name": "Prune roses",
      "project": 1,
      "project_details": {"id": 5, "name": "Garden"},
      "status": "review",
      "priority": "low",
      "estimated_hours": "1.50",
      "progress": 70
    }))
    .expect("task");

    let form = TaskForm::from_task(&task);
    assert_eq!(form.project, Some(5));
    assert_eq!(form.estimated_hours, "1.5");

    let patch = form.to_patch().expect("valid");
    assert_eq!(patch.project, Some(5));
    assert_eq!(patch.status, Some(TaskStatus::Review));
    assert_eq!(patch.progress, Some(70));
  }

  #[test]
  fn clearing_dates_in_edit_form_sends_null() {
    let task: Task = serde_json::from_value(serde_json::json!({
      "id": 8,
      "name": "Prune",
      "project": 1,
      "status": "todo",
      "priority": "low",
      "due_date": "2024-06-01",
      "estimated_hours": "3.00",
      "progress": 0
    }))
    .expect("task");

    let mut form = TaskForm::from_task(&task);
    assert_eq!(form.due_date, "2024-06-01");
    form.due_date.clear();
    form.estimated_hours.clear();

    let body = serde_json::to_value(form.to_patch().expect("valid"))
      .expect("patch encodes");
    assert_eq!(body["due_date"], serde_json::Value::Null);
    assert_eq!(body["estimated_hours"], serde_json::Value::Null);
    let keys = body.as_object().expect("object");
    assert!(keys.contains_key("due_date"));
    assert!(keys.contains_key("estimated_hours"));

    let project: Project = serde_json::from_value(serde_json::json!({
      "id": 4,
      "name": "Garden",
      "category": 2,
      "start_date": "2024-05-01"
    }))
    .expect("project");
    let mut form = ProjectForm::from_project(&project);
    form.start_date.clear();
    let patch = form.to_patch().expect("valid");
    assert_eq!(patch.start_date, Some(None));
  }

  #[test]
  fn task_start_date_cannot_follow_due_date() {
    let mut form = TaskForm {
      name: "Prune".to_string(),
      start_date: "2024-06-10".to_string(),
      due_date: "2024-06-01".to_string(),
      ..TaskForm::for_project(1)
    };
    let errors = form.validate().expect_err("reversed dates");
    assert_eq!(
      errors.get("due_date"),
      Some("Start date cannot be after due date")
    );
    assert_eq!(errors.get("start_date"), None);

    form.due_date = "2024-06-10".to_string();
    assert!(form.validate().is_ok());
  }

  #[test]
  fn project_start_date_cannot_follow_due_date() {
    let mut form = ProjectForm {
      name: "Garden".to_string(),
      category: Some(2),
      start_date: "2024-06-10".to_string(),
      due_date: "2024-06-01".to_string(),
      ..ProjectForm::default()
    };
    let errors = form.validate().expect_err("reversed dates");
    assert_eq!(
      errors.get("due_date"),
      Some("Start date cannot be after due date")
    );

    form.start_date.clear();
    assert!(form.validate().is_ok());
  }
}
