mod auth;
mod categories;
mod confirm;
mod dashboard;
mod form;
mod list;
mod projects;
mod tasks;
mod toasts;

pub use auth::{LoginPage, RegisterPage};
pub use categories::CategoriesPage;
pub use dashboard::DashboardPage;
pub use projects::{ProjectDetailPage, ProjectsPage};
pub use tasks::TasksPage;
pub use toasts::ToastStack;
