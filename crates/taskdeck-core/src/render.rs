use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use taskdeck_shared::{Category, DashboardSummary, Project, Task, User};
use unicode_width::UnicodeWidthStr;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    /// Colour is used only on a terminal and when `NO_COLOR` is unset.
    pub fn new() -> Self {
        let color = std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();
        Self { color }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    pub fn print_user(&self, user: &User) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "id        {}", user.id)?;
        writeln!(out, "username  {}", user.username)?;
        writeln!(out, "email     {}", user.email)?;
        if let Some(created) = user.created_at {
            writeln!(out, "joined    {}", created.format("%Y-%m-%d"))?;
        }
        Ok(())
    }

    pub fn print_dashboard(&self, summary: &DashboardSummary) -> anyhow::Result<()> {
        self.write_dashboard(io::stdout().lock(), summary)
    }

    pub fn write_dashboard<W: Write>(
        &self,
        mut out: W,
        summary: &DashboardSummary,
    ) -> anyhow::Result<()> {
        let projects = &summary.projects;
        let tasks = &summary.tasks;
        writeln!(
            out,
            "projects  {} total, {} active, {} completed, {} overdue",
            projects.total,
            projects.active,
            projects.completed,
            self.paint_if(projects.overdue > 0, &projects.overdue.to_string(), "31"),
        )?;
        writeln!(
            out,
            "tasks     {} total, {} todo, {} in progress, {} completed",
            tasks.total, tasks.todo, tasks.in_progress, tasks.completed,
        )?;
        if let Some(categories) = &summary.categories {
            writeln!(out, "categories {}", categories.total)?;
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(count = categories.len()))]
    pub fn print_categories(&self, categories: &[Category]) -> anyhow::Result<()> {
        self.write_categories(io::stdout().lock(), categories)
    }

    pub fn write_categories<W: Write>(
        &self,
        out: W,
        categories: &[Category],
    ) -> anyhow::Result<()> {
        let headers = ["ID", "Name", "Color", "Active", "Projects", "Tasks"]
            .map(str::to_string)
            .to_vec();
        let rows = categories
            .iter()
            .map(|category| {
                vec![
                    self.paint(&category.id.to_string(), "33"),
                    category.name.clone(),
                    category.color.clone(),
                    if category.is_active { "yes" } else { "no" }.to_string(),
                    category.project_count.to_string(),
                    category.task_count.to_string(),
                ]
            })
            .collect();
        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip_all, fields(count = projects.len()))]
    pub fn print_projects(&self, projects: &[Project], today: NaiveDate) -> anyhow::Result<()> {
        self.write_projects(io::stdout().lock(), projects, today)
    }

    pub fn write_projects<W: Write>(
        &self,
        out: W,
        projects: &[Project],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let headers = ["ID", "Name", "Category", "Status", "Priority", "Due", "Progress"]
            .map(str::to_string)
            .to_vec();
        let rows = projects
            .iter()
            .map(|project| {
                let category = project
                    .category_details
                    .as_ref()
                    .map(|details| details.name.clone())
                    .unwrap_or_default();
                let overdue = project.due_date.is_some_and(|due| due < today)
                    && project.status != taskdeck_shared::ProjectStatus::Completed;
                vec![
                    self.paint(&project.id.to_string(), "33"),
                    project.name.clone(),
                    category,
                    project.status.label().to_string(),
                    project.priority.label().to_string(),
                    self.paint_if(overdue, &format_due(project.due_date), "31"),
                    format!(
                        "{:.0}% ({}/{})",
                        project.progress_percentage,
                        project.completed_task_count,
                        project.task_count
                    ),
                ]
            })
            .collect();
        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip_all, fields(count = tasks.len()))]
    pub fn print_tasks(&self, tasks: &[Task], today: NaiveDate) -> anyhow::Result<()> {
        self.write_tasks(io::stdout().lock(), tasks, today)
    }

    pub fn write_tasks<W: Write>(
        &self,
        out: W,
        tasks: &[Task],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let headers = ["ID", "Name", "Status", "Priority", "Progress", "Due", "Est."]
            .map(str::to_string)
            .to_vec();
        let rows = tasks
            .iter()
            .map(|task| {
                vec![
                    self.paint(&task.id.to_string(), "33"),
                    task.name.clone(),
                    task.status.label().to_string(),
                    task.priority.label().to_string(),
                    format!("{}%", task.progress),
                    self.paint_if(task.is_overdue_on(today), &format_due(task.due_date), "31"),
                    task.estimated_hours
                        .map(|hours| format!("{hours}h"))
                        .unwrap_or_default(),
                ]
            })
            .collect();
        write_table(out, headers, rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }

    fn paint_if(&self, condition: bool, text: &str, code: &str) -> String {
        if condition {
            self.paint(text, code)
        } else {
            text.to_string()
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

fn format_due(date: Option<NaiveDate>) -> String {
    date.map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(header.as_str()))
        .collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        write!(writer, "{header:width$} ", width = *width)?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
