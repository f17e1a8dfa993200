use std::cmp::Ordering;

use taskdeck_shared::{Priority, Task, TaskStatus};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskColumn {
    Name,
    Status,
    Priority,
    Progress,
    DueDate,
    EstimatedHours,
}

impl TaskColumn {
    pub const ALL: [TaskColumn; 6] = [
        TaskColumn::Name,
        TaskColumn::Status,
        TaskColumn::Priority,
        TaskColumn::Progress,
        TaskColumn::DueDate,
        TaskColumn::EstimatedHours,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Self::Name => "Task Name",
            Self::Status => "Status",
            Self::Priority => "Priority",
            Self::Progress => "Progress",
            Self::DueDate => "Due Date",
            Self::EstimatedHours => "Est. Hours",
        }
    }

    /// Orders two rows that both have a value in this column.
    fn compare(self, a: &Task, b: &Task) -> Ordering {
        match self {
            Self::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            Self::Status => a.status.cmp(&b.status),
            Self::Priority => a.priority.cmp(&b.priority),
            Self::Progress => a.progress.cmp(&b.progress),
            Self::DueDate => a.due_date.cmp(&b.due_date),
            Self::EstimatedHours => a
                .estimated_hours
                .unwrap_or_default()
                .total_cmp(&b.estimated_hours.unwrap_or_default()),
        }
    }

    fn is_absent(self, task: &Task) -> bool {
        match self {
            Self::DueDate => task.due_date.is_none(),
            Self::EstimatedHours => task.estimated_hours.is_none(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// The page of rows to render plus the numbers for the pager.
#[derive(Debug, Clone, PartialEq)]
pub struct TableView<'a> {
    pub rows: Vec<&'a Task>,
    pub page_index: usize,
    pub page_count: usize,
    pub filtered_count: usize,
    pub total_count: usize,
}

impl TableView<'_> {
    pub fn has_previous(&self) -> bool {
        self.page_index > 0
    }

    pub fn has_next(&self) -> bool {
        self.page_index + 1 < self.page_count
    }
}

/// Client-side search, filter, sort and paging over an already fetched
/// task collection. Holds no tasks itself; every view is recomputed from
/// the full set.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskTable {
    global_filter: String,
    status_filter: Option<TaskStatus>,
    priority_filter: Option<Priority>,
    sort: Option<(TaskColumn, SortDirection)>,
    page_index: usize,
    page_size: usize,
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl TaskTable {
    pub fn new(page_size: usize) -> Self {
        Self {
            global_filter: String::new(),
            status_filter: None,
            priority_filter: None,
            sort: None,
            page_index: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn global_filter(&self) -> &str {
        &self.global_filter
    }

    pub fn status_filter(&self) -> Option<TaskStatus> {
        self.status_filter
    }

    pub fn priority_filter(&self) -> Option<Priority> {
        self.priority_filter
    }

    pub fn sort(&self) -> Option<(TaskColumn, SortDirection)> {
        self.sort
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn set_global_filter(&mut self, text: impl Into<String>) {
        self.global_filter = text.into();
        self.page_index = 0;
    }

    pub fn set_status_filter(&mut self, status: Option<TaskStatus>) {
        self.status_filter = status;
        self.page_index = 0;
    }

    pub fn set_priority_filter(&mut self, priority: Option<Priority>) {
        self.priority_filter = priority;
        self.page_index = 0;
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.page_index = 0;
    }

    /// Unsorted, then ascending, then descending, then unsorted again.
    /// Picking a different column starts over at ascending.
    pub fn toggle_sort(&mut self, column: TaskColumn) {
        self.sort = match self.sort {
            Some((current, SortDirection::Ascending)) if current == column => {
                Some((column, SortDirection::Descending))
            }
            Some((current, SortDirection::Descending)) if current == column => None,
            _ => Some((column, SortDirection::Ascending)),
        };
    }

    pub fn sort_direction(&self, column: TaskColumn) -> Option<SortDirection> {
        match self.sort {
            Some((current, direction)) if current == column => Some(direction),
            _ => None,
        }
    }

    pub fn can_previous(&self) -> bool {
        self.page_index > 0
    }

    pub fn can_next(&self, tasks: &[Task]) -> bool {
        self.page_index + 1 < self.page_count(self.filtered(tasks).len())
    }

    pub fn previous_page(&mut self) {
        self.page_index = self.page_index.saturating_sub(1);
    }

    pub fn next_page(&mut self, tasks: &[Task]) {
        if self.can_next(tasks) {
            self.page_index += 1;
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        if self.status_filter.is_some_and(|status| task.status != status) {
            return false;
        }
        if self
            .priority_filter
            .is_some_and(|priority| task.priority != priority)
        {
            return false;
        }

        let needle = self.global_filter.trim().to_lowercase();
        needle.is_empty() || searchable_values(task).any(|value| value.contains(&needle))
    }

    pub fn view<'a>(&self, tasks: &'a [Task]) -> TableView<'a> {
        let mut rows = self.filtered(tasks);

        if let Some((column, direction)) = self.sort {
            rows.sort_by(|a, b| {
                match (column.is_absent(a), column.is_absent(b)) {
                    (true, true) => return Ordering::Equal,
                    (true, false) => return Ordering::Greater,
                    (false, true) => return Ordering::Less,
                    (false, false) => {}
                }
                let ordering = column.compare(a, b);
                match direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }

        let filtered_count = rows.len();
        let page_count = self.page_count(filtered_count);
        let page_index = self.page_index.min(page_count - 1);
        let rows = rows
            .into_iter()
            .skip(page_index * self.page_size)
            .take(self.page_size)
            .collect();

        TableView {
            rows,
            page_index,
            page_count,
            filtered_count,
            total_count: tasks.len(),
        }
    }

    fn filtered<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        tasks.iter().filter(|task| self.matches(task)).collect()
    }

    fn page_count(&self, rows: usize) -> usize {
        rows.div_ceil(self.page_size).max(1)
    }
}

fn searchable_values(task: &Task) -> impl Iterator<Item = String> + '_ {
    [
        Some(task.name.to_lowercase()),
        Some(task.status.as_str().to_string()),
        Some(task.status.label().to_lowercase()),
        Some(task.priority.as_str().to_string()),
        Some(task.progress.to_string()),
        task.due_date.map(|date| date.to_string()),
        task.estimated_hours.map(|hours| hours.to_string()),
    ]
    .into_iter()
    .flatten()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn task(id: i64, name: &str, status: TaskStatus, progress: u8) -> Task {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": name,
            "project": 1,
            "status": status.as_str(),
            "progress": progress
        }))
        .expect("task")
    }

    fn names<'a>(view: &TableView<'a>) -> Vec<&'a str> {
        view.rows.iter().map(|task| task.name.as_str()).collect()
    }

    #[test]
    fn sort_cycles_through_three_states() {
        let mut table = TaskTable::default();
        assert_eq!(table.sort(), None);
        table.toggle_sort(TaskColumn::Progress);
        assert_eq!(
            table.sort(),
            Some((TaskColumn::Progress, SortDirection::Ascending))
        );
        table.toggle_sort(TaskColumn::Progress);
        assert_eq!(
            table.sort_direction(TaskColumn::Progress),
            Some(SortDirection::Descending)
        );
        table.toggle_sort(TaskColumn::Progress);
        assert_eq!(table.sort(), None);

        table.toggle_sort(TaskColumn::Progress);
        table.toggle_sort(TaskColumn::Name);
        assert_eq!(
            table.sort(),
            Some((TaskColumn::Name, SortDirection::Ascending))
        );
    }

    #[test]
    fn progress_sorts_numerically() {
        let tasks = vec![
            task(1, "a", TaskStatus::InProgress, 40),
            task(2, "b", TaskStatus::Todo, 0),
            task(3, "c", TaskStatus::Completed, 100),
        ];
        let mut table = TaskTable::default();
        table.toggle_sort(TaskColumn::Progress);
        let progress: Vec<u8> = table.view(&tasks).rows.iter().map(|t| t.progress).collect();
        assert_eq!(progress, vec![0, 40, 100]);

        table.toggle_sort(TaskColumn::Progress);
        let progress: Vec<u8> = table.view(&tasks).rows.iter().map(|t| t.progress).collect();
        assert_eq!(progress, vec![100, 40, 0]);
    }

    #[test]
    fn status_filter_keeps_sorted_order() {
        let tasks = vec![
            task(1, "delta", TaskStatus::Completed, 100),
            task(2, "alpha", TaskStatus::Todo, 0),
            task(3, "charlie", TaskStatus::Completed, 100),
            task(4, "bravo", TaskStatus::Review, 80),
            task(5, "echo", TaskStatus::Completed, 100),
        ];
        let mut table = TaskTable::default();
        table.toggle_sort(TaskColumn::Name);
        let sorted = names(&table.view(&tasks));

        table.set_status_filter(Some(TaskStatus::Completed));
        let filtered = names(&table.view(&tasks));
        assert_eq!(filtered, vec!["charlie", "delta", "echo"]);

        let expected: Vec<&str> = sorted
            .into_iter()
            .filter(|name| filtered.contains(name))
            .collect();
        assert_eq!(filtered, expected);
    }

    #[test]
    fn missing_due_dates_sort_last_both_ways() {
        let mut early = task(1, "early", TaskStatus::Todo, 0);
        early.due_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        let undated = task(2, "undated", TaskStatus::Todo, 0);
        let mut late = task(3, "late", TaskStatus::Todo, 0);
        late.due_date = NaiveDate::from_ymd_opt(2024, 6, 1);
        let tasks = vec![undated, late, early];

        let mut table = TaskTable::default();
        table.toggle_sort(TaskColumn::DueDate);
        assert_eq!(names(&table.view(&tasks)), vec!["early", "late", "undated"]);
        table.toggle_sort(TaskColumn::DueDate);
        assert_eq!(names(&table.view(&tasks)), vec!["late", "early", "undated"]);
    }

    #[test]
    fn global_search_is_case_insensitive_across_columns() {
        let mut tasks = vec![
            task(1, "Write report", TaskStatus::Review, 10),
            task(2, "Call plumber", TaskStatus::Todo, 0),
        ];
        tasks[1].due_date = NaiveDate::from_ymd_opt(2024, 3, 15);

        let mut table = TaskTable::default();
        table.set_global_filter("REPORT");
        assert_eq!(names(&table.view(&tasks)), vec!["Write report"]);
        table.set_global_filter("2024-03");
        assert_eq!(names(&table.view(&tasks)), vec!["Call plumber"]);
        table.set_global_filter("review");
        assert_eq!(names(&table.view(&tasks)), vec!["Write report"]);
    }

    #[test]
    fn paging_and_filter_reset() {
        let tasks: Vec<Task> = (1..=23)
            .map(|id| task(id, &format!("task {id:02}"), TaskStatus::Todo, 0))
            .collect();
        let mut table = TaskTable::default();

        let view = table.view(&tasks);
        assert_eq!(view.page_count, 3);
        assert_eq!(view.rows.len(), 10);
        assert!(!table.can_previous());

        table.next_page(&tasks);
        table.next_page(&tasks);
        table.next_page(&tasks);
        let view = table.view(&tasks);
        assert_eq!(view.page_index, 2);
        assert_eq!(view.rows.len(), 3);
        assert!(!view.has_next());

        table.set_priority_filter(Some(Priority::Medium));
        assert_eq!(table.page_index(), 0);

        table.set_global_filter("nothing matches");
        let view = table.view(&tasks);
        assert_eq!(view.page_count, 1);
        assert_eq!(view.filtered_count, 0);
        assert_eq!(view.total_count, 23);
        assert!(view.rows.is_empty());
    }
}
