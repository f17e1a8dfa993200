use chrono::Local;
use taskdeck_core::api::{HttpTransport, Tasks};
use taskdeck_core::forms::{FieldErrors, TaskForm};
use taskdeck_core::sync::{Action, ConfirmedDelete, DeleteRequest, MutationKey, TaskBoard};
use taskdeck_core::table::{SortDirection, TaskColumn, TaskTable};
use taskdeck_shared::{
    Priority, Project, ProjectFilters, ProjectId, Task, TaskCreate, TaskFilters, TaskPatch, TaskStatus,
};
use yew::{
    Callback, Html, MouseEvent, Properties, UseStateHandle, function_component, html, use_effect_with, use_state,
};

use super::confirm::ConfirmDialog;
use super::form::{Modal, SelectField, TextAreaField, TextField, bind, field_error};
use super::list::{ListHandle, ListOwner, list_status, use_entity_list};
use crate::api::Services;

type TaskList = ListHandle<Tasks, TaskBoard<HttpTransport>>;

#[derive(Properties, PartialEq)]
pub struct TasksPageProps {
    pub services: Services,
}

#[function_component(TasksPage)]
pub fn tasks_page(props: &TasksPageProps) -> Html {
    html! {
        <TasksPanel services={props.services.clone()} filters={TaskFilters::default()} />
    }
}

#[derive(Properties, PartialEq)]
pub struct TasksPanelProps {
    pub services: Services,
    /// Server-side filters, fixed for the lifetime of the panel.
    pub filters: TaskFilters,
    /// Pre-selected project for new tasks.
    #[prop_or_default]
    pub default_project: Option<ProjectId>,
    /// Fired after any successful change to a task.
    #[prop_or_default]
    pub on_changed: Option<Callback<()>>,
}

#[derive(Clone, PartialEq)]
enum Editor {
    New,
    Edit(Task),
}

impl Editor {
    fn key(&self) -> MutationKey {
        match self {
            Editor::New => MutationKey::new(None, Action::Create),
            Editor::Edit(task) => MutationKey::new(Some(task.id), Action::Update),
        }
    }
}

fn status_options() -> Vec<(String, String)> {
    TaskStatus::ALL
        .iter()
        .map(|status| (status.as_str().to_string(), status.label().to_string()))
        .collect()
}

fn priority_options() -> Vec<(String, String)> {
    Priority::ALL
        .iter()
        .map(|priority| (priority.as_str().to_string(), priority.label().to_string()))
        .collect()
}

fn with_all(mut options: Vec<(String, String)>, label: &str) -> Vec<(String, String)> {
    options.insert(0, (String::new(), label.to_string()));
    options
}

fn sort_marker(direction: Option<SortDirection>) -> &'static str {
    match direction {
        Some(SortDirection::Ascending) => " ▲",
        Some(SortDirection::Descending) => " ▼",
        None => "",
    }
}

/// Applies `change` to a copy of the table state and stores it.
fn update_table(table: &UseStateHandle<TaskTable>, change: impl FnOnce(&mut TaskTable)) {
    let mut next = (**table).clone();
    change(&mut next);
    table.set(next);
}

#[function_component(TasksPanel)]
pub fn tasks_panel(props: &TasksPanelProps) -> Html {
    let services = props.services.clone();
    let list: TaskList = {
        let filters = props.filters.clone();
        use_entity_list(&services, move |gateway| TaskBoard::new(gateway, &filters))
    };
    let table = {
        let page_size = services.page_size;
        use_state(move || TaskTable::new(page_size))
    };
    let projects = use_state(Vec::<Project>::new);
    let editor = use_state(|| None::<Editor>);
    let editor_error = use_state(|| None::<String>);
    let pending_delete = use_state(|| None::<DeleteRequest>);

    {
        let services = services.clone();
        let projects = projects.clone();
        let lifetime = list.owner.entity_list().lifetime();
        use_effect_with((), move |_| {
            wasm_bindgen_futures::spawn_local(async move {
                let result = services.gateway.list_projects(&ProjectFilters::default()).await;
                if !lifetime.is_alive() {
                    return;
                }
                match result {
                    Ok(page) => projects.set(page.results),
                    Err(err) => services.report(&err, "Failed to load projects"),
                }
            });
            || ()
        });
    }

    let changed = {
        let on_changed = props.on_changed.clone();
        move || {
            if let Some(on_changed) = &on_changed {
                on_changed.emit(());
            }
        }
    };

    let on_retry = {
        let list = list.clone();
        let services = services.clone();
        Callback::from(move |_: MouseEvent| list.retry(&services))
    };

    let open_editor = {
        let editor = editor.clone();
        let editor_error = editor_error.clone();
        Callback::from(move |next: Editor| {
            editor_error.set(None);
            editor.set(Some(next));
        })
    };

    let on_save = {
        let list = list.clone();
        let services = services.clone();
        let editor = editor.clone();
        let editor_error = editor_error.clone();
        let changed = changed.clone();
        Callback::from(move |payload: TaskCreate| {
            let Some(current) = (*editor).clone() else {
                return;
            };
            let services = services.clone();
            let editor = editor.clone();
            let editor_error = editor_error.clone();
            let changed = changed.clone();
            let on_done = move |result: Result<Task, _>| match result {
                Ok(saved) => {
                    services.success(format!("Task \"{}\" saved", saved.name));
                    editor.set(None);
                    changed();
                }
                Err(err) => {
                    editor_error.set(Some(services.report_mutation(&err, "Failed to save task")));
                }
            };
            match current {
                Editor::New => list.run(
                    current.key(),
                    move |board| async move { board.entity_list().create(&payload).await },
                    on_done,
                ),
                Editor::Edit(ref task) => {
                    let id = task.id;
                    let patch = TaskPatch::from(payload);
                    list.run(
                        current.key(),
                        move |board| async move { board.entity_list().update(id, &patch).await },
                        on_done,
                    )
                }
            }
        })
    };

    let on_toggle = {
        let list = list.clone();
        let services = services.clone();
        let changed = changed.clone();
        Callback::from(move |id: i64| {
            let services = services.clone();
            let changed = changed.clone();
            list.run(
                MutationKey::new(Some(id), Action::Toggle),
                move |board| async move { board.toggle_completion(id).await },
                move |result| match result {
                    Ok(task) => {
                        let what = if task.is_completed() { "completed" } else { "reopened" };
                        services.success(format!("\"{}\" {what}", task.name));
                        changed();
                    }
                    Err(err) => {
                        services.report_mutation(&err, "Failed to update task");
                    }
                },
            );
        })
    };

    let on_confirm_delete = {
        let list = list.clone();
        let services = services.clone();
        let pending_delete = pending_delete.clone();
        let changed = changed.clone();
        Callback::from(move |confirmed: ConfirmedDelete| {
            let services = services.clone();
            let pending_delete = pending_delete.clone();
            let changed = changed.clone();
            list.run(
                MutationKey::new(Some(confirmed.id()), Action::Delete),
                move |board| async move { board.entity_list().delete(confirmed).await },
                move |result| {
                    pending_delete.set(None);
                    match result {
                        Ok(()) => {
                            services.success("Task deleted");
                            changed();
                        }
                        Err(err) => {
                            services.report_mutation(&err, "Failed to delete task");
                        }
                    }
                },
            );
        })
    };

    let new_task = {
        let open_editor = open_editor.clone();
        Callback::from(move |_: MouseEvent| open_editor.emit(Editor::New))
    };

    let on_search = {
        let table = table.clone();
        Callback::from(move |text: String| update_table(&table, |t| t.set_global_filter(text)))
    };
    let on_status = {
        let table = table.clone();
        Callback::from(move |value: String| update_table(&table, |t| t.set_status_filter(value.parse().ok())))
    };
    let on_priority = {
        let table = table.clone();
        Callback::from(move |value: String| update_table(&table, |t| t.set_priority_filter(value.parse().ok())))
    };

    let state = &*list.state;
    let view = table.view(&state.items);
    let today = Local::now().date_naive();

    let on_previous = {
        let table = table.clone();
        Callback::from(move |_: MouseEvent| update_table(&table, TaskTable::previous_page))
    };
    let on_next = {
        let table = table.clone();
        let list = list.clone();
        Callback::from(move |_: MouseEvent| {
            let items = &list.state.items;
            update_table(&table, |t| t.next_page(items));
        })
    };

    html! {
        <>
            <div class="panel">
                <div class="header">
                    <span>{ "Tasks" }</span>
                    <button class="btn primary" onclick={new_task}>{ "New task" }</button>
                </div>
                <div style="display:flex;gap:12px;flex-wrap:wrap;">
                    <TextField
                        label="Search"
                        value={table.global_filter().to_string()}
                        placeholder="Search tasks…"
                        on_change={on_search}
                    />
                    <SelectField
                        label="Status"
                        value={table.status_filter().map(|s| s.as_str().to_string()).unwrap_or_default()}
                        options={with_all(status_options(), "All statuses")}
                        on_change={on_status}
                    />
                    <SelectField
                        label="Priority"
                        value={table.priority_filter().map(|p| p.as_str().to_string()).unwrap_or_default()}
                        options={with_all(priority_options(), "All priorities")}
                        on_change={on_priority}
                    />
                </div>
                { list_status(state, "tasks", on_retry) }
                if !state.items.is_empty() {
                    <table>
                        <thead>
                            <tr>
                                <th></th>
                                {
                                    for TaskColumn::ALL.iter().map(|column| {
                                        let column = *column;
                                        let marker = sort_marker(table.sort_direction(column));
                                        let table = table.clone();
                                        let onclick = Callback::from(move |_: MouseEvent| {
                                            update_table(&table, |t| t.toggle_sort(column));
                                        });
                                        html! {
                                            <th class="sortable" {onclick}>
                                                { column.header() }
                                                { marker }
                                            </th>
                                        }
                                    })
                                }
                                <th></th>
                            </tr>
                        </thead>
                        <tbody>
                            {
                                for view.rows.iter().map(|task| {
                                    let toggling = list.is_pending(MutationKey::new(Some(task.id), Action::Toggle));
                                    let deleting = list.is_pending(MutationKey::new(Some(task.id), Action::Delete));
                                    let on_check = {
                                        let on_toggle = on_toggle.clone();
                                        let id = task.id;
                                        Callback::from(move |_: MouseEvent| on_toggle.emit(id))
                                    };
                                    let on_edit = {
                                        let open_editor = open_editor.clone();
                                        let task = (*task).clone();
                                        Callback::from(move |_: MouseEvent| open_editor.emit(Editor::Edit(task.clone())))
                                    };
                                    let on_delete = {
                                        let pending_delete = pending_delete.clone();
                                        let request = DeleteRequest::new(task.id, task.name.clone());
                                        Callback::from(move |_: MouseEvent| pending_delete.set(Some(request.clone())))
                                    };
                                    html! {
                                        <tr key={task.id} class={task.is_completed().then_some("done")}>
                                            <td>
                                                <input
                                                    type="checkbox"
                                                    checked={task.is_completed()}
                                                    disabled={toggling}
                                                    onclick={on_check}
                                                />
                                            </td>
                                            <td>{ task.name.clone() }</td>
                                            <td><span class="badge">{ task.status.label() }</span></td>
                                            <td>{ task.priority.label() }</td>
                                            <td>
                                                <div class="progress">
                                                    <div class="progress-fill" style={format!("width:{}%;", task.progress)}></div>
                                                </div>
                                                { format!("{}%", task.progress) }
                                            </td>
                                            <td class={task.is_overdue_on(today).then_some("overdue")}>
                                                { task.due_date.map(|d| d.to_string()).unwrap_or_default() }
                                            </td>
                                            <td>{ task.estimated_hours.map(|h| format!("{h:.1}")).unwrap_or_default() }</td>
                                            <td>
                                                <button class="btn" onclick={on_edit}>{ "Edit" }</button>
                                                <button class="btn danger" disabled={deleting} onclick={on_delete}>{ "Delete" }</button>
                                            </td>
                                        </tr>
                                    }
                                })
                            }
                        </tbody>
                    </table>
                    <div class="footer">
                        <span style="color:var(--muted);">
                            { format!("{} of {} tasks", view.filtered_count, view.total_count) }
                        </span>
                        <button class="btn" disabled={!view.has_previous()} onclick={on_previous}>{ "Previous" }</button>
                        <span>{ format!("Page {} of {}", view.page_index + 1, view.page_count.max(1)) }</span>
                        <button class="btn" disabled={!view.has_next()} onclick={on_next}>{ "Next" }</button>
                    </div>
                }
            </div>
            {
                match &*editor {
                    Some(current) => {
                        let (title, initial) = match current {
                            Editor::New => (
                                "New task",
                                props.default_project.map(TaskForm::for_project).unwrap_or_default(),
                            ),
                            Editor::Edit(task) => ("Edit task", TaskForm::from_task(task)),
                        };
                        let editor = editor.clone();
                        html! {
                            <TaskModal
                                title={title}
                                initial={initial}
                                projects={(*projects).clone()}
                                busy={list.is_pending(current.key())}
                                error={(*editor_error).clone()}
                                on_submit={on_save.clone()}
                                on_cancel={Callback::from(move |()| editor.set(None))}
                            />
                        }
                    }
                    None => html! {},
                }
            }
            {
                match &*pending_delete {
                    Some(request) => {
                        let pending_delete = pending_delete.clone();
                        html! {
                            <ConfirmDialog
                                request={request.clone()}
                                busy={list.is_pending(MutationKey::new(Some(request.id()), Action::Delete))}
                                on_confirm={on_confirm_delete.clone()}
                                on_cancel={Callback::from(move |()| pending_delete.set(None))}
                            />
                        }
                    }
                    None => html! {},
                }
            }
        </>
    }
}

#[derive(Properties, PartialEq)]
struct TaskModalProps {
    title: &'static str,
    initial: TaskForm,
    projects: Vec<Project>,
    busy: bool,
    error: Option<String>,
    on_submit: Callback<TaskCreate>,
    on_cancel: Callback<()>,
}

#[function_component(TaskModal)]
fn task_modal(props: &TaskModalProps) -> Html {
    let form = {
        let initial = props.initial.clone();
        use_state(move || initial)
    };
    let errors = use_state(FieldErrors::new);

    let on_save = {
        let form = form.clone();
        let errors = errors.clone();
        let on_submit = props.on_submit.clone();
        Callback::from(move |_: MouseEvent| match form.validate() {
            Ok(payload) => {
                errors.set(FieldErrors::new());
                on_submit.emit(payload);
            }
            Err(field_errors) => errors.set(field_errors),
        })
    };
    let on_cancel = props.on_cancel.clone();

    let project_choices = with_all(
        props
            .projects
            .iter()
            .map(|project| (project.id.to_string(), project.name.clone()))
            .collect(),
        "Select a project",
    );

    html! {
        <Modal title={props.title} on_close={props.on_cancel.clone()}>
            {
                match &props.error {
                    Some(message) => html! { <div class="form-error">{ message.clone() }</div> },
                    None => html! {},
                }
            }
            <TextField
                label="Name"
                value={form.name.clone()}
                on_change={bind(&form, |f, v| f.name = v)}
                error={field_error(&errors, "name")}
            />
            <TextAreaField
                label="Description"
                value={form.description.clone()}
                on_change={bind(&form, |f, v| f.description = v)}
            />
            <SelectField
                label="Project"
                value={form.project.map(|id| id.to_string()).unwrap_or_default()}
                options={project_choices}
                on_change={bind(&form, |f, v| f.project = v.parse().ok())}
                error={field_error(&errors, "project")}
            />
            <div style="display:flex;gap:12px;">
                <TextField
                    label="Start date"
                    input_type="date"
                    value={form.start_date.clone()}
                    on_change={bind(&form, |f, v| f.start_date = v)}
                    error={field_error(&errors, "start_date")}
                />
                <TextField
                    label="Due date"
                    input_type="date"
                    value={form.due_date.clone()}
                    on_change={bind(&form, |f, v| f.due_date = v)}
                    error={field_error(&errors, "due_date")}
                />
            </div>
            <div style="display:flex;gap:12px;">
                <SelectField
                    label="Priority"
                    value={form.priority.clone()}
                    options={priority_options()}
                    on_change={bind(&form, |f, v| f.priority = v)}
                    error={field_error(&errors, "priority")}
                />
                <SelectField
                    label="Status"
                    value={form.status.clone()}
                    options={status_options()}
                    on_change={bind(&form, |f, v| f.status = v)}
                    error={field_error(&errors, "status")}
                />
            </div>
            <div style="display:flex;gap:12px;">
                <TextField
                    label="Estimated hours"
                    input_type="number"
                    value={form.estimated_hours.clone()}
                    on_change={bind(&form, |f, v| f.estimated_hours = v)}
                    error={field_error(&errors, "estimated_hours")}
                />
                <TextField
                    label="Progress (%)"
                    input_type="number"
                    value={form.progress.clone()}
                    on_change={bind(&form, |f, v| f.progress = v)}
                    error={field_error(&errors, "progress")}
                />
            </div>
            <div class="footer">
                <button class="btn" disabled={props.busy} onclick={move |_| on_cancel.emit(())}>{ "Cancel" }</button>
                <button class="btn primary" disabled={props.busy} onclick={on_save}>
                    { if props.busy { "Saving…" } else { "Save" } }
                </button>
            </div>
        </Modal>
    }
}
