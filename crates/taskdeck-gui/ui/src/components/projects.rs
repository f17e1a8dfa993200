use std::rc::Rc;

use taskdeck_core::api::{ErrorKind, HttpTransport, Projects};
use taskdeck_core::forms::{FieldErrors, ProjectForm};
use taskdeck_core::sync::{Action, ConfirmedDelete, DeleteRequest, EntityList, MutationKey, ViewLifetime};
use taskdeck_shared::{
    Category, Priority, Project, ProjectCreate, ProjectFilters, ProjectId, ProjectPatch, ProjectStatus, TaskFilters,
};
use yew::{
    Callback, Html, MouseEvent, Properties, UseStateHandle, function_component, html, use_effect_with, use_state,
};
use yew_router::prelude::Link;

use super::confirm::ConfirmDialog;
use super::form::{Modal, SelectField, TextAreaField, TextField, bind, field_error};
use super::list::{ListHandle, ListOwner, list_status, use_entity_list, use_view_lifetime};
use super::tasks::TasksPanel;
use crate::api::Services;
use crate::app::Route;

type ProjectList = ListHandle<Projects, EntityList<Projects, HttpTransport>>;

fn enum_options<T: Copy>(all: &[T], value: fn(T) -> &'static str, label: fn(T) -> &'static str) -> Vec<(String, String)> {
    all.iter()
        .map(|item| (value(*item).to_string(), label(*item).to_string()))
        .collect()
}

fn with_any(mut options: Vec<(String, String)>, any: &str) -> Vec<(String, String)> {
    options.insert(0, (String::new(), any.to_string()));
    options
}

fn category_options(categories: &[Category]) -> Vec<(String, String)> {
    categories
        .iter()
        .map(|category| (category.id.to_string(), category.name.clone()))
        .collect()
}

/// Active categories for the filter bar and the project form.
fn load_categories(services: &Services, lifetime: ViewLifetime, target: UseStateHandle<Vec<Category>>) {
    let services = services.clone();
    wasm_bindgen_futures::spawn_local(async move {
        let result = services.gateway.list_active_categories().await;
        if !lifetime.is_alive() {
            return;
        }
        match result {
            Ok(categories) => target.set(categories),
            Err(err) => services.report(&err, "Failed to load categories"),
        }
    });
}

#[derive(Properties, PartialEq)]
pub struct ProjectsPageProps {
    pub services: Services,
}

#[derive(Clone, PartialEq)]
enum Editor {
    New,
    Edit(Project),
}

impl Editor {
    fn key(&self) -> MutationKey {
        match self {
            Editor::New => MutationKey::new(None, Action::Create),
            Editor::Edit(project) => MutationKey::new(Some(project.id), Action::Update),
        }
    }
}

#[function_component(ProjectsPage)]
pub fn projects_page(props: &ProjectsPageProps) -> Html {
    let services = props.services.clone();
    let list: ProjectList = use_entity_list(&services, EntityList::new);
    let categories = use_state(Vec::<Category>::new);
    let filters = use_state(ProjectFilters::default);
    let editor = use_state(|| None::<Editor>);
    let editor_error = use_state(|| None::<String>);
    let pending_delete = use_state(|| None::<DeleteRequest>);

    {
        let services = services.clone();
        let categories = categories.clone();
        let lifetime = list.owner.entity_list().lifetime();
        use_effect_with((), move |_| {
            load_categories(&services, lifetime, categories);
            || ()
        });
    }

    let set_filter = |apply: fn(&mut ProjectFilters, String)| {
        let filters = filters.clone();
        let list = list.clone();
        let services = services.clone();
        Callback::from(move |value: String| {
            let mut next = (*filters).clone();
            apply(&mut next, value);
            if next == *filters {
                return;
            }
            list.owner.entity_list().set_query(next.to_query());
            list.reload(&services);
            filters.set(next);
        })
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
        Callback::from(move |payload: ProjectCreate| {
            let Some(current) = (*editor).clone() else {
                return;
            };
            let services = services.clone();
            let editor = editor.clone();
            let editor_error = editor_error.clone();
            let on_done = move |result: Result<Project, _>| match result {
                Ok(saved) => {
                    services.success(format!("Project \"{}\" saved", saved.name));
                    editor.set(None);
                }
                Err(err) => {
                    editor_error.set(Some(services.report_mutation(&err, "Failed to save project")));
                }
            };
            match current {
                Editor::New => list.run(
                    current.key(),
                    move |owner| async move { owner.entity_list().create(&payload).await },
                    on_done,
                ),
                Editor::Edit(ref project) => {
                    let id = project.id;
                    let patch = ProjectPatch::from(payload);
                    list.run(
                        current.key(),
                        move |owner| async move { owner.entity_list().update(id, &patch).await },
                        on_done,
                    )
                }
            }
        })
    };

    let on_confirm_delete = {
        let list = list.clone();
        let services = services.clone();
        let pending_delete = pending_delete.clone();
        Callback::from(move |confirmed: ConfirmedDelete| {
            let services = services.clone();
            let pending_delete = pending_delete.clone();
            list.run(
                MutationKey::new(Some(confirmed.id()), Action::Delete),
                move |owner| async move { owner.entity_list().delete(confirmed).await },
                move |result| {
                    pending_delete.set(None);
                    match result {
                        Ok(()) => services.success("Project deleted"),
                        Err(err) => {
                            services.report_mutation(&err, "Failed to delete project");
                        }
                    }
                },
            );
        })
    };

    let new_project = {
        let open_editor = open_editor.clone();
        Callback::from(move |_: MouseEvent| open_editor.emit(Editor::New))
    };

    let state = &*list.state;
    let status_options = with_any(
        enum_options(ProjectStatus::ALL, ProjectStatus::as_str, ProjectStatus::label),
        "All statuses",
    );
    let priority_options = with_any(
        enum_options(Priority::ALL, Priority::as_str, Priority::label),
        "All priorities",
    );
    let category_filter_options = with_any(category_options(&categories), "All categories");

    html! {
        <>
            <div class="panel">
                <div class="header">
                    <span>{ "Projects" }</span>
                    <button class="btn primary" onclick={new_project}>{ "New project" }</button>
                </div>
                <div style="display:flex;gap:12px;flex-wrap:wrap;">
                    <TextField
                        label="Search"
                        value={filters.search.clone().unwrap_or_default()}
                        placeholder="Search projects…"
                        on_change={set_filter(|f, v| f.search = Some(v).filter(|s| !s.trim().is_empty()))}
                    />
                    <SelectField
                        label="Status"
                        value={filters.status.map(|s| s.as_str().to_string()).unwrap_or_default()}
                        options={status_options}
                        on_change={set_filter(|f, v| f.status = ProjectStatus::parse_lenient(&v).ok())}
                    />
                    <SelectField
                        label="Priority"
                        value={filters.priority.map(|p| p.as_str().to_string()).unwrap_or_default()}
                        options={priority_options}
                        on_change={set_filter(|f, v| f.priority = v.parse().ok())}
                    />
                    <SelectField
                        label="Category"
                        value={filters.category.map(|id| id.to_string()).unwrap_or_default()}
                        options={category_filter_options}
                        on_change={set_filter(|f, v| f.category = v.parse().ok())}
                    />
                </div>
                { list_status(state, "projects", on_retry) }
                if !state.items.is_empty() {
                    <table>
                        <thead>
                            <tr>
                                <th>{ "Name" }</th>
                                <th>{ "Category" }</th>
                                <th>{ "Status" }</th>
                                <th>{ "Priority" }</th>
                                <th>{ "Due" }</th>
                                <th>{ "Progress" }</th>
                                <th></th>
                            </tr>
                        </thead>
                        <tbody>
                            {
                                for state.items.iter().map(|project| {
                                    let deleting = list.is_pending(MutationKey::new(Some(project.id), Action::Delete));
                                    let on_edit = {
                                        let open_editor = open_editor.clone();
                                        let project = project.clone();
                                        Callback::from(move |_: MouseEvent| open_editor.emit(Editor::Edit(project.clone())))
                                    };
                                    let on_delete = {
                                        let pending_delete = pending_delete.clone();
                                        let request = DeleteRequest::new(project.id, project.name.clone());
                                        Callback::from(move |_: MouseEvent| pending_delete.set(Some(request.clone())))
                                    };
                                    html! {
                                        <tr key={project.id}>
                                            <td>
                                                <Link<Route> to={Route::ProjectDetail { id: project.id }}>{ project.name.clone() }</Link<Route>>
                                            </td>
                                            <td>{ project.category_details.as_ref().map(|c| c.name.clone()).unwrap_or_default() }</td>
                                            <td><span class="badge">{ project.status.label() }</span></td>
                                            <td>{ project.priority.label() }</td>
                                            <td class={project.is_overdue.then_some("overdue")}>
                                                { project.due_date.map(|d| d.to_string()).unwrap_or_default() }
                                            </td>
                                            <td>{ progress_label(project) }</td>
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
                }
            </div>
            {
                match &*editor {
                    Some(current) => {
                        let (title, initial) = match current {
                            Editor::New => ("New project", ProjectForm::default()),
                            Editor::Edit(project) => ("Edit project", ProjectForm::from_project(project)),
                        };
                        let editor = editor.clone();
                        html! {
                            <ProjectModal
                                title={title}
                                initial={initial}
                                categories={(*categories).clone()}
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

/// Server-computed numbers only; nothing is derived from task lists here.
fn progress_label(project: &Project) -> String {
    format!(
        "{:.0}% ({}/{})",
        project.progress_percentage, project.completed_task_count, project.task_count
    )
}

#[derive(Properties, PartialEq)]
struct ProjectModalProps {
    title: &'static str,
    initial: ProjectForm,
    categories: Vec<Category>,
    busy: bool,
    error: Option<String>,
    on_submit: Callback<ProjectCreate>,
    on_cancel: Callback<()>,
}

#[function_component(ProjectModal)]
fn project_modal(props: &ProjectModalProps) -> Html {
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

    let mut category_choices = with_any(category_options(&props.categories), "Select a category");
    // An inactive category is missing from the active list but still valid
    // for a project that already uses it.
    if let Some(id) = form.category
        && !props.categories.iter().any(|category| category.id == id)
    {
        category_choices.push((id.to_string(), format!("Category #{id}")));
    }

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
                label="Category"
                value={form.category.map(|id| id.to_string()).unwrap_or_default()}
                options={category_choices}
                on_change={bind(&form, |f, v| f.category = v.parse().ok())}
                error={field_error(&errors, "category")}
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
                    options={enum_options(Priority::ALL, Priority::as_str, Priority::label)}
                    on_change={bind(&form, |f, v| f.priority = v)}
                    error={field_error(&errors, "priority")}
                />
                <SelectField
                    label="Status"
                    value={form.status.clone()}
                    options={enum_options(ProjectStatus::ALL, ProjectStatus::as_str, ProjectStatus::label)}
                    on_change={bind(&form, |f, v| f.status = v)}
                    error={field_error(&errors, "status")}
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

#[derive(Properties, PartialEq)]
pub struct ProjectDetailPageProps {
    pub services: Services,
    pub id: ProjectId,
}

#[derive(Clone, PartialEq)]
enum Detail {
    Loading,
    Ready(Project),
    Missing,
    Failed(String),
}

/// One project with its tasks. Any task change re-fetches the project so
/// its server-side counts and percentage stay current.
#[function_component(ProjectDetailPage)]
pub fn project_detail_page(props: &ProjectDetailPageProps) -> Html {
    let detail = use_state(|| Detail::Loading);
    let reload_tick = use_state(|| 0_u64);
    let lifetime = use_view_lifetime();

    {
        let detail = detail.setter();
        let services = props.services.clone();
        let lifetime = Rc::clone(&lifetime);
        use_effect_with((props.id, *reload_tick), move |(id, _)| {
            let id = *id;
            wasm_bindgen_futures::spawn_local(async move {
                let result = services.gateway.get_project(id).await;
                if !lifetime.is_alive() {
                    return;
                }
                match result {
                    Ok(project) => detail.set(Detail::Ready(project)),
                    Err(err) if err.kind() == ErrorKind::NotFound => detail.set(Detail::Missing),
                    Err(err) => {
                        if err.kind() == ErrorKind::Auth {
                            services.report(&err, "");
                        }
                        detail.set(Detail::Failed(err.user_message("Failed to load project")));
                    }
                }
            });
            || ()
        });
    }

    let reload = {
        let reload_tick = reload_tick.clone();
        Callback::from(move |()| reload_tick.set(*reload_tick + 1))
    };

    match &*detail {
        Detail::Loading => html! { <div class="panel">{ "Loading project…" }</div> },
        Detail::Missing => html! {
            <div class="panel">
                <div class="form-error">{ "This project no longer exists." }</div>
                <Link<Route> to={Route::Projects}>{ "Back to projects" }</Link<Route>>
            </div>
        },
        Detail::Failed(message) => {
            let reload = reload.clone();
            html! {
                <div class="panel">
                    <div class="form-error">{ message.clone() }</div>
                    <button class="btn" onclick={move |_| reload.emit(())}>{ "Try Again" }</button>
                </div>
            }
        }
        Detail::Ready(project) => {
            let filters = TaskFilters {
                project: Some(project.id),
                ..TaskFilters::default()
            };
            html! {
                <>
                    <div class="panel">
                        <div class="header">
                            <span>{ project.name.clone() }</span>
                            <span class="badge">{ project.status.label() }</span>
                        </div>
                        {
                            match &project.description {
                                Some(description) if !description.is_empty() => html! { <p>{ description.clone() }</p> },
                                _ => html! {},
                            }
                        }
                        <div class="stats">
                            <div>{ format!("Priority: {}", project.priority.label()) }</div>
                            <div>{ format!("Category: {}", project.category_details.as_ref().map(|c| c.name.clone()).unwrap_or_default()) }</div>
                            <div class={project.is_overdue.then_some("overdue")}>
                                { format!("Due: {}", project.due_date.map(|d| d.to_string()).unwrap_or_else(|| "not set".to_string())) }
                            </div>
                            <div>{ format!("Progress: {}", progress_label(project)) }</div>
                        </div>
                    </div>
                    <TasksPanel
                        key={project.id}
                        services={props.services.clone()}
                        filters={filters}
                        default_project={Some(project.id)}
                        on_changed={reload}
                    />
                </>
            }
        }
    }
}
