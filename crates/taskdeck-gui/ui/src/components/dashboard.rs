use std::rc::Rc;

use chrono::{Local, NaiveDate};
use taskdeck_core::api::{ApiError, ErrorKind};
use taskdeck_shared::{DashboardSummary, Task};
use yew::{Callback, Html, MouseEvent, Properties, function_component, html, use_effect_with, use_state};
use yew_router::prelude::Link;

use super::list::use_view_lifetime;
use crate::api::Services;
use crate::app::Route;

#[derive(Properties, PartialEq)]
pub struct DashboardPageProps {
    pub services: Services,
}

#[derive(Clone, PartialEq)]
struct Overview {
    summary: DashboardSummary,
    due_today: Vec<Task>,
    overdue: Vec<Task>,
}

#[derive(Clone, PartialEq)]
enum Load {
    Loading,
    Ready(Overview),
    Failed(String),
}

async fn fetch(services: &Services) -> Result<Overview, ApiError> {
    let gateway = &services.gateway;
    Ok(Overview {
        summary: gateway.project_dashboard().await?,
        due_today: gateway.tasks_due_today().await?,
        overdue: gateway.overdue_tasks().await?,
    })
}

#[function_component(DashboardPage)]
pub fn dashboard_page(props: &DashboardPageProps) -> Html {
    let load = use_state(|| Load::Loading);
    let lifetime = use_view_lifetime();
    let reload_tick = use_state(|| 0_u64);

    {
        let load = load.setter();
        let services = props.services.clone();
        let lifetime = Rc::clone(&lifetime);
        use_effect_with(*reload_tick, move |tick| {
            tracing::debug!(tick, "loading dashboard");
            wasm_bindgen_futures::spawn_local(async move {
                let result = fetch(&services).await;
                if !lifetime.is_alive() {
                    tracing::debug!("dashboard unmounted; dropping response");
                    return;
                }
                match result {
                    Ok(overview) => load.set(Load::Ready(overview)),
                    Err(err) => {
                        if err.kind() == ErrorKind::Auth {
                            services.report(&err, "");
                        }
                        load.set(Load::Failed(err.user_message("Failed to load dashboard")));
                    }
                }
            });
            || ()
        });
    }

    let on_retry = {
        let load = load.clone();
        let reload_tick = reload_tick.clone();
        Callback::from(move |_: MouseEvent| {
            load.set(Load::Loading);
            reload_tick.set(*reload_tick + 1);
        })
    };

    let today = Local::now().date_naive();

    match &*load {
        Load::Loading => html! { <div class="panel">{ "Loading dashboard…" }</div> },
        Load::Failed(message) => html! {
            <div class="panel">
                <div class="form-error">{ message.clone() }</div>
                <button class="btn" onclick={on_retry}>{ "Try Again" }</button>
            </div>
        },
        Load::Ready(overview) => render_overview(overview, today),
    }
}

fn stat(label: &str, value: u64) -> Html {
    html! {
        <div class="panel">
            <div style="color:var(--muted);">{ label.to_string() }</div>
            <div style="font-size:1.6rem;font-weight:700;">{ value }</div>
        </div>
    }
}

fn render_overview(overview: &Overview, today: NaiveDate) -> Html {
    let projects = &overview.summary.projects;
    let tasks = &overview.summary.tasks;

    html! {
        <>
            <div class="header">{ "Dashboard" }</div>
            <div class="stats">
                { stat("Projects", projects.total) }
                { stat("Active projects", projects.active) }
                { stat("Completed projects", projects.completed) }
                { stat("Overdue projects", projects.overdue) }
                { stat("Tasks", tasks.total) }
                { stat("To do", tasks.todo) }
                { stat("In progress", tasks.in_progress) }
                { stat("Completed tasks", tasks.completed) }
            </div>
            {
                match &overview.summary.categories {
                    Some(categories) => html! {
                        <div class="panel">
                            <Link<Route> to={Route::Categories}>
                                { format!("{} categories", categories.total) }
                            </Link<Route>>
                        </div>
                    },
                    None => html! {},
                }
            }
            { task_panel("Due today", &overview.due_today, today) }
            { task_panel("Overdue", &overview.overdue, today) }
        </>
    }
}

fn task_panel(title: &str, tasks: &[Task], today: NaiveDate) -> Html {
    html! {
        <div class="panel">
            <div class="header">
                <span>{ title.to_string() }</span>
                <span class="badge">{ tasks.len() }</span>
            </div>
            {
                if tasks.is_empty() {
                    html! { <div style="color:var(--muted);">{ "Nothing here." }</div> }
                } else {
                    html! {
                        <table>
                            <tbody>
                                {
                                    for tasks.iter().map(|task| {
                                        let due = task
                                            .days_until_due(today)
                                            .map(describe_due)
                                            .unwrap_or_default();
                                        html! {
                                            <tr key={task.id}>
                                                <td>
                                                    <Link<Route> to={Route::ProjectDetail { id: task.effective_project_id() }}>
                                                        { task.name.clone() }
                                                    </Link<Route>>
                                                </td>
                                                <td>{ task.status.label() }</td>
                                                <td>{ task.priority.label() }</td>
                                                <td class={task.is_overdue_on(today).then_some("overdue")}>{ due }</td>
                                            </tr>
                                        }
                                    })
                                }
                            </tbody>
                        </table>
                    }
                }
            }
        </div>
    }
}

fn describe_due(days: i64) -> String {
    match days {
        0 => "Due today".to_string(),
        1 => "Due tomorrow".to_string(),
        d if d < 0 => format!("{} days overdue", -d),
        d => format!("Due in {d} days"),
    }
}
