use std::rc::Rc;

use serde_json::{Value, json};
use taskdeck_core::api::{ApiError, Categories, Gateway, Method};
use taskdeck_core::session::SessionStore;
use taskdeck_core::sync::{DeleteRequest, EntityList, MutationError, TaskBoard};
use taskdeck_core::table::{TaskColumn, TaskTable};
use taskdeck_core::testing::{FakeTransport, category_json, task_json};
use taskdeck_core::theme::{MemoryStorage, PreferenceStorage, THEME_KEY, Theme, ThemeStore};
use taskdeck_shared::{CategoryCreate, CategoryPatch, LoginRequest, Task, TaskFilters, TaskStatus};

fn backend_with(fake: FakeTransport) -> (Rc<FakeTransport>, Gateway<Rc<FakeTransport>>) {
    let backend = Rc::new(fake);
    let gateway = Gateway::new(Rc::clone(&backend));
    (backend, gateway)
}

fn backend() -> (Rc<FakeTransport>, Gateway<Rc<FakeTransport>>) {
    backend_with(FakeTransport::new())
}

fn calls(backend: &FakeTransport) -> Vec<(Method, String)> {
    backend
        .requests()
        .into_iter()
        .map(|request| (request.method, request.path))
        .collect()
}

fn tasks(values: Vec<Value>) -> Vec<Task> {
    serde_json::from_value(Value::Array(values)).expect("tasks")
}

#[tokio::test]
async fn every_mutation_leaves_the_list_equal_to_a_fresh_fetch() {
    let (backend, gateway) = backend();
    let list: EntityList<Categories, _> = EntityList::new(gateway);

    backend.reply(200, json!([category_json(1, "Home")]));
    list.refresh().await.expect("initial fetch");

    backend.reply(201, category_json(2, "Work"));
    backend.reply(200, json!([category_json(1, "Home"), category_json(2, "Work")]));
    list.create(&CategoryCreate {
        name: "Work".to_string(),
        description: None,
        color: "#3B82F6".to_string(),
    })
    .await
    .expect("create");
    assert_eq!(list.items().len(), 2);

    backend.reply(200, category_json(2, "Office"));
    backend.reply(
        200,
        json!({"count": 2, "results": [category_json(1, "Home"), category_json(2, "Office")]}),
    );
    let patch = CategoryPatch {
        name: Some("Office".to_string()),
        ..CategoryPatch::default()
    };
    list.update(2, &patch).await.expect("update");
    assert_eq!(list.find(2).map(|c| c.name), Some("Office".to_string()));

    backend.reply(204, Value::Null);
    backend.reply(200, json!([category_json(1, "Home")]));
    let confirmed = DeleteRequest::new(2, "Office").confirm();
    list.delete(confirmed).await.expect("delete");

    let after_mutations = list.items();
    backend.reply(200, json!([category_json(1, "Home")]));
    list.refresh().await.expect("fresh fetch");
    assert_eq!(after_mutations, list.items());

    let methods: Vec<Method> = calls(&backend).into_iter().map(|(m, _)| m).collect();
    assert_eq!(
        methods,
        vec![
            Method::Get,
            Method::Post,
            Method::Get,
            Method::Patch,
            Method::Get,
            Method::Delete,
            Method::Get,
            Method::Get,
        ]
    );
}

#[tokio::test]
async fn double_toggle_sends_one_patch() {
    let (backend, gateway) = backend_with(FakeTransport::yielding());
    let board = TaskBoard::new(gateway, &TaskFilters::default());

    backend.reply(200, json!([task_json(7, "todo", 0)]));
    board.tasks().refresh().await.expect("load");

    backend.reply(200, task_json(7, "completed", 100));
    backend.reply(200, json!([task_json(7, "completed", 100)]));

    let (first, second) = tokio::join!(board.toggle_completion(7), board.toggle_completion(7));

    let toggled = first.expect("first toggle");
    assert_eq!(toggled.status, TaskStatus::Completed);
    assert!(matches!(second, Err(MutationError::Busy { .. })));

    let patches = calls(&backend)
        .into_iter()
        .filter(|(method, _)| *method == Method::Patch)
        .count();
    assert_eq!(patches, 1);
    assert!(!board.is_toggling(7));
}

#[tokio::test]
async fn toggling_twice_restores_the_original_state() {
    let (backend, gateway) = backend();
    let board = TaskBoard::new(gateway, &TaskFilters::default());

    backend.reply(200, json!([task_json(3, "todo", 0)]));
    board.tasks().refresh().await.expect("load");

    backend.reply(200, task_json(3, "completed", 100));
    backend.reply(200, json!([task_json(3, "completed", 100)]));
    let done = board.toggle_completion(3).await.expect("complete");
    assert_eq!((done.status, done.progress), (TaskStatus::Completed, 100));

    backend.reply(200, task_json(3, "todo", 0));
    backend.reply(200, json!([task_json(3, "todo", 0)]));
    let reopened = board.toggle_completion(3).await.expect("reopen");
    assert_eq!((reopened.status, reopened.progress), (TaskStatus::Todo, 0));

    let bodies: Vec<Value> = backend
        .requests()
        .into_iter()
        .filter(|request| request.method == Method::Patch)
        .filter_map(|request| request.body)
        .collect();
    assert_eq!(
        bodies,
        vec![
            json!({"status": "completed", "progress": 100}),
            json!({"status": "todo", "progress": 0}),
        ]
    );
}

#[tokio::test]
async fn deleting_a_vanished_task_drops_its_row() {
    let (backend, gateway) = backend();
    let board = TaskBoard::new(gateway, &TaskFilters::default());

    backend.reply(200, json!([task_json(7, "todo", 0), task_json(8, "todo", 0)]));
    board.tasks().refresh().await.expect("load");

    backend.reply(404, json!({"detail": "Not found."}));
    backend.reply(200, json!([task_json(8, "todo", 0)]));
    let err = board
        .tasks()
        .delete(DeleteRequest::new(7, "Task 7").confirm())
        .await
        .expect_err("already gone");

    assert_eq!(err.user_message("Failed to delete task"), "Not found.");
    assert!(board.tasks().find(7).is_none());
    assert_eq!(
        calls(&backend),
        vec![
            (Method::Get, "/tasks/".to_string()),
            (Method::Delete, "/tasks/7/".to_string()),
            (Method::Get, "/tasks/".to_string()),
        ]
    );
}

#[test]
fn status_filter_keeps_server_order() {
    let rows = tasks(vec![
        task_json(1, "review", 80),
        task_json(2, "todo", 0),
        task_json(3, "review", 90),
        task_json(4, "review", 10),
    ]);
    let mut table = TaskTable::new(10);
    table.set_status_filter(Some(TaskStatus::Review));

    let ids: Vec<i64> = table.view(&rows).rows.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![1, 3, 4]);
}

#[test]
fn progress_sort_cycles_through_both_directions() {
    let rows = tasks(vec![task_json(1, "todo", 40), task_json(2, "todo", 0), task_json(3, "todo", 100)]);
    let mut table = TaskTable::new(10);
    let progress = |table: &TaskTable| -> Vec<u8> {
        table.view(&rows).rows.iter().map(|t| t.progress).collect()
    };

    table.toggle_sort(TaskColumn::Progress);
    assert_eq!(progress(&table), vec![0, 40, 100]);
    table.toggle_sort(TaskColumn::Progress);
    assert_eq!(progress(&table), vec![100, 40, 0]);
    table.toggle_sort(TaskColumn::Progress);
    assert_eq!(progress(&table), vec![40, 0, 100]);
}

#[tokio::test]
async fn login_failures_surface_the_backend_message() {
    let (backend, gateway) = backend();
    let session = SessionStore::new(gateway);
    let request = LoginRequest {
        email: "a@b.co".to_string(),
        password: "hunter22".to_string(),
    };

    backend.reply(400, json!({"non_field_errors": ["bad creds"]}));
    assert!(session.login(&request).await.is_err());
    assert_eq!(session.snapshot().last_error.as_deref(), Some("bad creds"));

    backend.reply(400, json!({"email": ["Invalid"]}));
    assert!(session.login(&request).await.is_err());
    let state = session.snapshot();
    assert_eq!(state.last_error.as_deref(), Some("email: Invalid"));
    assert!(!state.authenticated);
}

#[tokio::test]
async fn logout_clears_the_session_even_when_the_network_fails() {
    let (backend, gateway) = backend();
    let session = SessionStore::new(gateway);

    backend.reply(200, json!({"user": {"id": 1, "username": "ada", "email": "a@b.co"}}));
    session.probe().await.expect("session restored");
    assert!(session.is_authenticated());

    backend.fail_network("connection reset");
    let remote = session.logout().await;

    assert!(matches!(remote, Err(ApiError::Network(_))));
    let state = session.snapshot();
    assert!(!state.authenticated);
    assert!(state.user.is_none());
}

#[test]
fn stored_theme_wins_over_the_system_preference() {
    let storage = Rc::new(MemoryStorage::new());
    {
        let mut first = ThemeStore::load(Rc::clone(&storage), || false);
        assert_eq!(first.toggle(), Theme::Dark);
    }

    let restored = ThemeStore::load(Rc::clone(&storage), || {
        panic!("system preference consulted despite a stored theme")
    });
    assert_eq!(restored.theme(), Theme::Dark);
    assert_eq!(storage.load(THEME_KEY).as_deref(), Some("dark"));
}
