use std::collections::HashSet;
use std::rc::Rc;

use taskdeck_core::api::{ErrorKind, HttpTransport, Resource, Tasks};
use taskdeck_core::sync::{EntityList, ListState, MutationError, MutationKey, TaskBoard, ViewLifetime};
use yew::{Html, Reducible, UseReducerHandle, UseStateHandle, hook, html, use_effect_with, use_memo, use_reducer, use_state};

use crate::api::{Api, Services};

/// Anything that owns the [`EntityList`] a view renders.
pub trait ListOwner<R: Resource> {
    fn entity_list(&self) -> &EntityList<R, HttpTransport>;
}

impl<R: Resource> ListOwner<R> for EntityList<R, HttpTransport> {
    fn entity_list(&self) -> &EntityList<R, HttpTransport> {
        self
    }
}

impl ListOwner<Tasks> for TaskBoard<HttpTransport> {
    fn entity_list(&self) -> &EntityList<Tasks, HttpTransport> {
        self.tasks()
    }
}

/// Mutations started from this view that have not finished yet; drives
/// the disabled state of their controls.
#[derive(Default, PartialEq)]
pub struct Pending(HashSet<MutationKey>);

pub enum PendingAction {
    Begin(MutationKey),
    End(MutationKey),
}

impl Reducible for Pending {
    type Action = PendingAction;

    fn reduce(self: Rc<Self>, action: Self::Action) -> Rc<Self> {
        let mut keys = self.0.clone();
        match action {
            PendingAction::Begin(key) => {
                keys.insert(key);
            }
            PendingAction::End(key) => {
                keys.remove(&key);
            }
        }
        Rc::new(Self(keys))
    }
}

pub struct ListHandle<R: Resource, O> {
    pub owner: Rc<O>,
    pub state: UseStateHandle<ListState<R::Item>>,
    pending: UseReducerHandle<Pending>,
}

impl<R: Resource, O> Clone for ListHandle<R, O> {
    fn clone(&self) -> Self {
        Self {
            owner: Rc::clone(&self.owner),
            state: self.state.clone(),
            pending: self.pending.clone(),
        }
    }
}

impl<R, O> ListHandle<R, O>
where
    R: Resource + 'static,
    R::Item: 'static,
    O: ListOwner<R> + 'static,
{
    fn alive(&self) -> bool {
        self.owner.entity_list().lifetime().is_alive()
    }

    /// Copies the list's state into the component, unless it unmounted.
    pub fn sync(&self) {
        if self.alive() {
            self.state.set(self.owner.entity_list().snapshot());
        }
    }

    pub fn reload(&self, services: &Services) {
        self.fetch(services, false);
    }

    /// Re-runs the fetch that last failed.
    pub fn retry(&self, services: &Services) {
        self.fetch(services, true);
    }

    fn fetch(&self, services: &Services, retry: bool) {
        self.state.set(self.owner.entity_list().snapshot().begin());
        let handle = self.clone();
        let services = services.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let list = handle.owner.entity_list();
            let result = if retry { list.retry().await } else { list.refresh().await };
            if let Err(err) = result
                && err.kind() == ErrorKind::Auth
            {
                services.report(&err, "");
            }
            handle.sync();
        });
    }

    pub fn is_pending(&self, key: MutationKey) -> bool {
        self.pending.0.contains(&key) || self.owner.entity_list().is_busy(key)
    }

    /// Starts a mutation under `key` and hands its result to `on_done`
    /// once the list has been re-fetched.
    pub fn run<T, Op, Fut, Done>(&self, key: MutationKey, op: Op, on_done: Done)
    where
        T: 'static,
        Op: FnOnce(Rc<O>) -> Fut + 'static,
        Fut: Future<Output = Result<T, MutationError>> + 'static,
        Done: FnOnce(Result<T, MutationError>) + 'static,
    {
        self.pending.dispatch(PendingAction::Begin(key));
        let handle = self.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let result = op(Rc::clone(&handle.owner)).await;
            if !handle.alive() {
                tracing::debug!(%key, "view gone before mutation finished");
                return;
            }
            handle.pending.dispatch(PendingAction::End(key));
            handle.sync();
            on_done(result);
        });
    }
}

/// Builds the list owner once per mount, fetches on mount and marks the
/// list unmounted on teardown.
#[hook]
pub fn use_entity_list<R, O, F>(services: &Services, build: F) -> ListHandle<R, O>
where
    R: Resource + 'static,
    R::Item: 'static,
    O: ListOwner<R> + 'static,
    F: FnOnce(Api) -> O + 'static,
{
    let owner = {
        let gateway = services.gateway.clone();
        use_memo((), move |_| build(gateway))
    };
    let state = use_state(ListState::<R::Item>::default);
    let pending = use_reducer(Pending::default);
    let handle = ListHandle {
        owner,
        state,
        pending,
    };

    {
        let handle = handle.clone();
        let services = services.clone();
        use_effect_with((), move |_| {
            handle.reload(&services);
            let owner = Rc::clone(&handle.owner);
            move || owner.entity_list().unmount()
        });
    }

    handle
}

/// A lifetime that ends when the calling component unmounts. Async work
/// checks it before writing component state.
#[hook]
pub fn use_view_lifetime() -> Rc<ViewLifetime> {
    let lifetime = use_memo((), |_| ViewLifetime::new());
    {
        let lifetime = Rc::clone(&lifetime);
        use_effect_with((), move |_| move || lifetime.end());
    }
    lifetime
}

/// Loading and failure chrome shared by the list pages. A failed fetch
/// keeps showing the previous rows under a retry banner.
pub fn list_status<T>(state: &ListState<T>, noun: &str, on_retry: yew::Callback<yew::MouseEvent>) -> Html {
    if let Some(err) = &state.error {
        return html! {
            <div class="form-error">
                { err.user_message(&format!("Failed to load {noun}")) }
                { " " }
                <button class="btn" onclick={on_retry}>{ "Try Again" }</button>
            </div>
        };
    }
    if state.is_loading() && state.items.is_empty() {
        return html! { <div style="color:var(--muted);">{ format!("Loading {noun}…") }</div> };
    }
    if state.items.is_empty() {
        return html! { <div style="color:var(--muted);">{ format!("No {noun} yet.") }</div> };
    }
    html! {}
}
