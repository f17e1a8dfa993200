use taskdeck_core::api::Categories;
use taskdeck_core::forms::{CategoryForm, FieldErrors};
use taskdeck_core::sync::{Action, DeleteRequest, EntityList, MutationKey};
use taskdeck_shared::{Category, CategoryCreate, CategoryPatch};
use yew::{Callback, Html, MouseEvent, Properties, function_component, html, use_state};

use super::confirm::ConfirmDialog;
use super::form::{Modal, TextAreaField, TextField, bind, field_error};
use super::list::{ListHandle, ListOwner, list_status, use_entity_list};
use crate::api::Services;

type CategoryList = ListHandle<Categories, EntityList<Categories, taskdeck_core::api::HttpTransport>>;

#[derive(Properties, PartialEq)]
pub struct CategoriesPageProps {
    pub services: Services,
}

#[derive(Clone, PartialEq)]
enum Editor {
    New,
    Edit(Category),
}

impl Editor {
    fn key(&self) -> MutationKey {
        match self {
            Editor::New => MutationKey::new(None, Action::Create),
            Editor::Edit(category) => MutationKey::new(Some(category.id), Action::Update),
        }
    }
}

#[function_component(CategoriesPage)]
pub fn categories_page(props: &CategoriesPageProps) -> Html {
    let services = props.services.clone();
    let list: CategoryList = use_entity_list(&services, EntityList::new);
    let editor = use_state(|| None::<Editor>);
    let editor_error = use_state(|| None::<String>);
    let pending_delete = use_state(|| None::<DeleteRequest>);

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
        Callback::from(move |payload: CategoryCreate| {
            let Some(current) = (*editor).clone() else {
                return;
            };
            let services = services.clone();
            let editor = editor.clone();
            let editor_error = editor_error.clone();
            let on_done = move |result: Result<Category, _>| match result {
                Ok(saved) => {
                    services.success(format!("Category \"{}\" saved", saved.name));
                    editor.set(None);
                }
                Err(err) => {
                    editor_error.set(Some(services.report_mutation(&err, "Failed to save category")));
                }
            };
            match current {
                Editor::New => list.run(
                    current.key(),
                    move |owner| async move { owner.entity_list().create(&payload).await },
                    on_done,
                ),
                Editor::Edit(ref category) => {
                    let id = category.id;
                    let patch = CategoryPatch::from(payload);
                    list.run(
                        current.key(),
                        move |owner| async move { owner.entity_list().update(id, &patch).await },
                        on_done,
                    )
                }
            }
        })
    };

    let on_toggle_active = {
        let list = list.clone();
        let services = services.clone();
        Callback::from(move |category: Category| {
            let id = category.id;
            let active = !category.is_active;
            let key = MutationKey::new(Some(id), Action::Toggle);
            let services = services.clone();
            list.run(
                key,
                move |owner| async move {
                    let list = owner.entity_list();
                    list.mutate(key, list.gateway().set_category_active(id, active))
                        .await
                },
                move |result| match result {
                    Ok(updated) => services.success(format!(
                        "\"{}\" is now {}",
                        updated.name,
                        if updated.is_active { "active" } else { "inactive" }
                    )),
                    Err(err) => {
                        services.report_mutation(&err, "Failed to update category");
                    }
                },
            );
        })
    };

    let on_confirm_delete = {
        let list = list.clone();
        let services = services.clone();
        let pending_delete = pending_delete.clone();
        Callback::from(move |confirmed: taskdeck_core::sync::ConfirmedDelete| {
            let services = services.clone();
            let pending_delete = pending_delete.clone();
            list.run(
                MutationKey::new(Some(confirmed.id()), Action::Delete),
                move |owner| async move { owner.entity_list().delete(confirmed).await },
                move |result| {
                    pending_delete.set(None);
                    match result {
                        Ok(()) => services.success("Category deleted"),
                        Err(err) => {
                            services.report_mutation(&err, "Failed to delete category");
                        }
                    }
                },
            );
        })
    };

    let state = &*list.state;
    let new_category = {
        let open_editor = open_editor.clone();
        Callback::from(move |_: MouseEvent| open_editor.emit(Editor::New))
    };

    html! {
        <>
            <div class="panel">
                <div class="header">
                    <span>{ "Categories" }</span>
                    <button class="btn primary" onclick={new_category}>{ "New category" }</button>
                </div>
                { list_status(state, "categories", on_retry) }
                if !state.items.is_empty() {
                    <table>
                        <thead>
                            <tr>
                                <th>{ "Name" }</th>
                                <th>{ "Projects" }</th>
                                <th>{ "Tasks" }</th>
                                <th>{ "Status" }</th>
                                <th></th>
                            </tr>
                        </thead>
                        <tbody>
                            {
                                for state.items.iter().map(|category| {
                                    let toggling = list.is_pending(MutationKey::new(Some(category.id), Action::Toggle));
                                    let deleting = list.is_pending(MutationKey::new(Some(category.id), Action::Delete));
                                    let on_edit = {
                                        let open_editor = open_editor.clone();
                                        let category = category.clone();
                                        Callback::from(move |_: MouseEvent| open_editor.emit(Editor::Edit(category.clone())))
                                    };
                                    let on_toggle = {
                                        let on_toggle_active = on_toggle_active.clone();
                                        let category = category.clone();
                                        Callback::from(move |_: MouseEvent| on_toggle_active.emit(category.clone()))
                                    };
                                    let on_delete = {
                                        let pending_delete = pending_delete.clone();
                                        let request = DeleteRequest::new(category.id, category.name.clone());
                                        Callback::from(move |_: MouseEvent| pending_delete.set(Some(request.clone())))
                                    };
                                    html! {
                                        <tr key={category.id}>
                                            <td>
                                                <span class="swatch" style={format!("background:{};", category.color)}></span>
                                                { category.name.clone() }
                                                {
                                                    match &category.description {
                                                        Some(description) if !description.is_empty() => html! {
                                                            <div style="color:var(--muted);font-size:0.85rem;">{ description.clone() }</div>
                                                        },
                                                        _ => html! {},
                                                    }
                                                }
                                            </td>
                                            <td>{ category.project_count }</td>
                                            <td>{ category.task_count }</td>
                                            <td>
                                                <button class="btn" disabled={toggling} onclick={on_toggle}>
                                                    { if category.is_active { "Active" } else { "Inactive" } }
                                                </button>
                                            </td>
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
                            Editor::New => ("New category", CategoryForm::default()),
                            Editor::Edit(category) => ("Edit category", CategoryForm::from_category(category)),
                        };
                        let editor = editor.clone();
                        html! {
                            <CategoryModal
                                title={title}
                                initial={initial}
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
struct CategoryModalProps {
    title: &'static str,
    initial: CategoryForm,
    busy: bool,
    error: Option<String>,
    on_submit: Callback<CategoryCreate>,
    on_cancel: Callback<()>,
}

/// Validates locally and only emits a payload that passed. The form keeps
/// its values when the save fails.
#[function_component(CategoryModal)]
fn category_modal(props: &CategoryModalProps) -> Html {
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
            <TextField
                label="Color"
                input_type="color"
                value={form.color.to_ascii_lowercase()}
                on_change={bind(&form, |f, v| f.color = v)}
                error={field_error(&errors, "color")}
            />
            <div class="footer">
                <button class="btn" disabled={props.busy} onclick={move |_| on_cancel.emit(())}>{ "Cancel" }</button>
                <button class="btn primary" disabled={props.busy} onclick={on_save}>
                    { if props.busy { "Saving…" } else { "Save" } }
                </button>
            </div>
        </Modal>
    }
}
