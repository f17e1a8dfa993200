use taskdeck_core::sync::{ConfirmedDelete, DeleteRequest};
use yew::{Callback, Html, MouseEvent, Properties, function_component, html};

use super::form::Modal;

#[derive(Properties, PartialEq)]
pub struct ConfirmDialogProps {
    pub request: DeleteRequest,
    pub busy: bool,
    pub on_confirm: Callback<ConfirmedDelete>,
    pub on_cancel: Callback<()>,
}

/// The explicit confirmation step in front of every delete. Only this
/// dialog can produce the [`ConfirmedDelete`] the list needs.
#[function_component(ConfirmDialog)]
pub fn confirm_dialog(props: &ConfirmDialogProps) -> Html {
    let on_cancel = props.on_cancel.clone();
    let on_confirm = {
        let request = props.request.clone();
        let on_confirm = props.on_confirm.clone();
        Callback::from(move |_: MouseEvent| on_confirm.emit(request.clone().confirm()))
    };

    html! {
        <Modal title="Confirm delete" on_close={props.on_cancel.clone()}>
            <p>{ props.request.prompt() }</p>
            <div class="footer">
                <button class="btn" disabled={props.busy} onclick={move |_| on_cancel.emit(())}>
                    { "Cancel" }
                </button>
                <button class="btn danger" disabled={props.busy} onclick={on_confirm}>
                    { if props.busy { "Deleting…" } else { "Delete" } }
                </button>
            </div>
        </Modal>
    }
}
