use taskdeck_core::toast::{NotificationState, ToastId};
use yew::{Callback, Html, Properties, classes, function_component, html};

#[derive(Properties, PartialEq)]
pub struct ToastStackProps {
    pub toasts: NotificationState,
    pub on_dismiss: Callback<ToastId>,
}

#[function_component(ToastStack)]
pub fn toast_stack(props: &ToastStackProps) -> Html {
    html! {
        <div class="toasts">
            {
                for props.toasts.items.iter().map(|toast| {
                    let id = toast.id;
                    let on_dismiss = props.on_dismiss.clone();
                    html! {
                        <div key={id.to_string()} class={classes!("toast", toast.severity.as_str())}>
                            <span>{ toast.message.clone() }</span>
                            <button class="btn" onclick={move |_| on_dismiss.emit(id)}>{ "×" }</button>
                        </div>
                    }
                })
            }
        </div>
    }
}
