use taskdeck_core::forms::FieldErrors;
use web_sys::{HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement};
use yew::{
    AttrValue, Callback, Children, Event, Html, InputEvent, MouseEvent, Properties, TargetCast,
    UseStateHandle, function_component, html,
};

/// A callback that writes an input's new value into one field of the form
/// held in `form`.
pub fn bind<F>(form: &UseStateHandle<F>, apply: fn(&mut F, String)) -> Callback<String>
where
    F: Clone + 'static,
{
    let form = form.clone();
    Callback::from(move |value: String| {
        let mut next = (*form).clone();
        apply(&mut next, value);
        form.set(next);
    })
}

pub fn field_error(errors: &FieldErrors, field: &str) -> Option<String> {
    errors.get(field).map(str::to_string)
}

fn error_line(error: &Option<String>) -> Html {
    match error {
        Some(message) => html! { <div class="field-error">{ message.clone() }</div> },
        None => html! {},
    }
}

#[derive(Properties, PartialEq)]
pub struct TextFieldProps {
    pub label: AttrValue,
    pub value: String,
    pub on_change: Callback<String>,
    #[prop_or(AttrValue::Static("text"))]
    pub input_type: AttrValue,
    #[prop_or_default]
    pub placeholder: Option<AttrValue>,
    #[prop_or_default]
    pub error: Option<String>,
    #[prop_or_default]
    pub disabled: bool,
}

#[function_component(TextField)]
pub fn text_field(props: &TextFieldProps) -> Html {
    let on_change = props.on_change.clone();
    let oninput = Callback::from(move |event: InputEvent| {
        let input: HtmlInputElement = event.target_unchecked_into();
        on_change.emit(input.value());
    });

    html! {
        <div class="field">
            <label>{ props.label.clone() }</label>
            <input
                type={props.input_type.clone()}
                value={props.value.clone()}
                placeholder={props.placeholder.clone()}
                disabled={props.disabled}
                {oninput}
            />
            { error_line(&props.error) }
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct TextAreaFieldProps {
    pub label: AttrValue,
    pub value: String,
    pub on_change: Callback<String>,
    #[prop_or_default]
    pub error: Option<String>,
}

#[function_component(TextAreaField)]
pub fn text_area_field(props: &TextAreaFieldProps) -> Html {
    let on_change = props.on_change.clone();
    let oninput = Callback::from(move |event: InputEvent| {
        let input: HtmlTextAreaElement = event.target_unchecked_into();
        on_change.emit(input.value());
    });

    html! {
        <div class="field">
            <label>{ props.label.clone() }</label>
            <textarea value={props.value.clone()} rows="3" {oninput} />
            { error_line(&props.error) }
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct SelectFieldProps {
    pub label: AttrValue,
    pub value: String,
    /// `(value, label)` pairs in display order.
    pub options: Vec<(String, String)>,
    pub on_change: Callback<String>,
    #[prop_or_default]
    pub error: Option<String>,
}

#[function_component(SelectField)]
pub fn select_field(props: &SelectFieldProps) -> Html {
    let on_change = props.on_change.clone();
    let onchange = Callback::from(move |event: Event| {
        let select: HtmlSelectElement = event.target_unchecked_into();
        on_change.emit(select.value());
    });

    html! {
        <div class="field">
            <label>{ props.label.clone() }</label>
            <select {onchange}>
                {
                    for props.options.iter().map(|(value, label)| html! {
                        <option value={value.clone()} selected={*value == props.value}>
                            { label.clone() }
                        </option>
                    })
                }
            </select>
            { error_line(&props.error) }
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct ModalProps {
    pub title: AttrValue,
    pub on_close: Callback<()>,
    #[prop_or_default]
    pub children: Children,
}

#[function_component(Modal)]
pub fn modal(props: &ModalProps) -> Html {
    let on_close = props.on_close.clone();
    html! {
        <div class="modal-backdrop" onclick={move |_| on_close.emit(())}>
            <div class="modal" onclick={Callback::from(|e: MouseEvent| e.stop_propagation())}>
                <div class="header">{ props.title.clone() }</div>
                { for props.children.iter() }
            </div>
        </div>
    }
}
