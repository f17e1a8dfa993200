use std::rc::Rc;

use taskdeck_core::forms::{FieldErrors, LoginForm, RegisterForm};
use taskdeck_core::session::{NOT_AUTHENTICATED, SessionError, SessionState};
use yew::{Callback, Html, Properties, SubmitEvent, function_component, html, use_effect_with, use_state};
use yew_router::prelude::Link;

use super::form::{TextField, bind, field_error};
use super::list::use_view_lifetime;
use crate::api::Services;
use crate::app::Route;

#[derive(Properties, PartialEq)]
pub struct AuthPageProps {
    pub services: Services,
    pub session: SessionState,
}

/// The store's error, minus the "no session" note left by the startup probe.
fn visible_error(session: &SessionState) -> Option<String> {
    session
        .last_error
        .clone()
        .filter(|message| message != NOT_AUTHENTICATED)
}

fn on_attempt_finished<T>(services: &Services, result: Result<T, SessionError>, what: &str) {
    services.publish_session();
    match result {
        Ok(_) => tracing::info!("{what} succeeded"),
        Err(SessionError::Busy) => tracing::debug!("{what} ignored; another attempt is running"),
        Err(SessionError::Api(err)) => tracing::warn!(error = %err, "{what} failed"),
    }
}

#[function_component(LoginPage)]
pub fn login_page(props: &AuthPageProps) -> Html {
    let form = use_state(LoginForm::default);
    let errors = use_state(FieldErrors::new);
    let submitting = use_state(|| false);
    let lifetime = use_view_lifetime();

    {
        let services = props.services.clone();
        use_effect_with((), move |_| {
            services.session.clear_error();
            services.publish_session();
            || ()
        });
    }

    let onsubmit = {
        let form = form.clone();
        let errors = errors.clone();
        let submitting = submitting.clone();
        let services = props.services.clone();
        let lifetime = Rc::clone(&lifetime);
        Callback::from(move |event: SubmitEvent| {
            event.prevent_default();
            let request = match form.validate() {
                Ok(request) => request,
                Err(field_errors) => {
                    errors.set(field_errors);
                    return;
                }
            };
            errors.set(FieldErrors::new());
            submitting.set(true);
            let services = services.clone();
            let submitting = submitting.clone();
            let lifetime = Rc::clone(&lifetime);
            wasm_bindgen_futures::spawn_local(async move {
                let result = services.session.login(&request).await;
                if let Ok(user) = &result {
                    services.success(format!("Welcome back, {}!", user.username));
                }
                on_attempt_finished(&services, result, "login");
                if lifetime.is_alive() {
                    submitting.set(false);
                }
            });
        })
    };

    let busy = *submitting;

    html! {
        <div class="panel" style="max-width:420px;margin:64px auto;">
            <div class="header">{ "Sign in to Taskdeck" }</div>
            <form {onsubmit}>
                {
                    match visible_error(&props.session) {
                        Some(message) => html! { <div class="form-error">{ message }</div> },
                        None => html! {},
                    }
                }
                <TextField
                    label="Email"
                    input_type="email"
                    value={form.email.clone()}
                    on_change={bind(&form, |f, v| f.email = v)}
                    error={field_error(&errors, "email")}
                    disabled={busy}
                />
                <TextField
                    label="Password"
                    input_type="password"
                    value={form.password.clone()}
                    on_change={bind(&form, |f, v| f.password = v)}
                    error={field_error(&errors, "password")}
                    disabled={busy}
                />
                <div class="footer">
                    <Link<Route> to={Route::Register}>{ "Create an account" }</Link<Route>>
                    <button type="submit" class="btn primary" disabled={busy}>
                        { if busy { "Signing in…" } else { "Sign in" } }
                    </button>
                </div>
            </form>
        </div>
    }
}

#[function_component(RegisterPage)]
pub fn register_page(props: &AuthPageProps) -> Html {
    let form = use_state(RegisterForm::default);
    let errors = use_state(FieldErrors::new);
    let submitting = use_state(|| false);
    let lifetime = use_view_lifetime();

    {
        let services = props.services.clone();
        use_effect_with((), move |_| {
            services.session.clear_error();
            services.publish_session();
            || ()
        });
    }

    let onsubmit = {
        let form = form.clone();
        let errors = errors.clone();
        let submitting = submitting.clone();
        let services = props.services.clone();
        let lifetime = Rc::clone(&lifetime);
        Callback::from(move |event: SubmitEvent| {
            event.prevent_default();
            let request = match form.validate() {
                Ok(request) => request,
                Err(field_errors) => {
                    errors.set(field_errors);
                    return;
                }
            };
            errors.set(FieldErrors::new());
            submitting.set(true);
            let services = services.clone();
            let submitting = submitting.clone();
            let lifetime = Rc::clone(&lifetime);
            wasm_bindgen_futures::spawn_local(async move {
                let result = services.session.register(&request).await;
                if result.is_ok() {
                    services.success("Account created. Welcome to Taskdeck!");
                }
                on_attempt_finished(&services, result, "registration");
                if lifetime.is_alive() {
                    submitting.set(false);
                }
            });
        })
    };

    let busy = *submitting;

    html! {
        <div class="panel" style="max-width:420px;margin:64px auto;">
            <div class="header">{ "Create your account" }</div>
            <form {onsubmit}>
                {
                    match visible_error(&props.session) {
                        Some(message) => html! { <div class="form-error">{ message }</div> },
                        None => html! {},
                    }
                }
                <TextField
                    label="Email"
                    input_type="email"
                    value={form.email.clone()}
                    on_change={bind(&form, |f, v| f.email = v)}
                    error={field_error(&errors, "email")}
                    disabled={busy}
                />
                <TextField
                    label="Username"
                    value={form.username.clone()}
                    on_change={bind(&form, |f, v| f.username = v)}
                    error={field_error(&errors, "username")}
                    disabled={busy}
                />
                <TextField
                    label="Password"
                    input_type="password"
                    value={form.password.clone()}
                    on_change={bind(&form, |f, v| f.password = v)}
                    error={field_error(&errors, "password")}
                    disabled={busy}
                />
                <div class="footer">
                    <Link<Route> to={Route::Login}>{ "Already have an account?" }</Link<Route>>
                    <button type="submit" class="btn primary" disabled={busy}>
                        { if busy { "Creating account…" } else { "Create account" } }
                    </button>
                </div>
            </form>
        </div>
    }
}
