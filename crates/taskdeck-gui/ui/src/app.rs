use taskdeck_core::session::SessionState;
use taskdeck_core::theme::{
  Theme,
  ThemeStore
};
use taskdeck_core::toast::{
  NotificationState,
  ToastId
};
use taskdeck_shared::ProjectId;
use yew::{
  Callback,
  Html,
  MouseEvent,
  Properties,
  classes,
  function_component,
  html,
  use_effect_with,
  use_memo,
  use_mut_ref,
  use_state
};
use yew_router::prelude::{
  BrowserRouter,
  Link,
  Redirect,
  Routable,
  Switch,
  use_route
};

use crate::api::{
  Services,
  load_config
};
use crate::components::{
  CategoriesPage,
  DashboardPage,
  LoginPage,
  ProjectDetailPage,
  ProjectsPage,
  RegisterPage,
  TasksPage,
  ToastStack
};
use crate::storage::{
  LocalStorage,
  apply_theme,
  system_prefers_dark
};

#[derive(Clone, Routable, PartialEq)]
pub enum Route {
  #[at("/")]
  Dashboard,
  #[at("/login")]
  Login,
  #[at("/register")]
  Register,
  #[at("/categories")]
  Categories,
  #[at("/projects")]
  Projects,
  #[at("/projects/:id")]
  ProjectDetail { id: ProjectId },
  #[at("/tasks")]
  Tasks,
  #[not_found]
  #[at("/404")]
  NotFound
}

impl Route {
  fn is_public(&self) -> bool {
    matches!(self, Self::Login | Self::Register)
  }
}

#[function_component(App)]
pub fn app() -> Html {
  let session =
    use_state(SessionState::initial);
  let probed = use_state(|| false);
  let toasts =
    use_state(NotificationState::default);
  let theme_store = use_mut_ref(|| {
    ThemeStore::load(
      LocalStorage,
      system_prefers_dark
    )
  });
  let theme = {
    let initial = theme_store.borrow().theme();
    use_state(move || initial)
  };

  let services = {
    let session = session.setter();
    use_memo((), move |_| {
      Services::build(
        &load_config(),
        Callback::from(move |state| {
          session.set(state)
        })
      )
    })
  };

  {
    let services = services.clone();
    let toasts = toasts.setter();
    let probed = probed.setter();
    use_effect_with((), move |_| {
      if let Ok(services) = services.as_ref() {
        services.toasts.set_listener(
          move |state: &NotificationState| {
            toasts.set(state.clone())
          }
        );

        let services = services.clone();
        wasm_bindgen_futures::spawn_local(
          async move {
            let user =
              services.session.probe().await;
            tracing::info!(
              signed_in = user.is_some(),
              "startup session probe finished"
            );
            services.publish_session();
            probed.set(true);
          }
        );
      }
      || ()
    });
  }

  use_effect_with(*theme, move |theme| {
    apply_theme(*theme);
    tracing::debug!(theme = %theme, "applied theme");
    || ()
  });

  let on_toggle_theme = {
    let theme = theme.clone();
    let theme_store = theme_store.clone();
    Callback::from(move |_: MouseEvent| {
      let next =
        theme_store.borrow_mut().toggle();
      theme.set(next);
    })
  };

  let services = match services.as_ref() {
    | Ok(services) => services.clone(),
    | Err(err) => {
      tracing::error!(error = %err, "failed to build API client");
      return html! {
          <div class="panel form-error">
              { format!("Taskdeck cannot start: {err}") }
          </div>
      };
    }
  };

  let on_dismiss = {
    let queue = services.toasts.clone();
    Callback::from(move |id: ToastId| {
      queue.remove(id)
    })
  };

  html! {
      <BrowserRouter>
          <Shell
              services={services}
              session={(*session).clone()}
              ready={*probed}
              theme={*theme}
              on_toggle_theme={on_toggle_theme}
          />
          <ToastStack
              toasts={(*toasts).clone()}
              on_dismiss={on_dismiss}
          />
      </BrowserRouter>
  }
}

#[derive(Properties, PartialEq)]
struct ShellProps {
  services:        Services,
  session:         SessionState,
  ready:           bool,
  theme:           Theme,
  on_toggle_theme: Callback<MouseEvent>
}

#[function_component(Shell)]
fn shell(props: &ShellProps) -> Html {
  if !props.ready {
    return html! {
        <div class="main">{ "Loading…" }</div>
    };
  }

  let services = props.services.clone();
  let session = props.session.clone();
  let render =
    Callback::from(move |route: Route| {
      switch(route, &services, &session)
    });

  html! {
      <div class="shell">
          {
              if props.session.authenticated {
                  html! {
                      <Nav
                          services={props.services.clone()}
                          session={props.session.clone()}
                          theme={props.theme}
                          on_toggle_theme={props.on_toggle_theme.clone()}
                      />
                  }
              } else {
                  html! { <div></div> }
              }
          }
          <main class="main">
              <Switch<Route> render={render} />
          </main>
      </div>
  }
}

fn switch(
  route: Route,
  services: &Services,
  session: &SessionState
) -> Html {
  if !session.authenticated && !route.is_public()
  {
    return html! { <Redirect<Route> to={Route::Login} /> };
  }
  if session.authenticated && route.is_public() {
    return html! { <Redirect<Route> to={Route::Dashboard} /> };
  }

  let services = services.clone();
  match route {
    | Route::Dashboard => {
      html! { <DashboardPage {services} /> }
    }
    | Route::Login => {
      html! { <LoginPage {services} session={session.clone()} /> }
    }
    | Route::Register => {
      html! { <RegisterPage {services} session={session.clone()} /> }
    }
    | Route::Categories => {
      html! { <CategoriesPage {services} /> }
    }
    | Route::Projects => {
      html! { <ProjectsPage {services} /> }
    }
    | Route::ProjectDetail { id } => {
      html! { <ProjectDetailPage {services} {id} /> }
    }
    | Route::Tasks => {
      html! { <TasksPage {services} /> }
    }
    | Route::NotFound => {
      html! {
          <div class="panel">
              <div class="header">{ "Page not found" }</div>
              <Link<Route> to={Route::Dashboard}>{ "Back to the dashboard" }</Link<Route>>
          </div>
      }
    }
  }
}

#[derive(Properties, PartialEq)]
struct NavProps {
  services:        Services,
  session:         SessionState,
  theme:           Theme,
  on_toggle_theme: Callback<MouseEvent>
}

#[function_component(Nav)]
fn nav(props: &NavProps) -> Html {
  let current = use_route::<Route>();

  let on_logout = {
    let services = props.services.clone();
    Callback::from(move |_: MouseEvent| {
      let services = services.clone();
      wasm_bindgen_futures::spawn_local(
        async move {
          if let Err(err) =
            services.session.logout().await
          {
            tracing::debug!(error = %err, "remote logout failed");
          }
          services.publish_session();
        }
      );
    })
  };

  let link = |route: Route, label: &str| {
    let active = match (&current, &route) {
      | (
        Some(Route::ProjectDetail { .. }),
        Route::Projects
      ) => true,
      | (Some(current), route) => current == route,
      | (None, _) => false
    };
    html! {
        <Link<Route> to={route} classes={classes!(active.then_some("active"))}>
            { label.to_string() }
        </Link<Route>>
    }
  };

  let username = props
    .session
    .user
    .as_ref()
    .map(|user| user.username.clone())
    .unwrap_or_default();
  let theme_label = if props.theme.is_dark() {
    "Light mode"
  } else {
    "Dark mode"
  };

  html! {
      <nav class="nav">
          <div class="header">{ "Taskdeck" }</div>
          { link(Route::Dashboard, "Dashboard") }
          { link(Route::Categories, "Categories") }
          { link(Route::Projects, "Projects") }
          { link(Route::Tasks, "Tasks") }
          <div style="margin-top:auto;display:flex;flex-direction:column;gap:6px;">
              <span class="badge">{ username }</span>
              <button class="btn" onclick={props.on_toggle_theme.clone()}>{ theme_label }</button>
              <button class="btn" onclick={on_logout}>{ "Sign out" }</button>
          </div>
      </nav>
  }
}
