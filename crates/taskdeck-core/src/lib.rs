pub mod api;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod forms;
#[cfg(feature = "cli")]
pub mod render;
pub mod session;
pub mod sync;
pub mod table;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod theme;
pub mod toast;

#[cfg(feature = "cli")]
pub use app::run;

#[cfg(feature = "cli")]
mod app {
  use std::ffi::OsString;

  use anyhow::{
    Context,
    anyhow
  };
  use chrono::{
    Local,
    NaiveDate
  };
  use clap::Parser;
  use tracing::{
    debug,
    info,
    warn
  };

  use crate::api::{
    Gateway,
    HttpTransport
  };
  use crate::cli::{
    self,
    CategoryCommand,
    Command,
    GlobalCli,
    ProjectCommand,
    TaskCommand
  };
  use crate::config::Config;
  use crate::forms::LoginForm;
  use crate::render::Renderer;
  use crate::session::SessionStore;
  use crate::sync::TaskBoard;
  use crate::theme::{
    FileStorage,
    ThemeStore
  };

  type HttpGateway = Gateway<HttpTransport>;

  #[tracing::instrument(skip_all)]
  pub fn run(
    raw_args: Vec<OsString>
  ) -> anyhow::Result<()> {
    let cli = GlobalCli::parse_from(raw_args);

    cli::init_tracing(
      cli.verbose,
      cli.quiet
    )?;

    info!(
      verbose = cli.verbose,
      quiet = cli.quiet,
      "starting taskdeck CLI"
    );

    let mut cfg =
      Config::load(cli.config.as_deref())?;
    cfg.apply_overrides(
      cli
        .overrides
        .iter()
        .map(|kv| {
          (kv.key.clone(), kv.value.clone())
        })
    )?;
    if let Some(email) = &cli.email {
      cfg.email = Some(email.clone());
    }
    debug!(api = %cfg.api_base_url, "configuration resolved");

    let renderer = Renderer::new();

    if let Command::Theme { theme } = &cli.command {
      return run_theme(&cfg, *theme);
    }

    let runtime =
      tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context(
          "failed to start async \
           runtime"
        )?;
    runtime.block_on(run_remote(
      &cfg,
      &renderer,
      cli.command
    ))?;

    info!("done");
    Ok(())
  }

  fn run_theme(
    cfg: &Config,
    requested: Option<crate::theme::Theme>
  ) -> anyhow::Result<()> {
    let data_dir = cfg
      .resolve_data_dir()
      .context(
        "failed to resolve data \
         directory"
      )?;
    let storage = FileStorage::new(&data_dir);
    let mut store =
      ThemeStore::load(storage, || false);
    if let Some(theme) = requested {
      store.set(theme);
      info!(%theme, "theme saved");
    }
    println!("{}", store.theme());
    Ok(())
  }

  async fn run_remote(
    cfg: &Config,
    renderer: &Renderer,
    command: Command
  ) -> anyhow::Result<()> {
    let transport = HttpTransport::new(cfg)?;
    let gateway = Gateway::new(transport);
    let session =
      SessionStore::new(gateway.clone());

    let signed_in_here =
      sign_in(cfg, &session).await?;

    let result =
      dispatch(&gateway, renderer, command)
        .await;

    if signed_in_here
      && let Err(err) = session.logout().await
    {
      warn!(error = %err, "logout failed");
    }
    result
  }

  /// Signs in with the configured email and `$TASKDECK_PASSWORD`, or
  /// falls back to whatever session the backend already recognises.
  async fn sign_in(
    cfg: &Config,
    session: &SessionStore<HttpTransport>
  ) -> anyhow::Result<bool> {
    let password =
      std::env::var(cli::PASSWORD_ENV).ok();

    match (&cfg.email, password) {
      | (Some(email), Some(password)) => {
        let form = LoginForm {
          email: email.clone(),
          password
        };
        let request = form
          .validate()
          .map_err(|errors| anyhow!("{errors}"))?;
        session
          .login(&request)
          .await
          .context("sign-in failed")?;
        Ok(true)
      }
      | _ => {
        if session.probe().await.is_some() {
          return Ok(false);
        }
        Err(anyhow!(
          "not signed in: pass --email (or set \
           TASKDECK_EMAIL) and set {}",
          cli::PASSWORD_ENV
        ))
      }
    }
  }

  async fn dispatch(
    gateway: &HttpGateway,
    renderer: &Renderer,
    command: Command
  ) -> anyhow::Result<()> {
    let today = Local::now().date_naive();

    match command {
      | Command::Whoami => {
        let user = gateway.user_info().await?;
        renderer.print_user(&user)?;
      }
      | Command::Dashboard => {
        let summary =
          gateway.project_dashboard().await?;
        renderer.print_dashboard(&summary)?;
      }
      | Command::Categories { command } => {
        dispatch_categories(
          gateway, renderer, command, today
        )
        .await?;
      }
      | Command::Projects { command } => {
        dispatch_projects(
          gateway, renderer, command, today
        )
        .await?;
      }
      | Command::Tasks { command } => {
        dispatch_tasks(
          gateway, renderer, command, today
        )
        .await?;
      }
      | Command::Theme { .. } => {
        return Err(anyhow!(
          "theme does not use the backend"
        ));
      }
    }
    Ok(())
  }

  async fn dispatch_categories(
    gateway: &HttpGateway,
    renderer: &Renderer,
    command: CategoryCommand,
    today: NaiveDate
  ) -> anyhow::Result<()> {
    match command {
      | CategoryCommand::List { active } => {
        let categories = if active {
          gateway.list_active_categories().await?
        } else {
          gateway.list_categories().await?
        };
        renderer.print_categories(&categories)?;
      }
      | CategoryCommand::Show { id } => {
        let category = gateway
          .get_category(id)
          .await
          .with_context(|| {
            format!("failed to load category {id}")
          })?;
        renderer.print_categories(&[category])?;
      }
      | CategoryCommand::Projects { id } => {
        let projects =
          gateway.category_projects(id).await?;
        renderer.print_projects(&projects, today)?;
      }
    }
    Ok(())
  }

  async fn dispatch_projects(
    gateway: &HttpGateway,
    renderer: &Renderer,
    command: ProjectCommand,
    today: NaiveDate
  ) -> anyhow::Result<()> {
    match command {
      | ProjectCommand::List(args) => {
        let page = gateway
          .list_projects(&args.to_filters())
          .await?;
        renderer
          .print_projects(&page.results, today)?;
        print_page_footer(
          page.results.len(),
          page.count,
          "projects"
        );
      }
      | ProjectCommand::Tasks { id, filters } => {
        let tasks = gateway
          .project_tasks(id, &filters.to_filters())
          .await?;
        renderer.print_tasks(&tasks, today)?;
      }
      | ProjectCommand::SetStatus { id, status } => {
        let project = gateway
          .update_project_status(id, status)
          .await?;
        println!(
          "project {} is now {}",
          project.id,
          project.status.label()
        );
      }
      | ProjectCommand::SetPriority {
        id,
        priority
      } => {
        let project = gateway
          .update_project_priority(id, priority)
          .await?;
        println!(
          "project {} priority is now {}",
          project.id,
          project.priority.label()
        );
      }
    }
    Ok(())
  }

  async fn dispatch_tasks(
    gateway: &HttpGateway,
    renderer: &Renderer,
    command: TaskCommand,
    today: NaiveDate
  ) -> anyhow::Result<()> {
    match command {
      | TaskCommand::List(args) => {
        let page = gateway
          .list_tasks(&args.to_filters())
          .await?;
        renderer
          .print_tasks(&page.results, today)?;
        print_page_footer(
          page.results.len(),
          page.count,
          "tasks"
        );
      }
      | TaskCommand::Toggle { id } => {
        let board = TaskBoard::new(
          gateway.clone(),
          &Default::default()
        );
        let task = board
          .toggle_completion(id)
          .await
          .with_context(|| {
            format!("failed to toggle task {id}")
          })?;
        println!(
          "task {} is now {} ({}%)",
          task.id,
          task.status.label(),
          task.progress
        );
      }
      | TaskCommand::SetStatus { id, status } => {
        let task = gateway
          .update_task_status(id, status)
          .await?;
        println!(
          "task {} is now {}",
          task.id,
          task.status.label()
        );
      }
      | TaskCommand::SetPriority { id, priority } => {
        let task = gateway
          .update_task_priority(id, priority)
          .await?;
        println!(
          "task {} priority is now {}",
          task.id,
          task.priority.label()
        );
      }
      | TaskCommand::Progress { id, percent } => {
        let task = gateway
          .update_task_progress(id, percent)
          .await?;
        println!(
          "task {} is {}% done ({})",
          task.id,
          task.progress,
          task.status.label()
        );
      }
      | TaskCommand::DueToday => {
        let tasks =
          gateway.tasks_due_today().await?;
        renderer.print_tasks(&tasks, today)?;
      }
      | TaskCommand::Overdue => {
        let tasks = gateway.overdue_tasks().await?;
        renderer.print_tasks(&tasks, today)?;
      }
    }
    Ok(())
  }

  fn print_page_footer(
    shown: usize,
    total: Option<u64>,
    noun: &str
  ) {
    if let Some(total) = total
      && total > shown as u64
    {
      println!("{shown} of {total} {noun}");
    }
  }
}
