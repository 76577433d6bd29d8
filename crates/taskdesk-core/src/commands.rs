use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiClient, TaskApi};
use crate::auth::AuthClient;
use crate::cli::{Command, CredentialArgs, StatusCommand, TaskArgs};
use crate::config::Config;
use crate::datastore::DataStore;
use crate::datetime::parse_date_expr;
use crate::filter::TaskFilter;
use crate::model::{StatusRef, TaskDraft, TaskStatus};
use crate::page::{FETCH_TASKS_FAILED, TasksPage};
use crate::render::Renderer;

pub async fn dispatch(
    store: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    command: Option<Command>,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let command = command.unwrap_or(Command::List { terms: Vec::new() });

    match command {
        Command::Login(creds) => return cmd_login(store, cfg, creds).await,
        Command::Register(creds) => return cmd_register(store, cfg, creds).await,
        Command::Logout => return cmd_logout(store),
        _ => {}
    }
    debug!(?command, "dispatching command");

    let api = ApiClient::new(&cfg.client_settings()?, store.load_session()?)?;
    let mut page = TasksPage::new(api);

    match command {
        Command::List { terms } => cmd_list(&mut page, renderer, &terms, now).await,
        Command::Show { id } => cmd_show(&mut page, renderer, id).await,
        Command::Add(args) => cmd_add(&mut page, renderer, args, now).await,
        Command::Modify { id, fields } => cmd_modify(&mut page, renderer, id, fields, now).await,
        Command::Delete { id } => cmd_delete(&mut page, id).await,
        Command::Status(sub) => cmd_status(&mut page, renderer, sub).await,
        Command::Login(_) | Command::Register(_) | Command::Logout => Ok(()),
    }
}

fn page_error<A: TaskApi>(page: &TasksPage<A>) -> anyhow::Result<()> {
    match page.error() {
        Some(message) => Err(anyhow!(message)),
        None => Ok(()),
    }
}

#[instrument(skip(page, renderer, now))]
async fn cmd_list<A: TaskApi>(
    page: &mut TasksPage<A>,
    renderer: &Renderer,
    terms: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    page.load().await;
    match page.error() {
        Some(FETCH_TASKS_FAILED) => return Err(anyhow!(FETCH_TASKS_FAILED)),
        // Statuses only label the table; show it anyway.
        Some(message) => renderer.print_banner(message),
        None => {}
    }

    let filter = TaskFilter::parse(terms, page.statuses(), now, renderer.timezone())?;
    let visible = page.visible_tasks(&filter);
    info!(
        total = page.tasks().len(),
        shown = visible.len(),
        "listing tasks"
    );
    renderer.print_task_table(&visible, page.statuses(), now)
}

#[instrument(skip(page, renderer))]
async fn cmd_show<A: TaskApi>(
    page: &mut TasksPage<A>,
    renderer: &Renderer,
    id: i64,
) -> anyhow::Result<()> {
    if !page.refresh_statuses().await {
        warn!("showing task without status names");
    }
    let task = page
        .api()
        .get_task(id)
        .await
        .with_context(|| format!("failed to fetch task {id}"))?;
    renderer.print_task_info(&task, page.statuses())
}

#[instrument(skip(page, renderer, args, now))]
async fn cmd_add<A: TaskApi>(
    page: &mut TasksPage<A>,
    renderer: &Renderer,
    args: TaskArgs,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    page.load().await;
    page_error(page)?;

    let before: Vec<i64> = page.tasks().iter().map(|task| task.id).collect();
    let draft = draft_from_args(args, page.statuses(), now, renderer.timezone())?;
    if !page.create_task(&draft).await {
        return page_error(page);
    }

    let created = page
        .tasks()
        .iter()
        .rev()
        .find(|task| !before.contains(&task.id));
    match created {
        Some(task) => println!("Created task {}.", task.id),
        None => println!("Created task."),
    }
    Ok(())
}

#[instrument(skip(page, renderer, args, now))]
async fn cmd_modify<A: TaskApi>(
    page: &mut TasksPage<A>,
    renderer: &Renderer,
    id: i64,
    args: TaskArgs,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    page.load().await;
    page_error(page)?;

    let draft = draft_from_args(args, page.statuses(), now, renderer.timezone())?;
    if draft.is_empty() {
        return Err(anyhow!("nothing to modify; pass at least one field"));
    }
    if !page.begin_edit(id) {
        return Err(anyhow!("no task with id {id}"));
    }
    if !page.submit_edit(&draft).await {
        return page_error(page);
    }

    match page.task(id) {
        Some(task) => renderer.print_task_info(task, page.statuses()),
        None => {
            println!("Modified task {id}.");
            Ok(())
        }
    }
}

#[instrument(skip(page))]
async fn cmd_delete<A: TaskApi>(page: &mut TasksPage<A>, id: i64) -> anyhow::Result<()> {
    if !page.delete_task(id).await {
        return page_error(page);
    }
    println!("Deleted task {id}.");
    Ok(())
}

#[instrument(skip(page, renderer))]
async fn cmd_status<A: TaskApi>(
    page: &mut TasksPage<A>,
    renderer: &Renderer,
    sub: StatusCommand,
) -> anyhow::Result<()> {
    let ok = match &sub {
        StatusCommand::List => page.refresh_statuses().await,
        StatusCommand::Add { name } => page.create_status(name).await,
        StatusCommand::Rename { id, name } => page.update_status(*id, name).await,
        StatusCommand::Delete { id } => page.delete_status(*id).await,
    };
    if !ok {
        return page_error(page);
    }
    renderer.print_status_table(page.statuses())
}

#[instrument(skip(store, cfg, creds), fields(username = %creds.username))]
async fn cmd_login(store: &DataStore, cfg: &Config, creds: CredentialArgs) -> anyhow::Result<()> {
    let password = require_password(&creds)?;
    let client = AuthClient::new(&cfg.auth_url()?, cfg.http_timeout()?)?;
    let session = client.login(&creds.username, password).await?;
    store.save_session(&session)?;
    println!("Logged in as {}.", session.username);
    Ok(())
}

#[instrument(skip(store, cfg, creds), fields(username = %creds.username))]
async fn cmd_register(
    store: &DataStore,
    cfg: &Config,
    creds: CredentialArgs,
) -> anyhow::Result<()> {
    let password = require_password(&creds)?;
    let client = AuthClient::new(&cfg.auth_url()?, cfg.http_timeout()?)?;
    let session = client.register(&creds.username, password).await?;
    store.save_session(&session)?;
    println!("Registered and logged in as {}.", session.username);
    Ok(())
}

fn cmd_logout(store: &DataStore) -> anyhow::Result<()> {
    if store.clear_session()? {
        println!("Logged out.");
    } else {
        println!("No stored session.");
    }
    Ok(())
}

fn require_password(creds: &CredentialArgs) -> anyhow::Result<&str> {
    creds
        .password
        .as_deref()
        .ok_or_else(|| anyhow!("password required: pass --password or set TASKDESK_PASSWORD"))
}

/// Turns command-line task fields into a draft. A status given by name is
/// resolved against the known statuses; anything else is passed on as text
/// and coerced when the request is built.
pub fn draft_from_args(
    args: TaskArgs,
    statuses: &[TaskStatus],
    now: DateTime<Utc>,
    tz: Tz,
) -> anyhow::Result<TaskDraft> {
    let status_id = args.status.map(|raw| {
        statuses
            .iter()
            .find(|status| status.name.eq_ignore_ascii_case(raw.trim()))
            .map(|status| StatusRef::Id(status.id))
            .unwrap_or(StatusRef::Text(raw))
    });

    let due_date = args
        .due
        .map(|raw| {
            parse_date_expr(&raw, now, tz).with_context(|| format!("invalid due date: {raw}"))
        })
        .transpose()?;

    Ok(TaskDraft {
        title: args.title,
        description: args.description,
        status_id,
        priority: args.priority,
        owner: args.owner,
        assigned: args.assigned,
        project_name: args.project_name,
        task_number: args.task_number,
        due_date,
    })
}
