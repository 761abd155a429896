mod planner;

use std::sync::Arc;
use std::time::Duration;

use agenda_core::error::{ReqwestErrorExt, RusqliteErrorExt};
use agenda_core::{
    AppError, Config, ConfigError, DatabaseError, StoreBackend, StoreError, SurfaceKind,
};
use agenda_events::{
    can_create_on, events_on, month_grid, parse_user_instant, DayStyle, Event, EventClient,
    EventDraft, EventError, EventService, SqliteEventStore,
};
use agenda_notify::{
    LogSurface, NotificationScheduler, NotificationSurface, Permission, SchedulerSettings,
    SystemClock,
};
use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use clap::{Parser, Subcommand};
use planner::Planner;

#[derive(Parser)]
#[command(name = "agenda")]
#[command(about = "Manage calendar events and get notified when they start")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List events
    List {
        /// Only show events whose title or description contains this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Create a new event
    Add {
        /// Event title
        title: String,

        /// Start date/time (e.g., "2025-03-20T15:00" or "2025-03-20T15:00:00Z")
        #[arg(short, long)]
        start: String,

        /// End date/time
        #[arg(short, long)]
        end: String,

        /// Event description
        #[arg(short, long)]
        description: Option<String>,

        /// Attachment file name or URL (repeatable)
        #[arg(short, long = "attach")]
        attachments: Vec<String>,
    },
    /// Change an existing event
    Edit {
        /// Event id
        id: String,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        start: Option<String>,

        #[arg(short, long)]
        end: Option<String>,

        /// New description (pass "" to clear)
        #[arg(short, long)]
        description: Option<String>,

        /// Replace attachments (repeatable)
        #[arg(short, long = "attach")]
        attachments: Vec<String>,
    },
    /// Delete an event and its pending reminders
    Delete {
        /// Event id
        id: String,
    },
    /// Show a month grid
    Month {
        /// Year (defaults to the current year)
        #[arg(short, long)]
        year: Option<i32>,

        /// Month 1-12 (defaults to the current month)
        #[arg(short, long)]
        month: Option<u32>,

        /// Highlight a day (YYYY-MM-DD) and list its events
        #[arg(long)]
        selected: Option<NaiveDate>,
    },
    /// Stay running and deliver reminders for upcoming events
    Watch {
        /// Seconds between store re-reads
        #[arg(long, default_value_t = 60)]
        refresh_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    agenda_core::init()?;

    if let Err(e) = run(cli).await {
        tracing::debug!("{:?}", e);
        match into_app_error(e) {
            AppError::Store(StoreError::Validation(message)) => eprintln!("Error: {}", message),
            err => eprintln!("Error: {}\n  {}", err.user_message(), err),
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let (config, _) = Config::load_validated()
        .map_err(|e| AppError::Config(ConfigError::Invalid(format!("{:#}", e))))?;
    let planner = build_planner(&config)?;

    match cli.command {
        Commands::List { search } => cmd_list(&planner, search.as_deref()).await,
        Commands::Add {
            title,
            start,
            end,
            description,
            attachments,
        } => cmd_add(&planner, title, &start, &end, description, attachments).await,
        Commands::Edit {
            id,
            title,
            start,
            end,
            description,
            attachments,
        } => cmd_edit(&planner, &id, title, start, end, description, attachments).await,
        Commands::Delete { id } => cmd_delete(&planner, &id).await,
        Commands::Month {
            year,
            month,
            selected,
        } => cmd_month(&planner, year, month, selected).await,
        Commands::Watch { refresh_secs } => cmd_watch(&planner, refresh_secs).await,
    }
}

/// Map whatever bubbled up to the application error hierarchy.
fn into_app_error(e: anyhow::Error) -> AppError {
    let e = match e.downcast::<AppError>() {
        Ok(app) => return app,
        Err(e) => e,
    };
    let e = match e.downcast::<EventError>() {
        Ok(event_err) => {
            return match event_err {
                EventError::NotFound(id) => StoreError::NotFound(id).into(),
                EventError::Validation(message) => StoreError::Validation(message).into(),
                EventError::NetworkError(err) => err.into_network_error().into(),
                EventError::Storage(message) => DatabaseError::QueryFailed(message).into(),
                other @ (EventError::RateLimited(_)
                | EventError::Unavailable(_)
                | EventError::ApiError(_)) => {
                    StoreError::Unavailable(other.user_message()).into()
                }
            }
        }
        Err(e) => e,
    };
    let e = match e.downcast::<rusqlite::Error>() {
        Ok(sql_err) => return sql_err.into_database_error().into(),
        Err(e) => e,
    };
    match e.downcast::<std::io::Error>() {
        Ok(io_err) => AppError::Io(io_err),
        Err(e) => AppError::Other(e),
    }
}

fn build_planner(config: &Config) -> Result<Planner> {
    let events = match config.store.backend {
        StoreBackend::Sqlite => {
            let path = config.database_path();
            let store = SqliteEventStore::new(&path)
                .with_context(|| format!("Failed to open event database {}", path.display()))?;
            tracing::debug!("Using SQLite store at {}", path.display());
            EventService::sqlite(store)
        }
        StoreBackend::Http => {
            let client = EventClient::new(&config.store.api_url)
                .context("Failed to build events API client")?;
            tracing::debug!("Using events API at {}", config.store.api_url);
            EventService::http(client)
        }
    };

    let scheduler = NotificationScheduler::new(
        build_surface(config.notifications.surface),
        Arc::new(SystemClock),
        SchedulerSettings::from(&config.notifications),
        tokio::runtime::Handle::current(),
    );

    Ok(Planner::new(events, scheduler))
}

fn build_surface(kind: SurfaceKind) -> Arc<dyn NotificationSurface> {
    match kind {
        SurfaceKind::Desktop => desktop_surface(),
        SurfaceKind::Log => Arc::new(LogSurface),
    }
}

#[cfg(feature = "desktop")]
fn desktop_surface() -> Arc<dyn NotificationSurface> {
    let surface = agenda_notify::DesktopSurface::new();
    if surface.is_available() {
        Arc::new(surface)
    } else {
        tracing::warn!("Falling back to logging notifications");
        Arc::new(LogSurface)
    }
}

#[cfg(not(feature = "desktop"))]
fn desktop_surface() -> Arc<dyn NotificationSurface> {
    tracing::warn!("Built without desktop notifications, logging them instead");
    Arc::new(LogSurface)
}

fn print_event(event: &Event) {
    let start = event.start.with_timezone(&Local);
    let end = event.end.with_timezone(&Local);
    println!(
        "{}  {} - {}  {}",
        event.id,
        start.format("%Y-%m-%d %H:%M"),
        end.format("%H:%M"),
        event.title
    );
    if let Some(description) = event.description_text() {
        println!("    {}", description);
    }
    if !event.attachments.is_empty() {
        println!("    attachments: {}", event.attachments.join(", "));
    }
}

async fn cmd_list(planner: &Planner, search: Option<&str>) -> Result<()> {
    let events = planner.list(search).await?;
    if events.is_empty() {
        println!("No events.");
    }
    for event in &events {
        print_event(event);
    }
    Ok(())
}

fn report_saved(saved: &planner::SavedEvent) {
    print_event(&saved.event);
    match &saved.reminder {
        Ok(reminder) => println!(
            "Reminder at {} (delivered while `agenda watch` is running)",
            reminder.fire_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        ),
        Err(e) => println!("{}", e.user_message()),
    }
}

async fn cmd_add(
    planner: &Planner,
    title: String,
    start: &str,
    end: &str,
    description: Option<String>,
    attachments: Vec<String>,
) -> Result<()> {
    let draft = EventDraft {
        title,
        description,
        start: Some(parse_user_instant(start)?),
        end: Some(parse_user_instant(end)?),
        attachments,
    };

    let saved = planner.save(draft, None).await?;
    println!("Created event:");
    report_saved(&saved);
    Ok(())
}

async fn cmd_edit(
    planner: &Planner,
    id: &str,
    title: Option<String>,
    start: Option<String>,
    end: Option<String>,
    description: Option<String>,
    attachments: Vec<String>,
) -> Result<()> {
    let mut draft = planner.get(id).await?.to_draft();

    if let Some(title) = title {
        draft.title = title;
    }
    if let Some(start) = start {
        draft.start = Some(parse_user_instant(&start)?);
    }
    if let Some(end) = end {
        draft.end = Some(parse_user_instant(&end)?);
    }
    if let Some(description) = description {
        draft.description = Some(description);
    }
    if !attachments.is_empty() {
        draft.attachments = attachments;
    }

    let saved = planner.save(draft, Some(id)).await?;
    println!("Updated event:");
    report_saved(&saved);
    Ok(())
}

async fn cmd_delete(planner: &Planner, id: &str) -> Result<()> {
    planner.delete(id).await?;
    println!("Deleted event {}", id);
    Ok(())
}

async fn cmd_month(
    planner: &Planner,
    year: Option<i32>,
    month: Option<u32>,
    selected: Option<NaiveDate>,
) -> Result<()> {
    let today = Local::now().date_naive();
    let year = year.unwrap_or(today.year());
    let month = month.unwrap_or(today.month());

    let grid = month_grid(year, month);
    if grid.is_empty() {
        anyhow::bail!("Invalid month: {}-{}", year, month);
    }

    let events = planner.list(None).await?;

    println!("{}", grid[0][6].format("%B %Y"));
    println!("  Sun    Mon    Tue    Wed    Thu    Fri    Sat");
    for week in &grid {
        let row: Vec<String> = week
            .iter()
            .map(|day| {
                let style = DayStyle::for_date(*day, selected, today);
                let count = events_on(&events, *day, &Local).len();
                let dots = if count > 0 { format!("({})", count) } else { String::new() };
                format!("{}{:>2}{:<4}", style.marker(), day.day(), dots)
            })
            .collect();
        println!("{}", row.join(" "));
    }

    if let Some(day) = selected {
        println!();
        if !can_create_on(day, today) {
            println!("New events can only be added within the current month.");
        }
        let on_day = events_on(&events, day, &Local);
        if on_day.is_empty() {
            println!("No events on {}.", day);
        }
        for event in on_day {
            print_event(event);
        }
    }
    Ok(())
}

async fn cmd_watch(planner: &Planner, refresh_secs: u64) -> Result<()> {
    match planner.scheduler().permission_gate().request_permission() {
        Permission::Granted => {}
        other => tracing::warn!(permission = %other, "Reminders will not be shown"),
    }

    let armed = planner.schedule_upcoming().await?;
    tracing::info!(armed, "Watching for upcoming events");
    println!("Watching {} upcoming event(s). Press Ctrl-C to stop.", armed);

    let mut ticker = tokio::time::interval(Duration::from_secs(refresh_secs.max(1)));
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => match planner.refresh().await {
                Ok(summary) if summary.scheduled + summary.cancelled > 0 => {
                    tracing::info!(
                        scheduled = summary.scheduled,
                        cancelled = summary.cancelled,
                        "Reminders updated"
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to refresh events: {}", e.user_message()),
            },
        }
    }

    planner.shutdown();
    println!("Stopped.");
    Ok(())
}
