//! `exprem` - CLI for expiry-reminder
//!
//! This binary manages tracked items and settings, and runs the reminder
//! daemon that delivers expiry notifications.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::future::Future;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};

use expiry_reminder::analytics::{Analytics, Bar};
use expiry_reminder::classify::{status_tag, Dashboard};
use expiry_reminder::cli::{
    Cli, Command, ConfigCommand, DaemonCommand, NotifyCommand, SettingsCommand,
};
use expiry_reminder::clock::{Clock, SystemClock};
use expiry_reminder::delivery::{
    AlertNotifier, Delivery, DeliveryGateway, ForegroundNotifier, Notification,
    NotificationBackend, Permission, PermissionPrompt, PopupPresenter, StoredPermission,
    TerminalInput, TerminalPopup,
};
use expiry_reminder::engine::NotificationEngine;
use expiry_reminder::item::{format_expiry, Item, NewItem};
use expiry_reminder::scheduler::{next_anchor, Scheduler};
use expiry_reminder::settings::{clamp_lead_days, NotifyTime, Settings};
use expiry_reminder::storage::{self, SharedStorage};
use expiry_reminder::{dedup, init_logging, Config, Error, Storage};

// Platform-specific imports using conditional compilation
#[cfg(target_os = "linux")]
use expiry_reminder_linux as platform;

#[cfg(target_os = "macos")]
use expiry_reminder_mac as platform;

/// Width of the longest bar in text charts.
const BAR_WIDTH: usize = 30;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    if let Command::Config(config_cmd) = cli.command {
        return handle_config(&config, config_cmd);
    }

    let storage = Storage::open(config.database_path())
        .with_context(|| format!("opening {}", config.database_path().display()))?;
    let clock = SystemClock;

    match cli.command {
        Command::Add(cmd) => handle_add(&storage, &clock, cmd),
        Command::List(cmd) => handle_list(&storage, &clock, cmd.json),
        Command::Dashboard(cmd) => handle_dashboard(&storage, &clock, cmd.json),
        Command::Delete(cmd) => handle_delete(&storage, &cmd.id),
        Command::Clear(cmd) => handle_clear(&storage, cmd.yes),
        Command::Analytics(cmd) => handle_analytics(&storage, &clock, cmd.json),
        Command::Settings(cmd) => handle_settings(&storage, &clock, cmd),
        Command::Notify(cmd) => block_on(handle_notify(&config, storage.into_shared(), cmd)),
        Command::Daemon(DaemonCommand::Start { interactive }) => {
            block_on(run_daemon(&config, storage.into_shared(), interactive))
        }
        Command::Status(cmd) => handle_status(&config, &storage, &clock, cmd.json),
        Command::Config(_) => Ok(()),
    }
}

/// Run a future on a single-threaded runtime.
fn block_on<F: Future<Output = anyhow::Result<()>>>(future: F) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building the async runtime")?
        .block_on(future)
}

/// Desktop notifications through the platform crate.
#[derive(Debug)]
struct PlatformNotifier {
    app_name: String,
}

#[async_trait::async_trait]
impl NotificationBackend for PlatformNotifier {
    fn name(&self) -> &'static str {
        "system"
    }

    async fn register(&self) -> bool {
        let init = platform::init().map_err(|e| e.to_string());
        if let Err(e) = init {
            warn!(platform = platform::platform_name(), error = %e, "Platform init failed");
            return false;
        }
        tokio::task::spawn_blocking(platform::notifications_available)
            .await
            .unwrap_or(false)
    }

    async fn show(&self, notification: &Notification) -> expiry_reminder::Result<()> {
        let app_name = self.app_name.clone();
        let title = notification.title.clone();
        let body = notification.body.clone();
        tokio::task::spawn_blocking(move || platform::show_notification(&app_name, &title, &body))
            .await
            .map_err(|e| Error::platform(e.to_string()))?
            .map_err(|e| Error::delivery("system", e.to_string()))
    }
}

fn build_engine(config: &Config, storage: SharedStorage, interactive: bool) -> NotificationEngine {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let mut backends: Vec<Box<dyn NotificationBackend>> = Vec::new();
    if config.delivery.system_notifications {
        backends.push(Box::new(PlatformNotifier {
            app_name: config.delivery.app_name.clone(),
        }));
    }
    backends.push(Box::new(ForegroundNotifier));
    backends.push(Box::new(AlertNotifier));

    let input = std::io::stdin()
        .is_terminal()
        .then(|| Arc::new(TerminalInput::stdin()));
    let permission = Arc::new(StoredPermission::new(storage.clone(), input.clone()));
    let gateway = DeliveryGateway::new(backends, permission);

    let popup = Arc::new(TerminalPopup::new(
        input.filter(|_| interactive),
        config.scheduler.snooze_minutes,
    ));
    let popups = PopupPresenter::new(popup, Arc::clone(&clock), config.snooze_delay());

    NotificationEngine::new(
        storage,
        gateway,
        popups,
        clock,
        config.delivery.preview_limit,
    )
}

/// Wait until every presented popup has been shown and answered.
async fn drain_popups(engine: &NotificationEngine) {
    while engine.popups().pending() > 0 {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

fn handle_add(
    storage: &Storage,
    clock: &dyn Clock,
    cmd: expiry_reminder::cli::AddCommand,
) -> anyhow::Result<()> {
    let item = storage.add_item(
        NewItem {
            name: cmd.name,
            category: cmd.category,
            expiry: Some(cmd.expiry),
            quantity: cmd.quantity,
        },
        Utc::now(),
    )?;
    let settings = storage.load_settings()?;
    println!(
        "Added {} [{}], expires {} ({})",
        item.name,
        item.id,
        format_expiry(&item.expiry),
        status_tag(&item, settings.lead_days, clock.today())
    );
    Ok(())
}

fn print_item_rows(items: &[Item], settings: &Settings, clock: &dyn Clock) {
    for item in items {
        let quantity = item
            .quantity
            .as_deref()
            .map(|q| format!(" x{q}"))
            .unwrap_or_default();
        println!(
            "  {:<8}  {:<24} {:<16} {:<14} {}",
            item.id,
            format!("{}{quantity}", item.name),
            item.category_label(),
            format_expiry(&item.expiry),
            status_tag(item, settings.lead_days, clock.today())
        );
    }
}

fn handle_list(storage: &Storage, clock: &dyn Clock, json: bool) -> anyhow::Result<()> {
    let items = storage.items_by_expiry()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    if items.is_empty() {
        println!("No items yet. Add one with `exprem add`.");
        return Ok(());
    }
    print_item_rows(&items, &storage.load_settings()?, clock);
    Ok(())
}

fn handle_dashboard(storage: &Storage, clock: &dyn Clock, json: bool) -> anyhow::Result<()> {
    let settings = storage.load_settings()?;
    let dashboard = Dashboard::build(&storage.load_items()?, settings.lead_days, clock.today());

    if json {
        let value = serde_json::json!({
            "today": dashboard.today,
            "upcoming": dashboard.upcoming,
            "safe": dashboard.safe,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let sections = [
        ("Today", &dashboard.today),
        ("Upcoming", &dashboard.upcoming),
        ("Safe", &dashboard.safe),
    ];
    for (heading, items) in sections {
        println!("{heading} ({})", items.len());
        if items.is_empty() {
            println!("  -");
        } else {
            print_item_rows(items, &settings, clock);
        }
        println!();
    }
    Ok(())
}

fn handle_delete(storage: &Storage, id: &str) -> anyhow::Result<()> {
    let Some(item) = storage.get_item(id)? else {
        bail!("no item with id '{id}'");
    };
    storage.delete_item(id)?;
    println!("Deleted {} ({id})", item.name);
    Ok(())
}

fn handle_clear(storage: &Storage, yes: bool) -> anyhow::Result<()> {
    if !yes {
        println!("This removes every item.");
        println!("Use --yes to confirm.");
        return Ok(());
    }
    storage.clear_items()?;
    println!("All items removed.");
    Ok(())
}

fn print_bars(bars: &[Bar]) {
    let max = bars.iter().map(|bar| bar.count).max().unwrap_or(0).max(1);
    for bar in bars {
        let width = bar.count * BAR_WIDTH / max;
        println!(
            "  {:<16} {:<pad$} {}",
            bar.label,
            "#".repeat(width),
            bar.count,
            pad = BAR_WIDTH
        );
    }
}

fn handle_analytics(storage: &Storage, clock: &dyn Clock, json: bool) -> anyhow::Result<()> {
    let settings = storage.load_settings()?;
    let analytics = Analytics::compute(&storage.load_items()?, settings.lead_days, clock.today());

    if json {
        println!("{}", serde_json::to_string_pretty(&analytics)?);
        return Ok(());
    }

    let counts = analytics.counts;
    println!("Items:    {}", counts.total);
    println!("Today:    {}", counts.today);
    println!("Soon:     {}", counts.soon);
    println!("Safe:     {}", counts.safe);
    println!("Expired:  {}", counts.expired);
    println!();
    println!("By category");
    if analytics.categories.is_empty() {
        println!("  -");
    } else {
        print_bars(&analytics.categories);
    }
    println!();
    println!("Next two weeks");
    print_bars(&analytics.timeline);
    Ok(())
}

fn print_settings(settings: &Settings) {
    println!("Lead days:    {}", settings.lead_days);
    println!("Theme:        {}", settings.theme);
    println!(
        "Reminders:    {}",
        if settings.notify { "on" } else { "off" }
    );
    println!("Notify time:  {}", settings.notify_at());
}

fn handle_settings(
    storage: &Storage,
    clock: &dyn Clock,
    cmd: SettingsCommand,
) -> anyhow::Result<()> {
    match cmd {
        SettingsCommand::Show { json } => {
            let settings = storage.load_settings()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
            } else {
                print_settings(&settings);
            }
        }
        SettingsCommand::LeadDays { days } => {
            let saved = storage.update_settings(|s| s.lead_days = clamp_lead_days(days))?;
            if saved.lead_days != days {
                println!("Lead days must be between 1 and 14, using {}.", saved.lead_days);
            }
            println!("Items within {} days count as soon.", saved.lead_days);
        }
        SettingsCommand::Theme { theme } => {
            let saved = storage.update_settings(|s| s.theme = theme.into())?;
            println!("Theme set to {}.", saved.theme);
        }
        SettingsCommand::Notify { state } => {
            let saved = storage.update_settings(|s| s.notify = state.is_on())?;
            if saved.notify {
                let next = next_anchor(clock.now(), saved.notify_at());
                println!(
                    "Reminders on. Next daily reminder {} while `exprem daemon start` runs.",
                    next.format("%Y-%m-%d %H:%M")
                );
            } else {
                println!("Reminders off.");
            }
        }
        SettingsCommand::NotifyTime { time } => {
            let parsed = NotifyTime::parse(&time);
            let saved = storage.update_settings(|s| s.notify_time = time.trim().to_string())?;
            println!("Daily reminder at {parsed}.");
            if !saved.notify {
                println!("Reminders are off. Turn them on with `exprem settings notify on`.");
            }
        }
    }
    Ok(())
}

async fn handle_notify(
    config: &Config,
    storage: SharedStorage,
    cmd: NotifyCommand,
) -> anyhow::Result<()> {
    match cmd {
        NotifyCommand::Check { json } => {
            let engine = build_engine(config, storage, false);
            let report = engine.run_check().await?;
            drain_popups(&engine).await;

            if json {
                let value = serde_json::json!({
                    "disabled": report.disabled,
                    "delivered": report.delivered,
                    "already_sent": report.already_sent,
                    "expired": report.expired,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else if report.disabled {
                println!("Reminders are off. Turn them on with `exprem settings notify on`.");
            } else if report.delivered.is_empty() {
                println!("Nothing new to remind about.");
            }
        }
        NotifyCommand::Test => {
            let engine = build_engine(config, storage, false);
            engine
                .gateway()
                .ensure_permitted()
                .context("allow notifications with `exprem notify permission`")?;
            match engine.send_test().await {
                Delivery::Delivered(backend) => println!("Test notification sent ({backend})."),
                Delivery::Unavailable => println!("No notification backend is available."),
            }
        }
        NotifyCommand::Permission { reset, grant, deny } => {
            let stored = StoredPermission::new(storage.clone(), None);
            if reset {
                stored.set(Permission::Default)?;
            } else if grant {
                stored.set(Permission::Granted)?;
            } else if deny {
                stored.set(Permission::Denied)?;
            }

            if stored.current() == Permission::Default {
                let engine = build_engine(config, storage, false);
                engine.gateway().request_permission().await;
            }
            println!("Notification permission: {}", stored.current());
        }
    }
    Ok(())
}

async fn run_daemon(
    config: &Config,
    storage: SharedStorage,
    interactive: bool,
) -> anyhow::Result<()> {
    let interactive = interactive || config.delivery.interactive_popups;
    let engine = Arc::new(build_engine(config, storage, interactive));
    info!(platform = platform::platform_name(), "Reminder daemon starting");

    match engine.show_today() {
        Ok(0) => {}
        Ok(shown) => info!(items = shown, "Showing items that expire today"),
        Err(e) => warn!(error = %e, "Failed to show items that expire today"),
    }

    let mut scheduler = Scheduler::new(
        Arc::clone(&engine),
        config.tick_interval(),
        config.daily_interval(),
    );
    match scheduler.reconcile().await {
        Ok(()) => match scheduler.status().next_fire {
            Some(next) => {
                let backends = engine.gateway().available_backends().await;
                info!(?backends, "Delivery backends registered");
                println!("Next daily reminder at {}", next.format("%Y-%m-%d %H:%M"));
            }
            None => println!("Reminders are off. Turn them on with `exprem settings notify on`."),
        },
        Err(e) => warn!(error = %e, "Failed to start reminders, retrying on the next tick"),
    }

    let period = config.tick_interval();
    let mut settings_tick = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for shutdown signal");
                }
                break;
            }
            _ = settings_tick.tick() => {
                if let Err(e) = scheduler.reconcile().await {
                    warn!(error = %e, "Failed to apply settings");
                }
            }
        }
    }

    scheduler.stop();
    let status = scheduler.status();
    info!(
        cycles = status.cycles,
        deliveries = status.deliveries,
        "Reminder daemon stopped"
    );
    Ok(())
}

fn handle_status(
    config: &Config,
    storage: &Storage,
    clock: &dyn Clock,
    json: bool,
) -> anyhow::Result<()> {
    let stats = storage.stats()?;
    let settings = storage.load_settings()?;
    let permission = storage
        .get_record::<Permission>(storage::PERMISSION_KEY)?
        .unwrap_or_default();
    let log = dedup::load(storage)?;
    let next = settings
        .notify
        .then(|| next_anchor(clock.now(), settings.notify_at()));

    if json {
        let status = serde_json::json!({
            "platform": platform::platform_name(),
            "database_path": config.database_path(),
            "items": stats.total_items,
            "db_size_bytes": stats.db_size_bytes,
            "reminders": settings.notify,
            "notify_time": settings.notify_at().to_string(),
            "next_reminder": next.map(|at| at.format("%Y-%m-%dT%H:%M").to_string()),
            "permission": permission,
            "log_day": log.day,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("exprem status");
        println!("-------------");
        println!("Platform:      {}", platform::platform_name());
        println!("Database:      {}", config.database_path().display());
        println!("Items:         {}", stats.total_items);
        println!("Database size: {} bytes", stats.db_size_bytes);
        println!("Permission:    {permission}");
        match next {
            Some(at) => println!("Next reminder: {}", at.format("%Y-%m-%d %H:%M")),
            None => println!("Reminders:     off"),
        }
        if !log.day.is_empty() {
            println!("Last check:    {}", log.day);
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:        {}", config.database_path().display());
                println!();
                println!("[Scheduler]");
                println!(
                    "  Tick interval (secs): {}",
                    config.scheduler.tick_interval_secs
                );
                println!(
                    "  Daily interval (h):   {}",
                    config.scheduler.daily_interval_hours
                );
                println!("  Snooze (min):         {}", config.scheduler.snooze_minutes);
                println!();
                println!("[Delivery]");
                println!(
                    "  System notifications: {}",
                    config.delivery.system_notifications
                );
                println!("  Preview limit:        {}", config.delivery.preview_limit);
                println!("  App name:             {}", config.delivery.app_name);
                println!(
                    "  Interactive popups:   {}",
                    config.delivery.interactive_popups
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
