//! GitDesk console front-end.
//!
//! Drives the application core from a terminal: account management, one-shot
//! list dumps and an auto-refresh loop that prints desktop notifications.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use gitdesk::app::{App, StartupOutcome};
use gitdesk::managers::refresh_engine::RefreshReport;
use gitdesk::managers::session_registry::AddAccountOutcome;
use gitdesk::managers::ui_dispatch::UiQueue;
use gitdesk::platform;
use gitdesk::services::device_flow::AuthPrompt;
use gitdesk::services::http_transport::ReqwestTransport;
use gitdesk::services::notifier::LogNotifier;
use gitdesk::types::auth::DeviceCode;

const DEFAULT_LOGGING_CONFIG: &str = "gitdesk=info";

#[derive(Parser, Debug)]
#[command(name = "gitdesk", version, about = "Desktop GitHub client core")]
struct Cli {
    /// Configuration directory (defaults to the platform config dir).
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List signed-in accounts.
    Accounts,
    /// Sign in an additional account.
    AddAccount,
    /// Remove the account at the given list position.
    RemoveAccount { position: usize },
    /// List the current account's repositories.
    Repos {
        #[arg(long, default_value = "updated")]
        sort: String,
    },
    /// List notifications.
    Notifications {
        /// Include read notifications.
        #[arg(long)]
        all: bool,
    },
    /// Show the received-events feed.
    Feed,
    /// Refresh periodically and report changes until interrupted.
    Watch {
        /// Minutes between refreshes; defaults to the configured interval.
        #[arg(long)]
        interval: Option<u64>,
    },
}

fn configure_logging() {
    use tracing_subscriber::EnvFilter;

    // Logging may be already initialized when running under tests
    if tracing::dispatcher::has_been_set() {
        return;
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOGGING_CONFIG));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Prints the device code and waits for Ctrl-C to cancel.
struct ConsolePrompt {
    cancelled: Arc<AtomicBool>,
}

impl ConsolePrompt {
    fn new(cancelled: Arc<AtomicBool>) -> Self {
        Self { cancelled }
    }
}

#[cfg(feature = "clipboard")]
fn copy_to_clipboard(text: &str) -> bool {
    match arboard::Clipboard::new().and_then(|mut c| c.set_text(text.to_string())) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, "clipboard unavailable");
            false
        }
    }
}

#[cfg(not(feature = "clipboard"))]
fn copy_to_clipboard(_text: &str) -> bool {
    false
}

#[async_trait]
impl AuthPrompt for ConsolePrompt {
    async fn present_code(&self, code: &DeviceCode) -> bool {
        eprintln!();
        eprintln!("To sign in, open {} and enter the code {}", code.verification_uri, code.user_code);
        if copy_to_clipboard(&code.user_code) {
            eprintln!("(the code has been copied to your clipboard)");
        }
        eprintln!("Waiting for authorization... press Ctrl-C to cancel.");
        !self.cancelled.load(Ordering::SeqCst)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn notify_failure(&self, message: &str) {
        eprintln!("Sign-in failed: {}", message);
    }
}

fn print_report(report: &RefreshReport) {
    println!(
        "feed: {}  repos: {}  starred: {}  watched: {}  following: {}  notifications: {}",
        report.feed.len(),
        report.repos.len(),
        report.starred.len(),
        report.watched.len(),
        report.following.len(),
        report.notifications.len()
    );
    for change in &report.notified {
        println!("  * {}: {}", change.title, change.message);
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error + Send + Sync>> {
    let cancelled = Arc::new(AtomicBool::new(false));
    let shutdown = CancellationToken::new();
    {
        let cancelled = Arc::clone(&cancelled);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancelled.store(true, Ordering::SeqCst);
                shutdown.cancel();
            }
        });
    }

    let config_dir = cli.config_dir.unwrap_or_else(platform::get_config_dir);
    let transport = Arc::new(ReqwestTransport::new()?);
    let mut app = App::new(
        config_dir,
        transport,
        Arc::new(ConsolePrompt::new(cancelled)),
        Arc::new(LogNotifier),
    )?;

    if app.load().await == StartupOutcome::Exit {
        eprintln!("No GitHub account is signed in.");
        return Ok(ExitCode::FAILURE);
    }

    match cli.command {
        Command::Accounts => {
            let current = app.registry.current_index();
            for (i, account) in app.registry.accounts().iter().enumerate() {
                let marker = if Some(i) == current { "*" } else { " " };
                println!(
                    "{} {}: {} ({}) [{}]",
                    marker,
                    account.slot(),
                    account.username(),
                    account.display_name(),
                    account.state().as_str()
                );
            }
        }
        Command::AddAccount => match app.add_account().await {
            AddAccountOutcome::Added(position) => println!("Added account at position {}", position),
            AddAccountOutcome::Cancelled { .. } => println!("Cancelled"),
            AddAccountOutcome::Failed { reason, .. } => {
                eprintln!("Could not add account: {}", reason);
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::RemoveAccount { position } => {
            app.remove_account(position)?;
            println!("Removed account {}", position);
        }
        Command::Repos { sort } => {
            let Some(account) = app.registry.current() else {
                return Ok(ExitCode::FAILURE);
            };
            let template = app.settings_snapshot().general.repo_template;
            let now = Utc::now();
            for repo in account.get_repos(&sort).await {
                println!("{}", repo.render_template(&template, now));
            }
        }
        Command::Notifications { all } => {
            let Some(account) = app.registry.current() else {
                return Ok(ExitCode::FAILURE);
            };
            let now = Utc::now();
            for notification in account.get_notifications(all, false).await {
                println!("{}", notification.format_display(now));
            }
        }
        Command::Feed => {
            let Some(account) = app.registry.current() else {
                return Ok(ExitCode::FAILURE);
            };
            let now = Utc::now();
            for event in account.get_received_events().await {
                println!("{}", event.format_display(now));
            }
        }
        Command::Watch { interval } => {
            if let Some(report) = app.refresh_current().await {
                print_report(&report);
            }
            let minutes = interval.unwrap_or(app.settings_snapshot().refresh.auto_refresh_interval_minutes);
            if minutes == 0 {
                eprintln!("Auto-refresh is disabled; pass --interval or set refresh.auto_refresh_interval_minutes.");
                return Ok(ExitCode::SUCCESS);
            }

            let (mut queue, handle) = UiQueue::<Vec<RefreshReport>>::new();
            let worker = app.spawn_auto_refresh_every(minutes, handle, shutdown.clone(), |reports, report| {
                reports.push(report)
            });
            info!(minutes, "watching for changes");

            let mut reports = Vec::new();
            while queue.next(&mut reports).await {
                for report in reports.drain(..) {
                    print_report(&report);
                }
            }
            worker.await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    configure_logging();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "gitdesk failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
