use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rustyline::{history::FileHistory, CompletionType, Config, Editor};

use cloudmagnet::auth::{AuthSessionController, SimulatedIdentityProvider};
use cloudmagnet::cloud::InMemoryCloudStorage;
use cloudmagnet::config::{parse_size, AppConfig, CliConfig, FileConfig};
use cloudmagnet::downloads::{DownloadQueue, SharedQueue, SimulatedDownloadEngine};
use cloudmagnet::{AppEvent, DashboardService, EventBus, Plan};

mod cli_style;
use cli_style::{get_styles, print_banner, print_error, print_notice};

mod repl;
use repl::{execute_command, CommandExecutionResult, MyHelper, ReplContext, PROMPT};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles=get_styles())]
struct CliArgs {
    /// Path to a TOML config file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Subscription plan (free, smart, pro, team).
    #[clap(long, default_value = "free")]
    pub plan: Plan,

    /// Storage quota, e.g. "25 GB". Defaults to the plan's quota.
    #[clap(long, value_parser = parse_size)]
    pub quota: Option<u64>,

    /// Seconds to wait for the identity provider.
    #[clap(long, default_value_t = 30)]
    pub auth_timeout_sec: u64,

    /// Seconds to wait for the download engine to accept a link.
    #[clap(long, default_value_t = 30)]
    pub submission_timeout_sec: u64,

    /// Cloud folder completed downloads are saved to.
    #[clap(long)]
    pub destination_root: Option<String>,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            plan: args.plan,
            quota_bytes: args.quota,
            auth_timeout_sec: args.auth_timeout_sec,
            submission_timeout_sec: args.submission_timeout_sec,
            destination_root: args.destination_root.clone(),
        }
    }
}

/// Prints a notice for every event that has one.
async fn run_notice_printer(mut rx: broadcast::Receiver<AppEvent>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            received = rx.recv() => {
                match received {
                    Ok(event) => {
                        debug!("Event: {:?}", event);
                        if let Some(notice) = event.notice() {
                            print_notice(&notice);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Notice printer lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Event bus closed");
                        break;
                    }
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let config = AppConfig::resolve(&CliConfig::from(&cli_args), file_config)?;
    info!(
        "Plan {} with {} bytes of quota, saving to {}",
        config.plan.as_str(),
        config.quota_bytes,
        config.destination_root
    );

    let events = EventBus::new();
    let shutdown = CancellationToken::new();

    let identity = Arc::new(SimulatedIdentityProvider::new(config.identity.latency));
    identity.set_available(config.identity.available);
    let auth = AuthSessionController::new(identity.clone(), events.clone())
        .with_timeout(config.auth_timeout());

    let engine = Arc::new(SimulatedDownloadEngine::new(config.engine.clone()));
    let queue = SharedQueue::new(DownloadQueue::new(config.queue_settings()));
    let cloud = Arc::new(InMemoryCloudStorage::new(&config.cloud.connected));
    let dashboard = DashboardService::new(queue, engine.clone(), cloud, events.clone())
        .with_submission_timeout(config.submission_timeout())
        .with_recent_limit(config.recent_limit);

    let notice_task = tokio::spawn(run_notice_printer(events.subscribe(), shutdown.clone()));
    let pump_task = dashboard.start_progress_pump(shutdown.clone());
    let engine_task = tokio::spawn(engine.clone().run(shutdown.clone()));

    let ctx = ReplContext {
        auth,
        dashboard,
        identity,
        config,
    };

    print_banner();
    repl::print_help()?;

    let rl_config = Config::builder()
        .completion_type(CompletionType::List)
        .build();

    let mut rl = Editor::<MyHelper, FileHistory>::with_config(rl_config)?;

    let helper = MyHelper::new();
    rl.set_helper(Some(helper));

    loop {
        let readline = tokio::task::block_in_place(|| rl.readline(PROMPT));

        match readline {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);
                match execute_command(line, &ctx).await {
                    CommandExecutionResult::Ok => {}
                    CommandExecutionResult::Exit => {
                        break;
                    }
                    CommandExecutionResult::Error(err) => {
                        print_error(&err);
                        continue;
                    }
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("CTRL-D: exiting.");
                break;
            }
            Err(e) => {
                println!("Error: {:?}", e);
                break;
            }
        }
    }

    ctx.dashboard.abandon_submission();
    ctx.auth.abandon();
    shutdown.cancel();
    for (name, task) in [
        ("notice printer", notice_task),
        ("progress pump", pump_task),
        ("download engine", engine_task),
    ] {
        if let Err(e) = task.await {
            warn!("{} task ended abnormally: {}", name, e);
        }
    }
    info!("Bye");
    Ok(())
}
