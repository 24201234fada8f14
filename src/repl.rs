use std::sync::Arc;

use byte_unit::{Byte, UnitType};
use clap::{CommandFactory, Parser, Subcommand};
use rustyline::{completion::Completer, highlight::Highlighter, validate::Validator, Helper};

use cloudmagnet::auth::{AuthError, OAuthProvider, SimulatedIdentityProvider};
use cloudmagnet::cloud::CloudProvider;
use cloudmagnet::config::AppConfig;
use cloudmagnet::downloads::{DownloadRecord, DownloadStatus};
use cloudmagnet::{AuthMode, AuthSessionController, CredentialInput, DashboardService, Plan, QueueError};

use crate::cli_style::{
    get_styles, print_empty_list, print_key_value, print_section_footer,
    print_section_header, print_success, print_warning, progress_bar, TableBuilder,
};

#[derive(Parser)]
#[command(styles=get_styles(),name = "")]
struct InnerCli {
    #[command(subcommand)]
    command: InnerCommand,
}

#[derive(Subcommand)]
enum InnerCommand {
    /// Signs in with email and password.
    Login { email: String, password: String },

    /// Creates an account and signs in with it.
    Signup {
        email: String,
        password: String,
        confirm_password: String,
    },

    /// Signs in through a third-party provider (google, github).
    Oauth { provider: OAuthProvider },

    /// Ends the current session.
    Logout,

    /// Shows the signed-in identity.
    Whoami,

    /// Adds a magnet link to the download queue.
    /// Quote the link, it usually contains '&'.
    Add { magnet_link: String },

    /// Pauses a download, by id or id prefix.
    Pause { id: String },

    /// Resumes a paused download, or retries a failed one.
    Resume { id: String },

    /// Cancels a download and removes it from the queue.
    Cancel { id: String },

    /// Shows active and recent downloads.
    Status,

    /// Shows the details of a single download.
    Show { id: String },

    /// Shows storage usage against the plan quota.
    Storage,

    /// Shows the dashboard quick stats.
    Stats,

    /// Lists cloud drives and whether they are connected.
    Clouds,

    /// Connects a cloud drive (google_drive, dropbox, onedrive).
    Connect { provider: CloudProvider },

    /// Disconnects a cloud drive.
    Disconnect { provider: CloudProvider },

    /// Prints the whole dashboard as JSON.
    Snapshot,

    /// Lists the available plans.
    Plans,

    /// Makes the simulated identity provider go down or come back.
    IdentityAvailable {
        #[arg(action = clap::ArgAction::Set)]
        available: bool,
    },

    /// Close this program.
    Exit,
}

pub enum CommandExecutionResult {
    Ok,
    Exit,
    Error(String),
}

pub const PROMPT: &str = ">> ";

/// Everything a command can act on.
pub struct ReplContext {
    pub auth: AuthSessionController,
    pub dashboard: DashboardService,
    pub identity: Arc<SimulatedIdentityProvider>,
    pub config: AppConfig,
}

pub fn format_size(bytes: u64) -> String {
    let adjusted = Byte::from_u64(bytes).get_appropriate_unit(UnitType::Decimal);
    format!("{:.1}", adjusted)
}

fn format_eta(seconds: u64) -> String {
    if seconds == 0 {
        return "-".to_string();
    }
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{}h {:02}m", h, m)
    } else {
        format!("{}m {:02}s", m, s)
    }
}

fn download_row(record: &DownloadRecord) -> Vec<String> {
    let speed = if record.status == DownloadStatus::Downloading {
        format!("{}/s", format_size(record.speed_bytes_per_sec))
    } else {
        "-".to_string()
    };
    vec![
        record.id.short(),
        record.name.clone(),
        record.status.to_string(),
        progress_bar(record.progress_percent, 10),
        format_size(record.size_bytes),
        speed,
        format_eta(record.eta_seconds),
    ]
}

fn print_downloads(title: &str, records: &[DownloadRecord]) {
    print_section_header(title);
    if records.is_empty() {
        print_empty_list("Nothing here yet");
        print_section_footer();
        return;
    }
    let mut table = TableBuilder::new(vec![
        "ID", "Name", "Status", "Progress", "Size", "Speed", "ETA",
    ]);
    for record in records {
        table.add_row(download_row(record));
    }
    table.print();
}

fn print_record(record: &DownloadRecord) {
    print_section_header(&record.name);
    print_key_value("Id", &record.id.to_string());
    print_key_value("Status", record.status.as_str());
    print_key_value("Progress", &progress_bar(record.progress_percent, 20));
    print_key_value("Size", &format_size(record.size_bytes));
    print_key_value("Info hash", &record.magnet.info_hash);
    if let Some(job_id) = &record.job_id {
        print_key_value("Engine job", &job_id.to_string());
    }
    if let Some(path) = &record.cloud_destination_path {
        print_key_value("Saved to", path);
    }
    if let Some(error) = &record.error {
        print_key_value("Error", error);
    }
    print_key_value("Added", &record.created_at.to_rfc3339());
    if let Some(completed_at) = record.completed_at {
        print_key_value("Completed", &completed_at.to_rfc3339());
    }
    print_section_footer();
}

// Failures that publish an event already get a notice printed by the
// notice task, only the silent ones are reported here.
fn report_auth_error(err: AuthError) -> CommandExecutionResult {
    match err {
        AuthError::InProgress => CommandExecutionResult::Error(err.to_string()),
        AuthError::Abandoned => {
            print_warning(&err.to_string());
            CommandExecutionResult::Ok
        }
        _ => CommandExecutionResult::Ok,
    }
}

fn report_submission_error(err: QueueError) -> CommandExecutionResult {
    if err == QueueError::Abandoned {
        print_warning(&err.to_string());
    }
    CommandExecutionResult::Ok
}

impl ReplContext {
    fn require_session(&self) -> Result<(), String> {
        match self.auth.session() {
            Some(_) => Ok(()),
            None => Err("Sign in first (login, signup or oauth)".to_string()),
        }
    }

    async fn download_action(&self, action: &str, id: &str) -> CommandExecutionResult {
        let id = match self.dashboard.resolve_id(id) {
            Ok(id) => id,
            Err(err) => return CommandExecutionResult::Error(err.to_string()),
        };
        let result = match action {
            "pause" => self.dashboard.pause(id).await,
            "resume" => self.dashboard.resume(id).await,
            _ => self.dashboard.cancel(id).await,
        };
        match result {
            Ok(record) if action == "cancel" => {
                print_success(&format!("{} cancelled", record.name));
                CommandExecutionResult::Ok
            }
            Ok(record) => {
                print_success(&format!("{} is {}", record.name, record.status));
                CommandExecutionResult::Ok
            }
            Err(err) => CommandExecutionResult::Error(err.to_string()),
        }
    }
}

pub async fn execute_command(line: String, ctx: &ReplContext) -> CommandExecutionResult {
    if line.is_empty() {
        return CommandExecutionResult::Ok;
    }

    let args =
        shlex::split(&line).unwrap_or_else(|| line.split_whitespace().map(String::from).collect());

    let cli = InnerCli::try_parse_from(std::iter::once(" ").chain(args.iter().map(String::as_str)));

    let cli = match cli {
        Ok(cli) => cli,
        Err(e) => {
            if let Err(_) = e.print() {
                println!("{}", e);
            }
            return CommandExecutionResult::Ok;
        }
    };

    let needs_session = !matches!(
        cli.command,
        InnerCommand::Login { .. }
            | InnerCommand::Signup { .. }
            | InnerCommand::Oauth { .. }
            | InnerCommand::Logout
            | InnerCommand::Whoami
            | InnerCommand::Plans
            | InnerCommand::IdentityAvailable { .. }
            | InnerCommand::Exit
    );
    if needs_session {
        if let Err(err) = ctx.require_session() {
            return CommandExecutionResult::Error(err);
        }
    }

    match cli.command {
        InnerCommand::Login { email, password } => {
            let input = CredentialInput::login(email, password);
            if let Err(err) = ctx.auth.submit(AuthMode::Login, &input).await {
                return report_auth_error(err);
            }
        }
        InnerCommand::Signup {
            email,
            password,
            confirm_password,
        } => {
            let input = CredentialInput::signup(email, password, confirm_password);
            if let Err(err) = ctx.auth.submit(AuthMode::Signup, &input).await {
                return report_auth_error(err);
            }
        }
        InnerCommand::Oauth { provider } => {
            if let Err(err) = ctx.auth.login_with_provider(provider).await {
                return report_auth_error(err);
            }
        }
        InnerCommand::Logout => {
            if !ctx.auth.logout() {
                print_warning("Not signed in");
            }
        }
        InnerCommand::Whoami => match ctx.auth.session() {
            Some(session) => {
                print_section_header("Session");
                print_key_value("Identity", &session.identity);
                print_key_value("Signed in", &session.created_at.to_rfc3339());
                print_key_value("Plan", ctx.config.plan.as_str());
                print_section_footer();
            }
            None => print_empty_list("Not signed in"),
        },
        InnerCommand::Add { magnet_link } => {
            if let Err(err) = ctx.dashboard.submit_magnet_link(&magnet_link).await {
                return report_submission_error(err);
            }
        }
        InnerCommand::Pause { id } => return ctx.download_action("pause", &id).await,
        InnerCommand::Resume { id } => return ctx.download_action("resume", &id).await,
        InnerCommand::Cancel { id } => return ctx.download_action("cancel", &id).await,
        InnerCommand::Status => {
            let snapshot = ctx.dashboard.snapshot().await;
            print_downloads("Active downloads", &snapshot.active);
            print_downloads("Recent downloads", &snapshot.recent);
        }
        InnerCommand::Show { id } => {
            let record = ctx
                .dashboard
                .resolve_id(&id)
                .ok()
                .and_then(|id| ctx.dashboard.get(id));
            match record {
                Some(record) => print_record(&record),
                None => return CommandExecutionResult::Error(format!("Download {} not found", id)),
            }
        }
        InnerCommand::Storage => {
            let storage = ctx.dashboard.snapshot().await.storage;
            print_section_header("Storage");
            print_key_value("Used", &format_size(storage.used_bytes));
            print_key_value("Quota", &format_size(storage.quota_bytes));
            print_key_value("Remaining", &format_size(storage.remaining_bytes()));
            print_key_value(
                "Usage",
                &progress_bar(storage.percent_used().min(100.0) as u8, 20),
            );
            print_section_footer();
        }
        InnerCommand::Stats => {
            let stats = ctx.dashboard.snapshot().await.stats;
            print_section_header("Quick stats");
            print_key_value("Total downloads", &stats.total_completed.to_string());
            print_key_value("This week", &stats.completed_this_week.to_string());
            print_key_value("Queued items", &stats.queued_items.to_string());
            print_key_value("Failed", &stats.failed.to_string());
            print_key_value(
                "Success rate",
                &stats
                    .success_rate_percent
                    .map(|rate| format!("{:.0}%", rate))
                    .unwrap_or_else(|| "-".to_string()),
            );
            print_section_footer();
        }
        InnerCommand::Clouds => match ctx.dashboard.cloud_connections().await {
            Ok(connections) => {
                let mut table = TableBuilder::new(vec!["Provider", "Status"]);
                for connection in connections {
                    let status = if connection.connected {
                        "connected"
                    } else {
                        "not connected"
                    };
                    table.add_row(vec![connection.provider.to_string(), status.to_string()]);
                }
                table.print();
            }
            Err(err) => return CommandExecutionResult::Error(err.to_string()),
        },
        InnerCommand::Connect { provider } => {
            if let Err(err) = ctx.dashboard.connect_cloud(provider).await {
                return CommandExecutionResult::Error(err.to_string());
            }
        }
        InnerCommand::Disconnect { provider } => {
            if let Err(err) = ctx.dashboard.disconnect_cloud(provider).await {
                return CommandExecutionResult::Error(err.to_string());
            }
        }
        InnerCommand::Snapshot => {
            let snapshot = ctx.dashboard.snapshot().await;
            match serde_json::to_string_pretty(&snapshot) {
                Ok(json) => println!("{}", json),
                Err(err) => return CommandExecutionResult::Error(err.to_string()),
            }
        }
        InnerCommand::Plans => {
            let mut table = TableBuilder::new(vec!["Plan", "Quota", "Concurrent downloads"]);
            for plan in Plan::ALL {
                let marker = if plan == ctx.config.plan { " (current)" } else { "" };
                table.add_row(vec![
                    format!("{}{}", plan.as_str(), marker),
                    format_size(plan.quota_bytes()),
                    plan.max_concurrent_downloads()
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "unlimited".to_string()),
                ]);
            }
            table.print();
        }
        InnerCommand::IdentityAvailable { available } => {
            ctx.identity.set_available(available);
            print_success(&format!(
                "Identity provider is {}",
                if available { "up" } else { "down" }
            ));
        }
        InnerCommand::Exit => {
            return CommandExecutionResult::Exit;
        }
    }
    CommandExecutionResult::Ok
}

pub fn print_help() -> std::io::Result<()> {
    InnerCli::command().print_long_help()
}

#[derive(rustyline_derive::Hinter)]
pub struct MyHelper {
    commands_names: Vec<String>,
}

impl MyHelper {
    pub fn new() -> Self {
        let commands_names: Vec<String> = InnerCli::command()
            .get_subcommands()
            .map(|sc| sc.get_name().to_string())
            .collect();

        MyHelper { commands_names }
    }
}

impl Completer for MyHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        if line.contains(" ") {
            return Ok((0, Vec::with_capacity(0)));
        }
        let matches = self
            .commands_names
            .iter()
            .filter(|c| c.starts_with(line))
            .map(|c| c.to_string())
            .collect::<Vec<_>>();

        Ok((0, matches))
    }
}

impl Highlighter for MyHelper {}
impl Validator for MyHelper {}
impl Helper for MyHelper {}
