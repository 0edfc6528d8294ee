use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use chatarchive::export::Cadence;
use chatarchive::schedule::{
    ExportRequest, describe_schedule, next_run, run_export, schedule_for, should_run_now,
};
use chatarchive::session::{self, require};
use chatarchive::slack::SlackClient;
use chatarchive::store::{Archive, FileStore};
use chatarchive::{Config, auth::Role, logging};

mod browse_cmd;

#[derive(Parser)]
#[command(name = "chatarchive", version, about = "Archive and browse a chat workspace export")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a session with a passkey (prompted when omitted)
    Login {
        #[arg(long, conflicts_with = "guest")]
        passkey: Option<String>,
        /// Browse export directories without a passkey
        #[arg(long)]
        guest: bool,
    },
    /// End the current session
    Logout,
    /// Show the current session role
    Whoami,

    /// Replace the stored archive with an export directory (admin)
    Import { dir: PathBuf },

    /// List channels
    Channels {
        /// Read an export directory instead of the stored archive
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Print a channel's threaded conversation
    Show {
        channel: Option<String>,
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Choose the channel interactively
        #[arg(long, conflicts_with = "channel")]
        pick: bool,
    },
    /// Render a channel as an HTML page
    Render {
        channel: Option<String>,
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Output file (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Fetch recent history from the workspace API and merge it (admin, needs SLACK_BOT_TOKEN)
    Fetch {
        /// Fetch full_export_days of history instead of the scheduled window
        #[arg(long)]
        full: bool,
    },
    /// Scheduled fetch: runs only when the schedule is due (needs SLACK_BOT_TOKEN)
    Cron {
        /// Run even when the schedule is not due
        #[arg(long)]
        force: bool,
    },
    /// Show the fetch schedule
    Schedule,

    /// Delete the stored archive (admin)
    Clear,

    /// View or modify config (~/.chatarchive/config.toml)
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current config
    Show,
    /// Set a config value
    Set {
        /// Key to set (preferred_channel, auth_ttl_hours, api_base_url, ...)
        key: String,
        /// Value to set
        value: String,
    },
    /// Reset config to defaults
    Reset,
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let command = match cli.command {
        Commands::Config { action } => return handle_config(action),
        command => command,
    };
    let config = Config::load()?;
    let now = local_now();
    let mut archive = Archive::new(FileStore::new(config.data_dir()?));
    let role = |archive: &mut Archive<FileStore>| {
        session::current_role(archive, now, config.auth_ttl())
    };

    match command {
        Commands::Login { passkey, guest } => {
            let passkey = if guest {
                None
            } else {
                Some(match passkey {
                    Some(passkey) => passkey,
                    None => dialoguer::Password::new()
                        .with_prompt("Passkey")
                        .interact()?,
                })
            };
            let role = session::login(&mut archive, &config.verifier(), passkey.as_deref(), now)?;
            println!("logged in as {role}");
        }
        Commands::Logout => {
            archive.clear_auth()?;
            println!("logged out");
        }
        Commands::Whoami => match role(&mut archive)? {
            Some(role) => println!("{role}"),
            None => println!("not logged in"),
        },
        Commands::Import { dir } => {
            let role = role(&mut archive)?;
            let ingested = session::import_dir(&mut archive, role, &dir)?;
            let snapshot = &ingested.snapshot;
            println!(
                "imported {} channels, {} users, {} messages ({} files skipped)",
                snapshot.channels.len(),
                snapshot.users.len(),
                snapshot.message_count(),
                ingested.warnings.len()
            );
        }
        Commands::Channels { dir } => {
            let role = role(&mut archive)?;
            let snapshot = session::open_snapshot(&mut archive, role, dir.as_deref())?;
            browse_cmd::list_channels(&snapshot, &config)?;
        }
        Commands::Show { channel, dir, pick } => {
            let role = role(&mut archive)?;
            let snapshot = session::open_snapshot(&mut archive, role, dir.as_deref())?;
            browse_cmd::show(&snapshot, &config, channel, pick, now)?;
        }
        Commands::Render { channel, dir, out } => {
            let role = role(&mut archive)?;
            let snapshot = session::open_snapshot(&mut archive, role, dir.as_deref())?;
            browse_cmd::render(&snapshot, &config, channel, out, now)?;
        }
        Commands::Fetch { full } => {
            require(role(&mut archive)?, Role::Admin)?;
            let request = if full {
                ExportRequest::full(config.full_export_days, config.request_delay())
            } else {
                ExportRequest::scheduled(
                    schedule_for(now, config.hourly_until),
                    config.request_delay(),
                )
            };
            fetch(&mut archive, &config, now, &request, None)?;
        }
        Commands::Cron { force } => {
            if !force && !should_run_now(now, config.hourly_until) {
                let next = next_run(now, config.hourly_until);
                println!("not due, next run at {}", next.format(&Rfc3339)?);
                return Ok(());
            }
            let schedule = schedule_for(now, config.hourly_until);
            let request = ExportRequest::scheduled(schedule, config.request_delay());
            fetch(&mut archive, &config, now, &request, Some(schedule.cadence))?;
        }
        Commands::Schedule => {
            println!("{}", describe_schedule(now, config.hourly_until));
            let next = next_run(now, config.hourly_until);
            println!("next run: {}", next.format(&Rfc3339)?);
        }
        Commands::Clear => {
            require(role(&mut archive)?, Role::Admin)?;
            archive.clear_snapshot()?;
            println!("archive cleared");
        }
        Commands::Config { .. } => unreachable!("handled above"),
    }
    Ok(())
}

fn fetch(
    archive: &mut Archive<FileStore>,
    config: &Config,
    now: OffsetDateTime,
    request: &ExportRequest,
    cadence: Option<Cadence>,
) -> Result<()> {
    let token = std::env::var("SLACK_BOT_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty())
        .context("SLACK_BOT_TOKEN not set")?;
    let client = SlackClient::new(&config.api_base_url, token.trim());
    let export = run_export(&client, now, request, cadence)
        .with_context(|| format!("export from {} failed", config.api_base_url))?;
    println!(
        "fetched {} messages from {} channels ({}h window)",
        export.total_messages, export.total_channels, export.time_range_hours
    );
    let snapshot = session::merge_remote(archive, export)?;
    println!("archive now holds {} messages", snapshot.message_count());
    Ok(())
}

fn handle_config(action: Option<ConfigAction>) -> Result<()> {
    match action {
        None | Some(ConfigAction::Show) => {
            let config = Config::load()?;
            print!("{}", toml::to_string_pretty(&config)?);
            if config.data_dir.is_none() {
                println!("# data_dir = \"{}\"", config.data_dir()?.display());
            }
        }
        Some(ConfigAction::Set { key, value }) => {
            let mut config = Config::load()?;
            config.set(&key, value)?;
            let path = config.save()?;
            println!("saved to {}", path.display());
        }
        Some(ConfigAction::Reset) => {
            let config = Config::default();
            let path = config.save()?;
            println!("reset to defaults at {}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn login_flags_conflict() {
        assert!(Cli::try_parse_from(["chatarchive", "login", "--guest", "--passkey", "x"]).is_err());
        let cli = Cli::try_parse_from(["chatarchive", "login", "--guest"]).unwrap();
        assert!(matches!(cli.command, Commands::Login { guest: true, passkey: None }));
    }

    #[test]
    fn show_accepts_directory() {
        let cli = Cli::try_parse_from(["chatarchive", "show", "random", "--dir", "/tmp/x"]).unwrap();
        match cli.command {
            Commands::Show { channel, dir, pick } => {
                assert_eq!(channel.as_deref(), Some("random"));
                assert_eq!(dir, Some(PathBuf::from("/tmp/x")));
                assert!(!pick);
            }
            _ => panic!("expected show"),
        }
    }
}
