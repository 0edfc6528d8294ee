//! Channel browsing commands.

use anyhow::{Context, Result, bail};
use dialoguer::{Select, theme::ColorfulTheme};
use std::fs;
use std::path::PathBuf;
use time::OffsetDateTime;

use chatarchive::Config;
use chatarchive::export::ExportSnapshot;
use chatarchive::render::{render_channel_html, render_channel_text};

/// List channels with their message counts
pub fn list_channels(snapshot: &ExportSnapshot, config: &Config) -> Result<()> {
    let available = snapshot.available_channels();
    if available.is_empty() {
        println!("No channels with messages.");
        return Ok(());
    }

    let default = snapshot.default_channel(&config.preferred_channel);
    for name in available {
        let count = snapshot.messages.get(name).map_or(0, Vec::len);
        let members = snapshot
            .channel_by_name(name)
            .map(|c| c.members)
            .unwrap_or(0);
        let marker = if Some(name) == default { "*" } else { " " };
        println!("{marker} #{name:<24} {count:>6} messages  {members:>4} members");
    }
    println!(
        "{} users, {} messages",
        snapshot.users.len(),
        snapshot.message_count()
    );
    Ok(())
}

/// Print one channel as text
pub fn show(
    snapshot: &ExportSnapshot,
    config: &Config,
    channel: Option<String>,
    pick: bool,
    now: OffsetDateTime,
) -> Result<()> {
    let name = resolve_channel(snapshot, config, channel, pick)?;
    print!("{}", render_channel_text(snapshot, &name, now)?);
    Ok(())
}

/// Write one channel as a standalone HTML page
pub fn render(
    snapshot: &ExportSnapshot,
    config: &Config,
    channel: Option<String>,
    out: Option<PathBuf>,
    now: OffsetDateTime,
) -> Result<()> {
    let name = resolve_channel(snapshot, config, channel, false)?;
    let html = render_channel_html(snapshot, &name, now)?;
    match out {
        Some(path) => {
            fs::write(&path, html).with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote #{name} to {}", path.display());
        }
        None => print!("{html}"),
    }
    Ok(())
}

fn resolve_channel(
    snapshot: &ExportSnapshot,
    config: &Config,
    channel: Option<String>,
    pick: bool,
) -> Result<String> {
    if pick {
        return pick_channel(snapshot, config);
    }
    if let Some(name) = channel {
        return Ok(name.trim_start_matches('#').to_string());
    }
    match snapshot.default_channel(&config.preferred_channel) {
        Some(name) => Ok(name.to_string()),
        None => bail!("no channels with messages"),
    }
}

/// Interactive channel picker
fn pick_channel(snapshot: &ExportSnapshot, config: &Config) -> Result<String> {
    let available = snapshot.available_channels();
    if available.is_empty() {
        bail!("no channels with messages");
    }

    let items: Vec<String> = available
        .iter()
        .map(|name| {
            let count = snapshot.messages.get(*name).map_or(0, Vec::len);
            format!("#{name} ({count})")
        })
        .collect();
    let default = snapshot
        .default_channel(&config.preferred_channel)
        .and_then(|name| available.iter().position(|n| *n == name))
        .unwrap_or(0);

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Channel")
        .items(&items)
        .default(default)
        .interact()?;
    Ok(available[selection].to_string())
}
