//! Channel rendering: a standalone HTML page and a plain-text view for the terminal.

use anyhow::{Context, Result};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::borrow::Cow;
use time::{OffsetDateTime, UtcOffset};

use crate::export::{
    Channel, ChannelView, ExportSnapshot, Message, Reaction, Segment, ThreadedMessage, UserLookup,
    format_date_marker, format_time, is_same_day, render_plain, resolve_emoji, tokenize,
};

const UNKNOWN_USER: &str = "Unknown User";

/// Who wrote a message, resolved for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author<'a> {
    pub name: Cow<'a, str>,
    pub avatar_url: Option<&'a str>,
    /// Hex accent color without `#`
    pub color: Option<&'a str>,
    /// False when neither the directory nor the message knew the author
    pub known: bool,
}

impl<'a> Author<'a> {
    /// Directory entry first, then the profile attached to the message.
    pub fn resolve(message: &'a Message, users: &'a dyn UserLookup) -> Self {
        if let Some(user) = message.user.as_deref().and_then(|id| users.find_user(id)) {
            return Self {
                name: Cow::Borrowed(user.display_name()),
                avatar_url: user.avatar_url(),
                color: user.color(),
                known: true,
            };
        }
        if let Some(profile) = &message.user_profile {
            if let Some(name) = profile.name() {
                return Self {
                    name: Cow::Borrowed(name),
                    avatar_url: profile.avatar_url(),
                    color: None,
                    known: true,
                };
            }
        }
        Self {
            name: Cow::Borrowed(UNKNOWN_USER),
            avatar_url: None,
            color: None,
            known: false,
        }
    }

    /// Placeholder avatar letter, `?` for unknown authors.
    pub fn initial(&self) -> char {
        if !self.known {
            return '?';
        }
        self.name
            .chars()
            .next()
            .map(|c| c.to_uppercase().next().unwrap_or(c))
            .unwrap_or('?')
    }
}

/// Avatars mark the start of a run of messages by one author.
fn shows_avatar(previous: Option<&Message>, message: &Message) -> bool {
    match previous {
        None => true,
        Some(previous) => previous.user != message.user || message.is_system(),
    }
}

fn starts_new_day(previous: Option<&Message>, message: &Message, offset: UtcOffset) -> bool {
    match previous {
        None => true,
        Some(previous) => !is_same_day(&previous.ts, &message.ts, offset),
    }
}

fn reply_label(count: usize) -> String {
    if count == 1 {
        "1 reply".to_string()
    } else {
        format!("{count} replies")
    }
}

fn members_label(channel: &Channel) -> String {
    if channel.members == 1 {
        "1 member".to_string()
    } else {
        format!("{} members", channel.members)
    }
}

const STYLE: &str = r#"
:root {
  --ink: #1d1c1d;
  --muted: #616061;
  --paper: #ffffff;
  --sidebar: #3f0e40;
  --sidebar-ink: #cfc3cf;
  --accent: #1264a3;
  --mention: #fff3c4;
  --border: #e8e8e8;
  --reaction: #f2f7fb;
}
* { box-sizing: border-box; }
body {
  margin: 0;
  display: flex;
  min-height: 100vh;
  font-family: "Lato", "Segoe UI", sans-serif;
  color: var(--ink);
  background: var(--paper);
}
nav.sidebar {
  width: 240px;
  flex-shrink: 0;
  padding: 16px 0;
  background: var(--sidebar);
  color: var(--sidebar-ink);
}
nav.sidebar h1 { font-size: 18px; margin: 0 16px 12px; color: #fff; }
nav.sidebar .channel { padding: 4px 16px; }
nav.sidebar .channel.selected { background: var(--accent); color: #fff; }
.badge {
  margin-left: 6px;
  padding: 0 6px;
  font-size: 11px;
  border-radius: 8px;
  background: rgba(255,255,255,0.15);
}
main { flex: 1; min-width: 0; }
header.channel-header { padding: 12px 20px; border-bottom: 1px solid var(--border); }
header.channel-header h2 { margin: 0; font-size: 18px; }
.channel-topic { margin: 4px 0; color: var(--ink); }
.channel-meta { font-size: 13px; color: var(--muted); }
.messages { padding: 8px 0 40px; }
.empty-state { padding: 40px 20px; color: var(--muted); text-align: center; }
.date-marker {
  display: flex;
  align-items: center;
  margin: 16px 20px 8px;
  font-size: 13px;
  font-weight: 700;
}
.date-marker::before, .date-marker::after {
  content: "";
  flex: 1;
  border-top: 1px solid var(--border);
}
.date-marker span { padding: 2px 12px; border: 1px solid var(--border); border-radius: 12px; }
.message { display: flex; gap: 8px; padding: 4px 20px; }
.message:hover { background: #f8f8f8; }
.avatar { width: 36px; flex-shrink: 0; }
.avatar img, .avatar-placeholder {
  width: 36px;
  height: 36px;
  border-radius: 4px;
}
.avatar-placeholder {
  display: flex;
  align-items: center;
  justify-content: center;
  font-weight: 700;
  color: #fff;
  background: #9e9ea6;
}
.message-header { display: flex; gap: 8px; align-items: baseline; }
.author { font-weight: 700; }
.time, .edited { font-size: 12px; color: var(--muted); }
.text { line-height: 1.45; overflow-wrap: anywhere; }
.text a { color: var(--accent); }
.mention { background: var(--mention); border-radius: 3px; padding: 0 2px; color: var(--accent); }
.reactions { display: flex; gap: 4px; margin-top: 4px; }
.reaction {
  padding: 1px 6px;
  font-size: 12px;
  border: 1px solid var(--border);
  border-radius: 12px;
  background: var(--reaction);
}
.system { color: var(--muted); font-style: italic; padding-left: 64px; }
.thread { margin-top: 6px; border-left: 2px solid var(--border); }
.thread-header { padding: 2px 12px; font-size: 13px; font-weight: 700; color: var(--accent); }
.thread .message { padding-left: 12px; }
"#;

fn segments_markup(text: &str, users: &dyn UserLookup) -> Markup {
    html! {
        @for segment in tokenize(text, users) {
            @match segment {
                Segment::Text(plain) => {
                    @for (idx, line) in plain.split('\n').enumerate() {
                        @if idx > 0 { br; }
                        (line)
                    }
                }
                Segment::Link { url, label } => {
                    a href=(url) target="_blank" rel="noopener noreferrer" { (label) }
                }
                Segment::UserMention { display, .. } => {
                    span.mention { (display) }
                }
                Segment::ChannelMention { name, .. } => {
                    span.mention { "#" (name) }
                }
                Segment::Broadcast(kind) => {
                    span.mention { (kind.as_str()) }
                }
            }
        }
    }
}

fn reactions_markup(reactions: &[Reaction]) -> Markup {
    html! {
        @if !reactions.is_empty() {
            div.reactions {
                @for reaction in reactions {
                    span.reaction title=(format!(":{}:", reaction.name)) {
                        (resolve_emoji(&reaction.name)) " " (reaction.count)
                    }
                }
            }
        }
    }
}

fn avatar_markup(author: &Author<'_>) -> Markup {
    html! {
        div.avatar {
            @if let Some(url) = author.avatar_url {
                img src=(url) alt=(author.name);
            } @else {
                div.avatar-placeholder style=[author.color.map(|c| format!("background-color: #{c}"))] {
                    (author.initial())
                }
            }
        }
    }
}

fn message_markup(
    message: &Message,
    users: &dyn UserLookup,
    offset: UtcOffset,
    show_avatar: bool,
) -> Markup {
    let time = format_time(&message.ts, offset);
    if message.is_system() {
        return html! {
            div.message.system {
                span.text { (segments_markup(&message.text, users)) }
                " "
                span.time { (time) }
            }
        };
    }
    let author = Author::resolve(message, users);
    html! {
        div.message {
            @if show_avatar {
                (avatar_markup(&author))
            } @else {
                div.avatar {}
            }
            div.body {
                @if show_avatar {
                    div.message-header {
                        span.author { (author.name) }
                        span.time { (time) }
                        @if message.is_edited() { span.edited { "(edited)" } }
                    }
                }
                div.text {
                    (segments_markup(&message.text, users))
                    @if !show_avatar && message.is_edited() { " " span.edited { "(edited)" } }
                }
                (reactions_markup(&message.reactions))
            }
        }
    }
}

fn thread_markup(thread: &ThreadedMessage, users: &dyn UserLookup, offset: UtcOffset) -> Markup {
    html! {
        @if thread.has_replies() {
            div.thread {
                div.thread-header { (reply_label(thread.reply_count)) }
                @for reply in &thread.replies {
                    (message_markup(reply, users, offset, true))
                }
            }
        }
    }
}

fn messages_markup(view: &ChannelView<'_>, users: &dyn UserLookup, now: OffsetDateTime) -> Markup {
    let offset = now.offset();
    html! {
        @if view.messages.is_empty() {
            div.empty-state { p { "No messages in this channel." } }
        } @else {
            @for (idx, thread) in view.messages.iter().enumerate() {
                @let previous = idx.checked_sub(1).map(|prev| &view.messages[prev].message);
                @if starts_new_day(previous, &thread.message, offset) {
                    div.date-marker { span { (format_date_marker(&thread.message.ts, now)) } }
                }
                (message_markup(&thread.message, users, offset, shows_avatar(previous, &thread.message)))
                (thread_markup(thread, users, offset))
            }
        }
    }
}

fn sidebar_markup(snapshot: &ExportSnapshot, selected: &str) -> Markup {
    html! {
        nav.sidebar {
            h1 { "Channels" }
            @for name in snapshot.available_channels() {
                @let is_general = snapshot.channel_by_name(name).is_some_and(|c| c.is_general);
                div.channel.selected[name == selected] {
                    "# " (name)
                    @if is_general { span.badge { "General" } }
                }
            }
        }
    }
}

/// Render one channel as a self-contained HTML document.
///
/// Times are shown in `now`'s offset; "Today" is relative to `now`.
pub fn render_channel_html(
    snapshot: &ExportSnapshot,
    channel_name: &str,
    now: OffsetDateTime,
) -> Result<String> {
    let view = snapshot
        .channel_view(channel_name)
        .with_context(|| format!("Channel #{channel_name} not found"))?;
    let users = snapshot.user_index();
    let channel = view.channel;
    let page = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { "#" (channel.name) }
                style { (PreEscaped(STYLE)) }
            }
            body {
                (sidebar_markup(snapshot, &channel.name))
                main {
                    header.channel-header {
                        h2 { "#" (channel.name) }
                        @if !channel.topic.is_empty() {
                            p.channel-topic { (channel.topic) }
                        }
                        div.channel-meta {
                            span { (members_label(channel)) }
                            @if !channel.purpose.is_empty() {
                                span { " · " (channel.purpose) }
                            }
                        }
                    }
                    div.messages { (messages_markup(&view, &users, now)) }
                }
            }
        }
    };
    Ok(page.into_string())
}

fn push_message_text(out: &mut String, message: &Message, users: &dyn UserLookup, indent: &str) {
    for line in render_plain(&message.text, users).lines() {
        out.push_str(indent);
        out.push_str(line);
        out.push('\n');
    }
    if !message.reactions.is_empty() {
        let reactions: Vec<String> = message
            .reactions
            .iter()
            .map(|r| format!("{} {}", resolve_emoji(&r.name), r.count))
            .collect();
        out.push_str(indent);
        out.push_str(&reactions.join("  "));
        out.push('\n');
    }
}

fn push_message_header(
    out: &mut String,
    message: &Message,
    users: &dyn UserLookup,
    prefix: &str,
    offset: UtcOffset,
) {
    let author = Author::resolve(message, users);
    out.push_str(prefix);
    out.push_str(&author.name);
    out.push_str("  ");
    out.push_str(&format_time(&message.ts, offset));
    if message.is_edited() {
        out.push_str(" (edited)");
    }
    out.push('\n');
}

/// Render one channel for the terminal.
pub fn render_channel_text(
    snapshot: &ExportSnapshot,
    channel_name: &str,
    now: OffsetDateTime,
) -> Result<String> {
    let view = snapshot
        .channel_view(channel_name)
        .with_context(|| format!("Channel #{channel_name} not found"))?;
    let users = snapshot.user_index();
    let offset = now.offset();
    let channel = view.channel;

    let mut out = String::new();
    out.push_str(&format!("#{}\n", channel.name));
    if !channel.topic.is_empty() {
        out.push_str(&format!("{}\n", channel.topic));
    }
    let mut meta = members_label(channel);
    if !channel.purpose.is_empty() {
        meta.push_str(&format!(" · {}", channel.purpose));
    }
    out.push_str(&meta);
    out.push('\n');

    if view.messages.is_empty() {
        out.push_str("\nNo messages in this channel.\n");
        return Ok(out);
    }

    let mut previous: Option<&Message> = None;
    for thread in &view.messages {
        let message = &thread.message;
        if starts_new_day(previous, message, offset) {
            out.push_str(&format!("\n--- {} ---\n", format_date_marker(&message.ts, now)));
        }
        if message.is_system() {
            out.push_str(&format!(
                "  * {} {}\n",
                render_plain(&message.text, &users),
                format_time(&message.ts, offset)
            ));
        } else {
            if shows_avatar(previous, message) {
                out.push('\n');
                push_message_header(&mut out, message, &users, "", offset);
            }
            push_message_text(&mut out, message, &users, "  ");
        }
        if thread.has_replies() {
            out.push_str(&format!("  | {}\n", reply_label(thread.reply_count)));
            for reply in &thread.replies {
                push_message_header(&mut out, reply, &users, "  | ", offset);
                push_message_text(&mut out, reply, &users, "  |   ");
            }
        }
        previous = Some(message);
    }
    Ok(out)
}
