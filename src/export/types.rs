//! Types for workspace exports: channels, users, messages and the snapshot aggregate.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Treat empty strings the same as a missing value.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MemberField {
    Count(u64),
    Ids(Vec<String>),
}

/// Export files list member ids, the API and canonical shape carry a count.
fn member_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<MemberField>::deserialize(deserializer)? {
        Some(MemberField::Count(count)) => count,
        Some(MemberField::Ids(ids)) => ids.len() as u64,
        None => 0,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextField {
    Plain(String),
    Valued {
        #[serde(default)]
        value: Option<String>,
    },
}

/// Purpose and topic are `{ "value": ... }` objects in exports and plain strings elsewhere.
fn text_value<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<TextField>::deserialize(deserializer)? {
        Some(TextField::Plain(text)) => text,
        Some(TextField::Valued { value }) => value.unwrap_or_default(),
        None => String::new(),
    })
}

/// A channel of the workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_general: bool,
    /// Member count
    #[serde(default, alias = "num_members", deserialize_with = "member_count")]
    pub members: u64,
    #[serde(default, deserialize_with = "text_value")]
    pub purpose: String,
    #[serde(default, deserialize_with = "text_value")]
    pub topic: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_48: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_72: Option<String>,
}

impl UserProfile {
    /// Name to show for an author known only through an attached profile
    pub fn name(&self) -> Option<&str> {
        non_empty(self.real_name.as_deref()).or(non_empty(self.display_name.as_deref()))
    }

    pub fn avatar_url(&self) -> Option<&str> {
        non_empty(self.image_48.as_deref()).or(non_empty(self.image_72.as_deref()))
    }
}

/// A workspace member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    /// Accent color as hex without the leading `#`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
}

impl User {
    /// Real name, else short name, else the raw identifier.
    pub fn display_name(&self) -> &str {
        non_empty(self.real_name.as_deref())
            .or_else(|| self.profile.as_ref().and_then(|p| non_empty(p.real_name.as_deref())))
            .or(non_empty(Some(self.name.as_str())))
            .unwrap_or(&self.id)
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.profile.as_ref().and_then(UserProfile::avatar_url)
    }

    pub fn color(&self) -> Option<&str> {
        non_empty(self.color.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Edited {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub name: String,
    #[serde(default)]
    pub count: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
}

/// A raw message as found in an export or fetched from the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Fractional seconds since the epoch; unique within a channel
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    /// Marks system messages (joins, renames, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited: Option<Edited>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<Reaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    /// Author profile attached by the API importer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_profile: Option<UserProfile>,
}

impl Message {
    /// A reply carries a `thread_ts` pointing at some other message.
    pub fn is_reply(&self) -> bool {
        matches!(&self.thread_ts, Some(parent) if *parent != self.ts)
    }

    pub fn is_system(&self) -> bool {
        self.subtype.is_some()
    }

    pub fn is_edited(&self) -> bool {
        self.edited.is_some()
    }
}

/// A top-level message with its replies attached (view-only)
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadedMessage {
    pub message: Message,
    pub replies: Vec<Message>,
    pub reply_count: usize,
}

impl ThreadedMessage {
    pub fn new(message: Message, replies: Vec<Message>) -> Self {
        let reply_count = replies.len();
        Self {
            message,
            replies,
            reply_count,
        }
    }

    pub fn has_replies(&self) -> bool {
        self.reply_count > 0
    }
}

/// Lookup of users by identifier
pub trait UserLookup {
    fn find_user(&self, id: &str) -> Option<&User>;
}

impl UserLookup for Vec<User> {
    fn find_user(&self, id: &str) -> Option<&User> {
        self.iter().find(|user| user.id == id)
    }
}

/// Users keyed by id, borrowed from a snapshot
#[derive(Debug, Default)]
pub struct UserIndex<'a> {
    by_id: HashMap<&'a str, &'a User>,
}

impl<'a> UserIndex<'a> {
    pub fn new(users: &'a [User]) -> Self {
        let by_id = users.iter().map(|user| (user.id.as_str(), user)).collect();
        Self { by_id }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl UserLookup for UserIndex<'_> {
    fn find_user(&self, id: &str) -> Option<&User> {
        self.by_id.get(id).copied()
    }
}

/// The whole in-memory workspace archive
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportSnapshot {
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub users: Vec<User>,
    /// Raw messages per channel name; unsorted
    #[serde(default)]
    pub messages: BTreeMap<String, Vec<Message>>,
}

impl ExportSnapshot {
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.users.is_empty() && self.messages.is_empty()
    }

    pub fn channel_by_name(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.name == name)
    }

    pub fn user_by_id(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|user| user.id == id)
    }

    pub fn user_index(&self) -> UserIndex<'_> {
        UserIndex::new(&self.users)
    }

    /// Names of channels that have a message collection
    pub fn available_channels(&self) -> Vec<&str> {
        self.messages.keys().map(String::as_str).collect()
    }

    /// The preferred channel when it has messages, else the first available one.
    pub fn default_channel(&self, preferred: &str) -> Option<&str> {
        if let Some((name, _)) = self.messages.get_key_value(preferred) {
            return Some(name.as_str());
        }
        self.messages.keys().next().map(String::as_str)
    }

    pub fn message_count(&self) -> usize {
        self.messages.values().map(Vec::len).sum()
    }

    /// Merge a newer snapshot into this one.
    ///
    /// Channels and users are replaced by id. Messages are appended per channel;
    /// a message whose `ts` already exists replaces the stored copy.
    pub fn merge(&mut self, newer: ExportSnapshot) {
        for channel in newer.channels {
            match self.channels.iter_mut().find(|c| c.id == channel.id) {
                Some(existing) => *existing = channel,
                None => self.channels.push(channel),
            }
        }
        for user in newer.users {
            match self.users.iter_mut().find(|u| u.id == user.id) {
                Some(existing) => *existing = user,
                None => self.users.push(user),
            }
        }
        for (name, incoming) in newer.messages {
            let stored = self.messages.entry(name).or_default();
            let mut by_ts: HashMap<String, usize> = stored
                .iter()
                .enumerate()
                .map(|(idx, message)| (message.ts.clone(), idx))
                .collect();
            for message in incoming {
                match by_ts.get(&message.ts) {
                    Some(&idx) => stored[idx] = message,
                    None => {
                        by_ts.insert(message.ts.clone(), stored.len());
                        stored.push(message);
                    }
                }
            }
        }
    }
}

impl UserLookup for ExportSnapshot {
    fn find_user(&self, id: &str) -> Option<&User> {
        self.user_by_id(id)
    }
}

/// Cadence of the scheduled import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Hourly,
    Daily,
}

impl Cadence {
    pub fn as_str(self) -> &'static str {
        match self {
            Cadence::Hourly => "hourly",
            Cadence::Daily => "daily",
        }
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload produced by an API import run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteExport {
    /// Channels keyed by name
    pub channels: BTreeMap<String, Channel>,
    pub messages: BTreeMap<String, Vec<Message>>,
    /// Users keyed by id
    pub users: BTreeMap<String, User>,
    pub export_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_type: Option<Cadence>,
    pub time_range_hours: u32,
    pub total_channels: usize,
    pub total_users: usize,
    pub total_messages: usize,
    pub is_incremental: bool,
}

impl RemoteExport {
    /// Channels in name order and users in id order.
    pub fn into_snapshot(self) -> ExportSnapshot {
        ExportSnapshot {
            channels: self.channels.into_values().collect(),
            users: self.users.into_values().collect(),
            messages: self.messages,
        }
    }
}

impl From<RemoteExport> for ExportSnapshot {
    fn from(remote: RemoteExport) -> Self {
        remote.into_snapshot()
    }
}
