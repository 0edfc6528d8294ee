//! Thread reconstruction: flat channel messages to top-level messages with replies.

use std::collections::{HashMap, HashSet};

use super::timestamp::Timestamp;
use super::types::{Channel, ExportSnapshot, Message, ThreadedMessage};

/// Stable sort by numeric timestamp.
pub fn sort_by_timestamp(messages: &mut [Message]) {
    messages.sort_by_cached_key(|message| Timestamp::parse(&message.ts));
}

/// Build the threaded view of one channel.
///
/// Output holds only top-level messages in chronological order. Replies whose
/// parent is not in `messages` are dropped.
pub fn reconstruct_threads(messages: &[Message]) -> Vec<ThreadedMessage> {
    let mut sorted = messages.to_vec();
    sort_by_timestamp(&mut sorted);

    let mut replies: HashMap<String, Vec<Message>> = HashMap::new();
    let mut top_level = Vec::new();
    for message in sorted {
        match message.thread_ts.clone() {
            Some(parent) if message.is_reply() => {
                replies.entry(parent).or_default().push(message);
            }
            _ => top_level.push(message),
        }
    }

    let roots: HashSet<&str> = top_level.iter().map(|m| m.ts.as_str()).collect();
    let orphaned: usize = replies
        .iter()
        .filter(|(parent, _)| !roots.contains(parent.as_str()))
        .map(|(_, group)| group.len())
        .sum();
    if orphaned > 0 {
        tracing::debug!(orphaned, "dropping replies without a parent message");
    }

    top_level
        .into_iter()
        .map(|message| {
            let thread = replies.get(&message.ts).cloned().unwrap_or_default();
            ThreadedMessage::new(message, thread)
        })
        .collect()
}

/// A channel ready for display
#[derive(Debug, Clone)]
pub struct ChannelView<'a> {
    pub channel: &'a Channel,
    pub messages: Vec<ThreadedMessage>,
}

impl ExportSnapshot {
    /// Threaded view of a channel, `None` when the channel is not in the channel list.
    pub fn channel_view(&self, name: &str) -> Option<ChannelView<'_>> {
        let channel = self.channel_by_name(name)?;
        let messages = self
            .messages
            .get(name)
            .map(|messages| reconstruct_threads(messages))
            .unwrap_or_default();
        Some(ChannelView { channel, messages })
    }
}
