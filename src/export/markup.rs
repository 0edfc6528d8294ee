//! Message markup: split raw message text into typed segments.
//!
//! Recognized forms: `<URL>`, `<URL|label>`, `<@U123>`, `<#C123|name>`,
//! `<!everyone>`, `<!channel>` and `<!here>`. Anything else stays plain text.

use std::borrow::Cow;
use std::iter::FusedIterator;

use super::types::UserLookup;

/// `@everyone`, `@channel` or `@here`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Broadcast {
    Everyone,
    Channel,
    Here,
}

impl Broadcast {
    pub fn as_str(self) -> &'static str {
        match self {
            Broadcast::Everyone => "@everyone",
            Broadcast::Channel => "@channel",
            Broadcast::Here => "@here",
        }
    }
}

/// One renderable piece of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Verbatim text; may contain newlines
    Text(&'a str),
    Link { url: &'a str, label: &'a str },
    /// `display` is `@Name`, or the raw `<@U123>` literal for unknown users
    UserMention {
        user_id: &'a str,
        display: Cow<'a, str>,
    },
    ChannelMention { channel_id: &'a str, name: &'a str },
    Broadcast(Broadcast),
}

impl Segment<'_> {
    /// Text a reader sees for this segment.
    pub fn display_text(&self) -> Cow<'_, str> {
        match self {
            Segment::Text(text) => Cow::Borrowed(text),
            Segment::Link { label, .. } => Cow::Borrowed(label),
            Segment::UserMention { display, .. } => Cow::Borrowed(display.as_ref()),
            Segment::ChannelMention { name, .. } => Cow::Owned(format!("#{name}")),
            Segment::Broadcast(kind) => Cow::Borrowed(kind.as_str()),
        }
    }
}

/// Tries to match one markup form at the start of `input` (which begins with `<`).
/// Returns the segment and the number of bytes consumed.
type Matcher = for<'a> fn(&'a str, &dyn UserLookup) -> Option<(Segment<'a>, usize)>;

/// Tried in order at every `<`; the first match wins.
const MATCHERS: [Matcher; 4] = [match_link, match_user, match_channel, match_broadcast];

const URL_SCHEMES: [&str; 3] = ["https://", "http://", "mailto:"];

fn match_link<'a>(input: &'a str, _users: &dyn UserLookup) -> Option<(Segment<'a>, usize)> {
    let rest = &input[1..];
    let scheme = URL_SCHEMES.iter().find(|s| rest.starts_with(**s))?;
    let url_end = rest.find(|c: char| c == '|' || c == '>')?;
    if url_end <= scheme.len() {
        return None;
    }
    let url = &rest[..url_end];
    if rest[url_end..].starts_with('>') {
        return Some((Segment::Link { url, label: url }, url_end + 2));
    }
    let after = &rest[url_end + 1..];
    let label_end = after.find('>')?;
    if label_end == 0 {
        return None;
    }
    let label = &after[..label_end];
    Some((Segment::Link { url, label }, 1 + url_end + 1 + label_end + 1))
}

/// Length of the leading `[A-Z0-9]` run.
fn id_len(input: &str) -> usize {
    input
        .bytes()
        .take_while(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        .count()
}

fn match_user<'a>(input: &'a str, users: &dyn UserLookup) -> Option<(Segment<'a>, usize)> {
    let rest = input.strip_prefix("<@")?;
    if !rest.starts_with(|c: char| c.is_ascii_uppercase()) {
        return None;
    }
    let len = id_len(rest);
    if len < 2 || !rest[len..].starts_with('>') {
        return None;
    }
    let user_id = &rest[..len];
    let consumed = 2 + len + 1;
    let display = match users.find_user(user_id) {
        Some(user) => Cow::Owned(format!("@{}", user.display_name())),
        None => Cow::Borrowed(&input[..consumed]),
    };
    Some((Segment::UserMention { user_id, display }, consumed))
}

fn match_channel<'a>(input: &'a str, _users: &dyn UserLookup) -> Option<(Segment<'a>, usize)> {
    let rest = input.strip_prefix("<#")?;
    if !rest.starts_with('C') {
        return None;
    }
    let len = 1 + id_len(&rest[1..]);
    if len < 2 || !rest[len..].starts_with('|') {
        return None;
    }
    let channel_id = &rest[..len];
    let after = &rest[len + 1..];
    let name_end = after.find('>')?;
    if name_end == 0 {
        return None;
    }
    let name = &after[..name_end];
    Some((
        Segment::ChannelMention { channel_id, name },
        2 + len + 1 + name_end + 1,
    ))
}

fn match_broadcast<'a>(input: &'a str, _users: &dyn UserLookup) -> Option<(Segment<'a>, usize)> {
    [
        ("<!everyone>", Broadcast::Everyone),
        ("<!channel>", Broadcast::Channel),
        ("<!here>", Broadcast::Here),
    ]
    .into_iter()
    .find(|(literal, _)| input.starts_with(*literal))
    .map(|(literal, kind)| (Segment::Broadcast(kind), literal.len()))
}

fn match_at<'a>(input: &'a str, users: &dyn UserLookup) -> Option<(Segment<'a>, usize)> {
    MATCHERS.iter().find_map(|matcher| matcher(input, users))
}

/// Lazy iterator over the segments of one message.
///
/// Cheap to clone; a clone restarts from the clone point.
#[derive(Clone)]
pub struct Segments<'a> {
    text: &'a str,
    pos: usize,
    users: &'a dyn UserLookup,
    pending: Option<(Segment<'a>, usize)>,
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Segment<'a>> {
        if let Some((segment, end)) = self.pending.take() {
            self.pos = end;
            return Some(segment);
        }
        let text = self.text;
        if self.pos >= text.len() {
            return None;
        }
        let mut cursor = self.pos;
        while let Some(offset) = text[cursor..].find('<') {
            let start = cursor + offset;
            if let Some((segment, len)) = match_at(&text[start..], self.users) {
                let end = start + len;
                if start > self.pos {
                    let plain = &text[self.pos..start];
                    self.pos = start;
                    self.pending = Some((segment, end));
                    return Some(Segment::Text(plain));
                }
                self.pos = end;
                return Some(segment);
            }
            cursor = start + 1;
        }
        let plain = &text[self.pos..];
        self.pos = text.len();
        Some(Segment::Text(plain))
    }
}

impl FusedIterator for Segments<'_> {}

/// Tokenize a message's raw text against a user directory.
pub fn tokenize<'a>(text: &'a str, users: &'a dyn UserLookup) -> Segments<'a> {
    Segments {
        text,
        pos: 0,
        users,
        pending: None,
    }
}

/// Flatten markup to the text a reader sees; links keep their target when labelled.
pub fn render_plain(text: &str, users: &dyn UserLookup) -> String {
    let mut out = String::with_capacity(text.len());
    for segment in tokenize(text, users) {
        match &segment {
            Segment::Link { url, label } if url != label => {
                out.push_str(label);
                out.push_str(" (");
                out.push_str(url);
                out.push(')');
            }
            _ => out.push_str(&segment.display_text()),
        }
    }
    out
}
