//! Scheduled import: cadence selection and the export run against the chat API.

use std::collections::BTreeMap;
use std::time::Duration as StdDuration;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime, Time};

use crate::export::{Cadence, Message, RemoteExport, User, UserProfile};
use crate::slack::{ApiError, ChatApi};

/// Lookback for hourly runs, with an hour of overlap
pub const HOURLY_WINDOW_HOURS: u32 = 2;
/// Lookback for daily runs, with an hour of overlap
pub const DAILY_WINDOW_HOURS: u32 = 25;
/// Local hour of the daily run
pub const DAILY_RUN_HOUR: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub window_hours: u32,
    pub cadence: Cadence,
}

/// Hourly with a short window before `hourly_until`, daily afterwards.
pub fn schedule_for(now: OffsetDateTime, hourly_until: OffsetDateTime) -> ScheduleConfig {
    if now < hourly_until {
        ScheduleConfig {
            window_hours: HOURLY_WINDOW_HOURS,
            cadence: Cadence::Hourly,
        }
    } else {
        ScheduleConfig {
            window_hours: DAILY_WINDOW_HOURS,
            cadence: Cadence::Daily,
        }
    }
}

/// Whether a cron tick at `now` should run. Hours and minutes are read in `now`'s offset.
pub fn should_run_now(now: OffsetDateTime, hourly_until: OffsetDateTime) -> bool {
    match schedule_for(now, hourly_until).cadence {
        Cadence::Hourly => now.minute() == 0,
        Cadence::Daily => now.hour() == DAILY_RUN_HOUR && now.minute() == 0,
    }
}

fn daily_time() -> Time {
    Time::MIDNIGHT + Duration::hours(i64::from(DAILY_RUN_HOUR))
}

/// First daily run strictly after `from`.
fn next_daily(from: OffsetDateTime) -> OffsetDateTime {
    let today = from.replace_time(daily_time());
    if today > from {
        today
    } else {
        today + Duration::days(1)
    }
}

/// The next scheduled run strictly after `now`.
pub fn next_run(now: OffsetDateTime, hourly_until: OffsetDateTime) -> OffsetDateTime {
    if now >= hourly_until {
        return next_daily(now);
    }
    let hour_start = now.replace_time(Time::MIDNIGHT + Duration::hours(i64::from(now.hour())));
    let next_hour = hour_start + Duration::hours(1);
    if next_hour < hourly_until {
        next_hour
    } else {
        next_daily(hourly_until.to_offset(now.offset()))
    }
}

fn rfc3339(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
}

/// One-line description of the active schedule.
pub fn describe_schedule(now: OffsetDateTime, hourly_until: OffsetDateTime) -> String {
    let config = schedule_for(now, hourly_until);
    match config.cadence {
        Cadence::Hourly => format!(
            "hourly ({}h window) until {}, then daily at {:02}:00 ({}h window)",
            config.window_hours,
            rfc3339(hourly_until),
            DAILY_RUN_HOUR,
            DAILY_WINDOW_HOURS
        ),
        Cadence::Daily => format!(
            "daily at {:02}:00 ({}h window)",
            DAILY_RUN_HOUR, config.window_hours
        ),
    }
}

/// Parameters of one export run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportRequest {
    /// Fetch messages newer than this many hours
    pub window_hours: u32,
    pub incremental: bool,
    /// Pause between per-channel history calls
    pub delay: StdDuration,
}

impl ExportRequest {
    pub fn scheduled(config: ScheduleConfig, delay: StdDuration) -> Self {
        Self {
            window_hours: config.window_hours,
            incremental: true,
            delay,
        }
    }

    pub fn full(days: u32, delay: StdDuration) -> Self {
        Self {
            window_hours: days.saturating_mul(24),
            incremental: false,
            delay,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Author details attached to fetched messages
fn author_profile(user: &User) -> UserProfile {
    let profile = user.profile.as_ref();
    let real_name =
        non_empty(user.real_name.as_deref()).or_else(|| non_empty(Some(user.name.as_str())));
    let display_name = non_empty(profile.and_then(|p| p.display_name.as_deref()))
        .or_else(|| real_name.clone());
    UserProfile {
        display_name,
        real_name,
        image_48: None,
        image_72: non_empty(profile.and_then(|p| p.image_72.as_deref())),
    }
}

/// Fetch channels, users and recent history into a [`RemoteExport`].
///
/// A failing channel history is logged and leaves that channel empty.
pub fn run_export<A: ChatApi + ?Sized>(
    api: &A,
    now: OffsetDateTime,
    request: &ExportRequest,
    schedule_type: Option<Cadence>,
) -> Result<RemoteExport, ApiError> {
    let team = api.auth_test()?;
    tracing::info!(%team, window_hours = request.window_hours, "starting export");

    let channels = api.list_channels()?;
    let users = api.list_users()?;
    tracing::info!(
        channels = channels.len(),
        users = users.len(),
        "fetched directory"
    );

    let users: BTreeMap<String, User> = users
        .into_iter()
        .map(|user| (user.id.clone(), user))
        .collect();
    let oldest = now.unix_timestamp() - i64::from(request.window_hours) * 3600;

    let total_channels = channels.len();
    let mut by_name = BTreeMap::new();
    let mut messages: BTreeMap<String, Vec<Message>> = BTreeMap::new();
    for (idx, channel) in channels.into_iter().enumerate() {
        let history = match api.history(&channel.id, oldest) {
            Ok(history) => history,
            Err(err) => {
                tracing::warn!(channel = %channel.name, code = err.code(), error = %err, "history failed");
                Vec::new()
            }
        };
        let enriched: Vec<Message> = history
            .into_iter()
            .map(|mut message| {
                if message.user_profile.is_none() {
                    message.user_profile = message
                        .user
                        .as_deref()
                        .and_then(|id| users.get(id))
                        .map(author_profile);
                }
                message
            })
            .collect();
        tracing::debug!(channel = %channel.name, messages = enriched.len(), "fetched history");
        messages.insert(channel.name.clone(), enriched);
        by_name.insert(channel.name.clone(), channel);

        if idx + 1 < total_channels && !request.delay.is_zero() {
            std::thread::sleep(request.delay);
        }
    }

    let total_messages = messages.values().map(Vec::len).sum();
    tracing::info!(
        channels = total_channels,
        messages = total_messages,
        "export complete"
    );
    Ok(RemoteExport {
        channels: by_name,
        messages,
        total_users: users.len(),
        users,
        export_date: rfc3339(now.to_offset(time::UtcOffset::UTC)),
        schedule_type,
        time_range_hours: request.window_hours,
        total_channels,
        total_messages,
        is_incremental: request.incremental,
    })
}
