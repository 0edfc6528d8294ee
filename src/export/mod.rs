//! Workspace exports: types, ingestion, threading and message markup.

mod emoji;
mod ingest;
mod markup;
mod threads;
mod timestamp;
mod types;

pub use emoji::{emoji_glyph, resolve_emoji};
pub use ingest::{
    ExportFile, ExportFiles, FileRole, IngestWarning, Ingested, UNKNOWN_CHANNEL, ingest_dir,
    ingest_files, read_export_dir,
};
pub use markup::{Broadcast, Segment, Segments, render_plain, tokenize};
pub use threads::{ChannelView, reconstruct_threads, sort_by_timestamp};
pub use timestamp::{
    Timestamp, compare_ts, format_date_marker, format_date_time, format_time, format_timestamp,
    is_same_day,
};
pub use types::{
    Cadence, Channel, Edited, ExportSnapshot, Message, Reaction, RemoteExport, ThreadedMessage,
    User, UserIndex, UserLookup, UserProfile,
};
