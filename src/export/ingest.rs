//! Export ingestion: a workspace export directory becomes an [`ExportSnapshot`].
//!
//! Layout of an export:
//! - `channels.json`: array of channels
//! - `users.json`: array of users
//! - `<channel>/<YYYY-MM-DD>.json`: array of that day's messages

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::types::{Channel, ExportSnapshot, Message, User};

/// Channel name used for day files that sit outside any channel directory.
pub const UNKNOWN_CHANNEL: &str = "unknown";

/// A file from an export, path relative to the export root
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub path: PathBuf,
    pub contents: String,
}

impl ExportFile {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

/// What a file contributes to the snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRole {
    Channels,
    Users,
    History { channel: String },
    Ignored,
}

impl FileRole {
    pub fn classify(path: &Path) -> Self {
        let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
            return FileRole::Ignored;
        };
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            return FileRole::Ignored;
        }
        match file_name {
            "channels.json" => FileRole::Channels,
            "users.json" => FileRole::Users,
            name if name.contains('-') => {
                let channel = path
                    .parent()
                    .and_then(Path::file_name)
                    .and_then(|s| s.to_str())
                    .unwrap_or(UNKNOWN_CHANNEL);
                FileRole::History {
                    channel: channel.to_string(),
                }
            }
            _ => FileRole::Ignored,
        }
    }
}

/// A file (or a record in it) that was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestWarning {
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for IngestWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

#[derive(Debug, Default)]
pub struct Ingested {
    pub snapshot: ExportSnapshot,
    pub warnings: Vec<IngestWarning>,
}

fn warn(warnings: &mut Vec<IngestWarning>, path: &Path, reason: String) {
    tracing::warn!(path = %path.display(), %reason, "skipping export data");
    warnings.push(IngestWarning {
        path: path.to_path_buf(),
        reason,
    });
}

fn decode_records<T: DeserializeOwned>(
    path: &Path,
    contents: &str,
    warnings: &mut Vec<IngestWarning>,
) -> Vec<T> {
    let document: Value = match serde_json::from_str(contents) {
        Ok(value) => value,
        Err(err) => {
            warn(warnings, path, format!("invalid JSON: {err}"));
            return Vec::new();
        }
    };
    let Value::Array(items) = document else {
        warn(warnings, path, "expected a JSON array".to_string());
        return Vec::new();
    };
    let mut records = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        match serde_json::from_value(item) {
            Ok(record) => records.push(record),
            Err(err) => warn(warnings, path, format!("record {idx}: {err}")),
        }
    }
    records
}

/// Build a snapshot from export files. Never fails; bad input becomes warnings.
pub fn ingest_files<I>(files: I) -> Ingested
where
    I: IntoIterator<Item = ExportFile>,
{
    let mut out = Ingested::default();
    for file in files {
        match FileRole::classify(&file.path) {
            FileRole::Channels => {
                let channels: Vec<Channel> =
                    decode_records(&file.path, &file.contents, &mut out.warnings);
                out.snapshot.channels.extend(channels);
            }
            FileRole::Users => {
                let users: Vec<User> =
                    decode_records(&file.path, &file.contents, &mut out.warnings);
                out.snapshot.users.extend(users);
            }
            FileRole::History { channel } => {
                let messages: Vec<Message> =
                    decode_records(&file.path, &file.contents, &mut out.warnings);
                out.snapshot
                    .messages
                    .entry(channel)
                    .or_default()
                    .extend(messages);
            }
            FileRole::Ignored => {}
        }
    }
    tracing::debug!(
        channels = out.snapshot.channels.len(),
        users = out.snapshot.users.len(),
        messages = out.snapshot.message_count(),
        warnings = out.warnings.len(),
        "ingested export"
    );
    out
}

#[derive(Debug, Default)]
pub struct ExportFiles {
    pub files: Vec<ExportFile>,
    pub warnings: Vec<IngestWarning>,
}

/// Read every `*.json` under `root`, in file-name order.
pub fn read_export_dir(root: &Path) -> ExportFiles {
    let mut out = ExportFiles::default();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().unwrap_or(root).to_path_buf();
                warn(&mut out.warnings, &path, err.to_string());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
        match fs::read_to_string(path) {
            Ok(contents) => out.files.push(ExportFile {
                path: relative,
                contents,
            }),
            Err(err) => warn(&mut out.warnings, &relative, format!("unreadable: {err}")),
        }
    }
    out
}

/// Read and ingest an export directory.
pub fn ingest_dir(root: &Path) -> Result<Ingested> {
    let meta = fs::metadata(root)
        .with_context(|| format!("Failed to read export directory {}", root.display()))?;
    if !meta.is_dir() {
        bail!("{} is not a directory", root.display());
    }
    let ExportFiles { files, warnings } = read_export_dir(root);
    let mut ingested = ingest_files(files);
    let mut all = warnings;
    all.append(&mut ingested.warnings);
    ingested.warnings = all;
    Ok(ingested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn classify_paths() {
        assert_eq!(
            FileRole::classify(Path::new("channels.json")),
            FileRole::Channels
        );
        assert_eq!(FileRole::classify(Path::new("users.json")), FileRole::Users);
        assert_eq!(
            FileRole::classify(Path::new("general/2025-06-07.json")),
            FileRole::History {
                channel: "general".to_string()
            }
        );
        assert_eq!(
            FileRole::classify(Path::new("2025-06-07.json")),
            FileRole::History {
                channel: UNKNOWN_CHANNEL.to_string()
            }
        );
        assert_eq!(
            FileRole::classify(Path::new("integration_logs.json")),
            FileRole::Ignored
        );
        assert_eq!(
            FileRole::classify(Path::new("general/2025-06-07.txt")),
            FileRole::Ignored
        );
    }

    #[test]
    fn general_scenario() {
        let ingested = ingest_files(vec![
            ExportFile::new("channels.json", r#"[{"id": "C1", "name": "general"}]"#),
            ExportFile::new(
                "general/2025-06-07.json",
                r#"[{"ts": "1", "text": "hello"}, {"ts": "2", "text": "hi", "thread_ts": "1"}]"#,
            ),
        ]);
        assert!(ingested.warnings.is_empty());
        let view = ingested.snapshot.channel_view("general").unwrap();
        assert_eq!(view.messages.len(), 1);
        assert_eq!(view.messages[0].reply_count, 1);
        assert_eq!(view.messages[0].replies[0].ts, "2");
    }

    #[test]
    fn corrupt_file_is_skipped() {
        let ingested = ingest_files(vec![
            ExportFile::new("channels.json", r#"[{"id": "C1", "name": "general"}]"#),
            ExportFile::new("users.json", "{not json"),
            ExportFile::new(
                "general/2025-06-07.json",
                r#"[{"ts": "1", "text": "hello"}]"#,
            ),
        ]);
        assert_eq!(ingested.warnings.len(), 1);
        assert_eq!(ingested.warnings[0].path, PathBuf::from("users.json"));
        assert!(ingested.snapshot.users.is_empty());
        assert_eq!(ingested.snapshot.channels.len(), 1);
        assert_eq!(ingested.snapshot.messages["general"].len(), 1);
    }

    #[test]
    fn bad_records_skipped_individually() {
        let ingested = ingest_files(vec![ExportFile::new(
            "general/2025-06-07.json",
            r#"[{"ts": "1", "text": "ok"}, {"text": "no ts"}, {"ts": "3"}]"#,
        )]);
        assert_eq!(ingested.warnings.len(), 1);
        assert!(ingested.warnings[0].reason.starts_with("record 1"));
        assert_eq!(ingested.snapshot.messages["general"].len(), 2);
    }

    #[test]
    fn non_array_document_is_skipped() {
        let ingested = ingest_files(vec![ExportFile::new("users.json", r#"{"id": "U1"}"#)]);
        assert_eq!(ingested.warnings.len(), 1);
        assert_eq!(ingested.warnings[0].reason, "expected a JSON array");
    }

    #[test]
    fn no_recognized_files_is_empty() {
        let ingested = ingest_files(vec![ExportFile::new("README.md", "# hi")]);
        assert!(ingested.snapshot.is_empty());
        assert!(ingested.warnings.is_empty());
    }

    #[test]
    fn day_files_accumulate_per_channel() {
        let ingested = ingest_files(vec![
            ExportFile::new("dev/2025-06-07.json", r#"[{"ts": "2"}]"#),
            ExportFile::new("dev/2025-06-06.json", r#"[{"ts": "1"}]"#),
            ExportFile::new("random/2025-06-07.json", r#"[{"ts": "3"}]"#),
        ]);
        assert_eq!(ingested.snapshot.messages["dev"].len(), 2);
        assert_eq!(ingested.snapshot.available_channels(), vec!["dev", "random"]);
    }

    #[test]
    fn ingest_dir_reads_tree() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("channels.json"),
            r#"[{"id": "C1", "name": "general", "members": ["U1"]}]"#,
        )
        .unwrap();
        fs::write(root.join("users.json"), r#"[{"id": "U1", "name": "ada"}]"#).unwrap();
        fs::create_dir(root.join("general")).unwrap();
        fs::write(
            root.join("general").join("2025-06-07.json"),
            r#"[{"ts": "1749308700.000100", "user": "U1", "text": "hello"}]"#,
        )
        .unwrap();
        fs::write(root.join("general").join("notes.txt"), "ignored").unwrap();

        let ingested = ingest_dir(root).unwrap();
        assert!(ingested.warnings.is_empty());
        assert_eq!(ingested.snapshot.channels[0].members, 1);
        assert_eq!(ingested.snapshot.users[0].name, "ada");
        assert_eq!(ingested.snapshot.messages["general"][0].text, "hello");
    }

    #[test]
    fn unreadable_file_does_not_stop_the_walk() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("channels.json"),
            r#"[{"id": "C1", "name": "general"}]"#,
        )
        .unwrap();
        fs::write(root.join("users.json"), [0xff, 0xfe, 0x00]).unwrap();

        let files = read_export_dir(root);
        assert_eq!(files.files.len(), 1);
        assert_eq!(files.warnings.len(), 1);
        assert_eq!(files.warnings[0].path, PathBuf::from("users.json"));
        assert!(files.warnings[0].reason.starts_with("unreadable:"));

        let ingested = ingest_dir(root).unwrap();
        assert_eq!(ingested.warnings.len(), 1);
        assert_eq!(ingested.snapshot.channels.len(), 1);
        assert!(ingested.snapshot.users.is_empty());
    }

    #[test]
    fn ingest_dir_rejects_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("channels.json");
        fs::write(&file, "[]").unwrap();
        assert!(ingest_dir(&file).is_err());
        assert!(ingest_dir(&dir.path().join("missing")).is_err());
    }
}
