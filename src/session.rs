//! Role-gated archive operations behind the CLI.

use anyhow::{Result, bail};
use std::path::Path;
use time::{Duration, OffsetDateTime};

use crate::auth::{PasskeyVerifier, Role};
use crate::export::{ExportSnapshot, Ingested, RemoteExport, ingest_dir};
use crate::store::{Archive, BlobStore};

/// Fail unless `role` is at least `needed`.
pub fn require(role: Option<Role>, needed: Role) -> Result<Role> {
    match role {
        None => bail!("not logged in, run `chatarchive login` first"),
        Some(role) if role < needed => {
            bail!("{needed} access required (logged in as {role})")
        }
        Some(role) => Ok(role),
    }
}

/// Start a session. `None` starts a guest session without a passkey.
pub fn login<S: BlobStore>(
    archive: &mut Archive<S>,
    verifier: &PasskeyVerifier,
    passkey: Option<&str>,
    now: OffsetDateTime,
) -> Result<Role> {
    let role = match passkey {
        None => Role::Guest,
        Some(passkey) => {
            if !verifier.is_configured() {
                bail!(
                    "no passkey hashes configured, set ADMIN_PASSKEY_HASH / CLUB_PASSKEY_HASH or `chatarchive config set`"
                );
            }
            match verifier.verify(passkey) {
                Some(role) => role,
                None => {
                    tracing::warn!("rejected passkey");
                    bail!("Invalid passkey");
                }
            }
        }
    };
    archive.save_auth(role, now)?;
    tracing::info!(%role, "logged in");
    Ok(role)
}

/// The current session role, if any.
pub fn current_role<S: BlobStore>(
    archive: &mut Archive<S>,
    now: OffsetDateTime,
    ttl: Duration,
) -> Result<Option<Role>> {
    archive.load_auth(now, ttl)
}

/// Snapshot to browse: an export directory for any session, else the stored archive.
pub fn open_snapshot<S: BlobStore>(
    archive: &mut Archive<S>,
    role: Option<Role>,
    dir: Option<&Path>,
) -> Result<ExportSnapshot> {
    if let Some(dir) = dir {
        require(role, Role::Guest)?;
        return Ok(ingest_dir(dir)?.snapshot);
    }
    require(role, Role::Club)?;
    match archive.load_snapshot()? {
        Some(snapshot) => Ok(snapshot),
        None => bail!("no stored archive, import an export first"),
    }
}

/// Replace the stored archive with an export directory.
pub fn import_dir<S: BlobStore>(
    archive: &mut Archive<S>,
    role: Option<Role>,
    dir: &Path,
) -> Result<Ingested> {
    require(role, Role::Admin)?;
    let ingested = ingest_dir(dir)?;
    if ingested.snapshot.is_empty() {
        bail!("no channels, users or messages found in {}", dir.display());
    }
    archive.save_snapshot(&ingested.snapshot)?;
    Ok(ingested)
}

/// Merge a fetched export into the stored archive and save it.
pub fn merge_remote<S: BlobStore>(
    archive: &mut Archive<S>,
    remote: RemoteExport,
) -> Result<ExportSnapshot> {
    let mut snapshot = archive.load_snapshot()?.unwrap_or_default();
    snapshot.merge(remote.into_snapshot());
    archive.save_snapshot(&snapshot)?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_passkey;
    use crate::store::MemoryStore;
    use std::fs;
    use tempfile::tempdir;

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    fn verifier() -> PasskeyVerifier {
        PasskeyVerifier::new(Some(hash_passkey("admin")), Some(hash_passkey("club")))
    }

    fn export_dir() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("channels.json"),
            r#"[{"id": "C1", "name": "general"}]"#,
        )
        .unwrap();
        fs::create_dir(dir.path().join("general")).unwrap();
        fs::write(
            dir.path().join("general").join("2025-06-07.json"),
            r#"[{"ts": "1.0", "text": "hello"}]"#,
        )
        .unwrap();
        dir
    }

    #[test]
    fn require_orders_roles() {
        assert!(require(None, Role::Guest).is_err());
        assert!(require(Some(Role::Guest), Role::Club).is_err());
        assert_eq!(require(Some(Role::Admin), Role::Club).unwrap(), Role::Admin);
        let err = require(Some(Role::Club), Role::Admin).unwrap_err();
        assert_eq!(err.to_string(), "admin access required (logged in as club)");
    }

    #[test]
    fn login_persists_role() {
        let mut archive = Archive::new(MemoryStore::new());
        assert_eq!(login(&mut archive, &verifier(), Some("club"), now()).unwrap(), Role::Club);
        let role = current_role(&mut archive, now(), Duration::hours(24)).unwrap();
        assert_eq!(role, Some(Role::Club));
    }

    #[test]
    fn login_rejects_bad_passkey_and_keeps_old_session() {
        let mut archive = Archive::new(MemoryStore::new());
        login(&mut archive, &verifier(), None, now()).unwrap();
        let err = login(&mut archive, &verifier(), Some("nope"), now()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid passkey");
        let role = current_role(&mut archive, now(), Duration::hours(24)).unwrap();
        assert_eq!(role, Some(Role::Guest));
    }

    #[test]
    fn login_requires_configured_hashes() {
        let mut archive = Archive::new(MemoryStore::new());
        let unconfigured = PasskeyVerifier::default();
        assert!(login(&mut archive, &unconfigured, Some("admin"), now()).is_err());
    }

    #[test]
    fn guest_reads_directory_but_not_archive() {
        let dir = export_dir();
        let mut archive = Archive::new(MemoryStore::new());
        let snapshot = open_snapshot(&mut archive, Some(Role::Guest), Some(dir.path())).unwrap();
        assert_eq!(snapshot.message_count(), 1);
        assert!(open_snapshot(&mut archive, Some(Role::Guest), None).is_err());
        // Nothing was persisted for the guest
        assert!(!archive.has_snapshot().unwrap());
    }

    #[test]
    fn admin_import_then_club_reads() {
        let dir = export_dir();
        let mut archive = Archive::new(MemoryStore::new());
        assert!(import_dir(&mut archive, Some(Role::Club), dir.path()).is_err());
        import_dir(&mut archive, Some(Role::Admin), dir.path()).unwrap();
        let snapshot = open_snapshot(&mut archive, Some(Role::Club), None).unwrap();
        assert_eq!(snapshot.channels[0].name, "general");
    }

    #[test]
    fn import_rejects_empty_export() {
        let dir = tempdir().unwrap();
        let mut archive = Archive::new(MemoryStore::new());
        assert!(import_dir(&mut archive, Some(Role::Admin), dir.path()).is_err());
    }

    #[test]
    fn merge_remote_appends_to_archive() {
        let dir = export_dir();
        let mut archive = Archive::new(MemoryStore::new());
        import_dir(&mut archive, Some(Role::Admin), dir.path()).unwrap();

        let remote: RemoteExport = serde_json::from_value(serde_json::json!({
            "channels": {"general": {"id": "C1", "name": "general", "members": 2}},
            "messages": {"general": [{"ts": "2.0", "text": "new"}]},
            "users": {},
            "exportDate": "2025-06-07T00:00:00Z",
            "timeRangeHours": 2,
            "totalChannels": 1,
            "totalUsers": 0,
            "totalMessages": 1,
            "isIncremental": true
        }))
        .unwrap();
        let merged = merge_remote(&mut archive, remote).unwrap();
        assert_eq!(merged.message_count(), 2);
        assert_eq!(merged.channels[0].members, 2);
        let stored = archive.load_snapshot().unwrap().unwrap();
        assert_eq!(stored, merged);
    }
}
