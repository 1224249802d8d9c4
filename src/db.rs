use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, ErrorCode, OptionalExtension};
use thiserror::Error;

use crate::roster::MemberRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("account {0} does not exist")]
    UnknownAccount(i64),
    #[error("an account owned by {0} already exists")]
    DuplicateAccount(String),
}

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS accounts (
            id          INTEGER PRIMARY KEY,
            label       TEXT NOT NULL,
            owner_email TEXT UNIQUE NOT NULL,
            seats_total INTEGER NOT NULL DEFAULT 0,
            status      TEXT NOT NULL DEFAULT 'active',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS import_runs (
            id           INTEGER PRIMARY KEY,
            account_id   INTEGER NOT NULL REFERENCES accounts(id),
            source       TEXT NOT NULL,
            member_count INTEGER NOT NULL,
            created_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_runs_account ON import_runs(account_id);

        CREATE TABLE IF NOT EXISTS members (
            id          INTEGER PRIMARY KEY,
            account_id  INTEGER NOT NULL REFERENCES accounts(id),
            import_run  INTEGER NOT NULL REFERENCES import_runs(id),
            name        TEXT NOT NULL,
            email       TEXT NOT NULL,
            role        TEXT NOT NULL DEFAULT 'Member' CHECK(role IN ('Member','Owner','Admin')),
            status      TEXT NOT NULL DEFAULT 'Active',
            active      BOOLEAN NOT NULL DEFAULT 1,
            date_added  TEXT NOT NULL,
            date_source TEXT NOT NULL CHECK(date_source IN ('parsed','default'))
        );
        CREATE INDEX IF NOT EXISTS idx_members_account ON members(account_id);
        CREATE INDEX IF NOT EXISTS idx_members_email ON members(email);
        ",
    )?;
    Ok(())
}

// ── Accounts ──

pub fn insert_account(conn: &Connection, label: &str, owner_email: &str, seats_total: u32) -> Result<i64> {
    let inserted = conn.execute(
        "INSERT INTO accounts (label, owner_email, seats_total) VALUES (?1, ?2, ?3)",
        rusqlite::params![label, owner_email, seats_total],
    );
    match inserted {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            Err(StoreError::DuplicateAccount(owner_email.to_string()).into())
        }
        Err(e) => Err(e.into()),
    }
}

pub struct AccountRow {
    pub id: i64,
    pub label: String,
    pub owner_email: String,
    pub seats_total: u32,
    pub status: String,
    pub member_count: usize,
}

pub fn fetch_accounts(conn: &Connection) -> Result<Vec<AccountRow>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.label, a.owner_email, a.seats_total, a.status,
                (SELECT COUNT(*) FROM members m WHERE m.account_id = a.id)
         FROM accounts a
         ORDER BY a.id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(AccountRow {
                id: row.get(0)?,
                label: row.get(1)?,
                owner_email: row.get(2)?,
                seats_total: row.get(3)?,
                status: row.get(4)?,
                member_count: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn require_account(conn: &Connection, account_id: i64) -> Result<()> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM accounts WHERE id = ?1", [account_id], |r| r.get(0))
        .optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(StoreError::UnknownAccount(account_id).into()),
    }
}

// ── Imports ──

/// One parsed roster and the input it came from.
pub struct ImportBatch<'a> {
    pub source: &'a str,
    pub records: &'a [MemberRecord],
}

/// Persist parsed rosters under `account_id`, one import run per batch.
/// Runs in a single transaction: every batch is written, or none is.
pub fn save_imports(conn: &Connection, account_id: i64, batches: &[ImportBatch<'_>]) -> Result<Vec<i64>> {
    let tx = conn.unchecked_transaction()?;
    require_account(&tx, account_id)?;

    let mut run_ids = Vec::with_capacity(batches.len());
    {
        let mut run_stmt = tx.prepare(
            "INSERT INTO import_runs (account_id, source, member_count) VALUES (?1, ?2, ?3)",
        )?;
        let mut m_stmt = tx.prepare(
            "INSERT INTO members (account_id, import_run, name, email, role, date_added, date_source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for batch in batches {
            run_stmt.execute(rusqlite::params![account_id, batch.source, batch.records.len()])?;
            let run_id = tx.last_insert_rowid();
            for r in batch.records {
                m_stmt
                    .execute(rusqlite::params![
                        account_id,
                        run_id,
                        r.name,
                        r.email,
                        r.role.as_str(),
                        r.joined.instant().to_rfc3339(),
                        r.joined.source(),
                    ])
                    .with_context(|| format!("Failed to save {} from {}", r.email, batch.source))?;
            }
            run_ids.push(run_id);
        }
    }
    tx.commit()?;
    Ok(run_ids)
}

pub struct MemberRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub date_added: String,
    pub date_source: String,
}

pub fn fetch_members(conn: &Connection, account_id: i64, limit: usize) -> Result<Vec<MemberRow>> {
    require_account(conn, account_id)?;
    let mut stmt = conn.prepare(
        "SELECT id, name, email, role, status, date_added, date_source
         FROM members
         WHERE account_id = ?1
         ORDER BY id
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![account_id, limit as i64], |row| {
            Ok(MemberRow {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                role: row.get(3)?,
                status: row.get(4)?,
                date_added: row.get(5)?,
                date_source: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub accounts: usize,
    pub members: usize,
    pub imports: usize,
    pub defaulted_dates: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let accounts: usize = conn.query_row("SELECT COUNT(*) FROM accounts", [], |r| r.get(0))?;
    let members: usize = conn.query_row("SELECT COUNT(*) FROM members", [], |r| r.get(0))?;
    let imports: usize = conn.query_row("SELECT COUNT(*) FROM import_runs", [], |r| r.get(0))?;
    let defaulted_dates: usize = conn.query_row(
        "SELECT COUNT(*) FROM members WHERE date_source = 'default'",
        [],
        |r| r.get(0),
    )?;
    Ok(Stats {
        accounts,
        members,
        imports,
        defaulted_dates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{Role, RosterParser};
    use chrono::{TimeZone, Utc};

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn batch<'a>(source: &'a str, records: &'a [MemberRecord]) -> ImportBatch<'a> {
        ImportBatch { source, records }
    }

    fn sample() -> Vec<MemberRecord> {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        RosterParser::default()
            .parse_at("Alice\nalice@x.com\nMember\nBob\nbob@x.com\nAdmin\nDec 20, 2025", now)
            .records
    }

    #[test]
    fn import_and_list() {
        let conn = open();
        let id = insert_account(&conn, "Team A", "owner@x.com", 5).unwrap();
        save_imports(&conn, id, &[batch("paste.txt", &sample())]).unwrap();

        let members = fetch_members(&conn, id, 50).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].email, "alice@x.com");
        assert_eq!(members[0].status, "Active");
        assert_eq!(members[0].date_source, "default");
        assert_eq!(members[1].role, Role::Admin.as_str());
        assert_eq!(members[1].date_source, "parsed");
        assert!(members[1].date_added.starts_with("2025-12-20T00:00:00"));

        let accounts = fetch_accounts(&conn).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].member_count, 2);
        assert_eq!(accounts[0].seats_total, 5);
    }

    #[test]
    fn unknown_account_writes_nothing() {
        let conn = open();
        let err = save_imports(&conn, 42, &[batch("stdin", &sample())]).unwrap_err();
        assert!(matches!(err.downcast_ref::<StoreError>(), Some(StoreError::UnknownAccount(42))));
        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.members, 0);
        assert_eq!(stats.imports, 0);
    }

    #[test]
    fn duplicate_owner_rejected() {
        let conn = open();
        insert_account(&conn, "A", "owner@x.com", 0).unwrap();
        let err = insert_account(&conn, "B", "owner@x.com", 0).unwrap_err();
        assert!(matches!(err.downcast_ref::<StoreError>(), Some(StoreError::DuplicateAccount(_))));
    }

    #[test]
    fn repeated_imports_are_not_deduplicated() {
        let conn = open();
        let id = insert_account(&conn, "A", "owner@x.com", 0).unwrap();
        save_imports(&conn, id, &[batch("one", &sample())]).unwrap();
        save_imports(&conn, id, &[batch("two", &sample())]).unwrap();
        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.accounts, 1);
        assert_eq!(stats.members, 4);
        assert_eq!(stats.imports, 2);
        assert_eq!(stats.defaulted_dates, 2);
    }

    #[test]
    fn batch_rolls_back_on_any_failure() {
        let conn = open();
        let id = insert_account(&conn, "A", "owner@x.com", 0).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_boom BEFORE INSERT ON members
             WHEN NEW.email = 'boom@x.com'
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();

        let now = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let bad = RosterParser::default().parse_at("Boom\nboom@x.com", now).records;
        let good = sample();
        let err = save_imports(&conn, id, &[batch("good.txt", &good), batch("bad.txt", &bad)]).unwrap_err();
        assert!(format!("{:#}", err).contains("boom@x.com"));

        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.members, 0);
        assert_eq!(stats.imports, 0);
    }

    #[test]
    fn several_batches_get_their_own_runs() {
        let conn = open();
        let id = insert_account(&conn, "A", "owner@x.com", 0).unwrap();
        let records = sample();
        let runs = save_imports(&conn, id, &[batch("a", &records), batch("b", &records[..1])]).unwrap();
        assert_eq!(runs.len(), 2);
        assert_ne!(runs[0], runs[1]);
        assert_eq!(get_stats(&conn).unwrap().members, 3);
    }

    #[test]
    fn member_limit() {
        let conn = open();
        let id = insert_account(&conn, "A", "owner@x.com", 0).unwrap();
        save_imports(&conn, id, &[batch("one", &sample())]).unwrap();
        assert_eq!(fetch_members(&conn, id, 1).unwrap().len(), 1);
        assert!(fetch_members(&conn, 7, 10).is_err());
    }
}
