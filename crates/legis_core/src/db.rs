use crate::pipeline::SyncOutput;
use crate::schema::{ActionRecord, BillRecord, VoteRecord};
use anyhow::Result;
use rusqlite::{Connection, params};
use std::path::Path;

pub fn open(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    init(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init(&conn)?;
    Ok(conn)
}

fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS bills (
          key TEXT PRIMARY KEY,
          session TEXT NOT NULL,
          title TEXT NOT NULL,
          status_date TEXT NOT NULL,
          last_action TEXT NOT NULL,
          bill_status TEXT NOT NULL,
          raw_json TEXT NOT NULL,
          inserted_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        );

        CREATE TABLE IF NOT EXISTS actions (
          id TEXT PRIMARY KEY,
          bill TEXT NOT NULL,
          session TEXT NOT NULL,
          action TEXT NOT NULL,
          date TEXT NOT NULL,
          has_vote INTEGER NOT NULL,
          committee TEXT,
          raw_json TEXT NOT NULL,
          inserted_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        );

        CREATE TABLE IF NOT EXISTS votes (
          action_id TEXT PRIMARY KEY,
          bill TEXT NOT NULL,
          session TEXT NOT NULL,
          vote_type TEXT,
          url TEXT,
          yeas INTEGER NOT NULL,
          nays INTEGER NOT NULL,
          error TEXT,
          raw_json TEXT NOT NULL,
          inserted_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        );

        CREATE INDEX IF NOT EXISTS idx_actions_bill ON actions(bill);
        CREATE INDEX IF NOT EXISTS idx_votes_bill ON votes(bill);
        "#,
    )?;
    Ok(())
}

pub fn upsert_bill(conn: &Connection, bill: &BillRecord) -> Result<()> {
    let raw_json = serde_json::to_string(bill)?;
    conn.execute(
        r#"
        INSERT INTO bills (key, session, title, status_date, last_action, bill_status, raw_json)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(key) DO UPDATE SET
          session=excluded.session,
          title=excluded.title,
          status_date=excluded.status_date,
          last_action=excluded.last_action,
          bill_status=excluded.bill_status,
          raw_json=excluded.raw_json
        "#,
        params![
            bill.roster.key,
            bill.session,
            bill.roster.title,
            bill.roster.status_date,
            bill.roster.last_action,
            bill.bill_status,
            raw_json
        ],
    )?;
    Ok(())
}

pub fn upsert_action(conn: &Connection, action: &ActionRecord) -> Result<()> {
    let raw_json = serde_json::to_string(action)?;
    conn.execute(
        r#"
        INSERT INTO actions (id, bill, session, action, date, has_vote, committee, raw_json)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(id) DO UPDATE SET
          bill=excluded.bill,
          session=excluded.session,
          action=excluded.action,
          date=excluded.date,
          has_vote=excluded.has_vote,
          committee=excluded.committee,
          raw_json=excluded.raw_json
        "#,
        params![
            action.id,
            action.bill,
            action.session,
            action.action,
            action.date,
            action.has_vote,
            action.committee,
            raw_json
        ],
    )?;
    Ok(())
}

pub fn upsert_vote(conn: &Connection, vote: &VoteRecord) -> Result<()> {
    let raw_json = serde_json::to_string(vote)?;
    conn.execute(
        r#"
        INSERT INTO votes (action_id, bill, session, vote_type, url, yeas, nays, error, raw_json)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(action_id) DO UPDATE SET
          bill=excluded.bill,
          session=excluded.session,
          vote_type=excluded.vote_type,
          url=excluded.url,
          yeas=excluded.yeas,
          nays=excluded.nays,
          error=excluded.error,
          raw_json=excluded.raw_json
        "#,
        params![
            vote.action_id,
            vote.bill,
            vote.session,
            vote.vote_type.map(|k| k.as_str()),
            vote.url,
            vote.totals.yeas,
            vote.totals.nays,
            vote.error.map(|e| e.as_str()),
            raw_json
        ],
    )?;
    Ok(())
}

/// Upsert a whole run in one transaction.
pub fn store_output(conn: &mut Connection, output: &SyncOutput) -> Result<()> {
    let tx = conn.transaction()?;
    for bill in &output.bills {
        upsert_bill(&tx, bill)?;
    }
    for action in &output.actions {
        upsert_action(&tx, action)?;
    }
    for vote in &output.votes {
        upsert_vote(&tx, vote)?;
    }
    tx.commit()?;
    Ok(())
}
