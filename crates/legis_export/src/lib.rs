use anyhow::{Context, Result};
use legis_core::pipeline::SyncOutput;
use legis_core::refresh::{Snapshot, SnapshotEntry};
use legis_core::schema::BillRecord;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Where one session's exported collections live.
pub struct OutputPaths {
    pub root: PathBuf,
    pub bills: PathBuf,
    pub actions: PathBuf,
    pub votes: PathBuf,
}

impl OutputPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            bills: root.join("bills.json"),
            actions: root.join("actions.json"),
            votes: root.join("votes.json"),
            root,
        }
    }

    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("creating output dir {}", self.root.display()))?;
        Ok(())
    }
}

pub fn write_outputs(paths: &OutputPaths, output: &SyncOutput) -> Result<()> {
    paths.ensure()?;
    write_json(&paths.bills, &output.bills)?;
    write_json(&paths.actions, &output.actions)?;
    write_json(&paths.votes, &output.votes)?;
    info!(
        dir = %paths.root.display(),
        bills = output.bills.len(),
        actions = output.actions.len(),
        votes = output.votes.len(),
        "exported"
    );
    Ok(())
}

/// The previous run's bills. A missing file is an empty snapshot: every bill
/// will be refreshed.
pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    if !path.exists() {
        info!(path = %path.display(), "no snapshot, refreshing every bill");
        return Ok(Snapshot::default());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    // Full bill records; only the volatile fields are kept.
    let entries: Vec<SnapshotEntry> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing snapshot {}", path.display()))?;
    info!(path = %path.display(), bills = entries.len(), "snapshot loaded");
    Ok(Snapshot::new(entries))
}

/// Persist this run's bills as the next run's snapshot. Written after the
/// run completes so an aborted run leaves the old snapshot in place.
pub fn save_snapshot(path: &Path, bills: &[BillRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staging = path.with_extension("json.part");
    write_json(&staging, bills)?;
    fs::rename(&staging, path)
        .with_context(|| format!("replacing snapshot {}", path.display()))?;
    Ok(())
}

/// Pretty JSON with four-space indentation.
pub fn to_json_string<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    Ok(String::from_utf8(buf)?)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = to_json_string(value)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
