//! JSON snapshot of a directory's contents.
//!
//! The CLI loads one of these into a [`MemoryDirectory`](crate::MemoryDirectory),
//! runs notifications against it, and can write the result back.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use teamsync_core::{AccessTemplate, Membership, Record, RecordAccessGrant, Team};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid snapshot: {0}")]
    Invalid(String),
}

/// Everything the in-memory directory holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    #[serde(default)]
    pub templates: Vec<AccessTemplate>,
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub memberships: Vec<Membership>,
    #[serde(default)]
    pub grants: Vec<RecordAccessGrant>,
}

impl DirectorySnapshot {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_reader(reader)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), SnapshotError> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        self.to_writer(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Names must be unique and every row must point at a known entity.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let mut names = HashSet::new();
        for t in &self.templates {
            if !names.insert(t.name.as_str()) {
                return Err(SnapshotError::Invalid(format!(
                    "duplicate template name '{}'",
                    t.name
                )));
            }
        }

        names.clear();
        for t in &self.teams {
            if !names.insert(t.name.as_str()) {
                return Err(SnapshotError::Invalid(format!(
                    "duplicate team name '{}'",
                    t.name
                )));
            }
        }

        let team_ids: HashSet<_> = self.teams.iter().map(|t| t.id).collect();
        if let Some(m) = self.memberships.iter().find(|m| !team_ids.contains(&m.team_id)) {
            return Err(SnapshotError::Invalid(format!(
                "membership references unknown team {}",
                m.team_id
            )));
        }

        let record_ids: HashSet<_> = self.records.iter().map(|r| r.id).collect();
        let template_ids: HashSet<_> = self.templates.iter().map(|t| t.id).collect();
        for g in &self.grants {
            if !record_ids.contains(&g.record_id) {
                return Err(SnapshotError::Invalid(format!(
                    "grant references unknown record {}",
                    g.record_id
                )));
            }
            if !template_ids.contains(&g.template_id) {
                return Err(SnapshotError::Invalid(format!(
                    "grant references unknown template {}",
                    g.template_id
                )));
            }
        }

        Ok(())
    }
}
