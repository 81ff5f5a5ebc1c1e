use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// Persisted state of a migration. A migration without a record is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationStatus {
    Running,
    Completed,
    Failed,
    Stuck,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStatus::Running => "RUNNING",
            MigrationStatus::Completed => "COMPLETED",
            MigrationStatus::Failed => "FAILED",
            MigrationStatus::Stuck => "STUCK",
        }
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING" => Ok(MigrationStatus::Running),
            "COMPLETED" => Ok(MigrationStatus::Completed),
            "FAILED" => Ok(MigrationStatus::Failed),
            "STUCK" => Ok(MigrationStatus::Stuck),
            other => Err(StoreError::InvalidStatus(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub id: Uuid,
    pub name: String,
    pub status: MigrationStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MigrationRecord {
    pub fn is_executed(&self) -> bool {
        self.status == MigrationStatus::Completed
    }

    /// Instant the claim was taken, falling back to the creation time for
    /// records written without `started_at`.
    pub fn claimed_at(&self) -> DateTime<Utc> {
        self.started_at.unwrap_or(self.created_at)
    }
}

/// Data for a new record. `id`, `created_at` and `updated_at` are assigned by
/// the engine.
#[derive(Debug, Clone)]
pub struct WriteRecord {
    pub name: String,
    pub status: MigrationStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl WriteRecord {
    /// A claim: `RUNNING`, started now.
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            status: MigrationStatus::Running,
            started_at: Some(Utc::now()),
            executed_at: None,
            failed_at: None,
        }
    }

    pub fn status(mut self, status: MigrationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn executed_at(mut self, at: DateTime<Utc>) -> Self {
        self.executed_at = Some(at);
        self
    }

    pub fn failed_at(mut self, at: DateTime<Utc>) -> Self {
        self.failed_at = Some(at);
        self
    }

    pub fn to_record(&self) -> MigrationRecord {
        let now = Utc::now();

        MigrationRecord {
            id: Uuid::new_v4(),
            name: self.name.to_owned(),
            status: self.status,
            started_at: self.started_at,
            executed_at: self.executed_at,
            failed_at: self.failed_at,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a record. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub status: Option<MigrationStatus>,
    pub executed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl RecordPatch {
    pub fn completed(at: DateTime<Utc>) -> Self {
        Self {
            status: Some(MigrationStatus::Completed),
            executed_at: Some(at),
            ..Self::default()
        }
    }

    pub fn failed(at: DateTime<Utc>) -> Self {
        Self {
            status: Some(MigrationStatus::Failed),
            failed_at: Some(at),
            ..Self::default()
        }
    }

    pub fn stuck(at: DateTime<Utc>) -> Self {
        Self {
            status: Some(MigrationStatus::Stuck),
            failed_at: Some(at),
            ..Self::default()
        }
    }

    pub fn apply(&self, record: &mut MigrationRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }

        if let Some(at) = self.executed_at {
            record.executed_at = Some(at);
        }

        if let Some(at) = self.failed_at {
            record.failed_at = Some(at);
        }

        record.updated_at = Utc::now();
    }
}

/// Filter on records. An empty query matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    pub name: Option<String>,
    pub status: Option<MigrationStatus>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn status(mut self, status: MigrationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, record: &MigrationRecord) -> bool {
        self.name.as_ref().map_or(true, |name| name == &record.name)
            && self.status.map_or(true, |status| status == record.status)
    }
}

/// Records matching a query, ordered by name ascending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordList {
    pub items: Vec<MigrationRecord>,
    pub count: usize,
}

impl From<Vec<MigrationRecord>> for RecordList {
    fn from(items: Vec<MigrationRecord>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}
