// models/src/medical/queue.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ClinicError, ClinicResult, Entity, ValidationError};
use crate::identifiers::{AccountId, QueueId, VisitId};

/// Ticket status. Advances waiting → called → done and never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Waiting,
    Called,
    Done,
}

impl QueueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueStatus::Waiting => "waiting",
            QueueStatus::Called => "called",
            QueueStatus::Done => "done",
        }
    }

    /// Waiting and called tickets hold the patient's single active slot.
    pub fn is_active(self) -> bool {
        !matches!(self, QueueStatus::Done)
    }

    /// Forward moves only; skipping `called` is allowed.
    pub fn can_advance_to(self, next: QueueStatus) -> bool {
        matches!(
            (self, next),
            (QueueStatus::Waiting, QueueStatus::Called)
                | (QueueStatus::Waiting, QueueStatus::Done)
                | (QueueStatus::Called, QueueStatus::Done)
        )
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "waiting" => Ok(QueueStatus::Waiting),
            "called" => Ok(QueueStatus::Called),
            "done" => Ok(QueueStatus::Done),
            _ => Err(ValidationError::InvalidValue { field: "status", value: s.to_string() }),
        }
    }
}

/// One ticket in a day's walk-in line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueTicket {
    pub id: QueueId,
    /// Sequential within `service_day`, starting at 1.
    pub queue_number: u32,
    pub service_day: NaiveDate,
    pub patient_id: AccountId,
    /// The visit opened together with this ticket.
    pub visit_id: VisitId,
    pub receptionist_id: Option<AccountId>,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueTicket {
    pub fn advance_to(&mut self, next: QueueStatus) -> ClinicResult<()> {
        if !self.status.can_advance_to(next) {
            return Err(ClinicError::invalid_transition(Entity::Queue, self.status, next));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// A ticket with its derived place in today's line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuePosition {
    pub ticket: QueueTicket,
    /// 1-based place among today's active tickets, in creation order.
    pub position: u32,
    /// Waiting tickets created before this one.
    pub ahead_count: u32,
    pub total_in_queue: u32,
}
