//! Human review queue for escalation events.
//!
//! Enqueueing is fire-and-forget: it never waits on a reviewer and never
//! fails the caller.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ReviewConfig;
use crate::escalation::manager::EscalationEvent;
use crate::types::{Result, RiskLevel, SafetyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewPriority {
    Routine = 1,
    Elevated = 2,
    Urgent = 3,
}

impl ReviewPriority {
    pub fn for_level(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Low | RiskLevel::Elevated => Self::Routine,
            RiskLevel::High => Self::Elevated,
            RiskLevel::Critical => Self::Urgent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Reviewed,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewTicket {
    pub ticket_id: String,
    pub event: EscalationEvent,
    pub priority: ReviewPriority,
    pub status: ReviewStatus,
    pub queued_at: DateTime<Utc>,
    pub reviewer_id: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    sequence: u64,
}

/// Concurrent queue of escalation events awaiting a human.
#[derive(Debug)]
pub struct ReviewQueue {
    tickets: DashMap<String, ReviewTicket>,
    sequence: AtomicU64,
    max_pending: usize,
    timeout_secs: u64,
}

impl ReviewQueue {
    pub fn new() -> Self {
        Self::with_config(&ReviewConfig::default())
    }

    pub fn with_config(config: &ReviewConfig) -> Self {
        Self {
            tickets: DashMap::new(),
            sequence: AtomicU64::new(0),
            max_pending: config.max_pending.max(1),
            timeout_secs: config.timeout_secs,
        }
    }

    /// Queue an event and return its ticket id immediately.
    pub fn enqueue(&self, event: EscalationEvent, priority: ReviewPriority) -> String {
        let ticket_id = Uuid::new_v4().simple().to_string();
        let ticket = ReviewTicket {
            ticket_id: ticket_id.clone(),
            event,
            priority,
            status: ReviewStatus::Pending,
            queued_at: Utc::now(),
            reviewer_id: None,
            reviewed_at: None,
            review_notes: None,
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
        };

        info!(
            ticket = %ticket_id,
            event_id = %ticket.event.event_id,
            priority = ?priority,
            "Escalation queued for human review"
        );

        self.tickets.insert(ticket_id.clone(), ticket);
        self.prune();
        ticket_id
    }

    // Drop the oldest tickets once over capacity, settled ones first.
    fn prune(&self) {
        while self.tickets.len() > self.max_pending {
            let victim = self
                .tickets
                .iter()
                .min_by_key(|t| (t.status == ReviewStatus::Pending, t.sequence))
                .map(|t| t.ticket_id.clone());
            match victim {
                Some(id) => {
                    self.tickets.remove(&id);
                }
                None => break,
            }
        }
    }

    /// Pending tickets, most urgent first, then oldest first.
    pub fn pending(&self) -> Vec<ReviewTicket> {
        let mut pending: Vec<ReviewTicket> = self
            .tickets
            .iter()
            .filter(|t| t.status == ReviewStatus::Pending)
            .map(|t| t.value().clone())
            .collect();
        pending.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.sequence.cmp(&b.sequence)));
        pending
    }

    pub fn get(&self, ticket_id: &str) -> Option<ReviewTicket> {
        self.tickets.get(ticket_id).map(|t| t.value().clone())
    }

    pub fn mark_reviewed(&self, ticket_id: &str, reviewer_id: impl Into<String>, notes: Option<String>) -> Result<()> {
        let mut ticket = self
            .tickets
            .get_mut(ticket_id)
            .ok_or_else(|| SafetyError::ReviewNotFound(ticket_id.to_string()))?;
        ticket.status = ReviewStatus::Reviewed;
        ticket.reviewer_id = Some(reviewer_id.into());
        ticket.reviewed_at = Some(Utc::now());
        ticket.review_notes = notes;
        info!(ticket = %ticket_id, "Escalation review completed");
        Ok(())
    }

    /// Expire pending tickets queued before `now - timeout`.
    pub fn cleanup_expired_at(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - chrono::Duration::seconds(self.timeout_secs as i64);
        let mut expired = 0;
        for mut ticket in self.tickets.iter_mut() {
            if ticket.status == ReviewStatus::Pending && ticket.queued_at < cutoff {
                ticket.status = ReviewStatus::Expired;
                expired += 1;
            }
        }
        if expired > 0 {
            warn!(count = expired, "Review tickets expired without review");
        }
        expired
    }

    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_at(Utc::now())
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

impl Default for ReviewQueue {
    fn default() -> Self {
        Self::new()
    }
}
