//! Audit records and sinks.
//!
//! Records carry counts, levels and codes only. Session ids are replaced by
//! a truncated SHA-256 reference and no user text ever appears. Emitting is
//! fire-and-forget.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::activation::DenialReason;
use crate::escalation::EscalationEvent;
use crate::stability::StabilityState;
use crate::types::{EscalationAction, RiskLevel};
use crate::validator::RuleId;

/// Pseudonymous session reference for logs and audit records.
pub fn session_ref(session_id: &Uuid) -> String {
    let digest = Sha256::digest(session_id.as_bytes());
    hex::encode(&digest[..8])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationAudit {
    pub event_id: Uuid,
    pub session_ref: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub previous_level: RiskLevel,
    pub new_level: RiskLevel,
    pub actions: Vec<EscalationAction>,
    pub resources_provided: usize,
    pub response_was_modified: bool,
}

impl From<&EscalationEvent> for EscalationAudit {
    fn from(event: &EscalationEvent) -> Self {
        Self {
            event_id: event.event_id,
            session_ref: event.session_id.as_ref().map(session_ref),
            timestamp: event.timestamp,
            previous_level: event.previous_level,
            new_level: event.new_level,
            actions: event.actions_taken.clone(),
            resources_provided: event.resources_provided.len(),
            response_was_modified: event.response_was_modified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationAudit {
    pub session_ref: Option<String>,
    pub allowed: bool,
    pub reason: String,
    pub denial_reason: Option<DenialReason>,
    pub stability_state: Option<StabilityState>,
    pub timestamp: DateTime<Utc>,
}

impl ActivationAudit {
    pub fn for_session(mut self, session_id: &Uuid) -> Self {
        self.session_ref = Some(session_ref(session_id));
        self
    }
}

/// Audit trail of one pipeline evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationAudit {
    pub evaluation_id: Uuid,
    pub session_ref: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub risk_level: RiskLevel,
    pub risk_score: f32,
    pub risk_signal_count: usize,
    pub risk_category_count: usize,
    pub crisis_signal_count: usize,
    pub crisis_multi_signal_met: bool,
    pub crisis_signals_merged: bool,
    pub linguistic_match_count: usize,
    pub escalated: bool,
    pub escalation_event_id: Option<Uuid>,
    pub response_blocked: bool,
    pub response_modified: bool,
    pub violations: Vec<RuleId>,
    pub is_crisis: bool,
    pub requires_human_review: bool,
    pub review_ticket: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditRecord {
    Escalation(EscalationAudit),
    Activation(ActivationAudit),
    Evaluation(EvaluationAudit),
}

impl AuditRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Escalation(_) => "escalation",
            Self::Activation(_) => "activation",
            Self::Evaluation(_) => "evaluation",
        }
    }
}

/// Destination for audit records. Must not block.
pub trait AuditSink: Send + Sync {
    fn emit(&self, record: AuditRecord);
}

/// Writes records as structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, record: AuditRecord) {
        match serde_json::to_string(&record) {
            Ok(json) => info!(target: "hope_safety::audit", kind = record.kind(), record = %json, "audit"),
            Err(e) => warn!(kind = record.kind(), error = %e, "Failed to serialize audit record"),
        }
    }
}

/// Forwards records to an unbounded channel for an async consumer.
#[derive(Debug, Clone)]
pub struct ChannelAuditSink {
    tx: mpsc::UnboundedSender<AuditRecord>,
}

impl ChannelAuditSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AuditRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AuditSink for ChannelAuditSink {
    fn emit(&self, record: AuditRecord) {
        if self.tx.send(record).is_err() {
            debug!("Audit receiver dropped, record discarded");
        }
    }
}

/// Operational counters by risk level and by denial reason.
#[derive(Debug, Default)]
pub struct CountingAuditSink {
    by_risk_level: DashMap<RiskLevel, u64>,
    by_denial_reason: DashMap<DenialReason, u64>,
    escalations: AtomicU64,
    activations_allowed: AtomicU64,
}

impl CountingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn risk_level_count(&self, level: RiskLevel) -> u64 {
        self.by_risk_level.get(&level).map(|c| *c).unwrap_or(0)
    }

    pub fn denial_count(&self, reason: DenialReason) -> u64 {
        self.by_denial_reason.get(&reason).map(|c| *c).unwrap_or(0)
    }

    pub fn escalation_count(&self) -> u64 {
        self.escalations.load(Ordering::Relaxed)
    }

    pub fn activations_allowed(&self) -> u64 {
        self.activations_allowed.load(Ordering::Relaxed)
    }
}

impl AuditSink for CountingAuditSink {
    fn emit(&self, record: AuditRecord) {
        match record {
            AuditRecord::Evaluation(audit) => {
                *self.by_risk_level.entry(audit.risk_level).or_insert(0) += 1;
            }
            AuditRecord::Escalation(_) => {
                self.escalations.fetch_add(1, Ordering::Relaxed);
            }
            AuditRecord::Activation(audit) => match audit.denial_reason {
                Some(reason) => *self.by_denial_reason.entry(reason).or_insert(0) += 1,
                None => {
                    self.activations_allowed.fetch_add(1, Ordering::Relaxed);
                }
            },
        }
    }
}

/// Sends every record to each inner sink.
#[derive(Default, Clone)]
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl AuditSink for FanoutAuditSink {
    fn emit(&self, record: AuditRecord) {
        for sink in &self.sinks {
            sink.emit(record.clone());
        }
    }
}
