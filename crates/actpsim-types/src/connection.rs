use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::money::Micro;

/// ACTP transaction lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxState {
    Initiated,
    Quoted,
    Committed,
    InProgress,
    Delivered,
    Settled,
    Disputed,
    Cancelled,
}

impl TxState {
    pub const ALL: [TxState; 8] = [
        TxState::Initiated,
        TxState::Quoted,
        TxState::Committed,
        TxState::InProgress,
        TxState::Delivered,
        TxState::Settled,
        TxState::Disputed,
        TxState::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TxState::Initiated => "INITIATED",
            TxState::Quoted => "QUOTED",
            TxState::Committed => "COMMITTED",
            TxState::InProgress => "IN_PROGRESS",
            TxState::Delivered => "DELIVERED",
            TxState::Settled => "SETTLED",
            TxState::Disputed => "DISPUTED",
            TxState::Cancelled => "CANCELLED",
        }
    }

    /// Terminal states are absorbing: no transition leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxState::Settled | TxState::Cancelled)
    }

    /// Whether `self -> to` is an edge of the lifecycle state machine.
    pub fn can_transition(&self, to: TxState) -> bool {
        use TxState::*;
        matches!(
            (self, to),
            (Initiated, Quoted)
                | (Initiated, Committed)
                | (Initiated, Cancelled)
                | (Quoted, Committed)
                | (Quoted, Cancelled)
                | (Committed, InProgress)
                | (Committed, Delivered)
                | (Committed, Cancelled)
                | (InProgress, Delivered)
                | (InProgress, Disputed)
                | (InProgress, Cancelled)
                | (Delivered, Settled)
                | (Delivered, Disputed)
                | (Disputed, Settled)
        )
    }

    /// Next state along the happy path, if any.
    ///
    /// Used by the non-executing simulation mode and the UI advance
    /// control; terminal states and QUOTED-less paths fold into COMMITTED.
    pub fn next_happy(&self) -> Option<TxState> {
        match self {
            TxState::Initiated | TxState::Quoted => Some(TxState::Committed),
            TxState::Committed => Some(TxState::InProgress),
            TxState::InProgress => Some(TxState::Delivered),
            TxState::Delivered => Some(TxState::Settled),
            TxState::Disputed => Some(TxState::Settled),
            TxState::Settled | TxState::Cancelled => None,
        }
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TxState::ALL
            .iter()
            .find(|state| state.as_str() == s)
            .copied()
            .ok_or_else(|| Error::InvalidState(s.to_string()))
    }
}

/// A directed transaction edge between two agents.
///
/// `source_id` is the requester (funds leave its balance at commit),
/// `target_id` the provider. `deliverable_hash` is set at most once, when
/// the connection first enters DELIVERED.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub amount_micro: Micro,
    pub service: String,
    pub created_at: u64,
    pub state: TxState,
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deliverable_hash: Option<String>,
}

impl Connection {
    pub fn new(
        id: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        amount_micro: Micro,
        service: impl Into<String>,
        created_at: u64,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            amount_micro,
            service: service.into(),
            created_at,
            state: TxState::Initiated,
            updated_at: created_at,
            deliverable_hash: None,
        }
    }
}
