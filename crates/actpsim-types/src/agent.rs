use serde::{Deserialize, Serialize};

use crate::money::Micro;

/// Role of an agent on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Requester,
    Provider,
    Validator,
}

/// Execution status of an agent, updated per tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Running,
    Completed,
    Error,
}

/// An agent on the canvas.
///
/// Balance is mutated only by the escrow accountant; `code` is the
/// user-authored script the sandbox runs every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AgentKind,
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    pub balance_micro: Micro,
    pub status: AgentStatus,
    #[serde(default)]
    pub code: String,
}

impl Agent {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            icon: String::new(),
            template_id: None,
            balance_micro: 0,
            status: AgentStatus::Idle,
            code: String::new(),
        }
    }

    pub fn with_balance(mut self, balance_micro: Micro) -> Self {
        self.balance_micro = balance_micro;
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }
}
