//! Canonical scenario inputs shared across the integration suites.

use actpsim_types::money::USDC;
use actpsim_types::{Agent, AgentKind, CanvasState, Connection, Micro};

pub fn requester(id: &str, name: &str, balance_micro: Micro) -> Agent {
    Agent::new(id, name, AgentKind::Requester).with_balance(balance_micro)
}

pub fn provider(id: &str, name: &str) -> Agent {
    Agent::new(id, name, AgentKind::Provider)
}

pub fn connection(id: &str, source: &str, target: &str, amount_micro: Micro) -> Connection {
    Connection::new(id, source, target, amount_micro, "translate", 0)
}

/// Basic escrow pair: A holds 100 USDC, B holds nothing, one INITIATED
/// connection of 10 USDC between them.
pub fn escrow_pair() -> CanvasState {
    let mut state = CanvasState::new();
    let a = requester("agent-1", "A", 100 * USDC);
    let b = provider("agent-2", "B");
    state.agents.insert(a.id.clone(), a);
    state.agents.insert(b.id.clone(), b);
    let tx = connection("tx-1", "agent-1", "agent-2", 10 * USDC);
    state.connections.insert(tx.id.clone(), tx);
    state.id_counter = state.next_id_counter();
    state
}

/// Requester code: commit INITIATED outgoing work, release escrow once it
/// is DELIVERED.
pub const REQUESTER_DRIVER: &str = r#"
for tx in ctx.transactions {
    if tx.state == "INITIATED" {
        ctx.transitionState(tx.id, "COMMITTED");
        ctx.log("committed " + tx.id);
    } else if tx.state == "DELIVERED" {
        ctx.releaseEscrow(tx.id);
        ctx.log("released " + tx.id);
    }
}
"#;

/// Provider code: work incoming COMMITTED transactions through
/// IN_PROGRESS to DELIVERED, recording a deliverable per transaction.
pub const PROVIDER_WORKER: &str = r#"
if !("deliverables" in ctx.state) {
    ctx.state.deliverables = #{};
}
for tx in ctx.incomingTransactions {
    if tx.state == "COMMITTED" {
        ctx.transitionState(tx.id, "IN_PROGRESS");
        ctx.log("started " + tx.id);
    } else if tx.state == "IN_PROGRESS" {
        let work = "deliverable for " + tx.id;
        ctx.state.deliverables[tx.id] = work;
        ctx.transitionState(tx.id, "DELIVERED");
        ctx.log("delivered " + tx.id);
    }
}
"#;

/// Idle code: logs the same line every tick and never emits an op.
pub const IDLE_LOGGER: &str = r#"
ctx.log("waiting for work");
"#;

/// Hostile code: never terminates on its own.
pub const INFINITE_LOOP: &str = "loop { }";
