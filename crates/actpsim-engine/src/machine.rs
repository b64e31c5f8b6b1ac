//! ACTP transition validation and escrow accounting.
//!
//! The machine never mutates state itself; it plans a list of actions
//! (connection state change, balance updates, runtime events) for the
//! caller to dispatch through the reducer. Funds move against a per-tick
//! balance snapshot, so at most one funded commit per requester-tick holds
//! even when several connections compete for the same balance.

use std::collections::BTreeMap;

use serde_json::json;

use actpsim_types::money::{format_usd, platform_fee, settle_credit};
use actpsim_types::{CanvasState, EventDraft, Micro, TxState};

use crate::action::Action;
use crate::error::{Error, Result};

/// Per-tick view of agent balances, seeded at tick start and mutated in
/// place as successive transitions touch the same agent.
#[derive(Debug, Clone)]
pub struct BalanceSnapshot {
    balances: BTreeMap<String, Micro>,
}

impl BalanceSnapshot {
    pub fn capture(state: &CanvasState) -> Self {
        Self {
            balances: state
                .agents
                .values()
                .map(|a| (a.id.clone(), a.balance_micro))
                .collect(),
        }
    }

    pub fn get(&self, agent_id: &str) -> Result<Micro> {
        self.balances
            .get(agent_id)
            .copied()
            .ok_or_else(|| Error::UnknownAgent(agent_id.to_string()))
    }

    fn set(&mut self, agent_id: &str, value: Micro) {
        self.balances.insert(agent_id.to_string(), value);
    }
}

/// Plan one validated transition with its escrow movements.
///
/// An insolvent commit is not an error: the connection auto-transitions to
/// CANCELLED with no balance movement and an `error` event, per the
/// lifecycle contract.
pub fn plan_transition(
    state: &CanvasState,
    conn_id: &str,
    to: TxState,
    balances: &mut BalanceSnapshot,
) -> Result<Vec<Action>> {
    let conn = state
        .connections
        .get(conn_id)
        .ok_or_else(|| Error::UnknownConnection(conn_id.to_string()))?;
    let from = conn.state;

    if !from.can_transition(to) {
        return Err(Error::InvalidTransition { from, to });
    }

    let mut actions = Vec::new();

    match to {
        TxState::Committed => {
            let available = balances.get(&conn.source_id)?;
            if available < conn.amount_micro {
                actions.push(Action::UpdateConnectionState {
                    id: conn_id.to_string(),
                    state: TxState::Cancelled,
                });
                actions.push(Action::AppendEvent {
                    event: EventDraft::error(format!(
                        "Insufficient funds: {} has {}, needs {}",
                        conn.source_id,
                        format_usd(available),
                        format_usd(conn.amount_micro),
                    ))
                    .for_agent(conn.source_id.clone())
                    .for_connection(conn_id.to_string())
                    .with_payload(json!({
                        "reason": "insufficient_funds",
                        "requiredMicro": conn.amount_micro,
                        "availableMicro": available,
                    })),
                });
                return Ok(actions);
            }

            let remaining = available - conn.amount_micro;
            balances.set(&conn.source_id, remaining);
            actions.push(Action::UpdateConnectionState {
                id: conn_id.to_string(),
                state: TxState::Committed,
            });
            actions.push(Action::UpdateAgentBalance {
                id: conn.source_id.clone(),
                balance_micro: remaining,
            });
            actions.push(Action::AppendEvent {
                event: EventDraft::info(format!(
                    "{}: {} -> COMMITTED ({} locked in escrow)",
                    conn_id,
                    from,
                    format_usd(conn.amount_micro),
                ))
                .for_agent(conn.source_id.clone())
                .for_connection(conn_id.to_string())
                .with_payload(json!({
                    "from": from,
                    "to": TxState::Committed,
                    "amountMicro": conn.amount_micro,
                })),
            });
        }

        TxState::Settled => {
            let fee = platform_fee(conn.amount_micro);
            let credit = settle_credit(conn.amount_micro);
            let provider_balance = balances.get(&conn.target_id)? + credit;
            balances.set(&conn.target_id, provider_balance);
            actions.push(Action::UpdateConnectionState {
                id: conn_id.to_string(),
                state: TxState::Settled,
            });
            actions.push(Action::UpdateAgentBalance {
                id: conn.target_id.clone(),
                balance_micro: provider_balance,
            });
            actions.push(Action::AppendEvent {
                event: EventDraft::success(format!(
                    "{}: {} -> SETTLED ({} released to {}, fee {})",
                    conn_id,
                    from,
                    format_usd(credit),
                    conn.target_id,
                    format_usd(fee),
                ))
                .for_agent(conn.target_id.clone())
                .for_connection(conn_id.to_string())
                .with_payload(json!({
                    "from": from,
                    "to": TxState::Settled,
                    "creditMicro": credit,
                    "feeMicro": fee,
                })),
            });
        }

        TxState::Cancelled => {
            let escrowed = matches!(from, TxState::Committed | TxState::InProgress);
            actions.push(Action::UpdateConnectionState {
                id: conn_id.to_string(),
                state: TxState::Cancelled,
            });
            if escrowed {
                let refunded = balances.get(&conn.source_id)? + conn.amount_micro;
                balances.set(&conn.source_id, refunded);
                actions.push(Action::UpdateAgentBalance {
                    id: conn.source_id.clone(),
                    balance_micro: refunded,
                });
            }
            actions.push(Action::AppendEvent {
                event: EventDraft::warning(if escrowed {
                    format!(
                        "{}: {} -> CANCELLED ({} refunded to {})",
                        conn_id,
                        from,
                        format_usd(conn.amount_micro),
                        conn.source_id,
                    )
                } else {
                    format!("{}: {} -> CANCELLED", conn_id, from)
                })
                .for_agent(conn.source_id.clone())
                .for_connection(conn_id.to_string())
                .with_payload(json!({
                    "from": from,
                    "to": TxState::Cancelled,
                    "refundedMicro": if escrowed { conn.amount_micro } else { 0 },
                })),
            });
        }

        // No funds move on the remaining edges.
        _ => {
            actions.push(Action::UpdateConnectionState {
                id: conn_id.to_string(),
                state: to,
            });
            actions.push(Action::AppendEvent {
                event: EventDraft::info(format!("{}: {} -> {}", conn_id, from, to))
                    .for_connection(conn_id.to_string())
                    .with_payload(json!({ "from": from, "to": to })),
            });
        }
    }

    Ok(actions)
}

/// Advance one connection a single step along the happy path.
///
/// Returns `Ok(None)` when the connection is terminal.
pub fn plan_happy_step(
    state: &CanvasState,
    conn_id: &str,
    balances: &mut BalanceSnapshot,
) -> Result<Option<Vec<Action>>> {
    let conn = state
        .connections
        .get(conn_id)
        .ok_or_else(|| Error::UnknownConnection(conn_id.to_string()))?;
    match conn.state.next_happy() {
        Some(next) => plan_transition(state, conn_id, next, balances).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::reduce;
    use actpsim_types::money::USDC;
    use actpsim_types::{Agent, AgentKind, Connection};

    fn escrow_state(requester_balance: Micro, amount: Micro) -> CanvasState {
        let mut state = CanvasState::new();
        state.agents.insert(
            "agent-1".to_string(),
            Agent::new("agent-1", "A", AgentKind::Requester).with_balance(requester_balance),
        );
        state.agents.insert(
            "agent-2".to_string(),
            Agent::new("agent-2", "B", AgentKind::Provider),
        );
        state.connections.insert(
            "tx-1".to_string(),
            Connection::new("tx-1", "agent-1", "agent-2", amount, "x", 0),
        );
        state
    }

    fn apply_all(state: &CanvasState, actions: Vec<Action>) -> CanvasState {
        actions
            .iter()
            .fold(state.clone(), |state, action| reduce(&state, action))
    }

    #[test]
    fn test_commit_locks_escrow() {
        let state = escrow_state(100 * USDC, 10 * USDC);
        let mut balances = BalanceSnapshot::capture(&state);
        let actions =
            plan_transition(&state, "tx-1", TxState::Committed, &mut balances).unwrap();
        let state = apply_all(&state, actions);

        assert_eq!(state.agents["agent-1"].balance_micro, 90 * USDC);
        assert_eq!(state.connections["tx-1"].state, TxState::Committed);
        assert_eq!(balances.get("agent-1").unwrap(), 90 * USDC);
    }

    #[test]
    fn test_insolvent_commit_auto_cancels() {
        let state = escrow_state(40_000, USDC);
        let mut balances = BalanceSnapshot::capture(&state);
        let actions =
            plan_transition(&state, "tx-1", TxState::Committed, &mut balances).unwrap();
        let state = apply_all(&state, actions);

        assert_eq!(state.connections["tx-1"].state, TxState::Cancelled);
        assert_eq!(state.agents["agent-1"].balance_micro, 40_000);
        let errors: Vec<_> = state
            .events
            .iter()
            .filter(|e| e.message.contains("Insufficient funds"))
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].payload["reason"], "insufficient_funds");
    }

    #[test]
    fn test_settle_credits_amount_minus_fee() {
        let mut state = escrow_state(100 * USDC, 10 * USDC);
        state.connections.get_mut("tx-1").unwrap().state = TxState::Delivered;
        state.agents.get_mut("agent-1").unwrap().balance_micro = 90 * USDC;

        let mut balances = BalanceSnapshot::capture(&state);
        let actions = plan_transition(&state, "tx-1", TxState::Settled, &mut balances).unwrap();
        let state = apply_all(&state, actions);

        assert_eq!(state.agents["agent-2"].balance_micro, 9_900_000);
        assert_eq!(state.connections["tx-1"].state, TxState::Settled);
        let settled = state
            .events
            .iter()
            .find(|e| e.payload["feeMicro"].is_number())
            .unwrap();
        assert_eq!(settled.payload["feeMicro"], 100_000);
    }

    #[test]
    fn test_cancel_after_commit_refunds() {
        let mut state = escrow_state(10 * USDC, 10 * USDC);
        let mut balances = BalanceSnapshot::capture(&state);
        let actions =
            plan_transition(&state, "tx-1", TxState::Committed, &mut balances).unwrap();
        state = apply_all(&state, actions);
        assert_eq!(state.agents["agent-1"].balance_micro, 0);

        let actions =
            plan_transition(&state, "tx-1", TxState::Cancelled, &mut balances).unwrap();
        let state = apply_all(&state, actions);
        assert_eq!(state.agents["agent-1"].balance_micro, 10 * USDC);
        assert_eq!(state.agents["agent-2"].balance_micro, 0);
        assert_eq!(state.connections["tx-1"].state, TxState::Cancelled);
    }

    #[test]
    fn test_cancel_before_commit_moves_nothing() {
        let state = escrow_state(10 * USDC, 10 * USDC);
        let mut balances = BalanceSnapshot::capture(&state);
        let actions =
            plan_transition(&state, "tx-1", TxState::Cancelled, &mut balances).unwrap();
        let state = apply_all(&state, actions);
        assert_eq!(state.agents["agent-1"].balance_micro, 10 * USDC);
        assert_eq!(state.connections["tx-1"].state, TxState::Cancelled);
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let state = escrow_state(USDC, USDC);
        let mut balances = BalanceSnapshot::capture(&state);
        let err = plan_transition(&state, "tx-1", TxState::Settled, &mut balances).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[test]
    fn test_unknown_connection_rejected() {
        let state = escrow_state(USDC, USDC);
        let mut balances = BalanceSnapshot::capture(&state);
        let err =
            plan_transition(&state, "tx-404", TxState::Committed, &mut balances).unwrap_err();
        assert!(matches!(err, Error::UnknownConnection(_)));
    }

    #[test]
    fn test_snapshot_bounds_commits_within_tick() {
        // Two connections from the same requester; only the first finds funds.
        let mut state = escrow_state(10 * USDC, 10 * USDC);
        state.connections.insert(
            "tx-2".to_string(),
            Connection::new("tx-2", "agent-1", "agent-2", 10 * USDC, "x", 0),
        );

        let mut balances = BalanceSnapshot::capture(&state);
        let first = plan_transition(&state, "tx-1", TxState::Committed, &mut balances).unwrap();
        let state = apply_all(&state, first);
        let second = plan_transition(&state, "tx-2", TxState::Committed, &mut balances).unwrap();
        let state = apply_all(&state, second);

        assert_eq!(state.connections["tx-1"].state, TxState::Committed);
        assert_eq!(state.connections["tx-2"].state, TxState::Cancelled);
        assert_eq!(state.agents["agent-1"].balance_micro, 0);
    }

    #[test]
    fn test_happy_step_runs_full_lifecycle() {
        let mut state = escrow_state(100 * USDC, 10 * USDC);
        let mut seen = vec![state.connections["tx-1"].state];
        loop {
            let mut balances = BalanceSnapshot::capture(&state);
            match plan_happy_step(&state, "tx-1", &mut balances).unwrap() {
                Some(actions) => state = apply_all(&state, actions),
                None => break,
            }
            seen.push(state.connections["tx-1"].state);
        }
        assert_eq!(
            seen,
            vec![
                TxState::Initiated,
                TxState::Committed,
                TxState::InProgress,
                TxState::Delivered,
                TxState::Settled,
            ]
        );
        assert_eq!(state.agents["agent-1"].balance_micro, 90 * USDC);
        assert_eq!(state.agents["agent-2"].balance_micro, 9_900_000);
    }
}
