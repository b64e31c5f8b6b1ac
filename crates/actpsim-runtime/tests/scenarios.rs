//! End-to-end lifecycle scenarios driven through the real worker and VM.

use actpsim_engine::{replay, ReplayEngine, SessionSnapshot};
use actpsim_runtime::{Canvas, RuntimeConfig};
use actpsim_testing::{
    assert_balance, assert_connection_state, count_error_events, escrow_pair, state_trail,
    INFINITE_LOOP, PROVIDER_WORKER, REQUESTER_DRIVER,
};
use actpsim_types::money::USDC;
use actpsim_types::{AgentStatus, ResourceLimits, TxState};

fn canvas_with(state: actpsim_types::CanvasState) -> Canvas {
    let mut canvas = Canvas::new();
    canvas.load_state(SessionSnapshot::capture(&state));
    canvas
}

/// Scenario 1: basic escrow happy path, driven by agent code.
#[test]
fn test_basic_escrow_happy_path() {
    let mut canvas = canvas_with(escrow_pair());
    canvas.update_agent_code("agent-1", REQUESTER_DRIVER);
    canvas.update_agent_code("agent-2", PROVIDER_WORKER);

    canvas.run_ticks(3);
    let state = canvas.state();

    assert_balance(state, "agent-1", 90 * USDC).unwrap();
    assert_balance(state, "agent-2", 9_900_000).unwrap();
    assert_connection_state(state, "tx-1", TxState::Settled).unwrap();

    let trail = state_trail(state, "tx-1");
    for expected in ["INITIATED", "COMMITTED", "IN_PROGRESS", "DELIVERED", "SETTLED"] {
        assert!(
            trail.iter().any(|s| s == expected),
            "missing {} in trail {:?}",
            expected,
            trail
        );
    }

    // Exactly one settlement fee of $0.10.
    let fees: Vec<i64> = state
        .events
        .iter()
        .filter_map(|e| e.payload.get("feeMicro").and_then(|v| v.as_i64()))
        .collect();
    assert_eq!(fees, vec![100_000]);

    // The provider's deliverable was content-addressed exactly once.
    let hash = state.connections["tx-1"].deliverable_hash.as_ref().unwrap();
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
}

/// Scenario 2: insufficient funds at commit auto-cancels, no movement.
#[test]
fn test_insufficient_funds_at_commit() {
    let mut state = escrow_pair();
    state.agents.get_mut("agent-1").unwrap().balance_micro = 40_000;
    state.connections.get_mut("tx-1").unwrap().amount_micro = 1_000_000;

    let mut canvas = canvas_with(state);
    canvas.update_agent_code("agent-1", REQUESTER_DRIVER);

    canvas.run_ticks(1);
    let state = canvas.state();

    assert_connection_state(state, "tx-1", TxState::Cancelled).unwrap();
    assert_balance(state, "agent-1", 40_000).unwrap();
    assert_eq!(count_error_events(state, "Insufficient funds"), 1);
}

/// Scenario 3: cancel after commit refunds in full.
#[test]
fn test_cancel_after_commit_refunds() {
    let mut state = escrow_pair();
    state.agents.get_mut("agent-1").unwrap().balance_micro = 10 * USDC;

    let mut canvas = canvas_with(state);
    canvas.update_agent_code(
        "agent-1",
        r#"
        for tx in ctx.transactions {
            if tx.state == "INITIATED" {
                ctx.transitionState(tx.id, "COMMITTED");
            } else if tx.state == "COMMITTED" {
                ctx.cancelTransaction(tx.id);
            }
        }
        "#,
    );

    canvas.run_ticks(1);
    assert_balance(canvas.state(), "agent-1", 0).unwrap();

    canvas.run_ticks(1);
    let state = canvas.state();
    assert_balance(state, "agent-1", 10 * USDC).unwrap();
    assert_balance(state, "agent-2", 0).unwrap();
    assert_connection_state(state, "tx-1", TxState::Cancelled).unwrap();
}

/// Scenario 4: a hostile agent times out without touching the rest of the
/// tick.
#[test]
fn test_timeout_isolation() {
    let config = RuntimeConfig {
        limits: ResourceLimits {
            max_execution_time_ms: 150,
            ..ResourceLimits::default()
        },
        ..RuntimeConfig::default()
    };
    let mut canvas = Canvas::with_config(config);
    canvas.load_state(SessionSnapshot::capture(&escrow_pair()));
    canvas.update_agent_code("agent-1", INFINITE_LOOP);
    canvas.update_agent_code("agent-2", "ctx.log(\"still here\");");

    let interval = canvas.state().tick_interval_ms;
    canvas.run_ticks(1);
    let state = canvas.state();

    assert_eq!(state.agents["agent-1"].status, AgentStatus::Error);
    assert_eq!(state.agents["agent-2"].status, AgentStatus::Completed);
    assert_connection_state(state, "tx-1", TxState::Initiated).unwrap();
    assert_eq!(state.virtual_time_ms, interval);
    assert_eq!(state.tick, 1);
    assert!(state
        .events
        .iter()
        .any(|e| e.agent_id.as_deref() == Some("agent-2") && e.message == "still here"));

    // The worker respawns; the next tick still executes agents.
    canvas.update_agent_code("agent-1", "ctx.log(\"recovered\");");
    canvas.run_ticks(1);
    assert_eq!(canvas.state().agents["agent-1"].status, AgentStatus::Completed);
}

/// Scenario 5: deterministic id continuity across imports.
#[test]
fn test_id_continuity_across_import() {
    let mut imported = actpsim_types::CanvasState::new();
    let agent = actpsim_testing::requester("agent-7", "Seven", 20 * USDC);
    imported.agents.insert(agent.id.clone(), agent);
    let provider = actpsim_testing::provider("agent-2", "Two");
    imported.agents.insert(provider.id.clone(), provider);
    imported.connections.insert(
        "tx-12".to_string(),
        actpsim_testing::connection("tx-12", "agent-7", "agent-2", USDC),
    );

    let mut canvas = canvas_with(imported);

    let new_agent = canvas.add_agent(
        actpsim_runtime::AgentSpec::new("Eight", actpsim_types::AgentKind::Provider),
        None,
    );
    assert_eq!(new_agent, "agent-8");

    canvas.update_agent_code(
        "agent-7",
        r#"
        if ctx.transactions.len() == 1 {
            let id = ctx.createTransaction(#{
                provider: "agent-2",
                amountMicro: 1_000_000,
                service: "translate",
            });
            ctx.log("minted " + id);
        }
        "#,
    );
    canvas.run_ticks(1);
    assert!(canvas.state().connections.contains_key("tx-13"));
}

/// Scenario 6: a recorded three-agent pipeline replays bit-identically.
#[test]
fn test_pipeline_replay_determinism() {
    let mut canvas = Canvas::new();
    let client = canvas.add_agent(
        actpsim_runtime::AgentSpec::new("Client", actpsim_types::AgentKind::Requester)
            .with_balance(100 * USDC),
        None,
    );
    let orchestrator = canvas.add_agent(
        actpsim_runtime::AgentSpec::new("Orchestrator", actpsim_types::AgentKind::Validator)
            .with_balance(50 * USDC),
        None,
    );
    let translator = canvas.add_agent(
        actpsim_runtime::AgentSpec::new("Translator", actpsim_types::AgentKind::Provider),
        None,
    );
    assert_eq!(
        (client.as_str(), orchestrator.as_str(), translator.as_str()),
        ("agent-1", "agent-2", "agent-3")
    );

    canvas.update_agent_code(
        "agent-1",
        r#"
        if ctx.transactions.len() == 0 {
            ctx.createTransaction(#{
                provider: "agent-2",
                amountMicro: 10_000_000,
                service: "translate",
            });
        }
        for tx in ctx.transactions {
            if tx.state == "INITIATED" {
                ctx.transitionState(tx.id, "COMMITTED");
            } else if tx.state == "DELIVERED" {
                ctx.releaseEscrow(tx.id);
            }
        }
        "#,
    );
    canvas.update_agent_code(
        "agent-2",
        r#"
        if !("forwarded" in ctx.state) { ctx.state.forwarded = #{}; }
        if !("deliverables" in ctx.state) { ctx.state.deliverables = #{}; }

        for tx in ctx.incomingTransactions {
            if tx.state == "COMMITTED" {
                ctx.transitionState(tx.id, "IN_PROGRESS");
                if !(tx.id in ctx.state.forwarded) {
                    let sub = ctx.createTransaction(#{
                        provider: "agent-3",
                        amountMicro: 2_000_000,
                        service: "translate",
                    });
                    ctx.state.forwarded[tx.id] = sub;
                }
            }
        }
        for sub in ctx.transactions {
            if sub.state == "INITIATED" {
                ctx.transitionState(sub.id, "COMMITTED");
            } else if sub.state == "DELIVERED" {
                ctx.releaseEscrow(sub.id);
            }
        }
        for tx in ctx.incomingTransactions {
            if tx.state == "IN_PROGRESS" && tx.id in ctx.state.forwarded {
                let sub_id = ctx.state.forwarded[tx.id];
                for sub in ctx.transactions {
                    if sub.id == sub_id && sub.state == "SETTLED" {
                        ctx.state.deliverables[tx.id] = "orchestrated:" + sub_id;
                        ctx.transitionState(tx.id, "DELIVERED");
                    }
                }
            }
        }
        "#,
    );
    canvas.update_agent_code("agent-3", PROVIDER_WORKER);

    canvas.start_recording();
    canvas.run_ticks(8);
    let log = canvas.stop_recording().unwrap();
    let recorded = canvas.state().clone();

    // The client's request settled end to end.
    let client_tx = recorded
        .connections
        .values()
        .find(|c| c.source_id == "agent-1")
        .unwrap();
    assert_eq!(client_tx.state, TxState::Settled);
    assert!(client_tx.deliverable_hash.is_some());
    let sub_tx = recorded
        .connections
        .values()
        .find(|c| c.source_id == "agent-2")
        .unwrap();
    assert_eq!(sub_tx.state, TxState::Settled);
    assert!(sub_tx.deliverable_hash.is_some());

    // Replay reproduces every balance, hash and event.
    assert!(replay::verify(log.clone(), &recorded).unwrap());

    let mut engine = ReplayEngine::new(log).unwrap();
    while engine.step().is_some() {}
    let replayed = engine.state();
    assert_eq!(replayed.agents, recorded.agents);
    assert_eq!(replayed.connections, recorded.connections);
    assert_eq!(replayed.events, recorded.events);
    assert_eq!(replayed.virtual_time_ms, recorded.virtual_time_ms);
    assert_eq!(replayed.id_counter, recorded.id_counter);
}
