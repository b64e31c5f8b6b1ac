//! Soft static analysis over agent code.
//!
//! Heuristic warnings for likely mistakes: misspelled `ctx`, unknown ctx
//! members, unknown transaction properties. Suggestions use Levenshtein
//! distance. Warnings never block execution.

use std::collections::BTreeSet;

use regex::Regex;

/// Maximum edit distance for a "did you mean" suggestion
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Maximum warnings emitted per run
const MAX_WARNINGS: usize = 10;

const CTX_MEMBERS: [&str; 16] = [
    "agentId",
    "agentName",
    "agentType",
    "balance",
    "incomingTransactions",
    "transactions",
    "state",
    "log",
    "warn",
    "error",
    "createTransaction",
    "transitionState",
    "releaseEscrow",
    "initiateDispute",
    "cancelTransaction",
    "services",
];

const TX_FIELDS: [&str; 11] = [
    "id",
    "sourceId",
    "targetId",
    "amountMicro",
    "service",
    "state",
    "createdAt",
    "updatedAt",
    "deliverableHash",
    "provider",
    "deadlineMs",
];

/// Classic two-row Levenshtein distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

fn closest<'a>(needle: &str, haystack: &[&'a str]) -> Option<&'a str> {
    haystack
        .iter()
        .map(|candidate| (levenshtein(needle, candidate), *candidate))
        .filter(|(distance, _)| *distance > 0 && *distance <= MAX_SUGGESTION_DISTANCE)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate)
}

/// Collect heuristic warnings for `code`.
pub fn analyze(code: &str) -> Vec<String> {
    let mut warnings = BTreeSet::new();

    misspelled_ctx(code, &mut warnings);
    unknown_ctx_members(code, &mut warnings);
    unknown_tx_properties(code, &mut warnings);

    warnings.into_iter().take(MAX_WARNINGS).collect()
}

/// `cxt.log(...)` and friends: a chain receiver that looks like `ctx` but
/// is never declared.
fn misspelled_ctx(code: &str, warnings: &mut BTreeSet<String>) {
    let receiver = Regex::new(r"(?:^|[^.\w])([A-Za-z_]\w*)\s*\.").expect("static pattern");
    for capture in receiver.captures_iter(code) {
        let name = &capture[1];
        if name == "ctx" || is_declared(code, name) {
            continue;
        }
        let distance = levenshtein(name, "ctx");
        if distance > 0 && distance <= 2 {
            warnings.insert(format!("'{}' is not defined. Did you mean 'ctx'?", name));
        }
    }
}

fn unknown_ctx_members(code: &str, warnings: &mut BTreeSet<String>) {
    let member = Regex::new(r"\bctx\s*\.\s*([A-Za-z_]\w*)").expect("static pattern");
    for capture in member.captures_iter(code) {
        let name = &capture[1];
        if CTX_MEMBERS.contains(&name) {
            continue;
        }
        match closest(name, &CTX_MEMBERS) {
            Some(suggestion) => warnings.insert(format!(
                "Unknown ctx property '{}'. Did you mean '{}'?",
                name, suggestion
            )),
            None => warnings.insert(format!("'ctx.{}' is not defined", name)),
        };
    }
}

/// Property access on an identifier that looks like a transaction binding.
///
/// Chain members (`ctx.transactions...`) and method calls (`.len()`) are
/// not field typos and stay quiet.
fn unknown_tx_properties(code: &str, warnings: &mut BTreeSet<String>) {
    let access = Regex::new(r"(?:^|[^.\w])(tx|txn|transaction)\w*\s*\.\s*([A-Za-z_]\w*)")
        .expect("static pattern");
    for capture in access.captures_iter(code) {
        let property = capture.get(2).expect("group 2");
        if code[property.end()..].trim_start().starts_with('(') {
            continue;
        }
        let property = property.as_str();
        if TX_FIELDS.contains(&property) {
            continue;
        }
        if let Some(suggestion) = closest(property, &TX_FIELDS) {
            warnings.insert(format!(
                "Unknown transaction property 'tx.{}'. Did you mean '{}'?",
                property, suggestion
            ));
        }
    }
}

fn is_declared(code: &str, name: &str) -> bool {
    let declaration = Regex::new(&format!(
        r"\b(?:let|const|fn|for)\s+{}\b",
        regex::escape(name)
    ))
    .expect("static pattern");
    declaration.is_match(code)
}
