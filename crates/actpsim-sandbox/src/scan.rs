//! Pre-parse rejection of asynchronous control flow.
//!
//! The sandbox is synchronous-per-tick: agent code runs to completion
//! inside its tick, and long-running work goes through the services job
//! queue instead. Any async primitive is rejected before the VM ever sees
//! the script.

use regex::Regex;
use std::sync::OnceLock;

const FORBIDDEN: [(&str, &str); 4] = [
    ("async", r"\basync\b"),
    ("await", r"\bawait\b"),
    ("Promise", r"\bPromise\b"),
    (".then(", r"\.then\s*\("),
];

fn patterns() -> &'static Vec<(&'static str, Regex)> {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        FORBIDDEN
            .iter()
            .map(|(name, pattern)| (*name, Regex::new(pattern).expect("static pattern")))
            .collect()
    })
}

/// The first forbidden construct found in `code`, if any.
pub fn find_forbidden(code: &str) -> Option<&'static str> {
    patterns()
        .iter()
        .find(|(_, regex)| regex.is_match(code))
        .map(|(name, _)| *name)
}

/// Validation message for a forbidden construct hit.
pub fn forbidden_message(construct: &str) -> String {
    format!(
        "Async constructs are not allowed in agent code: found '{}'. \
         Use ctx.services for long-running work and poll ctx.state.jobs.",
        construct
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_each_construct() {
        assert_eq!(find_forbidden("let x = await f();"), Some("await"));
        assert_eq!(find_forbidden("async fn f() {}"), Some("async"));
        assert_eq!(find_forbidden("Promise.resolve(1)"), Some("Promise"));
        assert_eq!(find_forbidden("f().then(|x| x)"), Some(".then("));
        assert_eq!(find_forbidden("f() . then ()"), None);
    }

    #[test]
    fn test_word_boundaries_respected() {
        assert_eq!(find_forbidden("let awaiting = 1;"), None);
        assert_eq!(find_forbidden("let asynchronous = 1;"), None);
        // `then` as a plain identifier is fine; only `.then(` is the
        // promise-chaining shape.
        assert_eq!(find_forbidden("let then = 1;"), None);
    }

    #[test]
    fn test_clean_code_passes() {
        let code = r#"
            ctx.log("hello");
            let id = ctx.services.translate(#{text: "hi", to: "es"});
        "#;
        assert_eq!(find_forbidden(code), None);
    }
}
