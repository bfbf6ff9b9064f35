//! Runtime invariant checking with contract-test support.
//!
//! Serialization code asserts its size contract through [`assert_invariant!`]:
//! after emitting a master element, the distance from the saved payload start
//! must equal the size the predictor declared up front. Each checked
//! invariant is logged to a thread-local set so tests can verify with
//! [`contract_test`] that the checks actually executed on the exercised path.
//!
//! ```rust,ignore
//! assert_invariant!(
//!     stop - payload_start == declared,
//!     "master payload must match its declared size",
//!     "tracks::write"
//! );
//!
//! #[test]
//! fn contract_tracks_element() {
//!     // ... mux something ...
//!     contract_test("tracks element", &[
//!         "master payload must match its declared size",
//!     ]);
//! }
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::thread_local;

thread_local! {
    static INVARIANT_LOG: RefCell<HashSet<String>> = RefCell::new(HashSet::new());
}

/// Asserts an invariant and logs it for contract testing.
///
/// Panics if the condition is false; a violated size contract is a
/// programming error in a predictor/writer pair, never a caller error.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $message:expr) => {
        $crate::invariant_ppt::check_invariant($condition, $message, None)
    };
    ($condition:expr, $message:expr, $context:expr) => {
        $crate::invariant_ppt::check_invariant($condition, $message, Some($context))
    };
}

#[doc(hidden)]
pub fn check_invariant(condition: bool, message: &str, context: Option<&str>) {
    INVARIANT_LOG.with(|log| {
        log.borrow_mut().insert(message.to_string());
    });

    if !condition {
        let ctx = context.unwrap_or("unknown");
        panic!("INVARIANT VIOLATION [{}]: {}", ctx, message);
    }
}

/// Verifies that each of `required_invariants` was checked at least once on
/// the current thread. Panics listing the ones that never ran.
pub fn contract_test(test_name: &str, required_invariants: &[&str]) {
    let log = INVARIANT_LOG.with(|log| log.borrow().clone());

    let missing: Vec<&str> = required_invariants
        .iter()
        .copied()
        .filter(|invariant| !log.contains(*invariant))
        .collect();

    if !missing.is_empty() {
        panic!(
            "CONTRACT FAILURE [{}]: the following invariants were not checked:\n  - {}",
            test_name,
            missing.join("\n  - ")
        );
    }
}

/// Clears the thread-local invariant log (call between test runs if needed).
pub fn clear_invariant_log() {
    INVARIANT_LOG.with(|log| {
        log.borrow_mut().clear();
    });
}
