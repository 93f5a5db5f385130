//! Runtime invariants with contract-test support
//!
//! Production code states invariants with [`assert_invariant!`]; every checked
//! invariant is recorded per thread so a contract test can prove that a code
//! path actually exercised it.
//!
//! ```rust,ignore
//! use crabeye::assert_invariant;
//!
//! assert_invariant!(
//!     catalog::is_valid(&entry),
//!     "Catalog entries satisfy the validity predicate",
//!     "format::catalog"
//! );
//! ```

use std::cell::RefCell;
use std::collections::HashSet;

thread_local! {
    static CHECKED: RefCell<HashSet<String>> = RefCell::new(HashSet::new());
}

/// Assert an invariant and record that it was checked.
///
/// Panics if the condition is false.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $message:expr) => {
        $crate::invariant_ppt::__check_invariant($condition, $message, None)
    };
    ($condition:expr, $message:expr, $context:expr) => {
        $crate::invariant_ppt::__check_invariant($condition, $message, Some($context))
    };
}

#[doc(hidden)]
pub fn __check_invariant(condition: bool, message: &str, context: Option<&str>) {
    CHECKED.with(|checked| {
        checked.borrow_mut().insert(message.to_string());
    });

    if !condition {
        panic!(
            "INVARIANT VIOLATION [{}]: {}",
            context.unwrap_or("unknown"),
            message
        );
    }
}

/// Panics unless every listed invariant was checked on this thread.
pub fn contract_test(name: &str, required: &[&str]) {
    let checked = CHECKED.with(|checked| checked.borrow().clone());
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|invariant| !checked.contains(*invariant))
        .collect();

    if !missing.is_empty() {
        panic!(
            "CONTRACT FAILURE [{}]: invariants never checked:\n  - {}",
            name,
            missing.join("\n  - ")
        );
    }
}

/// Forget every invariant recorded on this thread.
pub fn clear_invariant_log() {
    CHECKED.with(|checked| checked.borrow_mut().clear());
}
