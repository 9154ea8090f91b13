//! Stack growth and depth limits for nested member calls.
//!
//! A member body may call other members on the same or another instance,
//! each of which runs a fresh interpreter frame. `stacker` keeps deep but
//! finite call chains from overflowing the native stack; the depth counter
//! turns a member that calls itself forever into a fault instead of an
//! unbounded allocation.

use std::cell::Cell;

use kiln_ir::Fault;

/// Nested member calls allowed on one thread.
pub const MAX_CALL_DEPTH: usize = 10_000;

thread_local! {
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Run `f` one call level deeper, faulting past [`MAX_CALL_DEPTH`].
pub fn with_call_depth<R>(
    member: &str,
    f: impl FnOnce() -> Result<R, Fault>,
) -> Result<R, Fault> {
    let depth = CALL_DEPTH.with(Cell::get);
    if depth >= MAX_CALL_DEPTH {
        return Err(Fault::internal(format!(
            "call depth limit ({MAX_CALL_DEPTH}) exceeded in `{member}`"
        )));
    }
    CALL_DEPTH.with(|d| d.set(depth + 1));
    let result = ensure_sufficient_stack(f);
    CALL_DEPTH.with(|d| d.set(depth));
    result
}

/// Ensure sufficient stack space is available before executing `f`.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    /// Minimum stack space to keep available (100KB red zone).
    const RED_ZONE: usize = 100 * 1024;

    /// Stack space to allocate when growing (1MB).
    const STACK_PER_RECURSION: usize = 1024 * 1024;

    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// WASM version: call directly.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_is_restored_after_call() {
        let before = CALL_DEPTH.with(Cell::get);
        let inner = with_call_depth("outer", || Ok(CALL_DEPTH.with(Cell::get))).unwrap();
        assert_eq!(inner, before + 1);
        assert_eq!(CALL_DEPTH.with(Cell::get), before);
    }

    #[test]
    fn runaway_recursion_faults() {
        fn recurse(n: usize) -> Result<usize, Fault> {
            with_call_depth("recurse", || recurse(n + 1))
        }
        let err = recurse(0).unwrap_err();
        assert!(err.to_string().contains("call depth limit"));
        assert_eq!(CALL_DEPTH.with(Cell::get), 0);
    }
}
