//! Centralized limits and thresholds.
//!
//! Recursion and iteration limits shared by the visitor engine and the
//! desugaring passes. Exceeding a limit never fails a build; the affected
//! subtree is left as-is and a warning is logged.

// =============================================================================
// Recursion Depth Limits
// =============================================================================

/// Maximum nesting depth the visitor engine descends into.
///
/// Deeper subtrees are passed through unchanged.
///
/// ```javascript
/// f(f(f(f(f(f(f(f(f(f(/* ... 500 levels ... */))))))))));
/// ```
pub const MAX_VISIT_DEPTH: u32 = 500;

/// Maximum depth of a single optional chain walked by the drill step.
pub const MAX_CHAIN_DEPTH: u32 = 1_000;

// =============================================================================
// Operation Counts
// =============================================================================

/// How many times a replacement is offered back to the transform list at the
/// same position.
///
/// A JSX expression container unwrapping to another element needs two
/// passes; anything past this bound means two transforms keep rewriting
/// each other's output.
pub const MAX_REWRITE_PASSES: u32 = 8;
