//! Test support for the fuse crates.
//!
//! - [`js_parser`]: a small parser for the JavaScript/JSX subset the tests
//!   use. It produces Babel-shaped optional chains
//!   (`OptionalMemberExpression` / `OptionalCallExpression`).
//! - [`interpreter`]: a tree-walking evaluator used to check that lowered
//!   output behaves like the input (short-circuiting, `this`, evaluate-once).
//!
//! Neither is a conforming implementation. Failures are returned as errors;
//! the `parse_program` / `parse_expression` helpers panic so tests stay short.

pub mod interpreter;
pub mod js_parser;

pub use interpreter::{Interpreter, JsValue};
pub use js_parser::{parse_expression, parse_module, parse_program};
