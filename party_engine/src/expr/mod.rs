//! Sandboxed expression language and `{{ }}` templating.
//!
//! Expressions are parsed by a dedicated grammar and evaluated over JSON
//! values. The evaluator can only see the [`EvalContext`] bindings and a
//! closed table of built-in functions, so configuration can reference live
//! game data without being able to run anything else.
//!
//! ## Example
//!
//! ```
//! use party_engine::expr::{EvalContext, Resolver};
//! use serde_json::{Map, json};
//! use std::time::Duration;
//!
//! let state = json!({ "status": "LOBBY", "round": 2 });
//! let data = json!({});
//! let extras = Map::new();
//! let resolver = Resolver::new(EvalContext {
//!     game_state: &state,
//!     game_data: &data,
//!     players: &[],
//!     host_id: "host",
//!     time_in_state: Duration::ZERO,
//!     extras: &extras,
//! });
//!
//! assert_eq!(resolver.resolve(&json!("{{ gameState.round * 10 }}")), json!(20));
//! assert_eq!(resolver.resolve(&json!("Round {{ gameState.round }}")), json!("Round 2"));
//! ```

pub mod context;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod template;

pub use context::EvalContext;
pub use error::ExprError;
pub use eval::{Bindings, evaluate, truthy};
pub use parser::{Expr, parse};
pub use template::Resolver;
