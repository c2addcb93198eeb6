//! Effect documents and the interpreter that applies them.
//!
//! An effect is either a call to one of a fixed set of primitives
//! (`setProperty`, `startTimer`, ...), an indirection into the reusable
//! `actions` table, or a loop over the players. Unknown primitives and bad
//! arguments never abort a list; they are logged and skipped.

pub mod effect;
pub mod errors;
pub mod interpreter;
pub mod primitives;

pub use effect::{Effect, EffectList, ForEachPlayer};
pub use errors::EffectError;
pub use interpreter::EffectRunner;
pub use primitives::{Apply, EffectTarget, Primitive};
