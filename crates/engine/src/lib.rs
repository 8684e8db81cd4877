// crates/engine/src/lib.rs
pub mod collections;
pub mod dispatch;
pub mod error;
pub mod eval;
pub mod learn;
pub mod session;
pub mod sraix;

pub use collections::*;
pub use dispatch::*;
pub use error::*;
pub use eval::{Evaluator, MAX_RECURSION_DEPTH};
pub use learn::{LearnedCategory, LearnedSink};
pub use session::*;
pub use sraix::*;
