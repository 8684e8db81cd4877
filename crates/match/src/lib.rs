// crates/match/src/lib.rs
pub mod cache;
pub mod compile;
pub mod matcher;

pub use cache::*;
pub use compile::*;
pub use matcher::*;
