// crates/core/src/lib.rs
pub mod ast;
pub mod error;
pub mod knowledge;
pub mod normalize;
pub mod pattern;
pub mod template;

pub use ast::*;
pub use error::*;
pub use knowledge::*;
pub use pattern::*;
pub use template::parse_template;
