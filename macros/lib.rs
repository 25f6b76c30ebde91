//! Re-exports the crate's proc-macro families so callers write
//! `macros::build_options!`, `macros::explicit_options`, etc.,
//! without depending on `options`/`testing` directly.

pub use options::*;
pub use testing::*;
