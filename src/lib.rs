use std::any::Any;

use dyn_clone::DynClone;
use macros::build_options;
use serde::{Deserialize, Serialize};

/// Fixed-point type used throughout the tableau, bound manager and
/// constraint layer.
pub type E = f64;
/// Index type for variables, equations and constraint ids.
pub type I = usize;

pub mod config;
pub mod divider;
pub mod dnc;
pub mod engine;
pub mod equation;
pub mod error;
pub mod input_query;
pub mod interrupt;
pub mod lookahead;
pub mod plconstraint;
pub mod smt;
pub mod summary;
pub mod tableau;
pub mod variable;

#[cfg(test)]
mod tests;

pub trait OptionTrait: Any + Sync + Send + DynClone {}
impl OptionTrait for &'static str {}
impl OptionTrait for String {}
impl OptionTrait for bool {}
impl OptionTrait for usize {}
impl OptionTrait for u8 {}
impl OptionTrait for u16 {}
impl OptionTrait for u32 {}
impl OptionTrait for u64 {}
impl OptionTrait for i8 {}
impl OptionTrait for i16 {}
impl OptionTrait for i32 {}
impl OptionTrait for i64 {}
impl OptionTrait for f32 {}
impl OptionTrait for f64 {}

impl Clone for Box<dyn OptionTrait> {
    fn clone(&self) -> Self {
        dyn_clone::clone_box(&**self)
    }
}

/// Terminal status of a solve. `Sat` and `Unsat`
/// are the only "done" answers a caller should act on, the rest explain
/// why a query did not finish.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
pub enum ExitCode {
    #[default]
    NotDone,
    Sat,
    Unsat,
    Error,
    Timeout,
    QuitRequested,
}

/// Initializes the `log` facade with `env_logger`. Never called
/// implicitly by the library; callers (binaries, tests) opt in.
pub fn init_logging() {
    let _ = env_logger::try_init();
}

build_options!(registry_name = OPTION_REGISTRY);
