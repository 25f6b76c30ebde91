//! Engine configuration.
//!
//! `Options` (generated by [`macros::build_options!`] in `lib.rs`) is
//! built once by a caller and threaded down by reference at
//! construction time rather than read from a global. `EngineOptions` is
//! the name used across this crate's docs and call sites; components
//! that need a tunable declare it with their own `#[use_option(...)]`
//! struct attribute the way [`crate::engine::Engine`] and
//! [`crate::lookahead::LookAheadPreprocessor`] do, then read it back
//! with `options.get_option::<T>("name")`.

use macros::use_option;

pub use crate::Options as EngineOptions;

/// Registers the CLI-surface knobs observed by the core —
/// `numWorkers` through `maxDepth` — into the global option
/// registry alongside the internal tunables [`crate::engine::Engine`]
/// and [`crate::lookahead::LookAheadPreprocessor`] declare the same way.
/// A driver binary reads these back via `EngineOptions::get_option` and
/// passes them through to `DnCManager::new`/`LookAheadPreprocessor::new`
/// explicitly, the same indirection `split_threshold` already takes
/// through `Engine`; this marker is never constructed, it exists only
/// to carry the `#[use_option]` registrations. `divide_strategy` and
/// `bias_strategy` are not registered here because [`DivideStrategy`]
/// and [`BiasStrategy`] have no `FromStr` impl for the registry's
/// string-keyed default parsing to use — a driver selects them as plain
/// enum constructor arguments instead.
#[use_option(name = "num_workers", type_ = u64, default = "1", description = "Worker threads DnCManager spawns")]
#[use_option(
    name = "initial_divides",
    type_ = u32,
    default = "0",
    description = "log2 of the initial subquery count DnCManager seeds its queue with"
)]
#[use_option(
    name = "initial_timeout",
    type_ = f64,
    default = "-1.0",
    description = "Initial subquery timeout in seconds; negative defaults to constraintCount/10"
)]
#[use_option(
    name = "online_divides",
    type_ = u32,
    default = "2",
    description = "log2 of the child count a timed-out subquery is re-split into"
)]
#[use_option(
    name = "timeout_in_seconds",
    type_ = u64,
    default = "0",
    description = "Overall DnC search timeout; 0 means unbounded"
)]
#[use_option(
    name = "timeout_factor",
    type_ = f64,
    default = "1.5",
    description = "Multiplier applied to a subquery's timeout on re-split"
)]
#[use_option(name = "verbosity", type_ = u8, default = "0", description = "Logging verbosity, 0-2")]
#[use_option(name = "dnc", type_ = bool, default = "false", description = "Run the divide-and-conquer manager instead of a single Engine")]
#[use_option(
    name = "restore_tree_states",
    type_ = bool,
    default = "false",
    description = "Restore-before-every-pop discipline for DnC workers"
)]
#[use_option(
    name = "look_ahead_preprocessing",
    type_ = bool,
    default = "false",
    description = "Run LookAheadPreprocessor before the main search"
)]
#[use_option(
    name = "preprocess_only",
    type_ = bool,
    default = "false",
    description = "Stop after look-ahead preprocessing and emit a .fixed file instead of searching"
)]
#[use_option(name = "max_depth", type_ = u64, default = "0", description = "Maximum case-split stack depth; 0 means unbounded")]
#[allow(dead_code)]
struct CliOptions;

/// Strategy `QueryDivider` uses to pick the splitting variable for a subquery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DivideStrategy {
    #[default]
    LargestInterval,
    ReluViolation,
}

/// Strategy the branching heuristic uses to choose which branch of a
/// case split to try first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BiasStrategy {
    #[default]
    Fixed,
    ReluViolation,
    LeastFeasible,
}

impl crate::OptionTrait for DivideStrategy {}
impl crate::OptionTrait for BiasStrategy {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_divide_strategy_is_largest_interval() {
        assert_eq!(DivideStrategy::default(), DivideStrategy::LargestInterval);
    }

    #[test]
    fn default_bias_strategy_is_fixed() {
        assert_eq!(BiasStrategy::default(), BiasStrategy::Fixed);
    }

    #[test]
    fn cli_surface_knobs_are_registered_with_their_documented_defaults() {
        let options = EngineOptions::new();
        assert_eq!(options.get_option::<u64>("num_workers"), Some(1));
        assert_eq!(options.get_option::<u32>("initial_divides"), Some(0));
        assert_eq!(options.get_option::<f64>("initial_timeout"), Some(-1.0));
        assert_eq!(options.get_option::<u32>("online_divides"), Some(2));
        assert_eq!(options.get_option::<u64>("timeout_in_seconds"), Some(0));
        assert_eq!(options.get_option::<f64>("timeout_factor"), Some(1.5));
        assert_eq!(options.get_option::<u8>("verbosity"), Some(0));
        assert_eq!(options.get_option::<bool>("dnc"), Some(false));
        assert_eq!(options.get_option::<bool>("restore_tree_states"), Some(false));
        assert_eq!(options.get_option::<bool>("look_ahead_preprocessing"), Some(false));
        assert_eq!(options.get_option::<bool>("preprocess_only"), Some(false));
        assert_eq!(options.get_option::<u64>("max_depth"), Some(0));
    }
}
