//! End-to-end scenario suite covering behavior no single module's unit
//! tests already exercise: a `Max` constraint solved through the full
//! engine, and DnC timeout partitioning arithmetic.

mod scenarios;
