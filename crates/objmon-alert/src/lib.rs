//! Custom alert rule engine for objectives.
//!
//! Operators build rules out of [`AlertCondition`]s; the engine decides which
//! objectives a rule applies to ([`matcher::matches`]), dry-runs a rule to
//! estimate how noisy it is ([`tester::run_test`]), gates activation on that
//! test ([`lifecycle::RuleManager`]) and sweeps active rules into alerts with
//! a per-(rule, objective) suppression window ([`engine::ExecutionEngine`]).
//!
//! The tester and the execution sweep share the same matcher, so a test
//! result predicts exactly what the sweep will match.
//!
//! [`AlertCondition`]: objmon_common::types::AlertCondition

pub mod condition;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod matcher;
pub mod template;
pub mod tester;

#[cfg(test)]
mod tests;

pub use error::{Result, RuleError};
