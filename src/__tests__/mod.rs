//! # Test Modules
//!
//! Scenario tests that drive whole headers through the parser, the
//! namespace and the foreign call layer.

pub mod foreign_call_test;
pub mod type_compiler_test;
