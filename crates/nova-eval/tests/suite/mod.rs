// Consolidated integration test suite, compiled by `tests/tests.rs`.
mod closures;
mod conversions;
mod fixtures;
mod formatting;
mod invocation;
mod members;
