//! Integration test crate; see `tests/tests/*.rs` for the actual scenarios.
