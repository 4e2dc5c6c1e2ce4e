//! Cross-contract workflow tests live in `tests/test_workflows.rs`.
