//! Coordinator integration tests, split by concern.

mod batch;
