//! Common utilities shared across the loader's threads.

pub mod thread;
