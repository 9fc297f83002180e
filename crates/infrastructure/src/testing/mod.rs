//! Testing utilities for infrastructure tests.
//!
//! Container wrappers for tests that need a real Redis server. Tests using
//! them are `#[ignore]`d by default since they require Docker.

mod containers;

pub use containers::{ContainerError, RedisContainer, RedisContainerConfig};
