//! Device implementations of the driver traits

pub mod mock;
