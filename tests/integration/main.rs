//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below exercises one aspect of the threaded [`Dispatcher`]
//! against the recording mock executor.  Everything runs on the host.
//!
//! [`Dispatcher`]: bledispatch::Dispatcher

mod admission_tests;
mod dispatcher_tests;
mod mock_link;
