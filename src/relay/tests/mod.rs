//! Unit tests for the relay subsystem.

mod broker_tests;
mod session_tests;
mod support;
