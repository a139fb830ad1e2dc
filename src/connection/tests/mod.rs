//! Unit tests for the connection subsystem.

mod support;
