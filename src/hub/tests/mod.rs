//! Unit tests for the broadcast hub.
