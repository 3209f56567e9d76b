//! Test suites for the jobrelay daemon.

mod support;
