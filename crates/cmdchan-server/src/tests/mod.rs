//! Behavioural suites for the command channel server.

mod process_behaviour;
mod support;
