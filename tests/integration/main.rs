//! Integration tests for the swing-risk engine

mod e2e_test;
mod property_test;
mod scenario_test;
mod support;
