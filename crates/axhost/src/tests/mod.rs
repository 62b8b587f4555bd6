//! Test suites exercising the host end to end.

mod behaviour;
pub(crate) mod support;
