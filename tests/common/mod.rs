#![allow(dead_code)]

pub use pipevisor_test_utils::builders;
pub use pipevisor_test_utils::children;
pub use pipevisor_test_utils::{assert_silent, init_tracing, recv_line, with_timeout};
