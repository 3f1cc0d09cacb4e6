//! End-to-end scenario tests

mod no_op;
