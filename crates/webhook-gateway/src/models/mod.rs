pub mod billing;
pub mod common;
pub mod webhook;
