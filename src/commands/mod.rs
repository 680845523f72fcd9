#![allow(clippy::needless_pass_by_value)]

pub mod generate;
pub mod history;
pub mod init;
pub mod prompts;
