pub mod chat;
pub mod cli;
pub mod commands;
pub mod logging;
pub mod output;
