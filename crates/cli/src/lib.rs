//! `ytdebug`: attach to a YouTrack workflow script debugger from the terminal.

pub mod cli;
pub mod commands;
pub mod console;
pub mod error;
pub mod logging;
pub mod styles;
