pub mod ai;
pub mod calendar;
pub mod cli;
pub mod core;
pub mod directory;
pub mod format;
pub mod mail;
pub mod openai;
pub mod session;
pub mod store;
pub mod text;
