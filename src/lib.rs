//! flowkey: turn a chat conversation into a validated workflow diagram.

pub mod config;
pub mod conversation;
pub mod diagram;
pub mod logging;
pub mod message;
pub mod provider;
pub mod storage;
pub mod util;
