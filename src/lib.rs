pub mod config;
pub mod cost;
pub mod debounce;
pub mod dispatch;
pub mod error;
pub mod orchestrator;
pub mod parsers;
pub mod prompt;
pub mod response;
pub mod server;
pub mod session;
pub mod toolcall;
pub mod tools;
