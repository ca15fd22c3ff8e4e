pub mod command;
pub mod component;
pub mod config;
pub mod embed_session;
pub mod ids;
pub mod message;
pub mod session;
