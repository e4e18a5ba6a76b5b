pub mod auth;
pub mod command;
pub mod context;
pub mod error;
pub mod policy;
pub mod security;
pub mod storage;
