pub mod config;
pub mod error_handler;
pub mod keyring;
pub mod retry;
pub mod routes;
pub mod session;
pub mod storage;
pub mod throttle;
