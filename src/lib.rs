//! A small static file and upload server
//!
//! Routes are registered on an explicit [`handler::Router`]: an index page,
//! single files, whole directories (never listed, never escaped) and
//! multipart upload endpoints that store files under random names.

pub mod config;
pub mod handler;
pub mod http;
pub mod ident;
pub mod logger;
pub mod server;

pub use handler::Router;
pub use ident::IdGenerator;
