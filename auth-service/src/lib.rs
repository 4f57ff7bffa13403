//! Auth core: registration, email verification, login/session, and the
//! JWT-resolution RPCs the rest of the fleet depends on, §4.E.

pub mod config;
pub mod http;
pub mod jwt;
pub mod mail;
pub mod repository;
pub mod rpc;
