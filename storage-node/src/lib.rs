//! Storage node: filesystem layout, at-rest encryption, file metadata, and
//! the AMQP/gRPC/HTTP surfaces that expose them, §4.B/4.C.

pub mod config;
pub mod fs_store;
pub mod grpc;
pub mod http;
pub mod repository;
pub mod rpc;
