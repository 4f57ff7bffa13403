//! Storage gateway: node registry, round-robin routing, replication
//! fan-out, and a drop-in proxy of the storage node's HTTP/AMQP surface,
//! §4.D.

pub mod config;
pub mod grpc_client;
pub mod http;
pub mod registry;
pub mod rpc;
