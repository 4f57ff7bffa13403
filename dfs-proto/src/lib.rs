//! Generated bindings for the `Storage` gRPC service, §5. The storage
//! gateway holds the client, every storage node runs the server.

tonic::include_proto!("storage");
