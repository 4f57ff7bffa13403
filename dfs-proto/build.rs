fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::configure()
        .extern_path(".google.protobuf.Empty", "()")
        .compile_protos(&["proto/storage.proto"], &["proto"])?;
    Ok(())
}
