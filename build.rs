fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Proto compilation only runs for the gRPC binding; the default
    // feature set has no protoc requirement.
    if std::env::var_os("CARGO_FEATURE_GRPC").is_some() {
        println!("cargo:rerun-if-changed=proto/a2a.proto");
        tonic_build::configure()
            .build_client(false)
            .compile_protos(&["proto/a2a.proto"], &["proto"])?;
    }
    Ok(())
}
