//! Build script for proto compilation.
//!
//! This is used during development to regenerate the plugin protocol types.
//! The generated code is committed to the repository, so this only needs
//! to run when a proto file changes.
//!
//! To regenerate: `cargo build --features regenerate-proto`
//!
//! The generated files land in `src/proto/` next to the hand-kept `mod.rs`.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only regenerate if the feature is enabled
    #[cfg(feature = "regenerate-proto")]
    {
        let out_dir = std::path::PathBuf::from("src/proto");
        tonic_prost_build::configure()
            .build_server(false)
            .out_dir(&out_dir)
            .compile_protos(
                &["proto/tfplugin5.proto", "proto/tfplugin6.proto"],
                &["proto"],
            )?;
    }

    // Always rerun if the protos change
    println!("cargo:rerun-if-changed=proto/tfplugin5.proto");
    println!("cargo:rerun-if-changed=proto/tfplugin6.proto");

    Ok(())
}
