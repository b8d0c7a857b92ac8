//! Stages the certificate bundle that gets compiled into the crate.
//!
//! The bundle is produced offline. Set `CRT_BUNDLE_PATH` at build time to embed a different one.

use std::{env, fs, path::PathBuf};

use anyhow::{Context, Result};

fn main() -> Result<()> {
    println!("cargo:rerun-if-env-changed=CRT_BUNDLE_PATH");

    let source = match env::var_os("CRT_BUNDLE_PATH") {
        Some(path) => PathBuf::from(path),
        None => PathBuf::from(env::var("CARGO_MANIFEST_DIR")?)
            .join("certs")
            .join("x509_crt_bundle"),
    };
    println!("cargo:rerun-if-changed={}", source.display());

    let target = PathBuf::from(env::var("OUT_DIR")?).join("x509_crt_bundle");
    fs::copy(&source, &target).with_context(|| {
        format!(
            "failed to stage certificate bundle {} into {}",
            source.display(),
            target.display()
        )
    })?;
    Ok(())
}
