//! Build script for xflow-bpf
//!
//! Compiles the XDP classifier and generates its libbpf skeleton when the
//! `bpf` feature is enabled. Without the feature, compilation is skipped
//! (unit tests run against the mock tables).

const SRC: &str = "src/bpf/flow.bpf.c";

fn main() {
    println!("cargo:rerun-if-changed={}", SRC);
    println!("cargo:rerun-if-changed=build.rs");

    #[cfg(feature = "bpf")]
    build_skeleton();
}

#[cfg(feature = "bpf")]
fn build_skeleton() {
    use std::path::PathBuf;

    let out_dir = PathBuf::from(std::env::var_os("OUT_DIR").expect("OUT_DIR set by cargo"));
    let skel = out_dir.join("flow.skel.rs");

    libbpf_cargo::SkeletonBuilder::new()
        .source(SRC)
        .build_and_generate(&skel)
        .expect("failed to build XDP flow classifier");
}
