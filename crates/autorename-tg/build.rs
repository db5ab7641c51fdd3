fn main() {
    // trigger recompilation when a new migration is added
    println!("cargo:rerun-if-changed=migrations");

    vergen::EmitBuilder::builder()
        .build_timestamp()
        .git_sha(true)
        .rustc_semver()
        .cargo_target_triple()
        .emit()
        .unwrap();
}
