// Build provenance shown by `comlink version --extended`.
fn main() {
    for (source, exported) in [
        ("TARGET", "COMLINK_BUILD_TARGET"),
        ("PROFILE", "COMLINK_BUILD_PROFILE"),
    ] {
        println!("cargo:rerun-if-env-changed={source}");
        if let Ok(value) = std::env::var(source) {
            println!("cargo:rustc-env={exported}={value}");
        }
    }
}
