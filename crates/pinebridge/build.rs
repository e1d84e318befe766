fn main() {
    for (var, exported) in [
        ("TARGET", "PINEBRIDGE_BUILD_TARGET"),
        ("PROFILE", "PINEBRIDGE_BUILD_PROFILE"),
    ] {
        if let Ok(value) = std::env::var(var) {
            println!("cargo:rustc-env={exported}={value}");
        }
        println!("cargo:rerun-if-env-changed={var}");
    }
    // Provenance stamped by release tooling.
    println!("cargo:rerun-if-env-changed=GIT_HASH");
    println!("cargo:rerun-if-env-changed=RUSTC_VERSION");
    println!("cargo:rerun-if-changed=build.rs");
}
