//! Build script for gnatfix-core
//!
//! Checks the minimum Rust version before compilation. The crate uses
//! let-else and `u64::div_ceil`, both stable since Rust 1.73.0.

fn main()
{
    let Ok(min_rust_version) = rustc_version::Version::parse("1.73.0") else {
        return;
    };

    match rustc_version::version() {
        Ok(rustc_version) if rustc_version < min_rust_version => {
            println!("cargo:warning=gnatfix-core requires Rust {min_rust_version} or newer, found {rustc_version}");
        }
        Ok(_) => {}
        // Some build environments hide the compiler version
        Err(_) => println!("cargo:warning=could not verify Rust version"),
    }
}
