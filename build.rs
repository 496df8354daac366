fn main() {
    // The ESP-IDF environment is only needed when cross-compiling for the
    // board. Host builds (tests, the host monitor) skip it.
    let target = std::env::var("TARGET").unwrap_or_default();
    if target.contains("xtensa") || target.ends_with("-espidf") {
        embuild::espidf::sysenv::output();
    }
}
