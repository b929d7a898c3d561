fn main() {
    // ESP-IDF link/sysroot environment is only relevant when building the
    // device binary; host-target test builds skip it.
    if std::env::var("CARGO_FEATURE_ESPIDF").is_ok() {
        embuild::espidf::sysenv::output();
    }
}
