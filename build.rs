fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    let built = chrono::Utc::now().format("%Y-%m-%d %H:%M UTC");
    println!("cargo:rustc-env=BUILD_DATE={}", built);
}
