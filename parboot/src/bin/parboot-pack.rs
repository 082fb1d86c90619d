//! parboot-pack binary: builds self-extracting executables.

fn main() {
    if let Err(e) = parboot::run_pack_cli() {
        eprintln!("{e:?}");
        std::process::exit(1);
    }
}
