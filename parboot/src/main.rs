//! parboot launcher stub. A payload appended by `parboot-pack` turns this
//! binary into a self-extracting application.

fn main() {
    std::process::exit(parboot::run_launcher());
}
