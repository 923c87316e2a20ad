//! aimlbot entry point.

fn main() {
    if let Err(e) = aimlbot::cli::run_cli() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
