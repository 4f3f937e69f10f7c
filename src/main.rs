fn main() {
    if let Err(err) = speciate::run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
