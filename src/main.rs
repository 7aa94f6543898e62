fn main() {
    if let Err(e) = notedeck::app::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
