fn main() {
    if let Err(err) = erdiag::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
