fn main() {
    if let Err(err) = tripsafe_lib::run() {
        eprintln!("tripsafe: {err:#}");
        std::process::exit(1);
    }
}
