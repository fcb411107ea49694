fn main() {
    if let Err(err) = kasa_power_reporter::app::run() {
        eprintln!("power report failed: {err}");
        std::process::exit(1);
    }
}
