fn main() {
    if let Err(err) = kasa_power_reporter::app::run_device_listing() {
        eprintln!("device listing failed: {err}");
        std::process::exit(1);
    }
}
