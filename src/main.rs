fn main() {
    if let Err(err) = civicsnap_lib::run() {
        log::error!("civicsnap failed: {err:#}");
        std::process::exit(1);
    }
}
