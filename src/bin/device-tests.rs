//! TAP test runner binary.
//!
//! Runs every test registered with `#[tap_test]` and prints TAP output.
//!
//! # Usage
//!
//! ```bash
//! # Run on host
//! cargo run --bin device-tests --features tap-tests
//!
//! # Flash to hardware
//! cargo espflash flash --bin device-tests --features esp32,tap-tests --release --monitor
//! ```

fn main() {
    #[cfg(feature = "esp32")]
    {
        esp_idf_sys::link_patches();
        esp_idf_svc::log::EspLogger::initialize_default();
    }

    let success = reachability_rs_esp32::testing::run_all_tests();

    // Keep the board alive so the serial monitor can read the summary.
    #[cfg(feature = "esp32")]
    {
        log::info!("Tests complete ({}). Halting.", if success { "PASS" } else { "FAIL" });
        loop {
            std::thread::sleep(std::time::Duration::from_secs(1));
        }
    }

    #[cfg(not(feature = "esp32"))]
    std::process::exit(if success { 0 } else { 1 });
}
