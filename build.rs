fn main() {
    for var in ["CTLINK_ACCESS_TOKEN", "CTLINK_WIFI_SSID", "CTLINK_WIFI_PASS"] {
        println!("cargo:rerun-if-env-changed={var}");
    }

    // ESP-IDF link arguments are only needed for the device build; host
    // builds (unit, integration and property tests) skip embuild entirely.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
