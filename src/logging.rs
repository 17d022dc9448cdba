//! ESP logger installation
//!
//! Every diagnostic in this crate goes through the `log` facade. On ESP
//! targets this installs `esp-println` as the backend; elsewhere the
//! application installs its own logger.

pub use log::LevelFilter;

/// Install the ESP serial logger, filtered by `ESP_LOG` at build time
pub fn init() {
    esp_println::logger::init_logger_from_env();
}

/// Install the ESP serial logger and cap it at `level`
pub fn init_with_level(level: LevelFilter) {
    init();
    log::set_max_level(level);
    log::info!("logger ready at level {}", level);
}
