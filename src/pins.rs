//! GPIO / peripheral pin assignments for the CTLink board (ESP32-WROOM-32).
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Current transformer (ADC1)
// ---------------------------------------------------------------------------

/// SCT-013 burden resistor, biased to mid-rail.  ADC1 channel 4.
pub const CT_ADC_GPIO: i32 = 32;

// ---------------------------------------------------------------------------
// Relay module
// ---------------------------------------------------------------------------

/// Relay input.  LOW energises the coil.
pub const RELAY_GPIO: i32 = 5;
pub const RELAY_ACTIVE_LOW: bool = true;
