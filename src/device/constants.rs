/**
 * How long (seconds) a scan session runs before discovery is stopped.
 */
pub const SCAN_DURATION_SECS: u64 = 10;

/**
 * Displayed in place of the name of a device that did not advertise one.
 */
pub const NO_NAME: &str = "(No Name)";

/**
 * Buffer size of the channels that carry scan reports and notifications out of the backend.
 */
pub const EVENT_CHANNEL_SIZE: usize = 64;
