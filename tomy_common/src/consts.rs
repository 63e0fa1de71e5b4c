//! System-wide constants for the tomy workspace.
//!
//! Single source of truth for buffer sizes, limits and default resource
//! locations. Imported by all crates.

/// Payload capacity of the shared log ring buffer in bytes.
///
/// Compile-time constant: every process attaching to the segment must agree
/// on it, so it is part of the segment layout.
pub const RINGBUFFER_SIZE: usize = 16384;

/// Maximum length of one formatted log record in bytes (delimiter excluded).
pub const PROCESS_LOG_BUFFER_SIZE: usize = 2048;

/// Maximum number of entries in the `[params]` configuration table.
pub const PARAM_MAX: usize = 128;

/// Default configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "/usr/local/etc/tomygateway/config/param.conf";

/// Default key file for the ring buffer segment.
pub const DEFAULT_RINGBUFFER_KEY: &str = "/usr/local/etc/tomygateway/config/ringbuffer.key";

/// Default key file for the lock guarding the ring buffer.
pub const DEFAULT_RB_MUTEX_KEY: &str = "/usr/local/etc/tomygateway/config/rbmutex.key";

/// Default name of the semaphore posted for every new log record.
pub const DEFAULT_RB_SEMAPHORE_NAME: &str = "/rbsemaphor";

/// Slice length (ms) used by blocking loops that also poll for OS signals.
pub const SIGNAL_POLL_MS: u32 = 1000;

/// Prefix of every segment file created under `/dev/shm`.
pub const SHM_PREFIX: &str = "tomy_";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_offsets_fit_in_u16() {
        // Header fields are u16; offsets live in [0, RINGBUFFER_SIZE).
        assert!(RINGBUFFER_SIZE <= u16::MAX as usize + 1);
    }

    #[test]
    fn record_fits_in_ring() {
        assert!(PROCESS_LOG_BUFFER_SIZE + 1 < RINGBUFFER_SIZE);
    }

    #[test]
    fn semaphore_name_is_posix() {
        assert!(DEFAULT_RB_SEMAPHORE_NAME.starts_with('/'));
        assert!(!DEFAULT_RB_SEMAPHORE_NAME[1..].contains('/'));
    }
}
