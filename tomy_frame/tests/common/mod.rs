#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::NamedTempFile;
use tomy::config::{FrameConfig, RingBufferConfig};
use tomy_frame::{ProcessArgs, ProcessContext, SegmentRole};

/// Key files and semaphore name unique to one test.
pub struct Keys {
    segment: NamedTempFile,
    lock: NamedTempFile,
    signal: String,
}

impl Keys {
    pub fn new() -> Self {
        tomy_shared_memory::init_tracing(tomy::config::LogLevel::Debug);
        static CTR: AtomicU32 = AtomicU32::new(0);
        let id = CTR.fetch_add(1, Ordering::Relaxed);
        Self {
            segment: NamedTempFile::new().unwrap(),
            lock: NamedTempFile::new().unwrap(),
            signal: format!("/tomy_it_{}_{id}", std::process::id()),
        }
    }

    pub fn config(&self) -> FrameConfig {
        let mut config = FrameConfig::new("gateway");
        config.ring_buffer = RingBufferConfig {
            segment_key: self.segment.path().to_path_buf(),
            lock_key: self.lock.path().to_path_buf(),
            signal_name: self.signal.clone(),
        };
        config.params.insert("BrokerName".into(), "localhost".into());
        config
    }

    pub fn context(&self, role: SegmentRole) -> ProcessContext {
        let args = ProcessArgs::new(["gateway", "-c", "/etc/param.conf"], self.config());
        ProcessContext::new(args, role).unwrap()
    }
}
