#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::{const_mutex, Mutex, MutexGuard};
use protocol_runtime::ProtocolRuntime;
use protocol_runtime_mocked::{NativeStream, NativeTable};
use protohook::{attach, AttachGuard, HookConfig, ProtocolRegistry};
use tracing_subscriber::EnvFilter;

// Only one registry can be attached at a time
static ATTACH_LOCK: Mutex<()> = const_mutex(());

/// A native table with a registry attached to it.
///
/// Holds the attach lock for its lifetime, so tests using it run one at a time.
pub struct Harness {
    pub table: Arc<NativeTable>,
    pub registry: Arc<ProtocolRegistry>,
    // Detach before releasing the lock
    _attached: AttachGuard,
    _serial: MutexGuard<'static, ()>,
}

impl Harness {
    pub fn new(builtin: &[&str]) -> Self {
        Self::with_config(builtin, HookConfig::default())
    }

    pub fn with_config(builtin: &[&str], config: HookConfig) -> Self {
        let serial = ATTACH_LOCK.lock();
        init_logging();

        let table = Arc::new(NativeTable::with_builtin(builtin));
        let runtime: Arc<dyn ProtocolRuntime> = table.clone();
        let registry = Arc::new(ProtocolRegistry::new(runtime, config));
        let attached = attach(Arc::clone(&registry));
        Self {
            table,
            registry,
            _attached: attached,
            _serial: serial,
        }
    }

    /// Connect a stream the way the framework would.
    pub fn connect(&self, protocol: &str, url: &str) -> NativeStream {
        self.table
            .connect(protocol, url)
            .unwrap_or_else(|| panic!("protocol {protocol} not in native table"))
    }
}

/// Log to the test output; filter with RUST_LOG.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
