//! Protocol registry - which handler serves which protocol
//!
//! The registry is the single source of truth for installed hooks. A protocol
//! name is recorded only after the native side has accepted the splice, so the
//! host table and the native table never disagree about an install.
//!
//! One registry is built by the composition root and handed to `ffi::attach`
//! so the native trampolines can reach it.

use std::collections::HashMap;
use std::os::raw::c_int;
use std::sync::Arc;

use parking_lot::RwLock;
use protocol_runtime::{CallbackTable, ProtocolRuntime};
use tracing::{debug, info, warn};

use crate::config::HookConfig;
use crate::hook::ProtocolHook;
use crate::idgen::{IdGen, StreamHandle};

/// Result of `ProtocolRegistry::install`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Native side hooked and handler recorded
    Installed,
    /// A handler is installed already; nothing changed
    AlreadyInstalled,
    /// `max_hooks` handlers are installed already; nothing changed
    CapacityExhausted,
    /// The native side refused (unknown protocol); nothing recorded
    Rejected { native_status: c_int },
}

/// Result of `ProtocolRegistry::uninstall`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UninstallOutcome {
    /// Handler removed; `native_status` is what the native unhook returned
    Uninstalled { native_status: c_int },
    /// No handler was installed
    NotInstalled,
}

pub struct ProtocolRegistry {
    /// Native protocol table
    runtime: Arc<dyn ProtocolRuntime>,
    /// Entry points spliced into every hooked protocol
    callbacks: CallbackTable,
    /// Protocol name → installed handler
    hooks: RwLock<HashMap<String, Arc<dyn ProtocolHook>>>,
    /// Source of stream handles
    id_gen: IdGen,
    config: HookConfig,
}

impl ProtocolRegistry {
    /// Registry splicing the crate's own trampolines (`ffi::CALLBACKS`).
    pub fn new(runtime: Arc<dyn ProtocolRuntime>, config: HookConfig) -> Self {
        Self::with_callbacks(runtime, crate::ffi::CALLBACKS, config)
    }

    /// Registry splicing a custom callback table.
    pub fn with_callbacks(
        runtime: Arc<dyn ProtocolRuntime>,
        callbacks: CallbackTable,
        config: HookConfig,
    ) -> Self {
        Self {
            runtime,
            callbacks,
            hooks: RwLock::new(HashMap::new()),
            id_gen: IdGen::new(),
            config,
        }
    }

    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    /// Install `hook` as the handler of protocol `name`.
    ///
    /// Never overwrites: a second install for the same name is a logged no-op.
    pub fn install(&self, name: &str, hook: Arc<dyn ProtocolHook>) -> InstallOutcome {
        // Hold the write lock across the native call so check, splice and
        // insert are one step for concurrent installers.
        let mut hooks = self.hooks.write();

        if hooks.contains_key(name) {
            warn!(protocol = %name, "hook already registered for protocol");
            return InstallOutcome::AlreadyInstalled;
        }
        if hooks.len() >= self.config.max_hooks {
            warn!(protocol = %name, max = self.config.max_hooks, "could not add new hook, registry full");
            return InstallOutcome::CapacityExhausted;
        }

        let native_status = self.runtime.register_protocol(name, &self.callbacks);
        if native_status != 0 {
            warn!(protocol = %name, status = native_status, "native side refused hook, not installing");
            return InstallOutcome::Rejected { native_status };
        }

        hooks.insert(name.to_string(), hook);
        info!(protocol = %name, "installed hook for protocol");
        InstallOutcome::Installed
    }

    /// Remove the handler of protocol `name` and restore the native callbacks.
    ///
    /// The host record is dropped even if the native unhook fails.
    pub fn uninstall(&self, name: &str) -> UninstallOutcome {
        let mut hooks = self.hooks.write();

        if !hooks.contains_key(name) {
            warn!(protocol = %name, "no hook registered for protocol");
            return UninstallOutcome::NotInstalled;
        }

        let native_status = self.runtime.unregister_protocol(name);
        if native_status != 0 {
            warn!(protocol = %name, status = native_status, "native unhook failed, dropping host record anyway");
        }
        hooks.remove(name);
        info!(protocol = %name, "uninstalled hook for protocol");
        UninstallOutcome::Uninstalled { native_status }
    }

    /// Uninstall every hook. Returns how many were removed.
    pub fn uninstall_all(&self) -> usize {
        let names = self.installed();
        for name in &names {
            let _ = self.uninstall(name);
        }
        debug!(count = names.len(), "all hooks uninstalled");
        names.len()
    }

    /// Handler of protocol `name`, if one is installed.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn ProtocolHook>> {
        self.hooks.read().get(name).cloned()
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.hooks.read().contains_key(name)
    }

    /// Names of installed protocols, sorted
    pub fn installed(&self) -> Vec<String> {
        let mut names: Vec<String> = self.hooks.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn mint_handle(&self) -> StreamHandle {
        self.id_gen.next_handle()
    }
}
