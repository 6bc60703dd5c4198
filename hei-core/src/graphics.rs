//! Graphics backends registered by modules

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;

use hei_plugin_api::{DestroyDeviceFn, GraphicsDriver};
use serde::Serialize;

use crate::error::DispatchError;

/// A registered graphics backend, copied out of the capability table.
///
/// Devices it creates call back into the owning module, so they must be
/// dropped before that module is unloaded.
#[derive(Clone)]
pub struct GraphicsBackend {
    name: String,
    module: String,
    driver: GraphicsDriver,
}

/// Listing row for a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendInfo {
    pub name: String,
    pub priority: i32,
    pub module: String,
    pub can_create_devices: bool,
}

impl GraphicsBackend {
    pub(crate) fn new(name: String, module: String, driver: GraphicsDriver) -> Self {
        Self {
            name,
            module,
            driver,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the module that registered the backend.
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn priority(&self) -> i32 {
        self.driver.priority
    }

    pub fn can_create_devices(&self) -> bool {
        self.driver.create_device.is_some()
    }

    pub fn info(&self) -> BackendInfo {
        BackendInfo {
            name: self.name.clone(),
            priority: self.priority(),
            module: self.module.clone(),
            can_create_devices: self.can_create_devices(),
        }
    }

    pub fn create_device(&self, width: u32, height: u32) -> Result<GraphicsDevice, DispatchError> {
        let failed = || DispatchError::DeviceCreation {
            backend: self.name.clone(),
        };
        let create = self.driver.create_device.ok_or_else(failed)?;

        // SAFETY: the factory was registered by a module that is still loaded.
        let raw = unsafe { create(width, height) };
        let raw = NonNull::new(raw).ok_or_else(failed)?;

        tracing::debug!(backend = %self.name, width, height, "Graphics device created");
        Ok(GraphicsDevice {
            raw,
            destroy: self.driver.destroy_device,
            backend: self.name.clone(),
        })
    }
}

impl fmt::Debug for GraphicsBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsBackend")
            .field("name", &self.name)
            .field("module", &self.module)
            .field("priority", &self.driver.priority)
            .finish()
    }
}

/// Opaque device returned by a backend. Destroyed on drop.
pub struct GraphicsDevice {
    raw: NonNull<c_void>,
    destroy: Option<DestroyDeviceFn>,
    backend: String,
}

impl GraphicsDevice {
    pub fn as_ptr(&self) -> *mut c_void {
        self.raw.as_ptr()
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }
}

impl Drop for GraphicsDevice {
    fn drop(&mut self) {
        if let Some(destroy) = self.destroy {
            // SAFETY: `raw` came from the same backend's `create_device`.
            unsafe { destroy(self.raw.as_ptr()) };
        }
    }
}

impl fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("backend", &self.backend)
            .field("raw", &self.raw)
            .finish()
    }
}
