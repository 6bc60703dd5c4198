//! A graphics backend that renders nothing
//!
//! Devices only remember their size. Useful for headless runs and for
//! exercising backend selection.

use hei_plugin_api::GraphicsDriver;
use std::ffi::c_void;

pub static DRIVER: GraphicsDriver = GraphicsDriver {
    priority: -100,
    create_device: Some(create_device),
    destroy_device: Some(destroy_device),
};

#[derive(Debug)]
struct NullDevice {
    width: u32,
    height: u32,
}

unsafe extern "C" fn create_device(width: u32, height: u32) -> *mut c_void {
    if width == 0 || height == 0 {
        return std::ptr::null_mut();
    }
    Box::into_raw(Box::new(NullDevice { width, height })).cast()
}

unsafe extern "C" fn destroy_device(device: *mut c_void) {
    if !device.is_null() {
        // SAFETY: only pointers from `create_device` reach here, once each.
        drop(unsafe { Box::from_raw(device.cast::<NullDevice>()) });
    }
}
