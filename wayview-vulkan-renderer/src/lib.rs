//! # wayview-vulkan-renderer
//!
//! Brings up the Vulkan side of wayview: instance (with optional
//! validation), physical-adapter selection, and a logical device with a
//! single graphics queue. No swapchain or command recording happens here;
//! [`GpuContext`] only establishes the execution context the windowing
//! side will later render through.

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr;
use ash::vk;
use thiserror::Error;
use tracing::info;

use wayview_core::RendererConfig;

mod selection;
pub use selection::{first_suitable_adapter, QueueFamilySelection};

const VALIDATION_LAYER: &CStr =
    unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };

/// Errors raised while establishing the GPU context. All of them are
/// fatal: the caller reports and terminates, no retry or partial context
/// is attempted.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("failed to load the Vulkan library")]
    Loading(#[from] ash::LoadingError),

    #[error("validation layer {0:?} requested but not available")]
    MissingValidationLayer(&'static CStr),

    #[error("no Vulkan physical devices present")]
    NoAdapters,

    #[error("no adapter exposes a graphics-capable queue family")]
    NoSuitableAdapter,

    #[error("vulkan call failed")]
    Vulkan(#[from] vk::Result),

    #[error("configured name contains an interior NUL byte")]
    InvalidName(#[from] std::ffi::NulError),
}

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    let callback_data = *p_callback_data;
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::from("")
    } else {
        CStr::from_ptr(callback_data.p_message).to_string_lossy()
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            tracing::error!(target: "vulkan", "type: {:?}, message: {}", message_type, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            tracing::warn!(target: "vulkan", "type: {:?}, message: {}", message_type, message);
        }
        _ => {
            tracing::debug!(target: "vulkan", "type: {:?}, message: {}", message_type, message);
        }
    }
    vk::FALSE
}

/// Owns the Vulkan execution context: instance, selected adapter, logical
/// device, and the graphics queue.
///
/// The adapter handle is a weak reference into the instance's enumeration
/// and is not destroyed separately. The device and queue exist exactly
/// because a graphics queue-family index was resolved during construction.
/// Teardown runs in reverse creation order via `Drop`.
pub struct GpuContext {
    #[allow(dead_code)]
    entry: ash::Entry,
    instance: ash::Instance,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
    physical_device: vk::PhysicalDevice,
    adapter_name: String,
    queue_family: QueueFamilySelection,
    device: ash::Device,
    graphics_queue: vk::Queue,
}

impl GpuContext {
    /// Builds the full context. Every step is fatal on failure.
    pub fn new(config: &RendererConfig) -> Result<Self, RendererError> {
        let entry = unsafe { ash::Entry::load()? };

        if config.validation && !validation_layer_available(&entry)? {
            return Err(RendererError::MissingValidationLayer(VALIDATION_LAYER));
        }

        let app_name = CString::new(config.application_name.as_str())?;
        let engine_name = CString::new(config.engine_name.as_str())?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let instance_extensions = [
            DebugUtils::name().as_ptr(),
            khr::Surface::name().as_ptr(),
            khr::WaylandSurface::name().as_ptr(),
        ];
        let mut enabled_layer_names: Vec<*const c_char> = Vec::new();
        if config.validation {
            enabled_layer_names.push(VALIDATION_LAYER.as_ptr());
        }

        let mut debug_messenger_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vulkan_debug_callback));

        let mut instance_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&instance_extensions)
            .enabled_layer_names(&enabled_layer_names);
        if config.validation {
            instance_info = instance_info.push_next(&mut debug_messenger_info);
        }

        let instance = unsafe { entry.create_instance(&instance_info, None)? };
        info!("vulkan instance created");

        let debug_utils = if config.validation {
            let loader = DebugUtils::new(&entry, &instance);
            let messenger =
                unsafe { loader.create_debug_utils_messenger(&debug_messenger_info, None)? };
            Some((loader, messenger))
        } else {
            None
        };

        let (physical_device, adapter_name, queue_family) = select_physical_device(&instance)?;

        let (device, graphics_queue) =
            create_logical_device(&instance, physical_device, &queue_family, &enabled_layer_names)?;

        Ok(Self {
            entry,
            instance,
            debug_utils,
            physical_device,
            adapter_name,
            queue_family,
            device,
            graphics_queue,
        })
    }

    /// Name of the selected physical adapter, as reported by the driver.
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// The resolved graphics queue-family index. Always `Some` once
    /// construction has succeeded; the device cannot exist without it.
    pub fn queue_family_index(&self) -> Option<u32> {
        self.queue_family.graphics()
    }

    /// Raw handle of the selected adapter.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// The graphics queue created alongside the logical device.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        // Reverse creation order; the device must go before the instance.
        unsafe {
            self.device.destroy_device(None);
            if let Some((loader, messenger)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("vulkan context destroyed");
    }
}

fn validation_layer_available(entry: &ash::Entry) -> Result<bool, RendererError> {
    let available = entry.enumerate_instance_layer_properties()?;
    let found = available.iter().any(|layer| {
        let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        name == VALIDATION_LAYER
    });
    Ok(found)
}

fn select_physical_device(
    instance: &ash::Instance,
) -> Result<(vk::PhysicalDevice, String, QueueFamilySelection), RendererError> {
    let adapters = unsafe { instance.enumerate_physical_devices()? };
    if adapters.is_empty() {
        return Err(RendererError::NoAdapters);
    }
    info!("found {} physical devices", adapters.len());

    let candidates = adapters.into_iter().map(|adapter| {
        let families = unsafe { instance.get_physical_device_queue_family_properties(adapter) };
        (adapter, families)
    });

    let (adapter, queue_family) =
        first_suitable_adapter(candidates).ok_or(RendererError::NoSuitableAdapter)?;

    let properties = unsafe { instance.get_physical_device_properties(adapter) };
    let adapter_name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned();
    info!(
        adapter = %adapter_name,
        queue_family = ?queue_family.graphics(),
        "selected physical device"
    );

    Ok((adapter, adapter_name, queue_family))
}

fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_family: &QueueFamilySelection,
    enabled_layer_names: &[*const c_char],
) -> Result<(ash::Device, vk::Queue), RendererError> {
    let family_index = queue_family
        .graphics()
        .ok_or(RendererError::NoSuitableAdapter)?;

    let queue_priorities = [1.0f32];
    let queue_info = vk::DeviceQueueCreateInfo::builder()
        .queue_family_index(family_index)
        .queue_priorities(&queue_priorities)
        .build();
    let queue_infos = [queue_info];

    let features = vk::PhysicalDeviceFeatures::builder();
    // No device-level extensions are enabled at this stage.
    let device_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_infos)
        .enabled_features(&features)
        .enabled_layer_names(enabled_layer_names);

    let device = unsafe { instance.create_device(physical_device, &device_info, None)? };
    let graphics_queue = unsafe { device.get_device_queue(family_index, 0) };
    info!(queue_family = family_index, "logical device and graphics queue created");

    Ok((device, graphics_queue))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_creation_and_teardown() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        // Exercises the whole construct/drop path on machines with a
        // Vulkan driver; elsewhere the loader error path is what runs.
        match GpuContext::new(&RendererConfig {
            validation: false,
            ..RendererConfig::default()
        }) {
            Ok(ctx) => {
                assert!(!ctx.adapter_name().is_empty());
                assert!(ctx.queue_family_index().is_some());
            }
            Err(err) => {
                tracing::warn!("no usable Vulkan context in this environment: {err}");
            }
        }
    }
}
