//! Vulkan context management
//!
//! Instance, presentation surface, physical device selection and logical
//! device creation. The types here are owned by [`super::VulkanDevice`] and
//! destroyed in reverse creation order.

use std::collections::HashSet;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Creating a named resource failed
    #[error("Failed to create {resource}: {source:?}")]
    ResourceCreation {
        /// What was being created
        resource: &'static str,
        /// Underlying result code
        source: vk::Result,
    },

    /// A runtime command (recording, submission, waits) failed
    #[error("{operation} failed: {source:?}")]
    Command {
        /// What was being done
        operation: &'static str,
        /// Underlying result code
        source: vk::Result,
    },

    /// Building the pipeline for a shape signature failed
    #[error("Failed to build pipeline for {signature}: {reason}")]
    PipelineBuild {
        /// Display form of the shape signature
        signature: String,
        /// What went wrong
        reason: String,
    },

    /// A shader file could not be loaded
    #[error("Failed to load shader {path}: {reason}")]
    ShaderLoad {
        /// Resolved shader path
        path: String,
        /// What went wrong
        reason: String,
    },

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,
}

impl VulkanError {
    /// Adapter for `map_err` that names the resource being created
    pub fn creating(resource: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |source| Self::ResourceCreation { resource, source }
    }

    /// Adapter for `map_err` that names the runtime operation
    pub fn during(operation: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |source| Self::Command { operation, source }
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create an instance with the extensions the display needs
    pub fn new(app_name: &str, display_handle: RawDisplayHandle, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e:?}")))?;

        let app_name_cstr = CString::new(app_name)
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid application name: {e}")))?;
        let engine_name_cstr = CString::new(env!("CARGO_PKG_NAME"))
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid engine name: {e}")))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let mut extensions: Vec<*const c_char> = ash_window::enumerate_required_extensions(display_handle)
            .map_err(VulkanError::creating("instance extension list"))?
            .to_vec();
        if enable_validation {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let validation_layer = CString::new("VK_LAYER_KHRONOS_validation")
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;
        let layer_names: Vec<*const c_char> = if enable_validation {
            vec![validation_layer.as_ptr()]
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);

        let instance = unsafe {
            entry.create_instance(&create_info, None)
                .map_err(VulkanError::creating("instance"))?
        };

        let debug = if enable_validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(e) => {
                    log::warn!("Validation requested but debug messenger failed: {e}");
                    None
                }
            }
        } else {
            None
        };

        log::info!("Vulkan instance created (validation: {})", enable_validation);
        Ok(Self { entry, instance, debug })
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils.create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::creating("debug messenger"))
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Window surface with RAII cleanup
pub struct PresentationSurface {
    /// Surface extension loader
    pub loader: Surface,
    /// Surface handle
    pub surface: vk::SurfaceKHR,
}

impl PresentationSurface {
    /// Create a surface for the caller's window
    pub fn new(
        instance: &VulkanInstance,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
    ) -> VulkanResult<Self> {
        let loader = Surface::new(&instance.entry, &instance.instance);
        let surface = unsafe {
            ash_window::create_surface(&instance.entry, &instance.instance, display_handle, window_handle, None)
                .map_err(VulkanError::creating("surface"))?
        };
        Ok(Self { loader, surface })
    }
}

impl Drop for PresentationSurface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}

/// Physical device selection and capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heaps and types
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
}

impl PhysicalDeviceInfo {
    /// Select a suitable physical device, preferring discrete GPUs
    pub fn select_suitable_device(
        instance: &Instance,
        surface: &PresentationSurface,
    ) -> VulkanResult<Self> {
        let devices = unsafe {
            instance.enumerate_physical_devices()
                .map_err(VulkanError::Api)?
        };

        let mut candidates: Vec<Self> = devices
            .into_iter()
            .filter_map(|device| match Self::evaluate_device(instance, device, surface) {
                Ok(info) => Some(info),
                Err(e) => {
                    log::debug!("Skipping physical device: {e}");
                    None
                }
            })
            .collect();
        candidates.sort_by_key(|info| info.properties.device_type != vk::PhysicalDeviceType::DISCRETE_GPU);

        let selected = candidates.into_iter().next().ok_or_else(|| {
            VulkanError::InitializationFailed("No suitable GPU found".to_string())
        })?;
        log::info!("Selected GPU: {}", unsafe {
            CStr::from_ptr(selected.properties.device_name.as_ptr()).to_string_lossy()
        });
        Ok(selected)
    }

    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: &PresentationSurface,
    ) -> VulkanResult<Self> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
        let queue_families = unsafe {
            instance.get_physical_device_queue_family_properties(device)
        };

        let mut graphics_family = None;
        let mut present_family = None;

        for (index, family) in queue_families.iter().enumerate() {
            let index = index as u32;

            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && graphics_family.is_none() {
                graphics_family = Some(index);
            }

            let present_support = unsafe {
                surface.loader.get_physical_device_surface_support(device, index, surface.surface)
                    .map_err(VulkanError::Api)?
            };

            if present_support && present_family.is_none() {
                present_family = Some(index);
            }

            if graphics_family.is_some() && present_family.is_some() {
                break;
            }
        }

        let graphics_family = graphics_family.ok_or_else(|| {
            VulkanError::InitializationFailed("No graphics queue family found".to_string())
        })?;

        let present_family = present_family.ok_or_else(|| {
            VulkanError::InitializationFailed("No present queue family found".to_string())
        })?;

        let extensions = unsafe {
            instance.enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };

        let has_swapchain = extensions.iter().any(|available| {
            let extension_name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
            extension_name == SwapchainLoader::name()
        });

        if !has_swapchain {
            return Err(VulkanError::InitializationFailed(
                "Swapchain extension not supported".to_string()
            ));
        }

        Ok(Self {
            device,
            properties,
            memory_properties,
            graphics_family,
            present_family,
        })
    }

    /// Find a memory type matching `type_filter` with all of `properties`
    pub fn find_memory_type(&self, type_filter: u32, properties: vk::MemoryPropertyFlags) -> VulkanResult<u32> {
        (0..self.memory_properties.memory_type_count)
            .find(|&i| {
                type_filter & (1 << i) != 0
                    && self.memory_properties.memory_types[i as usize].property_flags.contains(properties)
            })
            .ok_or(VulkanError::NoSuitableMemoryType)
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create a new logical device with required queues
    pub fn new(instance: &Instance, physical_device_info: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let unique_families: HashSet<u32> = [
            physical_device_info.graphics_family,
            physical_device_info.present_family,
        ].into_iter().collect();

        let priorities = [1.0];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];
        let device_features = vk::PhysicalDeviceFeatures::builder()
            .fill_mode_non_solid(true)
            .build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance.create_device(physical_device_info.device, &create_info, None)
                .map_err(VulkanError::creating("logical device"))?
        };

        let graphics_queue = unsafe { device.get_device_queue(physical_device_info.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(physical_device_info.present_family, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            swapchain_loader,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}
