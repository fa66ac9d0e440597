//! Shader management
//!
//! SPIR-V modules are loaded once per path and shared by every pipeline that
//! names them. Pipeline builds run on worker threads, so the cache is the one
//! structure they share mutably; it is guarded by a `Mutex`.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use ash::vk;

use crate::render::api::GpuDevice;
use super::{VulkanError, VulkanResult};

/// Source of shader modules, keyed by path
///
/// `get` is idempotent: asking twice for the same path yields the same module.
pub trait ShaderProvider: Send + Sync {
    /// Module for `path`, loading it on first use
    fn get(&self, path: &str) -> VulkanResult<vk::ShaderModule>;
}

/// File-backed shader cache with RAII cleanup
pub struct ShaderCache {
    device: Arc<dyn GpuDevice>,
    directory: PathBuf,
    modules: Mutex<HashMap<String, vk::ShaderModule>>,
}

impl ShaderCache {
    /// Create a cache resolving relative paths against `directory`
    pub fn new(device: Arc<dyn GpuDevice>, directory: impl Into<PathBuf>) -> Self {
        Self {
            device,
            directory: directory.into(),
            modules: Mutex::new(HashMap::new()),
        }
    }

    /// Number of loaded modules
    pub fn len(&self) -> usize {
        self.modules.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing has been loaded yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn load(&self, path: &Path) -> VulkanResult<vk::ShaderModule> {
        let shader_error = |reason: String| VulkanError::ShaderLoad {
            path: path.display().to_string(),
            reason,
        };

        let mut file = File::open(path).map_err(|e| shader_error(e.to_string()))?;
        let code = ash::util::read_spv(&mut file).map_err(|e| shader_error(e.to_string()))?;
        self.device.create_shader_module(&code)
    }
}

impl ShaderProvider for ShaderCache {
    fn get(&self, path: &str) -> VulkanResult<vk::ShaderModule> {
        let mut modules = self.modules.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(&module) = modules.get(path) {
            return Ok(module);
        }

        let module = self.load(&self.directory.join(path))?;
        log::debug!("Loaded shader {}", path);
        modules.insert(path.to_string(), module);
        Ok(module)
    }
}

impl Drop for ShaderCache {
    fn drop(&mut self) {
        let modules = self.modules.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, module) in modules.drain() {
            self.device.destroy_shader_module(module);
        }
    }
}
