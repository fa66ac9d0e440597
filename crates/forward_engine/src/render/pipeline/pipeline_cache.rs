//! Pipeline cache keyed by shape signature
//!
//! At most one [`PipelineObject`] exists per signature. Every registered
//! object holds one use of its signature's entry; the entry is destroyed when
//! the last user is released.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::thread;

use ash::vk;

use crate::core::config::RendererConfig;
use crate::render::api::GpuDevice;
use crate::render::object::ShapeSignature;
use crate::render::vulkan::{ShaderProvider, VulkanError, VulkanResult};
use super::graphics_pipeline::PipelineObject;
use super::pipeline_config::PipelinePolicy;

struct CacheEntry {
    pipeline: PipelineObject,
    users: usize,
}

/// Shared pipelines for every registered signature
pub struct PipelineCache {
    device: Arc<dyn GpuDevice>,
    entries: HashMap<ShapeSignature, CacheEntry>,
}

impl PipelineCache {
    /// Create an empty cache
    pub fn new(device: Arc<dyn GpuDevice>) -> Self {
        Self {
            device,
            entries: HashMap::new(),
        }
    }

    /// Build pipelines for every signature not yet cached
    ///
    /// One worker thread per new signature. Duplicates in `signatures` are
    /// built once. If any build fails the whole batch is discarded and the
    /// first error returned. Returns how many pipelines were added.
    pub fn build_missing(
        &mut self,
        signatures: impl IntoIterator<Item = ShapeSignature>,
        shaders: &dyn ShaderProvider,
        render_pass: vk::RenderPass,
        samples: vk::SampleCountFlags,
        config: &RendererConfig,
    ) -> VulkanResult<usize> {
        let missing: BTreeSet<ShapeSignature> = signatures
            .into_iter()
            .filter(|signature| !self.entries.contains_key(signature))
            .collect();
        if missing.is_empty() {
            return Ok(0);
        }

        log::debug!("Building {} new pipelines", missing.len());
        let pipelines = self.build_batch(&missing, shaders, render_pass, samples, config)?;
        let added = pipelines.len();
        for pipeline in pipelines {
            self.entries.insert(pipeline.signature(), CacheEntry { pipeline, users: 0 });
        }
        Ok(added)
    }

    /// Rebuild every cached pipeline against a new render pass
    ///
    /// User counts are kept. On failure the old pipelines stay in place.
    pub fn rebuild_all(
        &mut self,
        shaders: &dyn ShaderProvider,
        render_pass: vk::RenderPass,
        samples: vk::SampleCountFlags,
        config: &RendererConfig,
    ) -> VulkanResult<()> {
        let signatures: BTreeSet<ShapeSignature> = self.entries.keys().copied().collect();
        if signatures.is_empty() {
            return Ok(());
        }

        let pipelines = self.build_batch(&signatures, shaders, render_pass, samples, config)?;
        for pipeline in pipelines {
            if let Some(entry) = self.entries.get_mut(&pipeline.signature()) {
                entry.pipeline = pipeline;
            }
        }
        log::debug!("Rebuilt {} pipelines", signatures.len());
        Ok(())
    }

    fn build_batch(
        &self,
        signatures: &BTreeSet<ShapeSignature>,
        shaders: &dyn ShaderProvider,
        render_pass: vk::RenderPass,
        samples: vk::SampleCountFlags,
        config: &RendererConfig,
    ) -> VulkanResult<Vec<PipelineObject>> {
        let device = &self.device;
        let built = thread::scope(|scope| {
            let workers = signatures
                .iter()
                .map(|&signature| {
                    let policy = PipelinePolicy::for_material(signature.material, config.polygon_mode_for(signature.material));
                    let device = device.clone();
                    thread::Builder::new()
                        .name(format!("pipeline-{signature}"))
                        .spawn_scoped(scope, move || {
                            PipelineObject::build(device, shaders, render_pass, samples, signature, policy)
                        })
                        .map_err(|e| VulkanError::PipelineBuild {
                            signature: signature.to_string(),
                            reason: format!("failed to spawn worker: {e}"),
                        })
                })
                .collect::<Vec<_>>();

            workers
                .into_iter()
                .map(|worker| match worker?.join() {
                    Ok(result) => result,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect::<Vec<_>>()
        });

        built.into_iter().collect()
    }

    /// Record one more user of `signature`
    pub fn acquire(&mut self, signature: ShapeSignature) -> VulkanResult<&PipelineObject> {
        let entry = self.entries.get_mut(&signature).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("No pipeline cached for {signature}"),
        })?;
        entry.users += 1;
        Ok(&entry.pipeline)
    }

    /// Drop one user of `signature`, destroying the pipeline with the last one
    ///
    /// Returns whether the entry was destroyed.
    pub fn release(&mut self, signature: ShapeSignature) -> bool {
        let Some(entry) = self.entries.get_mut(&signature) else {
            log::warn!("Released unknown pipeline {}", signature);
            return false;
        };

        entry.users = entry.users.saturating_sub(1);
        if entry.users > 0 {
            return false;
        }

        self.entries.remove(&signature);
        log::debug!("Destroyed pipeline for {}", signature);
        true
    }

    /// Drop entries nobody uses
    pub fn evict_unused(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.users > 0);
        before - self.entries.len()
    }

    /// Cached pipeline for `signature`
    pub fn get(&self, signature: &ShapeSignature) -> Option<&PipelineObject> {
        self.entries.get(signature).map(|entry| &entry.pipeline)
    }

    /// Whether `signature` has a pipeline
    pub fn contains(&self, signature: &ShapeSignature) -> bool {
        self.entries.contains_key(signature)
    }

    /// Number of users of `signature`
    pub fn users(&self, signature: &ShapeSignature) -> usize {
        self.entries.get(signature).map_or(0, |entry| entry.users)
    }

    /// Number of cached pipelines
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Destroy every pipeline
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
