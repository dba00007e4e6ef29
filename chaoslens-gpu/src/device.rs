//! GPU device initialization and capability detection.

use std::future::Future;

use crate::error::GpuError;

/// Holds the wgpu device and queue.
///
/// Programs and tile surfaces share one context through an `Arc`.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
}

/// Result of GPU initialization attempt.
pub enum GpuAvailability {
    Available(GpuContext),
    Unavailable(String),
}

impl GpuContext {
    /// Attempt to initialize GPU. Returns Unavailable on any failure.
    pub async fn try_init() -> GpuAvailability {
        match Self::init_internal().await {
            Ok(ctx) => GpuAvailability::Available(ctx),
            Err(e) => {
                log::warn!("GPU initialization failed: {e}");
                GpuAvailability::Unavailable(e.to_string())
            }
        }
    }

    async fn init_internal() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let adapter_info = adapter.get_info();
        log::info!("GPU adapter: {:?}", adapter_info);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("chaoslens"),
                    required_features: wgpu::Features::empty(),
                    // Large tiles need the adapter's full texture size limit.
                    required_limits: adapter.limits(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        Ok(Self {
            device,
            queue,
            adapter_info,
        })
    }

    /// Largest texture edge this device can render to.
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// Run `f` inside validation and out-of-memory error scopes.
    ///
    /// Errors wgpu would otherwise report to the uncaptured-error handler come
    /// back as [`GpuError::Scope`].
    pub fn scoped<T>(&self, operation: &'static str, f: impl FnOnce() -> T) -> Result<T, GpuError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        let validation = block_on(self.device.pop_error_scope());
        let out_of_memory = block_on(self.device.pop_error_scope());

        match validation.or(out_of_memory) {
            Some(error) => {
                log::error!("{operation} failed: {error}");
                Err(GpuError::Scope {
                    operation,
                    message: error.to_string(),
                })
            }
            None => Ok(value),
        }
    }

    /// Block until all submitted work has finished.
    pub fn wait_idle(&self) {
        self.device.poll(wgpu::Maintain::Wait);
    }
}

pub(crate) fn block_on<F: Future>(future: F) -> F::Output {
    pollster::block_on(future)
}
