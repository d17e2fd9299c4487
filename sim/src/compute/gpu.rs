//! wgpu compute backend.
//!
//! Each dispatch uploads the frozen inputs into fresh storage buffers, runs
//! one kernel invocation per element and blocks on the readback. Buffers are
//! rebuilt per dispatch; the simulation steps at most a few times per frame
//! and upload cost is small next to the kernels at the sizes this targets.

use super::{ComputeBackend, GridParams};
use crate::error::{SimError, SimResult};
use crate::projectiles::{Projectile, ProjectileParams};
use crate::spatial::{SpatialEntry, SpatialGrid};
use crate::steering::{SteerAgent, SteerOutput, SteerParams};
use bytemuck::Pod;
use std::sync::mpsc;
use wgpu::util::DeviceExt;

const WORKGROUP_SIZE: u32 = 64;

pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    steer_pipeline: wgpu::ComputePipeline,
    projectile_pipeline: wgpu::ComputePipeline,
    adapter_name: String,
}

impl GpuBackend {
    /// Open the default adapter and compile both kernels. Fails if no
    /// adapter is available.
    pub fn new() -> SimResult<Self> {
        pollster::block_on(Self::new_async())
    }

    async fn new_async() -> SimResult<Self> {
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
            .ok_or_else(|| SimError::Gpu("no compatible adapter".into()))?;

        let info = adapter.get_info();
        tracing::info!(adapter = %info.name, backend = ?info.backend, "gpu compute backend");

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("hearth-sim compute"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .map_err(|e| SimError::Gpu(e.to_string()))?;

        let steer_pipeline = Self::pipeline(&device, "steer", include_str!("steer.wgsl"));
        let projectile_pipeline = Self::pipeline(&device, "projectile", include_str!("projectile.wgsl"));

        Ok(Self {
            device,
            queue,
            steer_pipeline,
            projectile_pipeline,
            adapter_name: info.name,
        })
    }

    fn pipeline(device: &wgpu::Device, label: &str, source: &str) -> wgpu::ComputePipeline {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: None,
            module: &module,
            entry_point: "main",
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn uniform<T: Pod>(&self, label: &str, value: &T) -> wgpu::Buffer {
        self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::bytes_of(value),
            usage: wgpu::BufferUsages::UNIFORM,
        })
    }

    /// Storage buffer from a slice. Zero-sized bindings are invalid, so an
    /// empty slice uploads one zeroed element instead.
    fn storage<T: Pod + Default>(&self, label: &str, data: &[T], usage: wgpu::BufferUsages) -> wgpu::Buffer {
        let placeholder = [T::default()];
        let data = if data.is_empty() { &placeholder[..] } else { data };
        self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(data),
            usage: wgpu::BufferUsages::STORAGE | usage,
        })
    }

    fn grid_buffers(&self, grid: &SpatialGrid) -> [wgpu::Buffer; 5] {
        let packed = grid.pack();
        let none = wgpu::BufferUsages::empty();
        [
            self.uniform("grid params", &GridParams::from_grid(grid)),
            self.storage("grid counts", packed.counts, none),
            self.storage::<SpatialEntry>("grid dense", packed.dense, none),
            self.storage("grid spill start", packed.spill_start, none),
            self.storage::<SpatialEntry>("grid spill", packed.spill, none),
        ]
    }

    /// Bind `buffers` in order, dispatch `count` invocations, and read back
    /// the last binding.
    fn run<T: Pod>(
        &self,
        pipeline: &wgpu::ComputePipeline,
        buffers: &[&wgpu::Buffer],
        count: u32,
        out: &mut [T],
    ) -> SimResult<()> {
        let entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(i, b)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: b.as_entire_binding(),
            })
            .collect();
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: &pipeline.get_bind_group_layout(0),
            entries: &entries,
        });

        let result = buffers
            .last()
            .ok_or_else(|| SimError::Gpu("dispatch without output binding".into()))?;
        let size = std::mem::size_of_val(out) as u64;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(count.div_ceil(WORKGROUP_SIZE), 1, 1);
        }
        encoder.copy_buffer_to_buffer(result, 0, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            let _ = tx.send(r);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| SimError::Gpu(e.to_string()))?
            .map_err(|e| SimError::Gpu(e.to_string()))?;

        {
            let view = slice.get_mapped_range();
            out.copy_from_slice(bytemuck::cast_slice(&view[..]));
        }
        staging.unmap();
        Ok(())
    }
}

impl ComputeBackend for GpuBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn steer(
        &mut self,
        grid: &SpatialGrid,
        params: &SteerParams,
        agents: &[SteerAgent],
        out: &mut Vec<SteerOutput>,
    ) -> SimResult<()> {
        out.clear();
        out.resize(agents.len(), SteerOutput::default());
        if agents.is_empty() {
            return Ok(());
        }

        let mut params = *params;
        params.agent_count = agents.len() as u32;
        let params_buf = self.uniform("steer params", &params);
        let [grid_params, counts, dense, spill_start, spill] = self.grid_buffers(grid);
        let agents_buf = self.storage("steer agents", agents, wgpu::BufferUsages::empty());
        let out_buf = self.storage("steer out", out.as_slice(), wgpu::BufferUsages::COPY_SRC);

        self.run(
            &self.steer_pipeline,
            &[&params_buf, &grid_params, &agents_buf, &counts, &dense, &spill_start, &spill, &out_buf],
            params.agent_count,
            out.as_mut_slice(),
        )
    }

    fn advance_projectiles(
        &mut self,
        grid: &SpatialGrid,
        params: &ProjectileParams,
        alive: &[u32],
        projectiles: &mut [Projectile],
    ) -> SimResult<()> {
        if projectiles.is_empty() {
            return Ok(());
        }

        let mut params = *params;
        params.projectile_count = projectiles.len() as u32;
        let params_buf = self.uniform("projectile params", &params);
        let [grid_params, counts, dense, spill_start, spill] = self.grid_buffers(grid);
        let alive_buf = self.storage("alive", alive, wgpu::BufferUsages::empty());
        let pool_buf = self.storage(
            "projectiles",
            &*projectiles,
            wgpu::BufferUsages::COPY_SRC,
        );

        self.run(
            &self.projectile_pipeline,
            &[&params_buf, &grid_params, &alive_buf, &counts, &dense, &spill_start, &spill, &pool_buf],
            params.projectile_count,
            projectiles,
        )
    }
}
