use std::sync::mpsc;

use bevy::prelude::*;
use bytemuck::{Pod, Zeroable};

use crate::game::agents::FocalPoint;
use crate::game::mirror::SoaMirror;

use super::{pursuit_velocity, FarFieldError, FarFieldIntegrator, FarFieldParams};

/// Threads per workgroup in the integrate kernel. Must match the WGSL
/// `@workgroup_size` below.
const WORKGROUP_SIZE: u32 = 64;

/// Headroom added before rounding buffer capacity up, mirroring the SoA
/// growth policy so both sides reallocate on the same cadence.
const CAPACITY_MARGIN: usize = 64;

/// Position integration kernel. Velocities are computed host-side at upload;
/// the device only advances positions, which keeps the kernel trivially
/// parallel and the buffers write-once per tick.
const INTEGRATE_SHADER: &str = r#"
struct IntegrateParams {
    dt: f32,
    count: u32,
    _pad0: u32,
    _pad1: u32,
}

@group(0) @binding(0) var<storage, read_write> positions: array<vec2<f32>>;
@group(0) @binding(1) var<storage, read> velocities: array<vec2<f32>>;
@group(0) @binding(2) var<uniform> params: IntegrateParams;

@compute @workgroup_size(64)
fn integrate(@builtin(global_invocation_id) id: vec3<u32>) {
    let i = id.x;
    if (i >= params.count) {
        return;
    }
    positions[i] = positions[i] + velocities[i] * params.dt;
}
"#;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct IntegrateParams {
    dt: f32,
    count: u32,
    _pad0: u32,
    _pad1: u32,
}

/// Compute-offload far tier.
///
/// Holds a long-lived device, queue and pipeline; per-capacity storage and
/// staging buffers are created lazily and only ever grow. Uploads compact the
/// far set into interleaved `[x, y]` pairs, the kernel advances positions on
/// the device, and results are read back through a mapped staging buffer on
/// an amortized cadence.
///
/// While a readback is pending, uploads are skipped so the device-resident
/// positions accumulate one integration step per frame; the eventual scatter
/// then carries the full window of motion. Between readbacks the mirror
/// keeps slightly stale far positions (and velocities refresh only at the
/// next upload), which is acceptable for agents far outside the playable
/// focus - the staleness trade is positional lag, never lost distance.
pub struct GpuFarField {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    params_buffer: wgpu::Buffer,
    position_buffer: Option<wgpu::Buffer>,
    velocity_buffer: Option<wgpu::Buffer>,
    staging_buffer: Option<wgpu::Buffer>,
    capacity: usize,
    readback_interval: u64,
    // Host-side compacted state; velocities stay host-side so readback only
    // transfers positions.
    indices: Vec<u32>,
    positions: Vec<f32>,
    velocities: Vec<f32>,
    count: usize,
    dirty: bool,
}

impl GpuFarField {
    /// Probe for a compute-capable adapter and build the integrate pipeline.
    /// Fails with [`FarFieldError::DeviceUnavailable`] on machines without a
    /// usable device; callers fall back to the CPU tier.
    pub fn new(readback_interval: u64) -> Result<Self, FarFieldError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| FarFieldError::DeviceUnavailable(format!("no adapter: {}", e)))?;

        let info = adapter.get_info();
        info!(
            "far-field compute adapter: {} ({:?}, {:?})",
            info.name, info.device_type, info.backend
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("far-field integrate"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: Default::default(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
        }))
        .map_err(|e| FarFieldError::DeviceUnavailable(format!("no device: {}", e)))?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("far-field integrate shader"),
            source: wgpu::ShaderSource::Wgsl(INTEGRATE_SHADER.into()),
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("far-field integrate pipeline"),
            layout: None,
            module: &shader,
            entry_point: Some("integrate"),
            compilation_options: Default::default(),
            cache: None,
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("far-field params"),
            size: std::mem::size_of::<IntegrateParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            device,
            queue,
            pipeline,
            params_buffer,
            position_buffer: None,
            velocity_buffer: None,
            staging_buffer: None,
            capacity: 0,
            readback_interval: readback_interval.max(1),
            indices: Vec::new(),
            positions: Vec::new(),
            velocities: Vec::new(),
            count: 0,
            dirty: false,
        })
    }

    /// Compacted agents currently resident on the device.
    pub fn count(&self) -> usize {
        self.count
    }

    fn pair_bytes(n: usize) -> u64 {
        (n * 2 * std::mem::size_of::<f32>()) as u64
    }
}

impl FarFieldIntegrator for GpuFarField {
    fn ensure_capacity(&mut self, n: usize) {
        if self.capacity >= n {
            return;
        }
        let new_cap = (n + CAPACITY_MARGIN).next_power_of_two();

        self.position_buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("far-field positions"),
            size: Self::pair_bytes(new_cap),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        }));
        self.velocity_buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("far-field velocities"),
            size: Self::pair_bytes(new_cap),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.staging_buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("far-field staging"),
            size: Self::pair_bytes(new_cap),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.capacity = new_cap;
    }

    fn upload(&mut self, mirror: &SoaMirror, focal: &FocalPoint, params: &FarFieldParams) {
        // Device-resident positions carry un-scattered integration; rewriting
        // them now would throw that motion away. Keep stepping the resident
        // set until the amortized readback lands.
        if self.dirty {
            return;
        }
        self.indices.clear();
        self.positions.clear();
        self.velocities.clear();

        let focal_speed = focal.speed();
        for i in 0..mirror.live() {
            if !mirror.is_active(i) || !mirror.is_far(i) {
                continue;
            }
            let (vx, vy) = pursuit_velocity(
                mirror.xs[i],
                mirror.ys[i],
                mirror.vxs[i],
                mirror.vys[i],
                mirror.radii[i],
                focal.pos.x,
                focal.pos.y,
                focal_speed,
                params,
            );
            self.indices.push(i as u32);
            self.positions.push(mirror.xs[i]);
            self.positions.push(mirror.ys[i]);
            self.velocities.push(vx);
            self.velocities.push(vy);
        }
        self.count = self.indices.len();
        if self.count == 0 {
            return;
        }

        self.ensure_capacity(self.count);
        // ensure_capacity always leaves both buffers populated for count > 0
        if let (Some(pos), Some(vel)) = (&self.position_buffer, &self.velocity_buffer) {
            self.queue
                .write_buffer(pos, 0, bytemuck::cast_slice(&self.positions));
            self.queue
                .write_buffer(vel, 0, bytemuck::cast_slice(&self.velocities));
        }
    }

    fn step(&mut self, dt: f32, _frame: u64) -> Result<(), FarFieldError> {
        if self.count == 0 {
            return Ok(());
        }
        let position_buffer = self
            .position_buffer
            .as_ref()
            .ok_or_else(|| FarFieldError::Dispatch("position buffer missing".into()))?;
        let velocity_buffer = self
            .velocity_buffer
            .as_ref()
            .ok_or_else(|| FarFieldError::Dispatch("velocity buffer missing".into()))?;

        let params = IntegrateParams {
            dt,
            count: self.count as u32,
            _pad0: 0,
            _pad1: 0,
        };
        self.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("far-field integrate bind group"),
            layout: &self.pipeline.get_bind_group_layout(0),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: position_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: velocity_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.params_buffer.as_entire_binding(),
                },
            ],
        });

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("far-field integrate"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("integrate"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups((self.count as u32).div_ceil(WORKGROUP_SIZE), 1, 1);
        }
        self.queue.submit(Some(encoder.finish()));
        self.dirty = true;

        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(FarFieldError::Dispatch(err.to_string()));
        }
        Ok(())
    }

    fn readback(&mut self, mirror: &mut SoaMirror, frame: u64) -> Result<bool, FarFieldError> {
        if self.count == 0 || !self.dirty {
            return Ok(false);
        }
        if frame % self.readback_interval != 0 {
            return Ok(false);
        }
        let position_buffer = self
            .position_buffer
            .as_ref()
            .ok_or_else(|| FarFieldError::Readback("position buffer missing".into()))?;
        let staging_buffer = self
            .staging_buffer
            .as_ref()
            .ok_or_else(|| FarFieldError::Readback("staging buffer missing".into()))?;

        let bytes = Self::pair_bytes(self.count);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("far-field readback"),
            });
        encoder.copy_buffer_to_buffer(position_buffer, 0, staging_buffer, 0, bytes);
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..bytes);
        let (tx, rx) = mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        });

        rx.recv()
            .map_err(|e| FarFieldError::Readback(format!("map result lost: {}", e)))?
            .map_err(|e| FarFieldError::Readback(format!("map failed: {:?}", e)))?;

        {
            let data = buffer_slice.get_mapped_range();
            let pairs: &[f32] = bytemuck::cast_slice(&data);
            for (slot, &mi) in self.indices.iter().enumerate() {
                let mi = mi as usize;
                mirror.xs[mi] = pairs[slot * 2];
                mirror.ys[mi] = pairs[slot * 2 + 1];
                mirror.vxs[mi] = self.velocities[slot * 2];
                mirror.vys[mi] = self.velocities[slot * 2 + 1];
            }
        }
        staging_buffer.unmap();
        self.dirty = false;
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "gpu"
    }
}
