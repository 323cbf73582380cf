use bytemuck::{Pod, Zeroable};
use std::num::NonZeroU64;
use std::sync::{mpsc, Arc};
use wgpu::util::DeviceExt;

use super::pool::{ContextLease, ContextPool};
use super::ComputeBackend;
use crate::error::BackendError;
use crate::generation::Row;
use crate::rules::RuleTable;

pub const WORKGROUP_SIZE: u32 = 64;

/// Uniforms for one step, matching `StepParams` in the shader
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct StepParams {
    pub cols: u32,
    pub rule: u32,
    pub _padding: [u32; 2], // 16-byte uniform alignment
}

pub fn create_step_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("ECA Step Bind Group Layout"),
        entries: &[
            // StepParams Uniform (Binding 0)
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<StepParams>() as u64),
                },
                count: None,
            },
            // Current Row (Binding 1)
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            // Next Row (Binding 2)
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    })
}

/// Ping-pong bind groups: group 0 reads buffer 0 and writes buffer 1,
/// group 1 the reverse.
pub fn create_step_bind_groups(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    cell_buffers: &[wgpu::Buffer; 2],
    params_buffer: &wgpu::Buffer,
) -> [wgpu::BindGroup; 2] {
    [
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ECA Step Bind Group 0"),
            layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: params_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: cell_buffers[0].as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: cell_buffers[1].as_entire_binding() },
            ],
        }),
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ECA Step Bind Group 1"),
            layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: params_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: cell_buffers[1].as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: cell_buffers[0].as_entire_binding() },
            ],
        }),
    ]
}

/// Byte size of a cell buffer holding `cols` cells, padded for mapping
fn buffer_size_for(cols: usize) -> u64 {
    let bytes = (cols.max(1) * std::mem::size_of::<u32>()) as u64;
    bytes.div_ceil(wgpu::MAP_ALIGNMENT) * wgpu::MAP_ALIGNMENT
}

/// Runs the rule lookup in a wgpu compute shader.
///
/// Keeps a ping-pong pair of storage buffers sized for the current row width;
/// they are recreated when the width changes.
pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,

    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
    cell_buffers: [wgpu::Buffer; 2],
    staging_buffer: wgpu::Buffer,
    bind_groups: [wgpu::BindGroup; 2],
    capacity: usize,
    frame_num: usize,

    // Dropped last, after the device
    _lease: ContextLease,
}

impl GpuBackend {
    pub fn new(pool: &Arc<ContextPool>) -> Result<Self, BackendError> {
        let lease = pool.acquire()?;
        pollster::block_on(Self::init(lease))
    }

    async fn init(lease: ContextLease) -> Result<Self, BackendError> {
        log::info!("Initializing wgpu compute backend...");

        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or(BackendError::AdapterUnavailable)?;
        let adapter_name = adapter.get_info().name;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("ECA Compute Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::DeviceRequest(e.to_string()))?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("ECA Step Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/eca_step.wgsl").into()),
        });
        let bind_group_layout = create_step_bind_group_layout(&device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ECA Step Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("ECA Step Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader_module,
            entry_point: "main",
        });

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("ECA Step Parameters"),
            contents: bytemuck::bytes_of(&StepParams { cols: 0, rule: 0, _padding: [0; 2] }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let capacity = 1;
        let (cell_buffers, staging_buffer) = Self::create_cell_buffers(&device, capacity);
        let bind_groups = create_step_bind_groups(&device, &bind_group_layout, &cell_buffers, &params_buffer);

        if let Some(error) = device.pop_error_scope().await {
            return Err(BackendError::Validation(error.to_string()));
        }

        log::info!("wgpu compute backend ready on {}", adapter_name);

        Ok(Self {
            device,
            queue,
            adapter_name,
            pipeline,
            bind_group_layout,
            params_buffer,
            cell_buffers,
            staging_buffer,
            bind_groups,
            capacity,
            frame_num: 0,
            _lease: lease,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn create_cell_buffers(device: &wgpu::Device, cols: usize) -> ([wgpu::Buffer; 2], wgpu::Buffer) {
        let size = buffer_size_for(cols);
        let usage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC;

        let cell_buffers = [
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Cell Buffer 0"),
                size,
                usage,
                mapped_at_creation: false,
            }),
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Cell Buffer 1"),
                size,
                usage,
                mapped_at_creation: false,
            }),
        ];

        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        (cell_buffers, staging_buffer)
    }

    /// Recreate buffers and bind groups when the row width changes
    fn ensure_capacity(&mut self, cols: usize) {
        if cols == self.capacity {
            return;
        }
        let (cell_buffers, staging_buffer) = Self::create_cell_buffers(&self.device, cols);
        self.cell_buffers = cell_buffers;
        self.staging_buffer = staging_buffer;
        self.bind_groups = create_step_bind_groups(
            &self.device,
            &self.bind_group_layout,
            &self.cell_buffers,
            &self.params_buffer,
        );
        self.capacity = cols;
        self.frame_num = 0;
        log::debug!("Resized GPU cell buffers to {} cells", cols);
    }

    fn read_back(&self, cols: usize) -> Result<Vec<u32>, BackendError> {
        let slice = self.staging_buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|_| BackendError::Readback("map callback dropped".into()))?
            .map_err(|e| BackendError::Readback(e.to_string()))?;

        let cells = {
            let data = slice.get_mapped_range();
            let words: &[u32] = bytemuck::cast_slice(&data);
            words[..cols].to_vec()
        };
        self.staging_buffer.unmap();
        Ok(cells)
    }
}

impl ComputeBackend for GpuBackend {
    fn name(&self) -> &str {
        "gpu"
    }

    fn compute_next_generation(&mut self, current: &Row, rule: RuleTable) -> Result<Row, BackendError> {
        let cols = current.len();
        if cols == 0 {
            return Ok(Row::zeros(0));
        }
        self.ensure_capacity(cols);

        // Alternate which buffer is the input, as the render loop would
        let input = self.frame_num % 2;
        let output = 1 - input;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        self.queue.write_buffer(&self.cell_buffers[input], 0, bytemuck::cast_slice(&current.to_u32_cells()));
        self.queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&StepParams {
            cols: cols as u32,
            rule: u32::from(rule.number()),
            _padding: [0; 2],
        }));

        let mut encoder = self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("ECA Step Encoder") });
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("ECA Step Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &self.bind_groups[input], &[]);
            compute_pass.dispatch_workgroups((cols as u32).div_ceil(WORKGROUP_SIZE), 1, 1);
        }
        encoder.copy_buffer_to_buffer(
            &self.cell_buffers[output],
            0,
            &self.staging_buffer,
            0,
            buffer_size_for(cols),
        );
        self.queue.submit(Some(encoder.finish()));

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(BackendError::Validation(error.to_string()));
        }

        let cells = self.read_back(cols)?;
        self.frame_num += 1;
        Ok(Row::from_cells(cells))
    }
}
