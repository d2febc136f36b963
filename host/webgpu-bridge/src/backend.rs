use std::fmt;

use futures::future::LocalBoxFuture;
use thiserror::Error;

use crate::{
    enums::ERROR_TYPE,
    limits::Limits,
    records::{
        BindGroupDescriptor, BindGroupLayoutDescriptor, BufferDescriptor, Color,
        ComputePassDescriptor, ComputePipelineDescriptor, DeviceDescriptor, Extent3d,
        PipelineLayoutDescriptor, QuerySetDescriptor, RenderPassDescriptor,
        RenderPipelineDescriptor, RequestAdapterOptions, SamplerDescriptor,
        ShaderModuleDescriptor, Sym, SurfaceConfiguration, TexelCopyBufferLayout,
        TexelCopyTextureInfo, TextureDescriptor, TextureViewDescriptor,
    },
};

// === HostObject === //

/// An object owned by the host graphics API and lent to the guest through a handle.
pub trait HostObject: fmt::Debug + Clone + 'static {
    /// The object's debug label, if this kind of object carries one.
    fn label(&self) -> Option<String> {
        None
    }

    /// Replaces the debug label. Objects without a label ignore this.
    fn set_label(&mut self, label: &str) {
        let _ = label;
    }
}

// === HostError === //

#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum HostErrorKind {
    Validation,
    OutOfMemory,
    Internal,
    Unknown,
}

/// A failure reported by the host graphics API.
///
/// These never cross the boundary as errors. The bridge turns them into a status ordinal and a
/// message string for the guest.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("{kind:?} error: {message}")]
pub struct HostError {
    pub kind: HostErrorKind,
    pub message: String,
}

impl HostError {
    pub fn new(kind: HostErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(HostErrorKind::Validation, message)
    }

    pub fn out_of_memory(message: impl Into<String>) -> Self {
        Self::new(HostErrorKind::OutOfMemory, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(HostErrorKind::Internal, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(HostErrorKind::Unknown, message)
    }

    /// The `ErrorType` ordinal the guest sees for this error.
    pub fn error_type(&self) -> u32 {
        ERROR_TYPE.ordinal(match self.kind {
            HostErrorKind::Validation => "validation",
            HostErrorKind::OutOfMemory => "out-of-memory",
            HostErrorKind::Internal => "internal",
            HostErrorKind::Unknown => "unknown",
        })
    }
}

pub type HostFuture<T> = LocalBoxFuture<'static, Result<T, HostError>>;

// === Info Records === //

#[derive(Debug, Clone, PartialEq)]
pub struct AdapterInfo {
    pub vendor: String,
    pub architecture: String,
    pub device: String,
    pub description: String,
    pub backend_type: &'static str,
    pub adapter_type: &'static str,
}

impl Default for AdapterInfo {
    fn default() -> Self {
        Self {
            vendor: String::new(),
            architecture: String::new(),
            device: String::new(),
            description: String::new(),
            backend_type: "WebGPU",
            adapter_type: "Unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub depth_or_array_layers: u32,
    pub mip_level_count: u32,
    pub sample_count: u32,
    pub dimension: &'static str,
    pub format: &'static str,
    pub usage: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceLostInfo {
    /// A `DeviceLostReason` symbol such as `"destroyed"`.
    pub reason: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompilationMessage {
    pub message: String,
    /// A `CompilationMessageType` symbol such as `"error"`.
    pub ty: &'static str,
    pub line_num: u64,
    pub line_pos: u64,
    pub offset: u64,
    pub length: u64,
}

// === GpuBackend === //

/// The host graphics API the bridge forwards to.
///
/// Creation methods mirror WebGPU: they always hand back an object and report validation
/// problems through the device's error reporting. Requests that settle later return a
/// [`HostFuture`], which the bridge drives on its local executor.
pub trait GpuBackend: Sized + 'static {
    type Instance: HostObject;
    type Adapter: HostObject;
    type BindGroup: HostObject;
    type BindGroupLayout: HostObject;
    type Buffer: HostObject;
    type CommandBuffer: HostObject;
    type CommandEncoder: HostObject;
    type ComputePassEncoder: HostObject;
    type ComputePipeline: HostObject;
    type Device: HostObject;
    type PipelineLayout: HostObject;
    type QuerySet: HostObject;
    type Queue: HostObject;
    type RenderBundle: HostObject;
    type RenderBundleEncoder: HostObject;
    type RenderPassEncoder: HostObject;
    type RenderPipeline: HostObject;
    type Sampler: HostObject;
    type ShaderModule: HostObject;
    type Surface: HostObject;
    type Texture: HostObject;
    type TextureView: HostObject;

    // Instance
    /// Returns `None` when the host has no GPU support at all.
    fn create_instance(&self) -> Option<Self::Instance>;

    fn instance_create_surface(
        &self,
        instance: &Self::Instance,
        selector: &str,
    ) -> Result<Self::Surface, HostError>;

    /// Resolves to `None` when no adapter matches the options.
    fn instance_request_adapter(
        &self,
        instance: &Self::Instance,
        options: Option<&RequestAdapterOptions>,
    ) -> HostFuture<Option<Self::Adapter>>;

    // Adapter
    fn adapter_features(&self, adapter: &Self::Adapter) -> Vec<String>;

    fn adapter_limits(&self, adapter: &Self::Adapter) -> Limits;

    fn adapter_info(&self, adapter: &Self::Adapter) -> AdapterInfo;

    fn adapter_request_device(
        &self,
        adapter: &Self::Adapter,
        descriptor: Option<&DeviceDescriptor>,
    ) -> HostFuture<Option<Self::Device>>;

    // Device
    fn device_lost(&self, device: &Self::Device) -> LocalBoxFuture<'static, DeviceLostInfo>;

    fn device_set_uncaptured_error_handler(
        &self,
        device: &Self::Device,
        handler: Box<dyn FnMut(HostError)>,
    );

    fn device_features(&self, device: &Self::Device) -> Vec<String>;

    fn device_limits(&self, device: &Self::Device) -> Limits;

    fn device_queue(&self, device: &Self::Device) -> Self::Queue;

    fn device_destroy(&self, device: &Self::Device);

    fn device_create_bind_group(
        &self,
        device: &Self::Device,
        descriptor: &BindGroupDescriptor<Self>,
    ) -> Self::BindGroup;

    fn device_create_bind_group_layout(
        &self,
        device: &Self::Device,
        descriptor: &BindGroupLayoutDescriptor,
    ) -> Self::BindGroupLayout;

    fn device_create_buffer(
        &self,
        device: &Self::Device,
        descriptor: &BufferDescriptor,
    ) -> Self::Buffer;

    fn device_create_command_encoder(
        &self,
        device: &Self::Device,
        label: Option<&str>,
    ) -> Self::CommandEncoder;

    fn device_create_compute_pipeline(
        &self,
        device: &Self::Device,
        descriptor: &ComputePipelineDescriptor<Self>,
    ) -> Self::ComputePipeline;

    fn device_create_pipeline_layout(
        &self,
        device: &Self::Device,
        descriptor: &PipelineLayoutDescriptor<Self>,
    ) -> Self::PipelineLayout;

    fn device_create_query_set(
        &self,
        device: &Self::Device,
        descriptor: &QuerySetDescriptor,
    ) -> Self::QuerySet;

    fn device_create_render_pipeline(
        &self,
        device: &Self::Device,
        descriptor: &RenderPipelineDescriptor<Self>,
    ) -> Self::RenderPipeline;

    fn device_create_sampler(
        &self,
        device: &Self::Device,
        descriptor: Option<&SamplerDescriptor>,
    ) -> Self::Sampler;

    fn device_create_shader_module(
        &self,
        device: &Self::Device,
        descriptor: &ShaderModuleDescriptor,
    ) -> Self::ShaderModule;

    fn device_create_texture(
        &self,
        device: &Self::Device,
        descriptor: &TextureDescriptor,
    ) -> Self::Texture;

    /// `filter` is an `ErrorFilter` symbol.
    fn device_push_error_scope(&self, device: &Self::Device, filter: &'static str);

    /// Resolves to the first error captured by the innermost scope, if any. Rejects when the
    /// scope stack is empty.
    fn device_pop_error_scope(&self, device: &Self::Device) -> HostFuture<Option<HostError>>;

    // Buffer
    fn buffer_destroy(&self, buffer: &Self::Buffer);

    fn buffer_size(&self, buffer: &Self::Buffer) -> u64;

    fn buffer_usage(&self, buffer: &Self::Buffer) -> u64;

    /// A `BufferMapState` symbol.
    fn buffer_map_state(&self, buffer: &Self::Buffer) -> &'static str;

    fn buffer_map_async(
        &self,
        buffer: &Self::Buffer,
        mode: u64,
        offset: u64,
        size: Option<u64>,
    ) -> HostFuture<()>;

    /// Copies out the current contents of a mapped range.
    fn buffer_mapped_range(
        &self,
        buffer: &Self::Buffer,
        offset: u64,
        size: Option<u64>,
    ) -> Result<Vec<u8>, HostError>;

    /// Writes back into a range previously returned by
    /// [`buffer_mapped_range`](Self::buffer_mapped_range).
    fn buffer_write_mapped_range(&self, buffer: &Self::Buffer, offset: u64, data: &[u8]);

    fn buffer_unmap(&self, buffer: &Self::Buffer);

    // Command encoder
    fn command_encoder_begin_render_pass(
        &self,
        encoder: &mut Self::CommandEncoder,
        descriptor: &RenderPassDescriptor<Self>,
    ) -> Self::RenderPassEncoder;

    fn command_encoder_begin_compute_pass(
        &self,
        encoder: &mut Self::CommandEncoder,
        descriptor: Option<&ComputePassDescriptor<Self>>,
    ) -> Self::ComputePassEncoder;

    fn command_encoder_copy_buffer_to_buffer(
        &self,
        encoder: &mut Self::CommandEncoder,
        source: &Self::Buffer,
        source_offset: u64,
        destination: &Self::Buffer,
        destination_offset: u64,
        size: u64,
    );

    fn command_encoder_finish(
        &self,
        encoder: &mut Self::CommandEncoder,
        label: Option<&str>,
    ) -> Self::CommandBuffer;

    // Compute pass
    fn compute_pass_set_pipeline(
        &self,
        pass: &mut Self::ComputePassEncoder,
        pipeline: &Self::ComputePipeline,
    );

    fn compute_pass_set_bind_group(
        &self,
        pass: &mut Self::ComputePassEncoder,
        index: u32,
        group: Option<&Self::BindGroup>,
        dynamic_offsets: &[u32],
    );

    fn compute_pass_dispatch_workgroups(
        &self,
        pass: &mut Self::ComputePassEncoder,
        x: u32,
        y: u32,
        z: u32,
    );

    fn compute_pass_end(&self, pass: &mut Self::ComputePassEncoder);

    // Queue
    fn queue_submit(&self, queue: &Self::Queue, commands: &[Self::CommandBuffer]);

    fn queue_write_buffer(
        &self,
        queue: &Self::Queue,
        buffer: &Self::Buffer,
        offset: u64,
        data: &[u8],
    );

    fn queue_write_texture(
        &self,
        queue: &Self::Queue,
        destination: &TexelCopyTextureInfo<Self>,
        data: &[u8],
        layout: &TexelCopyBufferLayout,
        size: &Extent3d,
    );

    fn queue_on_submitted_work_done(&self, queue: &Self::Queue) -> HostFuture<()>;

    // Render pass
    fn render_pass_begin_occlusion_query(&self, pass: &mut Self::RenderPassEncoder, index: u32);

    fn render_pass_draw(
        &self,
        pass: &mut Self::RenderPassEncoder,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );

    fn render_pass_draw_indexed(
        &self,
        pass: &mut Self::RenderPassEncoder,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    );

    fn render_pass_draw_indexed_indirect(
        &self,
        pass: &mut Self::RenderPassEncoder,
        buffer: &Self::Buffer,
        offset: u64,
    );

    fn render_pass_draw_indirect(
        &self,
        pass: &mut Self::RenderPassEncoder,
        buffer: &Self::Buffer,
        offset: u64,
    );

    fn render_pass_end(&self, pass: &mut Self::RenderPassEncoder);

    fn render_pass_end_occlusion_query(&self, pass: &mut Self::RenderPassEncoder);

    fn render_pass_execute_bundles(
        &self,
        pass: &mut Self::RenderPassEncoder,
        bundles: &[Self::RenderBundle],
    );

    fn render_pass_insert_debug_marker(&self, pass: &mut Self::RenderPassEncoder, label: &str);

    fn render_pass_pop_debug_group(&self, pass: &mut Self::RenderPassEncoder);

    fn render_pass_push_debug_group(&self, pass: &mut Self::RenderPassEncoder, label: &str);

    fn render_pass_set_bind_group(
        &self,
        pass: &mut Self::RenderPassEncoder,
        index: u32,
        group: Option<&Self::BindGroup>,
        dynamic_offsets: &[u32],
    );

    fn render_pass_set_blend_constant(&self, pass: &mut Self::RenderPassEncoder, color: &Color);

    fn render_pass_set_index_buffer(
        &self,
        pass: &mut Self::RenderPassEncoder,
        buffer: &Self::Buffer,
        format: Sym,
        offset: u64,
        size: Option<u64>,
    );

    fn render_pass_set_pipeline(
        &self,
        pass: &mut Self::RenderPassEncoder,
        pipeline: &Self::RenderPipeline,
    );

    fn render_pass_set_scissor_rect(
        &self,
        pass: &mut Self::RenderPassEncoder,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    );

    fn render_pass_set_stencil_reference(&self, pass: &mut Self::RenderPassEncoder, value: u32);

    fn render_pass_set_vertex_buffer(
        &self,
        pass: &mut Self::RenderPassEncoder,
        slot: u32,
        buffer: Option<&Self::Buffer>,
        offset: u64,
        size: Option<u64>,
    );

    #[allow(clippy::too_many_arguments)]
    fn render_pass_set_viewport(
        &self,
        pass: &mut Self::RenderPassEncoder,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        min_depth: f32,
        max_depth: f32,
    );

    // Query set
    fn query_set_destroy(&self, query_set: &Self::QuerySet);

    // Shader module
    fn shader_module_compilation_info(
        &self,
        module: &Self::ShaderModule,
    ) -> HostFuture<Vec<CompilationMessage>>;

    // Surface
    fn surface_configure(
        &self,
        surface: &Self::Surface,
        device: &Self::Device,
        config: &SurfaceConfiguration,
    );

    /// The `TextureFormat` symbol the surface prefers.
    fn surface_preferred_format(
        &self,
        surface: Option<&Self::Surface>,
        adapter: Option<&Self::Adapter>,
    ) -> &'static str;

    fn surface_current_texture(&self, surface: &Self::Surface) -> Result<Self::Texture, HostError>;

    fn surface_present(&self, surface: &Self::Surface);

    fn surface_unconfigure(&self, surface: &Self::Surface);

    // Texture
    fn texture_create_view(
        &self,
        texture: &Self::Texture,
        descriptor: Option<&TextureViewDescriptor>,
    ) -> Self::TextureView;

    fn texture_destroy(&self, texture: &Self::Texture);

    fn texture_info(&self, texture: &Self::Texture) -> TextureInfo;
}
