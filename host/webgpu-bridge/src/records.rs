//! Typed descriptors decoded out of guest memory.
//!
//! Enumerations stay as their WebGPU symbols ([`Sym`], `None` when the guest left the field
//! unset). Handles are already resolved to host objects, so a backend never sees a guest
//! integer.

use std::collections::BTreeMap;

use derive_where::derive_where;

use crate::{GpuBackend, limits::RequiredLimits};

pub type Sym = Option<&'static str>;

/// Pipeline-overridable constants, keyed by name.
pub type Constants = BTreeMap<String, f64>;

// === Basics === //

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Extent3d {
    pub width: u32,
    pub height: u32,
    pub depth_or_array_layers: u32,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Origin3d {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

// === Instance & Device === //

#[derive(Debug, Clone, PartialEq)]
pub struct RequestAdapterOptions {
    pub power_preference: Sym,
    pub force_fallback_adapter: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDescriptor {
    pub label: String,
    pub required_features: Vec<&'static str>,
    pub required_limits: Option<RequiredLimits>,
    pub default_queue_label: String,
}

// === Resources === //

#[derive(Debug, Clone, PartialEq)]
pub struct BufferDescriptor {
    pub label: String,
    pub size: u64,
    pub usage: u64,
    pub mapped_at_creation: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDescriptor {
    pub label: String,
    pub address_mode_u: Sym,
    pub address_mode_v: Sym,
    pub address_mode_w: Sym,
    pub mag_filter: Sym,
    pub min_filter: Sym,
    pub mipmap_filter: Sym,
    pub lod_min_clamp: f32,
    pub lod_max_clamp: f32,
    pub compare: Sym,
    pub max_anisotropy: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShaderModuleDescriptor {
    pub label: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor {
    pub label: String,
    pub size: Extent3d,
    pub mip_level_count: u32,
    pub sample_count: u32,
    pub dimension: Sym,
    pub format: Sym,
    pub usage: u64,
    pub view_formats: Vec<Sym>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureViewDescriptor {
    pub label: String,
    pub format: Sym,
    pub dimension: Sym,
    pub usage: u32,
    pub aspect: Sym,
    pub base_mip_level: u32,
    pub mip_level_count: Option<u32>,
    pub base_array_layer: u32,
    pub array_layer_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuerySetDescriptor {
    pub label: String,
    pub ty: Sym,
    pub count: u32,
}

// === Bind Groups === //

#[derive(Debug, Clone, PartialEq)]
pub struct BindGroupLayoutDescriptor {
    pub label: String,
    pub entries: Vec<BindGroupLayoutEntry>,
}

/// At most one of the binding layouts is normally present. Each one is absent when its type
/// field was left unset.
#[derive(Debug, Clone, PartialEq)]
pub struct BindGroupLayoutEntry {
    pub binding: u32,
    pub visibility: u64,
    pub buffer: Option<BufferBindingLayout>,
    pub sampler: Option<SamplerBindingLayout>,
    pub texture: Option<TextureBindingLayout>,
    pub storage_texture: Option<StorageTextureBindingLayout>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferBindingLayout {
    pub ty: &'static str,
    pub has_dynamic_offset: bool,
    pub min_binding_size: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerBindingLayout {
    pub ty: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureBindingLayout {
    pub sample_type: &'static str,
    pub view_dimension: Sym,
    pub multisampled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageTextureBindingLayout {
    pub access: &'static str,
    pub format: Sym,
    pub view_dimension: Sym,
}

#[derive_where(Debug, Clone)]
pub struct BindGroupDescriptor<B: GpuBackend> {
    pub label: String,
    pub layout: B::BindGroupLayout,
    pub entries: Vec<BindGroupEntry<B>>,
}

#[derive_where(Debug, Clone)]
pub struct BindGroupEntry<B: GpuBackend> {
    pub binding: u32,
    pub resource: BindingResource<B>,
}

#[derive_where(Debug, Clone)]
pub enum BindingResource<B: GpuBackend> {
    Buffer {
        buffer: B::Buffer,
        offset: u64,
        /// `None` binds the rest of the buffer.
        size: Option<u64>,
    },
    Sampler(B::Sampler),
    TextureView(B::TextureView),
}

// === Pipelines === //

#[derive_where(Debug, Clone)]
pub struct PipelineLayoutDescriptor<B: GpuBackend> {
    pub label: String,
    pub bind_group_layouts: Vec<B::BindGroupLayout>,
}

#[derive_where(Debug, Clone)]
pub struct ProgrammableStage<B: GpuBackend> {
    pub module: B::ShaderModule,
    pub entry_point: Option<String>,
    pub constants: Constants,
}

#[derive_where(Debug, Clone)]
pub struct ComputePipelineDescriptor<B: GpuBackend> {
    pub label: String,
    /// `None` requests an automatically derived layout.
    pub layout: Option<B::PipelineLayout>,
    pub compute: ProgrammableStage<B>,
}

#[derive_where(Debug, Clone)]
pub struct RenderPipelineDescriptor<B: GpuBackend> {
    pub label: String,
    /// `None` requests an automatically derived layout.
    pub layout: Option<B::PipelineLayout>,
    pub vertex: VertexState<B>,
    pub primitive: PrimitiveState,
    pub depth_stencil: Option<DepthStencilState>,
    pub multisample: MultisampleState,
    pub fragment: Option<FragmentState<B>>,
}

#[derive_where(Debug, Clone)]
pub struct VertexState<B: GpuBackend> {
    pub module: B::ShaderModule,
    pub entry_point: Option<String>,
    pub constants: Constants,
    pub buffers: Vec<VertexBufferLayout>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VertexBufferLayout {
    pub array_stride: u64,
    pub step_mode: &'static str,
    pub attributes: Vec<VertexAttribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VertexAttribute {
    pub format: Sym,
    pub offset: u64,
    pub shader_location: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveState {
    pub topology: Sym,
    pub strip_index_format: Sym,
    pub front_face: Sym,
    pub cull_mode: Sym,
    pub unclipped_depth: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StencilFaceState {
    pub compare: Sym,
    pub fail_op: Sym,
    pub depth_fail_op: Sym,
    pub pass_op: Sym,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepthStencilState {
    pub format: Sym,
    pub depth_write_enabled: bool,
    pub depth_compare: Sym,
    pub stencil_front: StencilFaceState,
    pub stencil_back: StencilFaceState,
    pub stencil_read_mask: u32,
    pub stencil_write_mask: u32,
    pub depth_bias: i32,
    pub depth_bias_slope_scale: f32,
    pub depth_bias_clamp: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultisampleState {
    pub count: u32,
    pub mask: u32,
    pub alpha_to_coverage_enabled: bool,
}

#[derive_where(Debug, Clone)]
pub struct FragmentState<B: GpuBackend> {
    pub module: B::ShaderModule,
    pub entry_point: Option<String>,
    pub constants: Constants,
    pub targets: Vec<ColorTargetState>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorTargetState {
    pub format: Sym,
    pub blend: Option<BlendState>,
    pub write_mask: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlendState {
    pub color: BlendComponent,
    pub alpha: BlendComponent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlendComponent {
    pub operation: Sym,
    pub src_factor: Sym,
    pub dst_factor: Sym,
}

// === Passes === //

#[derive_where(Debug, Clone)]
pub struct PassTimestampWrites<B: GpuBackend> {
    pub query_set: B::QuerySet,
    pub beginning_of_pass_write_index: u32,
    pub end_of_pass_write_index: u32,
}

#[derive_where(Debug, Clone)]
pub struct RenderPassDescriptor<B: GpuBackend> {
    pub label: String,
    pub color_attachments: Vec<RenderPassColorAttachment<B>>,
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment<B>>,
    pub timestamp_writes: Option<PassTimestampWrites<B>>,
    pub occlusion_query_set: Option<B::QuerySet>,
}

#[derive_where(Debug, Clone)]
pub struct RenderPassColorAttachment<B: GpuBackend> {
    pub view: B::TextureView,
    pub resolve_target: Option<B::TextureView>,
    pub load_op: Sym,
    pub store_op: Sym,
    pub clear_value: Color,
    pub depth_slice: Option<u32>,
}

#[derive_where(Debug, Clone)]
pub struct RenderPassDepthStencilAttachment<B: GpuBackend> {
    pub view: B::TextureView,
    pub depth_load_op: Sym,
    pub depth_store_op: Sym,
    pub depth_clear_value: f32,
    pub depth_read_only: bool,
    pub stencil_load_op: Sym,
    pub stencil_store_op: Sym,
    pub stencil_clear_value: u32,
    pub stencil_read_only: bool,
}

#[derive_where(Debug, Clone)]
pub struct ComputePassDescriptor<B: GpuBackend> {
    pub label: String,
    pub timestamp_writes: Option<PassTimestampWrites<B>>,
}

// === Queue & Surface === //

#[derive_where(Debug, Clone)]
pub struct TexelCopyTextureInfo<B: GpuBackend> {
    pub texture: B::Texture,
    pub mip_level: u32,
    pub origin: Origin3d,
    pub aspect: Sym,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct TexelCopyBufferLayout {
    pub offset: u64,
    pub bytes_per_row: u32,
    pub rows_per_image: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceConfiguration {
    pub usage: u32,
    pub format: Sym,
    pub width: u32,
    pub height: u32,
    pub present_mode: Sym,
    pub desired_maximum_frame_latency: u32,
    pub alpha_mode: Sym,
    pub view_formats: Vec<Sym>,
}
