//! Decoders for every composite argument the guest passes by address.
//!
//! Fields are read strictly in declaration order through a [`StructCursor`]. Optional nested
//! records arrive as pointers, where a null pointer decodes to `None`.

use anyhow::{bail, ensure};
use thiserror::Error;
use wasmlink::{GuestContext, MemoryError, MemoryExt, StructCursor, WordSize, decode_array};

use crate::{
    GpuBackend,
    callback::CallbackRecord,
    enums::{self, EnumTable},
    layouts::Layouts,
    limits::Limits,
    records::*,
    registry::HandleRegistry,
    resources::Registries,
};

pub const DEPTH_SLICE_UNDEFINED: u32 = u32::MAX;

// === UnresolvedHandle === //

/// A descriptor named a handle that does not refer to a live object.
///
/// Entry points treat this as a missing prerequisite and return their neutral result instead of
/// trapping the guest.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("{kind} handle {handle} does not name a live object")]
pub struct UnresolvedHandle {
    pub kind: &'static str,
    pub handle: u32,
}

// === Decoder === //

pub struct Decoder<'a, B: GpuBackend> {
    cx: &'a dyn GuestContext,
    reg: &'a Registries<B>,
    layouts: &'a Layouts,
}

/// A device descriptor together with the callbacks embedded in it.
#[derive(Debug)]
pub struct DecodedDeviceDescriptor {
    pub descriptor: DeviceDescriptor,
    pub device_lost: CallbackRecord,
    pub uncaptured_error: CallbackRecord,
}

impl<'a, B: GpuBackend> Decoder<'a, B> {
    pub fn new(cx: &'a dyn GuestContext, reg: &'a Registries<B>, layouts: &'a Layouts) -> Self {
        Self { cx, reg, layouts }
    }

    fn word(&self) -> WordSize {
        self.layouts.word
    }

    // === Primitives === //

    pub fn string_view(&self, addr: u32) -> Result<String, MemoryError> {
        self.cx.load_string_view(addr, self.word())
    }

    /// A string view where the empty string means "not provided".
    pub fn opt_string_view(&self, addr: u32) -> Result<Option<String>, MemoryError> {
        self.string_view(addr)
            .map(|v| if v.is_empty() { None } else { Some(v) })
    }

    pub fn enumeration(&self, table: &EnumTable, addr: u32) -> Result<Sym, MemoryError> {
        Ok(table.str(self.cx.load_i32(addr)?))
    }

    /// Reads a `(ptr: u32, len: uint)` slice header.
    fn slice(&self, cursor: &mut StructCursor) -> Result<(u32, u64), MemoryError> {
        let ptr = self.cx.load_ptr(cursor.field(4))?;
        let len = self.cx.load_uint(cursor.field(self.word()), self.word())?;
        Ok((ptr, len))
    }

    /// Reads a `(count: uint, ptr: u32)` array header.
    fn counted(&self, cursor: &mut StructCursor) -> Result<(u64, u32), MemoryError> {
        let count = self.cx.load_uint(cursor.field(self.word()), self.word())?;
        let ptr = self.cx.load_ptr(cursor.field(4))?;
        Ok((count, ptr))
    }

    /// Follows a pointer field, returning `None` for null.
    fn follow(&self, cursor: &mut StructCursor) -> Result<Option<u32>, MemoryError> {
        let ptr = self.cx.load_ptr(cursor.field(4))?;
        Ok((ptr != 0).then_some(ptr))
    }

    pub fn resolve<T: Clone>(
        &self,
        reg: &HandleRegistry<T>,
        handle: u32,
    ) -> Result<T, UnresolvedHandle> {
        reg.get(handle).cloned().ok_or(UnresolvedHandle {
            kind: reg.kind(),
            handle,
        })
    }

    /// Resolves a handle where zero means "none". Stale handles are treated the same way.
    pub fn resolve_opt<T: Clone>(&self, reg: &HandleRegistry<T>, handle: u32) -> Option<T> {
        if handle == 0 {
            return None;
        }

        let object = reg.get(handle).cloned();
        if object.is_none() {
            tracing::debug!(kind = reg.kind(), handle, "optional handle is not live");
        }
        object
    }

    fn resolve_buffer(&self, handle: u32) -> Result<B::Buffer, UnresolvedHandle> {
        self.reg
            .buffers
            .get(handle)
            .map(|entry| entry.buffer.clone())
            .ok_or(UnresolvedHandle {
                kind: self.reg.buffers.kind(),
                handle,
            })
    }

    /// Decodes an array of 32-bit handles, all of which must resolve.
    pub fn handle_array<T: Clone>(
        &self,
        reg: &HandleRegistry<T>,
        count: u64,
        start: u32,
    ) -> anyhow::Result<Vec<T>> {
        decode_array(count, start, 4, |addr| {
            Ok(self.resolve(reg, self.cx.load_ptr(addr)?)?)
        })
    }

    pub fn u32_array(&self, count: u64, start: u32) -> anyhow::Result<Vec<u32>> {
        decode_array(count, start, 4, |addr| Ok(self.cx.load_u32(addr)?))
    }

    fn enum_array(&self, table: &EnumTable, count: u64, start: u32) -> anyhow::Result<Vec<Sym>> {
        decode_array(count, start, 4, |addr| Ok(self.enumeration(table, addr)?))
    }

    // === Basics === //

    pub fn color(&self, start: u32) -> Result<Color, MemoryError> {
        let mut off = StructCursor::required(start, "color")?;

        Ok(Color {
            r: self.cx.load_f64(off.field(8))?,
            g: self.cx.load_f64(off.field(8))?,
            b: self.cx.load_f64(off.field(8))?,
            a: self.cx.load_f64(off.field(8))?,
        })
    }

    pub fn extent_3d(&self, start: u32) -> Result<Extent3d, MemoryError> {
        let mut off = StructCursor::required(start, "extent")?;

        Ok(Extent3d {
            width: self.cx.load_u32(off.field(4))?,
            height: self.cx.load_u32(off.field(4))?,
            depth_or_array_layers: self.cx.load_u32(off.field(4))?,
        })
    }

    pub fn origin_3d(&self, start: u32) -> Result<Origin3d, MemoryError> {
        let mut off = StructCursor::new(start);

        Ok(Origin3d {
            x: self.cx.load_u32(off.field(4))?,
            y: self.cx.load_u32(off.field(4))?,
            z: self.cx.load_u32(off.field(4))?,
        })
    }

    /// Folds `{ reserved, key, value }` entries into a map. Later keys win.
    fn constants(&self, count: u64, start: u32) -> anyhow::Result<Constants> {
        let entries = decode_array(count, start, self.layouts.constant_entry.size, |addr| {
            let mut off = StructCursor::new(addr);
            off.skip(4);
            let key = self.string_view(off.field(self.layouts.string_view))?;
            let value = self.cx.load_f64(off.field(8))?;
            Ok((key, value))
        })?;

        Ok(entries.into_iter().collect())
    }

    // === Instance & Device === //

    pub fn request_adapter_options(
        &self,
        start: u32,
    ) -> Result<Option<RequestAdapterOptions>, MemoryError> {
        if start == 0 {
            return Ok(None);
        }

        let mut off = StructCursor::new(start);

        Ok(Some(RequestAdapterOptions {
            power_preference: self.enumeration(&enums::POWER_PREFERENCE, off.field(4))?,
            force_fallback_adapter: self.cx.load_b32(off.field(4))?,
        }))
    }

    pub fn device_descriptor(&self, start: u32) -> anyhow::Result<Option<DecodedDeviceDescriptor>> {
        if start == 0 {
            return Ok(None);
        }

        let mut off = StructCursor::new(start);
        let label = self.string_view(off.field(self.layouts.string_view))?;

        let (count, ptr) = self.counted(&mut off)?;
        let required_features = decode_array(count, ptr, 4, |addr| {
            let ordinal = self.cx.load_i32(addr)?;
            let name = enums::FEATURE_NAME.str(ordinal);
            if name.is_none() {
                tracing::debug!(ordinal, "ignoring unknown required feature");
            }
            Ok(name)
        })?
        .into_iter()
        .flatten()
        .collect();

        let required_limits = match self.follow(&mut off)? {
            Some(limits) => Some(Limits::decode_required(self.cx, limits)?),
            None => None,
        };

        let default_queue_label = self.string_view(off.field(self.layouts.queue_descriptor))?;
        let device_lost = CallbackRecord::decode(self.cx, off.field(self.layouts.callback_info))?;
        let uncaptured_error =
            CallbackRecord::decode(self.cx, off.field(self.layouts.callback_info))?;

        Ok(Some(DecodedDeviceDescriptor {
            descriptor: DeviceDescriptor {
                label,
                required_features,
                required_limits,
                default_queue_label,
            },
            device_lost,
            uncaptured_error,
        }))
    }

    // === Resources === //

    pub fn buffer_descriptor(&self, start: u32) -> Result<BufferDescriptor, MemoryError> {
        let mut off = StructCursor::required(start, "buffer descriptor")?;

        Ok(BufferDescriptor {
            label: self.string_view(off.field(self.layouts.string_view))?,
            size: self.cx.load_u64(off.field(8))?,
            usage: self.cx.load_u64(off.field(8))?,
            mapped_at_creation: self.cx.load_b32(off.field(4))?,
        })
    }

    pub fn sampler_descriptor(&self, start: u32) -> Result<Option<SamplerDescriptor>, MemoryError> {
        if start == 0 {
            return Ok(None);
        }

        let mut off = StructCursor::new(start);

        Ok(Some(SamplerDescriptor {
            label: self.string_view(off.field(self.layouts.string_view))?,
            address_mode_u: self.enumeration(&enums::ADDRESS_MODE, off.field(4))?,
            address_mode_v: self.enumeration(&enums::ADDRESS_MODE, off.field(4))?,
            address_mode_w: self.enumeration(&enums::ADDRESS_MODE, off.field(4))?,
            mag_filter: self.enumeration(&enums::FILTER_MODE, off.field(4))?,
            min_filter: self.enumeration(&enums::FILTER_MODE, off.field(4))?,
            mipmap_filter: self.enumeration(&enums::MIPMAP_FILTER_MODE, off.field(4))?,
            lod_min_clamp: self.cx.load_f32(off.field(4))?,
            lod_max_clamp: self.cx.load_f32(off.field(4))?,
            compare: self.enumeration(&enums::COMPARE_FUNCTION, off.field(4))?,
            max_anisotropy: self.cx.load_u16(off.field(2))?,
        }))
    }

    pub fn shader_module_descriptor(
        &self,
        start: u32,
    ) -> Result<ShaderModuleDescriptor, MemoryError> {
        let mut off = StructCursor::required(start, "shader module descriptor")?;

        Ok(ShaderModuleDescriptor {
            label: self.string_view(off.field(self.layouts.string_view))?,
            code: self.string_view(off.field(self.layouts.string_view))?,
        })
    }

    pub fn texture_descriptor(&self, start: u32) -> anyhow::Result<TextureDescriptor> {
        let mut off = StructCursor::required(start, "texture descriptor")?;

        let label = self.string_view(off.field(self.layouts.string_view))?;
        let size = self.extent_3d(off.field(self.layouts.extent_3d))?;
        let mip_level_count = self.cx.load_u32(off.field(4))?;
        let sample_count = self.cx.load_u32(off.field(4))?;
        let dimension = self.enumeration(&enums::TEXTURE_DIMENSION, off.field(4))?;
        let format = self.enumeration(&enums::TEXTURE_FORMAT, off.field(4))?;
        let usage = self.cx.load_u64(off.field(8))?;
        let (count, ptr) = self.counted(&mut off)?;
        let view_formats = self.enum_array(&enums::TEXTURE_FORMAT, count, ptr)?;

        Ok(TextureDescriptor {
            label,
            size,
            mip_level_count,
            sample_count,
            dimension,
            format,
            usage,
            view_formats,
        })
    }

    pub fn texture_view_descriptor(
        &self,
        start: u32,
    ) -> Result<Option<TextureViewDescriptor>, MemoryError> {
        if start == 0 {
            return Ok(None);
        }

        let mut off = StructCursor::new(start);
        let nonzero = |v: u32| (v != 0).then_some(v);

        Ok(Some(TextureViewDescriptor {
            label: self.string_view(off.field(self.layouts.string_view))?,
            format: self.enumeration(&enums::TEXTURE_FORMAT, off.field(4))?,
            dimension: self.enumeration(&enums::TEXTURE_VIEW_DIMENSION, off.field(4))?,
            usage: self.cx.load_u32(off.field(4))?,
            aspect: self.enumeration(&enums::TEXTURE_ASPECT, off.field(4))?,
            base_mip_level: self.cx.load_u32(off.field(4))?,
            mip_level_count: nonzero(self.cx.load_u32(off.field(4))?),
            base_array_layer: self.cx.load_u32(off.field(4))?,
            array_layer_count: nonzero(self.cx.load_u32(off.field(4))?),
        }))
    }

    pub fn query_set_descriptor(&self, start: u32) -> Result<QuerySetDescriptor, MemoryError> {
        let mut off = StructCursor::required(start, "query set descriptor")?;

        Ok(QuerySetDescriptor {
            label: self.string_view(off.field(self.layouts.string_view))?,
            ty: self.enumeration(&enums::QUERY_TYPE, off.field(4))?,
            count: self.cx.load_u32(off.field(4))?,
        })
    }

    /// Descriptors that hold nothing but a label after a reserved word.
    pub fn label_descriptor(&self, start: u32) -> Result<Option<String>, MemoryError> {
        if start == 0 {
            return Ok(None);
        }

        let mut off = StructCursor::new(start);
        off.skip(4);
        self.opt_string_view(off.field(self.layouts.string_view))
    }

    // === Bind Groups === //

    pub fn bind_group_layout_descriptor(
        &self,
        start: u32,
    ) -> anyhow::Result<BindGroupLayoutDescriptor> {
        let mut off = StructCursor::required(start, "bind group layout descriptor")?;
        let label = self.string_view(off.field(self.layouts.string_view))?;
        let (count, ptr) = self.counted(&mut off)?;

        Ok(BindGroupLayoutDescriptor {
            label,
            entries: decode_array(count, ptr, self.layouts.bind_group_layout_entry.size, |addr| {
                Ok(self.bind_group_layout_entry(addr)?)
            })?,
        })
    }

    fn bind_group_layout_entry(&self, start: u32) -> Result<BindGroupLayoutEntry, MemoryError> {
        let mut off = StructCursor::new(start);
        let binding = self.cx.load_u32(off.field(4))?;
        let visibility = self.cx.load_u64(off.field(8))?;

        let buffer = off.field(self.layouts.buffer_binding_layout);
        let buffer = self
            .enumeration(&enums::BUFFER_BINDING_TYPE, buffer)?
            .map(|ty| {
                Ok::<_, MemoryError>(BufferBindingLayout {
                    ty,
                    has_dynamic_offset: self.cx.load_u8(buffer + 4)? != 0,
                    min_binding_size: self.cx.load_u64(buffer + 8)?,
                })
            })
            .transpose()?;

        let sampler = off.field(self.layouts.sampler_binding_layout);
        let sampler = self
            .enumeration(&enums::SAMPLER_BINDING_TYPE, sampler)?
            .map(|ty| SamplerBindingLayout { ty });

        let texture = off.field(self.layouts.texture_binding_layout);
        let texture = self
            .enumeration(&enums::TEXTURE_SAMPLE_TYPE, texture)?
            .map(|sample_type| {
                Ok::<_, MemoryError>(TextureBindingLayout {
                    sample_type,
                    view_dimension: self
                        .enumeration(&enums::TEXTURE_VIEW_DIMENSION, texture + 4)?,
                    multisampled: self.cx.load_b32(texture + 8)?,
                })
            })
            .transpose()?;

        let storage = off.field(self.layouts.storage_texture_binding_layout);
        let storage_texture = self
            .enumeration(&enums::STORAGE_TEXTURE_ACCESS, storage)?
            .map(|access| {
                Ok::<_, MemoryError>(StorageTextureBindingLayout {
                    access,
                    format: self.enumeration(&enums::TEXTURE_FORMAT, storage + 4)?,
                    view_dimension: self
                        .enumeration(&enums::TEXTURE_VIEW_DIMENSION, storage + 8)?,
                })
            })
            .transpose()?;

        Ok(BindGroupLayoutEntry {
            binding,
            visibility,
            buffer,
            sampler,
            texture,
            storage_texture,
        })
    }

    pub fn bind_group_descriptor(&self, start: u32) -> anyhow::Result<BindGroupDescriptor<B>> {
        let mut off = StructCursor::required(start, "bind group descriptor")?;
        let label = self.string_view(off.field(self.layouts.string_view))?;
        let layout = self.resolve(&self.reg.bind_group_layouts, self.cx.load_ptr(off.field(4))?)?;
        let (count, ptr) = self.counted(&mut off)?;

        Ok(BindGroupDescriptor {
            label,
            layout,
            entries: decode_array(count, ptr, self.layouts.bind_group_entry.size, |addr| {
                self.bind_group_entry(addr)
            })?,
        })
    }

    /// The first nonzero of buffer, sampler and texture view selects the resource.
    fn bind_group_entry(&self, start: u32) -> anyhow::Result<BindGroupEntry<B>> {
        let binding = self.cx.load_u32(start)?;
        let buffer = self.cx.load_ptr(start + 4)?;
        let offset = self.cx.load_u64(start + 8)?;
        let size = self.cx.load_u64(start + 16)?;
        let sampler = self.cx.load_ptr(start + 24)?;
        let texture_view = self.cx.load_ptr(start + 28)?;

        let resource = if buffer != 0 {
            BindingResource::Buffer {
                buffer: self.resolve_buffer(buffer)?,
                offset,
                size: (size != crate::WHOLE_SIZE).then_some(size),
            }
        } else if sampler != 0 {
            BindingResource::Sampler(self.resolve(&self.reg.samplers, sampler)?)
        } else if texture_view != 0 {
            BindingResource::TextureView(self.resolve(&self.reg.texture_views, texture_view)?)
        } else {
            bail!("bind group entry {binding} names no resource");
        };

        Ok(BindGroupEntry { binding, resource })
    }

    // === Pipelines === //

    pub fn pipeline_layout_descriptor(
        &self,
        start: u32,
    ) -> anyhow::Result<PipelineLayoutDescriptor<B>> {
        let mut off = StructCursor::required(start, "pipeline layout descriptor")?;
        let label = self.string_view(off.field(self.layouts.string_view))?;
        let (count, ptr) = self.counted(&mut off)?;

        Ok(PipelineLayoutDescriptor {
            label,
            bind_group_layouts: self.handle_array(&self.reg.bind_group_layouts, count, ptr)?,
        })
    }

    pub fn render_pipeline_descriptor(
        &self,
        start: u32,
    ) -> anyhow::Result<RenderPipelineDescriptor<B>> {
        let mut off = StructCursor::required(start, "render pipeline descriptor")?;

        let label = self.string_view(off.field(self.layouts.string_view))?;
        let layout = self.pipeline_layout(off.field(4))?;
        let vertex = self.vertex_state(off.field(self.layouts.vertex_state))?;
        let primitive = self.primitive_state(off.field(self.layouts.primitive_state))?;
        let depth_stencil = match self.follow(&mut off)? {
            Some(ptr) => Some(self.depth_stencil_state(ptr)?),
            None => None,
        };
        let multisample = self.multisample_state(off.field(self.layouts.multisample_state))?;
        let fragment = match self.follow(&mut off)? {
            Some(ptr) => Some(self.fragment_state(ptr)?),
            None => None,
        };

        Ok(RenderPipelineDescriptor {
            label,
            layout,
            vertex,
            primitive,
            depth_stencil,
            multisample,
            fragment,
        })
    }

    pub fn compute_pipeline_descriptor(
        &self,
        start: u32,
    ) -> anyhow::Result<ComputePipelineDescriptor<B>> {
        let mut off = StructCursor::required(start, "compute pipeline descriptor")?;

        let label = self.string_view(off.field(self.layouts.string_view))?;
        let layout = self.pipeline_layout(off.field(4))?;
        let compute = self.programmable_stage(off.field(self.layouts.programmable_stage))?;

        Ok(ComputePipelineDescriptor {
            label,
            layout,
            compute,
        })
    }

    /// Zero requests an automatic layout.
    fn pipeline_layout(&self, addr: u32) -> anyhow::Result<Option<B::PipelineLayout>> {
        match self.cx.load_ptr(addr)? {
            0 => Ok(None),
            handle => Ok(Some(self.resolve(&self.reg.pipeline_layouts, handle)?)),
        }
    }

    fn programmable_stage(&self, start: u32) -> anyhow::Result<ProgrammableStage<B>> {
        let mut off = StructCursor::new(start);
        off.skip(4);

        let module = self.resolve(&self.reg.shader_modules, self.cx.load_ptr(off.field(4))?)?;
        let entry_point = self.opt_string_view(off.field(self.layouts.string_view))?;
        let (ptr, len) = self.slice(&mut off)?;

        Ok(ProgrammableStage {
            module,
            entry_point,
            constants: self.constants(len, ptr)?,
        })
    }

    fn vertex_state(&self, start: u32) -> anyhow::Result<VertexState<B>> {
        let mut off = StructCursor::new(start);

        let module = self.resolve(&self.reg.shader_modules, self.cx.load_ptr(off.field(4))?)?;
        let entry_point = self.opt_string_view(off.field(self.layouts.string_view))?;
        let (constants_ptr, constants_len) = self.slice(&mut off)?;
        let (buffers_ptr, buffers_len) = self.slice(&mut off)?;

        Ok(VertexState {
            module,
            entry_point,
            constants: self.constants(constants_len, constants_ptr)?,
            buffers: decode_array(
                buffers_len,
                buffers_ptr,
                self.layouts.vertex_buffer_layout.size,
                |addr| self.vertex_buffer_layout(addr),
            )?,
        })
    }

    fn vertex_buffer_layout(&self, start: u32) -> anyhow::Result<VertexBufferLayout> {
        let mut off = StructCursor::new(start);

        let array_stride = self.cx.load_u64(off.field(8))?;
        let step_mode = match self.cx.load_u32(off.field(4))? {
            1 => "vertex",
            2 => "instance",
            other => bail!("invalid vertex step mode {other}"),
        };
        let (ptr, len) = self.slice(&mut off)?;

        Ok(VertexBufferLayout {
            array_stride,
            step_mode,
            attributes: decode_array(len, ptr, self.layouts.vertex_attribute.size, |addr| {
                let mut off = StructCursor::new(addr);
                Ok(VertexAttribute {
                    format: self.enumeration(&enums::VERTEX_FORMAT, off.field(4))?,
                    offset: self.cx.load_u64(off.field(8))?,
                    shader_location: self.cx.load_u32(off.field(4))?,
                })
            })?,
        })
    }

    fn primitive_state(&self, start: u32) -> Result<PrimitiveState, MemoryError> {
        let mut off = StructCursor::new(start);

        // Trailing polygon mode and conservative flags are not forwarded.
        Ok(PrimitiveState {
            topology: self.enumeration(&enums::PRIMITIVE_TOPOLOGY, off.field(4))?,
            strip_index_format: self.enumeration(&enums::INDEX_FORMAT, off.field(4))?,
            front_face: self.enumeration(&enums::FRONT_FACE, off.field(4))?,
            cull_mode: self.enumeration(&enums::CULL_MODE, off.field(4))?,
            unclipped_depth: self.cx.load_b32(off.field(4))?,
        })
    }

    fn stencil_face_state(&self, start: u32) -> Result<StencilFaceState, MemoryError> {
        Ok(StencilFaceState {
            compare: self.enumeration(&enums::COMPARE_FUNCTION, start)?,
            fail_op: self.enumeration(&enums::STENCIL_OPERATION, start + 4)?,
            depth_fail_op: self.enumeration(&enums::STENCIL_OPERATION, start + 8)?,
            pass_op: self.enumeration(&enums::STENCIL_OPERATION, start + 12)?,
        })
    }

    fn depth_stencil_state(&self, start: u32) -> Result<DepthStencilState, MemoryError> {
        let mut off = StructCursor::new(start);

        let format = self.enumeration(&enums::TEXTURE_FORMAT, off.field(4))?;
        let depth_write_enabled = self.cx.load_b32(off.field(4))?;
        let depth_compare = self.enumeration(&enums::COMPARE_FUNCTION, off.field(4))?;

        let stencil = off.field(self.layouts.stencil_state);
        let face = self.layouts.stencil_face_state.size;
        let bias = off.field(self.layouts.depth_bias_state);

        Ok(DepthStencilState {
            format,
            depth_write_enabled,
            depth_compare,
            stencil_front: self.stencil_face_state(stencil)?,
            stencil_back: self.stencil_face_state(stencil + face)?,
            stencil_read_mask: self.cx.load_u32(stencil + 2 * face)?,
            stencil_write_mask: self.cx.load_u32(stencil + 2 * face + 4)?,
            depth_bias: self.cx.load_i32(bias)?,
            depth_bias_slope_scale: self.cx.load_f32(bias + 4)?,
            depth_bias_clamp: self.cx.load_f32(bias + 8)?,
        })
    }

    fn multisample_state(&self, start: u32) -> Result<MultisampleState, MemoryError> {
        let mut off = StructCursor::new(start);

        Ok(MultisampleState {
            count: self.cx.load_u32(off.field(4))?,
            mask: self.cx.load_u32(off.field(4))?,
            alpha_to_coverage_enabled: self.cx.load_b32(off.field(4))?,
        })
    }

    fn fragment_state(&self, start: u32) -> anyhow::Result<FragmentState<B>> {
        let mut off = StructCursor::new(start);

        let module = self.resolve(&self.reg.shader_modules, self.cx.load_ptr(off.field(4))?)?;
        let entry_point = self.opt_string_view(off.field(self.layouts.string_view))?;
        let (constants_ptr, constants_len) = self.slice(&mut off)?;
        let (targets_ptr, targets_len) = self.slice(&mut off)?;

        Ok(FragmentState {
            module,
            entry_point,
            constants: self.constants(constants_len, constants_ptr)?,
            targets: decode_array(
                targets_len,
                targets_ptr,
                self.layouts.color_target_state.size,
                |addr| Ok(self.color_target_state(addr)?),
            )?,
        })
    }

    fn color_target_state(&self, start: u32) -> Result<ColorTargetState, MemoryError> {
        let mut off = StructCursor::new(start);

        let format = self.enumeration(&enums::TEXTURE_FORMAT, off.field(4))?;
        let blend = match self.follow(&mut off)? {
            Some(ptr) => {
                let mut blend = StructCursor::new(ptr);
                Some(BlendState {
                    color: self.blend_component(blend.field(self.layouts.blend_component))?,
                    alpha: self.blend_component(blend.field(self.layouts.blend_component))?,
                })
            }
            None => None,
        };
        let write_mask = self.cx.load_u64(off.field(8))?;

        Ok(ColorTargetState {
            format,
            blend,
            write_mask,
        })
    }

    fn blend_component(&self, start: u32) -> Result<BlendComponent, MemoryError> {
        Ok(BlendComponent {
            operation: self.enumeration(&enums::BLEND_OPERATION, start)?,
            src_factor: self.enumeration(&enums::BLEND_FACTOR, start + 4)?,
            dst_factor: self.enumeration(&enums::BLEND_FACTOR, start + 8)?,
        })
    }

    // === Passes === //

    pub fn render_pass_descriptor(&self, start: u32) -> anyhow::Result<RenderPassDescriptor<B>> {
        let mut off = StructCursor::required(start, "render pass descriptor")?;

        let label = self.string_view(off.field(self.layouts.string_view))?;
        let (ptr, len) = self.slice(&mut off)?;
        let color_attachments = decode_array(
            len,
            ptr,
            self.layouts.render_pass_color_attachment.size,
            |addr| self.render_pass_color_attachment(addr),
        )?;
        let depth_stencil_attachment = match self.follow(&mut off)? {
            Some(ptr) => self.render_pass_depth_stencil_attachment(ptr)?,
            None => None,
        };
        let timestamp_writes = match self.follow(&mut off)? {
            Some(ptr) => self.timestamp_writes(ptr)?,
            None => None,
        };
        let occlusion_query_set =
            self.resolve_opt(&self.reg.query_sets, self.cx.load_ptr(off.field(4))?);

        Ok(RenderPassDescriptor {
            label,
            color_attachments,
            depth_stencil_attachment,
            timestamp_writes,
            occlusion_query_set,
        })
    }

    fn render_pass_color_attachment(
        &self,
        start: u32,
    ) -> anyhow::Result<RenderPassColorAttachment<B>> {
        let mut off = StructCursor::new(start);

        let view = self.cx.load_ptr(off.field(4))?;
        ensure!(view != 0, "color attachment has no texture view");
        let view = self.resolve(&self.reg.texture_views, view)?;
        let resolve_target =
            self.resolve_opt(&self.reg.texture_views, self.cx.load_ptr(off.field(4))?);
        let load_op = self.enumeration(&enums::LOAD_OP, off.field(4))?;
        let store_op = self.enumeration(&enums::STORE_OP, off.field(4))?;
        let clear_value = self.color(off.field(self.layouts.color))?;
        let depth_slice = match self.cx.load_u32(off.field(4))? {
            0 | DEPTH_SLICE_UNDEFINED => None,
            slice => Some(slice),
        };

        Ok(RenderPassColorAttachment {
            view,
            resolve_target,
            load_op,
            store_op,
            clear_value,
            depth_slice,
        })
    }

    fn render_pass_depth_stencil_attachment(
        &self,
        start: u32,
    ) -> anyhow::Result<Option<RenderPassDepthStencilAttachment<B>>> {
        let mut off = StructCursor::new(start);

        let view = match self.cx.load_ptr(off.field(4))? {
            0 => return Ok(None),
            view => self.resolve(&self.reg.texture_views, view)?,
        };

        Ok(Some(RenderPassDepthStencilAttachment {
            view,
            depth_load_op: self.enumeration(&enums::LOAD_OP, off.field(4))?,
            depth_store_op: self.enumeration(&enums::STORE_OP, off.field(4))?,
            depth_clear_value: self.cx.load_f32(off.field(4))?,
            depth_read_only: self.cx.load_b32(off.field(4))?,
            stencil_load_op: self.enumeration(&enums::LOAD_OP, off.field(4))?,
            stencil_store_op: self.enumeration(&enums::STORE_OP, off.field(4))?,
            stencil_clear_value: self.cx.load_u32(off.field(4))?,
            stencil_read_only: self.cx.load_b32(off.field(4))?,
        }))
    }

    /// A null query set drops the whole record.
    fn timestamp_writes(&self, start: u32) -> Result<Option<PassTimestampWrites<B>>, MemoryError> {
        let mut off = StructCursor::new(start);

        let Some(query_set) =
            self.resolve_opt(&self.reg.query_sets, self.cx.load_ptr(off.field(4))?)
        else {
            return Ok(None);
        };

        Ok(Some(PassTimestampWrites {
            query_set,
            beginning_of_pass_write_index: self.cx.load_u32(off.field(4))?,
            end_of_pass_write_index: self.cx.load_u32(off.field(4))?,
        }))
    }

    pub fn compute_pass_descriptor(
        &self,
        start: u32,
    ) -> Result<Option<ComputePassDescriptor<B>>, MemoryError> {
        if start == 0 {
            return Ok(None);
        }

        let mut off = StructCursor::new(start);
        let label = self.string_view(off.field(self.layouts.string_view))?;
        let timestamp_writes = match self.follow(&mut off)? {
            Some(ptr) => self.timestamp_writes(ptr)?,
            None => None,
        };

        Ok(Some(ComputePassDescriptor {
            label,
            timestamp_writes,
        }))
    }

    // === Queue & Surface === //

    pub fn texel_copy_texture_info(
        &self,
        start: u32,
    ) -> anyhow::Result<TexelCopyTextureInfo<B>> {
        let mut off = StructCursor::required(start, "texel copy texture info")?;

        Ok(TexelCopyTextureInfo {
            texture: self.resolve(&self.reg.textures, self.cx.load_ptr(off.field(4))?)?,
            mip_level: self.cx.load_u32(off.field(4))?,
            origin: self.origin_3d(off.field(self.layouts.origin_3d))?,
            aspect: self.enumeration(&enums::TEXTURE_ASPECT, off.field(4))?,
        })
    }

    pub fn texel_copy_buffer_layout(
        &self,
        start: u32,
    ) -> Result<TexelCopyBufferLayout, MemoryError> {
        let mut off = StructCursor::required(start, "texel copy buffer layout")?;

        Ok(TexelCopyBufferLayout {
            offset: self.cx.load_u64(off.field(8))?,
            bytes_per_row: self.cx.load_u32(off.field(4))?,
            rows_per_image: self.cx.load_u32(off.field(4))?,
        })
    }

    pub fn surface_configuration(&self, start: u32) -> anyhow::Result<SurfaceConfiguration> {
        let mut off = StructCursor::required(start, "surface configuration")?;

        let usage = self.cx.load_u32(off.field(4))?;
        let format = self.enumeration(&enums::TEXTURE_FORMAT, off.field(4))?;
        let width = self.cx.load_u32(off.field(4))?;
        let height = self.cx.load_u32(off.field(4))?;
        let present_mode = self.enumeration(&enums::PRESENT_MODE, off.field(4))?;
        let desired_maximum_frame_latency = self.cx.load_u32(off.field(4))?;
        let alpha_mode = match self.enumeration(&enums::COMPOSITE_ALPHA_MODE, off.field(4))? {
            Some("auto") => Some("opaque"),
            other => other,
        };
        let (ptr, len) = self.slice(&mut off)?;

        Ok(SurfaceConfiguration {
            usage,
            format,
            width,
            height,
            present_mode,
            desired_maximum_frame_latency,
            alpha_mode,
            view_formats: self.enum_array(&enums::TEXTURE_FORMAT, len, ptr)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use wasmlink::VecGuest;

    use super::*;
    use crate::{
        resources::BufferEntry,
        testing::{MockBackend, MockObject},
    };

    struct Fixture {
        guest: VecGuest,
        reg: Registries<MockBackend>,
        layouts: Layouts,
    }

    impl Fixture {
        fn new(word: WordSize) -> Self {
            Self {
                guest: VecGuest::new(4096),
                reg: Registries::default(),
                layouts: Layouts::new(word),
            }
        }

        fn decoder(&self) -> Decoder<'_, MockBackend> {
            Decoder::new(&self.guest, &self.reg, &self.layouts)
        }

        fn text(&mut self, addr: u32, text: &str) -> (u32, u64) {
            self.guest.write_bytes(addr, text.as_bytes()).unwrap();
            (addr, text.len() as u64)
        }
    }

    fn mock(kind: &'static str) -> MockObject {
        MockObject::new(1, kind, "")
    }

    #[test]
    fn buffer_descriptor_narrow_word() {
        let mut fx = Fixture::new(WordSize::Four);
        let (data, len) = fx.text(2048, "verts");
        fx.guest.store_u32(64, data).unwrap();
        fx.guest.store_u32(68, len as u32).unwrap();
        fx.guest.store_u64(72, 256).unwrap();
        fx.guest.store_u64(80, 0x28).unwrap();
        fx.guest.store_b32(88, true).unwrap();

        let desc = fx.decoder().buffer_descriptor(64).unwrap();
        assert_eq!(
            desc,
            BufferDescriptor {
                label: "verts".into(),
                size: 256,
                usage: 0x28,
                mapped_at_creation: true,
            }
        );
    }

    #[test]
    fn buffer_descriptor_wide_word() {
        let mut fx = Fixture::new(WordSize::Eight);
        let (data, len) = fx.text(2048, "verts");
        fx.guest.store_u32(64, data).unwrap();
        fx.guest.store_u64(72, len).unwrap();
        fx.guest.store_u64(80, 1024).unwrap();
        fx.guest.store_u64(88, 0x80).unwrap();
        fx.guest.store_b32(96, false).unwrap();

        let desc = fx.decoder().buffer_descriptor(64).unwrap();
        assert_eq!(desc.label, "verts");
        assert_eq!(desc.size, 1024);
        assert_eq!(desc.usage, 0x80);
        assert!(!desc.mapped_at_creation);
    }

    #[test]
    fn required_descriptor_rejects_null() {
        let fx = Fixture::new(WordSize::Four);
        let err = fx.decoder().buffer_descriptor(0).unwrap_err();
        assert!(matches!(err, MemoryError::NullAddress { .. }));
    }

    #[test]
    fn label_descriptor_skips_reserved_word() {
        let mut fx = Fixture::new(WordSize::Eight);
        let (data, len) = fx.text(2048, "frame");
        fx.guest.store_u32(72, data).unwrap();
        fx.guest.store_u64(80, len).unwrap();

        let decoder = fx.decoder();
        assert_eq!(decoder.label_descriptor(64).unwrap().as_deref(), Some("frame"));
        assert_eq!(decoder.label_descriptor(0).unwrap(), None);
        assert_eq!(decoder.label_descriptor(256).unwrap(), None);
    }

    #[test]
    fn device_descriptor_drops_unknown_features() {
        let mut fx = Fixture::new(WordSize::Four);
        fx.guest.store_u32(72, 3).unwrap();
        fx.guest.store_u32(76, 256).unwrap();
        fx.guest.store_u32(92, 5).unwrap();
        fx.guest.store_u32(96, 6).unwrap();
        fx.guest.store_u32(100, 7).unwrap();
        fx.guest.store_u32(108, 8).unwrap();

        let timestamps = enums::FEATURE_NAME.ordinal("timestamp-query");
        let clip = enums::FEATURE_NAME.ordinal("depth-clip-control");
        fx.guest.store_u32(256, timestamps).unwrap();
        fx.guest.store_u32(260, 9999).unwrap();
        fx.guest.store_u32(264, clip).unwrap();

        let decoded = fx.decoder().device_descriptor(64).unwrap().unwrap();
        assert_eq!(
            decoded.descriptor.required_features,
            ["timestamp-query", "depth-clip-control"]
        );
        assert_eq!(decoded.descriptor.required_limits, None);
        assert_eq!(
            decoded.device_lost,
            CallbackRecord {
                func: 5,
                userdata1: 6,
                userdata2: 7,
            }
        );
        assert_eq!(decoded.uncaptured_error.func, 8);

        assert!(fx.decoder().device_descriptor(0).unwrap().is_none());
    }

    #[test]
    fn stale_layout_is_unresolved() {
        let mut fx = Fixture::new(WordSize::Four);
        fx.guest.store_u32(72, 7).unwrap();

        let err = fx.decoder().bind_group_descriptor(64).unwrap_err();
        assert_eq!(
            err.downcast_ref::<UnresolvedHandle>(),
            Some(&UnresolvedHandle {
                kind: "BindGroupLayout",
                handle: 7,
            })
        );
    }

    #[test]
    fn bind_group_entry_without_resource_is_an_error() {
        let mut fx = Fixture::new(WordSize::Four);
        let layout = fx.reg.bind_group_layouts.create(mock("BindGroupLayout"));
        fx.guest.store_u32(72, layout).unwrap();
        fx.guest.store_u32(76, 1).unwrap();
        fx.guest.store_u32(80, 256).unwrap();
        fx.guest.store_u32(256, 3).unwrap();

        let err = fx.decoder().bind_group_descriptor(64).unwrap_err();
        assert!(err.downcast_ref::<UnresolvedHandle>().is_none());
        assert!(err.to_string().contains("names no resource"));
    }

    #[test]
    fn bind_group_buffer_whole_size() {
        let mut fx = Fixture::new(WordSize::Four);
        let layout = fx.reg.bind_group_layouts.create(mock("BindGroupLayout"));
        let buffer = fx.reg.buffers.create(BufferEntry::new(mock("Buffer")));
        fx.guest.store_u32(72, layout).unwrap();
        fx.guest.store_u32(76, 1).unwrap();
        fx.guest.store_u32(80, 256).unwrap();
        fx.guest.store_u32(256, 2).unwrap();
        fx.guest.store_u32(260, buffer).unwrap();
        fx.guest.store_u64(264, 16).unwrap();
        fx.guest.store_u64(272, crate::WHOLE_SIZE).unwrap();

        let desc = fx.decoder().bind_group_descriptor(64).unwrap();
        assert_eq!(desc.entries.len(), 1);
        assert_eq!(desc.entries[0].binding, 2);
        assert!(matches!(
            desc.entries[0].resource,
            BindingResource::Buffer {
                offset: 16,
                size: None,
                ..
            }
        ));
    }

    #[test]
    fn vertex_step_mode_must_be_known() {
        let mut fx = Fixture::new(WordSize::Four);
        fx.guest.store_u64(128, 12).unwrap();
        fx.guest.store_u32(136, 7).unwrap();

        let err = fx.decoder().vertex_buffer_layout(128).unwrap_err();
        assert!(err.to_string().contains("invalid vertex step mode 7"));

        fx.guest.store_u32(136, 2).unwrap();
        let layout = fx.decoder().vertex_buffer_layout(128).unwrap();
        assert_eq!(layout.array_stride, 12);
        assert_eq!(layout.step_mode, "instance");
        assert!(layout.attributes.is_empty());
    }

    #[test]
    fn color_attachment_reads_clear_value_and_depth_slice() {
        let mut fx = Fixture::new(WordSize::Four);
        let view = fx.reg.texture_views.create(mock("TextureView"));

        fx.guest.store_u32(72, 256).unwrap();
        fx.guest.store_u32(76, 1).unwrap();

        fx.guest.store_u32(256, view).unwrap();
        fx.guest
            .store_u32(264, enums::LOAD_OP.ordinal("clear"))
            .unwrap();
        fx.guest
            .store_u32(268, enums::STORE_OP.ordinal("store"))
            .unwrap();
        fx.guest.store_f64(272, 0.5).unwrap();
        fx.guest.store_f64(296, 1.0).unwrap();
        fx.guest.store_u32(304, DEPTH_SLICE_UNDEFINED).unwrap();

        let desc = fx.decoder().render_pass_descriptor(64).unwrap();
        let attachment = &desc.color_attachments[0];
        assert_eq!(attachment.load_op, Some("clear"));
        assert_eq!(attachment.store_op, Some("store"));
        assert_eq!(attachment.clear_value.r, 0.5);
        assert_eq!(attachment.clear_value.a, 1.0);
        assert_eq!(attachment.depth_slice, None);
        assert!(attachment.resolve_target.is_none());
        assert!(desc.depth_stencil_attachment.is_none());
        assert!(desc.timestamp_writes.is_none());
    }

    #[test]
    fn timestamp_writes_follow_one_pointer() {
        let mut fx = Fixture::new(WordSize::Four);
        let query_set = fx.reg.query_sets.create(mock("QuerySet"));

        fx.guest.store_u32(72, 512).unwrap();
        fx.guest.store_u32(512, query_set).unwrap();
        fx.guest.store_u32(516, 0).unwrap();
        fx.guest.store_u32(520, 1).unwrap();

        let desc = fx.decoder().compute_pass_descriptor(64).unwrap().unwrap();
        let writes = desc.timestamp_writes.unwrap();
        assert_eq!(writes.beginning_of_pass_write_index, 0);
        assert_eq!(writes.end_of_pass_write_index, 1);
    }

    #[test]
    fn handle_array_requires_every_handle() {
        let mut fx = Fixture::new(WordSize::Four);
        let live = fx.reg.command_buffers.create(mock("CommandBuffer"));
        fx.guest.store_u32(256, live).unwrap();
        fx.guest.store_u32(260, live + 40).unwrap();

        let decoder = fx.decoder();
        assert_eq!(
            decoder
                .handle_array(&fx.reg.command_buffers, 1, 256)
                .unwrap()
                .len(),
            1
        );

        let err = decoder
            .handle_array(&fx.reg.command_buffers, 2, 256)
            .unwrap_err();
        assert!(err.downcast_ref::<UnresolvedHandle>().is_some());
    }

    #[test]
    fn surface_configuration_maps_auto_alpha() {
        let mut fx = Fixture::new(WordSize::Four);
        let bgra = enums::TEXTURE_FORMAT.ordinal("bgra8unorm");

        fx.guest.store_u32(64, 0x10).unwrap();
        fx.guest.store_u32(68, bgra).unwrap();
        fx.guest.store_u32(72, 800).unwrap();
        fx.guest.store_u32(76, 600).unwrap();
        fx.guest
            .store_u32(80, enums::PRESENT_MODE.ordinal("fifo"))
            .unwrap();
        fx.guest
            .store_u32(88, enums::COMPOSITE_ALPHA_MODE.ordinal("auto"))
            .unwrap();
        fx.guest.store_u32(92, 256).unwrap();
        fx.guest.store_u32(96, 1).unwrap();
        fx.guest.store_u32(256, bgra).unwrap();

        let config = fx.decoder().surface_configuration(64).unwrap();
        assert_eq!(config.format, Some("bgra8unorm"));
        assert_eq!(config.width, 800);
        assert_eq!(config.present_mode, Some("fifo"));
        assert_eq!(config.alpha_mode, Some("opaque"));
        assert_eq!(config.view_formats, [Some("bgra8unorm")]);
    }
}
