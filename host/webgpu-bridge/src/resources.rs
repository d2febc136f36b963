use derive_where::derive_where;

use crate::{GpuBackend, backend::HostObject, registry::HandleRegistry};

// === BufferEntry === //

/// A host buffer plus the guest-side staging copy of its mapped range, if one is out.
#[derive_where(Debug, Clone)]
pub struct BufferEntry<B: GpuBackend> {
    pub buffer: B::Buffer,
    pub mapping: Option<BufferMapping>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BufferMapping {
    /// Guest address of the staging copy.
    pub ptr: u32,
    pub offset: u64,
    pub size: u32,
}

impl<B: GpuBackend> BufferEntry<B> {
    pub fn new(buffer: B::Buffer) -> Self {
        Self {
            buffer,
            mapping: None,
        }
    }
}

impl<B: GpuBackend> HostObject for BufferEntry<B> {
    fn label(&self) -> Option<String> {
        self.buffer.label()
    }

    fn set_label(&mut self, label: &str) {
        self.buffer.set_label(label);
    }
}

// === Registries === //

macro_rules! resource_kinds {
    ($($kind:ident => $field:ident: $ty:ty;)*) => {
        /// Every kind of object the guest can hold a handle to.
        #[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
        pub enum ResourceKind {
            $($kind,)*
        }

        impl ResourceKind {
            pub const ALL: &[Self] = &[$(Self::$kind),*];

            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$kind => stringify!($kind),)*
                }
            }
        }

        /// One [`HandleRegistry`] per [`ResourceKind`].
        #[derive_where(Debug)]
        pub struct Registries<B: GpuBackend> {
            $(pub $field: HandleRegistry<$ty>,)*
        }

        impl<B: GpuBackend> Default for Registries<B> {
            fn default() -> Self {
                Self {
                    $($field: HandleRegistry::new(stringify!($kind)),)*
                }
            }
        }

        impl<B: GpuBackend> Registries<B> {
            pub fn contains(&self, kind: ResourceKind, handle: u32) -> bool {
                match kind {
                    $(ResourceKind::$kind => self.$field.contains(handle),)*
                }
            }

            pub fn ref_count(&self, kind: ResourceKind, handle: u32) -> u32 {
                match kind {
                    $(ResourceKind::$kind => self.$field.ref_count(handle),)*
                }
            }

            pub fn add_ref(&mut self, kind: ResourceKind, handle: u32) {
                match kind {
                    $(ResourceKind::$kind => self.$field.add_ref(handle),)*
                }
            }

            /// Returns whether the last reference was dropped.
            pub fn release(&mut self, kind: ResourceKind, handle: u32) -> bool {
                match kind {
                    $(ResourceKind::$kind => self.$field.release(handle).is_some(),)*
                }
            }

            pub fn label(&self, kind: ResourceKind, handle: u32) -> Option<String> {
                match kind {
                    $(ResourceKind::$kind => self.$field.label(handle),)*
                }
            }

            pub fn set_label(&mut self, kind: ResourceKind, handle: u32, label: &str) {
                match kind {
                    $(ResourceKind::$kind => self.$field.set_label(handle, label),)*
                }
            }
        }
    };
}

resource_kinds! {
    Adapter => adapters: B::Adapter;
    BindGroup => bind_groups: B::BindGroup;
    BindGroupLayout => bind_group_layouts: B::BindGroupLayout;
    Buffer => buffers: BufferEntry<B>;
    CommandBuffer => command_buffers: B::CommandBuffer;
    CommandEncoder => command_encoders: B::CommandEncoder;
    ComputePassEncoder => compute_pass_encoders: B::ComputePassEncoder;
    ComputePipeline => compute_pipelines: B::ComputePipeline;
    Device => devices: B::Device;
    Instance => instances: B::Instance;
    PipelineLayout => pipeline_layouts: B::PipelineLayout;
    QuerySet => query_sets: B::QuerySet;
    Queue => queues: B::Queue;
    RenderBundle => render_bundles: B::RenderBundle;
    RenderBundleEncoder => render_bundle_encoders: B::RenderBundleEncoder;
    RenderPassEncoder => render_pass_encoders: B::RenderPassEncoder;
    RenderPipeline => render_pipelines: B::RenderPipeline;
    Sampler => samplers: B::Sampler;
    ShaderModule => shader_modules: B::ShaderModule;
    Surface => surfaces: B::Surface;
    Texture => textures: B::Texture;
    TextureView => texture_views: B::TextureView;
}
