use wasmlink::{GuestContext, MemoryExt, MemoryError, StructCursor};

pub const LIMIT_U32_UNDEFINED: u32 = u32::MAX;
pub const LIMIT_U64_UNDEFINED: u64 = u64::MAX;

// === LimitField === //

pub trait LimitField: Copy + Into<u64> {
    const SIZE: u32;
    const UNDEFINED: Self;

    fn load(cx: &dyn GuestContext, addr: u32) -> Result<Self, MemoryError>;

    fn store(self, cx: &mut dyn GuestContext, addr: u32) -> Result<(), MemoryError>;
}

impl LimitField for u32 {
    const SIZE: u32 = 4;
    const UNDEFINED: Self = LIMIT_U32_UNDEFINED;

    fn load(cx: &dyn GuestContext, addr: u32) -> Result<Self, MemoryError> {
        cx.load_u32(addr)
    }

    fn store(self, cx: &mut dyn GuestContext, addr: u32) -> Result<(), MemoryError> {
        cx.store_u32(addr, self)
    }
}

impl LimitField for u64 {
    const SIZE: u32 = 8;
    const UNDEFINED: Self = LIMIT_U64_UNDEFINED;

    fn load(cx: &dyn GuestContext, addr: u32) -> Result<Self, MemoryError> {
        cx.load_u64(addr)
    }

    fn store(self, cx: &mut dyn GuestContext, addr: u32) -> Result<(), MemoryError> {
        cx.store_u64(addr, self)
    }
}

// === Limits === //

/// Limits requested by the guest. Only the fields the guest actually set are present, in
/// declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequiredLimits(pub Vec<(&'static str, u64)>);

impl RequiredLimits {
    pub fn get(&self, name: &str) -> Option<u64> {
        self.0.iter().find(|(k, _)| *k == name).map(|&(_, v)| v)
    }
}

macro_rules! define_limits {
    ($($field:ident: $ty:ty = $name:literal, $default:expr;)*) => {
        /// Limits reported by the host, in the guest's field order.
        #[derive(Debug, Clone, PartialEq)]
        pub struct Limits {
            $(pub $field: $ty,)*
        }

        impl Default for Limits {
            fn default() -> Self {
                Self {
                    $($field: $default,)*
                }
            }
        }

        impl Limits {
            pub const NAMES: &[&str] = &[$($name),*];

            pub fn decode_required(
                cx: &dyn GuestContext,
                start: u32,
            ) -> Result<RequiredLimits, MemoryError> {
                let mut cursor = StructCursor::required(start, "limits")?;
                let mut out = Vec::new();

                $(
                    let value = <$ty as LimitField>::load(cx, cursor.field(<$ty as LimitField>::SIZE))?;
                    if value != <$ty as LimitField>::UNDEFINED {
                        out.push(($name, value.into()));
                    }
                )*

                Ok(RequiredLimits(out))
            }

            pub fn encode(&self, cx: &mut dyn GuestContext, start: u32) -> Result<(), MemoryError> {
                let mut cursor = StructCursor::required(start, "limits")?;

                $(
                    LimitField::store(self.$field, cx, cursor.field(<$ty as LimitField>::SIZE))?;
                )*

                Ok(())
            }
        }
    };
}

define_limits! {
    max_texture_dimension_1d: u32 = "maxTextureDimension1D", 8192;
    max_texture_dimension_2d: u32 = "maxTextureDimension2D", 8192;
    max_texture_dimension_3d: u32 = "maxTextureDimension3D", 2048;
    max_texture_array_layers: u32 = "maxTextureArrayLayers", 256;
    max_bind_groups: u32 = "maxBindGroups", 4;
    max_bind_groups_plus_vertex_buffers: u32 = "maxBindGroupsPlusVertexBuffers", 24;
    max_bindings_per_bind_group: u32 = "maxBindingsPerBindGroup", 1000;
    max_dynamic_uniform_buffers_per_pipeline_layout: u32 =
        "maxDynamicUniformBuffersPerPipelineLayout", 8;
    max_dynamic_storage_buffers_per_pipeline_layout: u32 =
        "maxDynamicStorageBuffersPerPipelineLayout", 4;
    max_sampled_textures_per_shader_stage: u32 = "maxSampledTexturesPerShaderStage", 16;
    max_samplers_per_shader_stage: u32 = "maxSamplersPerShaderStage", 16;
    max_storage_buffers_per_shader_stage: u32 = "maxStorageBuffersPerShaderStage", 8;
    max_storage_textures_per_shader_stage: u32 = "maxStorageTexturesPerShaderStage", 4;
    max_uniform_buffers_per_shader_stage: u32 = "maxUniformBuffersPerShaderStage", 12;
    max_uniform_buffer_binding_size: u32 = "maxUniformBufferBindingSize", 65536;
    max_storage_buffer_binding_size: u32 = "maxStorageBufferBindingSize", 134_217_728;
    min_uniform_buffer_offset_alignment: u32 = "minUniformBufferOffsetAlignment", 256;
    min_storage_buffer_offset_alignment: u32 = "minStorageBufferOffsetAlignment", 256;
    max_vertex_buffers: u32 = "maxVertexBuffers", 8;
    max_buffer_size: u64 = "maxBufferSize", 268_435_456;
    max_vertex_attributes: u32 = "maxVertexAttributes", 16;
    max_vertex_buffer_array_stride: u32 = "maxVertexBufferArrayStride", 2048;
    max_inter_stage_shader_variables: u32 = "maxInterStageShaderVariables", 16;
    max_color_attachments: u32 = "maxColorAttachments", 8;
    max_color_attachment_bytes_per_sample: u32 = "maxColorAttachmentBytesPerSample", 32;
    max_compute_workgroup_storage_size: u32 = "maxComputeWorkgroupStorageSize", 16384;
    max_compute_invocations_per_workgroup: u32 = "maxComputeInvocationsPerWorkgroup", 256;
    max_compute_workgroup_size_x: u32 = "maxComputeWorkgroupSizeX", 256;
    max_compute_workgroup_size_y: u32 = "maxComputeWorkgroupSizeY", 256;
    max_compute_workgroup_size_z: u32 = "maxComputeWorkgroupSizeZ", 64;
    max_compute_workgroups_per_dimension: u32 = "maxComputeWorkgroupsPerDimension", 65535;
}

#[cfg(test)]
mod tests {
    use wasmlink::VecGuest;

    use super::*;

    const BASE: u32 = 64;

    fn blank(guest: &mut VecGuest) {
        guest.write_bytes(BASE, &[0xff; 136]).unwrap();
    }

    #[test]
    fn all_sentinels_decode_to_nothing() {
        let mut guest = VecGuest::new(512);
        blank(&mut guest);

        assert_eq!(Limits::decode_required(&guest, BASE).unwrap(), RequiredLimits::default());
    }

    #[test]
    fn buffer_size_follows_vertex_buffers_aligned() {
        let mut guest = VecGuest::new(512);
        blank(&mut guest);

        // Nineteen u32 fields end at 76, so the u64 realigns to 80.
        guest.store_u32(BASE + 18 * 4, 12).unwrap();
        guest.store_u64(BASE + 80, 1 << 33).unwrap();
        guest.store_u32(BASE + 88, 30).unwrap();

        let limits = Limits::decode_required(&guest, BASE).unwrap();
        assert_eq!(
            limits.0,
            [
                ("maxVertexBuffers", 12),
                ("maxBufferSize", 1 << 33),
                ("maxVertexAttributes", 30),
            ]
        );
        assert_eq!(limits.get("maxBufferSize"), Some(1 << 33));
        assert_eq!(limits.get("maxBindGroups"), None);
    }

    #[test]
    fn encode_matches_decode_order() {
        let mut guest = VecGuest::new(512);
        let limits = Limits {
            max_bind_groups: 6,
            max_compute_workgroups_per_dimension: 1234,
            ..Limits::default()
        };

        limits.encode(&mut guest, BASE).unwrap();

        let back = Limits::decode_required(&guest, BASE).unwrap();
        assert_eq!(back.0.len(), Limits::NAMES.len());
        assert_eq!(back.get("maxBindGroups"), Some(6));
        assert_eq!(back.get("maxComputeWorkgroupsPerDimension"), Some(1234));
        assert_eq!(guest.load_u32(BASE + 4 * 4).unwrap(), 6);
    }

    #[test]
    fn null_limits_rejected() {
        let guest = VecGuest::new(64);
        assert!(Limits::decode_required(&guest, 0).is_err());
    }
}
