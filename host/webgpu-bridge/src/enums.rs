//! Ordinal tables for every enumeration that crosses the guest boundary.
//!
//! Guests pass enumerations as 4-byte ordinals. Some slots are deliberately empty so that the
//! ordinal space lines up with the guest's headers: [`Symbol::Unset`] marks "not specified" and
//! [`Symbol::Null`] marks an explicit null.

#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum Symbol {
    Unset,
    Null,
    Bool(bool),
    Str(&'static str),
}

impl Symbol {
    pub fn as_str(self) -> Option<&'static str> {
        match self {
            Symbol::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            Symbol::Bool(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct EnumTable {
    name: &'static str,
    entries: &'static [Symbol],
}

impl EnumTable {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Out-of-range ordinals, negative ones included, are [`Symbol::Unset`].
    pub fn lookup(&self, ordinal: i32) -> Symbol {
        usize::try_from(ordinal)
            .ok()
            .and_then(|idx| self.entries.get(idx))
            .copied()
            .unwrap_or(Symbol::Unset)
    }

    pub fn str(&self, ordinal: i32) -> Option<&'static str> {
        self.lookup(ordinal).as_str()
    }

    pub fn index_of(&self, symbol: &str) -> Option<u32> {
        self.entries
            .iter()
            .position(|entry| matches!(entry, Symbol::Str(s) if *s == symbol))
            .map(|idx| idx as u32)
    }

    /// Like [`index_of`](Self::index_of), but falls back to ordinal zero for symbols the table
    /// does not know. Used when encoding host values the guest may not have a name for.
    pub fn ordinal(&self, symbol: &str) -> u32 {
        self.index_of(symbol).unwrap_or(0)
    }

    /// Like [`ordinal`](Self::ordinal), but falls back to the ordinal of `fallback`. Status tables
    /// declare `Success` at ordinal zero, so an unknown status must not decay to it.
    pub fn ordinal_or(&self, symbol: &str, fallback: &str) -> u32 {
        self.index_of(symbol)
            .or_else(|| self.index_of(fallback))
            .unwrap_or(0)
    }
}

macro_rules! enum_tables {
    (@sym _) => { Symbol::Unset };
    (@sym null) => { Symbol::Null };
    (@sym true) => { Symbol::Bool(true) };
    (@sym false) => { Symbol::Bool(false) };
    (@sym $s:literal) => { Symbol::Str($s) };
    ($($name:ident = $label:literal [$($sym:tt),* $(,)?];)*) => {
        $(
            pub static $name: EnumTable = EnumTable {
                name: $label,
                entries: &[$(enum_tables!(@sym $sym)),*],
            };
        )*
    };
}

enum_tables! {
    FEATURE_NAME = "FeatureName" [
        "depth-clip-control",
        "depth32float-stencil8",
        "texture-compression-bc",
        "texture-compression-bc-sliced-3d",
        "texture-compression-etc2",
        "texture-compression-astc",
        "texture-compression-astc-sliced-3d",
        "timestamp-query",
        "indirect-first-instance",
        "shader-f16",
        "rg11b10ufloat-renderable",
        "bgra8unorm-storage",
        "float32-filterable",
        "float32-blendable",
        "clip-distances",
        "dual-source-blending",
    ];
    STORE_OP = "StoreOp" [_, "store", "discard"];
    LOAD_OP = "LoadOp" [_, "clear", "load"];
    BUFFER_BINDING_TYPE = "BufferBindingType" [_, "uniform", "storage", "read-only-storage"];
    SAMPLER_BINDING_TYPE = "SamplerBindingType" [_, "filtering", "non-filtering", "comparison"];
    TEXTURE_SAMPLE_TYPE = "TextureSampleType" [
        _, "float", "unfilterable-float", "depth", "sint", "uint",
    ];
    TEXTURE_VIEW_DIMENSION = "TextureViewDimension" [
        _, "1d", "2d", "2d-array", "cube", "cube-array", "3d",
    ];
    STORAGE_TEXTURE_ACCESS = "StorageTextureAccess" [
        null, _, "write-only", "read-only", "read-write",
    ];
    TEXTURE_FORMAT = "TextureFormat" [
        _,
        "r8unorm", "r8snorm", "r8uint", "r8sint",
        "r16uint", "r16sint", "r16unorm", "r16snorm", "r16float",
        "rg8unorm", "rg8snorm", "rg8uint", "rg8sint",
        "r32uint", "r32sint", "r32float",
        "rg16unorm", "rg16snorm", "rg16uint", "rg16sint", "rg16float",
        "rgba8unorm", "rgba8unorm-srgb", "rgba8snorm", "rgba8uint", "rgba8sint",
        "bgra8unorm", "bgra8unorm-srgb",
        "rgb9e5ufloat", "rgb10a2uint", "rgb10a2unorm", "rg11b10ufloat",
        "r64uint",
        "rg32uint", "rg32sint", "rg32float",
        "rgba16uint", "rgba16sint", "rgba16unorm", "rgba16snorm", "rgba16float",
        "rgba32uint", "rgba32sint", "rgba32float",
        "stencil8", "depth16unorm", "depth24plus", "depth24plus-stencil8",
        "depth32float", "depth32float-stencil8",
        "bc1-rgba-unorm", "bc1-rgba-unorm-srgb",
        "bc2-rgba-unorm", "bc2-rgba-unorm-srgb",
        "bc3-rgba-unorm", "bc3-rgba-unorm-srgb",
        "bc4-r-unorm", "bc4-r-snorm",
        "bc5-rg-unorm", "bc5-rg-snorm",
        "bc6h-rgb-ufloat", "bc6h-rgb-float",
        "bc7-rgba-unorm", "bc7-rgba-unorm-srgb",
        "etc2-rgb8unorm", "etc2-rgb8unorm-srgb",
        "etc2-rgb8a1unorm", "etc2-rgb8a1unorm-srgb",
        "etc2-rgba8unorm", "etc2-rgba8unorm-srgb",
        "eac-r11unorm", "eac-r11snorm", "eac-rg11unorm", "eac-rg11snorm",
        "astc-4x4-unorm", "astc-4x4-unorm-srgb",
        "astc-5x4-unorm", "astc-5x4-unorm-srgb",
        "astc-5x5-unorm", "astc-5x5-unorm-srgb",
        "astc-6x5-unorm", "astc-6x5-unorm-srgb",
        "astc-6x6-unorm", "astc-6x6-unorm-srgb",
        "astc-8x5-unorm", "astc-8x5-unorm-srgb",
        "astc-8x6-unorm", "astc-8x6-unorm-srgb",
        "astc-8x8-unorm", "astc-8x8-unorm-srgb",
        "astc-10x5-unorm", "astc-10x5-unorm-srgb",
        "astc-10x6-unorm", "astc-10x6-unorm-srgb",
        "astc-10x8-unorm", "astc-10x8-unorm-srgb",
        "astc-10x10-unorm", "astc-10x10-unorm-srgb",
        "astc-12x10-unorm", "astc-12x10-unorm-srgb",
        "astc-12x12-unorm", "astc-12x12-unorm-srgb",
    ];
    QUERY_TYPE = "QueryType" [_, "occlusion", "timestamp"];
    VERTEX_STEP_MODE = "VertexStepMode" [_, "vertex", "instance"];
    VERTEX_FORMAT = "VertexFormat" [
        "uint8", "uint8x2", "uint8x4",
        "sint8", "sint8x2", "sint8x4",
        "unorm8", "unorm8x2", "unorm8x4",
        "snorm8", "snorm8x2", "snorm8x4",
        "uint16", "uint16x2", "uint16x4",
        "sint16", "sint16x2", "sint16x4",
        "unorm16", "unorm16x2", "unorm16x4",
        "snorm16", "snorm16x2", "snorm16x4",
        "float16", "float16x2", "float16x4",
        "float32", "float32x2", "float32x3", "float32x4",
        "uint32", "uint32x2", "uint32x3", "uint32x4",
        "sint32", "sint32x2", "sint32x3", "sint32x4",
        "unorm10-10-2", "unorm8x4-bgra",
    ];
    PRIMITIVE_TOPOLOGY = "PrimitiveTopology" [
        _, "point-list", "line-list", "line-strip", "triangle-list", "triangle-strip",
    ];
    INDEX_FORMAT = "IndexFormat" [_, "uint16", "uint32"];
    FRONT_FACE = "FrontFace" [_, "ccw", "cw"];
    CULL_MODE = "CullMode" [_, "none", "front", "back"];
    ADDRESS_MODE = "AddressMode" [
        _, "clamp-to-edge", "repeat", "mirror-repeat", "clamp-to-border",
    ];
    FILTER_MODE = "FilterMode" [_, "nearest", "linear"];
    MIPMAP_FILTER_MODE = "MipmapFilterMode" [_, "nearest", "linear"];
    COMPARE_FUNCTION = "CompareFunction" [
        _, "never", "less", "equal", "less-equal", "greater", "not-equal", "greater-equal",
        "always",
    ];
    TEXTURE_DIMENSION = "TextureDimension" [_, "1d", "2d", "3d"];
    ERROR_TYPE = "ErrorType" [
        _, "no-error", "validation", "out-of-memory", "internal", "unknown",
    ];
    WGSL_LANGUAGE_FEATURE_NAME = "WGSLLanguageFeatureName" [
        _,
        "readonly_and_readwrite_storage_textures",
        "packed_4x8_integer_dot_product",
        "unrestricted_pointer_parameters",
        "pointer_composite_access",
    ];
    POWER_PREFERENCE = "PowerPreference" [_, "none", "low-power", "high-performance"];
    COMPOSITE_ALPHA_MODE = "CompositeAlphaMode" [
        "auto", "opaque", "premultiplied", "unpremultiplied", "inherit",
    ];
    STENCIL_OPERATION = "StencilOperation" [
        _, "keep", "zero", "replace", "invert", "increment-clamp", "decrement-clamp",
        "increment-wrap", "decrement-wrap",
    ];
    BLEND_OPERATION = "BlendOperation" [
        _, "add", "subtract", "reverse-subtract", "min", "max",
    ];
    BLEND_FACTOR = "BlendFactor" [
        _, "zero", "one", "src", "one-minus-src", "src-alpha", "one-minus-src-alpha", "dst",
        "one-minus-dst", "dst-alpha", "one-minus-dst-alpha", "src-alpha-saturated", "constant",
        "one-minus-constant", "src1", "one-minus-src1", "src1-alpha", "one-minus-src1-alpha",
    ];
    PRESENT_MODE = "PresentMode" [_, "fifo", "fifo-relaxed", "immediate", "mailbox"];
    TEXTURE_ASPECT = "TextureAspect" [_, "all", "stencil-only", "depth-only"];
    DEVICE_LOST_REASON = "DeviceLostReason" [
        "unknown", "destroyed", "instance-dropped", "failed-creation",
    ];
    BUFFER_MAP_STATE = "BufferMapState" [_, "unmapped", "pending", "mapped"];
    OPTIONAL_BOOL = "OptionalBool" [false, true, _];
    BACKEND_TYPE = "BackendType" [
        _, null, "WebGPU", "D3D11", "D3D12", "Metal", "Vulkan", "OpenGL", "OpenGLES",
    ];
    ADAPTER_TYPE = "AdapterType" [_, "DiscreteGPU", "IntegratedGPU", "CPU", "Unknown"];
    REQUEST_DEVICE_STATUS = "RequestDeviceStatus" [
        "Success", "InstanceDropped", "Error", "Unknown",
    ];
    MAP_ASYNC_STATUS = "MapAsyncStatus" [
        _, "Success", "InstanceDropped", "Error", "Aborted", "Unknown",
    ];
    CREATE_PIPELINE_ASYNC_STATUS = "CreatePipelineAsyncStatus" [
        _, "Success", "InstanceDropped", "ValidationError", "InternalError", "Unknown",
    ];
    POP_ERROR_SCOPE_STATUS = "PopErrorScopeStatus" [
        _, "Success", "InstanceDropped", "EmptyStack",
    ];
    REQUEST_ADAPTER_STATUS = "RequestAdapterStatus" [
        "Success", "InstanceDropped", "Unavailable", "Error", "Unknown",
    ];
    QUEUE_WORK_DONE_STATUS = "QueueWorkDoneStatus" [
        _, "Success", "InstanceDropped", "Error", "Unknown",
    ];
    COMPILATION_INFO_REQUEST_STATUS = "CompilationInfoRequestStatus" [
        _, "Success", "InstanceDropped", "Error", "Unknown",
    ];
    COMPILATION_MESSAGE_TYPE = "CompilationMessageType" [_, "error", "warning", "info"];
    ERROR_FILTER = "ErrorFilter" [_, "validation", "out-of-memory", "internal"];
    SURFACE_TEXTURE_STATUS = "SurfaceTextureStatus" [
        "Success", "Timeout", "Outdated", "Lost",
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_is_unset() {
        assert_eq!(LOAD_OP.lookup(3), Symbol::Unset);
        assert_eq!(LOAD_OP.lookup(-1), Symbol::Unset);
        assert_eq!(LOAD_OP.lookup(i32::MAX), Symbol::Unset);
        assert_eq!(LOAD_OP.str(0), None);
        assert_eq!(LOAD_OP.str(1), Some("clear"));
    }

    #[test]
    fn null_and_bool_slots() {
        assert_eq!(STORAGE_TEXTURE_ACCESS.lookup(0), Symbol::Null);
        assert_eq!(STORAGE_TEXTURE_ACCESS.lookup(1), Symbol::Unset);
        assert_eq!(OPTIONAL_BOOL.lookup(1).as_bool(), Some(true));
        assert_eq!(OPTIONAL_BOOL.lookup(2), Symbol::Unset);
        assert_eq!(BACKEND_TYPE.lookup(1), Symbol::Null);
    }

    #[test]
    fn status_ordinals_match_declaration() {
        assert_eq!(REQUEST_ADAPTER_STATUS.index_of("Success"), Some(0));
        assert_eq!(REQUEST_ADAPTER_STATUS.index_of("Unavailable"), Some(2));
        assert_eq!(REQUEST_DEVICE_STATUS.index_of("Error"), Some(2));
        assert_eq!(MAP_ASYNC_STATUS.index_of("Success"), Some(1));
        assert_eq!(POP_ERROR_SCOPE_STATUS.index_of("EmptyStack"), Some(3));
        assert_eq!(ERROR_TYPE.index_of("validation"), Some(2));
        assert_eq!(BACKEND_TYPE.index_of("WebGPU"), Some(2));
        assert_eq!(ADAPTER_TYPE.index_of("Unknown"), Some(4));
    }

    #[test]
    fn unknown_symbols_fall_back_to_zero() {
        assert_eq!(TEXTURE_FORMAT.index_of("not-a-format"), None);
        assert_eq!(TEXTURE_FORMAT.ordinal("not-a-format"), 0);
        assert_eq!(TEXTURE_FORMAT.ordinal("bgra8unorm"), 27);
    }

    #[test]
    fn symbols_need_not_be_static() {
        let name = String::from("rgba8unorm");
        assert_eq!(TEXTURE_FORMAT.index_of(&name), TEXTURE_FORMAT.index_of("rgba8unorm"));
        assert!(TEXTURE_FORMAT.index_of(&name).is_some());
    }

    #[test]
    fn unknown_status_does_not_read_as_success() {
        assert_eq!(REQUEST_ADAPTER_STATUS.ordinal_or("Sucess", "Unknown"), 4);
        assert_eq!(REQUEST_DEVICE_STATUS.ordinal_or("Sucess", "Unknown"), 3);
        assert_eq!(REQUEST_DEVICE_STATUS.ordinal_or("Error", "Unknown"), 2);
        assert_eq!(REQUEST_ADAPTER_STATUS.ordinal_or("Success", "Unknown"), 0);
    }

    #[test]
    fn value_entries_are_unique() {
        for table in [
            &TEXTURE_FORMAT,
            &VERTEX_FORMAT,
            &FEATURE_NAME,
            &BLEND_FACTOR,
            &REQUEST_ADAPTER_STATUS,
            &ERROR_TYPE,
        ] {
            for (idx, entry) in table.entries.iter().enumerate() {
                if let Symbol::Str(name) = entry {
                    assert_eq!(
                        table.index_of(name),
                        Some(idx as u32),
                        "duplicate {name} in {}",
                        table.name()
                    );
                }
            }
        }
    }
}
