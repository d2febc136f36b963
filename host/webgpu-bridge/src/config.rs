use wasmlink::WordSize;

/// Static configuration of a [`GpuBridge`](crate::GpuBridge).
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Width of the guest's `usize`, which sizes every length and count field.
    pub word_size: WordSize,

    /// The wasm import module every entry point is linked under.
    pub import_module: &'static str,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            word_size: WordSize::Four,
            import_module: "wgpu",
        }
    }
}

impl BridgeConfig {
    pub fn with_word_size(mut self, word_size: WordSize) -> Self {
        self.word_size = word_size;
        self
    }

    pub fn with_import_module(mut self, import_module: &'static str) -> Self {
        self.import_module = import_module;
        self
    }
}
