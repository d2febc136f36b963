use wasmlink::GuestContext;

use crate::{GpuBackend, GpuBridge, backend::TextureInfo, enums};

impl<B: GpuBackend> GpuBridge<B> {
    pub fn texture_create_view(
        &mut self,
        cx: &dyn GuestContext,
        texture: u32,
        descriptor: u32,
    ) -> anyhow::Result<u32> {
        let Some(texture) = self.reg.textures.lookup(texture) else {
            return Ok(0);
        };

        let descriptor = self.decoder(cx).texture_view_descriptor(descriptor)?;
        let view = self
            .backend
            .texture_create_view(texture, descriptor.as_ref());

        Ok(self.reg.texture_views.create(view))
    }

    pub fn texture_destroy(&mut self, texture: u32) {
        if let Some(texture) = self.reg.textures.lookup(texture) {
            self.backend.texture_destroy(texture);
        }
    }

    fn texture_info(&self, texture: u32) -> Option<TextureInfo> {
        self.reg
            .textures
            .lookup(texture)
            .map(|texture| self.backend.texture_info(texture))
    }

    pub fn texture_get_depth_or_array_layers(&mut self, texture: u32) -> u32 {
        self.texture_info(texture)
            .map_or(0, |info| info.depth_or_array_layers)
    }

    pub fn texture_get_dimension(&mut self, texture: u32) -> u32 {
        self.texture_info(texture)
            .map_or(0, |info| enums::TEXTURE_DIMENSION.ordinal(info.dimension))
    }

    pub fn texture_get_format(&mut self, texture: u32) -> u32 {
        self.texture_info(texture)
            .map_or(0, |info| enums::TEXTURE_FORMAT.ordinal(info.format))
    }

    pub fn texture_get_height(&mut self, texture: u32) -> u32 {
        self.texture_info(texture).map_or(0, |info| info.height)
    }

    pub fn texture_get_mip_level_count(&mut self, texture: u32) -> u32 {
        self.texture_info(texture).map_or(0, |info| info.mip_level_count)
    }

    pub fn texture_get_sample_count(&mut self, texture: u32) -> u32 {
        self.texture_info(texture).map_or(0, |info| info.sample_count)
    }

    pub fn texture_get_usage(&mut self, texture: u32) -> u32 {
        self.texture_info(texture).map_or(0, |info| info.usage as u32)
    }

    pub fn texture_get_width(&mut self, texture: u32) -> u32 {
        self.texture_info(texture).map_or(0, |info| info.width)
    }
}
