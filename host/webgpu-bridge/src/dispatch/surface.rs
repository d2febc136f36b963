use wasmlink::{GuestContext, MemoryExt, StructCursor, require_addr};

use crate::{
    GpuBackend, GpuBridge,
    bridge::STATUS_SUCCESS,
    callback::stage_output,
    enums::{self, EnumTable},
};

/// `COPY_SRC | COPY_DST | TEXTURE_BINDING | RENDER_ATTACHMENT`
const SURFACE_USAGES: u32 = 0x01 | 0x02 | 0x04 | 0x10;

impl<B: GpuBackend> GpuBridge<B> {
    pub fn surface_configure(
        &mut self,
        cx: &dyn GuestContext,
        surface: u32,
        device: u32,
        config: u32,
    ) -> anyhow::Result<()> {
        let (Some(surface), Some(device)) = (
            self.reg.surfaces.lookup(surface),
            self.reg.devices.lookup(device),
        ) else {
            return Ok(());
        };

        let config = self.decoder(cx).surface_configuration(config)?;
        self.backend.surface_configure(surface, device, &config);
        Ok(())
    }

    /// Fills `{ formats, presentModes, alphaModes, usages }`. The three arrays are guest
    /// allocations released by [`surface_capabilities_free_members`].
    ///
    /// [`surface_capabilities_free_members`]: Self::surface_capabilities_free_members
    pub fn surface_get_capabilities(
        &mut self,
        cx: &mut dyn GuestContext,
        surface: u32,
        adapter: u32,
        out: u32,
    ) -> anyhow::Result<u32> {
        let out = require_addr(out, "surface capabilities")?;
        let word = self.config.word_size;

        let preferred = self.backend.surface_preferred_format(
            self.reg.surfaces.lookup(surface),
            self.reg.adapters.lookup(adapter),
        );

        let slices: [(&EnumTable, &[&str]); 3] = [
            (&enums::TEXTURE_FORMAT, &[preferred]),
            (&enums::PRESENT_MODE, &["fifo"]),
            (&enums::COMPOSITE_ALPHA_MODE, &["opaque", "premultiplied"]),
        ];

        stage_output(cx, |cx, staging| {
            let mut off = StructCursor::new(out);

            for (table, values) in slices {
                let array = staging.alloc(cx, values.len() as u32 * 4)?;
                for (i, value) in values.iter().enumerate() {
                    cx.store_u32(array + i as u32 * 4, table.ordinal(value))?;
                }

                cx.store_u32(off.field(4), array)?;
                cx.store_uint(off.field(word), word, values.len() as u64)?;
            }

            cx.store_u32(off.field(4), SURFACE_USAGES)?;

            Ok(STATUS_SUCCESS)
        })
    }

    /// Fills `{ surface, texture, status, presented }`. Nothing is written for a dead surface.
    pub fn surface_get_current_texture(
        &mut self,
        cx: &mut dyn GuestContext,
        surface: u32,
        out: u32,
    ) -> anyhow::Result<()> {
        let Some(host_surface) = self.reg.surfaces.lookup(surface) else {
            return Ok(());
        };
        let out = require_addr(out, "surface texture")?;

        let (texture, status) = match self.backend.surface_current_texture(host_surface) {
            Ok(texture) => (self.reg.textures.create(texture), "Success"),
            Err(err) => {
                tracing::error!(surface, %err, "failed to get current texture");
                (0, "Lost")
            }
        };

        let word = self.config.word_size;
        let mut off = StructCursor::new(out);
        cx.store_uint(off.field(word), word, u64::from(surface))?;
        cx.store_uint(off.field(word), word, u64::from(texture))?;
        let status = enums::SURFACE_TEXTURE_STATUS.ordinal_or(status, "Lost");
        cx.store_u32(off.field(4), status)?;
        cx.store_b32(off.field(4), false)?;

        Ok(())
    }

    pub fn surface_present(&mut self, surface: u32) {
        if let Some(surface) = self.reg.surfaces.lookup(surface) {
            self.backend.surface_present(surface);
        }
    }

    pub fn surface_unconfigure(&mut self, surface: u32) {
        if let Some(surface) = self.reg.surfaces.lookup(surface) {
            self.backend.surface_unconfigure(surface);
        }
    }

    pub fn surface_capabilities_free_members(
        &mut self,
        cx: &mut dyn GuestContext,
        caps: u32,
    ) -> anyhow::Result<()> {
        let word = self.config.word_size;
        let mut off = StructCursor::required(caps, "surface capabilities")?;

        for _ in 0..3 {
            let slot = off.field(4);
            off.skip(word);

            let array = cx.load_ptr(slot)?;
            if array != 0 {
                cx.free(array)?;
                cx.store_u32(slot, 0)?;
            }
        }

        Ok(())
    }

    pub fn supported_features_free_members(
        &mut self,
        cx: &mut dyn GuestContext,
        _count: u64,
        features: u32,
    ) -> anyhow::Result<()> {
        if features != 0 {
            cx.free(features)?;
        }
        Ok(())
    }
}
