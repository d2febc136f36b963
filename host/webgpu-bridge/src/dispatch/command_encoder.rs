use wasmlink::GuestContext;

use crate::{GpuBackend, GpuBridge, bridge::resolved};

impl<B: GpuBackend> GpuBridge<B> {
    pub fn command_encoder_begin_render_pass(
        &mut self,
        cx: &dyn GuestContext,
        encoder: u32,
        descriptor: u32,
    ) -> anyhow::Result<u32> {
        if self.reg.command_encoders.lookup(encoder).is_none() {
            return Ok(0);
        }

        let decoded = self.decoder(cx).render_pass_descriptor(descriptor);
        let Some(descriptor) = resolved("webgpuCommandEncoderBeginRenderPass", decoded)? else {
            return Ok(0);
        };

        let Some(encoder) = self.reg.command_encoders.get_mut(encoder) else {
            return Ok(0);
        };

        let pass = self
            .backend
            .command_encoder_begin_render_pass(encoder, &descriptor);
        Ok(self.reg.render_pass_encoders.create(pass))
    }

    pub fn command_encoder_begin_compute_pass(
        &mut self,
        cx: &dyn GuestContext,
        encoder: u32,
        descriptor: u32,
    ) -> anyhow::Result<u32> {
        if self.reg.command_encoders.lookup(encoder).is_none() {
            return Ok(0);
        }

        let descriptor = self.decoder(cx).compute_pass_descriptor(descriptor)?;
        let Some(encoder) = self.reg.command_encoders.get_mut(encoder) else {
            return Ok(0);
        };

        let pass = self
            .backend
            .command_encoder_begin_compute_pass(encoder, descriptor.as_ref());
        Ok(self.reg.compute_pass_encoders.create(pass))
    }

    pub fn command_encoder_copy_buffer_to_buffer(
        &mut self,
        encoder: u32,
        source: u32,
        source_offset: u64,
        destination: u32,
        destination_offset: u64,
        size: u64,
    ) {
        let (Some(source), Some(destination)) = (
            self.reg.buffers.lookup(source),
            self.reg.buffers.lookup(destination),
        ) else {
            return;
        };

        let Some(encoder) = self.reg.command_encoders.lookup_mut(encoder) else {
            return;
        };

        self.backend.command_encoder_copy_buffer_to_buffer(
            encoder,
            &source.buffer,
            source_offset,
            &destination.buffer,
            destination_offset,
            size,
        );
    }

    pub fn command_encoder_finish(
        &mut self,
        cx: &dyn GuestContext,
        encoder: u32,
        descriptor: u32,
    ) -> anyhow::Result<u32> {
        if self.reg.command_encoders.lookup(encoder).is_none() {
            return Ok(0);
        }

        let label = self.decoder(cx).label_descriptor(descriptor)?;
        let Some(encoder) = self.reg.command_encoders.get_mut(encoder) else {
            return Ok(0);
        };

        let commands = self
            .backend
            .command_encoder_finish(encoder, label.as_deref());
        Ok(self.reg.command_buffers.create(commands))
    }
}
