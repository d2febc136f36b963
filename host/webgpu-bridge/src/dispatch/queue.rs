use wasmlink::{GuestContext, MemoryExt};

use crate::{
    GpuBackend, GpuBridge,
    bridge::{Completion, resolved},
    callback::CallbackRecord,
    dispatch::missing,
};

impl<B: GpuBackend> GpuBridge<B> {
    pub fn queue_submit(
        &mut self,
        cx: &dyn GuestContext,
        queue: u32,
        count: u64,
        commands: u32,
    ) -> anyhow::Result<()> {
        let Some(queue) = self.reg.queues.lookup(queue) else {
            return Ok(());
        };

        let decoded = self
            .decoder(cx)
            .handle_array(&self.reg.command_buffers, count, commands);
        let Some(commands) = resolved("webgpuQueueSubmit", decoded)? else {
            return Ok(());
        };

        self.backend.queue_submit(queue, &commands);
        Ok(())
    }

    pub fn queue_write_buffer(
        &mut self,
        cx: &dyn GuestContext,
        queue: u32,
        buffer: u32,
        offset: u64,
        data: u32,
        size: u64,
    ) -> anyhow::Result<()> {
        let (Some(queue), Some(buffer)) =
            (self.reg.queues.lookup(queue), self.reg.buffers.lookup(buffer))
        else {
            return Ok(());
        };

        let data = cx.read_bytes(data, size)?;
        self.backend
            .queue_write_buffer(queue, &buffer.buffer, offset, data);
        Ok(())
    }

    pub fn queue_write_texture(
        &mut self,
        cx: &dyn GuestContext,
        queue: u32,
        destination: u32,
        data: u32,
        data_size: u64,
        layout: u32,
        write_size: u32,
    ) -> anyhow::Result<()> {
        let Some(queue) = self.reg.queues.lookup(queue) else {
            return Ok(());
        };

        let decoder = self.decoder(cx);
        let Some(destination) = resolved(
            "webgpuQueueWriteTexture",
            decoder.texel_copy_texture_info(destination),
        )?
        else {
            return Ok(());
        };
        let layout = decoder.texel_copy_buffer_layout(layout)?;
        let write_size = decoder.extent_3d(write_size)?;

        let data = cx.read_bytes(data, data_size)?;
        self.backend
            .queue_write_texture(queue, &destination, data, &layout, &write_size);
        Ok(())
    }

    pub fn queue_on_submitted_work_done(
        &mut self,
        cx: &dyn GuestContext,
        queue: u32,
        callback_info: u32,
    ) -> anyhow::Result<u64> {
        let callback = CallbackRecord::decode(cx, callback_info)?;

        let Some(host_queue) = self.reg.queues.lookup(queue) else {
            self.complete(Completion::WorkDone {
                callback,
                result: Err(missing(self.reg.queues.kind(), queue)),
            });
            return Ok(0);
        };

        let request = self.backend.queue_on_submitted_work_done(host_queue);
        self.spawn_responder(request, move |result| Completion::WorkDone { callback, result });

        Ok(0)
    }
}
