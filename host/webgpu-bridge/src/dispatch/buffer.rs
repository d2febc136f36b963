use anyhow::ensure;
use wasmlink::{GuestContext, MemoryExt};

use crate::{
    GpuBackend, GpuBridge,
    bridge::Completion,
    callback::CallbackRecord,
    dispatch::{missing, size_arg},
    enums,
    resources::BufferMapping,
};

impl<B: GpuBackend> GpuBridge<B> {
    pub fn buffer_destroy(&mut self, buffer: u32) {
        if let Some(entry) = self.reg.buffers.lookup(buffer) {
            self.backend.buffer_destroy(&entry.buffer);
        }
    }

    /// Copies the mapped range into fresh guest memory and returns its address. The copy is
    /// written back and freed by [`buffer_unmap`](Self::buffer_unmap). Only one range may be
    /// out at a time.
    pub fn buffer_get_mapped_range(
        &mut self,
        cx: &mut dyn GuestContext,
        buffer: u32,
        offset: u64,
        size: u64,
    ) -> anyhow::Result<u32> {
        let size = size_arg(self.config.word_size, size);
        let Some(entry) = self.reg.buffers.lookup_mut(buffer) else {
            return Ok(0);
        };

        ensure!(entry.mapping.is_none(), "buffer {buffer} is already mapped");

        let range = match self.backend.buffer_mapped_range(&entry.buffer, offset, size) {
            Ok(range) => range,
            Err(err) => {
                tracing::warn!(buffer, %err, "failed to get mapped range");
                return Ok(0);
            }
        };

        let ptr = cx.alloc_bytes(&range)?;
        entry.mapping = Some(BufferMapping {
            ptr,
            offset,
            size: range.len() as u32,
        });

        Ok(ptr)
    }

    /// Same staging as [`buffer_get_mapped_range`](Self::buffer_get_mapped_range). The guest
    /// only reads the copy.
    pub fn buffer_get_const_mapped_range(
        &mut self,
        cx: &mut dyn GuestContext,
        buffer: u32,
        offset: u64,
        size: u64,
    ) -> anyhow::Result<u32> {
        self.buffer_get_mapped_range(cx, buffer, offset, size)
    }

    pub fn buffer_get_map_state(&mut self, buffer: u32) -> u32 {
        let state = match self.reg.buffers.lookup(buffer) {
            Some(entry) => self.backend.buffer_map_state(&entry.buffer),
            None => "unmapped",
        };

        enums::BUFFER_MAP_STATE.ordinal(state)
    }

    pub fn buffer_get_size(&mut self, buffer: u32) -> u64 {
        self.reg
            .buffers
            .lookup(buffer)
            .map_or(0, |entry| self.backend.buffer_size(&entry.buffer))
    }

    pub fn buffer_get_usage(&mut self, buffer: u32) -> u32 {
        self.reg
            .buffers
            .lookup(buffer)
            .map_or(0, |entry| self.backend.buffer_usage(&entry.buffer) as u32)
    }

    /// Writes any staged range back to the host, frees it, and unmaps the buffer.
    pub fn buffer_unmap(&mut self, cx: &mut dyn GuestContext, buffer: u32) -> anyhow::Result<()> {
        let Some(entry) = self.reg.buffers.lookup_mut(buffer) else {
            return Ok(());
        };

        if let Some(mapping) = entry.mapping.take() {
            let data = cx.read_bytes(mapping.ptr, u64::from(mapping.size))?;
            self.backend
                .buffer_write_mapped_range(&entry.buffer, mapping.offset, data);
            self.backend.buffer_unmap(&entry.buffer);
            cx.free(mapping.ptr)?;
        } else {
            self.backend.buffer_unmap(&entry.buffer);
        }

        Ok(())
    }

    pub fn buffer_map_async(
        &mut self,
        cx: &dyn GuestContext,
        buffer: u32,
        mode: u64,
        offset: u64,
        size: u64,
        callback_info: u32,
    ) -> anyhow::Result<u64> {
        let callback = CallbackRecord::decode(cx, callback_info)?;
        let size = size_arg(self.config.word_size, size);

        let Some(entry) = self.reg.buffers.lookup(buffer) else {
            self.complete(Completion::MapAsync {
                callback,
                result: Err(missing(self.reg.buffers.kind(), buffer)),
            });
            return Ok(0);
        };

        let request = self
            .backend
            .buffer_map_async(&entry.buffer, mode, offset, size);
        self.spawn_responder(request, move |result| Completion::MapAsync { callback, result });

        Ok(0)
    }
}
