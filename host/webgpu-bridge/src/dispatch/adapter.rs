use wasmlink::{GuestContext, MemoryExt, StructCursor, require_addr};

use crate::{
    GpuBackend, GpuBridge,
    bridge::{Completion, STATUS_ERROR, STATUS_SUCCESS},
    callback::{CallbackRecord, stage_output},
    dispatch::{missing, write_supported_features},
    enums,
};

impl<B: GpuBackend> GpuBridge<B> {
    pub fn adapter_get_features(
        &mut self,
        cx: &mut dyn GuestContext,
        adapter: u32,
        out: u32,
    ) -> anyhow::Result<()> {
        let Some(adapter) = self.reg.adapters.lookup(adapter) else {
            return Ok(());
        };

        let features = self.backend.adapter_features(adapter);
        write_supported_features(cx, self.config.word_size, &features, out)
    }

    /// Fills `{ vendor, architecture, device, description, backendType, adapterType }`. The
    /// strings are guest allocations released by [`adapter_info_free_members`].
    ///
    /// [`adapter_info_free_members`]: Self::adapter_info_free_members
    pub fn adapter_get_info(
        &mut self,
        cx: &mut dyn GuestContext,
        adapter: u32,
        out: u32,
    ) -> anyhow::Result<u32> {
        let out = require_addr(out, "adapter info")?;
        let Some(adapter) = self.reg.adapters.lookup(adapter) else {
            return Ok(STATUS_ERROR);
        };

        let info = self.backend.adapter_info(adapter);
        let word = self.config.word_size;
        let string_view = self.layouts.string_view;

        stage_output(cx, |cx, staging| {
            let mut off = StructCursor::new(out);

            for text in [&info.vendor, &info.architecture, &info.device, &info.description] {
                let view = off.field(string_view);
                let data = staging.alloc_bytes(cx, text.as_bytes())?;
                cx.store_string_view(view, word, data, text.len() as u64)?;
            }

            cx.store_u32(off.field(4), enums::BACKEND_TYPE.ordinal(info.backend_type))?;
            cx.store_u32(off.field(4), enums::ADAPTER_TYPE.ordinal(info.adapter_type))?;

            Ok(STATUS_SUCCESS)
        })
    }

    pub fn adapter_info_free_members(
        &mut self,
        cx: &mut dyn GuestContext,
        info: u32,
    ) -> anyhow::Result<()> {
        let word = self.config.word_size;
        let mut off = StructCursor::required(info, "adapter info")?;

        for _ in 0..4 {
            let view = off.field(self.layouts.string_view);
            let data = cx.load_ptr(view)?;
            if data != 0 {
                cx.free(data)?;
                cx.store_string_view(view, word, 0, 0)?;
            }
        }

        Ok(())
    }

    pub fn adapter_get_limits(
        &mut self,
        cx: &mut dyn GuestContext,
        adapter: u32,
        out: u32,
    ) -> anyhow::Result<u32> {
        let Some(adapter) = self.reg.adapters.lookup(adapter) else {
            return Ok(STATUS_ERROR);
        };

        self.backend.adapter_limits(adapter).encode(cx, out)?;
        Ok(STATUS_SUCCESS)
    }

    pub fn adapter_has_feature(&mut self, adapter: u32, feature: i32) -> bool {
        let Some(adapter) = self.reg.adapters.lookup(adapter) else {
            return false;
        };

        enums::FEATURE_NAME.str(feature).is_some_and(|name| {
            self.backend
                .adapter_features(adapter)
                .iter()
                .any(|have| have == name)
        })
    }

    pub fn adapter_request_device(
        &mut self,
        cx: &dyn GuestContext,
        adapter: u32,
        descriptor: u32,
        callback_info: u32,
    ) -> anyhow::Result<u64> {
        let callback = CallbackRecord::decode(cx, callback_info)?;
        let decoded = self.decoder(cx).device_descriptor(descriptor)?;

        let (descriptor, lost, uncaptured) = match decoded {
            Some(d) => (Some(d.descriptor), d.device_lost, d.uncaptured_error),
            None => (None, CallbackRecord::default(), CallbackRecord::default()),
        };

        let Some(host_adapter) = self.reg.adapters.lookup(adapter) else {
            self.complete(Completion::Device {
                callback,
                lost,
                uncaptured,
                result: Err(missing(self.reg.adapters.kind(), adapter)),
            });
            return Ok(0);
        };

        let request = self
            .backend
            .adapter_request_device(host_adapter, descriptor.as_ref());

        self.spawn_responder(request, move |result| Completion::Device {
            callback,
            lost,
            uncaptured,
            result,
        });

        Ok(0)
    }
}
