use wasmlink::{GuestContext, MemoryExt, require_addr};

use crate::{
    GpuBackend, GpuBridge,
    bridge::Completion,
    callback::CallbackRecord,
    dispatch::missing,
};

impl<B: GpuBackend> GpuBridge<B> {
    /// The descriptor is accepted for ABI compatibility. Returns `0` when the host has no GPU.
    pub fn create_instance(&mut self, _descriptor: u32) -> u32 {
        match self.backend.create_instance() {
            Some(instance) => self.reg.instances.create(instance),
            None => {
                tracing::warn!("host graphics API is unavailable");
                0
            }
        }
    }

    pub fn instance_create_surface(
        &mut self,
        cx: &dyn GuestContext,
        instance: u32,
        selector_ptr: u32,
        selector_len: u64,
    ) -> anyhow::Result<u32> {
        let Some(instance) = self.reg.instances.lookup(instance) else {
            return Ok(0);
        };

        let selector_ptr = require_addr(selector_ptr, "surface selector")?;
        let selector = cx.load_string(selector_ptr, selector_len)?;

        match self.backend.instance_create_surface(instance, &selector) {
            Ok(surface) => Ok(self.reg.surfaces.create(surface)),
            Err(err) => {
                tracing::warn!(%selector, %err, "failed to create surface");
                Ok(0)
            }
        }
    }

    pub fn instance_request_adapter(
        &mut self,
        cx: &dyn GuestContext,
        instance: u32,
        options: u32,
        callback_info: u32,
    ) -> anyhow::Result<u64> {
        let callback = CallbackRecord::decode(cx, callback_info)?;
        let options = self.decoder(cx).request_adapter_options(options)?;

        let Some(host_instance) = self.reg.instances.lookup(instance) else {
            self.complete(Completion::Adapter {
                callback,
                result: Err(missing(self.reg.instances.kind(), instance)),
            });
            return Ok(0);
        };

        let request = self
            .backend
            .instance_request_adapter(host_instance, options.as_ref());

        self.spawn_responder(request, move |result| Completion::Adapter { callback, result });

        Ok(0)
    }
}
