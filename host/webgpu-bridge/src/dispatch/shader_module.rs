use wasmlink::GuestContext;

use crate::{
    GpuBackend, GpuBridge, bridge::Completion, callback::CallbackRecord, dispatch::missing,
};

impl<B: GpuBackend> GpuBridge<B> {
    pub fn shader_module_get_compilation_info(
        &mut self,
        cx: &dyn GuestContext,
        module: u32,
        callback_info: u32,
    ) -> anyhow::Result<u64> {
        let callback = CallbackRecord::decode(cx, callback_info)?;

        let Some(host_module) = self.reg.shader_modules.lookup(module) else {
            self.complete(Completion::CompilationInfo {
                callback,
                result: Err(missing(self.reg.shader_modules.kind(), module)),
            });
            return Ok(0);
        };

        let request = self.backend.shader_module_compilation_info(host_module);
        self.spawn_responder(request, move |result| Completion::CompilationInfo {
            callback,
            result,
        });

        Ok(0)
    }
}
