use wasmlink::GuestContext;

use crate::{GpuBackend, GpuBridge};

impl<B: GpuBackend> GpuBridge<B> {
    pub fn compute_pass_set_pipeline(&mut self, pass: u32, pipeline: u32) {
        let Some(pipeline) = self.reg.compute_pipelines.lookup(pipeline) else {
            return;
        };
        let Some(pass) = self.reg.compute_pass_encoders.lookup_mut(pass) else {
            return;
        };

        self.backend.compute_pass_set_pipeline(pass, pipeline);
    }

    /// A zero `group` clears the slot.
    pub fn compute_pass_set_bind_group(
        &mut self,
        cx: &dyn GuestContext,
        pass: u32,
        index: u32,
        group: u32,
        offset_count: u64,
        offsets: u32,
    ) -> anyhow::Result<()> {
        let dynamic_offsets = self.decoder(cx).u32_array(offset_count, offsets)?;
        let group = self.decoder(cx).resolve_opt(&self.reg.bind_groups, group);

        let Some(pass) = self.reg.compute_pass_encoders.lookup_mut(pass) else {
            return Ok(());
        };

        self.backend
            .compute_pass_set_bind_group(pass, index, group.as_ref(), &dynamic_offsets);
        Ok(())
    }

    pub fn compute_pass_dispatch_workgroups(&mut self, pass: u32, x: u32, y: u32, z: u32) {
        if let Some(pass) = self.reg.compute_pass_encoders.lookup_mut(pass) {
            self.backend.compute_pass_dispatch_workgroups(pass, x, y, z);
        }
    }

    pub fn compute_pass_end(&mut self, pass: u32) {
        if let Some(pass) = self.reg.compute_pass_encoders.lookup_mut(pass) {
            self.backend.compute_pass_end(pass);
        }
    }
}
