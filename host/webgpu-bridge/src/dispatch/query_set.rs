use crate::{GpuBackend, GpuBridge};

impl<B: GpuBackend> GpuBridge<B> {
    pub fn query_set_destroy(&mut self, query_set: u32) {
        if let Some(query_set) = self.reg.query_sets.lookup(query_set) {
            self.backend.query_set_destroy(query_set);
        }
    }
}
