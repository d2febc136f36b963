use anyhow::Context;
use wasmlink::GuestContext;

use crate::{
    GpuBackend, GpuBridge,
    bridge::{Completion, STATUS_ERROR, STATUS_SUCCESS, resolved},
    callback::CallbackRecord,
    dispatch::{missing, write_supported_features},
    enums,
    resources::BufferEntry,
};

impl<B: GpuBackend> GpuBridge<B> {
    pub fn device_create_bind_group(
        &mut self,
        cx: &dyn GuestContext,
        device: u32,
        descriptor: u32,
    ) -> anyhow::Result<u32> {
        let Some(device) = self.reg.devices.lookup(device) else {
            return Ok(0);
        };

        let decoded = self.decoder(cx).bind_group_descriptor(descriptor);
        let Some(descriptor) = resolved("webgpuDeviceCreateBindGroup", decoded)? else {
            return Ok(0);
        };

        let group = self.backend.device_create_bind_group(device, &descriptor);
        Ok(self.reg.bind_groups.create(group))
    }

    pub fn device_create_bind_group_layout(
        &mut self,
        cx: &dyn GuestContext,
        device: u32,
        descriptor: u32,
    ) -> anyhow::Result<u32> {
        let Some(device) = self.reg.devices.lookup(device) else {
            return Ok(0);
        };

        let descriptor = self.decoder(cx).bind_group_layout_descriptor(descriptor)?;
        let layout = self.backend.device_create_bind_group_layout(device, &descriptor);
        Ok(self.reg.bind_group_layouts.create(layout))
    }

    pub fn device_create_buffer(
        &mut self,
        cx: &dyn GuestContext,
        device: u32,
        descriptor: u32,
    ) -> anyhow::Result<u32> {
        let Some(device) = self.reg.devices.lookup(device) else {
            return Ok(0);
        };

        let descriptor = self.decoder(cx).buffer_descriptor(descriptor)?;
        let buffer = self.backend.device_create_buffer(device, &descriptor);
        Ok(self.reg.buffers.create(BufferEntry::new(buffer)))
    }

    pub fn device_create_command_encoder(
        &mut self,
        cx: &dyn GuestContext,
        device: u32,
        descriptor: u32,
    ) -> anyhow::Result<u32> {
        let Some(device) = self.reg.devices.lookup(device) else {
            return Ok(0);
        };

        let label = self.decoder(cx).label_descriptor(descriptor)?;
        let encoder = self
            .backend
            .device_create_command_encoder(device, label.as_deref());
        Ok(self.reg.command_encoders.create(encoder))
    }

    pub fn device_create_compute_pipeline(
        &mut self,
        cx: &dyn GuestContext,
        device: u32,
        descriptor: u32,
    ) -> anyhow::Result<u32> {
        let Some(device) = self.reg.devices.lookup(device) else {
            return Ok(0);
        };

        let decoded = self.decoder(cx).compute_pipeline_descriptor(descriptor);
        let Some(descriptor) = resolved("webgpuDeviceCreateComputePipeline", decoded)? else {
            return Ok(0);
        };

        let pipeline = self
            .backend
            .device_create_compute_pipeline(device, &descriptor);
        Ok(self.reg.compute_pipelines.create(pipeline))
    }

    pub fn device_create_pipeline_layout(
        &mut self,
        cx: &dyn GuestContext,
        device: u32,
        descriptor: u32,
    ) -> anyhow::Result<u32> {
        let Some(device) = self.reg.devices.lookup(device) else {
            return Ok(0);
        };

        let decoded = self.decoder(cx).pipeline_layout_descriptor(descriptor);
        let Some(descriptor) = resolved("webgpuDeviceCreatePipelineLayout", decoded)? else {
            return Ok(0);
        };

        let layout = self.backend.device_create_pipeline_layout(device, &descriptor);
        Ok(self.reg.pipeline_layouts.create(layout))
    }

    pub fn device_create_query_set(
        &mut self,
        cx: &dyn GuestContext,
        device: u32,
        descriptor: u32,
    ) -> anyhow::Result<u32> {
        let Some(device) = self.reg.devices.lookup(device) else {
            return Ok(0);
        };

        let descriptor = self.decoder(cx).query_set_descriptor(descriptor)?;
        let query_set = self.backend.device_create_query_set(device, &descriptor);
        Ok(self.reg.query_sets.create(query_set))
    }

    pub fn device_create_render_pipeline(
        &mut self,
        cx: &dyn GuestContext,
        device: u32,
        descriptor: u32,
    ) -> anyhow::Result<u32> {
        let Some(device) = self.reg.devices.lookup(device) else {
            return Ok(0);
        };

        let decoded = self.decoder(cx).render_pipeline_descriptor(descriptor);
        let Some(descriptor) = resolved("webgpuDeviceCreateRenderPipeline", decoded)? else {
            return Ok(0);
        };

        let pipeline = self
            .backend
            .device_create_render_pipeline(device, &descriptor);
        Ok(self.reg.render_pipelines.create(pipeline))
    }

    pub fn device_create_sampler(
        &mut self,
        cx: &dyn GuestContext,
        device: u32,
        descriptor: u32,
    ) -> anyhow::Result<u32> {
        let Some(device) = self.reg.devices.lookup(device) else {
            return Ok(0);
        };

        let descriptor = self.decoder(cx).sampler_descriptor(descriptor)?;
        let sampler = self
            .backend
            .device_create_sampler(device, descriptor.as_ref());
        Ok(self.reg.samplers.create(sampler))
    }

    pub fn device_create_shader_module(
        &mut self,
        cx: &dyn GuestContext,
        device: u32,
        descriptor: u32,
    ) -> anyhow::Result<u32> {
        let Some(device) = self.reg.devices.lookup(device) else {
            return Ok(0);
        };

        let descriptor = self.decoder(cx).shader_module_descriptor(descriptor)?;
        let module = self.backend.device_create_shader_module(device, &descriptor);
        Ok(self.reg.shader_modules.create(module))
    }

    pub fn device_create_texture(
        &mut self,
        cx: &dyn GuestContext,
        device: u32,
        descriptor: u32,
    ) -> anyhow::Result<u32> {
        let Some(device) = self.reg.devices.lookup(device) else {
            return Ok(0);
        };

        let descriptor = self.decoder(cx).texture_descriptor(descriptor)?;
        let texture = self.backend.device_create_texture(device, &descriptor);
        Ok(self.reg.textures.create(texture))
    }

    /// Every call hands out a fresh handle for the device's one queue.
    pub fn device_get_queue(&mut self, device: u32) -> u32 {
        let Some(device) = self.reg.devices.lookup(device) else {
            return 0;
        };

        let queue = self.backend.device_queue(device);
        self.reg.queues.create(queue)
    }

    pub fn device_get_features(
        &mut self,
        cx: &mut dyn GuestContext,
        device: u32,
        out: u32,
    ) -> anyhow::Result<()> {
        let Some(device) = self.reg.devices.lookup(device) else {
            return Ok(());
        };

        let features = self.backend.device_features(device);
        write_supported_features(cx, self.config.word_size, &features, out)
    }

    pub fn device_get_limits(
        &mut self,
        cx: &mut dyn GuestContext,
        device: u32,
        out: u32,
    ) -> anyhow::Result<u32> {
        let Some(device) = self.reg.devices.lookup(device) else {
            return Ok(STATUS_ERROR);
        };

        self.backend.device_limits(device).encode(cx, out)?;
        Ok(STATUS_SUCCESS)
    }

    pub fn device_has_feature(&mut self, device: u32, feature: i32) -> bool {
        let Some(device) = self.reg.devices.lookup(device) else {
            return false;
        };

        enums::FEATURE_NAME.str(feature).is_some_and(|name| {
            self.backend
                .device_features(device)
                .iter()
                .any(|have| have == name)
        })
    }

    pub fn device_destroy(&mut self, device: u32) {
        if let Some(device) = self.reg.devices.lookup(device) {
            self.backend.device_destroy(device);
        }
    }

    pub fn device_push_error_scope(&mut self, device: u32, filter: i32) -> anyhow::Result<()> {
        let filter = enums::ERROR_FILTER
            .str(filter)
            .with_context(|| format!("invalid error filter {filter}"))?;

        if let Some(device) = self.reg.devices.lookup(device) {
            self.backend.device_push_error_scope(device, filter);
        }

        Ok(())
    }

    pub fn device_pop_error_scope(
        &mut self,
        cx: &dyn GuestContext,
        device: u32,
        callback_info: u32,
    ) -> anyhow::Result<u64> {
        let callback = CallbackRecord::decode(cx, callback_info)?;

        let Some(host_device) = self.reg.devices.lookup(device) else {
            self.complete(Completion::PopErrorScope {
                callback,
                result: Err(missing(self.reg.devices.kind(), device)),
            });
            return Ok(0);
        };

        let request = self.backend.device_pop_error_scope(host_device);
        self.spawn_responder(request, move |result| Completion::PopErrorScope { callback, result });

        Ok(0)
    }
}
