use wasmlink::{GuestContext, MemoryExt};

use crate::{GpuBackend, GpuBridge, WHOLE_SIZE, bridge::resolved, enums};

impl<B: GpuBackend> GpuBridge<B> {
    pub fn render_pass_begin_occlusion_query(&mut self, pass: u32, query_index: u32) {
        if let Some(pass) = self.reg.render_pass_encoders.lookup_mut(pass) {
            self.backend.render_pass_begin_occlusion_query(pass, query_index);
        }
    }

    pub fn render_pass_draw(
        &mut self,
        pass: u32,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        if let Some(pass) = self.reg.render_pass_encoders.lookup_mut(pass) {
            self.backend.render_pass_draw(
                pass,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            );
        }
    }

    pub fn render_pass_draw_indexed(
        &mut self,
        pass: u32,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) {
        if let Some(pass) = self.reg.render_pass_encoders.lookup_mut(pass) {
            self.backend.render_pass_draw_indexed(
                pass,
                index_count,
                instance_count,
                first_index,
                base_vertex,
                first_instance,
            );
        }
    }

    pub fn render_pass_draw_indexed_indirect(&mut self, pass: u32, buffer: u32, offset: u64) {
        let Some(buffer) = self.reg.buffers.lookup(buffer) else {
            return;
        };
        let Some(pass) = self.reg.render_pass_encoders.lookup_mut(pass) else {
            return;
        };

        self.backend
            .render_pass_draw_indexed_indirect(pass, &buffer.buffer, offset);
    }

    pub fn render_pass_draw_indirect(&mut self, pass: u32, buffer: u32, offset: u64) {
        let Some(buffer) = self.reg.buffers.lookup(buffer) else {
            return;
        };
        let Some(pass) = self.reg.render_pass_encoders.lookup_mut(pass) else {
            return;
        };

        self.backend
            .render_pass_draw_indirect(pass, &buffer.buffer, offset);
    }

    pub fn render_pass_end(&mut self, pass: u32) {
        if let Some(pass) = self.reg.render_pass_encoders.lookup_mut(pass) {
            self.backend.render_pass_end(pass);
        }
    }

    pub fn render_pass_end_occlusion_query(&mut self, pass: u32) {
        if let Some(pass) = self.reg.render_pass_encoders.lookup_mut(pass) {
            self.backend.render_pass_end_occlusion_query(pass);
        }
    }

    pub fn render_pass_execute_bundles(
        &mut self,
        cx: &dyn GuestContext,
        pass: u32,
        count: u64,
        bundles: u32,
    ) -> anyhow::Result<()> {
        if self.reg.render_pass_encoders.lookup(pass).is_none() {
            return Ok(());
        }

        let decoded = self
            .decoder(cx)
            .handle_array(&self.reg.render_bundles, count, bundles);
        let Some(bundles) = resolved("webgpuRenderPassEncoderExecuteBundles", decoded)? else {
            return Ok(());
        };

        if let Some(pass) = self.reg.render_pass_encoders.get_mut(pass) {
            self.backend.render_pass_execute_bundles(pass, &bundles);
        }
        Ok(())
    }

    pub fn render_pass_insert_debug_marker(
        &mut self,
        cx: &dyn GuestContext,
        pass: u32,
        label: u32,
        label_len: u64,
    ) -> anyhow::Result<()> {
        if let Some(pass) = self.reg.render_pass_encoders.lookup_mut(pass) {
            let label = cx.load_string(label, label_len)?;
            self.backend.render_pass_insert_debug_marker(pass, &label);
        }
        Ok(())
    }

    pub fn render_pass_pop_debug_group(&mut self, pass: u32) {
        if let Some(pass) = self.reg.render_pass_encoders.lookup_mut(pass) {
            self.backend.render_pass_pop_debug_group(pass);
        }
    }

    pub fn render_pass_push_debug_group(
        &mut self,
        cx: &dyn GuestContext,
        pass: u32,
        label: u32,
        label_len: u64,
    ) -> anyhow::Result<()> {
        if let Some(pass) = self.reg.render_pass_encoders.lookup_mut(pass) {
            let label = cx.load_string(label, label_len)?;
            self.backend.render_pass_push_debug_group(pass, &label);
        }
        Ok(())
    }

    /// A zero `group` clears the slot.
    pub fn render_pass_set_bind_group(
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

        if let Some(pass) = self.reg.render_pass_encoders.lookup_mut(pass) {
            self.backend
                .render_pass_set_bind_group(pass, index, group.as_ref(), &dynamic_offsets);
        }
        Ok(())
    }

    pub fn render_pass_set_blend_constant(
        &mut self,
        cx: &dyn GuestContext,
        pass: u32,
        color: u32,
    ) -> anyhow::Result<()> {
        if self.reg.render_pass_encoders.lookup(pass).is_none() {
            return Ok(());
        }

        let color = self.decoder(cx).color(color)?;
        if let Some(pass) = self.reg.render_pass_encoders.get_mut(pass) {
            self.backend.render_pass_set_blend_constant(pass, &color);
        }
        Ok(())
    }

    pub fn render_pass_set_index_buffer(
        &mut self,
        pass: u32,
        buffer: u32,
        format: i32,
        offset: u64,
        size: u64,
    ) {
        let Some(buffer) = self.reg.buffers.lookup(buffer) else {
            return;
        };
        let Some(pass) = self.reg.render_pass_encoders.lookup_mut(pass) else {
            return;
        };

        self.backend.render_pass_set_index_buffer(
            pass,
            &buffer.buffer,
            enums::INDEX_FORMAT.str(format),
            offset,
            (size != WHOLE_SIZE).then_some(size),
        );
    }

    pub fn render_pass_set_pipeline(&mut self, pass: u32, pipeline: u32) {
        let Some(pipeline) = self.reg.render_pipelines.lookup(pipeline) else {
            return;
        };
        let Some(pass) = self.reg.render_pass_encoders.lookup_mut(pass) else {
            return;
        };

        self.backend.render_pass_set_pipeline(pass, pipeline);
    }

    pub fn render_pass_set_scissor_rect(
        &mut self,
        pass: u32,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) {
        if let Some(pass) = self.reg.render_pass_encoders.lookup_mut(pass) {
            self.backend
                .render_pass_set_scissor_rect(pass, x, y, width, height);
        }
    }

    pub fn render_pass_set_stencil_reference(&mut self, pass: u32, reference: u32) {
        if let Some(pass) = self.reg.render_pass_encoders.lookup_mut(pass) {
            self.backend.render_pass_set_stencil_reference(pass, reference);
        }
    }

    /// A zero or stale `buffer` unbinds the slot.
    pub fn render_pass_set_vertex_buffer(
        &mut self,
        pass: u32,
        slot: u32,
        buffer: u32,
        offset: u64,
        size: u64,
    ) {
        let buffer = match buffer {
            0 => None,
            handle => self.reg.buffers.lookup(handle).map(|entry| &entry.buffer),
        };
        let Some(pass) = self.reg.render_pass_encoders.lookup_mut(pass) else {
            return;
        };

        self.backend.render_pass_set_vertex_buffer(
            pass,
            slot,
            buffer,
            offset,
            (size != WHOLE_SIZE).then_some(size),
        );
    }

    #[allow(clippy::too_many_arguments)]
    pub fn render_pass_set_viewport(
        &mut self,
        pass: u32,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        min_depth: f32,
        max_depth: f32,
    ) {
        if let Some(pass) = self.reg.render_pass_encoders.lookup_mut(pass) {
            self.backend
                .render_pass_set_viewport(pass, x, y, width, height, min_depth, max_depth);
        }
    }
}
