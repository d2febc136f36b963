use wasmlink::{FieldLayout, WordSize};

/// `(size, align)` of every record the guest embeds by value.
///
/// These follow the guest's C headers rather than being derived from the field list. Several
/// records end in reserved words or padding that the decoders never read, and the embedding
/// struct still has to step past them.
#[derive(Debug, Clone)]
pub struct Layouts {
    pub word: WordSize,
    pub string_view: FieldLayout,
    pub color: FieldLayout,
    pub extent_3d: FieldLayout,
    pub origin_3d: FieldLayout,
    pub stencil_face_state: FieldLayout,
    pub stencil_state: FieldLayout,
    pub depth_bias_state: FieldLayout,
    pub buffer_binding_layout: FieldLayout,
    pub sampler_binding_layout: FieldLayout,
    pub texture_binding_layout: FieldLayout,
    pub storage_texture_binding_layout: FieldLayout,
    pub bind_group_layout_entry: FieldLayout,
    pub bind_group_entry: FieldLayout,
    pub constant_entry: FieldLayout,
    pub programmable_stage: FieldLayout,
    pub vertex_attribute: FieldLayout,
    pub vertex_buffer_layout: FieldLayout,
    pub vertex_state: FieldLayout,
    pub primitive_state: FieldLayout,
    pub multisample_state: FieldLayout,
    pub color_target_state: FieldLayout,
    pub blend_component: FieldLayout,
    pub texel_copy_buffer_layout: FieldLayout,
    pub queue_descriptor: FieldLayout,
    pub render_pass_color_attachment: FieldLayout,
    pub callback_info: FieldLayout,
    pub compilation_message: FieldLayout,
}

impl Layouts {
    pub fn new(word: WordSize) -> Self {
        let w = word.bytes();
        let wide = word == WordSize::Eight;
        let l = FieldLayout::new;

        Self {
            word,
            string_view: l(2 * w, w),
            color: l(32, 8),
            extent_3d: l(12, 4),
            origin_3d: l(12, 4),
            stencil_face_state: l(16, 4),
            stencil_state: l(40, 4),
            depth_bias_state: l(12, 4),
            buffer_binding_layout: l(16, 4),
            sampler_binding_layout: l(4, 4),
            texture_binding_layout: l(12, 4),
            storage_texture_binding_layout: l(12, 8),
            bind_group_layout_entry: l(64, 8),
            bind_group_entry: l(32, 8),
            constant_entry: l(if wide { 32 } else { 24 }, 8),
            programmable_stage: l(8 + 4 * w, w),
            vertex_attribute: l(24, 8),
            vertex_buffer_layout: l(16 + 2 * w, 8),
            vertex_state: l(4 + 6 * w, w),
            primitive_state: l(28, 4),
            multisample_state: l(12, 4),
            color_target_state: l(16, 8),
            blend_component: l(12, 4),
            texel_copy_buffer_layout: l(16, 8),
            queue_descriptor: l(8, w),
            render_pass_color_attachment: l(56, 8),
            callback_info: l(16, 4),
            compilation_message: l(if wide { 64 } else { 48 }, 8),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(layouts: &Layouts) -> Vec<(u32, u32)> {
        [
            layouts.string_view,
            layouts.constant_entry,
            layouts.programmable_stage,
            layouts.vertex_buffer_layout,
            layouts.vertex_state,
            layouts.queue_descriptor,
            layouts.compilation_message,
        ]
        .iter()
        .map(|l| (l.size, l.align))
        .collect()
    }

    #[test]
    fn word_sized_records() {
        assert_eq!(
            pairs(&Layouts::new(WordSize::Four)),
            [(8, 4), (24, 8), (24, 4), (24, 8), (28, 4), (8, 4), (48, 8)]
        );
        assert_eq!(
            pairs(&Layouts::new(WordSize::Eight)),
            [(16, 8), (32, 8), (40, 8), (32, 8), (52, 8), (8, 8), (64, 8)]
        );
    }

    #[test]
    fn fixed_records_ignore_word_size() {
        let narrow = Layouts::new(WordSize::Four);
        let wide = Layouts::new(WordSize::Eight);

        assert_eq!(narrow.color, wide.color);
        assert_eq!(narrow.bind_group_layout_entry, FieldLayout::new(64, 8));
        assert_eq!(narrow.render_pass_color_attachment, FieldLayout::new(56, 8));
        assert_eq!(wide.callback_info, FieldLayout::new(16, 4));
    }
}
