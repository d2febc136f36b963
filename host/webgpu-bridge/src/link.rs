//! Installs the bridge's entry points into a wasmtime linker.

use wasmlink::{GuestContext, WordSize};
use wasmlink_wasmtime::{WslLinker, WslStoreExt, WslStoreState, with_caller};
use wasmtime::{Caller, WasmTy};

use crate::{BridgeConfig, GpuBackend, GpuBridge, ResourceKind};

/// The wasm type a guest `uint` travels as.
trait Word: WasmTy + Copy + Into<u64> + 'static {}

impl Word for u32 {}

impl Word for u64 {}

/// Lets entry point bodies return plain values as well as results.
trait EntryResult {
    type Output;

    fn into_result(self) -> anyhow::Result<Self::Output>;
}

macro_rules! plain_entry_results {
    ($($ty:ty),*) => {$(
        impl EntryResult for $ty {
            type Output = $ty;

            fn into_result(self) -> anyhow::Result<$ty> {
                Ok(self)
            }
        }

        impl EntryResult for anyhow::Result<$ty> {
            type Output = $ty;

            fn into_result(self) -> anyhow::Result<$ty> {
                self
            }
        }
    )*};
}

plain_entry_results!((), u32, u64);

impl EntryResult for bool {
    type Output = u32;

    fn into_result(self) -> anyhow::Result<u32> {
        Ok(u32::from(self))
    }
}

type BridgeCaller<'a, B> = Caller<'a, WslStoreState<GpuBridge<B>>>;

/// Defines every entry point under `config.import_module`, typing `uint` parameters after
/// `config.word_size`.
pub fn install<B: GpuBackend>(
    linker: &mut WslLinker<GpuBridge<B>>,
    config: &BridgeConfig,
) -> anyhow::Result<()> {
    match config.word_size {
        WordSize::Four => install_with_word::<B, u32>(linker, config.import_module)?,
        WordSize::Eight => install_with_word::<B, u64>(linker, config.import_module)?,
    }

    install_lifecycle::<B>(linker, config)?;

    tracing::debug!(module = config.import_module, word = ?config.word_size, "installed bridge");

    Ok(())
}

/// Delivers every settled request to the guest. Call this once per event-loop turn.
pub fn pump<B: GpuBackend>(
    store: &mut wasmtime::Store<WslStoreState<GpuBridge<B>>>,
) -> anyhow::Result<usize> {
    store.root(|bridge, cx| bridge.poll(cx))
}

macro_rules! entry_points {
    (
        $linker:ident, $module:ident;
        $($name:literal => |$bridge:ident, $cx:pat_param $(, $arg:ident: $ty:ty)*| $body:expr;)*
    ) => {$(
        $linker.func_wrap(
            $module,
            $name,
            |caller: BridgeCaller<'_, B> $(, $arg: $ty)*| {
                with_caller(caller, |$bridge: &mut GpuBridge<B>, $cx: &mut dyn GuestContext| {
                    EntryResult::into_result($body)
                })
            },
        )?;
    )*};
}

fn install_with_word<B: GpuBackend, W: Word>(
    linker: &mut WslLinker<GpuBridge<B>>,
    module: &'static str,
) -> anyhow::Result<()> {
    entry_points! {
        linker, module;

        // Instance
        "webgpuCreateInstance" => |bridge, _, desc: u32| bridge.create_instance(desc);
        "webgpuInstanceCreateSurface" => |bridge, cx, instance: u32, ptr: u32, len: W| {
            bridge.instance_create_surface(cx, instance, ptr, len.into())
        };
        "webgpuInstanceRequestAdapter" => |bridge, cx, instance: u32, options: u32, cb: u32| {
            bridge.instance_request_adapter(cx, instance, options, cb)
        };

        // Adapter
        "webgpuAdapterGetFeatures" => |bridge, cx, adapter: u32, out: u32| {
            bridge.adapter_get_features(cx, adapter, out)
        };
        "webgpuAdapterGetInfo" => |bridge, cx, adapter: u32, out: u32| {
            bridge.adapter_get_info(cx, adapter, out)
        };
        "webgpuAdapterGetLimits" => |bridge, cx, adapter: u32, out: u32| {
            bridge.adapter_get_limits(cx, adapter, out)
        };
        "webgpuAdapterHasFeature" => |bridge, _, adapter: u32, feature: i32| {
            bridge.adapter_has_feature(adapter, feature)
        };
        "webgpuAdapterRequestDevice" => |bridge, cx, adapter: u32, desc: u32, cb: u32| {
            bridge.adapter_request_device(cx, adapter, desc, cb)
        };
        "webgpuAdapterInfoFreeMembers" => |bridge, cx, info: u32| {
            bridge.adapter_info_free_members(cx, info)
        };

        // Buffer
        "webgpuBufferDestroy" => |bridge, _, buffer: u32| bridge.buffer_destroy(buffer);
        "webgpuBufferGetConstMappedRange" => |bridge, cx, buffer: u32, offset: W, size: W| {
            bridge.buffer_get_const_mapped_range(cx, buffer, offset.into(), size.into())
        };
        "webgpuBufferGetMappedRange" => |bridge, cx, buffer: u32, offset: W, size: W| {
            bridge.buffer_get_mapped_range(cx, buffer, offset.into(), size.into())
        };
        "webgpuBufferGetMapState" => |bridge, _, buffer: u32| {
            bridge.buffer_get_map_state(buffer)
        };
        "webgpuBufferGetSize" => |bridge, _, buffer: u32| bridge.buffer_get_size(buffer);
        "webgpuBufferGetUsage" => |bridge, _, buffer: u32| bridge.buffer_get_usage(buffer);
        "webgpuBufferUnmap" => |bridge, cx, buffer: u32| bridge.buffer_unmap(cx, buffer);
        "webgpuBufferMapAsync" => |
            bridge, cx, buffer: u32, mode: u64, offset: W, size: W, cb: u32
        | {
            bridge.buffer_map_async(cx, buffer, mode, offset.into(), size.into(), cb)
        };

        // Command encoder
        "webgpuCommandEncoderBeginRenderPass" => |bridge, cx, encoder: u32, desc: u32| {
            bridge.command_encoder_begin_render_pass(cx, encoder, desc)
        };
        "webgpuCommandEncoderBeginComputePass" => |bridge, cx, encoder: u32, desc: u32| {
            bridge.command_encoder_begin_compute_pass(cx, encoder, desc)
        };
        "webgpuCommandEncoderCopyBufferToBuffer" => |
            bridge, _, encoder: u32, src: u32, src_offset: u64, dst: u32, dst_offset: u64, size: u64
        | {
            bridge.command_encoder_copy_buffer_to_buffer(
                encoder, src, src_offset, dst, dst_offset, size,
            )
        };
        "webgpuCommandEncoderFinish" => |bridge, cx, encoder: u32, desc: u32| {
            bridge.command_encoder_finish(cx, encoder, desc)
        };

        // Compute pass
        "webgpuComputePassEncoderSetPipeline" => |bridge, _, pass: u32, pipeline: u32| {
            bridge.compute_pass_set_pipeline(pass, pipeline)
        };
        "webgpuComputePassEncoderSetBindGroup" => |
            bridge, cx, pass: u32, index: u32, group: u32, count: W, offsets: u32
        | {
            bridge.compute_pass_set_bind_group(cx, pass, index, group, count.into(), offsets)
        };
        "webgpuComputePassEncoderDispatchWorkgroups" => |
            bridge, _, pass: u32, x: u32, y: u32, z: u32
        | {
            bridge.compute_pass_dispatch_workgroups(pass, x, y, z)
        };
        "webgpuComputePassEncoderEnd" => |bridge, _, pass: u32| bridge.compute_pass_end(pass);

        // Device
        "webgpuDeviceCreateBindGroup" => |bridge, cx, device: u32, desc: u32| {
            bridge.device_create_bind_group(cx, device, desc)
        };
        "webgpuDeviceCreateBindGroupLayout" => |bridge, cx, device: u32, desc: u32| {
            bridge.device_create_bind_group_layout(cx, device, desc)
        };
        "webgpuDeviceCreateBuffer" => |bridge, cx, device: u32, desc: u32| {
            bridge.device_create_buffer(cx, device, desc)
        };
        "webgpuDeviceCreateCommandEncoder" => |bridge, cx, device: u32, desc: u32| {
            bridge.device_create_command_encoder(cx, device, desc)
        };
        "webgpuDeviceCreateComputePipeline" => |bridge, cx, device: u32, desc: u32| {
            bridge.device_create_compute_pipeline(cx, device, desc)
        };
        "webgpuDeviceCreatePipelineLayout" => |bridge, cx, device: u32, desc: u32| {
            bridge.device_create_pipeline_layout(cx, device, desc)
        };
        "webgpuDeviceCreateQuerySet" => |bridge, cx, device: u32, desc: u32| {
            bridge.device_create_query_set(cx, device, desc)
        };
        "webgpuDeviceCreateRenderPipeline" => |bridge, cx, device: u32, desc: u32| {
            bridge.device_create_render_pipeline(cx, device, desc)
        };
        "webgpuDeviceCreateSampler" => |bridge, cx, device: u32, desc: u32| {
            bridge.device_create_sampler(cx, device, desc)
        };
        "webgpuDeviceCreateShaderModule" => |bridge, cx, device: u32, desc: u32| {
            bridge.device_create_shader_module(cx, device, desc)
        };
        "webgpuDeviceCreateTexture" => |bridge, cx, device: u32, desc: u32| {
            bridge.device_create_texture(cx, device, desc)
        };
        "webgpuDeviceGetQueue" => |bridge, _, device: u32| bridge.device_get_queue(device);
        "webgpuDeviceGetFeatures" => |bridge, cx, device: u32, out: u32| {
            bridge.device_get_features(cx, device, out)
        };
        "webgpuDeviceGetLimits" => |bridge, cx, device: u32, out: u32| {
            bridge.device_get_limits(cx, device, out)
        };
        "webgpuDeviceHasFeature" => |bridge, _, device: u32, feature: i32| {
            bridge.device_has_feature(device, feature)
        };
        "webgpuDeviceDestroy" => |bridge, _, device: u32| bridge.device_destroy(device);
        "webgpuDevicePushErrorScope" => |bridge, _, device: u32, filter: i32| {
            bridge.device_push_error_scope(device, filter)
        };
        "webgpuDevicePopErrorScope" => |bridge, cx, device: u32, cb: u32| {
            bridge.device_pop_error_scope(cx, device, cb)
        };

        // Queue
        "webgpuQueueSubmit" => |bridge, cx, queue: u32, count: W, commands: u32| {
            bridge.queue_submit(cx, queue, count.into(), commands)
        };
        "webgpuQueueWriteBuffer" => |
            bridge, cx, queue: u32, buffer: u32, offset: u64, data: u32, size: W
        | {
            bridge.queue_write_buffer(cx, queue, buffer, offset, data, size.into())
        };
        "webgpuQueueWriteTexture" => |
            bridge, cx, queue: u32, dst: u32, data: u32, data_size: W, layout: u32, write_size: u32
        | {
            bridge.queue_write_texture(cx, queue, dst, data, data_size.into(), layout, write_size)
        };
        "webgpuQueueOnSubmittedWorkDone" => |bridge, cx, queue: u32, cb: u32| {
            bridge.queue_on_submitted_work_done(cx, queue, cb)
        };

        // Query set
        "webgpuQuerySetDestroy" => |bridge, _, query_set: u32| {
            bridge.query_set_destroy(query_set)
        };

        // Render pass
        "webgpuRenderPassEncoderBeginOcclusionQuery" => |bridge, _, pass: u32, index: u32| {
            bridge.render_pass_begin_occlusion_query(pass, index)
        };
        "webgpuRenderPassEncoderDraw" => |
            bridge, _, pass: u32, vertices: u32, instances: u32, first_vertex: u32, first_instance: u32
        | {
            bridge.render_pass_draw(pass, vertices, instances, first_vertex, first_instance)
        };
        "webgpuRenderPassEncoderDrawIndexed" => |
            bridge, _, pass: u32, indices: u32, instances: u32, first_index: u32, base_vertex: i32,
            first_instance: u32
        | {
            bridge.render_pass_draw_indexed(
                pass, indices, instances, first_index, base_vertex, first_instance,
            )
        };
        "webgpuRenderPassEncoderDrawIndexedIndirect" => |
            bridge, _, pass: u32, buffer: u32, offset: u64
        | {
            bridge.render_pass_draw_indexed_indirect(pass, buffer, offset)
        };
        "webgpuRenderPassEncoderDrawIndirect" => |bridge, _, pass: u32, buffer: u32, offset: u64| {
            bridge.render_pass_draw_indirect(pass, buffer, offset)
        };
        "webgpuRenderPassEncoderEnd" => |bridge, _, pass: u32| bridge.render_pass_end(pass);
        "webgpuRenderPassEncoderEndOcclusionQuery" => |bridge, _, pass: u32| {
            bridge.render_pass_end_occlusion_query(pass)
        };
        "webgpuRenderPassEncoderExecuteBundles" => |bridge, cx, pass: u32, count: W, bundles: u32| {
            bridge.render_pass_execute_bundles(cx, pass, count.into(), bundles)
        };
        "webgpuRenderPassEncoderInsertDebugMarker" => |bridge, cx, pass: u32, ptr: u32, len: W| {
            bridge.render_pass_insert_debug_marker(cx, pass, ptr, len.into())
        };
        "webgpuRenderPassEncoderPopDebugGroup" => |bridge, _, pass: u32| {
            bridge.render_pass_pop_debug_group(pass)
        };
        "webgpuRenderPassEncoderPushDebugGroup" => |bridge, cx, pass: u32, ptr: u32, len: W| {
            bridge.render_pass_push_debug_group(cx, pass, ptr, len.into())
        };
        "webgpuRenderPassEncoderSetBindGroup" => |
            bridge, cx, pass: u32, index: u32, group: u32, count: W, offsets: u32
        | {
            bridge.render_pass_set_bind_group(cx, pass, index, group, count.into(), offsets)
        };
        "webgpuRenderPassEncoderSetBlendConstant" => |bridge, cx, pass: u32, color: u32| {
            bridge.render_pass_set_blend_constant(cx, pass, color)
        };
        "webgpuRenderPassEncoderSetIndexBuffer" => |
            bridge, _, pass: u32, buffer: u32, format: i32, offset: u64, size: u64
        | {
            bridge.render_pass_set_index_buffer(pass, buffer, format, offset, size)
        };
        "webgpuRenderPassEncoderSetPipeline" => |bridge, _, pass: u32, pipeline: u32| {
            bridge.render_pass_set_pipeline(pass, pipeline)
        };
        "webgpuRenderPassEncoderSetScissorRect" => |
            bridge, _, pass: u32, x: u32, y: u32, width: u32, height: u32
        | {
            bridge.render_pass_set_scissor_rect(pass, x, y, width, height)
        };
        "webgpuRenderPassEncoderSetStencilReference" => |bridge, _, pass: u32, reference: u32| {
            bridge.render_pass_set_stencil_reference(pass, reference)
        };
        "webgpuRenderPassEncoderSetVertexBuffer" => |
            bridge, _, pass: u32, slot: u32, buffer: u32, offset: u64, size: u64
        | {
            bridge.render_pass_set_vertex_buffer(pass, slot, buffer, offset, size)
        };
        "webgpuRenderPassEncoderSetViewport" => |
            bridge, _, pass: u32, x: f32, y: f32, width: f32, height: f32, min_depth: f32,
            max_depth: f32
        | {
            bridge.render_pass_set_viewport(pass, x, y, width, height, min_depth, max_depth)
        };

        // Shader module
        "webgpuShaderModuleGetCompilationInfo" => |bridge, cx, module: u32, cb: u32| {
            bridge.shader_module_get_compilation_info(cx, module, cb)
        };

        // Surface
        "webgpuSurfaceConfigure" => |bridge, cx, surface: u32, device: u32, config: u32| {
            bridge.surface_configure(cx, surface, device, config)
        };
        "webgpuSurfaceGetCapabilities" => |bridge, cx, surface: u32, adapter: u32, out: u32| {
            bridge.surface_get_capabilities(cx, surface, adapter, out)
        };
        "webgpuSurfaceGetCurrentTexture" => |bridge, cx, surface: u32, out: u32| {
            bridge.surface_get_current_texture(cx, surface, out)
        };
        "webgpuSurfacePresent" => |bridge, _, surface: u32| bridge.surface_present(surface);
        "webgpuSurfaceUnconfigure" => |bridge, _, surface: u32| {
            bridge.surface_unconfigure(surface)
        };
        "webgpuSurfaceCapabilitiesFreeMembers" => |bridge, cx, caps: u32| {
            bridge.surface_capabilities_free_members(cx, caps)
        };
        "webgpuSupportedFeaturesFreeMembers" => |bridge, cx, count: W, features: u32| {
            bridge.supported_features_free_members(cx, count.into(), features)
        };

        // Texture
        "webgpuTextureCreateView" => |bridge, cx, texture: u32, desc: u32| {
            bridge.texture_create_view(cx, texture, desc)
        };
        "webgpuTextureDestroy" => |bridge, _, texture: u32| bridge.texture_destroy(texture);
        "webgpuTextureGetDepthOrArrayLayers" => |bridge, _, texture: u32| {
            bridge.texture_get_depth_or_array_layers(texture)
        };
        "webgpuTextureGetDimension" => |bridge, _, texture: u32| {
            bridge.texture_get_dimension(texture)
        };
        "webgpuTextureGetFormat" => |bridge, _, texture: u32| bridge.texture_get_format(texture);
        "webgpuTextureGetHeight" => |bridge, _, texture: u32| bridge.texture_get_height(texture);
        "webgpuTextureGetMipLevelCount" => |bridge, _, texture: u32| {
            bridge.texture_get_mip_level_count(texture)
        };
        "webgpuTextureGetSampleCount" => |bridge, _, texture: u32| {
            bridge.texture_get_sample_count(texture)
        };
        "webgpuTextureGetUsage" => |bridge, _, texture: u32| bridge.texture_get_usage(texture);
        "webgpuTextureGetWidth" => |bridge, _, texture: u32| bridge.texture_get_width(texture);
    }

    Ok(())
}

/// `webgpu<Kind>{AddRef,Release,SetLabel,GetLabel}` for every [`ResourceKind`].
fn install_lifecycle<B: GpuBackend>(
    linker: &mut WslLinker<GpuBridge<B>>,
    config: &BridgeConfig,
) -> anyhow::Result<()> {
    let module = config.import_module;

    for &kind in ResourceKind::ALL {
        let name = kind.name();

        linker.func_wrap(
            module,
            &format!("webgpu{name}AddRef"),
            move |caller: BridgeCaller<'_, B>, handle: u32| {
                with_caller(caller, |bridge, _| {
                    bridge.add_ref(kind, handle);
                    Ok(())
                })
            },
        )?;

        linker.func_wrap(
            module,
            &format!("webgpu{name}Release"),
            move |caller: BridgeCaller<'_, B>, handle: u32| {
                with_caller(caller, |bridge, cx| bridge.release(cx, kind, handle))
            },
        )?;

        linker.func_wrap(
            module,
            &format!("webgpu{name}GetLabel"),
            move |caller: BridgeCaller<'_, B>, handle: u32, out: u32| {
                with_caller(caller, |bridge, cx| bridge.get_label(cx, kind, handle, out))
            },
        )?;

        match config.word_size {
            WordSize::Four => define_set_label::<B, u32>(linker, module, kind)?,
            WordSize::Eight => define_set_label::<B, u64>(linker, module, kind)?,
        }
    }

    Ok(())
}

fn define_set_label<B: GpuBackend, W: Word>(
    linker: &mut WslLinker<GpuBridge<B>>,
    module: &'static str,
    kind: ResourceKind,
) -> anyhow::Result<()> {
    linker.func_wrap(
        module,
        &format!("webgpu{}SetLabel", kind.name()),
        move |caller: BridgeCaller<'_, B>, handle: u32, ptr: u32, len: W| {
            with_caller(caller, |bridge, cx| {
                bridge.set_label(cx, kind, handle, ptr, len.into())
            })
        },
    )?;

    Ok(())
}
