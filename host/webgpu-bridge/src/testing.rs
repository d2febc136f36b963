//! A scriptable in-memory [`GpuBackend`] for exercising the bridge without a GPU.
//!
//! Every host object is a [`MockObject`]. The backend records each call it receives, answers
//! requests from scripted outcomes, and can hold asynchronous requests back until a test opens
//! their gates.

use std::{cell::RefCell, collections::VecDeque, fmt, rc::Rc};

use futures::{
    FutureExt,
    channel::oneshot,
    future::{self, LocalBoxFuture},
};
use rustc_hash::FxHashMap;

use crate::{
    GpuBackend, HostError, HostFuture, HostObject,
    backend::{AdapterInfo, CompilationMessage, DeviceLostInfo, TextureInfo},
    limits::Limits,
    records::{
        BindGroupDescriptor, BindGroupLayoutDescriptor, BufferDescriptor, Color,
        ComputePassDescriptor, ComputePipelineDescriptor, DeviceDescriptor, Extent3d,
        PipelineLayoutDescriptor, QuerySetDescriptor, RenderPassDescriptor,
        RenderPipelineDescriptor, RequestAdapterOptions, SamplerDescriptor,
        ShaderModuleDescriptor, Sym, SurfaceConfiguration, TexelCopyBufferLayout,
        TexelCopyTextureInfo, TextureDescriptor, TextureViewDescriptor,
    },
};

// === MockObject === //

#[derive(Debug, Clone, PartialEq)]
pub struct MockObject {
    pub id: u32,
    pub kind: &'static str,
    label: Option<String>,
}

impl MockObject {
    pub fn new(id: u32, kind: &'static str, label: &str) -> Self {
        Self {
            id,
            kind,
            label: (!label.is_empty()).then(|| label.to_owned()),
        }
    }
}

impl HostObject for MockObject {
    fn label(&self) -> Option<String> {
        self.label.clone()
    }

    fn set_label(&mut self, label: &str) {
        self.label = Some(label.to_owned());
    }
}

// === MockCall === //

/// One call the bridge made into the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub op: &'static str,
    pub detail: String,
}

// === MockBackend === //

/// Cloning yields another view of the same backend, so a test can keep one while the bridge
/// owns the other.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Rc<RefCell<MockState>>,
}

#[derive(Default)]
struct MockState {
    next_id: u32,
    calls: Vec<MockCall>,
    no_gpu: bool,
    no_adapter: bool,
    no_device: bool,
    failures: FxHashMap<&'static str, HostError>,
    features: Vec<String>,
    limits: Limits,
    adapter_info: AdapterInfo,
    compilation_messages: Vec<CompilationMessage>,
    preferred_format: Option<&'static str>,
    deferred: bool,
    gates: VecDeque<(&'static str, oneshot::Sender<()>)>,
    buffers: FxHashMap<u32, MockBuffer>,
    textures: FxHashMap<u32, TextureInfo>,
    error_scopes: Vec<Option<HostError>>,
    lost: FxHashMap<u32, oneshot::Sender<DeviceLostInfo>>,
    uncaptured: FxHashMap<u32, Box<dyn FnMut(HostError)>>,
}

#[derive(Debug, Clone)]
struct MockBuffer {
    data: Vec<u8>,
    usage: u64,
    map_state: &'static str,
}

impl fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MockBackend")
            .field("calls", &state.calls.len())
            .field("gates", &state.gates.len())
            .finish_non_exhaustive()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    // === Scripting === //

    /// Makes `create_instance` report that the host has no GPU.
    pub fn without_gpu(&self) {
        self.state.borrow_mut().no_gpu = true;
    }

    /// Makes adapter requests resolve with no adapter.
    pub fn without_adapter(&self) {
        self.state.borrow_mut().no_adapter = true;
    }

    /// Makes device requests resolve with no device.
    pub fn without_device(&self) {
        self.state.borrow_mut().no_device = true;
    }

    /// Fails the next call of `op` with `error`. Applies to the asynchronous requests
    /// (`instance_request_adapter`, `adapter_request_device`, `buffer_map_async`,
    /// `queue_on_submitted_work_done`, `shader_module_compilation_info`) and to
    /// `buffer_mapped_range`, `instance_create_surface` and `surface_current_texture`.
    pub fn fail_next(&self, op: &'static str, error: HostError) {
        self.state.borrow_mut().failures.insert(op, error);
    }

    pub fn set_features<S: Into<String>>(&self, features: impl IntoIterator<Item = S>) {
        self.state.borrow_mut().features = features.into_iter().map(Into::into).collect();
    }

    pub fn set_limits(&self, limits: Limits) {
        self.state.borrow_mut().limits = limits;
    }

    pub fn set_adapter_info(&self, info: AdapterInfo) {
        self.state.borrow_mut().adapter_info = info;
    }

    pub fn set_compilation_messages(&self, messages: Vec<CompilationMessage>) {
        self.state.borrow_mut().compilation_messages = messages;
    }

    pub fn set_preferred_format(&self, format: &'static str) {
        self.state.borrow_mut().preferred_format = Some(format);
    }

    /// Holds every later asynchronous request until [`open_gates`](Self::open_gates).
    pub fn defer_requests(&self) {
        self.state.borrow_mut().deferred = true;
    }

    /// Releases every held request, returning how many were released.
    pub fn open_gates(&self) -> usize {
        let gates = std::mem::take(&mut self.state.borrow_mut().gates);
        let count = gates.len();

        for (_, gate) in gates {
            let _ = gate.send(());
        }

        count
    }

    /// Names of the requests currently held back.
    pub fn held_requests(&self) -> Vec<&'static str> {
        self.state.borrow().gates.iter().map(|(op, _)| *op).collect()
    }

    /// Resolves the device's lost future. Only the first loss is reported.
    pub fn lose_device(&self, device: &MockObject, reason: &'static str, message: &str) {
        let sender = self.state.borrow_mut().lost.remove(&device.id);
        if let Some(sender) = sender {
            let _ = sender.send(DeviceLostInfo {
                reason,
                message: message.to_owned(),
            });
        }
    }

    /// Raises an error on `device`. An open error scope captures it; otherwise it goes to the
    /// device's uncaptured-error handler.
    pub fn raise_error(&self, device: &MockObject, error: HostError) {
        let handler = {
            let mut state = self.state.borrow_mut();

            if let Some(scope) = state.error_scopes.last_mut() {
                if scope.is_none() {
                    *scope = Some(error);
                }
                return;
            }

            state.uncaptured.remove(&device.id)
        };

        let Some(mut handler) = handler else {
            return;
        };

        handler(error);
        self.state
            .borrow_mut()
            .uncaptured
            .entry(device.id)
            .or_insert(handler);
    }

    // === Inspection === //

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.borrow().calls.clone()
    }

    pub fn ops(&self) -> Vec<&'static str> {
        self.state.borrow().calls.iter().map(|call| call.op).collect()
    }

    pub fn take_calls(&self) -> Vec<MockCall> {
        std::mem::take(&mut self.state.borrow_mut().calls)
    }

    /// The detail of the most recent call to `op`.
    pub fn last(&self, op: &str) -> Option<String> {
        self.state
            .borrow()
            .calls
            .iter()
            .rev()
            .find(|call| call.op == op)
            .map(|call| call.detail.clone())
    }

    pub fn called(&self, op: &str) -> bool {
        self.state.borrow().calls.iter().any(|call| call.op == op)
    }

    /// Current contents of a buffer created through this backend.
    pub fn buffer_contents(&self, buffer: &MockObject) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .buffers
            .get(&buffer.id)
            .map(|entry| entry.data.clone())
    }

    // === Internals === //

    fn log(&self, op: &'static str, detail: impl fmt::Debug) {
        self.state.borrow_mut().calls.push(MockCall {
            op,
            detail: format!("{detail:?}"),
        });
    }

    fn object(&self, kind: &'static str, label: &str) -> MockObject {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        MockObject::new(state.next_id, kind, label)
    }

    fn take_failure(&self, op: &'static str) -> Option<HostError> {
        self.state.borrow_mut().failures.remove(op)
    }

    /// Settles with `outcome`, after the test opens the gate when requests are deferred.
    fn gated<T: 'static>(&self, op: &'static str, outcome: Result<T, HostError>) -> HostFuture<T> {
        let gate = {
            let mut state = self.state.borrow_mut();
            state.deferred.then(|| {
                let (tx, rx) = oneshot::channel();
                state.gates.push_back((op, tx));
                rx
            })
        };

        async move {
            if let Some(gate) = gate
                && gate.await.is_err()
            {
                return Err(HostError::internal(format!("{op} was abandoned")));
            }

            outcome
        }
        .boxed_local()
    }

    fn request<T: 'static>(
        &self,
        op: &'static str,
        outcome: impl FnOnce() -> T,
    ) -> HostFuture<T> {
        let outcome = match self.take_failure(op) {
            Some(err) => Err(err),
            None => Ok(outcome()),
        };

        self.gated(op, outcome)
    }

    fn with_buffer<R>(&self, buffer: &MockObject, f: impl FnOnce(&mut MockBuffer) -> R) -> Option<R> {
        self.state.borrow_mut().buffers.get_mut(&buffer.id).map(f)
    }
}

impl GpuBackend for MockBackend {
    type Instance = MockObject;
    type Adapter = MockObject;
    type BindGroup = MockObject;
    type BindGroupLayout = MockObject;
    type Buffer = MockObject;
    type CommandBuffer = MockObject;
    type CommandEncoder = MockObject;
    type ComputePassEncoder = MockObject;
    type ComputePipeline = MockObject;
    type Device = MockObject;
    type PipelineLayout = MockObject;
    type QuerySet = MockObject;
    type Queue = MockObject;
    type RenderBundle = MockObject;
    type RenderBundleEncoder = MockObject;
    type RenderPassEncoder = MockObject;
    type RenderPipeline = MockObject;
    type Sampler = MockObject;
    type ShaderModule = MockObject;
    type Surface = MockObject;
    type Texture = MockObject;
    type TextureView = MockObject;

    // Instance
    fn create_instance(&self) -> Option<MockObject> {
        self.log("create_instance", ());
        let no_gpu = self.state.borrow().no_gpu;
        (!no_gpu).then(|| self.object("Instance", ""))
    }

    fn instance_create_surface(
        &self,
        _instance: &MockObject,
        selector: &str,
    ) -> Result<MockObject, HostError> {
        self.log("instance_create_surface", selector);
        match self.take_failure("instance_create_surface") {
            Some(err) => Err(err),
            None => Ok(self.object("Surface", selector)),
        }
    }

    fn instance_request_adapter(
        &self,
        _instance: &MockObject,
        options: Option<&RequestAdapterOptions>,
    ) -> HostFuture<Option<MockObject>> {
        self.log("instance_request_adapter", options);
        let no_adapter = self.state.borrow().no_adapter;
        self.request("instance_request_adapter", || {
            (!no_adapter).then(|| self.object("Adapter", ""))
        })
    }

    // Adapter
    fn adapter_features(&self, _adapter: &MockObject) -> Vec<String> {
        self.state.borrow().features.clone()
    }

    fn adapter_limits(&self, _adapter: &MockObject) -> Limits {
        self.state.borrow().limits.clone()
    }

    fn adapter_info(&self, _adapter: &MockObject) -> AdapterInfo {
        self.state.borrow().adapter_info.clone()
    }

    fn adapter_request_device(
        &self,
        _adapter: &MockObject,
        descriptor: Option<&DeviceDescriptor>,
    ) -> HostFuture<Option<MockObject>> {
        self.log("adapter_request_device", descriptor);
        let no_device = self.state.borrow().no_device;
        let label = descriptor.map_or("", |d| d.label.as_str());
        self.request("adapter_request_device", || {
            (!no_device).then(|| self.object("Device", label))
        })
    }

    // Device
    fn device_lost(&self, device: &MockObject) -> LocalBoxFuture<'static, DeviceLostInfo> {
        let (tx, rx) = oneshot::channel();
        self.state.borrow_mut().lost.insert(device.id, tx);

        async move {
            match rx.await {
                Ok(info) => info,
                Err(_) => future::pending().await,
            }
        }
        .boxed_local()
    }

    fn device_set_uncaptured_error_handler(
        &self,
        device: &MockObject,
        handler: Box<dyn FnMut(HostError)>,
    ) {
        self.state.borrow_mut().uncaptured.insert(device.id, handler);
    }

    fn device_features(&self, _device: &MockObject) -> Vec<String> {
        self.state.borrow().features.clone()
    }

    fn device_limits(&self, _device: &MockObject) -> Limits {
        self.state.borrow().limits.clone()
    }

    fn device_queue(&self, _device: &MockObject) -> MockObject {
        self.object("Queue", "")
    }

    fn device_destroy(&self, device: &MockObject) {
        self.log("device_destroy", device.id);
        self.lose_device(device, "destroyed", "device was destroyed");
    }

    fn device_create_bind_group(
        &self,
        _device: &MockObject,
        descriptor: &BindGroupDescriptor<Self>,
    ) -> MockObject {
        self.log("device_create_bind_group", descriptor);
        self.object("BindGroup", &descriptor.label)
    }

    fn device_create_bind_group_layout(
        &self,
        _device: &MockObject,
        descriptor: &BindGroupLayoutDescriptor,
    ) -> MockObject {
        self.log("device_create_bind_group_layout", descriptor);
        self.object("BindGroupLayout", &descriptor.label)
    }

    fn device_create_buffer(&self, _device: &MockObject, descriptor: &BufferDescriptor) -> MockObject {
        self.log("device_create_buffer", descriptor);
        let buffer = self.object("Buffer", &descriptor.label);

        self.state.borrow_mut().buffers.insert(
            buffer.id,
            MockBuffer {
                data: vec![0; descriptor.size as usize],
                usage: descriptor.usage,
                map_state: if descriptor.mapped_at_creation {
                    "mapped"
                } else {
                    "unmapped"
                },
            },
        );

        buffer
    }

    fn device_create_command_encoder(&self, _device: &MockObject, label: Option<&str>) -> MockObject {
        self.log("device_create_command_encoder", label);
        self.object("CommandEncoder", label.unwrap_or_default())
    }

    fn device_create_compute_pipeline(
        &self,
        _device: &MockObject,
        descriptor: &ComputePipelineDescriptor<Self>,
    ) -> MockObject {
        self.log("device_create_compute_pipeline", descriptor);
        self.object("ComputePipeline", &descriptor.label)
    }

    fn device_create_pipeline_layout(
        &self,
        _device: &MockObject,
        descriptor: &PipelineLayoutDescriptor<Self>,
    ) -> MockObject {
        self.log("device_create_pipeline_layout", descriptor);
        self.object("PipelineLayout", &descriptor.label)
    }

    fn device_create_query_set(
        &self,
        _device: &MockObject,
        descriptor: &QuerySetDescriptor,
    ) -> MockObject {
        self.log("device_create_query_set", descriptor);
        self.object("QuerySet", &descriptor.label)
    }

    fn device_create_render_pipeline(
        &self,
        _device: &MockObject,
        descriptor: &RenderPipelineDescriptor<Self>,
    ) -> MockObject {
        self.log("device_create_render_pipeline", descriptor);
        self.object("RenderPipeline", &descriptor.label)
    }

    fn device_create_sampler(
        &self,
        _device: &MockObject,
        descriptor: Option<&SamplerDescriptor>,
    ) -> MockObject {
        self.log("device_create_sampler", descriptor);
        self.object("Sampler", descriptor.map_or("", |d| d.label.as_str()))
    }

    fn device_create_shader_module(
        &self,
        _device: &MockObject,
        descriptor: &ShaderModuleDescriptor,
    ) -> MockObject {
        self.log("device_create_shader_module", descriptor);
        self.object("ShaderModule", &descriptor.label)
    }

    fn device_create_texture(
        &self,
        _device: &MockObject,
        descriptor: &TextureDescriptor,
    ) -> MockObject {
        self.log("device_create_texture", descriptor);
        let texture = self.object("Texture", &descriptor.label);

        self.state.borrow_mut().textures.insert(
            texture.id,
            TextureInfo {
                width: descriptor.size.width,
                height: descriptor.size.height,
                depth_or_array_layers: descriptor.size.depth_or_array_layers,
                mip_level_count: descriptor.mip_level_count,
                sample_count: descriptor.sample_count,
                dimension: descriptor.dimension.unwrap_or("2d"),
                format: descriptor.format.unwrap_or("rgba8unorm"),
                usage: descriptor.usage,
            },
        );

        texture
    }

    fn device_push_error_scope(&self, _device: &MockObject, filter: &'static str) {
        self.log("device_push_error_scope", filter);
        self.state.borrow_mut().error_scopes.push(None);
    }

    fn device_pop_error_scope(&self, _device: &MockObject) -> HostFuture<Option<HostError>> {
        self.log("device_pop_error_scope", ());
        let outcome = match self.state.borrow_mut().error_scopes.pop() {
            Some(captured) => Ok(captured),
            None => Err(HostError::internal("error scope stack is empty")),
        };

        self.gated("device_pop_error_scope", outcome)
    }

    // Buffer
    fn buffer_destroy(&self, buffer: &MockObject) {
        self.log("buffer_destroy", buffer.id);
    }

    fn buffer_size(&self, buffer: &MockObject) -> u64 {
        self.with_buffer(buffer, |entry| entry.data.len() as u64)
            .unwrap_or(0)
    }

    fn buffer_usage(&self, buffer: &MockObject) -> u64 {
        self.with_buffer(buffer, |entry| entry.usage).unwrap_or(0)
    }

    fn buffer_map_state(&self, buffer: &MockObject) -> &'static str {
        self.with_buffer(buffer, |entry| entry.map_state)
            .unwrap_or("unmapped")
    }

    fn buffer_map_async(
        &self,
        buffer: &MockObject,
        mode: u64,
        offset: u64,
        size: Option<u64>,
    ) -> HostFuture<()> {
        self.log("buffer_map_async", (buffer.id, mode, offset, size));

        let failure = self.take_failure("buffer_map_async");
        let outcome = match failure {
            Some(err) => Err(err),
            None => {
                self.with_buffer(buffer, |entry| entry.map_state = "mapped");
                Ok(())
            }
        };

        self.gated("buffer_map_async", outcome)
    }

    fn buffer_mapped_range(
        &self,
        buffer: &MockObject,
        offset: u64,
        size: Option<u64>,
    ) -> Result<Vec<u8>, HostError> {
        self.log("buffer_mapped_range", (buffer.id, offset, size));

        if let Some(err) = self.take_failure("buffer_mapped_range") {
            return Err(err);
        }

        self.with_buffer(buffer, |entry| {
            if entry.map_state != "mapped" {
                return Err(HostError::validation("buffer is not mapped"));
            }

            let start = offset as usize;
            let end = size.map_or(entry.data.len(), |size| start + size as usize);
            entry
                .data
                .get(start..end)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| HostError::validation("mapped range is out of bounds"))
        })
        .unwrap_or_else(|| Err(HostError::validation("unknown buffer")))
    }

    fn buffer_write_mapped_range(&self, buffer: &MockObject, offset: u64, data: &[u8]) {
        self.log("buffer_write_mapped_range", (buffer.id, offset, data.len()));
        self.with_buffer(buffer, |entry| {
            let start = offset as usize;
            if let Some(range) = entry.data.get_mut(start..start + data.len()) {
                range.copy_from_slice(data);
            }
        });
    }

    fn buffer_unmap(&self, buffer: &MockObject) {
        self.log("buffer_unmap", buffer.id);
        self.with_buffer(buffer, |entry| entry.map_state = "unmapped");
    }

    // Command encoder
    fn command_encoder_begin_render_pass(
        &self,
        _encoder: &mut MockObject,
        descriptor: &RenderPassDescriptor<Self>,
    ) -> MockObject {
        self.log("command_encoder_begin_render_pass", descriptor);
        self.object("RenderPassEncoder", &descriptor.label)
    }

    fn command_encoder_begin_compute_pass(
        &self,
        _encoder: &mut MockObject,
        descriptor: Option<&ComputePassDescriptor<Self>>,
    ) -> MockObject {
        self.log("command_encoder_begin_compute_pass", descriptor);
        self.object("ComputePassEncoder", descriptor.map_or("", |d| d.label.as_str()))
    }

    fn command_encoder_copy_buffer_to_buffer(
        &self,
        _encoder: &mut MockObject,
        source: &MockObject,
        source_offset: u64,
        destination: &MockObject,
        destination_offset: u64,
        size: u64,
    ) {
        self.log(
            "command_encoder_copy_buffer_to_buffer",
            (source.id, source_offset, destination.id, destination_offset, size),
        );
    }

    fn command_encoder_finish(&self, _encoder: &mut MockObject, label: Option<&str>) -> MockObject {
        self.log("command_encoder_finish", label);
        self.object("CommandBuffer", label.unwrap_or_default())
    }

    // Compute pass
    fn compute_pass_set_pipeline(&self, _pass: &mut MockObject, pipeline: &MockObject) {
        self.log("compute_pass_set_pipeline", pipeline.id);
    }

    fn compute_pass_set_bind_group(
        &self,
        _pass: &mut MockObject,
        index: u32,
        group: Option<&MockObject>,
        dynamic_offsets: &[u32],
    ) {
        self.log(
            "compute_pass_set_bind_group",
            (index, group.map(|group| group.id), dynamic_offsets),
        );
    }

    fn compute_pass_dispatch_workgroups(&self, _pass: &mut MockObject, x: u32, y: u32, z: u32) {
        self.log("compute_pass_dispatch_workgroups", (x, y, z));
    }

    fn compute_pass_end(&self, pass: &mut MockObject) {
        self.log("compute_pass_end", pass.id);
    }

    // Queue
    fn queue_submit(&self, _queue: &MockObject, commands: &[MockObject]) {
        let ids = commands.iter().map(|command| command.id).collect::<Vec<_>>();
        self.log("queue_submit", ids);
    }

    fn queue_write_buffer(&self, _queue: &MockObject, buffer: &MockObject, offset: u64, data: &[u8]) {
        self.log("queue_write_buffer", (buffer.id, offset, data));
        self.with_buffer(buffer, |entry| {
            let start = offset as usize;
            if let Some(range) = entry.data.get_mut(start..start + data.len()) {
                range.copy_from_slice(data);
            }
        });
    }

    fn queue_write_texture(
        &self,
        _queue: &MockObject,
        destination: &TexelCopyTextureInfo<Self>,
        data: &[u8],
        layout: &TexelCopyBufferLayout,
        size: &Extent3d,
    ) {
        self.log(
            "queue_write_texture",
            (destination.texture.id, data.len(), layout, size),
        );
    }

    fn queue_on_submitted_work_done(&self, _queue: &MockObject) -> HostFuture<()> {
        self.log("queue_on_submitted_work_done", ());
        self.request("queue_on_submitted_work_done", || ())
    }

    // Render pass
    fn render_pass_begin_occlusion_query(&self, _pass: &mut MockObject, index: u32) {
        self.log("render_pass_begin_occlusion_query", index);
    }

    fn render_pass_draw(
        &self,
        _pass: &mut MockObject,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        self.log(
            "render_pass_draw",
            (vertex_count, instance_count, first_vertex, first_instance),
        );
    }

    fn render_pass_draw_indexed(
        &self,
        _pass: &mut MockObject,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) {
        self.log(
            "render_pass_draw_indexed",
            (index_count, instance_count, first_index, base_vertex, first_instance),
        );
    }

    fn render_pass_draw_indexed_indirect(&self, _pass: &mut MockObject, buffer: &MockObject, offset: u64) {
        self.log("render_pass_draw_indexed_indirect", (buffer.id, offset));
    }

    fn render_pass_draw_indirect(&self, _pass: &mut MockObject, buffer: &MockObject, offset: u64) {
        self.log("render_pass_draw_indirect", (buffer.id, offset));
    }

    fn render_pass_end(&self, pass: &mut MockObject) {
        self.log("render_pass_end", pass.id);
    }

    fn render_pass_end_occlusion_query(&self, _pass: &mut MockObject) {
        self.log("render_pass_end_occlusion_query", ());
    }

    fn render_pass_execute_bundles(&self, _pass: &mut MockObject, bundles: &[MockObject]) {
        let ids = bundles.iter().map(|bundle| bundle.id).collect::<Vec<_>>();
        self.log("render_pass_execute_bundles", ids);
    }

    fn render_pass_insert_debug_marker(&self, _pass: &mut MockObject, label: &str) {
        self.log("render_pass_insert_debug_marker", label);
    }

    fn render_pass_pop_debug_group(&self, _pass: &mut MockObject) {
        self.log("render_pass_pop_debug_group", ());
    }

    fn render_pass_push_debug_group(&self, _pass: &mut MockObject, label: &str) {
        self.log("render_pass_push_debug_group", label);
    }

    fn render_pass_set_bind_group(
        &self,
        _pass: &mut MockObject,
        index: u32,
        group: Option<&MockObject>,
        dynamic_offsets: &[u32],
    ) {
        self.log(
            "render_pass_set_bind_group",
            (index, group.map(|group| group.id), dynamic_offsets),
        );
    }

    fn render_pass_set_blend_constant(&self, _pass: &mut MockObject, color: &Color) {
        self.log("render_pass_set_blend_constant", color);
    }

    fn render_pass_set_index_buffer(
        &self,
        _pass: &mut MockObject,
        buffer: &MockObject,
        format: Sym,
        offset: u64,
        size: Option<u64>,
    ) {
        self.log("render_pass_set_index_buffer", (buffer.id, format, offset, size));
    }

    fn render_pass_set_pipeline(&self, _pass: &mut MockObject, pipeline: &MockObject) {
        self.log("render_pass_set_pipeline", pipeline.id);
    }

    fn render_pass_set_scissor_rect(
        &self,
        _pass: &mut MockObject,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) {
        self.log("render_pass_set_scissor_rect", (x, y, width, height));
    }

    fn render_pass_set_stencil_reference(&self, _pass: &mut MockObject, value: u32) {
        self.log("render_pass_set_stencil_reference", value);
    }

    fn render_pass_set_vertex_buffer(
        &self,
        _pass: &mut MockObject,
        slot: u32,
        buffer: Option<&MockObject>,
        offset: u64,
        size: Option<u64>,
    ) {
        self.log(
            "render_pass_set_vertex_buffer",
            (slot, buffer.map(|buffer| buffer.id), offset, size),
        );
    }

    fn render_pass_set_viewport(
        &self,
        _pass: &mut MockObject,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        min_depth: f32,
        max_depth: f32,
    ) {
        self.log(
            "render_pass_set_viewport",
            (x, y, width, height, min_depth, max_depth),
        );
    }

    // Query set
    fn query_set_destroy(&self, query_set: &MockObject) {
        self.log("query_set_destroy", query_set.id);
    }

    // Shader module
    fn shader_module_compilation_info(
        &self,
        module: &MockObject,
    ) -> HostFuture<Vec<CompilationMessage>> {
        self.log("shader_module_compilation_info", module.id);
        let messages = self.state.borrow().compilation_messages.clone();
        self.request("shader_module_compilation_info", || messages)
    }

    // Surface
    fn surface_configure(
        &self,
        _surface: &MockObject,
        _device: &MockObject,
        config: &SurfaceConfiguration,
    ) {
        self.log("surface_configure", config);
    }

    fn surface_preferred_format(
        &self,
        _surface: Option<&MockObject>,
        _adapter: Option<&MockObject>,
    ) -> &'static str {
        self.state.borrow().preferred_format.unwrap_or("bgra8unorm")
    }

    fn surface_current_texture(&self, surface: &MockObject) -> Result<MockObject, HostError> {
        self.log("surface_current_texture", surface.id);

        if let Some(err) = self.take_failure("surface_current_texture") {
            return Err(err);
        }

        let texture = self.object("Texture", "");
        let format = self.surface_preferred_format(Some(surface), None);
        self.state.borrow_mut().textures.insert(
            texture.id,
            TextureInfo {
                width: 640,
                height: 480,
                depth_or_array_layers: 1,
                mip_level_count: 1,
                sample_count: 1,
                dimension: "2d",
                format,
                usage: 0x10,
            },
        );

        Ok(texture)
    }

    fn surface_present(&self, surface: &MockObject) {
        self.log("surface_present", surface.id);
    }

    fn surface_unconfigure(&self, surface: &MockObject) {
        self.log("surface_unconfigure", surface.id);
    }

    // Texture
    fn texture_create_view(
        &self,
        texture: &MockObject,
        descriptor: Option<&TextureViewDescriptor>,
    ) -> MockObject {
        self.log("texture_create_view", (texture.id, descriptor));
        self.object("TextureView", descriptor.map_or("", |d| d.label.as_str()))
    }

    fn texture_destroy(&self, texture: &MockObject) {
        self.log("texture_destroy", texture.id);
    }

    fn texture_info(&self, texture: &MockObject) -> TextureInfo {
        self.state
            .borrow()
            .textures
            .get(&texture.id)
            .cloned()
            .unwrap_or(TextureInfo {
                width: 0,
                height: 0,
                depth_or_array_layers: 0,
                mip_level_count: 0,
                sample_count: 0,
                dimension: "2d",
                format: "rgba8unorm",
                usage: 0,
            })
    }
}
