use wasmlink::{GuestCall, GuestVal, MemoryExt, VecGuest, WordSize};
use webgpu_bridge::{
    BridgeConfig, GpuBridge, HostError, ResourceKind, STATUS_ERROR, STATUS_SUCCESS,
    backend::{AdapterInfo, CompilationMessage},
    enums,
    testing::{MockBackend, MockObject},
};

const MEMORY: u32 = 1 << 16;

/// Test-owned structures live well above anything the bump allocator hands out.
const SCRATCH: u32 = 0xC000;

fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Harness {
    backend: MockBackend,
    bridge: GpuBridge<MockBackend>,
    guest: VecGuest,
    word: WordSize,
}

impl Harness {
    fn new() -> Self {
        Self::with_word(WordSize::Four)
    }

    fn with_word(word: WordSize) -> Self {
        init_test_logging();

        let backend = MockBackend::new();
        let config = BridgeConfig::default().with_word_size(word);

        Self {
            bridge: GpuBridge::new(backend.clone(), config),
            backend,
            guest: VecGuest::new(MEMORY),
            word,
        }
    }

    fn poll(&mut self) -> usize {
        self.bridge.poll(&mut self.guest).unwrap()
    }

    /// Writes a callback record whose userdata words are derived from `func`.
    fn callback(&mut self, at: u32, func: u32) -> u32 {
        self.guest.store_u32(at, func).unwrap();
        self.guest.store_u32(at + 4, func * 100).unwrap();
        self.guest.store_u32(at + 8, func * 100 + 1).unwrap();
        at
    }

    fn string_view(&mut self, at: u32, data_at: u32, text: &str) {
        self.guest.write_bytes(data_at, text.as_bytes()).unwrap();
        self.guest
            .store_string_view(at, self.word, data_at, text.len() as u64)
            .unwrap();
    }

    fn message(&self, call: &GuestCall, idx: usize) -> String {
        let view = call.arg_u32(idx).unwrap();
        self.guest.load_string_view(view, self.word).unwrap()
    }

    fn only_call(&mut self) -> GuestCall {
        let mut calls = self.guest.take_calls();
        assert_eq!(calls.len(), 1, "expected exactly one callback: {calls:?}");
        calls.remove(0)
    }

    fn instance(&mut self) -> u32 {
        let instance = self.bridge.create_instance(0);
        assert_ne!(instance, 0);
        instance
    }

    fn adapter(&mut self) -> u32 {
        let instance = self.instance();
        let cb = self.callback(SCRATCH, 1);
        self.bridge
            .instance_request_adapter(&self.guest, instance, 0, cb)
            .unwrap();
        self.poll();
        self.only_call().arg_u32(1).unwrap()
    }

    /// Requests a device whose lost and uncaptured-error callbacks are tables 5 and 6.
    fn device(&mut self) -> u32 {
        let adapter = self.adapter();

        let desc = SCRATCH + 0x100;
        self.callback(desc + 28, 5);
        self.callback(desc + 44, 6);

        let cb = self.callback(SCRATCH, 2);
        self.bridge
            .adapter_request_device(&self.guest, adapter, desc, cb)
            .unwrap();
        self.poll();

        let call = self.only_call();
        assert_eq!(
            call.arg_u32(0),
            Some(enums::REQUEST_DEVICE_STATUS.ordinal("Success"))
        );
        call.arg_u32(1).unwrap()
    }

    fn device_object(&self, device: u32) -> MockObject {
        self.bridge.registries().devices.get(device).cloned().unwrap()
    }

    fn buffer(&mut self, device: u32, label: &str, size: u64, mapped: bool) -> u32 {
        let desc = SCRATCH + 0x200;
        self.string_view(desc, desc + 0x80, label);
        self.guest.store_u64(desc + 8, size).unwrap();
        self.guest.store_u64(desc + 16, 0x09).unwrap();
        self.guest.store_b32(desc + 24, mapped).unwrap();

        let buffer = self
            .bridge
            .device_create_buffer(&self.guest, device, desc)
            .unwrap();
        assert_ne!(buffer, 0);
        buffer
    }
}

// === Requests === //

#[test]
fn adapter_request_delivers_once() {
    let mut h = Harness::new();
    let instance = h.instance();
    let cb = h.callback(SCRATCH, 3);

    let ret = h
        .bridge
        .instance_request_adapter(&h.guest, instance, 0, cb)
        .unwrap();
    assert_eq!(ret, 0);
    assert!(h.guest.calls().is_empty());

    assert_eq!(h.poll(), 1);
    let call = h.only_call();
    assert_eq!(call.func, 3);
    assert_eq!(
        call.arg_u32(0),
        Some(enums::REQUEST_ADAPTER_STATUS.ordinal("Success"))
    );

    let adapter = call.arg_u32(1).unwrap();
    assert!(h.bridge.registries().adapters.contains(adapter));
    assert_eq!(h.message(&call, 2), "");
    assert_eq!(call.args[3..], [GuestVal::I32(300), GuestVal::I32(301)]);

    // Only the shared empty message view stays behind.
    assert_eq!(h.guest.live_allocations(), 1);
    assert_eq!(h.poll(), 0);
    assert!(h.guest.calls().is_empty());
}

#[test]
fn adapter_request_failure_frees_message() {
    let mut h = Harness::new();
    let instance = h.instance();
    let cb = h.callback(SCRATCH, 3);
    h.backend
        .fail_next("instance_request_adapter", HostError::internal("driver crashed"));

    h.bridge
        .instance_request_adapter(&h.guest, instance, 0, cb)
        .unwrap();
    h.poll();

    let call = h.only_call();
    assert_eq!(
        call.arg_u32(0),
        Some(enums::REQUEST_ADAPTER_STATUS.ordinal("Error"))
    );
    assert_eq!(call.arg_u32(1), Some(0));
    assert_eq!(h.message(&call, 2), "driver crashed");

    let message = call.arg_u32(2).unwrap();
    assert_eq!(h.guest.freed(), [message]);
    assert_eq!(h.guest.live_allocations(), 0);
}

#[test]
fn adapter_request_without_adapter_is_unavailable() {
    let mut h = Harness::new();
    h.backend.without_adapter();
    let instance = h.instance();
    let cb = h.callback(SCRATCH, 3);

    h.bridge
        .instance_request_adapter(&h.guest, instance, 0, cb)
        .unwrap();
    h.poll();

    let call = h.only_call();
    assert_eq!(
        call.arg_u32(0),
        Some(enums::REQUEST_ADAPTER_STATUS.ordinal("Unavailable"))
    );
    assert_eq!(h.message(&call, 2), "No adapter found");
}

#[test]
fn request_against_missing_object_reports_error() {
    let mut h = Harness::new();
    let cb = h.callback(SCRATCH, 3);

    h.bridge
        .instance_request_adapter(&h.guest, 99, 0, cb)
        .unwrap();
    assert_eq!(h.bridge.queued(), 1);
    assert!(h.backend.ops().is_empty());

    h.poll();
    let call = h.only_call();
    assert_eq!(
        call.arg_u32(0),
        Some(enums::REQUEST_ADAPTER_STATUS.ordinal("Error"))
    );
    assert!(h.message(&call, 2).contains("Instance handle 99"));
}

#[test]
fn deferred_requests_wait_for_host() {
    let mut h = Harness::new();
    let device = h.device();
    let buffer = h.buffer(device, "staging", 16, false);
    h.backend.defer_requests();

    let cb = h.callback(SCRATCH, 4);
    h.bridge
        .buffer_map_async(&h.guest, buffer, 1, 0, u64::from(u32::MAX), cb)
        .unwrap();

    assert_eq!(h.poll(), 0);
    assert_eq!(h.backend.held_requests(), ["buffer_map_async"]);
    assert!(h.backend.last("buffer_map_async").unwrap().ends_with("1, 0, None)"));

    assert_eq!(h.backend.open_gates(), 1);
    assert_eq!(h.poll(), 1);

    let call = h.only_call();
    assert_eq!(
        call.arg_u32(0),
        Some(enums::MAP_ASYNC_STATUS.ordinal("Success"))
    );
    assert_eq!(
        h.bridge.buffer_get_map_state(buffer),
        enums::BUFFER_MAP_STATE.ordinal("mapped")
    );
}

#[test]
fn wide_word_messages() {
    let mut h = Harness::with_word(WordSize::Eight);
    let instance = h.instance();
    let cb = h.callback(SCRATCH, 3);
    h.backend
        .fail_next("instance_request_adapter", HostError::validation("bad options"));

    h.bridge
        .instance_request_adapter(&h.guest, instance, 0, cb)
        .unwrap();
    h.poll();

    let call = h.only_call();
    assert_eq!(h.message(&call, 2), "bad options");
}

#[test]
fn trapping_callback_still_frees() {
    let mut h = Harness::new();
    let instance = h.instance();
    let cb = h.callback(SCRATCH, 3);
    h.backend
        .fail_next("instance_request_adapter", HostError::internal("lost"));
    h.guest.trap_on(3);

    h.bridge
        .instance_request_adapter(&h.guest, instance, 0, cb)
        .unwrap();

    assert!(h.bridge.poll(&mut h.guest).is_err());
    assert_eq!(h.guest.freed().len(), 1);
    assert_eq!(h.guest.live_allocations(), 0);
}

#[test]
fn adapter_without_callback_is_not_registered() {
    let mut h = Harness::new();
    let instance = h.instance();
    let cb = h.callback(SCRATCH, 0);

    h.bridge
        .instance_request_adapter(&h.guest, instance, 0, cb)
        .unwrap();
    h.poll();

    assert!(h.guest.calls().is_empty());
    assert!(h.bridge.registries().adapters.is_empty());
}

#[test]
fn device_without_callback_is_not_registered() {
    let mut h = Harness::new();
    let adapter = h.adapter();

    let desc = SCRATCH + 0x100;
    h.callback(desc + 28, 5);
    h.callback(desc + 44, 6);

    let cb = h.callback(SCRATCH, 0);
    h.bridge
        .adapter_request_device(&h.guest, adapter, desc, cb)
        .unwrap();
    h.poll();

    assert!(h.guest.calls().is_empty());
    assert!(h.bridge.registries().devices.is_empty());
    assert_eq!(h.bridge.queued(), 0);
}

// === Lifecycle === //

#[test]
fn release_drops_after_last_reference() {
    let mut h = Harness::new();
    let device = h.device();
    let buffer = h.buffer(device, "", 4, false);

    h.bridge.add_ref(ResourceKind::Buffer, buffer);
    assert_eq!(
        h.bridge.registries().ref_count(ResourceKind::Buffer, buffer),
        2
    );

    h.bridge
        .release(&mut h.guest, ResourceKind::Buffer, buffer)
        .unwrap();
    assert!(h.bridge.registries().buffers.contains(buffer));

    h.bridge
        .release(&mut h.guest, ResourceKind::Buffer, buffer)
        .unwrap();
    assert!(!h.bridge.registries().buffers.contains(buffer));

    // Stale handles are ignored everywhere.
    h.bridge
        .release(&mut h.guest, ResourceKind::Buffer, buffer)
        .unwrap();
    assert_eq!(h.bridge.buffer_get_size(buffer), 0);
}

#[test]
fn labels_round_trip() {
    let mut h = Harness::new();
    let device = h.device();
    let buffer = h.buffer(device, "verts", 4, false);
    let out = SCRATCH + 0x400;

    let status = h
        .bridge
        .get_label(&mut h.guest, ResourceKind::Buffer, buffer, out)
        .unwrap();
    assert_eq!(status, STATUS_SUCCESS);
    assert_eq!(h.guest.load_string_view(out, h.word).unwrap(), "verts");

    h.guest.write_bytes(SCRATCH + 0x500, b"indices").unwrap();
    h.bridge
        .set_label(&h.guest, ResourceKind::Buffer, buffer, SCRATCH + 0x500, 7)
        .unwrap();
    h.bridge
        .get_label(&mut h.guest, ResourceKind::Buffer, buffer, out)
        .unwrap();
    assert_eq!(h.guest.load_string_view(out, h.word).unwrap(), "indices");

    let missing = h
        .bridge
        .get_label(&mut h.guest, ResourceKind::Texture, 77, out)
        .unwrap();
    assert_eq!(missing, STATUS_ERROR);
}

#[test]
fn released_buffer_leaves_other_objects_alone() {
    let mut h = Harness::new();
    let device = h.device();
    let queue = h.bridge.device_get_queue(device);
    let encoder = h
        .bridge
        .device_create_command_encoder(&h.guest, device, 0)
        .unwrap();
    let buffer = h.buffer(device, "staging", 16, false);
    let other = h.buffer(device, "", 16, false);

    h.guest.write_bytes(SCRATCH + 0x400, &[7; 8]).unwrap();
    h.bridge
        .queue_write_buffer(&h.guest, queue, buffer, 0, SCRATCH + 0x400, 8)
        .unwrap();
    h.bridge
        .command_encoder_copy_buffer_to_buffer(encoder, buffer, 0, other, 0, 8);
    assert!(h.backend.called("queue_write_buffer"));
    assert!(h.backend.called("command_encoder_copy_buffer_to_buffer"));

    h.bridge
        .release(&mut h.guest, ResourceKind::Buffer, buffer)
        .unwrap();
    h.bridge
        .release(&mut h.guest, ResourceKind::Buffer, buffer)
        .unwrap();

    let reg = h.bridge.registries();
    assert!(reg.buffers.get(buffer).is_none());
    assert_eq!(reg.buffers.len(), 1);
    assert!(reg.buffers.contains(other));
    assert!(reg.devices.contains(device));
    assert!(reg.queues.contains(queue));
    assert!(reg.command_encoders.contains(encoder));

    let ops = h.backend.ops().len();
    h.bridge
        .command_encoder_copy_buffer_to_buffer(encoder, buffer, 0, other, 0, 8);
    assert_eq!(h.backend.ops().len(), ops);
    assert_eq!(h.bridge.buffer_get_size(buffer), 0);
    assert_eq!(h.bridge.buffer_get_size(other), 16);
}

#[test]
fn failed_label_copy_is_freed() {
    let mut h = Harness::new();
    let device = h.device();
    let buffer = h.buffer(device, "verts", 4, false);
    let live_before = h.guest.live_allocations();

    // The length word lands past the end of memory.
    let out = MEMORY - 4;
    assert!(
        h.bridge
            .get_label(&mut h.guest, ResourceKind::Buffer, buffer, out)
            .is_err()
    );
    assert_eq!(h.guest.live_allocations(), live_before);
}

// === Buffers === //

#[test]
fn unmap_writes_staged_range_back() {
    let mut h = Harness::new();
    let device = h.device();
    let buffer = h.buffer(device, "", 8, true);

    let range = h
        .bridge
        .buffer_get_mapped_range(&mut h.guest, buffer, 0, u64::from(u32::MAX))
        .unwrap();
    assert_ne!(range, 0);
    h.guest.write_bytes(range, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

    // Only one range may be staged at a time.
    assert!(
        h.bridge
            .buffer_get_mapped_range(&mut h.guest, buffer, 0, 4)
            .is_err()
    );

    h.bridge.buffer_unmap(&mut h.guest, buffer).unwrap();

    let host = h.bridge.registries().buffers.get(buffer).unwrap().buffer.clone();
    assert_eq!(h.backend.buffer_contents(&host).unwrap(), [1, 2, 3, 4, 5, 6, 7, 8]);
    assert!(h.guest.freed().contains(&range));
    assert_eq!(
        h.bridge.buffer_get_map_state(buffer),
        enums::BUFFER_MAP_STATE.ordinal("unmapped")
    );
}

#[test]
fn mapped_range_of_unmapped_buffer_is_null() {
    let mut h = Harness::new();
    let device = h.device();
    let buffer = h.buffer(device, "", 8, false);

    let range = h
        .bridge
        .buffer_get_mapped_range(&mut h.guest, buffer, 0, 8)
        .unwrap();
    assert_eq!(range, 0);
}

#[test]
fn releasing_mapped_buffer_frees_staging() {
    let mut h = Harness::new();
    let device = h.device();
    let buffer = h.buffer(device, "", 8, true);

    let range = h
        .bridge
        .buffer_get_mapped_range(&mut h.guest, buffer, 4, 4)
        .unwrap();
    assert!(h.guest.is_live(range));

    h.bridge
        .release(&mut h.guest, ResourceKind::Buffer, buffer)
        .unwrap();
    assert!(!h.guest.is_live(range));
}

// === Devices === //

#[test]
fn device_lost_reports_handle_and_reason() {
    let mut h = Harness::new();
    let device = h.device();
    let object = h.device_object(device);

    assert_eq!(h.poll(), 0);
    h.backend.lose_device(&object, "destroyed", "device dropped");
    assert_eq!(h.poll(), 1);

    let call = h.only_call();
    assert_eq!(call.func, 5);

    let device_ptr = call.arg_u32(0).unwrap();
    assert_eq!(h.guest.load_u32(device_ptr).unwrap(), device);
    assert!(!h.guest.is_live(device_ptr));
    assert_eq!(
        call.arg_u32(1),
        Some(enums::DEVICE_LOST_REASON.ordinal("destroyed"))
    );
    assert_eq!(h.message(&call, 2), "device dropped");
    assert_eq!(call.args[3..], [GuestVal::I32(500), GuestVal::I32(501)]);
}

#[test]
fn uncaptured_errors_reach_the_guest() {
    let mut h = Harness::new();
    let device = h.device();
    let object = h.device_object(device);

    h.backend
        .raise_error(&object, HostError::validation("bad binding"));
    assert_eq!(h.bridge.queued(), 1);
    h.poll();

    let call = h.only_call();
    assert_eq!(call.func, 6);
    assert_eq!(call.arg_u32(0), Some(device));
    assert_eq!(call.arg_u32(1), Some(enums::ERROR_TYPE.ordinal("validation")));
    assert_eq!(h.message(&call, 2), "bad binding");

    h.backend
        .raise_error(&object, HostError::out_of_memory("heap full"));
    h.poll();
    assert_eq!(
        h.only_call().arg_u32(1),
        Some(enums::ERROR_TYPE.ordinal("out-of-memory"))
    );
}

#[test]
fn error_scopes_capture_first_error() {
    let mut h = Harness::new();
    let device = h.device();
    let object = h.device_object(device);
    let filter = enums::ERROR_FILTER.ordinal("validation") as i32;

    h.bridge.device_push_error_scope(device, filter).unwrap();
    h.backend.raise_error(&object, HostError::validation("first"));
    h.backend.raise_error(&object, HostError::validation("second"));

    let cb = h.callback(SCRATCH, 8);
    h.bridge.device_pop_error_scope(&h.guest, device, cb).unwrap();
    h.poll();

    let call = h.only_call();
    assert_eq!(
        call.arg_u32(0),
        Some(enums::POP_ERROR_SCOPE_STATUS.ordinal("Success"))
    );
    assert_eq!(call.arg_u32(1), Some(enums::ERROR_TYPE.ordinal("validation")));
    assert_eq!(h.message(&call, 2), "first");

    h.bridge.device_pop_error_scope(&h.guest, device, cb).unwrap();
    h.poll();
    assert_eq!(
        h.only_call().arg_u32(0),
        Some(enums::POP_ERROR_SCOPE_STATUS.ordinal("EmptyStack"))
    );
}

#[test]
fn empty_error_scope_reports_no_error() {
    let mut h = Harness::new();
    let device = h.device();
    let filter = enums::ERROR_FILTER.ordinal("out-of-memory") as i32;

    h.bridge.device_push_error_scope(device, filter).unwrap();
    let cb = h.callback(SCRATCH, 8);
    h.bridge.device_pop_error_scope(&h.guest, device, cb).unwrap();
    h.poll();

    let call = h.only_call();
    assert_eq!(call.arg_u32(1), Some(enums::ERROR_TYPE.ordinal("no-error")));
}

#[test]
fn invalid_error_filter_is_rejected() {
    let mut h = Harness::new();
    let device = h.device();

    assert!(h.bridge.device_push_error_scope(device, 42).is_err());
    assert!(!h.backend.called("device_push_error_scope"));
}

// === Shader Modules === //

#[test]
fn compilation_info_is_freed_after_delivery() {
    let mut h = Harness::new();
    let device = h.device();

    let desc = SCRATCH + 0x200;
    h.string_view(desc, desc + 0x80, "shader");
    h.string_view(desc + 8, desc + 0x100, "@compute fn main() {}");
    let module = h
        .bridge
        .device_create_shader_module(&h.guest, device, desc)
        .unwrap();
    assert_ne!(module, 0);

    h.backend.set_compilation_messages(vec![
        CompilationMessage {
            message: "unused variable".into(),
            ty: "warning",
            line_num: 3,
            line_pos: 7,
            offset: 40,
            length: 5,
        },
        CompilationMessage {
            message: String::new(),
            ty: "info",
            line_num: 1,
            line_pos: 1,
            offset: 0,
            length: 0,
        },
    ]);

    let live_before = h.guest.live_allocations();
    let cb = h.callback(SCRATCH, 9);
    h.bridge
        .shader_module_get_compilation_info(&h.guest, module, cb)
        .unwrap();
    h.poll();

    let call = h.only_call();
    assert_eq!(
        call.arg_u32(0),
        Some(enums::COMPILATION_INFO_REQUEST_STATUS.ordinal("Success"))
    );

    let info = call.arg_u32(1).unwrap();
    assert_eq!(h.guest.load_u32(info).unwrap(), 2);
    let messages = h.guest.load_u32(info + 4).unwrap();
    assert_eq!(
        h.guest.load_string_view(messages + 4, h.word).unwrap(),
        "unused variable"
    );
    assert_eq!(
        h.guest.load_u32(messages + 12).unwrap(),
        enums::COMPILATION_MESSAGE_TYPE.ordinal("warning")
    );
    assert_eq!(h.guest.load_u64(messages + 16).unwrap(), 3);
    assert_eq!(h.guest.load_u64(messages + 40).unwrap(), 5);

    assert_eq!(h.guest.live_allocations(), live_before);
}

#[test]
fn compilation_info_for_missing_module() {
    let mut h = Harness::new();
    let cb = h.callback(SCRATCH, 9);

    h.bridge
        .shader_module_get_compilation_info(&h.guest, 12, cb)
        .unwrap();
    h.poll();

    let call = h.only_call();
    assert_eq!(
        call.arg_u32(0),
        Some(enums::COMPILATION_INFO_REQUEST_STATUS.ordinal("Error"))
    );
    assert_eq!(call.arg_u32(1), Some(0));
}

// === Surfaces === //

#[test]
fn surface_capabilities_are_owned_by_guest() {
    let mut h = Harness::new();
    let adapter = h.adapter();
    let instance = h.instance();

    h.guest.write_bytes(SCRATCH + 0x200, b"#canvas").unwrap();
    let surface = h
        .bridge
        .instance_create_surface(&h.guest, instance, SCRATCH + 0x200, 7)
        .unwrap();
    assert_ne!(surface, 0);
    assert_eq!(h.backend.last("instance_create_surface").unwrap(), "\"#canvas\"");

    let live_before = h.guest.live_allocations();
    let out = SCRATCH + 0x300;
    let status = h
        .bridge
        .surface_get_capabilities(&mut h.guest, surface, adapter, out)
        .unwrap();
    assert_eq!(status, STATUS_SUCCESS);
    assert_eq!(h.guest.live_allocations(), live_before + 3);

    let formats = h.guest.load_u32(out).unwrap();
    assert_eq!(h.guest.load_u32(out + 4).unwrap(), 1);
    assert_eq!(
        h.guest.load_u32(formats).unwrap(),
        enums::TEXTURE_FORMAT.ordinal("bgra8unorm")
    );
    assert_eq!(h.guest.load_u32(out + 12).unwrap(), 1);
    assert_eq!(h.guest.load_u32(out + 20).unwrap(), 2);
    assert_eq!(h.guest.load_u32(out + 24).unwrap(), 0x17);

    h.bridge
        .surface_capabilities_free_members(&mut h.guest, out)
        .unwrap();
    assert_eq!(h.guest.live_allocations(), live_before);
    assert_eq!(h.guest.load_u32(out).unwrap(), 0);
}

#[test]
fn failed_adapter_info_frees_copied_strings() {
    let mut h = Harness::new();
    let adapter = h.adapter();
    h.backend.set_adapter_info(AdapterInfo {
        vendor: "acme".into(),
        architecture: "rdna".into(),
        device: "gpu0".into(),
        description: "test adapter".into(),
        ..AdapterInfo::default()
    });

    let live_before = h.guest.live_allocations();
    h.guest.cap_heap(8);

    let out = SCRATCH + 0x300;
    assert!(h.bridge.adapter_get_info(&mut h.guest, adapter, out).is_err());
    assert_eq!(h.guest.live_allocations(), live_before);
    assert_eq!(h.guest.freed().len(), 1);
}

#[test]
fn failed_surface_capabilities_free_arrays() {
    let mut h = Harness::new();
    let adapter = h.adapter();
    let instance = h.instance();

    h.guest.write_bytes(SCRATCH + 0x200, b"#canvas").unwrap();
    let surface = h
        .bridge
        .instance_create_surface(&h.guest, instance, SCRATCH + 0x200, 7)
        .unwrap();

    let live_before = h.guest.live_allocations();
    h.guest.cap_heap(16);

    let out = SCRATCH + 0x300;
    assert!(
        h.bridge
            .surface_get_capabilities(&mut h.guest, surface, adapter, out)
            .is_err()
    );
    assert_eq!(h.guest.live_allocations(), live_before);
    assert_eq!(h.guest.freed().len(), 2);
}

#[test]
fn current_texture_is_registered() {
    let mut h = Harness::new();
    let instance = h.instance();

    h.guest.write_bytes(SCRATCH + 0x200, b"#canvas").unwrap();
    let surface = h
        .bridge
        .instance_create_surface(&h.guest, instance, SCRATCH + 0x200, 7)
        .unwrap();

    let out = SCRATCH + 0x300;
    h.bridge
        .surface_get_current_texture(&mut h.guest, surface, out)
        .unwrap();

    assert_eq!(h.guest.load_u32(out).unwrap(), surface);
    let texture = h.guest.load_u32(out + 4).unwrap();
    assert_eq!(
        h.guest.load_u32(out + 8).unwrap(),
        enums::SURFACE_TEXTURE_STATUS.ordinal("Success")
    );
    assert_eq!(h.bridge.texture_get_width(texture), 640);
    assert_eq!(
        h.bridge.texture_get_format(texture),
        enums::TEXTURE_FORMAT.ordinal("bgra8unorm")
    );

    h.backend.fail_next(
        "surface_current_texture",
        HostError::internal("swapchain out of date"),
    );
    h.bridge
        .surface_get_current_texture(&mut h.guest, surface, out)
        .unwrap();
    assert_eq!(h.guest.load_u32(out + 4).unwrap(), 0);
    assert_eq!(
        h.guest.load_u32(out + 8).unwrap(),
        enums::SURFACE_TEXTURE_STATUS.ordinal("Lost")
    );
}
