use std::{cell::RefCell, collections::VecDeque, fmt, rc::Rc};

use wasmlink::{GuestContext, MemoryExt, StructCursor, require_addr};

use crate::{
    BridgeConfig, GpuBackend,
    backend::{CompilationMessage, DeviceLostInfo, HostError},
    callback::{CallbackRecord, Delivery, MessageEncoder, deliver, stage_output},
    decode::{Decoder, UnresolvedHandle},
    enums::{self, EnumTable},
    layouts::Layouts,
    resources::{Registries, ResourceKind},
};

/// Generic accessor status: the output was written.
pub const STATUS_SUCCESS: u32 = 1;

/// Generic accessor status: the object was missing or the output could not be produced.
pub const STATUS_ERROR: u32 = 2;

// === Completion === //

/// A settled host request waiting to be delivered to the guest.
pub(crate) enum Completion<B: GpuBackend> {
    Adapter {
        callback: CallbackRecord,
        result: Result<Option<B::Adapter>, HostError>,
    },
    Device {
        callback: CallbackRecord,
        lost: CallbackRecord,
        uncaptured: CallbackRecord,
        result: Result<Option<B::Device>, HostError>,
    },
    DeviceLost {
        callback: CallbackRecord,
        device: u32,
        info: DeviceLostInfo,
    },
    UncapturedError {
        callback: CallbackRecord,
        device: u32,
        error: HostError,
    },
    MapAsync {
        callback: CallbackRecord,
        result: Result<(), HostError>,
    },
    WorkDone {
        callback: CallbackRecord,
        result: Result<(), HostError>,
    },
    PopErrorScope {
        callback: CallbackRecord,
        result: Result<Option<HostError>, HostError>,
    },
    CompilationInfo {
        callback: CallbackRecord,
        result: Result<Vec<CompilationMessage>, HostError>,
    },
}

impl<B: GpuBackend> Completion<B> {
    fn entry_point(&self) -> &'static str {
        match self {
            Self::Adapter { .. } => "webgpuInstanceRequestAdapter",
            Self::Device { .. } => "webgpuAdapterRequestDevice",
            Self::DeviceLost { .. } => "device lost",
            Self::UncapturedError { .. } => "uncaptured error",
            Self::MapAsync { .. } => "webgpuBufferMapAsync",
            Self::WorkDone { .. } => "webgpuQueueOnSubmittedWorkDone",
            Self::PopErrorScope { .. } => "webgpuDevicePopErrorScope",
            Self::CompilationInfo { .. } => "webgpuShaderModuleGetCompilationInfo",
        }
    }
}

type CompletionQueue<B> = Rc<RefCell<VecDeque<Completion<B>>>>;

// === GpuBridge === //

/// Owns every handle the guest holds and every request still in flight.
///
/// Entry points run to completion. Host requests that settle later are driven on a local
/// executor and queued as completions, which [`poll`](Self::poll) hands to the guest.
pub struct GpuBridge<B: GpuBackend> {
    pub(crate) backend: B,
    pub(crate) config: BridgeConfig,
    pub(crate) layouts: Layouts,
    pub(crate) reg: Registries<B>,
    pub(crate) messages: MessageEncoder,
    executor: smol::LocalExecutor<'static>,
    completions: CompletionQueue<B>,
}

impl<B: GpuBackend> fmt::Debug for GpuBridge<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuBridge")
            .field("config", &self.config)
            .field("reg", &self.reg)
            .finish_non_exhaustive()
    }
}

impl<B: GpuBackend> GpuBridge<B> {
    pub fn new(backend: B, config: BridgeConfig) -> Self {
        Self {
            backend,
            layouts: Layouts::new(config.word_size),
            messages: MessageEncoder::new(config.word_size),
            config,
            reg: Registries::default(),
            executor: smol::LocalExecutor::new(),
            completions: Rc::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registries(&self) -> &Registries<B> {
        &self.reg
    }

    pub fn layouts(&self) -> &Layouts {
        &self.layouts
    }

    pub(crate) fn decoder<'a>(&'a self, cx: &'a dyn GuestContext) -> Decoder<'a, B> {
        Decoder::new(cx, &self.reg, &self.layouts)
    }

    // === Async plumbing === //

    /// Drives `future` on the local executor and queues `respond`'s completion once it settles.
    pub(crate) fn spawn_responder<V: 'static>(
        &self,
        future: impl 'static + Future<Output = V>,
        respond: impl 'static + FnOnce(V) -> Completion<B>,
    ) {
        let completions = self.completions.clone();

        self.executor
            .spawn(async move {
                let value = future.await;
                completions.borrow_mut().push_back(respond(value));
            })
            .detach();
    }

    /// Runs every ready host future and delivers each settled request to the guest, returning
    /// how many callbacks were delivered.
    ///
    /// Delivery stops at the first guest failure. Completions that were not yet delivered stay
    /// queued for the next call.
    pub fn poll(&mut self, cx: &mut dyn GuestContext) -> anyhow::Result<usize> {
        let mut delivered = 0;

        loop {
            while self.executor.try_tick() {}

            let next = self.completions.borrow_mut().pop_front();
            let Some(completion) = next else {
                break;
            };

            self.settle(cx, completion)?;
            delivered += 1;
        }

        Ok(delivered)
    }

    /// Queues a completion that is already known, such as a request against a missing object.
    pub(crate) fn complete(&self, completion: Completion<B>) {
        self.completions.borrow_mut().push_back(completion);
    }

    /// Number of settled requests not yet delivered.
    pub fn queued(&self) -> usize {
        self.completions.borrow().len()
    }

    fn settle(
        &mut self,
        cx: &mut dyn GuestContext,
        completion: Completion<B>,
    ) -> anyhow::Result<()> {
        let entry = completion.entry_point();
        tracing::trace!(entry, "delivering settled request");

        let report = |err: &HostError| {
            tracing::warn!(entry, %err, "host request failed");
        };

        match completion {
            Completion::Adapter { callback, result } => {
                if !callback.is_set() {
                    tracing::debug!(entry, "dropping adapter nobody is waiting for");
                    return Ok(());
                }

                let status = |name| enums::REQUEST_ADAPTER_STATUS.ordinal_or(name, "Unknown");
                let (status, handle, message) = match result {
                    Ok(Some(adapter)) => {
                        let handle = self.reg.adapters.create(adapter);
                        (status("Success"), handle, String::new())
                    }
                    Ok(None) => (status("Unavailable"), 0, "No adapter found".to_string()),
                    Err(err) => {
                        report(&err);
                        (status("Error"), 0, err.message)
                    }
                };

                self.deliver_status(cx, callback, status, Some(handle), &message)
            }
            Completion::Device {
                callback,
                lost,
                uncaptured,
                result,
            } => {
                if !callback.is_set() {
                    tracing::debug!(entry, "dropping device nobody is waiting for");
                    return Ok(());
                }

                let status = |name| enums::REQUEST_DEVICE_STATUS.ordinal_or(name, "Unknown");
                let (status, handle, message) = match result {
                    Ok(Some(device)) => {
                        let handle = self.reg.devices.create(device.clone());
                        self.watch_device(handle, &device, lost, uncaptured);
                        (status("Success"), handle, String::new())
                    }
                    Ok(None) => (status("Error"), 0, "Failed to create device".to_string()),
                    Err(err) => {
                        report(&err);
                        (status("Error"), 0, err.message)
                    }
                };

                self.deliver_status(cx, callback, status, Some(handle), &message)
            }
            Completion::DeviceLost {
                callback,
                device,
                info,
            } => {
                let reason = enums::DEVICE_LOST_REASON.ordinal(info.reason);
                let messages = &mut self.messages;

                deliver(cx, callback, |cx, d| {
                    let device_ptr = d.alloc(cx, 4)?;
                    cx.store_u32(device_ptr, device)?;

                    d.push(device_ptr);
                    d.push(reason);
                    d.push_message(cx, messages, &info.message)
                })
            }
            Completion::UncapturedError {
                callback,
                device,
                error,
            } => {
                let messages = &mut self.messages;

                deliver(cx, callback, |cx, d| {
                    d.push(device);
                    d.push(error.error_type());
                    d.push_message(cx, messages, &error.message)
                })
            }
            Completion::MapAsync { callback, result } => {
                let (status, message) = unit_status(&enums::MAP_ASYNC_STATUS, result, report);
                self.deliver_status(cx, callback, status, None, &message)
            }
            Completion::WorkDone { callback, result } => {
                let (status, message) = unit_status(&enums::QUEUE_WORK_DONE_STATUS, result, report);
                self.deliver_status(cx, callback, status, None, &message)
            }
            Completion::PopErrorScope { callback, result } => {
                let status = |name| enums::POP_ERROR_SCOPE_STATUS.ordinal(name);
                let (status, error_type, message) = match result {
                    Ok(None) => {
                        let no_error = enums::ERROR_TYPE.ordinal("no-error");
                        (status("Success"), no_error, String::new())
                    }
                    Ok(Some(err)) => (status("Success"), err.error_type(), err.message),
                    Err(err) => {
                        report(&err);
                        (status("EmptyStack"), 0, err.message)
                    }
                };

                self.deliver_status(cx, callback, status, Some(error_type), &message)
            }
            Completion::CompilationInfo { callback, result } => {
                let status = |name| enums::COMPILATION_INFO_REQUEST_STATUS.ordinal(name);
                let layouts = &self.layouts;

                deliver(cx, callback, |cx, d| match result {
                    Ok(messages) => {
                        let info = stage_compilation_info(cx, d, layouts, &messages)?;
                        d.push(status("Success"));
                        d.push(info);
                        Ok(())
                    }
                    Err(err) => {
                        report(&err);
                        d.push(status("Error"));
                        d.push(0u32);
                        Ok(())
                    }
                })
            }
        }
    }

    /// Delivers `(status, [value], message)` followed by the userdata words.
    fn deliver_status(
        &mut self,
        cx: &mut dyn GuestContext,
        callback: CallbackRecord,
        status: u32,
        value: Option<u32>,
        message: &str,
    ) -> anyhow::Result<()> {
        let messages = &mut self.messages;

        deliver(cx, callback, |cx, d| {
            d.push(status);
            if let Some(value) = value {
                d.push(value);
            }
            d.push_message(cx, messages, message)
        })
    }

    /// Subscribes the device's lost and uncaptured-error callbacks, if the guest gave any.
    fn watch_device(
        &self,
        handle: u32,
        device: &B::Device,
        lost: CallbackRecord,
        uncaptured: CallbackRecord,
    ) {
        if lost.is_set() {
            self.spawn_responder(self.backend.device_lost(device), move |info| {
                Completion::DeviceLost {
                    callback: lost,
                    device: handle,
                    info,
                }
            });
        }

        if uncaptured.is_set() {
            let completions = self.completions.clone();

            self.backend.device_set_uncaptured_error_handler(
                device,
                Box::new(move |error| {
                    completions.borrow_mut().push_back(Completion::UncapturedError {
                        callback: uncaptured,
                        device: handle,
                        error,
                    });
                }),
            );
        }
    }

    // === Lifecycle === //

    pub fn add_ref(&mut self, kind: ResourceKind, handle: u32) {
        self.reg.add_ref(kind, handle);
    }

    /// Drops one reference. A buffer whose last reference goes while a range is still mapped
    /// also gives back its staging memory.
    pub fn release(
        &mut self,
        cx: &mut dyn GuestContext,
        kind: ResourceKind,
        handle: u32,
    ) -> anyhow::Result<()> {
        if kind != ResourceKind::Buffer {
            self.reg.release(kind, handle);
            return Ok(());
        }

        if let Some(mapping) = self.reg.buffers.release(handle).and_then(|entry| entry.mapping) {
            cx.free(mapping.ptr)?;
        }

        Ok(())
    }

    pub fn set_label(
        &mut self,
        cx: &dyn GuestContext,
        kind: ResourceKind,
        handle: u32,
        ptr: u32,
        len: u64,
    ) -> anyhow::Result<()> {
        if !self.reg.contains(kind, handle) {
            return Ok(());
        }

        let label = cx.load_string(ptr, len)?;
        self.reg.set_label(kind, handle, &label);
        Ok(())
    }

    /// Writes the label into the string view at `out`. The guest owns the string data
    /// afterwards. An unlabeled object yields an empty view.
    pub fn get_label(
        &mut self,
        cx: &mut dyn GuestContext,
        kind: ResourceKind,
        handle: u32,
        out: u32,
    ) -> anyhow::Result<u32> {
        let out = require_addr(out, "label output")?;

        if !self.reg.contains(kind, handle) {
            tracing::debug!(kind = kind.name(), handle, "label requested for a missing object");
            return Ok(STATUS_ERROR);
        }

        let label = self.reg.label(kind, handle).unwrap_or_default();
        let word = self.config.word_size;

        stage_output(cx, |cx, staging| {
            let data = staging.alloc_bytes(cx, label.as_bytes())?;
            cx.store_string_view(out, word, data, label.len() as u64)?;
            Ok(STATUS_SUCCESS)
        })
    }
}

fn unit_status(
    table: &EnumTable,
    result: Result<(), HostError>,
    report: impl FnOnce(&HostError),
) -> (u32, String) {
    match result {
        Ok(()) => (table.ordinal("Success"), String::new()),
        Err(err) => {
            report(&err);
            (table.ordinal("Error"), err.message)
        }
    }
}

/// Turns a descriptor that named a dead handle into `None`, which entry points degrade to
/// their neutral result. Every other error still aborts the call.
pub(crate) fn resolved<T>(
    entry: &'static str,
    result: anyhow::Result<T>,
) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) => match err.downcast_ref::<UnresolvedHandle>() {
            Some(miss) => {
                tracing::debug!(entry, %miss, "descriptor names a missing object");
                Ok(None)
            }
            None => Err(err),
        },
    }
}

/// Writes `{ count, messages }` plus every message record into guest memory. Every block is
/// owned by the delivery.
fn stage_compilation_info(
    cx: &mut dyn GuestContext,
    d: &mut Delivery,
    layouts: &Layouts,
    messages: &[CompilationMessage],
) -> anyhow::Result<u32> {
    let word = layouts.word;
    let stride = layouts.compilation_message.size;

    let array = if messages.is_empty() {
        0
    } else {
        let size = u32::try_from(messages.len())
            .ok()
            .and_then(|len| len.checked_mul(stride))
            .ok_or_else(|| anyhow::anyhow!("too many compilation messages"))?;
        d.alloc(cx, size)?
    };

    for (i, message) in messages.iter().enumerate() {
        let mut off = StructCursor::new(array + i as u32 * stride);
        off.skip(4);

        let view = off.field(layouts.string_view);
        let data = if message.message.is_empty() {
            0
        } else {
            let data = d.alloc(cx, message.message.len() as u32)?;
            cx.write_bytes(data, message.message.as_bytes())?;
            data
        };
        cx.store_string_view(view, word, data, message.message.len() as u64)?;

        cx.store_u32(off.field(4), enums::COMPILATION_MESSAGE_TYPE.ordinal(message.ty))?;
        cx.store_u64(off.field(8), message.line_num)?;
        cx.store_u64(off.field(8), message.line_pos)?;
        cx.store_u64(off.field(8), message.offset)?;
        cx.store_u64(off.field(8), message.length)?;
    }

    let info = d.alloc(cx, 2 * word.bytes())?;
    let mut off = StructCursor::new(info);
    cx.store_uint(off.field(word), word, messages.len() as u64)?;
    cx.store_u32(off.field(4), array)?;

    Ok(info)
}
