use smallvec::SmallVec;
use wasmlink::{GuestContext, GuestVal, MemoryError, MemoryExt, StructCursor, WordSize};

// === CallbackRecord === //

/// A guest completion callback: an index into the guest's function table plus two opaque words
/// that are passed back verbatim after the result arguments.
#[derive(Debug, Copy, Clone, Default, Hash, Eq, PartialEq)]
pub struct CallbackRecord {
    pub func: u32,
    pub userdata1: u32,
    pub userdata2: u32,
}

impl CallbackRecord {
    pub fn decode(cx: &dyn GuestContext, start: u32) -> Result<Self, MemoryError> {
        let mut cursor = StructCursor::required(start, "callback info")?;

        Ok(Self {
            func: cx.load_u32(cursor.field(4))?,
            userdata1: cx.load_u32(cursor.field(4))?,
            userdata2: cx.load_u32(cursor.field(4))?,
        })
    }

    pub fn is_set(&self) -> bool {
        self.func != 0
    }

    /// Calls the guest with `args` followed by both userdata words. Unset records are skipped.
    pub fn invoke(&self, cx: &mut dyn GuestContext, args: &[GuestVal]) -> anyhow::Result<()> {
        if !self.is_set() {
            return Ok(());
        }

        let mut full = SmallVec::<[GuestVal; 8]>::from_slice(args);
        full.push(self.userdata1.into());
        full.push(self.userdata2.into());

        cx.invoke(self.func, &full)
    }
}

// === MessageEncoder === //

/// Stages callback message strings in guest memory.
///
/// Non-empty messages get their own `[view | bytes]` block. Every empty message shares one
/// zeroed view, allocated on first use and kept for the guest's lifetime.
#[derive(Debug)]
pub struct MessageEncoder {
    word: WordSize,
    empty: Option<u32>,
}

impl MessageEncoder {
    pub fn new(word: WordSize) -> Self {
        Self { word, empty: None }
    }

    pub fn empty_view(&mut self, cx: &mut dyn GuestContext) -> anyhow::Result<u32> {
        if let Some(addr) = self.empty {
            return Ok(addr);
        }

        let size = self.word.bytes() * 2;
        let addr = cx.alloc_nonnull(size)?;
        cx.write_bytes(addr, &[0; 16][..size as usize])?;
        self.empty = Some(addr);

        Ok(addr)
    }

    /// Returns the view's address and whether the caller owns it.
    pub fn encode(&mut self, cx: &mut dyn GuestContext, message: &str) -> anyhow::Result<(u32, bool)> {
        if message.is_empty() {
            return Ok((self.empty_view(cx)?, false));
        }

        Ok((cx.alloc_string_view(self.word, message)?, true))
    }
}

// === Delivery === //

/// Arguments for one callback invocation, plus the guest allocations made to carry them.
#[derive(Debug)]
pub struct Delivery {
    args: SmallVec<[GuestVal; 6]>,
    owned: SmallVec<[u32; 4]>,
}

impl Delivery {
    pub fn push(&mut self, arg: impl Into<GuestVal>) {
        self.args.push(arg.into());
    }

    pub fn push_message(
        &mut self,
        cx: &mut dyn GuestContext,
        messages: &mut MessageEncoder,
        message: &str,
    ) -> anyhow::Result<()> {
        let (addr, owned) = messages.encode(cx, message)?;
        if owned {
            self.owned.push(addr);
        }
        self.push(addr);
        Ok(())
    }

    /// Allocates guest memory that is freed once the callback returns.
    pub fn alloc(&mut self, cx: &mut dyn GuestContext, size: u32) -> anyhow::Result<u32> {
        let addr = cx.alloc_nonnull(size)?;
        self.owned.push(addr);
        Ok(addr)
    }

    /// Like [`alloc`](Self::alloc), but for a string view that the callback reads.
    pub fn alloc_string_view(
        &mut self,
        cx: &mut dyn GuestContext,
        word: WordSize,
        value: &str,
    ) -> anyhow::Result<u32> {
        let addr = cx.alloc_string_view(word, value)?;
        self.owned.push(addr);
        Ok(addr)
    }
}

/// Builds the arguments for `record` with `stage` and invokes it.
///
/// Every allocation staged through the [`Delivery`] is freed exactly once afterwards, whether
/// staging, the call, or neither failed. Unset records skip staging altogether.
pub fn deliver(
    cx: &mut dyn GuestContext,
    record: CallbackRecord,
    stage: impl FnOnce(&mut dyn GuestContext, &mut Delivery) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    if !record.is_set() {
        return Ok(());
    }

    let mut delivery = Delivery {
        args: SmallVec::new(),
        owned: SmallVec::new(),
    };

    let invoked = stage(&mut *cx, &mut delivery)
        .and_then(|()| record.invoke(&mut *cx, &delivery.args));

    let mut freed = Ok(());
    for addr in delivery.owned {
        if let Err(err) = cx.free(addr) {
            freed = Err(err);
        }
    }

    invoked.and(freed)
}

// === Output Staging === //

/// Guest allocations linked from a caller-provided output struct.
#[derive(Debug, Default)]
pub struct OutputStaging {
    owned: SmallVec<[u32; 4]>,
}

impl OutputStaging {
    pub fn alloc(&mut self, cx: &mut dyn GuestContext, size: u32) -> anyhow::Result<u32> {
        let addr = cx.alloc_nonnull(size)?;
        self.owned.push(addr);
        Ok(addr)
    }

    /// Copies `data` into a fresh allocation. Empty data is written as a null pointer.
    pub fn alloc_bytes(&mut self, cx: &mut dyn GuestContext, data: &[u8]) -> anyhow::Result<u32> {
        if data.is_empty() {
            return Ok(0);
        }

        let addr = cx.alloc_bytes(data)?;
        self.owned.push(addr);
        Ok(addr)
    }
}

/// Fills an output struct with `write`. The guest owns every allocation staged through the
/// [`OutputStaging`] once `write` succeeds; if it fails, they are all freed again.
pub fn stage_output<R>(
    cx: &mut dyn GuestContext,
    write: impl FnOnce(&mut dyn GuestContext, &mut OutputStaging) -> anyhow::Result<R>,
) -> anyhow::Result<R> {
    let mut staging = OutputStaging::default();
    let written = write(&mut *cx, &mut staging);

    if written.is_err() {
        for addr in staging.owned {
            if let Err(err) = cx.free(addr) {
                tracing::warn!(addr, %err, "failed to roll back guest allocation");
            }
        }
    }

    written
}

#[cfg(test)]
mod tests {
    use wasmlink::VecGuest;

    use super::*;

    const RECORD: CallbackRecord = CallbackRecord {
        func: 9,
        userdata1: 100,
        userdata2: 200,
    };

    #[test]
    fn userdata_follows_results() {
        let mut guest = VecGuest::new(256);
        RECORD
            .invoke(&mut guest, &[GuestVal::I32(1), GuestVal::I32(2)])
            .unwrap();

        let call = &guest.calls()[0];
        assert_eq!(call.func, 9);
        assert_eq!(
            call.args,
            [
                GuestVal::I32(1),
                GuestVal::I32(2),
                GuestVal::I32(100),
                GuestVal::I32(200)
            ]
        );
    }

    #[test]
    fn decode_reads_three_words() {
        let mut guest = VecGuest::new(256);
        guest.store_u32(64, 3).unwrap();
        guest.store_u32(68, 4).unwrap();
        guest.store_u32(72, 5).unwrap();

        let record = CallbackRecord::decode(&guest, 64).unwrap();
        assert_eq!(
            record,
            CallbackRecord {
                func: 3,
                userdata1: 4,
                userdata2: 5
            }
        );
        assert!(CallbackRecord::decode(&guest, 0).is_err());
    }

    #[test]
    fn unset_record_is_never_staged() {
        let mut guest = VecGuest::new(256);
        let mut messages = MessageEncoder::new(WordSize::Four);

        deliver(&mut guest, CallbackRecord::default(), |cx, d| {
            d.push_message(cx, &mut messages, "ignored")
        })
        .unwrap();

        assert!(guest.calls().is_empty());
        assert_eq!(guest.live_allocations(), 0);
    }

    #[test]
    fn message_freed_after_call() {
        let mut guest = VecGuest::new(256);
        let mut messages = MessageEncoder::new(WordSize::Four);

        deliver(&mut guest, RECORD, |cx, d| {
            d.push(2u32);
            d.push_message(cx, &mut messages, "boom")
        })
        .unwrap();

        let call = &guest.calls()[0];
        let view = call.arg_u32(1).unwrap();
        assert_eq!(guest.freed(), [view]);
        assert_eq!(guest.live_allocations(), 0);
    }

    #[test]
    fn message_freed_when_guest_traps() {
        let mut guest = VecGuest::new(256);
        guest.trap_on(RECORD.func);
        let mut messages = MessageEncoder::new(WordSize::Four);

        let result = deliver(&mut guest, RECORD, |cx, d| {
            d.push_message(cx, &mut messages, "boom")
        });

        assert!(result.is_err());
        assert_eq!(guest.freed().len(), 1);
        assert_eq!(guest.live_allocations(), 0);
    }

    #[test]
    fn empty_message_shares_sentinel() {
        let mut guest = VecGuest::new(256);
        let mut messages = MessageEncoder::new(WordSize::Eight);

        let (first, owned) = messages.encode(&mut guest, "").unwrap();
        let (second, _) = messages.encode(&mut guest, "").unwrap();

        assert!(!owned);
        assert_eq!(first, second);
        assert_eq!(guest.load_string_view(first, WordSize::Eight).unwrap(), "");
        assert_eq!(guest.live_allocations(), 1);
    }

    #[test]
    fn failed_output_frees_staged_allocations() {
        let mut guest = VecGuest::new(256);

        let err = stage_output(&mut guest, |cx, staging| {
            staging.alloc_bytes(cx, b"kept")?;
            staging.alloc(cx, 8)?;
            cx.store_u32(1024, 1)?;
            Ok(())
        });

        assert!(err.is_err());
        assert_eq!(guest.live_allocations(), 0);
        assert_eq!(guest.freed().len(), 2);
    }

    #[test]
    fn written_output_keeps_allocations() {
        let mut guest = VecGuest::new(256);

        let addr = stage_output(&mut guest, |cx, staging| {
            assert_eq!(staging.alloc_bytes(cx, b"")?, 0);
            staging.alloc_bytes(cx, b"kept")
        })
        .unwrap();

        assert!(guest.is_live(addr));
        assert_eq!(guest.live_allocations(), 1);
    }
}
