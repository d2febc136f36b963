use anyhow::bail;
use rustc_hash::FxHashMap;

use crate::{GuestContext, GuestVal};

/// A recorded call into the guest's indirect function table.
#[derive(Debug, Clone, PartialEq)]
pub struct GuestCall {
    pub func: u32,
    pub args: Vec<GuestVal>,
}

impl GuestCall {
    pub fn arg_u32(&self, idx: usize) -> Option<u32> {
        self.args.get(idx).and_then(|v| v.as_u32())
    }
}

/// An in-process stand-in for a guest instance.
///
/// Memory is a plain byte vector, allocation is a bump allocator that never reuses addresses,
/// and function-table calls are recorded instead of executed. Every allocation must be freed
/// exactly once; freeing an unknown address is an error.
#[derive(Debug, Clone)]
pub struct VecGuest {
    memory: Vec<u8>,
    heap_top: u32,
    heap_end: Option<u32>,
    live: FxHashMap<u32, u32>,
    freed: Vec<u32>,
    calls: Vec<GuestCall>,
    trap_on: Option<u32>,
}

impl VecGuest {
    const HEAP_BASE: u32 = 16;
    const HEAP_ALIGN: u32 = 8;

    pub fn new(size: u32) -> Self {
        Self {
            memory: vec![0; size as usize],
            heap_top: Self::HEAP_BASE,
            heap_end: None,
            live: FxHashMap::default(),
            freed: Vec::new(),
            calls: Vec::new(),
            trap_on: None,
        }
    }

    /// Makes calls to table index `func` fail as if the guest trapped.
    pub fn trap_on(&mut self, func: u32) {
        self.trap_on = Some(func);
    }

    /// Makes allocations fail once they would reach `bytes` past the next allocation's address.
    pub fn cap_heap(&mut self, bytes: u32) {
        let start = self.heap_top.next_multiple_of(Self::HEAP_ALIGN);
        self.heap_end = Some(start.saturating_add(bytes));
    }

    pub fn calls(&self) -> &[GuestCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<GuestCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn freed(&self) -> &[u32] {
        &self.freed
    }

    pub fn is_live(&self, addr: u32) -> bool {
        self.live.contains_key(&addr)
    }

    pub fn live_allocations(&self) -> usize {
        self.live.len()
    }
}

impl GuestContext for VecGuest {
    fn guest_memory(&self) -> &[u8] {
        &self.memory
    }

    fn guest_memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    fn alloc(&mut self, size: u32) -> anyhow::Result<u32> {
        let addr = self.heap_top.next_multiple_of(Self::HEAP_ALIGN);

        let Some(end) = addr.checked_add(size.max(1)) else {
            return Ok(0);
        };

        if end as usize > self.memory.len() || self.heap_end.is_some_and(|limit| end > limit) {
            return Ok(0);
        }

        self.heap_top = end;
        self.live.insert(addr, size);

        Ok(addr)
    }

    fn free(&mut self, addr: u32) -> anyhow::Result<()> {
        if self.live.remove(&addr).is_none() {
            bail!("freed {addr:#x}, which is not a live allocation");
        }

        self.freed.push(addr);

        Ok(())
    }

    fn invoke(&mut self, func: u32, args: &[GuestVal]) -> anyhow::Result<()> {
        if self.trap_on == Some(func) {
            bail!("guest function {func} trapped");
        }

        self.calls.push(GuestCall {
            func,
            args: args.to_vec(),
        });

        Ok(())
    }
}
