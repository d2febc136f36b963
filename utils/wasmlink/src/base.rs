use thiserror::Error;

// === WordSize === //

/// The width of the guest's native `usize`.
///
/// Guest addresses are always 32 bits wide. Only length, count, and size fields follow the
/// word size, which is how both `wasm32` and `wasm64p32` style guests lay out their slices.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Default)]
pub enum WordSize {
    #[default]
    Four,
    Eight,
}

impl WordSize {
    pub const fn bytes(self) -> u32 {
        match self {
            WordSize::Four => 4,
            WordSize::Eight => 8,
        }
    }
}

// === GuestVal === //

/// A scalar argument passed to a guest function through its indirect function table.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum GuestVal {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl GuestVal {
    pub fn as_u32(self) -> Option<u32> {
        match self {
            GuestVal::I32(v) => Some(v as u32),
            _ => None,
        }
    }
}

impl From<u32> for GuestVal {
    fn from(value: u32) -> Self {
        Self::I32(value as i32)
    }
}

impl From<i32> for GuestVal {
    fn from(value: i32) -> Self {
        Self::I32(value)
    }
}

impl From<u64> for GuestVal {
    fn from(value: u64) -> Self {
        Self::I64(value as i64)
    }
}

impl From<i64> for GuestVal {
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}

impl From<bool> for GuestVal {
    fn from(value: bool) -> Self {
        Self::I32(value as i32)
    }
}

impl From<f32> for GuestVal {
    fn from(value: f32) -> Self {
        Self::F32(value)
    }
}

impl From<f64> for GuestVal {
    fn from(value: f64) -> Self {
        Self::F64(value)
    }
}

// === MemoryError === //

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum MemoryError {
    #[error("access of {len} byte(s) at {addr:#x} is out of bounds of guest memory")]
    OutOfBounds { addr: u32, len: u64 },
    #[error("null address given for required {what}")]
    NullAddress { what: &'static str },
    #[error("failed to allocate {size} byte(s) on the guest")]
    AllocFailed { size: u32 },
}

pub fn require_addr(addr: u32, what: &'static str) -> Result<u32, MemoryError> {
    if addr == 0 {
        Err(MemoryError::NullAddress { what })
    } else {
        Ok(addr)
    }
}

// === GuestContext === //

/// Access to a single guest instance: its linear memory, its allocator, and its indirect
/// function table.
///
/// This trait is object-safe so that dispatch code can take a `&mut dyn GuestContext` and stay
/// agnostic of the wasm runtime. Typed accessors live on [`MemoryExt`](crate::MemoryExt).
pub trait GuestContext {
    fn guest_memory(&self) -> &[u8];

    fn guest_memory_mut(&mut self) -> &mut [u8];

    /// Allocates `size` bytes through the guest's allocator. A return value of zero means the
    /// guest allocator failed.
    fn alloc(&mut self, size: u32) -> anyhow::Result<u32>;

    fn free(&mut self, addr: u32) -> anyhow::Result<()>;

    /// Calls the function at index `func` of the guest's indirect function table.
    fn invoke(&mut self, func: u32, args: &[GuestVal]) -> anyhow::Result<()>;
}
