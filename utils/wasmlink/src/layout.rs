use crate::{MemoryError, WordSize};

// === FieldLayout === //

#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub struct FieldLayout {
    pub size: u32,
    pub align: u32,
}

impl FieldLayout {
    pub const fn new(size: u32, align: u32) -> Self {
        Self { size, align }
    }

    /// A field whose alignment equals its size.
    pub const fn scalar(size: u32) -> Self {
        Self::new(size, size)
    }
}

impl From<u32> for FieldLayout {
    fn from(size: u32) -> Self {
        Self::scalar(size)
    }
}

impl From<(u32, u32)> for FieldLayout {
    fn from((size, align): (u32, u32)) -> Self {
        Self::new(size, align)
    }
}

impl From<WordSize> for FieldLayout {
    fn from(word: WordSize) -> Self {
        Self::scalar(word.bytes())
    }
}

// === StructCursor === //

/// Walks the fields of a C-style struct in declaration order.
///
/// Each call to [`field`](Self::field) rounds the running offset up to the field's alignment,
/// returns that address, and then steps past the field.
#[derive(Debug, Clone)]
pub struct StructCursor {
    offset: u32,
}

impl StructCursor {
    pub fn new(base: u32) -> Self {
        Self { offset: base }
    }

    pub fn required(base: u32, what: &'static str) -> Result<Self, MemoryError> {
        crate::require_addr(base, what).map(Self::new)
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn field(&mut self, layout: impl Into<FieldLayout>) -> u32 {
        let FieldLayout { size, align } = layout.into();
        debug_assert!(align.is_power_of_two());

        let aligned = self.offset.div_ceil(align.max(1)).saturating_mul(align.max(1));
        self.offset = aligned.saturating_add(size);
        aligned
    }

    pub fn skip(&mut self, layout: impl Into<FieldLayout>) {
        self.field(layout);
    }
}

// === Arrays === //

/// Decodes `count` elements spaced `stride` bytes apart starting at `start`.
///
/// An empty array never touches `start`. A non-empty array at a null address is a protocol
/// violation.
pub fn decode_array<T>(
    count: u64,
    start: u32,
    stride: u32,
    mut decode: impl FnMut(u32) -> anyhow::Result<T>,
) -> anyhow::Result<Vec<T>> {
    if count == 0 {
        return Ok(Vec::new());
    }

    let start = crate::require_addr(start, "array base")?;
    let oob = || MemoryError::OutOfBounds {
        addr: start,
        len: count.saturating_mul(u64::from(stride)),
    };

    let count = u32::try_from(count).map_err(|_| oob())?;
    count
        .checked_mul(stride)
        .and_then(|len| start.checked_add(len))
        .ok_or_else(oob)?;

    let mut out = Vec::with_capacity(count.min(1024) as usize);
    for i in 0..count {
        out.push(decode(start + i * stride)?);
    }

    Ok(out)
}
