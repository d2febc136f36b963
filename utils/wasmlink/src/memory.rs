use std::mem;

use anyhow::Context;
use bytemuck::Pod;

use crate::{GuestContext, MemoryError, WordSize};

pub trait MemoryExt: GuestContext {
    fn read_bytes(&self, addr: u32, len: u64) -> Result<&[u8], MemoryError> {
        let oob = || MemoryError::OutOfBounds { addr, len };
        let len = usize::try_from(len).map_err(|_| oob())?;

        self.guest_memory()
            .get(addr as usize..)
            .and_then(|v| v.get(..len))
            .ok_or_else(oob)
    }

    fn write_bytes(&mut self, addr: u32, data: &[u8]) -> Result<(), MemoryError> {
        let oob = MemoryError::OutOfBounds {
            addr,
            len: data.len() as u64,
        };

        self.guest_memory_mut()
            .get_mut(addr as usize..)
            .and_then(|v| v.get_mut(..data.len()))
            .ok_or(oob)?
            .copy_from_slice(data);

        Ok(())
    }

    fn load<T: Pod>(&self, addr: u32) -> Result<T, MemoryError> {
        let bytes = self.read_bytes(addr, mem::size_of::<T>() as u64)?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    fn store<T: Pod>(&mut self, addr: u32, value: T) -> Result<(), MemoryError> {
        self.write_bytes(addr, bytemuck::bytes_of(&value))
    }

    fn load_u8(&self, addr: u32) -> Result<u8, MemoryError> {
        self.load(addr)
    }

    fn load_u16(&self, addr: u32) -> Result<u16, MemoryError> {
        self.load(addr)
    }

    fn load_i32(&self, addr: u32) -> Result<i32, MemoryError> {
        self.load(addr)
    }

    fn load_u32(&self, addr: u32) -> Result<u32, MemoryError> {
        self.load(addr)
    }

    fn load_u64(&self, addr: u32) -> Result<u64, MemoryError> {
        self.load(addr)
    }

    fn load_f32(&self, addr: u32) -> Result<f32, MemoryError> {
        self.load(addr)
    }

    fn load_f64(&self, addr: u32) -> Result<f64, MemoryError> {
        self.load(addr)
    }

    fn load_b32(&self, addr: u32) -> Result<bool, MemoryError> {
        self.load_u32(addr).map(|v| v != 0)
    }

    /// Loads a 32-bit guest address or handle.
    fn load_ptr(&self, addr: u32) -> Result<u32, MemoryError> {
        self.load_u32(addr)
    }

    fn load_uint(&self, addr: u32, word: WordSize) -> Result<u64, MemoryError> {
        match word {
            WordSize::Four => self.load_u32(addr).map(u64::from),
            WordSize::Eight => self.load_u64(addr),
        }
    }

    fn store_u32(&mut self, addr: u32, value: u32) -> Result<(), MemoryError> {
        self.store(addr, value)
    }

    fn store_i32(&mut self, addr: u32, value: i32) -> Result<(), MemoryError> {
        self.store(addr, value)
    }

    fn store_u64(&mut self, addr: u32, value: u64) -> Result<(), MemoryError> {
        self.store(addr, value)
    }

    fn store_f64(&mut self, addr: u32, value: f64) -> Result<(), MemoryError> {
        self.store(addr, value)
    }

    fn store_b32(&mut self, addr: u32, value: bool) -> Result<(), MemoryError> {
        self.store_u32(addr, value as u32)
    }

    fn store_uint(&mut self, addr: u32, word: WordSize, value: u64) -> Result<(), MemoryError> {
        match word {
            WordSize::Four => self.store_u32(addr, value as u32),
            WordSize::Eight => self.store_u64(addr, value),
        }
    }

    /// Decodes `len` bytes at `addr` as UTF-8, replacing invalid sequences.
    fn load_string(&self, addr: u32, len: u64) -> Result<String, MemoryError> {
        if len == 0 {
            return Ok(String::new());
        }

        Ok(String::from_utf8_lossy(self.read_bytes(addr, len)?).into_owned())
    }

    /// Reads a `{ data, length }` string view. The length occupies the word following the
    /// data address.
    fn load_string_view(&self, addr: u32, word: WordSize) -> Result<String, MemoryError> {
        let data = self.load_ptr(addr)?;
        let len = self.load_uint(addr.saturating_add(word.bytes()), word)?;
        self.load_string(data, len)
    }

    fn store_string_view(
        &mut self,
        addr: u32,
        word: WordSize,
        data: u32,
        len: u64,
    ) -> Result<(), MemoryError> {
        self.store_u32(addr, data)?;
        self.store_uint(addr.saturating_add(word.bytes()), word, len)
    }

    fn alloc_nonnull(&mut self, size: u32) -> anyhow::Result<u32> {
        let addr = self.alloc(size)?;

        if addr == 0 {
            return Err(MemoryError::AllocFailed { size }.into());
        }

        Ok(addr)
    }

    fn alloc_bytes(&mut self, data: &[u8]) -> anyhow::Result<u32> {
        let size = u32::try_from(data.len()).context("allocation too large for guest")?;
        let addr = self.alloc_nonnull(size)?;
        self.write_bytes(addr, data)?;
        Ok(addr)
    }

    /// Allocates a single block holding a string view immediately followed by its bytes. The
    /// whole block is released with one `free` of the returned address.
    fn alloc_string_view(&mut self, word: WordSize, value: &str) -> anyhow::Result<u32> {
        let view_size = word.bytes() * 2;
        let total = u32::try_from(value.len())
            .ok()
            .and_then(|len| len.checked_add(view_size))
            .context("string too large for guest")?;

        let addr = self.alloc_nonnull(total)?;
        let data = addr.saturating_add(view_size);

        self.store_string_view(addr, word, data, value.len() as u64)?;
        self.write_bytes(data, value.as_bytes())?;

        Ok(addr)
    }
}

impl<T: ?Sized + GuestContext> MemoryExt for T {}
