#![cfg(test)]

use super::*;

#[test]
fn cursor_realigns_before_wide_field() {
    let mut cursor = StructCursor::new(0);

    assert_eq!(cursor.field((4, 4)), 0);
    assert_eq!(cursor.field((8, 8)), 8);
    assert_eq!(cursor.field((4, 4)), 16);
    assert_eq!(cursor.offset(), 20);
}

#[test]
fn cursor_scalar_uses_size_as_alignment() {
    let mut cursor = StructCursor::new(0x100);

    assert_eq!(cursor.field(2), 0x100);
    assert_eq!(cursor.field(8), 0x108);
    assert_eq!(cursor.field(WordSize::Four), 0x110);
    assert_eq!(cursor.field((32, 8)), 0x118);
}

#[test]
fn cursor_rejects_null_base() {
    let err = StructCursor::required(0, "descriptor").unwrap_err();
    assert_eq!(err, MemoryError::NullAddress { what: "descriptor" });
}

#[test]
fn string_view_round_trip() {
    for word in [WordSize::Four, WordSize::Eight] {
        let mut guest = VecGuest::new(4096);

        for text in ["", "hello", "grüße, 世界 🦀"] {
            let view = guest.alloc_string_view(word, text).unwrap();
            assert_eq!(guest.load_string_view(view, word).unwrap(), text);
            assert_eq!(
                guest.load_uint(view + word.bytes(), word).unwrap(),
                text.len() as u64
            );
            guest.free(view).unwrap();
        }

        assert_eq!(guest.live_allocations(), 0);
    }
}

#[test]
fn empty_string_view_never_reads_data() {
    let mut guest = VecGuest::new(64);

    guest
        .store_string_view(16, WordSize::Four, 0xdead_beef, 0)
        .unwrap();

    assert_eq!(guest.load_string_view(16, WordSize::Four).unwrap(), "");
}

#[test]
fn invalid_utf8_is_replaced() {
    let mut guest = VecGuest::new(64);
    guest.write_bytes(32, &[b'o', 0xff, b'k']).unwrap();

    assert_eq!(guest.load_string(32, 3).unwrap(), "o\u{fffd}k");
}

#[test]
fn empty_array_skips_decoder() {
    let mut calls = 0;
    let out = decode_array(0, 0, 4, |_| {
        calls += 1;
        Ok(())
    })
    .unwrap();

    assert!(out.is_empty());
    assert_eq!(calls, 0);
}

#[test]
fn non_empty_array_at_null_fails() {
    let err = decode_array(3, 0, 4, |addr| Ok(addr)).unwrap_err();

    assert_eq!(
        err.downcast_ref::<MemoryError>(),
        Some(&MemoryError::NullAddress { what: "array base" })
    );
}

#[test]
fn array_elements_follow_stride() {
    let mut guest = VecGuest::new(256);
    for (i, value) in [7u32, 11, 13].into_iter().enumerate() {
        guest.store_u32(64 + i as u32 * 8, value).unwrap();
    }

    let out = decode_array(3, 64, 8, |addr| Ok(guest.load_u32(addr)?)).unwrap();
    assert_eq!(out, [7, 11, 13]);
}

#[test]
fn out_of_bounds_access_is_an_error() {
    let guest = VecGuest::new(32);

    assert_eq!(
        guest.load_u64(28).unwrap_err(),
        MemoryError::OutOfBounds { addr: 28, len: 8 }
    );
    assert!(guest.load_u32(u32::MAX).is_err());
}

#[test]
fn guest_rejects_double_free() {
    let mut guest = VecGuest::new(128);
    let addr = guest.alloc_nonnull(12).unwrap();

    assert!(guest.is_live(addr));
    guest.free(addr).unwrap();
    assert!(guest.free(addr).is_err());
    assert_eq!(guest.freed(), [addr]);
}

#[test]
fn exhausted_guest_reports_alloc_failure() {
    let mut guest = VecGuest::new(32);
    let err = guest.alloc_nonnull(64).unwrap_err();

    assert_eq!(
        err.downcast_ref::<MemoryError>(),
        Some(&MemoryError::AllocFailed { size: 64 })
    );
}

#[test]
fn capped_heap_fails_past_limit() {
    let mut guest = VecGuest::new(4096);
    guest.cap_heap(16);

    let first = guest.alloc_nonnull(4).unwrap();
    let second = guest.alloc_nonnull(4).unwrap();
    assert_eq!(second, first + 8);
    assert!(guest.alloc_nonnull(4).is_err());
    assert_eq!(guest.live_allocations(), 2);
}

#[test]
fn uint_follows_word_size() {
    let mut guest = VecGuest::new(64);

    guest.store_uint(8, WordSize::Eight, 1 << 40).unwrap();
    assert_eq!(guest.load_uint(8, WordSize::Eight).unwrap(), 1 << 40);

    guest.store_uint(24, WordSize::Four, 77).unwrap();
    assert_eq!(guest.load_uint(24, WordSize::Four).unwrap(), 77);
    assert_eq!(guest.load_u32(28).unwrap(), 0);
}
