//! Entry points, grouped by the kind of object they act on.
//!
//! Every entry point follows one of three shapes. Accessors resolve their object and return a
//! value, or a neutral value when the handle is dead. Factories decode a descriptor and return a
//! fresh handle, or `0`. Requests decode a callback record and return `0` immediately; their
//! callback fires exactly once from [`GpuBridge::poll`](crate::GpuBridge::poll).

use wasmlink::{GuestContext, MemoryExt, StructCursor, WordSize, require_addr};

use crate::{backend::HostError, callback::stage_output, decode::UnresolvedHandle, enums};

mod adapter;
mod buffer;
mod command_encoder;
mod compute_pass;
mod device;
mod instance;
mod query_set;
mod queue;
mod render_pass;
mod shader_module;
mod surface;
mod texture;

/// The all-ones value of the guest's `uint`, which requests "the rest of the object".
pub(crate) fn size_arg(word: WordSize, size: u64) -> Option<u64> {
    let whole = match word {
        WordSize::Four => u64::from(u32::MAX),
        WordSize::Eight => u64::MAX,
    };

    (size != whole).then_some(size)
}

/// Rejects a request made against a dead handle through its own callback.
pub(crate) fn missing(kind: &'static str, handle: u32) -> HostError {
    HostError::unknown(UnresolvedHandle { kind, handle }.to_string())
}

/// Writes `{ count, features }` for the features the guest knows about, in ordinal order.
/// Nothing is written when no known feature is supported.
pub(crate) fn write_supported_features(
    cx: &mut dyn GuestContext,
    word: WordSize,
    features: &[String],
    out: u32,
) -> anyhow::Result<()> {
    let out = require_addr(out, "supported features")?;

    let mut ordinals = features
        .iter()
        .filter_map(|name| enums::FEATURE_NAME.index_of(name))
        .collect::<Vec<_>>();

    ordinals.sort_unstable();
    ordinals.dedup();

    if ordinals.is_empty() {
        return Ok(());
    }

    stage_output(cx, |cx, staging| {
        let array = staging.alloc(cx, ordinals.len() as u32 * 4)?;
        for (i, &ordinal) in ordinals.iter().enumerate() {
            cx.store_u32(array + i as u32 * 4, ordinal)?;
        }

        let mut off = StructCursor::new(out);
        cx.store_uint(off.field(word), word, ordinals.len() as u64)?;
        cx.store_u32(off.field(4), array)?;

        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use wasmlink::VecGuest;

    use super::*;

    #[test]
    fn whole_size_follows_word() {
        assert_eq!(size_arg(WordSize::Four, u64::from(u32::MAX)), None);
        assert_eq!(size_arg(WordSize::Eight, u64::from(u32::MAX)), Some(u64::from(u32::MAX)));
        assert_eq!(size_arg(WordSize::Eight, u64::MAX), None);
        assert_eq!(size_arg(WordSize::Four, 64), Some(64));
    }

    #[test]
    fn features_written_in_ordinal_order() {
        let mut guest = VecGuest::new(256);
        let features = ["timestamp-query", "depth-clip-control", "not-a-feature"]
            .map(String::from);

        write_supported_features(&mut guest, WordSize::Eight, &features, 128).unwrap();

        assert_eq!(guest.load_u64(128).unwrap(), 2);
        let array = guest.load_u32(136).unwrap();
        let first = guest.load_i32(array).unwrap();
        let second = guest.load_i32(array + 4).unwrap();
        assert!(first < second);
        assert_eq!(enums::FEATURE_NAME.str(first), Some("depth-clip-control"));
        assert_eq!(enums::FEATURE_NAME.str(second), Some("timestamp-query"));
    }

    #[test]
    fn unwritable_output_frees_feature_array() {
        let mut guest = VecGuest::new(256);
        let features = ["timestamp-query".to_string()];

        assert!(write_supported_features(&mut guest, WordSize::Eight, &features, 252).is_err());
        assert_eq!(guest.live_allocations(), 0);
        assert_eq!(guest.freed().len(), 1);
    }

    #[test]
    fn no_known_features_writes_nothing() {
        let mut guest = VecGuest::new(256);
        write_supported_features(&mut guest, WordSize::Four, &[], 128).unwrap();

        assert_eq!(guest.load_u64(128).unwrap(), 0);
        assert_eq!(guest.live_allocations(), 0);
    }
}
