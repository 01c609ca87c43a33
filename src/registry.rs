//! ASDU registry.
//!
//! A process-wide table from numeric type identifier to message codec.
//! The table is built exactly once, on first use, and is read-only
//! thereafter: registration is the explicit list in [`standard_codecs`],
//! not a runtime side effect, so there are no hidden ordering
//! dependencies and the table is safely shared across sessions.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::error::{Iec102Error, Result};
use crate::messages::{self, Message};
use crate::types::TypeId;

/// Decoder entry point of one registered message kind.
pub type DecodeFn = fn(&[u8], u8) -> Result<Message>;

/// One registry entry: the codec for a single type identifier.
#[derive(Clone, Copy)]
pub struct MessageCodec {
    /// The type identifier this codec handles
    pub type_id: TypeId,
    /// Decode `(data, qualifier)` into a typed message
    pub decode: DecodeFn,
}

impl std::fmt::Debug for MessageCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageCodec")
            .field("type_id", &self.type_id)
            .finish()
    }
}

macro_rules! codec {
    ($type_id:expr) => {
        MessageCodec {
            type_id: $type_id,
            decode: |data, qualifier| messages::decode($type_id, data, qualifier),
        }
    };
}

/// The full codec set of this client.
fn standard_codecs() -> Vec<MessageCodec> {
    vec![
        codec!(TypeId::AbsoluteTotals),
        codec!(TypeId::IncrementalTotals),
        codec!(TypeId::ManufacturerId),
        codec!(TypeId::DateTime),
        codec!(TypeId::ReadManufacturerId),
        codec!(TypeId::ReadDateTime),
        codec!(TypeId::ReadAbsoluteTotals),
        codec!(TypeId::ReadIncrementalTotals),
        codec!(TypeId::DaylightChangeDates),
        codec!(TypeId::ReadCurrentTariff),
        codec!(TypeId::ReadStoredTariff),
        codec!(TypeId::CurrentTariff),
        codec!(TypeId::StoredTariff),
        codec!(TypeId::BlockTotals),
        codec!(TypeId::ReadConfiguration),
        codec!(TypeId::Configuration),
        codec!(TypeId::ReadContractedPowers),
        codec!(TypeId::ContractedPowers),
        codec!(TypeId::ReadInstantValues),
        codec!(TypeId::InstantValues),
        codec!(TypeId::SetDateTime),
        codec!(TypeId::Authenticate),
        codec!(TypeId::ReadDaylightChangeDates),
        codec!(TypeId::FinishSession),
        codec!(TypeId::ReadBlockTotals),
    ]
}

static TABLE: Lazy<HashMap<u8, MessageCodec>> = Lazy::new(|| {
    standard_codecs()
        .into_iter()
        .map(|codec| (codec.type_id.as_u8(), codec))
        .collect()
});

/// Look up the codec for a numeric type identifier.
pub fn lookup(type_id: u8) -> Result<&'static MessageCodec> {
    TABLE
        .get(&type_id)
        .ok_or(Iec102Error::UnknownMessageType(type_id))
}

/// Decode a payload through the registered codec for `type_id`.
pub fn decode(type_id: TypeId, data: &[u8], qualifier: u8) -> Result<Message> {
    (lookup(type_id.as_u8())?.decode)(data, qualifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_complete() {
        let ids = [
            8u8, 11, 71, 72, 100, 103, 122, 123, 131, 133, 134, 135, 136, 140, 141, 142, 144, 145,
            162, 163, 181, 183, 185, 187, 190,
        ];
        for id in ids {
            let codec = lookup(id).unwrap();
            assert_eq!(codec.type_id.as_u8(), id);
        }
        assert_eq!(TABLE.len(), ids.len());
    }

    #[test]
    fn test_registry_unknown_type() {
        let err = lookup(200).unwrap_err();
        assert!(matches!(err, Iec102Error::UnknownMessageType(200)));
    }

    #[test]
    fn test_registry_decode_dispatch() {
        let msg = decode(TypeId::Authenticate, &[0x07, 0x00, 0x00, 0x00], 1).unwrap();
        assert_eq!(msg, Message::Authenticate { password: 7 });
        assert_eq!(msg.type_id(), TypeId::Authenticate);
    }
}
