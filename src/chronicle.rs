// Chronicle: Automerge-backed key-value store
//
// Every persisted key lives as a string scalar on the document root. A
// `WriteBatch` commits as a single Automerge transaction, and the whole
// document can be exported as one binary (or base64) snapshot.

use automerge::{transaction::Transactable, Automerge, AutomergeError, ReadDoc, Value};
use std::cell::RefCell;
use std::rc::Rc;

use crate::store::{KeyValueStore, WriteBatch};
use crate::types::{EconomyError, Result};

/// Shared handle to an Automerge document used as a key-value store
///
/// Clones share the same document, so a host can hand one clone to the
/// engine and keep another to export snapshots.
///
/// Document structure:
/// ROOT
/// ├── gd_balance: "90.00"
/// ├── gd_xp: "100"
/// ├── gd_stats: "{...json...}"
/// └── ...
#[derive(Clone)]
pub struct Chronicle {
    doc: Rc<RefCell<Automerge>>,
}

impl Chronicle {
    /// Create a Chronicle with an empty document
    pub fn new() -> Chronicle {
        Chronicle {
            doc: Rc::new(RefCell::new(Automerge::new())),
        }
    }

    /// Load a document from binary format
    pub fn load(data: &[u8]) -> Result<Chronicle> {
        let doc = Automerge::load(data)
            .map_err(|e| EconomyError::Crdt(format!("Failed to load document: {:?}", e)))?;
        Ok(Chronicle {
            doc: Rc::new(RefCell::new(doc)),
        })
    }

    /// Load a document from a base64 string
    pub fn load_from_base64(base64: &str) -> Result<Chronicle> {
        let data = base64_decode(base64)
            .map_err(|e| EconomyError::Serialization(format!("Invalid base64: {}", e)))?;
        Self::load(&data)
    }

    /// Save the document to binary format
    pub fn save(&self) -> Vec<u8> {
        self.doc.borrow().save()
    }

    /// Save the document to a base64 string (for localStorage or transport)
    pub fn save_to_base64(&self) -> String {
        base64_encode(&self.save())
    }

    /// Number of heads in the change graph
    pub fn change_count(&self) -> usize {
        self.doc.borrow().get_heads().len()
    }

    /// All keys currently on the document root
    pub fn keys(&self) -> Vec<String> {
        self.doc
            .borrow()
            .map_range(automerge::ROOT, ..)
            .map(|item| item.key.to_string())
            .collect()
    }

    fn transact<F>(&mut self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut automerge::transaction::Transaction<'_>) -> std::result::Result<(), AutomergeError>,
    {
        self.doc
            .borrow_mut()
            .transact::<_, _, AutomergeError>(|tx| apply(tx))
            .map_err(|e| EconomyError::Crdt(format!("Transaction failed: {:?}", e)))?;
        Ok(())
    }
}

impl Default for Chronicle {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for Chronicle {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let doc = self.doc.borrow();
        let entry = doc
            .get(automerge::ROOT, key)
            .map_err(|e| EconomyError::Crdt(format!("Failed to read {}: {:?}", key, e)))?;

        match entry {
            Some((Value::Scalar(s), _)) => match s.as_ref() {
                automerge::ScalarValue::Str(v) => Ok(Some(v.to_string())),
                // Foreign scalar types are not ours; treat as missing
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.transact(|tx| tx.put(automerge::ROOT, key, value))
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.get(key)?.is_none() {
            return Ok(());
        }
        self.transact(|tx| tx.delete(automerge::ROOT, key))
    }

    fn commit(&mut self, batch: &WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let present: Vec<bool> = batch
            .iter()
            .map(|(key, _)| matches!(self.get(key), Ok(Some(_))))
            .collect();

        self.transact(|tx| {
            for ((key, value), exists) in batch.iter().zip(present) {
                match value {
                    Some(v) => tx.put(automerge::ROOT, key, v)?,
                    None if exists => tx.delete(automerge::ROOT, key)?,
                    None => {}
                }
            }
            Ok(())
        })
    }
}

// Base64 encoding/decoding helpers
fn base64_encode(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len().div_ceil(3) * 4);
    for chunk in data.chunks(3) {
        let mut buf = [0u8; 3];
        buf[..chunk.len()].copy_from_slice(chunk);

        let sextets = [
            buf[0] >> 2,
            ((buf[0] & 0x03) << 4) | (buf[1] >> 4),
            ((buf[1] & 0x0F) << 2) | (buf[2] >> 6),
            buf[2] & 0x3F,
        ];

        for (i, &val) in sextets.iter().enumerate() {
            if i > chunk.len() {
                result.push('=');
            } else {
                result.push(BASE64_CHARS[val as usize] as char);
            }
        }
    }
    result
}

fn base64_decode(data: &str) -> std::result::Result<Vec<u8>, String> {
    let bytes = data.trim().as_bytes();
    if bytes.len() % 4 != 0 {
        return Err("Invalid base64 length".to_string());
    }

    let last = (bytes.len() / 4).saturating_sub(1);
    let mut result = Vec::with_capacity(bytes.len() / 4 * 3);
    for (n, chunk) in bytes.chunks(4).enumerate() {
        // Padding may only trail the final chunk, at most two characters
        let pad = chunk.iter().rev().take_while(|&&ch| ch == b'=').count();
        if pad > 2 || (pad > 0 && n != last) {
            return Err("Misplaced padding".to_string());
        }

        let mut vals = [0u8; 4];
        for (i, &ch) in chunk[..4 - pad].iter().enumerate() {
            vals[i] = match BASE64_DECODE[ch as usize] {
                INVALID => return Err(format!("Invalid base64 character {:?}", ch as char)),
                v => v,
            };
        }

        result.push((vals[0] << 2) | (vals[1] >> 4));
        if pad < 2 {
            result.push((vals[1] << 4) | (vals[2] >> 2));
        }
        if pad < 1 {
            result.push((vals[2] << 6) | vals[3]);
        }
    }

    Ok(result)
}

const BASE64_CHARS: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const INVALID: u8 = 0xFF;

const BASE64_DECODE: &[u8; 256] = &{
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < 64 {
        table[BASE64_CHARS[i] as usize] = i as u8;
        i += 1;
    }
    table
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chronicle_creation() {
        let chronicle = Chronicle::new();
        assert_eq!(chronicle.change_count(), 0);
        assert!(chronicle.keys().is_empty());
    }

    #[test]
    fn test_set_get_remove() {
        let mut chronicle = Chronicle::new();
        chronicle.set("gd_balance", "90.00").unwrap();

        assert_eq!(chronicle.get("gd_balance").unwrap().as_deref(), Some("90.00"));
        assert_eq!(chronicle.get("gd_xp").unwrap(), None);

        chronicle.remove("gd_balance").unwrap();
        assert_eq!(chronicle.get("gd_balance").unwrap(), None);

        // Removing a missing key is a no-op
        chronicle.remove("gd_balance").unwrap();
    }

    #[test]
    fn test_batch_applies_sets_and_removes() {
        let mut chronicle = Chronicle::new();
        chronicle.set("gd_level", "4").unwrap();

        let mut batch = WriteBatch::new();
        batch.set("gd_balance", "90.00");
        batch.set("gd_xp", "100");
        batch.remove("gd_level");
        batch.remove("gd_never_written");
        chronicle.commit(&batch).unwrap();

        let mut keys = chronicle.keys();
        keys.sort();
        assert_eq!(keys, vec!["gd_balance".to_string(), "gd_xp".to_string()]);
        assert_eq!(chronicle.change_count(), 1);
    }

    #[test]
    fn test_clones_share_document() {
        let chronicle = Chronicle::new();
        let mut engine_handle = chronicle.clone();
        engine_handle.set("gd_xp", "250").unwrap();

        assert_eq!(chronicle.get("gd_xp").unwrap().as_deref(), Some("250"));
    }

    #[test]
    fn test_save_and_load() {
        let mut chronicle = Chronicle::new();
        chronicle.set("gd_stats", r#"{"totalWon":25.0}"#).unwrap();

        let restored = Chronicle::load(&chronicle.save()).unwrap();
        assert_eq!(
            restored.get("gd_stats").unwrap().as_deref(),
            Some(r#"{"totalWon":25.0}"#)
        );
    }

    #[test]
    fn test_base64_snapshot() {
        let mut chronicle = Chronicle::new();
        chronicle.set("gd_daily_last", "2026-03-10T12:00:00+00:00").unwrap();

        let snapshot = chronicle.save_to_base64();
        assert!(!snapshot.is_empty());

        let restored = Chronicle::load_from_base64(&snapshot).unwrap();
        assert_eq!(
            restored.get("gd_daily_last").unwrap().as_deref(),
            Some("2026-03-10T12:00:00+00:00")
        );
    }

    #[test]
    fn test_load_rejects_garbage() {
        assert!(Chronicle::load_from_base64("not base64!").is_err());
        assert!(Chronicle::load(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_base64_helpers() {
        assert_eq!(base64_encode(b"gd"), "Z2Q=");
        assert_eq!(base64_encode(b"gd_"), "Z2Rf");
        assert_eq!(base64_encode(b"g"), "Zw==");
        assert_eq!(base64_decode("Z2Q=").unwrap(), b"gd");
        assert_eq!(base64_decode("Zw==").unwrap(), b"g");
        assert!(base64_decode("Zw=").is_err());
    }

    #[test]
    fn test_base64_rejects_bad_padding() {
        assert!(base64_decode("ZZ=A").is_err());
        assert!(base64_decode("Zw==Zw==").is_err());
        assert!(base64_decode("Z===").is_err());
        assert!(base64_decode("====").is_err());
        assert_eq!(base64_decode("Zm9vZw==").unwrap(), b"foog");
        assert_eq!(base64_decode("").unwrap(), b"");
    }
}
