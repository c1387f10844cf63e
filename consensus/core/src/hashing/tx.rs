use crate::tx::{Transaction, TransactionId};
use ember_hashes::DoubleSha256;

/// Returns the transaction id, the double-SHA256 of the canonical
/// serialization.
pub fn id(tx: &Transaction) -> TransactionId {
    let mut hasher = DoubleSha256::new();
    hasher.update(tx.version.to_le_bytes());
    write_compact_len(&mut hasher, tx.inputs.len() as u64);
    for input in tx.inputs.iter() {
        hasher.update(input.previous_outpoint.transaction_id);
        hasher.update(input.previous_outpoint.index.to_le_bytes());
        write_compact_len(&mut hasher, input.signature_script.len() as u64);
        hasher.update(&input.signature_script);
        hasher.update(input.sequence.to_le_bytes());
    }
    write_compact_len(&mut hasher, tx.outputs.len() as u64);
    for output in tx.outputs.iter() {
        hasher.update(output.value.to_le_bytes());
        write_compact_len(&mut hasher, output.script_public_key.script().len() as u64);
        hasher.update(output.script_public_key.script());
    }
    hasher.update(tx.lock_time.to_le_bytes());
    hasher.finalize()
}

fn write_compact_len(hasher: &mut DoubleSha256, value: u64) {
    match value {
        0..=0xfc => {
            hasher.update([value as u8]);
        }
        0xfd..=0xffff => {
            hasher.update([0xfdu8]);
            hasher.update((value as u16).to_le_bytes());
        }
        0x10000..=0xffff_ffff => {
            hasher.update([0xfeu8]);
            hasher.update((value as u32).to_le_bytes());
        }
        _ => {
            hasher.update([0xffu8]);
            hasher.update(value.to_le_bytes());
        }
    }
}
