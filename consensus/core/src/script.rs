use crate::constants::MAX_PUBKEYS_PER_MULTISIG;
use crate::tx::{ScriptVec, Transaction};

pub mod opcodes {
    pub const OP_0: u8 = 0x00;
    pub const OP_PUSHDATA1: u8 = 0x4c;
    pub const OP_PUSHDATA2: u8 = 0x4d;
    pub const OP_PUSHDATA4: u8 = 0x4e;
    pub const OP_1NEGATE: u8 = 0x4f;
    pub const OP_1: u8 = 0x51;
    pub const OP_TRUE: u8 = OP_1;
    pub const OP_16: u8 = 0x60;
    pub const OP_RETURN: u8 = 0x6a;
    pub const OP_DUP: u8 = 0x76;
    pub const OP_EQUALVERIFY: u8 = 0x88;
    pub const OP_HASH160: u8 = 0xa9;
    pub const OP_CHECKSIG: u8 = 0xac;
    pub const OP_CHECKSIGVERIFY: u8 = 0xad;
    pub const OP_CHECKMULTISIG: u8 = 0xae;
    pub const OP_CHECKMULTISIGVERIFY: u8 = 0xaf;
    pub const OP_CREATE: u8 = 0xc1;
    pub const OP_CALL: u8 = 0xc2;
}

use opcodes::*;

/// Iterates the opcodes of a serialized script, skipping over push payloads.
/// Stops at the first malformed (truncated) push.
pub struct ScriptOpcodes<'a> {
    script: &'a [u8],
    pos: usize,
}

impl<'a> ScriptOpcodes<'a> {
    pub fn new(script: &'a [u8]) -> Self {
        Self { script, pos: 0 }
    }
}

impl Iterator for ScriptOpcodes<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let opcode = *self.script.get(self.pos)?;
        self.pos += 1;
        let payload = match opcode {
            1..=0x4b => opcode as usize,
            OP_PUSHDATA1 => {
                let len = *self.script.get(self.pos)? as usize;
                self.pos += 1;
                len
            }
            OP_PUSHDATA2 => {
                let bytes = self.script.get(self.pos..self.pos + 2)?;
                self.pos += 2;
                u16::from_le_bytes(bytes.try_into().unwrap()) as usize
            }
            OP_PUSHDATA4 => {
                let bytes = self.script.get(self.pos..self.pos + 4)?;
                self.pos += 4;
                u32::from_le_bytes(bytes.try_into().unwrap()) as usize
            }
            _ => 0,
        };
        if payload > 0 {
            self.script.get(self.pos..self.pos + payload)?;
            self.pos += payload;
        }
        Some(opcode)
    }
}

/// Does the script contain a contract creation or call opcode?
pub fn has_contract_op(script: &[u8]) -> bool {
    ScriptOpcodes::new(script).any(|opcode| opcode == OP_CREATE || opcode == OP_CALL)
}

/// Legacy signature-operation count of a single script.
pub fn legacy_sigop_count_script(script: &[u8]) -> i64 {
    ScriptOpcodes::new(script)
        .map(|opcode| match opcode {
            OP_CHECKSIG | OP_CHECKSIGVERIFY => 1,
            OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => MAX_PUBKEYS_PER_MULTISIG,
            _ => 0,
        })
        .sum()
}

/// Legacy signature-operation count over every script of the transaction.
pub fn legacy_sigop_count(tx: &Transaction) -> i64 {
    let inputs: i64 = tx.inputs.iter().map(|input| legacy_sigop_count_script(&input.signature_script)).sum();
    let outputs: i64 = tx.outputs.iter().map(|output| legacy_sigop_count_script(output.script_public_key.script())).sum();
    inputs + outputs
}

/// Incremental script writer covering the small opcode and push repertoire
/// needed by block assembly.
#[derive(Default)]
pub struct ScriptBuilder {
    script: ScriptVec,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_opcode(mut self, opcode: u8) -> Self {
        self.script.push(opcode);
        self
    }

    pub fn push_data(mut self, data: &[u8]) -> Self {
        assert!(data.len() <= 0x4b, "only direct pushes are supported");
        self.script.push(data.len() as u8);
        self.script.extend_from_slice(data);
        self
    }

    /// Minimal script-number push (the encoding used for the height in a
    /// coinbase signature script).
    pub fn push_number(mut self, value: i64) -> Self {
        match value {
            0 => self.script.push(OP_0),
            -1 => self.script.push(OP_1NEGATE),
            1..=16 => self.script.push(OP_1 + value as u8 - 1),
            _ => {
                let negative = value < 0;
                let mut absolute = value.unsigned_abs();
                let mut bytes: Vec<u8> = Vec::new();
                while absolute > 0 {
                    bytes.push((absolute & 0xff) as u8);
                    absolute >>= 8;
                }
                // The most significant bit encodes the sign, so a set high bit
                // requires an extra byte
                if bytes.last().unwrap() & 0x80 != 0 {
                    bytes.push(if negative { 0x80 } else { 0x00 });
                } else if negative {
                    *bytes.last_mut().unwrap() |= 0x80;
                }
                self.script.push(bytes.len() as u8);
                self.script.extend_from_slice(&bytes);
            }
        }
        self
    }

    pub fn build(self) -> ScriptVec {
        self.script
    }
}
