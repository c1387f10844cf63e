/// Number of base units per coin.
pub const COIN: u64 = 100_000_000;

/// Scale factor between transaction virtual size and block weight.
pub const WITNESS_SCALE_FACTOR: u64 = 4;

/// Sigop accounting charge for a bare CHECKMULTISIG.
pub const MAX_PUBKEYS_PER_MULTISIG: i64 = 20;

/// Version-bits top bits, the base of every computed block version.
pub const BLOCK_VERSION: u32 = 0x2000_0000;

/// Commitment marker bytes following the OP_RETURN push in the coinbase
/// witness-commitment output.
pub const WITNESS_COMMITMENT_HEADER: [u8; 4] = [0xaa, 0x21, 0xa9, 0xed];
