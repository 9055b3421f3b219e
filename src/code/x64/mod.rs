//! # x64
//!
//! Encodings of the x86-64 instructions this crate looks for or writes

/// Opcode of `je rel8` (also spelled `jz rel8`)
pub const JE_SHORT: u8 = 0x74;

/// Single-byte `nop`
pub const NOP: u8 = 0x90;

/// Single-byte `int3`, used to pad code that is never meant to run
pub const INT3: u8 = 0xcc;

/// Length of a short conditional branch (opcode + rel8)
pub const JCC_SHORT_LEN: usize = 2;

/// Longest legal x86 instruction
pub const MAX_INSTR_LEN: usize = 15;

/// Generates `len` single-byte `nop` instructions
///
/// Each byte decodes on its own, so the sled can replace an instruction of the same length
/// without shifting anything after it.
pub fn nops(len: usize) -> Vec<u8> {
    vec![NOP; len]
}

/// Overwrites every byte of `buf` with `nop`
pub fn fill_nops(buf: &mut [u8]) {
    buf.fill(NOP);
}

#[cfg(test)]
mod tests {
    use iced_x86::{Code, Decoder, DecoderOptions, Mnemonic};

    use crate::code::x64::{fill_nops, nops, JE_SHORT, JCC_SHORT_LEN, NOP};

    #[test]
    /// Every byte of a sled must decode as its own one byte `nop`
    fn test_nops_decode() {
        let sled = nops(4);
        let decoder = Decoder::new(64, &sled, DecoderOptions::NONE);
        let instructions: Vec<_> = decoder.into_iter().collect();
        assert_eq!(instructions.len(), 4);
        for instruction in instructions {
            assert_eq!(instruction.mnemonic(), Mnemonic::Nop);
            assert_eq!(instruction.len(), 1);
        }
    }

    #[test]
    fn test_je_short_decode() {
        let bytes = [JE_SHORT, 0x06];
        let mut decoder = Decoder::new(64, &bytes, DecoderOptions::NONE);
        let instruction = decoder.decode();
        assert_eq!(instruction.code(), Code::Je_rel8_64);
        assert_eq!(instruction.len(), JCC_SHORT_LEN);
    }

    #[test]
    /// Filling twice is the same as filling once
    fn test_fill_idempotent() {
        let mut once = vec![0x85, 0xff, JE_SHORT, 0x06, 0xc3];
        fill_nops(&mut once[2..4]);
        let mut twice = once.clone();
        fill_nops(&mut twice[2..4]);
        assert_eq!(once, twice);
        assert_eq!(once, [0x85, 0xff, NOP, NOP, 0xc3]);
    }
}
