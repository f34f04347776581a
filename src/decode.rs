//! Unpacks a 32-bit instruction word into its constituent fields and
//! pre-computes all six format-specific sign-extended immediates, so
//! execution handlers consume an already-decoded immediate rather
//! than re-deriving it per opcode.

use crate::bits::{extract_field, sign_extend};

/// Every field a handler might need, decoded once per fetched word.
#[derive(Debug, Clone, Copy)]
pub struct Decoded {
    pub raw: u32,
    pub opcode: u32,
    pub rd: u8,
    pub funct3: u8,
    pub rs1: u8,
    pub rs2: u8,
    pub funct7: u8,
    /// Sign-extended I-type immediate (loads, JALR, I-type ALU).
    pub imm_i: i32,
    /// Sign-extended S-type immediate (stores).
    pub imm_s: i32,
    /// Sign-extended B-type immediate (branches), bit 0 always zero.
    pub imm_b: i32,
    /// Raw U-type immediate, already shifted into bits [31:12].
    pub imm_u: u32,
    /// Sign-extended J-type immediate (JAL), bit 0 always zero.
    pub imm_j: i32,
    /// imm[4:0] of an I-type word, the shift amount for SLLI/SRLI/SRAI.
    pub shamt: u8,
}

pub fn decode(word: u32) -> Decoded {
    let opcode = extract_field(word, 6, 0);
    let rd = extract_field(word, 11, 7) as u8;
    let funct3 = extract_field(word, 14, 12) as u8;
    let rs1 = extract_field(word, 19, 15) as u8;
    let rs2 = extract_field(word, 24, 20) as u8;
    let funct7 = extract_field(word, 31, 25) as u8;

    let imm_i = sign_extend(extract_field(word, 31, 20), 12) as i32;

    let s_field = (extract_field(word, 31, 25) << 5) | extract_field(word, 11, 7);
    let imm_s = sign_extend(s_field, 12) as i32;

    let b_field = (extract_field(word, 31, 31) << 12)
        | (extract_field(word, 7, 7) << 11)
        | (extract_field(word, 30, 25) << 5)
        | (extract_field(word, 11, 8) << 1);
    let imm_b = sign_extend(b_field, 13) as i32;

    let imm_u = extract_field(word, 31, 12) << 12;

    let j_field = (extract_field(word, 31, 31) << 20)
        | (extract_field(word, 19, 12) << 12)
        | (extract_field(word, 20, 20) << 11)
        | (extract_field(word, 30, 21) << 1);
    let imm_j = sign_extend(j_field, 21) as i32;

    let shamt = extract_field(word, 24, 20) as u8;

    Decoded {
        raw: word,
        opcode,
        rd,
        funct3,
        rs1,
        rs2,
        funct7,
        imm_i,
        imm_s,
        imm_b,
        imm_u,
        imm_j,
        shamt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode;
    use crate::isa::opcode;

    #[test]
    fn decode_inverts_encode_for_add() {
        let word = encode::r_type(0b0100000, 5, 4, 0b000, 3, opcode::OP);
        let decoded = decode(word);
        assert_eq!(decoded.opcode, opcode::OP);
        assert_eq!(decoded.rd, 3);
        assert_eq!(decoded.funct3, 0);
        assert_eq!(decoded.rs1, 4);
        assert_eq!(decoded.rs2, 5);
        assert_eq!(decoded.funct7, 0b0100000);
    }

    #[test]
    fn decode_sign_extends_negative_i_type_immediate() {
        let word = encode::i_type(0xFFF, 0, 0b000, 1, opcode::OP_IMM);
        assert_eq!(decode(word).imm_i, -1);
    }

    #[test]
    fn decode_recovers_s_type_immediate() {
        let word = encode::s_type((-4i32 as u32) & 0xFFF, 2, 1, 0b010, opcode::STORE);
        assert_eq!(decode(word).imm_s, -4);
    }

    #[test]
    fn decode_recovers_b_type_immediate_and_keeps_bit_zero_clear() {
        let offset = -16i32 as u32;
        let word = encode::b_type(offset & 0x1FFF, 2, 1, 0b000, opcode::BRANCH);
        assert_eq!(decode(word).imm_b, -16);
    }

    #[test]
    fn decode_recovers_j_type_immediate() {
        let offset = 0x7FE_i32 as u32;
        let word = encode::j_type(offset & 0x1FFFFF, 1, opcode::JAL);
        assert_eq!(decode(word).imm_j, 0x7FE);
    }

    #[test]
    fn decode_recovers_u_type_immediate() {
        let word = encode::u_type(0x12345, 1, opcode::LUI);
        assert_eq!(decode(word).imm_u, 0x12345000);
    }

    #[test]
    fn shift_amount_is_masked_to_five_bits() {
        let word = encode::i_type(
            encode::shift_imm_field(0b100001, 0),
            1,
            0b001,
            1,
            opcode::OP_IMM,
        );
        // 0b100001 & 0x1F == 1
        assert_eq!(decode(word).shamt, 1);
    }
}
