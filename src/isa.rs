//! The RV32I instruction catalog: mnemonic -> (format, opcode, funct3,
//! funct7) and the register name -> index alias table. Built once and
//! shared read-only by both the assembler and the execution engine, so
//! opcodes and function codes are specified in exactly one place.

use std::fmt;

use thiserror::Error;

/// One of the six RV32I instruction encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    R,
    I,
    S,
    B,
    U,
    J,
}

/// Opcode (7 bits, RV32I base set).
pub mod opcode {
    pub const OP: u32 = 0b0110011;
    pub const OP_IMM: u32 = 0b0010011;
    pub const LOAD: u32 = 0b0000011;
    pub const STORE: u32 = 0b0100011;
    pub const BRANCH: u32 = 0b1100011;
    pub const JAL: u32 = 0b1101111;
    pub const JALR: u32 = 0b1100111;
    pub const LUI: u32 = 0b0110111;
    pub const AUIPC: u32 = 0b0010111;
}

/// Immutable record describing one mnemonic's encoding.
#[derive(Debug, Clone, Copy)]
pub struct Descriptor {
    pub format: Format,
    pub opcode: u32,
    pub funct3: Option<u32>,
    pub funct7: Option<u32>,
}

const fn r(funct3: u32, funct7: u32) -> Descriptor {
    Descriptor {
        format: Format::R,
        opcode: opcode::OP,
        funct3: Some(funct3),
        funct7: Some(funct7),
    }
}

const fn i_alu(funct3: u32) -> Descriptor {
    Descriptor {
        format: Format::I,
        opcode: opcode::OP_IMM,
        funct3: Some(funct3),
        funct7: None,
    }
}

const fn i_shift(funct3: u32, funct7: u32) -> Descriptor {
    Descriptor {
        format: Format::I,
        opcode: opcode::OP_IMM,
        funct3: Some(funct3),
        funct7: Some(funct7),
    }
}

const fn load(funct3: u32) -> Descriptor {
    Descriptor {
        format: Format::I,
        opcode: opcode::LOAD,
        funct3: Some(funct3),
        funct7: None,
    }
}

const fn store(funct3: u32) -> Descriptor {
    Descriptor {
        format: Format::S,
        opcode: opcode::STORE,
        funct3: Some(funct3),
        funct7: None,
    }
}

const fn branch(funct3: u32) -> Descriptor {
    Descriptor {
        format: Format::B,
        opcode: opcode::BRANCH,
        funct3: Some(funct3),
        funct7: None,
    }
}

/// mnemonic, descriptor pairs making up the whole RV32I base set.
const TABLE: &[(&str, Descriptor)] = &[
    // R-type ALU
    ("add", r(0b000, 0b0000000)),
    ("sub", r(0b000, 0b0100000)),
    ("sll", r(0b001, 0b0000000)),
    ("slt", r(0b010, 0b0000000)),
    ("sltu", r(0b011, 0b0000000)),
    ("xor", r(0b100, 0b0000000)),
    ("srl", r(0b101, 0b0000000)),
    ("sra", r(0b101, 0b0100000)),
    ("or", r(0b110, 0b0000000)),
    ("and", r(0b111, 0b0000000)),
    // I-type ALU
    ("addi", i_alu(0b000)),
    ("slti", i_alu(0b010)),
    ("sltiu", i_alu(0b011)),
    ("xori", i_alu(0b100)),
    ("ori", i_alu(0b110)),
    ("andi", i_alu(0b111)),
    ("slli", i_shift(0b001, 0b0000000)),
    ("srli", i_shift(0b101, 0b0000000)),
    ("srai", i_shift(0b101, 0b0100000)),
    // Loads
    ("lb", load(0b000)),
    ("lh", load(0b001)),
    ("lw", load(0b010)),
    ("lbu", load(0b100)),
    ("lhu", load(0b101)),
    // Stores
    ("sb", store(0b000)),
    ("sh", store(0b001)),
    ("sw", store(0b010)),
    // Branches
    ("beq", branch(0b000)),
    ("bne", branch(0b001)),
    ("blt", branch(0b100)),
    ("bge", branch(0b101)),
    ("bltu", branch(0b110)),
    ("bgeu", branch(0b111)),
    // Jumps
    (
        "jal",
        Descriptor {
            format: Format::J,
            opcode: opcode::JAL,
            funct3: None,
            funct7: None,
        },
    ),
    ("jalr", i_alu_with_opcode(opcode::JALR, 0b000)),
    // Upper immediate
    (
        "lui",
        Descriptor {
            format: Format::U,
            opcode: opcode::LUI,
            funct3: None,
            funct7: None,
        },
    ),
    (
        "auipc",
        Descriptor {
            format: Format::U,
            opcode: opcode::AUIPC,
            funct3: None,
            funct7: None,
        },
    ),
];

const fn i_alu_with_opcode(opcode: u32, funct3: u32) -> Descriptor {
    Descriptor {
        format: Format::I,
        opcode,
        funct3: Some(funct3),
        funct7: None,
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown instruction mnemonic '{0}'")]
pub struct UnknownMnemonic(pub String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown register '{0}'")]
pub struct UnknownRegister(pub String);

/// Look up the descriptor for a mnemonic. Case-sensitive: mnemonics
/// are lower-cased by the tokenizer before this is called.
pub fn lookup(mnemonic: &str) -> Result<Descriptor, UnknownMnemonic> {
    TABLE
        .iter()
        .find(|(name, _)| *name == mnemonic)
        .map(|(_, descriptor)| *descriptor)
        .ok_or_else(|| UnknownMnemonic(mnemonic.to_string()))
}

const ABI_NAMES: &[&str] = &[
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// Convert a register name (`x0`..`x31`, an ABI alias, or `fp`) to its
/// index 0..31. `fp` is a second alias for `x8`/`s0`.
pub fn register_index(name: &str) -> Result<u8, UnknownRegister> {
    if name == "fp" {
        return Ok(8);
    }
    if let Some(digits) = name.strip_prefix('x') {
        if let Ok(n) = digits.parse::<u32>() {
            if n < 32 {
                return Ok(n as u8);
            }
        }
        return Err(UnknownRegister(name.to_string()));
    }
    ABI_NAMES
        .iter()
        .position(|abi| *abi == name)
        .map(|index| index as u8)
        .ok_or_else(|| UnknownRegister(name.to_string()))
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let letter = match self {
            Format::R => "R",
            Format::I => "I",
            Format::S => "S",
            Format::B => "B",
            Format::U => "U",
            Format::J => "J",
        };
        write!(f, "{letter}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_every_base_mnemonic() {
        let mnemonics = [
            "add", "sub", "sll", "slt", "sltu", "xor", "srl", "sra", "or", "and", "addi", "slti",
            "sltiu", "xori", "ori", "andi", "slli", "srli", "srai", "lb", "lh", "lw", "lbu",
            "lhu", "sb", "sh", "sw", "beq", "bne", "blt", "bge", "bltu", "bgeu", "jal", "jalr",
            "lui", "auipc",
        ];
        for mnemonic in mnemonics {
            assert!(lookup(mnemonic).is_ok(), "{mnemonic} should be known");
        }
        assert_eq!(mnemonics.len(), 37);
    }

    #[test]
    fn unknown_mnemonic_is_reported() {
        assert!(lookup("frobnicate").is_err());
    }

    #[test]
    fn numeric_and_abi_names_agree() {
        assert_eq!(register_index("x0").unwrap(), 0);
        assert_eq!(register_index("zero").unwrap(), 0);
        assert_eq!(register_index("x2").unwrap(), 2);
        assert_eq!(register_index("sp").unwrap(), 2);
        assert_eq!(register_index("x8").unwrap(), 8);
        assert_eq!(register_index("s0").unwrap(), 8);
        assert_eq!(register_index("fp").unwrap(), 8);
        assert_eq!(register_index("x10").unwrap(), 10);
        assert_eq!(register_index("a0").unwrap(), 10);
        assert_eq!(register_index("x31").unwrap(), 31);
        assert_eq!(register_index("t6").unwrap(), 31);
    }

    #[test]
    fn out_of_range_numeric_register_is_unknown() {
        assert!(register_index("x32").is_err());
    }
}
