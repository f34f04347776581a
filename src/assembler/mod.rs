//! Two-pass RV32I assembler: source text in, a sequence of encoded
//! 32-bit words out (or every diagnostic collected across the whole
//! program, never a partial result).

mod parser;
mod pseudo;

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::encode;
use crate::isa::{self, opcode, Format};
use parser::{Content, Directive};

/// A single assembly-time diagnostic, always tagged with its source
/// line by [`AssemblerError`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("{0}")]
    Syntax(String),
    #[error("unknown instruction mnemonic '{0}'")]
    UnknownMnemonic(String),
    #[error("unknown register '{0}'")]
    UnknownRegister(String),
    #[error("'{mnemonic}' expects {expected} operand(s), got {got}")]
    OperandError {
        mnemonic: String,
        expected: usize,
        got: usize,
    },
    #[error("immediate {value} does not fit in a {field_width}-bit signed field")]
    ImmediateRange { value: i64, field_width: u32 },
    #[error("reference to undefined label '{0}'")]
    UnresolvedLabel(String),
}

impl From<isa::UnknownMnemonic> for AssemblyError {
    fn from(err: isa::UnknownMnemonic) -> Self {
        AssemblyError::UnknownMnemonic(err.0)
    }
}

impl From<isa::UnknownRegister> for AssemblyError {
    fn from(err: isa::UnknownRegister) -> Self {
        AssemblyError::UnknownRegister(err.0)
    }
}

/// Every diagnostic collected across a failed `assemble` call, each
/// tagged with its 1-based source line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblerError(pub Vec<(usize, AssemblyError)>);

impl fmt::Display for AssemblerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (line, err) in &self.0 {
            writeln!(f, "line {line}: {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AssemblerError {}

/// Parse a decimal, `0x` hex, or `0b` binary integer literal, with an
/// optional leading `-`.
fn parse_integer_literal(token: &str) -> Result<i32, AssemblyError> {
    let (negative, body) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let magnitude = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else if let Some(bin) = body.strip_prefix("0b").or_else(|| body.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2)
    } else {
        body.parse::<i64>()
    }
    .map_err(|_| AssemblyError::Syntax(format!("'{token}' is not a valid integer literal")))?;
    let value = if negative { -magnitude } else { magnitude };
    i32::try_from(value)
        .map_err(|_| AssemblyError::ImmediateRange { value, field_width: 32 })
}

fn fits_signed(value: i64, bits: u32) -> bool {
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    (min..=max).contains(&value)
}

/// Resolve an operand that may be a literal or a label reference. Only
/// branch and jump targets allow labels; the result is already the
/// PC-relative offset (`target - current`) those formats need.
fn resolve_relative(
    operand: &str,
    current_addr: u32,
    labels: &HashMap<String, u32>,
) -> Result<i64, AssemblyError> {
    if let Ok(literal) = parse_integer_literal(operand) {
        return Ok(literal as i64);
    }
    let target = labels
        .get(operand)
        .copied()
        .ok_or_else(|| AssemblyError::UnresolvedLabel(operand.to_string()))?;
    Ok(target as i64 - current_addr as i64)
}

/// Encode one already pseudo-expanded base instruction at `addr`.
fn encode_instruction(
    mnemonic: &str,
    operands: &[String],
    addr: u32,
    labels: &HashMap<String, u32>,
) -> Result<u32, AssemblyError> {
    let descriptor = isa::lookup(mnemonic)?;
    let reg = |name: &str| -> Result<u32, AssemblyError> {
        Ok(isa::register_index(name)? as u32)
    };

    match descriptor.format {
        Format::R => {
            if operands.len() != 3 {
                return Err(AssemblyError::OperandError {
                    mnemonic: mnemonic.to_string(),
                    expected: 3,
                    got: operands.len(),
                });
            }
            let rd = reg(&operands[0])?;
            let rs1 = reg(&operands[1])?;
            let rs2 = reg(&operands[2])?;
            Ok(encode::r_type(
                descriptor.funct7.unwrap_or(0),
                rs2,
                rs1,
                descriptor.funct3.unwrap_or(0),
                rd,
                descriptor.opcode,
            ))
        }
        Format::I if descriptor.opcode == opcode::LOAD => {
            if operands.len() != 2 {
                return Err(AssemblyError::OperandError {
                    mnemonic: mnemonic.to_string(),
                    expected: 2,
                    got: operands.len(),
                });
            }
            let rd = reg(&operands[0])?;
            let (offset_token, base_reg) = parser::parse_memory_operand(&operands[1])?;
            let imm = parse_integer_literal(&offset_token)? as i64;
            if !fits_signed(imm, 12) {
                return Err(AssemblyError::ImmediateRange { value: imm, field_width: 12 });
            }
            let rs1 = reg(&base_reg)?;
            Ok(encode::i_type(
                imm as u32,
                rs1,
                descriptor.funct3.unwrap_or(0),
                rd,
                descriptor.opcode,
            ))
        }
        Format::I if descriptor.funct7.is_some() => {
            // Shift-immediate: slli/srli/srai.
            if operands.len() != 3 {
                return Err(AssemblyError::OperandError {
                    mnemonic: mnemonic.to_string(),
                    expected: 3,
                    got: operands.len(),
                });
            }
            let rd = reg(&operands[0])?;
            let rs1 = reg(&operands[1])?;
            let shamt = parse_integer_literal(&operands[2])? as u32;
            let Some(funct7) = descriptor.funct7 else {
                unreachable!("guarded above by descriptor.funct7.is_some()")
            };
            let imm = encode::shift_imm_field(shamt, funct7);
            Ok(encode::i_type(
                imm,
                rs1,
                descriptor.funct3.unwrap_or(0),
                rd,
                descriptor.opcode,
            ))
        }
        Format::I => {
            if operands.len() != 3 {
                return Err(AssemblyError::OperandError {
                    mnemonic: mnemonic.to_string(),
                    expected: 3,
                    got: operands.len(),
                });
            }
            let rd = reg(&operands[0])?;
            let rs1 = reg(&operands[1])?;
            // jalr/addi/etc. take an absolute value, not a PC-relative
            // offset: a label operand resolves to its address directly,
            // the same way `la`'s expansion resolves its symbol.
            let imm = if let Ok(literal) = parse_integer_literal(&operands[2]) {
                literal as i64
            } else {
                labels
                    .get(&operands[2])
                    .copied()
                    .ok_or_else(|| AssemblyError::UnresolvedLabel(operands[2].clone()))?
                    as i64
            };
            if !fits_signed(imm, 12) {
                return Err(AssemblyError::ImmediateRange { value: imm, field_width: 12 });
            }
            Ok(encode::i_type(
                imm as u32,
                rs1,
                descriptor.funct3.unwrap_or(0),
                rd,
                descriptor.opcode,
            ))
        }
        Format::S => {
            if operands.len() != 2 {
                return Err(AssemblyError::OperandError {
                    mnemonic: mnemonic.to_string(),
                    expected: 2,
                    got: operands.len(),
                });
            }
            let rs2 = reg(&operands[0])?;
            let (offset_token, base_reg) = parser::parse_memory_operand(&operands[1])?;
            let imm = parse_integer_literal(&offset_token)? as i64;
            if !fits_signed(imm, 12) {
                return Err(AssemblyError::ImmediateRange { value: imm, field_width: 12 });
            }
            let rs1 = reg(&base_reg)?;
            Ok(encode::s_type(
                imm as u32,
                rs2,
                rs1,
                descriptor.funct3.unwrap_or(0),
                descriptor.opcode,
            ))
        }
        Format::B => {
            if operands.len() != 3 {
                return Err(AssemblyError::OperandError {
                    mnemonic: mnemonic.to_string(),
                    expected: 3,
                    got: operands.len(),
                });
            }
            let rs1 = reg(&operands[0])?;
            let rs2 = reg(&operands[1])?;
            let offset = resolve_relative(&operands[2], addr, labels)?;
            if !fits_signed(offset, 13) {
                return Err(AssemblyError::ImmediateRange { value: offset, field_width: 13 });
            }
            Ok(encode::b_type(
                (offset as u32) & 0x1FFF,
                rs2,
                rs1,
                descriptor.funct3.unwrap_or(0),
                descriptor.opcode,
            ))
        }
        Format::U => {
            if operands.len() != 2 {
                return Err(AssemblyError::OperandError {
                    mnemonic: mnemonic.to_string(),
                    expected: 2,
                    got: operands.len(),
                });
            }
            let rd = reg(&operands[0])?;
            let imm = parse_integer_literal(&operands[1])? as i64;
            if !fits_signed(imm, 20) {
                return Err(AssemblyError::ImmediateRange { value: imm, field_width: 20 });
            }
            Ok(encode::u_type(imm as u32, rd, descriptor.opcode))
        }
        Format::J => {
            if operands.len() != 2 {
                return Err(AssemblyError::OperandError {
                    mnemonic: mnemonic.to_string(),
                    expected: 2,
                    got: operands.len(),
                });
            }
            let rd = reg(&operands[0])?;
            let offset = resolve_relative(&operands[1], addr, labels)?;
            if !fits_signed(offset, 21) {
                return Err(AssemblyError::ImmediateRange { value: offset, field_width: 21 });
            }
            Ok(encode::j_type((offset as u32) & 0x1FFFFF, rd, descriptor.opcode))
        }
    }
}

/// Assemble RV32I source text into a sequence of 32-bit words.
///
/// Pass 1 expands pseudo-instructions only far enough to know how
/// many words each line occupies, building the label table. Pass 2
/// re-expands identically (so the two passes can never disagree on
/// addresses) and encodes every instruction with labels resolved.
pub fn assemble(source: &str) -> Result<Vec<u32>, AssemblerError> {
    let lines: Vec<(usize, parser::ParsedLine)> = source
        .lines()
        .enumerate()
        .map(|(i, raw)| (i + 1, raw))
        .map(|(n, raw)| match parser::parse_line(raw) {
            Ok(parsed) => Ok((n, parsed)),
            Err(err) => Err((n, err)),
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AssemblerError(vec![e]))?;

    let mut errors = Vec::new();
    let mut labels = HashMap::new();
    let mut cursor: u32 = 0;

    for (line_no, parsed) in &lines {
        if let Some(label) = &parsed.label {
            labels.insert(label.clone(), cursor);
        }
        match &parsed.content {
            Content::Nothing => {}
            Content::Directive(Directive::Space(n)) => cursor = cursor.wrapping_add(*n),
            Content::Directive(Directive::Ignored) => {}
            Content::Instruction { mnemonic, operands } => {
                match pseudo::word_count(mnemonic, operands) {
                    Ok(words) => cursor = cursor.wrapping_add(4 * words as u32),
                    Err(err) => errors.push((*line_no, err)),
                }
            }
        }
    }

    if !errors.is_empty() {
        return Err(AssemblerError(errors));
    }

    let mut words = Vec::new();
    let mut cursor: u32 = 0;

    for (line_no, parsed) in &lines {
        match &parsed.content {
            Content::Nothing | Content::Directive(Directive::Ignored) => {}
            Content::Directive(Directive::Space(n)) => cursor = cursor.wrapping_add(*n),
            Content::Instruction { mnemonic, operands } => {
                let resolve = |name: &str| -> Result<u32, AssemblyError> {
                    labels
                        .get(name)
                        .copied()
                        .ok_or_else(|| AssemblyError::UnresolvedLabel(name.to_string()))
                };
                match pseudo::expand(mnemonic, operands, &resolve) {
                    Ok(expanded) => {
                        for (base_mnemonic, base_operands) in expanded {
                            match encode_instruction(&base_mnemonic, &base_operands, cursor, &labels)
                            {
                                Ok(word) => words.push(word),
                                Err(err) => errors.push((*line_no, err)),
                            }
                            cursor = cursor.wrapping_add(4);
                        }
                    }
                    Err(err) => errors.push((*line_no, err)),
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(words)
    } else {
        Err(AssemblerError(errors))
    }
}
