//! Pseudo-instruction expansion.
//!
//! Every pseudo expands to one or two base RV32I instructions. `li`'s
//! word count depends on whether its (always-literal) immediate fits
//! in 12 bits; `la`'s operand is a label whose address is unknown
//! until pass 2, so it always reserves the two-word `lui`+`addi` form —
//! this keeps pass 1's address bookkeeping and pass 2's expansion in
//! agreement, which the reference implementation this was adapted
//! from does not guarantee.

use super::{parse_integer_literal, AssemblyError};
use crate::isa;

/// Split a signed 32-bit value into the `lui`+`addi` pair that
/// reconstructs it, rounding the upper 20 bits to compensate for the
/// `addi` immediate's sign extension.
pub fn split_upper_lower(value: i32) -> (i32, i32) {
    let value = value as i64;
    let upper20 = ((value + 0x800) >> 12) as i32;
    let low12 = (((value & 0xFFF) ^ 0x800) - 0x800) as i32;
    (upper20, low12)
}

/// Number of base instruction words a pseudo-instruction expands to,
/// computed identically in pass 1 and pass 2.
pub fn word_count(mnemonic: &str, operands: &[String]) -> Result<usize, AssemblyError> {
    match mnemonic {
        "li" => {
            let imm = li_immediate(operands)?;
            if (-2048..=2047).contains(&imm) {
                Ok(1)
            } else {
                let (_, low12) = split_upper_lower(imm);
                Ok(if low12 != 0 { 2 } else { 1 })
            }
        }
        "la" => Ok(2),
        "nop" | "mv" | "not" | "neg" | "j" | "jr" | "ret" | "beqz" | "bnez" | "blez" | "bgez"
        | "bltz" | "bgtz" => Ok(1),
        _ => {
            isa::lookup(mnemonic)?;
            Ok(1)
        }
    }
}

fn li_immediate(operands: &[String]) -> Result<i32, AssemblyError> {
    let raw = operands
        .get(1)
        .ok_or_else(|| AssemblyError::OperandError {
            mnemonic: "li".to_string(),
            expected: 2,
            got: operands.len(),
        })?;
    parse_integer_literal(raw)
}

/// One expanded base instruction: a mnemonic plus its operand list, in
/// the same textual form the generic encoder already understands.
pub type BaseInstruction = (String, Vec<String>);

fn base(mnemonic: &str, operands: &[&str]) -> BaseInstruction {
    (
        mnemonic.to_string(),
        operands.iter().map(|s| s.to_string()).collect(),
    )
}

/// Expand a pseudo-instruction into its base form(s). `resolve_label`
/// is used only by `la`, which needs the symbol's absolute address
/// (not a PC-relative offset) to compute its `lui`/`addi` pair.
pub fn expand(
    mnemonic: &str,
    operands: &[String],
    resolve_label: &dyn Fn(&str) -> Result<u32, AssemblyError>,
) -> Result<Vec<BaseInstruction>, AssemblyError> {
    let arity_error = |expected: usize| AssemblyError::OperandError {
        mnemonic: mnemonic.to_string(),
        expected,
        got: operands.len(),
    };

    match mnemonic {
        "nop" => Ok(vec![base("addi", &["x0", "x0", "0"])]),
        "mv" => {
            if operands.len() != 2 {
                return Err(arity_error(2));
            }
            Ok(vec![base("addi", &[&operands[0], &operands[1], "0"])])
        }
        "not" => {
            if operands.len() != 2 {
                return Err(arity_error(2));
            }
            Ok(vec![base("xori", &[&operands[0], &operands[1], "-1"])])
        }
        "neg" => {
            if operands.len() != 2 {
                return Err(arity_error(2));
            }
            Ok(vec![base("sub", &[&operands[0], "x0", &operands[1]])])
        }
        "j" => {
            if operands.len() != 1 {
                return Err(arity_error(1));
            }
            Ok(vec![base("jal", &["x0", &operands[0]])])
        }
        "jr" => {
            if operands.len() != 1 {
                return Err(arity_error(1));
            }
            Ok(vec![base("jalr", &["x0", &operands[0], "0"])])
        }
        "ret" => Ok(vec![base("jalr", &["x0", "ra", "0"])]),
        "beqz" => {
            if operands.len() != 2 {
                return Err(arity_error(2));
            }
            Ok(vec![base("beq", &[&operands[0], "x0", &operands[1]])])
        }
        "bnez" => {
            if operands.len() != 2 {
                return Err(arity_error(2));
            }
            Ok(vec![base("bne", &[&operands[0], "x0", &operands[1]])])
        }
        "blez" => {
            if operands.len() != 2 {
                return Err(arity_error(2));
            }
            Ok(vec![base("bge", &["x0", &operands[0], &operands[1]])])
        }
        "bgez" => {
            if operands.len() != 2 {
                return Err(arity_error(2));
            }
            Ok(vec![base("bge", &[&operands[0], "x0", &operands[1]])])
        }
        "bltz" => {
            if operands.len() != 2 {
                return Err(arity_error(2));
            }
            Ok(vec![base("blt", &[&operands[0], "x0", &operands[1]])])
        }
        "bgtz" => {
            if operands.len() != 2 {
                return Err(arity_error(2));
            }
            Ok(vec![base("blt", &["x0", &operands[0], &operands[1]])])
        }
        "li" => {
            if operands.len() != 2 {
                return Err(arity_error(2));
            }
            let rd = &operands[0];
            let imm = li_immediate(operands)?;
            if (-2048..=2047).contains(&imm) {
                Ok(vec![base("addi", &[rd, "x0", &imm.to_string()])])
            } else {
                let (upper20, low12) = split_upper_lower(imm);
                let mut out = vec![base("lui", &[rd, &upper20.to_string()])];
                if low12 != 0 {
                    out.push(base("addi", &[rd, rd, &low12.to_string()]));
                }
                Ok(out)
            }
        }
        "la" => {
            if operands.len() != 2 {
                return Err(arity_error(2));
            }
            let rd = &operands[0];
            let address = resolve_label(&operands[1])?;
            let (upper20, low12) = split_upper_lower(address as i32);
            Ok(vec![
                base("lui", &[rd, &upper20.to_string()]),
                base("addi", &[rd, rd, &low12.to_string()]),
            ])
        }
        _ => Ok(vec![base(
            mnemonic,
            &operands.iter().map(String::as_str).collect::<Vec<_>>(),
        )]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_labels(name: &str) -> Result<u32, AssemblyError> {
        Err(AssemblyError::UnresolvedLabel(name.to_string()))
    }

    #[test]
    fn small_li_expands_to_one_addi() {
        let ops = vec!["x1".to_string(), "5".to_string()];
        assert_eq!(word_count("li", &ops).unwrap(), 1);
        let expanded = expand("li", &ops, &no_labels).unwrap();
        assert_eq!(expanded, vec![("addi".to_string(), vec!["x1".into(), "x0".into(), "5".into()])]);
    }

    #[test]
    fn large_li_expands_to_lui_and_addi() {
        let ops = vec!["x1".to_string(), "100000".to_string()];
        assert_eq!(word_count("li", &ops).unwrap(), 2);
        let expanded = expand("li", &ops, &no_labels).unwrap();
        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded[0].0, "lui");
        assert_eq!(expanded[1].0, "addi");
    }

    #[test]
    fn li_with_exact_upper_immediate_skips_addi() {
        let ops = vec!["x1".to_string(), "4096".to_string()];
        assert_eq!(word_count("li", &ops).unwrap(), 1);
        let expanded = expand("li", &ops, &no_labels).unwrap();
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].0, "lui");
    }

    #[test]
    fn la_always_reserves_two_words() {
        let ops = vec!["x1".to_string(), "buffer".to_string()];
        assert_eq!(word_count("la", &ops).unwrap(), 2);
    }

    #[test]
    fn la_resolves_against_the_label_table() {
        let ops = vec!["x1".to_string(), "buffer".to_string()];
        let resolve = |name: &str| -> Result<u32, AssemblyError> {
            assert_eq!(name, "buffer");
            Ok(0x2000)
        };
        let expanded = expand("la", &ops, &resolve).unwrap();
        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded[0].0, "lui");
        assert_eq!(expanded[1].0, "addi");
    }

    #[test]
    fn nop_expands_to_addi_x0_x0_0() {
        let expanded = expand("nop", &[], &no_labels).unwrap();
        assert_eq!(
            expanded,
            vec![("addi".to_string(), vec!["x0".into(), "x0".into(), "0".into()])]
        );
    }

    #[test]
    fn split_upper_lower_reconstructs_the_original_value() {
        for value in [0i32, 1, -1, 100_000, -100_000, i32::MAX, i32::MIN, 0x7FFFF800] {
            let (upper, lower) = split_upper_lower(value);
            let reconstructed = (upper << 12).wrapping_add(lower);
            assert_eq!(reconstructed, value, "value={value}");
        }
    }
}
