//! Line-level tokenizer: strips comments, splits off an optional
//! label, and recognizes the handful of assembler directives this
//! core understands.

use super::AssemblyError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `.space N` — reserve N bytes without emitting an instruction.
    Space(u32),
    /// `.text`, `.data`, `.word` and anything unrecognized: advisory,
    /// no effect on the address cursor.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Nothing,
    Directive(Directive),
    Instruction { mnemonic: String, operands: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub label: Option<String>,
    pub content: Content,
}

/// Strip a trailing `# comment`, respecting none of the quoting rules
/// a full assembler would need — this source language has no string
/// literals.
fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(index) => &line[..index],
        None => line,
    }
}

fn split_operands(rest: &str) -> Vec<String> {
    rest.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_directive(line: &str) -> Directive {
    let mut parts = line.split_whitespace();
    let name = parts.next().unwrap_or("").to_lowercase();
    match name.as_str() {
        ".space" => parts
            .next()
            .and_then(|n| n.parse::<u32>().ok())
            .map(Directive::Space)
            .unwrap_or(Directive::Ignored),
        _ => Directive::Ignored,
    }
}

/// Parse one already-trimmed, comment-free source line.
pub fn parse_line(raw: &str) -> Result<ParsedLine, AssemblyError> {
    let line = strip_comment(raw).trim();
    if line.is_empty() {
        return Ok(ParsedLine {
            label: None,
            content: Content::Nothing,
        });
    }

    let (label, rest) = match line.find(':') {
        Some(index) => {
            let name = line[..index].trim();
            let starts_ok = name
                .chars()
                .next()
                .is_some_and(|c| c.is_alphabetic() || c == '_');
            if !starts_ok || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(AssemblyError::Syntax(format!("invalid label in '{line}'")));
            }
            (Some(name.to_string()), line[index + 1..].trim())
        }
        None => (None, line),
    };

    if rest.is_empty() {
        return Ok(ParsedLine {
            label,
            content: Content::Nothing,
        });
    }

    if rest.starts_with('.') {
        return Ok(ParsedLine {
            label,
            content: Content::Directive(parse_directive(rest)),
        });
    }

    let mut tokens = rest.splitn(2, char::is_whitespace);
    let mnemonic = tokens.next().unwrap_or("").to_lowercase();
    let operands = split_operands(tokens.next().unwrap_or(""));

    Ok(ParsedLine {
        label,
        content: Content::Instruction { mnemonic, operands },
    })
}

/// Split `offset(register)` into its two parts.
pub fn parse_memory_operand(operand: &str) -> Result<(String, String), AssemblyError> {
    let open = operand
        .find('(')
        .ok_or_else(|| AssemblyError::Syntax(format!("expected 'offset(reg)', got '{operand}'")))?;
    let close = operand.rfind(')').filter(|&c| c > open).ok_or_else(|| {
        AssemblyError::Syntax(format!("unbalanced parentheses in '{operand}'"))
    })?;
    let offset = operand[..open].trim();
    let register = operand[open + 1..close].trim();
    if offset.is_empty() || register.is_empty() {
        return Err(AssemblyError::Syntax(format!(
            "expected 'offset(reg)', got '{operand}'"
        )));
    }
    Ok((offset.to_string(), register.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_comment_only_lines_are_nothing() {
        assert_eq!(parse_line("").unwrap().content, Content::Nothing);
        assert_eq!(parse_line("   ").unwrap().content, Content::Nothing);
        assert_eq!(parse_line("# a comment").unwrap().content, Content::Nothing);
    }

    #[test]
    fn label_only_line_carries_no_instruction() {
        let parsed = parse_line("loop:").unwrap();
        assert_eq!(parsed.label.as_deref(), Some("loop"));
        assert_eq!(parsed.content, Content::Nothing);
    }

    #[test]
    fn label_and_instruction_on_one_line() {
        let parsed = parse_line("loop: addi x1, x1, -1").unwrap();
        assert_eq!(parsed.label.as_deref(), Some("loop"));
        match parsed.content {
            Content::Instruction { mnemonic, operands } => {
                assert_eq!(mnemonic, "addi");
                assert_eq!(operands, vec!["x1", "x1", "-1"]);
            }
            other => panic!("expected instruction, got {other:?}"),
        }
    }

    #[test]
    fn comment_after_instruction_is_stripped() {
        let parsed = parse_line("add x1, x2, x3 # sum them").unwrap();
        match parsed.content {
            Content::Instruction { operands, .. } => {
                assert_eq!(operands, vec!["x1", "x2", "x3"]);
            }
            other => panic!("expected instruction, got {other:?}"),
        }
    }

    #[test]
    fn space_directive_is_recognized() {
        let parsed = parse_line(".space 16").unwrap();
        assert_eq!(parsed.content, Content::Directive(Directive::Space(16)));
    }

    #[test]
    fn label_cannot_start_with_a_digit() {
        assert!(parse_line("1loop: addi x0, x0, 0").is_err());
    }

    #[test]
    fn unknown_directive_is_ignored() {
        let parsed = parse_line(".section data").unwrap();
        assert_eq!(parsed.content, Content::Directive(Directive::Ignored));
    }

    #[test]
    fn memory_operand_splits_offset_and_register() {
        assert_eq!(
            parse_memory_operand("0(sp)").unwrap(),
            ("0".to_string(), "sp".to_string())
        );
        assert_eq!(
            parse_memory_operand("-4(x2)").unwrap(),
            ("-4".to_string(), "x2".to_string())
        );
    }

    #[test]
    fn malformed_memory_operand_is_an_error() {
        assert!(parse_memory_operand("sp").is_err());
    }
}
