//! Fetch/decode/execute loop and the per-opcode instruction handlers.
//!
//! Each handler takes the already-decoded fields from [`crate::decode`]
//! and mutates a [`Hart`] in place, mirroring the match-on-opcode shape
//! this codebase's earlier CPU loop used, but returning faults instead
//! of panicking on anything the architecture itself can report as an
//! error (out-of-bounds memory or register access).

use thiserror::Error;

use crate::decode::{self, Decoded};
use crate::hart::{Hart, MemoryFault, RegisterFault};
use crate::isa::opcode;

/// The literal all-zero word. The only instruction word that halts
/// the run loop; `addi x0, x0, 0` (0x00000013, canonical NOP) does not.
pub const HALT_WORD: u32 = 0x0000_0000;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionFault {
    #[error("PC:{pc:08x}: {source}")]
    Memory { pc: u32, source: MemoryFault },
    #[error("PC:{pc:08x}: {source}")]
    Register { pc: u32, source: RegisterFault },
}

/// Why the run loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Halted,
    CycleLimit,
}

/// Result of running to completion: either a clean stop or a fault
/// that aborted the run.
pub type RunResult = Result<StopReason, ExecutionFault>;

/// Fetch, decode and execute exactly one instruction. Returns `Ok(true)`
/// if the fetched word was the halt word (PC is left unadvanced), and
/// `Ok(false)` otherwise.
pub fn step(hart: &mut Hart) -> Result<bool, ExecutionFault> {
    let pc = hart.pc;
    let word = hart
        .memory
        .read(pc, 4)
        .map_err(|source| ExecutionFault::Memory { pc, source })?;

    if word == HALT_WORD {
        return Ok(true);
    }

    let decoded = decode::decode(word);
    execute(hart, &decoded)?;
    hart.counters.retired += 1;
    Ok(false)
}

/// Run until halt, fault, or `max_cycles` is reached.
pub fn run(hart: &mut Hart, max_cycles: u64) -> RunResult {
    loop {
        if hart.counters.cycles >= max_cycles {
            return Ok(StopReason::CycleLimit);
        }
        hart.counters.cycles += 1;
        if step(hart)? {
            return Ok(StopReason::Halted);
        }
    }
}

fn reg_read(hart: &Hart, pc: u32, index: u8) -> Result<u32, ExecutionFault> {
    hart.registers
        .read(index as usize)
        .map_err(|source| ExecutionFault::Register { pc, source })
}

fn reg_write(hart: &mut Hart, pc: u32, index: u8, value: u32) -> Result<(), ExecutionFault> {
    hart.registers
        .write(index as usize, value)
        .map_err(|source| ExecutionFault::Register { pc, source })
}

fn execute(hart: &mut Hart, d: &Decoded) -> Result<(), ExecutionFault> {
    let pc = hart.pc;
    match d.opcode {
        opcode::OP => execute_op(hart, d)?,
        opcode::OP_IMM => execute_op_imm(hart, d)?,
        opcode::LOAD => execute_load(hart, d)?,
        opcode::STORE => execute_store(hart, d)?,
        opcode::BRANCH => {
            execute_branch(hart, d)?;
            return Ok(());
        }
        opcode::JAL => {
            let target = pc.wrapping_add(d.imm_j as u32);
            reg_write(hart, pc, d.rd, pc.wrapping_add(4))?;
            println!("jal x{}, {:#010x}", d.rd, target);
            hart.pc = target;
            return Ok(());
        }
        opcode::JALR => {
            let base = reg_read(hart, pc, d.rs1)?;
            let target = base.wrapping_add(d.imm_i as u32) & !1u32;
            reg_write(hart, pc, d.rd, pc.wrapping_add(4))?;
            println!("jalr x{}, {:#010x}", d.rd, target);
            hart.pc = target;
            return Ok(());
        }
        opcode::LUI => {
            reg_write(hart, pc, d.rd, d.imm_u)?;
            println!("lui x{}, {:#x}", d.rd, d.imm_u >> 12);
        }
        opcode::AUIPC => {
            reg_write(hart, pc, d.rd, pc.wrapping_add(d.imm_u))?;
            println!("auipc x{}, {:#x}", d.rd, d.imm_u >> 12);
        }
        other => {
            eprintln!("PC:{pc:08x}: skipping unrecognised opcode {other:#09b}");
        }
    }
    hart.pc = pc.wrapping_add(4);
    Ok(())
}

fn execute_op(hart: &mut Hart, d: &Decoded) -> Result<(), ExecutionFault> {
    let pc = hart.pc;
    let a = reg_read(hart, pc, d.rs1)?;
    let b = reg_read(hart, pc, d.rs2)?;
    let result = match (d.funct3, d.funct7) {
        (0b000, 0b0000000) => a.wrapping_add(b),
        (0b000, 0b0100000) => a.wrapping_sub(b),
        (0b001, _) => a.wrapping_shl(b & 0x1F),
        (0b010, _) => ((a as i32) < (b as i32)) as u32,
        (0b011, _) => (a < b) as u32,
        (0b100, _) => a ^ b,
        (0b101, 0b0000000) => a.wrapping_shr(b & 0x1F),
        (0b101, 0b0100000) => ((a as i32).wrapping_shr(b & 0x1F)) as u32,
        (0b110, _) => a | b,
        (0b111, _) => a & b,
        _ => {
            eprintln!("PC:{pc:08x}: skipping unrecognised R-type funct3/funct7 combination");
            return Ok(());
        }
    };
    println!("x{} = {result:#x}", d.rd);
    reg_write(hart, pc, d.rd, result)
}

fn execute_op_imm(hart: &mut Hart, d: &Decoded) -> Result<(), ExecutionFault> {
    let pc = hart.pc;
    let a = reg_read(hart, pc, d.rs1)?;
    let imm = d.imm_i as u32;
    let result = match d.funct3 {
        0b000 => a.wrapping_add(imm),
        0b010 => ((a as i32) < d.imm_i) as u32,
        0b011 => (a < imm) as u32,
        0b100 => a ^ imm,
        0b110 => a | imm,
        0b111 => a & imm,
        0b001 => a.wrapping_shl(d.shamt as u32 & 0x1F),
        0b101 if d.funct7 == 0b0100000 => ((a as i32).wrapping_shr(d.shamt as u32 & 0x1F)) as u32,
        0b101 => a.wrapping_shr(d.shamt as u32 & 0x1F),
        _ => {
            eprintln!("PC:{pc:08x}: skipping unrecognised I-type ALU funct3");
            return Ok(());
        }
    };
    println!("x{} = {result:#x}", d.rd);
    reg_write(hart, pc, d.rd, result)
}

fn execute_load(hart: &mut Hart, d: &Decoded) -> Result<(), ExecutionFault> {
    let pc = hart.pc;
    let base = reg_read(hart, pc, d.rs1)?;
    let addr = base.wrapping_add(d.imm_i as u32);
    let (size, sign_extend) = match d.funct3 {
        0b000 => (1, true),
        0b001 => (2, true),
        0b010 => (4, false),
        0b100 => (1, false),
        0b101 => (2, false),
        _ => {
            eprintln!("PC:{pc:08x}: skipping unrecognised load funct3");
            return Ok(());
        }
    };
    let raw = hart
        .memory
        .read(addr, size)
        .map_err(|source| ExecutionFault::Memory { pc, source })?;
    let value = if sign_extend {
        crate::bits::sign_extend(raw, size * 8)
    } else {
        raw
    };
    println!("x{} = *{addr:#010x} = {value:#x}", d.rd);
    reg_write(hart, pc, d.rd, value)
}

fn execute_store(hart: &mut Hart, d: &Decoded) -> Result<(), ExecutionFault> {
    let pc = hart.pc;
    let base = reg_read(hart, pc, d.rs1)?;
    let value = reg_read(hart, pc, d.rs2)?;
    let addr = base.wrapping_add(d.imm_s as u32);
    let size = match d.funct3 {
        0b000 => 1,
        0b001 => 2,
        0b010 => 4,
        _ => {
            eprintln!("PC:{pc:08x}: skipping unrecognised store funct3");
            return Ok(());
        }
    };
    println!("*{addr:#010x} = {value:#x}");
    hart.memory
        .write(addr, value, size)
        .map_err(|source| ExecutionFault::Memory { pc, source })
}

fn execute_branch(hart: &mut Hart, d: &Decoded) -> Result<(), ExecutionFault> {
    let pc = hart.pc;
    let a = reg_read(hart, pc, d.rs1)?;
    let b = reg_read(hart, pc, d.rs2)?;
    let taken = match d.funct3 {
        0b000 => a == b,
        0b001 => a != b,
        0b100 => (a as i32) < (b as i32),
        0b101 => (a as i32) >= (b as i32),
        0b110 => a < b,
        0b111 => a >= b,
        _ => {
            eprintln!("PC:{pc:08x}: skipping unrecognised branch funct3");
            hart.pc = pc.wrapping_add(4);
            return Ok(());
        }
    };
    hart.counters.branches += 1;
    hart.pc = if taken {
        hart.counters.branches_taken += 1;
        pc.wrapping_add(d.imm_b as u32)
    } else {
        pc.wrapping_add(4)
    };
    println!("branch {} -> pc={:#010x}", taken, hart.pc);
    Ok(())
}

/// Execution statistics as described in the driver's statistics report.
#[derive(Debug, Clone, Copy)]
pub struct Stats {
    pub retired: u64,
    pub cycles: u64,
    pub final_pc: u32,
    pub branches: u64,
    pub branches_taken: u64,
}

impl Stats {
    pub fn from_hart(hart: &Hart) -> Self {
        Self {
            retired: hart.counters.retired,
            cycles: hart.counters.cycles,
            final_pc: hart.pc,
            branches: hart.counters.branches,
            branches_taken: hart.counters.branches_taken,
        }
    }

    pub fn cpi(&self) -> f64 {
        if self.retired == 0 {
            0.0
        } else {
            self.cycles as f64 / self.retired as f64
        }
    }

    pub fn taken_rate(&self) -> f64 {
        if self.branches == 0 {
            0.0
        } else {
            self.branches_taken as f64 / self.branches as f64
        }
    }
}
