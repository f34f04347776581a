#![forbid(unsafe_code)]

//! A simulator core for the 32-bit base integer RISC-V instruction
//! set (RV32I): an assembler that turns RV32I assembly text into
//! machine words, and an execution engine that runs those words
//! against an in-memory architectural state.

pub mod assembler;
pub mod bits;
pub mod decode;
pub mod encode;
pub mod engine;
pub mod hart;
pub mod isa;

/// End-to-end scenarios spanning the assembler and the execution engine
/// together, rather than either in isolation.
#[cfg(test)]
mod tests {
    use crate::engine::{self, StopReason};
    use crate::hart::Hart;

    fn run_source(source: &str) -> Hart {
        let words = crate::assembler::assemble(source).expect("source should assemble cleanly");
        let mut hart = Hart::default();
        hart.load_program(&words, 0).unwrap();
        let outcome = engine::run(&mut hart, 1000);
        assert_eq!(outcome.unwrap(), StopReason::Halted);
        hart
    }

    #[test]
    fn arithmetic_block() {
        let hart = run_source(
            "addi x1, x0, 15\n\
             addi x2, x0, 10\n\
             add  x3, x1, x2\n\
             sub  x4, x1, x2\n\
             slli x5, x1, 2\n\
             and  x6, x1, x2\n\
             or   x7, x1, x2\n",
        );
        assert_eq!(hart.registers.read(1).unwrap(), 15);
        assert_eq!(hart.registers.read(2).unwrap(), 10);
        assert_eq!(hart.registers.read(3).unwrap(), 25);
        assert_eq!(hart.registers.read(4).unwrap(), 5);
        assert_eq!(hart.registers.read(5).unwrap(), 60);
        assert_eq!(hart.registers.read(6).unwrap(), 10);
        assert_eq!(hart.registers.read(7).unwrap(), 15);
    }

    #[test]
    fn negative_immediate_wraps_back_to_zero() {
        let hart = run_source("addi x1, x0, -1\naddi x2, x1, 1\n");
        assert_eq!(hart.registers.read(1).unwrap(), 0xFFFF_FFFF);
        assert_eq!(hart.registers.read(2).unwrap(), 0);
    }

    #[test]
    fn jal_jalr_function_call_returns_to_the_caller() {
        let hart = run_source(
            "jal ra, func\n\
             addi x5, x5, 1\n\
             j end\n\
             func: addi x5, x0, 42\n\
             ret\n\
             end:\n",
        );
        // x5 is set to 42 by `func`, then incremented once after return.
        assert_eq!(hart.registers.read(5).unwrap(), 43);
    }

    #[test]
    fn li_pseudo_composes_lui_and_addi_for_a_large_immediate() {
        let hart = run_source("li x1, 0x12345678\n");
        assert_eq!(hart.registers.read(1).unwrap(), 0x12345678);
    }

    #[test]
    fn li_pseudo_handles_the_sign_rounding_boundary_cases() {
        let hart = run_source("li x1, 0x7FFFF7FF\nli x2, -2049\n");
        assert_eq!(hart.registers.read(1).unwrap(), 0x7FFFF7FF);
        assert_eq!(hart.registers.read(2).unwrap(), (-2049i32) as u32);
    }
}
