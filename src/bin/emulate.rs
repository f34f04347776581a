use std::fs;
use std::process::ExitCode;

use clap::Parser;
use clap_num::maybe_hex;

use riscvemu::assembler;
use riscvemu::engine::{self, StopReason};
use riscvemu::hart::Hart;

/// Assemble and run a RISC-V RV32I assembly source file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the assembly source file
    source: String,

    /// Maximum number of cycles to execute before stopping
    #[arg(long, default_value_t = 1_000_000)]
    max_cycles: u64,

    /// Address to load the assembled program at (use 0x prefix for hex)
    #[arg(long, value_parser=maybe_hex::<u32>, default_value_t = 0)]
    base: u32,

    /// Print the full statistics report after the run
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let source = match fs::read_to_string(&args.source) {
        Ok(contents) => contents,
        Err(e) => {
            eprintln!("error reading '{}': {e}", args.source);
            return ExitCode::FAILURE;
        }
    };

    let words = match assembler::assemble(&source) {
        Ok(words) => words,
        Err(errors) => {
            eprint!("{errors}");
            return ExitCode::FAILURE;
        }
    };

    let mut hart = Hart::default();
    if let Err(fault) = hart.load_program(&words, args.base) {
        eprintln!("{fault}");
        return ExitCode::FAILURE;
    }

    let outcome = engine::run(&mut hart, args.max_cycles);

    let stats = engine::Stats::from_hart(&hart);
    if args.verbose {
        print_report(&stats);
    } else {
        println!(
            "retired {} instructions in {} cycles, final PC {:#010x}",
            stats.retired, stats.cycles, stats.final_pc
        );
    }

    match outcome {
        Ok(StopReason::Halted) => ExitCode::SUCCESS,
        Ok(StopReason::CycleLimit) => {
            eprintln!("stopped: reached the {}-cycle limit", args.max_cycles);
            ExitCode::FAILURE
        }
        Err(fault) => {
            eprintln!("{fault}");
            ExitCode::FAILURE
        }
    }
}

fn print_report(stats: &engine::Stats) {
    println!("retired instructions: {}", stats.retired);
    println!("cycles:               {}", stats.cycles);
    println!("CPI:                  {:.3}", stats.cpi());
    println!("final PC:             {:#010x}", stats.final_pc);
    println!(
        "branches:             {} ({} taken, {:.1}%)",
        stats.branches,
        stats.branches_taken,
        stats.taken_rate() * 100.0
    );
}
