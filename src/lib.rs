//! A MIPS-subset parser, assembler, and simulator.
//!
//! This is meant to be a general suite to use a teaching subset of MIPS assembly:
//! integer ALU operations, loads and stores, branches and jumps, `li`/`la`/`move`,
//! and the print/exit syscalls.
//!
//! # Usage
//!
//! To convert MIPS source code to a program, it must be parsed and assembled:
//! ```
//! use mips_ensemble::parse::parse_ast;
//! use mips_ensemble::asm::{assemble, assemble_debug, Program};
//!
//! let code = "
//!     .data
//!     msg: .asciiz \"Hello!\\n\"
//!     .text
//!     main:
//!         li $v0, 4
//!         la $a0, msg
//!         syscall
//! ";
//! let ast = parse_ast(code).unwrap();
//!
//! // Assemble AST into a program:
//! # {
//! # let ast = ast.clone();
//! let program: Program = assemble(ast).unwrap();
//! # }
//! // OR:
//! let program: Program = assemble_debug(ast, code).unwrap();
//! ```
//!
//! Both steps can also be done at once with [`asm::assemble_src`].
//!
//! Once a program has been created, it can be executed with the simulator:
//! ```
//! # use mips_ensemble::asm::assemble_src;
//! # let program = assemble_src("li $v0, 10\nsyscall").unwrap();
//! use mips_ensemble::sim::Simulator;
//!
//! let mut simulator = Simulator::new(Default::default());
//! simulator.load_program(&program);
//! simulator.run().unwrap(); // <-- Result can be handled accordingly
//! ```
//!
//! If more granularity is needed for simulation, there are also step functions
//! and resumable sessions. See the [`sim`] module for more details.
#![warn(missing_docs)]

pub mod parse;
pub mod ast;
pub mod asm;
pub mod sim;
pub mod err;
