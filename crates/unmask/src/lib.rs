#![doc = include_str!("../../../README.md")]

pub mod codegen;
pub mod nodes;
pub mod parse;
pub mod passes;
pub mod report;
pub mod sandbox;
pub mod walk;

mod run;

pub use crate::{
    parse::ParseError,
    report::Report,
    run::{Deobfuscator, Options, Outcome, ParseMode, UnmaskError},
    sandbox::{BoaSandbox, Evaluated, Sandbox, SandboxError, SandboxLimits},
};
