use anyhow::Context;
use camino::Utf8Path;
use tracing::info;
use vm16_emulator::{compile, runtime::NativeNumber, DebugInfo};

mod assemble;
mod completion;
mod run;

#[derive(clap::Subcommand, Debug)]
pub enum Subcommand {
    /// Assemble and run a program
    Run(self::run::RunOpt),

    /// Assemble a program and print the memory image
    Assemble(self::assemble::AssembleOpt),

    /// Generate shell completions
    Completion(self::completion::CompletionOpt),
}

impl Subcommand {
    /// Run a subcommand
    pub fn exec(self) -> anyhow::Result<()> {
        match self {
            Self::Run(opt) => opt.exec(),
            Self::Assemble(opt) => opt.exec(),
            Self::Completion(opt) => opt.exec(),
        }
    }
}

/// Read a program and assemble it, printing a report on failure
fn assemble(input: &Utf8Path) -> anyhow::Result<(Vec<NativeNumber>, DebugInfo)> {
    info!(path = %input, "Reading program");
    let source =
        std::fs::read_to_string(input).with_context(|| format!("could not read {input}"))?;

    match compile(&source) {
        Ok(compiled) => Ok(compiled),
        Err(e) => {
            let report = miette::Report::new(e);
            eprintln!("{report:?}");
            anyhow::bail!("could not assemble {input}")
        }
    }
}
