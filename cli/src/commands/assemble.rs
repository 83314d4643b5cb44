use camino::Utf8PathBuf;
use clap::{ArgAction, Parser, ValueHint};
use vm16_emulator::runtime::Address;

#[derive(Parser, Debug)]
pub struct AssembleOpt {
    /// Input file
    #[arg(value_hint = ValueHint::FilePath)]
    input: Utf8PathBuf,

    /// Do not print the label table
    #[arg(long, action = ArgAction::SetTrue)]
    no_labels: bool,
}

impl AssembleOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        let (program, debug_info) = super::assemble(&self.input)?;

        for (address, word) in (0..=u16::MAX).zip(&program) {
            println!("{}  {word:04x}  {word}", Address::from(address));
        }

        if !self.no_labels && !debug_info.labels.is_empty() {
            println!();
            for (label, address) in &debug_info.labels {
                println!("{address}  {label}");
            }
        }

        Ok(())
    }
}
