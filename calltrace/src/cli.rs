//! Command line interface for the replay binary.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[clap(
    name = "calltrace",
    about = "Replay a captured call-trace record file through the parse engine"
)]
pub struct Args {
    #[clap(help = "Path to the captured record file")]
    pub input: PathBuf,

    #[clap(long, default_value = "calltrace", help = "Engine name used in diagnostics")]
    pub name: String,

    #[clap(long, help = "Latch a fault on unreconciled module conflicts")]
    pub strict: bool,

    #[clap(short, long, help = "Show replay statistics on stderr")]
    pub verbose: bool,

    #[clap(
        short,
        long,
        default_value = "table",
        help = "Output format for the summary: table or json"
    )]
    pub format: String,
}

impl Args {
    pub fn validate(&self) -> Result<(), String> {
        match self.format.as_str() {
            "table" | "json" => {}
            other => return Err(format!("Unsupported output format: {}", other)),
        }
        if self.name.is_empty() {
            return Err("Engine name must not be empty".to_string());
        }
        Ok(())
    }
}
