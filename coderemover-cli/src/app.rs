use std::path::PathBuf;

use clap::Parser;

/// coderemover - strip classes, fields and methods marked for removal out of a jar archive
#[derive(Debug, Parser)]
#[command(name = "coderemover", version, about, long_about = None)]
pub struct Cli {
    /// Archive to read.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Archive to write; only created if the whole run succeeds.
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Only remove marked elements; keep superclasses, interface lists and instructions as
    /// they are.
    #[arg(long)]
    pub remove_only: bool,

    /// Marker annotation, as dotted name, internal name or descriptor.
    #[arg(long, value_name = "NAME", default_value = "coderemover.Removable")]
    pub marker: String,

    /// Fail on class entries that cannot be parsed instead of copying them unchanged.
    #[arg(long)]
    pub strict: bool,

    #[command(flatten)]
    pub global: GlobalOptions,
}

/// Output options.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit the run report as JSON instead of log output.
    #[arg(long)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long)]
    pub verbose: bool,
}
