//! Binary entry point for the `tdc` command-line tool.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use tdc::cli::set_display_level;
use tdc::displaylevel;

#[derive(Parser)]
#[command(name = "tdc", version, about = "Read, write, and round-trip TPDC capture containers")]
struct Cli {
    /// Increase verbosity (repeatable).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Print errors only.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pack unpacked capture data back into a .tdc file.
    Pack {
        /// Directory containing metadata.json and block_<i>.bin files.
        input_dir: PathBuf,
        /// Output .tdc file.
        #[arg(short, long, default_value = "packed.tdc")]
        output: PathBuf,
    },
    /// Unpack a .tdc file into a directory of decompressed blocks.
    Unpack {
        /// The .tdc file to unpack.
        file: PathBuf,
        /// Output directory (default: <file>.unpacked).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Decompress every block of a .tdc file into one output file.
    Process {
        /// The .tdc file to process.
        file: PathBuf,
        /// Output file (default: a fresh temporary path).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also parse each block's record stream and print one line per
        /// data block.
        #[arg(short = 'd', long)]
        dump_records: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    set_display_level(if cli.quiet { 1 } else { 2 + u32::from(cli.verbose) });

    let result = match &cli.command {
        Command::Pack { input_dir, output } => tdc::cli::pack::run(input_dir, output),
        Command::Unpack { file, output } => tdc::cli::unpack::run(file, output.as_deref()),
        Command::Process {
            file,
            output,
            dump_records,
        } => tdc::cli::process::run(file, output.as_deref(), *dump_records),
    };

    std::process::exit(match result {
        Ok(()) => 0,
        Err(err) => {
            displaylevel!(1, "tdc: {:#}\n", err);
            1
        }
    });
}
