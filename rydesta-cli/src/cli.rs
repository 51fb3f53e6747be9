use std::path::PathBuf;

use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "Rydesta", bin_name = "rydesta", about)]
pub struct Opt {
    #[structopt(subcommand)]
    pub command: Option<Command>,

    /// Script to run. Omit to start a REPL.
    #[structopt(parse(from_os_str))]
    pub script: Option<PathBuf>,

    /// Print bootstrap and per-feed wall times.
    #[structopt(short, long)]
    pub time: bool,
}

#[derive(StructOpt, Debug)]
pub enum Command {
    /// Evaluates every file matching suite/[0-9]*.ry, in sorted order.
    Suite {
        #[structopt(short, long)]
        time: bool,
    },
}
