use anyhow::Result;
use clap::Parser;

use dirsync::cli::FileServerOpts;
use dirsync::fileserver;

fn main() -> Result<()> {
    let opts = FileServerOpts::parse();
    // Wire paths resolve relative to the working directory.
    fileserver::serve(opts.port, ".")
}
