//! cfg-load: print a post-processed configuration file

use anyhow::Result;

mod cli;

fn main() -> Result<()> {
    cli::run()
}
