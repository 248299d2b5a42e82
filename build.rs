//! Build script rendering the `udpfrag` man pages from the CLI definition.
//!
//! Writes `udpfrag.1` plus one page per subcommand (`udpfrag-listen.1`,
//! `udpfrag-send.1`) under `target/generated-man`.

use std::{fs, path::Path};

use clap::{Command, CommandFactory};
use clap_mangen::Man;

#[path = "src/cli.rs"]
mod cli;

fn render(cmd: Command, out_dir: &Path, file: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut buf: Vec<u8> = Vec::new();
    Man::new(cmd).render(&mut buf)?;
    fs::write(out_dir.join(file), buf)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = Path::new("target/generated-man");
    fs::create_dir_all(out_dir)?;

    let cmd = cli::Cli::command();
    for sub in cmd.get_subcommands() {
        let page = format!("udpfrag-{}", sub.get_name());
        render(sub.clone().display_name(page.clone()), out_dir, &format!("{page}.1"))?;
    }
    render(cmd, out_dir, "udpfrag.1")
}
