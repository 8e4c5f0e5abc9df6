//! Build script for voxtalk
//!
//! Generates man pages from CLI definitions using clap_mangen.

use clap::CommandFactory;
use clap_mangen::Man;
use std::env;
use std::fs::{self, File};
use std::io::Error;
use std::path::{Path, PathBuf};

// Include the CLI module
include!("src/cli.rs");

fn render(cmd: &clap::Command, path: &Path) -> Result<(), Error> {
    let mut file = File::create(path)?;
    Man::new(cmd.clone()).render(&mut file)
}

fn main() -> Result<(), Error> {
    // Only generate man pages for release builds or when explicitly requested
    let profile = env::var("PROFILE").unwrap_or_default();
    let generate = env::var("VOXTALK_GEN_MANPAGES").is_ok() || profile == "release";

    if !generate {
        return Ok(());
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap_or_else(|_| "target".to_string()));
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir)?;

    let cmd = Cli::command();
    render(&cmd, &man_dir.join("voxtalk.1"))?;

    // One page per subcommand: voxtalk-daemon.1, voxtalk-keypad.1, ...
    for subcommand in cmd.get_subcommands().filter(|c| c.get_name() != "help") {
        let name = subcommand.get_name();
        render(subcommand, &man_dir.join(format!("voxtalk-{}.1", name)))?;
    }

    // `send` documents each control action on its own page
    // (voxtalk-send-toggle.1, voxtalk-send-on.1, ..., voxtalk-send-topic.1)
    if let Some(send) = cmd.find_subcommand("send") {
        for action in send.get_subcommands().filter(|c| c.get_name() != "help") {
            let page = format!("voxtalk-send-{}.1", action.get_name());
            render(action, &man_dir.join(page))?;
        }
    }

    // Tell cargo to rerun if CLI definitions change
    println!("cargo:rerun-if-changed=src/cli.rs");

    // Print location of generated man pages
    println!(
        "cargo:warning=Man pages generated in: {}",
        man_dir.display()
    );

    Ok(())
}
