//! Assembler CLI: translates `.asm` source files to `.obj` object
//! files written next to their sources.

use std::env;
use std::process;

use clap::Parser;

use cinder::assembler::{AsmOptions, assemble_file};

#[derive(Parser)]
#[command(name = "cinder-asm", version, about = "Assembler for the Cinder virtual machine")]
struct Args {
    /// Turn assembler optimizations on or off
    #[arg(short, long, value_name = "on|off", default_value = "on",
          value_parser = ["on", "off"])]
    opt: String,

    /// Assembly source files; the .asm suffix is appended when missing
    #[arg(required = true)]
    files: Vec<String>,
}

fn main() {
    // accept the historical "-opt:on" / "-opt:off" leading flag
    let mut raw: Vec<String> = env::args().collect();
    if raw.len() > 1 {
        if let Some(setting) = raw[1].strip_prefix("-opt:") {
            raw[1] = format!("--opt={setting}");
        }
    }
    let args = Args::parse_from(raw);

    let options = AsmOptions {
        optimize: args.opt == "on",
    };

    let mut failed = false;
    for file in &args.files {
        match assemble_file(file, &options) {
            Ok(true) => {}
            Ok(false) => failed = true,
            Err(error) => {
                eprintln!("{error}");
                failed = true;
            }
        }
        println!();
    }

    if failed {
        process::exit(1);
    }
}
