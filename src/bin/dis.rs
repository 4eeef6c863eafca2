//! Disassembler CLI: translates `.obj` files to `.dis.txt` listings
//! written next to their inputs.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use cinder::disasm::disassemble;

#[derive(Parser)]
#[command(name = "cinder-dis", version, about = "Disassembler for Cinder object code")]
struct Args {
    /// Object code files; the .obj suffix is appended when missing
    #[arg(required = true)]
    files: Vec<String>,
}

fn main() {
    let args = Args::parse();

    let mut failed = false;
    for file in &args.files {
        if let Err(message) = disassemble_file(file) {
            eprintln!("{message}");
            failed = true;
        }
    }

    if failed {
        process::exit(1);
    }
}

fn disassemble_file(file_name: &str) -> Result<(), String> {
    let path = resolve_object_path(file_name);
    let code = fs::read(&path).map_err(|_| format!("*** File {} not found ***", path.display()))?;

    let target = path.with_extension("dis.txt");
    println!("Disassembling {} to {}", path.display(), target.display());

    let out = File::create(&target)
        .map_err(|e| format!("*** Error creating {}: {e} ***", target.display()))?;
    let mut writer = BufWriter::new(out);

    disassemble(&code, &mut writer).map_err(|e| e.to_string())
}

fn resolve_object_path(file_name: &str) -> PathBuf {
    let path = Path::new(file_name);
    if !path.is_file() && path.extension().is_none() {
        return path.with_extension("obj");
    }
    path.to_path_buf()
}
