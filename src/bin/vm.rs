//! Virtual machine CLI: loads an `.obj` file and runs it against the
//! process's standard streams.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use cinder::vm::{DEFAULT_MEMORY_SIZE, Vm};

#[derive(Parser)]
#[command(name = "cinder-vm", version, about = "Virtual machine for Cinder object code")]
struct Args {
    /// Object code file; the .obj suffix is appended when missing
    file: String,
}

fn main() {
    let args = Args::parse();

    let path = resolve_object_path(&args.file);
    let code = match fs::read(&path) {
        Ok(code) => code,
        Err(_) => {
            eprintln!("*** File {} not found ***", path.display());
            process::exit(1);
        }
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut vm = Vm::new(DEFAULT_MEMORY_SIZE, stdin.lock(), stdout.lock());

    let result = vm.load_program(&code).and_then(|()| vm.run());
    if let Err(fault) = result {
        eprintln!("{fault}");
        process::exit(1);
    }
}

fn resolve_object_path(file_name: &str) -> PathBuf {
    let path = Path::new(file_name);
    if !path.is_file() && path.extension().is_none() {
        return path.with_extension("obj");
    }
    path.to_path_buf()
}
