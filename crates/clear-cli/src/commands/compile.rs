//! The compile command: read `<path>.clr`, write `<path>.clr.b`.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clear_compiler::Compiler;

use crate::cli::CompileParams;

/// Runs a compile and returns the process exit code: 0 on a clean build,
/// non-zero on any diagnostic or I/O failure. The output file is written
/// whenever bytecode could be produced, warnings notwithstanding.
pub fn run(params: &CompileParams) -> i32 {
    let source_path = source_path(&params.path);
    let source = match std::fs::read_to_string(&source_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("clearc: cannot read {}: {err}", source_path.display());
            return 1;
        }
    };

    let compiler = Compiler::new().debug(params.debug);
    let compilation = match compiler.compile_program(&source) {
        Ok(compilation) => compilation,
        Err(err) => {
            eprintln!("clearc: {err}");
            return 1;
        }
    };

    if !compilation.diagnostics.is_empty() {
        let colored = params.color.enabled(std::io::stderr().is_terminal());
        let rendered = compilation
            .diagnostics
            .printer()
            .source(&source)
            .path(&source_path.display().to_string())
            .colored(colored)
            .render();
        eprintln!("{rendered}");
    }

    if let Some(bytecode) = &compilation.bytecode {
        let dest_path = dest_path(&source_path);
        if let Err(err) = std::fs::write(&dest_path, bytecode) {
            eprintln!("clearc: cannot write {}: {err}", dest_path.display());
            return 1;
        }
    }

    if compilation.diagnostics.is_empty() && compilation.bytecode.is_some() {
        0
    } else {
        1
    }
}

/// `clearc foo` compiles `foo.clr`; an explicit `.clr` path is taken
/// as-is.
fn source_path(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == "clr") {
        path.to_path_buf()
    } else {
        let mut with_ext = path.as_os_str().to_owned();
        with_ext.push(".clr");
        PathBuf::from(with_ext)
    }
}

fn dest_path(source: &Path) -> PathBuf {
    let mut dest = source.as_os_str().to_owned();
    dest.push(".b");
    PathBuf::from(dest)
}
