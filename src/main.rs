//! Punto de entrada ("driver").
//!
//! Este módulo lee la unidad principal, provee la carga de módulos
//! desde el sistema de archivos y expone una CLI. La compilación y
//! carga del sketch resultante quedan a cargo de la toolchain de Arduino.

use anyhow::{anyhow, Context};
use clap::{crate_version, Arg, Command};
use tracing::Level;
use ysc::{compile_unit, config::Board, CompileOptions, ModuleLoader};

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process,
};

/// Carga módulos relativos al directorio de la unidad principal.
struct FileLoader {
    root: PathBuf,
}

impl ModuleLoader for FileLoader {
    fn load(&mut self, path: &str) -> Result<String, String> {
        let path = self.root.join(path);
        tracing::trace!(path = %path.display(), "reading module");

        fs::read_to_string(&path).map_err(|error| error.to_string())
    }
}

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = Command::new("ysc")
        .version(crate_version!())
        .about("Compiles YS programs to Arduino sketches")
        .arg(
            Arg::new("input")
                .required(true)
                .value_name("FILE")
                .help("Main source unit"),
        )
        .arg(
            Arg::new("board")
                .short('b')
                .long("board")
                .takes_value(true)
                .value_name("BOARD")
                .help("Target board, overrides the config block"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .takes_value(true)
                .value_name("FILE")
                .default_value("-")
                .help("Output file ('-' for stdout)"),
        )
        .arg(
            Arg::new("line-comments")
                .long("line-comments")
                .help("Annotate declarations with their source location"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .multiple_occurrences(true)
                .help("Log compiler passes (-vv for more detail)"),
        )
        .get_matches();

    let level = match args.occurrences_of("verbose") {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .init();

    // Se extraen argumentos necesarios
    let input = args.value_of("input").unwrap_or_default();
    let output = args.value_of("output").unwrap_or("-");

    let mut options = CompileOptions::default();
    if let Some(board) = args.value_of("board") {
        let board: Board = board.parse().map_err(|error| anyhow!("{}", error))?;
        options.board = Some(board);
    }

    if args.is_present("line-comments") {
        options.flags |= ysc::codegen::EmitFlags::LINE_COMMENTS;
    }

    let source =
        fs::read_to_string(input).with_context(|| format!("Failed to read source file: {}", input))?;

    let root = Path::new(input)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let name = Path::new(input)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(input);

    let mut loader = FileLoader { root };
    let compilation = match compile_unit(name, &source, &mut loader, &options) {
        Ok(compilation) => compilation,
        Err(diagnostics) => {
            eprint!("{}", diagnostics);
            process::exit(1);
        }
    };

    tracing::info!(
        board = %compilation.board.board,
        fqbn = compilation.board.board.fqbn(),
        property = %compilation.board.build_property(),
        "compiled"
    );

    match output {
        "-" => io::stdout()
            .write_all(compilation.code.as_bytes())
            .context("Failed to write to stdout")?,

        path => fs::write(path, &compilation.code)
            .with_context(|| format!("Failed to write output file: {}", path))?,
    }

    Ok(())
}
