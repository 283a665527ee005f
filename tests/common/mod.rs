#![allow(dead_code)]

use std::collections::HashMap;

use ysc::{error::Diagnostics, Compilation};

pub fn compile(source: &str) -> Result<Compilation, Diagnostics> {
    let mut loader: HashMap<String, String> = HashMap::new();
    ysc::compile(source, &mut loader)
}

/// Compila `main` con módulos en memoria.
pub fn compile_with(main: &str, files: &[(&str, &str)]) -> Result<Compilation, Diagnostics> {
    let mut loader: HashMap<String, String> = files
        .iter()
        .map(|&(path, text)| (path.to_owned(), text.to_owned()))
        .collect();

    ysc::compile(main, &mut loader)
}

pub fn code(source: &str) -> String {
    match compile(source) {
        Ok(compilation) => compilation.code,
        Err(diagnostics) => panic!("compilation failed:\n{}", diagnostics),
    }
}

pub fn messages(diagnostics: &Diagnostics) -> Vec<String> {
    diagnostics
        .iter()
        .map(|diagnostic| diagnostic.message().to_owned())
        .collect()
}

/// Falla si `code` no contiene `fragment`, mostrando la salida completa.
pub fn assert_contains(code: &str, fragment: &str) {
    assert!(
        code.contains(fragment),
        "expected to find:\n{}\nin:\n{}",
        fragment,
        code
    );
}
