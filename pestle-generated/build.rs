use pestle::{OptimizerConfig, PegParser};
use std::env;
use std::fs;
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};

/// Grammars under `grammars/`, rendered as `<name>_plain` and `<name>_optimized`
const GRAMMARS: &[&str] = &[
    "json",
    "calculator",
    "ini",
    "raw_string",
    "keywords",
    "repetition",
    "stack",
];

fn main() -> Result<(), Error> {
    let outdir = match env::var_os("OUT_DIR") {
        None => return Ok(()),
        Some(outdir) => PathBuf::from(outdir),
    };
    let manifest = PathBuf::from(env::var_os("CARGO_MANIFEST_DIR").unwrap_or_default());

    let mut modules = String::new();
    for name in GRAMMARS {
        let path = manifest.join("grammars").join(format!("{name}.pest"));
        println!("cargo:rerun-if-changed={}", path.display());
        let source = fs::read_to_string(&path)?;

        for (variant, optimizer) in [
            ("plain", OptimizerConfig::Disabled),
            ("optimized", OptimizerConfig::Default),
        ] {
            let parser = PegParser::builder(&source)
                .optimizer(optimizer)
                .build()
                .map_err(|err| invalid(&path, err))?;
            modules.push_str(&format!(
                "pub mod {name}_{variant} {{\n{}}}\n\n",
                parser.generate_source()
            ));
        }
    }

    fs::write(outdir.join("generated.rs"), modules)?;
    Ok(())
}

fn invalid(path: &Path, err: impl std::fmt::Display) -> Error {
    Error::new(ErrorKind::InvalidData, format!("{}: {}", path.display(), err))
}
