//! `functionsdo compile` — run the TypeScript compile service standalone,
//! outside of a deployed function.

use functionsdo_compiler::esbuild::{CliEsbuildCompiler, EsbuildOptions, Format, Loader, NullEsbuildCompiler};
use functionsdo_config::AppConfig;

pub async fn run(path: &str, force_regex: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("failed to load config: {e}"))?;
    let source = std::fs::read_to_string(path).map_err(|e| format!("failed to read {path}: {e}"))?;

    let esbuild: Box<dyn functionsdo_compiler::esbuild::EsbuildCompiler> = match &config.compiler.esbuild_path {
        Some(bin) => Box::new(CliEsbuildCompiler::new(bin.clone())),
        None => Box::new(NullEsbuildCompiler),
    };
    let options = EsbuildOptions { loader: Loader::Ts, target: "es2022".into(), format: Format::Esm, jsx: None, sourcemap: false };

    let result = functionsdo_compiler::compile(&source, esbuild.as_ref(), &options, force_regex || config.compiler.force_regex).await;

    if !result.success {
        eprintln!("compile failed ({:?}):", result.compiler);
        for err in result.errors.unwrap_or_default() {
            eprintln!("  {err}");
        }
        std::process::exit(1);
    }

    for warning in &result.warnings {
        eprintln!("warning: {warning}");
    }
    println!("{}", result.code);
    Ok(())
}
