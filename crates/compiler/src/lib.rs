//! TypeScript compile service: esbuild-primary, regex-fallback.

pub mod detect;
pub mod esbuild;
pub mod stripper;

use serde::Serialize;

pub use detect::needs_full_compilation;
pub use esbuild::{CliEsbuildCompiler, EsbuildCompiler, EsbuildError, EsbuildOptions, Format, Loader, NullEsbuildCompiler};
pub use stripper::strip_types;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilerKind {
    Esbuild,
    Regex,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompileResult {
    pub success: bool,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    pub compiler: CompilerKind,
}

/// `compile(code, compiler?, options) -> CompileResult`.
///
/// Routing:
/// - empty input → success, empty output, `regex`.
/// - `force_regex` or (no esbuild available and no full-compilation
///   features) → regex stripper.
/// - otherwise call esbuild; surface its errors as `success=false`.
/// - esbuild transport failure and the code doesn't need full compilation
///   → fall back to regex, with a warning recorded.
pub async fn compile(
    source: &str,
    esbuild: &dyn EsbuildCompiler,
    options: &EsbuildOptions,
    force_regex: bool,
) -> CompileResult {
    if source.trim().is_empty() {
        return CompileResult {
            success: true,
            code: String::new(),
            map: None,
            warnings: vec![],
            errors: None,
            compiler: CompilerKind::Regex,
        };
    }

    let needs_full = needs_full_compilation(source);

    if force_regex || (!esbuild.is_available() && !needs_full) {
        return CompileResult {
            success: true,
            code: strip_types(source),
            map: None,
            warnings: vec![],
            errors: None,
            compiler: CompilerKind::Regex,
        };
    }

    match esbuild.compile(source, options).await {
        Ok(output) => CompileResult {
            success: true,
            code: output.code,
            map: output.map,
            warnings: output.warnings,
            errors: None,
            compiler: CompilerKind::Esbuild,
        },
        Err(EsbuildError::CompileErrors(errors)) => CompileResult {
            success: false,
            code: String::new(),
            map: None,
            warnings: vec![],
            errors: Some(errors),
            compiler: CompilerKind::Esbuild,
        },
        Err(transport_err) if !needs_full => CompileResult {
            success: true,
            code: strip_types(source),
            map: None,
            warnings: vec![format!("esbuild unavailable, fell back to regex stripper: {transport_err}")],
            errors: None,
            compiler: CompilerKind::Regex,
        },
        Err(transport_err) => CompileResult {
            success: false,
            code: String::new(),
            map: None,
            warnings: vec![],
            errors: Some(vec![transport_err.to_string()]),
            compiler: CompilerKind::Esbuild,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> EsbuildOptions {
        EsbuildOptions {
            loader: Loader::Ts,
            target: "es2022".into(),
            format: Format::Esm,
            jsx: None,
            sourcemap: false,
        }
    }

    #[tokio::test]
    async fn empty_input_succeeds_with_regex_compiler() {
        let result = compile("", &NullEsbuildCompiler, &options(), false).await;
        assert!(result.success);
        assert_eq!(result.code, "");
        assert_eq!(result.compiler, CompilerKind::Regex);
    }

    #[tokio::test]
    async fn force_regex_bypasses_esbuild() {
        let result = compile("const x: number = 1;", &NullEsbuildCompiler, &options(), true).await;
        assert!(result.success);
        assert_eq!(result.compiler, CompilerKind::Regex);
        assert!(!result.code.contains(": number"));
    }

    #[tokio::test]
    async fn no_esbuild_and_no_full_features_uses_regex() {
        let result = compile(
            "function add(a: number, b: number): number { return a + b; }",
            &NullEsbuildCompiler,
            &options(),
            false,
        )
        .await;
        assert!(result.success);
        assert_eq!(result.compiler, CompilerKind::Regex);
    }

    #[tokio::test]
    async fn enum_with_no_esbuild_fails_rather_than_silently_stripping() {
        let result = compile("enum Color { Red, Green }", &NullEsbuildCompiler, &options(), false).await;
        assert!(!result.success);
        assert_eq!(result.compiler, CompilerKind::Esbuild);
        assert!(result.errors.is_some());
    }

    struct FakeEsbuild {
        result: Result<esbuild::EsbuildOutput, EsbuildError>,
    }

    #[async_trait::async_trait]
    impl EsbuildCompiler for FakeEsbuild {
        async fn compile(&self, _source: &str, _options: &EsbuildOptions) -> Result<esbuild::EsbuildOutput, EsbuildError> {
            self.result.clone()
        }
        fn is_available(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn esbuild_success_is_surfaced_verbatim() {
        let fake = FakeEsbuild {
            result: Ok(esbuild::EsbuildOutput {
                code: "var x = 1;".into(),
                map: None,
                warnings: vec![],
            }),
        };
        let result = compile("const x: number = 1;", &fake, &options(), false).await;
        assert!(result.success);
        assert_eq!(result.code, "var x = 1;");
        assert_eq!(result.compiler, CompilerKind::Esbuild);
    }

    #[tokio::test]
    async fn esbuild_compile_errors_mark_failure() {
        let fake = FakeEsbuild {
            result: Err(EsbuildError::CompileErrors(vec!["unexpected token".into()])),
        };
        let result = compile("const x: = 1;", &fake, &options(), false).await;
        assert!(!result.success);
        assert!(result.errors.unwrap().contains(&"unexpected token".to_string()));
    }

    #[tokio::test]
    async fn transport_failure_falls_back_to_regex_when_no_full_features_needed() {
        let fake = FakeEsbuild {
            result: Err(EsbuildError::Transport("connection refused".into())),
        };
        let result = compile("const x: number = 1;", &fake, &options(), false).await;
        assert!(result.success);
        assert_eq!(result.compiler, CompilerKind::Regex);
        assert_eq!(result.warnings.len(), 1);
    }

    #[tokio::test]
    async fn transport_failure_with_full_features_fails_outright() {
        let fake = FakeEsbuild {
            result: Err(EsbuildError::Transport("connection refused".into())),
        };
        let result = compile("enum Color { Red }", &fake, &options(), false).await;
        assert!(!result.success);
        assert_eq!(result.compiler, CompilerKind::Esbuild);
    }
}
