//! The regex type-stripper: the always-available fallback compiler path.
//! Handles interfaces, type aliases, type-only imports, plain annotations,
//! and `as` casts — anything [`crate::detect::needs_full_compilation`] says
//! doesn't need a real compiler.

use once_cell::sync::Lazy;
use regex::Regex;

static INTERFACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?ms)^\s*(export\s+)?interface\s+\w+(\s*<[^>]*>)?(\s+extends\s+[^{]+)?\s*\{[^{}]*\}\s*").unwrap());
static TYPE_ALIAS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(export\s+)?type\s+\w+(\s*<[^>]*>)?\s*=[^;\n]*;?\s*$").unwrap());
static TYPE_ONLY_IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*import\s+type\s+.*?;\s*$").unwrap());
static INLINE_TYPE_IMPORT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\btype\s+(\w+)").unwrap());
static AS_CAST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+as\s+(?:const|[A-Za-z_][^,;)\]\}\n]*)").unwrap());
static RETURN_TYPE_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\)\s*:\s*[A-Za-z_][^{\n]*\{").unwrap());
static RETURN_TYPE_ARROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\)\s*:\s*[A-Za-z_][^=\n]*=>").unwrap());
static PARAM_TYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z_$][\w$]*\??)\s*:\s*[A-Za-z_][^,)=;\n]*").unwrap());
static NON_NULL_ASSERTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Za-z0-9_$\])])!").unwrap());

/// Strip TypeScript-only syntax, leaving runnable JavaScript.
///
/// This is a best-effort source-level transform, not a type checker: it
/// assumes reasonably formatted input and single-level interface bodies.
pub fn strip_types(source: &str) -> String {
    if source.trim().is_empty() {
        return String::new();
    }

    let mut out = source.to_string();
    out = INTERFACE_RE.replace_all(&out, "").to_string();
    out = TYPE_ALIAS_RE.replace_all(&out, "").to_string();
    out = TYPE_ONLY_IMPORT_RE.replace_all(&out, "").to_string();
    out = INLINE_TYPE_IMPORT_RE.replace_all(&out, "$1").to_string();
    out = AS_CAST_RE.replace_all(&out, "").to_string();
    out = RETURN_TYPE_BLOCK_RE.replace_all(&out, ") {").to_string();
    out = RETURN_TYPE_ARROW_RE.replace_all(&out, ") =>").to_string();
    out = PARAM_TYPE_RE.replace_all(&out, "$1").to_string();
    out = NON_NULL_ASSERTION_RE.replace_all(&out, "$1").to_string();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_strips_to_empty() {
        assert_eq!(strip_types(""), "");
        assert_eq!(strip_types("   \n"), "");
    }

    #[test]
    fn strips_interface_declaration() {
        let src = "interface Foo {\n  x: number;\n  y: string;\n}\nconst z = 1;";
        let out = strip_types(src);
        assert!(!out.contains("interface"));
        assert!(out.contains("const z = 1;"));
    }

    #[test]
    fn strips_type_alias() {
        let src = "type Id = string | number;\nconst id: Id = 1;";
        let out = strip_types(src);
        assert!(!out.contains("type Id"));
    }

    #[test]
    fn strips_parameter_and_return_annotations() {
        let src = "function add(a: number, b: number): number {\n  return a + b;\n}";
        let out = strip_types(src);
        assert!(out.contains("function add(a, b) {"));
        assert!(!out.contains(": number"));
    }

    #[test]
    fn strips_arrow_return_annotation() {
        let src = "const add = (a: number, b: number): number => a + b;";
        let out = strip_types(src);
        assert!(out.contains("(a, b) => a + b;"));
    }

    #[test]
    fn strips_as_cast() {
        let src = "const x = value as string;";
        let out = strip_types(src);
        assert_eq!(out.trim(), "const x = value;");
    }

    #[test]
    fn strips_type_only_import() {
        let src = "import type { Foo } from \"./foo\";\nconst x = 1;";
        let out = strip_types(src);
        assert!(!out.contains("import type"));
        assert!(out.contains("const x = 1;"));
    }

    #[test]
    fn strips_inline_type_import() {
        let src = "import { type Foo, Bar } from \"./mod\";";
        let out = strip_types(src);
        assert!(out.contains("import { Foo, Bar }"));
    }

    #[test]
    fn strips_non_null_assertion() {
        let src = "const x = maybe!.value;";
        let out = strip_types(src);
        assert_eq!(out.trim(), "const x = maybe.value;");
    }
}
