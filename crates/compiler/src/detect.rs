//! `needsFullCompilation` feature detection.

use once_cell::sync::Lazy;
use regex::Regex;

static ENUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*(export\s+)?(const\s+)?enum\s+\w+").unwrap());
static DECORATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*@\w+[\w.]*\s*(\([^)]*\))?\s*\n\s*(export\s+)?(default\s+)?(abstract\s+)?class\b|(?m)^\s*@\w+[\w.]*\s*(\([^)]*\))?\s*\n\s*\w+\s*\(").unwrap());
static NAMESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(export\s+)?(namespace|module)\s+[\w.]+\s*\{").unwrap());
static CTOR_PROPERTY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"constructor\s*\([^)]*\b(private|public|protected|readonly)\b").unwrap());
static JSX_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[A-Z][\w.]*[\s/>]|<>").unwrap());

/// Whether `source` needs a real compiler rather than the regex stripper.
///
/// True for enums (including `const enum`), decorators on classes or
/// members, namespaces/modules, constructor parameter-property shorthand,
/// or JSX/TSX markers. False for abstract classes, interfaces, type
/// aliases, and plain parameter/return annotations — the stripper handles
/// those.
pub fn needs_full_compilation(source: &str) -> bool {
    ENUM_RE.is_match(source)
        || DECORATOR_RE.is_match(source)
        || NAMESPACE_RE.is_match(source)
        || CTOR_PROPERTY_RE.is_match(source)
        || JSX_TAG_RE.is_match(source)
}
