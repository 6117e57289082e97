//! Per-module scratch state shared by every transform in one traversal.
//!
//! Holds the module facts transforms need (public path, extension, JSX
//! configuration and pragmas) and mints temporary names. Temporaries are
//! scoped to the enclosing statement: each statement that asks for one gets
//! an engine-wide key on first use, so names from independent statements
//! never collide and names within one statement count up from 1.
//!
//! ```text
//! a?.b;        // var _1_1;
//! c?.d?.e;     // var _2_1, _2_2;
//! ```

use fuse_common::BuildConfig;
use fuse_common::config::DEFAULT_JSX_FACTORY;

/// `@jsx` / `@jsxFrag` pragmas found in a module's comments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsxPragmas {
    pub factory: Option<String>,
    pub fragment: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct TempScope {
    /// Statement key, minted on the first temporary requested.
    key: Option<u32>,
    counter: u32,
}

#[derive(Debug, Clone)]
pub struct TransformContext {
    /// Project-relative path of the module being transformed.
    pub public_path: String,
    /// Lowercase extension including the dot, e.g. `.tsx`.
    pub extension: String,
    /// Whether the module's output needs a source map.
    pub source_map: bool,
    pub jsx_factory: String,
    pub jsx_fragment_factory: Option<String>,
    pub pragmas: JsxPragmas,
    /// Set by a transform when modules depending on this one must be
    /// rebuilt whenever this one is.
    pub break_dependants_cache: bool,
    temp_scopes: Vec<TempScope>,
    next_statement_key: u32,
}

impl TransformContext {
    pub fn new(public_path: impl Into<String>, extension: impl Into<String>) -> Self {
        TransformContext {
            public_path: public_path.into(),
            extension: extension.into().to_ascii_lowercase(),
            source_map: false,
            jsx_factory: DEFAULT_JSX_FACTORY.to_string(),
            jsx_fragment_factory: None,
            pragmas: JsxPragmas::default(),
            break_dependants_cache: false,
            // Root scope for temporaries requested outside any statement
            temp_scopes: vec![TempScope::default()],
            next_statement_key: 0,
        }
    }

    /// Context for a module built under `config`.
    pub fn from_config(
        public_path: impl Into<String>,
        extension: impl Into<String>,
        config: &BuildConfig,
    ) -> Self {
        let mut ctx = Self::new(public_path, extension);
        ctx.jsx_factory = config.compiler_options.jsx_factory.clone();
        ctx.jsx_fragment_factory = config.compiler_options.jsx_fragment_factory.clone();
        ctx
    }

    pub fn with_source_map(mut self, source_map: bool) -> Self {
        self.source_map = source_map;
        self
    }

    pub fn with_jsx_factory(mut self, factory: impl Into<String>) -> Self {
        self.jsx_factory = factory.into();
        self
    }

    /// Record the JSX pragmas declared in `source`.
    pub fn with_source(mut self, source: &str) -> Self {
        self.pragmas = scan_jsx_pragmas(source);
        self
    }

    /// Force dependants to rebuild along with this module, even when their
    /// own files are unchanged.
    pub fn invalidate_dependants(&mut self) {
        self.break_dependants_cache = true;
    }

    /// Plain `.ts` files cannot contain JSX.
    pub fn allows_jsx(&self) -> bool {
        self.extension != ".ts"
    }

    // =========================================================================
    // Temporaries
    // =========================================================================

    pub fn enter_statement(&mut self) {
        self.temp_scopes.push(TempScope::default());
    }

    pub fn exit_statement(&mut self) {
        // The root scope is never popped
        if self.temp_scopes.len() > 1 {
            self.temp_scopes.pop();
        }
    }

    /// Mint a fresh temporary name for the current statement.
    pub fn temp(&mut self) -> String {
        if self.temp_scopes.is_empty() {
            self.temp_scopes.push(TempScope::default());
        }
        let last = self.temp_scopes.len() - 1;
        let key = match self.temp_scopes[last].key {
            Some(key) => key,
            None => {
                self.next_statement_key += 1;
                self.temp_scopes[last].key = Some(self.next_statement_key);
                self.next_statement_key
            }
        };
        let scope = &mut self.temp_scopes[last];
        scope.counter += 1;
        format!("_{key}_{}", scope.counter)
    }
}

// =============================================================================
// Pragmas
// =============================================================================

/// Find `@jsx <name>` and `@jsxFrag <name>` in comments. The first
/// occurrence of each wins; string contents are skipped.
pub fn scan_jsx_pragmas(source: &str) -> JsxPragmas {
    let mut pragmas = JsxPragmas::default();
    let bytes = source.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    } else if bytes[i] == b'\n' && quote != b'`' {
                        break;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                let end = source[i..].find('\n').map_or(source.len(), |n| i + n);
                scan_comment(&source[i + 2..end], &mut pragmas);
                i = end;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = source[i + 2..].find("*/").map_or(source.len(), |n| i + 2 + n);
                scan_comment(&source[i + 2..end], &mut pragmas);
                i = end + 2;
            }
            _ => i += 1,
        }
    }
    pragmas
}

fn scan_comment(comment: &str, pragmas: &mut JsxPragmas) {
    let mut rest = comment;
    while let Some(at) = rest.find("@jsx") {
        let after = &rest[at + "@jsx".len()..];
        let (slot, value) = match after.strip_prefix("Frag") {
            Some(value) => (&mut pragmas.fragment, value),
            None => (&mut pragmas.factory, after),
        };
        if value.starts_with(char::is_whitespace) {
            let name: String = value
                .trim_start()
                .chars()
                .take_while(|&c| c == '.' || c == '$' || c == '_' || c.is_alphanumeric())
                .collect();
            if !name.is_empty() && slot.is_none() {
                *slot = Some(name);
            }
        }
        rest = after;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temps_are_scoped_per_statement() {
        let mut ctx = TransformContext::new("a.js", ".js");
        ctx.enter_statement();
        assert_eq!(ctx.temp(), "_1_1");
        assert_eq!(ctx.temp(), "_1_2");
        ctx.exit_statement();

        // A statement without temporaries does not consume a key
        ctx.enter_statement();
        ctx.exit_statement();

        ctx.enter_statement();
        assert_eq!(ctx.temp(), "_2_1");
        ctx.enter_statement();
        assert_eq!(ctx.temp(), "_3_1");
        ctx.exit_statement();
        assert_eq!(ctx.temp(), "_2_2");
        ctx.exit_statement();
    }

    #[test]
    fn test_root_scope_survives_unbalanced_exit() {
        let mut ctx = TransformContext::new("a.js", ".js");
        ctx.exit_statement();
        assert_eq!(ctx.temp(), "_1_1");
    }

    #[test]
    fn test_pragmas_in_block_and_line_comments() {
        let pragmas = scan_jsx_pragmas("/** @jsx h */\n// @jsxFrag Fragment\nconst a = 1;");
        assert_eq!(pragmas.factory.as_deref(), Some("h"));
        assert_eq!(pragmas.fragment.as_deref(), Some("Fragment"));
    }

    #[test]
    fn test_pragma_with_dotted_name() {
        let pragmas = scan_jsx_pragmas("/* @jsx preact.h @jsxFrag preact.Fragment */");
        assert_eq!(pragmas.factory.as_deref(), Some("preact.h"));
        assert_eq!(pragmas.fragment.as_deref(), Some("preact.Fragment"));
    }

    #[test]
    fn test_pragmas_inside_strings_are_ignored() {
        let pragmas = scan_jsx_pragmas("const s = '/* @jsx nope */';\nconst t = \"// @jsx no\";");
        assert_eq!(pragmas, JsxPragmas::default());
    }

    #[test]
    fn test_first_pragma_wins() {
        let pragmas = scan_jsx_pragmas("/* @jsx a */\n/* @jsx b */");
        assert_eq!(pragmas.factory.as_deref(), Some("a"));
    }

    #[test]
    fn test_invalidate_dependants_sets_flag() {
        let mut ctx = TransformContext::new("a.js", ".js");
        assert!(!ctx.break_dependants_cache);
        ctx.invalidate_dependants();
        assert!(ctx.break_dependants_cache);
    }

    #[test]
    fn test_ts_extension_disallows_jsx() {
        assert!(!TransformContext::new("a.ts", ".TS").allows_jsx());
        assert!(TransformContext::new("a.tsx", ".tsx").allows_jsx());
    }
}
