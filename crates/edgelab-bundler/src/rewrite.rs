//! Member-access rewriting of bundled output.
//!
//! Script hosts that provide platform globals in-process reserve the name
//! `cache`, so bundled code that calls `cache.get(...)` must be redirected to
//! the installed mock (`mockCache.get(...)`). Only identifiers used as the
//! object of a member access are renamed, and only when they refer to the
//! global: a local `cache` binding shadows it and is left alone.

use crate::error::{BundleError, Result};
use oxc_allocator::Allocator;
use oxc_ast::ast::{Expression, IdentifierReference, MemberExpression, Program};
use oxc_ast_visit::{VisitMut, walk_mut};
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_parser::Parser;
use oxc_semantic::{Scoping, SemanticBuilder};
use oxc_span::SourceType;
use std::collections::BTreeMap;
use std::path::Path;

/// Identifier renames applied to member-access objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameTable {
    renames: BTreeMap<String, String>,
}

impl RenameTable {
    pub fn empty() -> Self {
        Self {
            renames: BTreeMap::new(),
        }
    }

    pub fn with(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.insert(from.into(), to.into());
        self
    }

    pub fn get(&self, from: &str) -> Option<&str> {
        self.renames.get(from).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }
}

impl Default for RenameTable {
    /// `cache` -> `mockCache`.
    fn default() -> Self {
        Self::empty().with("cache", "mockCache")
    }
}

struct MemberObjectRenamer<'a, 't> {
    allocator: &'a Allocator,
    table: &'t RenameTable,
    scoping: &'t Scoping,
    renamed: usize,
}

impl MemberObjectRenamer<'_, '_> {
    /// Whether `ident` resolves to no binding in the module.
    fn is_global(&self, ident: &IdentifierReference<'_>) -> bool {
        ident
            .reference_id
            .get()
            .is_some_and(|id| self.scoping.get_reference(id).symbol_id().is_none())
    }
}

impl<'a> VisitMut<'a> for MemberObjectRenamer<'a, '_> {
    fn visit_member_expression(&mut self, it: &mut MemberExpression<'a>) {
        let object = match it {
            MemberExpression::ComputedMemberExpression(e) => &mut e.object,
            MemberExpression::StaticMemberExpression(e) => &mut e.object,
            MemberExpression::PrivateFieldExpression(e) => &mut e.object,
        };

        if let Expression::Identifier(ident) = object {
            let global = self.is_global(ident);
            if let Some(to) = self.table.get(ident.name.as_str()).filter(|_| global) {
                let to: &'a str = self.allocator.alloc_str(to);
                ident.name = to.into();
                self.renamed += 1;
            }
        }

        walk_mut::walk_member_expression(self, it);
    }
}

/// Rename member-access objects in `program` in place.
///
/// Scoping is rebuilt from `program` so only references to unbound (global)
/// names are touched.
///
/// # Arguments
///
/// * `program` - Parsed module, rewritten in place
/// * `allocator` - Arena `program` was parsed into; replacement names live there
/// * `table` - Global name to replacement name
///
/// Returns the number of identifiers renamed.
pub fn rewrite<'a>(program: &mut Program<'a>, allocator: &'a Allocator, table: &RenameTable) -> usize {
    if table.is_empty() {
        return 0;
    }

    let scoping = SemanticBuilder::new().build(program).semantic.into_scoping();
    let mut renamer = MemberObjectRenamer {
        allocator,
        table,
        scoping: &scoping,
        renamed: 0,
    };
    renamer.visit_program(program);
    renamer.renamed
}

/// Result of [`rewrite_source`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutput {
    pub code: String,
    pub renamed: usize,
}

/// Parse `source` as an ES module, apply `table`, and print it back.
///
/// When nothing matches, the original text is returned untouched.
pub fn rewrite_source(
    path: &Path,
    source: &str,
    table: &RenameTable,
    minify: bool,
) -> Result<RewriteOutput> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();

    if ret.panicked || !ret.errors.is_empty() {
        return Err(BundleError::Parse {
            path: path.to_path_buf(),
            errors: ret.errors.iter().map(|e| e.to_string()).collect(),
        });
    }

    let mut program = ret.program;
    let renamed = rewrite(&mut program, &allocator, table);
    if renamed == 0 {
        return Ok(RewriteOutput {
            code: source.to_string(),
            renamed,
        });
    }

    let options = CodegenOptions {
        minify,
        ..CodegenOptions::default()
    };
    let code = Codegen::new().with_options(options).build(&program).code;
    Ok(RewriteOutput { code, renamed })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> RewriteOutput {
        rewrite_source(Path::new("bundle.js"), source, &RenameTable::default(), false).unwrap()
    }

    #[test]
    fn test_member_call_is_renamed() {
        let out = run("cache.get(\"k\");\n");
        assert_eq!(out.renamed, 1);
        assert!(out.code.contains("mockCache.get(\"k\")"));
    }

    #[test]
    fn test_non_member_uses_are_untouched() {
        let source = "let cache = 5;\ncache + 1;\n";
        let out = run(source);
        assert_eq!(out.renamed, 0);
        assert_eq!(out.code, source);
    }

    #[test]
    fn test_property_named_cache_is_untouched() {
        let out = run("foo.cache.get(1);\ncache.put(1, 2);\n");
        assert_eq!(out.renamed, 1);
        assert!(out.code.contains("foo.cache.get(1)"));
        assert!(out.code.contains("mockCache.put(1, 2)"));
    }

    #[test]
    fn test_nested_and_computed_access() {
        let out = run("await cache.default.match(r);\ncache[\"delete\"](k);\n");
        assert_eq!(out.renamed, 2);
        assert!(out.code.contains("mockCache.default.match(r)"));
        assert!(out.code.contains("mockCache[\"delete\"](k)"));
    }

    #[test]
    fn test_local_binding_shadows_global() {
        let source = "function f() { const cache = new Map(); cache.set(1, 2); return cache.get(1); }\n";
        let out = run(source);
        assert_eq!(out.renamed, 0);
        assert_eq!(out.code, source);
    }

    #[test]
    fn test_parameter_and_import_bindings_are_local() {
        let out = run("import cache from \"./lru.js\";\ncache.get(1);\nfunction g(cache) { return cache.has(2); }\n");
        assert_eq!(out.renamed, 0);
    }

    #[test]
    fn test_global_renamed_next_to_shadowed_local() {
        let source = "function f() { const cache = new Map(); return cache.get(1); }\ncache.put(1, 2);\n";
        let out = run(source);
        assert_eq!(out.renamed, 1);
        assert!(out.code.contains("mockCache.put(1, 2)"));
        assert!(out.code.contains("cache.get(1)"));
        assert!(!out.code.contains("mockCache.get"));
    }

    #[test]
    fn test_empty_table_is_noop() {
        let source = "cache.get(1);\n";
        let out = rewrite_source(Path::new("b.js"), source, &RenameTable::empty(), false).unwrap();
        assert_eq!(out.code, source);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = rewrite_source(Path::new("b.js"), "cache.get(", &RenameTable::default(), false)
            .unwrap_err();
        assert!(matches!(err, BundleError::Parse { .. }));
    }
}
