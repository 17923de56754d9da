//! Import and export discovery.
//!
//! Modules are parsed with SWC and run through its scope resolver, so a
//! use of an imported binding is only reported when it really refers to the
//! import: a parameter or inner declaration of the same name shadows it.
//! Offsets in the returned records are byte offsets into the source text.

use std::collections::HashSet;
use std::ops::Range;

use anyhow::{anyhow, bail, Result};
use deno_ast::swc::ast::{
    CallExpr, Callee, Decl, DefaultDecl, EsVersion, ExportSpecifier, Expr, ExprOrSpread, Id,
    Ident, ImportSpecifier, Lit, MemberProp, MetaPropKind, Module, ModuleDecl, ModuleExportName,
    ModuleItem, NewExpr, ObjectPatProp, Pat, Prop, Str,
};
use deno_ast::swc::common::sync::Lrc;
use deno_ast::swc::common::{
    BytePos, FileName, Globals, Mark, SourceMap, Span, Spanned, SyntaxContext, GLOBALS,
};
use deno_ast::swc::ecma_visit::{Visit, VisitMutWith, VisitWith};
use deno_ast::swc::parser::lexer::Lexer;
use deno_ast::swc::parser::{EsSyntax, Parser, StringInput, Syntax};
use deno_ast::swc::transforms::resolver;

/// Bindings introduced by an `import ... from` clause.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportClause {
    pub default: Option<String>,
    pub namespace: Option<String>,
    /// (imported name, local name)
    pub named: Vec<(String, String)>,
}

/// What an `export ... from` statement re-exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReExport {
    /// `export * from`
    All,
    /// `export * as name from`
    Namespace(String),
    /// `export { a, b as c } from`: (imported name, exported name)
    Named(Vec<(String, String)>),
}

/// How a dependency is referenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportKind {
    /// `import ... from "s"`
    Static(ImportClause),
    /// `import "s"`
    SideEffect,
    /// `import("s")`
    Dynamic,
    /// `require("s")`
    Require,
    /// `export ... from "s"`
    ReExport(ReExport),
    /// `new URL("s", import.meta.url)`
    Asset,
}

/// One dependency reference with the source span it occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    pub specifier: String,
    pub kind: ImportKind,
    pub span: Range<usize>,
}

/// Where an imported binding is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// Any expression position
    Read,
    /// The callee of a call, which must not see the namespace as `this`
    Call,
    /// `{ name }` in an object literal
    Shorthand,
}

/// A use of an imported binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub span: Range<usize>,
    /// Local name of the import
    pub local: String,
    pub kind: ReferenceKind,
}

/// An export of bindings declared in the module itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalExport {
    /// `export const|let|var|function|class ...`; `keyword` is the
    /// `export ` prefix to delete.
    Declaration {
        keyword: Range<usize>,
        names: Vec<String>,
    },
    /// `export default function name` / `export default class name`
    DefaultDeclaration { keyword: Range<usize>, name: String },
    /// `export default <expression>`, or an anonymous default function or
    /// class, which needs a `;` inserted at `semicolon`.
    DefaultExpression {
        keyword: Range<usize>,
        semicolon: Option<usize>,
    },
    /// `export { a, b as c }`: (local name, exported name)
    List {
        span: Range<usize>,
        names: Vec<(String, String)>,
    },
}

/// Everything the bundler needs to know about a module's syntax.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSyntax {
    /// Dependencies in source order
    pub imports: Vec<ImportRecord>,
    pub exports: Vec<LocalExport>,
    /// Uses of import bindings, in source order
    pub references: Vec<Reference>,
    /// Spans of `import.meta` outside asset references
    pub meta: Vec<Range<usize>>,
}

impl ModuleSyntax {
    /// Whether the module uses ES module syntax (and so runs in strict mode
    /// with an `__esModule` exports object).
    pub fn is_esm(&self) -> bool {
        !self.exports.is_empty()
            || !self.meta.is_empty()
            || self.imports.iter().any(|r| {
                matches!(
                    r.kind,
                    ImportKind::Static(_) | ImportKind::SideEffect | ImportKind::ReExport(_)
                )
            })
    }
}

/// Parse a module and collect its module syntax.
pub fn scan(source: &str) -> Result<ModuleSyntax> {
    let globals = Globals::new();

    GLOBALS.set(&globals, || {
        let source_map = Lrc::new(SourceMap::default());
        let file = source_map.new_source_file(FileName::Anon.into(), source.to_string());
        let base = file.start_pos;

        let lexer = Lexer::new(
            Syntax::Es(EsSyntax::default()),
            EsVersion::Es2022,
            StringInput::from(&*file),
            None,
        );
        let mut parser = Parser::new_from(lexer);
        let parsed = parser.parse_module();
        let mut module = match (parsed, parser.take_errors().into_iter().next()) {
            (Ok(module), None) => module,
            (Err(error), _) | (Ok(_), Some(error)) => {
                let at = offset(base, error.span().lo);
                return Err(syntax_error(source, at, &error.kind().msg()));
            }
        };

        let unresolved_mark = Mark::new();
        let top_level_mark = Mark::new();
        module.visit_mut_with(&mut resolver(unresolved_mark, top_level_mark, false));

        let mut scanner = Scanner {
            source,
            base,
            unresolved: SyntaxContext::empty().apply_mark(unresolved_mark),
            bindings: HashSet::new(),
            syntax: ModuleSyntax::default(),
        };
        scanner.module_decls(&module)?;
        module.visit_with(&mut scanner);

        let mut syntax = scanner.syntax;
        syntax.imports.sort_by_key(|r| r.span.start);
        syntax.references.sort_by_key(|r| r.span.start);
        Ok(syntax)
    })
}

fn offset(base: BytePos, pos: BytePos) -> usize {
    pos.0.saturating_sub(base.0) as usize
}

fn syntax_error(source: &str, at: usize, message: &str) -> anyhow::Error {
    let before = &source.as_bytes()[..at.min(source.len())];
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let line_start = before
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |pos| pos + 1);
    let column = String::from_utf8_lossy(&before[line_start..]).chars().count() + 1;
    anyhow!("{} at line {}, column {}", message, line, column)
}

struct Scanner<'a> {
    source: &'a str,
    base: BytePos,
    /// Context of identifiers that resolve to no declaration (globals)
    unresolved: SyntaxContext,
    bindings: HashSet<Id>,
    syntax: ModuleSyntax,
}

impl Scanner<'_> {
    fn range(&self, span: Span) -> Range<usize> {
        offset(self.base, span.lo)..offset(self.base, span.hi)
    }

    /// Top-level import and export declarations.
    fn module_decls(&mut self, module: &Module) -> Result<()> {
        for item in &module.body {
            let ModuleItem::ModuleDecl(decl) = item else {
                continue;
            };
            match decl {
                ModuleDecl::Import(import) => {
                    let kind = if import.specifiers.is_empty() {
                        ImportKind::SideEffect
                    } else {
                        ImportKind::Static(self.import_clause(&import.specifiers))
                    };
                    self.syntax.imports.push(ImportRecord {
                        specifier: self.string(&import.src),
                        kind,
                        span: self.range(import.span),
                    });
                }
                ModuleDecl::ExportAll(export) => {
                    self.syntax.imports.push(ImportRecord {
                        specifier: self.string(&export.src),
                        kind: ImportKind::ReExport(ReExport::All),
                        span: self.range(export.span),
                    });
                }
                ModuleDecl::ExportNamed(export) => {
                    let names = self.export_specifiers(&export.specifiers)?;
                    match &export.src {
                        Some(src) => {
                            let reexport = match names {
                                ExportNames::Namespace(name) => ReExport::Namespace(name),
                                ExportNames::Named(names) => ReExport::Named(names),
                            };
                            self.syntax.imports.push(ImportRecord {
                                specifier: self.string(src),
                                kind: ImportKind::ReExport(reexport),
                                span: self.range(export.span),
                            });
                        }
                        None => {
                            let ExportNames::Named(names) = names else {
                                bail!("`export * as` needs a `from` clause");
                            };
                            self.syntax.exports.push(LocalExport::List {
                                span: self.range(export.span),
                                names,
                            });
                        }
                    }
                }
                ModuleDecl::ExportDecl(export) => {
                    let names = match &export.decl {
                        Decl::Var(var) => {
                            let mut names = Vec::new();
                            for declarator in &var.decls {
                                pattern_names(&declarator.name, &mut names);
                            }
                            names
                        }
                        Decl::Fn(function) => vec![function.ident.sym.to_string()],
                        Decl::Class(class) => vec![class.ident.sym.to_string()],
                        _ => bail!(
                            "unsupported export declaration at line {}",
                            self.line(export.span)
                        ),
                    };
                    self.syntax.exports.push(LocalExport::Declaration {
                        keyword: self.keyword(export.span, &["export"]),
                        names,
                    });
                }
                ModuleDecl::ExportDefaultDecl(export) => {
                    let name = match &export.decl {
                        DefaultDecl::Fn(function) => function.ident.as_ref(),
                        DefaultDecl::Class(class) => class.ident.as_ref(),
                        _ => None,
                    };
                    let keyword = self.keyword(export.span, &["export", "default"]);
                    self.syntax.exports.push(match name {
                        Some(name) => LocalExport::DefaultDeclaration {
                            keyword,
                            name: name.sym.to_string(),
                        },
                        None => LocalExport::DefaultExpression {
                            keyword,
                            semicolon: Some(offset(self.base, export.span.hi)),
                        },
                    });
                }
                ModuleDecl::ExportDefaultExpr(export) => {
                    self.syntax.exports.push(LocalExport::DefaultExpression {
                        keyword: self.keyword(export.span, &["export", "default"]),
                        semicolon: None,
                    });
                }
                _ => bail!(
                    "TypeScript module syntax is not supported (line {})",
                    self.line(decl.span())
                ),
            }
        }
        Ok(())
    }

    fn import_clause(&mut self, specifiers: &[ImportSpecifier]) -> ImportClause {
        let mut clause = ImportClause::default();
        for specifier in specifiers {
            match specifier {
                ImportSpecifier::Default(default) => {
                    self.bindings.insert(default.local.to_id());
                    clause.default = Some(default.local.sym.to_string());
                }
                ImportSpecifier::Namespace(namespace) => {
                    self.bindings.insert(namespace.local.to_id());
                    clause.namespace = Some(namespace.local.sym.to_string());
                }
                ImportSpecifier::Named(named) => {
                    self.bindings.insert(named.local.to_id());
                    let local = named.local.sym.to_string();
                    let imported = match &named.imported {
                        Some(name) => self.export_name(name),
                        None => local.clone(),
                    };
                    clause.named.push((imported, local));
                }
            }
        }
        clause
    }

    fn export_specifiers(&self, specifiers: &[ExportSpecifier]) -> Result<ExportNames> {
        let mut names = Vec::new();
        for specifier in specifiers {
            match specifier {
                ExportSpecifier::Namespace(namespace) if specifiers.len() == 1 => {
                    return Ok(ExportNames::Namespace(self.export_name(&namespace.name)));
                }
                ExportSpecifier::Named(named) => {
                    let orig = self.export_name(&named.orig);
                    let exported = match &named.exported {
                        Some(name) => self.export_name(name),
                        None => orig.clone(),
                    };
                    names.push((orig, exported));
                }
                _ => bail!("unsupported export clause"),
            }
        }
        Ok(ExportNames::Named(names))
    }

    fn export_name(&self, name: &ModuleExportName) -> String {
        match name {
            ModuleExportName::Ident(ident) => ident.sym.to_string(),
            ModuleExportName::Str(text) => self.string(text),
        }
    }

    /// The value of a string literal, read from the source text.
    fn string(&self, text: &Str) -> String {
        let raw = self.source.get(self.range(text.span)).unwrap_or_default();
        unquote(raw)
    }

    /// A string literal, or a template literal without substitutions.
    fn literal(&self, expr: &Expr) -> Option<String> {
        match expr {
            Expr::Lit(Lit::Str(text)) => Some(self.string(text)),
            Expr::Tpl(tpl) if tpl.exprs.is_empty() => {
                tpl.quasis.first().map(|quasi| unescape(&quasi.raw))
            }
            _ => None,
        }
    }

    fn literal_argument(&self, args: &[ExprOrSpread]) -> Option<String> {
        match args.first() {
            Some(arg) if arg.spread.is_none() => self.literal(&arg.expr),
            _ => None,
        }
    }

    /// The leading keywords of a statement, with the whitespace after them.
    fn keyword(&self, span: Span, words: &[&str]) -> Range<usize> {
        let start = offset(self.base, span.lo);
        let mut end = start;
        for word in words {
            let rest = self.source.get(end..).unwrap_or_default();
            let rest = rest.strip_prefix(word).unwrap_or(rest).trim_start();
            end = self.source.len() - rest.len();
        }
        start..end
    }

    fn line(&self, span: Span) -> usize {
        let at = offset(self.base, span.lo).min(self.source.len());
        self.source.as_bytes()[..at]
            .iter()
            .filter(|&&b| b == b'\n')
            .count()
            + 1
    }

    fn is_free(&self, ident: &Ident, name: &str) -> bool {
        &*ident.sym == name && ident.ctxt == self.unresolved
    }

    fn reference(&mut self, ident: &Ident, kind: ReferenceKind) {
        if self.bindings.contains(&ident.to_id()) {
            self.syntax.references.push(Reference {
                span: self.range(ident.span),
                local: ident.sym.to_string(),
                kind,
            });
        }
    }

    fn call(&mut self, call: &CallExpr) {
        let kind = match &call.callee {
            Callee::Import(_) => Some(ImportKind::Dynamic),
            Callee::Expr(callee) => match &**callee {
                Expr::Ident(ident) if self.is_free(ident, "require") => Some(ImportKind::Require),
                _ => None,
            },
            Callee::Super(_) => None,
        };
        if let Some(kind) = kind {
            if let Some(specifier) = self.literal_argument(&call.args) {
                self.syntax.imports.push(ImportRecord {
                    specifier,
                    kind,
                    span: self.range(call.span),
                });
                return;
            }
        }

        if let Callee::Expr(callee) = &call.callee {
            match &**callee {
                Expr::Ident(ident) => self.reference(ident, ReferenceKind::Call),
                other => other.visit_with(self),
            }
        }
        call.args.visit_with(self);
    }

    /// Record `new URL("file", import.meta.url)`; false for any other `new`.
    fn asset(&mut self, new: &NewExpr) -> bool {
        let Expr::Ident(callee) = &*new.callee else {
            return false;
        };
        let Some([first, second]) = new.args.as_deref() else {
            return false;
        };
        if !self.is_free(callee, "URL") || first.spread.is_some() || second.spread.is_some() {
            return false;
        }
        let Expr::Member(member) = &*second.expr else {
            return false;
        };
        let meta_url = matches!(
            &*member.obj,
            Expr::MetaProp(meta) if matches!(meta.kind, MetaPropKind::ImportMeta)
        ) && matches!(&member.prop, MemberProp::Ident(prop) if &*prop.sym == "url");
        if !meta_url {
            return false;
        }
        let Some(specifier) = self.literal(&first.expr) else {
            return false;
        };
        self.syntax.imports.push(ImportRecord {
            specifier,
            kind: ImportKind::Asset,
            span: self.range(new.span),
        });
        true
    }
}

impl Visit for Scanner<'_> {
    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(ident) => self.reference(ident, ReferenceKind::Read),
            Expr::Call(call) => self.call(call),
            Expr::New(new) if self.asset(new) => {}
            Expr::MetaProp(meta) if matches!(meta.kind, MetaPropKind::ImportMeta) => {
                let span = self.range(meta.span);
                self.syntax.meta.push(span);
            }
            _ => expr.visit_children_with(self),
        }
    }

    fn visit_prop(&mut self, prop: &Prop) {
        match prop {
            Prop::Shorthand(ident) => self.reference(ident, ReferenceKind::Shorthand),
            _ => prop.visit_children_with(self),
        }
    }
}

enum ExportNames {
    Namespace(String),
    Named(Vec<(String, String)>),
}

/// Names bound by a declaration pattern.
fn pattern_names(pat: &Pat, names: &mut Vec<String>) {
    match pat {
        Pat::Ident(binding) => names.push(binding.id.sym.to_string()),
        Pat::Array(array) => {
            for element in array.elems.iter().flatten() {
                pattern_names(element, names);
            }
        }
        Pat::Rest(rest) => pattern_names(&rest.arg, names),
        Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    ObjectPatProp::KeyValue(pair) => pattern_names(&pair.value, names),
                    ObjectPatProp::Assign(assign) => names.push(assign.key.id.sym.to_string()),
                    ObjectPatProp::Rest(rest) => pattern_names(&rest.arg, names),
                }
            }
        }
        Pat::Assign(assign) => pattern_names(&assign.left, names),
        _ => {}
    }
}

/// The value of a quoted string literal.
fn unquote(raw: &str) -> String {
    let mut chars = raw.chars();
    chars.next();
    chars.next_back();
    unescape(chars.as_str())
}

/// Resolve the escape sequences of a string or template literal body.
fn unescape(body: &str) -> String {
    if !body.contains('\\') {
        return body.to_string();
    }

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escaped) = chars.next() else {
            break;
        };
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            // Line continuation
            '\n' => {}
            '\r' => {
                chars.next_if_eq(&'\n');
            }
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                out.extend(u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32));
            }
            'u' => {
                let hex: String = if chars.next_if_eq(&'{').is_some() {
                    chars.by_ref().take_while(|&c| c != '}').collect()
                } else {
                    chars.by_ref().take(4).collect()
                };
                out.extend(u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32));
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specifiers(syntax: &ModuleSyntax) -> Vec<&str> {
        syntax.imports.iter().map(|r| r.specifier.as_str()).collect()
    }

    #[test]
    fn test_import_forms() {
        let src = r#"
import init, { render_chart, Week as ChartWeek } from "kp-chart";
import * as people from './people.js';
import './styles.js';
import def, * as all from "./both.js";
const lazy = () => import("./lazy.js");
const legacy = require('./legacy.cjs');
"#;
        let syntax = scan(src).unwrap();
        assert_eq!(
            specifiers(&syntax),
            vec![
                "kp-chart",
                "./people.js",
                "./styles.js",
                "./both.js",
                "./lazy.js",
                "./legacy.cjs"
            ]
        );

        match &syntax.imports[0].kind {
            ImportKind::Static(clause) => {
                assert_eq!(clause.default.as_deref(), Some("init"));
                assert_eq!(
                    clause.named,
                    vec![
                        ("render_chart".to_string(), "render_chart".to_string()),
                        ("Week".to_string(), "ChartWeek".to_string())
                    ]
                );
            }
            other => panic!("unexpected kind {:?}", other),
        }
        match &syntax.imports[1].kind {
            ImportKind::Static(clause) => {
                assert_eq!(clause.namespace.as_deref(), Some("people"))
            }
            other => panic!("unexpected kind {:?}", other),
        }
        assert_eq!(syntax.imports[2].kind, ImportKind::SideEffect);
        match &syntax.imports[3].kind {
            ImportKind::Static(clause) => {
                assert_eq!(clause.default.as_deref(), Some("def"));
                assert_eq!(clause.namespace.as_deref(), Some("all"));
            }
            other => panic!("unexpected kind {:?}", other),
        }
        assert_eq!(syntax.imports[4].kind, ImportKind::Dynamic);
        assert_eq!(syntax.imports[5].kind, ImportKind::Require);
        assert!(syntax.is_esm());
    }

    #[test]
    fn test_spans_index_the_source() {
        let src = "import a from './a.js';\nconsole.log(a);\n";
        let syntax = scan(src).unwrap();
        let span = syntax.imports[0].span.clone();
        assert!(src[span].starts_with("import a from './a.js'"));
        assert_eq!(&src[syntax.references[0].span.clone()], "a");
    }

    #[test]
    fn test_division_and_multibyte_text() {
        let src = "let i = 0;\nconst half = i++ / 2; // half ≥\nimport { v } from './v.js';\nv(half / 2, `é/${i}/`);\n";
        let syntax = scan(src).unwrap();

        assert_eq!(specifiers(&syntax), vec!["./v.js"]);
        let span = syntax.imports[0].span.clone();
        assert!(src[span].starts_with("import { v } from './v.js'"));
        assert_eq!(syntax.references.len(), 1);
        assert_eq!(&src[syntax.references[0].span.clone()], "v");
        assert_eq!(syntax.references[0].kind, ReferenceKind::Call);
    }

    #[test]
    fn test_ignores_comments_strings_and_members() {
        let src = r#"
// import a from "./commented.js";
/* require("./block.js") */
const text = "import b from './string.js'";
const re = /import c from ".\/regex.js"/;
loader.import("./member.js");
obj.require("./member2.js");
"#;
        let syntax = scan(src).unwrap();
        assert!(syntax.imports.is_empty());
        assert!(!syntax.is_esm());
    }

    #[test]
    fn test_require_must_be_free() {
        let shadowed = scan("const require = (x) => x;\nrequire('./a.js');\n").unwrap();
        assert!(shadowed.imports.is_empty());

        let free = scan("module.exports = require(`./b.js`);\n").unwrap();
        assert_eq!(free.imports[0].kind, ImportKind::Require);
        assert_eq!(free.imports[0].specifier, "./b.js");
    }

    #[test]
    fn test_reexports() {
        let src = r#"
export * from "./all.js";
export * as shapes from "./shapes.js";
export { default as Chart, legend } from "./chart.js";
"#;
        let syntax = scan(src).unwrap();
        assert_eq!(
            syntax.imports[0].kind,
            ImportKind::ReExport(ReExport::All)
        );
        assert_eq!(
            syntax.imports[1].kind,
            ImportKind::ReExport(ReExport::Namespace("shapes".into()))
        );
        assert_eq!(
            syntax.imports[2].kind,
            ImportKind::ReExport(ReExport::Named(vec![
                ("default".into(), "Chart".into()),
                ("legend".into(), "legend".into())
            ]))
        );
    }

    #[test]
    fn test_local_exports() {
        let src = r#"
export const WIDTH = 640, HEIGHT = compute(
  1,
  2
);
export let { a, b: renamed, c = 3, ...others } = config;
export function draw() {}
export async function load() {}
export class Legend {}
const x = 1;
export { x, x as y };
export default function main() {}
"#;
        let syntax = scan(src).unwrap();
        let names: Vec<Vec<String>> = syntax
            .exports
            .iter()
            .map(|e| match e {
                LocalExport::Declaration { names, .. } => names.clone(),
                LocalExport::DefaultDeclaration { name, .. } => vec![format!("default={}", name)],
                LocalExport::DefaultExpression { .. } => vec!["default".into()],
                LocalExport::List { names, .. } => names
                    .iter()
                    .map(|(l, e)| format!("{}->{}", l, e))
                    .collect(),
            })
            .collect();

        assert_eq!(
            names,
            vec![
                vec!["WIDTH".to_string(), "HEIGHT".to_string()],
                vec![
                    "a".to_string(),
                    "renamed".to_string(),
                    "c".to_string(),
                    "others".to_string()
                ],
                vec!["draw".to_string()],
                vec!["load".to_string()],
                vec!["Legend".to_string()],
                vec!["x->x".to_string(), "x->y".to_string()],
                vec!["default=main".to_string()],
            ]
        );
        assert!(syntax.imports.is_empty());
    }

    #[test]
    fn test_export_keyword_span() {
        let src = "export  const a = 1\nconst b = 2\n";
        let syntax = scan(src).unwrap();
        match &syntax.exports[0] {
            LocalExport::Declaration { names, keyword } => {
                assert_eq!(names, &vec!["a".to_string()]);
                assert_eq!(&src[keyword.clone()], "export  ");
            }
            other => panic!("unexpected export {:?}", other),
        }
    }

    #[test]
    fn test_default_expression() {
        let src = "export default { render };\n";
        let syntax = scan(src).unwrap();
        match &syntax.exports[0] {
            LocalExport::DefaultExpression { keyword, semicolon } => {
                assert_eq!(&src[keyword.clone()], "export default ");
                assert_eq!(*semicolon, None);
            }
            other => panic!("unexpected export {:?}", other),
        }
    }

    #[test]
    fn test_anonymous_default_function() {
        let src = "export default function () {}\n";
        let syntax = scan(src).unwrap();
        match &syntax.exports[0] {
            LocalExport::DefaultExpression { semicolon, .. } => {
                assert_eq!(*semicolon, Some(src.trim_end().len()));
            }
            other => panic!("unexpected export {:?}", other),
        }
    }

    #[test]
    fn test_asset_reference_and_meta() {
        let src = r#"
const url = new URL('index_bg.wasm', import.meta.url);
console.log(import.meta.url);
const other = new URL('https://example.com/x');
"#;
        let syntax = scan(src).unwrap();
        assert_eq!(syntax.imports.len(), 1);
        assert_eq!(syntax.imports[0].kind, ImportKind::Asset);
        assert_eq!(syntax.imports[0].specifier, "index_bg.wasm");
        assert_eq!(syntax.meta.len(), 1);
        assert_eq!(&src[syntax.meta[0].clone()], "import.meta");
    }

    #[test]
    fn test_references_respect_scopes() {
        let src = r#"
import { A, b as bee } from './a.js';
import * as ns from './ns.js';
console.log(A, { bee }, ns.x);
bee();
function f(A) { return A; }
{ let bee = 1; bee; }
const o = { A: 1 };
o.A = () => A;
"#;
        let syntax = scan(src).unwrap();
        let uses: Vec<(&str, ReferenceKind)> = syntax
            .references
            .iter()
            .map(|r| (r.local.as_str(), r.kind))
            .collect();
        assert_eq!(
            uses,
            vec![
                ("A", ReferenceKind::Read),
                ("bee", ReferenceKind::Shorthand),
                ("ns", ReferenceKind::Read),
                ("bee", ReferenceKind::Call),
                ("A", ReferenceKind::Read),
            ]
        );
    }

    #[test]
    fn test_multiline_named_import() {
        let src = "import {\n  Day,\n  Week, // the week view\n} from \"./data.js\";\n";
        let syntax = scan(src).unwrap();
        match &syntax.imports[0].kind {
            ImportKind::Static(clause) => assert_eq!(clause.named.len(), 2),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_syntax_error_has_location() {
        let err = scan("const ok = 1;\nimport a, b from './x.js';\n").unwrap_err();
        assert!(err.to_string().contains("line 2"), "{}", err);
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unquote(r#"'./a\x2ejs'"#), "./a.js");
        assert_eq!(unquote(r#""\u{1F600}A""#), "\u{1F600}A");
    }
}
