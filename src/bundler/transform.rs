//! Per-module rewriting into a factory function.
//!
//! Module syntax is replaced by calls on the bundle runtime; every other
//! byte of the source is kept as written. ES modules get the signature
//! `(__kpack_module__, __kpack_exports__, __kpack_require__)` and run in
//! strict mode. Their imports are required at the top of the factory and
//! each use of an imported binding reads the exporting module's namespace,
//! so bindings stay live and cycles see declarations made after the cycle
//! was entered. CommonJS modules keep `module` and `exports`, and their
//! `require` calls are rewritten to module ids.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::ops::Range;

use super::graph::{Asset, Module, ModuleKind, Target};
use super::scan::{ImportKind, LocalExport, ReExport, ReferenceKind};

pub const REQUIRE: &str = "__kpack_require__";
const MODULE: &str = "__kpack_module__";
const EXPORTS: &str = "__kpack_exports__";
const DEFAULT_LOCAL: &str = "__kpack_default__";

/// A replacement of one source span.
#[derive(Debug)]
struct Edit {
    span: Range<usize>,
    text: String,
}

/// An export getter: exported name and the expression it returns.
type Getter = (String, String);

/// Render a module as a factory function expression.
pub fn transform(module: &Module, assets: &[Asset]) -> String {
    match module.kind {
        ModuleKind::Json => format!(
            "function (module, exports, {REQUIRE}) {{\nmodule.exports = {};\n}}",
            module.source.trim()
        ),
        ModuleKind::Script => Rewrite::new(module, assets).finish(),
    }
}

struct Rewrite<'a> {
    module: &'a Module,
    edits: Vec<Edit>,
    getters: Vec<Getter>,
    /// Statements placed before the module body
    hoisted: String,
    /// Import local name to the expression that reads it
    bindings: HashMap<&'a str, String>,
}

impl<'a> Rewrite<'a> {
    fn new(module: &'a Module, assets: &[Asset]) -> Self {
        let mut rewrite = Rewrite {
            module,
            edits: Vec::new(),
            getters: Vec::new(),
            hoisted: String::new(),
            bindings: HashMap::new(),
        };
        rewrite.imports(assets);
        rewrite.references();
        rewrite.exports();
        for meta in &module.syntax.meta {
            rewrite.edit(meta.clone(), format!("{REQUIRE}.m"));
        }
        rewrite
    }

    fn edit(&mut self, span: Range<usize>, text: String) {
        self.edits.push(Edit { span, text });
    }

    fn imports(&mut self, assets: &[Asset]) {
        let module = self.module;
        for (index, (record, target)) in module
            .syntax
            .imports
            .iter()
            .zip(&module.targets)
            .enumerate()
        {
            let local = format!("__kpack_i{}", index);
            let text = match (&record.kind, *target) {
                (ImportKind::Asset, Target::Asset(asset)) => {
                    format!("new URL({}, {REQUIRE}.b)", quote(&assets[asset].name))
                }
                (_, Target::Asset(_)) | (ImportKind::Asset, Target::Module(_)) => continue,
                (ImportKind::Require, Target::Module(id)) => format!("{REQUIRE}({})", id),
                (ImportKind::Dynamic, Target::Module(id)) => format!(
                    "Promise.resolve().then(function () {{ return {REQUIRE}.i({REQUIRE}({})); }})",
                    id
                ),
                (ImportKind::SideEffect, Target::Module(id)) => {
                    let _ = writeln!(self.hoisted, "{REQUIRE}({});", id);
                    String::new()
                }
                (ImportKind::Static(clause), Target::Module(id)) => {
                    self.require_namespace(&local, id);
                    if let Some(name) = &clause.default {
                        self.bindings.insert(name, member(&local, "default"));
                    }
                    if let Some(name) = &clause.namespace {
                        self.bindings.insert(name, local.clone());
                    }
                    for (imported, name) in &clause.named {
                        self.bindings.insert(name, member(&local, imported));
                    }
                    String::new()
                }
                (ImportKind::ReExport(ReExport::All), Target::Module(id)) => {
                    let _ = writeln!(self.hoisted, "{REQUIRE}.s({EXPORTS}, {REQUIRE}({}));", id);
                    String::new()
                }
                (ImportKind::ReExport(ReExport::Namespace(name)), Target::Module(id)) => {
                    self.require_namespace(&local, id);
                    self.getters.push((name.clone(), local.clone()));
                    String::new()
                }
                (ImportKind::ReExport(ReExport::Named(names)), Target::Module(id)) => {
                    self.require_namespace(&local, id);
                    for (imported, exported) in names {
                        self.getters.push((exported.clone(), member(&local, imported)));
                    }
                    String::new()
                }
            };
            self.edit(record.span.clone(), text);
        }
    }

    fn require_namespace(&mut self, local: &str, id: usize) {
        let _ = writeln!(
            self.hoisted,
            "var {} = {REQUIRE}.i({REQUIRE}({}));",
            local, id
        );
    }

    fn references(&mut self) {
        let module = self.module;
        for reference in &module.syntax.references {
            let Some(access) = self.bindings.get(reference.local.as_str()) else {
                continue;
            };
            let text = match reference.kind {
                ReferenceKind::Read => access.clone(),
                ReferenceKind::Call => format!("(0, {})", access),
                ReferenceKind::Shorthand => format!("{}: {}", reference.local, access),
            };
            self.edit(reference.span.clone(), text);
        }
    }

    fn exports(&mut self) {
        let module = self.module;
        for export in &module.syntax.exports {
            match export {
                LocalExport::Declaration { keyword, names } => {
                    self.edit(keyword.clone(), String::new());
                    self.getters
                        .extend(names.iter().map(|n| (n.clone(), n.clone())));
                }
                LocalExport::DefaultDeclaration { keyword, name } => {
                    self.edit(keyword.clone(), String::new());
                    self.getters.push(("default".to_string(), name.clone()));
                }
                LocalExport::DefaultExpression { keyword, semicolon } => {
                    self.edit(keyword.clone(), format!("var {DEFAULT_LOCAL} = "));
                    if let Some(at) = *semicolon {
                        self.edit(at..at, ";".to_string());
                    }
                    self.getters
                        .push(("default".to_string(), DEFAULT_LOCAL.to_string()));
                }
                LocalExport::List { span, names } => {
                    self.edit(span.clone(), String::new());
                    for (local, exported) in names {
                        // Re-exporting an import reads it through its namespace
                        let access = self
                            .bindings
                            .get(local.as_str())
                            .cloned()
                            .unwrap_or_else(|| local.clone());
                        self.getters.push((exported.clone(), access));
                    }
                }
            }
        }
    }

    fn finish(self) -> String {
        let body = apply(&self.module.source, self.edits);
        if !self.module.syntax.is_esm() {
            return format!("function (module, exports, {REQUIRE}) {{\n{}\n}}", body);
        }

        let mut out = format!("function ({MODULE}, {EXPORTS}, {REQUIRE}) {{\n\"use strict\";\n");
        let _ = writeln!(out, "{REQUIRE}.r({EXPORTS});");
        if !self.getters.is_empty() {
            out.push_str(&define_getters(&self.getters));
        }
        out.push_str(&self.hoisted);
        out.push_str(&body);
        out.push_str("\n}");
        out
    }
}

/// `__kpack_require__.d(exports, { "name": function () { return expr; } })`,
/// keeping the first getter for a repeated name.
fn define_getters(getters: &[Getter]) -> String {
    let mut seen: Vec<&str> = Vec::new();
    let mut entries = Vec::new();
    for (name, expr) in getters {
        if seen.contains(&name.as_str()) {
            continue;
        }
        seen.push(name);
        entries.push(format!(
            "  {}: function () {{ return {}; }}",
            quote(name),
            expr
        ));
    }
    format!("{REQUIRE}.d({EXPORTS}, {{\n{}\n}});\n", entries.join(",\n"))
}

/// Apply non-overlapping edits to `source`.
fn apply(source: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|e| e.span.start);
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for edit in edits {
        if edit.span.start < cursor || edit.span.end > source.len() {
            continue;
        }
        out.push_str(&source[cursor..edit.span.start]);
        out.push_str(&edit.text);
        cursor = edit.span.end;
    }
    out.push_str(&source[cursor..]);
    out
}

/// Property access on `object`, dotted when `name` is an identifier.
fn member(object: &str, name: &str) -> String {
    let mut chars = name.chars();
    let identifier = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if identifier {
        format!("{}.{}", object, name)
    } else {
        format!("{}[{}]", object, quote(name))
    }
}

/// A JavaScript string literal.
pub fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text))
}
