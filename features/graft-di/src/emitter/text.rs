//! Renders units as Java-like source text, one file per unit.

use std::collections::BTreeMap;

use super::{EmitError, Emitter};
use crate::codegen::model::{
    AnonymousDecl, ConstructorDecl, Expr, FieldDecl, MethodDecl, Param, Stmt, UnitDecl, UnitKind,
    Visibility,
};

/// Collects rendered files by path, `a/b/Name.java`
#[derive(Debug, Clone)]
pub struct TextEmitter {
    files: BTreeMap<String, String>,
    indent: usize,
}

impl Default for TextEmitter {
    fn default() -> Self {
        Self::with_indent(4)
    }
}

impl TextEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_indent(indent: usize) -> Self {
        Self {
            files: BTreeMap::new(),
            indent,
        }
    }

    pub fn files(&self) -> &BTreeMap<String, String> {
        &self.files
    }

    pub fn into_files(self) -> BTreeMap<String, String> {
        self.files
    }

    pub fn file_name(unit: &UnitDecl) -> String {
        if unit.package.is_empty() {
            format!("{}.java", unit.name)
        } else {
            format!("{}/{}.java", unit.package.replace('.', "/"), unit.name)
        }
    }

    /// Source text of one unit
    pub fn render(&self, unit: &UnitDecl) -> String {
        let mut renderer = Renderer {
            out: String::new(),
            indent: self.indent,
            level: 0,
            unit_name: unit.name.clone(),
        };
        if !unit.package.is_empty() {
            renderer.line(format!("package {};", unit.package));
            renderer.line("");
        }
        renderer.unit(unit);
        renderer.out
    }
}

impl Emitter for TextEmitter {
    fn emit(&mut self, unit: &UnitDecl) -> Result<(), EmitError> {
        let file = Self::file_name(unit);
        if self.files.contains_key(&file) {
            return Err(EmitError::DuplicateUnit(unit.full_name()));
        }
        tracing::trace!("Rendering '{file}'");
        let text = self.render(unit);
        self.files.insert(file, text);
        Ok(())
    }
}

fn visibility(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::Public => "public ",
        Visibility::PackagePrivate => "",
        Visibility::Private => "private ",
    }
}

fn params(params: &[Param]) -> String {
    params
        .iter()
        .map(|param| format!("{} {}", param.ty, param.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

struct Renderer {
    out: String,
    indent: usize,
    level: usize,
    /// Simple name of the unit being rendered, for `Outer.this`
    unit_name: String,
}

impl Renderer {
    fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            self.out.push_str(&" ".repeat(self.indent * self.level));
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    fn unit(&mut self, unit: &UnitDecl) {
        if !unit.doc.is_empty() {
            self.line("/**");
            for doc in &unit.doc {
                self.line(format!(" * {doc}"));
            }
            self.line(" */");
        }
        let modifiers = match unit.kind {
            UnitKind::Builder => "static final ",
            _ => "final ",
        };
        let implements = unit
            .implements
            .as_ref()
            .map(|ty| format!(" implements {ty}"))
            .unwrap_or_default();
        self.line(format!(
            "{}{modifiers}class {}{implements} {{",
            visibility(unit.visibility),
            unit.name
        ));

        let outer = std::mem::replace(&mut self.unit_name, unit.name.clone());
        self.level += 1;
        let mut first = true;
        if !unit.fields.is_empty() {
            for field in &unit.fields {
                self.field(field);
            }
            first = false;
        }
        for constructor in &unit.constructors {
            self.separate(&mut first);
            self.constructor(&unit.name, constructor);
        }
        for method in &unit.methods {
            self.separate(&mut first);
            self.method(method, false);
        }
        for nested in &unit.nested {
            self.separate(&mut first);
            self.unit(nested);
        }
        self.level -= 1;
        self.unit_name = outer;
        self.line("}");
    }

    fn separate(&mut self, first: &mut bool) {
        if !*first {
            self.line("");
        }
        *first = false;
    }

    fn field(&mut self, field: &FieldDecl) {
        let modifier = if field.is_final { "final " } else { "" };
        self.line(format!(
            "{}{modifier}{} {};",
            visibility(field.visibility),
            field.ty,
            field.name
        ));
    }

    fn constructor(&mut self, name: &str, constructor: &ConstructorDecl) {
        self.line(format!(
            "{}{name}({}) {{",
            visibility(constructor.visibility),
            params(&constructor.params)
        ));
        self.body(&constructor.body, false);
        self.line("}");
    }

    fn method(&mut self, method: &MethodDecl, in_holder: bool) {
        let returns = method
            .returns
            .as_ref()
            .map_or_else(|| "void".to_string(), ToString::to_string);
        self.line(format!(
            "{}{returns} {}({}) {{",
            visibility(method.visibility),
            method.name,
            params(&method.params)
        ));
        self.body(&method.body, in_holder);
        self.line("}");
    }

    fn body(&mut self, body: &[Stmt], in_holder: bool) {
        self.level += 1;
        for stmt in body {
            self.stmt(stmt, in_holder);
        }
        self.level -= 1;
    }

    fn stmt(&mut self, stmt: &Stmt, in_holder: bool) {
        match stmt {
            Stmt::Let { name, ty, value } => {
                let value = self.expr(value, in_holder);
                self.line(format!("{ty} {name} = {value};"));
            }
            Stmt::Assign { target, value } => {
                let target = self.expr(target, in_holder);
                let value = self.expr(value, in_holder);
                self.line(format!("{target} = {value};"));
            }
            Stmt::Expr(expr) => {
                let expr = self.expr(expr, in_holder);
                self.line(format!("{expr};"));
            }
            Stmt::Return(expr) => {
                let expr = self.expr(expr, in_holder);
                self.line(format!("return {expr};"));
            }
            Stmt::IfNull { subject, then } => {
                let subject = self.expr(subject, in_holder);
                self.line(format!("if ({subject} == null) {{"));
                self.body(then, in_holder);
                self.line("}");
            }
            Stmt::Throw { ty, message } => {
                self.line(format!("throw new {ty}(\"{}\");", escape(message)));
            }
        }
    }

    fn args(&self, args: &[Expr], in_holder: bool) -> String {
        args.iter()
            .map(|arg| self.expr(arg, in_holder))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn expr(&self, expr: &Expr, in_holder: bool) -> String {
        match expr {
            Expr::This if in_holder => format!("{}.this", self.unit_name),
            Expr::This => "this".to_string(),
            Expr::Null => "null".to_string(),
            Expr::Local(name) | Expr::Literal(name) => name.clone(),
            Expr::Field { target, name } => format!("{}.{name}", self.expr(target, in_holder)),
            Expr::SelfField(name) => format!("this.{name}"),
            Expr::Call {
                target,
                method,
                args,
            } => format!(
                "{}.{method}({})",
                self.expr(target, in_holder),
                self.args(args, in_holder)
            ),
            Expr::StaticCall {
                owner,
                method,
                args,
            } => format!("{owner}.{method}({})", self.args(args, in_holder)),
            Expr::New { ty, args } => format!("new {ty}({})", self.args(args, in_holder)),
            Expr::Anonymous(decl) => self.anonymous(decl),
        }
    }

    /// Anonymous holder starting at the current line, its body one level deeper
    fn anonymous(&self, decl: &AnonymousDecl) -> String {
        let mut inner = Renderer {
            out: String::new(),
            indent: self.indent,
            level: self.level + 1,
            unit_name: self.unit_name.clone(),
        };
        for field in &decl.fields {
            inner.field(field);
        }
        let mut first = decl.fields.is_empty();
        for method in &decl.methods {
            inner.separate(&mut first);
            inner.method(method, true);
        }
        format!(
            "new {}() {{\n{}{}}}",
            decl.implements,
            inner.out,
            " ".repeat(self.indent * self.level)
        )
    }
}
