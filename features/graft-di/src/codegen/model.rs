//! Abstract code model handed to an emitter.

use crate::types::TypeSig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Visibility {
    Public,
    PackagePrivate,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: TypeSig,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: TypeSig) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeSig,
    pub visibility: Visibility,
    pub is_final: bool,
}

impl FieldDecl {
    /// A mutable private memo field
    pub fn memo(name: impl Into<String>, ty: TypeSig) -> Self {
        Self {
            name: name.into(),
            ty,
            visibility: Visibility::Private,
            is_final: false,
        }
    }

    pub fn constant(name: impl Into<String>, ty: TypeSig, visibility: Visibility) -> Self {
        Self {
            name: name.into(),
            ty,
            visibility,
            is_final: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub name: String,
    pub params: Vec<Param>,
    /// `None` for void
    pub returns: Option<TypeSig>,
    pub visibility: Visibility,
    pub body: Vec<Stmt>,
}

impl MethodDecl {
    pub fn new(name: impl Into<String>, returns: Option<TypeSig>, visibility: Visibility) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns,
            visibility,
            body: Vec::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, ty: TypeSig) -> Self {
        self.params.push(Param::new(name, ty));
        self
    }

    pub fn body(mut self, body: Vec<Stmt>) -> Self {
        self.body = body;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorDecl {
    pub params: Vec<Param>,
    pub visibility: Visibility,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Let {
        name: String,
        ty: TypeSig,
        value: Expr,
    },
    Assign {
        target: Expr,
        value: Expr,
    },
    Expr(Expr),
    Return(Expr),
    /// Runs `then` if `subject` is null
    IfNull {
        subject: Expr,
        then: Vec<Stmt>,
    },
    Throw {
        ty: TypeSig,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// The enclosing unit, also from inside an anonymous holder
    This,
    Null,
    Local(String),
    /// Source text, e.g. a map key literal
    Literal(String),
    Field {
        target: Box<Expr>,
        name: String,
    },
    /// A field of the anonymous holder itself
    SelfField(String),
    Call {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    StaticCall {
        owner: TypeSig,
        method: String,
        args: Vec<Expr>,
    },
    New {
        ty: TypeSig,
        args: Vec<Expr>,
    },
    Anonymous(Box<AnonymousDecl>),
}

impl Expr {
    pub fn local(name: impl Into<String>) -> Self {
        Self::Local(name.into())
    }

    pub fn field(self, name: impl Into<String>) -> Self {
        Self::Field {
            target: Box::new(self),
            name: name.into(),
        }
    }

    pub fn call(self, method: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Call {
            target: Box::new(self),
            method: method.into(),
            args,
        }
    }

    pub fn new_instance(ty: TypeSig, args: Vec<Expr>) -> Self {
        Self::New { ty, args }
    }
}

/// An anonymous class implementing a wrapper interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnonymousDecl {
    pub implements: TypeSig,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UnitKind {
    /// One per scope node, implements the scope graph
    TopLevel,
    /// Accessors of one boundary at one node
    Boundary,
    /// Collection aggregators of one node
    Aggregator,
    /// Builder nested in a top-level unit
    Builder,
}

/// A generated class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDecl {
    pub name: String,
    pub package: String,
    pub kind: UnitKind,
    pub visibility: Visibility,
    pub implements: Option<TypeSig>,
    pub doc: Vec<String>,
    pub fields: Vec<FieldDecl>,
    pub constructors: Vec<ConstructorDecl>,
    pub methods: Vec<MethodDecl>,
    pub nested: Vec<UnitDecl>,
}

impl UnitDecl {
    pub fn new(name: impl Into<String>, package: impl Into<String>, kind: UnitKind) -> Self {
        Self {
            name: name.into(),
            package: package.into(),
            kind,
            visibility: Visibility::Public,
            implements: None,
            doc: Vec::new(),
            fields: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            nested: Vec::new(),
        }
    }

    /// `package.Name`, or just `Name` in the default package
    pub fn full_name(&self) -> String {
        if self.package.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.package, self.name)
        }
    }

    pub fn ty(&self) -> TypeSig {
        TypeSig::named(self.full_name())
    }

    pub fn method(&self, name: &str) -> Option<&MethodDecl> {
        self.methods.iter().find(|method| method.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn merge(&mut self, declarations: Declarations) {
        self.fields.extend(declarations.fields);
        self.methods.extend(declarations.methods);
    }

    /// Fields and methods by name, nested units by name
    pub fn sort(&mut self) {
        self.fields.sort_by(|a, b| a.name.cmp(&b.name));
        self.methods.sort_by(|a, b| a.name.cmp(&b.name));
        self.nested.sort_by(|a, b| a.name.cmp(&b.name));
        for nested in &mut self.nested {
            nested.sort();
        }
    }
}

/// Declarations one generation step appends to a unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declarations {
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
}

impl Declarations {
    pub fn method(method: MethodDecl) -> Self {
        Self {
            fields: Vec::new(),
            methods: vec![method],
        }
    }

    pub fn with_field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }
}
