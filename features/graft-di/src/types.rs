use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Primitive types, each with a boxed counterpart
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Primitive {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl Primitive {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "boolean" => Self::Boolean,
            "byte" => Self::Byte,
            "char" => Self::Char,
            "short" => Self::Short,
            "int" => Self::Int,
            "long" => Self::Long,
            "float" => Self::Float,
            "double" => Self::Double,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Char => "char",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
        }
    }

    pub fn boxed_name(self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::Byte => "Byte",
            Self::Char => "Character",
            Self::Short => "Short",
            Self::Int => "Integer",
            Self::Long => "Long",
            Self::Float => "Float",
            Self::Double => "Double",
        }
    }
}

/// Wrapper types the compiler gives meaning to
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum WrapperKind {
    /// `Provider<T>`, a new value on every `get()`
    Provider,
    /// `Lazy<T>`, computed on first `get()` and memoized in the holder
    Lazy,
    /// `Optional<T>`, present only if `T` is bound
    Optional,
    /// `Set<T>`, aggregated from collection contributions
    Set,
    /// `Map<K, V>`, aggregated from keyed contributions
    Map,
    /// `MembersInjector<T>`, injects members of an existing `T`
    MembersInjector,
}

impl WrapperKind {
    pub const ALL: [WrapperKind; 6] = [
        Self::Provider,
        Self::Lazy,
        Self::Optional,
        Self::Set,
        Self::Map,
        Self::MembersInjector,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Provider => "Provider",
            Self::Lazy => "Lazy",
            Self::Optional => "Optional",
            Self::Set => "Set",
            Self::Map => "Map",
            Self::MembersInjector => "MembersInjector",
        }
    }

    fn arity(self) -> usize {
        match self {
            Self::Map => 2,
            _ => 1,
        }
    }

    /// Provider and Lazy defer evaluation, they break eager dependency chains
    pub fn is_deferred(self) -> bool {
        matches!(self, Self::Provider | Self::Lazy)
    }

    fn from_simple_name(name: &str, arity: usize) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name && kind.arity() == arity)
    }
}

/// A type signature as seen by the binding graph
///
/// Parsed from the textual form used by the catalog, `java.util.Map<String, Provider<Plugin>>`.
/// Lowercase primitive names parse as [TypeSig::Primitive]. Well-known wrappers are stored
/// under their simple name so `javax.inject.Provider<Foo>` and `Provider<Foo>` are the same key.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeSig {
    Named { name: String, args: Vec<TypeSig> },
    Primitive(Primitive),
    /// An unspecialised type variable of a generic class
    Var(String),
}

impl TypeSig {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeSig>) -> Self {
        Self::Named {
            name: name.into(),
            args,
        }
    }

    pub fn wrap(kind: WrapperKind, inner: TypeSig) -> Self {
        Self::generic(kind.name(), vec![inner])
    }

    pub fn map_of(key: TypeSig, value: TypeSig) -> Self {
        Self::generic(WrapperKind::Map.name(), vec![key, value])
    }

    pub fn parse(text: &str) -> Result<Self, ParseTypeError> {
        let mut parser = Parser {
            text,
            chars: text.char_indices().peekable(),
        };
        let sig = parser.parse_type()?;
        parser.skip_whitespace();
        match parser.chars.next() {
            None => Ok(sig),
            Some((at, c)) => Err(ParseTypeError::Unexpected {
                text: text.to_string(),
                found: c,
                at,
            }),
        }
    }

    /// The raw name without type arguments
    pub fn raw_name(&self) -> &str {
        match self {
            Self::Named { name, .. } => name,
            Self::Primitive(primitive) => primitive.name(),
            Self::Var(name) => name,
        }
    }

    /// Last dotted segment of the raw name
    pub fn simple_name(&self) -> &str {
        let raw = self.raw_name();
        raw.rsplit('.').next().unwrap_or(raw)
    }

    pub fn args(&self) -> &[TypeSig] {
        match self {
            Self::Named { args, .. } => args,
            _ => &[],
        }
    }

    pub fn wrapper(&self) -> Option<WrapperKind> {
        match self {
            Self::Named { name, args } => WrapperKind::from_simple_name(name, args.len()),
            _ => None,
        }
    }

    /// The single argument of a one-argument wrapper
    pub fn element(&self) -> Option<&TypeSig> {
        match self.args() {
            [element] => Some(element),
            [_, value] if self.wrapper() == Some(WrapperKind::Map) => Some(value),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::Primitive(_))
    }

    /// Primitive types map to their boxed form, everything else is returned as is
    pub fn boxed(&self) -> TypeSig {
        match self {
            Self::Primitive(primitive) => TypeSig::named(primitive.boxed_name()),
            other => other.clone(),
        }
    }

    pub fn has_vars(&self) -> bool {
        match self {
            Self::Var(_) => true,
            Self::Named { args, .. } => args.iter().any(TypeSig::has_vars),
            Self::Primitive(_) => false,
        }
    }

    /// Replaces type variables with their specialisation
    pub fn substitute(&self, bindings: &BTreeMap<String, TypeSig>) -> TypeSig {
        match self {
            Self::Var(name) => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
            Self::Named { name, args } => Self::Named {
                name: name.clone(),
                args: args.iter().map(|arg| arg.substitute(bindings)).collect(),
            },
            Self::Primitive(_) => self.clone(),
        }
    }

    /// Turns argument-less names listed in `params` into type variables
    pub fn bind_vars(self, params: &[String]) -> TypeSig {
        match self {
            Self::Named { name, args } if args.is_empty() && params.contains(&name) => {
                Self::Var(name)
            }
            Self::Named { name, args } => Self::Named {
                name,
                args: args.into_iter().map(|arg| arg.bind_vars(params)).collect(),
            },
            other => other,
        }
    }

    /// Identifier-safe rendering, `Map<String, Foo>` -> `Map_String_Foo`
    pub fn mangled(&self) -> String {
        let mut out = String::new();
        self.mangle_into(&mut out);
        out
    }

    fn mangle_into(&self, out: &mut String) {
        match self {
            Self::Named { name, args } => {
                out.push_str(&mangle_name(name));
                for arg in args {
                    out.push('_');
                    arg.mangle_into(out);
                }
            }
            Self::Primitive(primitive) => out.push_str(primitive.name()),
            Self::Var(name) => out.push_str(&mangle_name(name)),
        }
    }
}

/// Replaces every character that may not appear in an identifier
pub fn mangle_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Lowercases the first character, `Foo_Bar` -> `foo_Bar`
pub fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl fmt::Display for TypeSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named { name, args } => {
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            Self::Primitive(primitive) => f.write_str(primitive.name()),
            Self::Var(name) => f.write_str(name),
        }
    }
}

impl TryFrom<String> for TypeSig {
    type Error = ParseTypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TypeSig::parse(&value)
    }
}

impl From<TypeSig> for String {
    fn from(value: TypeSig) -> Self {
        value.to_string()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseTypeError {
    #[error("Type signature '{text}' ends unexpectedly")]
    UnexpectedEnd { text: String },
    #[error("Type signature '{text}' has unexpected '{found}' at {at}")]
    Unexpected { text: String, found: char, at: usize },
}

struct Parser<'a> {
    text: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl Parser<'_> {
    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
    }

    fn parse_type(&mut self) -> Result<TypeSig, ParseTypeError> {
        self.skip_whitespace();
        let mut name = String::new();
        while let Some((_, c)) = self
            .chars
            .next_if(|(_, c)| c.is_alphanumeric() || matches!(*c, '_' | '.' | '$'))
        {
            name.push(c);
        }
        if name.is_empty() {
            return Err(self.unexpected());
        }

        self.skip_whitespace();
        let mut args = Vec::new();
        if self.chars.next_if(|(_, c)| *c == '<').is_some() {
            loop {
                args.push(self.parse_type()?);
                self.skip_whitespace();
                match self.chars.next() {
                    Some((_, ',')) => continue,
                    Some((_, '>')) => break,
                    Some((at, found)) => {
                        return Err(ParseTypeError::Unexpected {
                            text: self.text.to_string(),
                            found,
                            at,
                        })
                    }
                    None => {
                        return Err(ParseTypeError::UnexpectedEnd {
                            text: self.text.to_string(),
                        })
                    }
                }
            }
        }

        if args.is_empty() {
            if let Some(primitive) = Primitive::parse(&name) {
                return Ok(TypeSig::Primitive(primitive));
            }
        }

        // Wrappers are keyed by their simple name regardless of the package they come from
        let simple = name.rsplit('.').next().unwrap_or(&name);
        if let Some(kind) = WrapperKind::from_simple_name(simple, args.len()) {
            name = kind.name().to_string();
        }

        Ok(TypeSig::Named { name, args })
    }

    fn unexpected(&mut self) -> ParseTypeError {
        match self.chars.peek() {
            Some(&(at, found)) => ParseTypeError::Unexpected {
                text: self.text.to_string(),
                found,
                at,
            },
            None => ParseTypeError::UnexpectedEnd {
                text: self.text.to_string(),
            },
        }
    }
}

/// Identity of a requested value: type signature and optional qualifier
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BindingKey {
    pub ty: TypeSig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
}

impl BindingKey {
    pub fn new(ty: TypeSig) -> Self {
        Self {
            ty,
            qualifier: None,
        }
    }

    pub fn qualified(ty: TypeSig, qualifier: Option<String>) -> Self {
        Self { ty, qualifier }
    }

    /// Parses the type signature of an unqualified key
    pub fn of(text: &str) -> Result<Self, ParseTypeError> {
        Ok(Self::new(TypeSig::parse(text)?))
    }

    /// Same qualifier, different type
    pub fn with_type(&self, ty: TypeSig) -> Self {
        Self {
            ty,
            qualifier: self.qualifier.clone(),
        }
    }

    /// The form used for lookups: primitives are interchangeable with their boxed type
    pub fn lookup_form(&self) -> BindingKey {
        self.with_type(self.ty.boxed())
    }

    pub fn wrapper(&self) -> Option<WrapperKind> {
        self.ty.wrapper()
    }

    /// Key of the wrapped element, keeping the qualifier
    pub fn element(&self) -> Option<BindingKey> {
        self.ty.element().map(|element| self.with_type(element.clone()))
    }

    pub fn mangled(&self) -> String {
        match &self.qualifier {
            Some(qualifier) => format!("{}_{}", mangle_name(qualifier), self.ty.mangled()),
            None => self.ty.mangled(),
        }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "@{qualifier} {}", self.ty),
            None => write!(f, "{}", self.ty),
        }
    }
}

/// A declared symbol and the visibility boundary (package) it lives in
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub boundary: String,
}

impl Symbol {
    pub fn new(name: impl Into<String>, boundary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            boundary: boundary.into(),
        }
    }

    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
