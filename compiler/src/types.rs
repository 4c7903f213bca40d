//! Concrete syntax tree produced by the Swift parser. Only the declaration
//! shapes the extractor cares about are modeled; function bodies are kept as
//! raw token runs for pattern analysis.

use crate::tokenizer::Token;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceFile {
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Type(TypeDecl),
    Extension(ExtensionDecl),
    TypeAlias(TypeAliasDecl),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Struct,
    Class,
    Actor,
    Enum,
    Protocol,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name:      String,
    /// Argument tokens inside the parentheses, if any.
    pub arguments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub kind:       DeclKind,
    pub name:       String,
    pub line:       usize,
    pub column:     usize,
    pub docs:       Vec<String>,
    pub attributes: Vec<Attribute>,
    pub is_generic: bool,
    /// Inheritance clause entries as written, e.g. `String`, `Codable`.
    pub inherited:  Vec<String>,
    pub members:    Vec<Member>,
}

impl TypeDecl {
    pub fn properties(&self) -> impl Iterator<Item = &PropertyDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Property(p) => Some(p),
            _ => None,
        })
    }

    pub fn cases(&self) -> impl Iterator<Item = &EnumCase> {
        self.members.iter().filter_map(|m| match m {
            Member::Cases(cases) => Some(cases.iter()),
            _ => None,
        })
        .flatten()
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Function(f) => Some(f),
            _ => None,
        })
    }

    pub fn nested(&self, name: &str) -> Option<&TypeDecl> {
        self.members.iter().find_map(|m| match m {
            Member::Type(t) if t.name == name => Some(t),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionDecl {
    pub name:      String,
    pub line:      usize,
    pub column:    usize,
    pub inherited: Vec<String>,
    pub members:   Vec<Member>,
}

impl ExtensionDecl {
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Function(f) => Some(f),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAliasDecl {
    pub name:       String,
    pub line:       usize,
    pub column:     usize,
    pub docs:       Vec<String>,
    pub attributes: Vec<Attribute>,
    pub is_generic: bool,
    pub target:     String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Property(PropertyDecl),
    /// One `case` declaration may introduce several cases.
    Cases(Vec<EnumCase>),
    Function(FunctionDecl),
    Type(TypeDecl),
    TypeAlias(TypeAliasDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub name:            String,
    pub line:            usize,
    pub column:          usize,
    pub docs:            Vec<String>,
    pub type_text:       Option<String>,
    pub is_static:       bool,
    pub is_computed:     bool,
    pub is_let:          bool,
    pub has_initializer: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(String),
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssociatedValue {
    pub label:     Option<String>,
    pub type_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumCase {
    pub name:       String,
    pub line:       usize,
    pub column:     usize,
    pub docs:       Vec<String>,
    pub raw_value:  Option<Literal>,
    pub associated: Vec<AssociatedValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// `init` for initializers.
    pub name:         String,
    pub line:         usize,
    pub column:       usize,
    pub is_static:    bool,
    /// External label of the first parameter, e.g. `from` in `init(from decoder:)`.
    pub first_label:  Option<String>,
    /// Tokens between the body's braces; empty for bodiless requirements.
    pub body:         Vec<Token>,
}

impl FunctionDecl {
    pub fn is_init_labeled(&self, label: &str) -> bool {
        self.name == "init" && self.first_label.as_deref() == Some(label)
    }

    pub fn is_named(&self, name: &str, label: &str) -> bool {
        self.name == name && self.first_label.as_deref() == Some(label)
    }
}
