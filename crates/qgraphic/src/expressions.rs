//! The QGraphic abstract syntax tree.
//!
//! A [`Program`] is the ordered list of top-level items: function
//! declarations and statements, in source order. Every node records the
//! 1-based line of the token that introduced it, which is what runtime
//! errors and [`StepInfo`](crate::step::StepInfo) report.

use std::rc::Rc;

use strum::{Display, EnumString, IntoStaticStr};

/// The type names usable in declarations, parameters and walrus forms.
///
/// The strum serializations match the surface keywords (`Frame`, `int`,
/// `color`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
pub enum TypeName {
    Frame,
    #[strum(serialize = "int")]
    Int,
    #[strum(serialize = "color")]
    Color,
    #[strum(serialize = "pixel")]
    Pixel,
    #[strum(serialize = "bool")]
    Bool,
    #[strum(serialize = "string")]
    String,
    #[strum(serialize = "list")]
    List,
    #[strum(serialize = "None")]
    None,
}

impl TypeName {
    /// Maps a keyword to its type name, or `None` for non-type keywords.
    #[must_use]
    pub fn from_keyword(text: &str) -> Option<Self> {
        text.parse().ok()
    }
}

/// A parsed program: top-level items in source order.
#[derive(Debug, Clone)]
pub struct Program {
    pub items: Vec<Item>,
}

/// One top-level item.
///
/// Function declarations are reference-counted so the interpreter's
/// pre-scan can bind them as values without cloning bodies.
#[derive(Debug, Clone)]
pub enum Item {
    Function(Rc<FunctionDecl>),
    Stmt(Stmt),
}

/// One `Type name` parameter of a function declaration.
#[derive(Debug, Clone)]
pub struct Param {
    pub type_name: TypeName,
    pub name: Rc<str>,
    pub line: u32,
}

/// `name { params } => Type : body !`
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: Rc<str>,
    pub params: Vec<Param>,
    pub return_type: TypeName,
    pub body: Vec<Stmt>,
    pub line: u32,
}

/// A statement. Simple statements are terminated by `.` in the source;
/// `If`/`While`/`For` use their block forms instead.
#[derive(Debug, Clone)]
pub enum Stmt {
    /// `Type name [= expr]`
    VarDecl {
        type_name: TypeName,
        name: Rc<str>,
        value: Option<Expr>,
        line: u32,
    },
    /// `target = expr` where target is a variable or an index expression.
    Assign { target: Expr, value: Expr, line: u32 },
    /// `frame -> (x y) = (r g b)`
    PixelAssign { pointer: Expr, value: Expr, line: u32 },
    /// `Publish expr`
    Publish { expr: Expr, line: u32 },
    /// `Send expr`
    Send { expr: Expr, line: u32 },
    /// `return` or `return ( expr )`
    Return { expr: Option<Expr>, line: u32 },
    /// A bare expression evaluated for its effects.
    Expr { expr: Expr, line: u32 },
    /// `( cond ) ? then !? else !` (the leading `if` keyword is optional).
    If {
        condition: Expr,
        then_body: Vec<Stmt>,
        else_body: Option<Vec<Stmt>>,
        line: u32,
    },
    /// `While ( cond ) body !`
    While { condition: Expr, body: Vec<Stmt>, line: u32 },
    /// `For [Type] name in expr : body !`
    ///
    /// The type annotation is accepted for compatibility but never
    /// enforced at runtime.
    For {
        type_name: Option<TypeName>,
        var: Rc<str>,
        iterable: Expr,
        body: Vec<Stmt>,
        line: u32,
    },
}

impl Stmt {
    /// The source line of the token that introduced this statement.
    #[must_use]
    pub fn line(&self) -> u32 {
        match self {
            Self::VarDecl { line, .. }
            | Self::Assign { line, .. }
            | Self::PixelAssign { line, .. }
            | Self::Publish { line, .. }
            | Self::Send { line, .. }
            | Self::Return { line, .. }
            | Self::Expr { line, .. }
            | Self::If { line, .. }
            | Self::While { line, .. }
            | Self::For { line, .. } => *line,
        }
    }

    /// A short name for the statement form, used by step tracers.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::VarDecl { .. } => "var-decl",
            Self::Assign { .. } => "assign",
            Self::PixelAssign { .. } => "pixel-assign",
            Self::Publish { .. } => "Publish",
            Self::Send { .. } => "Send",
            Self::Return { .. } => "return",
            Self::Expr { .. } => "expression",
            Self::If { .. } => "If",
            Self::While { .. } => "While",
            Self::For { .. } => "For",
        }
    }
}

/// Literal payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiteralValue {
    Int(i64),
    Str(Rc<str>),
    Bool(bool),
    None,
}

/// Binary operators, lowest precedence first in the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BinOp {
    /// `->`: Frame x 2-tuple -> pixel reference.
    #[strum(serialize = "->")]
    Pointer,
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "or")]
    Or,
    #[strum(serialize = "xor")]
    Xor,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "|")]
    BitOr,
    #[strum(serialize = "&")]
    BitAnd,
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum UnaryOp {
    #[strum(serialize = "not")]
    Not,
    #[strum(serialize = "~")]
    BitNot,
    #[strum(serialize = "-")]
    Neg,
}

/// An expression.
#[derive(Debug, Clone)]
pub enum Expr {
    Literal {
        value: LiteralValue,
        line: u32,
    },
    Var {
        name: Rc<str>,
        line: u32,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        line: u32,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        line: u32,
    },
    /// Postfix indexing `base < index >`.
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
        line: u32,
    },
    /// `Do name { args }`, `name { args }`, or a `Type ( )` constructor.
    Call {
        name: Rc<str>,
        args: Vec<Expr>,
        line: u32,
    },
    /// `( r g b )`
    Color {
        r: Box<Expr>,
        g: Box<Expr>,
        b: Box<Expr>,
        line: u32,
    },
    /// `( x y )`
    Pixel {
        x: Box<Expr>,
        y: Box<Expr>,
        line: u32,
    },
    /// `[ item item ... ]`
    List {
        items: Vec<Expr>,
        line: u32,
    },
    Paren {
        expr: Box<Expr>,
        line: u32,
    },
    /// `( name = expr )`: assigns through the environment chain and
    /// evaluates to the assigned value.
    WalrusAssign {
        name: Rc<str>,
        expr: Box<Expr>,
        line: u32,
    },
    /// `( Type name = expr )`: declares in the current environment and
    /// evaluates to the assigned value.
    WalrusDecl {
        type_name: TypeName,
        name: Rc<str>,
        expr: Box<Expr>,
        line: u32,
    },
}

impl Expr {
    /// The source line of the token that introduced this expression.
    #[must_use]
    pub fn line(&self) -> u32 {
        match self {
            Self::Literal { line, .. }
            | Self::Var { line, .. }
            | Self::Unary { line, .. }
            | Self::Binary { line, .. }
            | Self::Index { line, .. }
            | Self::Call { line, .. }
            | Self::Color { line, .. }
            | Self::Pixel { line, .. }
            | Self::List { line, .. }
            | Self::Paren { line, .. }
            | Self::WalrusAssign { line, .. }
            | Self::WalrusDecl { line, .. } => *line,
        }
    }
}
