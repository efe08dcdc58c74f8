#![forbid(unsafe_code)]

use std::fmt;

use miette::SourceSpan;

pub type Span = SourceSpan;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

impl<T> Spanned<T> {
    pub fn new(span: Span, node: T) -> Self {
        Self { span, node }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            span: self.span,
            node: f(self.node),
        }
    }
}

pub fn span(start: usize, len: usize) -> Span {
    SourceSpan::new(start.into(), len)
}

pub fn span_between(start: usize, end: usize) -> Span {
    debug_assert!(end >= start);
    span(start, end - start)
}

pub type Ident = Spanned<String>;

/// Identity of an expression or pattern node, unique within one parsed module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Index into a module's binding table, filled in by name resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub u32);

/// A module-qualified declaration name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualName {
    pub module: String,
    pub name: String,
}

impl QualName {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for QualName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Prim {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Str,
}

impl Prim {
    pub const ALL: [Prim; 11] = [
        Prim::I8,
        Prim::I16,
        Prim::I32,
        Prim::I64,
        Prim::U8,
        Prim::U16,
        Prim::U32,
        Prim::U64,
        Prim::F32,
        Prim::F64,
        Prim::Str,
    ];

    pub fn from_name(name: &str) -> Option<Prim> {
        Prim::ALL.into_iter().find(|p| p.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Prim::I8 => "I8",
            Prim::I16 => "I16",
            Prim::I32 => "I32",
            Prim::I64 => "I64",
            Prim::U8 => "U8",
            Prim::U16 => "U16",
            Prim::U32 => "U32",
            Prim::U64 => "U64",
            Prim::F32 => "F32",
            Prim::F64 => "F64",
            Prim::Str => "Str",
        }
    }

    pub fn is_integer(self) -> bool {
        self.int_bits().is_some()
    }

    pub fn is_float(self) -> bool {
        matches!(self, Prim::F32 | Prim::F64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Natural-number types usable as family lengths.
    pub fn is_unsigned(self) -> bool {
        matches!(self, Prim::U8 | Prim::U16 | Prim::U32 | Prim::U64)
    }

    pub fn int_bits(self) -> Option<u32> {
        match self {
            Prim::I8 | Prim::U8 => Some(8),
            Prim::I16 | Prim::U16 => Some(16),
            Prim::I32 | Prim::U32 => Some(32),
            Prim::I64 | Prim::U64 => Some(64),
            _ => None,
        }
    }
}

impl fmt::Display for Prim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn is_public(self) -> bool {
        matches!(self, Visibility::Public)
    }
}

/// `Name` or `Alias.Name`.
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    pub span: Span,
    pub qualifier: Option<Ident>,
    pub name: Ident,
}

impl Path {
    pub fn simple(name: Ident) -> Self {
        Self {
            span: name.span,
            qualifier: None,
            name,
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(q) = &self.qualifier {
            write!(f, "{}.", q.node)?;
        }
        f.write_str(&self.name.node)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Module {
    pub items: Vec<Item>,
}

impl Module {
    pub fn tests(&self) -> impl Iterator<Item = &TestBlock> {
        self.items.iter().filter_map(|item| match &item.kind {
            ItemKind::Test(t) => Some(t),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Item {
    pub span: Span,
    /// `doc "..."` lines preceding the declaration.
    pub docs: Vec<Spanned<String>>,
    pub kind: ItemKind,
}

impl Item {
    /// The declared name, for items that declare one.
    pub fn name(&self) -> Option<&Ident> {
        match &self.kind {
            ItemKind::Import(d) => Some(&d.alias),
            ItemKind::Type(d) => Some(&d.name),
            ItemKind::Signature(d) => Some(&d.name),
            ItemKind::Value(d) => Some(&d.name),
            ItemKind::Capability(d) => Some(&d.name),
            ItemKind::Implementation(_) | ItemKind::Test(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ItemKind {
    Import(ImportDecl),
    Type(TypeDecl),
    Signature(SignatureDecl),
    Value(ValueDecl),
    Capability(CapabilityDecl),
    Implementation(ImplDecl),
    Test(TestBlock),
}

/// `import Geo "geometry"`
#[derive(Clone, Debug, PartialEq)]
pub struct ImportDecl {
    pub span: Span,
    pub alias: Ident,
    pub path: Spanned<String>,
}

/// `typ [pub] Name params = body`
#[derive(Clone, Debug, PartialEq)]
pub struct TypeDecl {
    pub span: Span,
    pub vis: Visibility,
    pub name: Ident,
    pub params: Vec<TypeParam>,
    pub body: TypeBody,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeParam {
    /// `T`
    Type(Ident),
    /// `{len U32}`
    Value { span: Span, name: Ident, ty: TypeExpr },
}

impl TypeParam {
    pub fn name(&self) -> &Ident {
        match self {
            TypeParam::Type(name) => name,
            TypeParam::Value { name, .. } => name,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeBody {
    Alias(TypeExpr),
    /// `len : | 0 -> {} | len -> {T; Vec T {len (len sub 1)}}`
    LengthMatch(LengthMatch),
}

#[derive(Clone, Debug, PartialEq)]
pub struct LengthMatch {
    pub span: Span,
    pub scrutinee: Ident,
    pub arms: Vec<LengthArm>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LengthArm {
    pub span: Span,
    pub pattern: LengthPattern,
    pub body: TypeExpr,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LengthPattern {
    Literal(Spanned<u64>),
    Bind(Ident),
    Wildcard(Span),
}

/// `def [pub] name = Type [where A has Cap, ...]`
#[derive(Clone, Debug, PartialEq)]
pub struct SignatureDecl {
    pub span: Span,
    pub vis: Visibility,
    pub name: Ident,
    pub ty: TypeExpr,
    pub constraints: Vec<Constraint>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    pub span: Span,
    pub ty: TypeExpr,
    pub capability: Path,
    pub res: Option<QualName>,
}

/// `let [pub] name = expr` or the implicit `name = expr`.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueDecl {
    pub span: Span,
    pub vis: Visibility,
    pub explicit_let: bool,
    pub name: Ident,
    pub binding: Option<BindingId>,
    pub value: Expr,
}

/// `has [pub] Order = greater => Self -> Self -> Bool`
#[derive(Clone, Debug, PartialEq)]
pub struct CapabilityDecl {
    pub span: Span,
    pub vis: Visibility,
    pub name: Ident,
    pub ops: Vec<OpSig>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OpSig {
    pub span: Span,
    pub name: Ident,
    pub ty: TypeExpr,
    pub binding: Option<BindingId>,
}

/// `trait Order I64 = greater = a b -> a > b`
#[derive(Clone, Debug, PartialEq)]
pub struct ImplDecl {
    pub span: Span,
    pub capability: Path,
    pub capability_res: Option<QualName>,
    pub target: TypeExpr,
    pub members: Vec<ImplMember>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImplMember {
    pub span: Span,
    pub name: Ident,
    pub value: Expr,
}

/// `test "name" expr`; kept for an external test runner.
#[derive(Clone, Debug, PartialEq)]
pub struct TestBlock {
    pub span: Span,
    pub name: Spanned<String>,
    pub body: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeRes {
    Prim(Prim),
    Decl(QualName),
    Var(String),
    SelfType,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeExpr {
    pub span: Span,
    pub kind: TypeExprKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeExprKind {
    Named {
        path: Path,
        args: Vec<TypeArg>,
        res: Option<TypeRes>,
    },
    Tuple(Vec<TypeExpr>),
    /// A length-indexed family applied to an element type and a length.
    /// Produced by name resolution from `Named` uses of a family.
    DependentVec {
        family: Path,
        elem: Box<TypeExpr>,
        len: LengthArg,
        res: Option<QualName>,
    },
    Union(Vec<Variant>),
    Record(Vec<FieldType>),
    Function {
        params: Vec<TypeExpr>,
        ret: Box<TypeExpr>,
    },
    /// `[A]`
    List(Box<TypeExpr>),
    SelfType,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeArg {
    Type(TypeExpr),
    Length(LengthArg),
}

/// `{len}`, `{3}` or `{len (len sub 1)}`.
#[derive(Clone, Debug, PartialEq)]
pub struct LengthArg {
    pub span: Span,
    pub param: Option<Ident>,
    pub value: LengthExpr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Variant {
    pub span: Span,
    pub tag: Ident,
    pub payload: Option<TypeExpr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldType {
    pub span: Span,
    pub name: Ident,
    pub ty: TypeExpr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LengthExpr {
    pub span: Span,
    pub kind: LengthExprKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LengthExprKind {
    Lit(u64),
    Var(Ident),
    /// `len sub 1`, `len add 2`
    Apply {
        op: Ident,
        lhs: Box<LengthExpr>,
        rhs: Box<LengthExpr>,
    },
}

/// Union tag a constructor or pattern refers to.
#[derive(Clone, Debug, PartialEq)]
pub struct TagRes {
    pub ty: QualName,
    pub index: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Int(u64),
    Float(f64),
    Str(String),
    Var {
        path: Path,
        res: Option<BindingId>,
    },
    Tag {
        path: Path,
        payload: Option<Box<Expr>>,
        res: Option<TagRes>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Lambda {
        params: Vec<Param>,
        body: Box<Expr>,
    },
    Match {
        scrutinee: Box<Expr>,
        arms: Vec<MatchArm>,
    },
    Tuple(Vec<Expr>),
    Record(Vec<FieldInit>),
    List(Vec<Expr>),
    Field {
        base: Box<Expr>,
        field: Ident,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Block(Block),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub binding: Option<BindingId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MatchArm {
    pub span: Span,
    pub pattern: Pattern,
    pub body: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldInit {
    pub span: Span,
    pub name: Ident,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub items: Vec<BlockItem>,
    pub result: Box<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlockItem {
    pub span: Span,
    pub kind: BlockItemKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BlockItemKind {
    /// `let x = e` or `x = e`
    Let {
        name: Ident,
        binding: Option<BindingId>,
        value: Expr,
    },
    /// `x <- e`
    Bind {
        name: Ident,
        binding: Option<BindingId>,
        value: Expr,
    },
    Assert(Expr),
    Expr(Expr),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,

    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pattern {
    pub id: NodeId,
    pub span: Span,
    pub kind: PatternKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PatternKind {
    Wildcard,
    Binding {
        name: Ident,
        binding: Option<BindingId>,
    },
    Int {
        value: u64,
        negative: bool,
    },
    Float(f64),
    Str(String),
    /// `{first; rest}`, `{a; ..more}`
    Tuple {
        items: Vec<Pattern>,
        rest: Option<RestPattern>,
    },
    /// `{x p, y}`; a punned field holds a binding pattern of the same name.
    Record(Vec<FieldPattern>),
    Tag {
        path: Path,
        payload: Option<Box<Pattern>>,
        res: Option<TagRes>,
    },
    /// `[a, b, ..rest]`
    List {
        items: Vec<Pattern>,
        rest: Option<RestPattern>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct RestPattern {
    pub span: Span,
    pub name: Option<Ident>,
    pub binding: Option<BindingId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldPattern {
    pub span: Span,
    pub name: Ident,
    pub punned: bool,
    pub pattern: Pattern,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prim_names_round_trip() {
        for p in Prim::ALL {
            assert_eq!(Prim::from_name(p.name()), Some(p));
        }
        assert_eq!(Prim::from_name("Bool"), None);
    }

    #[test]
    fn prim_classes() {
        assert!(Prim::U32.is_unsigned());
        assert!(!Prim::I32.is_unsigned());
        assert!(Prim::F32.is_numeric() && !Prim::F32.is_integer());
        assert!(!Prim::Str.is_numeric());
        assert_eq!(Prim::I16.int_bits(), Some(16));
    }

    #[test]
    fn path_display_includes_qualifier() {
        let name = Ident::new(span(4, 5), "Point".to_string());
        let mut path = Path::simple(name);
        assert_eq!(path.to_string(), "Point");
        path.qualifier = Some(Ident::new(span(0, 3), "Geo".to_string()));
        assert_eq!(path.to_string(), "Geo.Point");
    }
}
