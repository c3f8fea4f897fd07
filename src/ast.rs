//! Semantic AST types produced by the (external) Transformer contract.
//!
//! The core never parses source text. It consumes a `Code` value already
//! built from a raw parse tree by a Transformer (out of scope here, see
//! `spec.md` §1/§6). Everything in this module is the contract the
//! Transformer must honor.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde::Deserialize;

/// An immutable, shareable code body: an ordered sequence of expressions.
///
/// `expanded` tracks whether definition-time template expansion
/// (`inject`/`splice`) has already run, so re-running an already-expanded
/// `Code` is a no-op (`spec.md` §4.3, §8 "Template expansion idempotence").
///
/// Deserializes straight from the JSON array of expressions a Transformer
/// produces for the top-level `Code(nodes)` contract (`spec.md` §6); the
/// `expanded` flag always starts false for freshly ingested code.
#[derive(Debug, Deserialize)]
#[serde(from = "Vec<Expr>")]
pub struct CodeData {
    pub exprs: Vec<Expr>,
    pub expanded: Cell<bool>,
}

impl From<Vec<Expr>> for CodeData {
    fn from(exprs: Vec<Expr>) -> Self {
        Self {
            exprs,
            expanded: Cell::new(false),
        }
    }
}

impl CodeData {
    pub fn new(exprs: Vec<Expr>) -> Rc<Self> {
        Rc::new(Self {
            exprs,
            expanded: Cell::new(false),
        })
    }

    pub fn new_expanded(exprs: Vec<Expr>) -> Rc<Self> {
        Rc::new(Self {
            exprs,
            expanded: Cell::new(true),
        })
    }
}

/// One expression: a sequence of terms evaluated left-to-right, no
/// operator precedence (`spec.md` §4.3).
pub type Expr = Vec<Term>;

/// A single term in an expression.
///
/// Deserializes externally tagged (`{"Int": 5}`, `{"Path": {...}}`, ...),
/// one object key per variant, matching the term vocabulary of `spec.md`
/// §6's semantic AST contract.
#[derive(Debug, Clone, Deserialize)]
pub enum Term {
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    Str(Rc<str>),
    /// Raw template text of an interpolated string; rendering happens at
    /// evaluation time against the current lexical scope (`spec.md` §4.3).
    IString(Rc<str>),
    Bytes(Rc<[u8]>),
    Path(Rc<PathAst>),
    /// `(...)` — forces evaluation of the enclosed expressions, yielding the
    /// value of the last one.
    Group(Vec<Expr>),
    /// `#[...]` / `[...]` list literal — each inner expression is one item.
    ListLit(Vec<Expr>),
    /// `#{...}` code/dict literal body, tagged so the evaluator knows to
    /// treat assignments inside as forming a dict (`('dict', exprs)`).
    DictTag(Vec<Expr>),
    /// A bare `[ ... ]` code block literal (unevaluated `Code` value).
    CodeLit(Rc<CodeData>),
    SigLit(Rc<SigAst>),
    ByteStreamLit(Rc<ByteStreamAst>),
    /// `('multi-set', [SetPath, ...])` tuple marker.
    MultiSetTag(Vec<Rc<PathAst>>),
    /// `(inject X)` — substitutes the evaluated value of X verbatim at
    /// template-expansion time.
    Inject(Box<Expr>),
    /// `(splice X)` — splices a list/Code's expressions into the
    /// surrounding argument list or statement sequence.
    Splice(Box<Expr>),
    /// An already-evaluated runtime value carried verbatim through template
    /// expansion. Never produced by a Transformer (there's no wire shape
    /// for an arbitrary `Value`), only synthesized by `(inject X)` when `X`
    /// evaluates to something with no dedicated literal `Term`.
    #[serde(skip)]
    Opaque(crate::value::Value),
}

/// Segment singletons / structured segments within a path.
#[derive(Debug, Clone, Deserialize)]
pub enum Segment {
    Root,
    Parent,
    Pwd,
    Name(String),
    Index(Expr),
    Slice(Option<Expr>, Option<Expr>),
    Group(Vec<Expr>),
    FilterQuery(FilterPredicate),
}

/// The body of a `[ ... ]` path segment.
#[derive(Debug, Clone, Deserialize)]
pub enum FilterPredicate {
    /// `[ predicate-expr ]`
    Expr(Expr),
    /// Legacy operator-only form `[> 10]`, desugared to `[ > 10 ]` by
    /// evaluating `op` followed by `rhs` (if any) as a pipeline seeded with
    /// the item value (`spec.md` §4.2).
    Operator(String, Option<Expr>),
}

/// Which of the six path flavors a `PathAst` represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PathKind {
    Get,
    Set,
    Del,
    Piped,
    Post,
    MultiSet,
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Get => "GetPath",
            Self::Set => "SetPath",
            Self::Del => "DelPath",
            Self::Piped => "PipedPath",
            Self::Post => "PostPath",
            Self::MultiSet => "MultiSetPath",
        };
        f.write_str(s)
    }
}

/// A first-class path value/expression (`spec.md` §3).
///
/// `literal` marks a `PathLiteral` wrapper — a path that evaluates to
/// itself (the path value) rather than being resolved against a scope.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathAst {
    pub kind: PathKind,
    pub segments: Vec<Segment>,
    pub meta: Option<Vec<Expr>>,
    pub literal: bool,
    pub loc: Option<CodeLoc>,
}

impl Default for PathAst {
    fn default() -> Self {
        Self::new(PathKind::Get, Vec::new())
    }
}

impl PathAst {
    pub fn new(kind: PathKind, segments: Vec<Segment>) -> Self {
        Self {
            kind,
            segments,
            meta: None,
            literal: false,
            loc: None,
        }
    }

    /// Canonical textual form used for path value-equality/hashing
    /// (`spec.md` §3 invariants, §8 "Path equality").
    pub fn pformat(&self) -> String {
        let mut out = String::new();
        out.push_str(match self.kind {
            PathKind::Get => "",
            PathKind::Set => "set:",
            PathKind::Del => "del:",
            PathKind::Piped => "|",
            PathKind::Post => "post:",
            PathKind::MultiSet => "multiset:",
        });
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match seg {
                Segment::Root => out.push('/'),
                Segment::Parent => out.push_str(".."),
                Segment::Pwd => out.push('.'),
                Segment::Name(n) => out.push_str(n),
                Segment::Index(_) => out.push_str("[idx]"),
                Segment::Slice(_, _) => out.push_str("[slice]"),
                Segment::Group(_) => out.push_str("(group)"),
                Segment::FilterQuery(_) => out.push_str("[filter]"),
            }
        }
        if let Some(meta) = &self.meta {
            let _ = meta; // meta participates in equality via its evaluated form elsewhere
            out.push_str("#(meta)");
        }
        out
    }
}

/// Source location attached to a path/expression for error annotation
/// (`spec.md` §7).
#[derive(Debug, Clone, Deserialize)]
pub struct CodeLoc {
    pub line: u32,
    pub col: u32,
    pub text: String,
}

/// A signature literal (`spec.md` §3 Sig).
#[derive(Debug, Clone, Deserialize)]
pub struct SigAst {
    pub positional: Vec<String>,
    pub keywords: Vec<(String, Expr)>,
    pub rest: Option<String>,
    pub return_annotation: Option<Expr>,
}

/// Element type for a `ByteStream` packer literal (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ByteElemType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    B1,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ByteStreamAst {
    pub elem: ByteElemType,
    pub items: Vec<Expr>,
}
