#![forbid(unsafe_code)]

use std::mem;

use sable_ast::{
    BinOp, Block, BlockItem, BlockItemKind, CapabilityDecl, Constraint, Expr, ExprKind, FieldInit,
    FieldPattern, FieldType, Ident, ImplDecl, ImplMember, ImportDecl, Item, ItemKind, LengthArg,
    LengthArm, LengthExpr, LengthExprKind, LengthMatch, LengthPattern, MatchArm, Module, NodeId,
    OpSig, Param, Path, Pattern, PatternKind, RestPattern, SignatureDecl, Span, Spanned,
    TestBlock, TypeArg, TypeBody, TypeDecl, TypeExpr, TypeExprKind, TypeParam, UnaryOp,
    ValueDecl, Variant, Visibility, span_between,
};
use sable_lex::{Token, TokenKind};

use crate::ParseConfig;
use crate::error::ParseError;

pub struct Parser<'a> {
    tokens: &'a [Token],
    idx: usize,
    config: ParseConfig,
    next_id: u32,
    /// Layout depth: `Indent`s minus `Dedent`s consumed so far.
    depth: usize,
    /// Syntactic nesting of expressions, types and patterns.
    nesting: usize,
    /// Inside braces or brackets, where commas separate elements instead of
    /// chaining calls.
    in_seq: bool,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self::new_with_config(tokens, &ParseConfig::default())
    }

    pub fn new_with_config(tokens: &'a [Token], config: &ParseConfig) -> Self {
        Self {
            tokens,
            idx: 0,
            config: config.clone(),
            next_id: 0,
            depth: 0,
            nesting: 0,
            in_seq: false,
        }
    }

    pub fn parse_module(&mut self) -> Result<Module, ParseError> {
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if self.at_end() {
                break;
            }
            items.push(self.parse_item()?);
        }
        Ok(Module { items })
    }

    /// Parse a module, resynchronizing at the next top-level declaration
    /// after each error.
    pub fn parse_module_with_recovery(&mut self) -> (Module, Vec<ParseError>) {
        let mut items = Vec::new();
        let mut errors = Vec::new();

        loop {
            self.skip_newlines();
            if self.at_end() {
                break;
            }
            match self.parse_item() {
                Ok(item) => items.push(item),
                Err(err) => {
                    errors.push(err);
                    self.nesting = 0;
                    self.recover_to_item_boundary();
                }
            }
        }

        (Module { items }, errors)
    }

    fn recover_to_item_boundary(&mut self) {
        while !self.at_end() {
            let Some(tok) = self.next() else { return };
            let boundary = matches!(tok.kind, TokenKind::Newline | TokenKind::Dedent);
            if boundary && self.depth == 0 && (self.at_item_start() || self.at_end()) {
                return;
            }
        }
    }

    fn at_item_start(&self) -> bool {
        match self.peek_kind() {
            Some(
                TokenKind::KwLet
                | TokenKind::KwTyp
                | TokenKind::KwDef
                | TokenKind::KwHas
                | TokenKind::KwTrait
                | TokenKind::KwTest
                | TokenKind::KwDoc
                | TokenKind::KwImport,
            ) => true,
            Some(TokenKind::Ident(_)) => matches!(self.peek_kind_n(1), Some(TokenKind::Eq)),
            _ => false,
        }
    }

    fn parse_item(&mut self) -> Result<Item, ParseError> {
        let start = self.peek_span();
        let mut docs = Vec::new();
        while self.at(TokenKind::KwDoc) {
            self.next();
            docs.push(self.expect_str()?);
            self.expect(TokenKind::Newline)?;
            self.skip_newlines();
        }

        let kind = match self.peek_kind() {
            Some(TokenKind::KwImport) => ItemKind::Import(self.parse_import()?),
            Some(TokenKind::KwTyp) => ItemKind::Type(self.parse_type_decl()?),
            Some(TokenKind::KwDef) => ItemKind::Signature(self.parse_signature()?),
            Some(TokenKind::KwLet) => ItemKind::Value(self.parse_value_decl()?),
            Some(TokenKind::KwHas) => ItemKind::Capability(self.parse_capability()?),
            Some(TokenKind::KwTrait) => ItemKind::Implementation(self.parse_impl()?),
            Some(TokenKind::KwTest) => ItemKind::Test(self.parse_test()?),
            Some(TokenKind::Ident(_)) if matches!(self.peek_kind_n(1), Some(TokenKind::Eq)) => {
                ItemKind::Value(self.parse_value_decl()?)
            }
            _ => return Err(self.error("a declaration")),
        };

        self.expect_item_end()?;
        let span = join(start, self.prev_span());
        Ok(Item { span, docs, kind })
    }

    fn expect_item_end(&mut self) -> Result<(), ParseError> {
        if self.at(TokenKind::Newline) {
            self.next();
            Ok(())
        } else if self.at_end() || self.prev_is(TokenKind::Dedent) {
            Ok(())
        } else {
            Err(self.error("end of declaration"))
        }
    }

    fn parse_import(&mut self) -> Result<ImportDecl, ParseError> {
        let start = self.expect(TokenKind::KwImport)?;
        let alias = self.expect_upper()?;
        let path = self.expect_str()?;
        Ok(ImportDecl {
            span: join(start.span, path.span),
            alias,
            path,
        })
    }

    fn parse_vis(&mut self) -> Visibility {
        if self.at(TokenKind::KwPub) {
            self.next();
            Visibility::Public
        } else {
            Visibility::Private
        }
    }

    fn parse_type_decl(&mut self) -> Result<TypeDecl, ParseError> {
        let start = self.expect(TokenKind::KwTyp)?;
        let vis = self.parse_vis();
        let name = self.expect_upper()?;

        let mut params = Vec::new();
        loop {
            if matches!(self.peek_kind(), Some(TokenKind::UpperIdent(_))) {
                params.push(TypeParam::Type(self.expect_upper()?));
            } else if self.at(TokenKind::LBrace) {
                let open = self.expect(TokenKind::LBrace)?;
                let pname = self.expect_ident()?;
                let ty = self.parse_type()?;
                let close = self.expect(TokenKind::RBrace)?;
                params.push(TypeParam::Value {
                    span: join(open.span, close.span),
                    name: pname,
                    ty,
                });
            } else {
                break;
            }
        }

        self.expect(TokenKind::Eq)?;
        let body = self.parse_body(|p| p.parse_type_body())?;
        Ok(TypeDecl {
            span: join(start.span, self.prev_span()),
            vis,
            name,
            params,
            body,
        })
    }

    fn parse_type_body(&mut self) -> Result<TypeBody, ParseError> {
        let is_length_match = matches!(self.peek_kind(), Some(TokenKind::Ident(_)))
            && matches!(self.peek_kind_n(1), Some(TokenKind::Colon));
        if !is_length_match {
            return Ok(TypeBody::Alias(self.parse_type()?));
        }

        let scrutinee = self.expect_ident()?;
        self.expect(TokenKind::Colon)?;
        let arms = self.parse_arms(|p| {
            let start = p.prev_span();
            let pattern = match p.peek_kind() {
                Some(TokenKind::Int(_)) => {
                    let tok = p.expect_any()?;
                    let TokenKind::Int(n) = tok.kind else {
                        return Err(p.error("a length pattern"));
                    };
                    LengthPattern::Literal(Spanned::new(tok.span, n))
                }
                Some(TokenKind::Ident(_)) => LengthPattern::Bind(p.expect_ident()?),
                Some(TokenKind::Underscore) => {
                    let tok = p.expect_any()?;
                    LengthPattern::Wildcard(tok.span)
                }
                _ => return Err(p.error("`0`, a length name or `_`")),
            };
            p.expect(TokenKind::Arrow)?;
            let body = p.parse_type()?;
            Ok(LengthArm {
                span: join(start, body.span),
                pattern,
                body,
            })
        })?;
        Ok(TypeBody::LengthMatch(LengthMatch {
            span: join(scrutinee.span, self.prev_span()),
            scrutinee,
            arms,
        }))
    }

    fn parse_signature(&mut self) -> Result<SignatureDecl, ParseError> {
        let start = self.expect(TokenKind::KwDef)?;
        let vis = self.parse_vis();
        let name = self.expect_ident()?;
        self.expect(TokenKind::Eq)?;
        let (ty, constraints) = self.parse_body(|p| {
            let ty = p.parse_type()?;
            let mut constraints = Vec::new();
            if p.at(TokenKind::KwWhere) {
                p.next();
                loop {
                    let cty = p.parse_type_atom()?;
                    p.expect(TokenKind::KwHas)?;
                    let capability = p.parse_upper_path()?;
                    constraints.push(Constraint {
                        span: join(cty.span, capability.span),
                        ty: cty,
                        capability,
                        res: None,
                    });
                    if !p.at(TokenKind::Comma) {
                        break;
                    }
                    p.next();
                }
            }
            Ok((ty, constraints))
        })?;
        Ok(SignatureDecl {
            span: join(start.span, self.prev_span()),
            vis,
            name,
            ty,
            constraints,
        })
    }

    fn parse_value_decl(&mut self) -> Result<ValueDecl, ParseError> {
        let start = self.peek_span();
        let explicit_let = self.at(TokenKind::KwLet);
        let vis = if explicit_let {
            self.next();
            self.parse_vis()
        } else {
            Visibility::Private
        };
        let name = self.expect_ident()?;
        self.expect(TokenKind::Eq)?;
        let value = self.parse_body(|p| p.parse_expr())?;
        Ok(ValueDecl {
            span: join(start, value.span),
            vis,
            explicit_let,
            name,
            binding: None,
            value,
        })
    }

    fn parse_capability(&mut self) -> Result<CapabilityDecl, ParseError> {
        let start = self.expect(TokenKind::KwHas)?;
        let vis = self.parse_vis();
        let name = self.expect_upper()?;
        self.expect(TokenKind::Eq)?;
        let ops = self.parse_members(|p| {
            let name = p.expect_ident()?;
            p.expect(TokenKind::FatArrow)?;
            let ty = p.parse_type()?;
            Ok(OpSig {
                span: join(name.span, ty.span),
                name,
                ty,
                binding: None,
            })
        })?;
        Ok(CapabilityDecl {
            span: join(start.span, self.prev_span()),
            vis,
            name,
            ops,
        })
    }

    fn parse_impl(&mut self) -> Result<ImplDecl, ParseError> {
        let start = self.expect(TokenKind::KwTrait)?;
        let capability = self.parse_upper_path()?;
        let target = self.parse_arm_type()?;
        self.expect(TokenKind::Eq)?;
        let members = self.parse_members(|p| {
            let name = p.expect_ident()?;
            p.expect(TokenKind::Eq)?;
            let value = p.parse_expr()?;
            Ok(ImplMember {
                span: join(name.span, value.span),
                name,
                value,
            })
        })?;
        Ok(ImplDecl {
            span: join(start.span, self.prev_span()),
            capability,
            capability_res: None,
            target,
            members,
        })
    }

    fn parse_test(&mut self) -> Result<TestBlock, ParseError> {
        let start = self.expect(TokenKind::KwTest)?;
        let name = self.expect_str()?;
        let body = self.parse_body(|p| p.parse_expr())?;
        Ok(TestBlock {
            span: join(start.span, body.span),
            name,
            body,
        })
    }

    /// `X` on the same line, or `X` alone in an indented block.
    fn parse_body<T>(
        &mut self,
        mut f: impl FnMut(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.at(TokenKind::Newline) && matches!(self.peek_kind_n(1), Some(TokenKind::Indent)) {
            self.next();
            self.next();
            let value = f(self)?;
            self.skip_newlines();
            self.expect(TokenKind::Dedent)?;
            Ok(value)
        } else {
            f(self)
        }
    }

    /// Members separated by `;` on one line, or one per line in an indented block.
    fn parse_members<T>(
        &mut self,
        mut f: impl FnMut(&mut Self) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        let mut members = Vec::new();
        if self.at(TokenKind::Newline) && matches!(self.peek_kind_n(1), Some(TokenKind::Indent)) {
            self.next();
            self.next();
            loop {
                self.skip_newlines();
                if self.at(TokenKind::Dedent) || self.at_end() {
                    break;
                }
                members.push(f(self)?);
                if self.at(TokenKind::Semi) {
                    self.next();
                }
            }
            self.expect(TokenKind::Dedent)?;
        } else {
            loop {
                members.push(f(self)?);
                if !self.at(TokenKind::Semi) {
                    break;
                }
                self.next();
            }
        }
        Ok(members)
    }

    /// `| a | b ...`, inline, continued on following lines, or indented.
    fn parse_arms<T>(
        &mut self,
        mut arm: impl FnMut(&mut Self) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        if self.at(TokenKind::Newline) && matches!(self.peek_kind_n(1), Some(TokenKind::Indent)) {
            self.next();
            self.next();
            let arms = self.parse_arm_list(&mut arm)?;
            self.skip_newlines();
            self.expect(TokenKind::Dedent)?;
            return Ok(arms);
        }
        if self.at(TokenKind::Newline) && matches!(self.peek_kind_n(1), Some(TokenKind::Pipe)) {
            self.next();
        }
        self.parse_arm_list(&mut arm)
    }

    fn parse_arm_list<T>(
        &mut self,
        arm: &mut impl FnMut(&mut Self) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        let mut arms = Vec::new();
        loop {
            self.expect(TokenKind::Pipe)?;
            arms.push(arm(self)?);
            if self.at(TokenKind::Pipe) {
                continue;
            }
            if self.at(TokenKind::Newline) && matches!(self.peek_kind_n(1), Some(TokenKind::Pipe)) {
                self.next();
                continue;
            }
            break;
        }
        Ok(arms)
    }

    // ---------------------------------------------------------------- types

    pub fn parse_type(&mut self) -> Result<TypeExpr, ParseError> {
        self.enter("a shallower type")?;
        let result = self.parse_function_type();
        self.nesting -= 1;
        result
    }

    pub fn parse_type_eof(&mut self) -> Result<TypeExpr, ParseError> {
        let ty = self.parse_type()?;
        self.skip_newlines();
        if !self.at_end() {
            return Err(self.error("end of input"));
        }
        Ok(ty)
    }

    fn parse_function_type(&mut self) -> Result<TypeExpr, ParseError> {
        let first = self.parse_arm_type()?;
        if !self.at(TokenKind::Arrow) {
            return Ok(first);
        }
        let mut parts = vec![first];
        while self.at(TokenKind::Arrow) {
            self.next();
            parts.push(self.parse_arm_type()?);
        }
        let start = parts[0].span;
        let ret = match parts.pop() {
            Some(ret) => ret,
            None => return Err(self.error("a type")),
        };
        Ok(TypeExpr {
            span: join(start, ret.span),
            kind: TypeExprKind::Function {
                params: parts,
                ret: Box::new(ret),
            },
        })
    }

    fn parse_arm_type(&mut self) -> Result<TypeExpr, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Pipe) => self.parse_union_type(),
            Some(TokenKind::UpperIdent(name)) if name != "Self" => {
                let path = self.parse_upper_path()?;
                let mut args = Vec::new();
                while self.at_type_arg_start() {
                    args.push(self.parse_type_arg()?);
                }
                Ok(TypeExpr {
                    span: join(path.span, self.prev_span()),
                    kind: TypeExprKind::Named {
                        path,
                        args,
                        res: None,
                    },
                })
            }
            _ => self.parse_type_atom(),
        }
    }

    fn parse_union_type(&mut self) -> Result<TypeExpr, ParseError> {
        let start = self.peek_span();
        let variants = self.parse_arms(|p| {
            let tag = p.expect_upper()?;
            let payload = if p.at_type_arg_start() {
                Some(p.parse_type_atom()?)
            } else {
                None
            };
            Ok(Variant {
                span: join(tag.span, p.prev_span()),
                tag,
                payload,
            })
        })?;
        Ok(TypeExpr {
            span: join(start, self.prev_span()),
            kind: TypeExprKind::Union(variants),
        })
    }

    fn at_type_arg_start(&self) -> bool {
        matches!(
            self.peek_kind(),
            Some(
                TokenKind::UpperIdent(_)
                    | TokenKind::LBrace
                    | TokenKind::LBracket
                    | TokenKind::LParen
            )
        )
    }

    fn parse_type_arg(&mut self) -> Result<TypeArg, ParseError> {
        if self.at(TokenKind::LBrace) && self.at_length_arg() {
            Ok(TypeArg::Length(self.parse_length_arg()?))
        } else {
            Ok(TypeArg::Type(self.parse_type_atom()?))
        }
    }

    /// `{3}`, `{n}`, `{len 3}`, `{(n sub 1)}`, `{len (len sub 1)}`; a brace
    /// holding a type starts with a capital, `{`, `[`, `|` or a parenthesized type.
    fn at_length_arg(&self) -> bool {
        let length_start = |n: usize| {
            matches!(
                self.peek_kind_n(n),
                Some(TokenKind::Int(_) | TokenKind::Ident(_))
            )
        };
        match self.peek_kind_n(1) {
            Some(TokenKind::Int(_)) => true,
            Some(TokenKind::LParen) => length_start(2),
            Some(TokenKind::Ident(_)) => match self.peek_kind_n(2) {
                Some(TokenKind::RBrace | TokenKind::Int(_) | TokenKind::Ident(_)) => true,
                Some(TokenKind::LParen) => length_start(3),
                _ => false,
            },
            _ => false,
        }
    }

    fn parse_length_arg(&mut self) -> Result<LengthArg, ParseError> {
        let open = self.expect(TokenKind::LBrace)?;
        // A length is an odd run of operands and operators, so an even run
        // leads with the parameter name: `{len sub 1}` vs `{len n sub 1}`.
        let units = self.length_arg_units();
        let named = matches!(self.peek_kind(), Some(TokenKind::Ident(_)))
            && units >= 2
            && units % 2 == 0;
        let param = if named { Some(self.expect_ident()?) } else { None };
        let value = self.parse_length_expr()?;
        let close = self.expect(TokenKind::RBrace)?;
        Ok(LengthArg {
            span: join(open.span, close.span),
            param,
            value,
        })
    }

    /// Top-level operands and operators up to the closing brace, with a
    /// parenthesized group counted once.
    fn length_arg_units(&self) -> usize {
        let mut units = 0;
        let mut parens = 0usize;
        let mut n = 0;
        loop {
            match self.peek_kind_n(n) {
                None => return units,
                Some(TokenKind::RBrace) if parens == 0 => return units,
                Some(TokenKind::LParen) => {
                    if parens == 0 {
                        units += 1;
                    }
                    parens += 1;
                }
                Some(TokenKind::RParen) => parens = parens.saturating_sub(1),
                Some(_) => {
                    if parens == 0 {
                        units += 1;
                    }
                }
            }
            n += 1;
        }
    }

    fn parse_length_expr(&mut self) -> Result<LengthExpr, ParseError> {
        let base = self.nesting;
        let mut lhs = self.parse_length_atom()?;
        while matches!(self.peek_kind(), Some(TokenKind::Ident(_))) {
            self.enter("a shorter length expression")?;
            let op = self.expect_ident()?;
            let rhs = self.parse_length_atom()?;
            lhs = LengthExpr {
                span: join(lhs.span, rhs.span),
                kind: LengthExprKind::Apply {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            };
        }
        self.nesting = base;
        Ok(lhs)
    }

    fn parse_length_atom(&mut self) -> Result<LengthExpr, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Int(_)) => {
                let tok = self.expect_any()?;
                let TokenKind::Int(n) = tok.kind else {
                    return Err(self.error("a length"));
                };
                Ok(LengthExpr {
                    span: tok.span,
                    kind: LengthExprKind::Lit(n),
                })
            }
            Some(TokenKind::Ident(_)) => {
                let name = self.expect_ident()?;
                Ok(LengthExpr {
                    span: name.span,
                    kind: LengthExprKind::Var(name),
                })
            }
            Some(TokenKind::LParen) => {
                self.enter("a shallower length expression")?;
                self.next();
                let inner = self.parse_length_expr()?;
                self.expect(TokenKind::RParen)?;
                self.nesting -= 1;
                Ok(inner)
            }
            _ => Err(self.error("a length")),
        }
    }

    fn parse_type_atom(&mut self) -> Result<TypeExpr, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::UpperIdent(name)) if name == "Self" => {
                let tok = self.expect_any()?;
                Ok(TypeExpr {
                    span: tok.span,
                    kind: TypeExprKind::SelfType,
                })
            }
            Some(TokenKind::UpperIdent(_)) => {
                let path = self.parse_upper_path()?;
                Ok(TypeExpr {
                    span: path.span,
                    kind: TypeExprKind::Named {
                        path,
                        args: Vec::new(),
                        res: None,
                    },
                })
            }
            Some(TokenKind::LBrace) => self.parse_brace_type(),
            Some(TokenKind::LBracket) => {
                let open = self.expect(TokenKind::LBracket)?;
                let elem = self.parse_type()?;
                let close = self.expect(TokenKind::RBracket)?;
                Ok(TypeExpr {
                    span: join(open.span, close.span),
                    kind: TypeExprKind::List(Box::new(elem)),
                })
            }
            Some(TokenKind::LParen) => {
                self.next();
                let inner = self.parse_type()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            _ => Err(self.error("a type")),
        }
    }

    fn parse_brace_type(&mut self) -> Result<TypeExpr, ParseError> {
        let open = self.expect(TokenKind::LBrace)?;
        if self.at(TokenKind::RBrace) {
            let close = self.expect(TokenKind::RBrace)?;
            return Ok(TypeExpr {
                span: join(open.span, close.span),
                kind: TypeExprKind::Tuple(Vec::new()),
            });
        }

        let kind = if matches!(self.peek_kind(), Some(TokenKind::Ident(_))) {
            let mut fields = Vec::new();
            loop {
                let name = self.expect_ident()?;
                let ty = self.parse_type()?;
                fields.push(FieldType {
                    span: join(name.span, ty.span),
                    name,
                    ty,
                });
                if !self.at(TokenKind::Comma) {
                    break;
                }
                self.next();
                if self.at(TokenKind::RBrace) {
                    break;
                }
            }
            TypeExprKind::Record(fields)
        } else {
            let mut items = Vec::new();
            loop {
                items.push(self.parse_type()?);
                if !self.at(TokenKind::Semi) {
                    break;
                }
                self.next();
                if self.at(TokenKind::RBrace) {
                    break;
                }
            }
            TypeExprKind::Tuple(items)
        };

        let close = self.expect(TokenKind::RBrace)?;
        Ok(TypeExpr {
            span: join(open.span, close.span),
            kind,
        })
    }

    fn parse_upper_path(&mut self) -> Result<Path, ParseError> {
        let first = self.expect_upper()?;
        if self.at(TokenKind::Dot) && matches!(self.peek_kind_n(1), Some(TokenKind::UpperIdent(_))) {
            self.next();
            let name = self.expect_upper()?;
            return Ok(Path {
                span: join(first.span, name.span),
                qualifier: Some(first),
                name,
            });
        }
        Ok(Path::simple(first))
    }

    // ---------------------------------------------------------- expressions

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.enter("a shallower expression")?;
        let result = self.parse_expr_inner();
        self.nesting -= 1;
        result
    }

    pub fn parse_expr_eof(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expr()?;
        self.skip_newlines();
        if !self.at_end() {
            return Err(self.error("end of input"));
        }
        Ok(expr)
    }

    fn parse_expr_inner(&mut self) -> Result<Expr, ParseError> {
        if self.at_lambda_start() {
            return self.parse_lambda();
        }
        let expr = self.parse_chain()?;
        if !self.at(TokenKind::Colon) {
            return Ok(expr);
        }

        self.next();
        let arms = self.parse_arms(|p| {
            let pattern = p.parse_pattern()?;
            p.expect(TokenKind::Arrow)?;
            let body = p.parse_body(|p| p.parse_arm_body())?;
            Ok(MatchArm {
                span: join(pattern.span, body.span),
                pattern,
                body,
            })
        })?;
        let span = join(expr.span, self.prev_span());
        Ok(self.mk_expr(
            span,
            ExprKind::Match {
                scrutinee: Box::new(expr),
                arms,
            },
        ))
    }

    /// Arm results may be lambdas or chains; a nested match needs parentheses.
    fn parse_arm_body(&mut self) -> Result<Expr, ParseError> {
        if self.at_lambda_start() {
            self.parse_lambda()
        } else {
            self.parse_chain()
        }
    }

    fn at_lambda_start(&self) -> bool {
        let mut n = 0;
        while matches!(self.peek_kind_n(n), Some(TokenKind::Ident(_))) {
            n += 1;
        }
        n > 0 && matches!(self.peek_kind_n(n), Some(TokenKind::Arrow))
    }

    fn parse_lambda(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_span();
        let mut params = Vec::new();
        while matches!(self.peek_kind(), Some(TokenKind::Ident(_))) {
            params.push(Param {
                name: self.expect_ident()?,
                binding: None,
            });
        }
        self.expect(TokenKind::Arrow)?;
        let body = self.parse_body(|p| p.parse_expr())?;
        let span = join(start, body.span);
        Ok(self.mk_expr(
            span,
            ExprKind::Lambda {
                params,
                body: Box::new(body),
            },
        ))
    }

    /// `x foo, bar b` is `bar(foo(x), b)`.
    fn parse_chain(&mut self) -> Result<Expr, ParseError> {
        let base = self.nesting;
        let mut acc = self.parse_cmp_expr()?;
        while !self.in_seq && self.at(TokenKind::Comma) {
            self.enter("a shorter call chain")?;
            self.next();
            let callee = self.parse_callee()?;
            let mut args = vec![acc];
            args.extend(self.parse_pipe_args()?);
            acc = self.mk_call(callee, args);
        }
        self.nesting = base;
        Ok(acc)
    }

    fn parse_cmp_expr(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_add_expr()?;
        let Some(op) = self.peek_cmp_op() else {
            return Ok(left);
        };
        self.next();
        let right = self.parse_add_expr()?;
        let expr = self.mk_binary(op, left, right);

        // Chained comparisons like `a < b < c` need parentheses.
        if self.peek_cmp_op().is_some() {
            return Err(self.error("end of comparison (chained comparisons need parentheses)"));
        }
        Ok(expr)
    }

    fn peek_cmp_op(&self) -> Option<BinOp> {
        match self.peek_kind() {
            Some(TokenKind::EqEq) => Some(BinOp::Eq),
            Some(TokenKind::Neq) => Some(BinOp::Ne),
            Some(TokenKind::Lt) => Some(BinOp::Lt),
            Some(TokenKind::Gt) => Some(BinOp::Gt),
            Some(TokenKind::Le) => Some(BinOp::Le),
            Some(TokenKind::Ge) => Some(BinOp::Ge),
            _ => None,
        }
    }

    /// Each operator deepens the tree, so a long run is charged against
    /// the nesting limit like a parenthesis would be.
    fn parse_add_expr(&mut self) -> Result<Expr, ParseError> {
        let base = self.nesting;
        let mut left = self.parse_mul_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinOp::Add,
                Some(TokenKind::Minus) => BinOp::Sub,
                _ => break,
            };
            self.enter("a shorter operator chain")?;
            self.next();
            let right = self.parse_mul_expr()?;
            left = self.mk_binary(op, left, right);
        }
        self.nesting = base;
        Ok(left)
    }

    fn parse_mul_expr(&mut self) -> Result<Expr, ParseError> {
        let base = self.nesting;
        let mut left = self.parse_unary_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinOp::Mul,
                Some(TokenKind::Slash) => BinOp::Div,
                Some(TokenKind::Percent) => BinOp::Rem,
                _ => break,
            };
            self.enter("a shorter operator chain")?;
            self.next();
            let right = self.parse_unary_expr()?;
            left = self.mk_binary(op, left, right);
        }
        self.nesting = base;
        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, ParseError> {
        if self.at(TokenKind::Minus) {
            self.enter("a shorter run of negations")?;
            let tok = self.expect_any()?;
            let expr = self.parse_unary_expr()?;
            self.nesting -= 1;
            let span = join(tok.span, expr.span);
            return Ok(self.mk_expr(
                span,
                ExprKind::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(expr),
                },
            ));
        }
        self.parse_pipe_expr()
    }

    /// `a f b c` is `f(a, b, c)`.
    fn parse_pipe_expr(&mut self) -> Result<Expr, ParseError> {
        let subject = self.parse_postfix_expr()?;
        if !self.at_callee_start() {
            return Ok(subject);
        }
        let callee = self.parse_callee()?;
        let mut args = vec![subject];
        args.extend(self.parse_pipe_args()?);
        Ok(self.mk_call(callee, args))
    }

    fn at_callee_start(&self) -> bool {
        match self.peek_kind() {
            Some(TokenKind::Ident(_)) => true,
            Some(TokenKind::UpperIdent(_)) => {
                matches!(self.peek_kind_n(1), Some(TokenKind::Dot))
                    && matches!(self.peek_kind_n(2), Some(TokenKind::Ident(_)))
            }
            _ => false,
        }
    }

    fn parse_callee(&mut self) -> Result<Expr, ParseError> {
        if !self.at_callee_start() {
            return Err(self.error("a function name"));
        }
        let path = if matches!(self.peek_kind(), Some(TokenKind::UpperIdent(_))) {
            let qualifier = self.expect_upper()?;
            self.expect(TokenKind::Dot)?;
            let name = self.expect_ident()?;
            Path {
                span: join(qualifier.span, name.span),
                qualifier: Some(qualifier),
                name,
            }
        } else {
            Path::simple(self.expect_ident()?)
        };
        Ok(self.mk_expr(path.span, ExprKind::Var { path, res: None }))
    }

    fn parse_pipe_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        while self.at_atom_start() {
            args.push(self.parse_postfix_expr()?);
        }
        Ok(args)
    }

    fn at_atom_start(&self) -> bool {
        matches!(
            self.peek_kind(),
            Some(
                TokenKind::Int(_)
                    | TokenKind::Float(_)
                    | TokenKind::Str(_)
                    | TokenKind::Ident(_)
                    | TokenKind::UpperIdent(_)
                    | TokenKind::LParen
                    | TokenKind::LBrace
                    | TokenKind::LBracket
            )
        )
    }

    fn parse_postfix_expr(&mut self) -> Result<Expr, ParseError> {
        let base = self.nesting;
        let mut expr = self.parse_primary_expr()?;
        while self.at(TokenKind::Dot) && matches!(self.peek_kind_n(1), Some(TokenKind::Ident(_))) {
            self.enter("a shorter field chain")?;
            self.next();
            let field = self.expect_ident()?;
            let span = join(expr.span, field.span);
            expr = self.mk_expr(
                span,
                ExprKind::Field {
                    base: Box::new(expr),
                    field,
                },
            );
        }
        self.nesting = base;
        Ok(expr)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, ParseError> {
        let Some(tok) = self.current() else {
            return Err(self.error("an expression"));
        };
        match &tok.kind {
            TokenKind::Int(n) => {
                let n = *n;
                self.next();
                Ok(self.mk_expr(tok.span, ExprKind::Int(n)))
            }
            TokenKind::Float(x) => {
                let x = *x;
                self.next();
                Ok(self.mk_expr(tok.span, ExprKind::Float(x)))
            }
            TokenKind::Str(s) => {
                let s = s.clone();
                self.next();
                Ok(self.mk_expr(tok.span, ExprKind::Str(s)))
            }
            TokenKind::Ident(_) => {
                let path = Path::simple(self.expect_ident()?);
                Ok(self.mk_expr(path.span, ExprKind::Var { path, res: None }))
            }
            TokenKind::UpperIdent(_) => self.parse_upper_expr(),
            TokenKind::LParen => {
                if matches!(self.peek_kind_n(1), Some(TokenKind::Newline)) {
                    return self.parse_block();
                }
                self.next();
                let saved = mem::replace(&mut self.in_seq, false);
                let inner = self.parse_expr();
                self.in_seq = saved;
                let inner = inner?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBrace => self.parse_brace_expr(),
            TokenKind::LBracket => self.parse_list_expr(),
            _ => Err(self.error("an expression")),
        }
    }

    /// `Geo.origin`, `Some x`, `Geo.Circle 1.0`.
    fn parse_upper_expr(&mut self) -> Result<Expr, ParseError> {
        let first = self.expect_upper()?;
        if self.at(TokenKind::Dot) && matches!(self.peek_kind_n(1), Some(TokenKind::Ident(_))) {
            self.next();
            let name = self.expect_ident()?;
            let path = Path {
                span: join(first.span, name.span),
                qualifier: Some(first),
                name,
            };
            return Ok(self.mk_expr(path.span, ExprKind::Var { path, res: None }));
        }

        let path = if self.at(TokenKind::Dot)
            && matches!(self.peek_kind_n(1), Some(TokenKind::UpperIdent(_)))
        {
            self.next();
            let name = self.expect_upper()?;
            Path {
                span: join(first.span, name.span),
                qualifier: Some(first),
                name,
            }
        } else {
            Path::simple(first)
        };

        let payload = if self.at_atom_start() {
            Some(Box::new(self.parse_postfix_expr()?))
        } else {
            None
        };
        let span = join(path.span, self.prev_span());
        Ok(self.mk_expr(
            span,
            ExprKind::Tag {
                path,
                payload,
                res: None,
            },
        ))
    }

    fn parse_block(&mut self) -> Result<Expr, ParseError> {
        let open = self.expect(TokenKind::LParen)?;
        self.expect(TokenKind::Newline)?;
        self.expect(TokenKind::Indent)?;
        let saved = mem::replace(&mut self.in_seq, false);
        let items = self.parse_block_items();
        self.in_seq = saved;
        let mut items = items?;
        self.expect(TokenKind::Dedent)?;
        let close = self.expect(TokenKind::RParen)?;
        let span = join(open.span, close.span);

        let result = match items.pop() {
            Some(BlockItem {
                kind: BlockItemKind::Expr(e),
                ..
            }) => e,
            Some(other) => {
                return Err(ParseError {
                    expected: "an expression at the end of the block".to_string(),
                    found: "a binding".to_string(),
                    span: other.span,
                });
            }
            None => return Err(self.error("a block item")),
        };
        Ok(self.mk_expr(
            span,
            ExprKind::Block(Block {
                items,
                result: Box::new(result),
            }),
        ))
    }

    fn parse_block_items(&mut self) -> Result<Vec<BlockItem>, ParseError> {
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if self.at(TokenKind::Dedent) || self.at_end() {
                break;
            }
            items.push(self.parse_block_item()?);
            if self.at(TokenKind::Newline) {
                continue;
            }
            if self.at(TokenKind::Dedent) || self.prev_is(TokenKind::Dedent) {
                if self.at(TokenKind::Dedent) {
                    break;
                }
                continue;
            }
            return Err(self.error("end of line"));
        }
        Ok(items)
    }

    fn parse_block_item(&mut self) -> Result<BlockItem, ParseError> {
        let start = self.peek_span();
        let kind = match (self.peek_kind(), self.peek_kind_n(1)) {
            (Some(TokenKind::KwLet), _) => {
                self.next();
                let name = self.expect_ident()?;
                self.expect(TokenKind::Eq)?;
                let value = self.parse_body(|p| p.parse_expr())?;
                BlockItemKind::Let {
                    name,
                    binding: None,
                    value,
                }
            }
            (Some(TokenKind::Ident(_)), Some(TokenKind::Eq)) => {
                let name = self.expect_ident()?;
                self.next();
                let value = self.parse_body(|p| p.parse_expr())?;
                BlockItemKind::Let {
                    name,
                    binding: None,
                    value,
                }
            }
            (Some(TokenKind::Ident(_)), Some(TokenKind::LeftArrow)) => {
                let name = self.expect_ident()?;
                self.next();
                let value = self.parse_body(|p| p.parse_expr())?;
                BlockItemKind::Bind {
                    name,
                    binding: None,
                    value,
                }
            }
            (Some(TokenKind::KwAssert), _) => {
                self.next();
                BlockItemKind::Assert(self.parse_expr()?)
            }
            _ => BlockItemKind::Expr(self.parse_expr()?),
        };
        Ok(BlockItem {
            span: join(start, self.prev_span()),
            kind,
        })
    }

    fn parse_brace_expr(&mut self) -> Result<Expr, ParseError> {
        let open = self.expect(TokenKind::LBrace)?;
        let saved = mem::replace(&mut self.in_seq, true);
        let kind = self.parse_brace_contents();
        self.in_seq = saved;
        let kind = kind?;
        let close = self.expect(TokenKind::RBrace)?;
        Ok(self.mk_expr(join(open.span, close.span), kind))
    }

    fn parse_brace_contents(&mut self) -> Result<ExprKind, ParseError> {
        if self.at(TokenKind::RBrace) {
            return Ok(ExprKind::Tuple(Vec::new()));
        }

        let is_record = matches!(self.peek_kind(), Some(TokenKind::Ident(_)))
            && self.scan_separator() == Some(TokenKind::Comma);
        if is_record {
            let mut fields = Vec::new();
            loop {
                let name = self.expect_ident()?;
                let value = if self.at(TokenKind::Comma) || self.at(TokenKind::RBrace) {
                    let path = Path::simple(name.clone());
                    self.mk_expr(name.span, ExprKind::Var { path, res: None })
                } else {
                    self.parse_expr()?
                };
                fields.push(FieldInit {
                    span: join(name.span, value.span),
                    name,
                    value,
                });
                if !self.at(TokenKind::Comma) {
                    break;
                }
                self.next();
                if self.at(TokenKind::RBrace) {
                    break;
                }
            }
            return Ok(ExprKind::Record(fields));
        }

        let mut items = Vec::new();
        loop {
            items.push(self.parse_expr()?);
            if !self.at(TokenKind::Semi) {
                break;
            }
            self.next();
            if self.at(TokenKind::RBrace) {
                break;
            }
        }
        Ok(ExprKind::Tuple(items))
    }

    /// First `;`, `,` or closing `}` at the current bracket depth.
    fn scan_separator(&self) -> Option<TokenKind> {
        let mut depth = 0usize;
        for tok in &self.tokens[self.idx.min(self.tokens.len())..] {
            match &tok.kind {
                TokenKind::LParen | TokenKind::LBrace | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBracket => depth = depth.saturating_sub(1),
                TokenKind::RBrace if depth == 0 => return Some(TokenKind::RBrace),
                TokenKind::RBrace => depth -= 1,
                TokenKind::Semi | TokenKind::Comma if depth == 0 => return Some(tok.kind.clone()),
                TokenKind::Eof => return None,
                _ => {}
            }
        }
        None
    }

    fn parse_list_expr(&mut self) -> Result<Expr, ParseError> {
        let open = self.expect(TokenKind::LBracket)?;
        let saved = mem::replace(&mut self.in_seq, true);
        let items = self.parse_list_items();
        self.in_seq = saved;
        let items = items?;
        let close = self.expect(TokenKind::RBracket)?;
        Ok(self.mk_expr(join(open.span, close.span), ExprKind::List(items)))
    }

    fn parse_list_items(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        while !self.at(TokenKind::RBracket) {
            items.push(self.parse_expr()?);
            if !self.at(TokenKind::Comma) {
                break;
            }
            self.next();
        }
        Ok(items)
    }

    // ------------------------------------------------------------- patterns

    pub fn parse_pattern(&mut self) -> Result<Pattern, ParseError> {
        self.enter("a shallower pattern")?;
        let result = self.parse_pattern_inner(true);
        self.nesting -= 1;
        result
    }

    fn parse_pattern_inner(&mut self, allow_payload: bool) -> Result<Pattern, ParseError> {
        let Some(tok) = self.current() else {
            return Err(self.error("a pattern"));
        };
        let kind = match &tok.kind {
            TokenKind::Underscore => {
                self.next();
                PatternKind::Wildcard
            }
            TokenKind::Minus => {
                self.next();
                let lit = self.expect_any()?;
                let kind = match lit.kind {
                    TokenKind::Int(value) => PatternKind::Int {
                        value,
                        negative: true,
                    },
                    TokenKind::Float(x) => PatternKind::Float(-x),
                    other => {
                        return Err(ParseError {
                            expected: "a number".to_string(),
                            found: other.to_string(),
                            span: lit.span,
                        });
                    }
                };
                return Ok(self.mk_pattern(join(tok.span, lit.span), kind));
            }
            TokenKind::Int(value) => {
                let value = *value;
                self.next();
                PatternKind::Int {
                    value,
                    negative: false,
                }
            }
            TokenKind::Float(x) => {
                let x = *x;
                self.next();
                PatternKind::Float(x)
            }
            TokenKind::Str(s) => {
                let s = s.clone();
                self.next();
                PatternKind::Str(s)
            }
            TokenKind::Ident(_) => PatternKind::Binding {
                name: self.expect_ident()?,
                binding: None,
            },
            TokenKind::UpperIdent(_) => {
                let path = self.parse_upper_path()?;
                let payload = if allow_payload && self.at_pattern_start() {
                    Some(Box::new(self.parse_pattern_inner(false)?))
                } else {
                    None
                };
                PatternKind::Tag {
                    path,
                    payload,
                    res: None,
                }
            }
            TokenKind::LParen => {
                self.next();
                let inner = self.parse_pattern()?;
                self.expect(TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::LBrace => return self.parse_brace_pattern(),
            TokenKind::LBracket => return self.parse_list_pattern(),
            _ => return Err(self.error("a pattern")),
        };
        Ok(self.mk_pattern(join(tok.span, self.prev_span()), kind))
    }

    fn at_pattern_start(&self) -> bool {
        matches!(
            self.peek_kind(),
            Some(
                TokenKind::Underscore
                    | TokenKind::Int(_)
                    | TokenKind::Float(_)
                    | TokenKind::Str(_)
                    | TokenKind::Ident(_)
                    | TokenKind::UpperIdent(_)
                    | TokenKind::LParen
                    | TokenKind::LBrace
                    | TokenKind::LBracket
            )
        )
    }

    fn parse_brace_pattern(&mut self) -> Result<Pattern, ParseError> {
        let open = self.expect(TokenKind::LBrace)?;
        if self.at(TokenKind::RBrace) {
            let close = self.expect_any()?;
            return Ok(self.mk_pattern(
                join(open.span, close.span),
                PatternKind::Tuple {
                    items: Vec::new(),
                    rest: None,
                },
            ));
        }

        let is_record = matches!(self.peek_kind(), Some(TokenKind::Ident(_)))
            && (self.scan_separator() == Some(TokenKind::Comma)
                || !matches!(
                    self.peek_kind_n(1),
                    Some(TokenKind::RBrace | TokenKind::Semi)
                ));

        let kind = if is_record {
            let mut fields = Vec::new();
            loop {
                let name = self.expect_ident()?;
                let (pattern, punned) = if self.at(TokenKind::Comma) || self.at(TokenKind::RBrace) {
                    let binding = PatternKind::Binding {
                        name: name.clone(),
                        binding: None,
                    };
                    (self.mk_pattern(name.span, binding), true)
                } else {
                    (self.parse_pattern()?, false)
                };
                fields.push(FieldPattern {
                    span: join(name.span, pattern.span),
                    name,
                    punned,
                    pattern,
                });
                if !self.at(TokenKind::Comma) {
                    break;
                }
                self.next();
                if self.at(TokenKind::RBrace) {
                    break;
                }
            }
            PatternKind::Record(fields)
        } else {
            let (items, rest) = self.parse_pattern_seq(TokenKind::Semi, TokenKind::RBrace)?;
            PatternKind::Tuple { items, rest }
        };

        let close = self.expect(TokenKind::RBrace)?;
        Ok(self.mk_pattern(join(open.span, close.span), kind))
    }

    fn parse_list_pattern(&mut self) -> Result<Pattern, ParseError> {
        let open = self.expect(TokenKind::LBracket)?;
        let (items, rest) = if self.at(TokenKind::RBracket) {
            (Vec::new(), None)
        } else {
            self.parse_pattern_seq(TokenKind::Comma, TokenKind::RBracket)?
        };
        let close = self.expect(TokenKind::RBracket)?;
        Ok(self.mk_pattern(
            join(open.span, close.span),
            PatternKind::List { items, rest },
        ))
    }

    /// Elements separated by `sep`, optionally ending in `..rest`.
    fn parse_pattern_seq(
        &mut self,
        sep: TokenKind,
        close: TokenKind,
    ) -> Result<(Vec<Pattern>, Option<RestPattern>), ParseError> {
        let mut items = Vec::new();
        loop {
            if self.at(TokenKind::DotDot) {
                let dots = self.expect_any()?;
                let name = if matches!(self.peek_kind(), Some(TokenKind::Ident(_))) {
                    Some(self.expect_ident()?)
                } else {
                    None
                };
                let span = join(dots.span, self.prev_span());
                if self.at(sep.clone()) {
                    self.next();
                }
                if !self.at(close.clone()) {
                    return Err(self.error(format!("{close} after a rest pattern")));
                }
                return Ok((
                    items,
                    Some(RestPattern {
                        span,
                        name,
                        binding: None,
                    }),
                ));
            }
            items.push(self.parse_pattern()?);
            if !self.at(sep.clone()) {
                break;
            }
            self.next();
            if self.at(close.clone()) {
                break;
            }
        }
        Ok((items, None))
    }

    // -------------------------------------------------------------- helpers

    fn mk_expr(&mut self, span: Span, kind: ExprKind) -> Expr {
        Expr {
            id: self.fresh_id(),
            span,
            kind,
        }
    }

    fn mk_pattern(&mut self, span: Span, kind: PatternKind) -> Pattern {
        Pattern {
            id: self.fresh_id(),
            span,
            kind,
        }
    }

    fn mk_call(&mut self, callee: Expr, args: Vec<Expr>) -> Expr {
        let start = args.first().map_or(callee.span, |a| a.span);
        let end = args.last().map_or(callee.span, |a| a.span);
        let span = join(join(start, callee.span), end);
        self.mk_expr(
            span,
            ExprKind::Call {
                callee: Box::new(callee),
                args,
            },
        )
    }

    fn mk_binary(&mut self, op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        let span = join(lhs.span, rhs.span);
        self.mk_expr(
            span,
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        )
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn enter(&mut self, expected: &str) -> Result<(), ParseError> {
        if self.nesting >= self.config.max_depth {
            return Err(self.error(expected));
        }
        self.nesting += 1;
        Ok(())
    }

    fn skip_newlines(&mut self) {
        while self.at(TokenKind::Newline) {
            self.next();
        }
    }

    fn expect_ident(&mut self) -> Result<Ident, ParseError> {
        if let Some(Token {
            kind: TokenKind::Ident(name),
            span,
            ..
        }) = self.current()
        {
            self.next();
            return Ok(Ident::new(*span, name.clone()));
        }
        Err(self.error("an identifier"))
    }

    fn expect_upper(&mut self) -> Result<Ident, ParseError> {
        if let Some(Token {
            kind: TokenKind::UpperIdent(name),
            span,
            ..
        }) = self.current()
        {
            self.next();
            return Ok(Ident::new(*span, name.clone()));
        }
        Err(self.error("a capitalized name"))
    }

    fn expect_str(&mut self) -> Result<Spanned<String>, ParseError> {
        if let Some(Token {
            kind: TokenKind::Str(s),
            span,
            ..
        }) = self.current()
        {
            self.next();
            return Ok(Spanned::new(*span, s.clone()));
        }
        Err(self.error("a string literal"))
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token, ParseError> {
        if self.at(expected.clone()) {
            self.expect_any()
        } else {
            Err(self.error(expected.to_string()))
        }
    }

    fn expect_any(&mut self) -> Result<Token, ParseError> {
        self.next().ok_or_else(|| self.error("more input"))
    }

    fn error(&self, expected: impl Into<String>) -> ParseError {
        let (found, span) = match self.current() {
            Some(tok) => (tok.kind.to_string(), tok.span),
            None => ("end of input".to_string(), self.prev_span()),
        };
        ParseError {
            expected: expected.into(),
            found,
            span,
        }
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind()
            .is_some_and(|k| mem::discriminant(k) == mem::discriminant(&kind))
    }

    fn at_end(&self) -> bool {
        matches!(self.peek_kind(), None | Some(TokenKind::Eof))
    }

    fn prev_is(&self, kind: TokenKind) -> bool {
        self.idx
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .is_some_and(|t| mem::discriminant(&t.kind) == mem::discriminant(&kind))
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.idx)?.clone();
        self.idx += 1;
        match tok.kind {
            TokenKind::Indent => self.depth += 1,
            TokenKind::Dedent => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }
        Some(tok)
    }

    fn current(&self) -> Option<&'a Token> {
        let tokens = self.tokens;
        tokens.get(self.idx)
    }

    fn peek_kind(&self) -> Option<&'a TokenKind> {
        self.current().map(|t| &t.kind)
    }

    fn peek_kind_n(&self, n: usize) -> Option<&'a TokenKind> {
        let tokens = self.tokens;
        tokens.get(self.idx + n).map(|t| &t.kind)
    }

    fn peek_span(&self) -> Span {
        self.current().map_or_else(|| self.prev_span(), |t| t.span)
    }

    fn prev_span(&self) -> Span {
        self.idx
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .or_else(|| self.tokens.first())
            .map_or_else(|| span_between(0, 0), |t| t.span)
    }
}

pub(crate) fn join(a: Span, b: Span) -> Span {
    let a0: usize = a.offset();
    let b0: usize = b.offset();
    let start = a0.min(b0);
    let end = (a0 + a.len()).max(b0 + b.len());
    span_between(start, end)
}
