//! Allow-list parser: turns tokens into [`Instruction`]s or rejects the plan.
//!
//! Grammar (one statement per line or `;`):
//!
//! ```text
//! statement := [NAME "="] expr
//! expr      := HANDLE "." METHOD "(" args ")" | HANDLE "." ATTRIBUTE
//!            | STRING | INT | "None" | "True" | "False" | NAME
//! args      := [arg ("," arg)* [","]]
//! arg       := [KEYWORD "="] STRING
//! ```
//!
//! `HANDLE` is the single bound graph identifier. Anything outside this grammar is
//! rejected with a reason naming the offending construct.

use std::collections::HashSet;

use super::lexer::{Token, TokenKind};
use super::PlanError;

/// Graph operation a plan may invoke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphCall {
    AddSearchNode { id: String, content: String },
    AddResponseNode { id: String },
    AddEdge { from: String, to: String },
    ReadNode { id: String },
}

/// Graph attribute a plan may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphAttribute {
    Nodes,
    AdjacencyList,
    ActiveTaskCount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Call(GraphCall),
    Attribute(GraphAttribute),
    Literal(Literal),
    /// A name bound by an earlier assignment in the same plan.
    Name(String),
}

/// One validated statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Plan-local name the value is bound to, for `name = expr`.
    pub target: Option<String>,
    pub expr: Expr,
}

struct MethodSpec {
    params: &'static [&'static str],
    required: usize,
}

fn method_spec(name: &str) -> Option<MethodSpec> {
    let spec = match name {
        "add_node" | "add_search_node" => MethodSpec {
            params: &["node_name", "node_content"],
            required: 2,
        },
        "add_response_node" => MethodSpec {
            params: &["node_name"],
            required: 0,
        },
        "add_edge" => MethodSpec {
            params: &["start_node", "end_node"],
            required: 2,
        },
        "node" | "read_node" => MethodSpec {
            params: &["node_name"],
            required: 1,
        },
        _ => return None,
    };
    Some(spec)
}

fn attribute(name: &str) -> Option<GraphAttribute> {
    match name {
        "nodes" => Some(GraphAttribute::Nodes),
        "adjacency_list" => Some(GraphAttribute::AdjacencyList),
        "n_active_tasks" | "active_task_count" => Some(GraphAttribute::ActiveTaskCount),
        _ => None,
    }
}

/// Rejection reason for reserved words that never appear in a valid plan.
fn keyword_violation(word: &str) -> Option<String> {
    let reason = match word {
        "import" | "from" => "import statements are not allowed",
        "def" | "class" | "lambda" | "async" => "function and class definitions are not allowed",
        "global" | "nonlocal" => "global and nonlocal statements are not allowed",
        "for" | "while" | "if" | "elif" | "else" | "with" | "try" | "except" | "finally"
        | "return" | "yield" | "del" | "pass" | "break" | "continue" | "raise" | "assert"
        | "await" => "control flow is not allowed",
        "and" | "or" | "not" | "is" | "in" => "invalid syntax: operators are not allowed",
        _ => return None,
    };
    Some(reason.to_string())
}

pub(crate) struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    handle: &'a str,
    bound: HashSet<String>,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(tokens: &'a [Token], handle: &'a str) -> Self {
        Self {
            tokens,
            pos: 0,
            handle,
            bound: HashSet::new(),
        }
    }

    pub(crate) fn parse(mut self) -> Result<Vec<Instruction>, PlanError> {
        let mut out = Vec::new();
        while !self.at_eof() {
            if self.peek_kind() == Some(&TokenKind::End) {
                self.pos += 1;
                continue;
            }
            out.push(self.statement()?);
            match self.peek_kind() {
                None | Some(TokenKind::End) => {}
                Some(other) => return Err(self.trailing_error(other.clone())),
            }
        }
        Ok(out)
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn next(&mut self) -> Option<TokenKind> {
        let kind = self.tokens.get(self.pos).map(|t| t.kind.clone());
        self.pos += 1;
        kind
    }

    fn statement(&mut self) -> Result<Instruction, PlanError> {
        if let (Some(TokenKind::Ident(name)), Some(TokenKind::Assign)) =
            (self.peek_kind(), self.peek_kind_at(1))
        {
            let name = name.clone();
            if let Some(reason) = keyword_violation(&name) {
                return Err(PlanError::unsafe_plan(reason));
            }
            if name == self.handle {
                return Err(PlanError::unsafe_plan(format!(
                    "cannot rebind graph handle '{}'",
                    name
                )));
            }
            self.pos += 2;
            let expr = self.expr()?;
            self.bound.insert(name.clone());
            return Ok(Instruction {
                target: Some(name),
                expr,
            });
        }
        let expr = self.expr()?;
        Ok(Instruction { target: None, expr })
    }

    fn expr(&mut self) -> Result<Expr, PlanError> {
        let line = self.line();
        let expr = match self.next() {
            Some(TokenKind::Str(s)) => Expr::Literal(Literal::Str(s)),
            Some(TokenKind::Int(n)) => Expr::Literal(Literal::Int(n)),
            Some(TokenKind::Ident(word)) => self.ident_expr(word, line)?,
            Some(TokenKind::Op(op)) if op == "-" => match self.next() {
                Some(TokenKind::Int(n)) => Expr::Literal(Literal::Int(-n)),
                _ => return Err(PlanError::syntax("operators are not allowed")),
            },
            Some(TokenKind::Open(_)) | Some(TokenKind::LParen) => {
                return Err(PlanError::syntax(format!(
                    "collection literals and grouping are not allowed (line {})",
                    line
                )))
            }
            Some(other) => {
                return Err(PlanError::syntax(format!(
                    "unexpected {} on line {}",
                    describe(&other),
                    line
                )))
            }
            None => return Err(PlanError::syntax("unexpected end of plan")),
        };
        Ok(expr)
    }

    fn ident_expr(&mut self, word: String, line: usize) -> Result<Expr, PlanError> {
        if let Some(reason) = keyword_violation(&word) {
            return Err(PlanError::unsafe_plan(reason));
        }
        match word.as_str() {
            "None" => return Ok(Expr::Literal(Literal::None)),
            "True" => return Ok(Expr::Literal(Literal::Bool(true))),
            "False" => return Ok(Expr::Literal(Literal::Bool(false))),
            _ => {}
        }

        match self.peek_kind() {
            Some(TokenKind::LParen) => {
                Err(PlanError::unsafe_plan("only graph method calls are allowed"))
            }
            Some(TokenKind::Dot) => {
                self.pos += 1;
                let member = match self.next() {
                    Some(TokenKind::Ident(m)) => m,
                    _ => {
                        return Err(PlanError::syntax(format!(
                            "expected a name after '.' on line {}",
                            line
                        )))
                    }
                };
                if self.peek_kind() == Some(&TokenKind::LParen) {
                    if word != self.handle {
                        return Err(PlanError::unsafe_plan("only graph method calls are allowed"));
                    }
                    let spec = method_spec(&member).ok_or_else(|| {
                        PlanError::unsafe_plan(format!("method '{}' is not allowed", member))
                    })?;
                    self.pos += 1;
                    let args = self.call_args(&member)?;
                    let call = bind_call(&member, &spec, args)?;
                    self.reject_trailer()?;
                    return Ok(Expr::Call(call));
                }
                if word != self.handle {
                    return Err(PlanError::unsafe_plan(format!(
                        "attribute '{}' is not allowed",
                        member
                    )));
                }
                let attr = attribute(&member).ok_or_else(|| {
                    PlanError::unsafe_plan(format!("attribute '{}' is not allowed", member))
                })?;
                self.reject_trailer()?;
                Ok(Expr::Attribute(attr))
            }
            _ => {
                if word == self.handle {
                    return Err(PlanError::syntax(format!(
                        "graph handle '{}' cannot be used as a value",
                        word
                    )));
                }
                if !self.bound.contains(&word) {
                    return Err(PlanError::syntax(format!(
                        "name '{}' is not defined (line {})",
                        word, line
                    )));
                }
                self.reject_trailer()?;
                Ok(Expr::Name(word))
            }
        }
    }

    /// Rejects chained access, subscripts and calls on results.
    fn reject_trailer(&self) -> Result<(), PlanError> {
        match self.peek_kind() {
            Some(TokenKind::Dot) => Err(PlanError::syntax("chained access is not allowed")),
            Some(TokenKind::Open('[')) => Err(PlanError::syntax("subscripts are not allowed")),
            Some(TokenKind::LParen) => {
                Err(PlanError::unsafe_plan("only graph method calls are allowed"))
            }
            _ => Ok(()),
        }
    }

    /// Parses `arg, arg, ...)` after the opening parenthesis.
    fn call_args(&mut self, method: &str) -> Result<Vec<(Option<String>, String)>, PlanError> {
        let mut args = Vec::new();
        loop {
            if self.peek_kind() == Some(&TokenKind::RParen) {
                self.pos += 1;
                return Ok(args);
            }
            let keyword = match (self.peek_kind(), self.peek_kind_at(1)) {
                (Some(TokenKind::Ident(k)), Some(TokenKind::Assign)) => {
                    let k = k.clone();
                    self.pos += 2;
                    Some(k)
                }
                _ => None,
            };
            let value = self.arg_value(method)?;
            args.push((keyword, value));
            match self.next() {
                Some(TokenKind::Comma) => {}
                Some(TokenKind::RParen) => return Ok(args),
                Some(other) => {
                    return Err(PlanError::syntax(format!(
                        "unexpected {} in arguments of {}",
                        describe(&other),
                        method
                    )))
                }
                None => return Err(PlanError::syntax("unexpected end of plan")),
            }
        }
    }

    fn arg_value(&mut self, method: &str) -> Result<String, PlanError> {
        if let Some(TokenKind::Str(s)) = self.peek_kind() {
            let s = s.clone();
            self.pos += 1;
            return Ok(s);
        }
        // Parse anything else as an expression first so nested violations get their own reason.
        self.expr()?;
        Err(PlanError::syntax(format!(
            "arguments of {} must be string literals",
            method
        )))
    }

    fn trailing_error(&self, kind: TokenKind) -> PlanError {
        match kind {
            TokenKind::Op(_) | TokenKind::Assign => PlanError::syntax("operators are not allowed"),
            TokenKind::Colon => PlanError::unsafe_plan("control flow is not allowed"),
            TokenKind::Ident(w) => match keyword_violation(&w) {
                Some(reason) => PlanError::unsafe_plan(reason),
                None => PlanError::syntax(format!(
                    "expected end of statement before '{}' on line {}",
                    w,
                    self.line()
                )),
            },
            other => PlanError::syntax(format!(
                "unexpected {} on line {}",
                describe(&other),
                self.line()
            )),
        }
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Ident(w) => format!("name '{}'", w),
        TokenKind::Str(_) => "string".to_string(),
        TokenKind::Int(n) => format!("number {}", n),
        TokenKind::LParen => "'('".to_string(),
        TokenKind::RParen => "')'".to_string(),
        TokenKind::Open(c) | TokenKind::Close(c) => format!("'{}'", c),
        TokenKind::Comma => "','".to_string(),
        TokenKind::Dot => "'.'".to_string(),
        TokenKind::Colon => "':'".to_string(),
        TokenKind::Assign => "'='".to_string(),
        TokenKind::Op(op) => format!("operator '{}'", op),
        TokenKind::End => "end of statement".to_string(),
    }
}

/// Maps positional/keyword arguments onto the method's parameters.
fn bind_call(
    method: &str,
    spec: &MethodSpec,
    args: Vec<(Option<String>, String)>,
) -> Result<GraphCall, PlanError> {
    let mut slots: Vec<Option<String>> = vec![None; spec.params.len()];
    let mut seen_keyword = false;
    for (position, (keyword, value)) in args.into_iter().enumerate() {
        let index = match keyword {
            Some(k) => {
                seen_keyword = true;
                spec.params.iter().position(|p| *p == k).ok_or_else(|| {
                    PlanError::syntax(format!("unexpected keyword argument '{}' for {}", k, method))
                })?
            }
            None if seen_keyword => {
                return Err(PlanError::syntax(
                    "positional argument follows keyword argument",
                ))
            }
            None if position >= spec.params.len() => {
                return Err(PlanError::syntax(format!(
                    "{} takes at most {} arguments",
                    method,
                    spec.params.len()
                )))
            }
            None => position,
        };
        if slots[index].is_some() {
            return Err(PlanError::syntax(format!(
                "multiple values for argument '{}' of {}",
                spec.params[index], method
            )));
        }
        slots[index] = Some(value);
    }
    for (index, slot) in slots.iter().enumerate().take(spec.required) {
        if slot.is_none() {
            return Err(PlanError::syntax(format!(
                "missing argument '{}' for {}",
                spec.params[index], method
            )));
        }
    }

    let mut values = slots.into_iter();
    let mut take = || values.next().flatten().unwrap_or_default();
    let call = match method {
        "add_node" | "add_search_node" => {
            let id = take();
            let content = take();
            GraphCall::AddSearchNode { id, content }
        }
        "add_response_node" => {
            let id = take();
            GraphCall::AddResponseNode {
                id: if id.is_empty() {
                    "response".to_string()
                } else {
                    id
                },
            }
        }
        "add_edge" => {
            let from = take();
            let to = take();
            GraphCall::AddEdge { from, to }
        }
        _ => GraphCall::ReadNode { id: take() },
    };
    Ok(call)
}
