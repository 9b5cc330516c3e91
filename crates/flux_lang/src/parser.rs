//! Parser for Flux
//!
//! Recursive descent over the token stream produced by the lexer. Block
//! parsers tolerate unknown fields by skipping them to the next statement
//! boundary; anything unknown at the top level of `document { ... }` is a
//! hard error.
//!
//! Expression precedence, loosest first:
//! `or -> and -> equality -> comparison -> term -> factor -> unary -> postfix -> primary`

use std::collections::BTreeMap;

use crate::ast::*;
use crate::diagnostic::{ParseError, Span, SyntaxError};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::value::Value;

/// Parse a complete document
pub fn parse_document(source: &str) -> Result<FluxDocument, SyntaxError> {
    let tokens = Lexer::new(source).tokenize()?;
    let document = Parser::new(tokens).parse_document()?;
    Ok(document)
}

/// Parse a standalone expression
pub fn parse_expression(source: &str) -> Result<Expr, SyntaxError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser::new(tokens);
    let expr = parser.expression()?;
    if !parser.is_at_end() {
        return Err(parser.error("Unexpected trailing input").into());
    }
    Ok(expr)
}

/// Parse a duration string such as `"5s"` or `"250ms"` into `(amount, unit)`
pub fn parse_duration_str(text: &str) -> Option<(f64, DurationUnit)> {
    let text = text.trim();
    let split = text.find(|c: char| c.is_alphabetic())?;
    let (amount, unit) = text.split_at(split);
    let amount: f64 = amount.trim().parse().ok()?;
    let unit = DurationUnit::from_name(unit.trim())?;
    Some((amount, unit))
}

/// Parser for Flux
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    /// Create a new parser; the token stream must end with `Eof`
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut tokens = tokens;
        if !matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Eof)) {
            let (line, column) = tokens.last().map(|t| (t.line, t.column)).unwrap_or((1, 1));
            tokens.push(Token::new(TokenKind::Eof, "<eof>", line, column));
        }
        Self { tokens, current: 0 }
    }

    // === Document ===

    pub fn parse_document(&mut self) -> Result<FluxDocument, ParseError> {
        self.expect_keyword("document", "Expected 'document'")?;
        self.consume(&TokenKind::LBrace, "Expected '{' after 'document'")?;

        let mut doc = FluxDocument::default();

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let token = self.peek().clone();
            match token.ident() {
                Some("meta") => {
                    self.advance();
                    self.meta_block(&mut doc.meta)?;
                }
                Some("state") => {
                    self.advance();
                    let params = self.state_block()?;
                    doc.state.params.extend(params);
                }
                Some("pageConfig") => {
                    self.advance();
                    doc.page_config = Some(self.page_config_block()?);
                }
                Some("grid") => {
                    self.advance();
                    doc.grids.push(self.grid_decl(token.span())?);
                }
                Some("rule") => {
                    self.advance();
                    doc.rules.push(self.rule_decl(token.span())?);
                }
                Some("runtime") => {
                    self.advance();
                    doc.runtime = Some(self.runtime_block(token.span())?);
                }
                Some("body") => {
                    self.advance();
                    doc.body = Some(self.body_block()?);
                }
                Some("assets") => {
                    self.advance();
                    self.assets_block(&mut doc)?;
                }
                Some("materials") => {
                    self.advance();
                    self.materials_block(&mut doc)?;
                }
                _ => return Err(self.error("Unknown top-level construct")),
            }
        }

        self.consume(&TokenKind::RBrace, "Expected '}' to close 'document'")?;
        if !self.is_at_end() {
            return Err(self.error("Unexpected input after document"));
        }

        log::debug!(
            "Parsed document: {} params, {} grids, {} rules, {} top-level nodes",
            doc.state.params.len(),
            doc.grids.len(),
            doc.rules.len(),
            doc.body.as_ref().map(Vec::len).unwrap_or(0)
        );

        Ok(doc)
    }

    fn meta_block(&mut self, meta: &mut BTreeMap<String, String>) -> Result<(), ParseError> {
        self.consume(&TokenKind::LBrace, "Expected '{' after 'meta'")?;
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if !self.is_field_assignment() {
                self.skip_field("meta");
                continue;
            }
            let key = self.consume_ident("Expected meta key")?;
            self.consume(&TokenKind::Eq, "Expected '=' after meta key")?;
            let value = self.constant()?;
            self.consume(&TokenKind::Semicolon, "Expected ';' after meta value")?;
            meta.insert(key, value.to_display_string());
        }
        self.consume(&TokenKind::RBrace, "Expected '}' to close 'meta'")?;
        Ok(())
    }

    // === State ===

    fn state_block(&mut self) -> Result<Vec<ParamDecl>, ParseError> {
        self.consume(&TokenKind::LBrace, "Expected '{' after 'state'")?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.check_ident("param") {
                params.push(self.param_decl()?);
            } else {
                self.skip_field("state");
            }
        }
        self.consume(&TokenKind::RBrace, "Expected '}' to close 'state'")?;
        Ok(params)
    }

    /// `param name: type [min, max] @ initial;`
    fn param_decl(&mut self) -> Result<ParamDecl, ParseError> {
        let span = self.advance().span();
        let name = self.consume_ident("Expected parameter name")?;
        self.consume(&TokenKind::Colon, "Expected ':' after parameter name")?;

        let type_token = self.peek().clone();
        let type_name = self.consume_ident("Expected parameter type")?;
        let param_type = ParamType::from_name(&type_name)
            .ok_or_else(|| self.error_at(&type_token, format!("Unknown parameter type '{}'", type_name)))?;

        let range = if self.match_token(&TokenKind::LBracket) {
            let min = self.signed_number()?;
            self.consume(&TokenKind::Comma, "Expected ',' between range bounds")?;
            let max = self.signed_number()?;
            self.consume(&TokenKind::RBracket, "Expected ']' after range")?;
            if !matches!(param_type, ParamType::Int | ParamType::Float) {
                return Err(self.error_at(&type_token, format!("Range is only valid on numeric parameters, '{}' is {}", name, type_name)));
            }
            Some(ParamRange { min, max })
        } else {
            None
        };

        self.consume(&TokenKind::At, "Expected '@' before initial value")?;
        let initial_token = self.peek().clone();
        let initial = self.constant()?;
        let initial = coerce_initial(param_type, initial)
            .ok_or_else(|| self.error_at(&initial_token, format!("Initial value does not match type {} of '{}'", type_name, name)))?;
        self.consume(&TokenKind::Semicolon, "Expected ';' after parameter declaration")?;

        Ok(ParamDecl {
            name,
            param_type,
            range,
            initial,
            span,
        })
    }

    // === Page config ===

    fn page_config_block(&mut self) -> Result<PageConfig, ParseError> {
        self.consume(&TokenKind::LBrace, "Expected '{' after 'pageConfig'")?;
        let mut config = PageConfig::default();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.check_ident("size") && self.peek_at(1).kind == TokenKind::LBrace {
                self.advance();
                let fields = self.object_block()?;
                let number = |key: &str| fields.get(key).and_then(Value::as_f64).unwrap_or(0.0);
                config.size = Some(PageSize {
                    width: number("width"),
                    height: number("height"),
                    units: fields.get("units")
                        .map(Value::to_display_string)
                        .unwrap_or_else(|| "mm".to_string()),
                });
            } else {
                self.skip_field("pageConfig");
            }
        }
        self.consume(&TokenKind::RBrace, "Expected '}' to close 'pageConfig'")?;
        Ok(config)
    }

    // === Grids ===

    fn grid_decl(&mut self, span: Span) -> Result<FluxGrid, ParseError> {
        let name = self.consume_name("Expected grid name")?;
        self.consume(&TokenKind::LBrace, "Expected '{' after grid name")?;

        let mut grid = FluxGrid {
            name,
            topology: Topology::Grid,
            page: None,
            rows: None,
            cols: None,
            cells: Vec::new(),
            span,
        };

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let field = self.peek().clone();
            match field.ident() {
                Some("topology") if self.is_field_assignment() => {
                    self.advance();
                    self.advance();
                    let topology_token = self.peek().clone();
                    let topology = self.constant()?.to_display_string();
                    grid.topology = Topology::from_name(&topology)
                        .ok_or_else(|| self.error_at(&topology_token, format!("Unknown topology '{}'", topology)))?;
                    self.consume(&TokenKind::Semicolon, "Expected ';' after topology")?;
                }
                Some("page") if self.is_field_assignment() => {
                    self.advance();
                    self.advance();
                    grid.page = Some(self.integer()?);
                    self.consume(&TokenKind::Semicolon, "Expected ';' after page")?;
                }
                Some("rows") if self.is_field_assignment() => {
                    self.advance();
                    self.advance();
                    grid.rows = Some(self.dimension()?);
                    self.consume(&TokenKind::Semicolon, "Expected ';' after rows")?;
                }
                Some("cols") if self.is_field_assignment() => {
                    self.advance();
                    self.advance();
                    grid.cols = Some(self.dimension()?);
                    self.consume(&TokenKind::Semicolon, "Expected ';' after cols")?;
                }
                Some("size") if self.peek_at(1).kind == TokenKind::LBrace => {
                    self.advance();
                    self.advance();
                    while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
                        if self.check_ident("rows") && self.is_field_assignment() {
                            self.advance();
                            self.advance();
                            grid.rows = Some(self.dimension()?);
                            self.consume(&TokenKind::Semicolon, "Expected ';' after rows")?;
                        } else if self.check_ident("cols") && self.is_field_assignment() {
                            self.advance();
                            self.advance();
                            grid.cols = Some(self.dimension()?);
                            self.consume(&TokenKind::Semicolon, "Expected ';' after cols")?;
                        } else {
                            self.skip_field("grid size");
                        }
                    }
                    self.consume(&TokenKind::RBrace, "Expected '}' to close 'size'")?;
                }
                Some("cell") if self.peek_at(2).kind == TokenKind::LBrace => {
                    self.advance();
                    grid.cells.push(self.cell_decl()?);
                }
                _ => self.skip_field("grid"),
            }
        }

        self.consume(&TokenKind::RBrace, "Expected '}' to close grid")?;
        Ok(grid)
    }

    fn cell_decl(&mut self) -> Result<FluxCell, ParseError> {
        let id = self.consume_name("Expected cell id")?;
        self.consume(&TokenKind::LBrace, "Expected '{' after cell id")?;

        let mut cell = FluxCell {
            id,
            ..FluxCell::default()
        };

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if !self.is_field_assignment() {
                self.skip_field("cell");
                continue;
            }
            let field = self.peek().ident().map(str::to_string);
            match field.as_deref() {
                Some("tags") => {
                    self.advance();
                    self.advance();
                    cell.tags = self.tag_list()?;
                }
                Some("content") => {
                    self.advance();
                    self.advance();
                    cell.content = self.constant()?.to_display_string();
                }
                Some(numeric @ ("dynamic" | "density" | "salience")) => {
                    let numeric = numeric.to_string();
                    self.advance();
                    self.advance();
                    let value = self.signed_number()?;
                    match numeric.as_str() {
                        "dynamic" => cell.dynamic = value,
                        "density" => cell.density = value,
                        _ => cell.salience = value,
                    }
                }
                _ => {
                    self.skip_field("cell");
                    continue;
                }
            }
            self.consume(&TokenKind::Semicolon, "Expected ';' after cell field")?;
        }

        self.consume(&TokenKind::RBrace, "Expected '}' to close cell")?;
        Ok(cell)
    }

    // === Rules ===

    /// `rule name(header) { when <expr> then <stmts> [else <stmts>] }`
    fn rule_decl(&mut self, span: Span) -> Result<FluxRule, ParseError> {
        let name = self.consume_name("Expected rule name")?;

        let mut mode = RuleMode::Docstep;
        let mut scope = RuleScope::default();
        let mut on_event_type = None;

        if self.match_token(&TokenKind::LParen) {
            while !self.check(&TokenKind::RParen) && !self.is_at_end() {
                let key_token = self.peek().clone();
                let key = self.consume_ident("Expected rule header key")?;
                self.consume(&TokenKind::Eq, "Expected '=' after rule header key")?;
                let value_token = self.peek().clone();
                let value = self.constant()?.to_display_string();
                match key.as_str() {
                    "mode" => {
                        mode = RuleMode::from_name(&value)
                            .ok_or_else(|| self.error_at(&value_token, format!("Unknown rule mode '{}'", value)))?;
                    }
                    "grid" | "scope" => scope.grid = Some(value),
                    "on" | "event" | "onEventType" => on_event_type = Some(value),
                    _ => {
                        log::warn!("Ignoring unknown rule header '{}' at {}", key, key_token.span());
                    }
                }
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            self.consume(&TokenKind::RParen, "Expected ')' after rule header")?;
        }

        self.consume(&TokenKind::LBrace, "Expected '{' before rule body")?;
        self.expect_keyword("when", "Rule body requires 'when'")?;
        let condition = self.expression()?;
        self.expect_keyword("then", "Rule body requires 'then' after the condition")?;
        let then_branch = self.branch()?;
        let else_branch = if self.match_ident("else") {
            self.branch()?
        } else {
            Vec::new()
        };
        self.consume(&TokenKind::RBrace, "Expected '}' to close rule")?;

        Ok(FluxRule {
            name,
            mode,
            scope,
            on_event_type,
            condition,
            then_branch,
            else_branch,
            span,
        })
    }

    fn branch(&mut self) -> Result<Vec<Stmt>, ParseError> {
        if self.match_token(&TokenKind::LBrace) {
            let mut statements = Vec::new();
            while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
                statements.push(self.statement()?);
            }
            self.consume(&TokenKind::RBrace, "Expected '}' after branch")?;
            Ok(statements)
        } else {
            Ok(vec![self.statement()?])
        }
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        let span = self.peek().span();

        if self.check_ident("let") && matches!(self.peek_at(1).kind, TokenKind::Ident(_)) {
            self.advance();
            let name = self.consume_ident("Expected variable name")?;
            self.consume(&TokenKind::Eq, "Expected '=' after variable name")?;
            let value = self.expression()?;
            self.consume(&TokenKind::Semicolon, "Expected ';' after let statement")?;
            return Ok(Stmt::Let { name, value, span });
        }

        if self.check_ident("advanceDocstep") && self.peek_at(1).kind == TokenKind::LParen {
            self.advance();
            self.advance();
            self.consume(&TokenKind::RParen, "Expected ')' after 'advanceDocstep('")?;
            self.consume(&TokenKind::Semicolon, "Expected ';' after advanceDocstep()")?;
            return Ok(Stmt::AdvanceDocstep { span });
        }

        let target_token = self.peek().clone();
        let target = self.expression()?;
        self.consume(&TokenKind::Eq, "Expected '=' in assignment")?;
        if !matches!(target, Expr::Identifier { .. } | Expr::Member { .. }) {
            return Err(self.error_at(&target_token, "Invalid assignment target"));
        }
        let value = self.expression()?;
        self.consume(&TokenKind::Semicolon, "Expected ';' after assignment")?;

        Ok(Stmt::Assign { target, value, span })
    }

    // === Runtime ===

    fn runtime_block(&mut self, span: Span) -> Result<RuntimeConfig, ParseError> {
        self.consume(&TokenKind::LBrace, "Expected '{' after 'runtime'")?;
        let mut config = RuntimeConfig {
            span,
            ..RuntimeConfig::default()
        };

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.check_ident("eventsApply") && self.is_field_assignment() {
                self.advance();
                self.advance();
                config.events_apply = Some(self.constant()?.to_display_string());
                self.consume(&TokenKind::Semicolon, "Expected ';' after eventsApply")?;
            } else if self.check_ident("docstepAdvance") && self.is_field_assignment() {
                self.advance();
                self.advance();
                self.consume(&TokenKind::LBracket, "Expected '[' to open docstepAdvance")?;
                while !self.check(&TokenKind::RBracket) && !self.is_at_end() {
                    let entry = self.peek().clone();
                    if entry.is_ident("timer") {
                        self.advance();
                        self.consume(&TokenKind::LParen, "Expected '(' after 'timer'")?;
                        let duration = self.duration()?;
                        self.consume(&TokenKind::RParen, "Expected ')' after timer duration")?;
                        config.docstep_advance.push(DocstepAdvance::Timer {
                            duration,
                            span: entry.span(),
                        });
                    } else {
                        return Err(self.error_at(&entry, "Unknown docstepAdvance entry"));
                    }
                    if !self.match_token(&TokenKind::Comma) {
                        break;
                    }
                }
                self.consume(&TokenKind::RBracket, "Expected ']' to close docstepAdvance")?;
                self.consume(&TokenKind::Semicolon, "Expected ';' after docstepAdvance")?;
            } else {
                self.skip_field("runtime");
            }
        }

        self.consume(&TokenKind::RBrace, "Expected '}' to close 'runtime'")?;
        Ok(config)
    }

    /// Amount and unit as written, without normalisation
    fn duration_parts(&mut self) -> Result<(f64, DurationUnit), ParseError> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::String(text) => {
                self.advance();
                parse_duration_str(text)
                    .ok_or_else(|| self.error_at(&token, format!("Invalid duration '{}'", text)))
            }
            TokenKind::Int(_) | TokenKind::Float(_) => {
                let amount = self.signed_number()?;
                self.match_token(&TokenKind::Comma);
                let unit_token = self.peek().clone();
                let unit = match &unit_token.kind {
                    TokenKind::Ident(name) | TokenKind::String(name) => name.clone(),
                    _ => return Err(self.error_at(&unit_token, "Expected duration unit")),
                };
                self.advance();
                let unit = DurationUnit::from_name(&unit)
                    .ok_or_else(|| self.error_at(&unit_token, format!("Unknown duration unit '{}'", unit)))?;
                Ok((amount, unit))
            }
            _ => Err(self.error_at(&token, "Expected duration")),
        }
    }

    fn duration(&mut self) -> Result<Duration, ParseError> {
        let (amount, unit) = self.duration_parts()?;
        Ok(Duration::new(amount, unit))
    }

    // === Content tree ===

    fn body_block(&mut self) -> Result<Vec<DocumentNode>, ParseError> {
        self.consume(&TokenKind::LBrace, "Expected '{' after 'body'")?;
        let mut nodes = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.is_node_start() {
                nodes.push(self.node()?);
            } else {
                self.skip_field("body");
            }
        }
        self.consume(&TokenKind::RBrace, "Expected '}' to close 'body'")?;
        Ok(nodes)
    }

    /// `kind id {` starts a child node
    fn is_node_start(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Ident(_))
            && matches!(self.peek_at(1).kind, TokenKind::Ident(_) | TokenKind::String(_))
            && self.peek_at(2).kind == TokenKind::LBrace
    }

    fn node(&mut self) -> Result<DocumentNode, ParseError> {
        let span = self.peek().span();
        let kind = self.consume_ident("Expected node kind")?;
        let id = self.consume_name("Expected node id")?;
        self.consume(&TokenKind::LBrace, "Expected '{' after node id")?;

        let mut node = DocumentNode::new(kind, id);
        node.span = span;

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.is_node_start() {
                node.children.push(self.node()?);
                continue;
            }
            if !self.is_field_assignment() {
                self.skip_field(&node.kind);
                continue;
            }

            let field = self.consume_ident("Expected property name")?;
            self.advance();
            match field.as_str() {
                "refresh" => node.refresh = Some(self.refresh_policy()?),
                "transition" => node.transition = Some(self.transition()?),
                _ => {
                    let value = self.prop_value()?;
                    node.props.insert(field, value);
                }
            }
            self.consume(&TokenKind::Semicolon, "Expected ';' after property")?;
        }

        self.consume(&TokenKind::RBrace, "Expected '}' to close node")?;
        Ok(node)
    }

    fn prop_value(&mut self) -> Result<NodePropValue, ParseError> {
        if self.match_token(&TokenKind::At) {
            return Ok(NodePropValue::Dynamic(self.expression()?));
        }
        let expr = self.expression()?;
        if let Expr::Identifier { name } = &expr {
            return Ok(NodePropValue::Literal(Value::String(name.clone())));
        }
        Ok(match expr.as_constant() {
            Some(value) => NodePropValue::Literal(value),
            None => NodePropValue::Dynamic(expr),
        })
    }

    fn refresh_policy(&mut self) -> Result<RefreshPolicy, ParseError> {
        let token = self.peek().clone();
        let name = match &token.kind {
            TokenKind::Ident(name) | TokenKind::String(name) => name.clone(),
            _ => return Err(self.error_at(&token, "Expected refresh policy")),
        };
        self.advance();

        match name.as_str() {
            "onLoad" | "load" => Ok(RefreshPolicy::OnLoad),
            "never" => Ok(RefreshPolicy::Never),
            "docstep" | "onDocstep" => Ok(RefreshPolicy::OnDocstep),
            "every" => {
                self.consume(&TokenKind::LParen, "Expected '(' after 'every'")?;
                let (amount, unit) = self.duration_parts()?;
                self.consume(&TokenKind::RParen, "Expected ')' after refresh interval")?;
                Ok(RefreshPolicy::Every { amount, unit })
            }
            _ => Err(self.error_at(&token, format!("Unknown refresh policy '{}'", name))),
        }
    }

    /// `none`, `fade`, or `fade(300ms, ease = "inOut")`
    fn transition(&mut self) -> Result<Transition, ParseError> {
        let kind = self.consume_name("Expected transition kind")?;
        let mut transition = Transition {
            kind,
            duration: None,
            ease: None,
        };

        if self.match_token(&TokenKind::LParen) {
            while !self.check(&TokenKind::RParen) && !self.is_at_end() {
                if self.check_ident("ease") && self.peek_at(1).kind == TokenKind::Eq {
                    self.advance();
                    self.advance();
                    transition.ease = Some(self.constant()?.to_display_string());
                } else {
                    transition.duration = Some(self.duration()?);
                }
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            self.consume(&TokenKind::RParen, "Expected ')' after transition arguments")?;
        }

        Ok(transition)
    }

    // === Assets and materials ===

    fn assets_block(&mut self, doc: &mut FluxDocument) -> Result<(), ParseError> {
        self.consume(&TokenKind::LBrace, "Expected '{' after 'assets'")?;
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let token = self.peek().clone();
            if token.is_ident("asset") && self.peek_at(2).kind == TokenKind::LBrace {
                self.advance();
                doc.assets.push(self.asset_decl(token.span())?);
            } else if token.is_ident("bank") && self.peek_at(2).kind == TokenKind::LBrace {
                self.advance();
                doc.banks.push(self.bank_decl(token.span())?);
            } else {
                self.skip_field("assets");
            }
        }
        self.consume(&TokenKind::RBrace, "Expected '}' to close 'assets'")?;
        Ok(())
    }

    fn asset_decl(&mut self, span: Span) -> Result<AssetDecl, ParseError> {
        let name_token = self.peek().clone();
        let name = self.consume_name("Expected asset name")?;
        self.consume(&TokenKind::LBrace, "Expected '{' after asset name")?;

        let mut kind = "file".to_string();
        let mut path = None;
        let mut tags = Vec::new();
        let mut weight = 1.0;
        let mut meta = BTreeMap::new();

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.check_ident("meta") && self.peek_at(1).kind == TokenKind::LBrace {
                self.advance();
                meta = self.object_block()?;
                continue;
            }
            if !self.is_field_assignment() {
                self.skip_field("asset");
                continue;
            }
            let field = self.peek().ident().unwrap_or_default().to_string();
            match field.as_str() {
                "kind" | "path" | "tags" | "weight" => {
                    self.advance();
                    self.advance();
                }
                _ => {
                    self.skip_field("asset");
                    continue;
                }
            }
            match field.as_str() {
                "kind" => kind = self.constant()?.to_display_string(),
                "path" => path = Some(self.constant()?.to_display_string()),
                "tags" => tags = self.tag_list()?,
                _ => weight = self.signed_number()?,
            }
            self.consume(&TokenKind::Semicolon, "Expected ';' after asset field")?;
        }
        self.consume(&TokenKind::RBrace, "Expected '}' to close asset")?;

        let path = path.ok_or_else(|| self.error_at(&name_token, format!("Asset '{}' is missing 'path'", name)))?;
        Ok(AssetDecl { name, kind, path, tags, weight, meta, span })
    }

    fn bank_decl(&mut self, span: Span) -> Result<BankDecl, ParseError> {
        let name_token = self.peek().clone();
        let name = self.consume_name("Expected bank name")?;
        self.consume(&TokenKind::LBrace, "Expected '{' after bank name")?;

        let mut kind = "file".to_string();
        let mut root = None;
        let mut include = "**/*".to_string();
        let mut tags = Vec::new();
        let mut weight = 1.0;

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if !self.is_field_assignment() {
                self.skip_field("bank");
                continue;
            }
            let field = self.peek().ident().unwrap_or_default().to_string();
            match field.as_str() {
                "kind" | "root" | "include" | "tags" | "weight" => {
                    self.advance();
                    self.advance();
                }
                _ => {
                    self.skip_field("bank");
                    continue;
                }
            }
            match field.as_str() {
                "kind" => kind = self.constant()?.to_display_string(),
                "root" => root = Some(self.constant()?.to_display_string()),
                "include" => include = self.constant()?.to_display_string(),
                "tags" => tags = self.tag_list()?,
                _ => weight = self.signed_number()?,
            }
            self.consume(&TokenKind::Semicolon, "Expected ';' after bank field")?;
        }
        self.consume(&TokenKind::RBrace, "Expected '}' to close bank")?;

        let root = root.ok_or_else(|| self.error_at(&name_token, format!("Bank '{}' is missing 'root'", name)))?;
        Ok(BankDecl { name, kind, root, include, tags, weight, span })
    }

    fn materials_block(&mut self, doc: &mut FluxDocument) -> Result<(), ParseError> {
        self.consume(&TokenKind::LBrace, "Expected '{' after 'materials'")?;
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let token = self.peek().clone();
            if token.is_ident("material") && self.peek_at(2).kind == TokenKind::LBrace {
                self.advance();
                doc.materials.push(self.material_decl(token.span())?);
            } else {
                self.skip_field("materials");
            }
        }
        self.consume(&TokenKind::RBrace, "Expected '}' to close 'materials'")?;
        Ok(())
    }

    fn material_decl(&mut self, span: Span) -> Result<MaterialDecl, ParseError> {
        let name = self.consume_name("Expected material name")?;
        self.consume(&TokenKind::LBrace, "Expected '{' after material name")?;

        let mut material = MaterialDecl {
            name,
            material_kind: String::new(),
            tags: Vec::new(),
            weight: 1.0,
            label: None,
            color: None,
            score: None,
            midi: None,
            video: None,
            span,
        };

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let field = self.peek().ident().unwrap_or_default().to_string();
            if self.peek_at(1).kind == TokenKind::LBrace {
                match field.as_str() {
                    "score" | "midi" | "video" => {
                        self.advance();
                        let payload = Some(self.object_block()?);
                        match field.as_str() {
                            "score" => material.score = payload,
                            "midi" => material.midi = payload,
                            _ => material.video = payload,
                        }
                    }
                    _ => self.skip_field("material"),
                }
                continue;
            }
            if !self.is_field_assignment() {
                self.skip_field("material");
                continue;
            }
            match field.as_str() {
                "kind" | "tags" | "weight" | "label" | "color" => {
                    self.advance();
                    self.advance();
                }
                _ => {
                    self.skip_field("material");
                    continue;
                }
            }
            match field.as_str() {
                "kind" => material.material_kind = self.constant()?.to_display_string(),
                "tags" => material.tags = self.tag_list()?,
                "weight" => material.weight = self.signed_number()?,
                "label" => material.label = Some(self.constant()?.to_display_string()),
                _ => material.color = Some(self.constant()?.to_display_string()),
            }
            self.consume(&TokenKind::Semicolon, "Expected ';' after material field")?;
        }
        self.consume(&TokenKind::RBrace, "Expected '}' to close material")?;

        if material.material_kind.is_empty() {
            material.material_kind = if material.score.is_some() {
                "score"
            } else if material.midi.is_some() {
                "midi"
            } else if material.video.is_some() {
                "video"
            } else {
                "generic"
            }
            .to_string();
        }

        Ok(material)
    }

    // === Shared value helpers ===

    /// `{ key = constant; nested { ... } }` as an object
    fn object_block(&mut self) -> Result<BTreeMap<String, Value>, ParseError> {
        self.consume(&TokenKind::LBrace, "Expected '{'")?;
        let mut fields = BTreeMap::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if matches!(self.peek().kind, TokenKind::Ident(_)) && self.peek_at(1).kind == TokenKind::LBrace {
                let key = self.consume_ident("Expected key")?;
                let nested = self.object_block()?;
                fields.insert(key, Value::Object(nested));
                continue;
            }
            if !self.is_field_assignment() {
                self.skip_field("object");
                continue;
            }
            let key = self.consume_ident("Expected key")?;
            self.advance();
            let value = self.constant()?;
            self.consume(&TokenKind::Semicolon, "Expected ';' after value")?;
            fields.insert(key, value);
        }
        self.consume(&TokenKind::RBrace, "Expected '}'")?;
        Ok(fields)
    }

    /// `[a, "b", c]` where bare identifiers are tag names
    fn tag_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.consume(&TokenKind::LBracket, "Expected '[' to open tag list")?;
        let mut tags = Vec::new();
        while !self.check(&TokenKind::RBracket) && !self.is_at_end() {
            tags.push(self.consume_name("Expected tag")?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.consume(&TokenKind::RBracket, "Expected ']' to close tag list")?;
        Ok(tags)
    }

    /// A constant expression; bare identifiers read as strings
    fn constant(&mut self) -> Result<Value, ParseError> {
        let token = self.peek().clone();
        let expr = self.expression()?;
        if let Expr::Identifier { name } = &expr {
            return Ok(Value::String(name.clone()));
        }
        expr.as_constant()
            .ok_or_else(|| self.error_at(&token, "Expected a constant value"))
    }

    fn signed_number(&mut self) -> Result<f64, ParseError> {
        let negative = self.match_token(&TokenKind::Minus);
        let token = self.peek().clone();
        let value = match token.kind {
            TokenKind::Int(n) => n as f64,
            TokenKind::Float(f) => f,
            TokenKind::Inf => f64::INFINITY,
            _ => return Err(self.error_at(&token, "Expected number")),
        };
        self.advance();
        Ok(if negative { -value } else { value })
    }

    fn integer(&mut self) -> Result<i64, ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Int(n) => {
                self.advance();
                Ok(n)
            }
            _ => Err(self.error_at(&token, "Expected integer")),
        }
    }

    fn dimension(&mut self) -> Result<usize, ParseError> {
        let token = self.peek().clone();
        let value = self.integer()?;
        usize::try_from(value)
            .map_err(|_| self.error_at(&token, "Grid dimensions must be non-negative"))
    }

    // === Expression parsing ===

    pub fn expression(&mut self) -> Result<Expr, ParseError> {
        self.or()
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.and()?;
        while self.match_token(&TokenKind::Or) || self.match_ident("or") {
            let right = self.and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.equality()?;
        while self.match_token(&TokenKind::And) || self.match_ident("and") {
            let right = self.equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::EqEqEq => BinaryOp::StrictEq,
                TokenKind::BangEq => BinaryOp::Ne,
                TokenKind::BangEqEq => BinaryOp::StrictNe,
                _ => break,
            };
            self.advance();
            let right = self.comparison()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::LtEq => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::GtEq => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.term()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.factor()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.factor()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.match_token(&TokenKind::Bang) || self.match_ident("not") {
            let operand = self.unary()?;
            return Ok(Expr::Unary { op: UnaryOp::Not, operand: Box::new(operand) });
        }
        if self.match_token(&TokenKind::Minus) {
            let operand = self.unary()?;
            return Ok(Expr::Unary { op: UnaryOp::Neg, operand: Box::new(operand) });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let span = self.peek().span();
        let mut expr = self.primary()?;

        loop {
            if self.match_token(&TokenKind::LParen) {
                let args = self.arguments()?;
                expr = match expr {
                    Expr::Member { object, property }
                        if matches!(object.as_ref(), Expr::Identifier { name } if name == "neighbors") =>
                    {
                        Expr::NeighborsCall { method: property, args, span }
                    }
                    callee => Expr::Call { callee: Box::new(callee), args, span },
                };
            } else if self.match_token(&TokenKind::Dot) {
                let property = self.consume_ident("Expected property name after '.'")?;
                expr = Expr::Member { object: Box::new(expr), property };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.expression()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(&TokenKind::RParen, "Expected ')' after arguments")?;
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek().clone();
        let expr = match token.kind {
            TokenKind::Int(n) => Expr::literal(n),
            TokenKind::Float(f) => Expr::literal(f),
            TokenKind::String(s) => Expr::literal(s),
            TokenKind::Bool(b) => Expr::literal(b),
            TokenKind::Inf => Expr::literal(f64::INFINITY),
            TokenKind::Ident(name) if name == "null" => Expr::Literal { value: Value::Null },
            TokenKind::Ident(name) => Expr::ident(name),
            TokenKind::LParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(&TokenKind::RParen, "Expected ')' after expression")?;
                return Ok(expr);
            }
            TokenKind::LBracket => {
                self.advance();
                return self.list_literal();
            }
            TokenKind::Eof => return Err(self.error("Unexpected end of input")),
            _ => return Err(self.error("Expected expression")),
        };
        self.advance();
        Ok(expr)
    }

    fn list_literal(&mut self) -> Result<Expr, ParseError> {
        let mut items = Vec::new();
        while !self.check(&TokenKind::RBracket) && !self.is_at_end() {
            items.push(self.expression()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.consume(&TokenKind::RBracket, "Expected ']' after list elements")?;
        Ok(Expr::List { items })
    }

    // === Recovery ===

    /// Skip an unknown field up to the next `;` or the enclosing block's `}`.
    ///
    /// A field that opens its own `{ ... }` block ends with that block.
    fn skip_field(&mut self, block: &str) {
        let start = self.peek().clone();
        log::warn!("Skipping unknown field '{}' in {} at {}", start.lexeme, block, start.span());

        let mut depth = 0usize;
        while !self.is_at_end() {
            match self.peek().kind {
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::RBrace if depth == 0 => return,
                TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                TokenKind::RParen | TokenKind::RBracket => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.advance();
        }
    }

    // === Helper methods ===

    fn is_field_assignment(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Ident(_)) && self.peek_at(1).kind == TokenKind::Eq
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let index = (self.current + offset).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    pub fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn check_ident(&self, name: &str) -> bool {
        self.peek().is_ident(name)
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_ident(&mut self, name: &str) -> bool {
        if self.check_ident(name) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: &TokenKind, message: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(message))
        }
    }

    fn consume_ident(&mut self, message: &str) -> Result<String, ParseError> {
        match self.peek().ident() {
            Some(name) => {
                let name = name.to_string();
                self.advance();
                Ok(name)
            }
            None => Err(self.error(message)),
        }
    }

    /// Identifier or string literal used as a name
    fn consume_name(&mut self, message: &str) -> Result<String, ParseError> {
        match &self.peek().kind {
            TokenKind::Ident(name) | TokenKind::String(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error(message)),
        }
    }

    fn expect_keyword(&mut self, keyword: &str, message: &str) -> Result<(), ParseError> {
        if self.match_ident(keyword) {
            Ok(())
        } else {
            Err(self.error(message))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        self.error_at(self.peek(), message)
    }

    fn error_at(&self, token: &Token, message: impl Into<String>) -> ParseError {
        ParseError::new(token.line, token.column, token.lexeme.clone(), message)
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Check an initial value against its declared type, widening ints to floats
fn coerce_initial(param_type: ParamType, value: Value) -> Option<Value> {
    match (param_type, value) {
        (ParamType::Int, Value::Int(n)) => Some(Value::Int(n)),
        (ParamType::Float, Value::Int(n)) => Some(Value::Float(n as f64)),
        (ParamType::Float, Value::Float(f)) => Some(Value::Float(f)),
        (ParamType::Bool, Value::Bool(b)) => Some(Value::Bool(b)),
        (ParamType::String, Value::String(s)) => Some(Value::String(s)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(source: &str) -> Expr {
        parse_expression(source).unwrap()
    }

    fn doc(body: &str) -> FluxDocument {
        parse_document(&format!("document {{ {} }}", body)).unwrap()
    }

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 == 7 parses as (1 + (2 * 3)) == 7
        match expr("1 + 2 * 3 == 7") {
            Expr::Binary { op: BinaryOp::Eq, left, .. } => {
                assert!(matches!(*left, Expr::Binary { op: BinaryOp::Add, .. }));
            }
            other => panic!("Expected equality, got {:?}", other),
        }
    }

    #[test]
    fn test_word_operators() {
        match expr("a and not b or c") {
            Expr::Binary { op: BinaryOp::Or, left, .. } => {
                assert!(matches!(*left, Expr::Binary { op: BinaryOp::And, .. }));
            }
            other => panic!("Expected or, got {:?}", other),
        }
    }

    #[test]
    fn test_neighbors_call_is_distinct() {
        match expr("neighbors.all().dynamic > 0.5") {
            Expr::Binary { left, .. } => match *left {
                Expr::Member { object, property } => {
                    assert_eq!(property, "dynamic");
                    assert!(matches!(*object, Expr::NeighborsCall { ref method, .. } if method == "all"));
                }
                other => panic!("Expected member, got {:?}", other),
            },
            other => panic!("Expected comparison, got {:?}", other),
        }
        assert!(matches!(expr("assets.pick()"), Expr::Call { .. }));
    }

    #[test]
    fn test_meta_and_state() {
        let d = doc(r#"
            meta { title = "Demo"; version = "0.2.0"; }
            state {
                param tempo: float [40, 200] @ 120;
                param ceiling: float [0, inf] @ 1.5;
                param label: string @ "hi";
            }
        "#);
        assert_eq!(d.version(), Some("0.2.0"));
        let tempo = d.param("tempo").unwrap();
        assert_eq!(tempo.param_type, ParamType::Float);
        assert_eq!(tempo.initial, Value::Float(120.0));
        assert_eq!(tempo.range, Some(ParamRange { min: 40.0, max: 200.0 }));
        assert_eq!(d.param("ceiling").unwrap().range.unwrap().max, f64::INFINITY);
    }

    #[test]
    fn test_param_type_mismatch() {
        let err = parse_document("document { state { param on: bool @ 3; } }").unwrap_err();
        assert!(err.to_string().contains("does not match type"));
    }

    #[test]
    fn test_grid_and_rule() {
        let d = doc(r#"
            grid field {
                topology = grid;
                size { rows = 1; cols = 3; }
                cell a { tags = [ seed, "x" ]; content = ""; dynamic = 0.6; }
            }
            rule grow(mode = docstep, grid = field) {
                when cell.content == "" and neighbors.all().dynamic > 0.5
                then { cell.content = "noise"; }
                else let keep = 1;
            }
        "#);
        let grid = d.grid("field").unwrap();
        assert_eq!((grid.rows, grid.cols), (Some(1), Some(3)));
        assert_eq!(grid.cells[0].tags, vec!["seed", "x"]);
        assert_eq!(grid.cells[0].dynamic, 0.6);

        let rule = &d.rules[0];
        assert_eq!(rule.mode, RuleMode::Docstep);
        assert_eq!(rule.scope.grid.as_deref(), Some("field"));
        assert_eq!(rule.then_branch.len(), 1);
        assert!(matches!(rule.else_branch[0], Stmt::Let { .. }));
    }

    #[test]
    fn test_rule_requires_when() {
        let err = parse_document("document { rule r() { then x = 1; } }").unwrap_err();
        match err {
            SyntaxError::Parse(e) => {
                assert!(e.message.contains("when"));
                assert_eq!(e.lexeme, "then");
            }
            other => panic!("Expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse_document("document { rule r() { when true then 1 = 2; } }").unwrap_err();
        assert!(err.to_string().contains("Invalid assignment target"));
    }

    #[test]
    fn test_runtime_durations() {
        let d = doc("runtime { eventsApply = \"deferred\"; docstepAdvance = [ timer(500ms), timer(2beat) ]; }");
        let runtime = d.runtime.unwrap();
        assert_eq!(runtime.events_apply.as_deref(), Some("deferred"));
        let DocstepAdvance::Timer { duration, .. } = &runtime.docstep_advance[0];
        assert!((duration.amount - 0.5).abs() < 1e-12);
        let DocstepAdvance::Timer { duration, .. } = &runtime.docstep_advance[1];
        assert_eq!((duration.amount, duration.unit), (2.0, DurationUnit::Beat));
    }

    #[test]
    fn test_unknown_duration_unit() {
        let err = parse_document("document { runtime { docstepAdvance = [ timer(3parsecs) ]; } }").unwrap_err();
        assert!(err.to_string().contains("Unknown duration unit"));
    }

    #[test]
    fn test_tolerant_skip_inside_blocks() {
        let d = doc(r#"
            meta { title = "x"; }
            grid g { futureField = [1, 2, { a = 1; }]; shape { sides = 6; } rows = 2; }
            runtime { somethingNew = foo(1); eventsApply = "now"; }
        "#);
        assert_eq!(d.grid("g").unwrap().rows, Some(2));
        assert_eq!(d.runtime.unwrap().events_apply.as_deref(), Some("now"));
    }

    #[test]
    fn test_unknown_top_level_is_error() {
        let err = parse_document("document { widgets { a = 1; } }").unwrap_err();
        match err {
            SyntaxError::Parse(e) => {
                assert_eq!((e.line, e.column), (1, 12));
                assert_eq!(e.lexeme, "widgets");
            }
            other => panic!("Expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_body_nodes_and_props() {
        let d = doc(r#"
            body {
                page p1 {
                    text t1 { content = "Hello"; align = center; }
                    slot s1 {
                        refresh = every("5s");
                        transition = fade(300ms, ease = "inOut");
                        content = @choose(["a", "b"]);
                        size = params.size * 2;
                    }
                }
            }
        "#);
        let body = d.body.unwrap();
        let page = &body[0];
        assert_eq!(page.kind, "page");
        let text = &page.children[0];
        assert_eq!(text.props["content"], NodePropValue::Literal(Value::str("Hello")));
        assert_eq!(text.props["align"], NodePropValue::Literal(Value::str("center")));

        let slot = &page.children[1];
        assert_eq!(slot.refresh, Some(RefreshPolicy::Every { amount: 5.0, unit: DurationUnit::S }));
        let transition = slot.transition.as_ref().unwrap();
        assert_eq!(transition.kind, "fade");
        assert_eq!(transition.ease.as_deref(), Some("inOut"));
        assert!(slot.props["content"].is_dynamic());
        assert!(slot.props["size"].is_dynamic());
    }

    #[test]
    fn test_refresh_forms() {
        let d = doc(r#"
            body {
                slot a { refresh = never; }
                slot b { refresh = docstep; }
                slot c { refresh = every(250ms); }
                slot d { refresh = every(2, "m"); }
            }
        "#);
        let body = d.body.unwrap();
        assert_eq!(body[0].refresh, Some(RefreshPolicy::Never));
        assert_eq!(body[1].refresh, Some(RefreshPolicy::OnDocstep));
        assert_eq!(body[2].refresh, Some(RefreshPolicy::Every { amount: 250.0, unit: DurationUnit::Ms }));
        assert_eq!(body[3].refresh, Some(RefreshPolicy::Every { amount: 2.0, unit: DurationUnit::M }));
    }

    #[test]
    fn test_assets_and_materials() {
        let d = doc(r#"
            assets {
                asset logo { kind = image; path = "img/logo.png"; tags = [brand]; weight = 2; meta { alt = "Logo"; } }
                bank photos { kind = image; root = "media"; include = "**/*.jpg"; }
            }
            materials {
                material motif { tags = [theme]; score { text = "C D E"; } }
            }
        "#);
        assert_eq!(d.assets[0].weight, 2.0);
        assert_eq!(d.assets[0].meta["alt"], Value::str("Logo"));
        assert_eq!(d.banks[0].include, "**/*.jpg");
        assert_eq!(d.materials[0].material_kind, "score");
    }

    #[test]
    fn test_asset_requires_path() {
        let err = parse_document("document { assets { asset a { kind = image; } } }").unwrap_err();
        assert!(err.to_string().contains("missing 'path'"));
    }

    #[test]
    fn test_duration_str() {
        assert_eq!(parse_duration_str("5s"), Some((5.0, DurationUnit::S)));
        assert_eq!(parse_duration_str("1.5 h"), Some((1.5, DurationUnit::H)));
        assert_eq!(parse_duration_str("4lightyears"), None);
    }
}
