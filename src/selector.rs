//! Selector evaluator
//!
//! Selectors are JSONPath-flavoured expressions, as written in rule
//! catalogues (`given:`):
//!
//! ```text
//! $.servers[*]                                   children of a sequence
//! $.paths['/openapi.json'].get                   bracketed keys
//! $..[responses][?(@property.match(/^2\d\d$/))]  recursive descent + key filter
//! $.components.schemas[*]~                       the keys themselves
//! $..properties^                                 the parent of each match
//! ```
//!
//! A selector is compiled once into a list of [`Step`]s and then evaluated
//! against a [`Document`]. Matches are produced in document order: mapping
//! iteration follows insertion order, sequences follow index order.

use crate::document::{child, children, Document, JsonPath, PathSegment};
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashSet;
use thiserror::Error;

/// Error compiling a selector
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("Selector must start with '$': {0}")]
    MissingRoot(String),

    #[error("Invalid selector '{selector}' at offset {offset}: {message}")]
    Syntax {
        selector: String,
        offset: usize,
        message: String,
    },

    #[error("Invalid regular expression in selector '{selector}': {message}")]
    Regex { selector: String, message: String },
}

/// One predicate of a property filter
#[derive(Debug, Clone)]
enum FilterTerm {
    /// `@property` is truthy: a non-empty key or a non-zero index
    Exists { negated: bool },
    /// `@property.match(/re/)`
    Matches { regex: Regex, negated: bool },
    /// `@property == 'name'`
    Equals { value: String, negated: bool },
}

impl FilterTerm {
    fn accepts(&self, segment: &PathSegment, key: &str) -> bool {
        match self {
            FilterTerm::Exists { negated } => {
                let truthy = match segment {
                    PathSegment::Key(key) => !key.is_empty(),
                    PathSegment::Index(index) => *index != 0,
                };
                truthy != *negated
            }
            FilterTerm::Matches { regex, negated } => regex.is_match(key) != *negated,
            FilterTerm::Equals { value, negated } => (key == value) != *negated,
        }
    }
}

/// Predicate over the *keys* of a mapping (or indices of a sequence).
/// All terms must hold.
#[derive(Debug, Clone)]
pub struct PropertyFilter {
    terms: Vec<FilterTerm>,
}

impl PropertyFilter {
    pub fn accepts(&self, segment: &PathSegment) -> bool {
        let key = segment.as_key();
        self.terms.iter().all(|t| t.accepts(segment, &key))
    }
}

/// A compiled selector step
#[derive(Debug, Clone)]
pub enum Step {
    /// Child by key
    Child(String),
    /// Sequence element (or mapping key spelled as digits)
    Index(usize),
    /// Every child
    Wildcard,
    /// The current node and all nodes beneath it, pre-order
    Descendants,
    /// Children whose key satisfies the filter
    Filter(PropertyFilter),
    /// One level up from the current node
    Parent,
}

/// A single selector match
#[derive(Debug, Clone)]
pub struct Match<'a> {
    /// Matched node, or the key itself for `~` selectors
    pub value: Cow<'a, Value>,
    /// Location of the matched node
    pub path: JsonPath,
    /// Key under which the node lives (`None` for the root)
    pub key: Option<PathSegment>,
}

/// A compiled selector expression
#[derive(Debug, Clone)]
pub struct Selector {
    source: String,
    steps: Vec<Step>,
    key_only: bool,
}

#[derive(Clone)]
struct Cursor<'a> {
    value: &'a Value,
    path: JsonPath,
}

impl Selector {
    /// Compile a selector expression
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let trimmed = source.trim();
        if !trimmed.starts_with('$') {
            return Err(SelectorError::MissingRoot(source.to_string()));
        }

        let mut parser = Parser {
            source: trimmed,
            chars: trimmed.chars().collect(),
            pos: 1,
        };
        let (steps, key_only) = parser.parse()?;

        Ok(Self {
            source: trimmed.to_string(),
            steps,
            key_only,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Whether the selector ends with `~` and yields keys instead of values
    pub fn is_key_only(&self) -> bool {
        self.key_only
    }

    /// Evaluate against a document
    pub fn evaluate<'a>(&self, document: &'a Document) -> Vec<Match<'a>> {
        let mut current = vec![Cursor {
            value: document.root(),
            path: JsonPath::root(),
        }];

        for step in &self.steps {
            current = apply_step(step, current, document);
            if current.is_empty() {
                break;
            }
        }

        current
            .into_iter()
            .filter_map(|cursor| {
                let key = cursor.path.last().cloned();
                if self.key_only {
                    let key = key?;
                    Some(Match {
                        value: Cow::Owned(key.to_value()),
                        path: cursor.path,
                        key: Some(key),
                    })
                } else {
                    Some(Match {
                        value: Cow::Borrowed(cursor.value),
                        path: cursor.path,
                        key,
                    })
                }
            })
            .collect()
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// Evaluate several selectors; their matches are concatenated in list order
pub fn evaluate_all<'a>(document: &'a Document, selectors: &[Selector]) -> Vec<Match<'a>> {
    selectors
        .iter()
        .flat_map(|selector| selector.evaluate(document))
        .collect()
}

fn apply_step<'a>(step: &Step, current: Vec<Cursor<'a>>, document: &'a Document) -> Vec<Cursor<'a>> {
    let mut next = Vec::new();

    match step {
        Step::Child(name) => {
            let segment = PathSegment::Key(name.clone());
            for cursor in current {
                if let Some(value) = child(cursor.value, &segment) {
                    let segment = match cursor.value {
                        Value::Array(_) => name
                            .parse::<usize>()
                            .map(PathSegment::Index)
                            .unwrap_or_else(|_| segment.clone()),
                        _ => segment.clone(),
                    };
                    next.push(Cursor {
                        value,
                        path: cursor.path.child(segment),
                    });
                }
            }
        }
        Step::Index(index) => {
            for cursor in current {
                let segment = match cursor.value {
                    Value::Object(_) => PathSegment::Key(index.to_string()),
                    _ => PathSegment::Index(*index),
                };
                if let Some(value) = child(cursor.value, &segment) {
                    next.push(Cursor {
                        value,
                        path: cursor.path.child(segment),
                    });
                }
            }
        }
        Step::Wildcard => {
            for cursor in current {
                for (segment, value) in children(cursor.value) {
                    next.push(Cursor {
                        value,
                        path: cursor.path.child(segment),
                    });
                }
            }
        }
        Step::Filter(filter) => {
            for cursor in current {
                for (segment, value) in children(cursor.value) {
                    if filter.accepts(&segment) {
                        next.push(Cursor {
                            value,
                            path: cursor.path.child(segment),
                        });
                    }
                }
            }
        }
        Step::Descendants => {
            let mut seen = HashSet::new();
            for cursor in current {
                for visited in pre_order(cursor) {
                    if seen.insert(visited.path.clone()) {
                        next.push(visited);
                    }
                }
            }
        }
        Step::Parent => {
            let mut seen = HashSet::new();
            for cursor in current {
                let Some(parent) = cursor.path.parent() else {
                    continue;
                };
                if !seen.insert(parent.clone()) {
                    continue;
                }
                if let Some(value) = document.get(&parent) {
                    next.push(Cursor {
                        value,
                        path: parent,
                    });
                }
            }
        }
    }

    next
}

/// The node and every node beneath it, depth-first pre-order
fn pre_order(start: Cursor<'_>) -> Vec<Cursor<'_>> {
    let mut out = Vec::new();
    let mut stack = vec![start];

    while let Some(cursor) = stack.pop() {
        let mut kids: Vec<Cursor> = children(cursor.value)
            .into_iter()
            .map(|(segment, value)| Cursor {
                value,
                path: cursor.path.child(segment),
            })
            .collect();
        kids.reverse();
        out.push(cursor);
        stack.extend(kids);
    }

    out
}

/// Split a `/body/flags` regex literal
pub(crate) fn split_regex_literal(src: &str) -> Option<(&str, &str)> {
    let rest = src.strip_prefix('/')?;
    let end = rest.rfind('/')?;
    let (body, flags) = (&rest[..end], &rest[end + 1..]);
    if flags.chars().all(|c| "gimsuyx".contains(c)) {
        Some((body, flags))
    } else {
        None
    }
}

/// Build a regex honouring `i`, `m`, `s` and `x` flags; `g`, `u`, `y` are
/// meaningless for a boolean match and ignored
pub(crate) fn build_regex(body: &str, flags: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&body.replace("\\/", "/"))
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .ignore_whitespace(flags.contains('x'))
        .build()
}

/// Compile a pattern given either as plain regex source or as a `/re/flags` literal
pub(crate) fn compile_pattern(src: &str) -> Result<Regex, regex::Error> {
    match split_regex_literal(src) {
        Some((body, flags)) => build_regex(body, flags),
        None => build_regex(src, ""),
    }
}

struct Parser<'s> {
    source: &'s str,
    chars: Vec<char>,
    pos: usize,
}

impl Parser<'_> {
    fn parse(&mut self) -> Result<(Vec<Step>, bool), SelectorError> {
        let mut steps = Vec::new();
        let mut key_only = false;

        while let Some(c) = self.peek() {
            if key_only {
                return Err(self.error("'~' must be the last step"));
            }

            match c {
                '.' => {
                    self.bump();
                    if self.eat('.') {
                        steps.push(Step::Descendants);
                        if self.peek().is_none() {
                            return Err(self.error("recursive descent must be followed by a step"));
                        }
                    }
                    match self.peek() {
                        Some('[') => continue,
                        Some('*') => {
                            self.bump();
                            steps.push(Step::Wildcard);
                        }
                        Some(_) => steps.push(Step::Child(self.name()?)),
                        None => return Err(self.error("expected a property name after '.'")),
                    }
                }
                '[' => {
                    self.bump();
                    steps.push(self.bracket()?);
                }
                '~' => {
                    self.bump();
                    key_only = true;
                }
                '^' => {
                    self.bump();
                    steps.push(Step::Parent);
                }
                other => return Err(self.error(&format!("unexpected character '{}'", other))),
            }
        }

        Ok((steps, key_only))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), SelectorError> {
        self.skip_whitespace();
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected)))
        }
    }

    fn error(&self, message: &str) -> SelectorError {
        SelectorError::Syntax {
            selector: self.source.to_string(),
            offset: self.pos,
            message: message.to_string(),
        }
    }

    /// Dot-notation property name
    fn name(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '.' | '[' | '~' | '^') {
                break;
            }
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        if name.is_empty() {
            return Err(self.error("expected a property name"));
        }
        Ok(name)
    }

    /// Contents of `[...]`, the opening bracket already consumed
    fn bracket(&mut self) -> Result<Step, SelectorError> {
        self.skip_whitespace();

        match self.peek() {
            Some('?') => {
                self.bump();
                self.expect('(')?;
                let filter = self.filter()?;
                self.expect(']')?;
                Ok(Step::Filter(filter))
            }
            Some('*') => {
                self.bump();
                self.expect(']')?;
                Ok(Step::Wildcard)
            }
            Some(quote @ ('\'' | '"')) => {
                self.bump();
                let key = self.quoted(quote)?;
                self.expect(']')?;
                Ok(Step::Child(key))
            }
            Some('(') => Err(self.error("script expressions are not supported")),
            Some(_) => {
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c == ']' {
                        break;
                    }
                    self.pos += 1;
                }
                let raw: String = self.chars[start..self.pos].iter().collect();
                self.expect(']')?;

                let raw = raw.trim();
                if raw.is_empty() {
                    return Err(self.error("empty brackets"));
                }
                if raw.chars().all(|c| c.is_ascii_digit()) {
                    if let Ok(index) = raw.parse() {
                        return Ok(Step::Index(index));
                    }
                }
                Ok(Step::Child(raw.to_string()))
            }
            None => Err(self.error("unterminated '['")),
        }
    }

    /// Quoted key, the opening quote already consumed
    fn quoted(&mut self, quote: char) -> Result<String, SelectorError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(c) => out.push(c),
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    /// Filter expression body up to its closing `)`, the `?(` already consumed
    fn filter(&mut self) -> Result<PropertyFilter, SelectorError> {
        let start = self.pos;
        let mut depth = 1usize;
        let mut quote: Option<char> = None;
        let mut in_regex = false;
        let mut last_significant = '(';

        loop {
            let Some(c) = self.bump() else {
                return Err(self.error("unterminated filter expression"));
            };

            if let Some(q) = quote {
                if c == '\\' {
                    self.bump();
                } else if c == q {
                    quote = None;
                }
                continue;
            }
            if in_regex {
                if c == '\\' {
                    self.bump();
                } else if c == '/' {
                    in_regex = false;
                }
                continue;
            }

            match c {
                '\'' | '"' => quote = Some(c),
                '/' if last_significant == '(' || last_significant == ',' => in_regex = true,
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            if !c.is_whitespace() {
                last_significant = c;
            }
        }

        let body: String = self.chars[start..self.pos - 1].iter().collect();
        let terms = split_conjunction(&body)
            .map_err(|message| self.error(&message))?
            .into_iter()
            .map(|term| self.term(&term))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PropertyFilter { terms })
    }

    fn term(&self, raw: &str) -> Result<FilterTerm, SelectorError> {
        let mut term = raw.trim();
        let mut negated = false;

        while let Some(rest) = term.strip_prefix('!') {
            negated = !negated;
            term = rest.trim_start();
        }
        if term.starts_with('(') && term.ends_with(')') {
            let inner = self.term(&term[1..term.len() - 1])?;
            return Ok(negate(inner, negated));
        }

        if term == "@property" {
            return Ok(FilterTerm::Exists { negated });
        }

        if let Some(arg) = term
            .strip_prefix("@property.match(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let arg = arg.trim();
            let regex = match split_regex_literal(arg) {
                Some((body, flags)) => build_regex(body, flags),
                None => Regex::new(&unquote(arg).ok_or_else(|| {
                    self.error(&format!("expected a regex literal in '{}'", raw.trim()))
                })?),
            }
            .map_err(|e| SelectorError::Regex {
                selector: self.source.to_string(),
                message: e.to_string(),
            })?;
            return Ok(FilterTerm::Matches { regex, negated });
        }

        for op in ["!==", "===", "!=", "=="] {
            if let Some(idx) = term.find(op) {
                let left = term[..idx].trim();
                let right = term[idx + op.len()..].trim();
                if left != "@property" {
                    break;
                }
                let value = unquote(right).unwrap_or_else(|| right.to_string());
                return Ok(FilterTerm::Equals {
                    value,
                    negated: negated != op.starts_with('!'),
                });
            }
        }

        Err(self.error(&format!("unsupported filter expression '{}'", raw.trim())))
    }
}

fn negate(term: FilterTerm, flip: bool) -> FilterTerm {
    if !flip {
        return term;
    }
    match term {
        FilterTerm::Exists { negated } => FilterTerm::Exists { negated: !negated },
        FilterTerm::Matches { regex, negated } => FilterTerm::Matches {
            regex,
            negated: !negated,
        },
        FilterTerm::Equals { value, negated } => FilterTerm::Equals {
            value,
            negated: !negated,
        },
    }
}

fn unquote(s: &str) -> Option<String> {
    let first = s.chars().next()?;
    if (first == '\'' || first == '"') && s.len() >= 2 && s.ends_with(first) {
        Some(s[1..s.len() - 1].to_string())
    } else {
        None
    }
}

/// Split a filter body on top-level `&&`, respecting quotes, regex literals
/// and parentheses. `||` is rejected.
fn split_conjunction(body: &str) -> Result<Vec<String>, String> {
    let chars: Vec<char> = body.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut in_regex = false;
    let mut last_significant = '(';
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        current.push(c);

        if let Some(q) = quote {
            if c == '\\' && i + 1 < chars.len() {
                current.push(chars[i + 1]);
                i += 1;
            } else if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        if in_regex {
            if c == '\\' && i + 1 < chars.len() {
                current.push(chars[i + 1]);
                i += 1;
            } else if c == '/' {
                in_regex = false;
            }
            i += 1;
            continue;
        }

        match c {
            '\'' | '"' => quote = Some(c),
            '/' if last_significant == '(' || last_significant == ',' => in_regex = true,
            '(' => depth += 1,
            ')' => depth -= 1,
            '&' | '|' if depth == 0 && chars.get(i + 1) == Some(&c) => {
                if c == '|' {
                    return Err("'||' is not supported in filter expressions".to_string());
                }
                current.pop();
                parts.push(std::mem::take(&mut current));
                i += 2;
                last_significant = '&';
                continue;
            }
            _ => {}
        }
        if !c.is_whitespace() {
            last_significant = c;
        }
        i += 1;
    }
    parts.push(current);

    if parts.iter().any(|p| p.trim().is_empty()) {
        return Err("empty filter term".to_string());
    }
    Ok(parts)
}
