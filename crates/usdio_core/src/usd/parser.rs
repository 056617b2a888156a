//! USDA (ASCII) file parser.
//!
//! The input is split into tokens first, then a recursive-descent pass
//! builds a [`Stage`]. The grammar covered is the subset written by
//! [`write_stage`](super::writer::write_stage) plus the common hand-authored
//! forms:
//!
//! - layer metadata `( upAxis = "Z" metersPerUnit = 1 ... )`
//! - `def`/`over`/`class` prims, typed or typeless, nested to any depth
//! - prim metadata, including `instanceable`, `active`, `kind`, and
//!   `references` with `prepend`/`append`/`delete` list-op keywords
//! - attributes with `custom`/`uniform`, array types, default values,
//!   `.timeSamples` dictionaries, `.connect` targets and metadata
//! - `rel` declarations with single or listed targets
//!
//! `variantSet` blocks are skipped with a warning.

use thiserror::Error;

use super::path::SdfPath;
use super::stage::{
    Attribute, PrimId, Property, Reference, Relationship, Specifier, Stage, Variability,
};
use super::value::Value;

/// Errors that can occur during USDA parsing.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Unexpected end of file")]
    UnexpectedEof,

    #[error("Invalid number format: {0}")]
    InvalidNumber(String),

    #[error("Unclosed block starting at line {0}")]
    UnclosedBlock(usize),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Asset(String),
    Path(String),
    Number(String),
    Punct(char),
}

#[derive(Clone, Debug)]
struct Token {
    tok: Tok,
    line: usize,
}

fn tokenize(content: &str) -> ParseResult<Vec<Token>> {
    let chars: Vec<char> = content.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 1;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '"' | '\'' => {
                let start_line = line;
                let triple = i + 2 < chars.len() && chars[i + 1] == c && chars[i + 2] == c;
                let mut text = String::new();
                i += if triple { 3 } else { 1 };
                loop {
                    if i >= chars.len() {
                        return Err(ParseError::Parse {
                            line: start_line,
                            message: "unterminated string".to_string(),
                        });
                    }
                    let ch = chars[i];
                    if triple {
                        if ch == c && i + 2 < chars.len() && chars[i + 1] == c && chars[i + 2] == c {
                            i += 3;
                            break;
                        }
                    } else if ch == c {
                        i += 1;
                        break;
                    } else if ch == '\n' {
                        return Err(ParseError::Parse {
                            line: start_line,
                            message: "newline in string".to_string(),
                        });
                    }
                    if ch == '\\' && i + 1 < chars.len() {
                        i += 1;
                        text.push(match chars[i] {
                            'n' => '\n',
                            't' => '\t',
                            other => other,
                        });
                    } else {
                        if ch == '\n' {
                            line += 1;
                        }
                        text.push(ch);
                    }
                    i += 1;
                }
                tokens.push(Token { tok: Tok::Str(text), line: start_line });
            }
            '@' | '<' => {
                let close = if c == '@' { '@' } else { '>' };
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != close {
                    if chars[end] == '\n' {
                        return Err(ParseError::Parse {
                            line,
                            message: format!("unterminated '{}'", c),
                        });
                    }
                    end += 1;
                }
                if end >= chars.len() {
                    return Err(ParseError::UnexpectedEof);
                }
                let text: String = chars[start..end].iter().collect();
                let tok = if c == '@' { Tok::Asset(text) } else { Tok::Path(text) };
                tokens.push(Token { tok, line });
                i = end + 1;
            }
            c if c.is_ascii_digit()
                || ((c == '-' || c == '+' || c == '.')
                    && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit() || *n == '.')) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() {
                    let ch = chars[i];
                    let exponent_sign =
                        (ch == '-' || ch == '+') && matches!(chars[i - 1], 'e' | 'E');
                    if ch.is_ascii_digit() || ch == '.' || ch == 'e' || ch == 'E' || exponent_sign {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token { tok: Tok::Number(text), line });
            }
            c if c.is_alphabetic()
                || c == '_'
                || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_alphabetic())) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | ':' | '.')) {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token { tok: Tok::Ident(text), line });
            }
            '(' | ')' | '[' | ']' | '{' | '}' | '=' | ',' | ';' | ':' => {
                tokens.push(Token { tok: Tok::Punct(c), line });
                i += 1;
            }
            other => {
                return Err(ParseError::Parse {
                    line,
                    message: format!("unexpected character '{}'", other),
                });
            }
        }
    }
    Ok(tokens)
}

const LIST_OPS: [&str; 5] = ["prepend", "append", "add", "delete", "reorder"];
const TIME_SAMPLES_SUFFIX: &str = ".timeSamples";
const CONNECT_SUFFIX: &str = ".connect";

/// USDA file parser.
pub struct UsdaParser {
    tokens: Vec<Token>,
    pos: usize,
    stage: Stage,
}

impl UsdaParser {
    /// Create a new parser from file contents.
    pub fn new(content: &str) -> ParseResult<Self> {
        Ok(Self {
            tokens: tokenize(content)?,
            pos: 0,
            stage: Stage::new(),
        })
    }

    /// Parse the whole layer into a stage.
    pub fn parse(mut self) -> ParseResult<Stage> {
        if self.peek_punct('(') {
            self.parse_layer_metadata()?;
        }
        while self.peek().is_some() {
            self.parse_prim(None)?;
        }
        Ok(self.stage)
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn peek_at(&self, offset: usize) -> Option<&Tok> {
        self.tokens.get(self.pos + offset).map(|t| &t.tok)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn next(&mut self) -> ParseResult<Tok> {
        let tok = self
            .tokens
            .get(self.pos)
            .map(|t| t.tok.clone())
            .ok_or(ParseError::UnexpectedEof)?;
        self.pos += 1;
        Ok(tok)
    }

    fn error<T>(&self, message: impl Into<String>) -> ParseResult<T> {
        Err(ParseError::Parse {
            line: self.line(),
            message: message.into(),
        })
    }

    fn peek_punct(&self, c: char) -> bool {
        self.peek() == Some(&Tok::Punct(c))
    }

    fn peek_ident(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Tok::Ident(w)) if w == word)
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.peek_punct(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, c: char) -> ParseResult<()> {
        match self.next()? {
            Tok::Punct(p) if p == c => Ok(()),
            other => {
                self.pos -= 1;
                self.error(format!("expected '{}', found {:?}", c, other))
            }
        }
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        match self.next()? {
            Tok::Ident(s) => Ok(s),
            other => {
                self.pos -= 1;
                self.error(format!("expected identifier, found {:?}", other))
            }
        }
    }

    fn expect_string(&mut self) -> ParseResult<String> {
        match self.next()? {
            Tok::Str(s) => Ok(s),
            other => {
                self.pos -= 1;
                self.error(format!("expected string, found {:?}", other))
            }
        }
    }

    fn parse_layer_metadata(&mut self) -> ParseResult<()> {
        let start = self.line();
        self.expect_punct('(')?;
        loop {
            match self.peek() {
                None => return Err(ParseError::UnclosedBlock(start)),
                Some(Tok::Punct(')')) => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(Tok::Punct(';')) => self.pos += 1,
                Some(Tok::Str(_)) => {
                    self.stage.metadata.documentation = Some(self.expect_string()?);
                }
                _ => {
                    let key = self.metadata_key()?;
                    self.expect_punct('=')?;
                    let value = self.parse_value()?;
                    self.apply_layer_metadata(key, value);
                }
            }
        }
    }

    fn metadata_key(&mut self) -> ParseResult<String> {
        let mut key = self.expect_ident()?;
        if LIST_OPS.contains(&key.as_str()) && matches!(self.peek(), Some(Tok::Ident(_))) {
            key = self.expect_ident()?;
        }
        Ok(key)
    }

    fn apply_layer_metadata(&mut self, key: String, value: Value) {
        let meta = &mut self.stage.metadata;
        match key.as_str() {
            "upAxis" => meta.up_axis = value.as_str().map(str::to_string),
            "metersPerUnit" => meta.meters_per_unit = value.as_f64(),
            "startTimeCode" => meta.start_time_code = value.as_f64(),
            "endTimeCode" => meta.end_time_code = value.as_f64(),
            "timeCodesPerSecond" => meta.time_codes_per_second = value.as_f64(),
            "defaultPrim" => meta.default_prim = value.as_str().map(str::to_string),
            "doc" | "documentation" => meta.documentation = value.as_str().map(str::to_string),
            _ => meta.other.push((key, value)),
        }
    }

    fn parse_prim(&mut self, parent: Option<PrimId>) -> ParseResult<PrimId> {
        let start_line = self.line();
        let specifier = match self.expect_ident()?.as_str() {
            "def" => Specifier::Def,
            "over" => Specifier::Over,
            "class" => Specifier::Class,
            other => return self.error(format!("expected prim specifier, found '{}'", other)),
        };
        let type_name = match self.peek() {
            Some(Tok::Ident(_)) => self.expect_ident()?,
            _ => String::new(),
        };
        let name = self.expect_string()?;

        let id = match self.stage.add_prim(parent, &name, specifier, &type_name) {
            Some(id) => id,
            None => return self.error(format!("duplicate prim '{}'", name)),
        };

        if self.peek_punct('(') {
            self.parse_prim_metadata(id)?;
        }
        self.expect_punct('{')?;

        loop {
            match self.peek() {
                None => return Err(ParseError::UnclosedBlock(start_line)),
                Some(Tok::Punct('}')) => {
                    self.pos += 1;
                    break;
                }
                Some(Tok::Punct(';')) => self.pos += 1,
                Some(Tok::Ident(w)) if w == "def" || w == "over" || w == "class" => {
                    if matches!(self.peek_at(1), Some(Tok::Str(_)) | Some(Tok::Ident(_))) {
                        self.parse_prim(Some(id))?;
                    } else {
                        self.parse_property(id)?;
                    }
                }
                Some(Tok::Ident(w)) if w == "variantSet" => {
                    log::warn!("Skipping variantSet on {} (line {})", self.stage.prim(id).path, self.line());
                    self.skip_variant_set()?;
                }
                _ => self.parse_property(id)?,
            }
        }
        Ok(id)
    }

    fn parse_prim_metadata(&mut self, id: PrimId) -> ParseResult<()> {
        let start = self.line();
        self.expect_punct('(')?;
        loop {
            match self.peek() {
                None => return Err(ParseError::UnclosedBlock(start)),
                Some(Tok::Punct(')')) => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(Tok::Punct(';')) => self.pos += 1,
                Some(Tok::Str(_)) => {
                    let doc = self.expect_string()?;
                    self.stage.prim_mut(id).metadata.documentation = Some(doc);
                }
                _ => {
                    let key = self.metadata_key()?;
                    self.expect_punct('=')?;
                    if key == "references" {
                        let refs = self.parse_references()?;
                        self.stage.prim_mut(id).metadata.references.extend(refs);
                        continue;
                    }
                    let value = self.parse_value()?;
                    let meta = &mut self.stage.prim_mut(id).metadata;
                    match key.as_str() {
                        "instanceable" => meta.instanceable = value.as_bool(),
                        "active" => meta.active = value.as_bool(),
                        "kind" => meta.kind = value.as_str().map(str::to_string),
                        "doc" | "documentation" => {
                            meta.documentation = value.as_str().map(str::to_string)
                        }
                        _ => meta.other.push((key, value)),
                    }
                }
            }
        }
    }

    fn parse_references(&mut self) -> ParseResult<Vec<Reference>> {
        if self.peek_ident("None") {
            self.pos += 1;
            return Ok(Vec::new());
        }
        if !self.eat_punct('[') {
            return Ok(vec![self.parse_reference()?]);
        }
        let mut refs = Vec::new();
        loop {
            if self.eat_punct(']') {
                return Ok(refs);
            }
            refs.push(self.parse_reference()?);
            if !self.eat_punct(',') {
                self.expect_punct(']')?;
                return Ok(refs);
            }
        }
    }

    fn parse_reference(&mut self) -> ParseResult<Reference> {
        let reference = match self.next()? {
            Tok::Path(p) => Reference::internal(SdfPath::new(p)),
            Tok::Asset(a) => {
                let prim_path = match self.peek() {
                    Some(Tok::Path(_)) => match self.next()? {
                        Tok::Path(p) => Some(SdfPath::new(p)),
                        _ => None,
                    },
                    _ => None,
                };
                Reference {
                    asset_path: Some(a),
                    prim_path,
                }
            }
            other => {
                self.pos -= 1;
                return self.error(format!("expected reference, found {:?}", other));
            }
        };
        // Reference-level metadata such as layer offsets is not interpreted.
        if self.peek_punct('(') {
            self.skip_balanced('(', ')')?;
        }
        Ok(reference)
    }

    fn parse_property(&mut self, id: PrimId) -> ParseResult<()> {
        let mut custom = false;
        let mut variability = Variability::Varying;
        loop {
            if self.peek_ident("custom") {
                custom = true;
                self.pos += 1;
            } else if self.peek_ident("uniform") || self.peek_ident("config") {
                variability = Variability::Uniform;
                self.pos += 1;
            } else if self.peek_ident("varying") {
                self.pos += 1;
            } else {
                break;
            }
        }

        if self.peek_ident("rel") {
            self.pos += 1;
            return self.parse_relationship(id, custom);
        }

        let mut type_name = self.expect_ident()?;
        if self.peek_punct('[') && self.peek_at(1) == Some(&Tok::Punct(']')) {
            self.pos += 2;
            type_name.push_str("[]");
        }
        let full_name = self.expect_ident()?;

        if let Some(name) = full_name.strip_suffix(TIME_SAMPLES_SUFFIX) {
            self.expect_punct('=')?;
            let samples = self.parse_time_samples()?;
            let attr = self.attribute_entry(id, name, &type_name, variability, custom);
            attr.time_samples = samples;
            return Ok(());
        }

        if let Some(name) = full_name.strip_suffix(CONNECT_SUFFIX) {
            self.expect_punct('=')?;
            let targets = self.parse_targets()?;
            let attr = self.attribute_entry(id, name, &type_name, variability, custom);
            attr.connections = targets;
            return Ok(());
        }

        let default = if self.eat_punct('=') {
            Some(self.parse_value()?)
        } else {
            None
        };
        let metadata = if self.peek_punct('(') {
            self.parse_property_metadata()?
        } else {
            Vec::new()
        };

        let attr = self.attribute_entry(id, &full_name, &type_name, variability, custom);
        if default.is_some() {
            attr.default = default;
        }
        attr.metadata.extend(metadata);
        Ok(())
    }

    fn attribute_entry(
        &mut self,
        id: PrimId,
        name: &str,
        type_name: &str,
        variability: Variability,
        custom: bool,
    ) -> &mut Attribute {
        let attr = self.stage.create_attribute(id, name, type_name, variability);
        attr.type_name = type_name.to_string();
        attr.variability = variability;
        attr.custom |= custom;
        attr
    }

    fn parse_relationship(&mut self, id: PrimId, custom: bool) -> ParseResult<()> {
        let name = self.expect_ident()?;
        let targets = if self.eat_punct('=') {
            self.parse_targets()?
        } else {
            Vec::new()
        };
        if self.peek_punct('(') {
            self.skip_balanced('(', ')')?;
        }
        let prim = self.stage.prim_mut(id);
        let rel = Relationship { name, custom, targets };
        match prim.properties.iter().position(|p| p.name() == rel.name) {
            Some(idx) => prim.properties[idx] = Property::Relationship(rel),
            None => prim.properties.push(Property::Relationship(rel)),
        }
        Ok(())
    }

    fn parse_targets(&mut self) -> ParseResult<Vec<SdfPath>> {
        match self.parse_value()? {
            Value::Path(p) => Ok(vec![p]),
            Value::Blocked => Ok(Vec::new()),
            Value::Array(items) => items
                .into_iter()
                .map(|v| match v {
                    Value::Path(p) => Ok(p),
                    other => self.error(format!("expected target path, found {:?}", other)),
                })
                .collect(),
            other => self.error(format!("expected target path, found {:?}", other)),
        }
    }

    fn parse_time_samples(&mut self) -> ParseResult<Vec<(f64, Value)>> {
        let start = self.line();
        self.expect_punct('{')?;
        let mut samples: Vec<(f64, Value)> = Vec::new();
        loop {
            match self.next() {
                Err(ParseError::UnexpectedEof) => return Err(ParseError::UnclosedBlock(start)),
                Err(e) => return Err(e),
                Ok(Tok::Punct('}')) => break,
                Ok(Tok::Punct(',')) => {}
                Ok(Tok::Number(n)) => {
                    let time: f64 = n.parse().map_err(|_| ParseError::InvalidNumber(n.clone()))?;
                    self.expect_punct(':')?;
                    let value = self.parse_value()?;
                    samples.push((time, value));
                }
                Ok(other) => {
                    self.pos -= 1;
                    return self.error(format!("expected time code, found {:?}", other));
                }
            }
        }
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(samples)
    }

    fn parse_property_metadata(&mut self) -> ParseResult<Vec<(String, Value)>> {
        let start = self.line();
        self.expect_punct('(')?;
        let mut entries = Vec::new();
        loop {
            match self.peek() {
                None => return Err(ParseError::UnclosedBlock(start)),
                Some(Tok::Punct(')')) => {
                    self.pos += 1;
                    return Ok(entries);
                }
                Some(Tok::Punct(';')) => self.pos += 1,
                Some(Tok::Str(_)) => {
                    let doc = self.expect_string()?;
                    entries.push(("doc".to_string(), Value::String(doc)));
                }
                _ => {
                    let key = self.metadata_key()?;
                    self.expect_punct('=')?;
                    let value = self.parse_value()?;
                    entries.push((key, value));
                }
            }
        }
    }

    fn parse_value(&mut self) -> ParseResult<Value> {
        match self.next()? {
            Tok::Number(n) => n
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| ParseError::InvalidNumber(n)),
            Tok::Str(s) => Ok(Value::String(s)),
            Tok::Asset(a) => Ok(Value::Asset(a)),
            Tok::Path(p) => Ok(Value::Path(SdfPath::new(p))),
            Tok::Ident(w) => Ok(match w.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                "None" => Value::Blocked,
                _ => Value::Token(w),
            }),
            Tok::Punct('(') => Ok(Value::Tuple(self.parse_sequence(')')?)),
            Tok::Punct('[') => Ok(Value::Array(self.parse_sequence(']')?)),
            Tok::Punct('{') => self.parse_dictionary(),
            Tok::Punct(c) => {
                self.pos -= 1;
                self.error(format!("unexpected '{}' in value", c))
            }
        }
    }

    fn parse_sequence(&mut self, close: char) -> ParseResult<Vec<Value>> {
        let start = self.line();
        let mut items = Vec::new();
        loop {
            if self.peek().is_none() {
                return Err(ParseError::UnclosedBlock(start));
            }
            if self.eat_punct(close) {
                return Ok(items);
            }
            items.push(self.parse_value()?);
            if !self.eat_punct(',') {
                if self.peek().is_none() {
                    return Err(ParseError::UnclosedBlock(start));
                }
                self.expect_punct(close)?;
                return Ok(items);
            }
        }
    }

    /// `{ type key = value ... }`; the type is optional and dropped.
    fn parse_dictionary(&mut self) -> ParseResult<Value> {
        let start = self.line();
        let mut entries = Vec::new();
        loop {
            match self.peek() {
                None => return Err(ParseError::UnclosedBlock(start)),
                Some(Tok::Punct('}')) => {
                    self.pos += 1;
                    return Ok(Value::Dictionary(entries));
                }
                Some(Tok::Punct(';')) | Some(Tok::Punct(',')) => self.pos += 1,
                _ => {
                    let mut key = match self.next()? {
                        Tok::Ident(s) | Tok::Str(s) => s,
                        other => {
                            self.pos -= 1;
                            return self.error(format!("expected dictionary key, found {:?}", other));
                        }
                    };
                    if self.peek_punct('[') && self.peek_at(1) == Some(&Tok::Punct(']')) {
                        self.pos += 2;
                    }
                    if let Some(Tok::Ident(_)) | Some(Tok::Str(_)) = self.peek() {
                        key = match self.next()? {
                            Tok::Ident(s) | Tok::Str(s) => s,
                            _ => key,
                        };
                    }
                    self.expect_punct('=')?;
                    let value = self.parse_value()?;
                    entries.push((key, value));
                }
            }
        }
    }

    fn skip_balanced(&mut self, open: char, close: char) -> ParseResult<()> {
        let start = self.line();
        self.expect_punct(open)?;
        let mut depth = 1;
        while depth > 0 {
            match self.next() {
                Ok(Tok::Punct(c)) if c == open => depth += 1,
                Ok(Tok::Punct(c)) if c == close => depth -= 1,
                Ok(_) => {}
                Err(_) => return Err(ParseError::UnclosedBlock(start)),
            }
        }
        Ok(())
    }

    fn skip_variant_set(&mut self) -> ParseResult<()> {
        // variantSet "name" = { ... }
        self.pos += 1;
        self.expect_string()?;
        self.expect_punct('=')?;
        self.skip_balanced('{', '}')
    }
}

/// Parse a USDA string into a stage.
pub fn parse_usda(content: &str) -> ParseResult<Stage> {
    UsdaParser::new(content)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usd::value::TimeCode;
    use usdio_math::Vec3;

    #[test]
    fn test_parse_simple_mesh() {
        let usda = r#"
def Mesh "Cube" {
    point3f[] points = [(0, 0, 0), (1, 0, 0), (1, 1, 0), (0, 1, 0)]
    int[] faceVertexCounts = [4]
    int[] faceVertexIndices = [0, 1, 2, 3]
}
"#;

        let stage = parse_usda(usda).unwrap();
        assert_eq!(stage.root_prims().len(), 1);

        let cube = stage.get_prim(&SdfPath::new("/Cube")).unwrap();
        assert!(cube.is_a("Mesh"));
        let points = cube
            .get("points", TimeCode::Default)
            .and_then(|v| v.as_vec3_array())
            .unwrap();
        assert_eq!(points.len(), 4);
        assert_eq!(points[2], Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(cube.attribute("points").unwrap().type_name, "point3f[]");
        assert_eq!(
            cube.get("faceVertexIndices", TimeCode::Default).and_then(|v| v.as_i32_array()),
            Some(vec![0, 1, 2, 3])
        );
    }

    #[test]
    fn test_parse_layer_metadata() {
        let usda = r#"#usda 1.0
(
    "Exported scene"
    defaultPrim = "World"
    metersPerUnit = 0.01
    upAxis = "Y"
    startTimeCode = 1
    endTimeCode = 24
    customLayerData = {
        string creator = "tests"
    }
)

def Xform "World"
{
}
"#;
        let stage = parse_usda(usda).unwrap();
        let meta = &stage.metadata;
        assert_eq!(meta.documentation.as_deref(), Some("Exported scene"));
        assert_eq!(meta.up_axis.as_deref(), Some("Y"));
        assert_eq!(meta.meters_per_unit, Some(0.01));
        assert_eq!(meta.start_time_code, Some(1.0));
        assert_eq!(meta.end_time_code, Some(24.0));
        assert_eq!(meta.other.len(), 1);
        assert!(stage.default_prim().is_some());
    }

    #[test]
    fn test_parse_nested_prims_and_relationships() {
        let usda = r#"
def Xform "World" (
    kind = "component"
)
{
    def Mesh "Cube"
    {
        rel material:binding = </Looks/Red>
        uniform token subdivisionScheme = "none"
    }
    def Scope "Looks" {}
}
"#;
        let stage = parse_usda(usda).unwrap();
        let world = stage.get_prim(&SdfPath::new("/World")).unwrap();
        assert_eq!(world.metadata.kind.as_deref(), Some("component"));
        assert_eq!(world.children.len(), 2);

        let cube = stage.get_prim(&SdfPath::new("/World/Cube")).unwrap();
        let binding = cube.relationship("material:binding").unwrap();
        assert_eq!(binding.targets, vec![SdfPath::new("/Looks/Red")]);
        assert_eq!(cube.attribute("subdivisionScheme").unwrap().variability, Variability::Uniform);
    }

    #[test]
    fn test_parse_time_samples_and_default_on_same_attribute() {
        let usda = r#"
def Xform "Anim"
{
    double3 xformOp:translate = (0, 0, 0)
    double3 xformOp:translate.timeSamples = {
        10: (10, 0, 0),
        1: (1, 0, 0),
    }
    uniform token[] xformOpOrder = ["xformOp:translate"]
}
"#;
        let stage = parse_usda(usda).unwrap();
        let prim = stage.get_prim(&SdfPath::new("/Anim")).unwrap();
        let attr = prim.attribute("xformOp:translate").unwrap();
        assert_eq!(attr.time_sample_times(), vec![1.0, 10.0]);
        assert!(attr.default.is_some());
        assert_eq!(
            attr.get(TimeCode::Time(5.5)).and_then(|v| v.as_vec3()),
            Some(Vec3::new(5.5, 0.0, 0.0))
        );
    }

    #[test]
    fn test_parse_instance_references() {
        let usda = r#"
class Xform "TreeProto"
{
    def Mesh "Trunk" {}
}

def Xform "Tree1" (
    instanceable = true
    prepend references = </TreeProto>
)
{
}

def Xform "External" (
    references = [@./lucy.usda@</Lucy>, @other.usda@]
)
{
}
"#;
        let stage = parse_usda(usda).unwrap();
        let tree = stage.get_prim(&SdfPath::new("/Tree1")).unwrap();
        assert!(tree.is_instance());
        assert_eq!(tree.internal_reference(), Some(&SdfPath::new("/TreeProto")));

        let external = stage.get_prim(&SdfPath::new("/External")).unwrap();
        assert_eq!(external.metadata.references.len(), 2);
        assert_eq!(external.metadata.references[0].asset_path.as_deref(), Some("./lucy.usda"));
        assert_eq!(external.metadata.references[0].prim_path, Some(SdfPath::new("/Lucy")));
        assert!(!external.is_instance());
    }

    #[test]
    fn test_parse_attribute_metadata_and_connections() {
        let usda = r#"
def Material "Red"
{
    token outputs:surface.connect = </Red/Preview.outputs:surface>
    def Shader "Preview"
    {
        uniform token info:id = "UsdPreviewSurface"
        color3f inputs:diffuseColor = (1, 0, 0)
        token outputs:surface
    }
}
def Mesh "M"
{
    texCoord2f[] primvars:st = [(0, 0), (1, 0), (1, 1)] (
        interpolation = "faceVarying"
    )
}
"#;
        let stage = parse_usda(usda).unwrap();
        let mat = stage.get_prim(&SdfPath::new("/Red")).unwrap();
        assert_eq!(
            mat.attribute("outputs:surface").unwrap().connections,
            vec![SdfPath::new("/Red/Preview.outputs:surface")]
        );
        let mesh = stage.get_prim(&SdfPath::new("/M")).unwrap();
        let st = mesh.attribute("primvars:st").unwrap();
        assert_eq!(st.metadata("interpolation").and_then(|v| v.as_str()), Some("faceVarying"));
        let shader = stage.get_prim(&SdfPath::new("/Red/Preview")).unwrap();
        assert!(shader.attribute("outputs:surface").unwrap().default.is_none());
    }

    #[test]
    fn test_parse_negative_and_exponent_numbers() {
        let usda = r#"
def Camera "Cam"
{
    float2 clippingRange = (1e-2, 1.5E+3)
    float verticalApertureOffset = -0.25
    float focusDistance = inf
}
"#;
        let stage = parse_usda(usda).unwrap();
        let cam = stage.get_prim(&SdfPath::new("/Cam")).unwrap();
        let range = cam.get("clippingRange", TimeCode::Default).and_then(|v| v.as_vec2()).unwrap();
        assert!((range.x - 0.01).abs() < 1e-6);
        assert!((range.y - 1500.0).abs() < 1e-3);
        assert_eq!(cam.get("verticalApertureOffset", TimeCode::Default).and_then(|v| v.as_f32()), Some(-0.25));
        assert_eq!(cam.get("focusDistance", TimeCode::Default).and_then(|v| v.as_f64()), Some(f64::INFINITY));
    }

    #[test]
    fn test_unclosed_block_is_an_error() {
        let usda = r#"
def Xform "Broken" {
    def Mesh "Child" {
"#;
        assert!(matches!(parse_usda(usda), Err(ParseError::UnclosedBlock(_))));
    }

    #[test]
    fn test_duplicate_prim_is_an_error() {
        let usda = r#"
def Xform "A" {}
def Xform "A" {}
"#;
        assert!(matches!(parse_usda(usda), Err(ParseError::Parse { line: 3, .. })));
    }

    #[test]
    fn test_unknown_types_are_preserved() {
        let usda = r#"def FancyThing "F" { custom float strange = 2 }"#;
        let stage = parse_usda(usda).unwrap();
        let prim = stage.get_prim(&SdfPath::new("/F")).unwrap();
        assert_eq!(prim.type_name, "FancyThing");
        assert!(prim.attribute("strange").unwrap().custom);
    }

    #[test]
    fn test_variant_sets_are_skipped() {
        let usda = r#"
def Xform "V" {
    variantSet "look" = {
        "red" { def Mesh "R" {} }
    }
    def Mesh "Plain" {}
}
"#;
        let stage = parse_usda(usda).unwrap();
        let v = stage.get_prim(&SdfPath::new("/V")).unwrap();
        assert_eq!(v.children.len(), 1);
    }
}
