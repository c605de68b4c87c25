//! TSX → JavaScript transpiler.
//!
//! A single forward scanner that copies JavaScript through unchanged, rewrites
//! JSX into classic `pragma(type, props, ...children)` calls and erases the
//! TypeScript annotation forms previews actually use. It does not build an
//! AST; ambiguous positions are resolved the way a reader would resolve them
//! (`(` groups are re-scanned as parameter lists once `=>` or a method body is
//! seen behind them). Anything it does not understand is passed through for the
//! engine's parser to reject.

use crate::error::TranspileError;

type TResult<T> = Result<T, TranspileError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranspileOptions {
    pub pragma: String,
    pub pragma_frag: String,
}

impl Default for TranspileOptions {
    fn default() -> Self {
        Self {
            pragma: "React.createElement".to_string(),
            pragma_frag: "React.Fragment".to_string(),
        }
    }
}

pub fn transpile(source: &str, options: &TranspileOptions) -> TResult<String> {
    let mut scanner = Scanner {
        src: source,
        b: source.as_bytes(),
        pos: 0,
        opts: options,
        jsx_depth: 0,
    };
    scanner.transform(Ctx::Code, None, Tok::Start)
}

// -----------------------------------------------------------------------------
// Tokens and scanning state
// -----------------------------------------------------------------------------

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "enum", "export", "extends", "finally", "for", "function", "if", "import", "in",
    "instanceof", "let", "new", "return", "switch", "throw", "try", "typeof", "var", "void",
    "while", "with", "yield", "await", "of",
];

/// Keywords after which an operand (regex literal, JSX) may start.
const OPERAND_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

/// Deeper JSX nesting is rejected before it reaches the engine's recursive parser.
pub const MAX_JSX_DEPTH: usize = 32;

const TS_MODIFIERS: &[&str] = &["public", "private", "protected", "readonly", "override", "declare"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ctx {
    Code,
    /// Directly inside a parameter list.
    Params,
    /// Directly inside a class body.
    ClassBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Start,
    Word(String),
    Punct(u8),
    Spread,
    Literal,
    /// Identifier after `.`; never a keyword.
    Property,
    Close(u8),
}

impl Tok {
    fn allows_operand(&self) -> bool {
        match self {
            Tok::Start | Tok::Punct(_) | Tok::Spread => true,
            Tok::Word(w) => OPERAND_KEYWORDS.contains(&w.as_str()),
            Tok::Literal | Tok::Property | Tok::Close(_) => false,
        }
    }

    fn ends_value(&self) -> bool {
        match self {
            Tok::Word(w) => !RESERVED.contains(&w.as_str()),
            Tok::Literal | Tok::Property | Tok::Close(_) => true,
            _ => false,
        }
    }

    fn is_word(&self, word: &str) -> bool {
        matches!(self, Tok::Word(w) if w == word)
    }

    fn is_plain_word(&self) -> bool {
        matches!(self, Tok::Word(w) if !RESERVED.contains(&w.as_str()))
    }
}

struct Cursor {
    prev: Tok,
    prev2: Tok,
    newline: bool,
}

impl Cursor {
    fn push(&mut self, tok: Tok) {
        self.prev2 = std::mem::replace(&mut self.prev, tok);
        self.newline = false;
    }

    fn at_statement_start(&self) -> bool {
        matches!(
            self.prev,
            Tok::Start | Tok::Punct(b';') | Tok::Punct(b'{') | Tok::Close(b'}')
        ) || (self.newline && self.prev.ends_value())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decl {
    None,
    /// Right after `const`/`let`/`var` or a declarator comma.
    Binding,
    Init,
}

/// Initializer tracking for parameter lists and class bodies, where a bare `:`
/// is either a type annotation or the second half of a ternary.
#[derive(Debug, Default, Clone, Copy)]
struct Annot {
    in_init: bool,
    ternary: u32,
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'$' || c >= 0x80
}

fn is_ident_char(c: u8) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

struct Scanner<'a> {
    src: &'a str,
    b: &'a [u8],
    pos: usize,
    opts: &'a TranspileOptions,
    jsx_depth: usize,
}

impl<'a> Scanner<'a> {
    fn at(&self, p: usize) -> u8 {
        self.b.get(p).copied().unwrap_or(0)
    }

    fn starts(&self, p: usize, s: &str) -> bool {
        self.b.get(p..).is_some_and(|rest| rest.starts_with(s.as_bytes()))
    }

    fn error(&self, at: usize, message: impl Into<String>) -> TranspileError {
        let at = at.min(self.b.len());
        let line_start = self.b[..at]
            .iter()
            .rposition(|&c| c == b'\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        TranspileError {
            line: self.b[..at].iter().filter(|&&c| c == b'\n').count() + 1,
            column: String::from_utf8_lossy(&self.b[line_start..at]).chars().count() + 1,
            message: message.into(),
        }
    }

    fn word_end(&self, mut p: usize) -> usize {
        while is_ident_char(self.at(p)) {
            p += 1;
        }
        p
    }

    fn word_at(&self, p: usize) -> Option<&'a str> {
        if !is_ident_start(self.at(p)) {
            return None;
        }
        let src = self.src;
        Some(&src[p..self.word_end(p)])
    }

    fn skip_inline_ws(&self, mut p: usize) -> usize {
        while matches!(self.at(p), b' ' | b'\t') {
            p += 1;
        }
        p
    }

    /// Whitespace, newlines and comments.
    fn skip_trivia(&self, mut p: usize) -> usize {
        loop {
            match self.at(p) {
                b' ' | b'\t' | b'\r' | b'\n' | 0x0b | 0x0c => p += 1,
                b'/' if self.at(p + 1) == b'/' => p = self.line_end(p),
                b'/' if self.at(p + 1) == b'*' => match self.block_comment_end(p) {
                    Some(end) => p = end,
                    None => return self.b.len(),
                },
                _ => return p,
            }
        }
    }

    fn line_end(&self, p: usize) -> usize {
        self.b[p..]
            .iter()
            .position(|&c| c == b'\n')
            .map(|i| p + i)
            .unwrap_or(self.b.len())
    }

    fn block_comment_end(&self, p: usize) -> Option<usize> {
        self.src
            .get(p + 2..)
            .and_then(|rest| rest.find("*/"))
            .map(|i| p + 2 + i + 2)
    }

    fn string_end(&self, p: usize) -> Option<usize> {
        let quote = self.at(p);
        let mut q = p + 1;
        loop {
            match self.b.get(q)? {
                b'\\' => q += 2,
                b'\n' => return None,
                &c if c == quote => return Some(q + 1),
                _ => q += 1,
            }
        }
    }

    fn template_end(&self, p: usize) -> Option<usize> {
        let mut q = p + 1;
        loop {
            match self.b.get(q)? {
                b'\\' => q += 2,
                b'`' => return Some(q + 1),
                b'$' if self.at(q + 1) == b'{' => q = self.code_end(q + 2, b'}')? + 1,
                _ => q += 1,
            }
        }
    }

    /// Index of the `close` byte that ends the code starting at `p`.
    fn code_end(&self, mut p: usize, close: u8) -> Option<usize> {
        loop {
            let c = *self.b.get(p)?;
            match c {
                _ if c == close => return Some(p),
                b'(' => p = self.code_end(p + 1, b')')? + 1,
                b'[' => p = self.code_end(p + 1, b']')? + 1,
                b'{' => p = self.code_end(p + 1, b'}')? + 1,
                b'"' | b'\'' => p = self.string_end(p)?,
                b'`' => p = self.template_end(p)?,
                b'/' if matches!(self.at(p + 1), b'/' | b'*') => p = self.skip_trivia(p),
                _ => p += 1,
            }
        }
    }

    /// Index just past the bracket group opening at `p`.
    fn group_end(&self, p: usize) -> Option<usize> {
        let close = match self.at(p) {
            b'(' => b')',
            b'[' => b']',
            b'{' => b'}',
            _ => return None,
        };
        self.code_end(p + 1, close).map(|e| e + 1)
    }

    /// Index just past a `<...>` type argument/parameter list. In strict mode
    /// the contents must look like types (used where `<` could be less-than).
    fn angle_end(&self, p: usize, strict: bool) -> Option<usize> {
        let mut depth = 0usize;
        let mut q = p;
        loop {
            if strict && q - p > 256 {
                return None;
            }
            let c = *self.b.get(q)?;
            match c {
                b'<' => {
                    depth += 1;
                    q += 1;
                }
                b'>' => {
                    depth -= 1;
                    q += 1;
                    if depth == 0 {
                        return Some(q);
                    }
                }
                b'=' if self.at(q + 1) == b'>' => q += 2,
                b'(' | b'[' | b'{' => q = self.group_end(q)?,
                b'"' | b'\'' => q = self.string_end(q)?,
                b'`' => q = self.template_end(q)?,
                b';' | b')' | b']' | b'}' => return None,
                b'&' | b'|' if strict && self.at(q + 1) == c => return None,
                b'=' | b'!' | b'+' | b'-' | b'*' | b'/' | b'%' | b'^' | b'~' | b'@' | b'#'
                    if strict =>
                {
                    return None
                }
                _ => q += 1,
            }
        }
    }

    // -------------------------------------------------------------------------
    // Type erasure helpers (scan only, no output)
    // -------------------------------------------------------------------------

    /// End of one type expression starting at `p`, or `None` if none starts there.
    fn type_end(&self, p: usize) -> Option<usize> {
        let mut q = self.skip_trivia(p);
        if matches!(self.at(q), b'|' | b'&') {
            q = self.skip_trivia(q + 1);
        }
        loop {
            let end = self.type_operand(q)?;
            let next = self.skip_trivia(end);
            let c = self.at(next);
            if matches!(c, b'|' | b'&') && self.at(next + 1) != c {
                q = self.skip_trivia(next + 1);
                continue;
            }
            if self.word_at(next) == Some("extends") {
                // Conditional type: `A extends B ? C : D`.
                let cond = self.type_end(next + "extends".len())?;
                let question = self.skip_trivia(cond);
                if self.at(question) != b'?' {
                    return Some(end);
                }
                let yes = self.type_end(question + 1)?;
                let colon = self.skip_trivia(yes);
                if self.at(colon) != b':' {
                    return Some(end);
                }
                return self.type_end(colon + 1);
            }
            return Some(end);
        }
    }

    fn type_operand(&self, p: usize) -> Option<usize> {
        let mut q = self.skip_trivia(p);
        while let Some(word) = self.word_at(q) {
            let after = q + word.len();
            let is_prefix = matches!(
                word,
                "keyof" | "typeof" | "readonly" | "unique" | "infer" | "asserts" | "new"
            );
            let next = self.skip_trivia(after);
            if is_prefix && next > after && (is_ident_start(self.at(next)) || matches!(self.at(next), b'(' | b'[' | b'{' | b'<')) {
                q = next;
            } else {
                break;
            }
        }

        let c = self.at(q);
        let mut end = match c {
            b'(' => {
                let close = self.group_end(q)?;
                let next = self.skip_trivia(close);
                if self.starts(next, "=>") {
                    return self.type_end(next + 2);
                }
                close
            }
            b'{' | b'[' => self.group_end(q)?,
            b'<' => {
                let close = self.angle_end(q, false)?;
                return self.type_operand(close);
            }
            b'"' | b'\'' => self.string_end(q)?,
            b'`' => self.template_end(q)?,
            b'-' | b'0'..=b'9' => {
                let mut e = q + 1;
                while self.at(e).is_ascii_alphanumeric() || self.at(e) == b'.' || self.at(e) == b'_' {
                    e += 1;
                }
                e
            }
            _ if is_ident_start(c) => {
                let mut e = self.word_end(q);
                while self.at(e) == b'.' && is_ident_start(self.at(e + 1)) {
                    e = self.word_end(e + 1);
                }
                if self.at(e) == b'<' {
                    e = self.angle_end(e, false)?;
                }
                let next = self.skip_inline_ws(e);
                if next > e && self.word_at(next) == Some("is") {
                    return self.type_end(next + 2);
                }
                e
            }
            _ => return None,
        };

        loop {
            let next = self.skip_inline_ws(end);
            if self.at(next) == b'[' {
                end = self.group_end(next)?;
            } else {
                return Some(end);
            }
        }
    }

    /// End of a `type`/`declare` statement: a `;` or a line break at depth zero
    /// that no continuation line follows.
    fn statement_end(&self, p: usize) -> usize {
        let mut q = p;
        let mut last = 0u8;
        loop {
            let Some(&c) = self.b.get(q) else {
                return self.b.len();
            };
            match c {
                b';' => return q + 1,
                b'\n' => {
                    let next = self.skip_trivia(q);
                    let continues = matches!(last, b'=' | b'|' | b'&' | b',' | b'?' | b':' | b'>' | 0)
                        || matches!(self.at(next), b'|' | b'&' | b'?' | b':' | b'=' | b'.' | b'{');
                    if !continues {
                        return q;
                    }
                    q += 1;
                }
                b'(' | b'[' | b'{' => {
                    q = self.group_end(q).unwrap_or(self.b.len());
                    last = b')';
                }
                b'<' => {
                    q = self.angle_end(q, false).unwrap_or(q + 1);
                    last = b'>';
                }
                b'"' | b'\'' => {
                    q = self.string_end(q).unwrap_or(self.b.len());
                    last = b'"';
                }
                b'`' => {
                    q = self.template_end(q).unwrap_or(self.b.len());
                    last = b'"';
                }
                b'/' if matches!(self.at(q + 1), b'/' | b'*') => {
                    let end = self.skip_trivia(q);
                    // Keep the newline terminating a line comment visible.
                    q = if self.at(q + 1) == b'/' { self.line_end(q) } else { end };
                }
                b' ' | b'\t' | b'\r' => q += 1,
                b'=' if self.at(q + 1) == b'>' => {
                    last = b'>';
                    q += 2;
                }
                _ => {
                    last = c;
                    q += 1;
                }
            }
        }
    }

    fn interface_end(&self, p: usize) -> usize {
        let mut q = p;
        loop {
            match self.b.get(q) {
                None => return self.b.len(),
                Some(b'{') => {
                    let end = self.group_end(q).unwrap_or(self.b.len());
                    let after = self.skip_inline_ws(end);
                    return if self.at(after) == b';' { after + 1 } else { end };
                }
                Some(b'<') => q = self.angle_end(q, false).unwrap_or(q + 1),
                Some(_) => q += 1,
            }
        }
    }

    fn follows_interface(&self, end: usize) -> bool {
        let name = self.skip_trivia(end);
        if name == end || !is_ident_start(self.at(name)) {
            return false;
        }
        let next = self.skip_trivia(self.word_end(name));
        matches!(self.at(next), b'{' | b'<') || self.word_at(next) == Some("extends")
    }

    fn follows_alias(&self, end: usize) -> bool {
        let name = self.skip_trivia(end);
        if name == end || !is_ident_start(self.at(name)) {
            return false;
        }
        let next = self.skip_trivia(self.word_end(name));
        (self.at(next) == b'=' && self.at(next + 1) != b'=') || self.at(next) == b'<'
    }

    fn follows_declare(&self, end: usize) -> bool {
        let next = self.skip_inline_ws(end);
        next > end && is_ident_start(self.at(next))
    }

    fn follows_member(&self, end: usize) -> bool {
        let next = self.skip_inline_ws(end);
        next > end && (is_ident_start(self.at(next)) || matches!(self.at(next), b'[' | b'#'))
    }

    /// After a `(...)` group ending at `p`: does a function body or arrow follow?
    fn follows_function(&self, p: usize, method_like: bool, allow_return_type: bool) -> bool {
        let q = self.skip_trivia(p);
        if self.starts(q, "=>") {
            return true;
        }
        if self.at(q) == b'{' {
            return method_like;
        }
        if allow_return_type && self.at(q) == b':' {
            if let Some(end) = self.type_end(q + 1) {
                let next = self.skip_trivia(end);
                return self.starts(next, "=>") || (self.at(next) == b'{' && method_like);
            }
        }
        false
    }

    /// `<T,>` or `<T extends U>` where JSX could also start.
    fn type_params_at(&self, p: usize) -> Option<usize> {
        let name = self.skip_trivia(p + 1);
        let word = self.word_at(name)?;
        let next = self.skip_trivia(name + word.len());
        if self.at(next) == b',' || self.word_at(next) == Some("extends") {
            self.angle_end(p, false)
        } else {
            None
        }
    }

    /// Erase `: Type` (or `!: Type`) after a declaration binding.
    fn erase_binding_annotation(&mut self) -> TResult<()> {
        let mut q = self.skip_trivia(self.pos);
        if self.at(q) == b'!' && self.at(self.skip_trivia(q + 1)) == b':' {
            q = self.skip_trivia(q + 1);
        }
        if self.at(q) == b':' {
            self.pos = self
                .type_end(q + 1)
                .ok_or_else(|| self.error(q + 1, "Expected a type annotation"))?;
        }
        Ok(())
    }

    /// End of a leading `this: Type` parameter, including its trailing comma.
    fn this_param_end(&self, end: usize) -> Option<usize> {
        let colon = self.skip_trivia(end);
        if self.at(colon) != b':' {
            return None;
        }
        let after = self.skip_trivia(self.type_end(colon + 1)?);
        match self.at(after) {
            b',' => Some(self.skip_trivia(after + 1)),
            b')' => Some(after),
            _ => None,
        }
    }

    fn erase_return_type(&mut self) -> TResult<()> {
        let q = self.skip_trivia(self.pos);
        if self.at(q) == b':' {
            self.pos = self
                .type_end(q + 1)
                .ok_or_else(|| self.error(q + 1, "Expected a return type"))?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Code
    // -------------------------------------------------------------------------

    fn group(&mut self, ctx: Ctx, open: u8, close: u8) -> TResult<String> {
        self.pos += 1;
        let inner = self.transform(ctx, Some(close), Tok::Punct(open))?;
        self.pos += 1;
        let mut text = String::with_capacity(inner.len() + 2);
        text.push(open as char);
        text.push_str(&inner);
        text.push(close as char);
        Ok(text)
    }

    /// A `(` group, re-scanned as a parameter list when a body follows it.
    fn paren_group(&mut self, forced: bool, prev: &Tok) -> TResult<(String, bool)> {
        if forced {
            return Ok((self.group(Ctx::Params, b'(', b')')?, true));
        }
        let start = self.pos;
        let method_like = prev.is_plain_word();
        let allow_return_type = *prev != Tok::Punct(b'?');
        match self.group(Ctx::Code, b'(', b')') {
            Ok(text) => {
                if self.follows_function(self.pos, method_like, allow_return_type) {
                    self.pos = start;
                    Ok((self.group(Ctx::Params, b'(', b')')?, true))
                } else {
                    Ok((text, false))
                }
            }
            Err(err) => {
                self.pos = start;
                match self.group(Ctx::Params, b'(', b')') {
                    Ok(text) if self.follows_function(self.pos, method_like, allow_return_type) => {
                        Ok((text, true))
                    }
                    _ => Err(err),
                }
            }
        }
    }

    fn transform(&mut self, ctx: Ctx, stop: Option<u8>, start: Tok) -> TResult<String> {
        let src = self.src;
        let mut out = String::new();
        let mut cur = Cursor {
            prev: start,
            prev2: Tok::Start,
            newline: false,
        };
        let mut decl = Decl::None;
        let mut ann = Annot::default();
        let mut class_header = false;
        let mut after_type_params = false;

        loop {
            let p = self.pos;
            let Some(&c) = self.b.get(p) else {
                return match stop {
                    Some(close) => Err(self.error(
                        p,
                        format!("Unexpected end of input, expected `{}`", close as char),
                    )),
                    None => Ok(out),
                };
            };
            if Some(c) == stop {
                return Ok(out);
            }

            match c {
                b' ' | b'\t' | b'\r' | b'\n' | 0x0b | 0x0c => {
                    if c == b'\n' {
                        cur.newline = true;
                        // A class member without a trailing `;` ends at the line break.
                        if ctx == Ctx::ClassBody && cur.prev.ends_value() {
                            let next = self.at(self.skip_trivia(p + 1));
                            if is_ident_start(next) || matches!(next, b'[' | b'#') {
                                ann = Annot::default();
                            }
                        }
                    }
                    out.push(c as char);
                    self.pos += 1;
                }
                b'/' if self.at(p + 1) == b'/' => {
                    let end = self.line_end(p);
                    out.push_str(&src[p..end]);
                    self.pos = end;
                }
                b'/' if self.at(p + 1) == b'*' => {
                    let end = self
                        .block_comment_end(p)
                        .ok_or_else(|| self.error(p, "Unterminated comment"))?;
                    if src[p..end].contains('\n') {
                        cur.newline = true;
                    }
                    out.push_str(&src[p..end]);
                    self.pos = end;
                }
                b'"' | b'\'' => {
                    let end = self
                        .string_end(p)
                        .ok_or_else(|| self.error(p, "Unterminated string literal"))?;
                    out.push_str(&src[p..end]);
                    self.pos = end;
                    cur.push(Tok::Literal);
                }
                b'`' => {
                    let text = self.template()?;
                    out.push_str(&text);
                    cur.push(Tok::Literal);
                }
                b'/' if cur.prev.allows_operand() => {
                    let end = self.regex_end(p)?;
                    out.push_str(&src[p..end]);
                    self.pos = end;
                    cur.push(Tok::Literal);
                }
                b'0'..=b'9' => {
                    let end = self.number_end(p);
                    out.push_str(&src[p..end]);
                    self.pos = end;
                    cur.push(Tok::Literal);
                }
                b'.' if self.at(p + 1).is_ascii_digit() && !cur.prev.ends_value() => {
                    let end = self.number_end(p + 1);
                    out.push_str(&src[p..end]);
                    self.pos = end;
                    cur.push(Tok::Literal);
                }
                b'.' if self.starts(p, "...") => {
                    out.push_str("...");
                    self.pos += 3;
                    cur.push(Tok::Spread);
                }
                b'(' => {
                    let forced = after_type_params
                        || cur.prev.is_word("function")
                        || cur.prev.is_word("catch")
                        || (cur.prev2.is_word("function") && matches!(cur.prev, Tok::Word(_)));
                    after_type_params = false;
                    let prev = cur.prev.clone();
                    let (text, params) = self.paren_group(forced, &prev)?;
                    out.push_str(&text);
                    if params {
                        self.erase_return_type()?;
                    }
                    cur.push(Tok::Close(b')'));
                }
                b'[' => {
                    let text = self.group(Ctx::Code, b'[', b']')?;
                    out.push_str(&text);
                    cur.push(Tok::Close(b']'));
                    if decl == Decl::Binding {
                        self.erase_binding_annotation()?;
                        decl = Decl::Init;
                    }
                }
                b'{' => {
                    let inner = if class_header { Ctx::ClassBody } else { Ctx::Code };
                    class_header = false;
                    let text = self.group(inner, b'{', b'}')?;
                    out.push_str(&text);
                    cur.push(Tok::Close(b'}'));
                    if decl == Decl::Binding {
                        self.erase_binding_annotation()?;
                        decl = Decl::Init;
                    }
                }
                b')' | b']' | b'}' => {
                    out.push(c as char);
                    self.pos += 1;
                    cur.push(Tok::Close(c));
                }
                b'<' => {
                    // `function <T>(...)`: type parameters of an anonymous function.
                    if cur.prev.is_word("function") {
                        if let Some(end) = self.angle_end(p, false) {
                            self.pos = end;
                            after_type_params = true;
                            continue;
                        }
                    }
                    if cur.prev.allows_operand()
                        && (is_ident_start(self.at(p + 1)) || self.at(p + 1) == b'>')
                    {
                        if let Some(end) = self.type_params_at(p) {
                            self.pos = end;
                            after_type_params = true;
                            continue;
                        }
                        let element = self.jsx_element()?;
                        out.push_str(&element);
                        cur.push(Tok::Close(b')'));
                        continue;
                    }
                    if class_header || cur.prev.ends_value() {
                        if let Some(end) = self.angle_end(p, !class_header) {
                            if class_header || matches!(self.at(end), b'(' | b'`') {
                                self.pos = end;
                                continue;
                            }
                        }
                    }
                    out.push('<');
                    self.pos += 1;
                    cur.push(Tok::Punct(b'<'));
                }
                b'=' => {
                    if self.at(p + 1) == b'>' {
                        out.push_str("=>");
                        self.pos += 2;
                        cur.push(Tok::Punct(b'>'));
                    } else if self.at(p + 1) == b'=' {
                        let len = if self.at(p + 2) == b'=' { 3 } else { 2 };
                        out.push_str(&src[p..p + len]);
                        self.pos += len;
                        cur.push(Tok::Punct(b'='));
                    } else {
                        out.push('=');
                        self.pos += 1;
                        cur.push(Tok::Punct(b'='));
                        if ctx != Ctx::Code {
                            ann.in_init = true;
                        }
                    }
                }
                b'?' => {
                    if self.at(p + 1) == b'.' && !self.at(p + 2).is_ascii_digit() {
                        out.push_str("?.");
                        self.pos += 2;
                        cur.push(Tok::Punct(b'.'));
                        continue;
                    }
                    if self.at(p + 1) == b'?' {
                        let len = if self.at(p + 2) == b'=' { 3 } else { 2 };
                        out.push_str(&src[p..p + len]);
                        self.pos += len;
                        cur.push(Tok::Punct(b'|'));
                        continue;
                    }
                    let next = self.at(self.skip_trivia(p + 1));
                    let optional_marker = match ctx {
                        Ctx::Params => {
                            !ann.in_init
                                && matches!(cur.prev, Tok::Word(_))
                                && matches!(next, b':' | b',' | b')' | b'=')
                        }
                        Ctx::ClassBody => !ann.in_init && matches!(next, b':' | b'(' | b';' | b'='),
                        Ctx::Code => false,
                    };
                    if optional_marker {
                        self.pos += 1;
                        continue;
                    }
                    if ctx != Ctx::Code && ann.in_init {
                        ann.ternary += 1;
                    }
                    out.push('?');
                    self.pos += 1;
                    cur.push(Tok::Punct(b'?'));
                }
                b':' => {
                    let annotation = match ctx {
                        Ctx::Params => !ann.in_init,
                        Ctx::ClassBody => ann.ternary == 0,
                        Ctx::Code => false,
                    };
                    if annotation {
                        self.pos = self
                            .type_end(p + 1)
                            .ok_or_else(|| self.error(p + 1, "Expected a type annotation"))?;
                        if ctx == Ctx::ClassBody {
                            ann = Annot::default();
                        }
                        continue;
                    }
                    ann.ternary = ann.ternary.saturating_sub(1);
                    out.push(':');
                    self.pos += 1;
                    cur.push(Tok::Punct(b':'));
                }
                b'!' => {
                    let glued = p > 0 && !self.at(p - 1).is_ascii_whitespace();
                    if glued && cur.prev.ends_value() && self.at(p + 1) != b'=' {
                        // Non-null assertion.
                        self.pos += 1;
                        continue;
                    }
                    out.push('!');
                    self.pos += 1;
                    cur.push(Tok::Punct(b'!'));
                }
                b',' => {
                    if ctx == Ctx::Params {
                        ann = Annot::default();
                    }
                    if decl != Decl::None {
                        decl = Decl::Binding;
                    }
                    out.push(',');
                    self.pos += 1;
                    cur.push(Tok::Punct(b','));
                }
                b';' => {
                    decl = Decl::None;
                    if ctx == Ctx::ClassBody {
                        ann = Annot::default();
                    }
                    out.push(';');
                    self.pos += 1;
                    cur.push(Tok::Punct(b';'));
                }
                _ if is_ident_start(c) => {
                    let end = self.word_end(p);
                    let word = &src[p..end];
                    let member = cur.prev == Tok::Punct(b'.');
                    if !member {
                        let stmt = cur.at_statement_start();
                        let erase_to = match word {
                            "interface" if stmt && self.follows_interface(end) => {
                                Some(self.interface_end(end))
                            }
                            "type" if stmt && self.follows_alias(end) => Some(self.statement_end(end)),
                            "declare" if stmt && self.follows_declare(end) => {
                                Some(self.statement_end(end))
                            }
                            "this" if ctx == Ctx::Params && cur.prev == Tok::Punct(b'(') => {
                                self.this_param_end(end)
                            }
                            "abstract" if self.word_at(self.skip_trivia(end)) == Some("class") => {
                                Some(self.skip_trivia(end))
                            }
                            w if ctx == Ctx::ClassBody
                                && !ann.in_init
                                && TS_MODIFIERS.contains(&w)
                                && self.follows_member(end) =>
                            {
                                Some(self.skip_inline_ws(end))
                            }
                            "as" | "satisfies" if cur.prev.ends_value() => {
                                let erased = self.type_end(end);
                                if erased.is_some() {
                                    while out.ends_with(' ') || out.ends_with('\t') {
                                        out.pop();
                                    }
                                }
                                erased
                            }
                            "implements" if class_header => Some(
                                self.b[end..]
                                    .iter()
                                    .position(|&c| c == b'{')
                                    .map(|i| end + i)
                                    .unwrap_or(self.b.len()),
                            ),
                            _ => None,
                        };
                        if let Some(to) = erase_to {
                            self.pos = to;
                            continue;
                        }
                    }

                    out.push_str(word);
                    self.pos = end;
                    if member {
                        cur.push(Tok::Property);
                        continue;
                    }
                    cur.push(Tok::Word(word.to_string()));
                    match word {
                        "const" | "let" | "var" => decl = Decl::Binding,
                        "class" => class_header = true,
                        _ if decl == Decl::Binding && !RESERVED.contains(&word) => {
                            self.erase_binding_annotation()?;
                            decl = Decl::Init;
                        }
                        _ => {}
                    }
                }
                _ => {
                    // Multi-byte chars outside identifiers only occur in strings
                    // and comments; copy any stray byte run whole.
                    let ch_len = src[p..].chars().next().map(char::len_utf8).unwrap_or(1);
                    out.push_str(&src[p..p + ch_len]);
                    self.pos += ch_len;
                    cur.push(Tok::Punct(c));
                }
            }
        }
    }

    fn template(&mut self) -> TResult<String> {
        let src = self.src;
        let start = self.pos;
        let mut out = String::from("`");
        let mut q = self.pos + 1;
        loop {
            match self.b.get(q) {
                None => return Err(self.error(start, "Unterminated template literal")),
                Some(b'\\') => {
                    let end = (q + 2).min(self.b.len());
                    out.push_str(&src[q..end]);
                    q = end;
                }
                Some(b'`') => {
                    out.push('`');
                    self.pos = q + 1;
                    return Ok(out);
                }
                Some(b'$') if self.at(q + 1) == b'{' => {
                    self.pos = q + 2;
                    let inner = self.transform(Ctx::Code, Some(b'}'), Tok::Punct(b'{'))?;
                    out.push_str("${");
                    out.push_str(&inner);
                    out.push('}');
                    q = self.pos + 1;
                }
                Some(_) => {
                    let ch_len = src[q..].chars().next().map(char::len_utf8).unwrap_or(1);
                    out.push_str(&src[q..q + ch_len]);
                    q += ch_len;
                }
            }
        }
    }

    fn regex_end(&self, p: usize) -> TResult<usize> {
        let mut q = p + 1;
        let mut in_class = false;
        loop {
            match self.b.get(q) {
                None | Some(b'\n') => return Err(self.error(p, "Unterminated regular expression")),
                Some(b'\\') => q += 2,
                Some(b'[') => {
                    in_class = true;
                    q += 1;
                }
                Some(b']') => {
                    in_class = false;
                    q += 1;
                }
                Some(b'/') if !in_class => return Ok(self.word_end(q + 1)),
                Some(_) => q += 1,
            }
        }
    }

    fn number_end(&self, p: usize) -> usize {
        let hex = self.starts(p, "0x") || self.starts(p, "0X");
        let mut q = p;
        loop {
            let c = self.at(q);
            if c.is_ascii_alphanumeric() || c == b'_' || c == b'.' {
                q += 1;
            } else if matches!(c, b'+' | b'-') && !hex && matches!(self.at(q - 1), b'e' | b'E') {
                q += 1;
            } else {
                return q;
            }
        }
    }

    // -------------------------------------------------------------------------
    // JSX
    // -------------------------------------------------------------------------

    fn jsx_element(&mut self) -> TResult<String> {
        if self.jsx_depth == MAX_JSX_DEPTH {
            return Err(self.error(
                self.pos,
                format!("JSX elements nested deeper than {MAX_JSX_DEPTH} levels"),
            ));
        }
        self.jsx_depth += 1;
        let element = self.jsx_tree();
        self.jsx_depth -= 1;
        element
    }

    fn jsx_tree(&mut self) -> TResult<String> {
        let open_at = self.pos;
        self.pos += 1;
        if self.at(self.pos) == b'>' {
            self.pos += 1;
            let children = self.jsx_children(open_at, None)?;
            return Ok(self.element_call(&self.opts.pragma_frag.clone(), "null", &children));
        }

        let name = self.jsx_name()?;
        let mut props: Vec<String> = Vec::new();
        let self_closing = loop {
            self.pos = self.skip_trivia(self.pos);
            let p = self.pos;
            match self.b.get(p) {
                None => return Err(self.error(open_at, format!("Unterminated JSX element <{name}>"))),
                Some(b'/') if self.at(p + 1) == b'>' => {
                    self.pos += 2;
                    break true;
                }
                Some(b'>') => {
                    self.pos += 1;
                    break false;
                }
                Some(b'{') => {
                    let q = self.skip_trivia(p + 1);
                    if !self.starts(q, "...") {
                        return Err(self.error(p, "Expected `...` in JSX spread attribute"));
                    }
                    self.pos = q + 3;
                    let expr = self.transform(Ctx::Code, Some(b'}'), Tok::Spread)?;
                    self.pos += 1;
                    props.push(format!("...{}", expr.trim()));
                }
                Some(&c) if is_ident_start(c) => {
                    let mut end = self.word_end(p);
                    while matches!(self.at(end), b'-' | b':') || is_ident_char(self.at(end)) {
                        end += 1;
                    }
                    let attr = self.src[p..end].to_string();
                    let eq = self.skip_trivia(end);
                    if self.at(eq) != b'=' {
                        self.pos = end;
                        props.push(format!("{}: true", js_string(&attr)));
                        continue;
                    }
                    self.pos = self.skip_trivia(eq + 1);
                    let value = self.jsx_attr_value(&attr)?;
                    props.push(format!("{}: {}", js_string(&attr), value));
                }
                Some(_) => return Err(self.error(p, format!("Unexpected token in JSX element <{name}>"))),
            }
        };

        let children = if self_closing {
            Vec::new()
        } else {
            self.jsx_children(open_at, Some(&name))?
        };
        let intrinsic = !name.contains('.')
            && (name.as_bytes()[0].is_ascii_lowercase() || name.contains('-') || name.contains(':'));
        let type_expr = if intrinsic { js_string(&name) } else { name.clone() };
        let props_expr = if props.is_empty() {
            "null".to_string()
        } else {
            format!("{{{}}}", props.join(", "))
        };
        Ok(self.element_call(&type_expr, &props_expr, &children))
    }

    fn element_call(&self, type_expr: &str, props: &str, children: &[String]) -> String {
        let mut call = format!("{}({}, {}", self.opts.pragma, type_expr, props);
        for child in children {
            call.push_str(", ");
            call.push_str(child);
        }
        call.push(')');
        call
    }

    fn jsx_name(&mut self) -> TResult<String> {
        let start = self.pos;
        let mut q = start;
        loop {
            if !is_ident_start(self.at(q)) {
                return Err(self.error(q, "Expected a JSX tag name"));
            }
            q = self.word_end(q);
            while self.at(q) == b'-' || is_ident_char(self.at(q)) {
                q += 1;
            }
            if matches!(self.at(q), b'.' | b':') {
                q += 1;
            } else {
                break;
            }
        }
        self.pos = q;
        Ok(self.src[start..q].to_string())
    }

    fn jsx_attr_value(&mut self, attr: &str) -> TResult<String> {
        let p = self.pos;
        match self.at(p) {
            quote @ (b'"' | b'\'') => {
                let close = self.b[p + 1..]
                    .iter()
                    .position(|&c| c == quote)
                    .map(|i| p + 1 + i)
                    .ok_or_else(|| self.error(p, "Unterminated JSX attribute string"))?;
                self.pos = close + 1;
                Ok(js_string(&decode_entities(&self.src[p + 1..close])))
            }
            b'{' => {
                if self.at(self.skip_trivia(p + 1)) == b'}' {
                    return Err(self.error(
                        p,
                        format!("JSX attribute `{attr}` must be assigned a non-empty expression"),
                    ));
                }
                self.pos = p + 1;
                let expr = self.transform(Ctx::Code, Some(b'}'), Tok::Punct(b'{'))?;
                self.pos += 1;
                Ok(expr.trim().to_string())
            }
            b'<' => self.jsx_element(),
            _ => Err(self.error(p, format!("Expected a value for JSX attribute `{attr}`"))),
        }
    }

    fn jsx_children(&mut self, open_at: usize, name: Option<&str>) -> TResult<Vec<String>> {
        let mut children = Vec::new();
        let display = name.unwrap_or("");
        loop {
            let p = self.pos;
            match self.b.get(p) {
                None => {
                    return Err(self.error(open_at, format!("Unterminated JSX contents for <{display}>")))
                }
                Some(b'<') if self.at(p + 1) == b'/' => {
                    let q = self.skip_trivia(p + 2);
                    self.pos = q;
                    let closing = if self.at(q) == b'>' {
                        String::new()
                    } else {
                        self.jsx_name()?
                    };
                    let gt = self.skip_trivia(self.pos);
                    if self.at(gt) != b'>' || closing != display {
                        return Err(self.error(
                            p,
                            format!("Expected corresponding JSX closing tag for <{display}>"),
                        ));
                    }
                    self.pos = gt + 1;
                    return Ok(children);
                }
                Some(b'<') => children.push(self.jsx_element()?),
                Some(b'{') => {
                    let q = self.skip_trivia(p + 1);
                    if self.at(q) == b'}' {
                        self.pos = q + 1;
                        continue;
                    }
                    if self.starts(q, "...") {
                        self.pos = q + 3;
                        let expr = self.transform(Ctx::Code, Some(b'}'), Tok::Spread)?;
                        self.pos += 1;
                        children.push(format!("...{}", expr.trim()));
                    } else {
                        self.pos = p + 1;
                        let expr = self.transform(Ctx::Code, Some(b'}'), Tok::Punct(b'{'))?;
                        self.pos += 1;
                        children.push(expr.trim().to_string());
                    }
                }
                Some(_) => {
                    let end = self.b[p..]
                        .iter()
                        .position(|&c| c == b'<' || c == b'{')
                        .map(|i| p + i)
                        .unwrap_or(self.b.len());
                    let text = fold_jsx_text(&decode_entities(&self.src[p..end]));
                    if !text.is_empty() {
                        children.push(js_string(&text));
                    }
                    self.pos = end;
                }
            }
        }
    }
}

/// JSX text whitespace rules: lines are trimmed where they meet a line break,
/// blank lines vanish and the rest join with single spaces.
fn fold_jsx_text(text: &str) -> String {
    let lines: Vec<String> = text
        .split('\n')
        .map(|l| l.trim_end_matches('\r').replace('\t', " "))
        .collect();
    let last_non_empty = lines.iter().rposition(|l| l.chars().any(|c| c != ' '));
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        let mut trimmed: &str = line;
        if i != 0 {
            trimmed = trimmed.trim_start_matches(' ');
        }
        if i != lines.len() - 1 {
            trimmed = trimmed.trim_end_matches(' ');
        }
        if trimmed.is_empty() {
            continue;
        }
        out.push_str(trimmed);
        if Some(i) != last_non_empty {
            out.push(' ');
        }
    }
    out
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| entity(&tail[1..semi]).map(|ch| (ch, semi + 1)));
        match decoded {
            Some((ch, len)) => {
                out.push(ch);
                rest = &tail[len..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '©',
        "hellip" => '…',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(src: &str) -> String {
        transpile(src, &TranspileOptions::default()).unwrap()
    }

    #[test]
    fn plain_javascript_passes_through() {
        let src = "const re = /a\\/b[/]/g;\nlet half = total / 2;\nconst s = `x${a + `y${b}`}`;";
        assert_eq!(tx(src), src);
    }

    #[test]
    fn intrinsic_and_component_elements() {
        assert_eq!(
            tx("const el = <div className=\"x\">Hi {name}</div>;"),
            "const el = React.createElement(\"div\", {\"className\": \"x\"}, \"Hi \", name);"
        );
        assert_eq!(
            tx("render(<UI.Button primary {...rest} onClick={() => go(1)} />)"),
            "render(React.createElement(UI.Button, {\"primary\": true, ...rest, \"onClick\": () => go(1)}))"
        );
    }

    #[test]
    fn fragments_nested_elements_and_comments() {
        assert_eq!(
            tx("const f = <><b>x</b>{/* note */}</>;"),
            "const f = React.createElement(React.Fragment, null, React.createElement(\"b\", null, \"x\"));"
        );
    }

    #[test]
    fn jsx_text_whitespace_and_entities() {
        let src = "const p = (\n  <p>\n    Fish &amp; chips\n    today\n  </p>\n);";
        assert_eq!(
            tx(src),
            "const p = (\n  React.createElement(\"p\", null, \"Fish & chips today\")\n);"
        );
    }

    #[test]
    fn mismatched_closing_tag_is_an_error() {
        let err = transpile("const a = <div><span></div>;", &TranspileOptions::default()).unwrap_err();
        assert!(err.message.contains("closing tag for <span>"), "{err}");
        assert_eq!(err.line, 1);
    }

    #[test]
    fn custom_pragma() {
        let opts = TranspileOptions {
            pragma: "h".into(),
            pragma_frag: "Frag".into(),
        };
        assert_eq!(
            transpile("x = <><i /></>", &opts).unwrap(),
            "x = h(Frag, null, h(\"i\", null))"
        );
    }

    #[test]
    fn declarations_and_aliases_are_erased() {
        assert_eq!(tx("interface P { a: string }\nconst x = 1;"), "\nconst x = 1;");
        assert_eq!(tx("type A = 'a' | 'b';\nlet v = 2;"), "\nlet v = 2;");
        assert_eq!(
            tx("type Props = {\n  title: string\n}\nconst t = 1;"),
            "\nconst t = 1;"
        );
    }

    #[test]
    fn annotations_are_erased() {
        assert_eq!(tx("const a: number = 1;"), "const a = 1;");
        assert_eq!(
            tx("function add(a: number, b?: number): number { return a + (b ?? 0); }"),
            "function add(a, b) { return a + (b ?? 0); }"
        );
        assert_eq!(
            tx("const Button = ({ label }: Props) => <button>{label}</button>;"),
            "const Button = ({ label }) => React.createElement(\"button\", null, label);"
        );
        assert_eq!(
            tx("const f = async (e: Event): Promise<void> => {};"),
            "const f = async (e) => {};"
        );
        assert_eq!(
            tx("function k(this: any, a: number) { return a; }"),
            "function k(a) { return a; }"
        );
        assert_eq!(tx("function h(this: Window) {}"), "function h() {}");
    }

    #[test]
    fn casts_generics_and_non_null() {
        assert_eq!(
            tx("const [v, setV] = useState<string | null>(null);"),
            "const [v, setV] = useState(null);"
        );
        assert_eq!(tx("const n = (x as any).length;"), "const n = (x).length;");
        assert_eq!(tx("el!.focus();"), "el.focus();");
        assert_eq!(tx("const ok = a !== b && !c;"), "const ok = a !== b && !c;");
        assert_eq!(tx("const cfg = { a: 1 } satisfies Config;"), "const cfg = { a: 1 };");
        assert_eq!(
            tx("const id = function <T>(a: T): T { return a; };"),
            "const id = function (a) { return a; };"
        );
    }

    #[test]
    fn jsx_nesting_is_bounded() {
        let nested = |n: usize| format!("x = {}{}", "<i>".repeat(n), "</i>".repeat(n));
        assert!(transpile(&nested(MAX_JSX_DEPTH), &TranspileOptions::default()).is_ok());
        let err = transpile(&nested(MAX_JSX_DEPTH + 1), &TranspileOptions::default()).unwrap_err();
        assert!(err.message.contains("nested deeper"), "{err}");
    }

    #[test]
    fn ternaries_and_object_literals_keep_colons() {
        let src = "const v = ok ? (a) : b;\nconst o = { k: 1, n: f(x) };";
        assert_eq!(tx(src), src);
    }

    #[test]
    fn class_members_lose_modifiers_and_types() {
        let src = "class Box extends React.Component<Props> {\n  private count: number = 0;\n  label?: string;\n  render() { return <div>{this.count}</div>; }\n}";
        assert_eq!(
            tx(src),
            "class Box extends React.Component {\n  count = 0;\n  label;\n  render() { return React.createElement(\"div\", null, this.count); }\n}"
        );
    }

    #[test]
    fn unsupported_forms_pass_through() {
        assert_eq!(tx("enum Color { Red }"), "enum Color { Red }");
    }

    #[test]
    fn fold_rules() {
        assert_eq!(fold_jsx_text("  a  "), "  a  ");
        assert_eq!(fold_jsx_text("\n   \n"), "");
        assert_eq!(fold_jsx_text("a\n  b\n"), "a b");
    }
}
