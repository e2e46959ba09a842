//! The input buffer: owns the code-point sequence, compiles and caches the
//! whitespace/comment regexes, and implements literal/regex matching with
//! name-guarding. Grounded on `apollo-parser::lexer::Cursor`'s role of
//! walking an input slice and reporting consumed length, generalized from a
//! fixed GraphQL token grammar to caller-supplied literals and patterns.

mod location;

pub use location::LineInfo;
use location::LineIndex;

use regex::Regex;

/// Whitespace recognition mode. `None` disables whitespace skipping
/// entirely (every code point is significant); the other two variants match
/// spec §4.1's "regex, character set, empty, or default" options for
/// `ParseConfig::whitespace`.
#[derive(Debug, Clone)]
pub enum Whitespace {
    /// The Grako default: spaces, tabs, and newlines.
    Default,
    None,
    Pattern(Regex),
}

impl Whitespace {
    /// Build a whitespace matcher from an explicit character set, compiled
    /// to the equivalent anchored character-class regex.
    pub fn from_chars(chars: &str) -> Self {
        let escaped: String = chars.chars().map(|c| regex::escape(&c.to_string())).collect();
        Whitespace::Pattern(Regex::new(&format!("^[{escaped}]+")).expect("valid char class"))
    }

}

/// A comment captured while skipping whitespace, recorded by line for
/// consumers that want to reattach comments to nearby AST nodes (spec
/// §4.1's "comment recovery").
#[derive(Debug, Clone, Default)]
pub struct CommentIndex {
    /// Comments appearing on their own line(s) before line `n`.
    pub inline: Vec<(usize, String)>,
    /// End-of-line comments trailing the content of line `n`.
    pub trailing: Vec<(usize, String)>,
}

pub struct Scanner {
    codepoints: Vec<char>,
    pos: usize,
    filename: String,
    lines: LineIndex,

    /// Compiled once in [`Scanner::with_config`] — `Whitespace::Default`'s
    /// pattern is fixed, and `Whitespace::Pattern` already carries its own
    /// compiled `Regex`, so neither needs recompiling per skip.
    whitespace_re: Option<Regex>,
    comments_re: Option<Regex>,
    eol_comments_re: Option<Regex>,
    nameguard: bool,
    ignorecase: bool,
    namechars: String,

    pub comments: CommentIndex,
}

fn expand_tabs(input: &str, tabwidth: Option<usize>) -> String {
    let Some(width) = tabwidth else {
        return input.to_string();
    };
    if width == 0 {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut col = 0usize;
    for c in input.chars() {
        match c {
            '\t' => {
                let spaces = width - (col % width);
                out.extend(std::iter::repeat(' ').take(spaces));
                col += spaces;
            }
            '\n' => {
                out.push(c);
                col = 0;
            }
            _ => {
                out.push(c);
                col += 1;
            }
        }
    }
    out
}

/// Inline `#include :: "file"` directives by textual substitution,
/// returning the expanded text plus the (start_line, end_line, filename)
/// ranges contributed by each include, so the caller can extend the
/// per-line filename map.
pub fn preprocess_includes<F>(source: &str, name: &str, mut load: F) -> (String, Vec<(usize, usize, String)>)
where
    F: FnMut(&str) -> Option<String>,
{
    let include_re = Regex::new(r#"(?m)^\s*#include\s*::\s*"([^"]+)"\s*$"#).unwrap();
    let mut out = String::new();
    let mut ranges = Vec::new();
    let mut last_end = 0;
    let mut line_no = 0usize;
    for cap in include_re.captures_iter(source) {
        let m = cap.get(0).unwrap();
        out.push_str(&source[last_end..m.start()]);
        line_no += source[last_end..m.start()].matches('\n').count();
        let path = &cap[1];
        if let Some(included) = load(path) {
            let start_line = line_no;
            let included_lines = included.matches('\n').count() + 1;
            out.push_str(&included);
            if !included.ends_with('\n') {
                out.push('\n');
            }
            line_no += included_lines;
            ranges.push((start_line, line_no, path.to_string()));
        }
        last_end = m.end();
    }
    out.push_str(&source[last_end..]);
    let _ = name;
    (out, ranges)
}

impl Scanner {
    pub fn new(input: &str, filename: &str) -> Self {
        Self::with_config(input, filename, Whitespace::Default, None, None, true, false, None, "")
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_config(
        input: &str,
        filename: &str,
        whitespace: Whitespace,
        comments_re: Option<Regex>,
        eol_comments_re: Option<Regex>,
        nameguard: bool,
        ignorecase: bool,
        tabwidth: Option<usize>,
        namechars: &str,
    ) -> Self {
        let expanded = expand_tabs(input, tabwidth);
        let codepoints: Vec<char> = expanded.chars().collect();
        let lines = LineIndex::new(&codepoints, filename);
        let whitespace_re = match &whitespace {
            Whitespace::Default => {
                Some(Regex::new(r"^[ \t\r\n]+").expect("default whitespace pattern is valid"))
            }
            Whitespace::None => None,
            Whitespace::Pattern(re) => Some(re.clone()),
        };
        Self {
            codepoints,
            pos: 0,
            filename: filename.to_string(),
            lines,
            whitespace_re,
            comments_re,
            eol_comments_re,
            nameguard,
            ignorecase,
            namechars: namechars.to_string(),
            comments: CommentIndex::default(),
        }
    }

    pub fn extend_filename_ranges(&mut self, ranges: &[(usize, usize, String)]) {
        for (start, end, name) in ranges {
            self.lines.set_filename_range(*start, *end, name);
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn goto(&mut self, pos: usize) {
        self.pos = pos.min(self.codepoints.len());
    }

    pub fn len(&self) -> usize {
        self.codepoints.len()
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.codepoints.len()
    }

    pub fn at_eol(&self) -> bool {
        self.at_end() || self.codepoints[self.pos] == '\n'
    }

    pub fn current(&self) -> Option<char> {
        self.codepoints.get(self.pos).copied()
    }

    pub fn line_info(&self, pos: usize) -> LineInfo {
        self.lines.locate(pos.min(self.codepoints.len()), &self.codepoints)
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    fn is_name_char(&self, c: char) -> bool {
        c.is_alphanumeric() || c == '_' || self.namechars.contains(c)
    }

    /// Compare the next `literal.chars().count()` code points against
    /// `literal`. On success, advance past it and return the matched text.
    /// `None` as a literal means "assert end of input".
    pub fn match_literal(&mut self, literal: Option<&str>) -> Option<String> {
        let Some(literal) = literal else {
            return if self.at_end() { Some(String::new()) } else { None };
        };
        if literal.is_empty() {
            return Some(String::new());
        }
        let want: Vec<char> = literal.chars().collect();
        let end = self.pos + want.len();
        if end > self.codepoints.len() {
            return None;
        }
        let got = &self.codepoints[self.pos..end];
        let matches = if self.ignorecase {
            got.iter()
                .zip(want.iter())
                .all(|(a, b)| a.to_lowercase().eq(b.to_lowercase()))
        } else {
            got == want.as_slice()
        };
        if !matches {
            return None;
        }
        if self.nameguard && self.literal_needs_name_guard(&want) {
            let next = self.codepoints.get(end).copied();
            if next.is_some_and(|c| self.is_name_char(c)) {
                return None;
            }
        }
        self.pos = end;
        Some(got.iter().collect())
    }

    /// A literal needs the name-guard when it starts with a name character
    /// and is itself entirely made of name characters (i.e. looks like an
    /// identifier/keyword rather than punctuation).
    fn literal_needs_name_guard(&self, want: &[char]) -> bool {
        want.first().is_some_and(|&c| self.is_name_char(c) && c.is_alphabetic())
            && want.iter().all(|&c| self.is_name_char(c))
    }

    /// Anchored regex match at the current position; advance by the
    /// matched length on success.
    pub fn match_regex(&mut self, pattern: &Regex) -> Option<String> {
        let rest: String = self.codepoints[self.pos..].iter().collect();
        let m = pattern.find(&rest)?;
        if m.start() != 0 {
            return None;
        }
        let matched = m.as_str().to_string();
        self.pos += matched.chars().count();
        Some(matched)
    }

    fn skip_matching(&mut self, re: &Regex) -> Option<String> {
        let rest: String = self.codepoints[self.pos..].iter().collect();
        let m = re.find(&rest)?;
        if m.start() != 0 || m.end() == 0 {
            return None;
        }
        let matched = m.as_str().to_string();
        self.pos += matched.chars().count();
        Some(matched)
    }

    /// Repeatedly skip end-of-line comments, block comments, and whitespace
    /// until none of the three advance the position. Captured comment text
    /// is appended to [`Scanner::comments`], indexed by line.
    pub fn next_token(&mut self) {
        loop {
            let before = self.pos;
            let line = self.line_info(self.pos).line;
            if let Some(re) = self.eol_comments_re.clone() {
                if let Some(text) = self.skip_matching(&re) {
                    self.comments.trailing.push((line, text));
                }
            }
            if let Some(re) = self.comments_re.clone() {
                if let Some(text) = self.skip_matching(&re) {
                    self.comments.inline.push((line, text));
                }
            }
            if let Some(re) = self.whitespace_re.clone() {
                self.skip_matching(&re);
            }
            if self.pos == before {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_literal_and_advances() {
        let mut s = Scanner::new("abc", "t");
        assert_eq!(s.match_literal(Some("ab")), Some("ab".to_string()));
        assert_eq!(s.pos(), 2);
    }

    #[test]
    fn nameguard_rejects_prefix_of_identifier() {
        let mut s = Scanner::new("ifelse", "t");
        assert_eq!(s.match_literal(Some("if")), None);
        let mut s2 = Scanner::new("if else", "t");
        assert_eq!(s2.match_literal(Some("if")), Some("if".to_string()));
    }

    #[test]
    fn nameguard_does_not_apply_to_punctuation() {
        let mut s = Scanner::new("((x", "t");
        assert_eq!(s.match_literal(Some("(")), Some("(".to_string()));
    }

    #[test]
    fn next_token_skips_default_whitespace() {
        let mut s = Scanner::new("   \n\tabc", "t");
        s.next_token();
        assert_eq!(s.current(), Some('a'));
    }

    #[test]
    fn eof_literal_asserts_end() {
        let mut s = Scanner::new("", "t");
        assert_eq!(s.match_literal(None), Some(String::new()));
        let mut s2 = Scanner::new("x", "t");
        assert_eq!(s2.match_literal(None), None);
    }
}
