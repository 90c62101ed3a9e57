//! Template scanner.
//!
//! Splits template source into literal content and mustache tags, then
//! tokenizes the inside of each tag. Whitespace control (`{{~` / `~}}`) is
//! applied here so the parser only ever sees trimmed content.

use super::SyntaxError;

/// What opened a mustache tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TagKind {
    /// `{{expr}}`
    Escaped,
    /// `{{{expr}}}` or `{{&expr}}`
    Unescaped,
    /// `{{#expr}}`
    BlockOpen,
    /// `{{#>name}}`
    PartialBlockOpen,
    /// `{{^expr}}` (or `{{^}}` used as else)
    InverseOpen,
    /// `{{/expr}}`
    Close,
    /// `{{>name}}`
    Partial,
    /// `{{! ... }}` and `{{!-- ... --}}`
    Comment,
}

/// A scanned mustache tag with its tokenized contents.
#[derive(Debug, Clone)]
pub(crate) struct Tag {
    pub(crate) kind: TagKind,
    pub(crate) tokens: Vec<Token>,
    pub(crate) line: usize,
    pub(crate) column: usize,
}

/// Top-level scan result: literal text or a tag.
#[derive(Debug, Clone)]
pub(crate) enum Segment {
    Content(String),
    Tag(Tag),
}

/// Token inside a mustache.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Id(String),
    /// `.` or `/` between path segments
    Sep(char),
    /// `..`
    DotDot,
    /// `@` data prefix
    At,
    Str(String),
    Num(String),
    Bool(bool),
    Null,
    Undefined,
    OpenParen,
    CloseParen,
    Equals,
    Pipe,
}

/// Scan `source` into content and tag segments.
pub(crate) fn scan(source: &str) -> Result<Vec<Segment>, SyntaxError> {
    let mut segments = Vec::new();
    // (segment index, strip before, strip after)
    let mut strips: Vec<(usize, bool, bool)> = Vec::new();
    let mut content = String::new();
    let bytes = source.as_bytes();
    let mut pos = 0;

    while pos < source.len() {
        let rest = &source[pos..];
        if rest.starts_with("\\{{") {
            content.push_str("{{");
            pos += 3;
            continue;
        }
        if !rest.starts_with("{{") {
            let next = rest.find(['{', '\\']).map_or(rest.len(), |i| i.max(1));
            content.push_str(&rest[..next]);
            pos += next;
            continue;
        }

        if !content.is_empty() {
            segments.push(Segment::Content(std::mem::take(&mut content)));
        }

        let (line, column) = line_col(source, pos);
        let mut cursor = pos + 2;
        let mut strip_before = false;
        if bytes.get(cursor) == Some(&b'~') {
            strip_before = true;
            cursor += 1;
        }

        let (kind, closer) = match bytes.get(cursor) {
            Some(b'{') => {
                cursor += 1;
                (TagKind::Unescaped, "}}}")
            }
            Some(b'&') => {
                cursor += 1;
                (TagKind::Unescaped, "}}")
            }
            Some(b'#') if bytes.get(cursor + 1) == Some(&b'>') => {
                cursor += 2;
                (TagKind::PartialBlockOpen, "}}")
            }
            Some(b'#') => {
                cursor += 1;
                (TagKind::BlockOpen, "}}")
            }
            Some(b'^') => {
                cursor += 1;
                (TagKind::InverseOpen, "}}")
            }
            Some(b'/') => {
                cursor += 1;
                (TagKind::Close, "}}")
            }
            Some(b'>') => {
                cursor += 1;
                (TagKind::Partial, "}}")
            }
            Some(b'!') if source[cursor..].starts_with("!--") => {
                cursor += 3;
                (TagKind::Comment, "--}}")
            }
            Some(b'!') => {
                cursor += 1;
                (TagKind::Comment, "}}")
            }
            _ => (TagKind::Escaped, "}}"),
        };

        let Some((mut inner, end, mut strip_after)) = find_close(source, cursor, closer) else {
            return Err(SyntaxError::new("Unclosed mustache, expected '}}'", line, column));
        };
        if let Some(stripped) = inner.trim_end().strip_suffix('~') {
            inner = stripped;
            strip_after = true;
        }

        let tokens = if kind == TagKind::Comment {
            Vec::new()
        } else {
            tokenize(inner, line, column)?
        };

        strips.push((segments.len(), strip_before, strip_after));
        segments.push(Segment::Tag(Tag {
            kind,
            tokens,
            line,
            column,
        }));
        pos = end;
    }

    if !content.is_empty() {
        segments.push(Segment::Content(content));
    }

    apply_whitespace_control(&mut segments, &strips);
    Ok(segments)
}

/// Locate the end of a tag starting at `cursor`.
///
/// Returns the tag's inner text, the offset just past the closer and whether
/// the closer itself carried a `~`. Triple-stash tags close with `}}}` or `}~}}`.
fn find_close<'a>(source: &'a str, cursor: usize, closer: &str) -> Option<(&'a str, usize, bool)> {
    let rest = &source[cursor..];
    if closer != "}}}" {
        let offset = rest.find(closer)?;
        return Some((&rest[..offset], cursor + offset + closer.len(), false));
    }

    let mut search_from = 0;
    while let Some(found) = rest[search_from..].find('}') {
        let idx = search_from + found;
        let after = &rest[idx + 1..];
        if after.starts_with("}}") {
            return Some((&rest[..idx], cursor + idx + 3, false));
        }
        if after.starts_with("~}}") {
            return Some((&rest[..idx], cursor + idx + 4, true));
        }
        search_from = idx + 1;
    }
    None
}

fn apply_whitespace_control(segments: &mut [Segment], strips: &[(usize, bool, bool)]) {
    for &(index, before, after) in strips {
        if before && index > 0 {
            if let Segment::Content(text) = &mut segments[index - 1] {
                let trimmed_len = text.trim_end().len();
                text.truncate(trimmed_len);
            }
        }
        if after {
            if let Some(Segment::Content(text)) = segments.get_mut(index + 1) {
                *text = text.trim_start().to_string();
            }
        }
    }
}

/// 1-based line and column of a byte offset.
pub(crate) fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before.rfind('\n').map_or(offset, |nl| offset - nl - 1) + 1;
    (line, column)
}

/// Characters that may appear in an identifier.
fn is_id_char(c: char) -> bool {
    !c.is_whitespace() && !"!\"#%&'()*+,./;<=>@[\\]^`{|}~".contains(c)
}

/// Characters after which a literal keyword or number ends.
fn is_literal_end(c: Option<char>) -> bool {
    match c {
        None => true,
        Some(c) => c.is_whitespace() || c == ')' || c == '}' || c == '~' || c == '|',
    }
}

fn tokenize(inner: &str, line: usize, column: usize) -> Result<Vec<Token>, SyntaxError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = inner.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::OpenParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::CloseParen);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Equals);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '@' => {
                tokens.push(Token::At);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Sep('/'));
                i += 1;
            }
            '.' if chars.get(i + 1) == Some(&'.') => {
                tokens.push(Token::DotDot);
                i += 2;
            }
            '.' => {
                // A lone `.` is `this`; a dot following a segment separates segments.
                let follows_segment =
                    matches!(tokens.last(), Some(Token::Id(_)) | Some(Token::CloseParen));
                if follows_segment && i > 0 && !chars[i - 1].is_whitespace() {
                    tokens.push(Token::Sep('.'));
                } else {
                    tokens.push(Token::Id("this".to_string()));
                }
                i += 1;
            }
            '"' | '\'' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => {
                            return Err(SyntaxError::new(
                                "Unterminated string literal",
                                line,
                                column,
                            ));
                        }
                        Some('\\') if chars.get(i + 1) == Some(&quote) => {
                            value.push(quote);
                            i += 2;
                        }
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            value.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(value));
            }
            '[' => {
                let start = i + 1;
                let Some(len) = chars[start..].iter().position(|&ch| ch == ']') else {
                    return Err(SyntaxError::new("Unterminated segment literal", line, column));
                };
                tokens.push(Token::Id(chars[start..start + len].iter().collect()));
                i = start + len + 1;
            }
            c if c == '-' || c.is_ascii_digit() => {
                let start = i;
                let mut j = i + usize::from(c == '-');
                let digits_start = j;
                while j < chars.len() && chars[j].is_ascii_digit() {
                    j += 1;
                }
                if j < chars.len() && chars[j] == '.' && chars.get(j + 1).is_some_and(char::is_ascii_digit) {
                    j += 1;
                    while j < chars.len() && chars[j].is_ascii_digit() {
                        j += 1;
                    }
                }
                if j > digits_start && is_literal_end(chars.get(j).copied()) {
                    tokens.push(Token::Num(chars[start..j].iter().collect()));
                    i = j;
                } else {
                    i = push_id(&chars, i, &mut tokens);
                }
            }
            c if is_id_char(c) => i = push_id(&chars, i, &mut tokens),
            other => {
                return Err(SyntaxError::new(
                    format!("Unexpected character '{other}' in expression"),
                    line,
                    column,
                ));
            }
        }
    }

    Ok(tokens)
}

fn push_id(chars: &[char], start: usize, tokens: &mut Vec<Token>) -> usize {
    let mut end = start;
    while end < chars.len() && is_id_char(chars[end]) {
        end += 1;
    }
    let word: String = chars[start..end].iter().collect();
    let literal_position = is_literal_end(chars.get(end).copied());
    let token = match word.as_str() {
        "true" if literal_position => Token::Bool(true),
        "false" if literal_position => Token::Bool(false),
        "null" if literal_position => Token::Null,
        "undefined" if literal_position => Token::Undefined,
        _ => Token::Id(word),
    };
    tokens.push(token);
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(source: &str) -> Vec<Tag> {
        scan(source)
            .unwrap()
            .into_iter()
            .filter_map(|s| match s {
                Segment::Tag(tag) => Some(tag),
                Segment::Content(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_scan_splits_content_and_tags() {
        let segments = scan("<p>{{name}}</p>").unwrap();
        assert_eq!(segments.len(), 3);
        assert!(matches!(&segments[0], Segment::Content(c) if c == "<p>"));
        assert!(matches!(&segments[2], Segment::Content(c) if c == "</p>"));
    }

    #[test]
    fn test_tag_kinds() {
        let kinds: Vec<TagKind> = tags("{{#a}}{{^b}}{{/a}}{{> p}}{{{raw}}}{{&raw}}{{! c }}{{!-- d --}}{{#> l}}")
            .into_iter()
            .map(|t| t.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                TagKind::BlockOpen,
                TagKind::InverseOpen,
                TagKind::Close,
                TagKind::Partial,
                TagKind::Unescaped,
                TagKind::Unescaped,
                TagKind::Comment,
                TagKind::Comment,
                TagKind::PartialBlockOpen,
            ]
        );
    }

    #[test]
    fn test_tokenize_paths_and_literals() {
        let tag = &tags(r#"{{helper ../parent.name @index "str" 12 true key=value}}"#)[0];
        assert_eq!(
            tag.tokens,
            vec![
                Token::Id("helper".into()),
                Token::DotDot,
                Token::Sep('/'),
                Token::Id("parent".into()),
                Token::Sep('.'),
                Token::Id("name".into()),
                Token::At,
                Token::Id("index".into()),
                Token::Str("str".into()),
                Token::Num("12".into()),
                Token::Bool(true),
                Token::Id("key".into()),
                Token::Equals,
                Token::Id("value".into()),
            ]
        );
    }

    #[test]
    fn test_dollar_and_dash_are_identifier_characters() {
        let tag = &tags("{{> $shared/my-partial}}")[0];
        assert_eq!(
            tag.tokens,
            vec![Token::Id("$shared".into()), Token::Sep('/'), Token::Id("my-partial".into())]
        );
    }

    #[test]
    fn test_whitespace_control_trims_neighbours() {
        let segments = scan("a  \n {{~name~}} \n b").unwrap();
        assert!(matches!(&segments[0], Segment::Content(c) if c == "a"));
        assert!(matches!(&segments[2], Segment::Content(c) if c == "b"));
    }

    #[test]
    fn test_escaped_mustache_is_content() {
        let segments = scan(r"\{{name}}").unwrap();
        let text: String = segments
            .iter()
            .map(|s| match s {
                Segment::Content(c) => c.clone(),
                Segment::Tag(_) => "<tag>".to_string(),
            })
            .collect();
        assert_eq!(text, "{{name}}");
    }

    #[test]
    fn test_unclosed_mustache_reports_position() {
        let err = scan("line one\n  {{oops").unwrap_err();
        assert_eq!((err.line, err.column), (2, 3));
    }
}
