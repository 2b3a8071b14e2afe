//! Tokenizer for XPath expressions.
//!
//! `*` and operator names (`and`, `or`, `div`, `mod`) are emitted as plain
//! `Star` and `Name` tokens; the parser resolves them by position.

use super::XPathError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Dot,
    DotDot,
    DoubleColon,
    Pipe,
    Plus,
    Minus,
    Star,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Literal(String),
    Number(f64),
    Name(String),
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Slash => "'/'".to_string(),
            Token::DoubleSlash => "'//'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::At => "'@'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Dot => "'.'".to_string(),
            Token::DotDot => "'..'".to_string(),
            Token::DoubleColon => "'::'".to_string(),
            Token::Pipe => "'|'".to_string(),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Eq => "'='".to_string(),
            Token::NotEq => "'!='".to_string(),
            Token::Lt => "'<'".to_string(),
            Token::Le => "'<='".to_string(),
            Token::Gt => "'>'".to_string(),
            Token::Ge => "'>='".to_string(),
            Token::Literal(s) => format!("literal \"{}\"", s),
            Token::Number(n) => format!("number {}", n),
            Token::Name(n) => format!("name '{}'", n),
        }
    }
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub position: usize,
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Spanned>, XPathError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let peek = |i: usize| chars.get(i).map(|&(_, c)| c);

    while i < chars.len() {
        let (position, c) = chars[i];
        let next = peek(i + 1);

        let (token, width) = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '/' if next == Some('/') => (Token::DoubleSlash, 2),
            '/' => (Token::Slash, 1),
            '[' => (Token::LBracket, 1),
            ']' => (Token::RBracket, 1),
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '@' => (Token::At, 1),
            ',' => (Token::Comma, 1),
            '|' => (Token::Pipe, 1),
            '+' => (Token::Plus, 1),
            '-' => (Token::Minus, 1),
            '*' => (Token::Star, 1),
            '=' => (Token::Eq, 1),
            '!' if next == Some('=') => (Token::NotEq, 2),
            '<' if next == Some('=') => (Token::Le, 2),
            '<' => (Token::Lt, 1),
            '>' if next == Some('=') => (Token::Ge, 2),
            '>' => (Token::Gt, 1),
            ':' if next == Some(':') => (Token::DoubleColon, 2),
            '.' if next == Some('.') => (Token::DotDot, 2),
            '.' if next.is_some_and(|n| n.is_ascii_digit()) => {
                let end = scan_while(&chars, i + 1, |c| c.is_ascii_digit());
                (Token::Number(parse_number(&chars, i, end)), end - i)
            }
            '.' => (Token::Dot, 1),
            '"' | '\'' => {
                let close = (i + 1..chars.len()).find(|&j| chars[j].1 == c).ok_or(
                    XPathError::UnterminatedString { position },
                )?;
                let literal: String = chars[i + 1..close].iter().map(|&(_, ch)| ch).collect();
                (Token::Literal(literal), close + 1 - i)
            }
            c if c.is_ascii_digit() => {
                let mut end = scan_while(&chars, i, |c| c.is_ascii_digit());
                if peek(end) == Some('.') {
                    end = scan_while(&chars, end + 1, |c| c.is_ascii_digit());
                }
                (Token::Number(parse_number(&chars, i, end)), end - i)
            }
            c if is_name_start(c) => {
                let end = scan_while(&chars, i, is_name_char);
                let name: String = chars[i..end].iter().map(|&(_, ch)| ch).collect();
                (Token::Name(name), end - i)
            }
            other => {
                return Err(XPathError::UnexpectedChar {
                    ch: other,
                    position,
                })
            }
        };

        tokens.push(Spanned { token, position });
        i += width;
    }

    Ok(tokens)
}

fn scan_while(chars: &[(usize, char)], start: usize, pred: impl Fn(char) -> bool) -> usize {
    let mut end = start;
    while end < chars.len() && pred(chars[end].1) {
        end += 1;
    }
    end
}

fn parse_number(chars: &[(usize, char)], start: usize, end: usize) -> f64 {
    let text: String = chars[start..end].iter().map(|&(_, c)| c).collect();
    text.parse().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input)
            .expect("tokenize")
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn tokenizes_typical_locator() {
        assert_eq!(
            kinds("//button[@id='old']"),
            vec![
                Token::DoubleSlash,
                Token::Name("button".to_string()),
                Token::LBracket,
                Token::At,
                Token::Name("id".to_string()),
                Token::Eq,
                Token::Literal("old".to_string()),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn tokenizes_axes_numbers_and_dots() {
        assert_eq!(
            kinds("../following-sibling::td[.5 >= 1.25]"),
            vec![
                Token::DotDot,
                Token::Slash,
                Token::Name("following-sibling".to_string()),
                Token::DoubleColon,
                Token::Name("td".to_string()),
                Token::LBracket,
                Token::Number(0.5),
                Token::Ge,
                Token::Number(1.25),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn positions_are_byte_offsets() {
        let tokens = tokenize("a | b").expect("tokenize");
        let positions: Vec<usize> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 2, 4]);
    }

    #[test]
    fn rejects_unterminated_literal_and_stray_chars() {
        assert_eq!(
            tokenize("//a[@id='x]"),
            Err(XPathError::UnterminatedString { position: 8 })
        );
        assert_eq!(
            tokenize("//a[$v]"),
            Err(XPathError::UnexpectedChar {
                ch: '$',
                position: 4
            })
        );
    }
}
