//! Shell-compatible tokenizer for command lines.
//!
//! Splits text on whitespace runs while honoring POSIX-shell quoting, and
//! splits `--flag=value` tokens into `--flag`, `=`, `value` so the grammar
//! sees the same token sequence for the joined and the spaced separator
//! forms. The split only applies when `--flag` and `=` are unquoted, and
//! [`tokenize_with`] further restricts it to known triggers so values such
//! as `-a=b` pass through intact.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::GrammarParseError;

static SAFE_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_@%+=:,./-]+$").expect("safe word pattern is valid")
});

/// A token with the byte offset of its first character in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub offset: usize,
}

impl Token {
    fn new(text: impl Into<String>, offset: usize) -> Self {
        Self {
            text: text.into(),
            offset,
        }
    }
}

/// Splits a command line into tokens.
///
/// # Errors
///
/// Returns a [`GrammarParseError`] for unterminated quotes and a trailing
/// backslash.
///
/// # Examples
///
/// ```
/// use cligram_core::lexer::tokenize;
///
/// let tokens = tokenize(r#"greet --name="Ada Lovelace" --age=36"#).unwrap();
/// let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
/// assert_eq!(texts, ["greet", "--name", "=", "Ada Lovelace", "--age", "=", "36"]);
/// ```
pub fn tokenize(input: &str) -> Result<Vec<Token>, GrammarParseError> {
    tokenize_with(input, |_| true)
}

/// Like [`tokenize`], but only splits `flag=value` words whose flag part
/// satisfies `is_trigger`.
///
/// # Errors
///
/// Same as [`tokenize`].
///
/// # Examples
///
/// ```
/// use cligram_core::lexer::tokenize_with;
///
/// let tokens = tokenize_with("connect --user=-a=b --opt=1", |flag| flag == "--user").unwrap();
/// let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
/// assert_eq!(texts, ["connect", "--user", "=", "-a=b", "--opt=1"]);
/// ```
pub fn tokenize_with<F>(input: &str, is_trigger: F) -> Result<Vec<Token>, GrammarParseError>
where
    F: Fn(&str) -> bool,
{
    let words = split_words(input)?;
    let mut tokens = Vec::with_capacity(words.len());
    for word in words {
        split_separator(word, &is_trigger, &mut tokens);
    }
    Ok(tokens)
}

/// A word before separator splitting.
struct Word {
    token: Token,
    /// Byte index in `token.text` of the first character that came from a
    /// quote or an escape.
    quoted_from: Option<usize>,
}

fn split_words(input: &str) -> Result<Vec<Word>, GrammarParseError> {
    let mut words = Vec::new();
    let mut current: Option<Word> = None;
    let mut chars = input.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        if c.is_whitespace() {
            if let Some(word) = current.take() {
                words.push(word);
            }
            continue;
        }

        let current = current.get_or_insert_with(|| Word {
            token: Token::new(String::new(), offset),
            quoted_from: None,
        });
        if matches!(c, '\'' | '"' | '\\') && current.quoted_from.is_none() {
            current.quoted_from = Some(current.token.text.len());
        }
        let word = &mut current.token;
        match c {
            '\'' => loop {
                match chars.next() {
                    Some((_, '\'')) => break,
                    Some((_, ch)) => word.text.push(ch),
                    None => {
                        return Err(GrammarParseError::lexical(input, "unterminated single quote"));
                    }
                }
            },
            '"' => loop {
                match chars.next() {
                    Some((_, '"')) => break,
                    Some((_, '\\')) => match chars.peek() {
                        Some(&(_, next @ ('"' | '\\' | '$' | '`'))) => {
                            word.text.push(next);
                            chars.next();
                        }
                        Some(&(_, '\n')) => {
                            chars.next();
                        }
                        _ => word.text.push('\\'),
                    },
                    Some((_, ch)) => word.text.push(ch),
                    None => {
                        return Err(GrammarParseError::lexical(input, "unterminated double quote"));
                    }
                }
            },
            '\\' => match chars.next() {
                Some((_, '\n')) => {}
                Some((_, ch)) => word.text.push(ch),
                None => return Err(GrammarParseError::lexical(input, "dangling escape")),
            },
            _ => word.text.push(c),
        }
    }

    if let Some(word) = current {
        words.push(word);
    }
    Ok(words)
}

fn split_separator(word: Word, is_trigger: &impl Fn(&str) -> bool, tokens: &mut Vec<Token>) {
    let Word { token, quoted_from } = word;
    let unquoted = &token.text[..quoted_from.unwrap_or(token.text.len())];
    let eq = unquoted
        .find('=')
        .filter(|&eq| eq >= 2 && unquoted.starts_with('-') && is_trigger(&unquoted[..eq]));
    match eq {
        Some(eq) => {
            let (flag, rest) = token.text.split_at(eq);
            tokens.push(Token::new(flag, token.offset));
            tokens.push(Token::new("=", token.offset + eq));
            tokens.push(Token::new(&rest[1..], token.offset + eq + 1));
        }
        None => tokens.push(token),
    }
}

/// Quotes one argument so that [`tokenize`] reads it back as a single token.
///
/// # Examples
///
/// ```
/// use cligram_core::lexer::quote;
///
/// assert_eq!(quote("fido"), "fido");
/// assert_eq!(quote("two words"), "'two words'");
/// assert_eq!(quote("it's"), r#"'it'"'"'s'"#);
/// assert_eq!(quote(""), "''");
/// ```
pub fn quote(arg: &str) -> String {
    if SAFE_WORD.is_match(arg) {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r#"'"'"'"#))
}

/// Joins an argument list into one shell-quoted command line.
pub fn join_args<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .map(|arg| quote(arg.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}
