#![allow(clippy::module_name_repetitions)]

//! Tokenizer and parser for the lens session REPL.
//!
//! `regal` splits a line into a bounded token buffer. The parser then walks
//! the command's [`catalog`](super::catalog) node chain over that buffer,
//! collecting arguments before assembling a [`Command`].

use core::ops::Range;
use core::time::Duration;

use heapless::Vec as HeaplessVec;
use regal::{IncrementalError, TokenCache};
use regal_macros::RegalLexer;
use thiserror::Error;
#[allow(deprecated)]
use winnow::error::ErrorKind;
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::stream::Stream;

use super::catalog::{self, ChoiceBranch, ChoiceTag, CommandTag, Node};

/// Upper bound on tokens in one REPL line.
pub const MAX_TOKENS: usize = 32;
const CACHE_RECORDS: usize = MAX_TOKENS * 2;

#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// `250ms`, `2s`.
    #[regex(r"[0-9]+(?:ms|s)", priority = 2)]
    Duration,
    #[regex(r"[0-9]+")]
    Integer,
    /// Keyword or pose identifier (`ARMS_UP`, `tpose-2`).
    #[regex(r"[A-Za-z_][A-Za-z0-9_-]*")]
    Ident,
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Anything the other patterns reject.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte range in the source line.
    pub span: Range<usize>,
}

pub type Tokens<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("line has more than {} tokens", MAX_TOKENS)]
    Overflow,
    #[error("tokenizer failed")]
    Engine,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SyntaxError<'a> {
    #[error("unknown command `{text}`")]
    UnknownCommand { text: &'a str },
    #[error("expected {expected}, found `{found}` at column {column}")]
    Unexpected {
        expected: &'static str,
        found: &'a str,
        column: usize,
    },
    #[error("expected {expected} before end of line")]
    Missing { expected: &'static str },
    #[error("`{text}` is not a frame count")]
    BadCount { text: &'a str },
    #[error("`{text}` is not a duration")]
    BadDuration { text: &'a str },
    #[error("unsupported input `{text}` at column {column}")]
    Stray { text: &'a str, column: usize },
}

impl<'a> SyntaxError<'a> {
    /// An end-of-line token counts as running out of input.
    fn expected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        match token {
            Some(token) if token.kind != TokenKind::Eol => SyntaxError::Unexpected {
                expected,
                found: token.text,
                column: token.span.start,
            },
            _ => SyntaxError::Missing { expected },
        }
    }
}

type Input<'src, 'slice> = &'slice [Token<'src>];

#[allow(deprecated)]
impl<'src, 'slice> ParserError<Input<'src, 'slice>> for SyntaxError<'src>
where
    'src: 'slice,
{
    fn from_error_kind(input: &Input<'src, 'slice>, _kind: ErrorKind) -> Self {
        SyntaxError::expected("token", input.first())
    }

    fn append(
        self,
        _input: &Input<'src, 'slice>,
        _token_start: &<Input<'src, 'slice> as Stream>::Checkpoint,
        _kind: ErrorKind,
    ) -> Self {
        self
    }

    fn or(self, other: Self) -> Self {
        other
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError<'a> {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("{0}")]
    Syntax(SyntaxError<'a>),
}

// `#[from]` would mark the field as the error source, which requires `'static`.
impl<'a> From<SyntaxError<'a>> for ParseError<'a> {
    fn from(err: SyntaxError<'a>) -> Self {
        ParseError::Syntax(err)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Start,
    Reset,
    /// Body tracking present (`true`) or lost.
    Track(bool),
    Pose(&'a str),
    Relax,
    /// Frames to advance.
    Tick(u32),
    Run(Duration),
    Status,
    Log,
    Help(HelpCommand<'a>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelpCommand<'a> {
    pub topic: Option<&'a str>,
}

/// Splits `line` into tokens, dropping whitespace.
///
/// Trailing input the tokenizer could not finish becomes a single
/// [`TokenKind::Error`] token.
///
/// # Errors
///
/// Returns [`LexError`] when the line has too many tokens or the tokenizer
/// fails.
pub fn lex(line: &str) -> Result<Tokens<'_>, LexError> {
    let mut cache: TokenCache<TokenKind, CACHE_RECORDS> = TokenCache::new();
    let tail = cache
        .rebuild(TokenKind::lexer(), line)
        .map_err(|err| match err {
            IncrementalError::TokenOverflow => LexError::Overflow,
            _ => LexError::Engine,
        })?;

    let mut tokens = Tokens::new();
    for record in cache.tokens() {
        if !record.skipped {
            let span = record.start..record.end;
            push(
                &mut tokens,
                Token {
                    kind: record.token,
                    text: &line[span.clone()],
                    span,
                },
            )?;
        }
    }
    if let Some(tail) = tail.filter(|tail| !tail.fragment.is_empty()) {
        push(
            &mut tokens,
            Token {
                kind: TokenKind::Error,
                text: tail.fragment,
                span: tail.start..tail.start + tail.fragment.len(),
            },
        )?;
    }
    Ok(tokens)
}

fn push<'a>(tokens: &mut Tokens<'a>, token: Token<'a>) -> Result<(), LexError> {
    tokens.push(token).map_err(|_| LexError::Overflow)
}

/// Parses one REPL line into a [`Command`].
///
/// Keywords match case-insensitively; pose names and help topics are kept as
/// typed.
///
/// # Errors
///
/// Returns [`ParseError`] when the line does not tokenize or does not match
/// a catalog entry.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line)?;
    if let Some(stray) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(SyntaxError::Stray {
            text: stray.text,
            column: stray.span.start,
        }
        .into());
    }

    let mut input: Input<'_, '_> = tokens.as_slice();
    let command = command()
        .parse_next(&mut input)
        .map_err(|err| match err {
            ErrMode::Backtrack(err) | ErrMode::Cut(err) => err,
            ErrMode::Incomplete(_) => SyntaxError::expected("command", input.first()),
        })?;

    match input.iter().find(|token| token.kind != TokenKind::Eol) {
        Some(extra) => Err(SyntaxError::expected("end of command", Some(extra)).into()),
        None => Ok(command),
    }
}

fn command<'src, 'slice>() -> impl Parser<Input<'src, 'slice>, Command<'src>, SyntaxError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        let keyword = token(TokenKind::Ident, "command").parse_next(input)?;
        let Some(spec) = catalog::find(keyword.text) else {
            return Err(ErrMode::Cut(SyntaxError::UnknownCommand { text: keyword.text }));
        };
        let arguments = arguments(spec.grammar).parse_next(input)?;
        arguments.assemble(spec.tag).map_err(ErrMode::Cut)
    }
}

/// Values picked up while walking a command's node chain.
#[derive(Default)]
struct Arguments<'a> {
    choice: Option<ChoiceTag>,
    word: Option<&'a str>,
    count: Option<u32>,
    duration: Option<Duration>,
}

impl<'a> Arguments<'a> {
    fn assemble(self, tag: CommandTag) -> Result<Command<'a>, SyntaxError<'a>> {
        let command = match tag {
            CommandTag::Start => Command::Start,
            CommandTag::Reset => Command::Reset,
            CommandTag::Track => Command::Track(self.choice != Some(ChoiceTag::TrackOff)),
            CommandTag::Pose => Command::Pose(self.word.ok_or(SyntaxError::Missing {
                expected: "pose name",
            })?),
            CommandTag::Relax => Command::Relax,
            CommandTag::Tick => Command::Tick(self.count.unwrap_or(1)),
            CommandTag::Run => Command::Run(self.duration.ok_or(SyntaxError::Missing {
                expected: "duration",
            })?),
            CommandTag::Status => Command::Status,
            CommandTag::Log => Command::Log,
            CommandTag::Help => Command::Help(HelpCommand { topic: self.word }),
        };
        Ok(command)
    }
}

fn arguments<'src, 'slice>(
    root: &'static Node,
) -> impl Parser<Input<'src, 'slice>, Arguments<'src>, SyntaxError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        let mut arguments = Arguments::default();
        let mut node = root;
        loop {
            node = match *node {
                Node::End => return Ok(arguments),
                Node::OptionalChoice { choices, default } => {
                    let label = choice_label(choices);
                    match optional_word(input, label)? {
                        Some(word) => {
                            let branch = choices
                                .iter()
                                .find(|branch| branch.keyword.eq_ignore_ascii_case(word.text))
                                .ok_or_else(|| {
                                    ErrMode::Backtrack(SyntaxError::expected(label, Some(word)))
                                })?;
                            arguments.choice = Some(branch.tag);
                            branch.next
                        }
                        None => match default {
                            Some(default) => {
                                arguments.choice = Some(default.tag);
                                default.next
                            }
                            None => return Ok(arguments),
                        },
                    }
                }
                Node::Topic { next } => {
                    arguments.word = optional_word(input, "command name")?.map(|word| word.text);
                    next
                }
                Node::Identifier { label, next } => {
                    arguments.word = Some(token(TokenKind::Ident, label).parse_next(input)?.text);
                    next
                }
                Node::Count { next } => {
                    if let Some((first, rest)) = input.split_first() {
                        if first.kind == TokenKind::Integer {
                            arguments.count = Some(parse_count(first).map_err(ErrMode::Cut)?);
                            *input = rest;
                        }
                    }
                    next
                }
                Node::Duration { next } => {
                    let literal = token(TokenKind::Duration, "duration").parse_next(input)?;
                    arguments.duration = Some(parse_duration(&literal).map_err(ErrMode::Cut)?);
                    next
                }
            };
        }
    }
}

/// Takes an identifier if one is next. End of line yields `None`; any
/// other token is an error.
fn optional_word<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
    label: &'static str,
) -> Result<Option<&'slice Token<'src>>, ErrMode<SyntaxError<'src>>>
where
    'src: 'slice,
{
    match input.split_first() {
        Some((first, rest)) if first.kind == TokenKind::Ident => {
            *input = rest;
            Ok(Some(first))
        }
        Some((first, _)) if first.kind != TokenKind::Eol => Err(ErrMode::Backtrack(
            SyntaxError::expected(label, Some(first)),
        )),
        _ => Ok(None),
    }
}

fn choice_label(choices: &[ChoiceBranch]) -> &'static str {
    choices.first().map_or("keyword", |branch| branch.keyword)
}

fn token<'src, 'slice>(
    kind: TokenKind,
    label: &'static str,
) -> impl Parser<Input<'src, 'slice>, Token<'src>, SyntaxError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| match input.split_first() {
        Some((first, rest)) if first.kind == kind => {
            *input = rest;
            Ok(first.clone())
        }
        other => Err(ErrMode::Backtrack(SyntaxError::expected(
            label,
            other.map(|(first, _)| first),
        ))),
    }
}

fn parse_count<'a>(token: &Token<'a>) -> Result<u32, SyntaxError<'a>> {
    token
        .text
        .parse()
        .map_err(|_| SyntaxError::BadCount { text: token.text })
}

fn parse_duration<'a>(token: &Token<'a>) -> Result<Duration, SyntaxError<'a>> {
    let invalid = || SyntaxError::BadDuration { text: token.text };
    let (digits, unit): (&str, fn(u64) -> Duration) = match token.text.strip_suffix("ms") {
        Some(digits) => (digits, Duration::from_millis),
        None => (
            token.text.strip_suffix('s').ok_or_else(invalid)?,
            Duration::from_secs,
        ),
    };
    digits.parse().map(unit).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec::Vec;

    fn parse_ok(input: &str) -> Command<'_> {
        parse(input).expect("command should parse")
    }

    fn syntax_error(input: &str) -> SyntaxError<'_> {
        match parse(input) {
            Err(ParseError::Syntax(err)) => err,
            other => panic!("expected a syntax error, got {other:?}"),
        }
    }

    #[test]
    fn parses_lifecycle_commands() {
        assert_eq!(parse_ok("start"), Command::Start);
        assert_eq!(parse_ok("reset\n"), Command::Reset);
        assert_eq!(parse_ok("STATUS"), Command::Status);
        assert_eq!(parse_ok("log"), Command::Log);
    }

    #[test]
    fn track_defaults_to_on() {
        assert_eq!(parse_ok("track"), Command::Track(true));
        assert_eq!(parse_ok("track off"), Command::Track(false));
        assert_eq!(parse_ok("TRACK On"), Command::Track(true));
        assert_eq!(
            syntax_error("track maybe"),
            SyntaxError::Unexpected {
                expected: "on",
                found: "maybe",
                column: 6
            }
        );
    }

    #[test]
    fn pose_keeps_identifier_case() {
        assert_eq!(
            parse_ok("pose THIRD_POSE_NO_ARMS"),
            Command::Pose("THIRD_POSE_NO_ARMS")
        );
        assert_eq!(parse_ok("relax"), Command::Relax);
    }

    #[test]
    fn pose_requires_a_name() {
        assert_eq!(
            syntax_error("pose"),
            SyntaxError::Missing {
                expected: "pose name"
            }
        );
    }

    #[test]
    fn tick_count_is_optional() {
        assert_eq!(parse_ok("tick"), Command::Tick(1));
        assert_eq!(parse_ok("tick 30"), Command::Tick(30));
        assert_eq!(
            syntax_error("tick 99999999999"),
            SyntaxError::BadCount {
                text: "99999999999"
            }
        );
    }

    #[test]
    fn run_accepts_milliseconds_and_seconds() {
        assert_eq!(
            parse_ok("run 250ms"),
            Command::Run(Duration::from_millis(250))
        );
        assert_eq!(parse_ok("run 2s"), Command::Run(Duration::from_secs(2)));
        assert_eq!(
            syntax_error("run 2"),
            SyntaxError::Unexpected {
                expected: "duration",
                found: "2",
                column: 4
            }
        );
    }

    #[test]
    fn parses_help_topic() {
        assert_eq!(
            parse_ok("help pose"),
            Command::Help(HelpCommand { topic: Some("pose") })
        );
        assert_eq!(parse_ok("help"), Command::Help(HelpCommand { topic: None }));
    }

    #[test]
    fn rejects_unknown_commands_and_trailing_tokens() {
        assert_eq!(
            syntax_error("jump"),
            SyntaxError::UnknownCommand { text: "jump" }
        );
        assert!(matches!(
            syntax_error("start now"),
            SyntaxError::Unexpected {
                expected: "end of command",
                ..
            }
        ));
    }

    #[test]
    fn stray_symbols_are_reported_with_their_column() {
        let err = syntax_error("pose TPOSE$");
        assert_eq!(
            err,
            SyntaxError::Stray {
                text: "$",
                column: 10
            }
        );
        assert_eq!(err.to_string(), "unsupported input `$` at column 10");
    }

    #[test]
    fn lexer_drops_whitespace() {
        let tokens = lex("tick \t 3").expect("lexing should succeed");
        let kinds: Vec<TokenKind> = tokens.iter().map(|token| token.kind).collect();
        assert_eq!(kinds, [TokenKind::Ident, TokenKind::Integer]);
        assert_eq!(tokens[1].span, 7..8);
    }
}
