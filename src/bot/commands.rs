//! Parsing de comandos de texto con prefijo (`sen!p <url>`, `sen!skip 2`, ...)

use crate::error::ValidationError;

/// Qué bandera de loop modifica `loop`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopTarget {
    Queue,
    Track,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `None` resumes a paused queue.
    Play(Option<String>),
    Pause,
    Resume,
    Stop,
    Queue,
    Skip(usize),
    /// 1-based position.
    Jump(usize),
    /// `enabled: None` toggles the current value.
    Loop {
        target: LoopTarget,
        enabled: Option<bool>,
    },
    NowPlaying,
    Info,
    Unknown(String),
}

impl Command {
    /// Parses a message body.
    ///
    /// Returns `Ok(None)` when the message does not start with `prefix`, and a
    /// [`ValidationError`] when the command is known but its arguments are not.
    pub fn parse(prefix: &str, content: &str) -> Result<Option<Command>, ValidationError> {
        let content = content.trim();
        let Some(head) = content.get(..prefix.len()) else {
            return Ok(None);
        };
        if prefix.is_empty() || !head.eq_ignore_ascii_case(prefix) {
            return Ok(None);
        }

        let mut args = content[prefix.len()..].split_whitespace();
        let Some(word) = args.next() else {
            return Ok(None);
        };

        let command = match word.to_lowercase().as_str() {
            "play" | "p" => Command::Play(args.next().map(str::to_string)),
            "pause" => Command::Pause,
            "resume" | "r" => Command::Resume,
            "stop" | "s" => Command::Stop,
            "queue" | "q" => Command::Queue,
            "skip" | "next" => Command::Skip(match args.next() {
                Some(raw) => parse_count(raw)?,
                None => 1,
            }),
            "jump" | "j" => Command::Jump(parse_index(args.next())?),
            "loop" => parse_loop(args.next(), args.next())?,
            "nowplaying" | "np" => Command::NowPlaying,
            "info" | "help" => Command::Info,
            other => Command::Unknown(other.to_string()),
        };

        Ok(Some(command))
    }
}

fn parse_count(raw: &str) -> Result<usize, ValidationError> {
    match raw.parse::<usize>() {
        Ok(count) if count >= 1 => Ok(count),
        _ => Err(ValidationError::InvalidCount(raw.to_string())),
    }
}

fn parse_index(raw: Option<&str>) -> Result<usize, ValidationError> {
    let raw = raw.unwrap_or_default();
    raw.parse::<usize>()
        .map_err(|_| ValidationError::InvalidIndex(raw.to_string()))
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// `loop`, `loop on`, `loop track`, `loop track off`, ...
fn parse_loop(first: Option<&str>, second: Option<&str>) -> Result<Command, ValidationError> {
    let target_of = |raw: &str| match raw.to_lowercase().as_str() {
        "queue" | "q" | "all" => Some(LoopTarget::Queue),
        "track" | "t" | "song" => Some(LoopTarget::Track),
        _ => None,
    };

    let invalid = |raw: &str| ValidationError::InvalidArgument(raw.to_string());

    match (first, second) {
        (None, _) => Ok(Command::Loop {
            target: LoopTarget::Queue,
            enabled: None,
        }),
        (Some(raw), None) => {
            if let Some(target) = target_of(raw) {
                Ok(Command::Loop {
                    target,
                    enabled: None,
                })
            } else if let Some(enabled) = parse_switch(raw) {
                Ok(Command::Loop {
                    target: LoopTarget::Queue,
                    enabled: Some(enabled),
                })
            } else {
                Err(invalid(raw))
            }
        }
        (Some(target), Some(switch)) => Ok(Command::Loop {
            target: target_of(target).ok_or_else(|| invalid(target))?,
            enabled: Some(parse_switch(switch).ok_or_else(|| invalid(switch))?),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(content: &str) -> Result<Option<Command>, ValidationError> {
        Command::parse("sen!", content)
    }

    #[test]
    fn ignores_messages_without_prefix() {
        assert_eq!(parse("hola"), Ok(None));
        assert_eq!(parse("sen"), Ok(None));
        assert_eq!(parse("sen!"), Ok(None));
        assert_eq!(parse("!p https://soundcloud.com/a/b"), Ok(None));
    }

    #[test]
    fn play_with_and_without_reference() {
        assert_eq!(
            parse("sen!p https://soundcloud.com/a/b"),
            Ok(Some(Command::Play(Some("https://soundcloud.com/a/b".into()))))
        );
        assert_eq!(parse("SEN!PLAY"), Ok(Some(Command::Play(None))));
    }

    #[test]
    fn aliases_map_to_the_same_command() {
        assert_eq!(parse("sen!s"), parse("sen!stop"));
        assert_eq!(parse("sen!q"), parse("sen!queue"));
        assert_eq!(parse("sen!r"), parse("sen!resume"));
        assert_eq!(parse("sen!np"), parse("sen!nowplaying"));
        assert_eq!(parse("sen!help"), Ok(Some(Command::Info)));
    }

    #[test]
    fn skip_defaults_to_one_and_rejects_bad_counts() {
        assert_eq!(parse("sen!skip"), Ok(Some(Command::Skip(1))));
        assert_eq!(parse("sen!next 3"), Ok(Some(Command::Skip(3))));
        assert_eq!(
            parse("sen!skip 0"),
            Err(ValidationError::InvalidCount("0".into()))
        );
        assert_eq!(
            parse("sen!skip -2"),
            Err(ValidationError::InvalidCount("-2".into()))
        );
        assert_eq!(
            parse("sen!skip dos"),
            Err(ValidationError::InvalidCount("dos".into()))
        );
    }

    #[test]
    fn jump_requires_a_number() {
        assert_eq!(parse("sen!j 4"), Ok(Some(Command::Jump(4))));
        // El rango se valida contra la cola, no aquí
        assert_eq!(parse("sen!jump 0"), Ok(Some(Command::Jump(0))));
        assert_eq!(
            parse("sen!jump"),
            Err(ValidationError::InvalidIndex(String::new()))
        );
        assert_eq!(
            parse("sen!jump x"),
            Err(ValidationError::InvalidIndex("x".into()))
        );
    }

    #[test]
    fn loop_variants() {
        assert_eq!(
            parse("sen!loop"),
            Ok(Some(Command::Loop {
                target: LoopTarget::Queue,
                enabled: None
            }))
        );
        assert_eq!(
            parse("sen!loop off"),
            Ok(Some(Command::Loop {
                target: LoopTarget::Queue,
                enabled: Some(false)
            }))
        );
        assert_eq!(
            parse("sen!loop track"),
            Ok(Some(Command::Loop {
                target: LoopTarget::Track,
                enabled: None
            }))
        );
        assert_eq!(
            parse("sen!loop track on"),
            Ok(Some(Command::Loop {
                target: LoopTarget::Track,
                enabled: Some(true)
            }))
        );
        assert_eq!(
            parse("sen!loop forever"),
            Err(ValidationError::InvalidArgument("forever".into()))
        );
        assert_eq!(
            parse("sen!loop track maybe"),
            Err(ValidationError::InvalidArgument("maybe".into()))
        );
    }

    #[test]
    fn unknown_words_are_reported() {
        assert_eq!(
            parse("sen!volume 50"),
            Ok(Some(Command::Unknown("volume".into())))
        );
    }
}
