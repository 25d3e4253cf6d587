//! UCI command parsing.

use std::time::Duration;

use cozy_chess::Board;

use crate::error::UciError;
use crate::notation::parse_uci_move;

/// Parameters for the `go` command.
///
/// All fields are optional; a bare `go` uses defaults.
#[derive(Debug, Clone, Default)]
pub struct GoParams {
    /// White's remaining time.
    pub wtime: Option<Duration>,
    /// Black's remaining time.
    pub btime: Option<Duration>,
    /// White's increment per move.
    pub winc: Option<Duration>,
    /// Black's increment per move.
    pub binc: Option<Duration>,
    /// Moves until next time control.
    pub movestogo: Option<u32>,
    /// Search to this depth only.
    pub depth: Option<u8>,
    /// Search for exactly this duration.
    pub movetime: Option<Duration>,
    /// Search this many nodes only.
    pub nodes: Option<u64>,
    /// Search until `stop` (no time limit).
    pub infinite: bool,
}

/// A position together with the game that led to it.
#[derive(Debug, Clone)]
pub struct PositionInfo {
    pub board: Board,
    /// Hashes of every position before `board`, oldest first.
    pub history: Vec<u64>,
}

/// Engine options settable through `setoption`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UciOption {
    /// Transposition table size in megabytes.
    Hash(usize),
    Threads(usize),
    MultiPv(usize),
}

impl UciOption {
    pub const HASH_MAX: usize = 65_536;
    pub const THREADS_MAX: usize = 256;
    pub const MULTI_PV_MAX: usize = 256;
}

/// A parsed UCI command.
#[derive(Debug)]
pub enum Command {
    /// `uci` -- identify the engine.
    Uci,
    /// `isready` -- synchronization ping.
    IsReady,
    /// `ucinewgame` -- reset engine state.
    UciNewGame,
    /// `position` -- set up a board position with optional moves applied.
    Position(PositionInfo),
    /// `go` -- start searching with given parameters.
    Go(GoParams),
    /// `setoption name <id> value <x>`.
    SetOption(UciOption),
    /// `stop` -- halt the current search.
    Stop,
    /// `quit` -- exit the engine.
    Quit,
    /// Unrecognized command (silently ignored per UCI convention).
    Unknown(String),
}

/// Parse a single line of UCI input into a [`Command`].
pub fn parse_command(line: &str) -> Result<Command, UciError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(Command::Unknown(String::new()));
    }

    match tokens[0] {
        "uci" => Ok(Command::Uci),
        "isready" => Ok(Command::IsReady),
        "ucinewgame" => Ok(Command::UciNewGame),
        "stop" => Ok(Command::Stop),
        "quit" => Ok(Command::Quit),
        "position" => parse_position(&tokens[1..]),
        "go" => parse_go(&tokens[1..]),
        "setoption" => parse_setoption(&tokens[1..]),
        _ => Ok(Command::Unknown(tokens[0].to_string())),
    }
}

/// Parse the `position` command arguments.
///
/// Supports:
/// - `position startpos [moves e2e4 d7d5 ...]`
/// - `position fen <fen-string> [moves e2e4 d7d5 ...]`
fn parse_position(tokens: &[&str]) -> Result<Command, UciError> {
    if tokens.is_empty() {
        return Err(UciError::MalformedPosition);
    }

    let (mut board, rest) = if tokens[0] == "startpos" {
        (Board::default(), &tokens[1..])
    } else if tokens[0] == "fen" {
        // FEN is 6 space-separated fields
        if tokens.len() < 7 {
            return Err(UciError::InvalidFen {
                fen: tokens[1..].join(" "),
            });
        }
        let fen = tokens[1..7].join(" ");
        let board = Board::from_fen(&fen, false).map_err(|_| UciError::InvalidFen {
            fen: fen.clone(),
        })?;
        (board, &tokens[7..])
    } else {
        return Err(UciError::MalformedPosition);
    };

    // Apply moves if present: "moves e2e4 d7d5 ..."
    let mut history = Vec::new();
    if !rest.is_empty() && rest[0] == "moves" {
        for uci_str in &rest[1..] {
            let mv = parse_uci_move(&board, uci_str).ok_or_else(|| UciError::InvalidMove {
                uci_move: uci_str.to_string(),
            })?;
            history.push(board.hash());
            board.play_unchecked(mv);
        }
    }

    Ok(Command::Position(PositionInfo { board, history }))
}

/// Parse the `go` command arguments.
///
/// Supports: wtime, btime, winc, binc, movestogo, depth, movetime,
/// nodes, infinite. Unknown tokens (including `ponder`) are silently skipped.
fn parse_go(tokens: &[&str]) -> Result<Command, UciError> {
    let mut params = GoParams::default();

    let mut i = 0;
    while i < tokens.len() {
        match tokens[i] {
            "wtime" => {
                params.wtime = Some(parse_millis(tokens.get(i + 1), "wtime")?);
                i += 2;
            }
            "btime" => {
                params.btime = Some(parse_millis(tokens.get(i + 1), "btime")?);
                i += 2;
            }
            "winc" => {
                params.winc = Some(parse_millis(tokens.get(i + 1), "winc")?);
                i += 2;
            }
            "binc" => {
                params.binc = Some(parse_millis(tokens.get(i + 1), "binc")?);
                i += 2;
            }
            "movestogo" => {
                params.movestogo = Some(parse_int(tokens.get(i + 1), "movestogo")?);
                i += 2;
            }
            "depth" => {
                params.depth = Some(parse_int(tokens.get(i + 1), "depth")?);
                i += 2;
            }
            "movetime" => {
                params.movetime = Some(parse_millis(tokens.get(i + 1), "movetime")?);
                i += 2;
            }
            "nodes" => {
                params.nodes = Some(parse_int(tokens.get(i + 1), "nodes")?);
                i += 2;
            }
            "infinite" => {
                params.infinite = true;
                i += 1;
            }
            _ => {
                // Unknown token -- skip per UCI convention
                i += 1;
            }
        }
    }

    Ok(Command::Go(params))
}

/// Parse the `setoption` arguments: `name <id> value <x>`.
///
/// Option names are case-insensitive. Values outside an option's range are
/// rejected rather than clamped.
fn parse_setoption(tokens: &[&str]) -> Result<Command, UciError> {
    let name_at = tokens.iter().position(|&t| t == "name");
    let value_at = tokens.iter().position(|&t| t == "value");
    let (Some(name_at), Some(value_at)) = (name_at, value_at) else {
        return Err(UciError::MalformedOption);
    };
    if value_at <= name_at + 1 {
        return Err(UciError::MalformedOption);
    }

    let name = tokens[name_at + 1..value_at].join(" ");
    let value = tokens[value_at + 1..].join(" ");
    let (max, build): (usize, fn(usize) -> UciOption) = match name.to_ascii_lowercase().as_str() {
        "hash" => (UciOption::HASH_MAX, UciOption::Hash),
        "threads" => (UciOption::THREADS_MAX, UciOption::Threads),
        "multipv" => (UciOption::MULTI_PV_MAX, UciOption::MultiPv),
        _ => return Err(UciError::UnknownOption { name }),
    };

    match value.parse::<usize>() {
        Ok(n) if (1..=max).contains(&n) => Ok(Command::SetOption(build(n))),
        _ => Err(UciError::InvalidOptionValue { name, value }),
    }
}

/// Parse a millisecond value from a token.
fn parse_millis(token: Option<&&str>, param: &str) -> Result<Duration, UciError> {
    let value = token.ok_or_else(|| UciError::MissingGoValue {
        param: param.to_string(),
    })?;
    let ms: u64 = value.parse().map_err(|_| UciError::InvalidGoValue {
        param: param.to_string(),
        value: value.to_string(),
    })?;
    Ok(Duration::from_millis(ms))
}

/// Parse an integer value from a token.
fn parse_int<T: std::str::FromStr>(token: Option<&&str>, param: &str) -> Result<T, UciError> {
    let value = token.ok_or_else(|| UciError::MissingGoValue {
        param: param.to_string(),
    })?;
    value.parse().map_err(|_| UciError::InvalidGoValue {
        param: param.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cozy_chess::{Color, Piece, Square};

    use super::*;

    #[test]
    fn parse_uci() {
        assert!(matches!(parse_command("uci").unwrap(), Command::Uci));
    }

    #[test]
    fn parse_isready() {
        assert!(matches!(parse_command("isready").unwrap(), Command::IsReady));
    }

    #[test]
    fn parse_quit() {
        assert!(matches!(parse_command("quit").unwrap(), Command::Quit));
    }

    #[test]
    fn parse_ucinewgame() {
        assert!(matches!(
            parse_command("ucinewgame").unwrap(),
            Command::UciNewGame
        ));
    }

    #[test]
    fn parse_position_startpos() {
        let cmd = parse_command("position startpos").unwrap();
        assert!(matches!(cmd, Command::Position(_)));
    }

    #[test]
    fn parse_position_startpos_with_moves() {
        let cmd = parse_command("position startpos moves e2e4 e7e5").unwrap();
        match cmd {
            Command::Position(info) => {
                assert_eq!(info.history.len(), 2);
                assert_eq!(info.history[0], Board::default().hash());
                assert_eq!(info.board.piece_on(Square::E4), Some(Piece::Pawn));
                assert_eq!(info.board.piece_on(Square::E5), Some(Piece::Pawn));
                assert_eq!(info.board.side_to_move(), Color::White);
            }
            _ => panic!("expected Position"),
        }
    }

    #[test]
    fn parse_position_with_castling() {
        let cmd = parse_command(
            "position fen r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1 moves e1g1 e8c8",
        )
        .unwrap();
        match cmd {
            Command::Position(info) => {
                assert_eq!(
                    info.board.to_string(),
                    "2kr3r/pppppppp/8/8/8/8/PPPPPPPP/R4RK1 w - - 2 2"
                );
            }
            _ => panic!("expected Position"),
        }
    }

    #[test]
    fn parse_position_illegal_move() {
        let result = parse_command("position startpos moves e2e5");
        assert!(matches!(result, Err(UciError::InvalidMove { .. })));
    }

    #[test]
    fn parse_position_fen() {
        let cmd = parse_command(
            "position fen rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
        )
        .unwrap();
        assert!(matches!(cmd, Command::Position(_)));
    }

    #[test]
    fn parse_go_depth() {
        let cmd = parse_command("go depth 6").unwrap();
        match cmd {
            Command::Go(params) => assert_eq!(params.depth, Some(6)),
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_bare_defaults() {
        let cmd = parse_command("go").unwrap();
        match cmd {
            Command::Go(params) => {
                assert!(params.depth.is_none());
                assert!(params.wtime.is_none());
                assert!(!params.infinite);
            }
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_wtime_btime_winc_binc() {
        let cmd = parse_command("go wtime 300000 btime 300000 winc 2000 binc 2000").unwrap();
        match cmd {
            Command::Go(params) => {
                assert_eq!(params.wtime, Some(Duration::from_millis(300000)));
                assert_eq!(params.btime, Some(Duration::from_millis(300000)));
                assert_eq!(params.winc, Some(Duration::from_millis(2000)));
                assert_eq!(params.binc, Some(Duration::from_millis(2000)));
            }
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_movetime() {
        let cmd = parse_command("go movetime 5000").unwrap();
        match cmd {
            Command::Go(params) => {
                assert_eq!(params.movetime, Some(Duration::from_millis(5000)));
            }
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_infinite() {
        let cmd = parse_command("go infinite").unwrap();
        match cmd {
            Command::Go(params) => assert!(params.infinite),
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_ponder_token_is_ignored() {
        let cmd = parse_command("go ponder wtime 300000 btime 300000").unwrap();
        match cmd {
            Command::Go(params) => {
                assert_eq!(params.wtime, Some(Duration::from_millis(300000)));
                assert_eq!(params.btime, Some(Duration::from_millis(300000)));
            }
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_movestogo() {
        let cmd = parse_command("go wtime 60000 btime 60000 movestogo 20").unwrap();
        match cmd {
            Command::Go(params) => {
                assert_eq!(params.movestogo, Some(20));
            }
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_nodes() {
        let cmd = parse_command("go nodes 1000000").unwrap();
        match cmd {
            Command::Go(params) => {
                assert_eq!(params.nodes, Some(1_000_000));
            }
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_ponderhit_is_unknown() {
        assert!(matches!(
            parse_command("ponderhit").unwrap(),
            Command::Unknown(_)
        ));
    }

    #[test]
    fn parse_go_missing_wtime_value() {
        let result = parse_command("go wtime");
        assert!(result.is_err());
    }

    #[test]
    fn parse_go_invalid_depth_value() {
        let result = parse_command("go depth abc");
        assert!(result.is_err());
    }

    #[test]
    fn parse_unknown_command() {
        let cmd = parse_command("foobar").unwrap();
        assert!(matches!(cmd, Command::Unknown(_)));
    }

    #[test]
    fn parse_empty_line() {
        let cmd = parse_command("").unwrap();
        assert!(matches!(cmd, Command::Unknown(_)));
    }

    #[test]
    fn parse_position_missing_keyword() {
        let result = parse_command("position");
        assert!(result.is_err());
    }

    #[test]
    fn parse_position_invalid_fen() {
        let result = parse_command("position fen invalid");
        assert!(result.is_err());
    }

    #[test]
    fn parse_setoption_known_names() {
        assert!(matches!(
            parse_command("setoption name Hash value 64").unwrap(),
            Command::SetOption(UciOption::Hash(64))
        ));
        assert!(matches!(
            parse_command("setoption name Threads value 4").unwrap(),
            Command::SetOption(UciOption::Threads(4))
        ));
        assert!(matches!(
            parse_command("setoption name MultiPV value 3").unwrap(),
            Command::SetOption(UciOption::MultiPv(3))
        ));
    }

    #[test]
    fn parse_setoption_rejects_bad_input() {
        assert!(matches!(
            parse_command("setoption name Threads value 0"),
            Err(UciError::InvalidOptionValue { .. })
        ));
        assert!(matches!(
            parse_command("setoption name Hash value lots"),
            Err(UciError::InvalidOptionValue { .. })
        ));
        assert!(matches!(
            parse_command("setoption name Contempt value 10"),
            Err(UciError::UnknownOption { .. })
        ));
        assert!(matches!(
            parse_command("setoption Hash 16"),
            Err(UciError::MalformedOption)
        ));
    }

    #[test]
    fn parse_stop() {
        assert!(matches!(parse_command("stop").unwrap(), Command::Stop));
    }
}
