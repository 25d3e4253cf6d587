//! Event-driven, multi-threaded UCI engine.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use cozy_chess::{Board, Color};
use tracing::{debug, info, warn};

use corvid_engine::{IterationReport, SearchLimits, SearchResult, ThreadPool, mate_distance};

use crate::command::{Command, GoParams, PositionInfo, UciOption, parse_command};
use crate::error::UciError;
use crate::notation::{format_line, format_uci_move};

/// Stack of the thread running the main search thread.
const SEARCH_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Configuration knobs adjustable via `setoption`.
struct EngineConfig {
    /// Transposition table size in megabytes.
    hash_mb: usize,
    /// Number of search threads.
    threads: usize,
    multi_pv: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hash_mb: 16,
            threads: 1,
            multi_pv: 1,
        }
    }
}

/// Internal engine state: idle or searching.
enum EngineState {
    Idle,
    Searching,
}

/// Events processed by the main engine loop.
enum EngineEvent {
    UciCommand(Result<Command, UciError>),
    SearchDone(SearchDone),
    InputClosed,
}

/// Payload returned by the search thread when it finishes.
struct SearchDone {
    root: Board,
    result: SearchResult,
    pool: ThreadPool,
}

/// The UCI engine, holding current board state and thread pool.
///
/// Runs an event-driven loop on the main thread, dispatching searches
/// to a worker thread and processing UCI commands concurrently.
pub struct UciEngine {
    board: Board,
    history: Vec<u64>,
    pool: Option<ThreadPool>,
    state: EngineState,
    stop_flag: Arc<AtomicBool>,
    config: EngineConfig,
    pending_clear_tt: bool,
    /// Pending TT resize (MB) to apply when the search thread returns the pool.
    pending_resize_tt: Option<usize>,
}

impl UciEngine {
    /// Create a new engine with the starting position.
    pub fn new() -> Self {
        let config = EngineConfig::default();
        Self {
            board: Board::default(),
            history: Vec::new(),
            pool: Some(ThreadPool::new(config.hash_mb)),
            state: EngineState::Idle,
            stop_flag: Arc::new(AtomicBool::new(false)),
            config,
            pending_clear_tt: false,
            pending_resize_tt: None,
        }
    }

    /// Run the UCI event loop, reading from stdin until `quit` or input closes.
    pub fn run(mut self) -> Result<(), UciError> {
        let (tx, rx) = mpsc::channel::<EngineEvent>();

        // Spawn stdin reader thread
        let stdin_tx = tx.clone();
        thread::Builder::new()
            .name("corvid-stdin".to_string())
            .spawn(move || {
                let stdin = io::stdin();
                for line in stdin.lock().lines() {
                    match line {
                        Ok(line) => {
                            let trimmed = line.trim();
                            if trimmed.is_empty() {
                                continue;
                            }
                            debug!(cmd = %trimmed, "received UCI command");
                            let cmd = parse_command(trimmed);
                            if stdin_tx.send(EngineEvent::UciCommand(cmd)).is_err() {
                                return;
                            }
                        }
                        Err(error) => {
                            warn!(%error, "failed to read stdin");
                            break;
                        }
                    }
                }
                let _ = stdin_tx.send(EngineEvent::InputClosed);
            })?;

        for event in &rx {
            match event {
                EngineEvent::UciCommand(Ok(cmd)) => match cmd {
                    Command::Uci => self.handle_uci(),
                    Command::IsReady => self.handle_isready(),
                    Command::UciNewGame => self.handle_ucinewgame(),
                    Command::Position(info) => self.handle_position(info),
                    Command::Go(params) => self.handle_go(params, &tx),
                    Command::SetOption(opt) => self.handle_setoption(opt),
                    Command::Stop => self.handle_stop(),
                    Command::Quit => {
                        // Stop any active search and wait for it to finish
                        if matches!(self.state, EngineState::Searching) {
                            self.handle_stop();
                            for ev in &rx {
                                if let EngineEvent::SearchDone(done) = ev {
                                    self.finish_search(done);
                                    break;
                                }
                            }
                        }
                        break;
                    }
                    Command::Unknown(_) => {}
                },
                EngineEvent::UciCommand(Err(e)) => {
                    warn!(error = %e, "UCI parse error");
                }
                EngineEvent::SearchDone(done) => {
                    self.finish_search(done);
                }
                EngineEvent::InputClosed => {
                    if matches!(self.state, EngineState::Searching) {
                        self.handle_stop();
                        for ev in &rx {
                            if let EngineEvent::SearchDone(done) = ev {
                                self.finish_search(done);
                                break;
                            }
                        }
                    }
                    break;
                }
            }
        }

        info!("corvid shutting down");
        Ok(())
    }

    fn handle_uci(&self) {
        println!("id name corvid {}", env!("CARGO_PKG_VERSION"));
        println!("id author the corvid developers");
        println!(
            "option name Hash type spin default 16 min 1 max {}",
            UciOption::HASH_MAX
        );
        println!(
            "option name Threads type spin default 1 min 1 max {}",
            UciOption::THREADS_MAX
        );
        println!(
            "option name MultiPV type spin default 1 min 1 max {}",
            UciOption::MULTI_PV_MAX
        );
        println!("uciok");
    }

    fn handle_isready(&self) {
        println!("readyok");
    }

    fn handle_ucinewgame(&mut self) {
        self.board = Board::default();
        self.history.clear();
        if let Some(ref pool) = self.pool {
            pool.clear_tt();
        } else {
            // Search thread owns the pool, defer clear until it comes back
            self.pending_clear_tt = true;
        }
    }

    fn handle_setoption(&mut self, option: UciOption) {
        debug!(?option, "setoption");
        match option {
            UciOption::Hash(mb) => {
                self.config.hash_mb = mb;
                if let Some(ref mut pool) = self.pool {
                    pool.resize_tt(mb);
                } else {
                    self.pending_resize_tt = Some(mb);
                }
            }
            UciOption::Threads(threads) => {
                self.config.threads = threads;
                if let Some(ref mut pool) = self.pool {
                    pool.set_num_threads(threads);
                }
            }
            UciOption::MultiPv(lines) => self.config.multi_pv = lines,
        }
    }

    fn handle_position(&mut self, info: PositionInfo) {
        self.board = info.board;
        self.history = info.history;
    }

    fn handle_go(&mut self, params: GoParams, tx: &mpsc::Sender<EngineEvent>) {
        if !matches!(self.state, EngineState::Idle) {
            warn!("go received while searching, ignoring");
            return;
        }

        let side = self.board.side_to_move();
        let limits = match search_limits(&params, side, self.config.multi_pv) {
            Ok(limits) => limits,
            Err(error) => {
                warn!(%error, "go rejected");
                return;
            }
        };

        // Fresh flag per search: the pool leaves it raised when done
        self.stop_flag = Arc::new(AtomicBool::new(false));

        // Take the pool, the search thread will own it
        let mut pool = match self.pool.take() {
            Some(pool) => pool,
            None => ThreadPool::new(self.config.hash_mb),
        };
        pool.set_num_threads(self.config.threads);

        let root = self.board.clone();
        let history = self.history.clone();
        let stop = Arc::clone(&self.stop_flag);
        let tx = tx.clone();

        let spawned = thread::Builder::new()
            .name("corvid-search".to_string())
            .stack_size(SEARCH_STACK_SIZE)
            .spawn(move || {
                let result = pool.search(&root, &history, &limits, &stop, |report| {
                    println!("{}", format_info(&root, report));
                });
                let _ = tx.send(EngineEvent::SearchDone(SearchDone { root, result, pool }));
            });

        match spawned {
            Ok(_) => self.state = EngineState::Searching,
            Err(error) => {
                warn!(%error, "failed to spawn search thread");
                self.pool = Some(self.fresh_pool());
                println!("bestmove 0000");
            }
        }
    }

    fn handle_stop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    fn fresh_pool(&self) -> ThreadPool {
        let mut pool = ThreadPool::new(self.config.hash_mb);
        pool.set_num_threads(self.config.threads);
        pool
    }

    fn finish_search(&mut self, done: SearchDone) {
        let mut pool = done.pool;

        if let Some(mb) = self.pending_resize_tt.take() {
            // Resize supersedes clear, a fresh allocation is already empty
            pool.resize_tt(mb);
            self.pending_clear_tt = false;
        } else if self.pending_clear_tt {
            pool.clear_tt();
            self.pending_clear_tt = false;
        }

        self.pool = Some(pool);
        println!("{}", format_bestmove(&done.root, &done.result));
        self.state = EngineState::Idle;
    }
}

impl Default for UciEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Translates `go` parameters into search limits for the side to move.
///
/// `movetime` wins over the clock; `infinite` ignores the clock entirely.
fn search_limits(
    params: &GoParams,
    side: Color,
    multi_pv: usize,
) -> Result<SearchLimits, UciError> {
    let mut limits = SearchLimits::new().with_multi_pv(multi_pv);
    if let Some(depth) = params.depth {
        limits = limits.with_depth(depth);
    }
    if let Some(nodes) = params.nodes {
        limits = limits.with_nodes(nodes);
    }

    let (time, increment) = match side {
        Color::White => (params.wtime, params.winc),
        Color::Black => (params.btime, params.binc),
    };
    if let Some(movetime) = params.movetime {
        limits = limits.with_move_time(movetime);
    } else if let (Some(time), false) = (time, params.infinite) {
        limits = limits.with_clock(time, increment.unwrap_or(Duration::ZERO), params.movestogo);
    }

    limits.validate()?;
    Ok(limits)
}

/// One `info` line for a completed iteration.
fn format_info(root: &Board, report: &IterationReport<'_>) -> String {
    let elapsed_ms = report.elapsed.as_millis().max(1);
    let nps = u128::from(report.nodes) * 1000 / elapsed_ms;
    let score = match mate_distance(report.score) {
        Some(moves) => format!("mate {moves}"),
        None => format!("cp {}", report.score),
    };
    format!(
        "info depth {} seldepth {} multipv {} score {} nodes {} nps {} hashfull {} time {} pv {}",
        report.depth,
        report.seldepth,
        report.multipv,
        score,
        report.nodes,
        nps,
        report.hashfull,
        elapsed_ms,
        format_line(root, report.pv)
    )
}

/// The `bestmove` line, `0000` when the root has no legal move.
fn format_bestmove(root: &Board, result: &SearchResult) -> String {
    let Some(best) = result.best_move else {
        return "bestmove 0000".to_string();
    };
    let mut line = format!("bestmove {}", format_uci_move(root, best));
    if let Some(ponder) = result.ponder_move {
        let mut after = root.clone();
        if after.try_play(best).is_ok() && after.is_legal(ponder) {
            line.push_str(" ponder ");
            line.push_str(&format_uci_move(&after, ponder));
        }
    }
    line
}
