//! Resumable, one-instruction-at-a-time executions.
//!
//! A [`SessionStore`] owns any number of independent [`Session`]s, each identified
//! by an opaque [`SessionId`]. Every [`SessionStore::advance`] call executes exactly
//! one instruction of that session's program and reports what happened.
//!
//! The store can be shared between threads. Sessions are individually locked,
//! so advancing different sessions never contends, and advancing the same
//! session from two threads is serialized.
//!
//! ```
//! use mips_ensemble::sim::session::{Advance, SessionStore};
//!
//! let store = SessionStore::new();
//! let init = store.init_source("li $t0, 1\nli $t1, 2").unwrap();
//! assert_eq!(init.instr_count, 2);
//!
//! let Advance::Step(step) = store.advance(init.id).unwrap() else { panic!("expected step") };
//! assert_eq!(step.pc, 4);
//! assert_eq!(step.instr_text, "li $t0, 1");
//!
//! store.advance(init.id).unwrap();
//! assert_eq!(store.advance(init.id).unwrap(), Advance::Completed);
//!
//! assert!(store.remove(init.id));
//! assert!(store.advance(init.id).is_err());
//! ```

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::asm::{assemble_src, Program, SourceErr};
use crate::ast::sim::SimInstr;
use crate::err::ErrCategory;

use super::mem::{Memory, RegFile};
use super::observer::ChangeObserver;
use super::signals::ControlSignals;
use super::{SimErr, SimFlags, Simulator};

/// An opaque session identifier.
///
/// Identifiers are random 128-bit values, displayed as 32 hex digits.
///
/// ```
/// use mips_ensemble::sim::session::SessionId;
///
/// let id: SessionId = "000000000000000000000000deadbeef".parse().unwrap();
/// assert_eq!(id.to_string(), "000000000000000000000000deadbeef");
/// assert!("not an id".parse::<SessionId>().is_err());
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct SessionId(u128);
impl SessionId {
    fn random() -> Self {
        SessionId(rand::random())
    }
}
impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}
impl std::str::FromStr for SessionId {
    type Err = SessionErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.len() == 32 {
            true => u128::from_str_radix(s, 16)
                .map(SessionId)
                .map_err(|_| SessionErr::InvalidSession(s.to_string())),
            false => Err(SessionErr::InvalidSession(s.to_string())),
        }
    }
}

/// Errors from looking up sessions.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum SessionErr {
    /// The identifier does not refer to a live session.
    InvalidSession(String),
}
impl std::fmt::Display for SessionErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionErr::InvalidSession(id) => write!(f, "invalid session: {id}"),
        }
    }
}
impl std::error::Error for SessionErr {}
impl crate::err::Error for SessionErr {
    fn help(&self) -> Option<Cow<str>> {
        Some("the session may have been removed, try initializing a new session".into())
    }

    fn category(&self) -> ErrCategory {
        ErrCategory::InvalidSession
    }
}

/// The result of initializing a session.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SessionInit {
    /// The new session's identifier.
    pub id: SessionId,
    /// The number of instructions in the session's program.
    pub instr_count: usize,
}

/// Everything that happened during one step.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct StepReport {
    /// The register values after the step.
    pub regs: RegFile,
    /// The memory contents after the step.
    pub mem: Memory,
    /// The PC after the step.
    pub pc: u32,
    /// The address of the instruction that was executed.
    pub pc_before: u32,
    /// The console output printed by this step only.
    pub output: String,
    /// The text of the executed instruction.
    pub instr_text: String,
    /// The control signals of the executed instruction.
    pub signals: ControlSignals,
    /// The machine code of the executed instruction.
    pub words: Vec<SimInstr>,
    /// What the step changed.
    pub changes: ChangeObserver,
    /// The fault this step raised, if any. A faulted session is completed.
    pub error: Option<SimErr>,
}

/// The result of [`SessionStore::advance`].
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Advance {
    /// The program had already finished. Nothing was executed.
    Completed,
    /// One instruction was executed.
    Step(Box<StepReport>),
}

/// A resumable execution of one program.
#[derive(Debug)]
pub struct Session {
    sim: Simulator,
    completed: bool,
}
impl Session {
    /// Creates a session, ready to execute the program's first instruction.
    pub fn new(program: &Program, flags: SimFlags) -> Self {
        let mut sim = Simulator::new(flags);
        sim.load_program(program);
        Session { sim, completed: false }
    }

    /// The simulator backing this session.
    pub fn simulator(&self) -> &Simulator {
        &self.sim
    }

    /// Whether the program has finished (or faulted).
    pub fn is_completed(&self) -> bool {
        self.completed || self.sim.is_done()
    }

    /// Executes one instruction.
    pub fn advance(&mut self) -> Advance {
        if self.is_completed() {
            self.completed = true;
            return Advance::Completed;
        }

        let pc_before = self.sim.pc;
        let program = self.sim.program();
        let (instr_text, signals, words) = match program.index_of(pc_before) {
            Some(i) => {
                let pi = &program.instrs()[i];
                let text = program.instr_text(i).map_or_else(|| pi.instr.to_string(), Cow::into_owned);
                (text, pi.instr.mnemonic().signals(), pi.words.clone())
            },
            None => {
                self.completed = true;
                return Advance::Completed;
            }
        };

        let out_start = self.sim.output().len();
        let error = self.sim.step_in().err();
        if error.is_some() {
            self.completed = true;
        }

        Advance::Step(Box::new(StepReport {
            regs: self.sim.reg_file.clone(),
            mem: self.sim.mem.clone(),
            pc: self.sim.pc,
            pc_before,
            output: self.sim.output()[out_start..].to_string(),
            instr_text,
            signals,
            words,
            changes: self.sim.observer.clone(),
            error,
        }))
    }
}

/// A thread-safe collection of sessions.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
    /// The flags each new session's simulator is created with.
    pub flags: SimFlags,
}
impl SessionStore where SessionStore: Send + Sync { /* assert SessionStore is send/sync */ }

impl SessionStore {
    /// Creates an empty store whose sessions use the default flags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store whose sessions use the given flags.
    pub fn with_flags(flags: SimFlags) -> Self {
        Self { sessions: Default::default(), flags }
    }

    /// Starts a new session for the given program.
    pub fn init(&self, program: &Program) -> SessionInit {
        let session = Arc::new(Mutex::new(Session::new(program, self.flags)));
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);

        let mut id = SessionId::random();
        while sessions.contains_key(&id) {
            id = SessionId::random();
        }
        sessions.insert(id, session);

        SessionInit { id, instr_count: program.len() }
    }

    /// Parses and assembles source code, then starts a new session for it.
    ///
    /// If the code fails to assemble, no session is created.
    pub fn init_source(&self, src: &str) -> Result<SessionInit, SourceErr> {
        let program = assemble_src(src)?;
        Ok(self.init(&program))
    }

    fn get(&self, id: SessionId) -> Result<Arc<Mutex<Session>>, SessionErr> {
        self.sessions.read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or_else(|| SessionErr::InvalidSession(id.to_string()))
    }

    /// Executes one instruction of the given session.
    ///
    /// Advancing a completed session is not an error: it reports [`Advance::Completed`] again.
    pub fn advance(&self, id: SessionId) -> Result<Advance, SessionErr> {
        let session = self.get(id)?;
        let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(session.advance())
    }

    /// Whether the given session has finished.
    pub fn is_completed(&self, id: SessionId) -> Result<bool, SessionErr> {
        let session = self.get(id)?;
        let session = session.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(session.is_completed())
    }

    /// Removes a session, returning whether it existed.
    pub fn remove(&self, id: SessionId) -> bool {
        self.sessions.write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    /// The number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether there are no live sessions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
