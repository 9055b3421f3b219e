//! # Session
//!
//! Runs one patch from start to finish and checks that it worked.
//!
//! A run walks `Unpatched → ProtectionChanged → Patched → Invoked`. Any failure moves it to
//! `Aborted` and is returned to the caller; nothing is rolled back.

use std::fmt::{self, Display};

use iced_x86::Code;

use crate::code::x64::{nops, JCC_SHORT_LEN, JE_SHORT};
use crate::error::{PatchError, Result};
use crate::locate::{self, PatchWindow};
use crate::page::{self, PageSpan};
use crate::patcher::byte::BytePatcher;
use crate::patcher::mem::PermissionWrapper;
use crate::patcher::{PatchRecord, Patcher};
use crate::protect::{self, ProtectionSwitcher, RegionSwitcher};
use crate::target::Outcome;

/// Code that can be patched and then called to observe the result
pub trait Routine {
    /// Address of the first instruction
    fn entry(&self) -> *const u8;
    /// Calls the routine and reports which result it produced
    fn invoke(&self) -> Outcome;
}

/// Tunables for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Bytes scanned from the routine's entry
    pub window_len: usize,
    /// Opcode of the instruction to neutralize
    pub opcode: u8,
    /// Length of that instruction, and of the `nop` sled replacing it
    pub patch_len: usize,
    /// Instruction the match site must decode to
    pub expected: Code,
    /// Decode the match site before writing to it
    pub validate: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window_len: 128,
            opcode: JE_SHORT,
            patch_len: JCC_SHORT_LEN,
            expected: Code::Je_rel8_64,
            validate: true,
        }
    }
}

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Nothing has been touched
    Unpatched,
    /// The routine's pages are readable, writable and executable
    ProtectionChanged,
    /// The branch has been replaced
    Patched,
    /// The patched routine has been called
    Invoked,
    /// A step failed and the run stopped
    Aborted,
}

impl Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unpatched => "unpatched",
            Self::ProtectionChanged => "protection changed",
            Self::Patched => "patched",
            Self::Invoked => "invoked",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Summary of a successful run
#[derive(Debug, Clone)]
pub struct Report {
    /// Page size the span was computed with
    pub page_size: usize,
    /// Pages whose protection was changed
    pub span: PageSpan,
    /// Offset of the patched instruction from the routine's entry
    pub offset: usize,
    /// What was written, and what it replaced
    pub record: PatchRecord,
    /// Result of the routine before patching
    pub baseline: Outcome,
    /// Result of the routine after patching
    pub outcome: Outcome,
}

/// One patching run over a routine
pub struct Session<S: ProtectionSwitcher = RegionSwitcher> {
    /// Switcher used to unlock the routine's pages
    switcher: S,
    /// Tunables
    config: SessionConfig,
    /// Current stage
    stage: Stage,
}

impl Session {
    /// Creates a session that changes protections through the operating system
    pub fn new(config: SessionConfig) -> Self {
        Self::with_switcher(RegionSwitcher, config)
    }
}

impl<S: ProtectionSwitcher> Session<S> {
    /// Creates a session using a custom protection switcher
    pub fn with_switcher(switcher: S, config: SessionConfig) -> Self {
        Self {
            switcher,
            config,
            stage: Stage::Unpatched,
        }
    }

    /// Current stage of the run
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Configuration of the run
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the switcher used by this session
    pub fn switcher(&self) -> &S {
        &self.switcher
    }

    /// Patches `routine` and calls it
    ///
    /// A session runs once; calling this again returns [`PatchError::AlreadyRan`] without
    /// touching the routine.
    ///
    /// # Safety
    ///
    /// `routine.entry()` must be mapped for at least `window_len` bytes, and no other thread may
    /// execute the routine while it is being patched.
    pub unsafe fn run<R: Routine + ?Sized>(&mut self, routine: &R) -> Result<Report> {
        if self.stage != Stage::Unpatched {
            return Err(PatchError::AlreadyRan { stage: self.stage });
        }
        let result = self.steps(routine);
        if let Err(e) = &result {
            log::debug!("aborting at stage {}: {}", self.stage, e);
            self.stage = Stage::Aborted;
        }
        result
    }

    /// The run itself, [`Self::run`] handles the abort bookkeeping
    unsafe fn steps<R: Routine + ?Sized>(&mut self, routine: &R) -> Result<Report> {
        let baseline = routine.invoke();
        let entry = routine.entry();
        let window = PatchWindow::new(entry, self.config.window_len);

        let page_size = page::page_size();
        let span = PageSpan::covering(entry as usize, window.len(), page_size)?;
        log::debug!(
            "routine at {:p}, page size {:#x}, span {:#x}..{:#x}",
            entry,
            page_size,
            span.base(),
            span.end()
        );

        if let Err(e) = protect::unlock_code(&self.switcher, &span) {
            log::error!("mprotect() failed: {}", e);
            return Err(e);
        }
        log::info!("mprotect(): success");
        self.advance(Stage::ProtectionChanged);

        let site = locate::locate(&window, self.config.opcode)?;
        let offset = site as usize - entry as usize;
        locate::check_fits(window.len(), offset, self.config.patch_len)?;
        if self.config.validate {
            locate::validate_site(
                window.as_slice(),
                offset,
                entry as u64,
                self.config.patch_len,
                self.config.expected,
            )?;
        }

        // the wrapper unlocks exactly the pages the write touches
        let patcher = PermissionWrapper::with_switcher(BytePatcher::new(), &self.switcher);
        let record = patcher.patch(site, &nops(self.config.patch_len))?;
        record.read_back()?;
        log::info!(
            "replaced {:02x?} at +{:#x} with {:02x?}",
            record.original(),
            offset,
            record.replacement()
        );
        self.advance(Stage::Patched);

        let outcome = routine.invoke();
        self.advance(Stage::Invoked);
        if outcome == baseline || outcome != Outcome::Modified {
            return Err(PatchError::NoEffect);
        }

        Ok(Report {
            page_size,
            span,
            offset,
            record,
            baseline,
            outcome,
        })
    }

    /// Moves to the next stage
    fn advance(&mut self, stage: Stage) {
        log::debug!("{} -> {}", self.stage, stage);
        self.stage = stage;
    }
}
