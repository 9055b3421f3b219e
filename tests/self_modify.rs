//! Patches the real routine. Kept to a single test so nothing else in this binary
//! runs the routine while it is being rewritten.

use std::cell::RefCell;

use region::Protection;
use selfpatch::code::x64::NOP;
use selfpatch::protect::{protection_at, ProtectionSwitcher, RegionSwitcher};
use selfpatch::target::PRISTINE;
use selfpatch::{Outcome, Routine, Session, SessionConfig, Stage, TargetRoutine};

/// Forwards to the operating system and remembers what was asked for
#[derive(Default)]
struct Recording {
    /// Every protection requested
    calls: RefCell<Vec<Protection>>,
}
unsafe impl ProtectionSwitcher for Recording {
    unsafe fn switch(
        &self,
        base: *const u8,
        len: usize,
        protection: Protection,
    ) -> Result<(), region::Error> {
        self.calls.borrow_mut().push(protection);
        RegionSwitcher.switch(base, len, protection)
    }
}

#[test]
fn test_code_modifies_itself() {
    let routine = TargetRoutine::new();
    assert_eq!(routine.invoke(), Outcome::Unchanged);

    let mut session = Session::with_switcher(Recording::default(), SessionConfig::default());
    let report = unsafe { session.run(&routine) }.unwrap();

    assert_eq!(session.stage(), Stage::Invoked);
    assert_eq!(report.baseline, Outcome::Unchanged);
    assert_eq!(report.outcome, Outcome::Modified);
    assert_eq!(report.outcome.to_string(), "Code modified itself!");
    assert_eq!(report.offset, 2);
    assert_eq!(report.record.original(), [0x74, 0x06]);
    assert_eq!(report.span.base() % report.page_size, 0);
    assert!(report.span.base() <= routine.entry() as usize);

    // only the branch changed
    let mut expected = PRISTINE;
    expected[2] = NOP;
    expected[3] = NOP;
    assert_eq!(routine.current(), expected);

    // the patch sticks and the page stays executable
    assert_eq!(routine.invoke(), Outcome::Modified);
    let protection = protection_at(routine.entry()).unwrap();
    assert!(protection.contains(Protection::WRITE | Protection::EXECUTE));

    let calls = session.switcher().calls.borrow();
    assert!(!calls.is_empty());
    for protection in calls.iter() {
        assert!(protection.contains(Protection::WRITE));
        assert!(protection.contains(Protection::EXECUTE));
    }
}
