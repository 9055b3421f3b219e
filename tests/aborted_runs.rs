//! Runs against the real routine that must stop before writing anything

use std::io;

use region::Protection;
use selfpatch::protect::ProtectionSwitcher;
use selfpatch::{Outcome, PatchError, Routine, Session, SessionConfig, Stage, TargetRoutine};

/// Switcher that is always refused, like under a W^X policy
struct Denied;
unsafe impl ProtectionSwitcher for Denied {
    unsafe fn switch(&self, _: *const u8, _: usize, _: Protection) -> Result<(), region::Error> {
        Err(region::Error::SystemCall(io::Error::from(
            io::ErrorKind::PermissionDenied,
        )))
    }
}

/// Switcher that accepts everything and changes nothing
struct Inert;
unsafe impl ProtectionSwitcher for Inert {
    unsafe fn switch(&self, _: *const u8, _: usize, _: Protection) -> Result<(), region::Error> {
        Ok(())
    }
}

#[test]
fn test_protection_denied() {
    let routine = TargetRoutine::new();
    let mut session = Session::with_switcher(Denied, SessionConfig::default());

    let result = unsafe { session.run(&routine) };

    assert!(matches!(result, Err(PatchError::Protection(_))));
    assert_eq!(session.stage(), Stage::Aborted);
    assert_eq!(routine.current(), routine.pristine());
    assert_eq!(routine.invoke(), Outcome::Unchanged);
}

#[test]
fn test_empty_window() {
    let routine = TargetRoutine::new();
    let config = SessionConfig {
        window_len: 0,
        ..Default::default()
    };
    let mut session = Session::with_switcher(Inert, config);

    let result = unsafe { session.run(&routine) };

    assert!(matches!(
        result,
        Err(PatchError::PatternNotFound { window: 0, .. })
    ));
    assert_eq!(session.stage(), Stage::Aborted);
    assert!(routine.is_pristine());
}
