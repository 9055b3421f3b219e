use std::process::ExitCode;

use selfpatch::{Routine, Session, SessionConfig, TargetRoutine};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let routine = TargetRoutine::new();
    log::debug!("routine entry at {:p}", routine.entry());

    let mut session = Session::new(SessionConfig::default());
    // Safety: the routine is padded well past the scan window and this program has a single thread
    match unsafe { session.run(&routine) } {
        Ok(report) => {
            println!("{}", report.outcome);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("patching aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}
