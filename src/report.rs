//! Where user-facing problems go.
//!
//! The algebra and the extraction filter never log their failures straight
//! away; they hand them to a `Report` passed in by the caller. The CLI uses
//! `LogReport`, tests collect into a `Vec`.

use log::Level;

pub trait Report {
    fn report(&mut self, level: Level, msg: String);

    fn error(&mut self, msg: String) {
        self.report(Level::Error, msg)
    }

    fn warning(&mut self, msg: String) {
        self.report(Level::Warn, msg)
    }
}

/// Forwards reports to the logger.
pub struct LogReport;

impl Report for LogReport {
    fn report(&mut self, level: Level, msg: String) {
        log!(level, "{}", msg);
    }
}

impl Report for Vec<(Level, String)> {
    fn report(&mut self, level: Level, msg: String) {
        self.push((level, msg));
    }
}

#[test]
fn test_collecting_report() {
    let mut reports: Vec<(Level, String)> = vec![];
    reports.error("first".to_string());
    reports.warning("second".to_string());
    assert_eq!(reports, vec![
        (Level::Error, "first".to_string()),
        (Level::Warn, "second".to_string()),
    ]);
}
