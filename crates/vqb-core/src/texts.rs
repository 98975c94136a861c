//! User-facing reply texts.
//!
//! The keys follow the original message catalog; the strings live here instead
//! of an external JSON file so replies stay in lockstep with the error
//! taxonomy.

use crate::errors::Error;
use crate::kicker::KickReport;

pub const GET_CHAT_COMPLETE: &str =
    "Chat roster collected. Administrators are registered and the quiz can be started.";
pub const QUIZ_STARTED: &str = "The quiz begins! The first question is on its way.";
pub const QUIZ_FINISHED: &str = "The quiz is over. Thanks to everyone who played!";
pub const KICK_ALL_STARTED: &str = "Removing all non-administrator members...";
pub const ROUND_TIME_OVER: &str = "Time is up for this round.";

/// Human-readable reply for a rejected command or failed operation.
pub fn rejection(err: &Error) -> String {
    match err {
        Error::PermissionDenied => {
            "You do not have administrator rights to use this command.".to_string()
        }
        Error::NotReady => {
            "The chat roster has not been collected yet. Run /get_chat first.".to_string()
        }
        Error::AlreadyRunning => "The quiz has already been started.".to_string(),
        Error::AlreadyFinished => {
            "The quiz has already finished and cannot be restarted.".to_string()
        }
        Error::ProtectedTarget => "Administrators cannot be kicked.".to_string(),
        Error::MalformedKick => {
            "Reply to the target member's message to use /kick.".to_string()
        }
        Error::Platform(msg) => format!("The platform rejected the request: {msg}"),
        other => format!("Command failed: {other}"),
    }
}

pub fn question_announcement(round: usize, text: &str) -> String {
    format!("Round {round}!\n\n{text}")
}

pub fn member_kicked(display: &str) -> String {
    format!("{display} has been removed from the chat.")
}

pub fn kick_all_summary(report: &KickReport) -> String {
    if report.failed.is_empty() {
        return format!("Done. Removed {} members.", report.removed.len());
    }
    format!(
        "Done. Removed {} members; {} removals failed.",
        report.removed.len(),
        report.failed.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MemberId;

    #[test]
    fn kick_all_summary_mentions_failures_only_when_present() {
        let clean = KickReport {
            removed: vec![MemberId(2), MemberId(3)],
            failed: vec![],
        };
        assert_eq!(kick_all_summary(&clean), "Done. Removed 2 members.");

        let partial = KickReport {
            removed: vec![MemberId(2)],
            failed: vec![(MemberId(3), "user not in chat".to_string())],
        };
        assert!(kick_all_summary(&partial).contains("1 removals failed"));
    }

    #[test]
    fn every_rejection_has_a_reply() {
        for err in [
            Error::PermissionDenied,
            Error::NotReady,
            Error::AlreadyRunning,
            Error::AlreadyFinished,
            Error::ProtectedTarget,
            Error::MalformedKick,
            Error::Platform("x".to_string()),
        ] {
            assert!(!rejection(&err).is_empty());
        }
    }
}
