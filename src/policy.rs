//! Command allowlist: classifies a raw command line as allowed or rejected.
//!
//! Verb matching is plain string splitting, not a regex — matching how the
//! rest of this codebase's textual dispatch is written.

use std::collections::HashSet;
use std::sync::LazyLock;

static BLOCKED: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "onkey",
        "offkey",
        "laser_en",
        "continuous",
        "pulse",
        "power",
        "laserdac",
        "drivedc",
        "pilot",
        "pilotdac",
        "piloti",
        "feederon",
        "feederoff",
        "feedermove",
        "outstart",
        "outstop",
        "instart",
        "instop",
        "writeio",
        "writeall",
        "reboot",
        "download",
        "chgboot",
        "setprocess",
        "applypro",
    ]
    .into_iter()
    .collect()
});

static SAFE_GETTERS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "status",
        "worktime",
        "warning",
        "error",
        "lock",
        "mode",
        "state",
        "substatus",
        "getall",
        "cur_pro",
        "feeder_pro",
        "maxpower",
        "temp",
        "pres",
        "pressure",
        "version",
        "help",
        "free",
        "ps",
        "list_device",
    ]
    .into_iter()
    .collect()
});

static SAFE_SETTERS_REQUIRE_PARAMS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "maxpower",
        "risetk",
        "falltk",
        "gaseatk",
        "gaslatk",
        "onwatk",
        "offwatk",
        "fan",
        "fanon",
        "fanduty",
        "fantemp",
        "intertimeout",
    ]
    .into_iter()
    .collect()
});

/// First whitespace-delimited token of `cmd`, lowercased. Empty if `cmd` is blank.
#[must_use]
pub fn normalize_verb(cmd: &str) -> String {
    cmd.trim()
        .split_whitespace()
        .next()
        .map(str::to_lowercase)
        .unwrap_or_default()
}

/// Classify `cmd`, returning `(allowed, reason)`. `reason` is always a
/// non-empty, human-meaningful string, whether or not `cmd` is allowed.
///
/// `maxpower` appears in both `SAFE_GETTERS` and `SAFE_SETTERS_REQUIRE_PARAMS`
/// (it can be read with no arguments or set with one); the setter check runs
/// first, so `maxpower` with no arguments is rejected as a setter missing its
/// parameter rather than falling through to the getter rule.
#[must_use]
pub fn is_allowed(cmd: &str) -> (bool, String) {
    let c = cmd.trim();
    if c.is_empty() {
        return (false, "Empty command".to_string());
    }
    if c.contains('\n') || c.contains('\r') {
        return (false, "Multiline commands not allowed".to_string());
    }
    if c.contains(';') {
        return (false, "Semicolons not allowed".to_string());
    }

    let verb = normalize_verb(c);
    let has_args = c.split_whitespace().count() > 1;

    if BLOCKED.contains(verb.as_str()) {
        return (false, format!("Blocked verb: {verb}"));
    }

    if SAFE_SETTERS_REQUIRE_PARAMS.contains(verb.as_str()) {
        if !has_args {
            return (false, format!("Missing parameters for setter: {verb}"));
        }
        return (true, "Allowed setter-with-params".to_string());
    }

    if SAFE_GETTERS.contains(verb.as_str()) {
        return (true, "Allowed getter".to_string());
    }

    (false, format!("Unknown/unaudited command: {verb}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn getter_allowed_case_insensitive() {
        assert!(is_allowed("status").0);
        assert!(is_allowed("STATUS ").0);
    }

    #[test]
    fn blocked_verb_rejected() {
        let (ok, reason) = is_allowed("reboot");
        assert!(!ok);
        assert!(reason.contains("Blocked"));
    }

    #[test]
    fn setter_without_params_rejected() {
        let (ok, reason) = is_allowed("fan");
        assert!(!ok);
        assert!(reason.contains("parameters"));
    }

    #[test]
    fn setter_with_params_allowed() {
        assert!(is_allowed("fan 1").0);
    }

    #[test]
    fn multiline_rejected() {
        let (ok, reason) = is_allowed("status\nreboot");
        assert!(!ok);
        assert!(reason.contains("Multiline"));
    }

    #[test]
    fn semicolon_rejected() {
        let (ok, reason) = is_allowed("status; reboot");
        assert!(!ok);
        assert!(reason.contains("Semicolon"));
    }

    #[test]
    fn empty_rejected() {
        let (ok, reason) = is_allowed("   ");
        assert!(!ok);
        assert!(reason.contains("Empty"));
    }

    #[test]
    fn unknown_verb_rejected() {
        let (ok, reason) = is_allowed("frobnicate");
        assert!(!ok);
        assert!(reason.contains("Unknown"));
    }

    #[test]
    fn reason_always_nonempty() {
        for cmd in ["status", "reboot", "fan", "fan 1", "", "bogus"] {
            let (_, reason) = is_allowed(cmd);
            assert!(!reason.is_empty());
        }
    }
}
