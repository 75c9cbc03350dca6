//! Quiet-hours flag.
//!
//! Recomputed by the scheduler at the top of every tick from settings and
//! the local wall-clock time, and published as `quiet_mode_active`.  Behavior
//! modules read the flag to keep the robot silent at night.
//!
//! | Setting | Default |
//! |---|---|
//! | `quiet_mode.enabled` | `false` |
//! | `quiet_mode.start` | `"22:00"` |
//! | `quiet_mode.end` | `"07:00"` |
//!
//! The window is half-open (`start <= t < end`) and may wrap past midnight.

use chrono::NaiveTime;
use houndmind_types::RuntimeContext;
use tracing::debug;

pub const DEFAULT_START: &str = "22:00";
pub const DEFAULT_END: &str = "07:00";

/// Parse `"HH:MM"`.
pub fn parse_hhmm(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok()
}

/// `true` when `now` falls inside `[start, end)`, wrapping midnight when
/// `start > end`.  An empty window (`start == end`) is never active.
pub fn in_window(start: NaiveTime, end: NaiveTime, now: NaiveTime) -> bool {
    if start == end {
        false
    } else if start < end {
        start <= now && now < end
    } else {
        now >= start || now < end
    }
}

/// Evaluate the quiet-hours flag for `now` (local time).
pub fn is_active(ctx: &RuntimeContext, now: NaiveTime) -> bool {
    if !ctx.setting_bool("quiet_mode.enabled").unwrap_or(false) {
        return false;
    }
    let start_raw = ctx.setting_str("quiet_mode.start").unwrap_or(DEFAULT_START);
    let end_raw = ctx.setting_str("quiet_mode.end").unwrap_or(DEFAULT_END);
    match (parse_hhmm(start_raw), parse_hhmm(end_raw)) {
        (Some(start), Some(end)) => in_window(start, end, now),
        _ => {
            debug!(start = start_raw, end = end_raw, "malformed quiet_mode window; treating as inactive");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use houndmind_types::keys;
    use serde_json::json;

    fn t(raw: &str) -> NaiveTime {
        parse_hhmm(raw).unwrap()
    }

    fn ctx_with(settings: serde_json::Value) -> RuntimeContext {
        let mut ctx = RuntimeContext::new();
        ctx.set(keys::SETTINGS, settings);
        ctx
    }

    #[test]
    fn parses_hours_and_minutes() {
        assert_eq!(t("07:30"), NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        assert!(parse_hhmm("25:00").is_none());
        assert!(parse_hhmm("soon").is_none());
    }

    #[test]
    fn same_day_window() {
        assert!(in_window(t("13:00"), t("15:00"), t("13:00")));
        assert!(in_window(t("13:00"), t("15:00"), t("14:59")));
        assert!(!in_window(t("13:00"), t("15:00"), t("15:00")));
        assert!(!in_window(t("13:00"), t("15:00"), t("09:00")));
    }

    #[test]
    fn window_wrapping_midnight() {
        assert!(in_window(t("22:00"), t("07:00"), t("23:30")));
        assert!(in_window(t("22:00"), t("07:00"), t("03:00")));
        assert!(!in_window(t("22:00"), t("07:00"), t("07:00")));
        assert!(!in_window(t("22:00"), t("07:00"), t("12:00")));
    }

    #[test]
    fn empty_window_is_never_active() {
        assert!(!in_window(t("08:00"), t("08:00"), t("08:00")));
    }

    #[test]
    fn disabled_by_default() {
        let ctx = RuntimeContext::new();
        assert!(!is_active(&ctx, t("23:00")));
    }

    #[test]
    fn enabled_uses_default_window() {
        let ctx = ctx_with(json!({"quiet_mode": {"enabled": true}}));
        assert!(is_active(&ctx, t("23:00")));
        assert!(!is_active(&ctx, t("12:00")));
    }

    #[test]
    fn custom_window_from_settings() {
        let ctx = ctx_with(json!({"quiet_mode": {"enabled": true, "start": "12:00", "end": "14:00"}}));
        assert!(is_active(&ctx, t("13:00")));
        assert!(!is_active(&ctx, t("23:00")));
    }

    #[test]
    fn malformed_window_is_inactive() {
        let ctx = ctx_with(json!({"quiet_mode": {"enabled": true, "start": "late"}}));
        assert!(!is_active(&ctx, t("23:00")));
    }
}
