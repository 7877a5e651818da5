// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use yare::parameterized;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 9, 30, 0).single().unwrap()
}

#[parameterized(
    min = { 1 },
    mid = { 12 },
    max = { 72 },
)]
fn delay_hours_in_range_accepted(hours: i64) {
    let schedule = Schedule::Delayed { delay_hours: hours };
    assert_eq!(schedule.validate(now()), Ok(()));
}

#[parameterized(
    zero = { 0 },
    over = { 73 },
    negative = { -1 },
)]
fn delay_hours_out_of_range_rejected(hours: i64) {
    let schedule = Schedule::Delayed { delay_hours: hours };
    assert_eq!(
        schedule.validate(now()),
        Err(ScheduleError::DelayOutOfRange(hours))
    );
}

#[test]
fn scheduled_time_must_be_strictly_future() {
    let schedule = Schedule::Scheduled {
        scheduled_time: now(),
    };
    assert_eq!(schedule.validate(now()), Err(ScheduleError::TimeInPast));

    let schedule = Schedule::Scheduled {
        scheduled_time: now() + Duration::seconds(1),
    };
    assert_eq!(schedule.validate(now()), Ok(()));
}

#[test]
fn scheduled_time_beyond_a_year_rejected() {
    let schedule = Schedule::Scheduled {
        scheduled_time: now() + Duration::days(366),
    };
    assert_eq!(schedule.validate(now()), Err(ScheduleError::TimeTooFar));
}

#[test]
fn immediate_resolves_to_now() {
    assert_eq!(Schedule::Immediate.resolve_scheduled_at(now(), None), now());
}

#[test]
fn after_reset_uses_current_window_reset() {
    let reset = now() + Duration::hours(2);
    assert_eq!(
        Schedule::AfterReset.resolve_scheduled_at(now(), Some(reset)),
        reset
    );
}

#[test]
fn after_reset_without_window_falls_back_five_hours() {
    assert_eq!(
        Schedule::AfterReset.resolve_scheduled_at(now(), None),
        now() + Duration::hours(5)
    );
}

#[test]
fn delayed_resolves_relative_to_now() {
    let schedule = Schedule::Delayed { delay_hours: 3 };
    assert_eq!(
        schedule.resolve_scheduled_at(now(), None),
        now() + Duration::hours(3)
    );
}

#[test]
fn status_terminality() {
    assert!(!JobStatus::Pending.is_terminal());
    assert!(!JobStatus::Running.is_terminal());
    assert!(JobStatus::Completed.is_terminal());
    assert!(JobStatus::Failed.is_terminal());
    assert!(JobStatus::Cancelled.is_terminal());
}

#[test]
fn status_parse_roundtrips() {
    for status in [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ] {
        assert_eq!(JobStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(JobStatus::parse("bogus"), None);
}

#[test]
fn schedule_kind_tags() {
    assert_eq!(Schedule::Immediate.kind(), "immediate");
    assert_eq!(Schedule::AfterReset.kind(), "after_reset");
    assert_eq!(Schedule::Delayed { delay_hours: 1 }.kind(), "delayed");
    assert_eq!(
        Schedule::Scheduled {
            scheduled_time: now()
        }
        .kind(),
        "scheduled"
    );
}
