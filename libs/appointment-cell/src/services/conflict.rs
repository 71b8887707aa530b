use chrono::{DateTime, Utc};

use crate::models::{Appointment, BookingInterval};

/// Latest end among the appointments blocking a candidate slot. An emergency
/// booking that hit a conflict moves its start here.
pub fn latest_end(blocking: &[Appointment]) -> Option<DateTime<Utc>> {
    blocking.iter().map(Appointment::ends_at).max()
}

/// Free time of a day: the open windows minus every booked interval, with
/// touching pieces merged, ascending.
pub fn free_intervals(windows: &[BookingInterval], booked: &[BookingInterval]) -> Vec<BookingInterval> {
    let mut booked: Vec<BookingInterval> = booked.to_vec();
    booked.sort_by_key(|interval| interval.start);

    let mut windows: Vec<BookingInterval> = windows.to_vec();
    windows.sort_by_key(|interval| interval.start);

    let mut free: Vec<BookingInterval> = Vec::new();
    for window in windows {
        let mut cursor = window.start;

        for taken in booked.iter().filter(|taken| taken.overlaps(&window)) {
            if taken.start > cursor {
                push_merged(&mut free, BookingInterval::between(cursor, taken.start));
            }
            cursor = cursor.max(taken.end);
        }

        if cursor < window.end {
            push_merged(&mut free, BookingInterval::between(cursor, window.end));
        }
    }

    free
}

fn push_merged(free: &mut Vec<BookingInterval>, next: BookingInterval) {
    match free.last_mut() {
        Some(last) if last.end >= next.start => last.end = last.end.max(next.end),
        _ => free.push(next),
    }
}
