use chrono::{DateTime, Datelike, Duration, TimeZone};

struct Names {
    full: [&'static str; 12],
    abbreviated: [&'static str; 12],
}

const MONTHS_EN: Names = Names {
    full: [
        "January", "February", "March", "April", "May", "June", "July", "August", "September",
        "October", "November", "December",
    ],
    abbreviated: [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ],
};

const DAYS_EN: [[&str; 7]; 2] = [
    ["Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday"],
    ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"],
];

/// Month table for a device language. Only English (`en`, `en_GB`) ships;
/// every other language falls back to `en`.
fn months(language: &str) -> &'static Names {
    match language {
        "en" | "en_GB" => &MONTHS_EN,
        _ => &MONTHS_EN,
    }
}

fn days(language: &str) -> &'static [[&'static str; 7]; 2] {
    match language {
        "en" | "en_GB" => &DAYS_EN,
        _ => &DAYS_EN,
    }
}

pub fn month_name<D: Datelike>(date: &D, language: &str, abbreviated: bool) -> &'static str {
    let names = months(language);
    let index = date.month0() as usize;
    if abbreviated {
        names.abbreviated[index]
    } else {
        names.full[index]
    }
}

pub fn day_name<D: Datelike>(date: &D, language: &str, abbreviated: bool) -> &'static str {
    let table = days(language);
    let index = date.weekday().num_days_from_sunday() as usize;
    table[usize::from(abbreviated)][index]
}

/// Moves forward by whole 24 hour steps; `0` counts as one day.
pub fn next_day<Tz: TimeZone>(date: DateTime<Tz>, days: i64) -> DateTime<Tz> {
    date + Duration::days(if days == 0 { 1 } else { days })
}

pub fn prev_day<Tz: TimeZone>(date: DateTime<Tz>, days: i64) -> DateTime<Tz> {
    date - Duration::days(if days == 0 { 1 } else { days })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn names_fall_back_to_english() {
        let date = Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap();
        assert_eq!(month_name(&date, "en", false), "February");
        assert_eq!(month_name(&date, "en_GB", true), "Feb");
        assert_eq!(month_name(&date, "tr", false), "February");
        assert_eq!(day_name(&date, "en", false), "Thursday");
        assert_eq!(day_name(&date, "fr", true), "Thu");
    }

    #[test]
    fn steps_whole_days() {
        let date = Utc.with_ymd_and_hms(2024, 2, 28, 23, 30, 0).unwrap();
        assert_eq!(next_day(date, 1).day(), 29);
        assert_eq!(next_day(date, 0).day(), 29);
        assert_eq!(next_day(date, 2).month(), 3);
        assert_eq!(prev_day(date, 28).month(), 1);
    }
}
