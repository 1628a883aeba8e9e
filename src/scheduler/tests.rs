//! Tests for the release calendar

#[cfg(test)]
mod tests {
    use super::super::*;
    use chrono::{NaiveDate, TimeZone, Timelike, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_nfp_first_friday_only() {
        // June 2024: Fridays on 7, 14, 21, 28
        assert!(ReleaseEvent::Nfp.fires_on(date(2024, 6, 7)));
        assert!(!ReleaseEvent::Nfp.fires_on(date(2024, 6, 14)));
        assert!(!ReleaseEvent::Nfp.fires_on(date(2024, 6, 6)));
    }

    #[test]
    fn test_ism_business_days() {
        // June 2024 starts on a Saturday
        assert!(!ReleaseEvent::IsmManufacturing.fires_on(date(2024, 6, 1)));
        assert!(ReleaseEvent::IsmManufacturing.fires_on(date(2024, 6, 3)));
        assert!(ReleaseEvent::IsmServices.fires_on(date(2024, 6, 5)));
        assert!(!ReleaseEvent::IsmServices.fires_on(date(2024, 6, 4)));
    }

    #[test]
    fn test_ism_skips_labor_day() {
        // 2024-09-01 is a Sunday, 2024-09-02 Labor Day
        assert!(!ReleaseEvent::IsmManufacturing.fires_on(date(2024, 9, 2)));
        assert!(ReleaseEvent::IsmManufacturing.fires_on(date(2024, 9, 3)));
        assert!(!ReleaseEvent::IsmServices.fires_on(date(2024, 9, 4)));
        assert!(ReleaseEvent::IsmServices.fires_on(date(2024, 9, 5)));
    }

    #[test]
    fn test_us_holidays() {
        let holidays_2024 = [
            date(2024, 1, 1),
            date(2024, 1, 15),
            date(2024, 2, 19),
            date(2024, 3, 29),
            date(2024, 5, 27),
            date(2024, 6, 19),
            date(2024, 7, 4),
            date(2024, 9, 2),
            date(2024, 10, 14),
            date(2024, 11, 11),
            date(2024, 11, 28),
            date(2024, 12, 25),
        ];
        for holiday in holidays_2024 {
            assert!(is_us_holiday(holiday), "{} should be a holiday", holiday);
        }
        assert!(!is_us_holiday(date(2024, 7, 5)));
        assert!(!is_us_holiday(date(2024, 3, 28)));

        // Weekend observance: Christmas 2022 on Sunday, New Year 2022 on Saturday
        assert!(is_us_holiday(date(2022, 12, 26)));
        assert!(is_us_holiday(date(2021, 12, 31)));
        // Good Friday 2025
        assert!(is_us_holiday(date(2025, 4, 18)));
    }

    #[test]
    fn test_fomc_checked_on_business_days() {
        let fomc = ReleaseEvent::Fomc;
        assert!(fomc.same_day_only());
        assert!(!ReleaseEvent::Cpi.same_day_only());
        assert!(fomc.fires_on(date(2024, 6, 12)));
        assert!(!fomc.fires_on(date(2024, 6, 15)));
        assert!(!fomc.fires_on(date(2024, 7, 4)));
        assert_eq!(fomc.local_time().hour(), 14);
        assert_eq!(fomc.indicators(), &["FOMC"]);
    }

    #[test]
    fn test_cpi_and_pce_windows_skip_weekends() {
        // 2024-06-15 is a Saturday
        assert!(ReleaseEvent::Cpi.fires_on(date(2024, 6, 12)));
        assert!(!ReleaseEvent::Cpi.fires_on(date(2024, 6, 15)));
        assert!(!ReleaseEvent::Cpi.fires_on(date(2024, 6, 17)));
        assert!(ReleaseEvent::Pce.fires_on(date(2024, 6, 28)));
        assert!(!ReleaseEvent::Pce.fires_on(date(2024, 6, 24)));
    }

    #[test]
    fn test_releases_on_nfp_day() {
        let schedule = ReleaseSchedule::default();
        let releases = schedule.releases_on(date(2024, 6, 7));

        let codes: Vec<&str> = releases.iter().map(|r| r.event.code()).collect();
        assert_eq!(codes, vec!["NFP", "FOMC"]);
        let nfp = &releases[0];
        assert_eq!(nfp.event, ReleaseEvent::Nfp);
        assert_eq!((nfp.at.hour(), nfp.at.minute()), (8, 30));
        // EDT is UTC-4
        assert_eq!(nfp.at_utc(), Utc.with_ymd_and_hms(2024, 6, 7, 12, 30, 0).unwrap());
    }

    #[test]
    fn test_winter_offset() {
        let schedule = ReleaseSchedule::new(vec![ReleaseEvent::Claims]);
        // 2024-01-04 is a Thursday, EST is UTC-5
        let releases = schedule.releases_on(date(2024, 1, 4));
        assert_eq!(releases[0].at_utc(), Utc.with_ymd_and_hms(2024, 1, 4, 13, 30, 0).unwrap());
    }

    #[test]
    fn test_next_after() {
        let schedule = ReleaseSchedule::default();
        // Wednesday 2024-06-05 12:00 UTC = 08:00 EDT, ADP at 08:15
        let now = Utc.with_ymd_and_hms(2024, 6, 5, 12, 0, 0).unwrap();
        let next = schedule.next_after(now).unwrap();
        assert_eq!(next.event, ReleaseEvent::Adp);

        // Right after ADP: ISM services fires at 10:00 (third business day)
        let next = schedule.next_after(next.at_utc()).unwrap();
        assert_eq!(next.event, ReleaseEvent::IsmServices);
        assert_eq!(next.at.hour(), 10);

        // Daily FOMC check at 14:00
        let next = schedule.next_after(next.at_utc()).unwrap();
        assert_eq!(next.event, ReleaseEvent::Fomc);

        // Then Thursday claims
        let next = schedule.next_after(next.at_utc()).unwrap();
        assert_eq!(next.event, ReleaseEvent::Claims);
        assert_eq!(next.at.date_naive(), date(2024, 6, 6));
    }

    #[test]
    fn test_upcoming_window() {
        let schedule = ReleaseSchedule::default();
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap();
        let upcoming = schedule.upcoming(now, 7);

        let codes: Vec<&str> = upcoming.iter().map(|r| r.event.code()).collect();
        assert_eq!(
            codes,
            vec![
                "ISM_MFG", "FOMC", "FOMC", "ADP", "ISM_SERVICES", "FOMC", "CLAIMS", "FOMC", "NFP", "FOMC"
            ]
        );
        assert!(upcoming.windows(2).all(|w| w[0].at <= w[1].at));
    }

    #[test]
    fn test_upcoming_huge_window_is_capped() {
        let schedule = ReleaseSchedule::new(vec![ReleaseEvent::Claims]);
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap();
        let upcoming = schedule.upcoming(now, i64::MAX);
        assert!(upcoming.len() >= 52 && upcoming.len() <= 53);
    }

    #[test]
    fn test_releases_sharing_a_slot_are_all_due() {
        let schedule = ReleaseSchedule::default();
        // Thursday 2024-06-13: claims and CPI both at 08:30 EDT
        let slot = Utc.with_ymd_and_hms(2024, 6, 13, 12, 30, 0).unwrap();
        let before = slot - Duration::seconds(1);

        let due = schedule.due_between(before, slot);
        let codes: Vec<&str> = due.iter().map(|r| r.event.code()).collect();
        assert_eq!(codes, vec!["CLAIMS", "CPI"]);
        assert!(due.iter().all(|r| r.at_utc() == slot));

        // Nothing fires twice once the slot has been handled
        assert!(schedule.due_between(slot, slot + Duration::minutes(5)).is_empty());
    }

    #[test]
    fn test_releases_due_while_busy_are_not_lost() {
        let schedule = ReleaseSchedule::default();
        // Wednesday 2024-06-12: ADP 08:15, CPI 08:30; ADP still retrying at 08:33
        let adp = Utc.with_ymd_and_hms(2024, 6, 12, 12, 15, 0).unwrap();
        let woke = adp + Duration::seconds(1);
        let after_retries = adp + Duration::minutes(18);

        let first: Vec<&str> = schedule
            .due_between(adp - Duration::seconds(1), woke)
            .iter()
            .map(|r| r.event.code())
            .collect();
        assert_eq!(first, vec!["ADP"]);

        let next = schedule.next_after(woke).unwrap();
        assert_eq!(next.event, ReleaseEvent::Cpi);
        let missed: Vec<&str> = schedule
            .due_between(woke, after_retries)
            .iter()
            .map(|r| r.event.code())
            .collect();
        assert_eq!(missed, vec!["CPI"]);
    }

    #[test]
    fn test_due_between_empty_range() {
        let schedule = ReleaseSchedule::default();
        let t = Utc.with_ymd_and_hms(2024, 6, 13, 12, 30, 0).unwrap();
        assert!(schedule.due_between(t, t).is_empty());
        assert!(schedule.due_between(t, t - Duration::hours(1)).is_empty());
    }

    #[test]
    fn test_upcoming_zero_days_is_empty() {
        let schedule = ReleaseSchedule::default();
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap();
        assert!(schedule.upcoming(now, 0).is_empty());
    }

    #[test]
    fn test_event_codes_round_trip() {
        for event in ReleaseEvent::ALL {
            assert_eq!(ReleaseEvent::parse(event.code()), Some(event));
            assert!(!event.indicators().is_empty());
        }
        assert_eq!(ReleaseEvent::parse("nfp"), Some(ReleaseEvent::Nfp));
        assert_eq!(ReleaseEvent::parse("fomc"), Some(ReleaseEvent::Fomc));
        assert_eq!(ReleaseEvent::parse("GDP"), None);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let schedule = ReleaseSchedule::default();
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            schedule.run(rx, |_release| async {}).await;
        });
        tx.send(true).unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
