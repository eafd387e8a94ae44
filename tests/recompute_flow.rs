use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Weekday};
use ulid::Ulid;

use daybook::engine::{self, Engine};
use daybook::ledger::InMemoryLedger;
use daybook::model::*;
use daybook::notify::NotifyHub;
use daybook::observability;

// ── Test infrastructure ──────────────────────────────────────

fn test_data_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("daybook_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn slot(from_h: u32, to_h: u32) -> TimeSlot {
    TimeSlot::new(
        NaiveTime::from_hms_opt(from_h, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(to_h, 0, 0).unwrap(),
    )
}

fn setup() -> (Arc<NotifyHub>, Arc<InMemoryLedger>, Arc<Engine>) {
    observability::init_tracing();
    observability::init(None);
    let hub = Arc::new(NotifyHub::new());
    let ledger = Arc::new(InMemoryLedger::new(hub.clone()));
    let engine = Arc::new(Engine::new(ledger.clone(), &test_data_dir()).unwrap());
    (hub, ledger, engine)
}

fn slot_booking(product_id: u64, d: NaiveDate, s: TimeSlot) -> LedgerRecord {
    LedgerRecord {
        order_id: Ulid::new(),
        product_id,
        field_key: "booking".into(),
        booked: BookedDates::Timeslot { date: d, slot: s },
        booking_status: BookingStatus::Active,
        order_status: OrderStatus::Completed,
    }
}

fn single_day_booking(product_id: u64, d: NaiveDate) -> LedgerRecord {
    LedgerRecord {
        order_id: Ulid::new(),
        product_id,
        field_key: "booking".into(),
        booked: BookedDates::SingleDay { date: d },
        booking_status: BookingStatus::Active,
        order_status: OrderStatus::Completed,
    }
}

// ── End-to-end flows over the public API ─────────────────────

#[tokio::test]
async fn timeslot_product_flow() {
    let (_hub, ledger, engine) = setup();

    // Two groups both list Monday; the first one wins for that weekday.
    let config = BookingConfig {
        rules: BookingRules::Timeslots {
            groups: vec![
                SlotGroup {
                    days: vec![Weekday::Mon],
                    slots: vec![slot(9, 11)],
                },
                SlotGroup {
                    days: vec![Weekday::Mon, Weekday::Fri],
                    slots: vec![slot(14, 16)],
                },
            ],
        },
        quantity_per_slot: Some(1),
        excluded_days: vec![date(2100, 1, 11)],
    };

    // 2100-01-04 is a Monday, far enough out that "today" never filters it.
    let monday = date(2100, 1, 4);
    ledger.place(slot_booking(7, monday, slot(9, 11)));
    // second group's slot is shadowed for Monday and must not count
    ledger.place(slot_booking(7, monday, slot(14, 16)));

    engine.recompute(7, "booking", &config).await.unwrap();

    // group 1's only Monday slot is booked, so the day collapses; the
    // manually excluded day joins the output
    assert_eq!(
        engine.get_fully_booked_dates(7, "booking").await,
        vec!["2100-01-04", "2100-01-11"]
    );
    let counts = engine.get_booked_slot_counts(7, "booking").await;
    assert_eq!(counts.get("2100-01-04 09:00-11:00"), Some(&1));
    assert!(!counts.contains_key("2100-01-04 14:00-16:00"));

    let excluded = engine.get_excluded_days(7, "booking", &config).await.unwrap();
    assert_eq!(excluded, vec![monday, date(2100, 1, 11)]);

    // Mon + Fri configured → segments (0,0) and (4,4)
    assert_eq!(
        engine::weekday_linestring(&config).as_deref(),
        Some("MULTILINESTRING((0 0,0 0),(4 0,4 0))")
    );

    let monday_off = day_offset(monday);
    let excluded_off = day_offset(date(2100, 1, 11));
    assert_eq!(
        engine.encode_excluded_day_ranges(7, "booking").await.as_deref(),
        Some(
            format!(
                "MULTILINESTRING(({monday_off} 0,{monday_off} 0),({excluded_off} 0,{excluded_off} 0))"
            )
            .as_str()
        )
    );
}

#[tokio::test]
async fn booking_events_keep_cache_fresh() {
    let (hub, ledger, engine) = setup();
    let config = BookingConfig {
        rules: BookingRules::Days {
            selection: DaySelection::SingleDay,
            excluded_weekdays: vec![],
        },
        quantity_per_slot: Some(1),
        excluded_days: vec![],
    };

    // initial recompute registers the config, then the listener takes over
    engine.recompute(7, "booking", &config).await.unwrap();
    assert!(engine.get_fully_booked_dates(7, "booking").await.is_empty());
    let handle = engine::spawn_recompute_listener(engine.clone(), &hub, 7);

    let record = single_day_booking(7, date(2100, 6, 1));
    let order_id = record.order_id;
    ledger.place(record);

    wait_until(|| {
        let engine = engine.clone();
        async move {
            engine.get_fully_booked_dates(7, "booking").await == vec!["2100-06-01".to_string()]
        }
    })
    .await;

    ledger.cancel(&order_id);
    wait_until(|| {
        let engine = engine.clone();
        async move { engine.get_fully_booked_dates(7, "booking").await.is_empty() }
    })
    .await;

    handle.abort();
}

async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

#[tokio::test]
async fn snapshot_served_after_restart() {
    observability::init_tracing();
    let dir = test_data_dir();
    let hub = Arc::new(NotifyHub::new());
    let ledger = Arc::new(InMemoryLedger::new(hub.clone()));
    let config = BookingConfig {
        rules: BookingRules::Days {
            selection: DaySelection::SingleDay,
            excluded_weekdays: vec![],
        },
        quantity_per_slot: Some(1),
        excluded_days: vec![],
    };

    {
        let engine = Engine::new(ledger.clone(), &dir).unwrap();
        ledger.place(single_day_booking(7, date(2100, 6, 1)));
        engine.recompute(7, "booking", &config).await.unwrap();
    }

    let engine = Engine::new(ledger, &dir).unwrap();
    assert_eq!(
        engine.get_fully_booked_dates(7, "booking").await,
        vec!["2100-06-01"]
    );
}
