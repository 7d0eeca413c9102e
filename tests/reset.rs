//! Daily reset scheduler behavior.

use chrono::Utc;
use rust_decimal::dec;

use encore::reset::ResetScheduler;
use encore_testing::{sample_band, seed_worker, seeded_store};

use encore::prelude::*;

fn set_counters(store: &Store, user: UserId) {
    let writer = store.start_writer().unwrap();

    let mut u = writer.user(user).unwrap().unwrap();
    u.submissions_today = 3;
    u.sets_today = 1;
    u.today_profit = dec!(1.20);
    writer.put_user(&u).unwrap();

    let mut w = writer.wallet(user).unwrap().unwrap();
    w.salary = dec!(15);
    writer.put_wallet(&w).unwrap();

    writer.commit().unwrap();
}

fn give_reserved_special(store: &Store, user: UserId) {
    let now = Utc::now();
    let writer = store.start_writer().unwrap();

    writer
        .put_hold_band(&sample_band(1, dec!(50), dec!(50)))
        .unwrap();

    let id = writer.next_id("tasks").unwrap();
    writer
        .put_task(&Task {
            id,
            user,
            products: vec![],
            amount: dec!(150),
            commission: dec!(3.75),
            commission_percentage: dec!(2.5),
            rating_no: format!("{id:08}"),
            game_number: 4,
            special_product: true,
            played: false,
            pending: true,
            is_active: true,
            on_hold: Some(1),
            rating_score: None,
            comment: None,
            created_at: now,
            updated_at: now,
        })
        .unwrap();

    writer.commit().unwrap();
}

#[test]
fn reset_runs_once_per_local_day() {
    let store = seeded_store();
    let worker = seed_worker(&store, "worker", dec!(100));
    set_counters(&store, worker);

    let scheduler = ResetScheduler::new(store.clone());
    let now = Utc::now();

    assert!(scheduler.maybe_reset(now).unwrap());
    assert!(!scheduler.maybe_reset(now).unwrap());

    let reader = store.reader().unwrap();
    let user = reader.user(worker).unwrap().unwrap();
    assert_eq!(user.submissions_today, 0);
    assert_eq!(user.sets_today, 0);
    assert_eq!(user.today_profit, dec!(0));

    let wallet = reader.wallet(worker).unwrap().unwrap();
    assert_eq!(wallet.salary, dec!(0));

    let tracker = reader.reset_tracker().unwrap();
    assert!(tracker.last_reset_time <= now);
}

#[test]
fn reset_preserves_rank_for_workers_with_reserved_specials() {
    let store = seeded_store();
    let worker = seed_worker(&store, "worker", dec!(100));
    let bystander = seed_worker(&store, "bystander", dec!(100));

    set_counters(&store, worker);
    set_counters(&store, bystander);
    give_reserved_special(&store, worker);

    let scheduler = ResetScheduler::new(store.clone());
    assert!(scheduler.maybe_reset(Utc::now()).unwrap());

    let reader = store.reader().unwrap();

    // the worker resumes at the same rank tomorrow
    let user = reader.user(worker).unwrap().unwrap();
    assert_eq!(user.submissions_today, 3);
    assert_eq!(user.sets_today, 0);
    assert_eq!(user.today_profit, dec!(1.20));
    assert_eq!(reader.wallet(worker).unwrap().unwrap().salary, dec!(0));

    // everyone else starts from scratch
    let user = reader.user(bystander).unwrap().unwrap();
    assert_eq!(user.submissions_today, 0);
    assert_eq!(user.sets_today, 0);
    assert_eq!(user.today_profit, dec!(0));
}
