//! End-to-end flows over the engine, injector and admin operations against
//! an in-memory store.

use chrono::Utc;
use rust_decimal::{dec, Decimal};

use encore::admin::AdminOps;
use encore::engine::Engine;
use encore::injector::{Injector, SpecialTaskSpec};
use encore::prelude::*;
use encore_testing::{sample_pack, seed_band, seed_products, seed_worker, seeded_store};

fn play_request(rating: u8) -> PlayRequest {
    PlayRequest {
        rating_score: rating,
        comment: String::new(),
    }
}

fn seed_admin(store: &Store, txn_password: &str) -> UserId {
    let now = Utc::now();
    let writer = store.start_writer().unwrap();

    let id = writer.next_id("users").unwrap();
    let mut admin = User::new(
        id,
        format!("admin{id}"),
        format!("admin{id}@example.com"),
        String::new(),
        hash_secret("login-secret").unwrap(),
        hash_secret(txn_password).unwrap(),
        format!("ADM{id:05}"),
        now,
    );
    admin.is_staff = true;

    writer.create_user(&admin).unwrap();
    writer.put_wallet(&Wallet::new(id, now)).unwrap();
    writer.commit().unwrap();

    id
}

fn wallet_of(store: &Store, user: UserId) -> Wallet {
    store.reader().unwrap().wallet(user).unwrap().unwrap()
}

fn user_of(store: &Store, user: UserId) -> User {
    store.reader().unwrap().user(user).unwrap().unwrap()
}

fn waive_min_balance(store: &Store, user: UserId) {
    let writer = store.start_writer().unwrap();
    let mut u = writer.user(user).unwrap().unwrap();
    u.is_min_balance_waived = true;
    writer.put_user(&u).unwrap();
    writer.commit().unwrap();
}

fn credit_wallet(store: &Store, user: UserId, amount: Decimal) {
    let writer = store.start_writer().unwrap();
    let mut wallet = writer.wallet(user).unwrap().unwrap();
    wallet.credit(amount).unwrap();
    writer.put_wallet(&wallet).unwrap();
    writer.commit().unwrap();
}

#[test]
fn regular_plays_credit_the_commission_ledger_only() {
    let store = seeded_store();
    seed_products(&store, &[dec!(80), dec!(80), dec!(80)]);
    let worker = seed_worker(&store, "worker", dec!(100));

    let engine = Engine::new(store.clone());

    for round in 1..=3u32 {
        let outcome = engine.play(worker, &play_request(4), Utc::now()).unwrap();
        assert!(outcome.played, "round {round}");
        assert_eq!(outcome.task.commission, dec!(0.40));
    }

    let user = user_of(&store, worker);
    let wallet = wallet_of(&store, worker);

    assert_eq!(user.submissions_today, 3);
    assert_eq!(user.today_profit, dec!(1.20));
    assert_eq!(wallet.commission, dec!(1.20));
    assert_eq!(wallet.balance, dec!(100));
    assert_eq!(wallet.on_hold, dec!(0));
}

#[test]
fn fresh_assignment_prefers_the_top_balance_band() {
    let store = seeded_store();
    seed_products(&store, &[dec!(85), dec!(45), dec!(8)]);
    let worker = seed_worker(&store, "worker", dec!(100));

    let engine = Engine::new(store.clone());
    let view = engine.current_task(worker, Utc::now()).unwrap();

    assert_eq!(view.products.len(), 1);
    assert_eq!(view.products[0].price, dec!(85));
    assert_eq!(view.amount, dec!(85));
    assert_eq!(view.commission, dec!(0.42));
    assert_eq!(view.game_number, 1);
    assert!(view.pending);
    assert!(!view.special_product);
}

#[test]
fn presented_task_is_stable_across_requests() {
    let store = seeded_store();
    seed_products(&store, &[dec!(85), dec!(84), dec!(83)]);
    let worker = seed_worker(&store, "worker", dec!(100));

    let engine = Engine::new(store.clone());
    let first = engine.current_task(worker, Utc::now()).unwrap();
    let second = engine.current_task(worker, Utc::now()).unwrap();

    assert_eq!(first.id, second.id);
}

#[test]
fn set_completion_walks_through_both_sets() {
    let store = seeded_store();
    seed_products(
        &store,
        &[dec!(80), dec!(81), dec!(82), dec!(83), dec!(84)],
    );
    let worker = seed_worker(&store, "worker", dec!(100));
    let admin = seed_admin(&store, "1234");

    let engine = Engine::new(store.clone());
    let admin_ops = AdminOps::new(store.clone());

    for _ in 0..5 {
        engine.play(worker, &play_request(5), Utc::now()).unwrap();
    }

    let user = user_of(&store, worker);
    assert_eq!(user.submissions_today, 5);
    assert_eq!(user.sets_today, 1);

    // the worker was told the first set is done, the admin was notified
    let reader = store.reader().unwrap();
    let inbox = reader.notifications_for(worker).unwrap();
    assert!(inbox.iter().any(|n| n.body.contains("1st set")));
    let admin_inbox = reader.admin_notifications().unwrap();
    assert!(admin_inbox.iter().any(|n| n.body.contains("1st set")));
    drop(reader);

    let err = engine.play(worker, &play_request(5), Utc::now()).unwrap_err();
    assert!(matches!(err, Error::Eligibility(ref reason) if reason.contains("1st set")));

    // next set is unlocked by an admin reset of the counters
    admin_ops
        .reset_account(admin, "1234", worker, None, None, Utc::now())
        .unwrap();
    assert_eq!(user_of(&store, worker).submissions_today, 0);

    for _ in 0..5 {
        engine.play(worker, &play_request(5), Utc::now()).unwrap();
    }

    let user = user_of(&store, worker);
    assert_eq!(user.sets_today, 2);

    let reader = store.reader().unwrap();
    let inbox = reader.notifications_for(worker).unwrap();
    assert!(inbox.iter().any(|n| n.body.contains("all 2 album review sets")));
    drop(reader);

    let err = engine.play(worker, &play_request(5), Utc::now()).unwrap_err();
    assert!(matches!(err, Error::Eligibility(ref reason) if reason.contains("all 2")));
}

#[test]
fn special_task_reservation_and_recovery() {
    let store = seeded_store();
    seed_products(&store, &[dec!(150), dec!(80)]);
    let band = seed_band(&store, dec!(50), dec!(50));
    let worker = seed_worker(&store, "worker", dec!(100));
    let admin = seed_admin(&store, "1234");

    let injector = Injector::new(store.clone());
    let engine = Engine::new(store.clone());
    let admin_ops = AdminOps::new(store.clone());

    injector
        .create(
            admin,
            &SpecialTaskSpec {
                user: worker,
                hold_band: band,
                number_of_negative_product: 1,
                rank_appearance: 1,
            },
            Utc::now(),
        )
        .unwrap();

    // presenting the special locks balance + band slice
    let view = engine.current_task(worker, Utc::now()).unwrap();
    assert!(view.special_product);
    assert!(view.pending);
    assert_eq!(view.amount, dec!(150));

    let wallet = wallet_of(&store, worker);
    assert_eq!(wallet.balance, dec!(-50));
    assert_eq!(wallet.on_hold, dec!(150));
    assert!(wallet.is_consistent());

    // insolvent workers cannot play until they add funds
    let err = engine.play(worker, &play_request(4), Utc::now()).unwrap_err();
    assert!(matches!(err, Error::Eligibility(ref reason) if reason.contains("negative balance")));

    // a sufficient deposit clears the deficit and merges the hold back
    admin_ops
        .set_balance(admin, "1234", worker, dec!(60), "recovery", Utc::now())
        .unwrap();

    let wallet = wallet_of(&store, worker);
    assert_eq!(wallet.balance, dec!(160));
    assert_eq!(wallet.on_hold, dec!(0));

    let outcome = engine.play(worker, &play_request(4), Utc::now()).unwrap();
    assert!(outcome.played);
    assert!(outcome.task.special_product);

    let wallet = wallet_of(&store, worker);
    // 2.5% of 150
    assert_eq!(wallet.commission, dec!(3.75));
    assert_eq!(wallet.balance, dec!(160));

    let user = user_of(&store, worker);
    assert_eq!(user.submissions_today, 1);
    assert_eq!(user.today_profit, dec!(3.75));
}

#[test]
fn special_commission_matches_the_presented_amount() {
    let store = seeded_store();
    seed_products(&store, &[dec!(150), dec!(80)]);
    // a real spread: the slice drawn at presentation differs from the one
    // drawn at injection
    let band = seed_band(&store, dec!(40), dec!(60));
    let worker = seed_worker(&store, "worker", dec!(100));
    let admin = seed_admin(&store, "1234");

    let injector = Injector::new(store.clone());
    let engine = Engine::new(store.clone());

    injector
        .create(
            admin,
            &SpecialTaskSpec {
                user: worker,
                hold_band: band,
                number_of_negative_product: 1,
                rank_appearance: 1,
            },
            Utc::now(),
        )
        .unwrap();

    let view = engine.current_task(worker, Utc::now()).unwrap();
    assert!(view.amount >= dec!(140) && view.amount <= dec!(160), "amount {}", view.amount);

    // the full presented amount is reserved
    let wallet = wallet_of(&store, worker);
    assert_eq!(wallet.balance, dec!(100) - view.amount);
    assert_eq!(wallet.on_hold, view.amount);

    // the payload commission tracks the presented amount at the stored rate
    let expected = apply_percentage(view.amount, view.commission_percentage);
    assert_eq!(view.commission, expected);

    credit_wallet(&store, worker, dec!(60));
    let outcome = engine.play(worker, &play_request(4), Utc::now()).unwrap();
    assert!(outcome.played);

    // 2.5% of what the worker actually reviewed, not of the
    // injection-time estimate
    let wallet = wallet_of(&store, worker);
    assert_eq!(wallet.commission, apply_percentage(view.amount, dec!(2.5)));
    assert_eq!(user_of(&store, worker).today_profit, wallet.commission);
}

#[test]
fn two_specials_at_the_same_rank_drain_one_per_play() {
    let store = seeded_store();
    seed_products(&store, &[dec!(110), dec!(80)]);
    let band = seed_band(&store, dec!(10), dec!(10));
    let worker = seed_worker(&store, "worker", dec!(100));
    let admin = seed_admin(&store, "1234");
    waive_min_balance(&store, worker);

    let injector = Injector::new(store.clone());
    let engine = Engine::new(store.clone());

    let spec = SpecialTaskSpec {
        user: worker,
        hold_band: band,
        number_of_negative_product: 1,
        rank_appearance: 1,
    };
    injector.create(admin, &spec, Utc::now()).unwrap();
    injector.create(admin, &spec, Utc::now()).unwrap();

    // first special: reserve, recover, play; rank must not advance
    engine.current_task(worker, Utc::now()).unwrap();
    credit_wallet(&store, worker, dec!(10));
    let outcome = engine.play(worker, &play_request(3), Utc::now()).unwrap();
    assert!(outcome.played);
    assert_eq!(user_of(&store, worker).submissions_today, 0);

    // second special at the same rank: now the rank advances
    engine.current_task(worker, Utc::now()).unwrap();
    credit_wallet(&store, worker, dec!(10));
    let outcome = engine.play(worker, &play_request(3), Utc::now()).unwrap();
    assert!(outcome.played);
    assert_eq!(user_of(&store, worker).submissions_today, 1);
}

#[test]
fn injector_rejects_when_no_combination_matches() {
    let store = seeded_store();
    seed_products(&store, &[dec!(10)]);
    let band = seed_band(&store, dec!(50), dec!(60));
    let worker = seed_worker(&store, "worker", dec!(100));
    let admin = seed_admin(&store, "1234");

    let injector = Injector::new(store.clone());

    let err = injector
        .create(
            admin,
            &SpecialTaskSpec {
                user: worker,
                hold_band: band,
                number_of_negative_product: 1,
                rank_appearance: 1,
            },
            Utc::now(),
        )
        .unwrap_err();

    assert!(matches!(err, Error::Validation { field: "hold_band", .. }));
}

#[test]
fn injector_rejects_second_special_while_one_is_reserved() {
    let store = seeded_store();
    seed_products(&store, &[dec!(150), dec!(160)]);
    let band = seed_band(&store, dec!(50), dec!(60));
    let worker = seed_worker(&store, "worker", dec!(100));
    let admin = seed_admin(&store, "1234");

    let injector = Injector::new(store.clone());
    let engine = Engine::new(store.clone());

    let spec = SpecialTaskSpec {
        user: worker,
        hold_band: band,
        number_of_negative_product: 1,
        rank_appearance: 1,
    };
    injector.create(admin, &spec, Utc::now()).unwrap();

    // reservation puts the first special in flight
    engine.current_task(worker, Utc::now()).unwrap();

    let err = injector.create(admin, &spec, Utc::now()).unwrap_err();
    assert!(matches!(err, Error::StateConflict(_)));
}

#[test]
fn pack_deactivation_reassigns_wallets() {
    let store = seeded_store(); // pack 1: usd 100
    let admin = seed_admin(&store, "1234");

    let writer = store.start_writer().unwrap();
    writer.put_pack(&sample_pack(2, dec!(500))).unwrap();
    writer.put_pack(&sample_pack(3, dec!(1000))).unwrap();
    writer.commit().unwrap();

    let worker = seed_worker(&store, "worker", dec!(500));
    assert_eq!(wallet_of(&store, worker).pack, Some(2));

    let admin_ops = AdminOps::new(store.clone());

    let mut spec = encore::admin::PackSpec {
        name: "tier-2".into(),
        usd_value: dec!(500),
        daily_missions: 5,
        number_of_set: 2,
        profit_percentage: dec!(0.5),
        special_product_percentage: dec!(2.5),
        minimum_balance_for_submissions: Some(dec!(50)),
        payment_limit_to_trigger_bonus: dec!(0),
        payment_bonus: dec!(0),
        is_active: false,
    };
    admin_ops.update_pack(admin, 2, &spec, Utc::now()).unwrap();

    // greatest active tier within a 500 balance is tier 1 (100)
    assert_eq!(wallet_of(&store, worker).pack, Some(1));

    // reactivating and deleting takes the same reassignment path
    spec.is_active = true;
    admin_ops.update_pack(admin, 2, &spec, Utc::now()).unwrap();
    admin_ops
        .set_pack(admin, "1234", worker, 2, Utc::now())
        .unwrap();
    admin_ops.delete_pack(admin, 2, Utc::now()).unwrap();
    assert_eq!(wallet_of(&store, worker).pack, Some(1));
}

#[test]
fn referral_bonus_reaches_the_sponsor() {
    let store = seeded_store();
    seed_products(&store, &[dec!(80)]);
    let sponsor = seed_worker(&store, "sponsor", dec!(0));
    let invited = seed_worker(&store, "invited", dec!(100));

    let writer = store.start_writer().unwrap();
    writer
        .put_invitation(&Invitation {
            user: invited,
            referrer: sponsor,
            created_at: Utc::now(),
        })
        .unwrap();
    // one play away from the 10 USD milestone
    let mut s = writer.user(sponsor).unwrap().unwrap();
    s.current_referral_bonus = dec!(9.95);
    writer.put_user(&s).unwrap();
    writer.commit().unwrap();

    let engine = Engine::new(store.clone());
    engine.play(invited, &play_request(5), Utc::now()).unwrap();

    // 20% of the 0.40 commission
    let sponsor_wallet = wallet_of(&store, sponsor);
    assert_eq!(sponsor_wallet.balance, dec!(0.08));

    let sponsor_user = user_of(&store, sponsor);
    assert_eq!(sponsor_user.current_referral_bonus, dec!(0.03));

    let inbox = store.reader().unwrap().notifications_for(sponsor).unwrap();
    assert!(inbox.iter().any(|n| n.title == "Referral Bonus"));
}

#[test]
fn admin_profit_and_salary_adjust_by_delta() {
    let store = seeded_store();
    let worker = seed_worker(&store, "worker", dec!(100));
    let admin = seed_admin(&store, "1234");

    let admin_ops = AdminOps::new(store.clone());

    let wallet = admin_ops
        .set_today_profit(admin, "1234", worker, dec!(25), "correction", Utc::now())
        .unwrap();
    assert_eq!(wallet.commission, dec!(25));
    assert_eq!(user_of(&store, worker).today_profit, dec!(25));

    let wallet = admin_ops
        .set_today_profit(admin, "1234", worker, dec!(10), "correction", Utc::now())
        .unwrap();
    assert_eq!(wallet.commission, dec!(10));

    let wallet = admin_ops
        .set_salary(admin, "1234", worker, dec!(40), "payout", Utc::now())
        .unwrap();
    assert_eq!(wallet.salary, dec!(40));
    assert_eq!(wallet.balance, dec!(140));

    // salary decrease pulls the balance straight down without a hold
    let wallet = admin_ops
        .set_salary(admin, "1234", worker, dec!(15), "payout", Utc::now())
        .unwrap();
    assert_eq!(wallet.salary, dec!(15));
    assert_eq!(wallet.balance, dec!(115));
    assert_eq!(wallet.on_hold, dec!(0));
}

#[test]
fn admin_mutations_require_the_transactional_password() {
    let store = seeded_store();
    let worker = seed_worker(&store, "worker", dec!(100));
    let admin = seed_admin(&store, "1234");

    let admin_ops = AdminOps::new(store.clone());

    let err = admin_ops
        .set_balance(admin, "9999", worker, dec!(10), "oops", Utc::now())
        .unwrap_err();
    assert!(matches!(err, Error::Validation { field: "admin_password", .. }));

    // and the failed attempt must not have moved funds
    assert_eq!(wallet_of(&store, worker).balance, dec!(100));
}

#[test]
fn toggle_reg_bonus_round_trips() {
    let store = seeded_store();
    let worker = seed_worker(&store, "worker", dec!(100));
    let admin = seed_admin(&store, "1234");

    let writer = store.start_writer().unwrap();
    let mut u = writer.user(worker).unwrap().unwrap();
    u.reg_bonus_amount = dec!(10);
    writer.put_user(&u).unwrap();
    writer.commit().unwrap();

    let admin_ops = AdminOps::new(store.clone());

    let user = admin_ops
        .toggle_reg_bonus(admin, "1234", worker, Utc::now())
        .unwrap();
    assert!(user.is_reg_bonus_credited);
    assert_eq!(wallet_of(&store, worker).balance, dec!(110));

    let user = admin_ops
        .toggle_reg_bonus(admin, "1234", worker, Utc::now())
        .unwrap();
    assert!(!user.is_reg_bonus_credited);
    assert_eq!(wallet_of(&store, worker).balance, dec!(100));
}

#[test]
fn exhausted_catalog_falls_back_to_seen_albums() {
    let store = seeded_store();
    seed_products(&store, &[dec!(80), dec!(45)]);
    let worker = seed_worker(&store, "worker", dec!(100));

    let engine = Engine::new(store.clone());

    engine.play(worker, &play_request(4), Utc::now()).unwrap();
    engine.play(worker, &play_request(4), Utc::now()).unwrap();

    // both albums reviewed today: the priciest affordable one comes back
    let view = engine.current_task(worker, Utc::now()).unwrap();
    assert_eq!(view.products[0].price, dec!(80));
}
