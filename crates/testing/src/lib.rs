//! Fixtures shared by unit and integration tests across the encore crates.

use chrono::{DateTime, Utc};
use rust_decimal::{dec, Decimal};

use encore_core::{
    best_pack_for_balance, HoldBand, HoldBandId, Pack, PackId, Product, ProductId, Settings, User,
    UserId, Wallet,
};
use encore_store::Store;

/// Five missions per set, two sets, 0.5% regular and 2.5% special commission.
pub fn sample_pack(id: PackId, usd_value: Decimal) -> Pack {
    Pack {
        id,
        name: format!("tier-{id}"),
        usd_value,
        daily_missions: 5,
        number_of_set: 2,
        profit_percentage: dec!(0.5),
        special_product_percentage: dec!(2.5),
        minimum_balance_for_submissions: Some(dec!(50)),
        payment_limit_to_trigger_bonus: Decimal::ZERO,
        payment_bonus: Decimal::ZERO,
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn sample_product(id: ProductId, price: Decimal) -> Product {
    Product {
        id,
        name: format!("album-{id}"),
        price,
        image_ref: format!("albums/{id}.jpg"),
        rating_no: format!("{id:08}"),
        date_created: Utc::now(),
    }
}

pub fn sample_band(id: HoldBandId, min: Decimal, max: Decimal) -> HoldBand {
    HoldBand {
        id,
        min_amount: min,
        max_amount: max,
        is_active: true,
        created_at: Utc::now(),
    }
}

pub fn sample_user(id: UserId, username: &str, now: DateTime<Utc>) -> User {
    User::new(
        id,
        username.into(),
        format!("{username}@example.com"),
        format!("+1555{id:07}"),
        "unusable-hash".into(),
        "unusable-hash".into(),
        format!("REF{id:05}"),
        now,
    )
}

/// A store with default settings and a single pack seeded.
pub fn seeded_store() -> Store {
    let store = Store::in_memory().expect("in-memory store");

    let writer = store.start_writer().expect("writer");
    writer.put_settings(&Settings::default()).expect("settings");
    writer
        .put_pack(&sample_pack(1, dec!(100)))
        .expect("seed pack");
    writer.commit().expect("commit");

    store
}

/// Insert products with the given prices; returns their ids.
pub fn seed_products(store: &Store, prices: &[Decimal]) -> Vec<ProductId> {
    let writer = store.start_writer().expect("writer");
    let mut ids = Vec::with_capacity(prices.len());

    for price in prices {
        let id = writer.next_id("products").expect("product id");
        writer
            .put_product(&sample_product(id, *price))
            .expect("seed product");
        ids.push(id);
    }

    writer.commit().expect("commit");
    ids
}

/// Create a worker with a funded wallet attached to the best-fitting pack.
pub fn seed_worker(store: &Store, username: &str, balance: Decimal) -> UserId {
    let now = Utc::now();
    let writer = store.start_writer().expect("writer");

    let id = writer.next_id("users").expect("user id");
    writer
        .create_user(&sample_user(id, username, now))
        .expect("seed user");

    let packs = writer.packs_all().expect("packs");
    let mut wallet = Wallet::new(id, now);
    wallet.balance = balance;
    wallet.pack = best_pack_for_balance(&packs, balance);
    writer.put_wallet(&wallet).expect("seed wallet");

    writer.commit().expect("commit");
    id
}

pub fn seed_band(store: &Store, min: Decimal, max: Decimal) -> HoldBandId {
    let writer = store.start_writer().expect("writer");
    let id = writer.next_id("hold_bands").expect("band id");
    writer
        .put_hold_band(&sample_band(id, min, max))
        .expect("seed band");
    writer.commit().expect("commit");
    id
}
