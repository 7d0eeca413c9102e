//! Administrator-scheduled special tasks.
//!
//! A special task is anchored at a chosen rank of the day and carries an
//! album combination whose total price lands inside a hold band relative to
//! the worker's current balance. When the engine presents it, the amount is
//! locked via the wallet's on-hold reservation.

use chrono::{DateTime, Utc};
use itertools::Itertools;
use rand::seq::SliceRandom;
use rust_decimal::Decimal;

use crate::engine::{sample_band_slice, unique_rating_code};
use crate::notify;
use crate::prelude::*;

pub const MAX_PRODUCTS: usize = 3;

/// Admin input for creating or re-targeting a special task.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SpecialTaskSpec {
    pub user: UserId,
    pub hold_band: HoldBandId,
    pub number_of_negative_product: usize,
    pub rank_appearance: u32,
}

pub struct Injector {
    store: Store,
}

impl Injector {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Create a new special task. Several may share the same rank; the
    /// engine drains them one play at a time. A worker with a reservation
    /// already in flight cannot take another one.
    pub fn create(
        &self,
        actor: UserId,
        spec: &SpecialTaskSpec,
        now: DateTime<Utc>,
    ) -> Result<Task, Error> {
        let writer = self.store.start_writer()?;

        let task = self.build(&writer, spec, None, now)?;
        writer.put_task(&task)?;

        let username = writer
            .user(spec.user)?
            .map(|u| u.username)
            .unwrap_or_default();
        notify::admin_log(
            &writer,
            Some(actor),
            &format!("Added special submission for worker {username}"),
            now,
        );

        writer.commit()?;

        Ok(task)
    }

    /// Re-run the sizing and album selection for an existing unplayed task.
    pub fn update(
        &self,
        actor: UserId,
        task_id: TaskId,
        spec: &SpecialTaskSpec,
        now: DateTime<Utc>,
    ) -> Result<Task, Error> {
        let writer = self.store.start_writer()?;

        let existing = writer.task(task_id)?.ok_or(Error::NotFound("task"))?;

        if existing.played {
            return Err(Error::conflict("task has already been played"));
        }

        let task = self.build(&writer, spec, Some(existing.clone()), now)?;

        // re-targeting to another worker must drop the old index entry
        if task.user != existing.user {
            writer.delete_task(&existing)?;
        }

        writer.put_task(&task)?;

        let username = writer
            .user(spec.user)?
            .map(|u| u.username)
            .unwrap_or_default();
        notify::admin_log(
            &writer,
            Some(actor),
            &format!("Updated special submission for worker {username}"),
            now,
        );

        writer.commit()?;

        Ok(task)
    }

    pub fn delete(&self, actor: UserId, task_id: TaskId, now: DateTime<Utc>) -> Result<(), Error> {
        let writer = self.store.start_writer()?;

        let task = writer.task(task_id)?.ok_or(Error::NotFound("task"))?;

        if !task.special_product {
            return Err(Error::conflict("not a special task"));
        }

        if task.played {
            return Err(Error::conflict("task has already been played"));
        }

        writer.delete_task(&task)?;

        let username = writer.user(task.user)?.map(|u| u.username).unwrap_or_default();
        notify::admin_log(
            &writer,
            Some(actor),
            &format!("Deleted special submission for worker {username}"),
            now,
        );

        writer.commit()?;

        Ok(())
    }

    /// Unplayed special tasks across all workers, newest first.
    pub fn list(&self) -> Result<Vec<Task>, Error> {
        let reader = self.store.reader()?;

        let mut tasks: Vec<Task> = reader
            .tasks_all()?
            .into_iter()
            .filter(|t| t.special_product && t.is_active && !t.played)
            .collect();

        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(tasks)
    }

    fn build(
        &self,
        writer: &StoreWriter,
        spec: &SpecialTaskSpec,
        existing: Option<Task>,
        now: DateTime<Utc>,
    ) -> Result<Task, Error> {
        if spec.number_of_negative_product > MAX_PRODUCTS {
            return Err(Error::validation(
                "number_of_negative_product",
                format!("must be between 0 and {MAX_PRODUCTS}"),
            ));
        }

        if spec.rank_appearance == 0 {
            return Err(Error::validation(
                "rank_appearance",
                "rank must be at least 1",
            ));
        }

        let user = writer.user(spec.user)?.ok_or(Error::NotFound("user"))?;
        let wallet = writer.wallet(spec.user)?.ok_or(Error::NotFound("wallet"))?;

        let band = writer
            .hold_band(spec.hold_band)?
            .filter(|b| b.is_active)
            .ok_or(Error::NotFound("hold band"))?;

        // one reservation in flight at a time: a second special would
        // clobber the outstanding hold
        let has_reserved = writer
            .tasks_for_user(user.id)?
            .iter()
            .any(|t| t.special_product && t.pending && !t.played && t.is_active);
        if has_reserved {
            return Err(Error::conflict(
                "worker already has a reserved special task in flight",
            ));
        }

        let rate = match wallet.pack.map(|id| writer.pack(id)).transpose()?.flatten() {
            Some(pack) => pack.special_rate(),
            // 5x the 0.5 default rate for workers without a pack
            None => Decimal::new(25, 1),
        };

        let min_total = wallet.balance + band.min_amount;
        let max_total = wallet.balance + band.max_amount;

        let products =
            select_combination(writer, min_total, max_total, spec.number_of_negative_product)?
                .ok_or_else(|| {
                    Error::validation(
                        "hold_band",
                        format!(
                            "no albums match the hold range ({} to {}) for the worker balance of {}",
                            band.min_amount, band.max_amount, wallet.balance
                        ),
                    )
                })?;

        let amount = round2(wallet.balance + sample_band_slice(&band));
        let commission = apply_percentage(amount, rate);

        let task = match existing {
            Some(mut task) => {
                task.user = spec.user;
                task.on_hold = Some(band.id);
                task.game_number = spec.rank_appearance;
                task.amount = amount;
                task.commission = commission;
                task.commission_percentage = rate;
                task.special_product = true;
                task.is_active = true;
                task.products = products;
                task.updated_at = now;
                task
            }
            None => {
                let id = writer.next_id("tasks")?;
                Task {
                    id,
                    user: spec.user,
                    products,
                    amount,
                    commission,
                    commission_percentage: rate,
                    rating_no: unique_rating_code(writer, id)?,
                    game_number: spec.rank_appearance,
                    special_product: true,
                    played: false,
                    pending: false,
                    is_active: true,
                    on_hold: Some(band.id),
                    rating_score: None,
                    comment: None,
                    created_at: now,
                    updated_at: now,
                }
            }
        };

        Ok(task)
    }
}

/// First combination of exactly `count` albums, drawn from those priced
/// within the ceiling, whose total lands in `[min_total, max_total]`.
/// Candidates are shuffled so repeated injections vary.
fn select_combination(
    writer: &StoreWriter,
    min_total: Decimal,
    max_total: Decimal,
    count: usize,
) -> Result<Option<Vec<ProductId>>, Error> {
    let mut candidates: Vec<Product> = writer
        .products_all()?
        .into_iter()
        .filter(|p| p.price <= max_total)
        .collect();

    candidates.shuffle(&mut rand::thread_rng());

    for combination in candidates.iter().combinations(count) {
        let total: Decimal = combination.iter().map(|p| p.price).sum();

        if total >= min_total && total <= max_total {
            return Ok(Some(combination.into_iter().map(|p| p.id).collect()));
        }
    }

    Ok(None)
}
