//! Post-completion reviews and the tasker rating cache.

use crate::error::{MarketError, Result};
use crate::notify::NotificationEmitter;
use std::sync::Arc;
use tracing::info;
use taskbay_storage::StorageEngine;
use taskbay_types::{
    Actor, Notification, NotificationKind, RatingStats, Review, TaskId, TaskStatus, UserId,
};

pub struct ReviewManager {
    storage: Arc<StorageEngine>,
    emitter: Arc<NotificationEmitter>,
}

impl ReviewManager {
    pub fn new(storage: Arc<StorageEngine>, emitter: Arc<NotificationEmitter>) -> Self {
        Self { storage, emitter }
    }

    /// Submit a review for a completed task. Guards, in order: rating
    /// range, task existence, completed status, reviewer is the task's
    /// customer, target tasker actually performed the task, no prior
    /// review by this reviewer for this task.
    pub async fn submit_review(
        &self,
        actor: &Actor,
        tasker: UserId,
        task_id: &TaskId,
        rating: u8,
        comment: Option<String>,
    ) -> Result<Review> {
        if !(1..=5).contains(&rating) {
            return Err(MarketError::Validation(format!(
                "rating must be between 1 and 5, got {}",
                rating
            )));
        }

        let task = self.storage.require_task(task_id).await?;
        if task.status != TaskStatus::Completed {
            return Err(MarketError::invalid_state("submitReview", task.status));
        }
        if !task.is_owned_by(&actor.id) {
            return Err(MarketError::Forbidden(
                "only the task's customer may review it".into(),
            ));
        }
        if task.assigned_to != Some(tasker) {
            return Err(MarketError::Validation(
                "tasker did not perform this task".into(),
            ));
        }
        if self
            .storage
            .review_for_task_by(task_id, &actor.id)
            .await?
            .is_some()
        {
            return Err(MarketError::Conflict(
                "you already reviewed this task".into(),
            ));
        }

        let review = Review::new(actor.id, tasker, *task_id, rating, comment, task.title.clone());
        self.storage.put_review(&review).await?;

        let stats = self.recompute_rating(&tasker).await?;
        info!(
            review = %review.id,
            task = %task_id,
            tasker = %tasker,
            rating,
            average = stats.average_rating,
            total = stats.total_reviews,
            "⭐ Review submitted"
        );

        self.emitter
            .emit(Notification::new(
                tasker,
                Some(actor.id),
                NotificationKind::ReviewReceived,
                "New review",
                format!("{} rated you {}/5 for \"{}\"", actor.name, rating, task.title),
                Some(*task_id),
                None,
                serde_json::json!({ "rating": rating }),
            ))
            .await;

        Ok(review)
    }

    /// Recompute the tasker's aggregate rating from the full review set
    /// and cache average/count on the profile. Idempotent.
    pub async fn recompute_rating(&self, tasker: &UserId) -> Result<RatingStats> {
        let reviews = self.storage.reviews_for_tasker(tasker).await?;
        let stats = RatingStats::recompute(&reviews);

        let mut profile = self.storage.profile_or_default(tasker).await?;
        profile.apply_rating(&stats);
        self.storage.put_profile(&profile).await?;

        Ok(stats)
    }

    /// Current rating stats for a tasker, recomputed from the review set.
    pub async fn rating_for(&self, tasker: &UserId) -> Result<RatingStats> {
        let reviews = self.storage.reviews_for_tasker(tasker).await?;
        Ok(RatingStats::recompute(&reviews))
    }

    /// The tasker's profile counters (rating cache + completed tasks).
    pub async fn profile_for(&self, tasker: &UserId) -> Result<taskbay_types::TaskerProfile> {
        Ok(self.storage.profile_or_default(tasker).await?)
    }

    /// All reviews written about a tasker, newest first.
    pub async fn reviews_for(&self, tasker: &UserId) -> Result<Vec<Review>> {
        let mut reviews = self.storage.reviews_for_tasker(tasker).await?;
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }
}
