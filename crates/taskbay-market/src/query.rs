//! Task browsing: filters, geo search, ordering, pagination, and the
//! requester's-own-bid annotation.

use crate::error::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use taskbay_storage::StorageEngine;
use taskbay_types::{Actor, Amount, Bid, Role, Task, TaskId, TaskStatus};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Circular geofilter: tasks within `radius_km` of the center point.
#[derive(Debug, Clone, Copy)]
pub struct GeoCircle {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
}

/// Filter set for task listings. All present filters must match; the
/// address substring filter and the geofilter compose.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub keyword: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub status: Option<TaskStatus>,
    pub is_urgent: Option<bool>,
    pub min_budget: Option<Amount>,
    pub max_budget: Option<Amount>,
    pub location: Option<String>,
    pub near: Option<GeoCircle>,
    /// 1-based page number; 0 is treated as 1.
    pub page: usize,
}

/// One row in a task listing. `my_bid` is present when the requester is
/// a tasker with an existing bid on the task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskListing {
    #[serde(flatten)]
    pub task: Task,
    pub my_bid: Option<Bid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskPage {
    pub tasks: Vec<TaskListing>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone)]
pub struct QueryConfig {
    pub page_size: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { page_size: 10 }
    }
}

pub struct TaskSearch {
    storage: Arc<StorageEngine>,
    config: QueryConfig,
}

impl TaskSearch {
    pub fn new(storage: Arc<StorageEngine>, config: QueryConfig) -> Self {
        Self { storage, config }
    }

    /// Run a filtered, paginated listing. Urgent tasks sort first, then
    /// newest first.
    pub async fn search(&self, query: &TaskQuery, requester: Option<&Actor>) -> Result<TaskPage> {
        let mut tasks: Vec<Task> = self
            .storage
            .list_tasks()
            .await?
            .into_iter()
            .filter(|t| Self::matches(t, query))
            .collect();

        tasks.sort_by(|a, b| {
            b.is_urgent
                .cmp(&a.is_urgent)
                .then(b.created_at.cmp(&a.created_at))
        });

        let total = tasks.len();
        let page = query.page.max(1);
        let page_size = self.config.page_size;
        let start = (page - 1).saturating_mul(page_size);
        let tasks: Vec<Task> = tasks.into_iter().skip(start).take(page_size).collect();

        let my_bids = self.bids_by_task(requester).await?;
        let tasks = tasks
            .into_iter()
            .map(|task| {
                let my_bid = my_bids.get(&task.id).cloned();
                TaskListing { task, my_bid }
            })
            .collect();

        Ok(TaskPage {
            tasks,
            total,
            page,
            page_size,
        })
    }

    /// The requesting tasker's bids keyed by task, for annotation.
    async fn bids_by_task(&self, requester: Option<&Actor>) -> Result<HashMap<TaskId, Bid>> {
        let Some(actor) = requester else {
            return Ok(HashMap::new());
        };
        if actor.role != Role::Tasker {
            return Ok(HashMap::new());
        }
        Ok(self
            .storage
            .bids_for_tasker(&actor.id)
            .await?
            .into_iter()
            .map(|b| (b.task, b))
            .collect())
    }

    fn matches(task: &Task, query: &TaskQuery) -> bool {
        if let Some(keyword) = &query.keyword {
            if !task
                .title
                .to_lowercase()
                .contains(&keyword.to_lowercase())
            {
                return false;
            }
        }
        if let Some(category) = &query.category {
            if &task.category != category {
                return false;
            }
        }
        if let Some(subcategory) = &query.subcategory {
            if task.subcategory.as_ref() != Some(subcategory) {
                return false;
            }
        }
        if let Some(status) = query.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(is_urgent) = query.is_urgent {
            if task.is_urgent != is_urgent {
                return false;
            }
        }
        if let Some(min) = query.min_budget {
            if task.budget < min {
                return false;
            }
        }
        if let Some(max) = query.max_budget {
            if task.budget > max {
                return false;
            }
        }
        if let Some(location) = &query.location {
            if !task
                .address
                .to_lowercase()
                .contains(&location.to_lowercase())
            {
                return false;
            }
        }
        if let Some(circle) = &query.near {
            let (Some(lat), Some(lon)) = (task.latitude, task.longitude) else {
                return false;
            };
            let distance = haversine_km(circle.latitude, circle.longitude, lat, lon);
            if distance > circle.radius_km {
                return false;
            }
        }
        true
    }
}

/// Great-circle distance between two points, in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use taskbay_storage::{BackendType, StorageConfig};
    use taskbay_types::{FeeBreakdown, UserId};

    fn engine() -> Arc<StorageEngine> {
        Arc::new(
            StorageEngine::new(StorageConfig {
                backend_type: BackendType::Memory,
            })
            .unwrap(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    async fn seed_task(
        storage: &StorageEngine,
        title: &str,
        category: &str,
        budget_major: u64,
        urgent: bool,
        address: &str,
        coords: Option<(f64, f64)>,
        age_minutes: i64,
    ) -> Task {
        let customer = UserId::from_bytes([1u8; 32]);
        let created = Utc::now() - Duration::minutes(age_minutes);
        let task = Task {
            id: TaskId::generate(&customer, title, created.timestamp_millis()),
            customer,
            assigned_to: None,
            title: title.into(),
            description: String::new(),
            category: category.into(),
            subcategory: None,
            address: address.into(),
            latitude: coords.map(|c| c.0),
            longitude: coords.map(|c| c.1),
            required_at: created,
            duration_hours: 1,
            is_urgent: urgent,
            images: vec![],
            budget: Amount::from_major(budget_major),
            fees: FeeBreakdown::default(),
            status: TaskStatus::Open,
            completion_requested_at: None,
            completion_requested_by: None,
            completion_note: None,
            started_at: None,
            completed_at: None,
            customer_feedback: None,
            tasker_feedback: None,
            created_at: created,
            updated_at: created,
        };
        storage.put_task(&task).await.unwrap();
        task
    }

    #[tokio::test]
    async fn filters_compose() {
        let storage = engine();
        seed_task(&storage, "mow the lawn", "garden", 50, false, "Berlin", None, 5).await;
        seed_task(&storage, "mow and edge", "garden", 500, false, "Hamburg", None, 5).await;
        seed_task(&storage, "paint fence", "handyman", 80, false, "Berlin", None, 5).await;

        let search = TaskSearch::new(storage, QueryConfig::default());
        let page = search
            .search(
                &TaskQuery {
                    keyword: Some("MOW".into()),
                    category: Some("garden".into()),
                    max_budget: Some(Amount::from_major(100)),
                    location: Some("berlin".into()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.tasks[0].task.title, "mow the lawn");
    }

    #[tokio::test]
    async fn urgent_first_then_newest() {
        let storage = engine();
        seed_task(&storage, "old calm", "garden", 10, false, "", None, 60).await;
        seed_task(&storage, "new calm", "garden", 10, false, "", None, 1).await;
        seed_task(&storage, "old urgent", "garden", 10, true, "", None, 120).await;

        let search = TaskSearch::new(storage, QueryConfig::default());
        let page = search.search(&TaskQuery::default(), None).await.unwrap();
        let titles: Vec<_> = page.tasks.iter().map(|t| t.task.title.as_str()).collect();
        assert_eq!(titles, ["old urgent", "new calm", "old calm"]);
    }

    #[tokio::test]
    async fn geofilter_excludes_distant_and_unlocated_tasks() {
        let storage = engine();
        // Berlin center vs Potsdam (~27 km) vs Hamburg (~255 km)
        seed_task(&storage, "near", "garden", 10, false, "", Some((52.52, 13.405)), 1).await;
        seed_task(&storage, "close", "garden", 10, false, "", Some((52.39, 13.06)), 1).await;
        seed_task(&storage, "far", "garden", 10, false, "", Some((53.55, 9.99)), 1).await;
        seed_task(&storage, "nowhere", "garden", 10, false, "", None, 1).await;

        let search = TaskSearch::new(storage, QueryConfig::default());
        let page = search
            .search(
                &TaskQuery {
                    near: Some(GeoCircle {
                        latitude: 52.52,
                        longitude: 13.405,
                        radius_km: 50.0,
                    }),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();

        let titles: Vec<_> = page.tasks.iter().map(|t| t.task.title.as_str()).collect();
        assert_eq!(page.total, 2);
        assert!(titles.contains(&"near"));
        assert!(titles.contains(&"close"));
    }

    #[tokio::test]
    async fn pagination_is_fixed_size() {
        let storage = engine();
        for i in 0..25 {
            seed_task(&storage, &format!("task {}", i), "garden", 10, false, "", None, i).await;
        }

        let search = TaskSearch::new(storage, QueryConfig { page_size: 10 });
        let first = search
            .search(&TaskQuery { page: 1, ..Default::default() }, None)
            .await
            .unwrap();
        assert_eq!(first.tasks.len(), 10);
        assert_eq!(first.total, 25);

        let last = search
            .search(&TaskQuery { page: 3, ..Default::default() }, None)
            .await
            .unwrap();
        assert_eq!(last.tasks.len(), 5);
    }

    #[tokio::test]
    async fn tasker_rows_carry_their_own_bid() {
        let storage = engine();
        let task = seed_task(&storage, "mow", "garden", 50, false, "", None, 1).await;
        seed_task(&storage, "paint", "handyman", 50, false, "", None, 2).await;

        let tasker = Actor::new(UserId::from_bytes([2u8; 32]), Role::Tasker, "Pat", "pat@x");
        let bid = Bid::new(task.id, &tasker, Amount::from_major(40), "hi", None);
        storage.put_bid(&bid).await.unwrap();

        let search = TaskSearch::new(storage, QueryConfig::default());
        let page = search
            .search(&TaskQuery::default(), Some(&tasker))
            .await
            .unwrap();

        for listing in &page.tasks {
            if listing.task.id == task.id {
                assert_eq!(listing.my_bid.as_ref().map(|b| b.id), Some(bid.id));
            } else {
                assert!(listing.my_bid.is_none());
            }
        }
    }

    #[test]
    fn haversine_sanity() {
        // Berlin to Hamburg is roughly 255 km
        let d = haversine_km(52.52, 13.405, 53.55, 9.99);
        assert!((230.0..280.0).contains(&d), "got {}", d);
        assert!(haversine_km(52.52, 13.405, 52.52, 13.405) < 1e-9);
    }
}
