use moka::future::Cache;
use std::time::Duration;

/// Employee display names by employee id.
///
/// Only names that exist are cached; a miss always falls through to the
/// directory.
#[derive(Clone)]
pub struct NameCache {
    cache: Cache<u64, String>,
}

impl NameCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_capacity) // tune based on memory
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, employee_id: u64) -> Option<String> {
        self.cache.get(&employee_id).await
    }

    pub async fn insert(&self, employee_id: u64, name: String) {
        self.cache.insert(employee_id, name).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn caches_inserted_names() {
        let names = NameCache::new(100, Duration::from_secs(60));
        assert_eq!(names.get(1).await, None);

        names.insert(1, "Ada Lovelace".to_string()).await;
        assert_eq!(names.get(1).await.as_deref(), Some("Ada Lovelace"));
    }
}
