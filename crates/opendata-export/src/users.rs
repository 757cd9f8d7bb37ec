//! Default CSV export of user accounts

use opendata_core::{register_user_metrics, MetricRegistry, User};

use crate::adapter::AdapterConfig;
use crate::registry::AdapterRegistry;

/// Columns exported for every user, before the metric columns.
pub const USER_FIELDS: [&str; 13] = [
    "id",
    "slug",
    "first_name",
    "last_name",
    "email",
    "about",
    "website",
    "avatar_url",
    "active",
    "roles",
    "created_at",
    "last_login_at",
    "deleted",
];

/// Default adapter for [`User`] records.
pub fn user_adapter() -> AdapterConfig<User> {
    AdapterConfig::new(USER_FIELDS)
        .handler("roles", |user: &User| {
            user.roles
                .iter()
                .map(|role| role.name.as_str())
                .collect::<Vec<_>>()
                .join(",")
        })
        .with_metric_fields()
}

/// Register the user metrics and the default user adapter.
pub fn register_user_exports(adapters: &mut AdapterRegistry, metrics: &mut MetricRegistry) {
    register_user_metrics(metrics);
    adapters.register(user_adapter());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Adapter;
    use chrono::{TimeZone, Utc};
    use opendata_core::{Role, Value};
    use std::sync::Arc;

    fn adapter(users: Vec<User>) -> Adapter<User, Vec<User>> {
        let mut adapters = AdapterRegistry::new();
        let mut metrics = MetricRegistry::new();
        register_user_exports(&mut adapters, &mut metrics);
        Adapter::new(adapters.lookup::<User>().unwrap(), Arc::new(metrics), users)
    }

    #[test]
    fn test_user_header() {
        let header = adapter(Vec::new()).header().unwrap();
        let mut expected: Vec<String> = USER_FIELDS.iter().map(|f| f.to_string()).collect();
        expected.extend([
            "metric.datasets".to_string(),
            "metric.reuses".to_string(),
            "metric.followers".to_string(),
        ]);
        assert_eq!(header, expected);
    }

    #[test]
    fn test_user_row() {
        let mut user = User::new("Jane", "Doe", "jane@example.org");
        user.roles = vec![Role::admin(), Role::new("editor")];
        user.created_at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        user.set_metric("datasets", Value::Int(4));

        let adapter = adapter(vec![user.clone()]);
        let header = adapter.header().unwrap();
        let row = adapter.rows().unwrap().next().unwrap();
        let column = |name: &str| {
            let index = header.iter().position(|h| h == name).unwrap();
            row[index].clone()
        };

        assert_eq!(column("id"), user.id.to_string());
        assert_eq!(column("slug"), "jane-doe");
        assert_eq!(column("roles"), "admin,editor");
        assert_eq!(column("active"), "true");
        assert_eq!(column("created_at"), "2024-01-02T03:04:05Z");
        assert_eq!(column("last_login_at"), "");
        assert_eq!(column("deleted"), "");
        assert_eq!(column("metric.datasets"), "4");
        assert_eq!(column("metric.followers"), "0");
    }

    #[test]
    fn test_deleted_user_row() {
        let mut user = User::new("Jane", "Doe", "jane@example.org");
        user.mark_as_deleted(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());

        let adapter = adapter(vec![user]);
        let header = adapter.header().unwrap();
        let row = adapter.rows().unwrap().next().unwrap();
        let deleted = header.iter().position(|h| h == "deleted").unwrap();
        let first_name = header.iter().position(|h| h == "first_name").unwrap();

        assert_eq!(row[deleted], "2024-06-01T00:00:00Z");
        assert_eq!(row[first_name], "DELETED");
    }
}
