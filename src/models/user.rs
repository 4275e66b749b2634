use chrono::{DateTime, Utc};
use serde::Serialize;

/// A registered account. The password hash never leaves the server.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Genre ids the user picked as favorites
    pub favorite_genres: Vec<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to insert a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub favorite_genres: Vec<i32>,
}

/// Partial profile update; `None` leaves the column untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub username: Option<String>,
    pub favorite_genres: Option<Vec<i32>>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.favorite_genres.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_is_not_serialized() {
        let now = Utc::now();
        let user = User {
            id: 1,
            username: "neo".to_string(),
            email: "neo@example.com".to_string(),
            password_hash: "$2b$04$secret".to_string(),
            favorite_genres: vec![1, 2],
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "neo");
        assert_eq!(json["favorite_genres"], serde_json::json!([1, 2]));
    }

    #[test]
    fn test_empty_changes() {
        assert!(UserChanges::default().is_empty());
        let changes = UserChanges {
            favorite_genres: Some(vec![]),
            ..Default::default()
        };
        assert!(!changes.is_empty());
    }
}
