//! Wire models of the backend.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A listing imported from Avito.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: u64,
    /// The Avito page the listing was imported from.
    #[serde(default)]
    pub url: String,
    pub title: String,
    /// Decimal text as sent by the backend (`"1500.00"`), or free text.
    #[serde(default, deserialize_with = "price_text")]
    pub price: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "non_empty")]
    pub image_url: Option<String>,
    /// RFC 3339 timestamp.
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub views_count: u64,
}

/// A comment on a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub text: String,
    pub user_id: u64,
    pub user_username: String,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

/// The signed-in user, as returned by `GET /api/auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Me {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub is_blocked: bool,
}

/// Returned by login and registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub id: u64,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    /// Omitted from the request when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

fn price_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

fn null_as_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listing_from_backend() {
        let listing: Listing = serde_json::from_value(json!({
            "id": 42,
            "url": "https://www.avito.ru/moskva/velosipedy/42",
            "title": "Велосипед",
            "price": "1500.00",
            "description": null,
            "image_url": "",
            "published_at": "2024-03-12T14:05:00+03:00",
            "views_count": 7
        }))
        .expect("listing should parse");

        assert_eq!(listing.id, 42);
        assert_eq!(listing.price.as_deref(), Some("1500.00"));
        assert_eq!(listing.description, "");
        assert_eq!(listing.image_url, None);
        assert_eq!(listing.views_count, 7);
    }

    #[test]
    fn test_listing_minimal() {
        let listing: Listing = serde_json::from_value(json!({"id": 1, "title": "Диван"}))
            .expect("listing should parse");
        assert_eq!(listing.price, None);
        assert_eq!(listing.published_at, None);
    }

    #[test]
    fn test_numeric_price() {
        let listing: Listing =
            serde_json::from_value(json!({"id": 1, "title": "Диван", "price": 2500}))
                .expect("listing should parse");
        assert_eq!(listing.price.as_deref(), Some("2500"));
    }

    #[test]
    fn test_me_defaults() {
        let me: Me = serde_json::from_value(json!({"id": 3, "username": "ivan"}))
            .expect("me should parse");
        assert!(!me.is_staff);
        assert!(!me.is_blocked);
    }

    #[test]
    fn test_register_form_omits_missing_email() {
        let form = RegisterForm {
            username: "ivan".to_string(),
            password: "secret123".to_string(),
            email: None,
        };
        assert_eq!(
            serde_json::to_value(&form).expect("serialize"),
            json!({"username": "ivan", "password": "secret123"})
        );

        let form = RegisterForm {
            email: Some("ivan@example.com".to_string()),
            ..form
        };
        assert_eq!(
            serde_json::to_value(&form).expect("serialize")["email"],
            "ivan@example.com"
        );
    }
}
