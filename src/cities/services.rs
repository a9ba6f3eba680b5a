use sqlx::PgPool;

use super::repo_types::City;
use crate::error::{AppError, AppResult};

pub(crate) fn normalize_slug(raw: &str) -> String {
    raw.trim().to_lowercase().replace([' ', '_'], "-")
}

/// Resolves `slug` (or the configured default) to an active city.
pub async fn resolve_city(db: &PgPool, slug: Option<&str>, default: &str) -> AppResult<City> {
    let slug = normalize_slug(slug.filter(|s| !s.trim().is_empty()).unwrap_or(default));
    match City::find_by_slug(db, &slug).await? {
        Some(city) if city.is_active => Ok(city),
        _ => Err(AppError::not_found(format!("City '{slug}' not found"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_lowercased_and_dashed() {
        assert_eq!(normalize_slug(" Austin "), "austin");
        assert_eq!(normalize_slug("San Antonio"), "san-antonio");
        assert_eq!(normalize_slug("new_york"), "new-york");
    }
}
