//! In-memory user search and pagination for the admin user picker.

use crate::models::User;

pub const DEFAULT_PER_PAGE: u32 = 10;
pub const MAX_PER_PAGE: u32 = 100;

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: usize,
    pub total_pages: u32,
}

/// Users matching `query` (case-insensitive substring of name, email or
/// corps) and, when given, exactly in `corps`.
///
/// Name-prefix matches sort first, then everything by name.
pub fn filter_users(users: Vec<User>, query: &str, corps: Option<&str>) -> Vec<User> {
    let needle = query.trim().to_lowercase();
    let corps = corps.map(str::trim).filter(|c| !c.is_empty());

    let mut matches: Vec<(bool, String, User)> = users
        .into_iter()
        .filter(|u| corps.is_none_or(|c| u.corps.trim() == c))
        .filter_map(|u| {
            let name = u.name.to_lowercase();
            let hit = needle.is_empty()
                || name.contains(&needle)
                || u.email.to_lowercase().contains(&needle)
                || u.corps.to_lowercase().contains(&needle);
            hit.then(|| (!needle.is_empty() && name.starts_with(&needle), name, u))
        })
        .collect();

    matches.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    matches.into_iter().map(|(_, _, u)| u).collect()
}

/// Slice `items` into 1-based pages; `per_page` is clamped to `1..=MAX_PER_PAGE`.
pub fn paginate<T>(items: Vec<T>, page: Option<u32>, per_page: Option<u32>) -> Page<T> {
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    let page = page.unwrap_or(1).max(1);
    let total = items.len();
    let total_pages = total.div_ceil(per_page as usize) as u32;

    let start = (page as usize - 1).saturating_mul(per_page as usize);
    let items = items
        .into_iter()
        .skip(start)
        .take(per_page as usize)
        .collect();

    Page {
        items,
        page,
        per_page,
        total,
        total_pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::Utc;

    fn user(name: &str, email: &str, corps: &str) -> User {
        User::new_member(
            name.to_lowercase(),
            name.to_string(),
            email.to_string(),
            corps.to_string(),
            Role::User,
            String::new(),
            Utc::now(),
        )
    }

    fn names(users: &[User]) -> Vec<&str> {
        users.iter().map(|u| u.name.as_str()).collect()
    }

    fn sample() -> Vec<User> {
        vec![
            user("Sari", "sari@example.com", "SOPS"),
            user("Andi Budiman", "andi@example.com", "SLOG"),
            user("Budi", "budi@example.com", "SOPS"),
            user("Citra", "citra@budi.id", "DISKES"),
        ]
    }

    #[test]
    fn prefix_matches_come_first() {
        let found = filter_users(sample(), "budi", None);
        assert_eq!(names(&found), vec!["Budi", "Andi Budiman", "Citra"]);
    }

    #[test]
    fn corps_filter_is_exact() {
        let found = filter_users(sample(), "", Some("SOPS"));
        assert_eq!(names(&found), vec!["Budi", "Sari"]);

        let found = filter_users(sample(), "", Some("SOP"));
        assert!(found.is_empty());
    }

    #[test]
    fn query_matches_corps_text() {
        let found = filter_users(sample(), "disk", None);
        assert_eq!(names(&found), vec!["Citra"]);
    }

    #[test]
    fn pagination_bounds() {
        let items: Vec<u32> = (1..=25).collect();

        let page = paginate(items.clone(), Some(3), Some(10));
        assert_eq!(page.items, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);

        let page = paginate(items.clone(), Some(0), Some(1000));
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, MAX_PER_PAGE);
        assert_eq!(page.items.len(), 25);

        let page = paginate(items, Some(9), None);
        assert!(page.items.is_empty());
        assert_eq!(page.per_page, DEFAULT_PER_PAGE);
    }
}
