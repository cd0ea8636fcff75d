//! Project directory naming

use chrono::{TimeZone, Utc};
use flowsheet::docs::{project_dir_name, slugify};
use proptest::prelude::*;

proptest! {
    /// Slugs are non-empty, bounded and safe as a single path component
    #[test]
    fn slug_is_path_safe(prompt in any::<String>()) {
        let slug = slugify(&prompt);

        prop_assert!(!slug.is_empty());
        prop_assert!(slug.chars().count() <= 50);
        prop_assert!(!slug.contains('/'));
        prop_assert!(!slug.contains('\\'));
        prop_assert!(!slug.contains(".."));
        prop_assert!(!slug.chars().any(char::is_whitespace));
        prop_assert!(!slug.starts_with('_') && !slug.ends_with('_'));
    }

    #[test]
    fn slugify_is_idempotent(prompt in any::<String>()) {
        let once = slugify(&prompt);
        prop_assert_eq!(slugify(&once), once);
    }
}

#[test]
fn test_dir_name_shape() {
    let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
    assert_eq!(
        project_dir_name(at, "  Inventory -- tracker for  a café! "),
        "20240309_140507_Inventory_tracker_for_a_café"
    );
    assert_eq!(project_dir_name(at, "???"), "20240309_140507_workflow");
}
