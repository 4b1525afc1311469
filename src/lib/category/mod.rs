use std::collections::BTreeMap;

use crate::types::Category;

/// Anything that can be filed under a front-matter category.
pub trait Categorized {
    fn category(&self) -> Option<&Category>;
}

impl<T: Categorized + ?Sized> Categorized for &T {
    fn category(&self) -> Option<&Category> {
        (**self).category()
    }
}

/// Group posts by category, ordered by category name.
///
/// Uncategorised posts form the `None` group, which sorts before every named
/// category. Posts keep their input order within a group.
pub fn group_by_category<T: Categorized>(
    posts: impl IntoIterator<Item = T>,
) -> Vec<(Option<Category>, Vec<T>)> {
    let mut by_category: BTreeMap<Option<Category>, Vec<T>> = BTreeMap::new();
    for post in posts {
        by_category
            .entry(post.category().cloned())
            .or_default()
            .push(post);
    }
    by_category.into_iter().collect()
}
