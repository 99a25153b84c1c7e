//! Document-order search: a lazy walk over the *whole* document (not just
//! the expanded portion), yielding nodes whose content would contain the
//! query. The caller drives expansion for each hit it decides to visit.

use core_doc::DocId;
use core_format::contains;

use crate::ViewTree;

impl ViewTree {
    /// Nodes strictly after (or before, when `backward`) `from` in document
    /// pre-order whose content contains `query`. Lazy and restartable: drop
    /// the iterator and call again with a new origin to continue a search.
    pub fn search_from<'a>(
        &'a self,
        from: DocId,
        query: &'a str,
        backward: bool,
    ) -> impl Iterator<Item = DocId> + 'a {
        let step = move |id: &DocId| {
            if backward {
                self.doc().dfs_prev(*id)
            } else {
                self.doc().dfs_next(*id)
            }
        };
        std::iter::successors(step(&from), step)
            .filter(move |&id| contains(&self.content_fmt(id), query))
    }
}
