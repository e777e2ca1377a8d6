//! Drag/drop move engine.
//!
//! Pure list transformations. A move names the item it expects to find at
//! the source index; if the lists changed since the drag started the move is
//! dropped as [`MoveOutcome::Stale`] and nothing is touched.

/// Anything that can be dragged has a stable id.
pub trait Draggable {
    fn drag_id(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropLocation<L> {
    pub list: L,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragMove<L> {
    pub item_id: String,
    pub source: DropLocation<L>,
    /// `None` when dropped outside every droppable target.
    pub destination: Option<DropLocation<L>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    NoDestination,
    Reordered,
    Transferred,
    /// The item was not at the source index.
    Stale,
    /// The destination cannot hold this item.
    Rejected,
}

impl MoveOutcome {
    pub fn changed(self) -> bool {
        matches!(self, MoveOutcome::Reordered | MoveOutcome::Transferred)
    }
}

pub(crate) fn is_at<T: Draggable>(list: &[T], index: usize, item_id: &str) -> bool {
    list.get(index).is_some_and(|item| item.drag_id() == item_id)
}

/// Same-list move.
pub fn reorder<T: Draggable>(list: &mut Vec<T>, from: usize, to: usize, item_id: &str) -> MoveOutcome {
    if !is_at(list, from, item_id) {
        return MoveOutcome::Stale;
    }
    let item = list.remove(from);
    let to = to.min(list.len());
    list.insert(to, item);
    MoveOutcome::Reordered
}

/// Move between two lists of the same item type.
pub fn transfer<T: Draggable>(
    source: &mut Vec<T>,
    from: usize,
    dest: &mut Vec<T>,
    to: usize,
    item_id: &str,
) -> MoveOutcome {
    transfer_with(source, from, dest, to, item_id, |_| true, Ok)
}

/// Move between lists of different item types. `accepts` is checked before
/// anything is removed; `convert` turns the removed item into the
/// destination's type. A refused conversion puts the item back where it was.
pub fn transfer_with<S, D>(
    source: &mut Vec<S>,
    from: usize,
    dest: &mut Vec<D>,
    to: usize,
    item_id: &str,
    accepts: impl FnOnce(&S) -> bool,
    convert: impl FnOnce(S) -> Result<D, S>,
) -> MoveOutcome
where
    S: Draggable,
{
    if !is_at(source, from, item_id) {
        return MoveOutcome::Stale;
    }
    if !accepts(&source[from]) {
        return MoveOutcome::Rejected;
    }
    let item = source.remove(from);
    match convert(item) {
        Ok(converted) => {
            let to = to.min(dest.len());
            dest.insert(to, converted);
            MoveOutcome::Transferred
        }
        Err(item) => {
            source.insert(from, item);
            MoveOutcome::Rejected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(&'static str);

    impl Draggable for Item {
        fn drag_id(&self) -> &str {
            self.0
        }
    }

    fn ids(list: &[Item]) -> Vec<&str> {
        list.iter().map(|i| i.0).collect()
    }

    #[test]
    fn reorder_moves_within_list() {
        let mut list = vec![Item("a"), Item("b"), Item("c")];
        assert_eq!(reorder(&mut list, 0, 2, "a"), MoveOutcome::Reordered);
        assert_eq!(ids(&list), vec!["b", "c", "a"]);
    }

    #[test]
    fn reorder_clamps_destination() {
        let mut list = vec![Item("a"), Item("b")];
        assert_eq!(reorder(&mut list, 0, 99, "a"), MoveOutcome::Reordered);
        assert_eq!(ids(&list), vec!["b", "a"]);
    }

    #[test]
    fn stale_source_index_is_a_no_op() {
        let mut list = vec![Item("a"), Item("b")];
        assert_eq!(reorder(&mut list, 0, 1, "b"), MoveOutcome::Stale);
        assert_eq!(reorder(&mut list, 5, 0, "a"), MoveOutcome::Stale);
        assert_eq!(ids(&list), vec!["a", "b"]);
    }

    #[test]
    fn transfer_conserves_items() {
        let mut left = vec![Item("a"), Item("b")];
        let mut right = vec![Item("c")];
        let before = left.len() + right.len();
        assert_eq!(transfer(&mut left, 1, &mut right, 0, "b"), MoveOutcome::Transferred);
        assert_eq!(ids(&left), vec!["a"]);
        assert_eq!(ids(&right), vec!["b", "c"]);
        assert_eq!(left.len() + right.len(), before);
    }

    #[test]
    fn rejected_transfer_leaves_lists_alone() {
        let mut left = vec![Item("a")];
        let mut right: Vec<Item> = vec![];
        let outcome = transfer_with(&mut left, 0, &mut right, 0, "a", |_| false, Ok);
        assert_eq!(outcome, MoveOutcome::Rejected);
        assert_eq!(left.len(), 1);
        assert!(right.is_empty());
        assert!(!outcome.changed());
    }

    #[test]
    fn transfer_with_converts_types() {
        let mut source = vec![Item("x")];
        let mut dest: Vec<String> = vec!["y".into()];
        let outcome = transfer_with(
            &mut source,
            0,
            &mut dest,
            1,
            "x",
            |_| true,
            |item| Ok(item.0.to_uppercase()),
        );
        assert_eq!(outcome, MoveOutcome::Transferred);
        assert_eq!(dest, vec!["y".to_string(), "X".to_string()]);
    }

    #[test]
    fn refused_conversion_keeps_the_item_in_place() {
        let mut source = vec![Item("a"), Item("b"), Item("c")];
        let mut dest: Vec<String> = vec![];
        let outcome = transfer_with(&mut source, 1, &mut dest, 0, "b", |_| true, Err::<String, Item>);
        assert_eq!(outcome, MoveOutcome::Rejected);
        assert_eq!(ids(&source), vec!["a", "b", "c"]);
        assert!(dest.is_empty());
    }
}
