// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Storage seam for drawing books.
//!
//! A store guarantees that a [`SlotStore::transact`] closure runs with exclusive access to one
//! book, so "check the predicate, then write" inside the closure is a single atomic conditional
//! update. Closures must finish all checks before writing anything: on `Err` the book has to be
//! left exactly as it was.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use core_types::{DrawingId, ParticipantId};
use parking_lot::RwLock;

use crate::{
    book::DrawingBook,
    error::{Result, SlotError},
};

/// Whether a transaction changed the book. Stores may skip persistence for `Unchanged`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutation {
    Unchanged,
    Changed,
}

impl Mutation {
    pub fn changed_if(changed: bool) -> Self {
        if changed {
            Mutation::Changed
        } else {
            Mutation::Unchanged
        }
    }
}

pub type BookReader<'a> = dyn FnMut(&DrawingBook) + 'a;
pub type BookMutator<'a> = dyn FnMut(&mut DrawingBook) -> Result<Mutation> + 'a;

pub trait SlotStore: Send + Sync {
    /// Inserts a new book; fails with [`SlotError::DuplicateDrawing`] if the id is taken.
    fn create(&self, book: DrawingBook) -> Result<()>;

    fn view(&self, drawing_id: &DrawingId, reader: &mut BookReader<'_>) -> Result<()>;

    fn transact(&self, drawing_id: &DrawingId, mutator: &mut BookMutator<'_>) -> Result<()>;

    fn drawing_ids(&self) -> Vec<DrawingId>;

    fn allocate_participant_id(&self) -> ParticipantId;
}

/// In-process store. Each book sits behind its own lock so drawings never contend.
pub struct MemoryStore {
    books: RwLock<HashMap<DrawingId, Arc<RwLock<DrawingBook>>>>,
    next_participant_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_books(Vec::new())
    }

    /// Seeds the store, continuing participant ids after the highest one already present.
    pub fn from_books(books: Vec<DrawingBook>) -> Self {
        let next_id = books
            .iter()
            .filter_map(DrawingBook::max_participant_id)
            .map(|id| id.0)
            .max()
            .unwrap_or(0)
            + 1;
        let books = books
            .into_iter()
            .map(|book| (book.drawing.id.clone(), Arc::new(RwLock::new(book))))
            .collect();
        Self {
            books: RwLock::new(books),
            next_participant_id: AtomicU64::new(next_id),
        }
    }

    pub(crate) fn book(&self, drawing_id: &DrawingId) -> Result<Arc<RwLock<DrawingBook>>> {
        self.books
            .read()
            .get(drawing_id)
            .cloned()
            .ok_or_else(|| SlotError::drawing_not_found(drawing_id))
    }

    pub(crate) fn contains(&self, drawing_id: &DrawingId) -> bool {
        self.books.read().contains_key(drawing_id)
    }

    pub fn len(&self) -> usize {
        self.books.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotStore for MemoryStore {
    fn create(&self, book: DrawingBook) -> Result<()> {
        let mut books = self.books.write();
        let drawing_id = book.drawing.id.clone();
        if books.contains_key(&drawing_id) {
            return Err(SlotError::DuplicateDrawing { drawing_id });
        }
        books.insert(drawing_id, Arc::new(RwLock::new(book)));
        Ok(())
    }

    fn view(&self, drawing_id: &DrawingId, reader: &mut BookReader<'_>) -> Result<()> {
        let book = self.book(drawing_id)?;
        let guard = book.read();
        reader(&*guard);
        Ok(())
    }

    fn transact(&self, drawing_id: &DrawingId, mutator: &mut BookMutator<'_>) -> Result<()> {
        let book = self.book(drawing_id)?;
        let mut guard = book.write();
        mutator(&mut *guard).map(|_| ())
    }

    fn drawing_ids(&self) -> Vec<DrawingId> {
        let mut ids: Vec<DrawingId> = self.books.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn allocate_participant_id(&self) -> ParticipantId {
        ParticipantId(self.next_participant_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing::{Drawing, WinnerSelection};
    use chrono::{Duration, Utc};
    use core_types::OwnerId;

    fn book(id: &str) -> DrawingBook {
        let now = Utc::now();
        DrawingBook::new(Drawing {
            id: DrawingId::from(id),
            owner_id: OwnerId("host".into()),
            title: "t".into(),
            guidelines: vec![],
            is_paid: false,
            price: 0,
            winner_selection: WinnerSelection::System,
            play_with_numbers: true,
            quantity_of_numbers: 0,
            winners_amount: 1,
            end_at: now + Duration::days(1),
            created_at: now,
        })
    }

    #[test]
    fn create_rejects_duplicate_ids() {
        let store = MemoryStore::new();
        store.create(book("a")).unwrap();
        assert!(matches!(
            store.create(book("a")),
            Err(SlotError::DuplicateDrawing { .. })
        ));
        assert_eq!(store.drawing_ids(), vec![DrawingId::from("a")]);
    }

    #[test]
    fn transact_on_missing_drawing_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .transact(&DrawingId::from("zz"), &mut |_book: &mut DrawingBook| Ok(Mutation::Unchanged))
            .unwrap_err();
        assert!(matches!(err, SlotError::NotFound { .. }));
    }

    #[test]
    fn participant_ids_continue_after_seeded_books() {
        let store = MemoryStore::new();
        assert_eq!(store.allocate_participant_id(), ParticipantId(1));
        assert_eq!(store.allocate_participant_id(), ParticipantId(2));
        let seeded = MemoryStore::from_books(vec![book("a")]);
        assert_eq!(seeded.allocate_participant_id(), ParticipantId(1));
    }
}
