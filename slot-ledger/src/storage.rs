// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! JSON-file backed store: one book per file under `<state_dir>/drawings/`.
//!
//! Transactions run against a scratch copy of the book. The copy is written to `<id>.json.tmp`,
//! synced, renamed over `<id>.json`, and only then swapped into memory. A failed write leaves
//! both the file and the in-memory book untouched.

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use core_types::{DrawingId, ParticipantId};
use log::{debug, info};
use parking_lot::Mutex;

use crate::{
    book::DrawingBook,
    config::LedgerConfig,
    error::{Result, SlotError, StoreError},
    store::{BookMutator, BookReader, MemoryStore, Mutation, SlotStore},
};

#[derive(Clone, Debug)]
pub struct StorageReport {
    pub path: PathBuf,
    pub drawings: usize,
    pub participants: usize,
    pub load_duration: Duration,
}

pub struct FileStore {
    config: LedgerConfig,
    memory: MemoryStore,
    create_lock: Mutex<()>,
}

impl FileStore {
    pub fn bootstrap(config: LedgerConfig) -> Result<(Self, StorageReport)> {
        config.ensure_dirs()?;
        let start = Instant::now();
        let dir = config.drawings_dir();
        let books = load_books(&dir)?;
        let participants = books.iter().map(|book| book.participants().len()).sum();
        let report = StorageReport {
            path: dir,
            drawings: books.len(),
            participants,
            load_duration: start.elapsed(),
        };
        info!(
            "loaded {} drawing books ({} participants) from {} in {:?}",
            report.drawings,
            report.participants,
            report.path.display(),
            report.load_duration
        );
        Ok((
            Self {
                config,
                memory: MemoryStore::from_books(books),
                create_lock: Mutex::new(()),
            },
            report,
        ))
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn persist(&self, book: &DrawingBook) -> Result<()> {
        let path = self.config.book_path(&book.drawing.id);
        write_book(&path, book)?;
        debug!("persisted drawing book {}", path.display());
        Ok(())
    }
}

impl SlotStore for FileStore {
    fn create(&self, book: DrawingBook) -> Result<()> {
        let _guard = self.create_lock.lock();
        if self.memory.contains(&book.drawing.id) {
            return Err(SlotError::DuplicateDrawing {
                drawing_id: book.drawing.id.clone(),
            });
        }
        self.persist(&book)?;
        self.memory.create(book)
    }

    fn view(&self, drawing_id: &DrawingId, reader: &mut BookReader<'_>) -> Result<()> {
        self.memory.view(drawing_id, reader)
    }

    fn transact(&self, drawing_id: &DrawingId, mutator: &mut BookMutator<'_>) -> Result<()> {
        let book = self.memory.book(drawing_id)?;
        let mut guard = book.write();
        let mut scratch = guard.clone();
        match mutator(&mut scratch)? {
            Mutation::Unchanged => Ok(()),
            Mutation::Changed => {
                self.persist(&scratch)?;
                *guard = scratch;
                Ok(())
            }
        }
    }

    fn drawing_ids(&self) -> Vec<DrawingId> {
        self.memory.drawing_ids()
    }

    fn allocate_participant_id(&self) -> ParticipantId {
        self.memory.allocate_participant_id()
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn load_books(dir: &Path) -> Result<Vec<DrawingBook>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();
    paths.iter().map(|path| read_book(path)).collect()
}

fn read_book(path: &Path) -> Result<DrawingBook> {
    let bytes = fs::read(path).map_err(io_error(path))?;
    let book = serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(book)
}

fn write_book(path: &Path, book: &DrawingBook) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(book).map_err(StoreError::from)?;
    let tmp = path.with_extension("json.tmp");
    let mut file = File::create(&tmp).map_err(io_error(&tmp))?;
    file.write_all(&bytes).map_err(io_error(&tmp))?;
    file.sync_data().map_err(io_error(&tmp))?;
    drop(file);
    fs::rename(&tmp, path).map_err(io_error(path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing::{Drawing, WinnerSelection};
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use core_types::OwnerId;
    use tempfile::tempdir;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn book(id: &str, quantity: u32) -> DrawingBook {
        let mut book = DrawingBook::new(Drawing {
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
            end_at: now() + ChronoDuration::days(1),
            created_at: now(),
        });
        book.initialize_pool(quantity, now()).unwrap();
        book
    }

    fn expire_all(store: &FileStore, id: &DrawingId) -> Result<()> {
        store.transact(id, &mut |book: &mut DrawingBook| {
            let released = book.expire_lapsed(now() + ChronoDuration::hours(1));
            Ok(Mutation::changed_if(released > 0))
        })
    }

    #[test]
    fn books_survive_a_restart() {
        let dir = tempdir().unwrap();
        let config = LedgerConfig::new(dir.path().to_path_buf());
        let id = DrawingId::from("d1");
        {
            let (store, report) = FileStore::bootstrap(config.clone()).unwrap();
            assert_eq!(report.drawings, 0);
            store.create(book("d1", 10)).unwrap();
            store
                .transact(&id, &mut |book: &mut DrawingBook| {
                    let token = core_types::ReservationToken::from_client("tok");
                    book.slot_mut(3)
                        .unwrap()
                        .reserve(token, now() + ChronoDuration::minutes(5), now())
                        .unwrap();
                    Ok(Mutation::Changed)
                })
                .unwrap();
        }

        let (store, report) = FileStore::bootstrap(config).unwrap();
        assert_eq!(report.drawings, 1);
        let mut reserved = 0;
        store
            .view(&id, &mut |book: &DrawingBook| reserved = book.counts().reserved)
            .unwrap();
        assert_eq!(reserved, 1);
    }

    #[test]
    fn failed_write_leaves_memory_untouched() {
        let dir = tempdir().unwrap();
        let config = LedgerConfig::new(dir.path().to_path_buf());
        let (store, _) = FileStore::bootstrap(config.clone()).unwrap();
        let id = DrawingId::from("d1");
        store.create(book("d1", 2)).unwrap();
        store
            .transact(&id, &mut |book: &mut DrawingBook| {
                let token = core_types::ReservationToken::from_client("tok");
                book.slot_mut(1)
                    .unwrap()
                    .reserve(token, now() + ChronoDuration::minutes(5), now())
                    .unwrap();
                Ok(Mutation::Changed)
            })
            .unwrap();

        fs::remove_dir_all(config.drawings_dir()).unwrap();
        let err = expire_all(&store, &id).unwrap_err();
        assert!(err.is_retryable());

        let mut reserved = 0;
        store
            .view(&id, &mut |book: &DrawingBook| reserved = book.counts().reserved)
            .unwrap();
        assert_eq!(reserved, 1);
    }

    #[test]
    fn corrupt_book_fails_bootstrap() {
        let dir = tempdir().unwrap();
        let config = LedgerConfig::new(dir.path().to_path_buf());
        config.ensure_dirs().unwrap();
        fs::write(config.book_path(&DrawingId::from("bad")), b"{not json").unwrap();
        let err = FileStore::bootstrap(config).err().unwrap();
        assert!(matches!(err, SlotError::Store(StoreError::Corrupt { .. })));
    }

    #[test]
    fn participant_ids_resume_after_restart() {
        let dir = tempdir().unwrap();
        let config = LedgerConfig::new(dir.path().to_path_buf());
        {
            let (store, _) = FileStore::bootstrap(config.clone()).unwrap();
            let mut seeded = book("d1", 1);
            seeded.insert_participant(crate::drawing::Participant {
                id: ParticipantId(41),
                drawing_id: DrawingId::from("d1"),
                name: "p".into(),
                email: None,
                phone: "1".into(),
                status: crate::drawing::ParticipantStatus::Approved,
                created_at: now(),
            });
            store.create(seeded).unwrap();
        }
        let (store, report) = FileStore::bootstrap(config).unwrap();
        assert_eq!(report.participants, 1);
        assert_eq!(store.allocate_participant_id(), ParticipantId(42));
    }

    #[test]
    fn sweep_skips_an_unwritable_book_and_continues() {
        use crate::{controller::SlotController, slot::SlotStatus};
        use core_types::{config::SlotLimits, ManualClock};
        use std::sync::Arc;

        let dir = tempdir().unwrap();
        let config = LedgerConfig::new(dir.path().to_path_buf());
        let (store, _) = FileStore::bootstrap(config.clone()).unwrap();
        store.create(book("a", 3)).unwrap();
        store.create(book("b", 3)).unwrap();
        let clock = Arc::new(ManualClock::new(now()));
        let ledger = SlotController::new(Arc::new(store), clock.clone(), SlotLimits::default());
        let (broken, healthy) = (DrawingId::from("a"), DrawingId::from("b"));
        ledger.reserve(&broken, 1, Some(1)).unwrap();
        ledger.reserve(&healthy, 1, Some(1)).unwrap();

        let path = config.book_path(&broken);
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();
        clock.advance(ChronoDuration::minutes(5));

        let report = ledger.sweep_all();
        assert_eq!(report.released, 1);
        assert_eq!(report.failed, vec![broken.clone()]);
        assert_eq!(ledger.get_slot(&healthy, 1).unwrap().status, SlotStatus::Available);
        assert_eq!(ledger.get_slot(&broken, 1).unwrap().status, SlotStatus::Reserved);

        assert_eq!(ledger.release_expired(None).unwrap(), 0);
        assert!(ledger.release_expired(Some(&broken)).unwrap_err().is_retryable());
    }
}
